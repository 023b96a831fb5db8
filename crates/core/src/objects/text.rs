use std::path::PathBuf;

use crate::{
    assets::FontHandle,
    context::Context,
    osc::{OscMessage, OscNode},
    render::Canvas,
    Result,
};

use super::{handle_flag, handle_point, object_boilerplate, Drawable, ObjectBase, ObjectKind, Point, SceneObject};

pub const DEFAULT_FONT_SIZE: u32 = 24;

/// A line of text drawn with a cached font.
#[derive(Debug, Clone)]
pub struct Text {
    base: ObjectBase,
    pub text: String,
    pub pos: Point,
    pub draw_from_center: bool,
    /// Falls back to the configured default font.
    font_path: Option<PathBuf>,
    font_size: u32,
    font: Option<FontHandle>,
}

impl Text {
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            base: ObjectBase::new(name),
            text: text.into(),
            pos: Point::default(),
            draw_from_center: false,
            font_path: None,
            font_size: DEFAULT_FONT_SIZE,
            font: None,
        }
    }

    pub fn with_font(mut self, path: impl Into<PathBuf>, size: u32) -> Self {
        self.font_path = Some(path.into());
        self.font_size = size;
        self
    }

    pub fn font(&self) -> Option<&FontHandle> {
        self.font.as_ref()
    }
}

impl Drawable for Text {
    fn draw(&self, canvas: &mut dyn Canvas) {
        self.draw_at(canvas, self.pos.x, self.pos.y);
    }

    fn draw_at(&self, canvas: &mut dyn Canvas, x: f32, y: f32) {
        let Some(font) = &self.font else {
            return;
        };
        if !self.base.visible || self.text.is_empty() {
            return;
        }
        let (x, y) = if self.draw_from_center {
            let (width, height) = canvas.text_size(font, &self.text);
            (x - width / 2.0, y - height / 2.0)
        } else {
            (x, y)
        };
        canvas.set_color(self.base.color);
        canvas.draw_text(font, &self.text, x, y);
    }
}

impl OscNode for Text {
    object_boilerplate!(node);

    fn handle_osc(&mut self, message: &OscMessage) -> bool {
        let Some(property) = self.base.property(message) else {
            return false;
        };
        if self.base.handle_common(property, message)
            || handle_point(&mut self.pos, "/position", property, message)
        {
            return true;
        }
        match property {
            "/text" => {
                if let Some(text) = message.try_string(0) {
                    self.text = text.to_string();
                }
                true
            }
            "/center" => handle_flag(&mut self.draw_from_center, message),
            _ => false,
        }
    }
}

impl SceneObject for Text {
    object_boilerplate!(object ObjectKind::Text);

    fn setup(&mut self, ctx: &Context) -> Result<()> {
        let path = self
            .font_path
            .clone()
            .unwrap_or_else(|| ctx.config().font_path.clone());
        self.font = Some(ctx.assets()?.font(&path, self.font_size)?);
        Ok(())
    }

    fn clear(&mut self, _ctx: &Context) {
        self.font = None;
    }
}
