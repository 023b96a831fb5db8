use std::path::{Path, PathBuf};

use tracing::debug;

use crate::{
    assets::MediaHandle,
    context::Context,
    osc::{OscMessage, OscNode},
    render::Canvas,
    Result,
};

use super::{
    anchor, handle_flag, handle_point, handle_size, object_boilerplate, Drawable, ObjectBase,
    ObjectKind, Point, Resizable, SceneObject, Size,
};

/// Still image loaded through the shared asset cache.
#[derive(Debug, Clone)]
pub struct Image {
    base: ObjectBase,
    path: PathBuf,
    media: Option<MediaHandle>,
    pub pos: Point,
    /// Zero components are taken from the media on setup.
    pub size: Size,
    pub draw_from_center: bool,
}

impl Image {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            base: ObjectBase::new(name),
            path: path.into(),
            media: None,
            pos: Point::default(),
            size: Size::default(),
            draw_from_center: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_loaded(&self) -> bool {
        self.media.is_some()
    }
}

impl Drawable for Image {
    fn draw(&self, canvas: &mut dyn Canvas) {
        self.draw_at(canvas, self.pos.x, self.pos.y);
    }

    fn draw_at(&self, canvas: &mut dyn Canvas, x: f32, y: f32) {
        self.draw_sized(canvas, x, y, self.size.width as f32, self.size.height as f32);
    }

    fn draw_sized(&self, canvas: &mut dyn Canvas, x: f32, y: f32, width: f32, height: f32) {
        let Some(media) = &self.media else {
            return;
        };
        if !self.base.visible {
            return;
        }
        let (x, y) = anchor(x, y, width, height, self.draw_from_center);
        canvas.set_color(self.base.color);
        canvas.draw_media(media, x, y, width, height);
    }
}

impl Resizable for Image {
    fn set_size(&mut self, width: u32, height: u32) {
        self.size = Size::new(width, height);
    }

    fn set_draw_from_center(&mut self, center: bool) {
        self.draw_from_center = center;
    }
}

impl OscNode for Image {
    object_boilerplate!(node);

    fn handle_osc(&mut self, message: &OscMessage) -> bool {
        let Some(property) = self.base.property(message) else {
            return false;
        };
        self.base.handle_common(property, message)
            || handle_point(&mut self.pos, "/position", property, message)
            || handle_size(&mut self.size, property, message)
            || (property == "/center" && handle_flag(&mut self.draw_from_center, message))
    }
}

impl SceneObject for Image {
    object_boilerplate!(object ObjectKind::Image);

    fn setup(&mut self, ctx: &Context) -> Result<()> {
        let media = ctx.assets()?.image(&self.path)?;
        if self.size.width == 0 {
            self.size.width = media.width;
        }
        if self.size.height == 0 {
            self.size.height = media.height;
        }
        debug!(image = %self.base.name, path = %self.path.display(), "image ready");
        self.media = Some(media);
        Ok(())
    }

    fn clear(&mut self, _ctx: &Context) {
        self.media = None;
    }

    fn as_resizable_mut(&mut self) -> Option<&mut dyn Resizable> {
        Some(self)
    }
}
