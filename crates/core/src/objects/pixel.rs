use crate::{
    osc::{OscMessage, OscNode},
    render::Canvas,
};

use super::{handle_point, object_boilerplate, Drawable, ObjectBase, ObjectKind, Point, SceneObject};

/// A single point.
#[derive(Debug, Clone)]
pub struct Pixel {
    base: ObjectBase,
    pub pos: Point,
}

impl Pixel {
    pub fn new(name: impl Into<String>) -> Self {
        Self::at(name, 0.0, 0.0)
    }

    pub fn at(name: impl Into<String>, x: f32, y: f32) -> Self {
        Self {
            base: ObjectBase::new(name),
            pos: Point::new(x, y),
        }
    }
}

impl Drawable for Pixel {
    fn draw(&self, canvas: &mut dyn Canvas) {
        self.draw_at(canvas, self.pos.x, self.pos.y);
    }

    fn draw_at(&self, canvas: &mut dyn Canvas, x: f32, y: f32) {
        if !self.base.visible {
            return;
        }
        canvas.set_color(self.base.color);
        canvas.set_fill(true);
        canvas.draw_pixel(x, y);
    }
}

impl OscNode for Pixel {
    object_boilerplate!(node);

    fn handle_osc(&mut self, message: &OscMessage) -> bool {
        let Some(property) = self.base.property(message) else {
            return false;
        };
        self.base.handle_common(property, message)
            || handle_point(&mut self.pos, "/position", property, message)
    }
}

impl SceneObject for Pixel {
    object_boilerplate!(object ObjectKind::Pixel);
}
