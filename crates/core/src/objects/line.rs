use crate::{
    osc::{OscMessage, OscNode},
    render::Canvas,
};

use super::{handle_point, object_boilerplate, Drawable, ObjectBase, ObjectKind, Point, SceneObject};

/// A line segment between two points.
#[derive(Debug, Clone)]
pub struct Line {
    base: ObjectBase,
    pub pos1: Point,
    pub pos2: Point,
}

impl Line {
    pub fn new(name: impl Into<String>) -> Self {
        Self::between(name, Point::default(), Point::default())
    }

    pub fn between(name: impl Into<String>, pos1: Point, pos2: Point) -> Self {
        Self {
            base: ObjectBase::new(name),
            pos1,
            pos2,
        }
    }
}

impl Drawable for Line {
    fn draw(&self, canvas: &mut dyn Canvas) {
        if !self.base.visible {
            return;
        }
        canvas.set_color(self.base.color);
        canvas.draw_line(self.pos1.x, self.pos1.y, self.pos2.x, self.pos2.y);
    }

    /// Draws the segment translated so `pos1` lands on `(x, y)`.
    fn draw_at(&self, canvas: &mut dyn Canvas, x: f32, y: f32) {
        if !self.base.visible {
            return;
        }
        let (dx, dy) = (x - self.pos1.x, y - self.pos1.y);
        canvas.set_color(self.base.color);
        canvas.draw_line(x, y, self.pos2.x + dx, self.pos2.y + dy);
    }
}

impl OscNode for Line {
    object_boilerplate!(node);

    fn handle_osc(&mut self, message: &OscMessage) -> bool {
        let Some(property) = self.base.property(message) else {
            return false;
        };
        self.base.handle_common(property, message)
            || handle_point(&mut self.pos1, "/position1", property, message)
            || handle_point(&mut self.pos2, "/position2", property, message)
    }
}

impl SceneObject for Line {
    object_boilerplate!(object ObjectKind::Line);
}
