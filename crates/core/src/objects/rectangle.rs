use crate::{
    osc::{OscMessage, OscNode},
    render::Canvas,
};

use super::{
    anchor, handle_flag, handle_point, handle_size, object_boilerplate, Drawable, ObjectBase,
    ObjectKind, Point, Resizable, SceneObject, Size,
};

#[derive(Debug, Clone)]
pub struct Rectangle {
    base: ObjectBase,
    pub pos: Point,
    pub size: Size,
    pub filled: bool,
    pub draw_from_center: bool,
}

impl Rectangle {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_bounds(name, Point::default(), Size::new(1, 1))
    }

    pub fn with_bounds(name: impl Into<String>, pos: Point, size: Size) -> Self {
        Self {
            base: ObjectBase::new(name),
            pos,
            size,
            filled: true,
            draw_from_center: false,
        }
    }
}

impl Drawable for Rectangle {
    fn draw(&self, canvas: &mut dyn Canvas) {
        self.draw_sized(
            canvas,
            self.pos.x,
            self.pos.y,
            self.size.width as f32,
            self.size.height as f32,
        );
    }

    fn draw_at(&self, canvas: &mut dyn Canvas, x: f32, y: f32) {
        self.draw_sized(canvas, x, y, self.size.width as f32, self.size.height as f32);
    }

    fn draw_sized(&self, canvas: &mut dyn Canvas, x: f32, y: f32, width: f32, height: f32) {
        if !self.base.visible {
            return;
        }
        let (x, y) = anchor(x, y, width, height, self.draw_from_center);
        canvas.set_color(self.base.color);
        canvas.set_fill(self.filled);
        canvas.draw_rect(x, y, width, height);
    }
}

impl Resizable for Rectangle {
    fn set_size(&mut self, width: u32, height: u32) {
        self.size = Size::new(width, height);
    }

    fn set_draw_from_center(&mut self, center: bool) {
        self.draw_from_center = center;
    }
}

impl OscNode for Rectangle {
    object_boilerplate!(node);

    fn handle_osc(&mut self, message: &OscMessage) -> bool {
        let Some(property) = self.base.property(message) else {
            return false;
        };
        if self.base.handle_common(property, message)
            || handle_point(&mut self.pos, "/position", property, message)
            || handle_size(&mut self.size, property, message)
        {
            return true;
        }
        match property {
            "/filled" => handle_flag(&mut self.filled, message),
            "/center" => handle_flag(&mut self.draw_from_center, message),
            _ => false,
        }
    }
}

impl SceneObject for Rectangle {
    object_boilerplate!(object ObjectKind::Rectangle);

    fn as_resizable_mut(&mut self) -> Option<&mut dyn Resizable> {
        Some(self)
    }
}
