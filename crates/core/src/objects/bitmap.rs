use crate::{
    osc::{OscMessage, OscNode},
    render::Canvas,
    Result, VisualError,
};

use super::{
    anchor, handle_flag, handle_point, handle_size, object_boilerplate, Drawable, ObjectBase,
    ObjectKind, Point, Resizable, SceneObject, Size,
};

/// Grid of on/off cells scaled to `size`.
#[derive(Debug, Clone)]
pub struct Bitmap {
    base: ObjectBase,
    pub pos: Point,
    size: Size,
    columns: u32,
    rows: u32,
    cells: Vec<bool>,
    pub filled: bool,
    pub draw_from_center: bool,
}

impl Bitmap {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            base: ObjectBase::new(name),
            pos: Point::default(),
            size: Size::new(1, 1),
            columns: 1,
            rows: 1,
            cells: Vec::new(),
            filled: true,
            draw_from_center: false,
        }
    }

    /// Builds a bitmap from a frame string, see [`Bitmap::set_frame`].
    pub fn from_frame(name: impl Into<String>, frame: &str, columns: u32, rows: u32) -> Result<Self> {
        let mut bitmap = Self::new(name);
        bitmap.set_frame(frame, columns, rows)?;
        Ok(bitmap)
    }

    /// Parses `*` (filled) and `-` (empty) cells row by row, ignoring every
    /// other character. On error the previous frame is kept.
    pub fn set_frame(&mut self, frame: &str, columns: u32, rows: u32) -> Result<()> {
        let columns = columns.max(1);
        let rows = rows.max(1);
        let needed = columns
            .checked_mul(rows)
            .and_then(|cells| usize::try_from(cells).ok())
            .ok_or(VisualError::InvalidInput("bitmap frame has too many cells"))?;

        let cells: Vec<bool> = frame
            .chars()
            .filter_map(|c| match c {
                '*' => Some(true),
                '-' => Some(false),
                _ => None,
            })
            .take(needed)
            .collect();
        if cells.len() < needed {
            return Err(VisualError::msg(format!(
                "not enough pixels in bitmap frame: {}, need {needed}",
                cells.len()
            )));
        }

        self.columns = columns;
        self.rows = rows;
        self.cells = cells;
        Ok(())
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.columns, self.rows)
    }

    pub fn size(&self) -> Size {
        self.size
    }

    pub fn cell(&self, column: u32, row: u32) -> bool {
        if column >= self.columns || row >= self.rows {
            return false;
        }
        self.cells
            .get((row * self.columns + column) as usize)
            .copied()
            .unwrap_or(false)
    }

    pub fn pixel_size(&self) -> (f32, f32) {
        self.pixel_size_for(self.size.width as f32, self.size.height as f32)
    }

    fn pixel_size_for(&self, width: f32, height: f32) -> (f32, f32) {
        (width / self.columns as f32, height / self.rows as f32)
    }
}

impl Drawable for Bitmap {
    fn draw(&self, canvas: &mut dyn Canvas) {
        self.draw_at(canvas, self.pos.x, self.pos.y);
    }

    fn draw_at(&self, canvas: &mut dyn Canvas, x: f32, y: f32) {
        self.draw_sized(canvas, x, y, self.size.width as f32, self.size.height as f32);
    }

    fn draw_sized(&self, canvas: &mut dyn Canvas, x: f32, y: f32, width: f32, height: f32) {
        if self.cells.is_empty() || !self.base.visible {
            return;
        }
        let (left, top) = anchor(x, y, width, height, self.draw_from_center);
        let (pixel_width, pixel_height) = self.pixel_size_for(width, height);

        canvas.set_color(self.base.color);
        canvas.set_fill(self.filled);
        for row in 0..self.rows {
            for column in 0..self.columns {
                if self.cell(column, row) {
                    canvas.draw_rect(
                        left + column as f32 * pixel_width,
                        top + row as f32 * pixel_height,
                        pixel_width,
                        pixel_height,
                    );
                }
            }
        }
    }
}

impl Resizable for Bitmap {
    fn set_size(&mut self, width: u32, height: u32) {
        self.size = Size::new(width, height);
    }

    fn set_draw_from_center(&mut self, center: bool) {
        self.draw_from_center = center;
    }
}

impl OscNode for Bitmap {
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

impl SceneObject for Bitmap {
    object_boilerplate!(object ObjectKind::Bitmap);

    fn as_resizable_mut(&mut self) -> Option<&mut dyn Resizable> {
        Some(self)
    }
}
