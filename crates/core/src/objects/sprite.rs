use tracing::warn;

use crate::{
    context::Context,
    osc::{join_address, OscMessage, OscNode},
    render::Canvas,
    Result,
};

use super::{
    handle_flag, handle_point, handle_size, object_boilerplate, Animatable, Drawable, ObjectBase,
    ObjectKind, Point, Resizable, SceneObject, SetupState, Size,
};

pub const DEFAULT_FRAME_TIME_MS: u64 = 100;

/// One sprite frame: a drawable object shown for `frame_time_ms`.
#[derive(Debug)]
pub struct SpriteFrame {
    object: Box<dyn SceneObject>,
    frame_time_ms: u64,
}

impl SpriteFrame {
    pub fn new(object: Box<dyn SceneObject>) -> Self {
        Self {
            object,
            frame_time_ms: DEFAULT_FRAME_TIME_MS,
        }
    }

    pub fn with_frame_time(mut self, frame_time_ms: u64) -> Self {
        self.frame_time_ms = frame_time_ms;
        self
    }

    pub fn name(&self) -> &str {
        self.object.name()
    }

    pub fn frame_time_ms(&self) -> u64 {
        self.frame_time_ms
    }

    pub fn object(&self) -> &dyn SceneObject {
        self.object.as_ref()
    }

    pub fn object_mut(&mut self) -> &mut dyn SceneObject {
        self.object.as_mut()
    }

    fn resize(&mut self, size: Size) {
        if size.is_zero() {
            return;
        }
        if let Some(resizable) = self.object.as_resizable_mut() {
            resizable.set_size(size.width, size.height);
        }
    }

    fn set_draw_from_center(&mut self, center: bool) {
        if let Some(resizable) = self.object.as_resizable_mut() {
            resizable.set_draw_from_center(center);
        }
    }
}

/// Flip book of frames, animated over time or stepped by messages.
#[derive(Debug)]
pub struct Sprite {
    base: ObjectBase,
    frames: Vec<SpriteFrame>,
    pub pos: Point,
    /// Applied to every frame when non-zero.
    size: Size,
    pub animate: bool,
    pub looping: bool,
    pub ping_pong: bool,
    /// Draw every frame stacked instead of the current one.
    pub overlay: bool,
    draw_from_center: bool,
    current: usize,
    forward: bool,
    last_change_ms: Option<u64>,
}

impl Sprite {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            base: ObjectBase::new(name),
            frames: Vec::new(),
            pos: Point::default(),
            size: Size::default(),
            animate: true,
            looping: true,
            ping_pong: true,
            overlay: false,
            draw_from_center: false,
            current: 0,
            forward: true,
            last_change_ms: None,
        }
    }

    pub fn add_frame(&mut self, mut frame: SpriteFrame) {
        let address = join_address(&self.base.address, frame.name());
        frame.object.set_osc_address(address);
        frame.resize(self.size);
        frame.set_draw_from_center(self.draw_from_center);
        self.frames.push(frame);
    }

    pub fn remove_frame(&mut self, name: &str) -> Option<SpriteFrame> {
        let index = self.frames.iter().position(|frame| frame.name() == name)?;
        let frame = self.frames.remove(index);
        if self.current >= self.frames.len() {
            self.current = 0;
        }
        Some(frame)
    }

    pub fn clear_frames(&mut self) {
        self.frames.clear();
        self.current = 0;
        self.forward = true;
    }

    pub fn frames(&self) -> &[SpriteFrame] {
        &self.frames
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    pub fn current_frame(&self) -> usize {
        self.current
    }

    pub fn size(&self) -> Size {
        self.size
    }

    pub fn next_frame(&mut self) {
        let count = self.frames.len();
        if count < 2 {
            return;
        }
        if self.current + 1 < count {
            self.current += 1;
        } else if self.ping_pong {
            self.forward = false;
            self.current = count - 2;
        } else if self.looping {
            self.current = 0;
        }
    }

    pub fn prev_frame(&mut self) {
        let count = self.frames.len();
        if count < 2 {
            return;
        }
        if self.current > 0 {
            self.current -= 1;
        } else if self.ping_pong {
            self.forward = true;
            self.current = 1;
        } else if self.looping {
            self.current = count - 1;
        }
    }

    pub fn goto_frame(&mut self, index: usize) {
        if index >= self.frames.len() {
            warn!(sprite = %self.base.name, index, "cannot goto frame, index out of range");
            return;
        }
        self.current = index;
    }

    pub fn goto_frame_named(&mut self, name: &str) {
        if let Some(index) = self.frames.iter().position(|frame| frame.name() == name) {
            self.current = index;
        }
    }

    fn apply_size(&mut self) {
        let size = self.size;
        for frame in &mut self.frames {
            frame.resize(size);
        }
    }
}

impl Animatable for Sprite {
    fn animate(&mut self, now_ms: u64) {
        if !self.animate || self.frames.is_empty() {
            return;
        }
        let Some(last_change_ms) = self.last_change_ms else {
            self.last_change_ms = Some(now_ms);
            return;
        };
        let frame_time_ms = self.frames[self.current].frame_time_ms;
        if now_ms.saturating_sub(last_change_ms) > frame_time_ms {
            if self.forward {
                self.next_frame();
            } else {
                self.prev_frame();
            }
            self.last_change_ms = Some(now_ms);
        }
    }
}

impl Drawable for Sprite {
    fn draw(&self, canvas: &mut dyn Canvas) {
        self.draw_at(canvas, self.pos.x, self.pos.y);
    }

    fn draw_at(&self, canvas: &mut dyn Canvas, x: f32, y: f32) {
        if !self.base.visible {
            return;
        }
        if self.overlay {
            for frame in &self.frames {
                if frame.object.is_ready() {
                    frame.object.draw_at(canvas, x, y);
                }
            }
        } else if let Some(frame) = self.frames.get(self.current) {
            if frame.object.is_ready() {
                frame.object.draw_at(canvas, x, y);
            }
        }
    }
}

impl Resizable for Sprite {
    fn set_size(&mut self, width: u32, height: u32) {
        self.size = Size::new(width, height);
        self.apply_size();
    }

    fn set_draw_from_center(&mut self, center: bool) {
        self.draw_from_center = center;
        for frame in &mut self.frames {
            frame.set_draw_from_center(center);
        }
    }
}

impl OscNode for Sprite {
    fn osc_address(&self) -> &str {
        &self.base.address
    }

    fn set_osc_address(&mut self, address: String) {
        for frame in &mut self.frames {
            let frame_address = join_address(&address, frame.name());
            frame.object.set_osc_address(frame_address);
        }
        self.base.address = address;
    }

    fn handle_osc(&mut self, message: &OscMessage) -> bool {
        let Some(property) = self.base.property(message) else {
            return false;
        };
        if self.base.handle_common(property, message)
            || handle_point(&mut self.pos, "/position", property, message)
        {
            return true;
        }
        if handle_size(&mut self.size, property, message) {
            self.apply_size();
            return true;
        }
        match property {
            "/frame" => {
                if let Some(index) = message.try_uint(0) {
                    self.goto_frame(index as usize);
                }
                true
            }
            "/center" => {
                if let Some(center) = message.try_bool(0) {
                    self.set_draw_from_center(center);
                }
                true
            }
            "/animate" => handle_flag(&mut self.animate, message),
            "/overlay" => handle_flag(&mut self.overlay, message),
            "/loop" => handle_flag(&mut self.looping, message),
            "/pingpong" => handle_flag(&mut self.ping_pong, message),
            _ => false,
        }
    }
}

impl SceneObject for Sprite {
    object_boilerplate!(object ObjectKind::Sprite);

    /// Sets up every frame; a failing frame is skipped when drawing but does
    /// not fail the sprite.
    fn setup(&mut self, ctx: &Context) -> Result<()> {
        let size = self.size;
        for frame in &mut self.frames {
            match frame.object.setup(ctx) {
                Ok(()) => frame.object.base_mut().state = SetupState::Ready,
                Err(err) => {
                    warn!(sprite = %self.base.name, frame = frame.name(), %err, "couldn't set up sprite frame");
                    frame.object.base_mut().state = SetupState::Failed;
                }
            }
            frame.resize(size);
        }
        Ok(())
    }

    fn clear(&mut self, ctx: &Context) {
        for frame in &mut self.frames {
            frame.object.clear(ctx);
            frame.object.base_mut().state = SetupState::Pending;
        }
    }

    fn update(&mut self, now_ms: u64) {
        self.animate(now_ms);
    }

    fn as_resizable_mut(&mut self) -> Option<&mut dyn Resizable> {
        Some(self)
    }
}
