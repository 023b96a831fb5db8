//! Drawable scene objects.
//!
//! Every object is an [`OscNode`] living at `<scene address>/<name>` and
//! implements [`SceneObject`]. Optional capabilities ([`Resizable`],
//! [`Animatable`]) are separate traits so scenes and sprites only depend on
//! what they actually use.

mod bitmap;
mod image;
mod line;
mod pixel;
mod rectangle;
mod script;
mod sprite;
mod text;
mod video;

use std::{any::Any, fmt};

use serde::{Deserialize, Serialize};

use crate::{
    context::Context,
    osc::{join_address, OscMessage, OscNode},
    render::{Canvas, Color},
    Result,
};

pub use bitmap::Bitmap;
pub use image::Image;
pub use line::Line;
pub use pixel::Pixel;
pub use rectangle::Rectangle;
pub use script::Script;
pub use sprite::{Sprite, SpriteFrame, DEFAULT_FRAME_TIME_MS};
pub use text::{Text, DEFAULT_FONT_SIZE};
pub use video::Video;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectKind {
    Pixel,
    Line,
    Rectangle,
    Bitmap,
    Image,
    Sprite,
    Text,
    Video,
    Script,
}

impl ObjectKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectKind::Pixel => "pixel",
            ObjectKind::Line => "line",
            ObjectKind::Rectangle => "rectangle",
            ObjectKind::Bitmap => "bitmap",
            ObjectKind::Image => "image",
            ObjectKind::Sprite => "sprite",
            ObjectKind::Text => "text",
            ObjectKind::Video => "video",
            ObjectKind::Script => "script",
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How an object takes part in its scene's setup/exit lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LifecyclePolicy {
    /// May be set up before the scene becomes active.
    pub allows_early_setup: bool,
    /// Set up again on every activation, even when already set up.
    pub always_setup: bool,
    /// Release resources whenever the scene becomes inactive.
    pub clear_on_exit: bool,
}

impl LifecyclePolicy {
    /// Plain shapes and cached media.
    pub const STATIC: Self = Self {
        allows_early_setup: true,
        always_setup: false,
        clear_on_exit: false,
    };

    /// Heavy decoded sources that must not pile up in memory.
    pub const STREAMING: Self = Self {
        allows_early_setup: true,
        always_setup: true,
        clear_on_exit: true,
    };

    /// Script sources, reloaded on every entry and never pre-warmed.
    pub const SCRIPTED: Self = Self {
        allows_early_setup: false,
        always_setup: true,
        clear_on_exit: true,
    };
}

impl Default for LifecyclePolicy {
    fn default() -> Self {
        Self::STATIC
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SetupState {
    #[default]
    Pending,
    Ready,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_zero(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// State shared by every object kind.
#[derive(Debug, Clone)]
pub struct ObjectBase {
    pub name: String,
    pub address: String,
    pub color: Color,
    pub visible: bool,
    pub state: SetupState,
}

impl ObjectBase {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            address: join_address("", &name),
            name,
            color: Color::WHITE,
            visible: true,
            state: SetupState::Pending,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.state == SetupState::Ready
    }

    /// Returns the part of the message address after this object's address,
    /// e.g. `/position` for `/visual/intro/title/position`.
    pub fn property<'m>(&self, message: &'m OscMessage) -> Option<&'m str> {
        let rest = message.address().strip_prefix(self.address.as_str())?;
        rest.starts_with('/').then_some(rest)
    }

    /// Handles the color and visibility messages every object understands.
    pub fn handle_common(&mut self, property: &str, message: &OscMessage) -> bool {
        match property {
            "/color" => {
                if message.len() > 2 {
                    set_channel(&mut self.color.r, message, 0);
                    set_channel(&mut self.color.g, message, 1);
                    set_channel(&mut self.color.b, message, 2);
                    if message.len() > 3 {
                        set_channel(&mut self.color.a, message, 3);
                    }
                }
                true
            }
            "/color/R" => set_channel(&mut self.color.r, message, 0),
            "/color/G" => set_channel(&mut self.color.g, message, 0),
            "/color/B" => set_channel(&mut self.color.b, message, 0),
            "/color/A" => set_channel(&mut self.color.a, message, 0),
            "/visible" => {
                if let Some(visible) = message.try_bool(0) {
                    self.visible = visible;
                }
                true
            }
            _ => false,
        }
    }
}

fn set_channel(channel: &mut u8, message: &OscMessage, index: usize) -> bool {
    if let Some(value) = message.try_int(index) {
        *channel = value.clamp(0, 255) as u8;
    }
    true
}

/// Applies `<prefix>`, `<prefix>/x` and `<prefix>/y` messages to `point`.
pub(crate) fn handle_point(point: &mut Point, prefix: &str, property: &str, message: &OscMessage) -> bool {
    let Some(rest) = property.strip_prefix(prefix) else {
        return false;
    };
    match rest {
        "" => {
            if let Some(x) = message.try_float(0) {
                point.x = x;
            }
            if let Some(y) = message.try_float(1) {
                point.y = y;
            }
            true
        }
        "/x" => {
            if let Some(x) = message.try_float(0) {
                point.x = x;
            }
            true
        }
        "/y" => {
            if let Some(y) = message.try_float(0) {
                point.y = y;
            }
            true
        }
        _ => false,
    }
}

/// Applies `/size`, `/size/width` and `/size/height` messages to `size`.
pub(crate) fn handle_size(size: &mut Size, property: &str, message: &OscMessage) -> bool {
    match property {
        "/size" => {
            if let Some(width) = message.try_uint(0) {
                size.width = width;
            }
            if let Some(height) = message.try_uint(1) {
                size.height = height;
            }
            true
        }
        "/size/width" => {
            if let Some(width) = message.try_uint(0) {
                size.width = width;
            }
            true
        }
        "/size/height" => {
            if let Some(height) = message.try_uint(0) {
                size.height = height;
            }
            true
        }
        _ => false,
    }
}

/// Applies a boolean message to `flag`; the message is claimed either way.
pub(crate) fn handle_flag(flag: &mut bool, message: &OscMessage) -> bool {
    if let Some(value) = message.try_bool(0) {
        *flag = value;
    }
    true
}

/// Top-left corner for something drawn at `pos`, optionally centered.
pub(crate) fn anchor(x: f32, y: f32, width: f32, height: f32, center: bool) -> (f32, f32) {
    if center {
        (x - width / 2.0, y - height / 2.0)
    } else {
        (x, y)
    }
}

/// Pure rendering; drawing never mutates addressable state.
pub trait Drawable {
    fn draw(&self, canvas: &mut dyn Canvas);

    fn draw_at(&self, canvas: &mut dyn Canvas, _x: f32, _y: f32) {
        self.draw(canvas);
    }

    fn draw_sized(&self, canvas: &mut dyn Canvas, x: f32, y: f32, _width: f32, _height: f32) {
        self.draw_at(canvas, x, y);
    }
}

pub trait Resizable {
    fn set_size(&mut self, width: u32, height: u32);

    fn set_draw_from_center(&mut self, center: bool);
}

/// Objects whose content changes over time on their own.
pub trait Animatable {
    fn animate(&mut self, now_ms: u64);
}

/// One drawable entry in a scene.
pub trait SceneObject: OscNode + Drawable + Send {
    fn base(&self) -> &ObjectBase;

    fn base_mut(&mut self) -> &mut ObjectBase;

    fn kind(&self) -> ObjectKind;

    fn name(&self) -> &str {
        &self.base().name
    }

    fn policy(&self) -> LifecyclePolicy {
        LifecyclePolicy::STATIC
    }

    /// Acquires resources. Must be safe to call repeatedly.
    fn setup(&mut self, _ctx: &Context) -> Result<()> {
        Ok(())
    }

    /// Releases heavy resources; the object keeps its address and settings.
    fn clear(&mut self, _ctx: &Context) {}

    fn update(&mut self, _now_ms: u64) {}

    fn as_resizable_mut(&mut self) -> Option<&mut dyn Resizable> {
        None
    }

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<'a> dyn SceneObject + 'a {
    pub fn downcast_ref<T: SceneObject + 'static>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }

    pub fn downcast_mut<T: SceneObject + 'static>(&mut self) -> Option<&mut T> {
        self.as_any_mut().downcast_mut::<T>()
    }

    pub fn is_ready(&self) -> bool {
        self.base().is_ready()
    }
}

impl<'a> fmt::Debug for dyn SceneObject + 'a {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SceneObject")
            .field("kind", &self.kind())
            .field("name", &self.name())
            .field("address", &self.osc_address())
            .field("state", &self.base().state)
            .finish()
    }
}

/// Implements the boilerplate parts of [`OscNode`] and [`SceneObject`] for a
/// type with a `base: ObjectBase` field.
macro_rules! object_boilerplate {
    (node) => {
        fn osc_address(&self) -> &str {
            &self.base.address
        }

        fn set_osc_address(&mut self, address: String) {
            self.base.address = address;
        }
    };
    (object $kind:expr) => {
        fn base(&self) -> &$crate::objects::ObjectBase {
            &self.base
        }

        fn base_mut(&mut self) -> &mut $crate::objects::ObjectBase {
            &mut self.base
        }

        fn kind(&self) -> $crate::objects::ObjectKind {
            $kind
        }

        fn as_any(&self) -> &dyn std::any::Any {
            self
        }

        fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
            self
        }
    };
}
pub(crate) use object_boilerplate;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn property_is_only_reported_below_the_object_address() {
        let mut base = ObjectBase::new("title");
        base.address = "/visual/intro/title".to_string();

        let message = OscMessage::new("/visual/intro/title/position");
        assert_eq!(base.property(&message), Some("/position"));

        let sibling = OscMessage::new("/visual/intro/titlebar/position");
        assert_eq!(base.property(&sibling), None);

        let exact = OscMessage::new("/visual/intro/title");
        assert_eq!(base.property(&exact), None);
    }

    #[test]
    fn color_messages_update_channels() {
        let mut base = ObjectBase::new("a");
        let message = OscMessage::new("/a/color").with_args([10, 20, 300, 40]);
        assert!(base.handle_common("/color", &message));
        assert_eq!(base.color, Color::rgba(10, 20, 255, 40));

        let message = OscMessage::new("/a/color/G").with_arg(99.9_f32);
        assert!(base.handle_common("/color/G", &message));
        assert_eq!(base.color.g, 99);
    }

    #[test]
    fn too_few_color_args_are_claimed_but_ignored() {
        let mut base = ObjectBase::new("a");
        let message = OscMessage::new("/a/color").with_args([1, 2]);
        assert!(base.handle_common("/color", &message));
        assert_eq!(base.color, Color::WHITE);
    }

    #[test]
    fn visibility_accepts_ints_and_floats() {
        let mut base = ObjectBase::new("a");
        base.handle_common("/visible", &OscMessage::new("/a/visible").with_arg(0));
        assert!(!base.visible);
        base.handle_common("/visible", &OscMessage::new("/a/visible").with_arg(1.0_f32));
        assert!(base.visible);
    }

    #[test]
    fn point_and_size_helpers() {
        let mut point = Point::default();
        let message = OscMessage::new("").with_args([10.0_f32, 20.0]);
        assert!(handle_point(&mut point, "/position", "/position", &message));
        assert_eq!(point, Point::new(10.0, 20.0));

        let message = OscMessage::new("").with_arg(5);
        assert!(handle_point(&mut point, "/position", "/position/y", &message));
        assert_eq!(point, Point::new(10.0, 5.0));
        assert!(!handle_point(&mut point, "/position", "/position1", &message));

        let mut size = Size::new(1, 1);
        assert!(handle_size(&mut size, "/size/height", &message));
        assert_eq!(size, Size::new(1, 5));
        assert!(!handle_size(&mut size, "/sizes", &message));
    }
}
