use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::{
    assets::MediaHandle,
    context::Context,
    osc::{OscMessage, OscNode},
    render::Canvas,
    Result,
};

use super::{
    anchor, handle_flag, handle_point, handle_size, object_boilerplate, Drawable, LifecyclePolicy,
    ObjectBase, ObjectKind, Point, Resizable, SceneObject, Size,
};

/// Video clip. The decoded stream is released whenever its scene is left.
#[derive(Debug, Clone)]
pub struct Video {
    base: ObjectBase,
    path: PathBuf,
    media: Option<MediaHandle>,
    pub pos: Point,
    pub size: Size,
    pub draw_from_center: bool,
    playing: bool,
    volume: f32,
    speed: f32,
}

impl Video {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            base: ObjectBase::new(name),
            path: path.into(),
            media: None,
            pos: Point::default(),
            size: Size::default(),
            draw_from_center: false,
            playing: false,
            volume: 0.0,
            speed: 1.0,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_loaded(&self) -> bool {
        self.media.is_some()
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn set_playing(&mut self, playing: bool) {
        if self.playing != playing {
            debug!(video = %self.base.name, playing, "video transport");
            self.playing = playing;
        }
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, 1.0);
    }

    pub fn speed(&self) -> f32 {
        self.speed
    }

    pub fn set_speed(&mut self, speed: f32) {
        self.speed = speed;
    }
}

impl Drawable for Video {
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

impl Resizable for Video {
    fn set_size(&mut self, width: u32, height: u32) {
        self.size = Size::new(width, height);
    }

    fn set_draw_from_center(&mut self, center: bool) {
        self.draw_from_center = center;
    }
}

impl OscNode for Video {
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
            "/center" => handle_flag(&mut self.draw_from_center, message),
            "/play" => {
                if let Some(playing) = message.try_bool(0) {
                    self.set_playing(playing);
                }
                true
            }
            "/volume" => {
                if let Some(volume) = message.try_float(0) {
                    self.set_volume(volume);
                }
                true
            }
            "/speed" => {
                if let Some(speed) = message.try_float(0) {
                    self.set_speed(speed);
                }
                true
            }
            _ => false,
        }
    }
}

impl SceneObject for Video {
    object_boilerplate!(object ObjectKind::Video);

    fn policy(&self) -> LifecyclePolicy {
        LifecyclePolicy::STREAMING
    }

    fn setup(&mut self, ctx: &Context) -> Result<()> {
        let media = ctx.assets()?.video(&self.path)?;
        if self.size.width == 0 {
            self.size.width = media.width;
        }
        if self.size.height == 0 {
            self.size.height = media.height;
        }
        self.media = Some(media);
        Ok(())
    }

    fn clear(&mut self, ctx: &Context) {
        if self.media.take().is_none() {
            return;
        }
        match ctx.assets() {
            Ok(mut assets) => {
                assets.release_video(&self.path);
            }
            Err(err) => warn!(video = %self.base.name, %err, "couldn't release video"),
        }
    }

    fn as_resizable_mut(&mut self) -> Option<&mut dyn Resizable> {
        Some(self)
    }
}
