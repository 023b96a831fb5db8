use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::{
    context::Context,
    osc::OscNode,
    render::Canvas,
    Result,
};

use super::{object_boilerplate, Drawable, LifecyclePolicy, ObjectBase, ObjectKind, SceneObject};

/// Loads a script into the script runtime while its scene is active. The
/// script itself does the drawing.
#[derive(Debug, Clone)]
pub struct Script {
    base: ObjectBase,
    path: PathBuf,
    loaded: bool,
}

impl Script {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            base: ObjectBase::new(name),
            path: path.into(),
            loaded: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }
}

impl Drawable for Script {
    fn draw(&self, _canvas: &mut dyn Canvas) {}
}

impl OscNode for Script {
    object_boilerplate!(node);
}

impl SceneObject for Script {
    object_boilerplate!(object ObjectKind::Script);

    fn policy(&self) -> LifecyclePolicy {
        LifecyclePolicy::SCRIPTED
    }

    fn setup(&mut self, ctx: &Context) -> Result<()> {
        if self.loaded {
            return Ok(());
        }
        ctx.scripts()?.load_script(&self.path)?;
        // the playlist script is no longer the one running
        ctx.set_playlist(false);
        self.loaded = true;
        debug!(script = %self.path.display(), "script object loaded");
        Ok(())
    }

    fn clear(&mut self, ctx: &Context) {
        if !self.loaded {
            return;
        }
        self.loaded = false;
        match ctx.scripts() {
            Ok(mut scripts) => scripts.clear_script(),
            Err(err) => warn!(script = %self.path.display(), %err, "couldn't clear script"),
        }
    }
}
