use std::fmt;

use crossbeam_channel::{Receiver, Sender};
use tracing::warn;

use crate::{objects::SceneObject, scene::Scene, Result, VisualError};

pub type SceneEdit = Box<dyn FnOnce(&mut Scene) + Send>;
pub type ObjectEdit = Box<dyn FnOnce(&mut dyn SceneObject) + Send>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SceneTarget {
    Index(usize),
    Name(String),
}

/// Structural change requested by a script, applied by the engine at the
/// start of the next tick.
pub enum ScriptCommand {
    AddScene(Scene),
    RemoveScene(String),
    RenameScene { from: String, to: String },
    AddObject { scene: String, object: Box<dyn SceneObject> },
    RemoveObject { scene: String, name: String },
    ClearObjects { scene: String },
    EditScene { scene: String, edit: SceneEdit },
    EditObject { scene: String, object: String, edit: ObjectEdit },
    GotoScene(SceneTarget),
    NextScene,
    PrevScene,
    /// Marks the running script as the playlist that owns the scene list.
    SetPlaylist(bool),
    SetFrameRate(u32),
}

impl fmt::Debug for ScriptCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScriptCommand::AddScene(scene) => f.debug_tuple("AddScene").field(&scene.name()).finish(),
            ScriptCommand::RemoveScene(name) => f.debug_tuple("RemoveScene").field(name).finish(),
            ScriptCommand::RenameScene { from, to } => f
                .debug_struct("RenameScene")
                .field("from", from)
                .field("to", to)
                .finish(),
            ScriptCommand::AddObject { scene, object } => f
                .debug_struct("AddObject")
                .field("scene", scene)
                .field("object", &object.name())
                .finish(),
            ScriptCommand::RemoveObject { scene, name } => f
                .debug_struct("RemoveObject")
                .field("scene", scene)
                .field("name", name)
                .finish(),
            ScriptCommand::ClearObjects { scene } => {
                f.debug_struct("ClearObjects").field("scene", scene).finish()
            }
            ScriptCommand::EditScene { scene, .. } => {
                f.debug_struct("EditScene").field("scene", scene).finish()
            }
            ScriptCommand::EditObject { scene, object, .. } => f
                .debug_struct("EditObject")
                .field("scene", scene)
                .field("object", object)
                .finish(),
            ScriptCommand::GotoScene(target) => f.debug_tuple("GotoScene").field(target).finish(),
            ScriptCommand::NextScene => f.write_str("NextScene"),
            ScriptCommand::PrevScene => f.write_str("PrevScene"),
            ScriptCommand::SetPlaylist(playlist) => {
                f.debug_tuple("SetPlaylist").field(playlist).finish()
            }
            ScriptCommand::SetFrameRate(fps) => f.debug_tuple("SetFrameRate").field(fps).finish(),
        }
    }
}

/// Creates the queue between a script runtime and the engine.
pub fn script_channel() -> (ScriptHandle, Receiver<ScriptCommand>) {
    let (tx, rx) = crossbeam_channel::unbounded();
    (ScriptHandle { tx }, rx)
}

/// Cloneable sending side handed to the script runtime. Objects are addressed
/// by `(scene, object)` name pairs; the handle never holds on to tree nodes.
#[derive(Clone)]
pub struct ScriptHandle {
    tx: Sender<ScriptCommand>,
}

impl ScriptHandle {
    pub fn send(&self, command: ScriptCommand) -> Result<()> {
        self.tx
            .send(command)
            .map_err(|_| VisualError::msg("script command queue has been closed"))
    }

    pub fn add_scene(&self, scene: Scene) -> Result<()> {
        self.send(ScriptCommand::AddScene(scene))
    }

    pub fn remove_scene(&self, name: impl Into<String>) -> Result<()> {
        self.send(ScriptCommand::RemoveScene(name.into()))
    }

    pub fn rename_scene(&self, from: impl Into<String>, to: impl Into<String>) -> Result<()> {
        self.send(ScriptCommand::RenameScene {
            from: from.into(),
            to: to.into(),
        })
    }

    pub fn add_object(&self, scene: impl Into<String>, object: Box<dyn SceneObject>) -> Result<()> {
        self.send(ScriptCommand::AddObject {
            scene: scene.into(),
            object,
        })
    }

    pub fn remove_object(&self, scene: impl Into<String>, name: impl Into<String>) -> Result<()> {
        self.send(ScriptCommand::RemoveObject {
            scene: scene.into(),
            name: name.into(),
        })
    }

    pub fn clear_objects(&self, scene: impl Into<String>) -> Result<()> {
        self.send(ScriptCommand::ClearObjects {
            scene: scene.into(),
        })
    }

    pub fn edit_scene<F>(&self, scene: impl Into<String>, edit: F) -> Result<()>
    where
        F: FnOnce(&mut Scene) + Send + 'static,
    {
        self.send(ScriptCommand::EditScene {
            scene: scene.into(),
            edit: Box::new(edit),
        })
    }

    pub fn edit_object<F>(
        &self,
        scene: impl Into<String>,
        object: impl Into<String>,
        edit: F,
    ) -> Result<()>
    where
        F: FnOnce(&mut dyn SceneObject) + Send + 'static,
    {
        self.send(ScriptCommand::EditObject {
            scene: scene.into(),
            object: object.into(),
            edit: Box::new(edit),
        })
    }

    /// Like [`ScriptHandle::edit_object`] but only runs `edit` when the object
    /// has the expected concrete type.
    pub fn edit_object_as<T, F>(
        &self,
        scene: impl Into<String>,
        object: impl Into<String>,
        edit: F,
    ) -> Result<()>
    where
        T: SceneObject + 'static,
        F: FnOnce(&mut T) + Send + 'static,
    {
        self.edit_object(scene, object, move |object| {
            let (name, kind) = (object.name().to_string(), object.kind());
            match object.downcast_mut::<T>() {
                Some(object) => edit(object),
                None => warn!(object = %name, %kind, "script edit skipped, unexpected object kind"),
            }
        })
    }

    pub fn goto_scene(&self, index: usize) -> Result<()> {
        self.send(ScriptCommand::GotoScene(SceneTarget::Index(index)))
    }

    pub fn goto_scene_named(&self, name: impl Into<String>) -> Result<()> {
        self.send(ScriptCommand::GotoScene(SceneTarget::Name(name.into())))
    }

    pub fn next_scene(&self) -> Result<()> {
        self.send(ScriptCommand::NextScene)
    }

    pub fn prev_scene(&self) -> Result<()> {
        self.send(ScriptCommand::PrevScene)
    }

    pub fn set_playlist(&self, playlist: bool) -> Result<()> {
        self.send(ScriptCommand::SetPlaylist(playlist))
    }

    pub fn set_frame_rate(&self, fps: u32) -> Result<()> {
        self.send(ScriptCommand::SetFrameRate(fps))
    }
}

impl fmt::Debug for ScriptHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptHandle")
            .field("queued", &self.tx.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::objects::Rectangle;

    #[test]
    fn commands_arrive_in_order() {
        let (handle, rx) = script_channel();
        handle.add_scene(Scene::new("intro")).unwrap();
        handle
            .add_object("intro", Box::new(Rectangle::new("box")))
            .unwrap();
        handle.goto_scene_named("intro").unwrap();

        let commands: Vec<_> = rx.try_iter().collect();
        assert_eq!(commands.len(), 3);
        assert!(matches!(&commands[0], ScriptCommand::AddScene(scene) if scene.name() == "intro"));
        assert!(matches!(&commands[1], ScriptCommand::AddObject { scene, .. } if scene == "intro"));
        assert!(matches!(
            &commands[2],
            ScriptCommand::GotoScene(SceneTarget::Name(name)) if name == "intro"
        ));
    }

    #[test]
    fn typed_edits_only_touch_matching_objects() {
        let (handle, rx) = script_channel();
        handle
            .edit_object_as::<Rectangle, _>("intro", "box", |rect| rect.filled = false)
            .unwrap();

        let Some(ScriptCommand::EditObject { edit, .. }) = rx.try_iter().next() else {
            panic!("expected an edit command");
        };

        let mut rect: Box<dyn SceneObject> = Box::new(Rectangle::new("box"));
        edit(rect.as_mut());
        assert!(!rect.downcast_ref::<Rectangle>().unwrap().filled);
    }

    #[test]
    fn sending_after_the_engine_is_gone_fails() {
        let (handle, rx) = script_channel();
        drop(rx);
        assert!(handle.next_scene().is_err());
    }
}
