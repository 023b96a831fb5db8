//! Process root of the node tree.
//!
//! The [`Engine`] owns the scene manager, answers process level addresses
//! (`/scene`, `/reload`, `/quit`, ...) and hands every message nobody claimed
//! to the script bridge. Structural changes requested by scripts are queued
//! and applied at the start of [`Engine::update`].

use std::{
    fmt,
    path::{Path, PathBuf},
    sync::Arc,
};

use crossbeam_channel::Receiver;
use tracing::{debug, info, trace, warn};

use crate::{
    context::Context,
    net::IgnoreSwitch,
    osc::{OscArg, OscMessage, OscNode},
    render::Canvas,
    scene::SceneManager,
    script::{script_channel, SceneTarget, ScriptCommand, ScriptHandle},
    Result,
};

pub struct Engine {
    ctx: Arc<Context>,
    address: String,
    scenes: SceneManager,
    commands: Receiver<ScriptCommand>,
    handle: ScriptHandle,
    script: Option<PathBuf>,
    playlist: Option<PathBuf>,
    running: bool,
    ingress: Option<IgnoreSwitch>,
    quit: bool,
    setup_pending: bool,
}

impl Engine {
    pub fn new(ctx: Arc<Context>) -> Self {
        let (handle, commands) = script_channel();
        Self {
            address: ctx.config().base_address.clone(),
            scenes: SceneManager::new(Arc::clone(&ctx)),
            commands,
            handle,
            script: None,
            playlist: None,
            running: true,
            ingress: None,
            quit: false,
            setup_pending: false,
            ctx,
        }
    }

    pub fn context(&self) -> &Arc<Context> {
        &self.ctx
    }

    /// Sending side for the script runtime.
    pub fn script_handle(&self) -> ScriptHandle {
        self.handle.clone()
    }

    pub fn scenes(&self) -> &SceneManager {
        &self.scenes
    }

    pub fn scenes_mut(&mut self) -> &mut SceneManager {
        &mut self.scenes
    }

    pub fn current_script(&self) -> Option<&Path> {
        self.script.as_deref()
    }

    /// Loads the configured script, applies whatever it queued and prepares
    /// the scene list.
    pub fn setup(&mut self) {
        if let Some(script) = self.ctx.config().script.clone() {
            if let Err(err) = self.load_script(&script) {
                warn!(script = %script.display(), %err, "couldn't load script");
            }
        }
        self.apply_commands();
        self.setup_pending = false;
        self.scenes.setup(self.ctx.config().setup_all_scenes);
    }

    pub fn load_script(&mut self, path: &Path) -> Result<()> {
        info!(script = %path.display(), "loading script");
        self.script = Some(path.to_path_buf());
        self.ctx.set_playlist(false);
        self.ctx.scripts()?.load_script(path)
    }

    /// Reloads the current script. A playlist rebuilds the scene list from
    /// scratch, keeping the active position.
    pub fn reload_script(&mut self) -> Result<()> {
        let Some(script) = &self.script else {
            debug!("no script to reload");
            return Ok(());
        };
        info!(script = %script.display(), "reloading script");
        if self.ctx.playlist() {
            self.scenes.clear(true);
            self.ctx.assets()?.clear();
            self.ctx.scripts()?.reload_script()?;
            self.playlist = self.script.clone();
            self.setup_pending = true;
        } else {
            self.ctx.scripts()?.reload_script()?;
        }
        Ok(())
    }

    /// Unloads the current script, falling back to the playlist path.
    pub fn unload_script(&mut self) -> Result<()> {
        let Some(script) = self.script.take() else {
            return Ok(());
        };
        info!(script = %script.display(), "unloading script");
        self.ctx.scripts()?.unload_script();
        if self.ctx.playlist() {
            self.scenes.clear(false);
            self.ctx.assets()?.clear();
        }
        self.script = self.playlist.clone();
        Ok(())
    }

    fn open_file(&mut self, path: &str) {
        let result = self
            .unload_script()
            .and_then(|()| self.load_script(Path::new(path)));
        if let Err(err) = result {
            warn!(script = path, %err, "couldn't open script");
        }
    }

    /// Drains the script command queue.
    pub fn apply_commands(&mut self) {
        while let Ok(command) = self.commands.try_recv() {
            trace!(?command, "applying script command");
            self.apply(command);
        }
    }

    fn apply(&mut self, command: ScriptCommand) {
        match command {
            ScriptCommand::AddScene(scene) => {
                if let Err(err) = self.scenes.add_scene(scene) {
                    warn!(%err, "script couldn't add scene");
                }
            }
            ScriptCommand::RemoveScene(name) => {
                if self.scenes.remove_scene(&name).is_none() {
                    debug!(scene = %name, "script removed unknown scene");
                }
            }
            ScriptCommand::RenameScene { from, to } => {
                if let Err(err) = self.scenes.rename_scene(&from, &to) {
                    warn!(%err, "script couldn't rename scene");
                }
            }
            ScriptCommand::AddObject { scene, object } => match self.scenes.scene_mut(&scene) {
                Some(target) => {
                    if let Err(err) = target.add_object(object) {
                        warn!(scene = %scene, %err, "script couldn't add object");
                    }
                }
                None => warn!(scene = %scene, object = object.name(), "object added to unknown scene"),
            },
            ScriptCommand::RemoveObject { scene, name } => {
                let removed = self
                    .scenes
                    .scene_mut(&scene)
                    .map(|target| target.remove_object(&name))
                    .unwrap_or(false);
                if !removed {
                    debug!(scene = %scene, object = %name, "script removed unknown object");
                }
            }
            ScriptCommand::ClearObjects { scene } => {
                let ctx = Arc::clone(&self.ctx);
                if let Some(target) = self.scenes.scene_mut(&scene) {
                    target.clear_objects(&ctx);
                }
            }
            ScriptCommand::EditScene { scene, edit } => match self.scenes.scene_mut(&scene) {
                Some(target) => edit(target),
                None => debug!(scene = %scene, "edit for unknown scene dropped"),
            },
            ScriptCommand::EditObject { scene, object, edit } => {
                match self
                    .scenes
                    .scene_mut(&scene)
                    .and_then(|target| target.object_mut(&object))
                {
                    Some(target) => edit(target),
                    None => debug!(scene = %scene, object = %object, "edit for unknown object dropped"),
                }
            }
            ScriptCommand::GotoScene(SceneTarget::Index(index)) => {
                self.scenes.goto_scene(index);
            }
            ScriptCommand::GotoScene(SceneTarget::Name(name)) => {
                self.scenes.goto_scene_named(&name);
            }
            ScriptCommand::NextScene => {
                self.scenes.next_scene();
            }
            ScriptCommand::PrevScene => {
                self.scenes.prev_scene();
            }
            ScriptCommand::SetPlaylist(playlist) => {
                self.ctx.set_playlist(playlist);
                if playlist {
                    self.playlist = self.script.clone();
                    self.scenes.show_scene_name(self.ctx.config().show_scene_names);
                    self.setup_pending = true;
                }
            }
            ScriptCommand::SetFrameRate(fps) => self.scenes.set_frame_rate(fps),
        }
    }

    /// One tick: queued script commands, deferred scene setup, then the
    /// active scene and the script (unless paused).
    pub fn update(&mut self) {
        self.apply_commands();
        if self.setup_pending {
            self.setup_pending = false;
            self.scenes.setup(self.ctx.config().setup_all_scenes);
        }
        if !self.running {
            return;
        }
        self.scenes.update();
        match self.ctx.scripts() {
            Ok(mut scripts) => scripts.update(),
            Err(err) => warn!(%err, "script update skipped"),
        }
    }

    pub fn draw(&mut self, canvas: &mut dyn Canvas) {
        self.scenes.draw(canvas);
        match self.ctx.scripts() {
            Ok(mut scripts) => scripts.draw(canvas),
            Err(err) => warn!(%err, "script draw skipped"),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Ties the pause state to a receiver: inbound messages are dropped
    /// while paused.
    pub fn attach_ingress(&mut self, switch: IgnoreSwitch) {
        switch.set(!self.running);
        self.ingress = Some(switch);
    }

    /// Pauses or resumes updates and inbound messages; drawing continues.
    pub fn set_running(&mut self, running: bool) {
        debug!(running, "engine running state");
        self.running = running;
        if let Some(switch) = &self.ingress {
            switch.set(!running);
        }
    }

    pub fn toggle_running(&mut self) {
        self.set_running(!self.running);
    }

    pub fn quit_requested(&self) -> bool {
        self.quit
    }

    pub fn request_quit(&mut self) {
        self.quit = true;
    }

    /// Releases every scene and the running script.
    pub fn shutdown(&mut self) {
        self.scenes.exit(true);
        self.scenes.clear(false);
        match self.ctx.scripts() {
            Ok(mut scripts) => scripts.unload_script(),
            Err(err) => warn!(%err, "couldn't unload script"),
        }
        info!("exiting ...");
    }

    fn local_address(&self, suffix: &str) -> String {
        format!("{}{suffix}", self.address)
    }

    /// Process level controls. Returns false for anything else.
    fn handle_control(&mut self, message: &OscMessage) -> bool {
        let address = message.address();
        if address == self.local_address("/scene") {
            return match message.arg(0) {
                Some(OscArg::Str(name)) => {
                    self.scenes.goto_scene_named(name);
                    true
                }
                Some(OscArg::Int(index)) => {
                    match usize::try_from(*index) {
                        Ok(index) => {
                            self.scenes.goto_scene(index);
                        }
                        Err(_) => warn!(index, "cannot goto scene, negative index"),
                    }
                    true
                }
                _ => false,
            };
        }
        if address == self.local_address("/scene/prev") {
            if !message.is_button_off() {
                self.scenes.prev_scene();
            }
            return true;
        }
        if address == self.local_address("/scene/next") {
            if !message.is_button_off() {
                self.scenes.next_scene();
            }
            return true;
        }
        if address == self.local_address("/file") {
            if let Some(path) = message.try_string(0) {
                self.open_file(path);
                return true;
            }
            return false;
        }
        if address == self.local_address("/reload") {
            if let Err(err) = self.reload_script() {
                warn!(%err, "couldn't reload script");
            }
            return true;
        }
        if address == self.local_address("/framerate") {
            if let Some(fps) = message.try_uint(0) {
                self.scenes.set_frame_rate(fps);
            }
            return true;
        }
        if address == self.local_address("/quit") {
            info!("quit requested");
            self.quit = true;
            return true;
        }
        false
    }
}

impl OscNode for Engine {
    fn osc_address(&self) -> &str {
        &self.address
    }

    fn set_osc_address(&mut self, address: String) {
        self.scenes.set_osc_address(address.clone());
        self.address = address;
    }

    fn dispatch_children(&mut self, message: &OscMessage) -> bool {
        self.scenes.process_osc(message)
    }

    /// Claims every message: controls are handled here, everything else goes
    /// to the script.
    fn handle_osc(&mut self, message: &OscMessage) -> bool {
        if self.handle_control(message) {
            return true;
        }
        trace!(address = message.address(), "forwarding to script");
        match self.ctx.scripts() {
            Ok(mut scripts) => scripts.osc_received(message),
            Err(err) => warn!(%err, "message dropped"),
        }
        true
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("address", &self.address)
            .field("scenes", &self.scenes)
            .field("script", &self.script)
            .field("running", &self.running)
            .field("quit", &self.quit)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::VisualConfig,
        objects::{Rectangle, Text},
        render::RecordingCanvas,
        scene::Scene,
        script::{RecordingBridge, ScriptEvent},
        timeline::ManualClock,
    };

    struct Fixture {
        clock: ManualClock,
        bridge: RecordingBridge,
        engine: Engine,
    }

    fn fixture() -> Fixture {
        let clock = ManualClock::new();
        let bridge = RecordingBridge::new();
        let ctx = Context::new(VisualConfig::default())
            .with_clock(Arc::new(clock.clone()))
            .with_script_bridge(Box::new(bridge.clone()));
        Fixture {
            clock,
            bridge,
            engine: Engine::new(Arc::new(ctx)),
        }
    }

    fn with_scenes(names: &[&str]) -> Fixture {
        let mut fx = fixture();
        let handle = fx.engine.script_handle();
        for name in names {
            let mut scene = Scene::new(*name);
            scene.add_object(Box::new(Text::new("title", *name))).unwrap();
            handle.add_scene(scene).unwrap();
        }
        fx.engine.setup();
        fx
    }

    fn send(engine: &mut Engine, message: OscMessage) -> bool {
        engine.process_osc(&message)
    }

    #[test]
    fn scene_controls_by_name_index_and_step() {
        let mut fx = with_scenes(&["a", "b", "c"]);
        assert_eq!(fx.engine.scenes().current_index(), Some(0));

        fx.clock.advance(501);
        assert!(send(&mut fx.engine, OscMessage::new("/visual/scene").with_arg("c")));
        assert_eq!(fx.engine.scenes().current_index(), Some(2));

        fx.clock.advance(501);
        assert!(send(&mut fx.engine, OscMessage::new("/visual/scene").with_arg(1)));
        assert_eq!(fx.engine.scenes().current_index(), Some(1));

        fx.clock.advance(501);
        assert!(send(&mut fx.engine, OscMessage::new("/visual/scene/next")));
        assert_eq!(fx.engine.scenes().current_index(), Some(2));
    }

    #[test]
    fn button_release_is_claimed_but_ignored() {
        let mut fx = with_scenes(&["a", "b"]);
        fx.clock.advance(501);
        assert!(send(&mut fx.engine, OscMessage::new("/visual/scene/next").with_arg(0.0_f32)));
        assert_eq!(fx.engine.scenes().current_index(), Some(0));
        assert!(fx.bridge.received().is_empty());

        assert!(send(&mut fx.engine, OscMessage::new("/visual/scene/prev").with_arg(1.0_f32)));
        assert_eq!(fx.engine.scenes().current_index(), Some(1));
    }

    #[test]
    fn unclaimed_messages_reach_the_script() {
        let mut fx = with_scenes(&["a"]);
        assert!(send(&mut fx.engine, OscMessage::new("/visual/a/title/text").with_arg("hi")));
        assert!(send(&mut fx.engine, OscMessage::new("/visual/whatever").with_arg(1)));
        assert!(send(&mut fx.engine, OscMessage::new("/visual/scene").with_arg(1.5_f32)));

        assert_eq!(
            fx.bridge.received(),
            vec!["/visual/whatever".to_string(), "/visual/scene".to_string()]
        );
    }

    #[test]
    fn framerate_and_quit() {
        let mut fx = with_scenes(&["a"]);
        assert!(send(&mut fx.engine, OscMessage::new("/visual/framerate").with_arg(25)));
        assert_eq!(fx.engine.scenes().frame_rate(), 25);

        assert!(!fx.engine.quit_requested());
        assert!(send(&mut fx.engine, OscMessage::new("/visual/quit")));
        assert!(fx.engine.quit_requested());
    }

    #[test]
    fn script_commands_apply_at_the_start_of_update() {
        let mut fx = with_scenes(&["a"]);
        let handle = fx.engine.script_handle();
        handle
            .add_object("a", Box::new(Rectangle::new("box")))
            .unwrap();
        handle
            .edit_object_as::<Rectangle, _>("a", "box", |rect| rect.filled = false)
            .unwrap();
        assert!(fx.engine.scenes().scene("a").unwrap().object("box").is_none());

        fx.engine.update();
        let scene = fx.engine.scenes().scene("a").unwrap();
        let object = scene.object("box").unwrap();
        assert!(object.is_ready());
        assert!(!object.downcast_ref::<Rectangle>().unwrap().filled);
    }

    #[test]
    fn removing_an_object_mid_session_keeps_routing_safe() {
        let mut fx = with_scenes(&["a"]);
        let handle = fx.engine.script_handle();
        handle.remove_object("a", "title").unwrap();
        fx.engine.update();

        assert!(send(&mut fx.engine, OscMessage::new("/visual/a/title/text").with_arg("x")));
        assert_eq!(fx.bridge.received(), vec!["/visual/a/title/text".to_string()]);

        assert!(fx.engine.scenes().scene("a").unwrap().object("title").is_none());
        let mut canvas = RecordingCanvas::new();
        fx.engine.draw(&mut canvas);
        assert!(canvas.texts().iter().all(|text| *text == "a"));
    }

    #[test]
    fn playlist_reload_rebuilds_the_scene_list() {
        let mut fx = fixture();
        fx.engine.load_script(Path::new("playlist.lua")).unwrap();
        let handle = fx.engine.script_handle();
        for name in ["a", "b"] {
            handle.add_scene(Scene::new(name)).unwrap();
        }
        handle.set_playlist(true).unwrap();
        fx.engine.update();
        assert!(fx.engine.context().playlist());
        assert_eq!(fx.engine.scenes().current_index(), Some(0));

        fx.clock.advance(501);
        fx.engine.scenes_mut().goto_scene(1);

        assert!(send(&mut fx.engine, OscMessage::new("/visual/reload")));
        assert!(fx.engine.scenes().is_empty());

        // the reloaded script queues its scenes again
        for name in ["a", "b"] {
            handle.add_scene(Scene::new(name)).unwrap();
        }
        fx.engine.update();
        assert_eq!(fx.engine.scenes().len(), 2);
        assert_eq!(fx.engine.scenes().current_index(), Some(1));
        assert_eq!(
            fx.bridge.events(),
            vec![
                ScriptEvent::Loaded(PathBuf::from("playlist.lua")),
                ScriptEvent::Loaded(PathBuf::from("playlist.lua")),
            ]
        );
    }

    #[test]
    fn file_message_swaps_scripts() {
        let mut fx = fixture();
        fx.engine.load_script(Path::new("one.lua")).unwrap();
        assert!(send(&mut fx.engine, OscMessage::new("/visual/file").with_arg("two.lua")));

        assert_eq!(fx.engine.current_script(), Some(Path::new("two.lua")));
        assert_eq!(
            fx.bridge.events(),
            vec![
                ScriptEvent::Loaded(PathBuf::from("one.lua")),
                ScriptEvent::Unloaded,
                ScriptEvent::Loaded(PathBuf::from("two.lua")),
            ]
        );
    }

    #[test]
    fn pausing_silences_the_attached_receiver() {
        let mut fx = with_scenes(&["a"]);
        let switch = IgnoreSwitch::default();
        fx.engine.attach_ingress(switch.clone());
        assert!(!switch.is_set());

        fx.engine.toggle_running();
        assert!(!fx.engine.is_running());
        assert!(switch.is_set());

        fx.engine.set_running(true);
        assert!(!switch.is_set());
    }

    #[test]
    fn paused_engines_still_apply_commands_but_skip_updates() {
        let mut fx = with_scenes(&[]);
        fx.engine.set_running(false);
        fx.engine
            .script_handle()
            .add_scene(Scene::new("late"))
            .unwrap();
        fx.engine.update();
        assert!(fx.engine.scenes().scene("late").is_some());
    }
}
