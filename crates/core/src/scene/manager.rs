use std::{fmt, sync::Arc};

use tracing::{debug, warn};

use crate::{
    assets::FontHandle,
    context::Context,
    osc::{join_address, OscArg, OscMessage, OscNode},
    render::{Canvas, Color},
    timeline::Alarm,
    Result, VisualError,
};

use super::Scene;

pub const SCENE_NAME_FONT_SIZE: u32 = 36;

/// Owns the scene list and the transition state machine.
///
/// Transitions are debounced: a second change within
/// `transition_debounce_ms` of the previous one is dropped. Setting up the
/// new scene and clearing the background happen on the next tick.
pub struct SceneManager {
    ctx: Arc<Context>,
    address: String,
    scenes: Vec<Scene>,
    current: Option<usize>,
    change_alarm: Alarm,
    name_alarm: Alarm,
    frame_alarm: Alarm,
    frame_rate: u32,
    pending_setup: bool,
    pending_background: bool,
    show_scene_name: bool,
    name_font: Option<FontHandle>,
}

impl SceneManager {
    pub fn new(ctx: Arc<Context>) -> Self {
        let clock = ctx.clock();
        Self {
            address: ctx.config().base_address.clone(),
            show_scene_name: ctx.config().show_scene_names,
            scenes: Vec::new(),
            current: None,
            change_alarm: Alarm::new(Arc::clone(&clock)),
            name_alarm: Alarm::new(Arc::clone(&clock)),
            frame_alarm: Alarm::new(clock),
            frame_rate: 0,
            pending_setup: false,
            pending_background: false,
            name_font: None,
            ctx,
        }
    }

    pub fn len(&self) -> usize {
        self.scenes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scenes.is_empty()
    }

    pub fn scenes(&self) -> &[Scene] {
        &self.scenes
    }

    pub fn add_scene(&mut self, mut scene: Scene) -> Result<()> {
        if self.index_of(scene.name()).is_some() {
            return Err(VisualError::DuplicateName {
                kind: "scene",
                name: scene.name().to_string(),
            });
        }
        scene.set_osc_address(join_address(&self.address, scene.name()));
        debug!(scene = %scene.name(), objects = scene.len(), "added scene");
        self.scenes.push(scene);
        Ok(())
    }

    /// Removes the named scene. Removing the active scene leaves no scene
    /// active.
    pub fn remove_scene(&mut self, name: &str) -> Option<Scene> {
        let index = self.index_of(name)?;
        let mut scene = self.scenes.remove(index);
        match self.current {
            Some(current) if current == index => {
                scene.exit(&self.ctx);
                warn!(scene = %name, "removed the active scene");
                self.current = None;
            }
            Some(current) if current > index => self.current = Some(current - 1),
            _ => {}
        }
        Some(scene)
    }

    pub fn rename_scene(&mut self, from: &str, to: &str) -> Result<()> {
        if from != to && self.index_of(to).is_some() {
            return Err(VisualError::DuplicateName {
                kind: "scene",
                name: to.to_string(),
            });
        }
        let scene = self
            .scene_mut(from)
            .ok_or_else(|| VisualError::UnknownScene(from.to_string()))?;
        scene.set_name(to);
        debug!(from, to, "renamed scene");
        Ok(())
    }

    pub fn scene(&self, name: &str) -> Option<&Scene> {
        self.scenes.iter().find(|scene| scene.name() == name)
    }

    pub fn scene_mut(&mut self, name: &str) -> Option<&mut Scene> {
        self.scenes.iter_mut().find(|scene| scene.name() == name)
    }

    pub fn current_index(&self) -> Option<usize> {
        self.current
    }

    pub fn current_scene(&self) -> Option<&Scene> {
        self.scenes.get(self.current?)
    }

    pub fn current_scene_mut(&mut self) -> Option<&mut Scene> {
        self.scenes.get_mut(self.current?)
    }

    fn index_of(&self, name: &str) -> Option<usize> {
        self.scenes.iter().position(|scene| scene.name() == name)
    }

    /// Drops every scene. When `keep_current` is set the active index is
    /// kept so a rebuilt list resumes at the same position.
    pub fn clear(&mut self, keep_current: bool) {
        for mut scene in self.scenes.drain(..) {
            scene.clear_objects(&self.ctx);
        }
        if !keep_current {
            self.current = None;
        }
        self.pending_setup = false;
        self.pending_background = false;
    }

    pub fn next_scene(&mut self) -> bool {
        if !self.can_change() {
            return false;
        }
        let count = self.scenes.len();
        let index = self.current.map_or(0, |current| (current + 1) % count);
        self.change_to(index);
        true
    }

    pub fn prev_scene(&mut self) -> bool {
        if !self.can_change() {
            return false;
        }
        let count = self.scenes.len();
        let index = self
            .current
            .map_or(count - 1, |current| (current + count - 1) % count);
        self.change_to(index);
        true
    }

    pub fn goto_scene(&mut self, index: usize) -> bool {
        if !self.can_change() {
            return false;
        }
        if index >= self.scenes.len() {
            warn!(index, scenes = self.scenes.len(), "cannot goto scene, index out of range");
            return false;
        }
        self.change_to(index);
        true
    }

    pub fn goto_scene_named(&mut self, name: &str) -> bool {
        if !self.can_change() {
            return false;
        }
        match self.index_of(name) {
            Some(index) => {
                self.change_to(index);
                true
            }
            None => {
                debug!(scene = name, "no such scene");
                false
            }
        }
    }

    fn can_change(&self) -> bool {
        !self.scenes.is_empty() && self.change_alarm.alarm()
    }

    fn change_to(&mut self, index: usize) {
        if let Some(scene) = self.current.and_then(|current| self.scenes.get_mut(current)) {
            scene.exit(&self.ctx);
        }
        self.enter(index);
        self.change_alarm
            .set_alarm(self.ctx.config().transition_debounce_ms);
    }

    fn enter(&mut self, index: usize) {
        self.current = Some(index);
        let scene = &self.scenes[index];
        debug!(scene = %scene.name(), index, "changed scene");
        let fps = scene.fps().unwrap_or(0);
        self.pending_setup = true;
        self.pending_background = true;
        self.set_frame_rate(fps);
        self.name_alarm.set_alarm(self.ctx.config().scene_name_ms);
    }

    /// Prepares the scene list after it was (re)built: optionally pre-warms
    /// every scene, then activates the current scene or the first one.
    pub fn setup(&mut self, load_all: bool) {
        if self.name_font.is_none() {
            self.name_font = self.load_name_font();
        }
        if load_all {
            for scene in &mut self.scenes {
                scene.setup(&self.ctx, true);
            }
        }
        if self.scenes.is_empty() {
            return;
        }
        match self.current {
            Some(index) if index < self.scenes.len() => self.enter(index),
            _ => self.enter(0),
        }
    }

    fn load_name_font(&self) -> Option<FontHandle> {
        let path = &self.ctx.config().font_path;
        let font = self
            .ctx
            .assets()
            .and_then(|mut assets| assets.font(path, SCENE_NAME_FONT_SIZE));
        match font {
            Ok(font) => Some(font),
            Err(err) => {
                warn!(%err, "couldn't load the scene name font");
                None
            }
        }
    }

    pub fn exit(&mut self, exit_all: bool) {
        if exit_all {
            for scene in &mut self.scenes {
                scene.exit(&self.ctx);
            }
        } else if let Some(scene) = self.current.and_then(|current| self.scenes.get_mut(current)) {
            scene.exit(&self.ctx);
        }
    }

    fn apply_pending_setup(&mut self) {
        if !self.pending_setup {
            return;
        }
        self.pending_setup = false;
        let ctx = Arc::clone(&self.ctx);
        if let Some(scene) = self.current_scene_mut() {
            scene.setup(&ctx, false);
        }
    }

    pub fn update(&mut self) {
        self.apply_pending_setup();
        let now_ms = self.ctx.now_ms();
        if let Some(scene) = self.current_scene_mut() {
            scene.update(now_ms);
        }
    }

    pub fn draw(&mut self, canvas: &mut dyn Canvas) {
        self.apply_pending_setup();
        let Some(index) = self.current.filter(|index| *index < self.scenes.len()) else {
            return;
        };

        if self.pending_background {
            canvas.clear_background(self.scenes[index].background());
            self.pending_background = false;
        }

        if self.frame_rate > 0 {
            if self.frame_alarm.alarm() {
                self.scenes[index].draw(canvas);
                self.frame_alarm.set_alarm(1000 / u64::from(self.frame_rate));
            }
        } else {
            self.scenes[index].draw(canvas);
        }

        if self.show_scene_name && !self.name_alarm.alarm() {
            if let Some(font) = &self.name_font {
                let name = self.scenes[index].name();
                let (_, height) = canvas.text_size(font, name);
                let y = self.ctx.config().render_height as f32 - height * 0.25;
                canvas.set_color(Color::from_hex(0xFF00FF));
                canvas.draw_text(font, name, 0.0, y);
            }
        }
    }

    pub fn frame_rate(&self) -> u32 {
        self.frame_rate
    }

    /// Overrides the scene frame rate until the next transition; zero draws
    /// on every frame.
    pub fn set_frame_rate(&mut self, fps: u32) {
        self.frame_rate = fps;
        if fps > 0 {
            self.frame_alarm.set_alarm(0);
        }
    }

    pub fn is_showing_scene_name(&self) -> bool {
        self.show_scene_name
    }

    pub fn show_scene_name(&mut self, show: bool) {
        self.show_scene_name = show;
    }

    pub fn toggle_scene_name(&mut self) {
        self.show_scene_name = !self.show_scene_name;
    }

    fn local_address(&self, suffix: &str) -> String {
        format!("{}{suffix}", self.address)
    }
}

impl OscNode for SceneManager {
    fn osc_address(&self) -> &str {
        &self.address
    }

    fn set_osc_address(&mut self, address: String) {
        for scene in &mut self.scenes {
            let scene_address = join_address(&address, scene.name());
            scene.set_osc_address(scene_address);
        }
        self.address = address;
    }

    /// Slideshow controls for the active scene, then the active scene's
    /// objects. Inactive scenes never see messages.
    fn handle_osc(&mut self, message: &OscMessage) -> bool {
        let slideshow = self.local_address("/scene/slideshow");
        let object = self.local_address("/scene/object");
        let object_prev = self.local_address("/scene/object/prev");
        let object_next = self.local_address("/scene/object/next");

        let Some(scene) = self.current_scene_mut() else {
            return false;
        };
        let address = message.address();
        if address == slideshow {
            if let Some(enabled) = message.try_bool(0) {
                scene.set_slideshow(enabled);
            }
            return true;
        }
        if address == object {
            match message.arg(0) {
                Some(OscArg::Str(name)) => {
                    scene.goto_object_named(name);
                    return true;
                }
                Some(OscArg::Int(index)) => {
                    match usize::try_from(*index) {
                        Ok(index) => scene.goto_object(index),
                        Err(_) => warn!(index, "cannot goto object, negative index"),
                    }
                    return true;
                }
                _ => {}
            }
        } else if address == object_prev {
            scene.prev_object();
            return true;
        } else if address == object_next {
            scene.next_object();
            return true;
        }
        scene.process_osc(message)
    }
}

impl fmt::Debug for SceneManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SceneManager")
            .field("address", &self.address)
            .field("scenes", &self.scenes.iter().map(Scene::name).collect::<Vec<_>>())
            .field("current", &self.current)
            .field("frame_rate", &self.frame_rate)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        assets::CatalogDecoder,
        config::VisualConfig,
        objects::{Drawable, LifecyclePolicy, ObjectBase, ObjectKind, Pixel, SceneObject, Text},
        render::{DrawCommand, RecordingCanvas},
        timeline::ManualClock,
    };
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Streaming object that counts how often its scene sets it up and
    /// releases it.
    struct Tracker {
        base: ObjectBase,
        setups: Arc<AtomicUsize>,
        clears: Arc<AtomicUsize>,
    }

    impl Drawable for Tracker {
        fn draw(&self, _canvas: &mut dyn Canvas) {}
    }

    impl OscNode for Tracker {
        crate::objects::object_boilerplate!(node);
    }

    impl SceneObject for Tracker {
        crate::objects::object_boilerplate!(object ObjectKind::Video);

        fn policy(&self) -> LifecyclePolicy {
            LifecyclePolicy::STREAMING
        }

        fn setup(&mut self, _ctx: &Context) -> Result<()> {
            self.setups.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn clear(&mut self, _ctx: &Context) {
            self.clears.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[derive(Default)]
    struct Counts {
        setups: Arc<AtomicUsize>,
        clears: Arc<AtomicUsize>,
    }

    impl Counts {
        fn tracker(&self) -> Box<dyn SceneObject> {
            Box::new(Tracker {
                base: ObjectBase::new("tracker"),
                setups: Arc::clone(&self.setups),
                clears: Arc::clone(&self.clears),
            })
        }

        fn get(&self) -> (usize, usize) {
            (
                self.setups.load(Ordering::SeqCst),
                self.clears.load(Ordering::SeqCst),
            )
        }
    }

    struct Fixture {
        clock: ManualClock,
        manager: SceneManager,
    }

    impl Fixture {
        fn new(scenes: &[&str]) -> Self {
            let clock = ManualClock::new();
            let config = VisualConfig {
                font_path: "fonts/test.ttf".into(),
                ..VisualConfig::default()
            };
            let ctx = Context::new(config)
                .with_clock(Arc::new(clock.clone()))
                .with_decoder(Box::new(CatalogDecoder::new().with_font("fonts/test.ttf")));
            let mut manager = SceneManager::new(Arc::new(ctx));
            for name in scenes {
                let mut scene = Scene::new(*name);
                scene.add_object(Box::new(Pixel::new("dot"))).unwrap();
                manager.add_scene(scene).unwrap();
            }
            Self { clock, manager }
        }

        fn settle(&self) {
            self.clock.advance(501);
        }

        fn current_name(&self) -> Option<&str> {
            self.manager.current_scene().map(Scene::name)
        }
    }

    #[test]
    fn next_and_prev_wrap_around() {
        let mut fx = Fixture::new(&["a", "b", "c"]);
        assert!(fx.manager.next_scene());
        assert_eq!(fx.current_name(), Some("a"));

        for expected in ["b", "c", "a"] {
            fx.settle();
            fx.manager.next_scene();
            assert_eq!(fx.current_name(), Some(expected));
        }

        fx.settle();
        fx.manager.prev_scene();
        assert_eq!(fx.current_name(), Some("c"));
    }

    #[test]
    fn rapid_transitions_are_dropped() {
        let mut fx = Fixture::new(&["a", "b", "c"]);
        fx.manager.goto_scene(0);

        fx.clock.advance(10);
        assert!(!fx.manager.next_scene());
        assert_eq!(fx.current_name(), Some("a"));

        fx.clock.advance(500);
        assert!(fx.manager.next_scene());
        assert_eq!(fx.current_name(), Some("b"));
    }

    #[test]
    fn transitions_on_an_empty_list_do_nothing() {
        let mut fx = Fixture::new(&[]);
        assert!(!fx.manager.next_scene());
        assert!(!fx.manager.prev_scene());
        assert!(!fx.manager.goto_scene(0));
        assert!(!fx.manager.goto_scene_named("a"));
        fx.manager.setup(true);
        fx.manager.update();
        fx.manager.draw(&mut RecordingCanvas::new());
        assert_eq!(fx.manager.current_index(), None);
    }

    #[test]
    fn out_of_range_goto_keeps_the_active_scene() {
        let mut fx = Fixture::new(&["a", "b"]);
        fx.manager.goto_scene(1);
        fx.settle();

        assert!(!fx.manager.goto_scene(2));
        assert_eq!(fx.manager.current_index(), Some(1));
        assert!(!fx.manager.goto_scene_named("nope"));
        assert_eq!(fx.manager.current_index(), Some(1));

        // a rejected request doesn't arm the debounce
        assert!(fx.manager.goto_scene(0));
    }

    #[test]
    fn each_transition_exits_the_old_scene_and_sets_up_the_new_one_once() {
        let mut fx = Fixture::new(&["intro", "loop", "outro"]);
        let counts: Vec<Counts> = (0..3).map(|_| Counts::default()).collect();
        for (name, count) in ["intro", "loop", "outro"].iter().zip(&counts) {
            fx.manager
                .scene_mut(name)
                .unwrap()
                .add_object(count.tracker())
                .unwrap();
        }
        let snapshot = |counts: &[Counts]| counts.iter().map(Counts::get).collect::<Vec<_>>();

        fx.manager.setup(false);
        fx.manager.update();
        assert_eq!(snapshot(&counts), vec![(1, 0), (0, 0), (0, 0)]);

        fx.settle();
        assert!(fx.manager.next_scene());
        fx.manager.update();
        fx.manager.draw(&mut RecordingCanvas::new());
        assert_eq!(snapshot(&counts), vec![(1, 1), (1, 0), (0, 0)]);

        // rejected requests touch nothing
        fx.settle();
        assert!(!fx.manager.goto_scene(7));
        assert!(!fx.manager.goto_scene_named("missing"));
        fx.manager.update();
        fx.manager.draw(&mut RecordingCanvas::new());
        assert_eq!(snapshot(&counts), vec![(1, 1), (1, 0), (0, 0)]);
        assert_eq!(fx.manager.current_index(), Some(1));
    }

    #[test]
    fn transition_sets_up_the_new_scene_on_the_next_tick() {
        let mut fx = Fixture::new(&["a", "b"]);
        fx.manager.goto_scene_named("b");
        assert!(!fx.manager.current_scene().unwrap().is_setup());

        fx.manager.update();
        let scene = fx.manager.current_scene().unwrap();
        assert!(scene.is_setup());
        assert!(scene.object("dot").unwrap().is_ready());
        assert!(!fx.manager.scene("a").unwrap().is_setup());
    }

    #[test]
    fn draw_clears_the_background_once_and_shows_the_banner() {
        let mut fx = Fixture::new(&["a"]);
        fx.manager
            .scene_mut("a")
            .unwrap()
            .set_background(Color::rgb(1, 2, 3));
        fx.manager.setup(false);

        let mut canvas = RecordingCanvas::new();
        fx.manager.draw(&mut canvas);
        assert_eq!(canvas.commands()[0], DrawCommand::Background(Color::rgb(1, 2, 3)));
        assert_eq!(canvas.texts(), vec!["a"]);
        assert!(canvas.commands().contains(&DrawCommand::Color(Color::MAGENTA)));

        canvas.clear();
        fx.clock.advance(1250);
        fx.manager.draw(&mut canvas);
        assert!(!canvas
            .commands()
            .iter()
            .any(|command| matches!(command, DrawCommand::Background(_))));
        assert!(canvas.texts().is_empty());
    }

    #[test]
    fn banner_can_be_switched_off() {
        let mut fx = Fixture::new(&["a"]);
        fx.manager.toggle_scene_name();
        assert!(!fx.manager.is_showing_scene_name());
        fx.manager.setup(false);

        let mut canvas = RecordingCanvas::new();
        fx.manager.draw(&mut canvas);
        assert!(canvas.texts().is_empty());
    }

    #[test]
    fn scene_fps_gates_drawing() {
        let mut fx = Fixture::new(&[]);
        let mut scene = Scene::new("slow");
        scene.set_fps(Some(10));
        scene.add_object(Box::new(Pixel::new("dot"))).unwrap();
        fx.manager.add_scene(scene).unwrap();
        fx.manager.show_scene_name(false);
        fx.manager.setup(false);
        assert_eq!(fx.manager.frame_rate(), 10);

        let mut canvas = RecordingCanvas::new();
        fx.manager.draw(&mut canvas);
        fx.manager.draw(&mut canvas);
        assert_eq!(canvas.primitive_count(), 1);

        fx.clock.advance(100);
        fx.manager.draw(&mut canvas);
        assert_eq!(canvas.primitive_count(), 2);

        fx.manager.set_frame_rate(0);
        fx.manager.draw(&mut canvas);
        fx.manager.draw(&mut canvas);
        assert_eq!(canvas.primitive_count(), 4);
    }

    #[test]
    fn messages_only_reach_the_active_scene() {
        let mut fx = Fixture::new(&[]);
        for name in ["intro", "outro"] {
            let mut scene = Scene::new(name);
            scene.add_object(Box::new(Text::new("title", name))).unwrap();
            fx.manager.add_scene(scene).unwrap();
        }
        fx.manager.goto_scene_named("outro");

        let message = OscMessage::new("/visual/intro/title/position").with_args([10.0_f32, 20.0]);
        assert!(!fx.manager.process_osc(&message));

        let message = OscMessage::new("/visual/outro/title/position").with_args([10.0_f32, 20.0]);
        assert!(fx.manager.process_osc(&message));
        let title = fx
            .manager
            .current_scene_mut()
            .unwrap()
            .object_as_mut::<Text>("title")
            .unwrap();
        assert_eq!((title.pos.x, title.pos.y), (10.0, 20.0));
    }

    #[test]
    fn slideshow_controls_target_the_active_scene() {
        let mut fx = Fixture::new(&["a"]);
        fx.manager
            .scene_mut("a")
            .unwrap()
            .add_object(Box::new(Pixel::new("dot2")))
            .unwrap();
        fx.manager.goto_scene(0);

        assert!(fx
            .manager
            .process_osc(&OscMessage::new("/visual/scene/slideshow").with_arg(1)));
        assert!(fx
            .manager
            .process_osc(&OscMessage::new("/visual/scene/object").with_arg("dot2")));
        assert_eq!(fx.manager.current_scene().unwrap().cursor(), Some(1));

        assert!(fx
            .manager
            .process_osc(&OscMessage::new("/visual/scene/object/next")));
        assert_eq!(fx.manager.current_scene().unwrap().cursor(), Some(0));

        assert!(fx
            .manager
            .process_osc(&OscMessage::new("/visual/scene/object").with_arg(1)));
        assert_eq!(fx.manager.current_scene().unwrap().cursor(), Some(1));
    }

    #[test]
    fn duplicate_and_unknown_scene_names() {
        let mut fx = Fixture::new(&["a", "b"]);
        assert!(matches!(
            fx.manager.add_scene(Scene::new("a")),
            Err(VisualError::DuplicateName { kind: "scene", .. })
        ));
        assert!(fx.manager.rename_scene("a", "b").is_err());
        assert!(matches!(
            fx.manager.rename_scene("zzz", "y"),
            Err(VisualError::UnknownScene(_))
        ));
    }

    #[test]
    fn renaming_and_moving_the_base_reroot_everything() {
        let mut fx = Fixture::new(&["intro"]);
        fx.manager.rename_scene("intro", "start").unwrap();
        assert_eq!(
            fx.manager.scene("start").unwrap().object("dot").unwrap().osc_address(),
            "/visual/start/dot"
        );

        fx.manager.set_osc_address("/vj".to_string());
        assert_eq!(fx.manager.scene("start").unwrap().osc_address(), "/vj/start");
        assert_eq!(
            fx.manager.scene("start").unwrap().object("dot").unwrap().osc_address(),
            "/vj/start/dot"
        );
    }

    #[test]
    fn removing_scenes_keeps_the_active_index_valid() {
        let mut fx = Fixture::new(&["a", "b", "c"]);
        fx.manager.goto_scene(2);
        assert!(fx.manager.remove_scene("a").is_some());
        assert_eq!(fx.current_name(), Some("c"));

        assert!(fx.manager.remove_scene("c").is_some());
        assert_eq!(fx.manager.current_index(), None);
        assert!(fx.manager.remove_scene("c").is_none());
    }

    #[test]
    fn clear_can_keep_the_current_position() {
        let mut fx = Fixture::new(&["a", "b"]);
        fx.manager.goto_scene(1);
        fx.manager.clear(true);
        assert!(fx.manager.is_empty());
        assert_eq!(fx.manager.current_index(), Some(1));

        for name in ["x", "y"] {
            fx.manager.add_scene(Scene::new(name)).unwrap();
        }
        fx.manager.setup(true);
        assert_eq!(fx.current_name(), Some("y"));

        fx.manager.clear(false);
        assert_eq!(fx.manager.current_index(), None);
    }

    #[test]
    fn setup_all_prewarms_every_scene() {
        let mut fx = Fixture::new(&["a", "b"]);
        fx.manager.setup(true);
        assert_eq!(fx.current_name(), Some("a"));
        assert!(fx.manager.scene("b").unwrap().object("dot").unwrap().is_ready());
    }
}
