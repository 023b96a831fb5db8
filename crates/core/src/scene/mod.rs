//! Scenes and the scene manager.
//!
//! A [`Scene`] owns an ordered list of objects living at
//! `<base>/<scene>/<object>`. The [`SceneManager`] owns the scenes, keeps
//! exactly one of them active and drives transitions between them.

mod manager;

use tracing::{debug, warn};

use crate::{
    context::Context,
    objects::{SceneObject, SetupState},
    osc::{join_address, parent_address, NodeList, OscMessage, OscNode},
    render::{Canvas, Color},
    Result, VisualError,
};

pub use manager::{SceneManager, SCENE_NAME_FONT_SIZE};

#[derive(Debug)]
pub struct Scene {
    name: String,
    address: String,
    objects: NodeList<dyn SceneObject>,
    background: Color,
    fps: Option<u32>,
    setup_done: bool,
    slideshow: bool,
    cursor: Option<usize>,
}

impl Scene {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            address: join_address("", &name),
            name,
            objects: NodeList::new("scene objects"),
            background: Color::BLACK,
            fps: None,
            setup_done: false,
            slideshow: false,
            cursor: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Renames the scene, moving it and every object to the new address.
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
        let address = join_address(parent_address(&self.address), &self.name);
        self.set_osc_address(address);
    }

    pub fn background(&self) -> Color {
        self.background
    }

    pub fn set_background(&mut self, color: Color) {
        self.background = color;
    }

    /// Frame rate requested while this scene is active, `None` for the
    /// global rate.
    pub fn fps(&self) -> Option<u32> {
        self.fps
    }

    pub fn set_fps(&mut self, fps: Option<u32>) {
        self.fps = fps;
    }

    pub fn is_setup(&self) -> bool {
        self.setup_done
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn objects(&self) -> impl Iterator<Item = &dyn SceneObject> + '_ {
        self.objects.iter()
    }

    /// Takes ownership of `object` and places it under this scene's address.
    pub fn add_object(&mut self, mut object: Box<dyn SceneObject>) -> Result<()> {
        if self.index_of(object.name()).is_some() {
            return Err(VisualError::DuplicateName {
                kind: "object",
                name: object.name().to_string(),
            });
        }
        object.set_osc_address(join_address(&self.address, object.name()));
        debug!(scene = %self.name, kind = %object.kind(), object = object.name(), "added object");
        self.objects.push(object);
        Ok(())
    }

    /// Removes and drops the named object.
    pub fn remove_object(&mut self, name: &str) -> bool {
        let Some(index) = self.index_of(name) else {
            return false;
        };
        self.objects.remove(index);
        self.object_removed(index);
        true
    }

    /// Moves the named object out of the scene, leaving its slot vacated
    /// until the next walk over the list.
    pub fn take_object(&mut self, name: &str) -> Option<Box<dyn SceneObject>> {
        let index = self.index_of(name)?;
        let object = self.objects.take(index)?;
        self.object_removed(index);
        Some(object)
    }

    /// Releases and drops every object.
    pub fn clear_objects(&mut self, ctx: &Context) {
        for mut object in self.objects.drain() {
            object.clear(ctx);
        }
        self.cursor = None;
        self.setup_done = false;
    }

    pub fn object(&self, name: &str) -> Option<&dyn SceneObject> {
        self.objects.iter().find(|object| object.name() == name)
    }

    pub fn object_mut(&mut self, name: &str) -> Option<&mut (dyn SceneObject + 'static)> {
        self.objects.iter_mut().find(|object| object.name() == name)
    }

    /// Typed access to an object, `None` when missing or of another kind.
    pub fn object_as_mut<T: SceneObject + 'static>(&mut self, name: &str) -> Option<&mut T> {
        self.object_mut(name)?.downcast_mut::<T>()
    }

    fn index_of(&self, name: &str) -> Option<usize> {
        self.objects.position(|object| object.name() == name)
    }

    fn object_removed(&mut self, index: usize) {
        match self.cursor {
            Some(cursor) if cursor == index => {
                debug!(scene = %self.name, "current slideshow object removed");
                self.cursor = None;
            }
            Some(cursor) if cursor > index => self.cursor = Some(cursor - 1),
            _ => {}
        }
    }

    /// Acquires object resources.
    ///
    /// An early pass only touches objects that allow it and have not been
    /// set up yet. A normal pass sets up every pending object and re-runs
    /// objects that want setup on every activation. Failures are logged and
    /// leave the object [`SetupState::Failed`].
    pub fn setup(&mut self, ctx: &Context, early: bool) {
        let scene = self.name.as_str();
        for object in self.objects.iter_mut() {
            let policy = object.policy();
            let state = object.base().state;
            let wanted = if early {
                policy.allows_early_setup && state == SetupState::Pending
            } else {
                state == SetupState::Pending || (policy.always_setup && state == SetupState::Ready)
            };
            if wanted {
                setup_object(scene, object, ctx);
            }
        }
        if !early {
            self.setup_done = true;
        }
    }

    /// Sets every object up again, including ones that failed before.
    pub fn refresh(&mut self, ctx: &Context) {
        for object in self.objects.iter_mut() {
            object.base_mut().state = SetupState::Pending;
        }
        self.setup_done = false;
        self.setup(ctx, false);
    }

    /// Releases the resources of objects that do not survive deactivation.
    pub fn exit(&mut self, ctx: &Context) {
        for object in self.objects.iter_mut() {
            if object.policy().clear_on_exit && object.base().state != SetupState::Pending {
                object.clear(ctx);
                object.base_mut().state = SetupState::Pending;
            }
        }
    }

    pub fn update(&mut self, now_ms: u64) {
        if self.slideshow {
            if let Some(object) = self.cursor.and_then(|index| self.objects.get_mut(index)) {
                object.update(now_ms);
            }
            return;
        }
        for object in self.objects.iter_mut() {
            object.update(now_ms);
        }
    }

    pub fn draw(&mut self, canvas: &mut dyn Canvas) {
        self.objects.prune();
        if self.slideshow {
            if let Some(object) = self.current_object() {
                if object.is_ready() {
                    object.draw(canvas);
                }
            }
            return;
        }
        for object in self.objects.iter().filter(|object| object.is_ready()) {
            object.draw(canvas);
        }
    }

    pub fn is_slideshow(&self) -> bool {
        self.slideshow
    }

    pub fn set_slideshow(&mut self, slideshow: bool) {
        self.slideshow = slideshow;
        if slideshow && self.cursor.is_none() && !self.objects.is_empty() {
            self.cursor = Some(0);
        }
    }

    /// Index of the object shown in slideshow mode.
    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    pub fn current_object(&self) -> Option<&dyn SceneObject> {
        self.objects.get(self.cursor?)
    }

    pub fn next_object(&mut self) {
        let count = self.objects.len();
        if count == 0 {
            return;
        }
        self.cursor = Some(self.cursor.map_or(0, |cursor| (cursor + 1) % count));
    }

    pub fn prev_object(&mut self) {
        let count = self.objects.len();
        if count == 0 {
            return;
        }
        self.cursor = Some(self.cursor.map_or(0, |cursor| (cursor + count - 1) % count));
    }

    pub fn goto_object(&mut self, index: usize) {
        if index >= self.objects.len() {
            warn!(scene = %self.name, index, "cannot goto object, index out of range");
            return;
        }
        self.cursor = Some(index);
    }

    pub fn goto_object_named(&mut self, name: &str) {
        match self.index_of(name) {
            Some(index) => self.cursor = Some(index),
            None => debug!(scene = %self.name, object = name, "no such object"),
        }
    }
}

fn setup_object(scene: &str, object: &mut dyn SceneObject, ctx: &Context) {
    match object.setup(ctx) {
        Ok(()) => object.base_mut().state = SetupState::Ready,
        Err(err) => {
            warn!(scene, object = object.name(), %err, "couldn't set up object");
            object.base_mut().state = SetupState::Failed;
        }
    }
}

impl OscNode for Scene {
    fn osc_address(&self) -> &str {
        &self.address
    }

    fn set_osc_address(&mut self, address: String) {
        for object in self.objects.iter_mut() {
            let object_address = join_address(&address, object.name());
            object.set_osc_address(object_address);
        }
        self.address = address;
    }

    fn dispatch_children(&mut self, message: &OscMessage) -> bool {
        self.objects.dispatch(message)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    use super::*;
    use crate::{
        config::VisualConfig,
        objects::{
            Drawable, LifecyclePolicy, ObjectBase, ObjectKind, Pixel, Rectangle, Text,
        },
        render::RecordingCanvas,
    };

    /// Object counting its lifecycle calls.
    struct Counted {
        base: ObjectBase,
        policy: LifecyclePolicy,
        fail: bool,
        setups: Arc<AtomicUsize>,
        clears: Arc<AtomicUsize>,
    }

    impl Counted {
        fn new(name: &str, policy: LifecyclePolicy) -> Self {
            Self {
                base: ObjectBase::new(name),
                policy,
                fail: false,
                setups: Arc::default(),
                clears: Arc::default(),
            }
        }
    }

    impl Drawable for Counted {
        fn draw(&self, canvas: &mut dyn Canvas) {
            canvas.draw_pixel(0.0, 0.0);
        }
    }

    impl OscNode for Counted {
        crate::objects::object_boilerplate!(node);
    }

    impl SceneObject for Counted {
        crate::objects::object_boilerplate!(object ObjectKind::Pixel);

        fn policy(&self) -> LifecyclePolicy {
            self.policy
        }

        fn setup(&mut self, _ctx: &Context) -> Result<()> {
            self.setups.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(VisualError::msg("boom"))
            } else {
                Ok(())
            }
        }

        fn clear(&mut self, _ctx: &Context) {
            self.clears.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn ctx() -> Context {
        Context::new(VisualConfig::default())
    }

    fn scene_with(names: &[&str]) -> Scene {
        let mut scene = Scene::new("intro");
        scene.set_osc_address("/visual/intro".to_string());
        for name in names {
            scene.add_object(Box::new(Pixel::new(*name))).unwrap();
        }
        scene
    }

    #[test]
    fn objects_live_under_the_scene_address() {
        let scene = scene_with(&["title"]);
        assert_eq!(scene.object("title").unwrap().osc_address(), "/visual/intro/title");
    }

    #[test]
    fn duplicate_object_names_are_rejected() {
        let mut scene = scene_with(&["title"]);
        let err = scene.add_object(Box::new(Rectangle::new("title"))).unwrap_err();
        assert!(matches!(err, VisualError::DuplicateName { kind: "object", .. }));
        assert_eq!(scene.len(), 1);
    }

    #[test]
    fn setup_is_idempotent_for_static_objects() {
        let ctx = ctx();
        let mut scene = scene_with(&[]);
        let object = Counted::new("a", LifecyclePolicy::STATIC);
        let setups = Arc::clone(&object.setups);
        scene.add_object(Box::new(object)).unwrap();

        scene.setup(&ctx, false);
        scene.setup(&ctx, false);
        assert_eq!(setups.load(Ordering::SeqCst), 1);
        assert!(scene.is_setup());
    }

    #[test]
    fn early_setup_skips_scripted_objects_and_is_not_repeated() {
        let ctx = ctx();
        let mut scene = scene_with(&[]);
        let plain = Counted::new("plain", LifecyclePolicy::STATIC);
        let script = Counted::new("script", LifecyclePolicy::SCRIPTED);
        let (plain_setups, script_setups) = (Arc::clone(&plain.setups), Arc::clone(&script.setups));
        scene.add_object(Box::new(plain)).unwrap();
        scene.add_object(Box::new(script)).unwrap();

        scene.setup(&ctx, true);
        assert_eq!(plain_setups.load(Ordering::SeqCst), 1);
        assert_eq!(script_setups.load(Ordering::SeqCst), 0);
        assert!(!scene.is_setup());

        scene.setup(&ctx, false);
        assert_eq!(plain_setups.load(Ordering::SeqCst), 1);
        assert_eq!(script_setups.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn always_objects_are_set_up_on_every_pass_and_cleared_on_exit() {
        let ctx = ctx();
        let mut scene = scene_with(&[]);
        let video = Counted::new("video", LifecyclePolicy::STREAMING);
        let plain = Counted::new("plain", LifecyclePolicy::STATIC);
        let (setups, clears) = (Arc::clone(&video.setups), Arc::clone(&video.clears));
        let plain_clears = Arc::clone(&plain.clears);
        scene.add_object(Box::new(video)).unwrap();
        scene.add_object(Box::new(plain)).unwrap();

        scene.setup(&ctx, false);
        scene.setup(&ctx, false);
        assert_eq!(setups.load(Ordering::SeqCst), 2);

        scene.exit(&ctx);
        assert_eq!(clears.load(Ordering::SeqCst), 1);
        assert_eq!(plain_clears.load(Ordering::SeqCst), 0);
        assert_eq!(scene.object("video").unwrap().base().state, SetupState::Pending);
        assert_eq!(scene.len(), 2);
    }

    #[test]
    fn failed_objects_are_not_drawn_until_refreshed() {
        let ctx = ctx();
        let mut scene = scene_with(&[]);
        let mut broken = Counted::new("broken", LifecyclePolicy::STATIC);
        broken.fail = true;
        let setups = Arc::clone(&broken.setups);
        scene.add_object(Box::new(broken)).unwrap();

        scene.setup(&ctx, false);
        scene.setup(&ctx, false);
        assert_eq!(setups.load(Ordering::SeqCst), 1);
        assert_eq!(scene.object("broken").unwrap().base().state, SetupState::Failed);

        let mut canvas = RecordingCanvas::new();
        scene.draw(&mut canvas);
        assert!(canvas.commands().is_empty());

        scene.refresh(&ctx);
        assert_eq!(setups.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn objects_added_later_are_set_up_on_the_next_pass() {
        let ctx = ctx();
        let mut scene = scene_with(&["a"]);
        scene.setup(&ctx, false);
        scene.add_object(Box::new(Pixel::new("b"))).unwrap();
        assert!(!scene.object("b").unwrap().is_ready());

        scene.setup(&ctx, false);
        assert!(scene.object("b").unwrap().is_ready());
    }

    #[test]
    fn slideshow_navigation_wraps() {
        let mut scene = scene_with(&["a", "b", "c"]);
        scene.set_slideshow(true);
        assert_eq!(scene.cursor(), Some(0));

        scene.prev_object();
        assert_eq!(scene.cursor(), Some(2));
        scene.next_object();
        assert_eq!(scene.cursor(), Some(0));

        for _ in 0..4 {
            scene.next_object();
        }
        assert_eq!(scene.cursor(), Some(1));
    }

    #[test]
    fn slideshow_on_an_empty_scene_is_safe() {
        let mut scene = scene_with(&[]);
        scene.set_slideshow(true);
        scene.next_object();
        scene.prev_object();
        scene.goto_object(0);
        scene.goto_object_named("missing");
        assert_eq!(scene.cursor(), None);

        let mut canvas = RecordingCanvas::new();
        scene.update(10);
        scene.draw(&mut canvas);
        assert!(canvas.commands().is_empty());
    }

    #[test]
    fn out_of_range_goto_keeps_the_cursor() {
        let mut scene = scene_with(&["a", "b"]);
        scene.goto_object(1);
        scene.goto_object(2);
        assert_eq!(scene.cursor(), Some(1));
        scene.goto_object_named("a");
        assert_eq!(scene.cursor(), Some(0));
    }

    #[test]
    fn removing_objects_keeps_the_cursor_consistent() {
        let mut scene = scene_with(&["a", "b", "c"]);
        scene.goto_object(2);
        assert!(scene.remove_object("a"));
        assert_eq!(scene.cursor(), Some(1));
        assert_eq!(scene.current_object().unwrap().name(), "c");

        let taken = scene.take_object("c").unwrap();
        assert_eq!(taken.name(), "c");
        assert_eq!(scene.cursor(), None);
        assert!(!scene.remove_object("missing"));
    }

    #[test]
    fn slideshow_draws_only_the_current_object() {
        let ctx = ctx();
        let mut scene = scene_with(&["a", "b", "c"]);
        scene.setup(&ctx, false);

        let mut canvas = RecordingCanvas::new();
        scene.draw(&mut canvas);
        assert_eq!(canvas.primitive_count(), 3);

        scene.set_slideshow(true);
        canvas.clear();
        scene.draw(&mut canvas);
        assert_eq!(canvas.primitive_count(), 1);
    }

    #[test]
    fn renaming_reroots_every_object() {
        let mut scene = scene_with(&["title", "box"]);
        scene.set_name("start");
        assert_eq!(scene.osc_address(), "/visual/start");
        assert_eq!(scene.object("title").unwrap().osc_address(), "/visual/start/title");
        assert_eq!(scene.object("box").unwrap().osc_address(), "/visual/start/box");

        let message = OscMessage::new("/visual/start/title/position").with_args([1.0_f32, 2.0]);
        assert!(scene.process_osc(&message));
        let stale = OscMessage::new("/visual/intro/title/position").with_args([1.0_f32, 2.0]);
        assert!(!scene.process_osc(&stale));
    }

    #[test]
    fn typed_object_access() {
        let mut scene = scene_with(&[]);
        scene.add_object(Box::new(Text::new("title", "hi"))).unwrap();
        scene.object_as_mut::<Text>("title").unwrap().text = "bye".to_string();
        assert!(scene.object_as_mut::<Rectangle>("title").is_none());
        assert_eq!(
            scene.object("title").unwrap().downcast_ref::<Text>().unwrap().text,
            "bye"
        );
    }

    #[test]
    fn clearing_releases_every_object() {
        let ctx = ctx();
        let mut scene = scene_with(&[]);
        let object = Counted::new("a", LifecyclePolicy::STATIC);
        let clears = Arc::clone(&object.clears);
        scene.add_object(Box::new(object)).unwrap();

        scene.clear_objects(&ctx);
        assert!(scene.is_empty());
        assert_eq!(clears.load(Ordering::SeqCst), 1);
    }
}
