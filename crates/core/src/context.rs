use std::{
    fmt,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, MutexGuard,
    },
};

use crate::{
    assets::{AssetStore, MediaDecoder},
    config::VisualConfig,
    script::{NullScriptBridge, ScriptBridge},
    timeline::{Clock, SystemClock},
    Result, VisualError,
};

/// Process wide collaborators handed to scenes and objects during setup.
///
/// The inner locks are only ever taken while the engine lock is already held
/// and are released before returning to the engine.
pub struct Context {
    config: VisualConfig,
    clock: Arc<dyn Clock>,
    assets: Mutex<AssetStore>,
    scripts: Mutex<Box<dyn ScriptBridge>>,
    playlist: AtomicBool,
}

impl Context {
    pub fn new(config: VisualConfig) -> Self {
        Self {
            config,
            clock: Arc::new(SystemClock::new()),
            assets: Mutex::new(AssetStore::default()),
            scripts: Mutex::new(Box::new(NullScriptBridge::default())),
            playlist: AtomicBool::new(false),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_decoder(mut self, decoder: Box<dyn MediaDecoder>) -> Self {
        self.assets = Mutex::new(AssetStore::new(decoder));
        self
    }

    pub fn with_script_bridge(mut self, bridge: Box<dyn ScriptBridge>) -> Self {
        self.scripts = Mutex::new(bridge);
        self
    }

    pub fn config(&self) -> &VisualConfig {
        &self.config
    }

    pub fn clock(&self) -> Arc<dyn Clock> {
        Arc::clone(&self.clock)
    }

    pub fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }

    pub fn assets(&self) -> Result<MutexGuard<'_, AssetStore>> {
        self.assets
            .lock()
            .map_err(|_| VisualError::msg("asset store has been poisoned"))
    }

    pub fn scripts(&self) -> Result<MutexGuard<'_, Box<dyn ScriptBridge>>> {
        self.scripts
            .lock()
            .map_err(|_| VisualError::msg("script bridge has been poisoned"))
    }

    /// True while the running script is the playlist that built the scene
    /// list; a script object loading its own file ends playlist mode.
    pub fn playlist(&self) -> bool {
        self.playlist.load(Ordering::SeqCst)
    }

    pub fn set_playlist(&self, playlist: bool) {
        self.playlist.store(playlist, Ordering::SeqCst);
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new(VisualConfig::default())
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("base_address", &self.config.base_address)
            .field("now_ms", &self.clock.now_ms())
            .field("playlist", &self.playlist())
            .finish()
    }
}
