//! Boundary to the scripting runtime.
//!
//! The runtime itself lives outside this crate. It plugs in through
//! [`ScriptBridge`] (lifecycle calls and unrouted messages flowing in) and
//! mutates the scene tree through a [`ScriptHandle`] (commands flowing out).

mod commands;

use std::{
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use tracing::{debug, info, trace};

use crate::{osc::OscMessage, render::Canvas, Result, VisualError};

pub use commands::{script_channel, ObjectEdit, SceneEdit, SceneTarget, ScriptCommand, ScriptHandle};

pub trait ScriptBridge: Send {
    fn load_script(&mut self, path: &Path) -> Result<()>;

    /// Loads the current script again from disk.
    fn reload_script(&mut self) -> Result<()> {
        let path = self
            .current_script()
            .map(Path::to_path_buf)
            .ok_or_else(|| VisualError::msg("no script loaded"))?;
        self.load_script(&path)
    }

    fn unload_script(&mut self);

    /// Asks the running script to release what it created, keeping it loaded.
    fn clear_script(&mut self);

    fn current_script(&self) -> Option<&Path>;

    /// Receives every message nothing in the scene tree claimed.
    fn osc_received(&mut self, _message: &OscMessage) {}

    fn update(&mut self) {}

    fn draw(&mut self, _canvas: &mut dyn Canvas) {}
}

/// Bridge used when no runtime is attached: remembers the script path and
/// drops everything else.
#[derive(Debug, Default)]
pub struct NullScriptBridge {
    current: Option<PathBuf>,
}

impl ScriptBridge for NullScriptBridge {
    fn load_script(&mut self, path: &Path) -> Result<()> {
        if !path.is_file() {
            return Err(VisualError::resource(
                path.display().to_string(),
                "script not found",
            ));
        }
        info!(script = %path.display(), "no script runtime attached, script not executed");
        self.current = Some(path.to_path_buf());
        Ok(())
    }

    fn unload_script(&mut self) {
        if let Some(path) = self.current.take() {
            debug!(script = %path.display(), "unloaded script");
        }
    }

    fn clear_script(&mut self) {}

    fn current_script(&self) -> Option<&Path> {
        self.current.as_deref()
    }

    fn osc_received(&mut self, message: &OscMessage) {
        trace!(address = message.address(), "unhandled message");
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ScriptEvent {
    Loaded(PathBuf),
    Unloaded,
    Cleared,
    Osc(OscMessage),
}

/// Bridge that records every call, for headless runs and tests. Clones share
/// one event log.
#[derive(Debug, Clone, Default)]
pub struct RecordingBridge {
    events: Arc<Mutex<Vec<ScriptEvent>>>,
    current: Option<PathBuf>,
    reject_loads: bool,
}

impl RecordingBridge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent load fail.
    pub fn rejecting_loads(mut self) -> Self {
        self.reject_loads = true;
        self
    }

    pub fn events(&self) -> Vec<ScriptEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Addresses of the messages forwarded so far.
    pub fn received(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                ScriptEvent::Osc(message) => Some(message.address().to_string()),
                _ => None,
            })
            .collect()
    }

    fn record(&self, event: ScriptEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

impl ScriptBridge for RecordingBridge {
    fn load_script(&mut self, path: &Path) -> Result<()> {
        if self.reject_loads {
            return Err(VisualError::resource(
                path.display().to_string(),
                "rejected",
            ));
        }
        self.current = Some(path.to_path_buf());
        self.record(ScriptEvent::Loaded(path.to_path_buf()));
        Ok(())
    }

    fn unload_script(&mut self) {
        self.current = None;
        self.record(ScriptEvent::Unloaded);
    }

    fn clear_script(&mut self) {
        self.record(ScriptEvent::Cleared);
    }

    fn current_script(&self) -> Option<&Path> {
        self.current.as_deref()
    }

    fn osc_received(&mut self, message: &OscMessage) {
        self.record(ScriptEvent::Osc(message.clone()));
    }
}
