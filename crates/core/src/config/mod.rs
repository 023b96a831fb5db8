use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{osc::rebase, Result};

pub const PACKAGE: &str = "visual";

/// Read-only startup parameters shared by the engine, the receiver and the
/// scene manager.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VisualConfig {
    /// Port the osc receiver listens on.
    pub listening_port: u16,
    /// Destination of outbound messages.
    pub sending_ip: String,
    pub sending_port: u16,
    /// Root of every routed address, e.g. `/visual`.
    pub base_address: String,
    /// Where connect/disconnect notifications are sent.
    pub notification_address: String,
    pub device_address: String,
    pub connection_id: i32,
    /// Default font for text objects and the scene name banner.
    pub font_path: PathBuf,
    pub render_width: u32,
    pub render_height: u32,
    pub fullscreen: bool,
    /// Global render loop rate.
    pub frame_rate: u32,
    /// Pre-warm every scene at startup rather than only the first one.
    pub setup_all_scenes: bool,
    pub show_scene_names: bool,
    /// Minimum interval between two scene changes.
    pub transition_debounce_ms: u64,
    /// How long the scene name banner stays up after a change.
    pub scene_name_ms: u64,
    /// Script to load on startup.
    pub script: Option<PathBuf>,
}

impl Default for VisualConfig {
    fn default() -> Self {
        let base_address = format!("/{PACKAGE}");
        Self {
            listening_port: 9990,
            sending_ip: "127.0.0.1".to_string(),
            sending_port: 8880,
            notification_address: format!("{base_address}/notifications"),
            device_address: format!("{base_address}/devices"),
            base_address,
            connection_id: 0,
            font_path: PathBuf::from("fonts/ATARCC__.TTF"),
            render_width: 640,
            render_height: 480,
            fullscreen: false,
            frame_rate: 60,
            setup_all_scenes: true,
            show_scene_names: true,
            transition_debounce_ms: 500,
            scene_name_ms: 1250,
            script: None,
        }
    }
}

impl VisualConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Moves the base address, keeping the notification and device
    /// addresses underneath it when they were derived from the old one.
    pub fn set_base_address(&mut self, base_address: impl Into<String>) {
        let base_address = base_address.into();
        for derived in [&mut self.notification_address, &mut self.device_address] {
            *derived = rebase(derived.as_str(), &self.base_address, &base_address);
        }
        self.base_address = base_address;
    }

    pub fn log_summary(&self) {
        info!("listening port: {}", self.listening_port);
        info!("sending ip: {}", self.sending_ip);
        info!("sending port: {}", self.sending_port);
        info!("base address: {}", self.base_address);
        info!("sending address for notifications: {}", self.notification_address);
        info!("sending address for devices: {}", self.device_address);
        info!("connection id for notifications: {}", self.connection_id);
        info!("render size: {}x{}", self.render_width, self.render_height);
        info!("setup all scenes: {}", self.setup_all_scenes);
        info!("show scene names: {}", self.show_scene_names);
    }
}
