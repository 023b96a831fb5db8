//! Core library for the Visual OSC-controlled graphics engine.
//!
//! Every scene, object and process control is reachable under a hierarchical
//! OSC address. Messages arrive over UDP ([`net`]), are routed down the node
//! tree ([`osc`]) rooted at the [`Engine`], and whatever the tree leaves
//! unclaimed is handed to the attached script runtime ([`script`]).

pub mod assets;
pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod net;
pub mod objects;
pub mod osc;
pub mod render;
pub mod scene;
pub mod script;
pub mod timeline;

pub use assets::{AssetStore, CatalogDecoder, MediaDecoder, ProbeDecoder};
pub use config::VisualConfig;
pub use context::Context;
pub use engine::Engine;
pub use error::{Result, VisualError};
pub use net::{IgnoreSwitch, OscReceiver, OscSender};
pub use objects::{ObjectBase, ObjectKind, SceneObject};
pub use osc::{OscArg, OscMessage, OscNode};
pub use render::{Canvas, Color, RecordingCanvas};
pub use scene::{Scene, SceneManager};
pub use script::{NullScriptBridge, RecordingBridge, ScriptBridge, ScriptHandle};
pub use timeline::{Clock, ManualClock, SystemClock};
