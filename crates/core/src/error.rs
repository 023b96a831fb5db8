use crate::osc::DecodeError;

/// Result alias that carries the custom [`VisualError`] type.
pub type Result<T> = std::result::Result<T, VisualError>;

/// Common error type for the core crate.
#[derive(Debug, thiserror::Error)]
pub enum VisualError {
    /// Free-form message, mostly used for poisoned locks and collaborator
    /// failures that do not fit a more specific variant.
    #[error("{0}")]
    Message(String),
    /// Caller supplied data that can never be valid.
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    /// Configuration file could not be parsed.
    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),
    /// An inbound datagram was not a valid OSC packet.
    #[error("malformed osc packet: {0}")]
    Decode(#[from] DecodeError),
    /// A scene or object name collided with an existing sibling.
    #[error("{kind} `{name}` already exists")]
    DuplicateName { kind: &'static str, name: String },
    /// A scene lookup by name failed.
    #[error("unknown scene `{0}`")]
    UnknownScene(String),
    /// A media, font or script resource could not be acquired.
    #[error("couldn't load `{path}`: {reason}")]
    Resource { path: String, reason: String },
    /// The inbound socket could not be bound.
    #[error("couldn't bind osc receiver to port {port}: {source}")]
    Bind {
        port: u16,
        #[source]
        source: std::io::Error,
    },
}

impl VisualError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }

    pub fn resource(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Resource {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

impl From<&str> for VisualError {
    fn from(value: &str) -> Self {
        Self::msg(value)
    }
}

impl From<String> for VisualError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}
