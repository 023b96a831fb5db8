//! OSC message model, wire codec and the addressable node tree.

mod codec;
mod node;

use std::{fmt, net::SocketAddr};

pub use codec::{decode_packet, encode_message, encode_packet, DecodeError, OscBundle, OscPacket};
pub use node::{NodeList, OscNode};

/// A single typed OSC argument.
#[derive(Debug, Clone, PartialEq)]
pub enum OscArg {
    Int(i32),
    Float(f32),
    Str(String),
    Blob(Vec<u8>),
    /// `T` / `F` type tags.
    Bool(bool),
    /// `N` type tag.
    Nil,
}

impl OscArg {
    /// The OSC type tag character for this argument.
    pub fn type_tag(&self) -> char {
        match self {
            OscArg::Int(_) => 'i',
            OscArg::Float(_) => 'f',
            OscArg::Str(_) => 's',
            OscArg::Blob(_) => 'b',
            OscArg::Bool(true) => 'T',
            OscArg::Bool(false) => 'F',
            OscArg::Nil => 'N',
        }
    }
}

impl fmt::Display for OscArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OscArg::Int(value) => write!(f, "{value}"),
            OscArg::Float(value) => write!(f, "{value}"),
            OscArg::Str(value) => write!(f, "\"{value}\""),
            OscArg::Blob(bytes) => write!(f, "<blob {} bytes>", bytes.len()),
            OscArg::Bool(value) => write!(f, "{value}"),
            OscArg::Nil => f.write_str("nil"),
        }
    }
}

impl From<i32> for OscArg {
    fn from(value: i32) -> Self {
        OscArg::Int(value)
    }
}

impl From<f32> for OscArg {
    fn from(value: f32) -> Self {
        OscArg::Float(value)
    }
}

impl From<&str> for OscArg {
    fn from(value: &str) -> Self {
        OscArg::Str(value.to_string())
    }
}

impl From<String> for OscArg {
    fn from(value: String) -> Self {
        OscArg::Str(value)
    }
}

impl From<bool> for OscArg {
    fn from(value: bool) -> Self {
        OscArg::Int(value as i32)
    }
}

/// An immutable OSC message: address, arguments and optional sender endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct OscMessage {
    address: String,
    args: Vec<OscArg>,
    source: Option<SocketAddr>,
}

impl OscMessage {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            args: Vec::new(),
            source: None,
        }
    }

    pub fn with_arg(mut self, arg: impl Into<OscArg>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn with_args<I, A>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<OscArg>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn with_source(mut self, source: SocketAddr) -> Self {
        self.source = Some(source);
        self
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn args(&self) -> &[OscArg] {
        &self.args
    }

    pub fn arg(&self, index: usize) -> Option<&OscArg> {
        self.args.get(index)
    }

    pub fn len(&self) -> usize {
        self.args.len()
    }

    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }

    /// Endpoint the message was received from, if it came off the wire.
    pub fn source(&self) -> Option<SocketAddr> {
        self.source
    }

    /// Reads a boolean from an int, float or `T`/`F` argument.
    pub fn try_bool(&self, index: usize) -> Option<bool> {
        match self.args.get(index)? {
            OscArg::Int(value) => Some(*value != 0),
            OscArg::Float(value) => Some(*value != 0.0),
            OscArg::Bool(value) => Some(*value),
            _ => None,
        }
    }

    /// Reads a signed integer, truncating floats.
    pub fn try_int(&self, index: usize) -> Option<i32> {
        match self.args.get(index)? {
            OscArg::Int(value) => Some(*value),
            OscArg::Float(value) => Some(*value as i32),
            _ => None,
        }
    }

    /// Reads a non-negative integer; negative values are rejected.
    pub fn try_uint(&self, index: usize) -> Option<u32> {
        self.try_int(index).and_then(|value| u32::try_from(value).ok())
    }

    pub fn try_float(&self, index: usize) -> Option<f32> {
        match self.args.get(index)? {
            OscArg::Int(value) => Some(*value as f32),
            OscArg::Float(value) => Some(*value),
            _ => None,
        }
    }

    pub fn try_string(&self, index: usize) -> Option<&str> {
        match self.args.get(index)? {
            OscArg::Str(value) => Some(value),
            _ => None,
        }
    }

    /// Controllers send a float `0` when a button is released.
    pub fn is_button_off(&self) -> bool {
        matches!(self.args.first(), Some(OscArg::Float(value)) if *value == 0.0)
    }
}

impl fmt::Display for OscMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.address)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Joins a parent address and a local name with a single `/`.
pub fn join_address(parent: &str, name: &str) -> String {
    let parent = parent.trim_end_matches('/');
    let name = name.trim_start_matches('/');
    format!("{parent}/{name}")
}

/// Returns everything before the last `/` segment, or `""` for a top-level address.
pub fn parent_address(address: &str) -> &str {
    match address.rfind('/') {
        Some(index) => &address[..index],
        None => "",
    }
}

/// Moves `address` from under `old_prefix` to under `new_prefix`; addresses
/// outside `old_prefix` are returned unchanged.
pub fn rebase(address: &str, old_prefix: &str, new_prefix: &str) -> String {
    match address.strip_prefix(old_prefix) {
        Some(rest) if rest.is_empty() || rest.starts_with('/') => format!("{new_prefix}{rest}"),
        _ => address.to_string(),
    }
}
