use super::{OscArg, OscMessage};

const BUNDLE_TAG: &[u8; 8] = b"#bundle\0";
/// Bundles nested deeper than this are rejected.
pub const MAX_BUNDLE_DEPTH: usize = 16;

/// Reasons an inbound datagram is rejected before routing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("packet ended unexpectedly")]
    Truncated,
    #[error("packet is empty")]
    Empty,
    #[error("address must start with `/`")]
    BadAddress,
    #[error("string is not null terminated utf-8")]
    BadString,
    #[error("type tags must start with `,`")]
    BadTypeTags,
    #[error("unsupported argument type `{0}`")]
    UnsupportedType(char),
    #[error("bundle element size {0} is invalid")]
    BadBundleElement(i32),
    #[error("bundles nested deeper than {}", MAX_BUNDLE_DEPTH)]
    TooDeep,
}

/// A decoded datagram.
#[derive(Debug, Clone, PartialEq)]
pub enum OscPacket {
    Message(OscMessage),
    Bundle(OscBundle),
}

impl OscPacket {
    /// Flattens nested bundles into their messages, in order.
    pub fn into_messages(self) -> Vec<OscMessage> {
        let mut messages = Vec::new();
        let mut pending = vec![self];
        while let Some(packet) = pending.pop() {
            match packet {
                OscPacket::Message(message) => messages.push(message),
                OscPacket::Bundle(bundle) => pending.extend(bundle.content.into_iter().rev()),
            }
        }
        messages
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OscBundle {
    pub timetag: u64,
    pub content: Vec<OscPacket>,
}

/// Decodes one OSC packet (message or bundle).
pub fn decode_packet(bytes: &[u8]) -> Result<OscPacket, DecodeError> {
    decode_nested(bytes, 0)
}

fn decode_nested(bytes: &[u8], depth: usize) -> Result<OscPacket, DecodeError> {
    if bytes.is_empty() {
        return Err(DecodeError::Empty);
    }
    if bytes.starts_with(BUNDLE_TAG) {
        if depth >= MAX_BUNDLE_DEPTH {
            return Err(DecodeError::TooDeep);
        }
        decode_bundle(bytes, depth + 1).map(OscPacket::Bundle)
    } else {
        decode_message(bytes).map(OscPacket::Message)
    }
}

fn decode_bundle(bytes: &[u8], depth: usize) -> Result<OscBundle, DecodeError> {
    let mut reader = Reader::new(bytes);
    reader.skip(BUNDLE_TAG.len())?;
    let timetag = u64::from_be_bytes(reader.take_array::<8>()?);

    let mut content = Vec::new();
    while !reader.is_done() {
        let size = reader.read_i32()?;
        if size <= 0 || size % 4 != 0 {
            return Err(DecodeError::BadBundleElement(size));
        }
        let element = reader.take(size as usize)?;
        content.push(decode_nested(element, depth)?);
    }

    Ok(OscBundle { timetag, content })
}

fn decode_message(bytes: &[u8]) -> Result<OscMessage, DecodeError> {
    let mut reader = Reader::new(bytes);
    let address = reader.read_string()?;
    if !address.starts_with('/') {
        return Err(DecodeError::BadAddress);
    }

    let mut message = OscMessage::new(address);
    // very old senders omit the type tag string entirely
    if reader.is_done() {
        return Ok(message);
    }

    let tags = reader.read_string()?;
    let tags = tags.strip_prefix(',').ok_or(DecodeError::BadTypeTags)?;

    for tag in tags.chars() {
        let arg = match tag {
            'i' => OscArg::Int(reader.read_i32()?),
            'f' => OscArg::Float(f32::from_be_bytes(reader.take_array::<4>()?)),
            's' => OscArg::Str(reader.read_string()?),
            'b' => {
                let size = reader.read_i32()?;
                let size = usize::try_from(size).map_err(|_| DecodeError::Truncated)?;
                let blob = reader.take(size)?.to_vec();
                reader.align()?;
                OscArg::Blob(blob)
            }
            'T' => OscArg::Bool(true),
            'F' => OscArg::Bool(false),
            'N' => OscArg::Nil,
            other => return Err(DecodeError::UnsupportedType(other)),
        };
        message.args.push(arg);
    }

    Ok(message)
}

/// Encodes a single message into an OSC 1.0 datagram.
pub fn encode_message(message: &OscMessage) -> Vec<u8> {
    let mut out = Vec::with_capacity(64);
    write_string(&mut out, message.address());

    let mut tags = String::with_capacity(message.len() + 1);
    tags.push(',');
    tags.extend(message.args().iter().map(OscArg::type_tag));
    write_string(&mut out, &tags);

    for arg in message.args() {
        match arg {
            OscArg::Int(value) => out.extend_from_slice(&value.to_be_bytes()),
            OscArg::Float(value) => out.extend_from_slice(&value.to_be_bytes()),
            OscArg::Str(value) => write_string(&mut out, value),
            OscArg::Blob(bytes) => {
                out.extend_from_slice(&(bytes.len() as i32).to_be_bytes());
                out.extend_from_slice(bytes);
                pad(&mut out);
            }
            OscArg::Bool(_) | OscArg::Nil => {}
        }
    }

    out
}

pub fn encode_packet(packet: &OscPacket) -> Vec<u8> {
    match packet {
        OscPacket::Message(message) => encode_message(message),
        OscPacket::Bundle(bundle) => {
            let mut out = Vec::with_capacity(64);
            out.extend_from_slice(BUNDLE_TAG);
            out.extend_from_slice(&bundle.timetag.to_be_bytes());
            for element in &bundle.content {
                let encoded = encode_packet(element);
                out.extend_from_slice(&(encoded.len() as i32).to_be_bytes());
                out.extend_from_slice(&encoded);
            }
            out
        }
    }
}

fn write_string(out: &mut Vec<u8>, value: &str) {
    out.extend_from_slice(value.as_bytes());
    out.push(0);
    pad(out);
}

fn pad(out: &mut Vec<u8>) {
    while out.len() % 4 != 0 {
        out.push(0);
    }
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn is_done(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], DecodeError> {
        let end = self.pos.checked_add(len).ok_or(DecodeError::Truncated)?;
        let slice = self.bytes.get(self.pos..end).ok_or(DecodeError::Truncated)?;
        self.pos = end;
        Ok(slice)
    }

    fn take_array<const N: usize>(&mut self) -> Result<[u8; N], DecodeError> {
        let mut array = [0u8; N];
        array.copy_from_slice(self.take(N)?);
        Ok(array)
    }

    fn skip(&mut self, len: usize) -> Result<(), DecodeError> {
        self.take(len).map(|_| ())
    }

    fn align(&mut self) -> Result<(), DecodeError> {
        let rem = self.pos % 4;
        if rem != 0 {
            self.skip(4 - rem)?;
        }
        Ok(())
    }

    fn read_i32(&mut self) -> Result<i32, DecodeError> {
        Ok(i32::from_be_bytes(self.take_array::<4>()?))
    }

    fn read_string(&mut self) -> Result<String, DecodeError> {
        let rest = self.bytes.get(self.pos..).ok_or(DecodeError::Truncated)?;
        let nul = rest
            .iter()
            .position(|byte| *byte == 0)
            .ok_or(DecodeError::BadString)?;
        let value = std::str::from_utf8(&rest[..nul])
            .map_err(|_| DecodeError::BadString)?
            .to_string();
        self.skip(nul + 1)?;
        self.align()?;
        Ok(value)
    }
}
