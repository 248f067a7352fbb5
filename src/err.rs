use std::error::Error;
use std::fmt::{Debug, Display, Formatter};

#[derive(Debug)]
pub(crate) enum ProtError {
    UnknownPacket(i32),
    Malformed(String),
    NotJoined(i32),
    KeepAliveIdMismatch(i64, i64),
    FrameTooLarge(usize),
    Io(String),
    Any(String),
}

impl ProtError {
    /// Fatal errors close the connection; everything else only drops the offending frame.
    pub(crate) fn is_fatal(&self) -> bool {
        match self {
            ProtError::UnknownPacket(_) => false,
            ProtError::Malformed(_) => false,
            ProtError::NotJoined(_) => false,
            ProtError::KeepAliveIdMismatch(_, _) => false,
            ProtError::FrameTooLarge(_) => true,
            ProtError::Io(_) => true,
            ProtError::Any(_) => false,
        }
    }
}

impl Display for ProtError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ProtError::UnknownPacket(id) => write!(f, "Unknown packet id 0x{:02x}", id),
            ProtError::Malformed(v) => write!(f, "Malformed packet: {}", v),
            ProtError::NotJoined(id) => write!(f, "Packet 0x{:02x} sent before hello", id),
            ProtError::KeepAliveIdMismatch(v1, v2) => {
                write!(f, "Keep alive id mismatch: {} != {}", v1, v2)
            }
            ProtError::FrameTooLarge(len) => write!(f, "Frame of {} bytes is too large", len),
            ProtError::Io(v) => write!(f, "IO error: {}", v),
            ProtError::Any(v) => write!(f, "{}", v),
        }
    }
}

impl Error for ProtError {}

impl From<String> for ProtError {
    fn from(s: String) -> Self {
        ProtError::Any(s)
    }
}

impl From<std::io::Error> for ProtError {
    fn from(e: std::io::Error) -> Self {
        ProtError::Io(e.to_string())
    }
}

#[derive(Debug)]
pub(crate) enum WorldError {
    Io(std::io::Error),
    Serde(serde_json::Error),
    Invalid(String),
}

impl Display for WorldError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            WorldError::Io(e) => write!(f, "World file IO failed: {}", e),
            WorldError::Serde(e) => write!(f, "World file is not valid JSON: {}", e),
            WorldError::Invalid(v) => write!(f, "World file rejected: {}", v),
        }
    }
}

impl Error for WorldError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            WorldError::Io(e) => Some(e),
            WorldError::Serde(e) => Some(e),
            WorldError::Invalid(_) => None,
        }
    }
}

impl From<std::io::Error> for WorldError {
    fn from(e: std::io::Error) -> Self {
        WorldError::Io(e)
    }
}

impl From<serde_json::Error> for WorldError {
    fn from(e: serde_json::Error) -> Self {
        WorldError::Serde(e)
    }
}

impl From<String> for WorldError {
    fn from(s: String) -> Self {
        WorldError::Invalid(s)
    }
}
