mod action;
mod decode;
mod event;

pub use action::ActionCode;
pub use decode::{decode, decode_raw, parse_connection, parse_mapped_range, round_position, DecodeError};
pub use event::{EngineEvent, RawCallback, UnknownReason};

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FaultKind {
    Panic,
    ListenerFailed,
    RegistryInconsistency,
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FaultKind::Panic => "panic",
            FaultKind::ListenerFailed => "listener_failed",
            FaultKind::RegistryInconsistency => "registry_inconsistency",
        };
        f.write_str(s)
    }
}

/// A fault caught at the dispatch boundary instead of reaching the engine thread.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ErrorReport {
    pub kind: FaultKind,
    pub message: String,
    pub origin: String,
}

impl ErrorReport {
    pub fn new(kind: FaultKind, message: impl Into<String>, origin: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            origin: origin.into(),
        }
    }
}

impl fmt::Display for ErrorReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} in {}: {}", self.kind, self.origin, self.message)
    }
}
