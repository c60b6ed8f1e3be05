pub const EVENT_QUEUE_CAP: usize = 256;
pub const ERROR_QUEUE_CAP: usize = 64;

pub use carla_protocol::{
    ActionCode, EngineEvent, ErrorReport, FaultKind, RawCallback, UnknownReason,
};
