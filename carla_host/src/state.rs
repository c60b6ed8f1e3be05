use crate::protocol::EngineEvent;
use serde::Serialize;
use std::sync::{PoisonError, RwLock};
use tracing::{debug, warn};

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct EngineState {
    pub process_mode: i32,
    pub transport_mode: i32,
    pub transport_extra: String,
    pub plugin_count: u32,
    pub buffer_size: i32,
    pub sample_rate: f32,
    pub driver_name: String,
}

/// Engine-level facts mirrored from the callback stream. `None` outside a session.
#[derive(Default)]
pub struct EngineStateMirror {
    inner: RwLock<Option<EngineState>>,
}

impl EngineStateMirror {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Option<EngineState> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_running(&self) -> bool {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    pub fn process_mode(&self) -> Option<i32> {
        self.read(|s| s.process_mode)
    }

    pub fn transport_mode(&self) -> Option<i32> {
        self.read(|s| s.transport_mode)
    }

    pub fn transport_extra(&self) -> Option<String> {
        self.read(|s| s.transport_extra.clone())
    }

    fn read<T>(&self, f: impl FnOnce(&EngineState) -> T) -> Option<T> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(f)
    }

    /// Applies the four session events; everything else is ignored.
    /// Returns whether the mirror changed.
    pub(crate) fn apply(&self, event: &EngineEvent) -> bool {
        if !matches!(
            event,
            EngineEvent::EngineStarted { .. }
                | EngineEvent::EngineStopped
                | EngineEvent::ProcessModeChanged { .. }
                | EngineEvent::TransportModeChanged { .. }
        ) {
            return false;
        }
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        match event {
            EngineEvent::EngineStarted {
                plugin_count,
                process_mode,
                transport_mode,
                buffer_size,
                sample_rate,
                driver_name,
            } => {
                if guard.is_some() {
                    warn!("engine started while a session was already mirrored; replacing it");
                }
                debug!(driver = %driver_name, process_mode, transport_mode, "engine started");
                *guard = Some(EngineState {
                    process_mode: *process_mode,
                    transport_mode: *transport_mode,
                    transport_extra: String::new(),
                    plugin_count: *plugin_count,
                    buffer_size: *buffer_size,
                    sample_rate: *sample_rate,
                    driver_name: driver_name.clone(),
                });
                true
            }
            EngineEvent::EngineStopped => {
                debug!("engine stopped");
                guard.take().is_some()
            }
            EngineEvent::ProcessModeChanged { process_mode } => match guard.as_mut() {
                Some(state) => {
                    state.process_mode = *process_mode;
                    true
                }
                None => {
                    warn!(process_mode, "process mode changed outside an engine session");
                    false
                }
            },
            EngineEvent::TransportModeChanged {
                transport_mode,
                transport_extra,
            } => match guard.as_mut() {
                Some(state) => {
                    state.transport_mode = *transport_mode;
                    state.transport_extra = transport_extra.clone();
                    true
                }
                None => {
                    warn!(transport_mode, "transport mode changed outside an engine session");
                    false
                }
            },
            _ => false,
        }
    }
}
