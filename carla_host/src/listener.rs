use crate::fault;
use crate::patchbay::PatchbayMirror;
use crate::protocol::{EngineEvent, ErrorReport, FaultKind};
use crate::registry::PluginRegistry;
use crate::state::EngineStateMirror;
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, error};

pub type ListenerError = Box<dyn std::error::Error + Send + Sync>;

/// Read-only view of the mirrored engine, already updated for the event being delivered.
#[derive(Clone, Copy)]
pub struct MirrorView<'a> {
    pub state: &'a EngineStateMirror,
    pub registry: &'a PluginRegistry,
    pub patchbay: &'a PatchbayMirror,
}

/// Receives every published engine event, on the dispatching thread.
///
/// Implementations must be quick and must not call back into the dispatcher;
/// anything slow belongs on another thread (see [`ChannelListener`]).
pub trait EventListener: Send + Sync {
    fn on_event(&self, event: &EngineEvent, view: &MirrorView<'_>) -> Result<(), ListenerError>;

    fn name(&self) -> &str {
        "listener"
    }
}

pub trait ErrorListener: Send + Sync {
    fn on_error(&self, report: &ErrorReport);
}

pub struct FnListener<F> {
    name: String,
    f: F,
}

impl<F> FnListener<F>
where
    F: Fn(&EngineEvent, &MirrorView<'_>) -> Result<(), ListenerError> + Send + Sync,
{
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }
}

impl<F> EventListener for FnListener<F>
where
    F: Fn(&EngineEvent, &MirrorView<'_>) -> Result<(), ListenerError> + Send + Sync,
{
    fn on_event(&self, event: &EngineEvent, view: &MirrorView<'_>) -> Result<(), ListenerError> {
        (self.f)(event, view)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl<F> ErrorListener for F
where
    F: Fn(&ErrorReport) + Send + Sync,
{
    fn on_error(&self, report: &ErrorReport) {
        self(report)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Ordered subscriber list. Publishing works on a snapshot, so subscribers may
/// come and go while a delivery is running.
pub struct Fabric<L: ?Sized> {
    next_id: AtomicU64,
    entries: Mutex<Vec<(SubscriptionId, Arc<L>)>>,
}

impl<L: ?Sized> Default for Fabric<L> {
    fn default() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            entries: Mutex::new(Vec::new()),
        }
    }
}

impl<L: ?Sized> Fabric<L> {
    pub fn subscribe(&self, listener: Arc<L>) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.lock().push((id, listener));
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|(entry_id, _)| *entry_id != id);
        entries.len() != before
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn snapshot(&self) -> Vec<Arc<L>> {
        self.lock().iter().map(|(_, l)| Arc::clone(l)).collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<(SubscriptionId, Arc<L>)>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

pub type EventBus = Fabric<dyn EventListener>;
pub type ErrorBus = Fabric<dyn ErrorListener>;

impl Fabric<dyn EventListener> {
    /// Delivers `event` to every listener in subscription order. A listener that
    /// fails or panics is reported and delivery moves on to the next one.
    pub fn publish(&self, event: &EngineEvent, view: &MirrorView<'_>) -> Vec<ErrorReport> {
        let mut reports = Vec::new();
        for listener in self.snapshot() {
            match fault::catch(|| listener.on_event(event, view)) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => reports.push(ErrorReport::new(
                    FaultKind::ListenerFailed,
                    e.to_string(),
                    format!("listener `{}`", listener.name()),
                )),
                Err(caught) => {
                    reports.push(caught.into_report(&format!("listener `{}`", listener.name())))
                }
            }
        }
        reports
    }
}

impl Fabric<dyn ErrorListener> {
    pub fn report(&self, report: &ErrorReport) {
        for listener in self.snapshot() {
            if let Err(caught) = fault::catch(|| listener.on_error(report)) {
                error!(message = %caught.message, "error listener panicked");
            }
        }
    }
}

/// Hands events to another thread through a bounded channel. Events are dropped
/// when the receiver falls behind rather than blocking the engine thread.
pub struct ChannelListener<T> {
    name: String,
    tx: Sender<T>,
}

impl<T> ChannelListener<T> {
    pub fn new(name: impl Into<String>, tx: Sender<T>) -> Self {
        Self {
            name: name.into(),
            tx,
        }
    }

    fn offer(&self, item: T) {
        match self.tx.try_send(item) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => debug!(channel = %self.name, "receiver full, dropping"),
            Err(TrySendError::Disconnected(_)) => {
                debug!(channel = %self.name, "receiver gone, dropping")
            }
        }
    }
}

pub fn event_channel(name: &str, cap: usize) -> (ChannelListener<EngineEvent>, Receiver<EngineEvent>) {
    let (tx, rx) = bounded(cap);
    (ChannelListener::new(name, tx), rx)
}

pub fn error_channel(name: &str, cap: usize) -> (ChannelListener<ErrorReport>, Receiver<ErrorReport>) {
    let (tx, rx) = bounded(cap);
    (ChannelListener::new(name, tx), rx)
}

impl EventListener for ChannelListener<EngineEvent> {
    fn on_event(&self, event: &EngineEvent, _view: &MirrorView<'_>) -> Result<(), ListenerError> {
        self.offer(event.clone());
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl ErrorListener for ChannelListener<ErrorReport> {
    fn on_error(&self, report: &ErrorReport) {
        self.offer(report.clone());
    }
}
