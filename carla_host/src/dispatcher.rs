use crate::fault;
use crate::listener::{
    error_channel, event_channel, ErrorBus, ErrorListener, EventBus, EventListener, FnListener,
    ListenerError, MirrorView, SubscriptionId,
};
use crate::patchbay::PatchbayMirror;
use crate::protocol::{EngineEvent, ErrorReport, RawCallback};
use crate::registry::{MonikerFn, PluginListener, PluginRegistry, PluginWatchers, RegistryError};
use crate::state::{EngineState, EngineStateMirror};
use crossbeam_channel::Receiver;
use std::ffi::c_void;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, error, trace, warn};

/// Everything the dispatch lock protects.
struct DispatchCore {
    registry: PluginRegistry,
    patchbay: PatchbayMirror,
}

/// Single ingress for engine callbacks.
///
/// Each call to [`Dispatcher::handle`] decodes the callback, updates the mirrors,
/// then notifies listeners, all under one lock and inside a fault boundary:
/// nothing that goes wrong in here unwinds back into the engine.
pub struct Dispatcher {
    core: Mutex<DispatchCore>,
    state: EngineStateMirror,
    events: EventBus,
    errors: ErrorBus,
    watchers: PluginWatchers,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::with_monikers(crate::registry::default_moniker)
    }

    pub fn with_monikers(moniker_fn: MonikerFn) -> Self {
        fault::install_panic_hook();
        let registry = PluginRegistry::new(moniker_fn);
        let watchers = registry.watchers().clone();
        Self {
            core: Mutex::new(DispatchCore {
                registry,
                patchbay: PatchbayMirror::default(),
            }),
            state: EngineStateMirror::new(),
            events: EventBus::default(),
            errors: ErrorBus::default(),
            watchers,
        }
    }

    pub fn subscribe(&self, listener: Arc<dyn EventListener>) -> SubscriptionId {
        self.events.subscribe(listener)
    }

    pub fn subscribe_fn<F>(&self, name: &str, f: F) -> SubscriptionId
    where
        F: Fn(&EngineEvent, &MirrorView<'_>) -> Result<(), ListenerError> + Send + Sync + 'static,
    {
        self.events.subscribe(Arc::new(FnListener::new(name, f)))
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.events.unsubscribe(id)
    }

    pub fn subscribe_errors(&self, listener: Arc<dyn ErrorListener>) -> SubscriptionId {
        self.errors.subscribe(listener)
    }

    pub fn unsubscribe_errors(&self, id: SubscriptionId) -> bool {
        self.errors.unsubscribe(id)
    }

    /// Subscribes a bounded channel; events are dropped when it is full.
    pub fn event_channel(&self, cap: usize) -> (SubscriptionId, Receiver<EngineEvent>) {
        let (listener, rx) = event_channel("event_channel", cap);
        (self.events.subscribe(Arc::new(listener)), rx)
    }

    pub fn error_channel(&self, cap: usize) -> (SubscriptionId, Receiver<ErrorReport>) {
        let (listener, rx) = error_channel("error_channel", cap);
        (self.errors.subscribe(Arc::new(listener)), rx)
    }

    /// Attaches a listener to one plugin's added/ready/removed notifications.
    /// The plugin does not need to exist yet. Safe to call from inside a listener.
    pub fn watch_plugin(&self, plugin_id: u32, listener: Arc<dyn PluginListener>) {
        self.watchers.watch(plugin_id, listener);
    }

    /// Detaches every plugin-scoped listener for `plugin_id`. Returns how many there were.
    pub fn unwatch_plugin(&self, plugin_id: u32) -> usize {
        self.watchers.unwatch_all(plugin_id)
    }

    pub fn engine_state(&self) -> Option<EngineState> {
        self.state.snapshot()
    }

    pub fn state(&self) -> &EngineStateMirror {
        &self.state
    }

    /// Runs `f` against the plugin registry. Takes the dispatch lock, so it must
    /// not be called from a listener; listeners get the registry in their view.
    pub fn with_registry<R>(&self, f: impl FnOnce(&PluginRegistry) -> R) -> R {
        f(&self.lock().registry)
    }

    pub fn with_patchbay<R>(&self, f: impl FnOnce(&PatchbayMirror) -> R) -> R {
        f(&self.lock().patchbay)
    }

    pub fn is_plugin_live(&self, plugin_id: u32) -> bool {
        self.with_registry(|r| r.is_live(plugin_id))
    }

    pub fn moniker_count(&self, name: &str) -> Option<u32> {
        self.with_registry(|r| r.moniker_count(name))
    }

    /// Context pointer to register alongside [`crate::engine_callback`]. Only valid
    /// while this dispatcher is alive.
    pub fn as_callback_context(&self) -> *mut c_void {
        self as *const Self as *mut c_void
    }

    /// Entry point for one engine callback. Never panics.
    pub fn handle(&self, raw: &RawCallback) {
        let reports = match fault::catch(|| self.dispatch(raw)) {
            Ok(reports) => reports,
            Err(caught) => vec![caught.into_report("dispatch")],
        };
        self.report_all(&reports);
    }

    /// Fires the ready notification for a plugin once the host has finished
    /// setting it up.
    pub fn plugin_ready(&self, plugin_id: u32) {
        let outcome = fault::catch(|| self.lock().registry.mark_ready(plugin_id));
        let reports = match outcome {
            Ok(Ok(reports)) => reports,
            Ok(Err(RegistryError::AlreadyReady(_))) => {
                debug!(plugin_id, "plugin already ready");
                Vec::new()
            }
            Ok(Err(e)) => vec![inconsistency(e)],
            Err(caught) => vec![caught.into_report("plugin_ready")],
        };
        self.report_all(&reports);
    }

    fn dispatch(&self, raw: &RawCallback) -> Vec<ErrorReport> {
        let event = raw.decode();
        match &event {
            EngineEvent::Unknown {
                action_code,
                reason,
                ..
            } => {
                warn!(action = action_code, ?reason, "unhandled engine callback");
                return Vec::new();
            }
            EngineEvent::NoOp { action } => {
                trace!(?action, "ignored engine callback");
                return Vec::new();
            }
            _ => {}
        }

        let mut reports = Vec::new();
        let mut core = self.lock();
        let core = &mut *core;

        self.state.apply(&event);
        let applied = apply_registry(&mut core.registry, &event, &mut reports);
        core.patchbay.apply(&event);

        let view = MirrorView {
            state: &self.state,
            registry: &core.registry,
            patchbay: &core.patchbay,
        };
        reports.extend(self.events.publish(&event, &view));

        match applied {
            Applied::Added(plugin_id) => {
                reports.extend(core.registry.notify_added(plugin_id));
            }
            Applied::Removed(removal) => {
                reports.extend(removal.notify());
                if removal.was_last {
                    reports.extend(self.events.publish(&EngineEvent::LastPluginRemoved, &view));
                }
            }
            Applied::Stopped => {
                let dropped = core.registry.drop_orphan_watchers();
                if dropped > 0 {
                    debug!(dropped, "dropped watchers for plugins that never arrived");
                }
            }
            Applied::Nothing => {}
        }
        reports
    }

    fn report_all(&self, reports: &[ErrorReport]) {
        for report in reports {
            error!(kind = %report.kind, origin = %report.origin, "{}", report.message);
            self.errors.report(report);
        }
    }

    fn lock(&self) -> MutexGuard<'_, DispatchCore> {
        self.core.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn inconsistency(e: RegistryError) -> ErrorReport {
    warn!(error = %e, "plugin registry inconsistency");
    e.into_report()
}

/// What the registry side of an event did, for the notifications that follow
/// the general listeners.
enum Applied {
    Nothing,
    Added(u32),
    Removed(crate::registry::Removal),
    Stopped,
}

fn apply_registry(
    registry: &mut PluginRegistry,
    event: &EngineEvent,
    reports: &mut Vec<ErrorReport>,
) -> Applied {
    let outcome = match event {
        EngineEvent::PluginAdded {
            plugin_id,
            plugin_type,
            name,
        } => match registry.add(*plugin_id, *plugin_type, name) {
            Ok(_) => return Applied::Added(*plugin_id),
            Err(e) => Err(e),
        },
        EngineEvent::PluginRemoved { plugin_id } => match registry.remove(*plugin_id) {
            Ok(mut removal) => {
                if let Some(e) = removal.moniker_issue.take() {
                    reports.push(inconsistency(e));
                }
                return Applied::Removed(removal);
            }
            Err(e) => Err(e),
        },
        EngineEvent::PluginRenamed {
            plugin_id,
            new_name,
        } => registry.rename(*plugin_id, new_name),
        EngineEvent::PluginUnavailable { plugin_id, reason } => {
            registry.mark_unavailable(*plugin_id, reason)
        }
        EngineEvent::ReloadInfo { plugin_id }
        | EngineEvent::ReloadParameters { plugin_id }
        | EngineEvent::ReloadPrograms { plugin_id }
        | EngineEvent::ReloadAll { plugin_id } => registry.note_reload(*plugin_id),
        EngineEvent::EngineStopped => {
            if !registry.is_empty() {
                warn!(live = registry.len(), "engine stopped with plugins still registered");
            }
            return Applied::Stopped;
        }
        _ => Ok(()),
    };
    if let Err(e) = outcome {
        reports.push(inconsistency(e));
    }
    Applied::Nothing
}
