use crate::fault;
use crate::listener::ListenerError;
use crate::protocol::{ErrorReport, FaultKind};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("plugin {0} is already registered")]
    DuplicatePlugin(u32),
    #[error("plugin {0} is not registered")]
    UnknownPlugin(u32),
    #[error("moniker count for {0:?} is missing")]
    MonikerMissing(String),
    #[error("moniker count for {0:?} is already zero")]
    MonikerUnderflow(String),
    #[error("plugin {0} was already marked ready")]
    AlreadyReady(u32),
}

impl RegistryError {
    pub fn into_report(self) -> ErrorReport {
        ErrorReport::new(
            FaultKind::RegistryInconsistency,
            self.to_string(),
            "plugin_registry",
        )
    }
}

/// Notifications scoped to one plugin instance.
pub trait PluginListener: Send + Sync {
    fn on_added(&self, _plugin: &PluginRecord) -> Result<(), ListenerError> {
        Ok(())
    }

    /// Fired once, after the host finished setting the plugin up.
    fn on_ready(&self, _plugin: &PluginRecord) -> Result<(), ListenerError> {
        Ok(())
    }

    /// Fired once, while the plugin is being removed.
    fn on_removed(&self, _plugin: &PluginRecord) -> Result<(), ListenerError> {
        Ok(())
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct PluginRecord {
    pub plugin_id: u32,
    pub plugin_type: i32,
    pub original_name: String,
    pub moniker: String,
    pub name: String,
    pub removed: bool,
    pub ready: bool,
    pub unavailable: Option<String>,
    pub reloads: u32,
}

/// Builds a display name from the base name and how many live plugins share it.
pub type MonikerFn = fn(&str, u32) -> String;

pub fn default_moniker(name: &str, count: u32) -> String {
    if count <= 1 {
        name.to_string()
    } else {
        format!("{name} {count}")
    }
}

#[derive(Debug, Default)]
pub struct MonikerCounter {
    counts: HashMap<String, u32>,
}

impl MonikerCounter {
    pub fn acquire(&mut self, name: &str) -> u32 {
        let count = self.counts.entry(name.to_string()).or_insert(0);
        *count += 1;
        *count
    }

    pub fn release(&mut self, name: &str) -> Result<u32, RegistryError> {
        let Some(count) = self.counts.get_mut(name) else {
            return Err(RegistryError::MonikerMissing(name.to_string()));
        };
        if *count == 0 {
            return Err(RegistryError::MonikerUnderflow(name.to_string()));
        }
        *count -= 1;
        Ok(*count)
    }

    pub fn count(&self, name: &str) -> Option<u32> {
        self.counts.get(name).copied()
    }
}

/// Plugin-scoped listeners, keyed by plugin id. Shares its own short lock so
/// listeners can be attached while a dispatch is in progress.
#[derive(Clone, Default)]
pub struct PluginWatchers {
    inner: Arc<Mutex<HashMap<u32, Vec<Arc<dyn PluginListener>>>>>,
}

impl PluginWatchers {
    pub fn watch(&self, plugin_id: u32, listener: Arc<dyn PluginListener>) {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(plugin_id)
            .or_default()
            .push(listener);
    }

    pub fn unwatch_all(&self, plugin_id: u32) -> usize {
        self.take(plugin_id).len()
    }

    /// Drops every entry whose id fails `keep`. Returns how many ids were dropped.
    pub fn retain(&self, mut keep: impl FnMut(u32) -> bool) -> usize {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let before = inner.len();
        inner.retain(|id, _| keep(*id));
        before - inner.len()
    }

    fn snapshot(&self, plugin_id: u32) -> Vec<Arc<dyn PluginListener>> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&plugin_id)
            .cloned()
            .unwrap_or_default()
    }

    fn take(&self, plugin_id: u32) -> Vec<Arc<dyn PluginListener>> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&plugin_id)
            .unwrap_or_default()
    }
}

#[derive(Clone, Copy)]
enum Notice {
    Added,
    Ready,
    Removed,
}

impl Notice {
    fn label(self) -> &'static str {
        match self {
            Notice::Added => "added",
            Notice::Ready => "ready",
            Notice::Removed => "removed",
        }
    }
}

fn notify(
    listeners: &[Arc<dyn PluginListener>],
    record: &PluginRecord,
    notice: Notice,
) -> Vec<ErrorReport> {
    let mut reports = Vec::new();
    for listener in listeners {
        let origin = format!("plugin {} {} listener", record.plugin_id, notice.label());
        let outcome = fault::catch(|| match notice {
            Notice::Added => listener.on_added(record),
            Notice::Ready => listener.on_ready(record),
            Notice::Removed => listener.on_removed(record),
        });
        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                reports.push(ErrorReport::new(FaultKind::ListenerFailed, e.to_string(), origin))
            }
            Err(caught) => reports.push(caught.into_report(&origin)),
        }
    }
    reports
}

/// A plugin that has left the registry but whose removal listeners have not run yet.
pub struct Removal {
    pub record: PluginRecord,
    pub was_last: bool,
    /// Set when the moniker count was already out of step; the removal still happened.
    pub moniker_issue: Option<RegistryError>,
    listeners: Vec<Arc<dyn PluginListener>>,
}

impl std::fmt::Debug for Removal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Removal")
            .field("record", &self.record)
            .field("was_last", &self.was_last)
            .field("moniker_issue", &self.moniker_issue)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl Removal {
    pub fn notify(&self) -> Vec<ErrorReport> {
        notify(&self.listeners, &self.record, Notice::Removed)
    }
}

pub struct PluginRegistry {
    plugins: HashMap<u32, PluginRecord>,
    monikers: MonikerCounter,
    moniker_fn: MonikerFn,
    watchers: PluginWatchers,
}

impl Default for PluginRegistry {
    fn default() -> Self {
        Self::new(default_moniker)
    }
}

impl PluginRegistry {
    pub fn new(moniker_fn: MonikerFn) -> Self {
        Self {
            plugins: HashMap::new(),
            monikers: MonikerCounter::default(),
            moniker_fn,
            watchers: PluginWatchers::default(),
        }
    }

    pub fn watchers(&self) -> &PluginWatchers {
        &self.watchers
    }

    pub fn watch(&self, plugin_id: u32, listener: Arc<dyn PluginListener>) {
        self.watchers.watch(plugin_id, listener);
    }

    pub fn add(
        &mut self,
        plugin_id: u32,
        plugin_type: i32,
        name: &str,
    ) -> Result<&PluginRecord, RegistryError> {
        if self.plugins.contains_key(&plugin_id) {
            return Err(RegistryError::DuplicatePlugin(plugin_id));
        }
        let count = self.monikers.acquire(name);
        let moniker = self.unique_moniker(name, count);
        debug!(plugin_id, %moniker, "plugin added");
        let record = PluginRecord {
            plugin_id,
            plugin_type,
            original_name: name.to_string(),
            name: moniker.clone(),
            moniker,
            removed: false,
            ready: false,
            unavailable: None,
            reloads: 0,
        };
        Ok(self.plugins.entry(plugin_id).or_insert(record))
    }

    /// Evicts a plugin. The moniker count is released first so a failure later in
    /// the removal cannot leave it behind; a missing count is logged and carried on
    /// the returned [`Removal`].
    pub fn remove(&mut self, plugin_id: u32) -> Result<Removal, RegistryError> {
        let Some(original_name) = self
            .plugins
            .get(&plugin_id)
            .map(|p| p.original_name.clone())
        else {
            return Err(RegistryError::UnknownPlugin(plugin_id));
        };

        let moniker_issue = match self.monikers.release(&original_name) {
            Ok(_) => None,
            Err(e) => {
                warn!(plugin_id, error = %e, "moniker count out of step");
                Some(e)
            }
        };

        let Some(mut record) = self.plugins.remove(&plugin_id) else {
            return Err(RegistryError::UnknownPlugin(plugin_id));
        };
        record.removed = true;
        debug!(plugin_id, moniker = %record.moniker, "plugin removed");

        Ok(Removal {
            record,
            was_last: self.plugins.is_empty(),
            moniker_issue,
            listeners: self.watchers.take(plugin_id),
        })
    }

    pub fn rename(&mut self, plugin_id: u32, new_name: &str) -> Result<(), RegistryError> {
        let record = self.get_mut(plugin_id)?;
        record.name = new_name.to_string();
        Ok(())
    }

    pub fn mark_unavailable(&mut self, plugin_id: u32, reason: &str) -> Result<(), RegistryError> {
        let record = self.get_mut(plugin_id)?;
        record.unavailable = Some(reason.to_string());
        Ok(())
    }

    pub fn note_reload(&mut self, plugin_id: u32) -> Result<(), RegistryError> {
        let record = self.get_mut(plugin_id)?;
        record.reloads += 1;
        Ok(())
    }

    /// Marks the plugin ready and fires its ready listeners, once.
    pub fn mark_ready(&mut self, plugin_id: u32) -> Result<Vec<ErrorReport>, RegistryError> {
        let record = self.get_mut(plugin_id)?;
        if record.ready {
            return Err(RegistryError::AlreadyReady(plugin_id));
        }
        record.ready = true;
        let record = record.clone();
        debug!(plugin_id, "plugin ready");
        Ok(notify(&self.watchers.snapshot(plugin_id), &record, Notice::Ready))
    }

    pub fn notify_added(&self, plugin_id: u32) -> Vec<ErrorReport> {
        match self.plugins.get(&plugin_id) {
            Some(record) => notify(&self.watchers.snapshot(plugin_id), record, Notice::Added),
            None => Vec::new(),
        }
    }

    /// Watchers attached to ids that are not live. Called when the engine stops,
    /// since those plugins can no longer arrive in this session.
    pub fn drop_orphan_watchers(&self) -> usize {
        self.watchers.retain(|id| self.plugins.contains_key(&id))
    }

    /// The live count picks the first candidate; when a live plugin already holds
    /// that moniker (an earlier instance was removed), the suffix moves up.
    fn unique_moniker(&self, name: &str, count: u32) -> String {
        let taken = |m: &str| self.plugins.values().any(|p| p.moniker == m);
        let mut moniker = (self.moniker_fn)(name, count);
        let mut n = count;
        for _ in 0..=self.plugins.len() {
            if !taken(&moniker) {
                return moniker;
            }
            n = n.saturating_add(1);
            moniker = (self.moniker_fn)(name, n);
        }
        warn!(%moniker, "no free moniker, reusing one already taken");
        moniker
    }

    pub fn get(&self, plugin_id: u32) -> Option<&PluginRecord> {
        self.plugins.get(&plugin_id)
    }

    pub fn is_live(&self, plugin_id: u32) -> bool {
        self.plugins.contains_key(&plugin_id)
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PluginRecord> {
        self.plugins.values()
    }

    pub fn moniker_count(&self, name: &str) -> Option<u32> {
        self.monikers.count(name)
    }

    fn get_mut(&mut self, plugin_id: u32) -> Result<&mut PluginRecord, RegistryError> {
        self.plugins
            .get_mut(&plugin_id)
            .ok_or(RegistryError::UnknownPlugin(plugin_id))
    }
}
