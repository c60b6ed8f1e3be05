use crate::config::HostConfig;
use crate::dispatcher::Dispatcher;
use crate::engine_api::{CarlaStandalone, EngineApi, EngineLoadError};
use crate::listener::SubscriptionId;
use crate::protocol::{EngineEvent, ErrorReport, ERROR_QUEUE_CAP};
use crate::registry::MonikerFn;
use crossbeam_channel::Receiver;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum HostError {
    #[error(transparent)]
    Load(#[from] EngineLoadError),
    #[error("could not start the engine with driver {driver}: {reason}")]
    EngineInit { driver: String, reason: String },
}

/// One engine session: owns the engine handle and the dispatcher its callbacks land in.
pub struct CarlaHost<A: EngineApi> {
    api: A,
    config: HostConfig,
    dispatcher: Arc<Dispatcher>,
    running: bool,
}

impl CarlaHost<CarlaStandalone> {
    /// Loads `libcarla_standalone2` from the configured path.
    pub fn open(config: HostConfig) -> Result<Self, HostError> {
        let api = CarlaStandalone::load(config.library_path.as_deref())?;
        Ok(Self::new(api, config))
    }
}

impl<A: EngineApi> CarlaHost<A> {
    pub fn new(api: A, config: HostConfig) -> Self {
        Self::with_dispatcher(api, config, Arc::new(Dispatcher::new()))
    }

    pub fn with_monikers(api: A, config: HostConfig, moniker_fn: MonikerFn) -> Self {
        Self::with_dispatcher(api, config, Arc::new(Dispatcher::with_monikers(moniker_fn)))
    }

    fn with_dispatcher(api: A, config: HostConfig, dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            api,
            config,
            dispatcher,
            running: false,
        }
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    pub fn config(&self) -> &HostConfig {
        &self.config
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Event channel sized from the config.
    pub fn event_channel(&self) -> (SubscriptionId, Receiver<EngineEvent>) {
        self.dispatcher.event_channel(self.config.event_queue_cap)
    }

    pub fn error_channel(&self) -> (SubscriptionId, Receiver<ErrorReport>) {
        self.dispatcher.error_channel(ERROR_QUEUE_CAP)
    }

    pub fn plugin_ready(&self, plugin_id: u32) {
        self.dispatcher.plugin_ready(plugin_id);
    }

    /// Registers the callback and starts the engine on the configured driver.
    pub fn start(&mut self) -> Result<(), HostError> {
        if self.running {
            return Ok(());
        }
        let ctx = self.dispatcher.as_callback_context();
        self.api.set_callback(crate::engine_callback, ctx);

        let driver = self.config.driver_name.clone();
        if !self.api.engine_init(&driver, &self.config.client_name) {
            let reason = self
                .api
                .last_error()
                .unwrap_or_else(|| "engine gave no reason".to_string());
            warn!(%driver, %reason, "engine failed to start");
            return Err(HostError::EngineInit { driver, reason });
        }
        self.running = true;
        info!(%driver, client = %self.config.client_name, "engine started");
        Ok(())
    }

    /// Closes the engine if this session started it. Returns whether a close happened.
    pub fn stop(&mut self) -> bool {
        if !self.running {
            return false;
        }
        self.running = false;
        if !self.api.engine_close() {
            warn!(error = ?self.api.last_error(), "engine close reported failure");
        }
        debug!("engine closed");
        true
    }
}

impl<A: EngineApi> Drop for CarlaHost<A> {
    fn drop(&mut self) {
        self.stop();
    }
}
