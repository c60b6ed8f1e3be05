use anyhow::Context;
use c_str_macro::c_str;
use carla_host::{ActionCode, CarlaHost, EngineApi, EngineCallbackFn, HostConfig, RawCallback};
use clap::Parser;
use crossbeam_channel::Receiver;
use std::ffi::{c_void, CStr, CString};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "mock_engine")]
struct Args {
    /// JSON-lines file of raw callbacks to replay instead of the built-in session.
    #[arg(long, value_name = "PATH")]
    script: Option<PathBuf>,

    #[arg(long)]
    driver: Option<String>,

    #[arg(long)]
    client_name: Option<String>,
}

/// Stands in for libcarla: remembers the registered callback and lets `main`
/// fire it the way the engine thread would.
struct MockEngine {
    callback: Option<(EngineCallbackFn, *mut c_void)>,
    running: bool,
}

impl MockEngine {
    fn new() -> Self {
        Self {
            callback: None,
            running: false,
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn emit(
        &self,
        action: i32,
        plugin_id: u32,
        value_1: i32,
        value_2: i32,
        value_3: i32,
        value_f: f32,
        value_str: &CStr,
    ) {
        let Some((callback, ctx)) = self.callback else {
            warn!(action, "no callback registered, dropping");
            return;
        };
        unsafe {
            callback(
                ctx,
                action,
                plugin_id,
                value_1,
                value_2,
                value_3,
                value_f,
                value_str.as_ptr(),
            )
        };
    }

    fn emit_raw(&self, raw: &RawCallback) -> anyhow::Result<()> {
        let text = CString::new(raw.string_val.as_str())
            .with_context(|| format!("string_val of action {} contains a NUL byte", raw.action))?;
        self.emit(
            raw.action,
            raw.plugin_id,
            raw.value_1,
            raw.value_2,
            raw.value_3,
            raw.float_val,
            &text,
        );
        Ok(())
    }
}

impl EngineApi for MockEngine {
    fn set_callback(&mut self, callback: EngineCallbackFn, ctx: *mut c_void) {
        self.callback = Some((callback, ctx));
    }

    fn engine_init(&mut self, _driver_name: &str, _client_name: &str) -> bool {
        self.running = true;
        true
    }

    fn engine_close(&mut self) -> bool {
        std::mem::replace(&mut self.running, false)
    }

    fn is_engine_running(&self) -> bool {
        self.running
    }

    fn last_error(&self) -> Option<String> {
        None
    }
}

fn builtin_session(engine: &MockEngine, driver: &CStr) {
    use ActionCode as A;
    engine.emit(A::EngineStarted.as_raw(), 0, 2, 1, 512, 48000.0, driver);
    engine.emit(A::PluginAdded.as_raw(), 0, 4, 0, 0, 0.0, c_str!("Synth"));
    engine.emit(A::PatchbayClientAdded.as_raw(), 1, 0, -1, 0, 0.0, c_str!("system"));
    engine.emit(A::PatchbayClientAdded.as_raw(), 2, 1, 0, 0, 0.0, c_str!("Synth"));
    engine.emit(A::PatchbayPortAdded.as_raw(), 1, 1, 0x1, 0, 0.0, c_str!("playback_1"));
    engine.emit(A::PatchbayPortAdded.as_raw(), 2, 2, 0x1 | 0x8, 0, 0.0, c_str!("out_1"));
    engine.emit(A::ParameterValueChanged.as_raw(), 0, 3, 0, 0, 0.25, c_str!(""));
    engine.emit(A::PatchbayConnectionAdded.as_raw(), 1, 0, 0, 0, 0.0, c_str!("2:2:1:1"));
    engine.emit(A::Idle.as_raw(), 0, 0, 0, 0, 0.0, c_str!(""));
    engine.emit(A::PatchbayConnectionRemoved.as_raw(), 1, 0, 0, 0, 0.0, c_str!(""));
    engine.emit(A::PluginRemoved.as_raw(), 0, 0, 0, 0, 0.0, c_str!(""));
    engine.emit(A::EngineStopped.as_raw(), 0, 0, 0, 0, 0.0, c_str!(""));
}

fn drain<T: serde::Serialize>(rx: &Receiver<T>) -> anyhow::Result<()> {
    for item in rx.try_iter() {
        println!("{}", serde_json::to_string(&item)?);
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();
    let args = Args::parse();

    let mut config = HostConfig::from_env()?;
    if let Some(driver) = args.driver {
        config.driver_name = driver;
    }
    if let Some(name) = args.client_name {
        config.client_name = name;
    }

    let mut host = CarlaHost::new(MockEngine::new(), config);
    let (_events, events_rx) = host.event_channel();
    let (_errors, errors_rx) = host.error_channel();
    host.start()?;
    info!(driver = %host.config().driver_name, "mock engine started");

    match &args.script {
        Some(path) => {
            let script = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read script {}", path.display()))?;
            for (n, line) in script.lines().enumerate() {
                let line = line.trim();
                if line.is_empty() || line.starts_with('#') {
                    continue;
                }
                let raw: RawCallback = serde_json::from_str(line)
                    .with_context(|| format!("{}:{}: bad callback", path.display(), n + 1))?;
                host.api().emit_raw(&raw)?;
                drain(&events_rx)?;
            }
        }
        None => {
            let driver = CString::new(host.config().driver_name.as_str())
                .context("driver name contains a NUL byte")?;
            builtin_session(host.api(), &driver);
            drain(&events_rx)?;
        }
    }

    for report in errors_rx.try_iter() {
        warn!(kind = %report.kind, origin = %report.origin, "{}", report.message);
    }
    host.stop();
    Ok(())
}
