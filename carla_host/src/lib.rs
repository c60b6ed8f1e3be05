mod config;
mod dispatcher;
mod engine_api;
mod fault;
mod host;
mod listener;
mod patchbay;
mod protocol;
mod registry;
mod state;

pub use config::{ConfigError, HostConfig};
pub use dispatcher::Dispatcher;
pub use engine_api::{CarlaStandalone, EngineApi, EngineCallbackFn, EngineLoadError};
pub use host::{CarlaHost, HostError};
pub use listener::{
    error_channel, event_channel, ChannelListener, ErrorBus, ErrorListener, EventBus,
    EventListener, Fabric, FnListener, ListenerError, MirrorView, SubscriptionId,
};
pub use patchbay::{Connection, PatchbayClient, PatchbayMirror, PatchbayPort, PortGroup};
pub use protocol::{
    ActionCode, EngineEvent, ErrorReport, FaultKind, RawCallback, UnknownReason, ERROR_QUEUE_CAP,
    EVENT_QUEUE_CAP,
};
pub use registry::{
    default_moniker, MonikerCounter, MonikerFn, PluginListener, PluginRecord, PluginRegistry,
    PluginWatchers, RegistryError, Removal,
};
pub use state::{EngineState, EngineStateMirror};

use std::ffi::{c_void, CStr};
use std::os::raw::c_char;
use tracing::error;

/// The engine callback. Register it with [`Dispatcher::as_callback_context`] as `ptr`.
///
/// A null `ptr` is ignored and a null `value_str` reads as an empty string. Nothing
/// unwinds out of this function.
///
/// # Safety
///
/// `ptr` must be null or point at a live [`Dispatcher`], and `value_str` must be null
/// or a NUL-terminated string valid for the duration of the call.
#[no_mangle]
pub unsafe extern "C" fn engine_callback(
    ptr: *mut c_void,
    action: i32,
    plugin_id: u32,
    value_1: i32,
    value_2: i32,
    value_3: i32,
    value_f: f32,
    value_str: *const c_char,
) {
    let outcome = fault::catch(|| {
        if ptr.is_null() {
            return;
        }
        let dispatcher = unsafe { &*(ptr as *const Dispatcher) };
        let string_val = if value_str.is_null() {
            String::new()
        } else {
            unsafe { CStr::from_ptr(value_str) }
                .to_string_lossy()
                .into_owned()
        };
        dispatcher.handle(&RawCallback {
            action,
            plugin_id,
            value_1,
            value_2,
            value_3,
            float_val: value_f,
            string_val,
        });
    });
    if let Err(caught) = outcome {
        error!(action, plugin_id, message = %caught.message, "engine callback panicked");
    }
}
