use libloading::Library;
use std::ffi::{c_void, CStr, CString};
use std::os::raw::c_char;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

/// `EngineCallbackFunc` from CarlaHost.h.
pub type EngineCallbackFn = unsafe extern "C" fn(
    ptr: *mut c_void,
    action: i32,
    plugin_id: u32,
    value_1: i32,
    value_2: i32,
    value_3: i32,
    value_f: f32,
    value_str: *const c_char,
);

/// The slice of the engine's control surface the host session needs.
pub trait EngineApi {
    /// Registers the callback the engine reports through; `ctx` is passed back verbatim.
    fn set_callback(&mut self, callback: EngineCallbackFn, ctx: *mut c_void);
    fn engine_init(&mut self, driver_name: &str, client_name: &str) -> bool;
    fn engine_close(&mut self) -> bool;
    fn is_engine_running(&self) -> bool;
    fn last_error(&self) -> Option<String>;
}

#[derive(Debug, Error)]
pub enum EngineLoadError {
    #[error("failed to load {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: libloading::Error,
    },
    #[error("missing symbol `{symbol}` in {}: {source}", path.display())]
    Symbol {
        path: PathBuf,
        symbol: &'static str,
        #[source]
        source: libloading::Error,
    },
    #[error("carla_standalone_host_init returned null")]
    NullHandle,
}

type HostHandle = *mut c_void;
type HostInitFn = unsafe extern "C" fn() -> HostHandle;
type SetCallbackFn = unsafe extern "C" fn(HostHandle, EngineCallbackFn, *mut c_void);
type EngineInitFn = unsafe extern "C" fn(HostHandle, *const c_char, *const c_char) -> bool;
type HandleBoolFn = unsafe extern "C" fn(HostHandle) -> bool;
type LastErrorFn = unsafe extern "C" fn(HostHandle) -> *const c_char;

#[cfg(target_os = "windows")]
pub const DEFAULT_LIBRARY: &str = "libcarla_standalone2.dll";
#[cfg(target_os = "macos")]
pub const DEFAULT_LIBRARY: &str = "libcarla_standalone2.dylib";
#[cfg(not(any(target_os = "windows", target_os = "macos")))]
pub const DEFAULT_LIBRARY: &str = "libcarla_standalone2.so";

/// [`EngineApi`] over `libcarla_standalone2`, resolved at runtime.
pub struct CarlaStandalone {
    handle: HostHandle,
    set_engine_callback: SetCallbackFn,
    engine_init: EngineInitFn,
    engine_close: HandleBoolFn,
    is_engine_running: HandleBoolFn,
    get_last_error: LastErrorFn,
    // Keeps the function pointers above valid.
    _lib: Library,
}

fn symbol<T: Copy>(
    lib: &Library,
    path: &Path,
    name: &'static str,
) -> Result<T, EngineLoadError> {
    let mut raw = name.as_bytes().to_vec();
    raw.push(0);
    // SAFETY: every `T` used below matches the prototype declared in CarlaHost.h.
    unsafe { lib.get::<T>(&raw) }
        .map(|sym| *sym)
        .map_err(|source| EngineLoadError::Symbol {
            path: path.to_path_buf(),
            symbol: name,
            source,
        })
}

impl CarlaStandalone {
    pub fn load(path: Option<&Path>) -> Result<Self, EngineLoadError> {
        let path = path.unwrap_or_else(|| Path::new(DEFAULT_LIBRARY));
        // SAFETY: loading libcarla runs its static initialisers, nothing else.
        let lib = unsafe { Library::new(path) }.map_err(|source| EngineLoadError::Open {
            path: path.to_path_buf(),
            source,
        })?;

        let host_init: HostInitFn = symbol(&lib, path, "carla_standalone_host_init")?;
        let set_engine_callback = symbol(&lib, path, "carla_set_engine_callback")?;
        let engine_init = symbol(&lib, path, "carla_engine_init")?;
        let engine_close = symbol(&lib, path, "carla_engine_close")?;
        let is_engine_running = symbol(&lib, path, "carla_is_engine_running")?;
        let get_last_error = symbol(&lib, path, "carla_get_last_error")?;

        let handle = unsafe { host_init() };
        if handle.is_null() {
            return Err(EngineLoadError::NullHandle);
        }
        debug!(path = %path.display(), "loaded carla standalone library");

        Ok(Self {
            handle,
            set_engine_callback,
            engine_init,
            engine_close,
            is_engine_running,
            get_last_error,
            _lib: lib,
        })
    }
}

impl EngineApi for CarlaStandalone {
    fn set_callback(&mut self, callback: EngineCallbackFn, ctx: *mut c_void) {
        unsafe { (self.set_engine_callback)(self.handle, callback, ctx) }
    }

    fn engine_init(&mut self, driver_name: &str, client_name: &str) -> bool {
        let (Ok(driver), Ok(client)) = (CString::new(driver_name), CString::new(client_name))
        else {
            warn!(driver_name, client_name, "engine names contain NUL bytes");
            return false;
        };
        unsafe { (self.engine_init)(self.handle, driver.as_ptr(), client.as_ptr()) }
    }

    fn engine_close(&mut self) -> bool {
        unsafe { (self.engine_close)(self.handle) }
    }

    fn is_engine_running(&self) -> bool {
        unsafe { (self.is_engine_running)(self.handle) }
    }

    fn last_error(&self) -> Option<String> {
        let msg = unsafe { (self.get_last_error)(self.handle) };
        if msg.is_null() {
            return None;
        }
        let msg = unsafe { CStr::from_ptr(msg) }.to_string_lossy().into_owned();
        (!msg.is_empty()).then_some(msg)
    }
}
