use crate::protocol::{ErrorReport, FaultKind};
use std::any::Any;
use std::cell::{Cell, RefCell};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Once;

static HOOK: Once = Once::new();

thread_local! {
    static LAST_PANIC_SITE: RefCell<Option<String>> = const { RefCell::new(None) };
    static CATCH_DEPTH: Cell<u32> = const { Cell::new(0) };
}

/// Chains a panic hook that remembers where the last panic on this thread happened,
/// so caught panics can be reported with their origin. The previous hook only runs
/// for panics outside [`catch`]; contained ones are reported, not printed.
pub fn install_panic_hook() {
    HOOK.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            if let Some(loc) = info.location() {
                let site = format!("{}:{}", loc.file(), loc.line());
                LAST_PANIC_SITE.with(|slot| *slot.borrow_mut() = Some(site));
            }
            if !in_catch() {
                previous(info);
            }
        }));
    });
}

pub(crate) fn in_catch() -> bool {
    CATCH_DEPTH.with(|depth| depth.get() > 0)
}

struct DepthGuard;

impl DepthGuard {
    fn enter() -> Self {
        CATCH_DEPTH.with(|depth| depth.set(depth.get() + 1));
        DepthGuard
    }
}

impl Drop for DepthGuard {
    fn drop(&mut self) {
        CATCH_DEPTH.with(|depth| depth.set(depth.get().saturating_sub(1)));
    }
}

#[derive(Debug, Clone)]
pub struct Caught {
    pub message: String,
    pub site: Option<String>,
}

impl Caught {
    pub fn into_report(self, origin: &str) -> ErrorReport {
        let origin = match self.site {
            Some(site) => format!("{origin} ({site})"),
            None => origin.to_string(),
        };
        ErrorReport::new(FaultKind::Panic, self.message, origin)
    }
}

/// Runs `f`, turning a panic into a [`Caught`] value instead of unwinding further.
pub fn catch<T>(f: impl FnOnce() -> T) -> Result<T, Caught> {
    LAST_PANIC_SITE.with(|slot| slot.borrow_mut().take());
    let outcome = {
        let _depth = DepthGuard::enter();
        panic::catch_unwind(AssertUnwindSafe(f))
    };
    outcome.map_err(|payload| Caught {
        message: panic_message(payload),
        site: LAST_PANIC_SITE.with(|slot| slot.borrow_mut().take()),
    })
}

pub fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        return (*msg).to_string();
    }
    if let Some(msg) = payload.downcast_ref::<String>() {
        return msg.clone();
    }
    "non-string panic payload".to_string()
}
