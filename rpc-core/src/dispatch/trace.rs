//! Panic capture for handlers.
//!
//! A process-wide panic hook is installed on first use. While a handler runs
//! on the current thread, the hook records the panic location and a backtrace
//! instead of printing; everywhere else it defers to the previous hook.

use std::any::Any;
use std::backtrace::{Backtrace, BacktraceStatus};
use std::cell::{Cell, RefCell};
use std::panic::{self, AssertUnwindSafe, PanicHookInfo};
use std::sync::Once;

static INSTALL: Once = Once::new();

thread_local! {
    static IN_HANDLER: Cell<bool> = const { Cell::new(false) };
    static LAST_TRACE: RefCell<Option<String>> = const { RefCell::new(None) };
}

/// A panic caught while running a handler.
#[derive(Debug)]
pub(crate) struct CaughtPanic {
    pub message: String,
    /// `at <file:line:col>` followed by the stack backtrace.
    pub trace: String,
}

/// Runs `f`, turning a panic into a `CaughtPanic` with its location and backtrace.
pub(crate) fn catch_panic<R>(f: impl FnOnce() -> R) -> Result<R, CaughtPanic> {
    install_hook();

    IN_HANDLER.with(|flag| flag.set(true));
    let result = panic::catch_unwind(AssertUnwindSafe(f));
    IN_HANDLER.with(|flag| flag.set(false));

    result.map_err(|payload| CaughtPanic {
        message: panic_message(payload.as_ref()),
        trace: LAST_TRACE
            .with(|slot| slot.borrow_mut().take())
            .unwrap_or_else(|| "at unknown location".to_string()),
    })
}

/// Debug rendering of a handler error, with a backtrace taken here when the
/// error did not capture one itself.
pub(crate) fn error_report(error: &anyhow::Error) -> String {
    let report = format!("{:?}", error);
    if error.backtrace().status() == BacktraceStatus::Captured {
        return report;
    }
    format!("{}\n\nStack backtrace:\n{}", report, Backtrace::force_capture())
}

fn install_hook() {
    INSTALL.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info: &PanicHookInfo<'_>| {
            if IN_HANDLER.try_with(Cell::get).unwrap_or(false) {
                let location = info
                    .location()
                    .map(|location| location.to_string())
                    .unwrap_or_else(|| "unknown location".to_string());
                let trace = format!("at {}\n{}", location, Backtrace::force_capture());
                let _ = LAST_TRACE.try_with(|slot| *slot.borrow_mut() = Some(trace));
            } else {
                previous(info);
            }
        }));
    });
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
