//! Panic recovery.
//!
//! # Responsibilities
//! - Capture a backtrace at the panic site (the unwind has already left it by
//!   the time the engine sees the payload)
//! - Turn a panic payload into a 500 `HttpError` carrying cause and trace
//! - Recognize the `Abort` sentinel, which is re-raised and never logged
//! - Keep the previous hook quiet for panics the engine recovers, so a
//!   recovered panic is reported once, by the error handler

use std::any::Any;
use std::backtrace::Backtrace;
use std::cell::{Cell, RefCell};
use std::panic;
use std::sync::Once;

use crate::error::{BoxError, HttpError};

/// Panic payload that aborts the connection without an error response.
///
/// Raise it with [`abort`]. The engine lets it unwind into the transport,
/// which drops the connection. The panic hook stays silent for it.
#[derive(Debug, Clone, Copy)]
pub struct Abort;

/// Abort the current request's connection.
pub fn abort() -> ! {
    panic::resume_unwind(Box::new(Abort))
}

/// Cause attached to errors built from recovered panics.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct Panicked(pub String);

thread_local! {
    static LAST_BACKTRACE: RefCell<Option<String>> = const { RefCell::new(None) };
    static RECOVERING: Cell<usize> = const { Cell::new(0) };
}

/// Marks the current thread as running code whose panics are recovered.
///
/// Only hold it across a synchronous call or a single `poll`; a task may
/// move to another thread between polls.
pub(crate) struct RecoveryScope(());

pub(crate) fn scope() -> RecoveryScope {
    RECOVERING.with(|depth| depth.set(depth.get() + 1));
    RecoveryScope(())
}

impl Drop for RecoveryScope {
    fn drop(&mut self) {
        RECOVERING.with(|depth| depth.set(depth.get().saturating_sub(1)));
    }
}

fn recovering() -> bool {
    RECOVERING.with(|depth| depth.get() > 0)
}

static HOOK: Once = Once::new();

/// Install the backtrace-capturing panic hook once per process.
///
/// The previous hook still runs for panics outside a [`RecoveryScope`].
pub(crate) fn install_panic_hook() {
    HOOK.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            if info.payload().is::<Abort>() {
                return;
            }
            let trace = Backtrace::force_capture().to_string();
            LAST_BACKTRACE.with(|slot| *slot.borrow_mut() = Some(trace));
            if !recovering() {
                previous(info);
            }
        }));
    });
}

fn take_backtrace() -> String {
    LAST_BACKTRACE
        .with(|slot| slot.borrow_mut().take())
        .unwrap_or_else(|| Backtrace::force_capture().to_string())
}

/// Human-readable message of a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else if let Some(err) = payload.downcast_ref::<BoxError>() {
        err.to_string()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Convert a recovered panic into a 500 with cause and trace.
pub(crate) fn into_http_error(payload: Box<dyn Any + Send>) -> HttpError {
    let stack = take_backtrace();
    let cause: BoxError = match payload.downcast::<BoxError>() {
        Ok(err) => *err,
        Err(payload) => Box::new(Panicked(panic_message(payload.as_ref()))),
    };
    HttpError::internal_server_error()
        .with_internal(cause)
        .with_stack(stack)
}
