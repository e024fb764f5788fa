//! Flow-exit signalling.
//!
//! `fail_now`, `skip_now` and friends must not return to their caller. They
//! raise a tagged unwind carrying a [`FlowExit`], which the boundary that
//! started the flow catches with [`guard`]. Anything between the raise and the
//! boundary gets to run its own finalisers and re-raise with [`resume`].
//!
//! Foreign panics (a failed `assert!`, an `unwrap` on `None`) travel the same
//! path and surface as [`Outcome::Panicked`].

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

/// Why a flow stopped early.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowExit {
    /// `fail_now` / `fatal`
    Fail,
    /// `skip_now` / `skip`
    Skip,
}

/// How a guarded flow ended.
pub enum Outcome {
    Completed,
    Exited(FlowExit),
    Panicked(Box<dyn Any + Send + 'static>),
}

impl Outcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, Outcome::Completed)
    }

    /// Human readable message of a foreign panic, if this outcome is one.
    pub fn panic_message(&self) -> Option<String> {
        let Outcome::Panicked(payload) = self else {
            return None;
        };
        Some(payload_message(payload.as_ref()))
    }
}

impl std::fmt::Debug for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Outcome::Completed => write!(f, "Completed"),
            Outcome::Exited(exit) => write!(f, "Exited({:?})", exit),
            Outcome::Panicked(payload) => {
                write!(f, "Panicked({:?})", payload_message(payload.as_ref()))
            }
        }
    }
}

/// Leaves the current flow. Never returns.
///
/// The unwind is started with [`panic::resume_unwind`], so the panic hook is
/// not invoked and nothing is printed.
pub fn exit(kind: FlowExit) -> ! {
    panic::resume_unwind(Box::new(kind))
}

/// Runs `f` as a flow and reports how it ended.
pub fn guard<F: FnOnce()>(f: F) -> Outcome {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(()) => Outcome::Completed,
        Err(payload) => match payload.downcast::<FlowExit>() {
            Ok(kind) => Outcome::Exited(*kind),
            Err(other) => Outcome::Panicked(other),
        },
    }
}

/// Re-raises an outcome caught by [`guard`]. Completed outcomes return.
pub fn resume(outcome: Outcome) {
    match outcome {
        Outcome::Completed => {}
        Outcome::Exited(kind) => exit(kind),
        Outcome::Panicked(payload) => panic::resume_unwind(payload),
    }
}

pub(crate) fn payload_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        return (*s).to_string();
    }
    if let Some(s) = payload.downcast_ref::<String>() {
        return s.clone();
    }
    "panic with a non-string payload".to_string()
}
