//! Shared helpers for the integration tests.
#![allow(dead_code)]

use std::sync::{Arc, Mutex, PoisonError};

use testcase::{Config, OrderingMode, Recorder, Spec};

/// Registration order, fixed seed, no tag filters.
pub fn defined() -> Config {
    Config::default()
        .with_ordering(OrderingMode::Defined)
        .with_seed(42)
}

/// Builds a spec on a fresh recorder, runs it, and hands the recorder back.
pub fn record<F>(config: Config, f: F) -> Recorder
where
    F: FnOnce(&mut Spec<'_>),
{
    let mut rec = Recorder::new("spec");
    {
        let mut s = Spec::with_config(&mut rec, config);
        f(&mut s);
        s.finish();
    }
    rec
}

/// Thread-safe event log shared between a test and its leaves.
#[derive(Debug, Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    pub fn push(&self, entry: impl Into<String>) {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}
