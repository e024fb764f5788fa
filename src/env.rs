//! Scoped environment variables.
//!
//! The process environment is global: specs that change it should be marked
//! with [`crate::Spec::has_side_effect`] so they never run concurrently.

use std::ffi::OsString;

use crate::tb::TB;

/// Sets `key` for the rest of the flow; the previous value comes back in a
/// cleanup.
pub fn set_env(tb: &mut dyn TB, key: &str, value: &str) {
    tb.helper();
    let previous = std::env::var_os(key);
    tracing::debug!(key, value, "setting environment variable");
    std::env::set_var(key, value);
    register_restore(tb, key, previous);
}

/// Removes `key` for the rest of the flow.
pub fn unset_env(tb: &mut dyn TB, key: &str) {
    tb.helper();
    let previous = std::env::var_os(key);
    tracing::debug!(key, "unsetting environment variable");
    std::env::remove_var(key);
    register_restore(tb, key, previous);
}

fn register_restore(tb: &mut dyn TB, key: &str, previous: Option<OsString>) {
    let key = key.to_string();
    tb.cleanup(Box::new(move |_| match previous {
        Some(value) => std::env::set_var(&key, value),
        None => std::env::remove_var(&key),
    }));
}
