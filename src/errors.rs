//! Crate-level error type.
//!
//! Spec mistakes and assertion failures are reported on the test through
//! `TB`; the errors here are the ones returned as values: bad configuration
//! and source files the introspector cannot read or parse.

use miette::Diagnostic;
use thiserror::Error;

use crate::config::ConfigError;
use crate::introspect::IntrospectError;

#[derive(Debug, Error, Diagnostic)]
pub enum Error {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Introspect(#[from] IntrospectError),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
