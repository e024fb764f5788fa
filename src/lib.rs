//! testcase: nested, behaviour-driven specifications on top of the Rust test
//! runner.
//!
//! A spec is declared inside an ordinary `#[test]` function. Contexts nest,
//! hooks and variables are scoped to the context that declares them, and
//! every leaf runs as its own named sub-run with a fresh [`T`]:
//!
//! ```no_run
//! #[test]
//! fn account() {
//!     testcase::run(|s| {
//!         let balance = testcase::let_var(s, |_| 100_i64);
//!
//!         s.when("money is withdrawn", |s| {
//!             let account = balance.clone();
//!             s.before(move |t| {
//!                 let left = account.get(t) - 30;
//!                 account.set(t, left);
//!             });
//!             let balance = balance.clone();
//!             s.then("the balance goes down", move |t| {
//!                 let left = balance.get(t);
//!                 t.must().equal(70, left);
//!             });
//!         });
//!     });
//! }
//! ```
//!
//! Leaf order, the shuffle seed, tag filters and report verbosity come from
//! the environment; see [`Config`].

pub mod assert;
pub mod cli;
pub mod config;
pub mod doc;
pub mod env;
pub mod errors;
pub mod flow;
pub mod introspect;
pub mod ordering;
pub mod random;
pub mod schedule;
pub mod spec;
pub mod suite;
pub mod t;
pub mod tb;
pub mod util;
pub mod var;

pub use assert::{Asserter, Severity};
pub use config::{Config, ConfigError};
pub use doc::{DocumentFormat, TestingCase};
pub use env::{set_env, unset_env};
pub use errors::{Error, Result};
pub use introspect::{IntrospectError, Introspector, Package, RuntimeBlock};
pub use ordering::OrderingMode;
pub use random::Random;
pub use schedule::schedule;
pub use spec::{SourceLocation, Spec};
pub use suite::{run_suite, Suite};
pub use t::T;
pub use tb::{Recorder, TB};
pub use var::{let_value, let_var, Var, VarId};

/// Runs a spec inside the current `#[test]` function, configured from the
/// environment.
///
/// Leaves are recorded on an in-process [`Recorder`]; when the spec finishes
/// the report is printed and the test panics if any leaf failed.
#[track_caller]
pub fn run<F>(f: F)
where
    F: FnOnce(&mut Spec<'_>),
{
    run_with_config(Config::global().clone(), f);
}

/// Like [`run`], with an explicit configuration.
#[track_caller]
pub fn run_with_config<F>(config: Config, f: F)
where
    F: FnOnce(&mut Spec<'_>),
{
    let mut host = Recorder::host();
    {
        let mut s = Spec::with_config(&mut host, config.clone());
        f(&mut s);
        s.finish();
    }
    host.conclude(&config);
}
