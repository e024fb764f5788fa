//! Reusable groups of specs.
//!
//! A [`Suite`] contributes leaves to a spec under a context named after it.
//! Contract test suites (like [`crate::tb::TBContract`]) are written this way
//! so every implementation of an interface can run the same checks.

use crate::spec::Spec;

pub trait Suite {
    /// Context name; defaults to the type's name without its module path.
    fn name(&self) -> String {
        let full = std::any::type_name::<Self>();
        let base = full.split('<').next().unwrap_or(full);
        base.rsplit("::").next().unwrap_or(base).to_string()
    }

    fn spec(&self, s: &mut Spec<'_>);
}

/// Registers every suite in its own context of `s`.
#[track_caller]
pub fn run_suite(s: &mut Spec<'_>, suites: &[&dyn Suite]) {
    for suite in suites {
        s.context(&suite.name(), |s| suite.spec(s));
    }
}
