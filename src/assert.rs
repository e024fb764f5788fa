//! `must` / `should` assertion helpers.
//!
//! A `must` assertion stops the flow on failure; a `should` assertion records
//! the failure and lets the flow continue. Both work on any [`TB`].

use std::fmt::Debug;

use difference::{Changeset, Difference};

use crate::tb::TB;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Must,
    Should,
}

pub struct Asserter<'t> {
    tb: &'t mut dyn TB,
    severity: Severity,
}

impl<'t> Asserter<'t> {
    pub fn must(tb: &'t mut dyn TB) -> Self {
        Self {
            tb,
            severity: Severity::Must,
        }
    }

    pub fn should(tb: &'t mut dyn TB) -> Self {
        Self {
            tb,
            severity: Severity::Should,
        }
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    fn report(&mut self, message: &str) {
        self.tb.helper();
        match self.severity {
            Severity::Must => self.tb.fatal(message),
            Severity::Should => self.tb.error(message),
        }
    }

    pub fn equal<V: Debug + PartialEq>(&mut self, expected: V, actual: V) {
        if expected == actual {
            return;
        }
        let expected = format!("{:#?}", expected);
        let actual = format!("{:#?}", actual);
        let message = format!("values are not equal (-expected +actual):\n{}", diff(&expected, &actual));
        self.report(&message);
    }

    pub fn not_equal<V: Debug + PartialEq>(&mut self, unexpected: V, actual: V) {
        if unexpected != actual {
            return;
        }
        self.report(&format!("expected a value other than {:?}", actual));
    }

    pub fn is_true(&mut self, condition: bool) {
        if !condition {
            self.report("expected true, got false");
        }
    }

    pub fn is_false(&mut self, condition: bool) {
        if condition {
            self.report("expected false, got true");
        }
    }

    pub fn contains(&mut self, haystack: &str, needle: &str) {
        if !haystack.contains(needle) {
            self.report(&format!("{:?} does not contain {:?}", haystack, needle));
        }
    }

    pub fn is_some<V: Debug>(&mut self, value: &Option<V>) {
        if value.is_none() {
            self.report("expected Some(..), got None");
        }
    }

    pub fn is_none<V: Debug>(&mut self, value: &Option<V>) {
        if let Some(v) = value {
            self.report(&format!("expected None, got Some({:?})", v));
        }
    }

    pub fn is_ok<V: Debug, E: Debug>(&mut self, value: &Result<V, E>) {
        if let Err(err) = value {
            self.report(&format!("expected Ok(..), got Err({:?})", err));
        }
    }

    pub fn is_err<V: Debug, E: Debug>(&mut self, value: &Result<V, E>) {
        if let Ok(v) = value {
            self.report(&format!("expected Err(..), got Ok({:?})", v));
        }
    }
}

fn diff(expected: &str, actual: &str) -> String {
    let changeset = Changeset::new(expected, actual, "\n");
    let mut out = Vec::new();
    for chunk in &changeset.diffs {
        let (marker, text) = match chunk {
            Difference::Same(ref x) => (' ', x),
            Difference::Add(ref x) => ('+', x),
            Difference::Rem(ref x) => ('-', x),
        };
        out.extend(text.lines().map(|line| format!("{}{}", marker, line)));
    }
    out.join("\n")
}
