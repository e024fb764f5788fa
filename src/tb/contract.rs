//! Conformance suite for `TB` implementations.
//!
//! ```no_run
//! use testcase::tb::{Recorder, TBContract};
//!
//! #[test]
//! fn recorder_honours_the_contract() {
//!     let contract = TBContract::new(|| Box::new(Recorder::new("subject")));
//!     testcase::run(|s| testcase::run_suite(s, &[&contract]));
//! }
//! ```

use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use crate::spec::Spec;
use crate::suite::Suite;
use crate::t::T;
use crate::tb::TB;

type Factory = Arc<dyn Fn() -> Box<dyn TB> + Send + Sync>;

/// Checks a `TB` implementation built by `factory`. Every leaf gets a fresh
/// subject.
pub struct TBContract {
    factory: Factory,
}

impl TBContract {
    pub fn new<F>(factory: F) -> Self
    where
        F: Fn() -> Box<dyn TB> + Send + Sync + 'static,
    {
        Self {
            factory: Arc::new(factory),
        }
    }

    fn case<F>(&self, s: &mut Spec<'_>, description: &str, check: F)
    where
        F: Fn(&mut T<'_>, &mut dyn TB) + Send + Sync + 'static,
    {
        let factory = Arc::clone(&self.factory);
        s.test(description, move |t| {
            let mut subject = factory();
            check(t, subject.as_mut());
        });
    }
}

fn recorded(seen: &Arc<Mutex<Vec<i32>>>) -> Vec<i32> {
    seen.lock().unwrap_or_else(PoisonError::into_inner).clone()
}

impl Suite for TBContract {
    fn name(&self) -> String {
        "TB contract".to_string()
    }

    fn spec(&self, s: &mut Spec<'_>) {
        self.case(s, "fail marks the flow failed and keeps going", |t, tb| {
            let mut reached = false;
            let passed = tb.run("fail", &mut |tb: &mut dyn TB| {
                tb.fail();
                reached = true;
            });
            t.must().is_true(reached);
            t.must().is_false(passed);
            t.must().is_true(tb.failed());
        });

        self.case(s, "fail_now exits the flow", |t, tb| {
            let mut steps = 0;
            let passed = tb.run("fail_now", &mut |tb: &mut dyn TB| {
                steps += 1;
                if steps > 0 {
                    tb.fail_now();
                }
                steps += 1;
            });
            t.must().equal(1, steps);
            t.must().is_false(passed);
        });

        self.case(s, "run reports a passing body", |t, tb| {
            let passed = tb.run("pass", &mut |tb: &mut dyn TB| tb.log("ok"));
            t.must().is_true(passed);
            t.must().is_false(tb.failed());
        });

        self.case(s, "skip is not a failure", |t, tb| {
            let observed = Arc::new(Mutex::new(None));
            let passed = tb.run("skip", &mut |tb: &mut dyn TB| {
                let observed = Arc::clone(&observed);
                tb.cleanup(Box::new(move |tb: &mut dyn TB| {
                    *observed.lock().unwrap_or_else(PoisonError::into_inner) =
                        Some((tb.skipped(), tb.failed()));
                }));
                tb.skip("not today")
            });
            let flags = *observed.lock().unwrap_or_else(PoisonError::into_inner);
            t.must().is_true(passed);
            t.must().is_false(tb.failed());
            // (skipped, failed) as seen by the skipped flow's own cleanup
            t.must().equal(Some((true, false)), flags);
        });

        self.case(s, "error marks the flow failed", |t, tb| {
            tb.run("error", &mut |tb: &mut dyn TB| tb.error("boom"));
            t.must().is_true(tb.failed());
        });

        self.case(s, "cleanups run last in first out", |t, tb| {
            let seen = Arc::new(Mutex::new(Vec::new()));
            tb.run("cleanup", &mut |tb: &mut dyn TB| {
                for n in [2, 4] {
                    let seen = Arc::clone(&seen);
                    tb.cleanup(Box::new(move |_| {
                        seen.lock().unwrap_or_else(PoisonError::into_inner).push(n)
                    }));
                }
            });
            t.must().equal(vec![4, 2], recorded(&seen));
        });

        self.case(s, "cleanups still run after fail_now", |t, tb| {
            let seen = Arc::new(Mutex::new(Vec::new()));
            tb.run("cleanup", &mut |tb: &mut dyn TB| {
                let seen = Arc::clone(&seen);
                tb.cleanup(Box::new(move |_| {
                    seen.lock().unwrap_or_else(PoisonError::into_inner).push(1)
                }));
                tb.fail_now();
            });
            t.must().equal(vec![1], recorded(&seen));
        });

        self.case(s, "a cleanup registered by a cleanup still runs", |t, tb| {
            let seen = Arc::new(Mutex::new(Vec::new()));
            tb.run("nested cleanup", &mut |tb: &mut dyn TB| {
                let outer = Arc::clone(&seen);
                tb.cleanup(Box::new(move |tb: &mut dyn TB| {
                    outer.lock().unwrap_or_else(PoisonError::into_inner).push(1);
                    let inner = Arc::clone(&outer);
                    tb.cleanup(Box::new(move |_| {
                        inner.lock().unwrap_or_else(PoisonError::into_inner).push(2)
                    }));
                }));
            });
            t.must().equal(vec![1, 2], recorded(&seen));
        });

        self.case(s, "temp_dir is removed when the flow ends", |t, tb| {
            let mut created: Option<PathBuf> = None;
            tb.run("temp dir", &mut |tb: &mut dyn TB| {
                created = tb.temp_dir();
                if let Some(dir) = &created {
                    assert!(dir.is_dir(), "{} is not a directory", dir.display());
                }
            });
            match created {
                Some(dir) => t.must().is_false(dir.exists()),
                None => t.skip("adapter has no temp dir support"),
            }
        });

        self.case(s, "name is not empty", |t, tb| {
            t.must().is_false(tb.name().is_empty());
            let mut child = String::new();
            tb.run("child", &mut |tb: &mut dyn TB| child = tb.name());
            t.must().is_true(child.ends_with("child"));
        });
    }
}
