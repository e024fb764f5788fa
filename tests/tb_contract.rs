mod common;

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use common::{defined, record};
use testcase::tb::{Cleanup, RunBody, TBContract};
use testcase::{run_suite, Recorder, TB};

#[test]
fn recorder_honours_the_tb_contract() {
    let contract = TBContract::new(|| Box::new(Recorder::new("subject")));
    let rec = record(defined(), |s| run_suite(s, &[&contract]));

    assert!(!rec.failed(), "{:#?}", rec.logs());
    let leaves = rec
        .cases()
        .iter()
        .filter(|c| c.path.first().map(String::as_str) == Some("spec") && c.path.len() == 3)
        .count();
    assert!(leaves >= 9, "only {} contract leaves ran", leaves);
}

#[test]
fn cleanup_order_is_last_in_first_out() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let mut rec = Recorder::new("cleanups");
    rec.run("flow", &mut |tb: &mut dyn TB| {
        for n in [2, 4] {
            let seen = Arc::clone(&seen);
            tb.cleanup(Box::new(move |_: &mut dyn TB| seen.lock().unwrap().push(n)));
        }
    });
    assert_eq!(*seen.lock().unwrap(), vec![4, 2]);
}

#[test]
fn fail_now_bubbles_and_passing_runs_do_not() {
    let mut rec = Recorder::new("outer");
    assert!(rec.run("passes", &mut |_: &mut dyn TB| {}));
    assert!(!rec.failed());

    assert!(!rec.run("fails", &mut |tb: &mut dyn TB| tb.fail_now()));
    assert!(rec.failed());
}

#[test]
fn skip_now_is_not_failure() {
    let mut rec = Recorder::new("outer");
    let mut skipped = false;
    rec.run("skips", &mut |tb: &mut dyn TB| {
        skipped = true;
        tb.skip_now()
    });
    assert!(skipped);
    assert!(!rec.failed());
    assert!(rec.cases()[0].skipped);
}

#[test]
fn the_test_context_forwards_to_its_sub_run() {
    let rec = record(defined(), |s| {
        s.test("skips through T", |t| t.skipf(format_args!("skipping {}", 1)));
        s.test("logs through T", |t| t.logf(format_args!("value {}", 42)));
    });

    assert!(!rec.failed());
    assert!(rec.logs().iter().any(|l| l.ends_with("skipping 1")));
    assert!(rec.logs().iter().any(|l| l == "spec/logs through T: value 42"));
}

/// Delegates to a `Recorder` but never admits to being skipped, down through
/// sub-runs and cleanups.
struct ForgetfulAdapter(Recorder);

struct NeverSkipped<'a>(&'a mut dyn TB);

macro_rules! forget_skips {
    ($ty:ty, $inner:ident) => {
        impl TB for $ty {
            fn name(&self) -> String {
                self.0.name()
            }
            fn fail(&mut self) {
                self.0.fail()
            }
            fn fail_now(&mut self) -> ! {
                self.0.fail_now()
            }
            fn failed(&self) -> bool {
                self.0.failed()
            }
            fn log(&mut self, message: &str) {
                self.0.log(message)
            }
            fn skip_now(&mut self) -> ! {
                self.0.skip_now()
            }
            fn skipped(&self) -> bool {
                false
            }
            fn cleanup(&mut self, f: Cleanup) {
                self.0
                    .cleanup(Box::new(move |tb: &mut dyn TB| f(&mut $inner(tb))))
            }
            fn temp_dir(&mut self) -> Option<PathBuf> {
                self.0.temp_dir()
            }
            fn run(&mut self, name: &str, body: RunBody<'_>) -> bool {
                self.0
                    .run(name, &mut |tb: &mut dyn TB| body(&mut $inner(tb)))
            }
        }
    };
}

forget_skips!(ForgetfulAdapter, NeverSkipped);
forget_skips!(NeverSkipped<'_>, NeverSkipped);

#[test]
fn contract_catches_an_adapter_that_forgets_skips() {
    let contract = TBContract::new(|| Box::new(ForgetfulAdapter(Recorder::new("subject"))));
    let rec = record(defined(), |s| run_suite(s, &[&contract]));

    let skip_case = rec
        .cases()
        .iter()
        .find(|c| c.path.last().map(String::as_str) == Some("skip is not a failure"))
        .expect("the skip case ran");
    assert!(skip_case.failed);
    assert!(rec.failed());
}
