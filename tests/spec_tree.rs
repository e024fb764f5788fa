mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use common::{defined, record, Journal};
use testcase::{Recorder, Spec, T, TB};

#[test]
fn hooks_nest_around_the_leaf() {
    let journal = Journal::default();
    let rec = record(defined(), |s| {
        let j = journal.clone();
        s.before(move |_| j.push("before root"));
        let j = journal.clone();
        s.after(move |_| j.push("after root"));

        s.describe("A", |s| {
            let j = journal.clone();
            s.before(move |_| j.push("before A"));
            let j = journal.clone();
            s.after(move |_| j.push("after A"));
            let j = journal.clone();
            s.test("leaf", move |t| {
                j.push("body");
                let cleanup = j.clone();
                t.cleanup(Box::new(move |_: &mut dyn TB| cleanup.push("cleanup")));
            });
        });
    });

    assert!(!rec.failed());
    assert_eq!(
        journal.entries(),
        ["before root", "before A", "body", "after A", "after root", "cleanup"]
    );
}

#[test]
fn around_finaliser_runs_when_the_leaf_aborts() {
    let finalised = Arc::new(AtomicUsize::new(0));
    let rec = record(defined(), |s| {
        let counter = Arc::clone(&finalised);
        s.around(move |_| {
            let counter = Arc::clone(&counter);
            move |_: &mut T<'_>| {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });
        s.test("aborts", |t| t.fail_now());
    });

    assert!(rec.failed());
    assert_eq!(finalised.load(Ordering::SeqCst), 1);
}

#[test]
fn around_wraps_inner_hooks() {
    let journal = Journal::default();
    record(defined(), |s| {
        let j = journal.clone();
        s.around(move |_| {
            j.push("enter");
            let j = j.clone();
            move |_: &mut T<'_>| j.push("exit")
        });
        s.describe("A", |s| {
            let j = journal.clone();
            s.before(move |_| j.push("before A"));
            let j = journal.clone();
            s.test("leaf", move |_| j.push("body"));
        });
    });

    assert_eq!(journal.entries(), ["enter", "before A", "body", "exit"]);
}

#[test]
fn failing_leaf_fails_the_host() {
    let rec = record(defined(), |s| s.test("fails", |t| t.fail_now()));
    assert!(rec.failed());

    let rec = record(defined(), |s| s.test("passes", |_| {}));
    assert!(!rec.failed());
}

#[test]
fn failure_is_reported_on_every_enclosing_context() {
    let rec = record(defined(), |s| {
        s.describe("A", |s| {
            s.test("ok", |_| {});
            s.test("broken", |t| t.error("boom"));
        });
    });

    let failed: Vec<String> = rec
        .cases()
        .iter()
        .filter(|c| c.failed)
        .map(|c| c.path.join("/"))
        .collect();
    assert_eq!(failed, ["spec/A/broken", "spec/A"]);
    assert!(rec.logs().iter().any(|l| l.ends_with("boom")));
}

#[test]
fn skip_in_a_hook_skips_the_leaf_without_failing() {
    let journal = Journal::default();
    let rec = record(defined(), |s| {
        let j = journal.clone();
        s.after(move |_| j.push("after"));
        s.before(|t| t.skip("not ready"));
        let j = journal.clone();
        s.test("leaf", move |_| j.push("body"));
    });

    assert!(!rec.failed());
    assert_eq!(journal.entries(), ["after"]);
    let leaf = rec
        .cases()
        .iter()
        .find(|c| c.path.last().map(String::as_str) == Some("leaf"))
        .expect("leaf case recorded");
    assert!(leaf.skipped);
    assert!(!leaf.failed);
}

#[test]
fn spec_level_skip_never_runs_the_body() {
    let journal = Journal::default();
    let rec = record(defined(), |s| {
        s.describe("later", |s| {
            s.skip("pending");
            let j = journal.clone();
            s.test("leaf", move |_| j.push("body"));
        });
    });

    assert!(!rec.failed());
    assert!(journal.entries().is_empty());
    assert!(rec.logs().iter().any(|l| l.ends_with("pending")));
}

#[test]
fn before_all_runs_once_and_after_all_runs_last() {
    let journal = Journal::default();
    let rec = record(defined(), |s| {
        s.describe("group", |s| {
            let j = journal.clone();
            s.before_all(move |_| j.push("before_all"));
            let j = journal.clone();
            s.after_all(move |_| j.push("after_all"));
            for name in ["one", "two"] {
                let j = journal.clone();
                s.test(name, move |_| j.push(name));
            }
        });
        let j = journal.clone();
        s.test("outside", move |_| j.push("outside"));
    });

    assert!(!rec.failed());
    assert_eq!(
        journal.entries(),
        ["before_all", "one", "two", "outside", "after_all"]
    );
}

#[test]
fn defers_unwind_before_cleanups() {
    let journal = Journal::default();
    record(defined(), |s| {
        let j = journal.clone();
        s.test("defers", move |t| {
            for n in 1..=3 {
                let j = j.clone();
                t.defer(move |_| j.push(format!("defer {}", n)));
            }
            let c = j.clone();
            t.cleanup(Box::new(move |_: &mut dyn TB| c.push("cleanup")));
        });
    });

    assert_eq!(
        journal.entries(),
        ["defer 3", "defer 2", "defer 1", "cleanup"]
    );
}

#[test]
fn a_panicking_leaf_fails_without_stopping_its_siblings() {
    let journal = Journal::default();
    let rec = record(defined(), |s| {
        s.test("panics", |_| panic!("kaboom"));
        let j = journal.clone();
        s.test("still runs", move |_| j.push("still runs"));
    });

    assert!(rec.failed());
    assert!(rec.logs().iter().any(|l| l.contains("kaboom")));
    assert_eq!(journal.entries(), ["still runs"]);
}

#[test]
fn tag_filters_select_leaves() {
    let journal = Journal::default();
    let build = |s: &mut Spec<'_>| {
        s.describe("quick", |s| {
            s.tag(&["fast"]);
            let j = journal.clone();
            s.test("quick leaf", move |t| {
                assert!(t.has_tag("fast"));
                j.push("quick leaf");
            });
        });
        s.describe("slow", |s| {
            s.tag(&["slow"]);
            let j = journal.clone();
            s.test("slow leaf", move |_| j.push("slow leaf"));
        });
    };

    let rec = record(defined().with_tags(&["fast"], &[]), build);
    assert!(!rec.failed());
    assert_eq!(journal.entries(), ["quick leaf"]);

    let rec = record(defined().with_tags(&[], &["fast"]), build);
    assert!(!rec.failed());
    assert_eq!(journal.entries(), ["quick leaf", "slow leaf"]);
}

#[test]
fn parallel_leaves_all_run_and_report() {
    let journal = Journal::default();
    let rec = record(defined(), |s| {
        s.describe("concurrent", |s| {
            s.parallel();
            for n in 0..8 {
                let j = journal.clone();
                let name = format!("leaf {}", n);
                s.test(&name.clone(), move |_| j.push(name.clone()));
            }
            s.test("broken", |t| t.error("parallel failure"));
        });
    });

    let mut entries = journal.entries();
    entries.sort();
    let expected: Vec<String> = (0..8).map(|n| format!("leaf {}", n)).collect();
    assert_eq!(entries, expected);
    assert!(rec.failed());
    assert!(rec.logs().iter().any(|l| l.ends_with("parallel failure")));
    assert_eq!(
        rec.cases()
            .iter()
            .filter(|c| c.path.len() == 3)
            .count(),
        9
    );
}

#[test]
fn parallel_under_a_side_effect_is_rejected() {
    let rec = record(defined(), |s| {
        s.has_side_effect();
        s.describe("inner", |s| {
            s.parallel();
            s.test("leaf", |_| {});
        });
    });

    assert!(rec.failed());
    assert!(rec.logs().iter().any(|l| l.contains("side effect")));
}

#[test]
fn registration_after_finish_is_reported() {
    let mut rec = Recorder::new("late");
    {
        let mut s = Spec::with_config(&mut rec, defined());
        s.finish();
        s.test("too late", |_| {});
    }
    assert!(rec.failed());
    assert!(rec
        .logs()
        .iter()
        .any(|l| l.contains("after the spec started running")));
}

#[test]
fn dropping_the_root_spec_runs_it() {
    let journal = Journal::default();
    let mut rec = Recorder::new("dropped");
    {
        let mut s = Spec::with_config(&mut rec, defined());
        let j = journal.clone();
        s.test("leaf", move |_| j.push("ran"));
    }
    assert_eq!(journal.entries(), ["ran"]);
}

#[test]
fn plan_lists_leaf_paths_in_run_order() {
    let mut rec = Recorder::new("plan");
    let mut s = Spec::with_config(&mut rec, defined());
    s.describe("A", |s| {
        s.test("one", |_| {});
        s.context("B", |s| s.test("two", |_| {}));
    });
    s.when("C", |s| s.and("D", |s| s.test("three", |_| {})));

    assert_eq!(s.plan(), ["A/one", "A/B/two", "when C/and D/three"]);
    s.finish();
}

#[test]
fn benchmark_mode_repeats_leaves_and_honours_skip_benchmark() {
    let runs = Arc::new(AtomicUsize::new(0));
    let heavy = Arc::new(AtomicUsize::new(0));
    let mut rec = Recorder::new("bench");
    {
        let mut s = Spec::benchmark(&mut rec, defined(), 3);
        let counter = Arc::clone(&runs);
        s.test("measured", move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        s.describe("heavy", |s| {
            s.skip_benchmark();
            let counter = Arc::clone(&heavy);
            s.test("not measured", move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        });
        s.finish();
    }

    assert!(!rec.failed());
    assert_eq!(runs.load(Ordering::SeqCst), 3);
    assert_eq!(heavy.load(Ordering::SeqCst), 0);
    assert!(rec.logs().iter().any(|l| l.contains("3 iterations")));
}

#[test]
fn every_leaf_gets_its_own_named_context() {
    let journal = Journal::default();
    record(defined(), |s| {
        s.describe("A", |s| {
            let j = journal.clone();
            s.test("leaf", move |t| j.push(t.name()));
        });
    });
    assert_eq!(journal.entries(), ["spec/A/leaf"]);
}

fn run_with_nested_sub_runs(parallel: bool) -> (Vec<String>, Vec<String>, Vec<String>) {
    let journal = Journal::default();
    let rec = record(defined(), |s| {
        s.describe("g", |s| {
            if parallel {
                s.parallel();
            }
            let j = journal.clone();
            s.test("leaf", move |t| {
                j.push(t.name());
                t.log("outer line");
                t.run("inner", &mut |tb: &mut dyn TB| {
                    tb.log("inner line");
                    tb.fail();
                });
            });
        });
    });
    let cases = rec.cases().iter().map(|c| c.path.join("/")).collect();
    (cases, rec.logs(), journal.entries())
}

#[test]
fn parallel_leaves_report_like_sequential_ones() {
    let sequential = run_with_nested_sub_runs(false);
    assert_eq!(sequential.0, ["spec/g/leaf/inner", "spec/g/leaf", "spec/g"]);
    assert_eq!(sequential.2, ["spec/g/leaf"]);
    assert_eq!(run_with_nested_sub_runs(true), sequential);
}

#[test]
fn leaf_lines_are_prefixed_whatever_they_contain() {
    let rec = record(defined(), |s| s.test("echo", |t| t.log("spec/echo: hello")));
    assert_eq!(rec.logs(), ["spec/echo: spec/echo: hello"]);
}
