mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use common::{defined, record, Journal};
use testcase::{let_value, let_var, Var, TB};

#[test]
fn child_override_is_invisible_to_siblings() {
    let journal = Journal::default();
    let rec = record(defined(), |s| {
        let name = let_value(s, "root".to_string());

        let (j, n) = (journal.clone(), name.clone());
        s.test("in root", move |t| j.push(format!("root leaf: {}", n.get(t))));

        s.context("child", |s| {
            name.let_value(s, "child".to_string());
            let (j, n) = (journal.clone(), name.clone());
            s.test("in child", move |t| j.push(format!("child leaf: {}", n.get(t))));
        });

        s.context("sibling", |s| {
            let (j, n) = (journal.clone(), name.clone());
            s.test("in sibling", move |t| j.push(format!("sibling leaf: {}", n.get(t))));
        });
    });

    assert!(!rec.failed());
    assert_eq!(
        journal.entries(),
        ["root leaf: root", "child leaf: child", "sibling leaf: root"]
    );
}

#[test]
fn values_are_memoised_per_leaf() {
    let calls = Arc::new(AtomicUsize::new(0));
    let rec = record(defined(), |s| {
        let counter = Arc::clone(&calls);
        let value = let_var(s, move |_| counter.fetch_add(1, Ordering::SeqCst));

        for name in ["first", "second"] {
            let value = value.clone();
            s.test(name, move |t| {
                let a = value.get(t);
                let b = value.get(t);
                assert_eq!(a, b);
            });
        }
    });

    assert!(!rec.failed());
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[test]
fn set_replaces_the_value_for_the_rest_of_the_leaf() {
    let rec = record(defined(), |s| {
        let count = let_value(s, 1_u32);
        let hooked = count.clone();
        s.before(move |t| {
            let next = hooked.get(t) + 1;
            hooked.set(t, next);
        });
        s.test("sees the hook's value", move |t| {
            let seen = count.get(t);
            t.must().equal(2, seen);
            count.set(t, 10);
            let seen = count.get(t);
            t.must().equal(10, seen);
        });
    });
    assert!(!rec.failed());
}

#[test]
fn initialisers_resolve_in_the_leaf_scope() {
    let journal = Journal::default();
    record(defined(), |s| {
        let base = let_value(s, 2_i64);
        let b = base.clone();
        let scaled = let_var(s, move |t| b.get(t) * 10);

        let (j, v) = (journal.clone(), scaled.clone());
        s.test("default base", move |t| j.push(v.get(t).to_string()));

        s.context("bigger base", |s| {
            base.let_value(s, 3);
            let (j, v) = (journal.clone(), scaled.clone());
            s.test("override", move |t| j.push(v.get(t).to_string()));
        });
    });

    assert_eq!(journal.entries(), ["20", "30"]);
}

#[test]
fn on_let_fires_once_per_binding_spec() {
    let fired = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&fired);
    let db: Var<String> = Var::new("db").with_on_let(move |s| {
        counter.fetch_add(1, Ordering::SeqCst);
        s.tag(&["database"]);
    });

    let rec = record(defined(), |s| {
        db.let_value(s, "primary".to_string());
        db.let_value(s, "replaced".to_string());
        s.context("replica", |s| {
            db.let_value(s, "replica".to_string());
            let db = db.clone();
            s.test("tagged", move |t| {
                let tagged = t.has_tag("database");
                t.must().is_true(tagged);
                let value = db.get(t);
                t.must().equal("replica".to_string(), value);
            });
        });
    });

    assert!(!rec.failed());
    assert_eq!(fired.load(Ordering::SeqCst), 2);
}

#[test]
fn default_initialiser_is_used_when_nothing_binds() {
    let fallback = Var::new("fallback").with_init(|_| 7_u8);
    let rec = record(defined(), |s| {
        let var = fallback.clone();
        s.test("reads the default", move |t| {
            let value = var.get(t);
            t.must().equal(7, value);
        });
    });
    assert!(!rec.failed());
}

#[test]
fn unbound_variable_stops_the_leaf() {
    let journal = Journal::default();
    let unbound: Var<u8> = Var::new("missing");
    let rec = record(defined(), |s| {
        let j = journal.clone();
        s.test("reads it", move |t| {
            unbound.get(t);
            j.push("unreachable");
        });
    });

    assert!(rec.failed());
    assert!(journal.entries().is_empty());
    assert!(rec.logs().iter().any(|l| l.contains("\"missing\" is not bound")));
}

#[test]
fn get_or_default_reports_and_continues() {
    let journal = Journal::default();
    let unbound: Var<u8> = Var::new("missing");
    let rec = record(defined(), |s| {
        let j = journal.clone();
        s.test("reads it", move |t| {
            let value = unbound.get_or_default(t);
            j.push(value.to_string());
        });
    });

    assert!(rec.failed());
    assert_eq!(journal.entries(), ["0"]);
}

#[test]
fn eager_let_initialises_before_every_leaf() {
    let calls = Arc::new(AtomicUsize::new(0));
    let rec = record(defined(), |s| {
        let counter = Arc::clone(&calls);
        Var::new("eager").eager_let(s, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        s.test("never reads it", |_| {});
        s.test("nor does this one", |_| {});
    });

    assert!(!rec.failed());
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[test]
fn distinct_variables_sharing_a_label_are_rejected() {
    let rec = record(defined(), |s| {
        Var::new("same").let_value(s, 1_u8);
        Var::new("same").let_value(s, 2_u8);
    });
    assert!(rec.failed());
    assert!(rec.logs().iter().any(|l| l.contains("labelled \"same\"")));
}
