// Fixture for the introspector tests. Line numbers matter: keep the layout.
use testcase::{Spec, T};

fn foo() {}

fn bar() {}

fn baz(_: &str) {}

fn helper(t: &mut T<'_>) {
    foo();
    t.log("helper");
}

#[test]
fn sample() {
    testcase::run(|s| {
        s.describe("outer", |s| {
            s.before(|t| {
                foo();
            });

            s.test("inferred parameter", |t| {
                helper(t);
                baz("inferred");
            });
        });

        registered(s);
    });
}

fn registered(s: &mut Spec<'_>) {
    // Annotated parameter: recognised by its type alone.
    let body = |t: &mut testcase::T| {
        foo();
        t.log("before bar");
        bar();
        t.log("after bar");
    };
    s.test("explicit parameter", body);

    let not_runtime = |n: u32| n + 1;
    let _ = not_runtime(1);
}
