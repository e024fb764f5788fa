//! The spec DSL.
//!
//! A [`Spec`] is a handle on one node of the spec tree. Nested specs are
//! populated immediately, as their closure runs; leaves and hooks are stored
//! and only executed when the outermost spec finishes:
//!
//! ```no_run
//! use testcase::{let_var, Spec};
//!
//! #[test]
//! fn stack() {
//!     testcase::run(|s| {
//!         let items = let_var(s, |_| Vec::<u32>::new());
//!
//!         s.describe("push", |s| {
//!             let items = items.clone();
//!             s.then("grows by one", move |t| {
//!                 let mut v = items.get(t);
//!                 v.push(1);
//!                 t.must().equal(1, v.len());
//!             });
//!         });
//!     });
//! }
//! ```
//!
//! Hooks compose through the tree: parent `before` hooks run before child
//! ones, and `after` hooks and `around` finalisers unwind in reverse.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::panic::Location;
use std::rc::Rc;
use std::sync::Arc;

pub(crate) mod runner;
pub(crate) mod tree;

pub use tree::SourceLocation;

use crate::config::Config;
use crate::ordering::OrderingMode;
use crate::t::T;
use crate::tb::TB;
use crate::var::VarId;
use runner::{Plan, RunMode, Runner};
use tree::{Binding, Hook, NodeId, Tree, ROOT};

struct Shared<'a> {
    tb: RefCell<&'a mut dyn TB>,
    tree: RefCell<Tree>,
    config: Config,
    mode: RunMode,
    finished: Cell<bool>,
}

pub struct Spec<'a> {
    shared: Rc<Shared<'a>>,
    node: NodeId,
}

impl<'a> Spec<'a> {
    /// A spec on `tb`, configured from the environment.
    #[track_caller]
    pub fn new(tb: &'a mut dyn TB) -> Self {
        Self::build(tb, Config::global().clone(), RunMode::Test, Location::caller())
    }

    #[track_caller]
    pub fn with_config(tb: &'a mut dyn TB, config: Config) -> Self {
        Self::build(tb, config, RunMode::Test, Location::caller())
    }

    /// A spec that runs every leaf `iterations` times and logs the mean
    /// duration. Subtrees marked with [`Spec::skip_benchmark`] are skipped.
    #[track_caller]
    pub fn benchmark(tb: &'a mut dyn TB, config: Config, iterations: u32) -> Self {
        let mode = RunMode::Benchmark {
            iterations: iterations.max(1),
        };
        Self::build(tb, config, mode, Location::caller())
    }

    fn build(
        tb: &'a mut dyn TB,
        config: Config,
        mode: RunMode,
        location: &'static Location<'static>,
    ) -> Self {
        let name = tb.name();
        Self {
            shared: Rc::new(Shared {
                tb: RefCell::new(tb),
                tree: RefCell::new(Tree::new(&name, location.into())),
                config,
                mode,
                finished: Cell::new(false),
            }),
            node: ROOT,
        }
    }

    pub fn config(&self) -> &Config {
        &self.shared.config
    }

    /// Reports a DSL mistake on the spec's test without stopping it.
    fn misuse(&self, message: &str) {
        self.shared.tb.borrow_mut().error(&format!("testcase: {}", message));
    }

    /// Registration is only allowed until the spec finishes.
    fn open(&self, what: &str) -> bool {
        if self.shared.finished.get() {
            self.misuse(&format!("{} registered after the spec started running", what));
            return false;
        }
        true
    }

    fn with_node<R>(&self, f: impl FnOnce(&mut tree::Node) -> R) -> R {
        f(self.shared.tree.borrow_mut().node_mut(self.node))
    }

    fn child(&self, node: NodeId) -> Spec<'a> {
        Spec {
            shared: Rc::clone(&self.shared),
            node,
        }
    }

    // ========================================================================
    // CONTEXTS
    // ========================================================================

    /// Declares a nested spec and populates it right away.
    #[track_caller]
    pub fn describe<F>(&mut self, description: &str, f: F)
    where
        F: FnOnce(&mut Spec<'a>),
    {
        if !self.open("describe") {
            return;
        }
        let location = Location::caller().into();
        let id = self
            .shared
            .tree
            .borrow_mut()
            .add_node(self.node, description, location);
        let mut child = self.child(id);
        f(&mut child);
    }

    #[track_caller]
    pub fn context<F>(&mut self, description: &str, f: F)
    where
        F: FnOnce(&mut Spec<'a>),
    {
        self.describe(description, f);
    }

    #[track_caller]
    pub fn when<F>(&mut self, description: &str, f: F)
    where
        F: FnOnce(&mut Spec<'a>),
    {
        self.describe(&format!("when {}", description), f);
    }

    #[track_caller]
    pub fn and<F>(&mut self, description: &str, f: F)
    where
        F: FnOnce(&mut Spec<'a>),
    {
        self.describe(&format!("and {}", description), f);
    }

    // ========================================================================
    // LEAVES
    // ========================================================================

    /// Declares a leaf.
    #[track_caller]
    pub fn test<F>(&mut self, description: &str, body: F)
    where
        F: Fn(&mut T<'_>) + Send + Sync + 'static,
    {
        if !self.open("test") {
            return;
        }
        let location = Location::caller().into();
        self.shared
            .tree
            .borrow_mut()
            .add_leaf(self.node, description, location, Arc::new(body));
    }

    #[track_caller]
    pub fn then<F>(&mut self, description: &str, body: F)
    where
        F: Fn(&mut T<'_>) + Send + Sync + 'static,
    {
        self.test(description, body);
    }

    // ========================================================================
    // HOOKS
    // ========================================================================

    /// Runs before every leaf in this spec and below.
    pub fn before<F>(&mut self, f: F)
    where
        F: Fn(&mut T<'_>) + Send + Sync + 'static,
    {
        if self.open("before") {
            self.with_node(|n| n.hooks.push(Hook::Before(Arc::new(f))));
        }
    }

    /// Runs after every leaf in this spec and below, even when the leaf
    /// failed. Inner `after` hooks run first.
    pub fn after<F>(&mut self, f: F)
    where
        F: Fn(&mut T<'_>) + Send + Sync + 'static,
    {
        if self.open("after") {
            self.with_node(|n| n.hooks.push(Hook::After(Arc::new(f))));
        }
    }

    /// Runs `f` before every leaf; the finaliser it returns runs when the
    /// leaf ends, however it ends.
    pub fn around<F, D>(&mut self, f: F)
    where
        F: Fn(&mut T<'_>) -> D + Send + Sync + 'static,
        D: FnOnce(&mut T<'_>) + 'static,
    {
        if self.open("around") {
            let hook = move |t: &mut T<'_>| -> crate::t::Deferred { Box::new(f(t)) };
            self.with_node(|n| n.hooks.push(Hook::Around(Arc::new(hook))));
        }
    }

    /// Runs once, before the first leaf of this spec starts.
    pub fn before_all<F>(&mut self, f: F)
    where
        F: Fn(&mut dyn TB) + Send + Sync + 'static,
    {
        if self.open("before_all") {
            self.with_node(|n| n.before_all.push(Arc::new(f)));
        }
    }

    /// Runs once, after every leaf of the spec has finished.
    pub fn after_all<F>(&mut self, f: F)
    where
        F: Fn(&mut dyn TB) + Send + Sync + 'static,
    {
        if self.open("after_all") {
            self.with_node(|n| n.after_all.push(Arc::new(f)));
        }
    }

    // ========================================================================
    // EXECUTION MODIFIERS
    // ========================================================================

    /// Leaves here touch shared state: they never run concurrently.
    pub fn has_side_effect(&mut self) {
        if self.open("has_side_effect") {
            self.with_node(|n| {
                n.side_effect = true;
                n.parallel = Some(false);
            });
        }
    }

    pub fn no_side_effect(&mut self) {
        self.parallel();
    }

    pub fn sequential(&mut self) {
        if self.open("sequential") {
            self.with_node(|n| n.parallel = Some(false));
        }
    }

    /// Lets the leaves of this spec run concurrently with each other.
    pub fn parallel(&mut self) {
        if !self.open("parallel") {
            return;
        }
        let blocked = self
            .shared
            .tree
            .borrow()
            .has_side_effect_in_scope(self.node);
        if blocked {
            self.misuse("parallel requested in a spec that has a side effect");
            return;
        }
        self.with_node(|n| n.parallel = Some(true));
    }

    /// Overrides the ordering mode for this spec and below.
    pub fn order_as(&mut self, mode: OrderingMode) {
        if self.open("order_as") {
            self.with_node(|n| n.ordering = Some(mode));
        }
    }

    // ========================================================================
    // METADATA
    // ========================================================================

    pub fn tag(&mut self, tags: &[&str]) {
        if self.open("tag") {
            self.with_node(|n| n.tags.extend(tags.iter().map(|t| t.to_string())));
        }
    }

    /// Skips every leaf in this spec and below.
    pub fn skip(&mut self, reason: &str) {
        if self.open("skip") {
            self.with_node(|n| n.skip = Some(reason.to_string()));
        }
    }

    pub fn skip_benchmark(&mut self) {
        if self.open("skip_benchmark") {
            self.with_node(|n| n.skip_benchmark = true);
        }
    }

    // ========================================================================
    // VARIABLES
    // ========================================================================

    /// Stores an initialiser for `id` in this node. Returns whether this is
    /// the variable's first binding here.
    pub(crate) fn bind(&mut self, id: VarId, label: &Arc<str>, init: Arc<dyn Any + Send + Sync>) -> bool {
        if !self.open("variable binding") {
            return false;
        }
        let clash = self.with_node(|n| {
            n.bindings
                .iter()
                .any(|(other, b)| *other != id && b.label == *label)
        });
        if clash {
            self.misuse(&format!(
                "two different variables labelled {:?} are bound in the same spec",
                label
            ));
        }
        self.with_node(|n| {
            n.bindings.insert(
                id,
                Binding {
                    label: Arc::clone(label),
                    init,
                },
            );
            n.on_let_fired.insert(id)
        })
    }

    // ========================================================================
    // EXECUTION
    // ========================================================================

    /// The leaves in the order they will run, as `/`-joined paths.
    pub fn plan(&self) -> Vec<String> {
        let mut tree = self.shared.tree.borrow_mut();
        tree.freeze();
        let runner = Runner::new(&self.shared.config, self.shared.mode);
        Plan::build(&tree, runner.orderer())
            .leaves()
            .into_iter()
            .map(|leaf| tree.leaf_path(leaf))
            .collect()
    }

    /// Runs every registered leaf. Only the outermost spec can finish; later
    /// calls do nothing.
    pub fn finish(&mut self) {
        if self.node != ROOT {
            self.misuse("finish called on a nested spec; only the outermost spec runs");
            return;
        }
        if self.shared.finished.replace(true) {
            return;
        }
        let tree = {
            let mut tree = self.shared.tree.borrow_mut();
            let name = tree.node(ROOT).description.clone();
            let location = tree.node(ROOT).location;
            let mut frozen = std::mem::replace(&mut *tree, Tree::new(&name, location));
            frozen.freeze();
            Arc::new(frozen)
        };
        let runner = Runner::new(&self.shared.config, self.shared.mode);
        let mut tb = self.shared.tb.borrow_mut();
        runner.run(tree, &mut **tb);
    }
}

impl Drop for Spec<'_> {
    fn drop(&mut self) {
        if self.node == ROOT && !self.shared.finished.get() && !std::thread::panicking() {
            self.finish();
        }
    }
}
