//! The per-leaf test context.
//!
//! A `T` lives for exactly one leaf invocation. It wraps the `TB` of the
//! leaf's sub-run and owns the variable cache, the leaf's [`Random`] and a
//! defer stack. Deferred finalisers (from `around`, `after` and
//! [`T::defer`]) run last-in first-out when the leaf ends, however it ends.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use crate::assert::Asserter;
use crate::flow;
use crate::random::Random;
use crate::spec::tree::{LeafId, Tree};
use crate::tb::{Cleanup, RunBody, TB};
use crate::var::{Init, VarId};

/// A finaliser on the per-test defer stack.
pub type Deferred = Box<dyn FnOnce(&mut T<'_>)>;

pub struct T<'a> {
    tb: &'a mut dyn TB,
    tree: Arc<Tree>,
    leaf: LeafId,
    cache: HashMap<VarId, Box<dyn Any>>,
    random: Random,
    defers: Vec<Deferred>,
    tags: Vec<String>,
}

impl<'a> T<'a> {
    pub(crate) fn new(tb: &'a mut dyn TB, tree: Arc<Tree>, leaf: LeafId, random: Random) -> Self {
        let tags = tree.tags(tree.leaf(leaf).node);
        Self {
            tb,
            tree,
            leaf,
            cache: HashMap::new(),
            random,
            defers: Vec::new(),
            tags,
        }
    }

    pub fn random(&self) -> &Random {
        &self.random
    }

    /// Tags of every spec enclosing this leaf.
    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    /// Registers a finaliser that runs when the leaf ends, before the
    /// sub-run's cleanups.
    pub fn defer<F>(&mut self, f: F)
    where
        F: FnOnce(&mut T<'_>) + 'static,
    {
        self.defers.push(Box::new(f));
    }

    /// Assertions that stop the leaf on failure.
    pub fn must(&mut self) -> Asserter<'_> {
        Asserter::must(self)
    }

    /// Assertions that record a failure and let the leaf continue.
    pub fn should(&mut self) -> Asserter<'_> {
        Asserter::should(self)
    }

    pub(crate) fn push_deferred(&mut self, deferred: Deferred) {
        self.defers.push(deferred);
    }

    /// Pops the defer stack until it is empty. A finaliser that fails or
    /// panics does not stop the ones below it.
    pub(crate) fn run_defers(&mut self) {
        while let Some(deferred) = self.defers.pop() {
            let outcome = flow::guard(|| deferred(self));
            if let Some(message) = outcome.panic_message() {
                self.tb.error(&format!("deferred call panicked: {}", message));
            }
        }
    }

    // ------------------------------------------------------------------------
    // Variable storage
    // ------------------------------------------------------------------------

    pub(crate) fn cached<V: Clone + 'static>(&self, id: VarId) -> Option<V> {
        self.cache.get(&id).and_then(|v| v.downcast_ref::<V>()).cloned()
    }

    pub(crate) fn store<V: 'static>(&mut self, id: VarId, value: V) {
        self.cache.insert(id, Box::new(value));
    }

    /// The innermost initialiser bound for `id` in this leaf's scope.
    pub(crate) fn binding<V: 'static>(&self, id: VarId) -> Option<Init<V>> {
        let node = self.tree.leaf(self.leaf).node;
        self.tree
            .binding(node, id)
            .and_then(|b| b.init.downcast_ref::<Init<V>>())
            .cloned()
    }
}

impl fmt::Debug for T<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("T")
            .field("name", &self.tb.name())
            .field("tags", &self.tags)
            .field("cached", &self.cache.len())
            .field("deferred", &self.defers.len())
            .finish()
    }
}

impl TB for T<'_> {
    fn name(&self) -> String {
        self.tb.name()
    }

    fn fail(&mut self) {
        self.tb.fail();
    }

    fn fail_now(&mut self) -> ! {
        self.tb.fail_now()
    }

    fn failed(&self) -> bool {
        self.tb.failed()
    }

    fn log(&mut self, message: &str) {
        self.tb.log(message);
    }

    fn skip_now(&mut self) -> ! {
        self.tb.skip_now()
    }

    fn skipped(&self) -> bool {
        self.tb.skipped()
    }

    fn helper(&mut self) {
        self.tb.helper();
    }

    fn cleanup(&mut self, f: Cleanup) {
        self.tb.cleanup(f);
    }

    fn temp_dir(&mut self) -> Option<PathBuf> {
        self.tb.temp_dir()
    }

    fn run(&mut self, name: &str, body: RunBody<'_>) -> bool {
        self.tb.run(name, body)
    }
}
