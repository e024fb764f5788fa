//! Materialisation and execution of a frozen spec tree.
//!
//! [`Plan::build`] orders every subtree with the configured [`Orderer`]. The
//! [`Runner`] then walks the plan: every nested spec becomes a named sub-run,
//! every leaf a named sub-run inside it. Leaves of parallel specs run after
//! their sequential siblings, concurrently, each on an isolated [`Recorder`]
//! whose report is replayed onto the host in plan order.

use std::sync::Arc;
use std::time::Instant;

use rayon::prelude::*;

use crate::config::{Config, SEED_ENV, TAG_INCLUDE_ENV};
use crate::flow;
use crate::ordering::{Orderer, OrderingMode};
use crate::random::{derive_seed_bytes, Random};
use crate::spec::tree::{Child, Hook, LeafId, NodeId, Tree, ROOT};
use crate::t::T;
use crate::tb::recorder::RunReport;
use crate::tb::{Recorder, TB};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RunMode {
    Test,
    Benchmark { iterations: u32 },
}

// ============================================================================
// PLAN
// ============================================================================

pub(crate) enum Step {
    Spec(PlanNode),
    Leaf(LeafId),
}

pub(crate) struct PlanNode {
    pub(crate) node: NodeId,
    pub(crate) steps: Vec<Step>,
}

pub(crate) struct Plan {
    pub(crate) root: PlanNode,
}

impl Plan {
    pub(crate) fn build(tree: &Tree, orderer: Orderer) -> Self {
        Self {
            root: Self::node(tree, orderer, ROOT),
        }
    }

    fn node(tree: &Tree, orderer: Orderer, id: NodeId) -> PlanNode {
        let local = match tree.ordering_override(id) {
            Some(mode) => orderer.with_mode(mode),
            None => orderer,
        };
        let mut children = tree.node(id).children.clone();
        local.order(&tree.path(id), &mut children, |child| match child {
            Child::Spec(node) => tree.first_location(*node),
            Child::Leaf(leaf) => tree.leaf(*leaf).location,
        });
        let steps = children
            .into_iter()
            .map(|child| match child {
                Child::Spec(node) => Step::Spec(Self::node(tree, orderer, node)),
                Child::Leaf(leaf) => Step::Leaf(leaf),
            })
            .collect();
        PlanNode { node: id, steps }
    }

    /// Leaves in execution order (parallel leaves at their plan position).
    pub(crate) fn leaves(&self) -> Vec<LeafId> {
        fn collect(node: &PlanNode, out: &mut Vec<LeafId>) {
            for step in &node.steps {
                match step {
                    Step::Spec(sub) => collect(sub, out),
                    Step::Leaf(leaf) => out.push(*leaf),
                }
            }
        }
        let mut out = Vec::new();
        collect(&self.root, &mut out);
        out
    }
}

// ============================================================================
// RUNNER
// ============================================================================

pub(crate) struct Runner<'c> {
    config: &'c Config,
    mode: RunMode,
}

impl<'c> Runner<'c> {
    pub(crate) fn new(config: &'c Config, mode: RunMode) -> Self {
        Self { config, mode }
    }

    pub(crate) fn orderer(&self) -> Orderer {
        Orderer::new(self.config.ordering, self.config.seed)
    }

    pub(crate) fn run(&self, tree: Arc<Tree>, tb: &mut dyn TB) {
        let plan = Plan::build(&tree, self.orderer());
        tracing::debug!(
            spec = %tb.name(),
            leaves = plan.leaves().len(),
            ordering = %self.config.ordering,
            seed = self.config.seed,
            "running spec"
        );

        self.run_steps(&tree, tb, &plan.root.steps);
        self.run_after_all(&tree, tb);

        if tb.failed() && self.config.ordering == OrderingMode::Random {
            tb.log(&format!(
                "leaves ran in random order; reproduce with {}={}",
                SEED_ENV, self.config.seed
            ));
        }
    }

    fn run_steps(&self, tree: &Arc<Tree>, tb: &mut dyn TB, steps: &[Step]) {
        let mut parallel = Vec::new();
        for step in steps {
            match step {
                Step::Spec(sub) => {
                    let description = tree.node(sub.node).description.clone();
                    tb.run(&description, &mut |tb: &mut dyn TB| {
                        self.run_steps(tree, tb, &sub.steps)
                    });
                }
                Step::Leaf(id)
                    if self.mode == RunMode::Test && tree.is_parallel(tree.leaf(*id).node) =>
                {
                    parallel.push(*id);
                }
                Step::Leaf(id) => {
                    let description = tree.leaf(*id).description.clone();
                    tb.run(&description, &mut |tb: &mut dyn TB| self.run_leaf(tree, tb, *id));
                }
            }
        }
        if !parallel.is_empty() {
            self.run_parallel(tree, tb, &parallel);
        }
    }

    fn run_parallel(&self, tree: &Arc<Tree>, tb: &mut dyn TB, leaves: &[LeafId]) {
        tracing::debug!(count = leaves.len(), "running leaves concurrently");
        let host = tb.name();
        let reports: Vec<RunReport> = leaves
            .par_iter()
            .map(|id| {
                let mut isolated = Recorder::detached(&host, &tree.leaf(*id).description);
                isolated.execute(|tb| self.run_leaf(tree, tb, *id));
                isolated.into_report()
            })
            .collect();

        for (id, report) in leaves.iter().zip(&reports) {
            let description = tree.leaf(*id).description.clone();
            tb.run(&description, &mut |tb: &mut dyn TB| report.replay(tb));
        }
    }

    fn skip_reason(&self, tree: &Tree, node: NodeId) -> Option<String> {
        if let Some(reason) = tree.skip_reason(node) {
            return Some(reason.to_string());
        }
        if matches!(self.mode, RunMode::Benchmark { .. }) && tree.skips_benchmark(node) {
            return Some("skipped in benchmark mode".to_string());
        }
        let tags = tree.tags(node);
        let include = &self.config.tag_include;
        if !include.is_empty() && !tags.iter().any(|t| include.contains(t)) {
            return Some(format!("no tag matches {}", TAG_INCLUDE_ENV));
        }
        tags.iter()
            .find(|t| self.config.tag_exclude.contains(t))
            .map(|t| format!("tag {:?} is excluded", t))
    }

    fn run_leaf(&self, tree: &Arc<Tree>, tb: &mut dyn TB, id: LeafId) {
        if let Some(reason) = self.skip_reason(tree, tree.leaf(id).node) {
            tb.skip(&reason);
        }
        match self.mode {
            RunMode::Test => self.run_once(tree, tb, id),
            RunMode::Benchmark { iterations } => {
                let started = Instant::now();
                for _ in 0..iterations {
                    self.run_once(tree, tb, id);
                }
                let mean = started.elapsed() / iterations;
                tb.log(&format!("{} iterations, {:?} per iteration", iterations, mean));
            }
        }
    }

    /// One leaf invocation: before-all, hooks outer to inner, body, then the
    /// defer stack. Whatever ended the flow is re-raised once the stack is
    /// empty.
    fn run_once(&self, tree: &Arc<Tree>, tb: &mut dyn TB, id: LeafId) {
        let leaf = tree.leaf(id);
        let chain = tree.chain(leaf.node);
        let random = Random::from_seed_bytes(derive_seed_bytes(
            self.config.seed,
            &tree.leaf_path(id),
        ));
        let mut t = T::new(tb, Arc::clone(tree), id, random);

        let outcome = flow::guard(|| {
            for node in &chain {
                tree.enter(*node, &mut t);
            }
            for node in &chain {
                for hook in &tree.node(*node).hooks {
                    match hook {
                        Hook::Before(f) => f(&mut t),
                        Hook::After(f) => {
                            let f = Arc::clone(f);
                            t.push_deferred(Box::new(move |t: &mut T<'_>| f(t)));
                        }
                        Hook::Around(f) => {
                            let finaliser = f(&mut t);
                            t.push_deferred(finaliser);
                        }
                    }
                }
            }
            (leaf.body)(&mut t);
        });

        t.run_defers();
        flow::resume(outcome);
    }

    fn run_after_all(&self, tree: &Tree, tb: &mut dyn TB) {
        for id in tree.visited_inner_first() {
            for hook in &tree.node(id).after_all {
                let outcome = flow::guard(|| hook(&mut *tb));
                if let Some(message) = outcome.panic_message() {
                    tb.error(&format!("after_all panicked: {}", message));
                }
            }
        }
    }
}
