//! The registered spec tree.
//!
//! Nodes and leaves live in flat arenas and refer to each other by index.
//! Registration appends to a [`Tree`] under a `RefCell`; [`Tree::freeze`]
//! computes each node's effective variable scope and the tree is then shared
//! read-only (behind an `Arc`) by every leaf execution, including parallel
//! ones.

use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::panic::Location;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;

use crate::ordering::OrderingMode;
use crate::t::{Deferred, T};
use crate::tb::TB;
use crate::util;
use crate::var::VarId;

pub(crate) type NodeId = usize;
pub(crate) type LeafId = usize;

pub(crate) const ROOT: NodeId = 0;

pub(crate) type HookFn = Arc<dyn Fn(&mut T<'_>) + Send + Sync>;
pub(crate) type AroundFn = Arc<dyn Fn(&mut T<'_>) -> Deferred + Send + Sync>;
pub(crate) type SuiteHookFn = Arc<dyn Fn(&mut dyn TB) + Send + Sync>;

/// Where a spec or leaf was declared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct SourceLocation {
    pub file: &'static str,
    pub line: u32,
    pub column: u32,
}

impl From<&'static Location<'static>> for SourceLocation {
    fn from(location: &'static Location<'static>) -> Self {
        Self {
            file: location.file(),
            line: location.line(),
            column: location.column(),
        }
    }
}

impl std::fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}

#[derive(Clone)]
pub(crate) enum Hook {
    Before(HookFn),
    After(HookFn),
    Around(AroundFn),
}

/// A variable initialiser registered in one node. `init` holds an
/// [`crate::var::Init<V>`] behind `Any`.
#[derive(Clone)]
pub(crate) struct Binding {
    pub(crate) label: Arc<str>,
    pub(crate) init: Arc<dyn Any + Send + Sync>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Child {
    Spec(NodeId),
    Leaf(LeafId),
}

pub(crate) struct Node {
    pub(crate) parent: Option<NodeId>,
    pub(crate) description: String,
    pub(crate) location: SourceLocation,
    pub(crate) hooks: Vec<Hook>,
    pub(crate) before_all: Vec<SuiteHookFn>,
    pub(crate) after_all: Vec<SuiteHookFn>,
    pub(crate) bindings: HashMap<VarId, Binding>,
    pub(crate) scope: im::HashMap<VarId, Binding>,
    pub(crate) children: Vec<Child>,
    pub(crate) side_effect: bool,
    pub(crate) parallel: Option<bool>,
    pub(crate) ordering: Option<OrderingMode>,
    pub(crate) tags: Vec<String>,
    pub(crate) skip: Option<String>,
    pub(crate) skip_benchmark: bool,
    pub(crate) on_let_fired: HashSet<VarId>,
    before_all_done: Mutex<bool>,
    visited: AtomicBool,
}

impl Node {
    fn new(parent: Option<NodeId>, description: &str, location: SourceLocation) -> Self {
        Self {
            parent,
            description: description.to_string(),
            location,
            hooks: Vec::new(),
            before_all: Vec::new(),
            after_all: Vec::new(),
            bindings: HashMap::new(),
            scope: im::HashMap::new(),
            children: Vec::new(),
            side_effect: false,
            parallel: None,
            ordering: None,
            tags: Vec::new(),
            skip: None,
            skip_benchmark: false,
            on_let_fired: HashSet::new(),
            before_all_done: Mutex::new(false),
            visited: AtomicBool::new(false),
        }
    }
}

pub(crate) struct Leaf {
    pub(crate) node: NodeId,
    pub(crate) description: String,
    pub(crate) location: SourceLocation,
    pub(crate) body: HookFn,
}

pub(crate) struct Tree {
    pub(crate) nodes: Vec<Node>,
    pub(crate) leaves: Vec<Leaf>,
}

impl Tree {
    pub(crate) fn new(description: &str, location: SourceLocation) -> Self {
        Self {
            nodes: vec![Node::new(None, description, location)],
            leaves: Vec::new(),
        }
    }

    pub(crate) fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id]
    }

    pub(crate) fn leaf(&self, id: LeafId) -> &Leaf {
        &self.leaves[id]
    }

    pub(crate) fn add_node(
        &mut self,
        parent: NodeId,
        description: &str,
        location: SourceLocation,
    ) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(Node::new(Some(parent), description, location));
        self.nodes[parent].children.push(Child::Spec(id));
        id
    }

    pub(crate) fn add_leaf(
        &mut self,
        node: NodeId,
        description: &str,
        location: SourceLocation,
        body: HookFn,
    ) -> LeafId {
        let id = self.leaves.len();
        self.leaves.push(Leaf {
            node,
            description: description.to_string(),
            location,
            body,
        });
        self.nodes[node].children.push(Child::Leaf(id));
        id
    }

    /// Nodes from the root down to `id`, both included.
    pub(crate) fn chain(&self, id: NodeId) -> Vec<NodeId> {
        let mut chain = vec![id];
        let mut current = id;
        while let Some(parent) = self.nodes[current].parent {
            chain.push(parent);
            current = parent;
        }
        chain.reverse();
        chain
    }

    /// Descriptions from the root's first child down to `id`, joined by `/`.
    pub(crate) fn path(&self, id: NodeId) -> String {
        self.chain(id)
            .into_iter()
            .skip(1)
            .map(|n| self.nodes[n].description.as_str())
            .collect::<Vec<_>>()
            .join("/")
    }

    pub(crate) fn leaf_path(&self, id: LeafId) -> String {
        let leaf = &self.leaves[id];
        let scope = self.path(leaf.node);
        if scope.is_empty() {
            return leaf.description.clone();
        }
        format!("{}/{}", scope, leaf.description)
    }

    /// Tags of `node` and all its ancestors, outermost first.
    pub(crate) fn tags(&self, node: NodeId) -> Vec<String> {
        let chain = self.chain(node);
        let slices: Vec<&[String]> = chain.iter().map(|n| self.nodes[*n].tags.as_slice()).collect();
        util::merge(&slices)
    }

    pub(crate) fn skip_reason(&self, node: NodeId) -> Option<&str> {
        self.chain(node)
            .into_iter()
            .find_map(|n| self.nodes[n].skip.as_deref())
    }

    pub(crate) fn skips_benchmark(&self, node: NodeId) -> bool {
        self.chain(node).into_iter().any(|n| self.nodes[n].skip_benchmark)
    }

    /// Leaves of `node` may run concurrently when some scope asked for it and
    /// no scope declared a side effect.
    pub(crate) fn is_parallel(&self, node: NodeId) -> bool {
        let chain = self.chain(node);
        if chain.iter().any(|n| self.nodes[*n].side_effect) {
            return false;
        }
        chain
            .iter()
            .rev()
            .find_map(|n| self.nodes[*n].parallel)
            .unwrap_or(false)
    }

    pub(crate) fn has_side_effect_in_scope(&self, node: NodeId) -> bool {
        self.chain(node).into_iter().any(|n| self.nodes[n].side_effect)
    }

    /// Ordering override closest to `node`.
    pub(crate) fn ordering_override(&self, node: NodeId) -> Option<OrderingMode> {
        self.chain(node)
            .into_iter()
            .rev()
            .find_map(|n| self.nodes[n].ordering)
    }

    /// Earliest declared leaf location under `node`, or the node's own.
    pub(crate) fn first_location(&self, node: NodeId) -> SourceLocation {
        self.nodes[node]
            .children
            .iter()
            .map(|child| match child {
                Child::Spec(id) => self.first_location(*id),
                Child::Leaf(id) => self.leaves[*id].location,
            })
            .min()
            .unwrap_or(self.nodes[node].location)
    }

    /// Resolves every node's effective bindings: its own over its parent's.
    /// Parents are always created before their children, so one pass in
    /// index order sees every parent scope complete.
    pub(crate) fn freeze(&mut self) {
        for id in 0..self.nodes.len() {
            let inherited = match self.nodes[id].parent {
                Some(parent) => self.nodes[parent].scope.clone(),
                None => im::HashMap::new(),
            };
            let own = self.nodes[id].bindings.clone();
            let mut scope = inherited;
            for (var, binding) in own {
                scope.insert(var, binding);
            }
            self.nodes[id].scope = scope;
        }
    }

    /// Innermost binding of `var` visible from `node`.
    pub(crate) fn binding(&self, node: NodeId, var: VarId) -> Option<&Binding> {
        self.nodes[node].scope.get(&var)
    }

    /// Runs the before-all hooks of `node` unless another leaf already did.
    /// Concurrent arrivals wait for the first one to finish.
    pub(crate) fn enter(&self, node: NodeId, tb: &mut dyn TB) {
        let n = &self.nodes[node];
        n.visited.store(true, Ordering::SeqCst);
        let mut done = n.before_all_done.lock().unwrap_or_else(PoisonError::into_inner);
        if *done {
            return;
        }
        *done = true;
        for hook in &n.before_all {
            hook(&mut *tb);
        }
    }

    /// Visited nodes, innermost first.
    pub(crate) fn visited_inner_first(&self) -> Vec<NodeId> {
        (0..self.nodes.len())
            .rev()
            .filter(|id| self.nodes[*id].visited.load(Ordering::SeqCst))
            .collect()
    }
}
