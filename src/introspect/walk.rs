//! Ancestor-aware walk over a parsed file.
//!
//! Only the node kinds the introspector cares about are reported: items,
//! closures and calls. The callback decides, per node, whether to descend.

use proc_macro2::Span;
use syn::spanned::Spanned;
use syn::visit::{self, Visit as SynVisit};

use crate::util::Stack;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visit {
    Continue,
    SkipChildren,
    Stop,
}

#[derive(Clone, Copy)]
pub enum NodeRef<'ast> {
    Item(&'ast syn::Item),
    Closure(&'ast syn::ExprClosure),
    MethodCall(&'ast syn::ExprMethodCall),
    Call(&'ast syn::ExprCall),
}

impl<'ast> NodeRef<'ast> {
    pub fn span(&self) -> Span {
        match self {
            NodeRef::Item(node) => node.span(),
            NodeRef::Closure(node) => node.span(),
            NodeRef::MethodCall(node) => node.span(),
            NodeRef::Call(node) => node.span(),
        }
    }

    /// First and last line, 1-based, both included.
    pub fn lines(&self) -> (usize, usize) {
        let span = self.span();
        (span.start().line, span.end().line)
    }

    pub fn covers(&self, line: usize) -> bool {
        let (start, end) = self.lines();
        start <= line && line <= end
    }
}

impl std::fmt::Debug for NodeRef<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self {
            NodeRef::Item(_) => "Item",
            NodeRef::Closure(_) => "Closure",
            NodeRef::MethodCall(_) => "MethodCall",
            NodeRef::Call(_) => "Call",
        };
        let (start, end) = self.lines();
        write!(f, "{}({}..={})", kind, start, end)
    }
}

struct Walker<'ast, F> {
    f: F,
    ancestors: Stack<NodeRef<'ast>>,
    stopped: bool,
}

impl<'ast, F> Walker<'ast, F>
where
    F: FnMut(NodeRef<'ast>, &Stack<NodeRef<'ast>>) -> Visit,
{
    fn enter(&mut self, node: NodeRef<'ast>, descend: impl FnOnce(&mut Self)) {
        if self.stopped {
            return;
        }
        match (self.f)(node, &self.ancestors) {
            Visit::Stop => self.stopped = true,
            Visit::SkipChildren => {}
            Visit::Continue => {
                self.ancestors.push(node);
                descend(self);
                self.ancestors.pop();
            }
        }
    }
}

impl<'ast, F> SynVisit<'ast> for Walker<'ast, F>
where
    F: FnMut(NodeRef<'ast>, &Stack<NodeRef<'ast>>) -> Visit,
{
    fn visit_item(&mut self, node: &'ast syn::Item) {
        self.enter(NodeRef::Item(node), |w| visit::visit_item(w, node));
    }

    fn visit_expr_closure(&mut self, node: &'ast syn::ExprClosure) {
        self.enter(NodeRef::Closure(node), |w| visit::visit_expr_closure(w, node));
    }

    fn visit_expr_method_call(&mut self, node: &'ast syn::ExprMethodCall) {
        self.enter(NodeRef::MethodCall(node), |w| {
            visit::visit_expr_method_call(w, node)
        });
    }

    fn visit_expr_call(&mut self, node: &'ast syn::ExprCall) {
        self.enter(NodeRef::Call(node), |w| visit::visit_expr_call(w, node));
    }
}

/// Walks `file` depth-first in source order, calling `f` with each node and
/// its ancestors (innermost on top).
pub fn walk<'ast, F>(file: &'ast syn::File, f: F)
where
    F: FnMut(NodeRef<'ast>, &Stack<NodeRef<'ast>>) -> Visit,
{
    let mut walker = Walker {
        f,
        ancestors: Stack::new(),
        stopped: false,
    };
    walker.visit_file(file);
    assert!(
        walker.ancestors.is_empty(),
        "walk finished with {} ancestors still open",
        walker.ancestors.len()
    );
}
