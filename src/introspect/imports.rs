//! Resolution of the names under which the test context type is in scope.

use std::collections::HashSet;

use syn::visit::{self, Visit};
use syn::{Type, UseTree};

/// Names that refer to `<crate>::T` in one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AliasTable {
    /// Names the crate itself is reachable as (`testcase`, `use testcase as tc`).
    crates: HashSet<String>,
    /// Bare identifiers bound to `T` (`use testcase::T`, `use testcase::T as Ctx`).
    names: HashSet<String>,
    glob: bool,
}

impl AliasTable {
    pub fn new(crate_name: &str) -> Self {
        Self {
            crates: HashSet::from([crate_name.to_string()]),
            names: HashSet::new(),
            glob: false,
        }
    }

    /// Collects every `use` and `extern crate` item of `file`, at any depth.
    pub fn from_file(crate_name: &str, file: &syn::File) -> Self {
        let mut table = Self::new(crate_name);
        table.visit_file(file);
        table
    }

    fn is_crate(&self, segment: &str) -> bool {
        self.crates.contains(segment)
    }

    /// `path` names the context type: `<crate>::T` or `<crate>::t::T`.
    fn is_context_path(&self, path: &[String]) -> bool {
        match path {
            [krate, last] => self.is_crate(krate) && last == "T",
            [krate, module, last] => self.is_crate(krate) && module == "t" && last == "T",
            _ => false,
        }
    }

    fn add(&mut self, prefix: &mut Vec<String>, tree: &UseTree) {
        match tree {
            UseTree::Path(path) => {
                prefix.push(path.ident.to_string());
                self.add(prefix, &path.tree);
                prefix.pop();
            }
            UseTree::Name(name) => {
                let ident = name.ident.to_string();
                prefix.push(ident.clone());
                if self.is_context_path(prefix.as_slice()) {
                    self.names.insert(ident);
                }
                prefix.pop();
            }
            UseTree::Rename(rename) => {
                prefix.push(rename.ident.to_string());
                let alias = rename.rename.to_string();
                if self.is_context_path(prefix.as_slice()) {
                    self.names.insert(alias);
                } else if prefix.len() == 1 && self.is_crate(&prefix[0]) {
                    self.crates.insert(alias);
                }
                prefix.pop();
            }
            UseTree::Glob(_) => {
                let reexports = match prefix.as_slice() {
                    [krate] => self.is_crate(krate),
                    [krate, module] => self.is_crate(krate) && module == "t",
                    _ => false,
                };
                self.glob |= reexports;
            }
            UseTree::Group(group) => {
                for item in &group.items {
                    self.add(prefix, item);
                }
            }
        }
    }

    /// Whether `ty` is the context type, possibly behind `&` or `&mut`.
    pub fn is_context(&self, ty: &Type) -> bool {
        match ty {
            Type::Reference(reference) => self.is_context(&reference.elem),
            Type::Paren(paren) => self.is_context(&paren.elem),
            Type::Group(group) => self.is_context(&group.elem),
            Type::Path(path) if path.qself.is_none() => {
                let segments: Vec<String> = path
                    .path
                    .segments
                    .iter()
                    .map(|s| s.ident.to_string())
                    .collect();
                match segments.as_slice() {
                    [name] => self.names.contains(name) || (self.glob && name == "T"),
                    _ => self.is_context_path(&segments),
                }
            }
            _ => false,
        }
    }
}

impl<'ast> Visit<'ast> for AliasTable {
    fn visit_item_use(&mut self, node: &'ast syn::ItemUse) {
        self.add(&mut Vec::new(), &node.tree);
    }

    fn visit_item_extern_crate(&mut self, node: &'ast syn::ItemExternCrate) {
        if let Some((_, rename)) = &node.rename {
            if self.is_crate(&node.ident.to_string()) {
                self.crates.insert(rename.to_string());
            }
        }
        visit::visit_item_extern_crate(self, node);
    }
}
