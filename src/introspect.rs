//! Source introspection: mapping a file position back to the runtime block
//! that contains it.
//!
//! A *runtime block* is the body of a closure that runs with a test context:
//! either its first parameter is annotated as the crate's `T` (under any
//! alias the file imports), or it is the single-argument closure handed to a
//! DSL registration method such as `test` or `before`. Editors and the
//! `testcase-locate` binary use this to find the leaf under the cursor.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use miette::{Diagnostic, NamedSource, SourceSpan};
use serde::Serialize;
use syn::spanned::Spanned;
use syn::visit::Visit as SynVisit;
use syn::{Expr, ExprClosure, Pat, Stmt};
use thiserror::Error;
use walkdir::WalkDir;

pub mod imports;
pub mod walk;

pub use imports::AliasTable;
pub use walk::{walk, NodeRef, Visit};

use crate::util::Stack;

/// Methods whose closure argument receives a test context.
const DSL_METHODS: &[&str] = &["test", "then", "before", "after", "around"];

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Error, Diagnostic)]
pub enum IntrospectError {
    #[error("failed to read {}", path.display())]
    #[diagnostic(code(testcase::introspect::io))]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to scan {}", path.display())]
    #[diagnostic(code(testcase::introspect::scan))]
    Scan {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("{message}")]
    #[diagnostic(
        code(testcase::introspect::parse),
        help("runtime blocks can only be located in files that parse as Rust")
    )]
    Parse {
        message: String,
        #[source_code]
        src: NamedSource<String>,
        #[label("here")]
        span: SourceSpan,
    },
}

impl IntrospectError {
    fn parse(path: &Path, text: &str, err: &syn::Error) -> Self {
        let start = err.span().start();
        let offset = byte_offset(text, start.line, start.column);
        let len = text[offset..].chars().next().map_or(0, char::len_utf8);
        Self::Parse {
            message: format!("{}: {}", path.display(), err),
            src: NamedSource::new(path.display().to_string(), text.to_string()),
            span: (offset, len).into(),
        }
    }
}

/// Byte offset of a 1-based line and 0-based character column.
fn byte_offset(text: &str, line: usize, column: usize) -> usize {
    let line_start: usize = text
        .split_inclusive('\n')
        .take(line.saturating_sub(1))
        .map(str::len)
        .sum();
    let rest = &text[line_start..];
    let column = rest
        .char_indices()
        .take_while(|(_, c)| *c != '\n')
        .nth(column)
        .map_or_else(|| rest.find('\n').unwrap_or(rest.len()), |(i, _)| i);
    line_start + column
}

// ============================================================================
// RUNTIME BLOCKS
// ============================================================================

#[derive(Debug, Clone)]
pub struct RuntimeBlock {
    pub file: PathBuf,
    pub start_line: usize,
    pub end_line: usize,
    pub stmts: Vec<Stmt>,
    /// The block's source lines.
    pub text: String,
    called: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlockSummary {
    pub file: String,
    pub start_line: usize,
    pub end_line: usize,
    pub statements: usize,
    pub calls: Vec<String>,
}

impl RuntimeBlock {
    fn from_closure(file: &Path, source: &str, closure: &ExprClosure) -> Self {
        let span = closure.body.span();
        let (start_line, end_line) = (span.start().line, span.end().line);
        let stmts = match closure.body.as_ref() {
            Expr::Block(block) => block.block.stmts.clone(),
            other => vec![Stmt::Expr(other.clone(), None)],
        };
        let text = source
            .lines()
            .skip(start_line.saturating_sub(1))
            .take(end_line + 1 - start_line)
            .collect::<Vec<_>>()
            .join("\n");
        let mut calls = CallNames::default();
        calls.visit_expr(&closure.body);
        Self {
            file: file.to_path_buf(),
            start_line,
            end_line,
            stmts,
            text,
            called: calls.names,
        }
    }

    /// Whether the block calls a function or method named `name`.
    pub fn calls(&self, name: &str) -> bool {
        self.called.iter().any(|called| called == name)
    }

    pub fn contains_line(&self, line: usize) -> bool {
        self.start_line <= line && line <= self.end_line
    }

    pub fn summary(&self) -> BlockSummary {
        BlockSummary {
            file: self.file.display().to_string(),
            start_line: self.start_line,
            end_line: self.end_line,
            statements: self.stmts.len(),
            calls: self.called.clone(),
        }
    }
}

#[derive(Default)]
struct CallNames {
    names: Vec<String>,
}

impl<'ast> SynVisit<'ast> for CallNames {
    fn visit_expr_call(&mut self, node: &'ast syn::ExprCall) {
        if let Expr::Path(path) = node.func.as_ref() {
            if let Some(last) = path.path.segments.last() {
                self.names.push(last.ident.to_string());
            }
        }
        syn::visit::visit_expr_call(self, node);
    }

    fn visit_expr_method_call(&mut self, node: &'ast syn::ExprMethodCall) {
        self.names.push(node.method.to_string());
        syn::visit::visit_expr_method_call(self, node);
    }
}

// ============================================================================
// INTROSPECTOR
// ============================================================================

#[derive(Debug, Clone)]
pub struct Introspector {
    crate_name: String,
}

impl Default for Introspector {
    fn default() -> Self {
        Self::new("testcase")
    }
}

impl Introspector {
    pub fn new(crate_name: &str) -> Self {
        Self {
            crate_name: crate_name.replace('-', "_"),
        }
    }

    pub fn crate_name(&self) -> &str {
        &self.crate_name
    }

    /// The innermost runtime block containing `line` (1-based) of `path`.
    /// A missing file yields `Ok(None)`.
    pub fn locate(&self, path: &Path, line: usize) -> Result<Option<RuntimeBlock>, IntrospectError> {
        let Some(source) = read_if_present(path)? else {
            tracing::debug!(path = %path.display(), "no such file");
            return Ok(None);
        };
        let file = parse(path, &source)?;
        let aliases = AliasTable::from_file(&self.crate_name, &file);

        let mut innermost = None;
        walk(&file, |node, ancestors| {
            let (start, _) = node.lines();
            if start > line {
                return Visit::Stop;
            }
            if !node.covers(line) {
                return Visit::SkipChildren;
            }
            if let NodeRef::Closure(closure) = node {
                if is_runtime_closure(&aliases, closure, ancestors) {
                    innermost = Some(closure);
                }
            }
            Visit::Continue
        });

        Ok(innermost.map(|closure| RuntimeBlock::from_closure(path, &source, closure)))
    }

    /// Every runtime block of one file, in source order.
    pub fn blocks(&self, path: &Path) -> Result<Vec<RuntimeBlock>, IntrospectError> {
        let source = fs::read_to_string(path).map_err(|source| IntrospectError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let file = parse(path, &source)?;
        let aliases = AliasTable::from_file(&self.crate_name, &file);

        let mut blocks = Vec::new();
        walk(&file, |node, ancestors| {
            if let NodeRef::Closure(closure) = node {
                if is_runtime_closure(&aliases, closure, ancestors) {
                    blocks.push(RuntimeBlock::from_closure(path, &source, closure));
                }
            }
            Visit::Continue
        });
        Ok(blocks)
    }

    /// Every runtime block of the `.rs` files directly inside `dir`.
    pub fn list(&self, dir: &Path) -> Result<Vec<RuntimeBlock>, IntrospectError> {
        let package = Package::load(self, dir)?;
        Ok(package.files.into_iter().flat_map(|f| f.blocks).collect())
    }
}

fn read_if_present(path: &Path) -> Result<Option<String>, IntrospectError> {
    match fs::read_to_string(path) {
        Ok(source) => Ok(Some(source)),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(IntrospectError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

fn parse(path: &Path, source: &str) -> Result<syn::File, IntrospectError> {
    syn::parse_file(source).map_err(|err| IntrospectError::parse(path, source, &err))
}

fn is_runtime_closure(
    aliases: &AliasTable,
    closure: &ExprClosure,
    ancestors: &Stack<NodeRef<'_>>,
) -> bool {
    let first = closure.inputs.first();
    if let Some(Pat::Type(typed)) = first {
        return aliases.is_context(&typed.ty);
    }
    if closure.inputs.len() != 1 {
        return false;
    }
    match ancestors.peek() {
        Some(NodeRef::MethodCall(call)) => {
            DSL_METHODS.contains(&call.method.to_string().as_str())
                && call
                    .args
                    .iter()
                    .any(|arg| matches!(arg, Expr::Closure(c) if std::ptr::eq(c, closure)))
        }
        _ => false,
    }
}

// ============================================================================
// PACKAGES
// ============================================================================

#[derive(Debug, Clone)]
pub struct SourceFile {
    pub path: PathBuf,
    pub blocks: Vec<RuntimeBlock>,
}

/// The `.rs` files directly inside one directory. Every file is resolved
/// with its own alias table.
#[derive(Debug, Clone)]
pub struct Package {
    pub dir: PathBuf,
    pub files: Vec<SourceFile>,
}

impl Package {
    pub fn load(introspector: &Introspector, dir: &Path) -> Result<Self, IntrospectError> {
        let mut files = Vec::new();
        for entry in WalkDir::new(dir)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
        {
            let entry = entry.map_err(|source| IntrospectError::Scan {
                path: dir.to_path_buf(),
                source,
            })?;
            let path = entry.path();
            if !entry.file_type().is_file() || path.extension().map_or(true, |ext| ext != "rs") {
                continue;
            }
            let blocks = introspector.blocks(path)?;
            files.push(SourceFile {
                path: path.to_path_buf(),
                blocks,
            });
        }
        tracing::debug!(dir = %dir.display(), files = files.len(), "loaded package");
        Ok(Self {
            dir: dir.to_path_buf(),
            files,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_offset_counts_characters_within_the_line() {
        let text = "ab\nçd\nef";
        assert_eq!(byte_offset(text, 1, 0), 0);
        assert_eq!(byte_offset(text, 2, 1), 5);
        assert_eq!(byte_offset(text, 3, 1), 8);
        assert_eq!(byte_offset(text, 3, 9), 9);
    }

    #[test]
    fn runtime_closure_rules() {
        let source = r#"
fn spec(s: &mut Spec) {
    s.test("a", |t| one(t));
    s.describe("b", |s| two(s));
    let f = |t: &mut testcase::T| three(t);
    items.iter().map(|x| four(x));
}
"#;
        let file = syn::parse_file(source).expect("fixture parses");
        let path = Path::new("inline.rs");
        let aliases = AliasTable::from_file("testcase", &file);
        let mut found = Vec::new();
        walk(&file, |node, ancestors| {
            if let NodeRef::Closure(closure) = node {
                if is_runtime_closure(&aliases, closure, ancestors) {
                    found.push(RuntimeBlock::from_closure(path, source, closure));
                }
            }
            Visit::Continue
        });
        assert_eq!(found.len(), 2);
        assert!(found[0].calls("one"));
        assert!(found[1].calls("three"));
        assert_eq!(found[1].start_line, 5);
    }
}
