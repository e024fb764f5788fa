//! Tree-shaped, human readable test report.
//!
//! The formatter takes the flat list of [`TestingCase`]s a run produced and
//! renders the nesting implied by their paths:
//!
//! ```text
//! my_test
//!   Calculator
//!     when adding
//!       returns the sum
//!       overflows [FAIL]
//! ```
//!
//! Passing runs render nothing unless verbose, failing runs render only the
//! branches that contain a failure.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::io::Write;
use termcolor::{Buffer, Color, ColorSpec, WriteColor};

use crate::config::Config;

static COLOUR_TERMS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(xterm|screen|tmux|rxvt|vt100|vt220|linux|ansi|cygwin|putty|konsole|gnome|alacritty|kitty|wezterm|foot|iterm|eterm)([-.+].*)?$",
    )
    .expect("colour TERM pattern is valid")
});

static COLOURLESS_TERMS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(dumb|unknown|emacs)$|-(m|mono)$").expect("colourless TERM pattern is valid")
});

/// Whether `TERM` names a terminal that understands ANSI colours.
pub fn colour_supported(term: Option<&str>) -> bool {
    let Some(term) = term.map(str::trim).filter(|t| !t.is_empty()) else {
        return false;
    };
    COLOUR_TERMS.is_match(term) && !COLOURLESS_TERMS.is_match(term)
}

/// One completed run, identified by its full path of names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestingCase {
    pub path: Vec<String>,
    pub failed: bool,
    pub skipped: bool,
}

impl TestingCase {
    pub fn new(path: Vec<String>, failed: bool, skipped: bool) -> Self {
        Self {
            path,
            failed,
            skipped,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DocumentFormat {
    pub verbose: bool,
    pub colour: bool,
}

#[derive(Debug, Default)]
struct DocNode {
    name: String,
    children: Vec<DocNode>,
    failed: bool,
    skipped: bool,
}

impl DocNode {
    fn child_mut(&mut self, name: &str) -> &mut DocNode {
        let position = match self.children.iter().position(|c| c.name == name) {
            Some(position) => position,
            None => {
                self.children.push(DocNode {
                    name: name.to_string(),
                    ..DocNode::default()
                });
                self.children.len() - 1
            }
        };
        &mut self.children[position]
    }

    fn has_failure(&self) -> bool {
        self.failed || self.children.iter().any(DocNode::has_failure)
    }
}

impl DocumentFormat {
    pub fn from_config(config: &Config) -> Self {
        Self {
            verbose: config.verbose,
            colour: colour_supported(config.term.as_deref()),
        }
    }

    pub fn format(&self, cases: &[TestingCase]) -> String {
        let any_failed = cases.iter().any(|c| c.failed);
        if !any_failed && !self.verbose {
            return String::new();
        }

        let mut root = DocNode::default();
        for case in cases {
            let mut node = &mut root;
            for name in &case.path {
                node = node.child_mut(name);
            }
            node.failed |= case.failed;
            node.skipped |= case.skipped;
        }

        let mut buffer = if self.colour {
            Buffer::ansi()
        } else {
            Buffer::no_color()
        };
        for child in &root.children {
            // Writing into an in-memory buffer does not fail.
            let _ = self.render(&mut buffer, child, 0);
        }
        String::from_utf8_lossy(buffer.as_slice()).into_owned()
    }

    fn render(&self, out: &mut Buffer, node: &DocNode, depth: usize) -> std::io::Result<()> {
        if !self.verbose && !node.has_failure() {
            return Ok(());
        }
        write!(out, "{}", "  ".repeat(depth))?;

        if !node.children.is_empty() {
            writeln!(out, "{}", node.name)?;
            for child in &node.children {
                self.render(out, child, depth + 1)?;
            }
            return Ok(());
        }

        let (colour, marker) = if node.failed {
            (Color::Red, " [FAIL]")
        } else if node.skipped {
            (Color::Yellow, " [SKIP]")
        } else {
            (Color::Green, "")
        };
        out.set_color(ColorSpec::new().set_fg(Some(colour)))?;
        write!(out, "{}{}", node.name, marker)?;
        out.reset()?;
        writeln!(out)
    }
}
