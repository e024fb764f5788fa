//! The `testcase-locate` command-line interface.
//!
//! Maps source positions to the runtime blocks of testcase specs, for editor
//! integrations that want to run "the test under the cursor".

use std::io::Write;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use miette::{miette, IntoDiagnostic};
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

use crate::introspect::{BlockSummary, Introspector, RuntimeBlock};

// ============================================================================
// CLI ARGUMENTS
// ============================================================================

#[derive(Debug, Parser)]
#[command(
    name = "testcase-locate",
    version,
    about = "Locate the runtime blocks of testcase specs in Rust sources."
)]
pub struct LocateArgs {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print the runtime block that contains a line.
    Locate {
        #[arg(required = true)]
        file: PathBuf,
        /// 1-based line number.
        #[arg(required = true)]
        line: usize,
        /// Name under which the library is imported.
        #[arg(long, default_value = "testcase")]
        crate_name: String,
        /// Print a JSON summary instead of the source lines.
        #[arg(long)]
        json: bool,
    },
    /// List every runtime block of the `.rs` files in a directory.
    List {
        #[arg(required = true)]
        dir: PathBuf,
        #[arg(long, default_value = "testcase")]
        crate_name: String,
        #[arg(long)]
        json: bool,
    },
}

// ============================================================================
// DISPATCH
// ============================================================================

pub fn run() -> miette::Result<()> {
    execute(LocateArgs::parse())
}

pub fn execute(args: LocateArgs) -> miette::Result<()> {
    match args.command {
        Command::Locate {
            file,
            line,
            crate_name,
            json,
        } => handle_locate(&file, line, &crate_name, json),
        Command::List {
            dir,
            crate_name,
            json,
        } => handle_list(&dir, &crate_name, json),
    }
}

fn handle_locate(file: &Path, line: usize, crate_name: &str, json: bool) -> miette::Result<()> {
    if !file.exists() {
        return Err(miette!("{} does not exist", file.display()));
    }
    let block = Introspector::new(crate_name)
        .locate(file, line)?
        .ok_or_else(|| miette!("no runtime block contains {}:{}", file.display(), line))?;
    if json {
        return print_json(&block.summary());
    }
    print_block(&block).into_diagnostic()
}

fn handle_list(dir: &Path, crate_name: &str, json: bool) -> miette::Result<()> {
    let blocks = Introspector::new(crate_name).list(dir)?;
    if json {
        let summaries: Vec<BlockSummary> = blocks.iter().map(RuntimeBlock::summary).collect();
        return print_json(&summaries);
    }
    for block in &blocks {
        println!(
            "{}:{}-{} ({} statements)",
            block.file.display(),
            block.start_line,
            block.end_line,
            block.stmts.len()
        );
    }
    Ok(())
}

// ============================================================================
// OUTPUT
// ============================================================================

fn print_json<S: serde::Serialize>(value: &S) -> miette::Result<()> {
    let text = serde_json::to_string_pretty(value).into_diagnostic()?;
    println!("{}", text);
    Ok(())
}

fn print_block(block: &RuntimeBlock) -> std::io::Result<()> {
    let mut stdout = StandardStream::stdout(ColorChoice::Auto);
    stdout.set_color(ColorSpec::new().set_fg(Some(Color::Yellow)).set_bold(true))?;
    writeln!(
        stdout,
        "{}:{}-{}",
        block.file.display(),
        block.start_line,
        block.end_line
    )?;
    stdout.reset()?;
    for (offset, line) in block.text.lines().enumerate() {
        writeln!(stdout, "{:>5} | {}", block.start_line + offset, line)?;
    }
    Ok(())
}
