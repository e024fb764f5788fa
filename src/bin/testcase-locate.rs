// Locates testcase runtime blocks in Rust sources.
// Usage: cargo run --bin testcase-locate -- locate tests/stack.rs 42

fn main() -> miette::Result<()> {
    testcase::cli::run()
}
