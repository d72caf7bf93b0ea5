//! `cargo xtask` helpers for the trackdb workspace.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use xshell::{Shell, cmd};

/// Targets of the cargo-fuzz workspace in `fuzz/`.
const FUZZ_TARGETS: &[&str] = &["like_escape", "field_escape", "connection_string"];

#[derive(Parser)]
#[command(name = "xtask", about = "Checks for the trackdb crates")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Formatting check, clippy with warnings denied, then the test suite
    Ci,
    /// Test the workspace, or a single crate such as trackdb-pool
    Test {
        #[arg(short, long)]
        package: Option<String>,
    },
    /// Run the escaper and connection-string fuzzers (nightly + cargo-fuzz)
    Fuzz {
        /// Time budget for each target
        #[arg(long, default_value_t = 30)]
        seconds: u32,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let sh = Shell::new()?;
    sh.change_dir(workspace_root()?);

    match cli.command {
        Command::Ci => {
            cmd!(sh, "cargo fmt --all -- --check").run()?;
            cmd!(sh, "cargo clippy --workspace --all-targets -- -D warnings").run()?;
            test(&sh, None)?;
        }
        Command::Test { package } => test(&sh, package.as_deref())?,
        Command::Fuzz { seconds } => fuzz(&sh, seconds)?,
    }

    Ok(())
}

/// The xtask crate sits directly below the workspace root.
fn workspace_root() -> Result<PathBuf> {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .map(Path::to_path_buf)
        .context("xtask has no parent directory")
}

fn test(sh: &Shell, package: Option<&str>) -> Result<()> {
    match package {
        Some(package) => cmd!(sh, "cargo test -p {package}").run()?,
        None => cmd!(sh, "cargo test --workspace").run()?,
    }
    Ok(())
}

fn fuzz(sh: &Shell, seconds: u32) -> Result<()> {
    let _dir = sh.push_dir("fuzz");
    let max_time = format!("-max_total_time={seconds}");
    for target in FUZZ_TARGETS {
        cmd!(sh, "cargo +nightly fuzz run {target} -- {max_time}")
            .run()
            .with_context(|| format!("fuzz target {target} failed"))?;
    }
    Ok(())
}
