//! devenv xtask - Build automation tasks
//!
//! ## Usage
//!
//! ```bash
//! # Build the devenv binary
//! cargo xtask build
//!
//! # Run all tests
//! cargo xtask test
//!
//! # Run lints
//! cargo xtask lint
//!
//! # Format code
//! cargo xtask fmt
//!
//! # Everything CI runs
//! cargo xtask ci
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use xshell::{cmd, Shell};

#[derive(Parser)]
#[command(name = "xtask")]
#[command(about = "Build automation for devenv")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the devenv binary
    Build {
        /// Build in release mode
        #[arg(long)]
        release: bool,
    },
    /// Run all tests
    Test {
        /// Run tests in release mode
        #[arg(long)]
        release: bool,
    },
    /// Run lints (clippy and rustfmt check)
    Lint,
    /// Format code
    Fmt {
        /// Check formatting without making changes
        #[arg(long)]
        check: bool,
    },
    /// Clean build artifacts
    Clean,
    /// Install devenv locally
    Install,
    /// Generate documentation
    Doc {
        /// Open documentation in browser
        #[arg(long)]
        open: bool,
    },
    /// Run CI checks (fmt, lint, test, build)
    Ci,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let sh = Shell::new()?;

    let project_root = project_root()?;
    sh.change_dir(&project_root);

    match cli.command {
        Commands::Build { release } => build(&sh, release)?,
        Commands::Test { release } => test(&sh, release)?,
        Commands::Lint => lint(&sh)?,
        Commands::Fmt { check } => fmt(&sh, check)?,
        Commands::Clean => clean(&sh)?,
        Commands::Install => install(&sh)?,
        Commands::Doc { open } => doc(&sh, open)?,
        Commands::Ci => ci(&sh)?,
    }

    Ok(())
}

fn project_root() -> Result<PathBuf> {
    let output = std::process::Command::new("cargo")
        .args(["locate-project", "--workspace", "--message-format=plain"])
        .output()
        .context("Failed to run cargo locate-project")?;

    let path = String::from_utf8(output.stdout)?;
    let manifest = PathBuf::from(path.trim());

    manifest
        .parent()
        .map(|p| p.to_path_buf())
        .context("Failed to find project root")
}

fn build(sh: &Shell, release: bool) -> Result<()> {
    println!("🔨 Building devenv...");

    if release {
        cmd!(sh, "cargo build --release --bin devenv").run()?;
    } else {
        cmd!(sh, "cargo build --bin devenv").run()?;
    }

    println!("✅ Build complete!");
    Ok(())
}

fn test(sh: &Shell, release: bool) -> Result<()> {
    println!("🧪 Running tests...");

    if release {
        cmd!(sh, "cargo test --release -p devenv").run()?;
    } else {
        cmd!(sh, "cargo test -p devenv").run()?;
    }

    println!("✅ All tests passed!");
    Ok(())
}

fn lint(sh: &Shell) -> Result<()> {
    println!("🔍 Running lints...");
    cmd!(sh, "cargo clippy --workspace --all-targets -- -D warnings").run()?;
    println!("✅ All lints passed!");
    Ok(())
}

fn fmt(sh: &Shell, check: bool) -> Result<()> {
    println!("🎨 Formatting code...");

    if check {
        cmd!(sh, "cargo fmt --all -- --check").run()?;
    } else {
        cmd!(sh, "cargo fmt --all").run()?;
    }

    println!("✅ Formatting complete!");
    Ok(())
}

fn clean(sh: &Shell) -> Result<()> {
    println!("🧹 Cleaning build artifacts...");
    cmd!(sh, "cargo clean").run()?;
    println!("✅ Clean complete!");
    Ok(())
}

fn install(sh: &Shell) -> Result<()> {
    println!("📥 Installing devenv locally...");
    cmd!(sh, "cargo install --path . --bin devenv").run()?;
    println!("✅ Installation complete!");
    Ok(())
}

fn doc(sh: &Shell, open: bool) -> Result<()> {
    println!("📚 Generating documentation...");

    if open {
        cmd!(sh, "cargo doc --no-deps -p devenv --open").run()?;
    } else {
        cmd!(sh, "cargo doc --no-deps -p devenv").run()?;
    }

    println!("✅ Documentation generated!");
    Ok(())
}

fn ci(sh: &Shell) -> Result<()> {
    println!("🔄 Running CI checks...");

    println!("\n📋 Step 1/4: Format check");
    fmt(sh, true)?;

    println!("\n📋 Step 2/4: Lint");
    lint(sh)?;

    println!("\n📋 Step 3/4: Tests");
    test(sh, false)?;

    println!("\n📋 Step 4/4: Release build");
    build(sh, true)?;

    println!("\n✅ All CI checks passed!");
    Ok(())
}
