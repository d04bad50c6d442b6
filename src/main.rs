//! devenv - local multi-container development environment manager
//!
//! This is the main CLI entry point for devenv.

use clap::{Parser, Subcommand};
use devenv::compose::parser::arch_identifier;
use devenv::config::Settings;
use devenv::debug::{DebugAddressSource, EnvFileMarker};
use devenv::error::{DevenvError, Result};
use devenv::network::{AddressPolicy, AddressProbe, SystemProbe};
use devenv::reconcile::{ReconcileReport, Reconciler};
use devenv::runtime::{CommandRunner, ProcessRunner, RecordingRunner};
use devenv::Environment;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// devenv - local development environment manager
#[derive(Parser)]
#[command(name = "devenv")]
#[command(version)]
#[command(about = "Manage a local multi-container development environment", long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    /// Settings file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Environment checkout directory
    #[arg(long, global = true)]
    work_dir: Option<PathBuf>,

    /// Constrained development context
    #[arg(long, global = true)]
    devenv: bool,

    /// Print container commands instead of running them
    #[arg(long, global = true)]
    dry_run: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List template services and whether they are deployed
    #[command(name = "ls", visible_alias = "list")]
    List {
        /// Print JSON
        #[arg(long)]
        json: bool,
    },

    /// Show a service definition
    Inspect {
        /// Service name
        service: String,
    },

    /// Write the deployment document for the given services
    Materialize {
        /// Services to deploy
        #[arg(required = true)]
        services: Vec<String>,
    },

    /// Write the deployment document and apply it
    Up {
        /// Services to deploy
        #[arg(required = true)]
        services: Vec<String>,
    },

    /// Watch for address drift until interrupted
    Watch,

    /// Regenerate debug configuration for the current address
    Regenerate,

    /// Restart the reverse proxy and web server
    Restart {
        /// Only the reverse proxy
        #[arg(long)]
        proxy_only: bool,
    },

    /// Manage the environment file
    Env {
        #[command(subcommand)]
        command: EnvCommands,
    },

    /// Display paths and addresses in use
    Info,
}

#[derive(Subcommand)]
enum EnvCommands {
    /// Print the environment file
    Show,
    /// Replace the environment file with the contents of another file
    Set {
        /// File to copy from
        from: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mut settings = Settings::load(cli.config.as_deref())?;
    if let Some(work_dir) = cli.work_dir {
        settings.work_dir = work_dir;
    }
    if cli.devenv {
        settings.dev_env = true;
    }
    settings.validate()?;

    let runner: Arc<dyn CommandRunner> = if cli.dry_run {
        Arc::new(RecordingRunner::new())
    } else {
        Arc::new(ProcessRunner::new(settings.command_timeout()).inherit_output(true))
    };

    let probe = Arc::new(SystemProbe::new(match settings.required_address_prefix() {
        Some(prefix) => AddressPolicy::with_prefix(prefix),
        None => AddressPolicy::any(),
    }));
    let marker = Arc::new(EnvFileMarker::new(
        settings.env_path(),
        settings.debug_host_key.clone(),
    ));

    let environment = Arc::new(Environment::load(settings, runner).await?);

    match cli.command {
        Commands::List { json } => {
            let snapshot = environment.snapshot().await;
            let statuses = snapshot.statuses();

            if json {
                println!("{}", serde_json::to_string_pretty(&statuses)?);
            } else {
                println!("{:<8} {:<30} {:<35} {:<30}", "ACTIVE", "SERVICE", "IMAGE", "DEPENDS ON");
                for status in statuses {
                    println!(
                        "{:<8} {:<30} {:<35} {:<30}",
                        if status.active { "*" } else { "" },
                        status.name,
                        status.image,
                        status.depends_on.join(",")
                    );
                }
            }
        }

        Commands::Inspect { service } => {
            let found = environment
                .get_service(&service)
                .await
                .ok_or_else(|| DevenvError::ServiceNotFound(service.clone()))?;
            let snapshot = environment.snapshot().await;
            let missing = snapshot.graph.missing_dependencies(&service);

            print!("{}", serde_yaml::to_string(&found.original)?);
            if !missing.is_empty() {
                println!("# undeclared dependencies: {}", missing.join(", "));
            }
        }

        Commands::Materialize { services } => {
            let outcome = environment.materialize(&services).await?;
            print_outcome(&outcome);
        }

        Commands::Up { services } => {
            let outcome = environment.up(&services).await?;
            print_outcome(&outcome);
        }

        Commands::Watch => {
            if environment.settings().dev_env {
                return Err(DevenvError::InvalidConfig(
                    "drift watching is disabled in the development context".to_string(),
                ));
            }

            let handle = Reconciler::new(environment.clone(), probe, marker).spawn();
            tokio::signal::ctrl_c().await?;
            info!("Received Ctrl+C, shutting down");
            if let Some(reconciler) = handle.stop().await {
                info!("{} reconciliations performed", reconciler.transitions());
            }
        }

        Commands::Regenerate => {
            let address = probe.local_address().ok_or_else(|| {
                DevenvError::Network("no qualifying local address found".to_string())
            })?;
            let previous = marker.current_address().await.ok();
            let report = environment
                .regenerate_debug_config(address, previous.as_deref())
                .await;
            print_report(&report);
        }

        Commands::Restart { proxy_only } => {
            environment.restart_web_tier(proxy_only).await?;
        }

        Commands::Env { command } => match command {
            EnvCommands::Show => {
                print!("{}", environment.env_content().await);
            }
            EnvCommands::Set { from } => {
                let content = tokio::fs::read_to_string(&from).await?;
                environment.set_env(content).await?;
                println!("{}", environment.settings().env_path().display());
            }
        },

        Commands::Info => {
            let settings = environment.settings();
            let local = probe
                .local_address()
                .map(|a| a.to_string())
                .unwrap_or_else(|| "-".to_string());
            let embedded = marker
                .current_address()
                .await
                .unwrap_or_else(|_| "-".to_string());

            println!("Work directory:   {}", settings.work_dir.display());
            println!("Architecture:     {}", arch_identifier());
            println!("Template:         {}", settings.template_path().display());
            println!("Deployment:       {}", settings.deployment_path().display());
            println!("Environment:      {}", settings.env_path().display());
            println!("Local address:    {}", local);
            println!("Debug address:    {}", embedded);
            println!(
                "Active services:  {}",
                environment.active_services().await.join(", ")
            );

            let issues = environment.snapshot().await.issues;
            if !issues.is_empty() {
                println!("Problems:");
                for issue in issues {
                    println!("  {}", issue);
                }
            }
        }
    }

    Ok(())
}

fn print_outcome(outcome: &devenv::compose::MaterializeOutcome) {
    println!("{}", outcome.path.display());
    println!("services: {}", outcome.emitted.join(", "));
    if !outcome.skipped.is_empty() {
        println!("unknown, skipped: {}", outcome.skipped.join(", "));
    }
    println!("sha256: {}", outcome.digest);
}

fn print_report(report: &ReconcileReport) {
    println!(
        "Debug host {} (was {})",
        report.address,
        report.previous.as_deref().unwrap_or("-")
    );
    println!("configured: {}", report.configured.join(", "));
    println!("restarted:  {}", report.restarted.join(", "));
    for failure in &report.failed {
        println!("failed:     {}: {}", failure.service, failure.error);
    }
    if let Some(ref e) = report.env_error {
        println!("environment file not updated: {}", e);
    }
}
