//! kubecheck CLI

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use kubecheck_checks::{
    build_checks, ClusterClient, KubeCluster, Probes, ReqwestHttpProbe, ThreadRandom,
    TrustDnsResolver,
};
use kubecheck_config::{load_config, Config};
use kubecheck_core::Healthcheck;
use kubecheck_runtime::{Hooks, Runner, ShutdownSignal, SignalHandler};
use kubecheck_server::{AppState, Report, ReportEntry, Server};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "kubecheck")]
#[command(about = "Healthcheck evaluation engine for Kubernetes clusters", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve healthcheck reports over HTTP
    Serve {
        /// Path to configuration file
        #[arg(short, long, default_value = "kubecheck.yaml")]
        config: PathBuf,

        /// Log level or filter directive, overrides the configuration
        #[arg(short, long, env = "KUBECHECK_LOG_LEVEL")]
        log_level: Option<String>,

        /// Listen address, overrides the configuration
        #[arg(long)]
        listen: Option<SocketAddr>,
    },

    /// Run every check once and print the report
    Run {
        /// Path to configuration file
        #[arg(short, long, default_value = "kubecheck.yaml")]
        config: PathBuf,

        /// Log level or filter directive, overrides the configuration
        #[arg(short, long, env = "KUBECHECK_LOG_LEVEL")]
        log_level: Option<String>,
    },

    /// Validate configuration file
    Validate {
        /// Path to configuration file
        #[arg(short, long, default_value = "kubecheck.yaml")]
        config: PathBuf,
    },

    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            config,
            log_level,
            listen,
        } => {
            let mut config = load_config(&config)
                .with_context(|| format!("Failed to load {}", config.display()))?;
            init_tracing(&config, log_level.as_deref())?;

            if let Some(listen) = listen {
                config.server.listen = listen;
            }

            tracing::info!(
                listen = %config.server.listen,
                checks = config.checks.len(),
                webhooks = config.webhooks.len(),
                "Configuration loaded"
            );

            let (checks, runner) = assemble(&config).await?;

            let shutdown = ShutdownSignal::new();
            SignalHandler::new(shutdown.clone()).spawn();

            let server = Server::new(
                config.server.clone(),
                AppState::new(checks, runner.clone()),
                shutdown,
            );
            server.run().await?;

            runner.hooks().drain().await;
            tracing::info!("Server stopped");
            Ok(())
        }

        Commands::Run { config, log_level } => {
            let config = load_config(&config)
                .with_context(|| format!("Failed to load {}", config.display()))?;
            init_tracing(&config, log_level.as_deref())?;

            let (checks, runner) = assemble(&config).await?;

            let report: Report = runner
                .run(&checks, |description, result| {
                    ReportEntry::new(description, result, true)
                })
                .await
                .into_iter()
                .collect();
            runner.hooks().drain().await;

            println!("{}", serde_json::to_string_pretty(&report)?);

            if report.is_failed() {
                std::process::exit(1);
            }
            Ok(())
        }

        Commands::Validate { config: path } => {
            tracing_subscriber::fmt().with_target(false).init();

            tracing::info!("Validating configuration: {}", path.display());

            match load_config(&path) {
                Ok(config) => {
                    tracing::info!("Configuration is valid");
                    tracing::info!("  Listen: {}", config.server.listen);
                    tracing::info!("  Checks: {}", config.checks.len());
                    tracing::info!("  Webhooks: {}", config.webhooks.len());
                    tracing::info!("  Kubernetes: {}", config.requires_cluster());
                    Ok(())
                }
                Err(e) => {
                    tracing::error!("Configuration validation failed: {}", e);
                    std::process::exit(1);
                }
            }
        }

        Commands::Version => {
            println!("kubecheck");
            println!("Version: {}", env!("CARGO_PKG_VERSION"));
            println!("Rust version: {}", env!("CARGO_PKG_RUST_VERSION"));
            Ok(())
        }
    }
}

/// Build the shared probes once, then every configured check and the runner
async fn assemble(config: &Config) -> Result<(Vec<Arc<dyn Healthcheck>>, Runner)> {
    let cluster = if config.requires_cluster() {
        let cluster = KubeCluster::connect(&config.kubernetes)
            .await
            .context("Failed to connect to Kubernetes")?;
        Some(Arc::new(cluster) as Arc<dyn ClusterClient>)
    } else {
        None
    };

    let probes = Probes {
        http: Arc::new(ReqwestHttpProbe::with_defaults()?),
        resolver: Arc::new(TrustDnsResolver::from_system()),
        cluster,
        random: Arc::new(ThreadRandom),
    };

    let checks = build_checks(&config.checks, &probes)?;
    let hooks = Hooks::from_config(&config.webhooks, reqwest::Client::new());

    tracing::debug!(checks = checks.len(), hooks = hooks.len(), "Checks built");

    Ok((checks, Runner::from_config(&config.runner).with_hooks(hooks)))
}

fn init_tracing(config: &Config, level: Option<&str>) -> Result<()> {
    let level = level.unwrap_or(&config.logging.level);
    let filter = EnvFilter::try_new(level)
        .with_context(|| format!("Invalid log level: {level}"))?
        .add_directive("hyper=warn".parse()?)
        .add_directive("kube_client=warn".parse()?);

    let registry = tracing_subscriber::registry().with(filter);

    if config.logging.format == "json" {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_target(false))
            .init();
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_level(true),
            )
            .init();
    }

    Ok(())
}
