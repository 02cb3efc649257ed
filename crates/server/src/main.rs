//! Kiln Server
//!
//! CLI and HTTP entry points for the meta-agent pipeline. `run` executes one
//! specification and stores the artifacts; `serve` exposes the pipeline over
//! HTTP with one shared gateway for all requests.

mod api;
mod config;
mod store;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use config::Overrides;
use kiln_core::config::KilnConfig;
use kiln_core::gateway::{LlmGateway, RadkitBackend};
use kiln_core::state::{PipelineOutcome, Specification};
use kiln_core::swarm::Coordinator;
use kiln_core::tools::ToolSandbox;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use store::FsArtifactStore;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Kiln - turns business SOPs into deployable agents")]
struct Args {
    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand)]
enum CliCommand {
    /// Run the pipeline on one specification file (JSON)
    Run {
        /// Specification file
        spec: PathBuf,
        /// Directory artifacts are stored under
        #[arg(short, long, default_value = "agents")]
        out: PathBuf,
        /// Config file (default: .kiln/config.json)
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Give up (as cancelled) after this many seconds
        #[arg(long)]
        timeout_secs: Option<u64>,
        /// Directory name for this agent's files
        #[arg(long)]
        agent_id: Option<String>,
        #[command(flatten)]
        overrides: Overrides,
    },
    /// Start the HTTP server
    Serve {
        #[arg(short, long, default_value = "8080")]
        port: u16,
        #[arg(short, long, default_value = "agents")]
        out: PathBuf,
        #[arg(short, long)]
        config: Option<PathBuf>,
        #[command(flatten)]
        overrides: Overrides,
    },
    /// Write the default configuration to .kiln/config.json
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("kiln=info"));
    let json = std::env::var("KILN_LOG_JSON").map(|v| v == "1").unwrap_or(false);
    if json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

fn build_coordinator(config: &KilnConfig) -> Result<Coordinator> {
    if let Some(var) = config.gateway.model.missing_api_key() {
        tracing::warn!(var, "API key not set; model calls will fail");
    }
    let backend = Arc::new(RadkitBackend::new(config.gateway.model.clone()));
    let gateway = LlmGateway::new(backend, &config.gateway);
    let sandbox = ToolSandbox::from_config(&config.sandbox).context("building tool sandbox")?;
    tracing::info!(
        provider = config.gateway.model.provider.display_name(),
        model = %config.gateway.model.model,
        slots = config.gateway.max_concurrent_calls,
        docs = sandbox.has_docs(),
        "coordinator ready"
    );
    Coordinator::new(gateway, sandbox, config.pipeline.clone()).context("invalid pipeline configuration")
}

async fn run_once(
    spec_path: PathBuf,
    out: PathBuf,
    config: KilnConfig,
    timeout_secs: Option<u64>,
    agent_id: Option<String>,
) -> Result<()> {
    let raw = tokio::fs::read_to_string(&spec_path)
        .await
        .with_context(|| format!("reading {}", spec_path.display()))?;
    let specification: Specification =
        serde_json::from_str(&raw).with_context(|| format!("parsing {}", spec_path.display()))?;
    let agent_id = agent_id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    let coordinator = build_coordinator(&config)?;
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("interrupted, cancelling pipeline");
                cancel.cancel();
            }
        });
    }

    let state = match timeout_secs {
        Some(secs) => {
            coordinator
                .run_with_timeout(specification, Duration::from_secs(secs), cancel)
                .await
        }
        None => coordinator.execute(specification, cancel).await,
    };

    let store = FsArtifactStore::new(&out);
    let events = state.events.clone();
    let outcome = Coordinator::into_outcome(state);
    store::persist_events(&store, &agent_id, &events).await?;

    match outcome {
        PipelineOutcome::Success(artifact) => {
            let paths = store::persist_artifact(
                &store,
                &agent_id,
                coordinator.config().source_extension(),
                &artifact,
            )
            .await?;
            println!("Pipeline succeeded for agent '{agent_id}'");
            for path in paths {
                println!("   {}", out.join(path).display());
            }
            for warning in &artifact.warnings {
                println!("   warning: {warning}");
            }
            Ok(())
        }
        PipelineOutcome::Failure(failure) => {
            if !failure.diagnostics.validation_diagnostics.is_empty() {
                eprintln!("Validation diagnostics:");
                for line in &failure.diagnostics.validation_diagnostics {
                    eprintln!("   {line}");
                }
            }
            bail!(
                "pipeline failed at {} ({}): {}",
                failure.stage,
                failure.kind,
                failure.reason
            )
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // .env is optional
    let _ = dotenvy::dotenv();
    init_tracing();

    match Args::parse().command {
        CliCommand::Run {
            spec,
            out,
            config,
            timeout_secs,
            agent_id,
            overrides,
        } => {
            let config = config::load(config.as_deref(), &overrides)?;
            run_once(spec, out, config, timeout_secs, agent_id).await
        }
        CliCommand::Serve {
            port,
            out,
            config,
            overrides,
        } => {
            let config = config::load(config.as_deref(), &overrides)?;
            let state = api::AppState {
                coordinator: build_coordinator(&config)?,
                store: Arc::new(FsArtifactStore::new(out)),
                shutdown: CancellationToken::new(),
            };
            api::serve(state, port).await
        }
        CliCommand::Init { force } => {
            let path = PathBuf::from(config::DEFAULT_CONFIG_PATH);
            if path.exists() && !force {
                bail!("{} already exists (use --force to overwrite)", path.display());
            }
            KilnConfig::default()
                .save(&path)
                .with_context(|| format!("writing {}", path.display()))?;
            println!("Wrote {}", path.display());
            Ok(())
        }
    }
}
