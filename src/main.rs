use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use wozif_core::config::AppConfig;
use wozif_core::traits::TextGenerator;
use wozif_core::types::{keys, ExecutionContext, WorkflowNode};
use wozif_knowledge::KnowledgeBase;
use wozif_llm::ChatGenerator;
use wozif_workflow::NodeExecutor;

#[derive(Parser)]
#[command(name = "wozif", version, about = "Workflow node executor for WhatsApp automations")]
struct Cli {
    /// Path to config file (default: wozif.toml, then ~/.wozif/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP gateway
    Serve {
        /// Override the configured bind address
        #[arg(long)]
        bind: Option<String>,
    },
    /// Run a workflow once and print the results as JSON
    Run {
        /// JSON file holding the array of nodes
        #[arg(long)]
        nodes: PathBuf,
        /// JSON file holding the initial context object
        #[arg(long)]
        context: Option<PathBuf>,
        /// Inbound user message, stored as `lastUserMessage`
        #[arg(short, long)]
        message: Option<String>,
    },
    /// Rebuild the knowledge index and refresh the embedding cache
    Index,
    /// Show current configuration
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("wozif=info,warn")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let mut config = AppConfig::discover(cli.config.as_deref())?;

    match cli.command {
        Commands::Config => {
            println!("{}", toml::to_string_pretty(&redacted(&config))?);
        }
        Commands::Index => {
            let knowledge = KnowledgeBase::build(&config, generator(&config)).await?;
            let ready = knowledge.is_ready().await;
            knowledge.close()?;
            if ready {
                info!(file = %config.knowledge.knowledge_file, "Knowledge index built");
            } else {
                warn!(file = %config.knowledge.knowledge_file, "Knowledge file missing, nothing indexed");
            }
        }
        Commands::Run {
            nodes,
            context,
            message,
        } => {
            let nodes: Vec<WorkflowNode> = read_json(&nodes)?;
            let mut initial: ExecutionContext = match context {
                Some(path) => read_json(&path)?,
                None => ExecutionContext::new(),
            };
            if let Some(message) = message {
                initial.set_str(keys::LAST_USER_MESSAGE, message);
            }

            let (executor, knowledge) = assemble(&config).await?;
            let output = executor.run(&nodes, initial).await;
            knowledge.close()?;
            println!("{}", serde_json::to_string_pretty(&output?)?);
        }
        Commands::Serve { bind } => {
            if let Some(bind) = bind {
                config.gateway.bind = bind;
            }
            let (executor, knowledge) = assemble(&config).await?;
            info!(bind = %config.gateway.bind, "Starting HTTP gateway");
            let server =
                wozif_gateway::GatewayServer::new(config.gateway.clone(), executor, knowledge.clone());

            let cancel = tokio_util::sync::CancellationToken::new();
            let cancel_clone = cancel.clone();

            // Graceful shutdown on Ctrl-C
            tokio::spawn(async move {
                tokio::signal::ctrl_c().await.ok();
                info!("Shutting down gateway...");
                cancel_clone.cancel();
            });

            let result = server.run(cancel).await;
            knowledge.close()?;
            result?;
        }
    }

    Ok(())
}

fn generator(config: &AppConfig) -> Arc<dyn TextGenerator> {
    Arc::new(ChatGenerator::from_config(config))
}

/// Build the shared services once: the text generator, the knowledge
/// base (indexed at startup) and the script sandbox.
async fn assemble(config: &AppConfig) -> anyhow::Result<(NodeExecutor, Arc<KnowledgeBase>)> {
    let generator = generator(config);
    let knowledge = Arc::new(KnowledgeBase::build(config, generator.clone()).await?);
    let sandbox = wozif_workflow::create_sandbox(&config.sandbox);
    info!(
        model = %config.model.model_id,
        sandbox = ?config.sandbox.mode,
        knowledge_ready = knowledge.is_ready().await,
        "Services ready"
    );
    let executor = NodeExecutor::new(generator, knowledge.clone(), sandbox);
    Ok((executor, knowledge))
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))
}

/// Copy of the config with secrets masked, for display.
fn redacted(config: &AppConfig) -> AppConfig {
    const MASK: &str = "********";
    let mut shown = config.clone();
    for model in std::iter::once(&mut shown.model).chain(shown.fallback_models.iter_mut()) {
        if model.api_key.is_some() {
            model.api_key = Some(MASK.into());
        }
    }
    if shown.embedding.api_key.is_some() {
        shown.embedding.api_key = Some(MASK.into());
    }
    for key in &mut shown.gateway.api_keys {
        key.key = MASK.into();
    }
    shown
}
