//! schedi CLI entry point

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use schedi::{
    commands::{
        cmd_ask, cmd_chat, cmd_index, cmd_init, cmd_save, cmd_status, print_index_report,
        print_outcome, print_status,
    },
    config::Config,
    embed::{Embedder, OllamaEmbedder},
    engine::Engine,
    error::Result,
    indexer::Indexer,
    llm::{Completer, OllamaCompleter},
    progress::LogWriterFactory,
    server,
    store::{IndexStore, QdrantStore},
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "schedi")]
#[command(version, about = "Schedule assistant over a folder of dated notes", long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, env = "SCHEDI_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default config, notes directory and prompt template
    Init {
        /// Force overwrite existing config
        #[arg(long)]
        force: bool,
    },

    /// Bring the index in line with the notes directory
    Index,

    /// Show configuration, Qdrant state and pending index work
    Status,

    /// Ask a single question
    Ask {
        /// The question
        message: String,
    },

    /// Interactive question loop (quit, exit or q to leave)
    Chat,

    /// Append an entry to the note for a date
    Save {
        /// Date as YYYY-MM-DD
        date: String,

        /// Entry text
        content: String,
    },

    /// Start the HTTP server
    Serve {
        /// Address to bind (overrides [server] bind)
        #[arg(long)]
        bind: Option<String>,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("{}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(LogWriterFactory))
        .with(filter)
        .init();

    let config_path = cli.config.clone().unwrap_or_else(Config::default_config_path);

    match cli.command {
        Commands::Init { force } => return handle_init(&config_path, force, cli.json).await,
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "schedi", &mut std::io::stdout());
            return Ok(());
        }
        _ => {}
    }

    let config = Config::load(&config_path)?;

    match cli.command {
        Commands::Init { .. } | Commands::Completions { .. } => unreachable!(),

        Commands::Status => {
            let store = QdrantStore::connect(&config).await?;
            let embedder = OllamaEmbedder::new(&config.embedding)?;
            let store: Arc<QdrantStore> = Arc::new(store);
            let indexer = Indexer::from_config(
                &config,
                Arc::clone(&store) as Arc<dyn IndexStore>,
                Arc::new(embedder),
            );
            let status = cmd_status(&config, &store, &indexer).await?;

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&status)?);
            } else {
                print_status(&status);
            }
        }

        Commands::Index => {
            let engine = build_engine(&config).await?;
            let report = cmd_index(engine.indexer(), !cli.json).await?;

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_index_report(&report);
            }
        }

        Commands::Ask { message } => {
            let engine = build_engine(&config).await?;
            index_at_startup(&engine).await?;
            let outcome = cmd_ask(&engine, &message).await?;

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&outcome)?);
            } else {
                print_outcome(&outcome);
            }
        }

        Commands::Chat => {
            let engine = build_engine(&config).await?;
            index_at_startup(&engine).await?;
            cmd_chat(&engine).await?;
        }

        Commands::Save { date, content } => {
            let engine = build_engine(&config).await?;
            let outcome = cmd_save(&engine, &date, &content).await;

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&outcome)?);
            } else {
                print_outcome(&outcome);
            }
        }

        Commands::Serve { bind } => {
            let engine = Arc::new(build_engine(&config).await?);
            index_at_startup(&engine).await?;
            let bind = bind.unwrap_or_else(|| config.server.bind.clone());
            server::serve(engine, &bind).await?;
        }
    }

    Ok(())
}

async fn build_engine(config: &Config) -> Result<Engine> {
    let store: Arc<dyn IndexStore> = Arc::new(QdrantStore::open(config).await?);
    let embedder: Arc<dyn Embedder> = Arc::new(OllamaEmbedder::new(&config.embedding)?);
    let completer: Arc<dyn Completer> = Arc::new(OllamaCompleter::new(&config.completion)?);
    Engine::from_config(config, store, embedder, completer)
}

async fn index_at_startup(engine: &Engine) -> Result<()> {
    let report = engine.indexer().run().await?;
    if !report.failed.is_empty() {
        warn!("{} notes could not be indexed", report.failed.len());
    }
    Ok(())
}

async fn handle_init(config_path: &Path, force: bool, json: bool) -> Result<()> {
    let outcome = cmd_init(config_path, force)?;

    // The collection can also be created later by the first index run
    let config = Config::load(config_path)?;
    match QdrantStore::open(&config).await {
        Ok(store) => info!("Qdrant collection '{}' ready", store.collection()),
        Err(e) => warn!("Could not create Qdrant collection: {}. You can create it later.", e),
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
        return Ok(());
    }

    println!("✓ schedi initialized successfully");
    println!("  Config: {}", outcome.config_path.display());
    println!("  Notes: {}", outcome.notes_dir.display());
    println!("  Prompt: {}", outcome.prompt_path.display());
    println!("\nNext steps:");
    println!("  1. Edit the config file to customize settings");
    println!("  2. Start Qdrant: docker run -p 6333:6333 -p 6334:6334 qdrant/qdrant");
    println!("  3. Pull the models: ollama pull {} && ollama pull {}", config.embedding.model, config.completion.model);
    println!("  4. Ask away: schedi chat");

    Ok(())
}
