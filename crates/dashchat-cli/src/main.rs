//! DashChat CLI: run the dashboard backend, or talk to it from a terminal.
//!
//! `dashchat serve` starts the REST API the frontend calls. The other
//! commands drive the same orchestrator, tools and stores directly.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use colored::*;
use tracing_subscriber::EnvFilter;

use dashchat_core::config::DashChatConfig;
use dashchat_core::conversation::TurnRole;
use dashchat_core::orchestrator::Orchestrator;
use dashchat_hub::api::{ApiState, start_server};
use dashchat_hub::geodata::GeoDataClient;
use dashchat_hub::memory;
use dashchat_hub::providers::GeminiProvider;
use dashchat_hub::tools::{DeepSearchIndexer, UpstreamClient, default_registry};

// ─── CLI Definition ────────────────────────────────────────

/// DashChat: Gemini tool-calling backend for the open-data dashboard
#[derive(Parser)]
#[command(name = "dashchat", version, about, long_about = None)]
struct Cli {
    /// Config file (defaults to the user config dir)
    #[arg(short, long, global = true, env = "DASHCHAT_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 🌐 Start the REST API server
    Serve {
        /// Host to bind to (overrides config)
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on (overrides config)
        #[arg(long)]
        port: Option<u16>,
    },

    /// ❓ Send a single prompt and print the answer
    Ask {
        /// The prompt to send
        prompt: String,

        /// Don't record the exchange in the conversation log
        #[arg(long)]
        no_record: bool,
    },

    /// 🧰 Print the tool declarations advertised to the model
    Tools,

    /// 📜 Print the persisted conversation
    History {
        /// Output raw JSON instead of formatted text
        #[arg(long)]
        json: bool,
    },

    /// 📚 Load web pages or documents into the deep search index
    Index {
        /// URL to load (repeatable)
        #[arg(short, long = "url", required = true)]
        urls: Vec<String>,

        /// Collection name (no whitespace)
        #[arg(long)]
        collection: String,

        /// Collection description
        #[arg(long)]
        description: Option<String>,
    },

    /// ⚙️  Inspect configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show effective configuration (secrets masked)
    Show,
    /// Print config file location
    Path,
}

// ─── Helpers ───────────────────────────────────────────────

fn config_path(cli_path: Option<&Path>) -> PathBuf {
    cli_path
        .map(Path::to_path_buf)
        .unwrap_or_else(DashChatConfig::default_path)
}

fn load_config(path: &Path) -> anyhow::Result<DashChatConfig> {
    DashChatConfig::load_with_env(path)
        .with_context(|| format!("loading config from {}", path.display()))
}

fn build_orchestrator(config: &DashChatConfig) -> Orchestrator {
    Orchestrator::with_config(
        (&config.orchestrator).into(),
        default_registry(&config.tools),
    )
}

fn store_timeout(config: &DashChatConfig) -> Duration {
    Duration::from_secs(config.tools.timeout_secs)
}

// ─── Commands ──────────────────────────────────────────────

async fn run_serve(
    mut config: DashChatConfig,
    host: Option<String>,
    port: Option<u16>,
) -> anyhow::Result<()> {
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }
    config.validate()?;

    let log = memory::from_settings(&config.store, store_timeout(&config))?;
    let state = ApiState {
        orchestrator: build_orchestrator(&config),
        provider: Box::new(GeminiProvider::new(config.provider.clone())),
        log,
        geodata: GeoDataClient::from_settings(&config.tools),
    };

    let (host, port) = (config.server.host.as_str(), config.server.port);
    println!();
    println!("  {} {}", "Mode:".dimmed(), "🌐 REST API Server".green().bold());
    println!("  {} {}", "Model:".dimmed(), config.provider.model.cyan());
    println!("  {} {:?}", "Store:".dimmed(), config.store.backend);
    println!(
        "  {} {}",
        "Endpoint:".dimmed(),
        format!("http://{}:{}", host, port).green().bold()
    );
    println!();
    println!("  {}", "Endpoints:".bold());
    println!("    {} Prompt the model", "POST /gemini-response  ".cyan());
    println!("    {} Chart sample", "GET  /chartdata        ".cyan());
    println!("    {} Dengue clusters", "GET  /denguecluster    ".cyan());
    println!("    {} Rainfall stations", "GET  /rainfallstations ".cyan());
    println!("    {} Conversation history", "GET  /supabase-info    ".cyan());
    println!("    {} Tool declarations", "GET  /tools            ".cyan());
    println!("    {} Health check", "GET  /health           ".cyan());
    println!();
    println!("  {}", "Example:".bold());
    println!(
        "    {}",
        format!(
            "curl -X POST http://{}:{}/gemini-response -H 'Content-Type: application/json' -d '{{\"text\": \"weather in Tokyo?\"}}'",
            host, port
        )
        .dimmed()
    );
    println!();

    start_server(state, host, port, config.server.api_key.clone()).await
}

async fn run_ask(config: DashChatConfig, prompt: &str, no_record: bool) -> anyhow::Result<()> {
    let provider = GeminiProvider::new(config.provider.clone());
    let orchestrator = build_orchestrator(&config);

    let answer = if no_record {
        if config.provider.api_key.is_none() {
            anyhow::bail!("GEMINI_API_KEY not set (environment, .env, or [provider].api_key)");
        }
        orchestrator.run(&provider, prompt).await
    } else {
        config.validate()?;
        let log = memory::from_settings(&config.store, store_timeout(&config))?;
        orchestrator.process(&provider, log.as_ref(), prompt).await
    };

    match answer {
        Ok(text) => println!("{}", text),
        Err(e) => {
            eprintln!("{}: {}", "Error".red(), e);
            std::process::exit(1);
        }
    }
    Ok(())
}

fn run_tools(config: &DashChatConfig) -> anyhow::Result<()> {
    let declarations: Vec<serde_json::Value> = default_registry(&config.tools)
        .schemas()
        .iter()
        .map(|s| s.to_declaration())
        .collect();
    println!("{}", serde_json::to_string_pretty(&declarations)?);
    Ok(())
}

async fn run_history(config: &DashChatConfig, json: bool) -> anyhow::Result<()> {
    let log = memory::from_settings(&config.store, store_timeout(config))?;
    let history = log.history().await?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({ "history": history }))?
        );
        return Ok(());
    }

    if history.is_empty() {
        println!("  {}", "No conversation recorded yet.".dimmed());
        return Ok(());
    }

    for turn in &history {
        let stamp = turn.created_at.format("%Y-%m-%d %H:%M:%S").to_string();
        let who = match turn.role {
            TurnRole::User => "you".green().bold(),
            TurnRole::Bot => "bot".cyan().bold(),
        };
        println!("{} {} #{}", stamp.dimmed(), who, turn.prompt_id);
        println!("  {}", turn.text);
    }
    Ok(())
}

async fn run_index(
    config: &DashChatConfig,
    urls: &[String],
    collection: &str,
    description: Option<&str>,
) -> anyhow::Result<()> {
    // Crawl + embed can take minutes.
    let indexer = DeepSearchIndexer::new(
        UpstreamClient::new(Duration::from_secs(config.tools.timeout_secs.max(600))),
        &config.tools.deep_search_base,
    );

    println!(
        "  {} {} URL(s) into {}",
        "Indexing".bold(),
        urls.len(),
        collection.cyan()
    );
    match indexer.load_website(urls, collection, description).await {
        Ok(reply) => {
            println!("  {} {}", "✅".green(), reply);
            Ok(())
        }
        Err(e) => anyhow::bail!("indexing failed: {}", e),
    }
}

fn run_config(action: ConfigAction, path: &Path) -> anyhow::Result<()> {
    match action {
        ConfigAction::Path => {
            println!("{}", path.display());
        }
        ConfigAction::Show => {
            let config = load_config(path)?;
            println!(
                "  {} {} {}",
                "Config:".dimmed(),
                path.display(),
                if path.exists() {
                    "✅".green()
                } else {
                    "(not found, using defaults)".yellow()
                }
            );
            println!();
            println!("{}", toml::to_string_pretty(&config.redacted())?);
            if let Err(e) = config.validate() {
                println!("  {} {}", "⚠".yellow(), e.to_string().yellow());
            }
        }
    }
    Ok(())
}

// ─── Main ──────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,dashchat_core=debug,dashchat_hub=debug")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let path = config_path(cli.config.as_deref());

    match cli.command {
        Commands::Serve { host, port } => {
            run_serve(load_config(&path)?, host, port).await?;
        }
        Commands::Ask { prompt, no_record } => {
            run_ask(load_config(&path)?, &prompt, no_record).await?;
        }
        Commands::Tools => {
            run_tools(&load_config(&path)?)?;
        }
        Commands::History { json } => {
            run_history(&load_config(&path)?, json).await?;
        }
        Commands::Index {
            urls,
            collection,
            description,
        } => {
            run_index(&load_config(&path)?, &urls, &collection, description.as_deref()).await?;
        }
        Commands::Config { action } => {
            run_config(action, &path)?;
        }
    }

    Ok(())
}
