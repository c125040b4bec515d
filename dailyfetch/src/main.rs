/*
dailyfetch - single-binary main.rs
Starts the HTTP API after checking that the news tool server is reachable, or
runs a one-shot query / tool listing from the command line.
*/

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use common::Config;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use dailyfetch::llm::{ModelAdapter, ModelSettings};
use dailyfetch::mcp::McpChannel;
use dailyfetch::news::NewsQuery;
use dailyfetch::orchestrator::QueryOrchestrator;
use dailyfetch::server::{launch_rocket, AppState};

#[derive(Parser, Debug)]
#[command(name = "dailyfetch", about = "News tool client, LLM summarizer and web API")]
struct Args {
    /// Path to config.toml
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Override log level (info, debug, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check the tool server, then serve the HTTP API (default)
    Serve,
    /// Fetch and summarize once, printing the report
    Query {
        /// News category, repeatable
        #[arg(long = "category")]
        categories: Vec<String>,
        /// News source, repeatable
        #[arg(long = "source")]
        sources: Vec<String>,
        /// Provider to summarize with; defaults to `[llm].provider`
        #[arg(long)]
        provider: Option<String>,
    },
    /// List the tools advertised by the tool server
    Tools,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // .env is optional
    dotenv::dotenv().ok();

    let filter = EnvFilter::try_new(&args.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();

    let config = load_config(args.config).await?;
    let channel = McpChannel::from_config(&config.mcp).context("invalid tool server settings")?;
    let orchestrator = QueryOrchestrator::new(channel, config.mcp.tool_name.clone());

    match args.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config, orchestrator).await,
        Command::Query {
            categories,
            sources,
            provider,
        } => {
            let provider = provider.unwrap_or_else(|| config.llm.provider.clone());
            let adapter = ModelAdapter::new(ModelSettings::from_config(&config.llm, &provider, None))?;
            let fallback = NewsQuery::with_fallback(
                config.query.default_categories.clone(),
                config.query.default_sources.clone(),
                &NewsQuery::default(),
            );
            let query = NewsQuery::with_fallback(categories, sources, &fallback);
            let report = orchestrator.process_query(&query, &adapter).await?;
            println!("{}", report);
            Ok(())
        }
        Command::Tools => {
            for tool in orchestrator.list_tools().await? {
                println!(
                    "{}: {}\n  input schema: {}",
                    tool.name,
                    tool.description.unwrap_or_default(),
                    tool.input_schema
                );
            }
            Ok(())
        }
    }
}

/// config.default.toml, then --config or ./config.toml, then the environment.
async fn load_config(explicit: Option<PathBuf>) -> Result<Config> {
    let default_path = PathBuf::from("config.default.toml");

    let override_path = if let Some(p) = explicit {
        if !p.exists() {
            error!(path = ?p, "specified config file not found");
            return Err(anyhow::anyhow!("Config file not found: {}", p.display()));
        }
        Some(p)
    } else {
        let p = PathBuf::from("config.toml");
        if p.exists() {
            Some(p)
        } else {
            None
        }
    };

    let config = Config::load_with_defaults(Some(default_path.as_path()), override_path.as_deref())
        .await
        .map_err(|e| {
            error!(error = %e, "failed to load configuration");
            e
        })?
        .with_env_overrides()?;
    info!(default = ?default_path, override = ?override_path, mcp_url = %config.mcp.url, "configuration loaded");
    Ok(config)
}

async fn serve(config: Config, orchestrator: QueryOrchestrator) -> Result<()> {
    // Startup requires a healthy tool server.
    if let Err(e) = orchestrator.channel().probe_health().await {
        error!(error = %e, url = %config.mcp.url, "tool server is not reachable");
        return Err(anyhow::anyhow!("tool server health check failed: {}", e));
    }
    info!(url = %config.mcp.url, "tool server is healthy");

    let state = AppState::new(Arc::new(config), orchestrator);
    if let Err(e) = state.current_model().await {
        // Not fatal: /set_model can still supply a key.
        error!(error = %e, "default model not configured");
    }

    launch_rocket(state).await?;
    info!("Shutdown complete");
    Ok(())
}
