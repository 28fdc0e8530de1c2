//! Stacks DeFi agent.
//!
//! Usage:
//!   stacks-agent serve            Start the HTTP chat server
//!   stacks-agent ask "<prompt>"   One-shot question, streamed to stdout
//!   stacks-agent address          Show the wallet derived from the mnemonic
//!   stacks-agent tools            List the tool catalog
//!   stacks-agent init             Write a default config file

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};

use stacks_agent::agent::{self, context, system_prompt, Finish, LoopSettings};
use stacks_agent::config::{self, AgentConfig, ConfigError};
use stacks_agent::identity::StacksWallet;
use stacks_agent::inference::{build_http_client, InferenceClient};
use stacks_agent::server::{self, AppState};
use stacks_agent::tools::{tool_definitions, ToolContext};
use stacks_agent::types::ChatMessage;

// ---------------------------------------------------------------------------
// CLI definition
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(name = "stacks-agent")]
#[command(version)]
#[command(about = "Conversational agent for Stacks DeFi")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the agent config file.
    #[arg(long, default_value = "~/.stacks-agent/agent.toml")]
    config: String,

    /// Log level (debug, info, warn, error). Overrides the config file.
    #[arg(long)]
    log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the HTTP chat server.
    Serve {
        /// Address to bind, e.g. 0.0.0.0:3000.
        #[arg(long)]
        bind: Option<String>,
    },

    /// Ask a single question and stream the answer.
    Ask {
        prompt: String,

        /// Model override for this question.
        #[arg(long)]
        model: Option<String>,
    },

    /// Show the wallet address derived from the configured mnemonic.
    Address,

    /// List the tools offered to the model.
    Tools,

    /// Write a default config file.
    Init {
        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config_path = PathBuf::from(shellexpand::tilde(&cli.config).into_owned());

    if let Commands::Init { force } = cli.command {
        return cmd_init(&config_path, force);
    }

    let config = config::load_with_env(&config_path)?;

    let level = cli.log_level.clone().unwrap_or_else(|| config.log_level.clone());
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&level));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .init();

    match cli.command {
        Commands::Serve { bind } => cmd_serve(config, bind).await,
        Commands::Ask { prompt, model } => cmd_ask(config, &prompt, model.as_deref()).await,
        Commands::Address => cmd_address(&config),
        Commands::Tools => cmd_tools(),
        Commands::Init { .. } => Ok(()),
    }
}

// ---------------------------------------------------------------------------
// Command implementations
// ---------------------------------------------------------------------------

async fn cmd_serve(mut config: AgentConfig, bind: Option<String>) -> Result<()> {
    if let Some(bind) = bind {
        config.bind_address = bind;
    }
    let state = bootstrap(config)?;

    println!(
        "{} Serving '{}' on http://{} (model: {}, network: {}{})",
        ">>>".green().bold(),
        state.config.name,
        state.config.bind_address,
        state.config.inference_model,
        state.config.network,
        if state.config.mock_mode { ", mock mode" } else { "" },
    );

    server::serve(state).await?;

    println!("{} Server stopped.", "<<<".red().bold());
    Ok(())
}

async fn cmd_ask(config: AgentConfig, prompt: &str, model: Option<&str>) -> Result<()> {
    let state = bootstrap(config)?;
    let model_name = state.config.effective_model(model).to_string();

    let wallet_address = state.tools.default_address().ok();
    let system = system_prompt::build_system_prompt(&state.config, wallet_address.as_deref());
    let messages = context::build_messages(&system, &[ChatMessage::user(prompt)]);
    let settings = LoopSettings {
        max_steps: state.config.max_steps,
        max_tool_calls_per_step: state.config.max_tool_calls_per_step,
    };

    let (tx, mut rx) = mpsc::channel::<String>(64);
    let printer = tokio::spawn(async move {
        let mut stdout = std::io::stdout();
        while let Some(chunk) = rx.recv().await {
            let _ = write!(stdout, "{}", chunk);
            let _ = stdout.flush();
        }
    });

    let result = agent::run_tool_loop(
        &*state.model,
        &model_name,
        &state.tools,
        &state.definitions,
        messages,
        settings,
        Some(&tx),
    )
    .await;
    drop(tx);
    let _ = printer.await;

    let outcome = match result {
        Ok(outcome) => outcome,
        Err(e) => {
            println!();
            anyhow::bail!(e.user_message());
        }
    };
    if !outcome.from_model {
        print!("{}", outcome.text);
    }
    println!();

    if outcome.finish == Finish::StepLimit {
        warn!("Stopped after {} steps", outcome.steps);
    }
    info!(
        "{} step(s), {} tool call(s), {} tokens",
        outcome.steps,
        outcome.tool_results.len(),
        outcome.usage.total_tokens
    );
    Ok(())
}

fn cmd_address(config: &AgentConfig) -> Result<()> {
    let wallet = derive_wallet(config)?.ok_or(ConfigError::MissingMnemonic)?;

    println!();
    println!("{}", "=== Stacks Wallet ===".bold());
    println!();
    println!("  {}:  {}", "Network".bold(), wallet.network);
    println!("  {}:  {}", "Address".bold(), wallet.address);
    println!();
    Ok(())
}

fn cmd_tools() -> Result<()> {
    println!();
    println!("{}", "=== Tools ===".bold());
    println!();
    for tool in tool_definitions() {
        println!("  {}", tool.name.cyan().bold());
        println!("    {}", tool.description);
    }
    println!();
    Ok(())
}

fn cmd_init(path: &std::path::Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        anyhow::bail!(
            "{} already exists; pass --force to overwrite",
            path.display()
        );
    }
    config::save_config(&AgentConfig::default(), path)?;
    println!("{} Wrote {}", ">>>".green().bold(), path.display());
    Ok(())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Derive the wallet when a mnemonic is configured. Mock mode may run
/// without one; live mode refuses to start.
fn derive_wallet(config: &AgentConfig) -> Result<Option<StacksWallet>> {
    if config.wallet_mnemonic.trim().is_empty() {
        if config.mock_mode {
            return Ok(None);
        }
        return Err(ConfigError::MissingMnemonic.into());
    }
    let wallet = StacksWallet::from_mnemonic(&config.wallet_mnemonic, config.network)
        .context("Failed to derive wallet from mnemonic")?;
    Ok(Some(wallet))
}

/// Build the shared state: HTTP client, wallet, adapters and model.
fn bootstrap(config: AgentConfig) -> Result<AppState> {
    if config.inference_api_key.trim().is_empty() {
        return Err(ConfigError::MissingInferenceKey.into());
    }

    let http = build_http_client().context("Failed to build HTTP client")?;

    let wallet = derive_wallet(&config)?;
    if let Some(wallet) = &wallet {
        info!("Wallet: {} ({})", wallet.address, wallet.network);
    }

    let tools = ToolContext::from_config(&config, wallet, http.clone())?;
    let model = InferenceClient::new(
        &config.inference_api_url,
        &config.inference_api_key,
        &config.inference_model,
        config.max_tokens_per_turn,
        http,
    );

    Ok(AppState::new(config, Arc::new(model), tools))
}
