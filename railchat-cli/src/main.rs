//! Railchat CLI - interactive chat with guardrails around every message.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use railchat::completion::AnthropicClient;
use railchat::config::{
    CompletionSettings, DEFAULT_MAX_TOKENS, DEFAULT_MODEL, DEFAULT_TEMPERATURE, GuardrailConfig,
};
use railchat::conversation::Orchestrator;
use railchat::guardrail::{CheckCatalog, GuardrailExecutor, GuardrailRegistry};
use railchat_cli::{ChatBot, ChatBotConfig};
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Railchat - interactive chat with guardrails
#[derive(Parser, Debug)]
#[command(name = "railchat")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Model identifier
    #[arg(short, long, env = "RAILCHAT_MODEL", default_value = DEFAULT_MODEL)]
    model: String,

    /// Maximum number of output tokens per reply
    #[arg(long, default_value_t = DEFAULT_MAX_TOKENS)]
    max_tokens: u32,

    /// Sampling temperature
    #[arg(long, default_value_t = DEFAULT_TEMPERATURE)]
    temperature: f32,

    /// Guardrail configuration file (JSON); built-in defaults when omitted
    #[arg(short, long, env = "RAILCHAT_GUARDRAILS")]
    guardrails: Option<PathBuf>,

    /// Per-check time limit in milliseconds
    #[arg(long)]
    check_timeout_ms: Option<u64>,

    /// How long background guardrails may run after the session ends
    #[arg(long, default_value_t = 5)]
    drain_timeout_secs: u64,

    /// HTTP request timeout in seconds
    #[arg(long, default_value_t = 120)]
    request_timeout_secs: u64,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("railchat=debug,railchat_cli=debug")
    } else {
        EnvFilter::new("railchat=warn,railchat_cli=info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let guardrails = match &args.guardrails {
        Some(path) => {
            info!(path = %path.display(), "Loading guardrail configuration");
            GuardrailConfig::load(path)?
        }
        None => GuardrailConfig::default(),
    };
    let registry = GuardrailRegistry::from_config(&guardrails, &CheckCatalog::builtin())?;
    debug!(checks = registry.len(), "Guardrail registry ready");

    let mut executor = GuardrailExecutor::new(Arc::new(registry));
    if let Some(ms) = args.check_timeout_ms {
        executor = executor.with_check_timeout(Duration::from_millis(ms));
    }

    let settings = CompletionSettings::default()
        .model(args.model)
        .max_tokens(args.max_tokens)
        .temperature(args.temperature);
    let client = AnthropicClient::builder_from_env()?
        .settings(settings)
        .timeout_secs(args.request_timeout_secs)
        .build()?;

    let config = ChatBotConfig {
        drain_timeout: Duration::from_secs(args.drain_timeout_secs),
        ..ChatBotConfig::default()
    };
    let chatbot = ChatBot::new(Orchestrator::new(executor, Arc::new(client)), config);
    chatbot.run().await?;

    Ok(())
}
