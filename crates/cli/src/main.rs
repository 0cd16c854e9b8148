//! Questgen CLI entry point.
//!
//! This binary is the composition root for the entire system. Responsibilities:
//!
//! 1. **Load configuration**: read `.env` when present, then the process
//!    environment (see [`config::AppConfig`]).
//! 2. **Wire observability**: configure `tracing-subscriber` with a JSON (or
//!    text) layer and, when `OTEL_EXPORTER_OTLP_ENDPOINT` is set, an
//!    OpenTelemetry OTLP exporter. All `tracing` spans and structured events
//!    emitted by every crate in the workspace flow through this layer.
//! 3. **Construct infrastructure**: the OpenRouter client, the JSON-file rule
//!    source, the quota gate and the tracing event sink, injected into
//!    [`orchestrator::GenerationService`].
//! 4. **Run one command**: `generate` prints the draft as JSON; `models`
//!    prints the provider's model list. Failures print the error as JSON and
//!    exit non-zero.
//!
//! Each invocation serves a single request, so the quota gate built here
//! starts empty and never rejects; `DISABLE_RATE_LIMIT` and the retention
//! sweeper only matter to a long-lived host that keeps one
//! [`pipeline::QuotaGate`] across requests and calls `spawn_sweeper` on it.

mod config;
mod events;
mod observability;
mod rules;

use std::process::ExitCode;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand, ValueEnum};
use llm::{sanitize_for_logging, OpenRouterClient};
use orchestrator::{ActivityGenerator, GenerationService};
use pipeline::{
    AgeGroupId, CompletionProvider, EnergyLevel, GenerationError, GenerationParams, Location,
    PolicyEngine, PropId, QuotaGate, UserId,
};
use serde_json::{json, Value};
use tracing::{error, info};

use crate::config::AppConfig;
use crate::events::TracingEventSink;
use crate::rules::JsonFileRuleSource;

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(name = "questgen")]
#[command(author, version, about = "Generate policy-checked activity drafts for children")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate one activity draft and print it as JSON
    Generate(GenerateArgs),
    /// List the models the provider offers
    Models,
}

#[derive(Args, Debug)]
struct GenerateArgs {
    /// Identifier of the requesting user (quota key)
    #[arg(long)]
    user: String,

    /// Age group: 1 = 3-4, 2 = 5-6, 3 = 7-8, 4 = 9-10 years
    #[arg(long)]
    age_group: u64,

    /// Activity length in minutes (1-480)
    #[arg(long)]
    duration: u32,

    #[arg(long, value_enum)]
    location: LocationArg,

    #[arg(long, value_enum)]
    energy: EnergyArg,

    /// Available prop; repeat for several
    #[arg(long = "prop")]
    props: Vec<u64>,

    #[arg(long)]
    app_version: Option<String>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LocationArg {
    Home,
    Outdoor,
}

impl From<LocationArg> for Location {
    fn from(value: LocationArg) -> Self {
        match value {
            LocationArg::Home => Location::Home,
            LocationArg::Outdoor => Location::Outdoor,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum EnergyArg {
    Low,
    Medium,
    High,
}

impl From<EnergyArg> for EnergyLevel {
    fn from(value: EnergyArg) -> Self {
        match value {
            EnergyArg::Low => EnergyLevel::Low,
            EnergyArg::Medium => EnergyLevel::Medium,
            EnergyArg::High => EnergyLevel::High,
        }
    }
}

impl GenerateArgs {
    fn params(&self) -> GenerationParams {
        GenerationParams {
            age_group_id: AgeGroupId::new(self.age_group),
            duration_minutes: self.duration,
            location: self.location.into(),
            energy_level: self.energy.into(),
            prop_ids: self.props.iter().copied().map(PropId::new).collect(),
            app_version: self.app_version.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => return fail(&startup_error(&e)),
    };

    let _telemetry =
        match observability::init(config.log_format, config.otlp_endpoint.as_deref()) {
            Ok(guard) => guard,
            Err(e) => return fail(&startup_error(&e)),
        };

    match run(cli.command, config).await {
        Ok(output) => {
            println!("{output:#}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "command failed");
            let body = match e.downcast_ref::<GenerationError>() {
                Some(err) => error_body(err),
                None => startup_error(&e),
            };
            fail(&body)
        }
    }
}

async fn run(command: Command, config: AppConfig) -> anyhow::Result<Value> {
    let client = Arc::new(OpenRouterClient::new(config.provider)?);

    match command {
        Command::Models => {
            let models = client.list_models().await?;
            Ok(serde_json::to_value(models)?)
        }
        Command::Generate(args) => {
            let user = UserId::new(args.user.trim())
                .ok_or_else(|| GenerationError::validation("user id must not be empty"))?;

            let rules = Arc::new(JsonFileRuleSource::new(config.rules_path));
            let policy = Arc::new(PolicyEngine::with_ttl(rules, config.rule_cache_ttl));
            let quota = if config.disable_rate_limit {
                info!("generation quota enforcement disabled");
                QuotaGate::disabled()
            } else {
                QuotaGate::new()
            };

            let service = GenerationService::new(
                ActivityGenerator::new(client, policy),
                Arc::new(quota),
            )
            .with_event_sink(Arc::new(TracingEventSink));

            let draft = service.generate(&user, args.params()).await?;
            Ok(serde_json::to_value(draft)?)
        }
    }
}

/// Caller-facing error document.
fn error_body(err: &GenerationError) -> Value {
    json!({
        "kind": err.kind(),
        "message": err.to_string(),
        "retry_after": err.retry_after_seconds(),
        "details": err.details().map(sanitize_for_logging),
    })
}

fn startup_error(err: &anyhow::Error) -> Value {
    json!({
        "kind": "startup",
        "message": format!("{err:#}"),
    })
}

fn fail(body: &Value) -> ExitCode {
    println!("{body:#}");
    ExitCode::FAILURE
}
