//! ContentGen CLI entry point.
//!
//! This binary is the composition root for the whole system:
//!
//! 1. **Parse configuration**: load `contentgen.toml` and validate it.
//! 2. **Wire observability**: `tracing-subscriber` with a JSON or pretty
//!    layer, plus an optional OpenTelemetry OTLP exporter. All spans and
//!    events emitted by every crate in the workspace flow through it.
//! 3. **Construct infrastructure**: build one adapter per `[[providers]]`
//!    entry and inject them, once, into the shared `ProviderRouter`.
//! 4. **Dispatch** the subcommand: `generate`, `batch`, or `providers`.
//!
//! Results are printed to stdout as JSON; logs go to stderr.

mod config;
mod telemetry;

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use generation::{
    ContentRequest, ContentType, CostBudget, MaxConcurrency, OptimizationStrategy,
    QualityValidator, RequestPayload, RequestValidationError,
};
use orchestrator::{BatchEngine, BatchJob, Orchestrator, ProviderRouter, RuleBasedValidator};
use providers::build_provider;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::AppConfig;

#[derive(Parser)]
#[command(name = "contentgen", author, version, about = "Multi-provider content generation")]
struct Cli {
    /// Path to the configuration file.
    #[arg(
        short,
        long,
        global = true,
        default_value = "contentgen.toml",
        env = "CONTENTGEN_CONFIG"
    )]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Generate content for one request.
    Generate(GenerateArgs),
    /// Generate content for many requests concurrently.
    Batch(BatchArgs),
    /// Show configured providers and their availability.
    Providers,
}

#[derive(Args)]
struct GenerateArgs {
    /// JSON file holding one request; replaces the inline flags.
    #[arg(long, conflicts_with_all = ["content_type", "topic"])]
    request: Option<PathBuf>,

    /// Content type, e.g. `blog_post` or `caption`.
    #[arg(long, required_unless_present = "request")]
    content_type: Option<String>,

    #[arg(long, required_unless_present = "request")]
    topic: Option<String>,

    #[arg(long)]
    audience: Option<String>,

    /// Word limit.
    #[arg(long, default_value_t = 300)]
    max_length: u32,

    /// `cost_optimized`, `quality_first`, or `balanced`.
    #[arg(long)]
    strategy: Option<String>,

    /// Pin one provider (no failover).
    #[arg(long)]
    provider: Option<String>,

    /// Spend cap for one attempt, in USD.
    #[arg(long)]
    budget: Option<f64>,
}

#[derive(Args)]
struct BatchArgs {
    /// JSON file holding an array of requests.
    #[arg(long)]
    requests: PathBuf,

    /// Requests in flight at once; values below 1 are treated as 1.
    #[arg(long, allow_negative_numbers = true)]
    max_concurrency: Option<i64>,

    /// Whole-batch deadline in milliseconds.
    #[arg(long)]
    timeout_ms: Option<u64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load(&cli.config)?;
    let telemetry = telemetry::init(&config.telemetry)?;

    let outcome = run(cli.command, config).await;
    telemetry.shutdown();
    outcome
}

async fn run(command: Command, config: AppConfig) -> anyhow::Result<()> {
    let orchestrator = Arc::new(build_orchestrator(&config)?);
    match command {
        Command::Generate(args) => generate(&orchestrator, args).await,
        Command::Batch(args) => batch(orchestrator, &config, args).await,
        Command::Providers => print_json(&orchestrator.router().status()),
    }
}

/// Builds adapters, router, validator, and templates from configuration.
fn build_orchestrator(config: &AppConfig) -> anyhow::Result<Orchestrator> {
    let adapters = config
        .providers
        .iter()
        .map(|settings| {
            build_provider(settings)
                .with_context(|| format!("failed to construct provider '{}'", settings.name))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;
    let router = ProviderRouter::new(config.router.clone(), adapters)
        .context("failed to build provider registry")?;
    let validator: Arc<dyn QualityValidator> =
        Arc::new(RuleBasedValidator::new(&config.validator));

    Ok(Orchestrator::new(
        Arc::new(router),
        validator,
        config.template_catalog(),
        config.orchestrator.clone(),
    ))
}

async fn generate(orchestrator: &Orchestrator, args: GenerateArgs) -> anyhow::Result<()> {
    let request = match &args.request {
        Some(path) => read_json::<ContentRequest>(path)?,
        None => inline_request(&args)?,
    };
    let cancel = cancel_on_interrupt();
    let result = orchestrator
        .generate_with_cancel(&request, &cancel)
        .await
        .with_context(|| format!("generation failed for request {}", request.id))?;
    print_json(&result)
}

fn inline_request(args: &GenerateArgs) -> anyhow::Result<ContentRequest> {
    let content_type = ContentType::from_str(args.content_type.as_deref().unwrap_or_default())?;
    let topic = args.topic.clone().unwrap_or_default();

    let mut request = ContentRequest::new(content_type, topic, args.max_length);
    if let Some(audience) = &args.audience {
        request = request.with_audience(audience.as_str());
    }
    if let Some(strategy) = &args.strategy {
        request = request.with_strategy(OptimizationStrategy::from_str(strategy)?);
    }
    if let Some(provider) = &args.provider {
        request = request.with_provider_override(provider.as_str());
    }
    if let Some(budget) = args.budget {
        let budget = CostBudget::new(budget)
            .with_context(|| format!("budget must be a positive amount, got {budget}"))?;
        request = request.with_budget(budget);
    }
    Ok(request)
}

async fn batch(
    orchestrator: Arc<Orchestrator>,
    config: &AppConfig,
    args: BatchArgs,
) -> anyhow::Result<()> {
    let entries: Vec<serde_json::Value> = read_json(&args.requests)?;
    let entries: Vec<_> = entries.into_iter().map(decode_request).collect();
    let mut batch_config = config.batch.clone();
    if args.timeout_ms.is_some() {
        batch_config.batch_timeout_ms = args.timeout_ms;
    }
    let max_concurrency = args
        .max_concurrency
        .map_or_else(|| batch_config.default_concurrency(), MaxConcurrency::new);

    let engine = BatchEngine::new(orchestrator, batch_config);
    let cancel = cancel_on_interrupt();
    let mut job = BatchJob::from_entries(entries, max_concurrency);
    let report = engine.run_job(&mut job, &cancel).await;
    info!(batch_id = %report.batch_id, state = ?report.state, "batch report ready");
    print_json(&report)
}

/// Decodes one batch entry. A bad entry fails its own slot only.
fn decode_request(value: serde_json::Value) -> Result<ContentRequest, RequestValidationError> {
    let payload: RequestPayload =
        serde_json::from_value(value).map_err(|err| RequestValidationError::Malformed {
            reason: err.to_string(),
        })?;
    let request = ContentRequest::try_from(payload);
    if let Err(err) = &request {
        warn!(error = %err, "batch entry rejected");
    }
    request
}

/// A token that fires on Ctrl-C. Settled results are kept; unfinished work
/// is reported as cancelled.
fn cancel_on_interrupt() -> CancellationToken {
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received; cancelling");
            trigger.cancel();
        }
    });
    cancel
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("failed to parse {}", path.display()))
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn inline_flags_build_a_request() {
        let cli = Cli::try_parse_from([
            "contentgen",
            "generate",
            "--content-type",
            "how-to-guide",
            "--topic",
            "bleeding radiators",
            "--max-length",
            "250",
            "--strategy",
            "cost_optimized",
            "--provider",
            "local",
        ])
        .unwrap();
        let Command::Generate(args) = cli.command else {
            panic!("expected generate");
        };
        let request = inline_request(&args).unwrap();
        assert_eq!(request.content_type, ContentType::HowToGuide);
        assert_eq!(request.topic, "bleeding radiators");
        assert_eq!(request.max_length, 250);
        assert_eq!(
            request.optimization_strategy,
            OptimizationStrategy::CostOptimized
        );
        assert_eq!(request.provider_override.as_deref(), Some("local"));
    }

    #[test]
    fn unknown_content_type_is_rejected() {
        let cli = Cli::try_parse_from([
            "contentgen",
            "generate",
            "--content-type",
            "limerick",
            "--topic",
            "cats",
        ])
        .unwrap();
        let Command::Generate(args) = cli.command else {
            panic!("expected generate");
        };
        assert!(inline_request(&args).is_err());
    }

    #[test]
    fn generate_requires_a_request_or_flags() {
        assert!(Cli::try_parse_from(["contentgen", "generate"]).is_err());
        assert!(Cli::try_parse_from(["contentgen", "generate", "--request", "r.json"]).is_ok());
    }

    #[test]
    fn batch_accepts_non_positive_concurrency() {
        let cli = Cli::try_parse_from([
            "contentgen",
            "batch",
            "--requests",
            "batch.json",
            "--max-concurrency",
            "-3",
        ])
        .unwrap();
        let Command::Batch(args) = cli.command else {
            panic!("expected batch");
        };
        assert_eq!(MaxConcurrency::new(args.max_concurrency.unwrap()).get(), 1);
    }

    #[test]
    fn bad_batch_entries_are_rejected_individually() {
        let entries: Vec<serde_json::Value> = serde_json::from_str(
            r#"[
                {"content_type":"caption","topic":"lanterns","max_length":20},
                {"content_type":"limerick","topic":"cats","max_length":20},
                {"content_type":"caption","topic":"owls","max_length":-1},
                {"topic":"no type"}
            ]"#,
        )
        .unwrap();
        let decoded: Vec<_> = entries.into_iter().map(decode_request).collect();

        assert_eq!(decoded[0].as_ref().unwrap().topic, "lanterns");
        assert!(matches!(
            decoded[1],
            Err(RequestValidationError::UnknownContentType { .. })
        ));
        assert!(matches!(
            decoded[2],
            Err(RequestValidationError::NonPositiveMaxLength { value: -1 })
        ));
        assert!(matches!(decoded[3], Err(RequestValidationError::Malformed { .. })));
    }

    #[tokio::test]
    async fn mock_configuration_generates_end_to_end() {
        let config = AppConfig::parse(
            r#"
[[providers]]
name = "mock"
kind = "mock"
model = "mock-1"
cost_per_token = { input = 0.0, output = 0.0 }
quality_rating = 7.0
"#,
        )
        .unwrap();
        let orchestrator = build_orchestrator(&config).unwrap();
        let request = ContentRequest::new(ContentType::BlogPost, "sourdough starters", 300);

        let result = orchestrator.generate(&request).await.unwrap();

        assert!(result.succeeded, "issues: {:?}", result.issues);
        assert_eq!(result.provider_used.as_str(), "mock");
        assert!(result.content.contains("sourdough starters"));
    }
}
