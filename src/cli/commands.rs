//! Command handlers

use crate::cli::args::CacheAction;
use crate::config::Config;
use crate::cost::CostTracker;
use crate::pricing::PricingDatabase;
use crate::session_log::SessionLog;
use anyhow::{Context, Result};
use foundry_blueprint::BlueprintStore;
use foundry_cache::ResponseCache;
use foundry_client::{CallRecord, CostRecorder, UnifiedClient};
use foundry_orchestrator::{ApprovalGate, PhaseOrchestrator, WorkflowOptions};
use foundry_providers::ProviderRegistry;
use foundry_router::ModelRouter;
use foundry_utils::types::{BuildMode, WorkflowStatus};
use std::io::Write as _;
use std::path::PathBuf;
use std::sync::Arc;

/// Stdin-backed approval gate for `--interactive` runs.
struct StdinGate;

impl ApprovalGate for StdinGate {
    fn approve(&self, phase: &str, preview: &str) -> bool {
        let preview: String = preview.chars().take(1_500).collect();
        println!("\n===== {phase} output =====\n{preview}\n=====");
        print!("Continue past {phase}? [Y/n] ");
        let _ = std::io::stdout().flush();

        let mut line = String::new();
        if std::io::stdin().read_line(&mut line).is_err() {
            return false;
        }
        !matches!(line.trim().to_lowercase().as_str(), "n" | "no")
    }
}

/// Fan-out recorder: cost tracker plus session log.
struct TeeRecorder {
    sinks: Vec<Arc<dyn CostRecorder>>,
}

impl CostRecorder for TeeRecorder {
    fn record(&self, record: &CallRecord) {
        for sink in &self.sinks {
            sink.record(record);
        }
    }
}

/// Shared wiring for build/fix/enhance.
pub struct BuildInvocation {
    pub project: String,
    pub task: String,
    pub output: Option<PathBuf>,
    pub interactive: bool,
    pub git: bool,
    pub resume_session: Option<String>,
    pub resume_tasks: Option<Vec<usize>>,
}

/// Run a build/fix/enhance workflow end to end.
///
/// # Errors
/// Returns an error for configuration problems; workflow failures are
/// reported through the returned status.
pub async fn run_workflow(mode: BuildMode, invocation: BuildInvocation) -> Result<WorkflowStatus> {
    let config = Config::discover(&std::env::current_dir()?)?;
    let registry = Arc::new(ProviderRegistry::with_default_providers());

    let pricing = PricingDatabase::from_registry(&registry);
    if pricing.needs_update() {
        tracing::warn!("pricing rows are stale; refresh the pricing table");
    }
    let cost_tracker = Arc::new(CostTracker::new(pricing));

    let mut client = UnifiedClient::new(Arc::clone(&registry), config.phases.clone())
        .map_err(|e| anyhow::anyhow!(e.to_string()))?
        .with_generation_params(config.max_tokens, config.temperature);

    if config.cache_enabled {
        let cache = ResponseCache::new(
            foundry_utils::paths::response_cache_dir(),
            config.cache_ttl_hours,
        )
        .context("failed to open the response cache")?;
        client = client.with_cache(Arc::new(cache));
    }
    if let Some(router) = ModelRouter::from_env() {
        client = client.with_router(Arc::new(router));
    }

    let project_dir = invocation
        .output
        .unwrap_or_else(|| PathBuf::from(&invocation.project));

    let options = WorkflowOptions {
        mode,
        autonomous: !invocation.interactive,
        git_commits: invocation.git,
        resume_session: invocation.resume_session,
        resume_tasks: invocation.resume_tasks,
        checkpoint_root: None,
    };

    let session = foundry_utils::types::SessionId::mint(&invocation.project);
    let session_log = Arc::new(SessionLog::open(session.as_str()));
    let tee = TeeRecorder {
        sinks: vec![
            Arc::clone(&cost_tracker) as Arc<dyn CostRecorder>,
            session_log as Arc<dyn CostRecorder>,
        ],
    };
    let client = Arc::new(client.with_recorder(Arc::new(tee)));

    let orchestrator =
        PhaseOrchestrator::new(Arc::clone(&client), &project_dir, &invocation.project, options)?
            .with_session(session)?
            .with_gate(Arc::new(StdinGate));

    let result = orchestrator.run(&invocation.task).await;

    println!(
        "\nSession {} finished: {}",
        result.session_id,
        result.status.as_str()
    );
    println!(
        "Tasks: {}/{} completed; {} file(s) written",
        result.tasks_completed,
        result.tasks_total,
        result.files_written.len()
    );
    for warning in &result.warnings {
        println!("warning [{}]: {}", warning.source, warning.message);
    }
    if let Some(error) = &result.error {
        eprintln!("error: {error}");
    }

    let summary = cost_tracker.summary();
    if summary.total.calls > 0 {
        println!(
            "LLM usage: {} call(s), {} cached, {} in / {} out tokens, ${:.4}",
            summary.total.calls,
            summary.total.cached_calls,
            summary.total.input_tokens,
            summary.total.output_tokens,
            summary.total.cost_usd
        );
    }

    Ok(result.status)
}

/// `foundry status <project>`
///
/// # Errors
/// Returns an error when the blueprint store cannot be opened.
pub fn show_status(project: &str, output: Option<PathBuf>) -> Result<()> {
    let project_dir = output.unwrap_or_else(|| PathBuf::from(project));
    let store = BlueprintStore::open(&project_dir, project)?;
    let manifest = store.load_manifest();

    println!("Project: {}", manifest.project);
    println!("Blueprints populated: {}", store.is_populated());
    if manifest.sessions.is_empty() {
        println!("No sessions recorded.");
        return Ok(());
    }

    println!("Sessions:");
    for session in &manifest.sessions {
        println!(
            "  {}  {}  {}  completed={}  ({})",
            session.timestamp.format("%Y-%m-%d %H:%M:%S"),
            session.session_type,
            session.status,
            session.completed,
            session.task
        );
    }
    Ok(())
}

/// `foundry models`
pub fn list_models(configured_only: bool) {
    let registry = ProviderRegistry::with_default_providers();
    for provider in registry.providers() {
        let configured = provider.is_configured();
        if configured_only && !configured {
            continue;
        }
        println!(
            "{} ({}) — {}",
            provider.display_name(),
            provider.name(),
            if configured {
                "configured"
            } else {
                "missing credentials"
            }
        );
        for model in provider.available_models() {
            println!(
                "  {:<50} {:>9} tokens  {}",
                model.name, model.context_window, model.description
            );
        }
    }
}

/// `foundry pricing`
pub fn show_pricing() {
    let registry = ProviderRegistry::with_default_providers();
    let pricing = PricingDatabase::from_registry(&registry);
    println!("{:<12} {:<50} {:>10} {:>10}", "provider", "model", "$/M in", "$/M out");
    for (provider, model, row) in pricing.rows_sorted() {
        println!(
            "{provider:<12} {model:<50} {:>10.2} {:>10.2}",
            row.input_cost_per_1m, row.output_cost_per_1m
        );
    }
}

/// `foundry estimate`
///
/// # Errors
/// Returns an error when configuration discovery fails.
pub fn estimate(input_tokens: u64, output_tokens: u64) -> Result<()> {
    let config = Config::discover(&std::env::current_dir()?)?;
    let registry = ProviderRegistry::with_default_providers();
    let pricing = PricingDatabase::from_registry(&registry);

    // Rough split of the pipeline's tokens across phases
    let splits = [
        ("scout", &config.phases.scout, 0.2),
        ("architect", &config.phases.architect, 0.3),
        ("builder", &config.phases.builder, 0.5),
    ];

    let mut total = 0.0;
    for (phase, phase_config, share) in splits {
        let input = (input_tokens as f64 * share) as u64;
        let output = (output_tokens as f64 * share) as u64;
        let cost = pricing
            .estimate(&phase_config.provider, &phase_config.model, input, output)
            .unwrap_or(0.0);
        println!(
            "{phase:<10} {}/{:<40} ~${cost:.4}",
            phase_config.provider, phase_config.model
        );
        total += cost;
    }
    println!("estimated total: ~${total:.4}");
    Ok(())
}

/// `foundry config`
///
/// # Errors
/// Returns an error when configuration discovery fails.
pub fn show_config() -> Result<()> {
    let config = Config::discover(&std::env::current_dir()?)?;
    match &config.config_path {
        Some(path) => println!("config file: {}", path.display()),
        None => println!("config file: (none found; defaults + environment)"),
    }
    for (phase, pc) in [
        ("scout", &config.phases.scout),
        ("architect", &config.phases.architect),
        ("builder", &config.phases.builder),
    ] {
        println!("{phase:<10} {} / {}", pc.provider, pc.model);
    }
    println!(
        "cache: {} (ttl {}h)",
        if config.cache_enabled { "enabled" } else { "disabled" },
        config.cache_ttl_hours
    );
    println!(
        "generation: max_tokens={} temperature={}",
        config.max_tokens, config.temperature
    );
    Ok(())
}

/// `foundry cache <action>`
///
/// # Errors
/// Returns an error when the cache directory is unavailable.
pub fn cache_command(action: &CacheAction) -> Result<()> {
    let cache = ResponseCache::open_default().map_err(|e| anyhow::anyhow!(e.to_string()))?;
    match action {
        CacheAction::Stats => {
            let stats = cache.stats();
            println!("entries: {}", stats.entries);
            println!("size: {} bytes", stats.total_bytes);
            println!(
                "session: {} hits / {} misses ({:.1}% hit rate)",
                stats.session_hits,
                stats.session_misses,
                stats.hit_rate * 100.0
            );
        }
        CacheAction::Clear { max_age_hours } => {
            let removed = cache
                .clear(*max_age_hours)
                .map_err(|e| anyhow::anyhow!(e.to_string()))?;
            println!("removed {removed} cache entr{}", if removed == 1 { "y" } else { "ies" });
        }
    }
    Ok(())
}

/// Pointer for subcommands served by external tools.
pub fn external_tool_pointer(name: &str) {
    println!(
        "`foundry {name}` is provided by the external {name} tooling; \
         see the project documentation."
    );
}
