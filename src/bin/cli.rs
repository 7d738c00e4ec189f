//! CLI binary for the demand miner.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use demand_miner::{CacheStore, MinerConfig, MiningEngine, Profile, Rank, list_profiles};
use miner_sources::sources::{CustomSearchCompetition, GoogleSuggest, GoogleTrends};
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Environment variable holding the Custom Search API key.
const API_KEY_ENV: &str = "DEMAND_MINER_CSE_KEY";
/// Environment variable holding the Custom Search engine id.
const ENGINE_ID_ENV: &str = "DEMAND_MINER_CSE_CX";

/// Demand miner: long-tail keyword discovery with competition ranking.
#[derive(Parser)]
#[command(name = "demand-miner", version, about)]
struct Cli {
    /// Path to TOML configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Subcommand to run.
    #[command(subcommand)]
    command: Command,
}

/// Available commands.
#[derive(Subcommand)]
enum Command {
    /// Mine and rank keywords for one pattern of a profile.
    Run {
        /// Profile directory containing `profile.toml`.
        profile: PathBuf,
        /// Pattern id to run.
        pattern: String,
        /// Ignore cached results for this run (fresh results are still stored).
        #[arg(long)]
        no_cache: bool,
    },

    /// Report every problem with a profile.
    Validate {
        /// Profile directory containing `profile.toml`.
        profile: PathBuf,
    },

    /// List profiles and their patterns.
    Profiles {
        /// Directory holding profile directories.
        #[arg(default_value = "profiles")]
        root: PathBuf,
    },

    /// Show cache contents per rank for a profile.
    CacheStats {
        /// Profile directory; its name keys the cache.
        profile: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so stdout carries only results.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("demand_miner=info,miner_sources=info")),
        )
        .init();

    let cli = Cli::parse();

    let config = if let Some(ref path) = cli.config {
        MinerConfig::from_file(path).with_context(|| format!("loading {}", path.display()))?
    } else {
        let path = MinerConfig::default_config_path();
        if path.is_file() {
            MinerConfig::from_file(&path)?
        } else {
            MinerConfig::default()
        }
    };

    match cli.command {
        Command::Run {
            profile,
            pattern,
            no_cache,
        } => run(config, &profile, &pattern, no_cache).await,
        Command::Validate { profile } => validate(&profile),
        Command::Profiles { root } => profiles(&root),
        Command::CacheStats { profile } => cache_stats(&config, &profile),
    }
}

async fn run(mut config: MinerConfig, dir: &Path, pattern: &str, no_cache: bool) -> anyhow::Result<()> {
    config.sources.search_api_key = std::env::var(API_KEY_ENV).ok();
    config.sources.search_engine_id = std::env::var(ENGINE_ID_ENV).ok();
    config.validate()?;

    let profile = Profile::load(dir)?;
    let problems = profile.validate();
    if !problems.is_empty() {
        for problem in &problems {
            eprintln!("  - {problem}");
        }
        anyhow::bail!("profile '{}' has {} problem(s)", profile.id(), problems.len());
    }
    let plan = profile.plan(pattern)?;
    plan.tune_sources(&mut config.sources);

    let mut cache = CacheStore::open(&config.cache, profile.id())?;
    if no_cache {
        cache.disable_lookups();
    }

    let suggest = GoogleSuggest::new(&config.sources)?;
    let trends = GoogleTrends::new(&config.sources)?;
    let competition = CustomSearchCompetition::new(&config.sources)
        .with_context(|| format!("set {API_KEY_ENV} and {ENGINE_ID_ENV}"))?;

    let cancel = CancellationToken::new();
    let cancel_clone = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("received Ctrl+C, finishing current lookup...");
            cancel_clone.cancel();
        }
    });

    info!(profile = profile.id(), pattern, "starting run");
    let engine = MiningEngine::new(suggest, trends, competition, config).with_cancellation(cancel);
    let report = engine.run(&plan, &mut cache).await;

    let mut stdout = std::io::stdout().lock();
    for result in &report.results {
        writeln!(stdout, "{}", serde_json::to_string(result)?)?;
    }
    stdout.flush()?;

    for error in &report.summary.errors_encountered {
        info!(keyword = %error.keyword, kind = %error.kind, stage = ?error.stage, "{}", error.message);
    }
    info!(
        completed = report.summary.completed,
        results = report.summary.result_count,
        unranked = report.unranked.len(),
        errors = report.summary.errors_encountered.len(),
        "run summary"
    );
    Ok(())
}

fn validate(dir: &Path) -> anyhow::Result<()> {
    let profile = Profile::load(dir)?;
    let problems = profile.validate();
    if problems.is_empty() {
        println!("{} ({}): ok", profile.id(), profile.name());
        return Ok(());
    }
    println!("{} ({}):", profile.id(), profile.name());
    for problem in &problems {
        println!("  - {problem}");
    }
    anyhow::bail!("{} problem(s) found", problems.len())
}

fn profiles(root: &Path) -> anyhow::Result<()> {
    for id in list_profiles(root)? {
        match Profile::load(&root.join(&id)) {
            Ok(profile) => {
                println!("{id}: {}", profile.name());
                for pattern in profile.patterns() {
                    if let Some(pid) = &pattern.id {
                        println!("  {pid}: {}", pattern.label());
                    }
                }
            }
            Err(e) => println!("{id}: {e}"),
        }
    }
    Ok(())
}

fn cache_stats(config: &MinerConfig, dir: &Path) -> anyhow::Result<()> {
    let id = dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .context("profile path has no directory name")?;
    let cache = CacheStore::open(&config.cache, &id)?;
    let stats = cache.stats(chrono::Utc::now());

    println!("{}: {} entries ({} fresh, {} expired)", cache.path().display(), stats.total, stats.fresh, stats.expired);
    for rank in Rank::all() {
        let counts = stats.by_rank.get(rank).copied().unwrap_or_default();
        println!(
            "  {rank:>2}: {} fresh, {} expired (ttl {}h)",
            counts.fresh,
            counts.expired,
            cache.ttl_hours(*rank)
        );
    }
    Ok(())
}
