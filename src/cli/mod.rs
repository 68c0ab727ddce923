//! spamlens CLI Module
//!
//! Command-line interface for consensus predictions and explanations over a
//! model bundle. Results go to stdout as JSON; the styled verdict line goes
//! to stderr so stdout stays machine-readable.

use clap::{Parser, Subcommand};
use colored::*;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::bundle::ModelBundle;
use crate::config::EngineConfig;
use crate::consensus::{ConsensusResult, Verdict};
use crate::engine::SpamEngine;
use crate::explainability::{ExplanationBudget, ExplanationResult};

// ─── Styling helpers ───────────────────────────────────────────────────────────

fn dim(s: &str) -> ColoredString { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString { s.truecolor(100, 210, 120) }
fn alert(s: &str) -> ColoredString { s.truecolor(235, 100, 90) }

fn kv(key: &str, val: &str) -> String {
    format!("{} {}", muted(key), val.white())
}

fn verdict_badge(verdict: Verdict) -> ColoredString {
    match verdict {
        Verdict::Spam => alert("SPAM").bold(),
        Verdict::Ham => ok("HAM").bold(),
        Verdict::Unknown => muted("UNKNOWN").bold(),
    }
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "spamlens")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Consensus spam classification with local explanations")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Classify a message with the whole classifier pool
    Predict {
        /// Model bundle (JSON)
        #[arg(short, long)]
        bundle: PathBuf,

        /// Engine configuration (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Message text
        message: String,
    },

    /// Explain which tokens drive the spam probability of a message
    Explain {
        /// Model bundle (JSON)
        #[arg(short, long)]
        bundle: PathBuf,

        /// Engine configuration (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Number of tokens to report (0 uses the configured maximum)
        #[arg(short = 'k', long, default_value = "5")]
        features: usize,

        /// Cap on perturbed samples for this call
        #[arg(long)]
        samples: Option<usize>,

        /// Wall-clock budget for sampling, in milliseconds
        #[arg(long)]
        time_ms: Option<u64>,

        /// Sampling seed (defaults to the configured seed)
        #[arg(long)]
        seed: Option<u64>,

        /// Message text
        message: String,
    },

    /// Show the classifiers in a bundle
    Info {
        /// Model bundle (JSON)
        #[arg(short, long)]
        bundle: PathBuf,
    },
}

// ─── Command implementations ───────────────────────────────────────────────────

fn load_engine(bundle: &Path, config: Option<&Path>) -> anyhow::Result<SpamEngine> {
    let config = match config {
        Some(path) => EngineConfig::from_file(path)?,
        None => EngineConfig::default(),
    };
    Ok(SpamEngine::from_bundle_file(bundle, config)?)
}

fn print_consensus_line(result: &ConsensusResult, elapsed_ms: f64) {
    eprintln!(
        "  {}  {}  {}  {}",
        verdict_badge(result.majority_verdict),
        kv("confidence", &format!("{:.1}%", result.consensus_confidence)),
        kv("votes", &format!("{}/{}", result.majority_count, result.total_voters)),
        dim(&format!("{:.2}ms", elapsed_ms)),
    );
    for excluded in &result.excluded {
        eprintln!("  {} {} {}", alert("×"), excluded.classifier_id, dim(&excluded.reason));
    }
}

fn print_explanation_line(result: &ExplanationResult, elapsed_ms: f64) {
    eprintln!(
        "  {} {}  {}  {}",
        accent("›"),
        kv("method", result.method.as_str()),
        kv("quality", &result.quality.confidence_level.to_string()),
        dim(&format!("{:.2}ms", elapsed_ms)),
    );
    eprintln!("  {}", muted(&result.summary));
}

pub fn cmd_predict(bundle: &Path, config: Option<&Path>, message: &str) -> anyhow::Result<()> {
    let engine = load_engine(bundle, config)?;

    let start = Instant::now();
    let result = engine.predict_consensus(message);
    print_consensus_line(&result, start.elapsed().as_secs_f64() * 1000.0);

    println!("{}", serde_json::to_string_pretty(&result)?);
    engine.shutdown();
    Ok(())
}

#[allow(clippy::too_many_arguments)]
pub fn cmd_explain(
    bundle: &Path,
    config: Option<&Path>,
    message: &str,
    features: usize,
    samples: Option<usize>,
    time_ms: Option<u64>,
    seed: Option<u64>,
) -> anyhow::Result<()> {
    let engine = load_engine(bundle, config)?;
    let budget = ExplanationBudget {
        max_samples: samples,
        max_time_ms: time_ms,
    };

    let start = Instant::now();
    let seed = seed.unwrap_or(engine.config().explainer.seed);
    let result = engine.explain_with_seed(message, features, Some(budget), seed);
    print_explanation_line(&result, start.elapsed().as_secs_f64() * 1000.0);

    println!("{}", serde_json::to_string_pretty(&result)?);
    engine.shutdown();
    Ok(())
}

pub fn cmd_info(bundle: &Path) -> anyhow::Result<()> {
    let bundle = ModelBundle::from_file(bundle)?;
    let vectorizer = bundle.build_vectorizer()?;
    let pool = bundle.build_pool(vectorizer.as_ref())?;

    println!();
    println!("  {}", "Model bundle".white().bold());
    println!("  {}", dim(&"─".repeat(56)));
    println!("  {}", kv("vocabulary", &vectorizer.n_features().to_string()));
    println!("  {}", kv("classifiers", &pool.len().to_string()));
    println!();
    for member in pool.members() {
        println!(
            "  {:<20} {:<14} {}",
            member.id().white(),
            muted(member.capability().kind()),
            kv("weight", &format!("{:.3}", member.weight())),
        );
    }
    println!();
    Ok(())
}
