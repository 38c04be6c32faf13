//! Sweep thresholds and title weights over human-labeled song pairs
//! Usage: cargo run --release --bin calibrate -- <labeled.sqlite3> [--thresholds 60,65,70]

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::time::Instant;
use tracing::info;
use tracing_subscriber::EnvFilter;

use song_dedup::calibration::{best_by_f1, evaluate, ThresholdMetrics};
use song_dedup::progress::format_duration;
use song_dedup::safety::validate_report_path;
use song_dedup::{store, MatchWeights};

#[derive(Parser)]
#[command(name = "calibrate")]
#[command(about = "Measure precision/recall of the fuzzy matcher on labeled pairs")]
struct Args {
    /// Database with a `labeled_pairs` table
    labeled: PathBuf,

    /// Thresholds to evaluate (comma-separated)
    #[arg(long, value_delimiter = ',', default_value = "50,55,60,65,70,75,80,85,90,95")]
    thresholds: Vec<u8>,

    /// Title weight shares to evaluate (comma-separated)
    #[arg(long, value_delimiter = ',', default_value = "0.5,0.6,0.7,0.8")]
    title_weights: Vec<f64>,

    /// Write every row to a JSON report
    #[arg(long)]
    report: Option<PathBuf>,

    #[arg(long, default_value = "0")]
    workers: usize,
}

fn print_table(rows: &[ThresholdMetrics]) {
    println!("Title  Thresh   TP     FP     FN     TN    Precision  Recall   F1");
    println!("─────────────────────────────────────────────────────────────────────");
    for m in rows {
        println!(
            "{:>5.2}  {:>6}  {:>5}  {:>5}  {:>5}  {:>5}   {:>7.3}  {:>7.3}  {:>6.3}",
            m.weights.title,
            m.threshold,
            m.matrix.true_positives,
            m.matrix.false_positives,
            m.matrix.false_negatives,
            m.matrix.true_negatives,
            m.precision,
            m.recall,
            m.f1,
        );
    }
    println!("─────────────────────────────────────────────────────────────────────");
}

fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("song_dedup=info,calibrate=info")),
        )
        .init();

    if args.workers > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(args.workers)
            .build_global()
            .context("Failed to set thread pool size")?;
    }

    if args.thresholds.iter().any(|&t| t > 100) {
        bail!("Thresholds must be between 0 and 100");
    }
    if let Some(report) = &args.report {
        validate_report_path(report, &[args.labeled.as_path()])?;
    }

    let weights = args
        .title_weights
        .iter()
        .map(|&share| MatchWeights::from_title_share(share))
        .collect::<Result<Vec<_>>>()?;

    let start = Instant::now();

    let pairs = store::load_labeled_pairs(&store::open_source(&args.labeled)?)?;
    let positives = pairs.iter().filter(|p| p.is_duplicate).count();
    info!(pairs = pairs.len(), positives, "Loaded labeled pairs");
    if pairs.is_empty() {
        bail!("No labeled pairs in {}", args.labeled.display());
    }

    let mut rows = Vec::with_capacity(weights.len() * args.thresholds.len());
    for w in &weights {
        rows.extend(evaluate(&pairs, w, &args.thresholds));
    }

    println!("\n=== CALIBRATION ({} pairs, {} duplicates) ===", pairs.len(), positives);
    println!();
    print_table(&rows);

    if let Some(best) = best_by_f1(&rows) {
        println!(
            "\nBest F1: {:.3} at threshold {} (title {:.2} / artist {:.2})",
            best.f1, best.threshold, best.weights.title, best.weights.artist
        );
        println!(
            "  {} false positives, {} false negatives",
            best.matrix.false_positives, best.matrix.false_negatives
        );
    }

    if let Some(path) = &args.report {
        let json = serde_json::to_string_pretty(&rows)?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write report {}", path.display()))?;
        println!("Report written to {}", path.display());
    }

    println!("\nElapsed: {}", format_duration(start.elapsed()));
    Ok(())
}
