use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use rayon::prelude::*;
use rustc_hash::FxHashMap;
use serde::Serialize;
use std::path::PathBuf;
use std::time::Instant;
use tracing::info;
use tracing_subscriber::EnvFilter;

use song_dedup::models::{RecordRef, ScanOutcome, ScanStats, ScanVerdict, SongIdentity, SongRecord};
use song_dedup::progress::{self, format_duration, PhaseProgress};
use song_dedup::safety::validate_report_path;
use song_dedup::scan::{
    BlockingStrategy, DuplicateIndex, FullScan, ScanConfig, TitlePrefixBlocking,
    TitleTokenBlocking,
};
use song_dedup::{store, MatchWeights};

/// Threshold tuned against false-positive rates on curator uploads.
const WORKING_THRESHOLD: u8 = 70;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Blocking {
    /// Compare against every catalog song
    FullScan,
    /// Only songs whose normalized title shares a prefix
    TitlePrefix,
    /// Only songs sharing a long title word
    TitleToken,
}

#[derive(Parser)]
#[command(name = "song-dedup")]
#[command(about = "Check incoming songs against a catalog for exact and fuzzy duplicates")]
struct Args {
    /// Catalog database (table `songs`)
    catalog: PathBuf,

    /// Database of songs to check (table `songs`)
    incoming: PathBuf,

    /// Minimum combined similarity (0-100) for a fuzzy duplicate
    #[arg(long, default_value_t = WORKING_THRESHOLD, value_parser = clap::value_parser!(u8).range(0..=100))]
    threshold: u8,

    /// Title share of the combined score; artist gets the rest
    #[arg(long, default_value_t = 0.6)]
    title_weight: f64,

    #[arg(long, value_enum, default_value_t = Blocking::FullScan)]
    blocking: Blocking,

    #[arg(long, default_value = "3")]
    prefix_len: usize,

    #[arg(long, default_value = "4")]
    min_token_len: usize,

    /// Ranked fuzzy matches kept per incoming song
    #[arg(long, default_value = "5")]
    max_candidates: usize,

    /// Also match incoming songs against earlier incoming songs (sequential)
    #[arg(long)]
    within_batch: bool,

    #[arg(long, default_value = "0")]
    workers: usize,

    /// Write every verdict to a JSON report
    #[arg(long)]
    report: Option<PathBuf>,

    /// Fuzzy matches to print in the summary
    #[arg(long, default_value = "10")]
    show: usize,

    /// Hide progress bars and log progress lines instead
    #[arg(long)]
    log_only: bool,
}

#[derive(Serialize)]
struct ReportEntry<'a> {
    incoming_id: i64,
    #[serde(flatten)]
    outcome: &'a ScanOutcome,
}

#[derive(Serialize)]
struct Report<'a> {
    stats: &'a ScanStats,
    outcomes: Vec<ReportEntry<'a>>,
}

fn blocking_strategy(args: &Args) -> Box<dyn BlockingStrategy> {
    match args.blocking {
        Blocking::FullScan => Box::new(FullScan),
        Blocking::TitlePrefix => Box::new(TitlePrefixBlocking {
            prefix_len: args.prefix_len,
        }),
        Blocking::TitleToken => Box::new(TitleTokenBlocking {
            min_token_len: args.min_token_len,
        }),
    }
}

fn build_index(catalog: &[SongRecord], config: ScanConfig, args: &Args) -> DuplicateIndex {
    let progress = PhaseProgress::new("Phase 1: Indexing catalog", catalog.len() as u64);
    let mut index = DuplicateIndex::new(config, blocking_strategy(args));
    for record in catalog {
        index.insert(record.clone());
        progress.inc();
    }
    progress.finish(format!("Phase 1: Indexed {} catalog songs", index.len()));
    index
}

fn check_incoming(index: &mut DuplicateIndex, incoming: &[SongRecord], within_batch: bool) -> Vec<ScanOutcome> {
    let progress = PhaseProgress::new("Phase 2: Checking incoming", incoming.len() as u64);

    let outcomes: Vec<ScanOutcome> = if within_batch {
        incoming
            .iter()
            .map(|record| {
                let outcome = index.ingest(record.clone());
                progress.inc();
                outcome
            })
            .collect()
    } else {
        let index = &*index;
        incoming
            .par_iter()
            .map(|record| {
                let outcome = index.check(&record.song);
                progress.inc();
                outcome
            })
            .collect()
    };

    progress.finish(format!("Phase 2: Checked {} incoming songs", outcomes.len()));
    outcomes
}

fn print_summary(stats: &ScanStats, incoming: &[SongRecord], outcomes: &[ScanOutcome], catalog: &[SongRecord], show: usize) {
    let known: FxHashMap<RecordRef, &SongIdentity> = catalog
        .iter()
        .map(|r| (RecordRef::catalog(r.id), &r.song))
        .chain(incoming.iter().map(|r| (RecordRef::incoming(r.id), &r.song)))
        .collect();

    println!("\n{:=<60}", "");
    println!("Duplicate check complete!");
    println!("  Blocking:          {}", stats.blocking);
    println!("  Threshold:         {}", stats.threshold);
    println!("  Incoming songs:    {}", stats.candidates);
    println!("  Exact duplicates:  {}", stats.exact_duplicates);
    println!("  Fuzzy duplicates:  {}", stats.fuzzy_duplicates);
    println!("  Unique:            {}", stats.unique);
    println!("  Unscorable:        {}", stats.unscorable);
    println!("  Duplicate rate:    {:.1}%", stats.duplicate_rate());
    println!(
        "  Comparisons:       {} scored, {} pruned, {} blocked",
        stats.comparisons_scored, stats.comparisons_pruned, stats.comparisons_blocked
    );
    println!("{:=<60}", "");

    let mut fuzzy: Vec<(&SongRecord, &ScanOutcome)> = incoming
        .iter()
        .zip(outcomes)
        .filter(|(_, o)| matches!(o.verdict, ScanVerdict::FuzzyDuplicate { .. }))
        .collect();
    if fuzzy.is_empty() || show == 0 {
        return;
    }

    // Lowest scores first: those are the ones worth a human look.
    fuzzy.sort_by(|(_, a), (_, b)| best_score(a).total_cmp(&best_score(b)));

    println!("\nFuzzy duplicates for review (lowest confidence first):");
    println!("{:-<80}", "");
    for (record, outcome) in fuzzy.into_iter().take(show) {
        let ScanVerdict::FuzzyDuplicate { best, .. } = &outcome.verdict else {
            continue;
        };
        let existing = known
            .get(&best.record)
            .map(|s| format!("{} - {}", s.artist, s.title))
            .unwrap_or_else(|| "?".to_string());
        println!(
            "[incoming:{}] {} - {}  ~  [{}] {}  score={:.2} (artist {:.1}, title {:.1})",
            record.id,
            record.song.artist,
            record.song.title,
            best.record,
            existing,
            best.similarity.combined_score,
            best.similarity.artist_similarity,
            best.similarity.title_similarity,
        );
    }
}

fn best_score(outcome: &ScanOutcome) -> f64 {
    match &outcome.verdict {
        ScanVerdict::FuzzyDuplicate { best, .. } => best.similarity.combined_score,
        _ => 0.0,
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("song_dedup=info")),
        )
        .init();

    progress::set_log_only(args.log_only);

    if args.workers > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(args.workers)
            .build_global()
            .context("Failed to set thread pool size")?;
    }

    if let Some(report) = &args.report {
        validate_report_path(report, &[args.catalog.as_path(), args.incoming.as_path()])?;
    }

    let weights = MatchWeights::from_title_share(args.title_weight)?;
    let config = ScanConfig::new(args.threshold)
        .with_weights(weights)
        .with_max_candidates(args.max_candidates);

    let start = Instant::now();

    info!("Opening catalog database: {:?}", args.catalog);
    let catalog_conn = store::open_source(&args.catalog)?;
    info!(songs = store::count_songs(&catalog_conn)?, "Loading catalog");
    let catalog = store::load_songs(&catalog_conn)?;

    info!("Opening incoming database: {:?}", args.incoming);
    let incoming_conn = store::open_source(&args.incoming)?;
    info!(songs = store::count_songs(&incoming_conn)?, "Loading incoming songs");
    let incoming = store::load_songs(&incoming_conn)?;

    let mut index = build_index(&catalog, config, &args);
    let outcomes = check_incoming(&mut index, &incoming, args.within_batch);

    let mut stats = ScanStats {
        blocking: index.blocking_name().to_string(),
        threshold: index.config().threshold,
        catalog_size: catalog.len(),
        ..Default::default()
    };
    for outcome in &outcomes {
        stats.record(outcome);
    }
    stats.elapsed_seconds = start.elapsed().as_secs_f64();
    stats.log_phase("final");

    print_summary(&stats, &incoming, &outcomes, &catalog, args.show);
    println!("\nElapsed: {}", format_duration(start.elapsed()));

    if let Some(path) = &args.report {
        let report = Report {
            stats: &stats,
            outcomes: incoming
                .iter()
                .zip(&outcomes)
                .map(|(record, outcome)| ReportEntry {
                    incoming_id: record.id,
                    outcome,
                })
                .collect(),
        };
        let json = serde_json::to_string_pretty(&report)?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write report {}", path.display()))?;
        println!("Report written to {}", path.display());
    }

    Ok(())
}
