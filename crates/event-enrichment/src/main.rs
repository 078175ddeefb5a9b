//! Event Enrichment CLI
//!
//! Geolocates, scores and tags a batch of events, then runs spike
//! detection over the batch.
//!
//! Usage:
//!   enrich-events --gazetteer data/cities15000.txt \
//!                 --events data/events.json \
//!                 --config config/enrichment.sample.json \
//!                 --output data/enriched.json --spikes data/spikes.json

use anyhow::{Context, Result};
use clap::Parser;
use event_enrichment::{export, loader, rank_by_spike_score, situations, Enricher, EnrichmentConfig};
use std::path::PathBuf;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(
    name = "enrich-events",
    about = "Geolocate, score and spike-check geopolitical and CTI events"
)]
struct Args {
    /// Gazetteer file (.json rows, otherwise a GeoNames cities dump)
    #[arg(short = 'g', long, default_value = "data/cities15000.txt")]
    gazetteer: PathBuf,

    /// Event batch (JSON array of event records)
    #[arg(short = 'e', long, default_value = "data/events.json")]
    events: PathBuf,

    /// Enrichment configuration (JSON)
    #[arg(short = 'c', long, default_value = "config/enrichment.json")]
    config: PathBuf,

    /// Output JSON file for enriched events
    #[arg(short, long, default_value = "data/enriched.json")]
    output: PathBuf,

    /// Output JSON file for per-tag spike statistics
    #[arg(long)]
    spikes: Option<PathBuf>,

    /// Also output GeoJSON of geolocated events
    #[arg(long)]
    geojson: bool,

    /// Number of situations to log
    #[arg(long, default_value_t = 10)]
    top: usize,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("{}", "=".repeat(60));
    info!("Event Enrichment");
    info!("{}", "=".repeat(60));

    // Startup: config and gazetteer must both be valid
    let raw_config = EnrichmentConfig::load(&args.config)
        .with_context(|| format!("reading config {:?}", args.config))?;
    let (scoring, spike) = raw_config.validate().context("invalid enrichment config")?;

    let index = gazetteer::loader::load_index(&args.gazetteer)
        .with_context(|| format!("loading gazetteer {:?}", args.gazetteer))?;

    // Enrich
    let records = loader::load_events(&args.events)?;
    let outcome = Enricher::new(&index, &scoring).enrich_batch(records);

    for skipped in &outcome.skipped {
        warn!("  skipped {:?}: {}", skipped.event_id, skipped.reason);
    }

    loader::write_json(&args.output, &outcome.enriched)?;

    // Spikes over the batch
    let stats = spike.detect(&outcome.enriched);
    if let Some(path) = &args.spikes {
        loader::write_json(path, &stats)?;
    }

    let mut ranked: Vec<_> = stats.into_iter().filter(|s| s.is_spike).collect();
    rank_by_spike_score(&mut ranked);
    info!("\nSpiking tags:");
    for s in &ranked {
        info!(
            "  {:7.1} | {:30} | {:4} events | baseline {:.2} | {:+.0}% | z {:.2}",
            s.spike_score,
            s.tag.chars().take(30).collect::<String>(),
            s.count,
            s.baseline_rate,
            s.pct_vs_baseline,
            s.z_score
        );
    }

    // Write GeoJSON if requested
    if args.geojson {
        let geojson_path = args.output.with_extension("geojson");
        info!("Writing GeoJSON to {:?}", geojson_path);
        loader::write_json(&geojson_path, &export::to_geojson(&outcome.enriched))?;
    }

    // Summary
    let summary = outcome.stats();
    info!("\n{}", "=".repeat(60));
    info!("SUMMARY");
    info!("{}", "=".repeat(60));
    info!("Enriched: {} ({} skipped)", summary.enriched, summary.skipped);
    info!(
        "Geolocated: {} resolved, {} unresolved",
        summary.geo_resolved, summary.geo_unresolved
    );
    info!("\nTop {} situations:", args.top);
    for s in situations::summarize_situations(&outcome.enriched, args.top) {
        info!(
            "  {:6.2} | max {:.3} | {:30} | {:4} events | {}",
            s.situation_score,
            s.max_priority,
            s.tag.chars().take(30).collect::<String>(),
            s.events,
            s.top_source
        );
    }

    Ok(())
}
