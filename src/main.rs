// Scouting tool entry point.
//
// Two subcommands share one config and one database:
// - `ingest`: one forward pass over a view export, normalizing each row and
//   persisting records plus incremental lookup rows.
// - `score`: fit a scoring engine on a stored comparison population and
//   rank every member of it.

use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use fm_scout::config::Config;
use fm_scout::db::Database;
use fm_scout::ingest::IngestSession;
use fm_scout::scoring::ScoringEngine;

#[derive(Debug, Parser)]
#[command(name = "fmscout", about = "Ingest and score Football Manager view exports")]
struct Cli {
    /// Config file (defaults to scout.toml when present).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Ingest a view export into the database.
    Ingest {
        /// Path to the exported view.
        file: PathBuf,
        /// Season tag for this export (overrides the config).
        #[arg(long)]
        season: Option<i32>,
        /// Skip records that fail to parse instead of aborting the batch.
        #[arg(long)]
        lenient: bool,
    },
    /// Score a stored comparison population.
    Score {
        /// Position code defining the population (e.g. MC, STC).
        #[arg(long)]
        position: String,
        /// Minimum minutes played (overrides the config).
        #[arg(long)]
        min_mins: Option<i64>,
        /// Emit the report as JSON instead of a table.
        #[arg(long)]
        json: bool,
    },
}

fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();
    let config =
        Config::load(cli.config.as_deref()).context("failed to load configuration")?;

    match cli.command {
        Command::Ingest {
            file,
            season,
            lenient,
        } => run_ingest(&config, &file, season, lenient),
        Command::Score {
            position,
            min_mins,
            json,
        } => run_score(&config, &position, min_mins, json),
    }
}

// ---------------------------------------------------------------------------
// Ingest
// ---------------------------------------------------------------------------

fn run_ingest(
    config: &Config,
    file: &PathBuf,
    season: Option<i32>,
    lenient: bool,
) -> anyhow::Result<()> {
    let db = Database::open(&config.db_path)
        .with_context(|| format!("failed to open database {}", config.db_path))?;

    // Continue id sequences past whatever is already stored, unless the
    // config pins explicit offsets for a coordinated multi-batch plan.
    let offsets = match config.offsets {
        Some(offsets) => offsets,
        None => db.next_lookup_offsets()?,
    };
    let season = season.unwrap_or(config.season);
    let mut session = IngestSession::new(season, offsets, config.obfuscation_factor)
        .with_next_player_id(db.next_player_id()?);
    let preloaded = db.load_lookups(session.interner_mut())?;
    info!(
        "Ingesting {} (season {}, {} known lookup values)",
        file.display(),
        season,
        preloaded
    );

    let reader = BufReader::new(
        File::open(file).with_context(|| format!("failed to open {}", file.display()))?,
    );
    let layout = config.export_layout();
    let stream = session.stream(reader, &layout)?;

    let mut inserted = 0usize;
    let mut skipped = 0usize;
    for result in stream {
        match result {
            Ok(record) => {
                db.insert_record(&record)
                    .with_context(|| format!("failed to store {}", record.identity.name))?;
                inserted += 1;
            }
            Err(e) if lenient => {
                warn!("skipping record: {e}");
                skipped += 1;
            }
            Err(e) => {
                return Err(anyhow::Error::new(e)
                    .context("record failed to parse (re-run with --lenient to skip)"));
            }
        }
    }

    info!("Ingest complete: {inserted} records stored, {skipped} skipped");
    Ok(())
}

// ---------------------------------------------------------------------------
// Score
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct ScoreReport {
    position: String,
    min_mins: i64,
    statistics: Vec<String>,
    players: Vec<ScoredPlayer>,
}

#[derive(Debug, Serialize)]
struct ScoredPlayer {
    name: String,
    scores: Vec<f64>,
    aggregate: f64,
}

fn run_score(
    config: &Config,
    position: &str,
    min_mins: Option<i64>,
    json: bool,
) -> anyhow::Result<()> {
    let db = Database::open(&config.db_path)
        .with_context(|| format!("failed to open database {}", config.db_path))?;

    let min_mins = min_mins.unwrap_or(config.score.min_mins);
    let population = db
        .select_population(position, min_mins, &config.score.stats)
        .context("failed to load comparison population")?;
    info!(
        "Scoring {} players at {} with at least {} minutes",
        population.len(),
        position,
        min_mins
    );

    let vectors: Vec<Vec<f64>> = population.iter().map(|(_, v)| v.clone()).collect();
    let engine = ScoringEngine::fit(config.score.stats.clone(), &vectors)
        .context("failed to fit scoring engine")?;

    let mut players = Vec::with_capacity(population.len());
    for (name, values) in &population {
        let card = engine.score(values)?;
        players.push(ScoredPlayer {
            name: name.clone(),
            scores: card.per_stat,
            aggregate: card.aggregate,
        });
    }
    players.sort_by(|a, b| {
        b.aggregate
            .partial_cmp(&a.aggregate)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let report = ScoreReport {
        position: position.to_string(),
        min_mins,
        statistics: engine.names().to_vec(),
        players,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_table(&report);
    }
    Ok(())
}

fn print_table(report: &ScoreReport) {
    print!("{:<4} {:<28} {:>9}", "#", "Name", "Total");
    for name in &report.statistics {
        print!(" {:>9}", truncate(name, 9));
    }
    println!();
    for (i, player) in report.players.iter().enumerate() {
        print!(
            "{:<4} {:<28} {:>9.2}",
            i + 1,
            truncate(&player.name, 28),
            player.aggregate
        );
        for score in &player.scores {
            print!(" {score:>9.2}");
        }
        println!();
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((i, _)) => &s[..i],
        None => s,
    }
}
