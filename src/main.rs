use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use clap::{Parser, ValueEnum};
use evotrans::config::{EvolutionConfig, TelemetryConfig};
use evotrans::error::{ConfigError, CorpusError};
use evotrans::machine::OffspringInit;
use evotrans::objective::TranslationCorpus;
use evotrans::reproduction::ReproductionKind;
use evotrans::score::{ScoreWeights, Scorer};
use evotrans::server::{self, StatusBoard};
use evotrans::telemetry::{ChartSink, CsvSink, LogSink, Telemetry};
use evotrans::tournament::Tournament;
use thiserror::Error;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "evotrans", about = "Evolve byte programs that translate text, by tournament selection")]
struct Cli {
    /// Tab-separated translation pairs, one file per direction. Repeatable.
    #[arg(long = "data", required = true)]
    data: Vec<PathBuf>,

    /// Random seed for reproducibility.
    #[arg(long, default_value_t = 12345)]
    seed: u64,

    /// Number of candidates in the population.
    #[arg(long, default_value_t = 100_000)]
    population_size: usize,

    /// Bytes per program.
    #[arg(long, default_value_t = 4096)]
    program_size: usize,

    /// Bytes of working memory per execution.
    #[arg(long, default_value_t = 4096)]
    memory_size: usize,

    /// Output buffer capacity per execution.
    #[arg(long, default_value_t = 4096)]
    output_size: usize,

    /// Max instructions per execution.
    #[arg(long, default_value_t = 100_000)]
    cycle_limit: usize,

    /// Wrap the program counter instead of halting past the last byte.
    #[arg(long)]
    wrap_program_counter: bool,

    /// How a winner replaces a loser.
    #[arg(long, value_enum, default_value_t = ReproductionKind::SelfModification)]
    reproduction: ReproductionKind,

    /// How the offspring buffer starts out before each execution.
    #[arg(long, value_enum, default_value_t = OffspringInit::Program)]
    offspring_init: OffspringInit,

    /// Fitness function.
    #[arg(long, value_enum, default_value_t = ScorerArg::Prefix)]
    scorer: ScorerArg,

    /// Weight of the Hamming-distance term. Requires `--scorer normalized`.
    #[arg(long)]
    hamming_weight: Option<f64>,

    /// Stop after this many tournament rounds (default: run forever).
    #[arg(long)]
    rounds: Option<u64>,

    /// Disjoint pairs evaluated in parallel per step (1 = sequential).
    #[arg(long, default_value_t = 1)]
    batch: usize,

    /// Worker threads for parallel batches (default: one per core).
    #[arg(long)]
    threads: Option<usize>,

    /// Milliseconds between fitness samples.
    #[arg(long, default_value_t = 1000)]
    telemetry_interval_ms: u64,

    /// Solo episodes averaged per fitness sample.
    #[arg(long, default_value_t = 100)]
    telemetry_episodes: usize,

    /// Address of the status page.
    #[arg(long, default_value = "127.0.0.1:8080")]
    listen: SocketAddr,

    /// Do not start the status page.
    #[arg(long)]
    no_server: bool,

    /// Run in benchmark mode: no telemetry, print throughput stats.
    /// Requires --rounds.
    #[arg(long, requires = "rounds")]
    benchmark: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum ScorerArg {
    /// Common-prefix length.
    Prefix,
    /// Prefix match blended with input and output completeness.
    Normalized,
}

#[derive(Debug, Error)]
enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Corpus(#[from] CorpusError),
    #[error("failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();
    if let Err(err) = run(cli) {
        error!("{err}");
        std::process::exit(1);
    }
}

impl Cli {
    fn scorer(&self) -> Result<Scorer, ConfigError> {
        match (self.scorer, self.hamming_weight) {
            (ScorerArg::Prefix, None) => Ok(Scorer::CommonPrefix),
            (ScorerArg::Prefix, Some(_)) => Err(ConfigError::HammingWithoutNormalized),
            (ScorerArg::Normalized, hamming) => Ok(Scorer::Normalized(ScoreWeights {
                hamming: hamming.unwrap_or(0.0),
                ..Default::default()
            })),
        }
    }
}

fn run(cli: Cli) -> Result<(), StartupError> {
    let scorer = cli.scorer()?;
    let config = EvolutionConfig {
        population_size: cli.population_size,
        program_size: cli.program_size,
        memory_size: cli.memory_size,
        output_capacity: cli.output_size,
        cycle_limit: cli.cycle_limit,
        wrap_program_counter: cli.wrap_program_counter,
        seed: cli.seed,
        reproduction: cli.reproduction,
        offspring_init: cli.offspring_init,
        scorer,
    };
    let telemetry_config = TelemetryConfig {
        interval: Duration::from_millis(cli.telemetry_interval_ms),
        episodes: cli.telemetry_episodes,
    };
    config.validate()?;
    telemetry_config.validate()?;

    if let Some(threads) = cli.threads {
        rayon::ThreadPoolBuilder::new().num_threads(threads).build_global()?;
    }

    let corpus = TranslationCorpus::load(&cli.data)?;
    info!(
        pairs = corpus.len(),
        directions = corpus.directions().len(),
        population = config.population_size,
        program_size = config.program_size,
        reproduction = ?config.reproduction,
        offspring_init = ?config.offspring_init,
        "starting evolution"
    );
    let mut tournament = Tournament::new(config, corpus)?;

    if cli.benchmark {
        // `requires = "rounds"` guarantees a bound.
        run_benchmark(&mut tournament, cli.rounds.unwrap_or(0), cli.batch);
        return Ok(());
    }

    let mut telemetry = Telemetry::new(telemetry_config, tournament.config())
        .with_sink(LogSink)
        .with_sink(CsvSink::stdout());
    if !cli.no_server {
        let board = StatusBoard::default();
        telemetry = telemetry.with_sink(ChartSink::new(board.clone(), 1280, 720));
        server::spawn(cli.listen, board);
    }

    telemetry.sample(&tournament);
    tournament.run(cli.rounds, cli.batch, &mut telemetry);
    telemetry.sample(&tournament);
    Ok(())
}

fn run_benchmark(tournament: &mut Tournament<TranslationCorpus>, rounds: u64, batch: usize) {
    let pop_size = tournament.population().len();

    let start = Instant::now();
    while tournament.rounds() < rounds {
        if batch > 1 {
            let remaining = (rounds - tournament.rounds()).min(batch as u64);
            tournament.run_batch(remaining as usize);
        } else {
            tournament.round();
        }
    }
    let elapsed = start.elapsed();

    eprintln!("Benchmark results:");
    eprintln!("  Rounds:            {rounds}");
    eprintln!("  Population size:   {pop_size}");
    eprintln!("  Batch:             {batch}");
    eprintln!("  Elapsed:           {elapsed:.2?}");
    match per_second(rounds, elapsed) {
        Some(rounds_per_sec) => {
            eprintln!("  Rounds/sec:        {rounds_per_sec:.1}");
            eprintln!("  Executions/sec:    {:.0}", 2.0 * rounds_per_sec);
        }
        None => eprintln!("  Rounds/sec:        n/a (nothing measured)"),
    }
}

/// `count / elapsed`, or `None` when there is nothing to measure.
fn per_second(count: u64, elapsed: Duration) -> Option<f64> {
    if count == 0 || elapsed.is_zero() {
        return None;
    }
    Some(count as f64 / elapsed.as_secs_f64())
}
