use std::io::Write;
use std::time::Instant;

use rand::SeedableRng;
use rand::rngs::SmallRng;
use rand::seq::index;
use tracing::{debug, info, warn};

use crate::chart::render_svg;
use crate::config::{EvolutionConfig, TelemetryConfig};
use crate::error::TelemetryError;
use crate::machine::Scratch;
use crate::metrics::PopulationStats;
use crate::objective::ObjectiveSource;
use crate::server::StatusBoard;
use crate::tournament::Tournament;

/// Programs examined for the diversity log line.
const STATS_SUBSAMPLE: usize = 256;

/// One point of the fitness series.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Sample {
    /// Tournament rounds completed when the sample was taken.
    pub iteration: u64,
    /// Mean solo score, in [0, 1].
    pub fitness: f64,
}

/// Append-only fitness series, strictly increasing in iteration.
#[derive(Clone, Debug, Default)]
pub struct History {
    samples: Vec<Sample>,
}

impl History {
    pub fn push(&mut self, sample: Sample) -> Result<(), TelemetryError> {
        if !(0.0..=1.0).contains(&sample.fitness) {
            return Err(TelemetryError::FitnessOutOfRange(sample.fitness));
        }
        if let Some(last) = self.samples.last() {
            if sample.iteration <= last.iteration {
                return Err(TelemetryError::NonMonotonic {
                    previous: last.iteration,
                    next: sample.iteration,
                });
            }
        }
        self.samples.push(sample);
        Ok(())
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Receives every accepted sample along with the full history.
pub trait TelemetrySink: Send {
    fn record(&mut self, sample: &Sample, history: &History) -> Result<(), TelemetryError>;
}

/// Logs each sample.
pub struct LogSink;

impl TelemetrySink for LogSink {
    fn record(&mut self, sample: &Sample, _history: &History) -> Result<(), TelemetryError> {
        info!(tournaments = sample.iteration, fitness = sample.fitness, "fitness sample");
        Ok(())
    }
}

/// Writes `tournaments,fitness` CSV rows, header first.
pub struct CsvSink<W: Write + Send> {
    out: W,
    wrote_header: bool,
}

impl<W: Write + Send> CsvSink<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            wrote_header: false,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl CsvSink<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write + Send> TelemetrySink for CsvSink<W> {
    fn record(&mut self, sample: &Sample, _history: &History) -> Result<(), TelemetryError> {
        if !self.wrote_header {
            writeln!(self.out, "tournaments,fitness")?;
            self.wrote_header = true;
        }
        writeln!(self.out, "{},{:.6}", sample.iteration, sample.fitness)?;
        self.out.flush()?;
        Ok(())
    }
}

/// Renders the whole history as a chart and publishes it to a
/// [`StatusBoard`].
pub struct ChartSink {
    board: StatusBoard,
    width: u32,
    height: u32,
}

impl ChartSink {
    /// Publishes an empty chart straight away so the board never serves
    /// nothing.
    pub fn new(board: StatusBoard, width: u32, height: u32) -> Self {
        board.publish(render_svg(&[], width, height).into_bytes());
        Self { board, width, height }
    }
}

impl TelemetrySink for ChartSink {
    fn record(&mut self, _sample: &Sample, history: &History) -> Result<(), TelemetryError> {
        let svg = render_svg(history.samples(), self.width, self.height);
        self.board.publish(svg.into_bytes());
        Ok(())
    }
}

/// Periodic, wall-clock driven fitness sampling.
///
/// Sampling uses its own RNG and scratch buffers, so it neither perturbs
/// the tournament's random stream nor touches the population.
pub struct Telemetry {
    config: TelemetryConfig,
    history: History,
    sinks: Vec<Box<dyn TelemetrySink>>,
    rng: SmallRng,
    scratch: Scratch,
    last: Instant,
}

impl Telemetry {
    pub fn new(config: TelemetryConfig, evolution: &EvolutionConfig) -> Self {
        Self {
            config,
            history: History::default(),
            sinks: Vec::new(),
            rng: SmallRng::seed_from_u64(evolution.seed.wrapping_add(1)),
            scratch: Scratch::new(evolution.memory_size, evolution.output_capacity, evolution.program_size),
            last: Instant::now(),
        }
    }

    pub fn with_sink(mut self, sink: impl TelemetrySink + 'static) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    /// Whether the sampling interval has elapsed since the last sample.
    pub fn due(&self) -> bool {
        self.last.elapsed() >= self.config.interval
    }

    /// Take a sample now: run the configured number of solo episodes, log
    /// population diversity, and hand the result to every sink.
    ///
    /// Returns `None` without sampling when no round has completed since the
    /// previous sample.
    pub fn sample<O: ObjectiveSource>(&mut self, tournament: &Tournament<O>) -> Option<Sample> {
        self.last = Instant::now();
        if self.history.samples().last().is_some_and(|s| s.iteration == tournament.rounds()) {
            return None;
        }
        let fitness = tournament.sample_fitness(self.config.episodes, &mut self.rng, &mut self.scratch);
        let sample = Sample {
            iteration: tournament.rounds(),
            fitness,
        };

        let population = tournament.population();
        let indices = index::sample(&mut self.rng, population.len(), STATS_SUBSAMPLE.min(population.len())).into_vec();
        let stats = PopulationStats::measure(population, &indices);
        debug!(
            sampled = stats.sampled,
            unique = stats.unique,
            hoe = stats.hoe,
            halt_fraction = stats.halt_fraction,
            max_streak = stats.max_streak,
            mean_streak = stats.mean_streak,
            "population diversity"
        );

        self.record(sample);
        Some(sample)
    }

    /// Append `sample` and forward it to the sinks. Failures are logged and
    /// dropped.
    pub fn record(&mut self, sample: Sample) {
        if let Err(err) = self.history.push(sample) {
            warn!("dropping telemetry sample: {err}");
            return;
        }
        for sink in &mut self.sinks {
            if let Err(err) = sink.record(&sample, &self.history) {
                warn!("telemetry sink failed: {err}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::machine::opcode::*;
    use crate::objective::{Objective, ScriptedObjectives};
    use crate::population::Population;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    /// Sink that remembers what it saw.
    struct Recorder(Arc<Mutex<Vec<Sample>>>);

    impl TelemetrySink for Recorder {
        fn record(&mut self, sample: &Sample, _history: &History) -> Result<(), TelemetryError> {
            self.0.lock().unwrap().push(*sample);
            Ok(())
        }
    }

    /// Sink that always fails.
    struct Broken;

    impl TelemetrySink for Broken {
        fn record(&mut self, _sample: &Sample, _history: &History) -> Result<(), TelemetryError> {
            Err(TelemetryError::Io(std::io::Error::other("disk full")))
        }
    }

    fn tournament() -> Tournament<ScriptedObjectives> {
        let echo = vec![READ_INPUT, WRITE_OUTPUT, HALT, 0, 0, 0, 0, 0];
        let silent = vec![HALT; 8];
        let population = Population::from_programs(vec![echo, silent.clone(), silent.clone(), silent]).unwrap();
        let objectives = ScriptedObjectives::single(Objective::new(vec![0x41], vec![0x41]).unwrap());
        let config = EvolutionConfig {
            memory_size: 8,
            output_capacity: 8,
            cycle_limit: 64,
            ..Default::default()
        };
        Tournament::with_population(config, population, objectives).unwrap()
    }

    #[test]
    fn test_history_rejects_out_of_range() {
        let mut history = History::default();
        assert!(matches!(
            history.push(Sample { iteration: 1, fitness: 1.5 }),
            Err(TelemetryError::FitnessOutOfRange(_))
        ));
        assert!(matches!(
            history.push(Sample { iteration: 1, fitness: f64::NAN }),
            Err(TelemetryError::FitnessOutOfRange(_))
        ));
        assert!(history.is_empty());
    }

    #[test]
    fn test_history_rejects_going_backwards() {
        let mut history = History::default();
        history.push(Sample { iteration: 10, fitness: 0.5 }).unwrap();
        assert!(matches!(
            history.push(Sample { iteration: 10, fitness: 0.6 }),
            Err(TelemetryError::NonMonotonic { previous: 10, next: 10 })
        ));
        assert!(matches!(
            history.push(Sample { iteration: 9, fitness: 0.5 }),
            Err(TelemetryError::NonMonotonic { previous: 10, next: 9 })
        ));
        history.push(Sample { iteration: 11, fitness: 0.6 }).unwrap();
        assert_eq!(history.len(), 2);
    }

    #[test]
    fn test_sample_after_rounds_appends_one_point() {
        let mut tournament = tournament();
        for _ in 0..5 {
            tournament.round();
        }
        let config = TelemetryConfig {
            interval: Duration::from_secs(3600),
            episodes: 5,
        };
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut telemetry = Telemetry::new(config, tournament.config()).with_sink(Recorder(seen.clone()));
        let before = tournament.population().candidates().to_vec();

        let sample = telemetry.sample(&tournament).unwrap();

        assert_eq!(telemetry.history().samples(), &[sample]);
        assert_eq!(sample.iteration, 5);
        assert!((0.0..=1.0).contains(&sample.fitness));
        assert_eq!(*seen.lock().unwrap(), vec![sample]);
        assert_eq!(tournament.population().candidates(), &before[..]);
        assert!(!telemetry.due());
    }

    #[test]
    fn test_no_repeat_sample_without_progress() {
        let mut tournament = tournament();
        let config = TelemetryConfig {
            interval: Duration::ZERO,
            episodes: 2,
        };
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut telemetry = Telemetry::new(config, tournament.config()).with_sink(Recorder(seen.clone()));

        assert!(telemetry.sample(&tournament).is_some());
        assert!(telemetry.due());
        assert_eq!(telemetry.sample(&tournament), None);
        tournament.round();
        assert_eq!(telemetry.sample(&tournament).map(|s| s.iteration), Some(1));

        let iterations: Vec<u64> = seen.lock().unwrap().iter().map(|s| s.iteration).collect();
        assert_eq!(iterations, vec![0, 1]);
    }

    #[test]
    fn test_due_after_interval() {
        let tournament = tournament();
        let config = TelemetryConfig {
            interval: Duration::ZERO,
            episodes: 1,
        };
        let telemetry = Telemetry::new(config, tournament.config());
        assert!(telemetry.due());
    }

    #[test]
    fn test_failing_sink_does_not_stop_others() {
        let tournament = tournament();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut telemetry = Telemetry::new(TelemetryConfig::default(), tournament.config())
            .with_sink(Broken)
            .with_sink(Recorder(seen.clone()));
        telemetry.sample(&tournament);
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_csv_sink() {
        let mut sink = CsvSink::new(Vec::new());
        let history = History::default();
        sink.record(&Sample { iteration: 0, fitness: 0.25 }, &history).unwrap();
        sink.record(&Sample { iteration: 7, fitness: 0.5 }, &history).unwrap();
        let text = String::from_utf8(sink.into_inner()).unwrap();
        assert_eq!(text, "tournaments,fitness\n0,0.250000\n7,0.500000\n");
    }

    #[test]
    fn test_chart_sink_publishes() {
        let board = StatusBoard::default();
        let mut sink = ChartSink::new(board.clone(), 320, 240);
        assert!(board.snapshot().starts_with(b"<svg"));
        let mut history = History::default();
        let sample = Sample { iteration: 3, fitness: 0.5 };
        history.push(sample).unwrap();
        sink.record(&sample, &history).unwrap();
        let svg = String::from_utf8(board.snapshot()).unwrap();
        assert_eq!(svg.matches("<circle").count(), 1);
    }
}
