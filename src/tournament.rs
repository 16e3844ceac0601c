use rand::SeedableRng;
use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rayon::prelude::*;

use crate::config::EvolutionConfig;
use crate::error::ConfigError;
use crate::machine::{Machine, Scratch};
use crate::objective::{Objective, ObjectiveSource};
use crate::population::Population;
use crate::reproduction::ReproductionPolicy;
use crate::telemetry::Telemetry;

/// Result of comparing two fitness values.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verdict {
    FirstWins,
    SecondWins,
    Tie,
}

/// Strict comparison of two fitness values. No randomness involved.
pub fn judge(first: f64, second: f64) -> Verdict {
    if first > second {
        Verdict::FirstWins
    } else if second > first {
        Verdict::SecondWins
    } else {
        Verdict::Tie
    }
}

/// Which of two tied candidates to perturb: the one with the shorter win
/// streak, or both when the streaks are equal.
pub fn tie_targets(first_wins: u64, second_wins: u64) -> (bool, bool) {
    (first_wins <= second_wins, second_wins <= first_wins)
}

/// What happened in one tournament round.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RoundOutcome {
    pub first: usize,
    pub second: usize,
    pub first_fitness: f64,
    pub second_fitness: f64,
    pub verdict: Verdict,
}

/// The evolution loop: pairwise tournaments over a population.
///
/// Each round draws an objective and two distinct candidates, runs both on
/// the objective's input, scores them, and lets the winner overwrite the
/// loser through the configured [`ReproductionPolicy`].
pub struct Tournament<O: ObjectiveSource> {
    population: Population,
    config: EvolutionConfig,
    objectives: O,
    policy: Box<dyn ReproductionPolicy>,
    machine: Machine,
    rng: SmallRng,
    /// One scratch per contestant.
    scratch: [Scratch; 2],
    /// Reusable scratch: shuffled candidate order for batches.
    order: Vec<usize>,
    rounds: u64,
}

impl<O: ObjectiveSource> Tournament<O> {
    /// Create a tournament over a freshly randomized population.
    pub fn new(config: EvolutionConfig, objectives: O) -> Result<Self, ConfigError> {
        config.validate()?;
        let mut rng = SmallRng::seed_from_u64(config.seed);
        let population = Population::random(config.population_size, config.program_size, &mut rng)?;
        Self::assemble(config, population, objectives, rng)
    }

    /// Create a tournament over an existing population. The population's
    /// size and program length take precedence over `config`.
    pub fn with_population(
        mut config: EvolutionConfig,
        population: Population,
        objectives: O,
    ) -> Result<Self, ConfigError> {
        config.population_size = population.len();
        config.program_size = population.program_size();
        config.validate()?;
        let rng = SmallRng::seed_from_u64(config.seed);
        Self::assemble(config, population, objectives, rng)
    }

    fn assemble(
        config: EvolutionConfig,
        population: Population,
        objectives: O,
        rng: SmallRng,
    ) -> Result<Self, ConfigError> {
        let scratch = [contestant_scratch(&config), contestant_scratch(&config)];
        Ok(Self {
            order: (0..population.len()).collect(),
            policy: config.reproduction.policy(),
            machine: config.machine(),
            population,
            config,
            objectives,
            rng,
            scratch,
            rounds: 0,
        })
    }

    pub fn population(&self) -> &Population {
        &self.population
    }

    pub fn config(&self) -> &EvolutionConfig {
        &self.config
    }

    /// Rounds completed so far.
    pub fn rounds(&self) -> u64 {
        self.rounds
    }

    /// Run one tournament round.
    pub fn round(&mut self) -> RoundOutcome {
        let objective = self.objectives.sample(&mut self.rng);
        let (first, second) = self.population.sample_pair(&mut self.rng);
        let outcome = duel(
            &self.machine,
            &self.config,
            &self.population,
            objective,
            (first, second),
            &mut self.scratch,
        );
        let offspring = match outcome.verdict {
            Verdict::SecondWins => &self.scratch[1].offspring,
            _ => &self.scratch[0].offspring,
        };
        settle(&mut self.population, &*self.policy, &mut self.rng, &outcome, offspring);
        self.rounds += 1;
        outcome
    }

    /// Run up to `pairs` rounds at once on disjoint candidate pairs.
    ///
    /// Pairs and objectives are drawn sequentially, executions run in
    /// parallel with per-worker scratch, and verdicts are applied one at a
    /// time in draw order. Results depend only on the seed, not on thread
    /// scheduling.
    pub fn run_batch(&mut self, pairs: usize) -> Vec<RoundOutcome> {
        let pairs = pairs.min(self.population.len() / 2);
        if pairs == 0 {
            return Vec::new();
        }

        // --- Phase 1: draw disjoint pairs and their objectives (sequential) ---

        self.order.shuffle(&mut self.rng);
        let objectives = &self.objectives;
        let rng = &mut self.rng;
        let jobs: Vec<((usize, usize), &Objective)> = self
            .order
            .chunks_exact(2)
            .take(pairs)
            .map(move |pair| ((pair[0], pair[1]), objectives.sample(rng)))
            .collect();

        // --- Phase 2: execute all duels in parallel ---

        let machine = self.machine;
        let config = &self.config;
        let population = &self.population;
        let results: Vec<(RoundOutcome, Vec<u8>)> = jobs
            .par_iter()
            .map_init(
                || [contestant_scratch(config), contestant_scratch(config)],
                |scratch, &(pair, objective)| {
                    let outcome = duel(&machine, config, population, objective, pair, scratch);
                    let offspring = match outcome.verdict {
                        Verdict::FirstWins => scratch[0].offspring.clone(),
                        Verdict::SecondWins => scratch[1].offspring.clone(),
                        Verdict::Tie => Vec::new(),
                    };
                    (outcome, offspring)
                },
            )
            .collect();

        // --- Phase 3: apply verdicts (single writer) ---

        let mut outcomes = Vec::with_capacity(results.len());
        for (outcome, offspring) in results {
            settle(&mut self.population, &*self.policy, &mut self.rng, &outcome, &offspring);
            outcomes.push(outcome);
        }
        self.rounds += outcomes.len() as u64;
        outcomes
    }

    /// Run rounds until `limit` rounds have completed, or forever when
    /// `limit` is `None`, sampling telemetry whenever it is due. With
    /// `batch > 1` rounds run in parallel batches of up to `batch` pairs.
    pub fn run(&mut self, limit: Option<u64>, batch: usize, telemetry: &mut Telemetry) {
        loop {
            if telemetry.due() {
                telemetry.sample(self);
            }
            if limit.is_some_and(|limit| self.rounds >= limit) {
                break;
            }
            if batch > 1 {
                let remaining = limit.map_or(batch as u64, |limit| (limit - self.rounds).min(batch as u64));
                self.run_batch(remaining as usize);
            } else {
                self.round();
            }
        }
    }

    /// Mean unit score of `episodes` solo runs on random candidates and
    /// objectives. Reads the population without changing it.
    pub fn sample_fitness(&self, episodes: usize, rng: &mut SmallRng, scratch: &mut Scratch) -> f64 {
        if episodes == 0 {
            return 0.0;
        }
        let mut total = 0.0;
        for _ in 0..episodes {
            let objective = self.objectives.sample(rng);
            let candidate = self.population.get(self.population.sample_one(rng));
            let result = self
                .machine
                .run(&candidate.program, objective.input(), scratch, self.config.offspring_init);
            total += self.config.scorer.unit_score(objective, &scratch.output, &result);
        }
        total / episodes as f64
    }
}

fn contestant_scratch(config: &EvolutionConfig) -> Scratch {
    Scratch::new(config.memory_size, config.output_capacity, config.program_size)
}

/// Run both candidates of a pair on `objective` and compare them. Each
/// contestant's offspring is left in its scratch.
fn duel(
    machine: &Machine,
    config: &EvolutionConfig,
    population: &Population,
    objective: &Objective,
    (first, second): (usize, usize),
    scratch: &mut [Scratch; 2],
) -> RoundOutcome {
    let [first_scratch, second_scratch] = scratch;
    let fitness = |index: usize, scratch: &mut Scratch| {
        let program = &population.get(index).program;
        let result = machine.run(program, objective.input(), scratch, config.offspring_init);
        config.scorer.fitness(objective, &scratch.output, &result)
    };
    let first_fitness = fitness(first, first_scratch);
    let second_fitness = fitness(second, second_scratch);
    RoundOutcome {
        first,
        second,
        first_fitness,
        second_fitness,
        verdict: judge(first_fitness, second_fitness),
    }
}

/// Apply a round's verdict to the population. `winner_offspring` is the
/// winner's offspring buffer; it is ignored on a tie.
fn settle(
    population: &mut Population,
    policy: &dyn ReproductionPolicy,
    rng: &mut SmallRng,
    outcome: &RoundOutcome,
    winner_offspring: &[u8],
) {
    match outcome.verdict {
        Verdict::FirstWins => {
            let (winner, loser) = population.pair_mut(outcome.first, outcome.second);
            winner.consecutive_wins += 1;
            loser.consecutive_wins = 0;
            policy.reproduce(winner, loser, winner_offspring, rng);
        }
        Verdict::SecondWins => {
            let (winner, loser) = population.pair_mut(outcome.second, outcome.first);
            winner.consecutive_wins += 1;
            loser.consecutive_wins = 0;
            policy.reproduce(winner, loser, winner_offspring, rng);
        }
        Verdict::Tie => {
            let (first, second) = population.pair_mut(outcome.first, outcome.second);
            let (perturb_first, perturb_second) = tie_targets(first.consecutive_wins, second.consecutive_wins);
            if perturb_first {
                policy.perturb(first, rng);
            }
            if perturb_second {
                policy.perturb(second, rng);
            }
        }
    }
}
