use std::time::Duration;

use crate::error::ConfigError;
use crate::machine::{Machine, OffspringInit};
use crate::reproduction::ReproductionKind;
use crate::score::Scorer;

/// Configuration for a tournament run. Fixed for the whole run.
#[derive(Clone, Debug)]
pub struct EvolutionConfig {
    /// Number of candidates in the population.
    pub population_size: usize,
    /// Bytes per program (and per offspring buffer).
    pub program_size: usize,
    /// Bytes of working memory per execution.
    pub memory_size: usize,
    /// Output buffer capacity per execution.
    pub output_capacity: usize,
    /// Maximum instructions per execution.
    pub cycle_limit: usize,
    /// Wrap the program counter instead of halting past the last byte.
    pub wrap_program_counter: bool,
    /// RNG seed.
    pub seed: u64,
    pub reproduction: ReproductionKind,
    pub offspring_init: OffspringInit,
    pub scorer: Scorer,
}

impl Default for EvolutionConfig {
    fn default() -> Self {
        Self {
            population_size: 100_000,
            program_size: 4096,
            memory_size: 4096,
            output_capacity: 4096,
            cycle_limit: 100_000,
            wrap_program_counter: false,
            seed: 12345,
            reproduction: ReproductionKind::default(),
            offspring_init: OffspringInit::default(),
            scorer: Scorer::default(),
        }
    }
}

impl EvolutionConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.population_size < 2 {
            return Err(ConfigError::PopulationTooSmall(self.population_size));
        }
        if self.program_size == 0 {
            return Err(ConfigError::ZeroProgramSize);
        }
        if self.memory_size == 0 {
            return Err(ConfigError::ZeroMemorySize);
        }
        if self.output_capacity == 0 {
            return Err(ConfigError::ZeroOutputCapacity);
        }
        if self.cycle_limit == 0 {
            return Err(ConfigError::ZeroCycleLimit);
        }
        self.scorer.validate()
    }

    pub fn machine(&self) -> Machine {
        Machine {
            cycle_limit: self.cycle_limit,
            wrap_program_counter: self.wrap_program_counter,
        }
    }
}

/// Configuration for periodic fitness sampling.
#[derive(Clone, Debug)]
pub struct TelemetryConfig {
    /// Wall-clock time between samples.
    pub interval: Duration,
    /// Solo episodes averaged per sample.
    pub episodes: usize,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            episodes: 100,
        }
    }
}

impl TelemetryConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.episodes == 0 {
            return Err(ConfigError::ZeroEpisodes);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::score::ScoreWeights;

    #[test]
    fn test_default_is_valid() {
        assert_eq!(EvolutionConfig::default().validate(), Ok(()));
        assert_eq!(TelemetryConfig::default().validate(), Ok(()));
    }

    #[test]
    fn test_rejects_degenerate_sizes() {
        let cases = [
            (
                EvolutionConfig {
                    population_size: 1,
                    ..Default::default()
                },
                ConfigError::PopulationTooSmall(1),
            ),
            (
                EvolutionConfig {
                    program_size: 0,
                    ..Default::default()
                },
                ConfigError::ZeroProgramSize,
            ),
            (
                EvolutionConfig {
                    memory_size: 0,
                    ..Default::default()
                },
                ConfigError::ZeroMemorySize,
            ),
            (
                EvolutionConfig {
                    output_capacity: 0,
                    ..Default::default()
                },
                ConfigError::ZeroOutputCapacity,
            ),
            (
                EvolutionConfig {
                    cycle_limit: 0,
                    ..Default::default()
                },
                ConfigError::ZeroCycleLimit,
            ),
        ];
        for (config, expected) in cases {
            assert_eq!(config.validate(), Err(expected));
        }
    }

    #[test]
    fn test_rejects_bad_weights() {
        let config = EvolutionConfig {
            scorer: Scorer::Normalized(ScoreWeights {
                prefix: f64::NAN,
                ..Default::default()
            }),
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::InvalidWeights));
    }

    #[test]
    fn test_zero_episodes() {
        let config = TelemetryConfig {
            episodes: 0,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::ZeroEpisodes));
    }
}
