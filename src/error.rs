use std::path::PathBuf;

use thiserror::Error;

/// Invalid run configuration. Always fatal at startup.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("population must hold at least two candidates, got {0}")]
    PopulationTooSmall(usize),
    #[error("program size must be non-zero")]
    ZeroProgramSize,
    #[error("memory size must be non-zero")]
    ZeroMemorySize,
    #[error("output capacity must be non-zero")]
    ZeroOutputCapacity,
    #[error("cycle limit must be non-zero")]
    ZeroCycleLimit,
    #[error("program {index} has length {actual}, expected {expected}")]
    ProgramLength {
        index: usize,
        expected: usize,
        actual: usize,
    },
    #[error("score weights must be non-negative with a positive sum")]
    InvalidWeights,
    #[error("telemetry needs at least one episode per sample")]
    ZeroEpisodes,
    #[error("a hamming weight only applies to the normalized scorer")]
    HammingWithoutNormalized,
}

/// Scorer precondition violations.
#[derive(Debug, Error, PartialEq)]
pub enum ScoreError {
    #[error("hamming distance needs equal-length buffers, got {left} and {right}")]
    LengthMismatch { left: usize, right: usize },
}

/// Failures building an objective source.
#[derive(Debug, Error)]
pub enum CorpusError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("{0} contains no usable translation pairs")]
    NoPairs(String),
    #[error("objective input must not be empty")]
    EmptyInput,
    #[error("objective expected output must not be empty")]
    EmptyExpected,
    #[error("an objective source needs at least one objective")]
    NoObjectives,
}

/// Telemetry and status-endpoint failures. Never propagated into the
/// evolution loop.
#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("sample iteration {next} does not follow {previous}")]
    NonMonotonic { previous: u64, next: u64 },
    #[error("fitness {0} is outside [0, 1]")]
    FitnessOutOfRange(f64),
    #[error("telemetry output failed: {0}")]
    Io(#[from] std::io::Error),
}
