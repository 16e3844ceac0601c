use std::borrow::Cow;

use crate::error::{ConfigError, ScoreError};
use crate::machine::ExecutionResult;
use crate::objective::Objective;

/// Count of leading positions at which `a` and `b` agree.
pub fn common_prefix_length(a: &[u8], b: &[u8]) -> usize {
    a.iter().zip(b).take_while(|(x, y)| x == y).count()
}

/// Trim or zero-pad `output` to exactly `len` bytes.
pub fn fit_to_length(output: &[u8], len: usize) -> Cow<'_, [u8]> {
    if output.len() >= len {
        Cow::Borrowed(&output[..len])
    } else {
        let mut padded = output.to_vec();
        padded.resize(len, 0);
        Cow::Owned(padded)
    }
}

/// Fraction of differing bits between two equal-length buffers, in [0, 1].
///
/// Empty buffers are at distance 0.
pub fn hamming_distance(a: &[u8], b: &[u8]) -> Result<f64, ScoreError> {
    if a.len() != b.len() {
        return Err(ScoreError::LengthMismatch {
            left: a.len(),
            right: b.len(),
        });
    }
    if a.is_empty() {
        return Ok(0.0);
    }
    let differing: u32 = a.iter().zip(b).map(|(x, y)| (x ^ y).count_ones()).sum();
    Ok(differing as f64 / (a.len() * 8) as f64)
}

/// Relative weights of the signals blended by [`normalized_score`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScoreWeights {
    /// Common-prefix length over expected length.
    pub prefix: f64,
    /// Input bytes consumed over input length.
    pub input: f64,
    /// Output bytes produced over expected length.
    pub output: f64,
    /// One minus the normalized Hamming distance. Off by default.
    pub hamming: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            prefix: 0.8,
            input: 0.1,
            output: 0.1,
            hamming: 0.0,
        }
    }
}

impl ScoreWeights {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let all = [self.prefix, self.input, self.output, self.hamming];
        if all.iter().any(|w| !w.is_finite() || *w < 0.0) || self.total() <= 0.0 {
            return Err(ConfigError::InvalidWeights);
        }
        Ok(())
    }

    fn total(&self) -> f64 {
        self.prefix + self.input + self.output + self.hamming
    }
}

/// Blend prefix match, input consumption and output completeness into a
/// value in [0, 1].
///
/// `produced` must already be fitted to the expected length.
pub fn normalized_score(
    objective: &Objective,
    produced: &[u8],
    result: &ExecutionResult,
    weights: &ScoreWeights,
) -> Result<f64, ScoreError> {
    let expected = objective.expected();
    let expected_len = expected.len() as f64;
    let prefix = common_prefix_length(expected, produced) as f64 / expected_len;
    let input = (result.input_consumed as f64 / objective.input().len() as f64).min(1.0);
    let output = (result.output_produced as f64 / expected_len).min(1.0);

    let mut score = weights.prefix * prefix + weights.input * input + weights.output * output;
    if weights.hamming > 0.0 {
        score += weights.hamming * (1.0 - hamming_distance(expected, produced)?);
    }
    Ok(score / weights.total())
}

/// Turns an execution into a fitness value.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum Scorer {
    /// Raw common-prefix length.
    #[default]
    CommonPrefix,
    /// Weighted blend from [`normalized_score`].
    Normalized(ScoreWeights),
}

impl Scorer {
    /// Value used to order two candidates on the same objective.
    ///
    /// `output` is the raw output buffer; it is fitted to the expected
    /// length here.
    pub fn fitness(&self, objective: &Objective, output: &[u8], result: &ExecutionResult) -> f64 {
        match self {
            Scorer::CommonPrefix => {
                let produced = fit_to_length(output, objective.expected().len());
                common_prefix_length(objective.expected(), &produced) as f64
            }
            Scorer::Normalized(_) => self.unit_score(objective, output, result),
        }
    }

    /// The same signal as [`Scorer::fitness`], mapped to [0, 1].
    pub fn unit_score(&self, objective: &Objective, output: &[u8], result: &ExecutionResult) -> f64 {
        let expected = objective.expected();
        let produced = fit_to_length(output, expected.len());
        match self {
            Scorer::CommonPrefix => {
                common_prefix_length(expected, &produced) as f64 / expected.len() as f64
            }
            // Both sides have the expected length, so the Hamming term cannot fail.
            Scorer::Normalized(weights) => {
                normalized_score(objective, &produced, result, weights).unwrap_or(0.0)
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        match self {
            Scorer::CommonPrefix => Ok(()),
            Scorer::Normalized(weights) => weights.validate(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn objective(input: &[u8], expected: &[u8]) -> Objective {
        Objective::new(input.to_vec(), expected.to_vec()).unwrap()
    }

    #[test]
    fn test_common_prefix_length() {
        assert_eq!(common_prefix_length(b"hola", b"hola"), 4);
        assert_eq!(common_prefix_length(b"hola", b"hoja"), 2);
        assert_eq!(common_prefix_length(b"hola", b"xola"), 0);
        assert_eq!(common_prefix_length(b"hola", b"ho"), 2);
        assert_eq!(common_prefix_length(b"", b"hola"), 0);
    }

    #[test]
    fn test_early_mismatch_caps_prefix() {
        // Agreement after the first mismatch is not counted.
        assert_eq!(common_prefix_length(b"abcdef", b"aXcdef"), 1);
    }

    #[test]
    fn test_fit_to_length() {
        assert_eq!(&*fit_to_length(b"abcdef", 3), b"abc");
        assert_eq!(&*fit_to_length(b"ab", 4), &[b'a', b'b', 0, 0]);
        assert!(matches!(fit_to_length(b"abc", 3), Cow::Borrowed(_)));
    }

    #[test]
    fn test_hamming_distance() {
        assert_eq!(hamming_distance(&[0x00], &[0xff]).unwrap(), 1.0);
        assert_eq!(hamming_distance(&[0x0f, 0x00], &[0x00, 0x00]).unwrap(), 0.25);
        assert_eq!(hamming_distance(b"same", b"same").unwrap(), 0.0);
        assert_eq!(hamming_distance(&[], &[]).unwrap(), 0.0);
    }

    #[test]
    fn test_hamming_distance_unequal_lengths() {
        assert_eq!(
            hamming_distance(b"abc", b"ab"),
            Err(ScoreError::LengthMismatch { left: 3, right: 2 })
        );
    }

    #[test]
    fn test_normalized_score_partial_credit() {
        let obj = objective(b"hello", b"hola");
        let result = ExecutionResult {
            cycles: 10,
            input_consumed: 5,
            output_produced: 4,
        };
        // Process signals full, no matching bytes.
        let score = normalized_score(&obj, b"xxxx", &result, &ScoreWeights::default()).unwrap();
        assert!((score - 0.2).abs() < 1e-12);
        // Everything right.
        let score = normalized_score(&obj, b"hola", &result, &ScoreWeights::default()).unwrap();
        assert!((score - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_normalized_score_caps_ratios() {
        let obj = objective(b"hi", b"ab");
        let result = ExecutionResult {
            cycles: 10,
            input_consumed: 2,
            output_produced: 50,
        };
        let score = normalized_score(&obj, b"ab", &result, &ScoreWeights::default()).unwrap();
        assert!(score <= 1.0);
    }

    #[test]
    fn test_normalized_score_with_hamming() {
        let obj = objective(b"x", &[0x00]);
        let weights = ScoreWeights {
            prefix: 0.0,
            input: 0.0,
            output: 0.0,
            hamming: 1.0,
        };
        let result = ExecutionResult::default();
        let score = normalized_score(&obj, &[0x0f], &result, &weights).unwrap();
        assert!((score - 0.5).abs() < 1e-12);
        assert!(normalized_score(&obj, &[0, 0], &result, &weights).is_err());
    }

    #[test]
    fn test_weights_validation() {
        assert!(ScoreWeights::default().validate().is_ok());
        let zero = ScoreWeights {
            prefix: 0.0,
            input: 0.0,
            output: 0.0,
            hamming: 0.0,
        };
        assert_eq!(zero.validate(), Err(ConfigError::InvalidWeights));
        let negative = ScoreWeights {
            prefix: -1.0,
            ..Default::default()
        };
        assert_eq!(negative.validate(), Err(ConfigError::InvalidWeights));
    }

    #[test]
    fn test_scorer_fitness_trims_output() {
        let obj = objective(b"A", b"AB");
        let result = ExecutionResult::default();
        assert_eq!(Scorer::CommonPrefix.fitness(&obj, b"ABCDEF", &result), 2.0);
        assert_eq!(Scorer::CommonPrefix.fitness(&obj, b"A", &result), 1.0);
        assert_eq!(Scorer::CommonPrefix.unit_score(&obj, b"A", &result), 0.5);
    }

    #[test]
    fn test_normalized_scorer_in_unit_range() {
        let obj = objective(b"A", b"AB");
        let result = ExecutionResult {
            cycles: 3,
            input_consumed: 1,
            output_produced: 2,
        };
        let scorer = Scorer::Normalized(ScoreWeights::default());
        let fitness = scorer.fitness(&obj, b"AB", &result);
        assert!((fitness - 1.0).abs() < 1e-12);
        assert_eq!(fitness, scorer.unit_score(&obj, b"AB", &result));
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn prefix_bounded_and_exact_on_equality(
            pair in (0usize..64).prop_flat_map(|n| (
                prop::collection::vec(any::<u8>(), n),
                prop::collection::vec(any::<u8>(), n),
            ))
        ) {
            let (a, b) = pair;
            let prefix = common_prefix_length(&a, &b);
            prop_assert!(prefix <= a.len());
            prop_assert_eq!(prefix == a.len(), a == b);
        }

        #[test]
        fn hamming_rejects_unequal_lengths(
            a in prop::collection::vec(any::<u8>(), 0..32),
            b in prop::collection::vec(any::<u8>(), 0..32),
        ) {
            prop_assume!(a.len() != b.len());
            prop_assert!(hamming_distance(&a, &b).is_err());
        }

        #[test]
        fn normalized_score_in_unit_range(
            expected in prop::collection::vec(any::<u8>(), 1..32),
            produced in prop::collection::vec(any::<u8>(), 0..64),
            input_len in 1usize..32,
            consumed in 0usize..64,
            written in 0usize..64,
        ) {
            let objective = Objective::new(vec![0; input_len], expected.clone()).unwrap();
            let result = ExecutionResult { cycles: 0, input_consumed: consumed, output_produced: written };
            let score = Scorer::Normalized(ScoreWeights::default()).unit_score(&objective, &produced, &result);
            prop_assert!((0.0..=1.0).contains(&score));
        }
    }
}
