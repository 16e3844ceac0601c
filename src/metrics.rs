use std::collections::HashSet;

use crate::machine::MAX_INSTRUCTION;
use crate::population::Population;

/// Compute the high-order entropy (HOE) of a byte slice.
///
/// HOE = compressed_size / raw_size, where compression uses brotli at quality 2.
/// This approximates the normalized Kolmogorov complexity of the data.
///
/// Returns a value typically between 0 and 1, where:
/// - ~1.0 means the data is incompressible (random)
/// - <<1.0 means the data is highly structured/repetitive
///
/// Random opcode streams sit well below 1.0, since only 19 of 256 byte
/// values occur.
pub fn high_order_entropy(data: &[u8]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }

    let mut compressed = Vec::new();
    let params = brotli::enc::BrotliEncoderParams {
        quality: 2,
        ..Default::default()
    };
    if brotli::BrotliCompress(&mut &data[..], &mut compressed, &params).is_err() {
        return 0.0;
    }

    compressed.len() as f64 / data.len() as f64
}

/// Count the number of distinct programs.
pub fn unique_program_count(programs: &[&[u8]]) -> usize {
    let set: HashSet<&[u8]> = programs.iter().copied().collect();
    set.len()
}

/// Count occurrences of each opcode across `programs`. The final bucket
/// collects every byte that is not an instruction.
pub fn opcode_histogram(programs: &[&[u8]]) -> [usize; MAX_INSTRUCTION as usize + 1] {
    let mut hist = [0usize; MAX_INSTRUCTION as usize + 1];
    for prog in programs {
        for &b in prog.iter() {
            hist[(b as usize).min(MAX_INSTRUCTION as usize)] += 1;
        }
    }
    hist
}

/// Diversity snapshot of a subsample of the population.
#[derive(Clone, Debug, PartialEq)]
pub struct PopulationStats {
    /// Programs examined.
    pub sampled: usize,
    /// Distinct programs among those examined.
    pub unique: usize,
    /// HOE of the examined programs laid back to back.
    pub hoe: f64,
    /// Fraction of examined bytes that are `Halt`.
    pub halt_fraction: f64,
    /// Longest win streak in the whole population.
    pub max_streak: u64,
    /// Mean win streak over the whole population.
    pub mean_streak: f64,
}

impl PopulationStats {
    /// Measure the candidates at `indices`.
    pub fn measure(population: &Population, indices: &[usize]) -> Self {
        let programs: Vec<&[u8]> = indices
            .iter()
            .map(|&i| population.get(i).program.as_slice())
            .collect();
        let mut bytes = Vec::new();
        population.programs_bytes_into(indices, &mut bytes);
        let hist = opcode_histogram(&programs);
        let halt_fraction = if bytes.is_empty() {
            0.0
        } else {
            hist[crate::machine::opcode::HALT as usize] as f64 / bytes.len() as f64
        };
        Self {
            sampled: programs.len(),
            unique: unique_program_count(&programs),
            hoe: high_order_entropy(&bytes),
            halt_fraction,
            max_streak: population.max_streak(),
            mean_streak: population.mean_streak(),
        }
    }
}
