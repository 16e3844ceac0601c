use rand::Rng;
use rand::rngs::SmallRng;

use crate::error::ConfigError;
use crate::machine::MAX_INSTRUCTION;

/// One evolvable program and its current win streak.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Candidate {
    pub program: Vec<u8>,
    /// Tournaments won since the last loss.
    pub consecutive_wins: u64,
}

impl Candidate {
    pub fn new(program: Vec<u8>) -> Self {
        Self {
            program,
            consecutive_wins: 0,
        }
    }
}

/// Fixed-size collection of candidates, all with programs of the same length.
pub struct Population {
    candidates: Vec<Candidate>,
    program_size: usize,
}

impl Population {
    /// Fill a population with programs of uniformly random valid opcodes.
    pub fn random(size: usize, program_size: usize, rng: &mut SmallRng) -> Result<Self, ConfigError> {
        let programs: Vec<Vec<u8>> = (0..size)
            .map(|_| (0..program_size).map(|_| rng.gen_range(0..MAX_INSTRUCTION)).collect())
            .collect();
        Self::from_programs(programs)
    }

    /// Wrap existing programs. Every program must have the same non-zero
    /// length and there must be at least two of them.
    pub fn from_programs(programs: Vec<Vec<u8>>) -> Result<Self, ConfigError> {
        if programs.len() < 2 {
            return Err(ConfigError::PopulationTooSmall(programs.len()));
        }
        let program_size = programs[0].len();
        if program_size == 0 {
            return Err(ConfigError::ZeroProgramSize);
        }
        if let Some((index, p)) = programs.iter().enumerate().find(|(_, p)| p.len() != program_size) {
            return Err(ConfigError::ProgramLength {
                index,
                expected: program_size,
                actual: p.len(),
            });
        }
        Ok(Self {
            candidates: programs.into_iter().map(Candidate::new).collect(),
            program_size,
        })
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn program_size(&self) -> usize {
        self.program_size
    }

    pub fn get(&self, index: usize) -> &Candidate {
        &self.candidates[index]
    }

    pub fn get_mut(&mut self, index: usize) -> &mut Candidate {
        &mut self.candidates[index]
    }

    pub fn candidates(&self) -> &[Candidate] {
        &self.candidates
    }

    /// Mutable access to two distinct slots at once.
    pub fn pair_mut(&mut self, a: usize, b: usize) -> (&mut Candidate, &mut Candidate) {
        assert_ne!(a, b, "a candidate cannot be paired with itself");
        if a < b {
            let (left, right) = self.candidates.split_at_mut(b);
            (&mut left[a], &mut right[0])
        } else {
            let (left, right) = self.candidates.split_at_mut(a);
            (&mut right[0], &mut left[b])
        }
    }

    /// Pick two distinct indices uniformly at random.
    pub fn sample_pair(&self, rng: &mut SmallRng) -> (usize, usize) {
        let n = self.candidates.len();
        let i = rng.gen_range(0..n);
        let mut j = rng.gen_range(0..n - 1);
        if j >= i {
            j += 1;
        }
        (i, j)
    }

    /// Pick one index uniformly at random.
    pub fn sample_one(&self, rng: &mut SmallRng) -> usize {
        rng.gen_range(0..self.candidates.len())
    }

    /// Fill `buf` with the programs at `indices`, back to back.
    pub fn programs_bytes_into(&self, indices: &[usize], buf: &mut Vec<u8>) {
        buf.clear();
        buf.reserve(indices.len() * self.program_size);
        for &i in indices {
            buf.extend_from_slice(&self.candidates[i].program);
        }
    }

    /// Longest current win streak.
    pub fn max_streak(&self) -> u64 {
        self.candidates.iter().map(|c| c.consecutive_wins).max().unwrap_or(0)
    }

    pub fn mean_streak(&self) -> f64 {
        if self.candidates.is_empty() {
            return 0.0;
        }
        let total: u64 = self.candidates.iter().map(|c| c.consecutive_wins).sum();
        total as f64 / self.candidates.len() as f64
    }
}

/// Overwrite one uniformly chosen byte with a uniformly chosen valid opcode
/// different from the byte already there. Returns the mutated position.
pub fn point_mutation(program: &mut [u8], rng: &mut SmallRng) -> usize {
    let pos = rng.gen_range(0..program.len());
    let current = program[pos];
    program[pos] = if current < MAX_INSTRUCTION {
        let mut op = rng.gen_range(0..MAX_INSTRUCTION - 1);
        if op >= current {
            op += 1;
        }
        op
    } else {
        rng.gen_range(0..MAX_INSTRUCTION)
    };
    pos
}
