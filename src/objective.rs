use std::path::Path;

use rand::Rng;
use rand::rngs::SmallRng;
use tracing::{debug, info};

use crate::error::CorpusError;

/// One task instance: bytes to feed the program and the bytes it should emit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Objective {
    input: Vec<u8>,
    expected: Vec<u8>,
}

impl Objective {
    /// Build an objective. Neither side may be empty.
    pub fn new(input: Vec<u8>, expected: Vec<u8>) -> Result<Self, CorpusError> {
        if input.is_empty() {
            return Err(CorpusError::EmptyInput);
        }
        if expected.is_empty() {
            return Err(CorpusError::EmptyExpected);
        }
        Ok(Self { input, expected })
    }

    pub fn input(&self) -> &[u8] {
        &self.input
    }

    pub fn expected(&self) -> &[u8] {
        &self.expected
    }
}

/// Supplies objectives to the evolution loop.
///
/// Implementations are shared read-only between worker threads, so sampling
/// takes `&self` and draws all randomness from the caller's RNG.
pub trait ObjectiveSource: Send + Sync {
    /// Draw one objective uniformly at random.
    fn sample(&self, rng: &mut SmallRng) -> &Objective;
}

/// A fixed list of objectives, sampled uniformly.
pub struct ScriptedObjectives {
    objectives: Vec<Objective>,
}

impl ScriptedObjectives {
    pub fn new(objectives: Vec<Objective>) -> Result<Self, CorpusError> {
        if objectives.is_empty() {
            return Err(CorpusError::NoObjectives);
        }
        Ok(Self { objectives })
    }

    /// A source that always yields the same objective.
    pub fn single(objective: Objective) -> Self {
        Self {
            objectives: vec![objective],
        }
    }
}

impl ObjectiveSource for ScriptedObjectives {
    fn sample(&self, rng: &mut SmallRng) -> &Objective {
        &self.objectives[rng.gen_range(0..self.objectives.len())]
    }
}

/// Translation pairs for a single direction, e.g. English to Spanish.
pub struct Direction {
    pub name: String,
    pub pairs: Vec<Objective>,
}

/// Paired sentences loaded from tab-separated files, one file per
/// translation direction.
///
/// Each usable line holds four tab-separated columns: source id, source
/// text, target id, target text. Sampling picks a direction uniformly, then
/// a pair uniformly within it.
pub struct TranslationCorpus {
    directions: Vec<Direction>,
}

impl TranslationCorpus {
    /// Load every file in `paths` as one direction.
    pub fn load<P: AsRef<Path>>(paths: &[P]) -> Result<Self, CorpusError> {
        let mut directions = Vec::with_capacity(paths.len());
        for path in paths {
            let path = path.as_ref();
            let text = std::fs::read_to_string(path).map_err(|source| CorpusError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            let name = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string());
            let direction = parse_direction(&name, &text)?;
            info!(direction = %direction.name, pairs = direction.pairs.len(), "loaded translation pairs");
            directions.push(direction);
        }
        Self::from_directions(directions)
    }

    /// Every direction must hold at least one pair.
    pub fn from_directions(directions: Vec<Direction>) -> Result<Self, CorpusError> {
        if directions.is_empty() {
            return Err(CorpusError::NoObjectives);
        }
        if let Some(empty) = directions.iter().find(|d| d.pairs.is_empty()) {
            return Err(CorpusError::NoPairs(empty.name.clone()));
        }
        Ok(Self { directions })
    }

    pub fn directions(&self) -> &[Direction] {
        &self.directions
    }

    /// Total number of pairs across all directions.
    pub fn len(&self) -> usize {
        self.directions.iter().map(|d| d.pairs.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ObjectiveSource for TranslationCorpus {
    fn sample(&self, rng: &mut SmallRng) -> &Objective {
        let direction = &self.directions[rng.gen_range(0..self.directions.len())];
        &direction.pairs[rng.gen_range(0..direction.pairs.len())]
    }
}

/// Parse one direction from tab-separated text. Malformed and blank lines
/// are skipped; a direction with no pairs at all is an error.
pub fn parse_direction(name: &str, text: &str) -> Result<Direction, CorpusError> {
    let mut pairs = Vec::new();
    let mut skipped = 0usize;
    for line in text.lines() {
        let columns: Vec<&str> = line.split('\t').collect();
        if columns.len() != 4 || columns[1].trim().is_empty() || columns[3].trim().is_empty() {
            skipped += 1;
            continue;
        }
        let objective = Objective::new(columns[1].as_bytes().to_vec(), columns[3].as_bytes().to_vec())?;
        pairs.push(objective);
    }
    if skipped > 0 {
        debug!(direction = name, skipped, "skipped malformed lines");
    }
    if pairs.is_empty() {
        return Err(CorpusError::NoPairs(name.to_string()));
    }
    Ok(Direction {
        name: name.to_string(),
        pairs,
    })
}
