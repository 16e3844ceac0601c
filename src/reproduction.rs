use rand::rngs::SmallRng;

use crate::population::{Candidate, point_mutation};

/// How a tournament winner replaces the loser, and what happens on a tie.
///
/// Win-streak bookkeeping is the tournament's job; policies only touch
/// program bytes.
pub trait ReproductionPolicy: Send + Sync {
    /// Overwrite `loser`'s program. `offspring` is the buffer the winner
    /// authored while it ran.
    fn reproduce(&self, winner: &Candidate, loser: &mut Candidate, offspring: &[u8], rng: &mut SmallRng);

    /// Perturb a tied candidate.
    fn perturb(&self, candidate: &mut Candidate, rng: &mut SmallRng);
}

/// The winner's offspring buffer becomes the loser's program. The only
/// source of novelty is what running programs write into their offspring.
pub struct SelfModification;

impl ReproductionPolicy for SelfModification {
    fn reproduce(&self, _winner: &Candidate, loser: &mut Candidate, offspring: &[u8], _rng: &mut SmallRng) {
        loser.program.copy_from_slice(offspring);
    }

    fn perturb(&self, _candidate: &mut Candidate, _rng: &mut SmallRng) {}
}

/// The loser becomes a copy of the winner with one point mutation. Ties are
/// point-mutated too. The offspring buffer is ignored.
pub struct ExplicitMutation;

impl ReproductionPolicy for ExplicitMutation {
    fn reproduce(&self, winner: &Candidate, loser: &mut Candidate, _offspring: &[u8], rng: &mut SmallRng) {
        loser.program.copy_from_slice(&winner.program);
        point_mutation(&mut loser.program, rng);
    }

    fn perturb(&self, candidate: &mut Candidate, rng: &mut SmallRng) {
        point_mutation(&mut candidate.program, rng);
    }
}

/// Configuration-time choice of [`ReproductionPolicy`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum ReproductionKind {
    #[default]
    SelfModification,
    ExplicitMutation,
}

impl ReproductionKind {
    pub fn policy(self) -> Box<dyn ReproductionPolicy> {
        match self {
            ReproductionKind::SelfModification => Box::new(SelfModification),
            ReproductionKind::ExplicitMutation => Box::new(ExplicitMutation),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn test_self_modification_installs_offspring() {
        let mut rng = SmallRng::seed_from_u64(0);
        let winner = Candidate::new(vec![1, 2, 3, 4]);
        let mut loser = Candidate::new(vec![0; 4]);
        SelfModification.reproduce(&winner, &mut loser, &[9, 8, 7, 6], &mut rng);
        assert_eq!(loser.program, vec![9, 8, 7, 6]);
    }

    #[test]
    fn test_self_modification_ignores_ties() {
        let mut rng = SmallRng::seed_from_u64(0);
        let mut c = Candidate::new(vec![1, 2, 3]);
        SelfModification.perturb(&mut c, &mut rng);
        assert_eq!(c.program, vec![1, 2, 3]);
    }

    #[test]
    fn test_explicit_mutation_copies_then_mutates_once() {
        let mut rng = SmallRng::seed_from_u64(5);
        let winner = Candidate::new(vec![4; 16]);
        let mut loser = Candidate::new(vec![0; 16]);
        ExplicitMutation.reproduce(&winner, &mut loser, &[7; 16], &mut rng);
        let differences = loser.program.iter().zip(&winner.program).filter(|(a, b)| a != b).count();
        assert_eq!(differences, 1);
    }

    #[test]
    fn test_explicit_mutation_perturbs_ties() {
        let mut rng = SmallRng::seed_from_u64(5);
        let mut c = Candidate::new(vec![4; 8]);
        ExplicitMutation.perturb(&mut c, &mut rng);
        assert_eq!(c.program.iter().filter(|&&b| b != 4).count(), 1);
    }

    #[test]
    fn test_kind_default_is_self_modification() {
        assert_eq!(ReproductionKind::default(), ReproductionKind::SelfModification);
    }
}
