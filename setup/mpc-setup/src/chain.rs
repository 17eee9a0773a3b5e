//! Linear verification chains over published rounds.

use crate::circuit::ConstraintSystem;
use crate::commons::SrsCommons;
use crate::errors::{Result, SetupError};
use crate::evaluations::Phase2Evaluations;
use crate::keys::{ProvingKey, VerifyingKey};
use crate::phase1::{Phase1, Phase1Proof};
use crate::phase2::{Phase2, Phase2Proof};
use tracing::info;

/// Latest verified phase-1 state.
pub struct Phase1Chain {
    current: Phase1,
}

impl Phase1Chain {
    pub fn genesis(domain_size: usize) -> Result<Self> {
        Ok(Self {
            current: Phase1::new(domain_size)?,
        })
    }

    pub fn current(&self) -> &Phase1 {
        &self.current
    }

    pub fn nb_contributions(&self) -> u64 {
        self.current.contributor_index
    }

    /// Verifies `next` against the latest state. On failure the chain is
    /// left unchanged.
    pub fn append(&mut self, next: Phase1, proof: &Phase1Proof) -> Result<()> {
        self.current.verify(&next, proof)?;
        self.current = next;
        Ok(())
    }

    pub fn finish(self, beacon: &[u8]) -> Result<SrsCommons> {
        if self.current.contributor_index == 0 {
            return Err(SetupError::malformed("rounds", "no contribution to seal"));
        }
        self.current.seal(beacon)
    }
}

/// Verifies every phase-1 round in order, then seals with the beacon.
pub fn verify_phase1(domain_size: usize, beacon: &[u8], rounds: &[(Phase1, Phase1Proof)]) -> Result<SrsCommons> {
    if rounds.is_empty() {
        return Err(SetupError::malformed("rounds", "empty contribution list"));
    }
    let mut chain = Phase1Chain::genesis(domain_size)?;
    for (next, proof) in rounds {
        chain.append(next.clone(), proof)?;
    }
    info!(rounds = rounds.len(), domain_size, "phase 1 chain verified");
    chain.finish(beacon)
}

/// Latest verified phase-2 state, together with the inputs the seal needs.
pub struct Phase2Chain {
    commons: SrsCommons,
    evaluations: Phase2Evaluations,
    current: Phase2,
}

impl Phase2Chain {
    pub fn new(commons: &SrsCommons, cs: &ConstraintSystem) -> Result<Self> {
        let (current, evaluations) = Phase2::initialize(commons, cs)?;
        Ok(Self {
            commons: commons.clone(),
            evaluations,
            current,
        })
    }

    pub fn current(&self) -> &Phase2 {
        &self.current
    }

    pub fn evaluations(&self) -> &Phase2Evaluations {
        &self.evaluations
    }

    pub fn nb_contributions(&self) -> u64 {
        self.current.contributor_index
    }

    pub fn append(&mut self, next: Phase2, proof: &Phase2Proof) -> Result<()> {
        self.current.verify(&next, proof)?;
        self.current = next;
        Ok(())
    }

    pub fn finish(self, beacon: &[u8]) -> Result<(ProvingKey, VerifyingKey)> {
        if self.current.contributor_index == 0 {
            return Err(SetupError::malformed("rounds", "no contribution to seal"));
        }
        self.current.seal(&self.commons, &self.evaluations, beacon)
    }
}

pub fn verify_phase2(
    cs: &ConstraintSystem,
    commons: &SrsCommons,
    beacon: &[u8],
    rounds: &[(Phase2, Phase2Proof)],
) -> Result<(ProvingKey, VerifyingKey)> {
    if rounds.is_empty() {
        return Err(SetupError::malformed("rounds", "empty contribution list"));
    }
    let mut chain = Phase2Chain::new(commons, cs)?;
    for (next, proof) in rounds {
        chain.append(next.clone(), proof)?;
    }
    info!(rounds = rounds.len(), "phase 2 chain verified");
    chain.finish(beacon)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::phase1::Phase1Secrets;
    use crate::utils::{RandomGenerator, RandomStrategy};

    fn rounds(n: usize) -> Vec<(Phase1, Phase1Proof)> {
        let mut rng = RandomGenerator::new(RandomStrategy::Testing, [0u8; 32]);
        let mut state = Phase1::new(4).unwrap();
        let mut out = Vec::new();
        for _ in 0..n {
            let (next, proof) = state.contribute(&Phase1Secrets::generate(&mut rng)).unwrap();
            out.push((next.clone(), proof));
            state = next;
        }
        out
    }

    #[test]
    fn test_incremental_matches_batch() {
        let rounds = rounds(3);
        let batch = verify_phase1(4, b"beacon", &rounds).unwrap();

        let mut chain = Phase1Chain::genesis(4).unwrap();
        for (next, proof) in &rounds {
            chain.append(next.clone(), proof).unwrap();
        }
        assert_eq!(chain.nb_contributions(), 3);
        assert_eq!(chain.finish(b"beacon").unwrap(), batch);
    }

    #[test]
    fn test_reordered_rounds_rejected() {
        let mut rounds = rounds(3);
        rounds.swap(1, 2);
        assert!(matches!(
            verify_phase1(4, b"beacon", &rounds),
            Err(SetupError::ChainMismatch { .. })
        ));

        let rounds = self::rounds(2);
        let replayed = vec![rounds[0].clone(), rounds[0].clone()];
        assert!(matches!(
            verify_phase1(4, b"beacon", &replayed),
            Err(SetupError::ChainMismatch { .. })
        ));
    }

    #[test]
    fn test_failed_append_keeps_state() {
        let rounds = rounds(2);
        let mut chain = Phase1Chain::genesis(4).unwrap();
        assert!(chain.append(rounds[1].0.clone(), &rounds[1].1).is_err());
        assert_eq!(chain.nb_contributions(), 0);
        chain.append(rounds[0].0.clone(), &rounds[0].1).unwrap();
        assert_eq!(chain.current(), &rounds[0].0);
    }

    #[test]
    fn test_empty_chain_rejected() {
        assert!(matches!(
            verify_phase1(4, b"beacon", &[]),
            Err(SetupError::MalformedInput { field: "rounds", .. })
        ));
        assert!(Phase1Chain::genesis(4).unwrap().finish(b"beacon").is_err());
    }
}
