use crate::commons::SrsCommons;
use crate::errors::{Result, SetupError};
use crate::marshal::transcript_hash;
use crate::utils::{
    beacon_contributions, Challenge, RandomGenerator, UpdateProof, ValueUpdate, GENESIS_CHALLENGE,
};
use ark_ec::AffineRepr;
use ark_ff::Zero;
use libs::group_structures::ScalarField;
use std::time::Instant;
use tracing::{debug, info};

pub const PHASE1_BEACON_DST: &[u8] = b"Groth16 MPC Setup - Phase1";

const DST_TAU: u8 = 1;
const DST_ALPHA: u8 = 2;
const DST_BETA: u8 = 3;

/// Public state after `contributor_index` phase-1 contributions.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Phase1 {
    pub contributor_index: u64,
    /// Digest of the state this one was derived from.
    pub challenge: Challenge,
    pub parameters: SrsCommons,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Phase1Proof {
    pub tau: UpdateProof,
    pub alpha: UpdateProof,
    pub beta: UpdateProof,
}

/// Toxic waste of one contributor. Overwritten on drop.
pub struct Phase1Secrets {
    pub tau: ScalarField,
    pub alpha: ScalarField,
    pub beta: ScalarField,
}

impl Phase1Secrets {
    pub fn generate(rng: &mut RandomGenerator) -> Self {
        Self {
            tau: rng.next_random(),
            alpha: rng.next_random(),
            beta: rng.next_random(),
        }
    }
}

impl Drop for Phase1Secrets {
    fn drop(&mut self) {
        self.tau = ScalarField::zero();
        self.alpha = ScalarField::zero();
        self.beta = ScalarField::zero();
    }
}

impl Phase1 {
    /// Genesis state for a domain of `domain_size` (a power of two).
    pub fn new(domain_size: usize) -> Result<Self> {
        Ok(Self {
            contributor_index: 0,
            challenge: GENESIS_CHALLENGE,
            parameters: SrsCommons::new(domain_size)?,
        })
    }

    pub fn hash(&self) -> Result<Challenge> {
        transcript_hash(self)
    }

    /// Multiplies fresh secrets into the SRS and proves knowledge of them.
    /// Consumes the previous state.
    pub fn contribute(self, secrets: &Phase1Secrets) -> Result<(Phase1, Phase1Proof)> {
        let start = Instant::now();
        let challenge = self.hash()?;
        let proof = Phase1Proof {
            tau: UpdateProof::new(&secrets.tau, &challenge, DST_TAU)?,
            alpha: UpdateProof::new(&secrets.alpha, &challenge, DST_ALPHA)?,
            beta: UpdateProof::new(&secrets.beta, &challenge, DST_BETA)?,
        };

        let mut parameters = self.parameters;
        parameters.update(&secrets.tau, &secrets.alpha, &secrets.beta);

        let next = Phase1 {
            contributor_index: self.contributor_index + 1,
            challenge,
            parameters,
        };
        info!(
            contributor = next.contributor_index,
            domain_size = next.parameters.domain_size(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "phase 1 contribution computed"
        );
        Ok((next, proof))
    }

    /// Checks that `next` was derived from `self` by a single honest update
    /// proven by `proof`.
    pub fn verify(&self, next: &Phase1, proof: &Phase1Proof) -> Result<()> {
        let start = Instant::now();
        let challenge = self.hash()?;
        check_link(self.contributor_index, &challenge, next.contributor_index, &next.challenge)?;

        let (prev, cur) = (&self.parameters, &next.parameters);
        cur.check_shape()?;
        if cur.domain_size() != prev.domain_size() {
            return Err(SetupError::malformed(
                "domain size",
                format!("{} does not match previous {}", cur.domain_size(), prev.domain_size()),
            ));
        }
        if cur.g1.tau[1].is_zero()
            || cur.g2.tau[1].is_zero()
            || cur.g1.alpha_tau[0].is_zero()
            || cur.g1.beta_tau[0].is_zero()
            || cur.g2.beta.is_zero()
        {
            return Err(SetupError::InvalidContribution("non-identity"));
        }

        let tau_updates = [
            ValueUpdate::G1 {
                label: "tau update",
                previous: &prev.g1.tau[1..2],
                next: &cur.g1.tau[1..2],
            },
            ValueUpdate::G2 {
                label: "tau update",
                previous: &prev.g2.tau[1..2],
                next: &cur.g2.tau[1..2],
            },
        ];
        let alpha_updates = [ValueUpdate::G1 {
            label: "alpha update",
            previous: &prev.g1.alpha_tau[..1],
            next: &cur.g1.alpha_tau[..1],
        }];
        let beta_updates = [
            ValueUpdate::G1 {
                label: "beta update",
                previous: &prev.g1.beta_tau[..1],
                next: &cur.g1.beta_tau[..1],
            },
            ValueUpdate::G2 {
                label: "beta update",
                previous: std::slice::from_ref(&prev.g2.beta),
                next: std::slice::from_ref(&cur.g2.beta),
            },
        ];

        let ((tau, alpha), (beta, powers)) = rayon::join(
            || {
                rayon::join(
                    || proof.tau.verify(&challenge, DST_TAU, &tau_updates),
                    || proof.alpha.verify(&challenge, DST_ALPHA, &alpha_updates),
                )
            },
            || {
                rayon::join(
                    || proof.beta.verify(&challenge, DST_BETA, &beta_updates),
                    || cur.check_powers(),
                )
            },
        );
        tau?;
        alpha?;
        beta?;
        powers?;

        info!(
            contributor = next.contributor_index,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "phase 1 contribution verified"
        );
        Ok(())
    }

    /// Applies the beacon-derived contribution and returns the final SRS.
    pub fn seal(self, beacon: &[u8]) -> Result<SrsCommons> {
        let challenge = self.hash()?;
        let s = beacon_contributions(&challenge, PHASE1_BEACON_DST, beacon, 3);
        let mut parameters = self.parameters;
        parameters.update(&s[0], &s[1], &s[2]);
        debug!(contributions = self.contributor_index, "phase 1 sealed");
        Ok(parameters)
    }
}

/// The next state must name the digest of the previous state as its
/// challenge and carry the next contributor index.
pub(crate) fn check_link(
    prev_index: u64,
    prev_hash: &Challenge,
    next_index: u64,
    next_challenge: &Challenge,
) -> Result<()> {
    if next_challenge != prev_hash {
        return Err(SetupError::ChainMismatch {
            expected: format!("challenge {}", hex::encode(&prev_hash[..8])),
            found: format!("challenge {}", hex::encode(&next_challenge[..8])),
        });
    }
    if next_index != prev_index + 1 {
        return Err(SetupError::ChainMismatch {
            expected: format!("contributor {}", prev_index + 1),
            found: format!("contributor {next_index}"),
        });
    }
    Ok(())
}
