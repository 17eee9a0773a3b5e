use crate::circuit::{ConstraintSystem, MAX_COMMITMENTS};
use crate::commons::SrsCommons;
use crate::errors::{Result, SetupError};
use crate::evaluations::{evaluate, Phase2Evaluations};
use crate::marshal::transcript_hash;
use crate::phase1::check_link;
use crate::utils::{Challenge, RandomGenerator, UpdateProof, ValueUpdate};
use ark_ec::AffineRepr;
use ark_ff::{Field, Zero};
use libs::group_structures::{g1_generator, g2_generator, G1Affine, G2Affine, ScalarField};
use libs::vector_operations::scale_in_place;
use rayon::prelude::*;
use std::slice;
use std::time::Instant;
use tracing::info;

const DST_DELTA: u8 = 1;

fn sigma_dst(i: usize) -> u8 {
    2 + i as u8
}

/// Public state of the circuit-specific phase after `contributor_index`
/// contributions.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Phase2 {
    pub contributor_index: u64,
    pub challenge: Challenge,
    pub parameters: Phase2Parameters,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Phase2Parameters {
    pub g1: Phase2G1,
    pub g2: Phase2G2,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Phase2G1 {
    pub delta: G1Affine,
    /// [tau^i (tau^n - 1) / delta]_1, natural order; the last slot is the identity.
    pub z: Vec<G1Affine>,
    /// Private-wire K terms divided by delta.
    pub pkk: Vec<G1Affine>,
    /// Commitment bases multiplied by their sigma.
    pub sigma_ckk: Vec<Vec<G1Affine>>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Phase2G2 {
    pub delta: G2Affine,
    pub sigma: Vec<G2Affine>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Phase2Proof {
    pub delta: UpdateProof,
    pub sigmas: Vec<UpdateProof>,
}

/// Toxic waste of one phase-2 contributor. Overwritten on drop.
pub struct Phase2Secrets {
    pub delta: ScalarField,
    pub sigmas: Vec<ScalarField>,
}

impl Phase2Secrets {
    pub fn generate(rng: &mut RandomGenerator, nb_commitments: usize) -> Self {
        Self {
            delta: rng.next_random(),
            sigmas: (0..nb_commitments).map(|_| rng.next_random()).collect(),
        }
    }
}

impl Drop for Phase2Secrets {
    fn drop(&mut self) {
        self.delta = ScalarField::zero();
        self.sigmas.iter_mut().for_each(|s| *s = ScalarField::zero());
    }
}

impl Phase2Parameters {
    pub fn nb_commitments(&self) -> usize {
        self.g2.sigma.len()
    }
}

impl Phase2 {
    /// Starts phase 2 for `cs` on top of the sealed phase-1 SRS. The genesis
    /// challenge is the digest of the evaluations, binding every round to
    /// the circuit.
    pub fn initialize(commons: &SrsCommons, cs: &ConstraintSystem) -> Result<(Phase2, Phase2Evaluations)> {
        let (evals, terms) = evaluate(commons, cs)?;
        let nb_commitments = evals.nb_commitments();
        let phase2 = Phase2 {
            contributor_index: 0,
            challenge: transcript_hash(&evals)?,
            parameters: Phase2Parameters {
                g1: Phase2G1 {
                    delta: g1_generator(),
                    z: terms.z,
                    pkk: terms.pkk,
                    sigma_ckk: evals.g1.ckk.clone(),
                },
                g2: Phase2G2 {
                    delta: g2_generator(),
                    sigma: vec![g2_generator(); nb_commitments],
                },
            },
        };
        info!(
            domain_size = commons.domain_size(),
            nb_wires = evals.nb_wires(),
            nb_commitments,
            "phase 2 initialized"
        );
        Ok((phase2, evals))
    }

    pub fn hash(&self) -> Result<Challenge> {
        transcript_hash(self)
    }

    /// Multiplies delta and the sigmas into the parameters. The caller is
    /// trusted: no proof is produced or checked.
    pub fn update(&mut self, delta: &ScalarField, sigmas: &[ScalarField]) -> Result<()> {
        let p = &mut self.parameters;
        if sigmas.len() != p.nb_commitments() {
            return Err(SetupError::malformed(
                "sigma contributions",
                format!("expected {}, found {}", p.nb_commitments(), sigmas.len()),
            ));
        }
        let delta_inv = delta
            .inverse()
            .ok_or(SetupError::InvalidContribution("zero delta"))?;

        let (g1, g2) = (&mut p.g1, &mut p.g2);
        rayon::join(
            || {
                rayon::join(
                    || scale_in_place(&mut g1.z, delta_inv),
                    || scale_in_place(&mut g1.pkk, delta_inv),
                );
            },
            || {
                scale_in_place(slice::from_mut(&mut g1.delta), *delta);
                scale_in_place(slice::from_mut(&mut g2.delta), *delta);
                g1.sigma_ckk
                    .par_iter_mut()
                    .zip(g2.sigma.par_iter_mut())
                    .zip(sigmas.par_iter())
                    .for_each(|((ckk, sigma), s)| {
                        scale_in_place(ckk, *s);
                        scale_in_place(slice::from_mut(sigma), *s);
                    });
            },
        );
        Ok(())
    }

    /// Multiplies fresh secrets into the parameters and proves knowledge of
    /// them. Consumes the previous state.
    pub fn contribute(self, secrets: &Phase2Secrets) -> Result<(Phase2, Phase2Proof)> {
        let start = Instant::now();
        let challenge = self.hash()?;
        let proof = Phase2Proof {
            delta: UpdateProof::new(&secrets.delta, &challenge, DST_DELTA)?,
            sigmas: secrets
                .sigmas
                .iter()
                .enumerate()
                .map(|(i, s)| UpdateProof::new(s, &challenge, sigma_dst(i)))
                .collect::<Result<_>>()?,
        };

        let mut next = Phase2 {
            contributor_index: self.contributor_index + 1,
            challenge,
            parameters: self.parameters,
        };
        next.update(&secrets.delta, &secrets.sigmas)?;
        info!(
            contributor = next.contributor_index,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "phase 2 contribution computed"
        );
        Ok((next, proof))
    }

    /// Checks that `next` was derived from `self` by a single honest update
    /// proven by `proof`.
    pub fn verify(&self, next: &Phase2, proof: &Phase2Proof) -> Result<()> {
        let start = Instant::now();
        let challenge = self.hash()?;
        check_link(self.contributor_index, &challenge, next.contributor_index, &next.challenge)?;

        let (prev, cur) = (&self.parameters, &next.parameters);
        check_same_shape(prev, cur, proof)?;
        if cur.g1.delta.is_zero() || cur.g2.delta.is_zero() || cur.g2.sigma.iter().any(|s| s.is_zero()) {
            return Err(SetupError::InvalidContribution("non-identity"));
        }

        // delta sits in the denominator of Z and PKK, so those are checked
        // as prev = delta * next
        let delta_updates = [
            ValueUpdate::G1 {
                label: "delta update",
                previous: slice::from_ref(&prev.g1.delta),
                next: slice::from_ref(&cur.g1.delta),
            },
            ValueUpdate::G2 {
                label: "delta update",
                previous: slice::from_ref(&prev.g2.delta),
                next: slice::from_ref(&cur.g2.delta),
            },
            ValueUpdate::G1 {
                label: "Z update",
                previous: &cur.g1.z,
                next: &prev.g1.z,
            },
            ValueUpdate::G1 {
                label: "PKK update",
                previous: &cur.g1.pkk,
                next: &prev.g1.pkk,
            },
        ];

        let (delta, sigmas) = rayon::join(
            || proof.delta.verify(&challenge, DST_DELTA, &delta_updates),
            || {
                proof
                    .sigmas
                    .par_iter()
                    .enumerate()
                    .map(|(i, p)| {
                        let updates = [
                            ValueUpdate::G1 {
                                label: "sigma update",
                                previous: &prev.g1.sigma_ckk[i],
                                next: &cur.g1.sigma_ckk[i],
                            },
                            ValueUpdate::G2 {
                                label: "sigma update",
                                previous: slice::from_ref(&prev.g2.sigma[i]),
                                next: slice::from_ref(&cur.g2.sigma[i]),
                            },
                        ];
                        p.verify(&challenge, sigma_dst(i), &updates)
                    })
                    .collect::<Vec<_>>()
            },
        );
        delta?;
        sigmas.into_iter().collect::<Result<Vec<()>>>()?;

        info!(
            contributor = next.contributor_index,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "phase 2 contribution verified"
        );
        Ok(())
    }
}

fn check_same_shape(prev: &Phase2Parameters, cur: &Phase2Parameters, proof: &Phase2Proof) -> Result<()> {
    let n = prev.nb_commitments();
    if n > MAX_COMMITMENTS {
        return Err(SetupError::malformed("G2.Sigma", format!("{n} commitments")));
    }
    if cur.g1.z.len() != prev.g1.z.len() {
        return Err(SetupError::malformed("G1.Z", "length changed"));
    }
    if cur.g1.pkk.len() != prev.g1.pkk.len() {
        return Err(SetupError::malformed("G1.PKK", "length changed"));
    }
    if cur.g2.sigma.len() != n || cur.g1.sigma_ckk.len() != n || proof.sigmas.len() != n {
        return Err(SetupError::malformed("G2.Sigma", "commitment count changed"));
    }
    if cur
        .g1
        .sigma_ckk
        .iter()
        .zip(&prev.g1.sigma_ckk)
        .any(|(c, p)| c.len() != p.len())
    {
        return Err(SetupError::malformed("G1.SigmaCKK", "length changed"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit::{CommitmentInfo, Constraint, Term};
    use crate::utils::RandomStrategy;
    use ark_ff::One;

    fn circuit() -> ConstraintSystem {
        let one = ScalarField::one();
        ConstraintSystem {
            nb_public: 2,
            nb_secret: 2,
            nb_internal: 2,
            constraints: vec![
                Constraint {
                    l: vec![Term::new(2, one)],
                    r: vec![Term::new(3, one)],
                    o: vec![Term::new(4, one)],
                },
                Constraint {
                    l: vec![Term::new(4, one)],
                    r: vec![Term::new(0, one)],
                    o: vec![Term::new(1, one)],
                },
                Constraint {
                    l: vec![Term::new(5, one)],
                    r: vec![Term::new(0, one)],
                    o: vec![Term::new(5, one)],
                },
            ],
            commitments: vec![CommitmentInfo {
                commitment_wire: 5,
                private_committed: vec![2],
                public_and_commitment_committed: vec![],
            }],
        }
    }

    fn commons() -> SrsCommons {
        let mut c = SrsCommons::new(4).unwrap();
        c.update(&ScalarField::from(11u64), &ScalarField::from(12u64), &ScalarField::from(13u64));
        c
    }

    #[test]
    fn test_initialize() {
        let (p, evals) = Phase2::initialize(&commons(), &circuit()).unwrap();
        assert_eq!(p.parameters.g1.z.len(), 4);
        assert_eq!(p.parameters.g1.sigma_ckk, evals.g1.ckk);
        assert_eq!(p.parameters.g2.sigma, vec![g2_generator()]);
        assert_eq!(p.challenge, transcript_hash(&evals).unwrap());
    }

    #[test]
    fn test_contribute_and_verify() {
        let mut rng = RandomGenerator::new(RandomStrategy::Testing, [0u8; 32]);
        let (p0, _) = Phase2::initialize(&commons(), &circuit()).unwrap();
        let (p1, proof1) = p0.clone().contribute(&Phase2Secrets::generate(&mut rng, 1)).unwrap();
        p0.verify(&p1, &proof1).unwrap();
        let (p2, proof2) = p1.clone().contribute(&Phase2Secrets::generate(&mut rng, 1)).unwrap();
        p1.verify(&p2, &proof2).unwrap();

        assert!(matches!(p0.verify(&p2, &proof2), Err(SetupError::ChainMismatch { .. })));
        assert!(matches!(p1.verify(&p2, &proof1), Err(SetupError::InvalidContribution(_))));
    }

    #[test]
    fn test_update_scales_by_delta_inverse() {
        let (mut p, _) = Phase2::initialize(&commons(), &circuit()).unwrap();
        let before = p.clone();
        let delta = ScalarField::from(9u64);
        let sigma = ScalarField::from(4u64);
        p.update(&delta, &[sigma]).unwrap();
        let inv = delta.inverse().unwrap();
        assert_eq!(p.parameters.g1.z[0], G1Affine::from(before.parameters.g1.z[0] * inv));
        assert_eq!(p.parameters.g1.pkk[0], G1Affine::from(before.parameters.g1.pkk[0] * inv));
        assert_eq!(p.parameters.g2.delta, G2Affine::from(g2_generator() * delta));
        assert_eq!(p.parameters.g2.sigma[0], G2Affine::from(g2_generator() * sigma));
        assert!(p.parameters.g1.z[3].is_zero());

        assert!(matches!(
            p.update(&ScalarField::zero(), &[sigma]),
            Err(SetupError::InvalidContribution("zero delta"))
        ));
        assert!(p.update(&delta, &[]).is_err());
    }

    #[test]
    fn test_tampered_pkk_rejected() {
        let mut rng = RandomGenerator::new(RandomStrategy::Testing, [0u8; 32]);
        let (p0, _) = Phase2::initialize(&commons(), &circuit()).unwrap();
        let (mut p1, proof1) = p0.clone().contribute(&Phase2Secrets::generate(&mut rng, 1)).unwrap();
        p1.parameters.g1.pkk[0] = g1_generator();
        assert!(matches!(
            p0.verify(&p1, &proof1),
            Err(SetupError::InvalidContribution("PKK update"))
        ));
    }

    #[test]
    fn test_sigma_proof_bound_to_index() {
        let mut rng = RandomGenerator::new(RandomStrategy::Testing, [0u8; 32]);
        let (p0, _) = Phase2::initialize(&commons(), &circuit()).unwrap();
        let (p1, mut proof1) = p0.clone().contribute(&Phase2Secrets::generate(&mut rng, 1)).unwrap();
        proof1.sigmas[0] = proof1.delta;
        assert!(matches!(p0.verify(&p1, &proof1), Err(SetupError::InvalidContribution(_))));
    }
}
