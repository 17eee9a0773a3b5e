use crate::commons::SrsCommons;
use crate::errors::{Result, SetupError};
use crate::evaluations::Phase2Evaluations;
use crate::keys::{
    PedersenProvingKey, PedersenVerifyingKey, ProvingKey, ProvingKeyG1, ProvingKeyG2,
    VerifyingKey, VerifyingKeyG1, VerifyingKeyG2,
};
use crate::phase2::{Phase2, Phase2Parameters};
use crate::utils::beacon_contributions;
use ark_ec::AffineRepr;
use libs::group_structures::g2_generator;
use libs::polynomial_structures::RadixDomain;
use libs::vector_operations::{bit_reverse, count_identity};
use tracing::info;

pub const PHASE2_BEACON_DST: &[u8] = b"Groth16 MPC Setup - Phase2";

/// Drops identity entries, returning the dense vector and the mask of
/// dropped positions.
fn compact<A: AffineRepr>(points: &[A]) -> (Vec<A>, Vec<bool>) {
    let mask: Vec<bool> = points.iter().map(|p| p.is_zero()).collect();
    (masked(points, &mask), mask)
}

fn masked<A: Copy>(points: &[A], mask: &[bool]) -> Vec<A> {
    points
        .iter()
        .zip(mask)
        .filter(|(_, &infinity)| !infinity)
        .map(|(p, _)| *p)
        .collect()
}

impl Phase2 {
    /// Applies the beacon-derived final contribution and assembles the keys.
    /// Fully determined by the public inputs; consumes the state.
    ///
    /// # Panics
    /// If the verifying key cannot be precomputed, which cannot happen for
    /// parameters that passed verification.
    pub fn seal(
        mut self,
        commons: &SrsCommons,
        evals: &Phase2Evaluations,
        beacon: &[u8],
    ) -> Result<(ProvingKey, VerifyingKey)> {
        commons.check_shape()?;
        evals.check_shape()?;
        let n = commons.domain_size();
        if self.parameters.g1.z.len() != n {
            return Err(SetupError::malformed(
                "G1.Z",
                format!("{} entries for a domain of {n}", self.parameters.g1.z.len()),
            ));
        }
        if evals.nb_commitments() != self.parameters.nb_commitments() {
            return Err(SetupError::malformed(
                "commitments",
                "evaluations and parameters disagree on the commitment count",
            ));
        }
        let domain = RadixDomain::new(n)
            .ok_or_else(|| SetupError::InternalInvariant(format!("no radix-2 domain of size {n}")))?;

        let challenge = self.hash()?;
        let contributions =
            beacon_contributions(&challenge, PHASE2_BEACON_DST, beacon, 1 + self.parameters.nb_commitments());
        self.update(&contributions[0], &contributions[1..])?;

        let Phase2Parameters { g1, g2 } = self.parameters;
        let mut z = g1.z;
        bit_reverse(&mut z);

        let (a, infinity_a) = compact(&evals.g1.a);
        let (b, infinity_b) = compact(&evals.g1.b);
        let b2 = masked(&evals.g2.b, &infinity_b);
        let nb_infinity_a = count_identity(&evals.g1.a) as u64;
        let nb_infinity_b = count_identity(&evals.g1.b) as u64;

        let pk = ProvingKey {
            domain,
            g1: ProvingKeyG1 {
                alpha: commons.g1.alpha_tau[0],
                beta: commons.g1.beta_tau[0],
                delta: g1.delta,
                a,
                b,
                z,
                k: g1.pkk,
            },
            g2: ProvingKeyG2 {
                beta: commons.g2.beta,
                delta: g2.delta,
                b: b2,
            },
            infinity_a,
            infinity_b,
            nb_infinity_a,
            nb_infinity_b,
            commitment_keys: evals
                .g1
                .ckk
                .iter()
                .zip(g1.sigma_ckk)
                .map(|(basis, basis_exp_sigma)| PedersenProvingKey {
                    basis: basis.clone(),
                    basis_exp_sigma,
                })
                .collect(),
        };

        let mut vk = VerifyingKey {
            g1: VerifyingKeyG1 {
                alpha: commons.g1.alpha_tau[0],
                beta: commons.g1.beta_tau[0],
                delta: g1.delta,
                k: evals.g1.vkk.clone(),
            },
            g2: VerifyingKeyG2 {
                beta: commons.g2.beta,
                delta: g2.delta,
                gamma: g2_generator(),
            },
            commitment_keys: g2
                .sigma
                .iter()
                .map(|sigma| PedersenVerifyingKey {
                    g: g2_generator(),
                    g_sigma_neg: -*sigma,
                })
                .collect(),
            public_and_commitment_committed: evals.public_and_commitment_committed.clone(),
            precomputed: None,
        };
        if let Err(e) = vk.precompute() {
            panic!("sealed verifying key failed precomputation: {e}");
        }

        info!(
            domain_size = n,
            nb_wires = pk.nb_wires(),
            nb_infinity_a,
            nb_infinity_b,
            nb_commitments = vk.nb_commitments(),
            "ceremony sealed"
        );
        Ok((pk, vk))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit::{Constraint, ConstraintSystem, Term};
    use ark_ff::{Field, One};
    use libs::group_structures::{g1_generator, G1Affine, ScalarField};

    fn setup() -> (SrsCommons, ConstraintSystem) {
        let one = ScalarField::one();
        let mut commons = SrsCommons::new(4).unwrap();
        commons.update(&ScalarField::from(21u64), &ScalarField::from(2u64), &ScalarField::from(3u64));
        let cs = ConstraintSystem {
            nb_public: 2,
            nb_secret: 2,
            nb_internal: 0,
            constraints: vec![
                Constraint {
                    l: vec![Term::new(2, one)],
                    r: vec![Term::new(3, one)],
                    o: vec![Term::new(1, one)],
                },
                Constraint {
                    l: vec![Term::new(3, one)],
                    r: vec![Term::new(0, one)],
                    o: vec![Term::new(3, one)],
                },
            ],
            commitments: vec![],
        };
        (commons, cs)
    }

    #[test]
    fn test_masks_and_bit_reversed_z() {
        let (commons, cs) = setup();
        let (p, evals) = Phase2::initialize(&commons, &cs).unwrap();

        // the seal applies the beacon as an ordinary update
        let mut expected = p.clone();
        let s = beacon_contributions(&p.hash().unwrap(), PHASE2_BEACON_DST, b"beacon", 1);
        expected.update(&s[0], &[]).unwrap();

        let (pk, vk) = p.seal(&commons, &evals, b"beacon").unwrap();
        assert_eq!(pk.infinity_a, vec![true, true, false, false]);
        assert_eq!(pk.infinity_b, vec![false, true, true, false]);
        assert_eq!(pk.nb_infinity_a, 2);
        assert_eq!(pk.g1.a.len(), 2);
        assert_eq!(pk.g2.b.len(), pk.g1.b.len());
        pk.check_masks().unwrap();

        let z = &expected.parameters.g1.z;
        assert_eq!(pk.g1.z, vec![z[0], z[2], z[1], z[3]]);
        assert_eq!(pk.g1.delta, expected.parameters.g1.delta);
        assert_eq!(vk.g2.delta, expected.parameters.g2.delta);
        assert_eq!(vk.g2.gamma, g2_generator());
        assert_eq!(pk.g1.delta, G1Affine::from(g1_generator() * s[0]));
        assert_eq!(pk.g1.k[0], G1Affine::from(evals_pkk(&commons, &cs)[0] * s[0].inverse().unwrap()));
        assert!(vk.precomputed().is_some());
        assert!(vk.commitment_keys.is_empty());
    }

    fn evals_pkk(commons: &SrsCommons, cs: &ConstraintSystem) -> Vec<G1Affine> {
        Phase2::initialize(commons, cs).unwrap().0.parameters.g1.pkk
    }

    #[test]
    fn test_seal_rejects_mismatched_commons() {
        let (commons, cs) = setup();
        let (p, evals) = Phase2::initialize(&commons, &cs).unwrap();
        let mut bigger = SrsCommons::new(8).unwrap();
        bigger.update(&ScalarField::from(21u64), &ScalarField::from(2u64), &ScalarField::from(3u64));
        assert!(matches!(
            p.seal(&bigger, &evals, b"beacon"),
            Err(SetupError::MalformedInput { field: "G1.Z", .. })
        ));
    }
}
