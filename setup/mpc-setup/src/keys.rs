use crate::errors::{Result, SetupError};
use ark_ec::AffineRepr;
use ark_ff::Zero;
use libs::group_structures::{pairing, G1Affine, G2Affine, Gt};
use libs::polynomial_structures::RadixDomain;

/// Proving key of the sealed ceremony.
///
/// `g1.a` and `g1.b` only hold the non-identity wire evaluations; the
/// infinity masks say which wires were dropped. `g2.b` is compacted with
/// the mask of `g1.b`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProvingKey {
    pub domain: RadixDomain,
    pub g1: ProvingKeyG1,
    pub g2: ProvingKeyG2,
    pub infinity_a: Vec<bool>,
    pub infinity_b: Vec<bool>,
    pub nb_infinity_a: u64,
    pub nb_infinity_b: u64,
    pub commitment_keys: Vec<PedersenProvingKey>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProvingKeyG1 {
    pub alpha: G1Affine,
    pub beta: G1Affine,
    pub delta: G1Affine,
    pub a: Vec<G1Affine>,
    pub b: Vec<G1Affine>,
    /// Bit-reversed over the domain.
    pub z: Vec<G1Affine>,
    pub k: Vec<G1Affine>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProvingKeyG2 {
    pub beta: G2Affine,
    pub delta: G2Affine,
    pub b: Vec<G2Affine>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PedersenProvingKey {
    pub basis: Vec<G1Affine>,
    pub basis_exp_sigma: Vec<G1Affine>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PedersenVerifyingKey {
    pub g: G2Affine,
    /// -[sigma]_2
    pub g_sigma_neg: G2Affine,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VerifyingKey {
    pub g1: VerifyingKeyG1,
    pub g2: VerifyingKeyG2,
    pub commitment_keys: Vec<PedersenVerifyingKey>,
    pub public_and_commitment_committed: Vec<Vec<u64>>,
    pub(crate) precomputed: Option<VerifyingKeyPrecomputed>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VerifyingKeyG1 {
    pub alpha: G1Affine,
    pub beta: G1Affine,
    pub delta: G1Affine,
    pub k: Vec<G1Affine>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VerifyingKeyG2 {
    pub beta: G2Affine,
    pub delta: G2Affine,
    pub gamma: G2Affine,
}

/// Values the verifier would otherwise recompute for every proof.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VerifyingKeyPrecomputed {
    /// e(alpha, beta)
    pub e: Gt,
    pub g2_delta_neg: G2Affine,
    pub g2_gamma_neg: G2Affine,
}

fn valid_g2(p: &G2Affine) -> bool {
    !p.is_zero() && p.is_on_curve() && p.is_in_correct_subgroup_assuming_on_curve()
}

fn valid_g1(p: &G1Affine) -> bool {
    !p.is_zero() && p.is_on_curve() && p.is_in_correct_subgroup_assuming_on_curve()
}

impl VerifyingKey {
    /// Fills the cache of e(alpha, beta), -delta and -gamma.
    pub fn precompute(&mut self) -> Result<()> {
        if !valid_g1(&self.g1.alpha) || !valid_g2(&self.g2.beta) {
            return Err(SetupError::InternalInvariant("alpha or beta is not a valid group element".into()));
        }
        if !valid_g2(&self.g2.delta) || !valid_g2(&self.g2.gamma) {
            return Err(SetupError::InternalInvariant("delta or gamma is not a valid group element".into()));
        }
        let e = pairing(&[self.g1.alpha], &[self.g2.beta]);
        if e.is_zero() {
            return Err(SetupError::InternalInvariant("e(alpha, beta) is the identity".into()));
        }
        self.precomputed = Some(VerifyingKeyPrecomputed {
            e,
            g2_delta_neg: -self.g2.delta,
            g2_gamma_neg: -self.g2.gamma,
        });
        Ok(())
    }

    pub fn precomputed(&self) -> Option<&VerifyingKeyPrecomputed> {
        self.precomputed.as_ref()
    }

    pub fn nb_commitments(&self) -> usize {
        self.commitment_keys.len()
    }

    /// Public inputs excluding the constant one wire and the commitment wires.
    pub fn nb_public_witness(&self) -> usize {
        self.g1.k.len().saturating_sub(1 + self.commitment_keys.len())
    }
}

impl ProvingKey {
    /// Number of wires before infinity compaction.
    pub fn nb_wires(&self) -> usize {
        self.infinity_a.len()
    }

    /// Mask lengths and counts agree with the compacted vectors, and Z spans
    /// the domain.
    pub(crate) fn check_masks(&self) -> Result<()> {
        let flagged = |m: &[bool]| m.iter().filter(|&&b| b).count() as u64;
        if self.infinity_a.len() != self.infinity_b.len() {
            return Err(SetupError::malformed("InfinityB", "mask lengths differ"));
        }
        if flagged(&self.infinity_a) != self.nb_infinity_a
            || self.g1.a.len() as u64 + self.nb_infinity_a != self.infinity_a.len() as u64
        {
            return Err(SetupError::malformed("InfinityA", "mask does not match G1.A"));
        }
        if flagged(&self.infinity_b) != self.nb_infinity_b
            || self.g1.b.len() as u64 + self.nb_infinity_b != self.infinity_b.len() as u64
            || self.g2.b.len() != self.g1.b.len()
        {
            return Err(SetupError::malformed("InfinityB", "mask does not match G1.B / G2.B"));
        }
        if !self.domain.check() {
            return Err(SetupError::malformed("domain", "not a radix-2 domain"));
        }
        if self.g1.z.len() != self.domain.size() {
            return Err(SetupError::malformed("G1.Z", "length does not match the domain"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use libs::group_structures::{g1_generator, g2_generator, ScalarField};

    fn vk() -> VerifyingKey {
        VerifyingKey {
            g1: VerifyingKeyG1 {
                alpha: (g1_generator() * ScalarField::from(3u64)).into(),
                beta: g1_generator(),
                delta: g1_generator(),
                k: vec![g1_generator(); 3],
            },
            g2: VerifyingKeyG2 {
                beta: (g2_generator() * ScalarField::from(5u64)).into(),
                delta: g2_generator(),
                gamma: g2_generator(),
            },
            commitment_keys: vec![PedersenVerifyingKey {
                g: g2_generator(),
                g_sigma_neg: -g2_generator(),
            }],
            public_and_commitment_committed: vec![vec![]],
            precomputed: None,
        }
    }

    #[test]
    fn test_precompute() {
        let mut vk = vk();
        vk.precompute().unwrap();
        let pre = vk.precomputed().unwrap();
        let fifteen: G1Affine = (g1_generator() * ScalarField::from(15u64)).into();
        assert_eq!(pre.e, pairing(&[fifteen], &[g2_generator()]));
        assert_eq!(pre.g2_gamma_neg, -g2_generator());
        assert_eq!(vk.nb_public_witness(), 1);
    }

    #[test]
    fn test_precompute_rejects_identity() {
        let mut vk = vk();
        vk.g2.beta = G2Affine::zero();
        assert!(matches!(vk.precompute(), Err(SetupError::InternalInvariant(_))));
        assert!(vk.precomputed().is_none());
    }
}
