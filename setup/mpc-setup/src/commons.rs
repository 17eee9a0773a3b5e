use crate::errors::{Result, SetupError};
use crate::utils::check_generators;
use ark_ff::One;
use libs::group_structures::{
    g1_generator, g2_generator, same_ratio, G1Affine, G2Affine, ScalarField,
};
use libs::vector_operations::{
    linear_combination, random_coefficients, scale_by_powers_in_place, scale_in_place,
};
use tracing::debug;

/// Powers-of-tau SRS for a radix-2 domain of size N.
///
/// * `g1.tau`: [tau^0]_1 .. [tau^(2N-2)]_1, the upper half feeds the
///   vanishing-polynomial terms of phase 2.
/// * `g1.alpha_tau`, `g1.beta_tau`: [alpha tau^i]_1, [beta tau^i]_1 for i < N.
/// * `g2.tau`: [tau^i]_2 for i < N, and `g2.beta` = [beta]_2.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SrsCommons {
    pub g1: CommonsG1,
    pub g2: CommonsG2,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommonsG1 {
    pub tau: Vec<G1Affine>,
    pub alpha_tau: Vec<G1Affine>,
    pub beta_tau: Vec<G1Affine>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommonsG2 {
    pub tau: Vec<G2Affine>,
    pub beta: G2Affine,
}

fn check_domain_size(domain_size: usize) -> Result<()> {
    if domain_size < 2 || !domain_size.is_power_of_two() {
        return Err(SetupError::malformed(
            "domain size",
            format!("{domain_size} is not a power of two >= 2"),
        ));
    }
    Ok(())
}

impl SrsCommons {
    /// Genesis SRS: tau = alpha = beta = 1.
    pub fn new(domain_size: usize) -> Result<Self> {
        check_domain_size(domain_size)?;
        Ok(Self {
            g1: CommonsG1 {
                tau: vec![g1_generator(); 2 * domain_size - 1],
                alpha_tau: vec![g1_generator(); domain_size],
                beta_tau: vec![g1_generator(); domain_size],
            },
            g2: CommonsG2 {
                tau: vec![g2_generator(); domain_size],
                beta: g2_generator(),
            },
        })
    }

    pub fn domain_size(&self) -> usize {
        self.g1.alpha_tau.len()
    }

    /// Multiplies tau, alpha and beta into every component. No checks.
    pub fn update(&mut self, tau: &ScalarField, alpha: &ScalarField, beta: &ScalarField) {
        let one = ScalarField::one();
        let (g1, g2) = (&mut self.g1, &mut self.g2);
        rayon::join(
            || {
                rayon::join(
                    || scale_by_powers_in_place(&mut g1.tau, one, *tau),
                    || {
                        rayon::join(
                            || scale_by_powers_in_place(&mut g1.alpha_tau, *alpha, *tau),
                            || scale_by_powers_in_place(&mut g1.beta_tau, *beta, *tau),
                        )
                    },
                )
            },
            || {
                scale_by_powers_in_place(&mut g2.tau, one, *tau);
                scale_in_place(std::slice::from_mut(&mut g2.beta), *beta);
            },
        );
    }

    /// The prefix SRS for a smaller domain. Still a valid SRS for the same
    /// trapdoors.
    pub fn truncated(&self, domain_size: usize) -> Result<Self> {
        check_domain_size(domain_size)?;
        if domain_size > self.domain_size() {
            return Err(SetupError::DomainTooSmall {
                required: domain_size,
                available: self.domain_size(),
            });
        }
        Ok(Self {
            g1: CommonsG1 {
                tau: self.g1.tau[..2 * domain_size - 1].to_vec(),
                alpha_tau: self.g1.alpha_tau[..domain_size].to_vec(),
                beta_tau: self.g1.beta_tau[..domain_size].to_vec(),
            },
            g2: CommonsG2 {
                tau: self.g2.tau[..domain_size].to_vec(),
                beta: self.g2.beta,
            },
        })
    }

    /// Length invariants plus the generator anchors.
    pub(crate) fn check_shape(&self) -> Result<()> {
        let n = self.domain_size();
        check_domain_size(n)?;
        if self.g1.tau.len() != 2 * n - 1 {
            return Err(SetupError::malformed(
                "G1.Tau",
                format!("expected {} powers, found {}", 2 * n - 1, self.g1.tau.len()),
            ));
        }
        if self.g1.beta_tau.len() != n {
            return Err(SetupError::malformed(
                "G1.BetaTau",
                format!("expected {n} powers, found {}", self.g1.beta_tau.len()),
            ));
        }
        if self.g2.tau.len() != n {
            return Err(SetupError::malformed(
                "G2.Tau",
                format!("expected {n} powers, found {}", self.g2.tau.len()),
            ));
        }
        check_generators("Tau", &self.g1.tau, &self.g2.tau)
    }

    /// Checks that every sequence is a geometric progression in the tau
    /// committed to by `g1.tau[1]` / `g2.tau[1]`, using one batched pairing
    /// equation per sequence.
    pub(crate) fn check_powers(&self) -> Result<()> {
        let tau_g1 = self.g1.tau[1];
        let tau_g2 = self.g2.tau[1];
        let ((tau, alpha), (beta, g2)) = rayon::join(
            || {
                rayon::join(
                    || g1_powers_consistent(&self.g1.tau, tau_g2),
                    || g1_powers_consistent(&self.g1.alpha_tau, tau_g2),
                )
            },
            || {
                rayon::join(
                    || g1_powers_consistent(&self.g1.beta_tau, tau_g2),
                    || g2_powers_consistent(&self.g2.tau, tau_g1),
                )
            },
        );
        let checks = [
            (tau, "G1.Tau powers"),
            (alpha, "G1.AlphaTau powers"),
            (beta, "G1.BetaTau powers"),
            (g2, "G2.Tau powers"),
        ];
        for (ok, label) in checks {
            if !ok {
                return Err(SetupError::InvalidContribution(label));
            }
        }
        debug!(domain_size = self.domain_size(), "powers are consistent");
        Ok(())
    }
}

/// e(sum r^i v[i], [tau]_2) == e(sum r^i v[i+1], [1]_2)
fn g1_powers_consistent(v: &[G1Affine], tau_g2: G2Affine) -> bool {
    let coeffs: Vec<ScalarField> = random_coefficients(v.len() - 1, &mut rand::thread_rng());
    match (
        linear_combination(&v[..v.len() - 1], &coeffs),
        linear_combination(&v[1..], &coeffs),
    ) {
        (Some(lo), Some(hi)) => same_ratio(lo.into(), hi.into(), g2_generator(), tau_g2),
        _ => false,
    }
}

/// e([1]_1, sum r^i v[i+1]) == e([tau]_1, sum r^i v[i])
fn g2_powers_consistent(v: &[G2Affine], tau_g1: G1Affine) -> bool {
    let coeffs: Vec<ScalarField> = random_coefficients(v.len() - 1, &mut rand::thread_rng());
    match (
        linear_combination(&v[..v.len() - 1], &coeffs),
        linear_combination(&v[1..], &coeffs),
    ) {
        (Some(lo), Some(hi)) => same_ratio(g1_generator(), tau_g1, lo.into(), hi.into()),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_rejects_bad_domain() {
        assert!(SrsCommons::new(0).is_err());
        assert!(SrsCommons::new(1).is_err());
        assert!(SrsCommons::new(12).is_err());
        let c = SrsCommons::new(8).unwrap();
        assert_eq!(c.g1.tau.len(), 15);
        assert_eq!(c.g1.alpha_tau.len(), 8);
        assert_eq!(c.g2.tau.len(), 8);
        assert!(c.check_shape().is_ok());
        assert!(c.check_powers().is_ok());
    }

    #[test]
    fn test_update_powers() {
        let mut c = SrsCommons::new(4).unwrap();
        let (tau, alpha, beta) = (
            ScalarField::from(2u64),
            ScalarField::from(3u64),
            ScalarField::from(5u64),
        );
        c.update(&tau, &alpha, &beta);
        assert_eq!(c.g1.tau[0], g1_generator());
        assert_eq!(c.g1.tau[6], G1Affine::from(g1_generator() * ScalarField::from(64u64)));
        assert_eq!(c.g1.alpha_tau[2], G1Affine::from(g1_generator() * ScalarField::from(12u64)));
        assert_eq!(c.g1.beta_tau[3], G1Affine::from(g1_generator() * ScalarField::from(40u64)));
        assert_eq!(c.g2.tau[3], G2Affine::from(g2_generator() * ScalarField::from(8u64)));
        assert_eq!(c.g2.beta, G2Affine::from(g2_generator() * beta));
        assert!(c.check_powers().is_ok());

        c.g1.alpha_tau[3] = c.g1.alpha_tau[2];
        assert!(matches!(
            c.check_powers(),
            Err(SetupError::InvalidContribution("G1.AlphaTau powers"))
        ));
    }

    #[test]
    fn test_truncated() {
        let mut c = SrsCommons::new(8).unwrap();
        c.update(&ScalarField::from(7u64), &ScalarField::from(2u64), &ScalarField::from(9u64));
        let t = c.truncated(4).unwrap();
        assert_eq!(t.domain_size(), 4);
        assert_eq!(t.g1.tau.len(), 7);
        assert_eq!(t.g1.tau[..], c.g1.tau[..7]);
        assert!(t.check_shape().is_ok());
        assert!(t.check_powers().is_ok());
        assert!(matches!(
            c.truncated(16),
            Err(SetupError::DomainTooSmall { required: 16, available: 8 })
        ));
    }
}
