use crate::circuit::ConstraintSystem;
use crate::commons::SrsCommons;
use crate::errors::{Result, SetupError};
use ark_ec::AffineRepr;
use ark_ff::{One, Zero};
use libs::group_structures::{G1Affine, G1Projective, G2Affine, G2Projective, ScalarField};
use libs::polynomial_structures::{lagrange_coeffs, RadixDomain};
use libs::vector_operations::batch_into_affine;
use rayon::prelude::*;
use std::time::Instant;
use tracing::debug;

/// Circuit-specific values computed once from the SRS. Public and immutable
/// for the rest of the ceremony.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Phase2Evaluations {
    pub g1: EvaluationsG1,
    pub g2: EvaluationsG2,
    /// Per commitment, the public and commitment wires it binds.
    pub public_and_commitment_committed: Vec<Vec<u64>>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EvaluationsG1 {
    /// [A_j(tau)]_1 per wire.
    pub a: Vec<G1Affine>,
    /// [B_j(tau)]_1 per wire.
    pub b: Vec<G1Affine>,
    /// [beta A_j + alpha B_j + C_j]_1 for public and commitment wires.
    pub vkk: Vec<G1Affine>,
    /// The same terms for the private wires of each commitment.
    pub ckk: Vec<Vec<G1Affine>>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EvaluationsG2 {
    /// [B_j(tau)]_2 per wire.
    pub b: Vec<G2Affine>,
}

impl Phase2Evaluations {
    pub fn nb_wires(&self) -> usize {
        self.g1.a.len()
    }

    pub fn nb_commitments(&self) -> usize {
        self.g1.ckk.len()
    }

    pub(crate) fn check_shape(&self) -> Result<()> {
        if self.g1.b.len() != self.g1.a.len() || self.g2.b.len() != self.g1.a.len() {
            return Err(SetupError::malformed(
                "evaluations",
                format!(
                    "A/B lengths differ: {} / {} / {}",
                    self.g1.a.len(),
                    self.g1.b.len(),
                    self.g2.b.len()
                ),
            ));
        }
        if self.public_and_commitment_committed.len() != self.g1.ckk.len() {
            return Err(SetupError::malformed(
                "evaluations",
                "commitment bookkeeping does not match the commitment bases",
            ));
        }
        Ok(())
    }
}

/// Private-wire K terms and vanishing-polynomial terms, before any delta.
pub(crate) struct ProverTerms {
    pub pkk: Vec<G1Affine>,
    pub z: Vec<G1Affine>,
}

/// Evaluates the QAP polynomials of every wire at the secret tau, in the
/// exponent, and splits the K terms by wire visibility.
pub(crate) fn evaluate(
    commons: &SrsCommons,
    cs: &ConstraintSystem,
) -> Result<(Phase2Evaluations, ProverTerms)> {
    let start = Instant::now();
    cs.validate()?;
    commons.check_shape()?;
    let n = commons.domain_size();
    if cs.constraints.len() > n {
        return Err(SetupError::DomainTooSmall {
            required: cs.constraints.len(),
            available: n,
        });
    }
    let domain = RadixDomain::new(n)
        .ok_or_else(|| SetupError::InternalInvariant(format!("no radix-2 domain of size {n}")))?;

    let ((tau_g1, alpha_g1), (beta_g1, tau_g2)) = rayon::join(
        || {
            rayon::join(
                || lagrange_coeffs(&commons.g1.tau, &domain),
                || lagrange_coeffs(&commons.g1.alpha_tau, &domain),
            )
        },
        || {
            rayon::join(
                || lagrange_coeffs(&commons.g1.beta_tau, &domain),
                || lagrange_coeffs(&commons.g2.tau, &domain),
            )
        },
    );
    let missing = || SetupError::InternalInvariant("lagrange conversion".into());
    let (tau_g1, alpha_g1) = (tau_g1.ok_or_else(missing)?, alpha_g1.ok_or_else(missing)?);
    let (beta_g1, tau_g2) = (beta_g1.ok_or_else(missing)?, tau_g2.ok_or_else(missing)?);

    let nb_wires = cs.nb_wires();
    let mut a = vec![G1Projective::zero(); nb_wires];
    let mut b1 = vec![G1Projective::zero(); nb_wires];
    let mut b2 = vec![G2Projective::zero(); nb_wires];
    let mut k = vec![G1Projective::zero(); nb_wires];

    for (i, c) in cs.constraints.iter().enumerate() {
        for t in &c.l {
            a[t.wire] += mul_coeff(&tau_g1[i], &t.coeff);
            k[t.wire] += mul_coeff(&beta_g1[i], &t.coeff);
        }
        for t in &c.r {
            b1[t.wire] += mul_coeff(&tau_g1[i], &t.coeff);
            b2[t.wire] += mul_coeff(&tau_g2[i], &t.coeff);
            k[t.wire] += mul_coeff(&alpha_g1[i], &t.coeff);
        }
        for t in &c.o {
            k[t.wire] += mul_coeff(&tau_g1[i], &t.coeff);
        }
    }

    let private_committed = cs.private_committed_wires();
    let commitment_wires = cs.commitment_wires();
    let mut vkk = Vec::new();
    let mut pkk = Vec::new();
    let mut ckk = vec![Vec::new(); cs.commitments.len()];
    for (j, kj) in batch_into_affine(&k).into_iter().enumerate() {
        if let Some(&c) = private_committed.get(&j) {
            ckk[c].push(kj);
        } else if j < cs.nb_public || commitment_wires.contains(&j) {
            vkk.push(kj);
        } else {
            pkk.push(kj);
        }
    }

    // Z[i] = [tau^i (tau^n - 1)]_1 for i <= n-2; tau^(2n-1) is never generated
    let mut z: Vec<G1Projective> = (0..n - 1)
        .into_par_iter()
        .map(|i| commons.g1.tau[i + n].into_group() - commons.g1.tau[i])
        .collect();
    z.push(G1Projective::zero());

    let evals = Phase2Evaluations {
        g1: EvaluationsG1 {
            a: batch_into_affine(&a),
            b: batch_into_affine(&b1),
            vkk,
            ckk,
        },
        g2: EvaluationsG2 {
            b: batch_into_affine(&b2),
        },
        public_and_commitment_committed: cs.public_and_commitment_committed(),
    };
    debug!(
        nb_wires,
        nb_constraints = cs.constraints.len(),
        nb_commitments = cs.commitments.len(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "evaluations computed"
    );
    Ok((
        evals,
        ProverTerms {
            pkk,
            z: batch_into_affine(&z),
        },
    ))
}

fn mul_coeff<A: AffineRepr<ScalarField = ScalarField>>(p: &A, coeff: &ScalarField) -> A::Group {
    if coeff.is_one() {
        p.into_group()
    } else if (-*coeff).is_one() {
        -p.into_group()
    } else {
        *p * coeff
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit::{CommitmentInfo, Constraint, Term};
    use libs::group_structures::g1_generator;
    use libs::vector_operations::powers;

    /// x * x = y with x secret, y public.
    fn square() -> ConstraintSystem {
        ConstraintSystem {
            nb_public: 2,
            nb_secret: 1,
            nb_internal: 0,
            constraints: vec![Constraint {
                l: vec![Term::new(2, ScalarField::one())],
                r: vec![Term::new(2, ScalarField::one())],
                o: vec![Term::new(1, ScalarField::one())],
            }],
            commitments: vec![],
        }
    }

    #[test]
    fn test_evaluate_matches_direct_computation() {
        let tau = ScalarField::from(17u64);
        let (alpha, beta) = (ScalarField::from(5u64), ScalarField::from(6u64));
        let mut commons = SrsCommons::new(2).unwrap();
        commons.update(&tau, &alpha, &beta);

        let (evals, terms) = evaluate(&commons, &square()).unwrap();
        let domain = RadixDomain::new(2).unwrap();
        // L_0(x) = (1 + x) / 2 over {1, -1}
        let l0 = (ScalarField::one() + tau) * domain.cardinality_inv;

        assert_eq!(evals.g1.a[2], G1Affine::from(g1_generator() * l0));
        assert!(evals.g1.a[0].is_zero() && evals.g1.a[1].is_zero());
        assert_eq!(evals.g1.b[2], evals.g1.a[2]);
        assert_eq!(evals.g1.vkk.len(), 2);
        assert!(evals.g1.vkk[0].is_zero());
        assert_eq!(evals.g1.vkk[1], G1Affine::from(g1_generator() * l0));
        assert_eq!(terms.pkk, vec![G1Affine::from(g1_generator() * ((beta + alpha) * l0))]);

        let taus = powers(tau, 4);
        assert_eq!(terms.z.len(), 2);
        assert_eq!(terms.z[0], G1Affine::from(g1_generator() * (taus[2] - taus[0])));
        assert!(terms.z[1].is_zero());
    }

    #[test]
    fn test_commitment_split() {
        let mut cs = square();
        cs.nb_internal = 1;
        cs.constraints.push(Constraint {
            l: vec![Term::new(3, ScalarField::one())],
            r: vec![Term::new(0, ScalarField::one())],
            o: vec![Term::new(3, ScalarField::one())],
        });
        cs.commitments.push(CommitmentInfo {
            commitment_wire: 3,
            private_committed: vec![2],
            public_and_commitment_committed: vec![1],
        });
        let commons = SrsCommons::new(2).unwrap();
        let (evals, terms) = evaluate(&commons, &cs).unwrap();
        assert_eq!(evals.g1.vkk.len(), 3);
        assert_eq!(evals.g1.ckk.len(), 1);
        assert_eq!(evals.g1.ckk[0].len(), 1);
        assert!(terms.pkk.is_empty());
        assert_eq!(evals.public_and_commitment_committed, vec![vec![1]]);
    }

    #[test]
    fn test_domain_too_small() {
        let mut cs = square();
        cs.constraints.push(cs.constraints[0].clone());
        cs.constraints.push(cs.constraints[0].clone());
        let commons = SrsCommons::new(2).unwrap();
        assert!(matches!(
            evaluate(&commons, &cs),
            Err(SetupError::DomainTooSmall { required: 3, available: 2 })
        ));
    }
}
