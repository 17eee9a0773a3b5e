use crate::group_structures::ScalarField;
use crate::vector_operations::{batch_into_affine, bit_reverse, powers};
use ark_ec::{AffineRepr, CurveGroup};
use ark_ff::{FftField, Field};
use rayon::prelude::*;

/// Multiplicative subgroup of size `cardinality` generated by a primitive root of unity.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RadixDomain {
    pub cardinality: u64,
    pub cardinality_inv: ScalarField,
    pub generator: ScalarField,
    pub generator_inv: ScalarField,
}

impl RadixDomain {
    /// `None` unless `size` is a power of two the scalar field supports.
    pub fn new(size: usize) -> Option<Self> {
        if size < 2 || !size.is_power_of_two() {
            return None;
        }
        let generator = ScalarField::get_root_of_unity(size as u64)?;
        Some(Self {
            cardinality: size as u64,
            cardinality_inv: ScalarField::from(size as u64).inverse()?,
            generator,
            generator_inv: generator.inverse()?,
        })
    }

    pub fn size(&self) -> usize {
        self.cardinality as usize
    }

    /// Rebuilds the domain from its cardinality, failing if the stored
    /// generator does not match.
    pub fn check(&self) -> bool {
        match Self::new(self.cardinality as usize) {
            Some(d) => d == *self,
            None => false,
        }
    }
}

/// In-place radix-2 inverse DFT (without the 1/n factor) over group elements:
/// a[k] <- sum_j a[j] * omega_inv^(jk).
fn ifft_in_place<G: CurveGroup<ScalarField = ScalarField>>(a: &mut [G], domain: &RadixDomain) {
    let n = a.len();
    bit_reverse(a);
    let mut m = 1;
    while m < n {
        let w_m = domain.generator_inv.pow([(n / (2 * m)) as u64]);
        let twiddles = powers(w_m, m);
        a.par_chunks_mut(2 * m).for_each(|chunk| {
            let (lo, hi) = chunk.split_at_mut(m);
            for j in 0..m {
                let t = hi[j] * twiddles[j];
                hi[j] = lo[j] - t;
                lo[j] += t;
            }
        });
        m *= 2;
    }
}

/// Converts [tau^0], ..., [tau^(n-1)] into the Lagrange basis [L_0(tau)], ..., [L_(n-1)(tau)]
/// over `domain`. Reads exactly `domain.size()` monomials.
pub fn lagrange_coeffs<A>(monomials: &[A], domain: &RadixDomain) -> Option<Vec<A>>
where
    A: AffineRepr<ScalarField = ScalarField>,
{
    let n = domain.size();
    if monomials.len() < n {
        return None;
    }
    let mut acc: Vec<A::Group> = monomials[..n].par_iter().map(|p| p.into_group()).collect();
    ifft_in_place(&mut acc, domain);
    acc.par_iter_mut().for_each(|p| *p *= domain.cardinality_inv);
    Some(batch_into_affine(&acc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::group_structures::{g1_generator, g2_generator, G1Affine, G2Affine};
    use ark_ff::One;

    /// L_i(x) = (1/n) * sum_j (omega^-i x)^j
    fn lagrange_at(domain: &RadixDomain, i: usize, x: ScalarField) -> ScalarField {
        let n = domain.size();
        let y = domain.generator_inv.pow([i as u64]) * x;
        powers(y, n).into_iter().sum::<ScalarField>() * domain.cardinality_inv
    }

    #[test]
    fn test_domain() {
        let d = RadixDomain::new(8).unwrap();
        assert_eq!(d.generator.pow([8u64]), ScalarField::one());
        assert_ne!(d.generator.pow([4u64]), ScalarField::one());
        assert!(d.check());
        assert!(RadixDomain::new(6).is_none());
        assert!(RadixDomain::new(1).is_none());
    }

    #[test]
    fn test_lagrange_coeffs() {
        let tau = ScalarField::from(1234567u64);
        let domain = RadixDomain::new(8).unwrap();
        let taus = powers(tau, 10);
        let g1: Vec<G1Affine> = taus.iter().map(|t| (g1_generator() * t).into()).collect();
        let g2: Vec<G2Affine> = taus.iter().map(|t| (g2_generator() * t).into()).collect();

        let l1 = lagrange_coeffs(&g1, &domain).unwrap();
        let l2 = lagrange_coeffs(&g2, &domain).unwrap();
        assert_eq!(l1.len(), 8);
        for i in 0..8 {
            let expected = lagrange_at(&domain, i, tau);
            assert_eq!(l1[i], G1Affine::from(g1_generator() * expected));
            assert_eq!(l2[i], G2Affine::from(g2_generator() * expected));
        }
        assert!(lagrange_coeffs(&g1[..4], &domain).is_none());
    }
}
