use ark_ec::{AffineRepr, CurveGroup, VariableBaseMSM};
use ark_ff::{Field, One};
use ark_std::UniformRand;
use rand::Rng;
use rayon::prelude::*;

/// Minimum number of points handed to a single worker.
const MIN_CHUNK: usize = 256;

fn chunk_len(len: usize) -> usize {
    let workers = rayon::current_num_threads().max(1);
    len.div_ceil(workers).max(MIN_CHUNK)
}

/// [1, x, x^2, ..., x^(n-1)]
pub fn powers<F: Field>(x: F, n: usize) -> Vec<F> {
    let mut out = vec![F::one(); n];
    let chunk = chunk_len(n);
    out.par_chunks_mut(chunk).enumerate().for_each(|(k, c)| {
        let mut cur = x.pow([(k * chunk) as u64]);
        for v in c.iter_mut() {
            *v = cur;
            cur *= x;
        }
    });
    out
}

/// points[i] <- points[i] * scalar
pub fn scale_in_place<A: AffineRepr>(points: &mut [A], scalar: A::ScalarField) {
    scale_by_powers_in_place(points, scalar, A::ScalarField::one());
}

/// points[i] <- points[i] * (base * x^i)
///
/// Each worker owns a disjoint chunk, converts it back to affine with a single
/// batch inversion and writes it in place.
pub fn scale_by_powers_in_place<A: AffineRepr>(
    points: &mut [A],
    base: A::ScalarField,
    x: A::ScalarField,
) {
    let chunk = chunk_len(points.len());
    points.par_chunks_mut(chunk).enumerate().for_each(|(k, c)| {
        let mut coeff = base * x.pow([(k * chunk) as u64]);
        let scaled: Vec<A::Group> = c
            .iter()
            .map(|p| {
                let r = *p * coeff;
                coeff *= x;
                r
            })
            .collect();
        c.copy_from_slice(&A::Group::normalize_batch(&scaled));
    });
}

/// Normalizes projective points in parallel chunks.
pub fn batch_into_affine<G: CurveGroup>(points: &[G]) -> Vec<G::Affine> {
    let chunk = chunk_len(points.len());
    points
        .par_chunks(chunk)
        .flat_map_iter(|c| G::normalize_batch(c))
        .collect()
}

/// sum_i points[i] * coeffs[i]
///
/// Returns `None` on a length mismatch.
pub fn linear_combination<A: AffineRepr>(points: &[A], coeffs: &[A::ScalarField]) -> Option<A::Group> {
    if points.len() != coeffs.len() {
        return None;
    }
    <A::Group as VariableBaseMSM>::msm(points, coeffs).ok()
}

/// Powers of a freshly sampled scalar, used to batch many pairing equations into one.
pub fn random_coefficients<F: Field + UniformRand, R: Rng + ?Sized>(n: usize, rng: &mut R) -> Vec<F> {
    let r = F::rand(rng);
    powers(r, n)
}

/// In-place bit-reversal permutation. `v.len()` must be a power of two.
pub fn bit_reverse<T>(v: &mut [T]) {
    let n = v.len();
    if n <= 2 {
        return;
    }
    debug_assert!(n.is_power_of_two());
    let shift = usize::BITS - n.trailing_zeros();
    for i in 0..n {
        let j = i.reverse_bits() >> shift;
        if i < j {
            v.swap(i, j);
        }
    }
}

pub fn count_identity<A: AffineRepr>(points: &[A]) -> usize {
    points.par_iter().filter(|p| p.is_zero()).count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::group_structures::{g1_generator, G1Affine, G1Projective, ScalarField};
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    #[test]
    fn test_powers() {
        let x = ScalarField::from(3u64);
        let p = powers(x, 1000);
        assert_eq!(p[0], ScalarField::one());
        assert_eq!(p[1], x);
        assert_eq!(p[999], x.pow([999u64]));
        assert!(powers(x, 0).is_empty());
    }

    #[test]
    fn test_scale_by_powers_matches_naive() {
        let mut rng = ChaCha20Rng::seed_from_u64(1);
        let points: Vec<G1Affine> = (0..600)
            .map(|_| (g1_generator() * ScalarField::rand(&mut rng)).into())
            .collect();
        let base = ScalarField::rand(&mut rng);
        let x = ScalarField::rand(&mut rng);

        let mut scaled = points.clone();
        scale_by_powers_in_place(&mut scaled, base, x);

        let mut coeff = base;
        for (p, s) in points.iter().zip(scaled.iter()) {
            assert_eq!(G1Affine::from(*p * coeff), *s);
            coeff *= x;
        }
    }

    #[test]
    fn test_scale_keeps_identity() {
        let mut points = vec![G1Affine::zero(), g1_generator()];
        scale_in_place(&mut points, ScalarField::from(9u64));
        assert!(points[0].is_zero());
        assert_eq!(points[1], G1Affine::from(g1_generator() * ScalarField::from(9u64)));
    }

    #[test]
    fn test_linear_combination() {
        let points = vec![g1_generator(); 4];
        let coeffs: Vec<ScalarField> = (1..=4u64).map(ScalarField::from).collect();
        let lc = linear_combination(&points, &coeffs).unwrap();
        assert_eq!(lc, G1Projective::from(g1_generator()) * ScalarField::from(10u64));
        assert!(linear_combination(&points, &coeffs[..3]).is_none());
    }

    #[test]
    fn test_bit_reverse() {
        let mut v: Vec<usize> = (0..8).collect();
        bit_reverse(&mut v);
        assert_eq!(v, vec![0, 4, 2, 6, 1, 5, 3, 7]);
        bit_reverse(&mut v);
        assert_eq!(v, (0..8).collect::<Vec<_>>());

        let mut two = vec![0, 1];
        bit_reverse(&mut two);
        assert_eq!(two, vec![0, 1]);
    }
}
