use ark_bls12_381::{g2, Bls12_381};
use ark_ec::hashing::curve_maps::wb::WBMap;
use ark_ec::hashing::map_to_curve_hasher::MapToCurveBasedHasher;
use ark_ec::hashing::{HashToCurve, HashToCurveError};
use ark_ec::pairing::{Pairing, PairingOutput};
use ark_ec::AffineRepr;
use ark_ff::field_hashers::DefaultFieldHasher;
use ark_ff::Zero;
use blake2::Blake2b512;

pub use ark_bls12_381::{
    Fr as ScalarField, G1Affine, G1Projective, G2Affine, G2Projective,
};

pub type Gt = PairingOutput<Bls12_381>;

/// Domain separation tag for every hash-to-G2 evaluation in the workspace.
pub const HASH_TO_G2_DST: &[u8] = b"BLS12381G2_XMD:BLAKE2B_SSWU_RO_MPC_SETUP_";

type G2Hasher =
    MapToCurveBasedHasher<G2Projective, DefaultFieldHasher<Blake2b512, 128>, WBMap<g2::Config>>;

pub fn g1_generator() -> G1Affine {
    G1Affine::generator()
}

pub fn g2_generator() -> G2Affine {
    G2Affine::generator()
}

/// Product of pairings: prod_i e(lhs[i], rhs[i]).
pub fn pairing(lhs: &[G1Affine], rhs: &[G2Affine]) -> Gt {
    Bls12_381::multi_pairing(lhs.iter().copied(), rhs.iter().copied())
}

/// Checks e(g1_0, g2_1) == e(g1_1, g2_0), i.e. that g1_1/g1_0 and g2_1/g2_0
/// share the same discrete-log ratio.
pub fn same_ratio(g1_0: G1Affine, g1_1: G1Affine, g2_0: G2Affine, g2_1: G2Affine) -> bool {
    let neg_g1_1 = -g1_1;
    pairing(&[g1_0, neg_g1_1], &[g2_1, g2_0]).is_zero()
}

/// Random-oracle map into G2. The discrete log of the output with respect to
/// the generator is unknown to everyone, which the proofs of knowledge rely on.
pub fn hash_to_g2(msg: &[u8]) -> Result<G2Affine, HashToCurveError> {
    let hasher = G2Hasher::new(HASH_TO_G2_DST)?;
    hasher.hash(msg)
}
