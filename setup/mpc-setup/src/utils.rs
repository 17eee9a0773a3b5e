use crate::errors::{Result, SetupError};
use ark_ec::AffineRepr;
use ark_ff::{PrimeField, Zero};
use ark_serialize::{CanonicalSerialize, Compress};
use ark_std::UniformRand;
use blake2::{Blake2b512, Digest};
use blake3::Hasher;
use clap::ValueEnum;
use libs::group_structures::{
    g1_generator, g2_generator, hash_to_g2, same_ratio, G1Affine, G2Affine, ScalarField,
};
use libs::vector_operations::{linear_combination, random_coefficients};
use rand::rngs::OsRng;
use rayon::prelude::*;
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Blake2b-512 transcript digest.
pub type Challenge = [u8; 64];

pub const GENESIS_CHALLENGE: Challenge = [0u8; 64];

pub fn list_files_map(folder: &str) -> io::Result<HashMap<String, PathBuf>> {
    let mut file_map = HashMap::new();
    for entry in fs::read_dir(folder)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_file() {
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                file_map.insert(stem.to_string(), path);
            }
        }
    }
    Ok(file_map)
}

/// `<outfolder>/<kind>_<index>.bin`, e.g. `phase1_state_3.bin`.
pub fn round_path(outfolder: &str, kind: &str, index: u64) -> PathBuf {
    Path::new(outfolder).join(format!("{kind}_{index}.bin"))
}

/// Highest index among the `<kind>_<index>` files of the folder.
pub fn latest_round(outfolder: &str, kind: &str) -> io::Result<Option<u64>> {
    let prefix = format!("{kind}_");
    Ok(list_files_map(outfolder)?
        .keys()
        .filter_map(|stem| stem.strip_prefix(&prefix)?.parse::<u64>().ok())
        .max())
}

pub fn check_outfolder_writable(path: &str) -> io::Result<()> {
    let path = Path::new(path);

    if !path.exists() {
        return Err(io::Error::new(
            io::ErrorKind::NotFound,
            "Folder does not exist",
        ));
    }
    if !path.is_dir() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "Path is not a directory",
        ));
    }

    let test_file_path = path.join(".test_write_permission");
    let result = File::create(&test_file_path).and_then(|mut f| f.write_all(b"test"));
    if test_file_path.exists() {
        let _ = fs::remove_file(test_file_path);
    }

    result
}

/// Random-oracle base for a proof of knowledge: R = H(challenge || dst || [x]_1).
pub fn ro(commitment: &G1Affine, challenge: &[u8], dst: u8) -> Result<G2Affine> {
    let mut bytes = Vec::with_capacity(commitment.uncompressed_size());
    commitment
        .serialize_with_mode(&mut bytes, Compress::No)
        .map_err(|e| SetupError::InternalInvariant(e.to_string()))?;

    let mut h = Blake2b512::new();
    h.update(challenge);
    h.update([dst]);
    h.update(&bytes);
    hash_to_g2(&h.finalize()).map_err(|e| SetupError::InternalInvariant(e.to_string()))
}

/// One vector of values that the contribution scalar x must have multiplied.
pub enum ValueUpdate<'a> {
    G1 {
        label: &'static str,
        previous: &'a [G1Affine],
        next: &'a [G1Affine],
    },
    G2 {
        label: &'static str,
        previous: &'a [G2Affine],
        next: &'a [G2Affine],
    },
}

impl ValueUpdate<'_> {
    /// Checks next = x * previous for the x committed to in `commitment`,
    /// batching the whole vector into one pairing equation.
    fn check(&self, commitment: &G1Affine, r: &G2Affine, pok: &G2Affine) -> Result<()> {
        match self {
            ValueUpdate::G1 {
                label,
                previous,
                next,
            } => {
                let (prev, next) = combine(label, previous, next)?;
                if !same_ratio(prev, next, *r, *pok) {
                    return Err(SetupError::InvalidContribution(label));
                }
            }
            ValueUpdate::G2 {
                label,
                previous,
                next,
            } => {
                let (prev, next) = combine(label, previous, next)?;
                if !same_ratio(g1_generator(), *commitment, prev, next) {
                    return Err(SetupError::InvalidContribution(label));
                }
            }
        }
        Ok(())
    }
}

fn combine<A: AffineRepr<ScalarField = ScalarField>>(
    label: &'static str,
    previous: &[A],
    next: &[A],
) -> Result<(A, A)> {
    if previous.len() != next.len() {
        return Err(SetupError::malformed(
            label,
            format!("length {} does not match previous length {}", next.len(), previous.len()),
        ));
    }
    let coeffs: Vec<ScalarField> = random_coefficients(previous.len(), &mut rand::thread_rng());
    let lc = |v: &[A]| {
        linear_combination(v, &coeffs)
            .map(Into::into)
            .ok_or_else(|| SetupError::InternalInvariant("linear combination length".into()))
    };
    Ok((lc(previous)?, lc(next)?))
}

/// Proof that the contributor knows the scalar x it multiplied into one or
/// more values: the commitment [x]_1 and x * R, where R hashes the
/// commitment together with the transcript challenge.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UpdateProof {
    pub contribution_commitment: G1Affine,
    pub contribution_pok: G2Affine,
}

impl UpdateProof {
    pub fn new(x: &ScalarField, challenge: &[u8], dst: u8) -> Result<Self> {
        if x.is_zero() {
            return Err(SetupError::InvalidContribution("zero contribution"));
        }
        let contribution_commitment: G1Affine = (g1_generator() * x).into();
        let r = ro(&contribution_commitment, challenge, dst)?;
        Ok(Self {
            contribution_commitment,
            contribution_pok: (r * x).into(),
        })
    }

    /// Verifies the proof of knowledge, then every update against it. All
    /// checks run to completion before the first failure is reported.
    pub fn verify(&self, challenge: &[u8], dst: u8, updates: &[ValueUpdate<'_>]) -> Result<()> {
        if self.contribution_commitment.is_zero() || self.contribution_pok.is_zero() {
            return Err(SetupError::InvalidContribution("contribution commitment"));
        }
        let r = ro(&self.contribution_commitment, challenge, dst)?;
        let (pok, updates) = rayon::join(
            || same_ratio(g1_generator(), self.contribution_commitment, r, self.contribution_pok),
            || {
                updates
                    .par_iter()
                    .map(|u| u.check(&self.contribution_commitment, &r, &self.contribution_pok))
                    .collect::<Vec<_>>()
            },
        );
        if !pok {
            return Err(SetupError::InvalidContribution("proof of knowledge"));
        }
        updates.into_iter().collect::<Result<Vec<()>>>()?;
        debug!(dst, "update proof verified");
        Ok(())
    }
}

/// Derives `count` non-zero scalars from public data only:
/// Blake2b(digest || dst || beacon || counter_le) mod r, skipping zeros.
pub fn beacon_contributions(
    digest: &[u8],
    dst: &[u8],
    beacon: &[u8],
    count: usize,
) -> Vec<ScalarField> {
    let mut out = Vec::with_capacity(count);
    let mut counter = 0u64;
    while out.len() < count {
        let mut h = Blake2b512::new();
        h.update(digest);
        h.update(dst);
        h.update(beacon);
        h.update(counter.to_le_bytes());
        counter += 1;
        let s = ScalarField::from_le_bytes_mod_order(&h.finalize());
        if !s.is_zero() {
            out.push(s);
        }
    }
    out
}

/// Decodes a hex beacon, e.g. a block hash. An optional `0x` prefix is accepted.
pub fn parse_beacon(hex_beacon: &str) -> Result<Vec<u8>> {
    let trimmed = hex_beacon.trim();
    let bytes = hex::decode(trimmed.strip_prefix("0x").unwrap_or(trimmed))
        .map_err(|e| SetupError::malformed("beacon", e))?;
    if bytes.is_empty() {
        return Err(SetupError::malformed("beacon", "empty"));
    }
    Ok(bytes)
}

/// Represents different strategies for random number generation
#[derive(Debug, Clone, Default)]
pub enum RandomStrategy {
    /// Uses only user-provided input
    UserInput,
    /// Uses only system random generator
    #[default]
    SystemRandom,
    /// Combines both user input and system random
    Hybrid,
    /// Used for testing with deterministic values
    Testing,
}

pub struct RandomGenerator {
    strategy: RandomStrategy,
    current_seed: [u8; 32],
    pub iteration_count: usize,
}

impl RandomGenerator {
    /// Creates a new random generator with the specified strategy and seed
    ///
    /// # Arguments
    /// * `strategy` - The random generation strategy to use
    /// * `initial_seed` - Initial seed value as 32 bytes
    pub fn new(strategy: RandomStrategy, initial_seed: [u8; 32]) -> Self {
        Self {
            strategy,
            current_seed: initial_seed,
            iteration_count: 0,
        }
    }

    /// Reduces the current seed to a scalar and advances the Blake3 chain.
    pub fn next_scalar(&mut self) -> ScalarField {
        let scalar = ScalarField::from_le_bytes_mod_order(&self.current_seed);
        let mut hasher = Hasher::new();
        hasher.update(&self.current_seed);
        self.current_seed.copy_from_slice(hasher.finalize().as_bytes());
        scalar
    }

    /// Generates the next random value according to the chosen strategy.
    /// Never returns zero.
    pub fn next_random(&mut self) -> ScalarField {
        loop {
            let out = match self.strategy {
                RandomStrategy::UserInput => self.next_scalar(),
                RandomStrategy::SystemRandom => ScalarField::rand(&mut OsRng),
                RandomStrategy::Hybrid => self.next_scalar() + ScalarField::rand(&mut OsRng),
                RandomStrategy::Testing => {
                    self.iteration_count += 1;
                    ScalarField::from((self.iteration_count * 2 + 1) as u64)
                }
            };
            if !out.is_zero() {
                return out;
            }
        }
    }
}

#[derive(Debug, Clone, ValueEnum)]
pub enum Mode {
    Testing,
    Random,
    Beacon, //deterministic from a given seed
}

pub fn prompt_user_input(title: &str) -> io::Result<String> {
    print!("{}", title);
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim().to_string())
}

pub fn seed_from_user_input(input: &str) -> [u8; 32] {
    let mut hasher = Hasher::new();
    hasher.update(input.trim().as_bytes());
    *hasher.finalize().as_bytes()
}

/// Initializes a random generator based on the specified mode. `seed_input`
/// is ignored in testing mode.
pub fn initialize_random_generator(mode: &Mode, seed_input: &str) -> RandomGenerator {
    let (strategy, message, seed) = match mode {
        Mode::Testing => (
            RandomStrategy::Testing,
            "Initializing random generator in testing mode",
            [0u8; 32],
        ),
        Mode::Beacon => (
            RandomStrategy::UserInput,
            "Initializing random generator in deterministic mode",
            seed_from_user_input(seed_input),
        ),
        Mode::Random => (
            RandomStrategy::Hybrid,
            "Initializing random generator in hybrid random mode",
            seed_from_user_input(seed_input),
        ),
    };

    info!("{}", message);
    RandomGenerator::new(strategy, seed)
}

/// Checks that both vectors start at the canonical generators.
pub(crate) fn check_generators(field: &'static str, g1: &[G1Affine], g2: &[G2Affine]) -> Result<()> {
    match (g1.first(), g2.first()) {
        (Some(a), Some(b)) if *a == g1_generator() && *b == g2_generator() => Ok(()),
        _ => Err(SetupError::malformed(field, "first element is not the generator")),
    }
}

#[test]
pub fn test_pok() {
    let x = ScalarField::from(72u64);
    let challenge = [9u8; 64];
    let proof = UpdateProof::new(&x, &challenge, 1).unwrap();
    assert!(proof.verify(&challenge, 1, &[]).is_ok());

    // bound to the challenge and to the domain separation byte
    assert!(matches!(
        proof.verify(&[8u8; 64], 1, &[]),
        Err(SetupError::InvalidContribution(_))
    ));
    assert!(matches!(
        proof.verify(&challenge, 2, &[]),
        Err(SetupError::InvalidContribution(_))
    ));
}

#[test]
pub fn test_pok_rejects_zero() {
    assert!(matches!(
        UpdateProof::new(&ScalarField::zero(), &[0u8; 64], 1),
        Err(SetupError::InvalidContribution(_))
    ));
    let proof = UpdateProof {
        contribution_commitment: G1Affine::zero(),
        contribution_pok: G2Affine::zero(),
    };
    assert!(proof.verify(&[0u8; 64], 1, &[]).is_err());
}

#[test]
pub fn test_value_updates() {
    let x = ScalarField::from(11u64);
    let challenge = [3u8; 64];
    let proof = UpdateProof::new(&x, &challenge, 4).unwrap();

    let prev1: Vec<G1Affine> = (1..5u64).map(|i| (g1_generator() * ScalarField::from(i)).into()).collect();
    let next1: Vec<G1Affine> = prev1.iter().map(|p| (*p * x).into()).collect();
    let prev2 = vec![g2_generator(), (g2_generator() * ScalarField::from(7u64)).into()];
    let next2: Vec<G2Affine> = prev2.iter().map(|p| (*p * x).into()).collect();

    let updates = [
        ValueUpdate::G1 { label: "g1", previous: &prev1, next: &next1 },
        ValueUpdate::G2 { label: "g2", previous: &prev2, next: &next2 },
    ];
    assert!(proof.verify(&challenge, 4, &updates).is_ok());

    let mut bad = next1.clone();
    bad[2] = (bad[2] + g1_generator()).into();
    let updates = [ValueUpdate::G1 { label: "g1", previous: &prev1, next: &bad }];
    assert!(matches!(
        proof.verify(&challenge, 4, &updates),
        Err(SetupError::InvalidContribution("g1"))
    ));

    let updates = [ValueUpdate::G1 { label: "g1", previous: &prev1, next: &next1[..3] }];
    assert!(matches!(
        proof.verify(&challenge, 4, &updates),
        Err(SetupError::MalformedInput { field: "g1", .. })
    ));
}

#[test]
pub fn test_beacon_contributions() {
    let a = beacon_contributions(&[1u8; 64], b"dst", b"beacon", 3);
    let b = beacon_contributions(&[1u8; 64], b"dst", b"beacon", 3);
    let c = beacon_contributions(&[1u8; 64], b"dst", b"beacon'", 3);
    assert_eq!(a, b);
    assert_ne!(a, c);
    assert_eq!(a.len(), 3);
    assert!(a.iter().all(|s| !s.is_zero()));
    assert_ne!(a[0], a[1]);
    assert_eq!(beacon_contributions(&[1u8; 64], b"dst", b"beacon", 1)[0], a[0]);
}

#[test]
pub fn test_random_generator_strategies() {
    let mut rng = RandomGenerator::new(RandomStrategy::Testing, [0u8; 32]);
    assert_eq!(rng.next_random(), ScalarField::from(3u64));
    assert_eq!(rng.next_random(), ScalarField::from(5u64));

    let mut a = RandomGenerator::new(RandomStrategy::UserInput, seed_from_user_input("seed"));
    let mut b = RandomGenerator::new(RandomStrategy::UserInput, seed_from_user_input(" seed "));
    assert_eq!(a.next_random(), b.next_random());
    assert_eq!(a.next_random(), b.next_random());

    let mut sys = RandomGenerator::new(RandomStrategy::SystemRandom, [0u8; 32]);
    assert_ne!(sys.next_random(), sys.next_random());
}

#[test]
pub fn test_latest_round() {
    let dir = tempfile::tempdir().unwrap();
    let folder = dir.path().to_str().unwrap();
    assert_eq!(latest_round(folder, "phase1_state").unwrap(), None);
    for i in [0u64, 2, 10] {
        File::create(round_path(folder, "phase1_state", i)).unwrap();
    }
    File::create(round_path(folder, "phase1_proof", 11)).unwrap();
    File::create(Path::new(folder).join("phase1_state_x.bin")).unwrap();
    assert_eq!(latest_round(folder, "phase1_state").unwrap(), Some(10));
    assert_eq!(latest_round(folder, "phase1_proof").unwrap(), Some(11));
}

#[test]
pub fn test_parse_beacon() {
    assert_eq!(parse_beacon("0xaabb").unwrap(), vec![0xaa, 0xbb]);
    assert_eq!(parse_beacon(" 0102 ").unwrap(), vec![1, 2]);
    assert!(matches!(parse_beacon("xyz"), Err(SetupError::MalformedInput { field: "beacon", .. })));
    assert!(parse_beacon("").is_err());
}
