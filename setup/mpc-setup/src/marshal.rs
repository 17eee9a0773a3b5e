//! Binary encoding of every public artifact of the ceremony.
//!
//! A stream starts with one tag byte selecting compressed or raw points,
//! followed by the fields in declaration order. Sequences carry a u32
//! big-endian length prefix. The fast dump used for proving-key checkpoints
//! replaces the tag with an 8-byte marker, stores lengths in native byte
//! order and is read back without any point validation.

use crate::commons::{CommonsG1, CommonsG2, SrsCommons};
use crate::errors::{Result, SetupError};
use crate::evaluations::{EvaluationsG1, EvaluationsG2, Phase2Evaluations};
use crate::keys::{
    PedersenProvingKey, PedersenVerifyingKey, ProvingKey, ProvingKeyG1, ProvingKeyG2,
    VerifyingKey, VerifyingKeyG1, VerifyingKeyG2,
};
use crate::phase1::{Phase1, Phase1Proof};
use crate::phase2::{Phase2, Phase2G1, Phase2G2, Phase2Parameters, Phase2Proof};
use crate::utils::{Challenge, UpdateProof};
use libs::iotools::{Blake2bWriter, Decoder, Encoder, PointEncoding};
use libs::polynomial_structures::RadixDomain;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

trait DecodeContext<T> {
    fn field(self, name: &'static str) -> Result<T>;
}

impl<T> DecodeContext<T> for io::Result<T> {
    fn field(self, name: &'static str) -> Result<T> {
        self.map_err(|e| SetupError::malformed(name, e))
    }
}

pub trait Marshal: Sized {
    fn encode<W: Write>(&self, enc: &mut Encoder<W>) -> io::Result<()>;

    fn decode<R: Read>(dec: &mut Decoder<R>) -> Result<Self>;

    fn write_with<W: Write>(&self, writer: W, encoding: PointEncoding) -> Result<u64> {
        let mut enc = Encoder::with_header(writer, encoding)?;
        self.encode(&mut enc)?;
        enc.flush()?;
        Ok(enc.bytes_written())
    }

    /// Compressed points. Returns the number of bytes written.
    fn write_to<W: Write>(&self, writer: W) -> Result<u64> {
        self.write_with(writer, PointEncoding::Compressed)
    }

    /// Uncompressed points: larger, faster to read back.
    fn write_raw_to<W: Write>(&self, writer: W) -> Result<u64> {
        self.write_with(writer, PointEncoding::Raw)
    }

    /// Reads either form, checking that every point is on the curve and in
    /// the prime-order subgroup.
    fn read_from<R: Read>(reader: R) -> Result<Self> {
        let mut dec = Decoder::with_header(reader, true).field("encoding tag")?;
        Self::decode(&mut dec)
    }

    /// Reads either form without curve or subgroup checks. Only for trusted input.
    fn unsafe_read_from<R: Read>(reader: R) -> Result<Self> {
        let mut dec = Decoder::with_header(reader, false).field("encoding tag")?;
        Self::decode(&mut dec)
    }

    fn write_to_file<P: AsRef<Path>>(&self, path: P, encoding: PointEncoding) -> Result<u64> {
        let writer = BufWriter::new(File::create(path)?);
        self.write_with(writer, encoding)
    }

    /// Like `read_from`, and rejects trailing bytes.
    fn read_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        let mut dec = Decoder::with_header(reader, true).field("encoding tag")?;
        let value = Self::decode(&mut dec)?;
        dec.finish().field("end of stream")?;
        Ok(value)
    }
}

/// Blake2b-512 over the raw, headerless encoding.
pub fn transcript_hash<T: Marshal>(value: &T) -> Result<Challenge> {
    let mut enc = Encoder::new(Blake2bWriter::new(), PointEncoding::Raw);
    value.encode(&mut enc)?;
    Ok(enc.into_inner().finalize())
}

impl Marshal for UpdateProof {
    fn encode<W: Write>(&self, enc: &mut Encoder<W>) -> io::Result<()> {
        enc.write_point(&self.contribution_commitment)?;
        enc.write_point(&self.contribution_pok)
    }

    fn decode<R: Read>(dec: &mut Decoder<R>) -> Result<Self> {
        Ok(Self {
            contribution_commitment: dec.read_point().field("contribution commitment")?,
            contribution_pok: dec.read_point().field("contribution proof of knowledge")?,
        })
    }
}

impl Marshal for SrsCommons {
    fn encode<W: Write>(&self, enc: &mut Encoder<W>) -> io::Result<()> {
        enc.write_points(&self.g1.tau)?;
        enc.write_points(&self.g1.alpha_tau)?;
        enc.write_points(&self.g1.beta_tau)?;
        enc.write_points(&self.g2.tau)?;
        enc.write_point(&self.g2.beta)
    }

    fn decode<R: Read>(dec: &mut Decoder<R>) -> Result<Self> {
        let commons = Self {
            g1: CommonsG1 {
                tau: dec.read_points().field("G1.Tau")?,
                alpha_tau: dec.read_points().field("G1.AlphaTau")?,
                beta_tau: dec.read_points().field("G1.BetaTau")?,
            },
            g2: CommonsG2 {
                tau: dec.read_points().field("G2.Tau")?,
                beta: dec.read_point().field("G2.Beta")?,
            },
        };
        commons.check_shape()?;
        Ok(commons)
    }
}

impl Marshal for Phase1 {
    fn encode<W: Write>(&self, enc: &mut Encoder<W>) -> io::Result<()> {
        enc.write_u64(self.contributor_index)?;
        enc.write_bytes(&self.challenge)?;
        self.parameters.encode(enc)
    }

    fn decode<R: Read>(dec: &mut Decoder<R>) -> Result<Self> {
        Ok(Self {
            contributor_index: dec.read_u64().field("contributor index")?,
            challenge: dec.read_bytes().field("challenge")?,
            parameters: SrsCommons::decode(dec)?,
        })
    }
}

impl Marshal for Phase1Proof {
    fn encode<W: Write>(&self, enc: &mut Encoder<W>) -> io::Result<()> {
        self.tau.encode(enc)?;
        self.alpha.encode(enc)?;
        self.beta.encode(enc)
    }

    fn decode<R: Read>(dec: &mut Decoder<R>) -> Result<Self> {
        Ok(Self {
            tau: UpdateProof::decode(dec)?,
            alpha: UpdateProof::decode(dec)?,
            beta: UpdateProof::decode(dec)?,
        })
    }
}

impl Marshal for Phase2 {
    fn encode<W: Write>(&self, enc: &mut Encoder<W>) -> io::Result<()> {
        let p = &self.parameters;
        enc.write_u64(self.contributor_index)?;
        enc.write_bytes(&self.challenge)?;
        enc.write_point(&p.g1.delta)?;
        enc.write_points(&p.g1.z)?;
        enc.write_points(&p.g1.pkk)?;
        enc.write_nested_points(&p.g1.sigma_ckk)?;
        enc.write_point(&p.g2.delta)?;
        enc.write_points(&p.g2.sigma)
    }

    fn decode<R: Read>(dec: &mut Decoder<R>) -> Result<Self> {
        let contributor_index = dec.read_u64().field("contributor index")?;
        let challenge = dec.read_bytes().field("challenge")?;
        let g1 = Phase2G1 {
            delta: dec.read_point().field("G1.Delta")?,
            z: dec.read_points().field("G1.Z")?,
            pkk: dec.read_points().field("G1.PKK")?,
            sigma_ckk: dec.read_nested_points().field("G1.SigmaCKK")?,
        };
        let g2 = Phase2G2 {
            delta: dec.read_point().field("G2.Delta")?,
            sigma: dec.read_points().field("G2.Sigma")?,
        };
        if g1.sigma_ckk.len() != g2.sigma.len() {
            return Err(SetupError::malformed("G2.Sigma", "does not match G1.SigmaCKK"));
        }
        if !g1.z.len().is_power_of_two() {
            return Err(SetupError::malformed("G1.Z", "length is not a power of two"));
        }
        Ok(Self {
            contributor_index,
            challenge,
            parameters: Phase2Parameters { g1, g2 },
        })
    }
}

impl Marshal for Phase2Proof {
    fn encode<W: Write>(&self, enc: &mut Encoder<W>) -> io::Result<()> {
        self.delta.encode(enc)?;
        enc.write_len(self.sigmas.len())?;
        for s in &self.sigmas {
            s.encode(enc)?;
        }
        Ok(())
    }

    fn decode<R: Read>(dec: &mut Decoder<R>) -> Result<Self> {
        let delta = UpdateProof::decode(dec)?;
        let n = dec.read_len().field("sigma proofs")?;
        let sigmas = (0..n)
            .map(|_| UpdateProof::decode(dec))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { delta, sigmas })
    }
}

impl Marshal for Phase2Evaluations {
    fn encode<W: Write>(&self, enc: &mut Encoder<W>) -> io::Result<()> {
        enc.write_points(&self.g1.a)?;
        enc.write_points(&self.g1.b)?;
        enc.write_points(&self.g2.b)?;
        enc.write_points(&self.g1.vkk)?;
        enc.write_nested_points(&self.g1.ckk)?;
        enc.write_u64_vecs(&self.public_and_commitment_committed)
    }

    fn decode<R: Read>(dec: &mut Decoder<R>) -> Result<Self> {
        let a = dec.read_points().field("G1.A")?;
        let b1 = dec.read_points().field("G1.B")?;
        let b2 = dec.read_points().field("G2.B")?;
        let evals = Self {
            g1: EvaluationsG1 {
                a,
                b: b1,
                vkk: dec.read_points().field("G1.VKK")?,
                ckk: dec.read_nested_points().field("G1.CKK")?,
            },
            g2: EvaluationsG2 { b: b2 },
            public_and_commitment_committed: dec
                .read_u64_vecs()
                .field("PublicAndCommitmentCommitted")?,
        };
        evals.check_shape()?;
        Ok(evals)
    }
}

impl Marshal for VerifyingKey {
    fn encode<W: Write>(&self, enc: &mut Encoder<W>) -> io::Result<()> {
        enc.write_point(&self.g1.alpha)?;
        enc.write_point(&self.g1.beta)?;
        enc.write_point(&self.g2.beta)?;
        enc.write_point(&self.g2.gamma)?;
        enc.write_point(&self.g1.delta)?;
        enc.write_point(&self.g2.delta)?;
        enc.write_points(&self.g1.k)?;
        enc.write_u64_vecs(&self.public_and_commitment_committed)?;
        enc.write_len(self.commitment_keys.len())?;
        for key in &self.commitment_keys {
            enc.write_point(&key.g)?;
            enc.write_point(&key.g_sigma_neg)?;
        }
        Ok(())
    }

    /// Recomputes the precomputed pairing cache.
    fn decode<R: Read>(dec: &mut Decoder<R>) -> Result<Self> {
        let alpha = dec.read_point().field("G1.Alpha")?;
        let beta1 = dec.read_point().field("G1.Beta")?;
        let beta2 = dec.read_point().field("G2.Beta")?;
        let gamma = dec.read_point().field("G2.Gamma")?;
        let delta1 = dec.read_point().field("G1.Delta")?;
        let delta2 = dec.read_point().field("G2.Delta")?;
        let k = dec.read_points().field("G1.K")?;
        let public_and_commitment_committed = dec
            .read_u64_vecs()
            .field("PublicAndCommitmentCommitted")?;
        let n = dec.read_len().field("CommitmentKeys")?;
        let commitment_keys = (0..n)
            .map(|_| {
                Ok(PedersenVerifyingKey {
                    g: dec.read_point().field("CommitmentKeys.G")?,
                    g_sigma_neg: dec.read_point().field("CommitmentKeys.GSigmaNeg")?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let mut vk = VerifyingKey {
            g1: VerifyingKeyG1 {
                alpha,
                beta: beta1,
                delta: delta1,
                k,
            },
            g2: VerifyingKeyG2 {
                beta: beta2,
                delta: delta2,
                gamma,
            },
            commitment_keys,
            public_and_commitment_committed,
            precomputed: None,
        };
        vk.precompute()
            .map_err(|e| SetupError::malformed("verifying key", e))?;
        Ok(vk)
    }
}

impl Marshal for ProvingKey {
    fn encode<W: Write>(&self, enc: &mut Encoder<W>) -> io::Result<()> {
        enc.write_u64(self.domain.cardinality)?;
        enc.write_scalar(&self.domain.generator)?;
        enc.write_point(&self.g1.alpha)?;
        enc.write_point(&self.g1.beta)?;
        enc.write_point(&self.g1.delta)?;
        enc.write_points(&self.g1.a)?;
        enc.write_points(&self.g1.b)?;
        enc.write_points(&self.g1.z)?;
        enc.write_points(&self.g1.k)?;
        enc.write_point(&self.g2.beta)?;
        enc.write_point(&self.g2.delta)?;
        enc.write_points(&self.g2.b)?;
        enc.write_u64(self.nb_wires() as u64)?;
        enc.write_u64(self.nb_infinity_a)?;
        enc.write_u64(self.nb_infinity_b)?;
        enc.write_bools(&self.infinity_a)?;
        enc.write_bools(&self.infinity_b)?;
        enc.write_len(self.commitment_keys.len())?;
        for key in &self.commitment_keys {
            enc.write_points(&key.basis)?;
            enc.write_points(&key.basis_exp_sigma)?;
        }
        Ok(())
    }

    fn decode<R: Read>(dec: &mut Decoder<R>) -> Result<Self> {
        let cardinality = dec.read_u64().field("domain")?;
        let generator = dec.read_scalar().field("domain")?;
        let domain = RadixDomain::new(cardinality as usize)
            .filter(|d| d.generator == generator)
            .ok_or_else(|| {
                SetupError::malformed("domain", format!("invalid radix-2 domain of size {cardinality}"))
            })?;

        let g1_alpha = dec.read_point().field("G1.Alpha")?;
        let g1_beta = dec.read_point().field("G1.Beta")?;
        let g1_delta = dec.read_point().field("G1.Delta")?;
        let a = dec.read_points().field("G1.A")?;
        let b = dec.read_points().field("G1.B")?;
        let z = dec.read_points().field("G1.Z")?;
        let k = dec.read_points().field("G1.K")?;
        let g2 = ProvingKeyG2 {
            beta: dec.read_point().field("G2.Beta")?,
            delta: dec.read_point().field("G2.Delta")?,
            b: dec.read_points().field("G2.B")?,
        };
        let nb_wires = dec.read_u64().field("nbWires")?;
        let nb_infinity_a = dec.read_u64().field("NbInfinityA")?;
        let nb_infinity_b = dec.read_u64().field("NbInfinityB")?;
        let infinity_a = dec.read_bools().field("InfinityA")?;
        let infinity_b = dec.read_bools().field("InfinityB")?;
        let n = dec.read_len().field("CommitmentKeys")?;
        let commitment_keys = (0..n)
            .map(|_| {
                Ok(PedersenProvingKey {
                    basis: dec.read_points().field("CommitmentKeys.Basis")?,
                    basis_exp_sigma: dec.read_points().field("CommitmentKeys.BasisExpSigma")?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let pk = ProvingKey {
            domain,
            g1: ProvingKeyG1 {
                alpha: g1_alpha,
                beta: g1_beta,
                delta: g1_delta,
                a,
                b,
                z,
                k,
            },
            g2,
            infinity_a,
            infinity_b,
            nb_infinity_a,
            nb_infinity_b,
            commitment_keys,
        };
        if pk.nb_wires() as u64 != nb_wires {
            return Err(SetupError::malformed("nbWires", "does not match the infinity masks"));
        }
        pk.check_masks()?;
        Ok(pk)
    }
}

impl ProvingKey {
    /// Fast dump: raw points, native-endian lengths.
    pub fn write_dump<W: Write>(&self, writer: W) -> Result<u64> {
        self.write_with(writer, PointEncoding::Dump)
    }

    /// Reads a fast dump back without validating any point.
    pub fn read_dump<R: Read>(reader: R) -> Result<Self> {
        let mut dec = Decoder::dump(reader).field("dump marker")?;
        Self::decode(&mut dec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit::{CommitmentInfo, Constraint, ConstraintSystem, Term};
    use crate::phase1::Phase1Secrets;
    use crate::phase2::Phase2Secrets;
    use crate::utils::{RandomGenerator, RandomStrategy};
    use ark_ff::One;
    use libs::group_structures::ScalarField;

    fn sealed(with_commitment: bool) -> (ProvingKey, VerifyingKey) {
        let one = ScalarField::one();
        let mut rng = RandomGenerator::new(RandomStrategy::Testing, [0u8; 32]);
        let (p1, _) = Phase1::new(4)
            .unwrap()
            .contribute(&Phase1Secrets::generate(&mut rng))
            .unwrap();
        let commons = p1.seal(b"beacon").unwrap();
        let cs = ConstraintSystem {
            nb_public: 2,
            nb_secret: 2,
            nb_internal: 1,
            constraints: vec![
                Constraint {
                    l: vec![Term::new(2, one)],
                    r: vec![Term::new(3, one)],
                    o: vec![Term::new(1, one)],
                },
                Constraint {
                    l: vec![Term::new(4, one)],
                    r: vec![Term::new(0, one)],
                    o: vec![Term::new(4, one)],
                },
            ],
            commitments: if with_commitment {
                vec![CommitmentInfo {
                    commitment_wire: 4,
                    private_committed: vec![3],
                    public_and_commitment_committed: vec![1],
                }]
            } else {
                vec![]
            },
        };
        let (p2, evals) = Phase2::initialize(&commons, &cs).unwrap();
        let nb = evals.nb_commitments();
        let (p2, _) = p2.contribute(&Phase2Secrets::generate(&mut rng, nb)).unwrap();
        p2.seal(&commons, &evals, b"beacon").unwrap()
    }

    fn round_trip<T: Marshal + PartialEq + std::fmt::Debug>(value: &T) {
        for encoding in [PointEncoding::Compressed, PointEncoding::Raw] {
            let mut bytes = Vec::new();
            let n = value.write_with(&mut bytes, encoding).unwrap();
            assert_eq!(n as usize, bytes.len());
            let back = T::read_from(bytes.as_slice()).unwrap();
            assert_eq!(&back, value);
            let unchecked = T::unsafe_read_from(bytes.as_slice()).unwrap();
            assert_eq!(&unchecked, value);

            let mut again = Vec::new();
            back.write_with(&mut again, encoding).unwrap();
            assert_eq!(again, bytes);
        }
    }

    #[test]
    fn test_keys_round_trip() {
        for with_commitment in [false, true] {
            let (pk, vk) = sealed(with_commitment);
            assert_eq!(vk.commitment_keys.len(), with_commitment as usize);
            round_trip(&pk);
            round_trip(&vk);
        }
    }

    #[test]
    fn test_compressed_is_smaller() {
        let (pk, _) = sealed(true);
        let mut compressed = Vec::new();
        let mut raw = Vec::new();
        pk.write_to(&mut compressed).unwrap();
        pk.write_raw_to(&mut raw).unwrap();
        assert!(compressed.len() < raw.len());
        assert_eq!(compressed[0], 0x01);
        assert_eq!(raw[0], 0x02);
    }

    #[test]
    fn test_dump_round_trip() {
        let (pk, _) = sealed(true);
        let mut bytes = Vec::new();
        pk.write_dump(&mut bytes).unwrap();
        assert_eq!(ProvingKey::read_dump(bytes.as_slice()).unwrap(), pk);
        assert!(ProvingKey::read_from(bytes.as_slice()).is_err());

        let mut raw = Vec::new();
        pk.write_raw_to(&mut raw).unwrap();
        assert!(ProvingKey::read_dump(raw.as_slice()).is_err());
    }

    #[test]
    fn test_state_round_trip() {
        let mut rng = RandomGenerator::new(RandomStrategy::Testing, [0u8; 32]);
        let (p1, proof) = Phase1::new(2)
            .unwrap()
            .contribute(&Phase1Secrets::generate(&mut rng))
            .unwrap();
        round_trip(&p1);
        round_trip(&proof);
        round_trip(&p1.parameters);
    }

    #[test]
    fn test_truncated_input_is_malformed() {
        let (_, vk) = sealed(true);
        let mut bytes = Vec::new();
        vk.write_to(&mut bytes).unwrap();
        bytes.truncate(bytes.len() - 10);
        assert!(matches!(
            VerifyingKey::read_from(bytes.as_slice()),
            Err(SetupError::MalformedInput { .. })
        ));
        assert!(matches!(
            VerifyingKey::read_from([0x07u8].as_slice()),
            Err(SetupError::MalformedInput { field: "encoding tag", .. })
        ));
    }
}
