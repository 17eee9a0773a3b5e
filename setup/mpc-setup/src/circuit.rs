use crate::errors::{Result, SetupError};
use libs::group_structures::ScalarField;
use libs::{impl_read_from_json, impl_write_into_json};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Largest number of vector commitments: the sigma proof tags are `2 + i` in a byte.
pub const MAX_COMMITMENTS: usize = 254;

/// Compiled rank-1 constraint system, as emitted by the circuit compiler.
///
/// Wires are numbered public first (wire 0 is the constant one), then
/// secret, then internal.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstraintSystem {
    pub nb_public: usize,
    pub nb_secret: usize,
    pub nb_internal: usize,
    pub constraints: Vec<Constraint>,
    #[serde(default)]
    pub commitments: Vec<CommitmentInfo>,
}

/// L * R = O, each side a sparse linear combination of wires.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Constraint {
    #[serde(default)]
    pub l: Vec<Term>,
    #[serde(default)]
    pub r: Vec<Term>,
    #[serde(default)]
    pub o: Vec<Term>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Term {
    pub wire: usize,
    #[serde(with = "scalar_decimal")]
    pub coeff: ScalarField,
}

impl Term {
    pub fn new(wire: usize, coeff: ScalarField) -> Self {
        Self { wire, coeff }
    }
}

/// One vector commitment of the circuit.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitmentInfo {
    /// Internal wire that carries the commitment value.
    pub commitment_wire: usize,
    /// Secret or internal wires hidden in the commitment, ascending.
    #[serde(default)]
    pub private_committed: Vec<usize>,
    /// Public or earlier commitment wires also bound by the commitment.
    #[serde(default)]
    pub public_and_commitment_committed: Vec<usize>,
}

impl_read_from_json!(ConstraintSystem);
impl_write_into_json!(ConstraintSystem);

impl ConstraintSystem {
    pub fn nb_wires(&self) -> usize {
        self.nb_public + self.nb_secret + self.nb_internal
    }

    /// Smallest radix-2 domain holding every constraint.
    pub fn domain_size(&self) -> usize {
        self.constraints.len().max(2).next_power_of_two()
    }

    pub fn validate(&self) -> Result<()> {
        let nb_wires = self.nb_wires();
        if self.nb_public == 0 {
            return Err(SetupError::malformed("nb_public", "missing the constant one wire"));
        }
        for (i, c) in self.constraints.iter().enumerate() {
            if let Some(t) = c.l.iter().chain(&c.r).chain(&c.o).find(|t| t.wire >= nb_wires) {
                return Err(SetupError::malformed(
                    "constraints",
                    format!("constraint {i} references wire {} of {nb_wires}", t.wire),
                ));
            }
        }

        if self.commitments.len() > MAX_COMMITMENTS {
            return Err(SetupError::malformed(
                "commitments",
                format!("{} commitments, at most {MAX_COMMITMENTS} supported", self.commitments.len()),
            ));
        }
        let mut committed = HashSet::new();
        let mut last_wire = None;
        for (i, info) in self.commitments.iter().enumerate() {
            let w = info.commitment_wire;
            if w < self.nb_public || w >= nb_wires || last_wire.is_some_and(|l| w <= l) {
                return Err(SetupError::malformed(
                    "commitments",
                    format!("commitment {i} has invalid commitment wire {w}"),
                ));
            }
            last_wire = Some(w);

            if !info.private_committed.windows(2).all(|p| p[0] < p[1]) {
                return Err(SetupError::malformed(
                    "commitments",
                    format!("private wires of commitment {i} are not strictly ascending"),
                ));
            }
            for &p in &info.private_committed {
                if p < self.nb_public || p >= nb_wires || !committed.insert(p) {
                    return Err(SetupError::malformed(
                        "commitments",
                        format!("commitment {i} cannot privately commit wire {p}"),
                    ));
                }
            }
            if let Some(&p) = info.public_and_commitment_committed.iter().find(|&&p| p >= nb_wires) {
                return Err(SetupError::malformed(
                    "commitments",
                    format!("commitment {i} references wire {p} of {nb_wires}"),
                ));
            }
        }
        if let Some(info) = self.commitments.iter().find(|c| committed.contains(&c.commitment_wire)) {
            return Err(SetupError::malformed(
                "commitments",
                format!("commitment wire {} is also privately committed", info.commitment_wire),
            ));
        }
        Ok(())
    }

    /// Privately committed wire -> index of its commitment.
    pub(crate) fn private_committed_wires(&self) -> HashMap<usize, usize> {
        self.commitments
            .iter()
            .enumerate()
            .flat_map(|(i, c)| c.private_committed.iter().map(move |&w| (w, i)))
            .collect()
    }

    pub(crate) fn commitment_wires(&self) -> HashSet<usize> {
        self.commitments.iter().map(|c| c.commitment_wire).collect()
    }

    pub fn public_and_commitment_committed(&self) -> Vec<Vec<u64>> {
        self.commitments
            .iter()
            .map(|c| c.public_and_commitment_committed.iter().map(|&w| w as u64).collect())
            .collect()
    }
}

/// Coefficients as decimal strings; a leading '-' negates.
mod scalar_decimal {
    use libs::group_structures::ScalarField;
    use serde::{de, Deserialize, Deserializer, Serializer};
    use std::str::FromStr;

    pub fn serialize<S: Serializer>(v: &ScalarField, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(v)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<ScalarField, D::Error> {
        let s = String::deserialize(d)?;
        let (neg, digits) = match s.trim().strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, s.trim()),
        };
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(de::Error::custom(format!("invalid coefficient {s:?}")));
        }
        let v = ScalarField::from_str(digits)
            .map_err(|_| de::Error::custom(format!("invalid coefficient {s:?}")))?;
        Ok(if neg { -v } else { v })
    }
}
