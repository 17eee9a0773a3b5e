use crate::errors::{Result, SetupError};
use libs::iotools::PointEncoding;
use libs::{impl_read_from_json, impl_write_into_json};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Copy of the parameters kept in the output folder by `phase1_initialize`.
pub const CEREMONY_PARAMS_FILE: &str = "ceremony.json";

/// Ceremony-wide parameters, shared by every tool through a JSON file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CeremonyParams {
    pub ceremony_name: String,
    /// Radix-2 domain of the phase-1 SRS. Bounds the number of constraints
    /// of every circuit set up on top of it.
    pub domain_size: usize,
    /// Write points compressed. Raw points are larger but load faster.
    #[serde(default = "default_compress")]
    pub compress: bool,
}

fn default_compress() -> bool {
    true
}

impl_read_from_json!(CeremonyParams);
impl_write_into_json!(CeremonyParams);

impl CeremonyParams {
    pub fn encoding(&self) -> PointEncoding {
        if self.compress {
            PointEncoding::Compressed
        } else {
            PointEncoding::Raw
        }
    }

    pub fn read_from_outfolder(outfolder: &str) -> Result<Self> {
        let params = Self::read_from_json(Path::new(outfolder).join(CEREMONY_PARAMS_FILE))?;
        params.validate()?;
        Ok(params)
    }

    pub fn validate(&self) -> Result<()> {
        if self.domain_size < 2 || !self.domain_size.is_power_of_two() {
            return Err(SetupError::malformed(
                "domain_size",
                format!("{} is not a power of two >= 2", self.domain_size),
            ));
        }
        Ok(())
    }
}

/// Installs the fmt subscriber. `RUST_LOG` wins over `level`.
pub fn init_logging(level: &str) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_params_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ceremony.json");
        let params = CeremonyParams {
            ceremony_name: "test".into(),
            domain_size: 1 << 10,
            compress: false,
        };
        params.write_into_json(&path).unwrap();
        let back = CeremonyParams::read_from_json(&path).unwrap();
        assert_eq!(back, params);
        assert_eq!(back.encoding(), PointEncoding::Raw);
        back.validate().unwrap();

        let parsed: CeremonyParams =
            serde_json::from_str(r#"{"ceremony_name": "x", "domain_size": 12}"#).unwrap();
        assert!(parsed.compress);
        assert!(matches!(
            parsed.validate(),
            Err(SetupError::MalformedInput { field: "domain_size", .. })
        ));
    }
}
