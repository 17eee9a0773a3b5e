use crate::utils::Challenge;
use chrono::Local;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::time::Duration;

/// Public record of one contribution, written next to the new state.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ContributorInfo {
    pub phase: u8,
    pub contributor_no: u64,
    pub date: String,
    pub name: String,
    pub location: String,
    pub devices: String,
    pub prev_state_hash: String,
    pub current_state_hash: String,
    pub current_proof_hash: String,
    pub time_taken_seconds: f64,
}

impl ContributorInfo {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        phase: u8,
        contributor_no: u64,
        name: String,
        location: String,
        prev_state_hash: &Challenge,
        current_state_hash: &Challenge,
        current_proof_hash: &Challenge,
        time_taken: Duration,
    ) -> Self {
        Self {
            phase,
            contributor_no,
            date: Local::now().format("%Y-%m-%d").to_string(),
            name,
            location,
            devices: device_summary(),
            prev_state_hash: hex::encode(prev_state_hash),
            current_state_hash: hex::encode(current_state_hash),
            current_proof_hash: hex::encode(current_proof_hash),
            time_taken_seconds: time_taken.as_secs_f64(),
        }
    }

    pub fn write_into_file<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        writer.write_all(self.to_string().as_bytes())?;
        writer.flush()
    }
}

impl fmt::Display for ContributorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "### Phase {} Contributor No: {:02}\n\n\
            **Date:** {}\n\n\
            Name: {}\n\n\
            Location: {}\n\n\
            Device(s): {}\n\n\
            Previous state hash:\n    Blake2b: {}\n\n\
            Response state hash:\n    Blake2b: {}\n\
            Response proof hash:\n    Blake2b: {}\n\n\
            Time taken: ~{:.1} seconds",
            self.phase,
            self.contributor_no,
            self.date,
            self.name,
            self.location,
            self.devices,
            self.prev_state_hash,
            self.current_state_hash,
            self.current_proof_hash,
            self.time_taken_seconds,
        )
    }
}

/// Architecture, OS and thread count of the contributing machine.
pub fn device_summary() -> String {
    let threads = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    format!(
        "Architecture: {}, OS: {}, Threads: {}",
        std::env::consts::ARCH,
        std::env::consts::OS,
        threads
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_display() {
        let info = ContributorInfo::new(
            1,
            3,
            "alice".into(),
            "Seoul".into(),
            &[0u8; 64],
            &[1u8; 64],
            &[2u8; 64],
            Duration::from_millis(2500),
        );
        let text = info.to_string();
        assert!(text.starts_with("### Phase 1 Contributor No: 03"));
        assert!(text.contains(&"01".repeat(64)));
        assert!(text.contains("~2.5 seconds"));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("contributor.txt");
        info.write_into_file(&path).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), text);
    }
}
