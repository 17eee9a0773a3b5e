use clap::Parser;
use mpc_setup::chain::Phase1Chain;
use mpc_setup::config::{init_logging, CeremonyParams};
use mpc_setup::marshal::Marshal;
use mpc_setup::phase1::{Phase1, Phase1Proof};
use mpc_setup::utils::{latest_round, parse_beacon, round_path};
use mpc_setup::{Result, SetupError};
use std::path::Path;
use std::time::Instant;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Config {
    /// Folder holding the phase 1 transcript
    #[arg(long, value_name = "OUTFOLDER")]
    outfolder: String,

    /// Hex-encoded public beacon. When given, the verified transcript is
    /// sealed and written as srs_commons.bin
    #[arg(long, value_name = "BEACON")]
    beacon: Option<String>,

    #[arg(long, value_name = "LEVEL", default_value = "info")]
    log_level: String,
}

/*
cargo run --release --bin phase1_verify -- \
  --outfolder ./setup/mpc-setup/output \
  --beacon 00000000000000000001a2b3c4d5e6f708090a0b0c0d0e0f1011121314151617
*/
fn main() {
    let config = Config::parse();
    init_logging(&config.log_level);
    if let Err(e) = run(&config) {
        error!("{e}");
        std::process::exit(1);
    }
}

fn run(config: &Config) -> Result<()> {
    let start = Instant::now();
    let params = CeremonyParams::read_from_outfolder(&config.outfolder)?;
    let beacon = config.beacon.as_deref().map(parse_beacon).transpose()?;
    let latest = latest_round(&config.outfolder, "phase1_state")?.unwrap_or(0);
    if latest == 0 {
        return Err(SetupError::malformed("rounds", "no phase 1 contribution to verify"));
    }

    let genesis = Phase1::read_from_file(round_path(&config.outfolder, "phase1_state", 0))?;
    let mut chain = Phase1Chain::genesis(params.domain_size)?;
    if &genesis != chain.current() {
        return Err(SetupError::ChainMismatch {
            expected: "canonical genesis".into(),
            found: "a different phase 1 genesis".into(),
        });
    }

    for i in 1..=latest {
        let next = Phase1::read_from_file(round_path(&config.outfolder, "phase1_state", i))?;
        let proof = Phase1Proof::read_from_file(round_path(&config.outfolder, "phase1_proof", i))?;
        chain.append(next, &proof)?;
        info!(contributor = i, "verified");
    }
    info!(
        rounds = latest,
        elapsed_s = start.elapsed().as_secs_f64(),
        "phase 1 transcript verified"
    );

    if let Some(beacon) = beacon {
        let commons = chain.finish(&beacon)?;
        let path = Path::new(&config.outfolder).join("srs_commons.bin");
        let bytes = commons.write_to_file(&path, params.encoding())?;
        info!(path = %path.display(), bytes, "phase 1 sealed");
    }
    Ok(())
}
