use clap::Parser;
use mpc_setup::chain::Phase2Chain;
use mpc_setup::circuit::ConstraintSystem;
use mpc_setup::commons::SrsCommons;
use mpc_setup::config::{init_logging, CeremonyParams};
use mpc_setup::marshal::Marshal;
use mpc_setup::phase2::{Phase2, Phase2Proof};
use mpc_setup::utils::{latest_round, parse_beacon, round_path};
use mpc_setup::{Result, SetupError};
use std::path::Path;
use std::time::Instant;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Config {
    /// Folder holding srs_commons.bin and the phase 2 transcript
    #[arg(long, value_name = "OUTFOLDER")]
    outfolder: String,

    /// Compiled constraint system (JSON) the transcript was prepared for
    #[arg(long, value_name = "CIRCUIT_FILE")]
    circuit: String,

    /// Hex-encoded public beacon. When given, the verified transcript is
    /// sealed into proving_key.bin and verifying_key.bin
    #[arg(long, value_name = "BEACON")]
    beacon: Option<String>,

    #[arg(long, value_name = "LEVEL", default_value = "info")]
    log_level: String,
}

/*
cargo run --release --bin phase2_verify -- \
  --outfolder ./setup/mpc-setup/output \
  --circuit circuit.json \
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
    let latest = latest_round(&config.outfolder, "phase2_state")?.unwrap_or(0);
    if latest == 0 {
        return Err(SetupError::malformed("rounds", "no phase 2 contribution to verify"));
    }

    let cs = ConstraintSystem::read_from_json(&config.circuit)?;
    let commons = SrsCommons::read_from_file(Path::new(&config.outfolder).join("srs_commons.bin"))?
        .truncated(cs.domain_size())?;

    // recomputed from the SRS and the circuit, so the published genesis is
    // checked too
    let mut chain = Phase2Chain::new(&commons, &cs)?;
    let genesis = Phase2::read_from_file(round_path(&config.outfolder, "phase2_state", 0))?;
    if &genesis != chain.current() {
        return Err(SetupError::ChainMismatch {
            expected: "genesis derived from the SRS and circuit".into(),
            found: "a different phase 2 genesis".into(),
        });
    }

    for i in 1..=latest {
        let next = Phase2::read_from_file(round_path(&config.outfolder, "phase2_state", i))?;
        let proof = Phase2Proof::read_from_file(round_path(&config.outfolder, "phase2_proof", i))?;
        chain.append(next, &proof)?;
        info!(contributor = i, "verified");
    }
    info!(
        rounds = latest,
        elapsed_s = start.elapsed().as_secs_f64(),
        "phase 2 transcript verified"
    );

    if let Some(beacon) = beacon {
        let (pk, vk) = chain.finish(&beacon)?;
        let pk_path = Path::new(&config.outfolder).join("proving_key.bin");
        let vk_path = Path::new(&config.outfolder).join("verifying_key.bin");
        let pk_bytes = pk.write_to_file(&pk_path, params.encoding())?;
        let vk_bytes = vk.write_to_file(&vk_path, params.encoding())?;
        info!(
            proving_key = %pk_path.display(),
            pk_bytes,
            verifying_key = %vk_path.display(),
            vk_bytes,
            "phase 2 sealed"
        );
    }
    Ok(())
}
