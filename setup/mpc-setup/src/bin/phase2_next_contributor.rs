use clap::Parser;
use mpc_setup::config::{init_logging, CeremonyParams};
use mpc_setup::contributor::ContributorInfo;
use mpc_setup::evaluations::Phase2Evaluations;
use mpc_setup::marshal::{transcript_hash, Marshal};
use mpc_setup::phase2::{Phase2, Phase2Proof, Phase2Secrets};
use mpc_setup::utils::{
    check_outfolder_writable, initialize_random_generator, latest_round, prompt_user_input,
    round_path, Mode,
};
use mpc_setup::{Result, SetupError};
use std::path::Path;
use std::time::Instant;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Config {
    /// Output folder path (must exist and be writeable)
    #[arg(long, value_name = "OUTFOLDER")]
    outfolder: String,

    /// Mode of operation: testing, random, beacon
    #[arg(
        long,
        value_enum,
        value_name = "MODE",
        help = "Operation mode: testing | random | beacon"
    )]
    mode: Mode,

    #[arg(long, value_name = "LEVEL", default_value = "info")]
    log_level: String,
}

// cargo run --release --bin phase2_next_contributor -- --outfolder ./setup/mpc-setup/output --mode random
fn main() {
    let config = Config::parse();
    init_logging(&config.log_level);
    if let Err(e) = run(&config) {
        error!("{e}");
        std::process::exit(1);
    }
}

fn run(config: &Config) -> Result<()> {
    let total_start = Instant::now();
    check_outfolder_writable(&config.outfolder)?;
    let params = CeremonyParams::read_from_outfolder(&config.outfolder)?;
    let latest_index = latest_round(&config.outfolder, "phase2_state")?
        .ok_or_else(|| SetupError::malformed("outfolder", "no phase 2 genesis, run phase2_prepare"))?;

    let (name, location, seed) = match config.mode {
        Mode::Testing => ("testing".to_string(), String::new(), String::new()),
        Mode::Random => (
            prompt_user_input("Enter your name: ")?,
            prompt_user_input("Enter your location: ")?,
            prompt_user_input("Type some random text to mix into the entropy: ")?,
        ),
        Mode::Beacon => (
            "beacon".to_string(),
            String::new(),
            prompt_user_input("Enter the seed: ")?,
        ),
    };
    let mut rng = initialize_random_generator(&config.mode, &seed);

    let latest = read_latest(&config.outfolder, latest_index)?;
    let previous_hash = latest.hash()?;
    info!(contributor = latest_index + 1, "computing new contribution");

    let secrets = Phase2Secrets::generate(&mut rng, latest.parameters.nb_commitments());
    let (next, proof) = latest.contribute(&secrets)?;
    drop(secrets);

    let index = next.contributor_index;
    next.write_to_file(round_path(&config.outfolder, "phase2_state", index), params.encoding())?;
    proof.write_to_file(round_path(&config.outfolder, "phase2_proof", index), params.encoding())?;

    let record = ContributorInfo::new(
        2,
        index,
        name,
        location,
        &previous_hash,
        &next.hash()?,
        &transcript_hash(&proof)?,
        total_start.elapsed(),
    );
    let record_path = Path::new(&config.outfolder).join(format!("phase2_contributor_{index}.txt"));
    record.write_into_file(&record_path)?;
    info!(
        contributor = index,
        record = %record_path.display(),
        elapsed_s = total_start.elapsed().as_secs_f64(),
        "phase 2 contribution written"
    );
    Ok(())
}

/// Loads the newest state. A genesis must carry the digest of the published
/// evaluations; any later state is verified against its predecessor.
fn read_latest(outfolder: &str, index: u64) -> Result<Phase2> {
    let start = Instant::now();
    let latest = Phase2::read_from_file(round_path(outfolder, "phase2_state", index))?;
    if index == 0 {
        let evaluations =
            Phase2Evaluations::read_from_file(Path::new(outfolder).join("phase2_evaluations.bin"))?;
        let expected = transcript_hash(&evaluations)?;
        if latest.contributor_index != 0 || latest.challenge != expected {
            return Err(SetupError::ChainMismatch {
                expected: format!("challenge {}", hex::encode(&expected[..8])),
                found: format!("challenge {}", hex::encode(&latest.challenge[..8])),
            });
        }
        info!("previous contributor is genesis");
        return Ok(latest);
    }
    let previous = Phase2::read_from_file(round_path(outfolder, "phase2_state", index - 1))?;
    let proof = Phase2Proof::read_from_file(round_path(outfolder, "phase2_proof", index))?;
    previous.verify(&latest, &proof)?;
    info!(
        contributor = index,
        elapsed_s = start.elapsed().as_secs_f64(),
        "previous contribution verified"
    );
    Ok(latest)
}
