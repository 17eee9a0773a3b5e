use clap::Parser;
use mpc_setup::config::{init_logging, CeremonyParams};
use mpc_setup::contributor::ContributorInfo;
use mpc_setup::marshal::{transcript_hash, Marshal};
use mpc_setup::phase1::{Phase1, Phase1Proof, Phase1Secrets};
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

// cargo run --release --bin phase1_next_contributor -- --outfolder ./setup/mpc-setup/output --mode testing
// cargo run --release --bin phase1_next_contributor -- --outfolder ./setup/mpc-setup/output --mode random
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
    let latest_index = latest_round(&config.outfolder, "phase1_state")?
        .ok_or_else(|| SetupError::malformed("outfolder", "no phase 1 genesis, run phase1_initialize"))?;

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

    let latest = read_latest(&config.outfolder, latest_index, params.domain_size)?;
    let previous_hash = latest.hash()?;
    info!(contributor = latest_index + 1, "computing new contribution");

    let secrets = Phase1Secrets::generate(&mut rng);
    let (next, proof) = latest.contribute(&secrets)?;
    drop(secrets);

    let index = next.contributor_index;
    next.write_to_file(round_path(&config.outfolder, "phase1_state", index), params.encoding())?;
    proof.write_to_file(round_path(&config.outfolder, "phase1_proof", index), params.encoding())?;

    let record = ContributorInfo::new(
        1,
        index,
        name,
        location,
        &previous_hash,
        &next.hash()?,
        &transcript_hash(&proof)?,
        total_start.elapsed(),
    );
    let record_path = Path::new(&config.outfolder).join(format!("phase1_contributor_{index}.txt"));
    record.write_into_file(&record_path)?;
    info!(
        contributor = index,
        record = %record_path.display(),
        elapsed_s = total_start.elapsed().as_secs_f64(),
        "phase 1 contribution written"
    );
    Ok(())
}

/// Loads the newest state and checks it against its predecessor (or against
/// a freshly built genesis).
fn read_latest(outfolder: &str, index: u64, domain_size: usize) -> Result<Phase1> {
    let start = Instant::now();
    let latest = Phase1::read_from_file(round_path(outfolder, "phase1_state", index))?;
    if index == 0 {
        if latest != Phase1::new(domain_size)? {
            return Err(SetupError::ChainMismatch {
                expected: "canonical genesis".into(),
                found: "a different phase 1 genesis".into(),
            });
        }
        info!("previous contributor is genesis");
        return Ok(latest);
    }
    let previous = Phase1::read_from_file(round_path(outfolder, "phase1_state", index - 1))?;
    let proof = Phase1Proof::read_from_file(round_path(outfolder, "phase1_proof", index))?;
    previous.verify(&latest, &proof)?;
    info!(
        contributor = index,
        elapsed_s = start.elapsed().as_secs_f64(),
        "previous contribution verified"
    );
    Ok(latest)
}
