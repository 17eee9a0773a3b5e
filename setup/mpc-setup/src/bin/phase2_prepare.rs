use clap::Parser;
use mpc_setup::circuit::ConstraintSystem;
use mpc_setup::commons::SrsCommons;
use mpc_setup::config::{init_logging, CeremonyParams};
use mpc_setup::marshal::Marshal;
use mpc_setup::phase2::Phase2;
use mpc_setup::utils::{check_outfolder_writable, latest_round, round_path};
use mpc_setup::{Result, SetupError};
use std::path::Path;
use std::time::Instant;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Config {
    /// Folder holding srs_commons.bin; phase 2 files are written next to it
    #[arg(long, value_name = "OUTFOLDER")]
    outfolder: String,

    /// Compiled constraint system (JSON)
    #[arg(long, value_name = "CIRCUIT_FILE")]
    circuit: String,

    #[arg(long, value_name = "LEVEL", default_value = "info")]
    log_level: String,
}

/*
cargo run --release --bin phase2_prepare -- \
  --outfolder ./setup/mpc-setup/output \
  --circuit circuit.json
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
    check_outfolder_writable(&config.outfolder)?;
    let params = CeremonyParams::read_from_outfolder(&config.outfolder)?;
    if latest_round(&config.outfolder, "phase2_state")?.is_some() {
        return Err(SetupError::malformed(
            "outfolder",
            "already holds a phase 2 transcript",
        ));
    }

    let cs = ConstraintSystem::read_from_json(&config.circuit)?;
    cs.validate()?;
    let commons = SrsCommons::read_from_file(Path::new(&config.outfolder).join("srs_commons.bin"))?
        .truncated(cs.domain_size())?;
    info!(
        nb_constraints = cs.constraints.len(),
        nb_wires = cs.nb_wires(),
        nb_commitments = cs.commitments.len(),
        domain_size = commons.domain_size(),
        "loaded circuit and SRS"
    );

    let (genesis, evaluations) = Phase2::initialize(&commons, &cs)?;
    evaluations.write_to_file(
        Path::new(&config.outfolder).join("phase2_evaluations.bin"),
        params.encoding(),
    )?;
    genesis.write_to_file(round_path(&config.outfolder, "phase2_state", 0), params.encoding())?;
    info!(
        elapsed_s = start.elapsed().as_secs_f64(),
        "phase 2 genesis and evaluations written"
    );
    Ok(())
}
