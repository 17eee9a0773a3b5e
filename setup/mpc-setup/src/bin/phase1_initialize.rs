use clap::Parser;
use mpc_setup::config::{init_logging, CeremonyParams, CEREMONY_PARAMS_FILE};
use mpc_setup::marshal::Marshal;
use mpc_setup::phase1::Phase1;
use mpc_setup::utils::{check_outfolder_writable, latest_round, round_path};
use mpc_setup::{Result, SetupError};
use std::path::Path;
use std::time::Instant;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Config {
    /// Ceremony parameters JSON (ceremony_name, domain_size, compress)
    #[arg(long, value_name = "PARAMS_FILE")]
    params_file: String,

    /// Output folder path (must exist and be writeable)
    #[arg(long, value_name = "OUTFOLDER")]
    outfolder: String,

    #[arg(long, value_name = "LEVEL", default_value = "info")]
    log_level: String,
}

/*
cargo run --release --bin phase1_initialize -- \
  --params-file ceremony.json \
  --outfolder ./setup/mpc-setup/output
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
    let params = CeremonyParams::read_from_json(&config.params_file)?;
    params.validate()?;
    check_outfolder_writable(&config.outfolder)?;
    if latest_round(&config.outfolder, "phase1_state")?.is_some() {
        return Err(SetupError::malformed(
            "outfolder",
            "already holds a phase 1 transcript",
        ));
    }
    info!(
        ceremony = %params.ceremony_name,
        domain_size = params.domain_size,
        compress = params.compress,
        "initializing phase 1"
    );

    let start = Instant::now();
    let genesis = Phase1::new(params.domain_size)?;
    let path = round_path(&config.outfolder, "phase1_state", 0);
    let bytes = genesis.write_to_file(&path, params.encoding())?;
    params.write_into_json(Path::new(&config.outfolder).join(CEREMONY_PARAMS_FILE))?;

    info!(
        path = %path.display(),
        bytes,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "genesis written"
    );
    Ok(())
}
