use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::error::ErrorKind;
use clap::Parser;
use log::{error, info};

use ribgen::engine::SimulationEngine;
use ribgen::io::{load_announcements, load_relationships, load_rov_asns, write_ribs_csv};
use ribgen::shared::SimError;

const OUTPUT_FILE: &str = "ribs.csv";

/// Compute every AS's converged RIB under Gao-Rexford export policy and
/// write the result to ribs.csv in the working directory.
#[derive(Debug, Parser)]
#[command(name = "ribgen")]
struct Cli {
    /// Path to the AS relationships file (CAIDA serial-2 format)
    #[arg(long, value_name = "FILE")]
    relationships: PathBuf,

    /// Path to the seed announcements CSV
    #[arg(long, value_name = "FILE")]
    announcements: PathBuf,

    /// Path to the ROV-enabled ASNs file
    #[arg(long, value_name = "FILE")]
    rov_asns: Option<PathBuf>,
}

fn main() -> ExitCode {
    pretty_env_logger::init();

    let args = match Cli::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let _ = e.print();
            return match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => ExitCode::SUCCESS,
                _ => ExitCode::from(1),
            };
        }
    };

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::from(1)
        }
    }
}

fn run(args: &Cli) -> Result<(), SimError> {
    info!(
        "loading AS relationships from {}",
        args.relationships.display()
    );
    let graph = load_relationships(&args.relationships)?;

    if graph.has_customer_provider_cycle() {
        return Err(SimError::CustomerProviderCycle);
    }

    let mut engine = SimulationEngine::new(graph);

    if let Some(path) = &args.rov_asns {
        info!("loading ROV ASNs from {}", path.display());
        let rov_asns = load_rov_asns(path);
        info!("loaded {} ROV-enabled ASes", rov_asns.len());
        engine.set_rov_asns(rov_asns);
    }

    info!(
        "loading announcements from {}",
        args.announcements.display()
    );
    let seeded = load_announcements(&args.announcements, &mut engine)?;
    info!("loaded {} announcements", seeded);

    engine.propagate()?;

    info!("exporting RIBs to {}", OUTPUT_FILE);
    write_ribs_csv(Path::new(OUTPUT_FILE), &engine)?;
    info!("total RIB entries: {}", engine.rib_count());

    Ok(())
}
