use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use color_print::cformat;

use quorum_teller::log;
use quorum_teller::simulation::{run, SimConfig};

#[derive(Parser, Debug)]
#[command(
    name = "quorum-teller",
    about = "Bank of concurrent accounts serializing a shared transaction log with distributed mutual exclusion"
)]
struct Args {
    /// Directory holding transactions.txt (or transacciones.txt) and, for
    /// the optimized variant, quorum.txt.
    test_folder: PathBuf,

    /// Label for the metrics file; `optimized` selects the permit-retaining
    /// quorum variant, anything else the plain broadcast variant.
    #[arg(default_value = "optimized")]
    algorithm: String,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    match run(SimConfig::new(args.test_folder, &args.algorithm)).await {
        Ok(_) => ExitCode::SUCCESS,
        Err(error) => {
            log::error(&cformat!("The simulation failed: <bold>{error}</bold>."));
            ExitCode::FAILURE
        }
    }
}
