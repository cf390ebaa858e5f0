use crate::commands::{run_check, run_recap, CheckArgs, RecapArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use mitra_honor::error::AppError;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "Mitra Honor Budget Service",
    about = "Run and query the honorarium budget consistency engine from the command line",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Print the per-mitra income recap against the honor ceiling
    Recap(RecapArgs),
    /// Evaluate draft allocations from a JSON file without writing anything
    Check(CheckArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
    /// Override the fieldwork API base URL
    #[arg(long)]
    pub(crate) backend_url: Option<String>,
    /// Serve from a saved JSON dump of the fieldwork API instead of the live API
    #[arg(long)]
    pub(crate) snapshot: Option<PathBuf>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Recap(args) => run_recap(args).await,
        Command::Check(args) => run_check(args).await,
    }
}
