mod cli;
mod commands;
mod infra;
mod routes;
mod server;

use mitra_honor::error::AppError;

pub async fn run() -> Result<(), AppError> {
    cli::run().await
}
