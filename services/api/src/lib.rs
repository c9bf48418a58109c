mod catalog;
mod cli;
mod demo;
mod infra;
mod routes;
mod server;

use onco_screen::error::AppError;

pub async fn run() -> Result<(), AppError> {
    cli::run().await
}
