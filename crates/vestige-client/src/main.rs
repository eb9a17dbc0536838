//! vestige CLI entry point.

use std::process::ExitCode;

use clap::Parser;
use vestige_client::ClientResult;
use vestige_client::app;
use vestige_client::cli::Cli;

#[tokio::main]
async fn main() -> ExitCode {
    match try_main(Cli::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn try_main(cli: Cli) -> ClientResult<()> {
    app::init_logging(cli.debug)?;
    app::run(cli).await
}
