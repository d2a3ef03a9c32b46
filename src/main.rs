use dotenvy::dotenv;
use std::process::ExitCode;

use tixhub_server::config::Config;
use tixhub_server::{init_tracing, start_server};

#[tokio::main]
async fn main() -> ExitCode {
    dotenv().ok();
    init_tracing();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            tracing::error!(error = %err, "Invalid configuration");
            return ExitCode::FAILURE;
        }
    };

    match start_server(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %err, "Server failed");
            ExitCode::FAILURE
        }
    }
}
