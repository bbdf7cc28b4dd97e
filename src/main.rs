// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use anyhow::Result;
use clap::Parser;
use local_rag_chat::{cli::Cli, version};
use std::env;
use std::process::ExitCode;
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // .env may set RUST_LOG
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    // Keep the console readable: pipeline logs only on request
    if env::var("RUST_LOG").is_err() {
        env::set_var("RUST_LOG", if cli.verbose { "info" } else { "warn" });
    }
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    debug!("{}", version::get_version_string());

    let config = cli.into_config();
    match local_rag_chat::run(config).await {
        Ok(outcome) => {
            debug!("Run finished: {:?}", outcome);
            Ok(ExitCode::from(outcome.exit_code() as u8))
        }
        Err(e) => {
            error!("Fatal: {:#}", e);
            eprintln!("Erro: {:#}", e);
            Ok(ExitCode::FAILURE)
        }
    }
}
