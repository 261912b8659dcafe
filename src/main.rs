use std::{path::PathBuf, process::ExitCode};

use anyhow::Result;
use crypto_dataset::{
    cli::{self, Command},
    config::{AppConfig, DEFAULT_CONFIG_PATH},
    generate::{self, GenerateParams},
    store,
    vision::VisionClient,
};
use tracing::error;
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<ExitCode> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let flags = cli::parse_flags(std::env::args().skip(1));
    let config_path = flags
        .get("-config")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
    let config = AppConfig::load_or_create(&config_path)?;
    let paths = config.database_paths()?;

    // closed when `conn` drops, whichever way we leave main
    let conn = match store::open_store(&paths.filename) {
        Ok(conn) => conn,
        Err(e) => {
            error!("{}", e);
            return Ok(ExitCode::FAILURE);
        }
    };

    for command in cli::commands(&flags) {
        match command {
            Command::Help => print!("{}", cli::HELP_TEXT),
            // data source not wired up yet
            Command::FearCoinMarketCap => println!("GetFearCoinmarketcap"),
            Command::FearAlternativeMe => println!("GetFearAlternativeMe"),
            Command::GenerateDataset { start, end } => {
                let params =
                    match GenerateParams::from_flags(start.as_deref(), end.as_deref(), &paths.data_dir, &config) {
                        Ok(p) => p,
                        Err(e) => {
                            error!("{:#}", e);
                            continue;
                        }
                    };
                let client = match VisionClient::new(&generate::download_options(&config)) {
                    Ok(c) => c,
                    Err(e) => {
                        error!("{}", e);
                        continue;
                    }
                };
                generate::run(&conn, &client, &params).await;
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}
