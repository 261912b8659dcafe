use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use crypto_dataset::{
    ExportArgs,
    dataset::{self, DatasetManifest},
    env_file::load_env_file,
    warehouse::{self, WarehouseSettings},
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let args = ExportArgs::parse();

    let _lock_guard = args
        .lock_file
        .as_deref()
        .map(dataset::acquire_lock)
        .transpose()?;

    let env = load_env_file(&args.env_file);
    let settings = WarehouseSettings::from_env_map(&env)?;
    info!(
        "connecting to {}:{}/{}",
        settings.host, settings.port, settings.database
    );

    let pool = warehouse::connect(&settings).await?;
    let fetched = warehouse::fetch_all(&pool, &args.venue).await;
    pool.close().await;
    let snapshot = fetched.context("warehouse fetch failed, no dataset written")?;

    let rows = dataset::generate_csv(&args.out, &snapshot.symbols, &snapshot.ticks, &snapshot.prices)?;

    if args.write_manifest {
        let manifest_path = args.out.with_extension("manifest.json");
        dataset::write_manifest(
            &manifest_path,
            &DatasetManifest {
                generated_at: Utc::now(),
                dataset: args.out.clone(),
                rows,
                sentiment_ticks: snapshot.ticks.len(),
                price_days: snapshot.prices.len(),
                symbols: snapshot.symbols.clone(),
            },
        )?;
        info!("wrote {}", manifest_path.display());
    }

    println!("CSV file generated successfully! ({} rows -> {})", rows, args.out.display());
    Ok(())
}
