use std::{
    collections::HashSet,
    fs::{self, OpenOptions},
    io::{self, Write},
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use itertools::Itertools;
use rusqlite::Connection;
use tracing::{debug, error, info, warn};

use crate::{
    config::AppConfig,
    error::DownloadError,
    records::DATE_FORMAT,
    store,
    vision::{self, ArchiveRequest, DownloadOptions, VisionClient},
};

/// Inputs of one dataset-generation run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerateParams {
    pub start: NaiveDate,
    pub end: NaiveDate,
    /// Exchange name substring used to select symbols
    pub venue: String,
    /// Quote asset appended to each symbol to form the trading pair
    pub quote: String,
    pub interval: String,
    pub data_dir: PathBuf,
}

impl GenerateParams {
    /// Validate the `-start`/`-end` dates. `data_dir` is resolved by the caller at startup.
    pub fn from_flags(
        start: Option<&str>,
        end: Option<&str>,
        data_dir: &Path,
        config: &AppConfig,
    ) -> Result<Self> {
        let (Some(start), Some(end)) = (start, end) else {
            bail!("-GenerateDataset needs both -start and -end (YYYY-MM-DD)");
        };
        let start = NaiveDate::parse_from_str(start, DATE_FORMAT)
            .with_context(|| format!("invalid -start '{start}'"))?;
        let end = NaiveDate::parse_from_str(end, DATE_FORMAT)
            .with_context(|| format!("invalid -end '{end}'"))?;
        if end < start {
            bail!("-end {end} is before -start {start}");
        }
        Ok(Self {
            start,
            end,
            venue: config.get_or("exchange", "venue", "binance").to_string(),
            quote: config.get_or("download", "quote", "USDT").to_string(),
            interval: config.get_or("download", "interval", "1m").to_string(),
            data_dir: data_dir.to_path_buf(),
        })
    }
}

pub fn download_options(config: &AppConfig) -> DownloadOptions {
    let defaults = DownloadOptions::default();
    DownloadOptions {
        base_url: config
            .get_or("download", "base_url", &defaults.base_url)
            .to_string(),
        timeout: Duration::from_secs(config.get_u64("download", "timeout_secs", 30)),
        accept_invalid_certs: config.get_bool("download", "accept_invalid_certs", false),
        ..defaults
    }
}

/// Enabled symbols for `venue`. A store failure is reported and treated as no symbols.
pub fn resolve_symbols(conn: &Connection, venue: &str) -> Vec<String> {
    store::enabled_symbols(conn, venue).unwrap_or_else(|e| {
        error!("failed to load enabled symbols: {}", e);
        Vec::new()
    })
}

pub const OFFLINE_LINKS_FILE: &str = "offline_links.txt";

/// Archive URLs the mirror answered with an error status. Kept in
/// `<data_dir>/offline_links.txt`, one URL per line, and never requested again.
#[derive(Debug)]
pub struct OfflineLinks {
    path: PathBuf,
    links: HashSet<String>,
}

impl OfflineLinks {
    pub fn load(data_dir: &Path) -> Self {
        let path = data_dir.join(OFFLINE_LINKS_FILE);
        let links = fs::read_to_string(&path)
            .map(|text| text.lines().filter(|l| !l.is_empty()).map(str::to_string).collect())
            .unwrap_or_default();
        Self { path, links }
    }

    pub fn contains(&self, url: &str) -> bool {
        self.links.contains(url)
    }

    pub fn record(&mut self, url: &str) -> io::Result<()> {
        if !self.links.insert(url.to_string()) {
            return Ok(());
        }
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        writeln!(file, "{url}")
    }
}

/// `<data_dir>/klines/<pair>/<interval>/{zip,csv}`
pub fn archive_dirs(data_dir: &Path, req: &ArchiveRequest) -> (PathBuf, PathBuf) {
    let base = data_dir.join("klines").join(&req.pair).join(&req.interval);
    (base.join("zip"), base.join("csv"))
}

#[derive(Debug, Default)]
pub struct GenerateReport {
    /// CSV files unpacked during this run
    pub extracted: Vec<PathBuf>,
    /// Archives whose CSV was already present or whose URL is known to be offline
    pub skipped: usize,
    pub failed: usize,
}

/// Fetch and unpack every monthly archive for every symbol, one at a time.
/// Failed downloads are logged and skipped.
pub async fn download_archives(
    client: &VisionClient,
    symbols: &[String],
    params: &GenerateParams,
) -> GenerateReport {
    let periods = vision::monthly_periods(params.start, params.end);
    let mut offline = OfflineLinks::load(&params.data_dir);
    let mut report = GenerateReport::default();

    for (symbol, period) in symbols.iter().cartesian_product(periods.iter()) {
        let req = ArchiveRequest::new(
            format!("{}{}", symbol, params.quote),
            params.interval.as_str(),
            period.as_str(),
        );
        let (zip_dir, csv_dir) = archive_dirs(&params.data_dir, &req);
        if csv_dir.join(req.csv_file_name()).exists() {
            debug!("{} already extracted", req.csv_file_name());
            report.skipped += 1;
            continue;
        }
        let url = client.archive_url(&req);
        if offline.contains(&url) {
            debug!("{} is marked offline", url);
            report.skipped += 1;
            continue;
        }

        let fetched = match client.download(&req, &zip_dir).await {
            Ok(zip_path) => vision::extract_archive(&zip_path, &csv_dir).map(|files| (zip_path, files)),
            Err(e) => Err(e),
        };
        match fetched {
            Ok((zip_path, files)) => {
                if let Err(e) = fs::remove_file(&zip_path) {
                    warn!("cannot remove {}: {}", zip_path.display(), e);
                }
                report.extracted.extend(files);
            }
            Err(e) => {
                error!("{}: {}", req.file_name(), e);
                if let DownloadError::Http { url, .. } = &e {
                    if let Err(io) = offline.record(url) {
                        warn!("cannot record offline link {}: {}", url, io);
                    }
                }
                report.failed += 1;
            }
        }
    }
    report
}

/// The `-GenerateDataset` operation.
pub async fn run(conn: &Connection, client: &VisionClient, params: &GenerateParams) -> GenerateReport {
    println!("Generating dataset for {} to {}", params.start, params.end);

    let symbols = resolve_symbols(conn, &params.venue);
    println!("Processing crypto: {}", symbols.iter().join(" "));

    let report = download_archives(client, &symbols, params).await;
    for path in &report.extracted {
        println!("{}", path.display());
    }
    info!(
        "archives: {} extracted, {} skipped, {} failed",
        report.extracted.len(),
        report.skipped,
        report.failed
    );
    report
}
