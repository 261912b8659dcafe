//! Monthly kline archives from the public Binance data mirror.

use std::{
    fs::{self, File},
    io::{BufReader, BufWriter, Write},
    path::{Path, PathBuf},
    time::Duration,
};

use chrono::{Datelike, NaiveDate};
use futures::StreamExt;
use reqwest::{Client, Response};
use tracing::{debug, info, warn};
use zip::{ZipArchive, result::ZipError};

use crate::error::DownloadError;

pub const DEFAULT_BASE_URL: &str = "https://data.binance.vision";

/// One monthly archive, e.g. `BTCUSDT` / `1m` / `2025-01`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveRequest {
    pub pair: String,
    pub interval: String,
    pub period: String,
}

impl ArchiveRequest {
    pub fn new(pair: impl Into<String>, interval: impl Into<String>, period: impl Into<String>) -> Self {
        Self {
            pair: pair.into(),
            interval: interval.into(),
            period: period.into(),
        }
    }

    pub fn file_name(&self) -> String {
        format!("{}.zip", self.stem())
    }

    /// The kline CSV packed inside the archive.
    pub fn csv_file_name(&self) -> String {
        format!("{}.csv", self.stem())
    }

    fn stem(&self) -> String {
        format!("{}-{}-{}", self.pair, self.interval, self.period)
    }
}

pub fn kline_archive_url(base_url: &str, req: &ArchiveRequest) -> String {
    format!(
        "{}/data/spot/monthly/klines/{}/{}/{}",
        base_url.trim_end_matches('/'),
        req.pair,
        req.interval,
        req.file_name()
    )
}

#[derive(Debug, Clone)]
pub struct DownloadOptions {
    pub base_url: String,
    pub timeout: Duration,
    /// Skip TLS certificate validation. Off unless explicitly configured.
    pub accept_invalid_certs: bool,
    pub user_agent: String,
}

impl Default for DownloadOptions {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(30),
            accept_invalid_certs: false,
            user_agent: "crypto_dataset/0.1 (rust)".to_string(),
        }
    }
}

pub struct VisionClient {
    client: Client,
    base_url: String,
}

impl VisionClient {
    pub fn new(options: &DownloadOptions) -> Result<Self, DownloadError> {
        if options.accept_invalid_certs {
            warn!("TLS certificate validation is disabled for archive downloads");
        }
        let client = Client::builder()
            .user_agent(options.user_agent.as_str())
            .timeout(options.timeout)
            .danger_accept_invalid_certs(options.accept_invalid_certs)
            .build()
            .map_err(|e| DownloadError::Transfer(e.to_string()))?;
        Ok(Self {
            client,
            base_url: options.base_url.clone(),
        })
    }

    pub fn archive_url(&self, req: &ArchiveRequest) -> String {
        kline_archive_url(&self.base_url, req)
    }

    /// Stream one archive to `<out_dir>/<pair>-<interval>-<period>.zip` and return that path.
    /// Any failure after the file is created removes it again.
    pub async fn download(&self, req: &ArchiveRequest, out_dir: &Path) -> Result<PathBuf, DownloadError> {
        let url = self.archive_url(req);
        let path = out_dir.join(req.file_name());

        fs::create_dir_all(out_dir).map_err(|source| DownloadError::Io {
            path: out_dir.to_path_buf(),
            source,
        })?;

        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| DownloadError::Transfer(e.to_string()))?;
        let status = resp.status();
        if status.as_u16() >= 400 {
            return Err(DownloadError::Http {
                status: status.as_u16(),
                url,
            });
        }

        match write_body(resp, &path).await {
            Ok(written) => {
                info!("saved {} ({} bytes)", path.display(), written);
                Ok(path)
            }
            Err(e) => {
                fs::remove_file(&path).ok();
                Err(e)
            }
        }
    }
}

async fn write_body(resp: Response, path: &Path) -> Result<usize, DownloadError> {
    let io_err = |source: std::io::Error| DownloadError::Io {
        path: path.to_path_buf(),
        source,
    };
    let mut out = BufWriter::new(File::create(path).map_err(io_err)?);
    let mut body = std::pin::pin!(resp.bytes_stream());
    let mut written = 0usize;
    while let Some(chunk) = body.next().await {
        let chunk = chunk.map_err(|e| DownloadError::Transfer(e.to_string()))?;
        out.write_all(&chunk).map_err(io_err)?;
        written += chunk.len();
    }
    out.flush().map_err(io_err)?;
    Ok(written)
}

/// Unpack every file of `zip_path` into `dest_dir` and return the extracted paths.
/// Entries whose names would escape `dest_dir` fail the whole extraction.
pub fn extract_archive(zip_path: &Path, dest_dir: &Path) -> Result<Vec<PathBuf>, DownloadError> {
    let zip_err = |source: ZipError| DownloadError::Extract {
        path: zip_path.to_path_buf(),
        source,
    };
    let file = File::open(zip_path).map_err(|source| DownloadError::Io {
        path: zip_path.to_path_buf(),
        source,
    })?;
    fs::create_dir_all(dest_dir).map_err(|source| DownloadError::Io {
        path: dest_dir.to_path_buf(),
        source,
    })?;

    let mut archive = ZipArchive::new(BufReader::new(file)).map_err(zip_err)?;
    archive.extract(dest_dir).map_err(zip_err)?;

    let files: Vec<PathBuf> = archive
        .file_names()
        .filter(|name| !name.ends_with('/'))
        .map(|name| dest_dir.join(name))
        .collect();
    debug!("extracted {} file(s) from {}", files.len(), zip_path.display());
    Ok(files)
}

/// Every `YYYY-MM` from `start`'s month through `end`'s month.
pub fn monthly_periods(start: NaiveDate, end: NaiveDate) -> Vec<String> {
    let mut out = vec![];
    let (mut y, mut m) = (start.year(), start.month());
    while (y, m) <= (end.year(), end.month()) {
        out.push(format!("{y:04}-{m:02}"));
        if m == 12 {
            y += 1;
            m = 1;
        } else {
            m += 1;
        }
    }
    out
}
