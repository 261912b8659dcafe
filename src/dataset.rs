use std::{
    collections::HashMap,
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use csv::WriterBuilder;
use fs2::FileExt;
use bigdecimal::BigDecimal;
use serde::Serialize;
use tempfile::NamedTempFile;
use tracing::info;

use crate::records::{PriceMap, SentimentTick, SymbolRecord, format_price};

pub const DEFAULT_DATASET_PATH: &str = "data/dataset.csv";

pub const DELIMITER: char = ',';

/// Rows with a larger share of empty fields are dropped.
pub const MAX_EMPTY_RATIO: f64 = 0.6;

const FIXED_COLUMNS: [&str; 5] = [
    "year",
    "month",
    "day",
    "fear_api_alternative_me",
    "fear_coinmarketcap",
];

pub fn header(symbols: &[SymbolRecord]) -> Vec<String> {
    let mut cols: Vec<String> = FIXED_COLUMNS.iter().map(|c| c.to_string()).collect();
    for s in symbols {
        cols.push(format!("{}_min_value", s.symbol));
        cols.push(format!("{}_max_value", s.symbol));
    }
    cols
}

/// Join one tick with that day's prices. Always `5 + 2 * symbols.len()` fields;
/// symbols without a price that day contribute two empty fields.
pub fn build_row(tick: &SentimentTick, symbols: &[SymbolRecord], prices: &PriceMap) -> Vec<String> {
    let day: HashMap<&str, (&BigDecimal, &BigDecimal)> = prices
        .on(&tick.date_key)
        .iter()
        .map(|p| (p.symbol.as_str(), (&p.min, &p.max)))
        .collect();

    let mut row = Vec::with_capacity(FIXED_COLUMNS.len() + 2 * symbols.len());
    row.push(tick.year.to_string());
    row.push(tick.month.to_string());
    row.push(tick.day.to_string());
    row.push(tick.alternative_me.to_string());
    row.push(tick.coinmarketcap.to_string());
    for s in symbols {
        match day.get(s.symbol.as_str()) {
            Some((min, max)) => {
                row.push(format_price(min));
                row.push(format_price(max));
            }
            None => {
                row.push(String::new());
                row.push(String::new());
            }
        }
    }
    row
}

/// Field counts of one output row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowCompleteness {
    pub total: usize,
    pub empty: usize,
}

impl RowCompleteness {
    pub fn from_fields<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        fields.into_iter().fold(Self { total: 0, empty: 0 }, |acc, f| Self {
            total: acc.total + 1,
            empty: acc.empty + usize::from(f.as_ref().is_empty()),
        })
    }

    /// Count the fields of a delimited line. An empty line has no fields.
    pub fn from_line(line: &str) -> Self {
        if line.is_empty() {
            return Self { total: 0, empty: 0 };
        }
        Self::from_fields(line.split(DELIMITER))
    }

    pub fn empty_ratio(&self) -> Option<f64> {
        (self.total > 0).then(|| self.empty as f64 / self.total as f64)
    }

    pub fn is_valid(&self) -> bool {
        self.empty_ratio().is_some_and(|r| r <= MAX_EMPTY_RATIO)
    }
}

/// Write the header and every valid row, in tick order. Returns the number of data rows.
pub fn write_dataset<W: Write>(
    writer: W,
    symbols: &[SymbolRecord],
    ticks: &[SentimentTick],
    prices: &PriceMap,
) -> Result<usize> {
    let mut wtr = WriterBuilder::new()
        .delimiter(DELIMITER as u8)
        .from_writer(writer);
    wtr.write_record(header(symbols))?;

    let mut rows = 0usize;
    for tick in ticks {
        let row = build_row(tick, symbols, prices);
        if RowCompleteness::from_fields(&row).is_valid() {
            wtr.write_record(&row)?;
            rows += 1;
        }
    }
    wtr.flush()?;
    Ok(rows)
}

/// Build the dataset into `path`, replacing any previous file atomically.
pub fn generate_csv(
    path: &Path,
    symbols: &[SymbolRecord],
    ticks: &[SentimentTick],
    prices: &PriceMap,
) -> Result<usize> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&dir).with_context(|| format!("create {}", dir.display()))?;

    let mut tmp = NamedTempFile::new_in(&dir)?;
    let rows = write_dataset(tmp.as_file_mut(), symbols, ticks, prices)?;
    tmp.persist(path)
        .with_context(|| format!("write {}", path.display()))?;

    info!("CSV rows: {}", rows);
    Ok(rows)
}

/// Summary written next to the CSV when requested.
#[derive(Debug, Clone, Serialize)]
pub struct DatasetManifest {
    pub generated_at: DateTime<Utc>,
    pub dataset: PathBuf,
    pub rows: usize,
    pub sentiment_ticks: usize,
    pub price_days: usize,
    pub symbols: Vec<SymbolRecord>,
}

pub fn write_manifest(path: &Path, manifest: &DatasetManifest) -> Result<()> {
    fs::write(path, serde_json::to_string_pretty(manifest)?)
        .with_context(|| format!("write {}", path.display()))?;
    Ok(())
}

/// Acquire an exclusive file lock; keep the file handle alive to hold the lock.
pub fn acquire_lock(lock_path: &Path) -> Result<fs::File> {
    if let Some(parent) = lock_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new()
        .create(true)
        .truncate(true)
        .read(true)
        .write(true)
        .open(lock_path)?;
    file.try_lock_exclusive()
        .with_context(|| format!("another export holds {}", lock_path.display()))?;
    Ok(file)
}
