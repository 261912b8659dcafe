use std::{collections::HashMap, str::FromStr};

use anyhow::{Context, Result};
use chrono::{Datelike, NaiveDate};
use bigdecimal::{BigDecimal, ParseBigDecimalError, Zero};
use serde::Serialize;
use tracing::warn;

pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Tradable asset listed on the selected venue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SymbolRecord {
    pub id: i64,
    pub symbol: String,
    pub exchange_id: i64,
}

/// One calendar day of fear/greed readings from both sources.
#[derive(Debug, Clone, PartialEq)]
pub struct SentimentTick {
    /// `YYYY-MM-DD`, the join key into [`PriceMap`]
    pub date_key: String,
    pub date: NaiveDate,
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub alternative_me: f64,
    pub coinmarketcap: f64,
}

impl SentimentTick {
    pub fn from_key(date_key: &str, alternative_me: f64, coinmarketcap: f64) -> Result<Self> {
        let date = NaiveDate::parse_from_str(date_key, DATE_FORMAT)
            .with_context(|| format!("invalid sentiment date '{date_key}'"))?;
        Ok(Self {
            date_key: date_key.to_string(),
            date,
            year: date.year(),
            month: date.month(),
            day: date.day(),
            alternative_me,
            coinmarketcap,
        })
    }
}

/// Lowest and highest traded price of one symbol on one day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceExtremum {
    pub symbol: String,
    pub date_key: String,
    pub min: BigDecimal,
    pub max: BigDecimal,
}

/// Price extrema grouped by calendar date. Built once, read-only afterwards.
#[derive(Debug, Clone, Default)]
pub struct PriceMap {
    by_date: HashMap<String, Vec<PriceExtremum>>,
}

impl PriceMap {
    pub fn from_extrema<I: IntoIterator<Item = PriceExtremum>>(extrema: I) -> Self {
        let mut map = Self::default();
        for e in extrema {
            map.insert(e);
        }
        map
    }

    pub fn insert(&mut self, extremum: PriceExtremum) {
        self.by_date
            .entry(extremum.date_key.clone())
            .or_default()
            .push(extremum);
    }

    /// Everything observed on `date_key`, in insertion order.
    pub fn on(&self, date_key: &str) -> &[PriceExtremum] {
        self.by_date.get(date_key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Number of distinct dates.
    pub fn len(&self) -> usize {
        self.by_date.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_date.is_empty()
    }
}

/// Parse a price as stored in the warehouse. Blank means zero; scientific notation is accepted.
///
/// Precision is arbitrary, so long `DECIMAL` columns and very small prices survive unchanged.
pub fn parse_price(raw: &str) -> Result<BigDecimal, ParseBigDecimalError> {
    let s = raw.trim();
    if s.is_empty() {
        return Ok(BigDecimal::zero());
    }
    Ok(BigDecimal::from_str(s)?.normalized())
}

/// [`parse_price`], but a malformed value is reported and replaced by zero.
pub fn parse_price_or_zero(raw: &str, context: &str) -> BigDecimal {
    parse_price(raw).unwrap_or_else(|e| {
        warn!("unparseable price '{}' for {}: {}; using 0", raw, context, e);
        BigDecimal::zero()
    })
}

/// Plain positional notation, never an exponent.
pub fn format_price(price: &BigDecimal) -> String {
    price.to_plain_string()
}
