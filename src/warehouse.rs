//! Read-only access to the MySQL warehouse that holds the full price history
//! and the raw fear-index events.

use std::collections::HashMap;

use sqlx::{
    MySqlPool,
    mysql::{MySqlConnectOptions, MySqlPoolOptions},
};
use tracing::{info, warn};

use crate::{
    error::FetchError,
    records::{PriceExtremum, PriceMap, SentimentTick, SymbolRecord, parse_price_or_zero},
};

pub const SOURCE_ALTERNATIVE_ME: &str = "api.alternative.me";
pub const SOURCE_COINMARKETCAP: &str = "CoinMarketCap";

const SYMBOLS_SQL: &str = r#"
    SELECT CAST(c.id AS SIGNED) AS id, c.symbol, CAST(e.id AS SIGNED) AS exchange_id
    FROM cryptos c
    JOIN exchanges_cryptos ec ON c.id = ec.crypto_id
    JOIN exchanges e ON ec.exchange_id = e.id
    WHERE LOWER(e.name) LIKE ?
"#;

// pivot the two sources, then keep only days where both reported
const SENTIMENT_SQL: &str = r#"
    SELECT f.day_key, f.fear_api_alternative_me, f.fear_coinmarketcap
    FROM (
        SELECT
            DATE_FORMAT(date, '%Y-%m-%d') AS day_key,
            CAST(MAX(CASE WHEN source = ? THEN value END) AS DOUBLE) AS fear_api_alternative_me,
            CAST(MAX(CASE WHEN source = ? THEN value END) AS DOUBLE) AS fear_coinmarketcap
        FROM fear_index
        WHERE value IS NOT NULL
        GROUP BY day_key
    ) f
    WHERE f.fear_api_alternative_me IS NOT NULL AND f.fear_coinmarketcap IS NOT NULL
    ORDER BY f.day_key ASC
"#;

// prices come back as text so no precision is lost before parsing
const PRICE_EXTREMA_SQL: &str = r#"
    SELECT
        DATE_FORMAT(cph.date, '%Y-%m-%d') AS day_key,
        c.symbol,
        CAST(MIN(cph.price) AS CHAR) AS min_value,
        CAST(MAX(cph.price) AS CHAR) AS max_value
    FROM cryptos_price_history cph
    JOIN cryptos c ON c.id = cph.crypto_id
    GROUP BY day_key, c.symbol
    ORDER BY STR_TO_DATE(day_key, '%Y-%m-%d') ASC
"#;

/// Connection settings taken from the `.env` file.
#[derive(Debug, Clone)]
pub struct WarehouseSettings {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
}

impl WarehouseSettings {
    pub fn from_env_map(env: &HashMap<String, String>) -> Result<Self, FetchError> {
        let required = |key: &str| {
            env.get(key)
                .filter(|v| !v.is_empty())
                .cloned()
                .ok_or_else(|| FetchError::Connect(format!("{key} is not set")))
        };
        let port = match env.get("DATABASE_PORT").map(|p| p.trim()) {
            None | Some("") => 3306,
            Some(p) => p
                .parse()
                .map_err(|_| FetchError::Connect(format!("invalid DATABASE_PORT '{p}'")))?,
        };
        Ok(Self {
            host: required("DATABASE_HOST")?,
            port,
            user: required("DATABASE_USER")?,
            password: env.get("DATABASE_PASSWORD").cloned().unwrap_or_default(),
            database: required("DATABASE_DBNAME")?,
        })
    }

    pub fn connect_options(&self) -> MySqlConnectOptions {
        MySqlConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.user)
            .password(&self.password)
            .database(&self.database)
    }
}

/// Single-connection pool; dropping it closes the connection.
pub async fn connect(settings: &WarehouseSettings) -> Result<MySqlPool, FetchError> {
    MySqlPoolOptions::new()
        .max_connections(1)
        .connect_with(settings.connect_options())
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(_) => FetchError::query("connect", e),
            other => FetchError::Connect(other.to_string()),
        })
}

/// Everything the dataset assembler needs, fetched in one go.
#[derive(Debug, Clone, Default)]
pub struct WarehouseSnapshot {
    pub symbols: Vec<SymbolRecord>,
    pub ticks: Vec<SentimentTick>,
    pub prices: PriceMap,
}

pub async fn fetch_all(pool: &MySqlPool, venue: &str) -> Result<WarehouseSnapshot, FetchError> {
    let symbols = fetch_symbols(pool, venue).await?;
    info!("{} cryptos found", symbols.len());

    let ticks = fetch_sentiment(pool).await?;
    info!("{} fear ticks found", ticks.len());

    let prices = fetch_price_extrema(pool).await?;
    info!("price history map generated ({} days)", prices.len());

    Ok(WarehouseSnapshot {
        symbols,
        ticks,
        prices,
    })
}

/// Assets listed on any exchange whose name contains `venue` (case-insensitive).
pub async fn fetch_symbols(pool: &MySqlPool, venue: &str) -> Result<Vec<SymbolRecord>, FetchError> {
    let rows = sqlx::query_as::<_, (i64, String, i64)>(SYMBOLS_SQL)
        .bind(venue_pattern(venue))
        .fetch_all(pool)
        .await
        .map_err(|e| FetchError::query("symbol query", e))?;

    Ok(rows
        .into_iter()
        .map(|(id, symbol, exchange_id)| SymbolRecord {
            id,
            symbol,
            exchange_id,
        })
        .collect())
}

/// Daily ticks with both sources present, oldest first.
pub async fn fetch_sentiment(pool: &MySqlPool) -> Result<Vec<SentimentTick>, FetchError> {
    let rows = sqlx::query_as::<_, (String, Option<f64>, Option<f64>)>(SENTIMENT_SQL)
        .bind(SOURCE_ALTERNATIVE_ME)
        .bind(SOURCE_COINMARKETCAP)
        .fetch_all(pool)
        .await
        .map_err(|e| FetchError::query("fear index query", e))?;

    Ok(rows
        .into_iter()
        .filter_map(|(day, alt, cmc)| tick_from_row(&day, alt, cmc))
        .collect())
}

pub async fn fetch_price_extrema(pool: &MySqlPool) -> Result<PriceMap, FetchError> {
    let rows =
        sqlx::query_as::<_, (String, String, Option<String>, Option<String>)>(PRICE_EXTREMA_SQL)
            .fetch_all(pool)
            .await
            .map_err(|e| FetchError::query("price history query", e))?;

    Ok(PriceMap::from_extrema(rows.into_iter().map(
        |(day, symbol, min, max)| extremum_from_row(day, symbol, min.as_deref(), max.as_deref()),
    )))
}

pub fn venue_pattern(venue: &str) -> String {
    format!("%{}%", venue.to_lowercase())
}

/// Both scores must be present for a tick to exist.
pub fn tick_from_row(day: &str, alternative_me: Option<f64>, coinmarketcap: Option<f64>) -> Option<SentimentTick> {
    let (alt, cmc) = alternative_me.zip(coinmarketcap)?;
    match SentimentTick::from_key(day, alt, cmc) {
        Ok(tick) => Some(tick),
        Err(e) => {
            warn!("skipping fear tick: {:#}", e);
            None
        }
    }
}

pub fn extremum_from_row(
    day: String,
    symbol: String,
    min: Option<&str>,
    max: Option<&str>,
) -> PriceExtremum {
    let context = format!("{symbol} {day}");
    PriceExtremum {
        min: parse_price_or_zero(min.unwrap_or_default(), &context),
        max: parse_price_or_zero(max.unwrap_or_default(), &context),
        symbol,
        date_key: day,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::format_price;
    use bigdecimal::{BigDecimal, Zero};

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn settings_from_env_file() {
        let s = WarehouseSettings::from_env_map(&env(&[
            ("DATABASE_HOST", "db.local"),
            ("DATABASE_PORT", "3307"),
            ("DATABASE_USER", "reader"),
            ("DATABASE_PASSWORD", "secret"),
            ("DATABASE_DBNAME", "crypto"),
        ]))
        .unwrap();
        assert_eq!(s.host, "db.local");
        assert_eq!(s.port, 3307);
        assert_eq!(s.database, "crypto");
    }

    #[test]
    fn credentials_reach_the_connection_verbatim() {
        let env = crate::env_file::parse_env(
            "DATABASE_HOST=db host\nDATABASE_USER=\"bob\"\nDATABASE_PASSWORD=pa$word #1\nDATABASE_DBNAME=crypto\n",
        );
        let s = WarehouseSettings::from_env_map(&env).unwrap();
        assert_eq!(s.host, "db host");
        assert_eq!(s.user, "\"bob\"");
        assert_eq!(s.password, "pa$word #1");
    }

    #[test]
    fn port_defaults_and_password_is_optional() {
        let s = WarehouseSettings::from_env_map(&env(&[
            ("DATABASE_HOST", "db.local"),
            ("DATABASE_USER", "reader"),
            ("DATABASE_DBNAME", "crypto"),
        ]))
        .unwrap();
        assert_eq!(s.port, 3306);
        assert_eq!(s.password, "");
    }

    #[test]
    fn missing_host_or_bad_port_is_a_connect_error() {
        let err = WarehouseSettings::from_env_map(&env(&[("DATABASE_USER", "u"), ("DATABASE_DBNAME", "d")]))
            .unwrap_err();
        assert!(matches!(err, FetchError::Connect(ref m) if m.contains("DATABASE_HOST")));

        let err = WarehouseSettings::from_env_map(&env(&[
            ("DATABASE_HOST", "h"),
            ("DATABASE_PORT", "x"),
            ("DATABASE_USER", "u"),
            ("DATABASE_DBNAME", "d"),
        ]))
        .unwrap_err();
        assert!(matches!(err, FetchError::Connect(_)));
    }

    #[test]
    fn venue_is_lowercased_substring() {
        assert_eq!(venue_pattern("Binance"), "%binance%");
    }

    #[test]
    fn tick_requires_both_scores() {
        assert!(tick_from_row("2024-01-01", Some(50.0), None).is_none());
        assert!(tick_from_row("2024-01-01", None, Some(55.0)).is_none());
        let t = tick_from_row("2024-01-01", Some(50.0), Some(55.0)).unwrap();
        assert_eq!((t.alternative_me, t.coinmarketcap), (50.0, 55.0));
    }

    #[test]
    fn malformed_extremum_prices_become_zero() {
        let e = extremum_from_row("2024-01-01".into(), "BTC".into(), Some("oops"), None);
        assert_eq!(e.min, BigDecimal::zero());
        assert_eq!(e.max, BigDecimal::zero());

        let e = extremum_from_row("2024-01-01".into(), "BTC".into(), Some("42000.10"), Some("43000"));
        assert_eq!(format_price(&e.min), "42000.1");
        assert_eq!(format_price(&e.max), "43000");
    }

    #[test]
    fn query_error_keeps_driver_text() {
        let err = FetchError::query("symbol query", sqlx::Error::RowNotFound);
        let text = err.to_string();
        assert!(text.starts_with("symbol query failed"));
        assert!(text.contains("SQLState: -"));
    }
}
