use std::path::Path;

use rusqlite::Connection;
use tracing::debug;

use crate::error::StoreError;

const ENABLED_SYMBOLS_SQL: &str = r#"
    SELECT c.symbol
    FROM cryptos c
    JOIN exchanges_cryptos ec ON c.id = ec.crypto_id
    JOIN exchanges e ON ec.exchange_id = e.id
    WHERE LOWER(e.name) LIKE ?1
      AND c.is_enabled = 1
"#;

/// Open the local store, creating an empty database file if there is none.
///
/// The handle closes when the returned [`Connection`] is dropped.
pub fn open_store(path: &Path) -> Result<Connection, StoreError> {
    let conn = Connection::open(path).map_err(|source| StoreError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    debug!("opened store {}", path.display());
    Ok(conn)
}

/// Enabled symbols listed on exchanges whose name contains `venue`, in result-set order.
pub fn enabled_symbols(conn: &Connection, venue: &str) -> Result<Vec<String>, StoreError> {
    let mut stmt = conn.prepare(ENABLED_SYMBOLS_SQL)?;
    let pattern = format!("%{}%", venue.to_lowercase());
    let rows = stmt.query_map([pattern], |row| row.get::<_, Option<String>>(0))?;

    let mut symbols = Vec::new();
    for symbol in rows {
        if let Some(s) = symbol? {
            symbols.push(s);
        }
    }
    Ok(symbols)
}
