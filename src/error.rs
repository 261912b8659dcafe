use std::path::PathBuf;

use thiserror::Error;

/// Failures reading `config.ini`.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read or create config file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("key '{key}' not found in section [{section}]")]
    KeyNotFound { section: String, key: String },
}

/// Failures talking to the relational (MySQL) warehouse.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("cannot connect to warehouse: {0}")]
    Connect(String),

    #[error(
        "{context} failed: {message} (error code: {}, SQLState: {})",
        .code.map(|c| c.to_string()).unwrap_or_else(|| "-".into()),
        .sql_state.as_deref().unwrap_or("-")
    )]
    Query {
        context: &'static str,
        code: Option<u16>,
        sql_state: Option<String>,
        message: String,
    },
}

impl FetchError {
    /// Wraps a driver error, keeping the server's error number and SQLSTATE when present.
    pub fn query(context: &'static str, err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db) => {
                let code = db
                    .try_downcast_ref::<sqlx::mysql::MySqlDatabaseError>()
                    .map(|e| e.number());
                Self::Query {
                    context,
                    code,
                    sql_state: db.code().map(|c| c.into_owned()),
                    message: db.message().to_string(),
                }
            }
            _ => Self::Query {
                context,
                code: None,
                sql_state: None,
                message: err.to_string(),
            },
        }
    }
}

/// Failures of the embedded SQLite store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("cannot open database {}: {source}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    #[error("query failed: {0}")]
    Query(#[from] rusqlite::Error),
}

/// Failures of a single archive download. None of them are retried.
#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("transfer failed: {0}")]
    Transfer(String),

    #[error("HTTP {status} while downloading '{url}'")]
    Http { status: u16, url: String },

    #[error("cannot write {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot extract {}: {source}", .path.display())]
    Extract {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },
}
