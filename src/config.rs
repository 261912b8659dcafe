use std::{
    collections::HashMap,
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use tracing::info;

use crate::error::ConfigError;

/// Written when no config file exists yet.
pub const DEFAULT_CONFIG: &str = "[database]\nfilename=database.db\ndata_dir=data\n";

pub const DEFAULT_CONFIG_PATH: &str = "config.ini";

/// The two `[database]` keys every run needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabasePaths {
    /// Embedded SQLite store
    pub filename: PathBuf,
    /// Root for downloaded and extracted archives
    pub data_dir: PathBuf,
}

/// Sectioned `key=value` settings (INI style).
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    sections: HashMap<String, HashMap<String, String>>,
}

impl AppConfig {
    /// Load `path`, creating it with [`DEFAULT_CONFIG`] first if it does not exist.
    pub fn load_or_create(path: &Path) -> Result<Self, ConfigError> {
        let io_err = |source: std::io::Error| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    fs::create_dir_all(parent).map_err(io_err)?;
                }
                fs::write(path, DEFAULT_CONFIG).map_err(io_err)?;
                info!("created default config at {}", path.display());
                fs::read_to_string(path).map_err(io_err)?
            }
            Err(e) => return Err(io_err(e)),
        };
        Ok(Self::parse(&text))
    }

    pub fn parse(text: &str) -> Self {
        let mut sections: HashMap<String, HashMap<String, String>> = HashMap::new();
        // keys before the first header belong to no section and are unreachable
        let mut current: Option<String> = None;

        for line in text.lines().map(str::trim) {
            if line.is_empty() || line.starts_with(';') || line.starts_with('#') {
                continue;
            }
            if line.starts_with('[') && line.ends_with(']') && line.len() >= 2 {
                let name = line[1..line.len() - 1].to_string();
                sections.entry(name.clone()).or_default();
                current = Some(name);
                continue;
            }
            let (Some(section), Some((k, v))) = (current.as_ref(), line.split_once('=')) else {
                continue;
            };
            sections
                .entry(section.clone())
                .or_default()
                .insert(k.trim().to_string(), v.trim().to_string());
        }

        Self { sections }
    }

    pub fn get(&self, section: &str, key: &str) -> Result<&str, ConfigError> {
        self.sections
            .get(section)
            .and_then(|s| s.get(key))
            .map(String::as_str)
            .ok_or_else(|| ConfigError::KeyNotFound {
                section: section.to_string(),
                key: key.to_string(),
            })
    }

    /// Resolve the required `[database]` keys; a missing one is a startup failure.
    pub fn database_paths(&self) -> Result<DatabasePaths, ConfigError> {
        Ok(DatabasePaths {
            filename: PathBuf::from(self.get("database", "filename")?),
            data_dir: PathBuf::from(self.get("database", "data_dir")?),
        })
    }

    /// Like [`AppConfig::get`] for optional keys.
    pub fn get_or<'a>(&'a self, section: &str, key: &str, default: &'a str) -> &'a str {
        self.get(section, key).unwrap_or(default)
    }

    /// Boolean option; accepts `1/true/yes/on` (case-insensitive), anything else is false.
    pub fn get_bool(&self, section: &str, key: &str, default: bool) -> bool {
        self.get(section, key)
            .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes" | "on"))
            .unwrap_or(default)
    }

    pub fn get_u64(&self, section: &str, key: &str, default: u64) -> u64 {
        self.get(section, key)
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_run_creates_default_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.ini");

        let cfg = AppConfig::load_or_create(&path).unwrap();

        assert!(path.exists());
        assert_eq!(cfg.get("database", "filename").unwrap(), "database.db");
        assert_eq!(cfg.get("database", "data_dir").unwrap(), "data");
        assert_eq!(cfg.sections.len(), 1);
        assert_eq!(cfg.sections["database"].len(), 2);
    }

    #[test]
    fn existing_file_is_not_overwritten() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.ini");
        fs::write(&path, "[database]\nfilename = other.db\n").unwrap();

        let cfg = AppConfig::load_or_create(&path).unwrap();

        assert_eq!(cfg.get("database", "filename").unwrap(), "other.db");
        assert_eq!(fs::read_to_string(&path).unwrap(), "[database]\nfilename = other.db\n");
    }

    #[test]
    fn comments_and_blank_lines_are_ignored() {
        let cfg = AppConfig::parse(
            "; leading comment\n\n[download]\n# interval=5m\ninterval = 1m\n  quote=USDT  \n",
        );
        assert_eq!(cfg.get("download", "interval").unwrap(), "1m");
        assert_eq!(cfg.get("download", "quote").unwrap(), "USDT");
    }

    #[test]
    fn value_splits_on_first_equals() {
        let cfg = AppConfig::parse("[download]\nbase_url=https://host/?a=b\n");
        assert_eq!(cfg.get("download", "base_url").unwrap(), "https://host/?a=b");
    }

    #[test]
    fn missing_section_or_key_is_key_not_found() {
        let cfg = AppConfig::parse(DEFAULT_CONFIG);
        assert!(matches!(
            cfg.get("nope", "filename"),
            Err(ConfigError::KeyNotFound { .. })
        ));
        assert!(matches!(
            cfg.get("database", "nope"),
            Err(ConfigError::KeyNotFound { .. })
        ));
    }

    #[test]
    fn database_paths_require_both_keys() {
        let paths = AppConfig::parse(DEFAULT_CONFIG).database_paths().unwrap();
        assert_eq!(paths.filename, PathBuf::from("database.db"));
        assert_eq!(paths.data_dir, PathBuf::from("data"));

        let err = AppConfig::parse("[database]\nfilename=database.db\n")
            .database_paths()
            .unwrap_err();
        assert!(matches!(err, ConfigError::KeyNotFound { ref key, .. } if key == "data_dir"));

        let err = AppConfig::parse("[database]\ndata_dir=data\n").database_paths().unwrap_err();
        assert!(matches!(err, ConfigError::KeyNotFound { ref key, .. } if key == "filename"));
    }

    #[test]
    fn keys_are_scoped_to_their_section() {
        let cfg = AppConfig::parse("orphan=1\n[a]\nx=1\n[b]\ny=2\n");
        assert!(cfg.get("a", "y").is_err());
        assert!(cfg.get("b", "x").is_err());
        assert_eq!(cfg.get("b", "y").unwrap(), "2");
        assert!(cfg.get("", "orphan").is_err());
    }

    #[test]
    fn typed_getters_fall_back_to_defaults() {
        let cfg = AppConfig::parse("[download]\naccept_invalid_certs=Yes\ntimeout_secs=abc\n");
        assert!(cfg.get_bool("download", "accept_invalid_certs", false));
        assert!(!cfg.get_bool("download", "missing", false));
        assert_eq!(cfg.get_u64("download", "timeout_secs", 30), 30);
        assert_eq!(cfg.get_or("download", "quote", "USDT"), "USDT");
    }
}
