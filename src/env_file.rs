use std::{collections::HashMap, fs, path::Path};

use tracing::debug;

/// Read a flat `KEY=VALUE` file into a map without touching the process environment.
///
/// Each line is split on its first `=`; key and value are kept exactly as written.
/// There is no quoting, escaping, comment or `$VAR` handling. Lines without `=` are
/// ignored and a missing or unreadable file gives an empty map.
pub fn load_env_file(path: &Path) -> HashMap<String, String> {
    let content = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            debug!("env file {} not loaded: {}", path.display(), e);
            return HashMap::new();
        }
    };
    parse_env(&content)
}

pub fn parse_env(content: &str) -> HashMap<String, String> {
    content
        .lines()
        .filter_map(|line| line.split_once('='))
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect()
}
