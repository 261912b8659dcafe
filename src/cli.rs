use std::collections::HashMap;

/// Value given to a flag that is not followed by a value.
pub const FLAG_SET: &str = "1";

pub const HELP_TEXT: &str = r#"
CRYPTO DATASET - CLI (non-interactive)
=============================================================
Usage:
  crypto-dataset [OPTION] [OPTIONAL FLAGS]

Options:
  -h                            Show this help
  -GetFearCoinmarketcap         Run GetFearCoinmarketcap
  -GetFearAlternativeMe         Run GetFearAlternativeMe
  -GenerateDataset              Run GenerateDataset
                                  (-start 2024-01-01 -end 2024-12-31)
  -config <path>                Config file (default: config.ini)

Example:
  crypto-dataset -GenerateDataset -start 2024-01-01 -end 2024-12-31

=============================================================
"#;

/// Collect `-flag [value]` pairs. A flag directly followed by another flag
/// (or by nothing) gets [`FLAG_SET`]. Tokens that are not flags and were not
/// consumed as values are ignored.
pub fn parse_flags<I, S>(args: I) -> HashMap<String, String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let args: Vec<String> = args.into_iter().map(Into::into).collect();
    let mut flags = HashMap::new();
    let mut i = 0;
    while i < args.len() {
        let key = &args[i];
        if !key.starts_with('-') {
            i += 1;
            continue;
        }
        match args.get(i + 1) {
            Some(next) if !next.starts_with('-') => {
                flags.insert(key.clone(), next.clone());
                i += 2;
            }
            _ => {
                flags.insert(key.clone(), FLAG_SET.to_string());
                i += 1;
            }
        }
    }
    flags
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    FearCoinMarketCap,
    FearAlternativeMe,
    GenerateDataset {
        start: Option<String>,
        end: Option<String>,
    },
}

/// Operations requested by `flags`, in the order they run.
pub fn commands(flags: &HashMap<String, String>) -> Vec<Command> {
    let set = |k: &str| flags.get(k).is_some_and(|v| !v.is_empty());
    if flags.is_empty() || set("-h") {
        return vec![Command::Help];
    }

    let mut out = vec![];
    if set("-GetFearCoinmarketcap") {
        out.push(Command::FearCoinMarketCap);
    }
    if set("-GetFearAlternativeMe") {
        out.push(Command::FearAlternativeMe);
    }
    if set("-GenerateDataset") {
        out.push(Command::GenerateDataset {
            start: flags.get("-start").cloned(),
            end: flags.get("-end").cloned(),
        });
    }
    if out.is_empty() {
        out.push(Command::Help);
    }
    out
}
