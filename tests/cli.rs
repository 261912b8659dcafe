//! Flag parsing and dispatch as seen from the command line.

use crypto_dataset::{
    ConfigError,
    cli::{Command, FLAG_SET, commands, parse_flags},
    config::AppConfig,
    generate::GenerateParams,
};

#[test]
fn generate_dataset_invocation() {
    let argv = [
        "crypto-dataset",
        "-GenerateDataset",
        "-start",
        "2024-01-01",
        "-end",
        "2024-12-31",
    ];
    let flags = parse_flags(argv);

    let cmds = commands(&flags);
    assert_eq!(
        cmds,
        [Command::GenerateDataset {
            start: Some("2024-01-01".into()),
            end: Some("2024-12-31".into()),
        }]
    );

    let Command::GenerateDataset { start, end } = &cmds[0] else {
        unreachable!()
    };
    let dir = tempfile::tempdir().unwrap();
    let config = AppConfig::load_or_create(&dir.path().join("config.ini")).unwrap();
    let paths = config.database_paths().unwrap();
    let params =
        GenerateParams::from_flags(start.as_deref(), end.as_deref(), &paths.data_dir, &config).unwrap();
    assert_eq!(params.start.to_string(), "2024-01-01");
    assert_eq!(params.end.to_string(), "2024-12-31");
    assert_eq!(params.data_dir, std::path::Path::new("data"));
}

#[test]
fn generate_dataset_without_dates_is_rejected_by_params() {
    let flags = parse_flags(["-GenerateDataset"]);
    assert_eq!(flags["-GenerateDataset"], FLAG_SET);

    let cmds = commands(&flags);
    let Command::GenerateDataset { start, end } = &cmds[0] else {
        panic!("expected GenerateDataset, got {cmds:?}")
    };
    assert_eq!((start, end), (&None, &None));

    let config = AppConfig::parse("[database]\nfilename=database.db\ndata_dir=data\n");
    let err = GenerateParams::from_flags(None, None, "data".as_ref(), &config).unwrap_err();
    assert!(err.to_string().contains("-start"));
}

#[test]
fn fear_index_stubs_are_dispatched() {
    let flags = parse_flags(["-GetFearAlternativeMe"]);
    assert_eq!(commands(&flags), [Command::FearAlternativeMe]);

    let flags = parse_flags(["-GetFearCoinmarketcap"]);
    assert_eq!(commands(&flags), [Command::FearCoinMarketCap]);
}

#[test]
fn config_flag_alone_shows_help() {
    let flags = parse_flags(["-config", "alt.ini"]);
    assert_eq!(flags["-config"], "alt.ini");
    assert_eq!(commands(&flags), [Command::Help]);
}

#[test]
fn config_without_data_dir_fails_before_any_command() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.ini");
    std::fs::write(&path, "[database]\nfilename=database.db\n").unwrap();

    let config = AppConfig::load_or_create(&path).unwrap();
    let err = config.database_paths().unwrap_err();

    assert!(matches!(err, ConfigError::KeyNotFound { ref section, ref key } if section == "database" && key == "data_dir"));
}
