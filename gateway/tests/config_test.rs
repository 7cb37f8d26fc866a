//! Configuration and startup tests

use clap::Parser;
use std::io::Write;

use player_gateway::catalog::Catalog;
use player_gateway::config::Args;
use player_gateway::server::AppState;

fn args(extra: &[&str]) -> Args {
    let mut argv = vec!["player-gateway"];
    argv.extend_from_slice(extra);
    Args::parse_from(argv)
}

#[test]
fn test_defaults() {
    let args = args(&["--dev-mode"]);
    assert_eq!(args.listen.port(), 8080);
    assert_eq!(args.token_expiry_seconds, 7200);
    assert_eq!(args.default_product_id, "HOODIE123");
    assert!(args.bind_product);
    assert!(args.validate().is_ok());
}

#[test]
fn test_production_requires_long_secret() {
    let args_missing = args(&[]);
    if args_missing.token_secret.is_none() && !args_missing.dev_mode {
        assert!(args_missing.validate().is_err());
    }

    let short = args(&["--token-secret", "short"]);
    if !short.dev_mode {
        assert!(short.validate().is_err());
    }

    let good = args(&["--token-secret", "a-production-secret-that-is-long-enough"]);
    assert!(good.validate().is_ok());
}

#[test]
fn test_zero_expiry_rejected() {
    let args = args(&["--dev-mode", "--token-expiry-seconds", "0"]);
    assert!(args.validate().is_err());
}

#[test]
fn test_bind_product_can_be_disabled() {
    let args = args(&["--dev-mode", "--bind-product", "false"]);
    assert!(!args.bind_product);
}

#[test]
fn test_state_loads_catalog_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
[[products.CAP9]]
url = "/audio/cap.mp3"
title = "Cap Song"
artist = "Caliph"
"#
    )
    .unwrap();

    let path = file.path().to_str().unwrap().to_string();
    let args = args(&[
        "--dev-mode",
        "--catalog-path",
        &path,
        "--default-product-id",
        "CAP9",
    ]);
    let state = AppState::new(args).unwrap();
    assert_eq!(state.catalog.default_product(), "CAP9");
    assert_eq!(state.catalog.resolve(Some("HOODIE123")).1[0].title, "Cap Song");
}

#[test]
fn test_state_rejects_unknown_default_product() {
    let args = args(&["--dev-mode", "--default-product-id", "NOPE"]);
    assert!(AppState::new(args).is_err());
    assert!(Catalog::builtin().with_default("HOODIE123").is_ok());
}
