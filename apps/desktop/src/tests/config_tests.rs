use super::*;

use std::{collections::HashMap, env, fs};

#[test]
fn defaults_match_stock_service() {
    let settings = Settings::default();
    assert_eq!(settings.server_url, "http://localhost:5000");
    assert_eq!(settings.poll_interval_ms, 2_000);
    assert_eq!(settings.promotion_mode, PromotionMode::Atomic);
    assert_eq!(settings.uppercase_side, Side::Black);
}

#[test]
fn file_values_override_defaults() {
    let mut settings = Settings::default();
    apply_file(
        &mut settings,
        r#"
        server_url = "http://chess.internal:8080"
        poll_interval_ms = 500
        promotion_mode = "follow_up"
        uppercase_side = "white"
        "#,
    )
    .expect("parse");

    assert_eq!(settings.server_url, "http://chess.internal:8080");
    assert_eq!(settings.poll_interval_ms, 500);
    assert_eq!(settings.promotion_mode, PromotionMode::FollowUp);
    assert_eq!(settings.uppercase_side, Side::White);
    assert_eq!(settings.database_url, Settings::default().database_url);
}

#[test]
fn env_overrides_file() {
    let mut settings = Settings::default();
    apply_file(&mut settings, "poll_interval_ms = 500").expect("parse");

    let vars: HashMap<&str, &str> = [
        ("APP__POLL_INTERVAL_MS", "750"),
        ("APP__PROMOTION_MODE", "legacy"),
        ("APP__UPPERCASE_SIDE", "White"),
    ]
    .into_iter()
    .collect();
    apply_env(&mut settings, |key| vars.get(key).map(|v| v.to_string())).expect("env");

    assert_eq!(settings.poll_interval_ms, 750);
    assert_eq!(settings.promotion_mode, PromotionMode::FollowUp);
    assert_eq!(settings.uppercase_side, Side::White);
}

#[test]
fn rejects_bad_env_values() {
    let mut settings = Settings::default();
    let err = apply_env(&mut settings, |key| {
        (key == "APP__POLL_INTERVAL_MS").then(|| "soon".to_string())
    })
    .expect_err("must fail");
    assert!(err.to_string().contains("APP__POLL_INTERVAL_MS"));
}

#[test]
fn zero_interval_is_invalid() {
    let settings = Settings {
        poll_interval_ms: 0,
        ..Settings::default()
    };
    assert!(validate(&settings).is_err());
}

#[test]
fn missing_file_falls_back_to_defaults() {
    let path = env::temp_dir().join("board-client-does-not-exist.toml");
    let _ = fs::remove_file(&path);
    let settings = load_settings(&path).expect("defaults");
    assert!(settings.poll_interval_ms > 0);
}

#[test]
fn controller_settings_carry_mapping() {
    let settings = Settings {
        uppercase_side: Side::White,
        poll_interval_ms: 250,
        ..Settings::default()
    };
    let controller = settings.controller_settings();
    assert_eq!(controller.poll_interval, Duration::from_millis(250));
    assert_eq!(controller.mapping.uppercase, Side::White);
}
