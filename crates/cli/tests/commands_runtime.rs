use std::env;
use std::sync::{Mutex, OnceLock};

use clarity_cli::commands::analyze::AnalyzeArgs;
use clarity_cli::commands::{analyze, config, migrate, seed};
use serde_json::Value;

#[test]
fn migrate_returns_success_with_valid_env() {
    with_env(&[("CLARITY_DATABASE_URL", "sqlite::memory:")], || {
        let result = migrate::run();
        assert_eq!(result.exit_code, 0, "expected successful migrate run");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "migrate");
        assert_eq!(payload["status"], "ok");
    });
}

#[test]
fn migrate_returns_config_failure_for_invalid_threshold() {
    with_env(
        &[
            ("CLARITY_DATABASE_URL", "sqlite::memory:"),
            ("CLARITY_ANALYSIS_MIN_DATA_POINTS", "1"),
        ],
        || {
            let result = migrate::run();
            assert_eq!(result.exit_code, 2, "expected config validation failure code");

            let payload = parse_payload(&result.output);
            assert_eq!(payload["status"], "error");
            assert_eq!(payload["error_class"], "config_validation");
        },
    );
}

#[test]
fn seed_is_idempotent_across_runs() {
    let dir = tempfile::tempdir().expect("tempdir");
    let url = file_url(&dir);
    with_env(&[("CLARITY_DATABASE_URL", &url)], || {
        let first = seed::run("demo");
        assert_eq!(first.exit_code, 0, "expected first seed invocation success");
        let second = seed::run("demo");
        assert_eq!(second.exit_code, 0, "expected second seed invocation success");

        let first_payload = parse_payload(&first.output);
        let second_payload = parse_payload(&second.output);
        assert_eq!(first_payload["command"], "seed");
        assert_eq!(first_payload["message"], second_payload["message"]);
        let message = first_payload["message"].as_str().unwrap_or_default();
        assert!(message.starts_with("seeded demo data for `demo`"), "message was {message}");
    });
}

#[test]
fn analyze_after_seed_embeds_stored_result() {
    let dir = tempfile::tempdir().expect("tempdir");
    let url = file_url(&dir);
    with_env(&[("CLARITY_DATABASE_URL", &url)], || {
        assert_eq!(seed::run("demo").exit_code, 0);

        let result = analyze::run(&AnalyzeArgs {
            user: "demo".to_string(),
            start: None,
            end: None,
            raw: false,
        });
        assert_eq!(result.exit_code, 0, "analyze failed: {}", result.output);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "analyze");
        assert_eq!(payload["status"], "ok");
        let insights = payload["result"]["insights"].as_array().expect("insights array");
        assert!(!insights.is_empty());
        assert_eq!(payload["result"]["metadata"]["user_id"], "demo");
        assert!(payload["result"].get("raw_data").is_none());
    });
}

#[test]
fn analyze_rejects_unparseable_bounds() {
    with_env(&[("CLARITY_DATABASE_URL", "sqlite::memory:")], || {
        let result = analyze::run(&AnalyzeArgs {
            user: "demo".to_string(),
            start: Some("yesterday".to_string()),
            end: None,
            raw: false,
        });
        assert_eq!(result.exit_code, 8);
        assert_eq!(parse_payload(&result.output)["error_class"], "invalid_input");
    });
}

#[test]
fn analyze_rejects_inverted_window() {
    with_env(&[("CLARITY_DATABASE_URL", "sqlite::memory:")], || {
        let result = analyze::run(&AnalyzeArgs {
            user: "demo".to_string(),
            start: Some("2026-03-31".to_string()),
            end: Some("2026-03-01".to_string()),
            raw: false,
        });
        assert_eq!(result.exit_code, 8);
        assert_eq!(parse_payload(&result.output)["error_class"], "analysis.invalid_window");
    });
}

#[test]
fn config_reports_env_sources() {
    with_env(&[("CLARITY_ANALYSIS_WINDOW_DAYS", "14")], || {
        let output = config::run();
        assert!(output.contains(
            "- analysis.default_window_days = 14 (source: env (CLARITY_ANALYSIS_WINDOW_DAYS))"
        ));
        assert!(output.contains("- analysis.correlation_threshold = 0.7 (source: default)"));
    });
}

fn file_url(dir: &tempfile::TempDir) -> String {
    format!("sqlite://{}?mode=rwc", dir.path().join("clarity.db").display())
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard =
        ENV_LOCK.get_or_init(|| Mutex::new(())).lock().expect("env mutex should not be poisoned");

    let keys = [
        "CLARITY_DATABASE_URL",
        "CLARITY_DATABASE_MAX_CONNECTIONS",
        "CLARITY_DATABASE_TIMEOUT_SECS",
        "CLARITY_ANALYSIS_CORRELATION_THRESHOLD",
        "CLARITY_ANALYSIS_SIGNIFICANCE_THRESHOLD",
        "CLARITY_ANALYSIS_MIN_DATA_POINTS",
        "CLARITY_ANALYSIS_WINDOW_DAYS",
        "CLARITY_ANALYSIS_FOCUS_SESSION_MINUTES",
        "CLARITY_ANALYSIS_FOCUS_GAP_MINUTES",
        "CLARITY_LOGGING_LEVEL",
        "CLARITY_LOGGING_FORMAT",
        "CLARITY_LOG_LEVEL",
        "CLARITY_LOG_FORMAT",
    ];

    let previous_values: Vec<(&str, Option<String>)> =
        keys.iter().map(|key| (*key, env::var(key).ok())).collect();

    for key in &keys {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test_fn();

    for (key, value) in previous_values {
        if let Some(value) = value {
            env::set_var(key, value);
        } else {
            env::remove_var(key);
        }
    }
}
