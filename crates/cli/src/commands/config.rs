use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use clarity_core::config::{AppConfig, LoadOptions};
use toml::Value;

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());
    let analysis = &config.analysis;

    let fields: Vec<(&str, String, Option<&str>)> = vec![
        ("database.url", config.database.url.clone(), Some("CLARITY_DATABASE_URL")),
        (
            "database.max_connections",
            config.database.max_connections.to_string(),
            Some("CLARITY_DATABASE_MAX_CONNECTIONS"),
        ),
        (
            "database.timeout_secs",
            config.database.timeout_secs.to_string(),
            Some("CLARITY_DATABASE_TIMEOUT_SECS"),
        ),
        (
            "analysis.correlation_threshold",
            analysis.correlation_threshold.to_string(),
            Some("CLARITY_ANALYSIS_CORRELATION_THRESHOLD"),
        ),
        (
            "analysis.pattern_significance_threshold",
            analysis.pattern_significance_threshold.to_string(),
            Some("CLARITY_ANALYSIS_SIGNIFICANCE_THRESHOLD"),
        ),
        (
            "analysis.min_data_points",
            analysis.min_data_points.to_string(),
            Some("CLARITY_ANALYSIS_MIN_DATA_POINTS"),
        ),
        ("analysis.min_correlation_samples", analysis.min_correlation_samples.to_string(), None),
        (
            "analysis.default_window_days",
            analysis.default_window_days.to_string(),
            Some("CLARITY_ANALYSIS_WINDOW_DAYS"),
        ),
        (
            "analysis.weights",
            format!(
                "productivity={} financial={} temporal={}",
                analysis.weights.productivity, analysis.weights.financial, analysis.weights.temporal
            ),
            None,
        ),
        (
            "analysis.behavior.focus_session_threshold_minutes",
            analysis.behavior.focus_session_threshold_minutes.to_string(),
            Some("CLARITY_ANALYSIS_FOCUS_SESSION_MINUTES"),
        ),
        (
            "analysis.behavior.focus_gap_tolerance_minutes",
            analysis.behavior.focus_gap_tolerance_minutes.to_string(),
            Some("CLARITY_ANALYSIS_FOCUS_GAP_MINUTES"),
        ),
        ("logging.level", config.logging.level.clone(), Some("CLARITY_LOGGING_LEVEL")),
        (
            "logging.format",
            format!("{:?}", config.logging.format),
            Some("CLARITY_LOGGING_FORMAT"),
        ),
    ];

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for (key, value, env_key) in fields {
        let source =
            field_source(key, env_key, config_file_doc.as_ref(), config_file_path.as_deref());
        lines.push(render_line(key, &value, source));
    }
    lines.join("\n")
}

fn detect_config_path() -> Option<PathBuf> {
    ["clarity.toml", "config/clarity.toml"].into_iter().map(PathBuf::from).find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_key: Option<&str>,
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_key {
        if env::var_os(env_key).is_some() {
            return format!("env ({env_key})");
        }
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use toml::Value;

    use super::{contains_path, field_source};

    #[test]
    fn nested_keys_are_found_in_file() {
        let doc: Value = "[analysis.behavior]\nfocus_gap_tolerance_minutes = 10\n"
            .parse()
            .expect("toml");

        assert!(contains_path(&doc, "analysis.behavior.focus_gap_tolerance_minutes"));
        assert!(!contains_path(&doc, "analysis.min_data_points"));
        assert_eq!(
            field_source(
                "analysis.behavior.focus_gap_tolerance_minutes",
                None,
                Some(&doc),
                Some(Path::new("clarity.toml")),
            ),
            "file (clarity.toml)"
        );
        assert_eq!(field_source("analysis.min_data_points", None, Some(&doc), None), "default");
    }
}
