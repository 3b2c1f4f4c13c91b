use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub analysis: AnalysisConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

/// Every threshold and weight the analysis pipeline reads.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Minimum |r| for a cross-domain column pair to count as correlated (inclusive).
    pub correlation_threshold: f64,
    pub pattern_significance_threshold: f64,
    pub min_data_points: usize,
    pub min_correlation_samples: usize,
    pub default_window_days: u32,
    pub weights: PatternWeights,
    pub behavior: BehaviorThresholds,
    pub financial: FinancialThresholds,
    pub temporal: TemporalThresholds,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PatternWeights {
    pub productivity: f64,
    pub financial: f64,
    pub temporal: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BehaviorThresholds {
    pub focus_session_threshold_minutes: f64,
    pub focus_gap_tolerance_minutes: f64,
    pub app_usage_frequency_threshold: f64,
    pub optimal_focus_minutes: f64,
    pub low_focus_minutes: f64,
    pub critical_focus_minutes: f64,
    pub low_productivity_score: f64,
    pub critical_productivity_score: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FinancialThresholds {
    pub spending_variance_threshold: f64,
    pub high_volatility_threshold: f64,
    pub budget_variance_threshold: f64,
    pub high_overrun_threshold: f64,
    pub recurring_min_transactions: usize,
    pub recurring_regularity_threshold: f64,
    pub category_concentration_threshold: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TemporalThresholds {
    pub segment_share_threshold: f64,
    pub time_block_gap_minutes: f64,
    pub routine_consistency_threshold: f64,
    pub min_pattern_occurrences: usize,
    pub weekend_variation_threshold: f64,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub correlation_threshold: Option<f64>,
    pub min_data_points: Option<usize>,
    pub default_window_days: Option<u32>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://clarity.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            analysis: AnalysisConfig::default(),
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            correlation_threshold: 0.7,
            pattern_significance_threshold: 0.6,
            min_data_points: 10,
            min_correlation_samples: 3,
            default_window_days: 30,
            weights: PatternWeights::default(),
            behavior: BehaviorThresholds::default(),
            financial: FinancialThresholds::default(),
            temporal: TemporalThresholds::default(),
        }
    }
}

impl Default for PatternWeights {
    fn default() -> Self {
        Self { productivity: 0.35, financial: 0.35, temporal: 0.30 }
    }
}

impl Default for BehaviorThresholds {
    fn default() -> Self {
        Self {
            focus_session_threshold_minutes: 25.0,
            focus_gap_tolerance_minutes: 5.0,
            app_usage_frequency_threshold: 5.0,
            optimal_focus_minutes: 50.0,
            low_focus_minutes: 45.0,
            critical_focus_minutes: 30.0,
            low_productivity_score: 0.5,
            critical_productivity_score: 0.3,
        }
    }
}

impl Default for FinancialThresholds {
    fn default() -> Self {
        Self {
            spending_variance_threshold: 0.3,
            high_volatility_threshold: 0.5,
            budget_variance_threshold: 0.15,
            high_overrun_threshold: 0.3,
            recurring_min_transactions: 5,
            recurring_regularity_threshold: 0.2,
            category_concentration_threshold: 0.3,
        }
    }
}

impl Default for TemporalThresholds {
    fn default() -> Self {
        Self {
            segment_share_threshold: 0.25,
            time_block_gap_minutes: 30.0,
            routine_consistency_threshold: 0.6,
            min_pattern_occurrences: 3,
            weekend_variation_threshold: 0.2,
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("clarity.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

        if let Some(analysis) = patch.analysis {
            if let Some(threshold) = analysis.correlation_threshold {
                self.analysis.correlation_threshold = threshold;
            }
            if let Some(threshold) = analysis.pattern_significance_threshold {
                self.analysis.pattern_significance_threshold = threshold;
            }
            if let Some(min_data_points) = analysis.min_data_points {
                self.analysis.min_data_points = min_data_points;
            }
            if let Some(min_samples) = analysis.min_correlation_samples {
                self.analysis.min_correlation_samples = min_samples;
            }
            if let Some(days) = analysis.default_window_days {
                self.analysis.default_window_days = days;
            }
            if let Some(weights) = analysis.weights {
                if let Some(productivity) = weights.productivity {
                    self.analysis.weights.productivity = productivity;
                }
                if let Some(financial) = weights.financial {
                    self.analysis.weights.financial = financial;
                }
                if let Some(temporal) = weights.temporal {
                    self.analysis.weights.temporal = temporal;
                }
            }
            if let Some(behavior) = analysis.behavior {
                self.analysis.behavior = behavior;
            }
            if let Some(financial) = analysis.financial {
                self.analysis.financial = financial;
            }
            if let Some(temporal) = analysis.temporal {
                self.analysis.temporal = temporal;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("CLARITY_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("CLARITY_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections =
                parse_env("CLARITY_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("CLARITY_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_env("CLARITY_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("CLARITY_ANALYSIS_CORRELATION_THRESHOLD") {
            self.analysis.correlation_threshold =
                parse_env("CLARITY_ANALYSIS_CORRELATION_THRESHOLD", &value)?;
        }
        if let Some(value) = read_env("CLARITY_ANALYSIS_SIGNIFICANCE_THRESHOLD") {
            self.analysis.pattern_significance_threshold =
                parse_env("CLARITY_ANALYSIS_SIGNIFICANCE_THRESHOLD", &value)?;
        }
        if let Some(value) = read_env("CLARITY_ANALYSIS_MIN_DATA_POINTS") {
            self.analysis.min_data_points = parse_env("CLARITY_ANALYSIS_MIN_DATA_POINTS", &value)?;
        }
        if let Some(value) = read_env("CLARITY_ANALYSIS_WINDOW_DAYS") {
            self.analysis.default_window_days =
                parse_env("CLARITY_ANALYSIS_WINDOW_DAYS", &value)?;
        }
        if let Some(value) = read_env("CLARITY_ANALYSIS_FOCUS_SESSION_MINUTES") {
            self.analysis.behavior.focus_session_threshold_minutes =
                parse_env("CLARITY_ANALYSIS_FOCUS_SESSION_MINUTES", &value)?;
        }
        if let Some(value) = read_env("CLARITY_ANALYSIS_FOCUS_GAP_MINUTES") {
            self.analysis.behavior.focus_gap_tolerance_minutes =
                parse_env("CLARITY_ANALYSIS_FOCUS_GAP_MINUTES", &value)?;
        }

        let log_level =
            read_env("CLARITY_LOGGING_LEVEL").or_else(|| read_env("CLARITY_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("CLARITY_LOGGING_FORMAT").or_else(|| read_env("CLARITY_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(threshold) = overrides.correlation_threshold {
            self.analysis.correlation_threshold = threshold;
        }
        if let Some(min_data_points) = overrides.min_data_points {
            self.analysis.min_data_points = min_data_points;
        }
        if let Some(days) = overrides.default_window_days {
            self.analysis.default_window_days = days;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        self.analysis.validate()?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

impl AnalysisConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (key, value) in [
            ("analysis.correlation_threshold", self.correlation_threshold),
            ("analysis.pattern_significance_threshold", self.pattern_significance_threshold),
            ("analysis.financial.spending_variance_threshold", self.financial.spending_variance_threshold),
            ("analysis.financial.budget_variance_threshold", self.financial.budget_variance_threshold),
            ("analysis.behavior.low_productivity_score", self.behavior.low_productivity_score),
            (
                "analysis.behavior.critical_productivity_score",
                self.behavior.critical_productivity_score,
            ),
            (
                "analysis.financial.recurring_regularity_threshold",
                self.financial.recurring_regularity_threshold,
            ),
            (
                "analysis.financial.category_concentration_threshold",
                self.financial.category_concentration_threshold,
            ),
            ("analysis.temporal.segment_share_threshold", self.temporal.segment_share_threshold),
            (
                "analysis.temporal.routine_consistency_threshold",
                self.temporal.routine_consistency_threshold,
            ),
        ] {
            if !(value > 0.0 && value <= 1.0) {
                return Err(ConfigError::Validation(format!("{key} must be in range (0, 1]")));
            }
        }

        if self.min_data_points < 2 {
            return Err(ConfigError::Validation(
                "analysis.min_data_points must be at least 2".to_string(),
            ));
        }
        if self.min_correlation_samples < 2 {
            return Err(ConfigError::Validation(
                "analysis.min_correlation_samples must be at least 2".to_string(),
            ));
        }
        if self.default_window_days == 0 {
            return Err(ConfigError::Validation(
                "analysis.default_window_days must be greater than zero".to_string(),
            ));
        }

        let weights = [self.weights.productivity, self.weights.financial, self.weights.temporal];
        if weights.iter().any(|weight| !weight.is_finite() || *weight < 0.0)
            || weights.iter().sum::<f64>() <= 0.0
        {
            return Err(ConfigError::Validation(
                "analysis.weights must be non-negative with a positive sum".to_string(),
            ));
        }

        if !(self.behavior.focus_session_threshold_minutes > 0.0) {
            return Err(ConfigError::Validation(
                "analysis.behavior.focus_session_threshold_minutes must be greater than zero"
                    .to_string(),
            ));
        }
        if !(self.behavior.focus_gap_tolerance_minutes >= 0.0) {
            return Err(ConfigError::Validation(
                "analysis.behavior.focus_gap_tolerance_minutes must not be negative".to_string(),
            ));
        }
        if !(self.temporal.time_block_gap_minutes >= 0.0) {
            return Err(ConfigError::Validation(
                "analysis.temporal.time_block_gap_minutes must not be negative".to_string(),
            ));
        }
        if self.behavior.critical_productivity_score > self.behavior.low_productivity_score {
            return Err(ConfigError::Validation(
                "analysis.behavior.critical_productivity_score must not exceed low_productivity_score"
                    .to_string(),
            ));
        }
        if !(self.financial.high_volatility_threshold >= self.financial.spending_variance_threshold) {
            return Err(ConfigError::Validation(
                "analysis.financial.high_volatility_threshold must be at least spending_variance_threshold"
                    .to_string(),
            ));
        }
        if !(self.financial.high_overrun_threshold > 0.0) {
            return Err(ConfigError::Validation(
                "analysis.financial.high_overrun_threshold must be greater than zero".to_string(),
            ));
        }
        if self.financial.recurring_min_transactions < 3 {
            return Err(ConfigError::Validation(
                "analysis.financial.recurring_min_transactions must be at least 3".to_string(),
            ));
        }

        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("clarity.toml"), PathBuf::from("config/clarity.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                .to_string(),
        ));
    }

    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be greater than zero".to_string(),
        ));
    }

    if database.timeout_secs == 0 || database.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "database.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse::<T>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    analysis: Option<AnalysisPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct AnalysisPatch {
    correlation_threshold: Option<f64>,
    pattern_significance_threshold: Option<f64>,
    min_data_points: Option<usize>,
    min_correlation_samples: Option<usize>,
    default_window_days: Option<u32>,
    weights: Option<WeightsPatch>,
    behavior: Option<BehaviorThresholds>,
    financial: Option<FinancialThresholds>,
    temporal: Option<TemporalThresholds>,
}

#[derive(Debug, Default, Deserialize)]
struct WeightsPatch {
    productivity: Option<f64>,
    financial: Option<f64>,
    temporal: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::fs;
    use std::io;
    use std::sync::{Mutex, OnceLock};

    use tempfile::TempDir;

    use super::{AnalysisConfig, AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    fn env_lock() -> &'static Mutex<()> {
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    fn clear_vars(vars: &[&str]) {
        for var in vars {
            env::remove_var(var);
        }
    }

    fn ensure(condition: bool, message: &'static str) -> Result<(), String> {
        if condition {
            Ok(())
        } else {
            Err(message.to_string())
        }
    }

    #[test]
    fn defaults_match_documented_thresholds() {
        let config = AnalysisConfig::default();

        assert_eq!(config.correlation_threshold, 0.7);
        assert_eq!(config.pattern_significance_threshold, 0.6);
        assert_eq!(config.min_data_points, 10);
        assert_eq!(config.default_window_days, 30);
        assert_eq!(config.behavior.focus_session_threshold_minutes, 25.0);
        assert_eq!(config.behavior.focus_gap_tolerance_minutes, 5.0);
        assert_eq!(config.weights.productivity, 0.35);
        assert_eq!(config.weights.temporal, 0.30);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn file_load_supports_env_interpolation_and_partial_sections() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("TEST_CLARITY_DB", "sqlite://interpolated.db");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("clarity.toml");
            fs::write(
                &path,
                r#"
[database]
url = "${TEST_CLARITY_DB}"

[analysis]
correlation_threshold = 0.8

[analysis.weights]
temporal = 0.5

[analysis.financial]
budget_variance_threshold = 0.2
"#,
            )
            .map_err(|err| err.to_string())?;

            let config =
                AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                    .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.database.url == "sqlite://interpolated.db",
                "database url should be interpolated from environment",
            )?;
            ensure(config.analysis.correlation_threshold == 0.8, "threshold should come from file")?;
            ensure(config.analysis.weights.temporal == 0.5, "temporal weight should come from file")?;
            ensure(
                config.analysis.weights.productivity == 0.35,
                "unset weights should keep defaults",
            )?;
            ensure(
                config.analysis.financial.budget_variance_threshold == 0.2,
                "financial threshold should come from file",
            )?;
            ensure(
                config.analysis.financial.recurring_min_transactions == 5,
                "unset financial fields should keep defaults",
            )?;
            Ok(())
        })();

        clear_vars(&["TEST_CLARITY_DB"]);
        result
    }

    #[test]
    fn logging_env_aliases_are_supported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("CLARITY_LOG_LEVEL", "warn");
        env::set_var("CLARITY_LOG_FORMAT", "pretty");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.logging.level == "warn", "warning log level should be set from env var")?;
            ensure(
                matches!(config.logging.format, LogFormat::Pretty),
                "pretty logging format should be set from env var",
            )?;
            Ok(())
        })();

        clear_vars(&["CLARITY_LOG_LEVEL", "CLARITY_LOG_FORMAT"]);
        result
    }

    #[test]
    fn precedence_defaults_file_env_overrides() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("CLARITY_DATABASE_URL", "sqlite://from-env.db");
        env::set_var("CLARITY_ANALYSIS_MIN_DATA_POINTS", "12");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("clarity.toml");
            fs::write(
                &path,
                r#"
[database]
url = "sqlite://from-file.db"

[analysis]
min_data_points = 8
default_window_days = 14

[logging]
level = "warn"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config = AppConfig::load(LoadOptions {
                config_path: Some(path),
                overrides: ConfigOverrides {
                    database_url: Some("sqlite://from-override.db".to_string()),
                    log_level: Some("debug".to_string()),
                    ..ConfigOverrides::default()
                },
                ..LoadOptions::default()
            })
            .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.database.url == "sqlite://from-override.db",
                "override database url should win",
            )?;
            ensure(config.logging.level == "debug", "overridden log level should be debug")?;
            ensure(config.analysis.min_data_points == 12, "env should win over file")?;
            ensure(config.analysis.default_window_days == 14, "file should win over defaults")?;
            Ok(())
        })();

        clear_vars(&["CLARITY_DATABASE_URL", "CLARITY_ANALYSIS_MIN_DATA_POINTS"]);
        result
    }

    #[test]
    fn invalid_env_override_is_reported_with_key() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("CLARITY_ANALYSIS_CORRELATION_THRESHOLD", "strong");

        let result = (|| -> Result<(), String> {
            match AppConfig::load(LoadOptions::default()) {
                Ok(_) => Err("expected env override failure".to_string()),
                Err(ConfigError::InvalidEnvOverride { key, .. }) => ensure(
                    key == "CLARITY_ANALYSIS_CORRELATION_THRESHOLD",
                    "error should name the offending variable",
                ),
                Err(other) => Err(format!("unexpected error: {other}")),
            }
        })();

        clear_vars(&["CLARITY_ANALYSIS_CORRELATION_THRESHOLD"]);
        result
    }

    #[test]
    fn validation_fails_fast_with_actionable_error() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let error = match AppConfig::load(LoadOptions {
            overrides: ConfigOverrides {
                correlation_threshold: Some(1.5),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        }) {
            Ok(_) => return Err("expected validation failure but config load succeeded".to_string()),
            Err(error) => error,
        };
        let has_message = matches!(
            error,
            ConfigError::Validation(ref message) if message.contains("analysis.correlation_threshold")
        );
        ensure(has_message, "validation failure should mention analysis.correlation_threshold")
    }

    #[test]
    fn zero_weights_are_rejected() {
        let mut config = AnalysisConfig::default();
        config.weights.productivity = 0.0;
        config.weights.financial = 0.0;
        config.weights.temporal = 0.0;

        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn severity_cutoffs_must_sit_above_their_base_thresholds() {
        let mut config = AnalysisConfig::default();
        config.behavior.critical_productivity_score = 0.6;
        assert!(matches!(config.validate(), Err(ConfigError::Validation(ref message))
            if message.contains("critical_productivity_score")));

        let mut config = AnalysisConfig::default();
        config.financial.high_volatility_threshold = 0.2;
        assert!(matches!(config.validate(), Err(ConfigError::Validation(ref message))
            if message.contains("high_volatility_threshold")));

        let mut config = AnalysisConfig::default();
        config.financial.high_overrun_threshold = 1.5;
        assert!(config.validate().is_ok());
    }
}
