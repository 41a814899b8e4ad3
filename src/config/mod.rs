//! Configuration loading for the performance engine.
//!
//! Loads layered `.env` files and environment variables prefixed with
//! `PERF_`, producing a typed [`AppConfig`].

use std::{collections::BTreeMap, env, path::PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Application configuration derived from `PERF_*` environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct AppConfig {
    #[serde(default = "default_profile")]
    pub profile: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_log_format")]
    pub log_format: String,
    #[serde(default = "default_database_url")]
    pub database_url: String,
    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,
    #[serde(default = "default_db_acquire_timeout_ms")]
    pub db_acquire_timeout_ms: u64,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub engine: EngineConfig,
}

/// Background sweep scheduling parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct SchedulerConfig {
    /// Seconds between sweep ticks (default: 900)
    #[serde(default = "default_scheduler_tick_interval_seconds")]
    pub tick_interval_seconds: u64,

    /// Users processed per chunk inside a sweep (default: 50)
    #[serde(default = "default_scheduler_chunk_size")]
    pub chunk_size: usize,

    /// Whether lead score decay runs on each tick (default: true)
    #[serde(default = "default_true")]
    pub score_decay_enabled: bool,
}

/// Tunables for the scoring and gamification components.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct EngineConfig {
    /// Minimum seconds between event-driven leaderboard refreshes per tenant (default: 300)
    ///
    /// Environment variable: `PERF_LEADERBOARD_COOLDOWN_SECONDS`
    #[serde(default = "default_leaderboard_cooldown_seconds")]
    pub leaderboard_cooldown_seconds: u64,

    /// Days after issuance during which a penalty may be appealed (default: 7)
    ///
    /// Environment variable: `PERF_APPEAL_WINDOW_DAYS`
    #[serde(default = "default_appeal_window_days")]
    pub appeal_window_days: i64,

    /// Days without engagement before a lead's score starts decaying (default: 7)
    #[serde(default = "default_lead_decay_idle_days")]
    pub lead_decay_idle_days: i64,

    /// Points removed from an idle lead per decay run (default: 2)
    #[serde(default = "default_lead_decay_points")]
    pub lead_decay_points: i32,

    /// Score at or above which a lead is hot (default: 80)
    #[serde(default = "default_hot_lead_threshold")]
    pub hot_lead_threshold: i32,

    /// Score below which a lead counts as cold for alerts (default: 40)
    #[serde(default = "default_cold_lead_threshold")]
    pub cold_lead_threshold: i32,

    /// Deal amount that unlocks the big-deal achievement (default: 50,000,000)
    #[serde(default = "default_big_deal_amount")]
    pub big_deal_amount: f64,

    /// Warnings issued before seeded penalty rules escalate to penalties (default: 2)
    #[serde(default = "default_warning_threshold")]
    pub default_warning_threshold: i32,

    /// Entries kept in each settings / leaderboard cache (default: 256)
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,

    /// Hours an assigned lead may wait for first contact before it is penalised (default: 24)
    #[serde(default = "default_followup_penalty_hours")]
    pub followup_penalty_hours: i64,

    /// Hours before that deadline the assignee is reminded (default: 4)
    #[serde(default = "default_followup_warning_hours")]
    pub followup_warning_hours: i64,

    /// Average achievement percent under which heads hear about a member (default: 50)
    #[serde(default = "default_kpi_warning_threshold")]
    pub kpi_warning_threshold: f64,

    /// Trailing days averaged for the KPI warning (default: 3)
    #[serde(default = "default_kpi_warning_days")]
    pub kpi_warning_days: i64,

    /// Shortest streak worth a reminder when today is not yet counted (default: 3)
    #[serde(default = "default_streak_warning_min_days")]
    pub streak_warning_min_days: i32,

    /// Days read, dismissed or actioned alerts are kept (default: 30)
    ///
    /// Environment variable: `PERF_ALERT_RETENTION_DAYS`
    #[serde(default = "default_alert_retention_days")]
    pub alert_retention_days: i64,

    /// Places a user must move on the daily board to be told (default: 3)
    #[serde(default = "default_rank_change_alert_min")]
    pub rank_change_alert_min: i32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            profile: default_profile(),
            log_level: default_log_level(),
            log_format: default_log_format(),
            database_url: default_database_url(),
            db_max_connections: default_db_max_connections(),
            db_acquire_timeout_ms: default_db_acquire_timeout_ms(),
            scheduler: SchedulerConfig::default(),
            engine: EngineConfig::default(),
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval_seconds: default_scheduler_tick_interval_seconds(),
            chunk_size: default_scheduler_chunk_size(),
            score_decay_enabled: true,
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            leaderboard_cooldown_seconds: default_leaderboard_cooldown_seconds(),
            appeal_window_days: default_appeal_window_days(),
            lead_decay_idle_days: default_lead_decay_idle_days(),
            lead_decay_points: default_lead_decay_points(),
            hot_lead_threshold: default_hot_lead_threshold(),
            cold_lead_threshold: default_cold_lead_threshold(),
            big_deal_amount: default_big_deal_amount(),
            default_warning_threshold: default_warning_threshold(),
            cache_capacity: default_cache_capacity(),
            followup_penalty_hours: default_followup_penalty_hours(),
            followup_warning_hours: default_followup_warning_hours(),
            kpi_warning_threshold: default_kpi_warning_threshold(),
            kpi_warning_days: default_kpi_warning_days(),
            streak_warning_min_days: default_streak_warning_min_days(),
            alert_retention_days: default_alert_retention_days(),
            rank_change_alert_min: default_rank_change_alert_min(),
        }
    }
}

impl AppConfig {
    /// Returns a redacted JSON representation (database credentials are masked).
    pub fn redacted_json(&self) -> serde_json::Result<String> {
        let mut config = self.clone();
        config.database_url = redact_database_url(&config.database_url);
        serde_json::to_string_pretty(&config)
    }

    /// Validates the configuration, returning the first violated bound.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database_url.trim().is_empty() {
            return Err(ConfigError::MissingDatabaseUrl);
        }
        if !matches!(self.log_format.as_str(), "json" | "pretty") {
            return Err(ConfigError::InvalidLogFormat {
                value: self.log_format.clone(),
            });
        }
        self.scheduler.validate()?;
        self.engine.validate()?;
        Ok(())
    }
}

impl SchedulerConfig {
    /// Validate scheduler configuration bounds.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_interval_seconds < 10 || self.tick_interval_seconds > 86_400 {
            return Err(ConfigError::InvalidSchedulerTickInterval {
                value: self.tick_interval_seconds,
            });
        }
        if self.chunk_size == 0 || self.chunk_size > 1_000 {
            return Err(ConfigError::InvalidSchedulerChunkSize {
                value: self.chunk_size,
            });
        }
        Ok(())
    }
}

impl EngineConfig {
    /// Validate engine tunables.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.appeal_window_days < 0 {
            return Err(ConfigError::InvalidAppealWindow {
                value: self.appeal_window_days,
            });
        }
        if self.lead_decay_idle_days < 1 || self.lead_decay_points < 0 {
            return Err(ConfigError::InvalidLeadDecay {
                idle_days: self.lead_decay_idle_days,
                points: self.lead_decay_points,
            });
        }
        if !(0..=100).contains(&self.cold_lead_threshold)
            || !(0..=100).contains(&self.hot_lead_threshold)
            || self.cold_lead_threshold >= self.hot_lead_threshold
        {
            return Err(ConfigError::InvalidLeadThresholds {
                hot: self.hot_lead_threshold,
                cold: self.cold_lead_threshold,
            });
        }
        if self.default_warning_threshold < 0 {
            return Err(ConfigError::InvalidWarningThreshold {
                value: self.default_warning_threshold,
            });
        }
        if self.cache_capacity == 0 {
            return Err(ConfigError::InvalidCacheCapacity);
        }
        if self.followup_warning_hours < 1 || self.followup_warning_hours >= self.followup_penalty_hours {
            return Err(ConfigError::InvalidFollowupWindow {
                penalty_hours: self.followup_penalty_hours,
                warning_hours: self.followup_warning_hours,
            });
        }
        for (name, value) in [
            ("kpi_warning_days", self.kpi_warning_days),
            ("alert_retention_days", self.alert_retention_days),
            ("rank_change_alert_min", self.rank_change_alert_min as i64),
            ("streak_warning_min_days", self.streak_warning_min_days as i64),
        ] {
            if value < 1 {
                return Err(ConfigError::NonPositive { name, value });
            }
        }
        Ok(())
    }
}

fn redact_database_url(url: &str) -> String {
    match (url.find("://"), url.rfind('@')) {
        (Some(scheme_end), Some(at)) if at > scheme_end => {
            format!("{}://[REDACTED]{}", &url[..scheme_end], &url[at..])
        }
        _ => url.to_string(),
    }
}

fn default_profile() -> String {
    "local".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

fn default_database_url() -> String {
    "sqlite::memory:".to_string()
}

fn default_db_max_connections() -> u32 {
    10
}

fn default_db_acquire_timeout_ms() -> u64 {
    5_000
}

fn default_true() -> bool {
    true
}

fn default_scheduler_tick_interval_seconds() -> u64 {
    900
}

fn default_scheduler_chunk_size() -> usize {
    50
}

fn default_leaderboard_cooldown_seconds() -> u64 {
    300
}

fn default_appeal_window_days() -> i64 {
    7
}

fn default_lead_decay_idle_days() -> i64 {
    7
}

fn default_lead_decay_points() -> i32 {
    2
}

fn default_hot_lead_threshold() -> i32 {
    80
}

fn default_cold_lead_threshold() -> i32 {
    40
}

fn default_big_deal_amount() -> f64 {
    50_000_000.0
}

fn default_warning_threshold() -> i32 {
    2
}

fn default_cache_capacity() -> usize {
    256
}

fn default_followup_penalty_hours() -> i64 {
    24
}

fn default_followup_warning_hours() -> i64 {
    4
}

fn default_kpi_warning_threshold() -> f64 {
    50.0
}

fn default_kpi_warning_days() -> i64 {
    3
}

fn default_streak_warning_min_days() -> i32 {
    3
}

fn default_alert_retention_days() -> i64 {
    30
}

fn default_rank_change_alert_min() -> i32 {
    3
}

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load environment file {path}: {source}")]
    EnvFile {
        path: PathBuf,
        #[source]
        source: dotenvy::Error,
    },
    #[error("database url is missing; set PERF_DATABASE_URL")]
    MissingDatabaseUrl,
    #[error("log format must be 'json' or 'pretty', got '{value}'")]
    InvalidLogFormat { value: String },
    #[error("scheduler tick interval must be between 10 and 86400 seconds, got {value}")]
    InvalidSchedulerTickInterval { value: u64 },
    #[error("scheduler chunk size must be between 1 and 1000, got {value}")]
    InvalidSchedulerChunkSize { value: usize },
    #[error("appeal window must not be negative, got {value} days")]
    InvalidAppealWindow { value: i64 },
    #[error("lead decay needs at least one idle day and non-negative points, got {idle_days} days / {points} points")]
    InvalidLeadDecay { idle_days: i64, points: i32 },
    #[error("lead thresholds must satisfy 0 <= cold ({cold}) < hot ({hot}) <= 100")]
    InvalidLeadThresholds { hot: i32, cold: i32 },
    #[error("default warning threshold must not be negative, got {value}")]
    InvalidWarningThreshold { value: i32 },
    #[error("cache capacity must be positive")]
    InvalidCacheCapacity,
    #[error("follow-up reminder must come 1 to {penalty_hours} hours before the deadline, got {warning_hours}")]
    InvalidFollowupWindow { penalty_hours: i64, warning_hours: i64 },
    #[error("{name} must be positive, got {value}")]
    NonPositive { name: &'static str, value: i64 },
}

/// Loads configuration using layered `.env` files and `PERF_*` env vars.
pub struct ConfigLoader {
    base_dir: PathBuf,
}

impl ConfigLoader {
    /// Creates a new loader rooted at the current working directory.
    pub fn new() -> Self {
        Self {
            base_dir: env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
        }
    }

    /// Creates a loader rooted at the provided directory (useful for tests).
    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    /// Loads configuration: dotenv layers first, process environment last so it wins.
    pub fn load(&self) -> Result<AppConfig, ConfigError> {
        let (mut layered, profile_hint) = self.collect_layered_env()?;

        for (key, value) in env::vars() {
            if let Some(stripped) = key.strip_prefix("PERF_") {
                layered.insert(stripped.to_string(), value);
            }
        }

        let profile = layered
            .remove("PROFILE")
            .filter(|v| !v.is_empty())
            .unwrap_or(profile_hint);
        let log_level = layered
            .remove("LOG_LEVEL")
            .filter(|v| !v.is_empty())
            .unwrap_or_else(default_log_level);
        let log_format = layered
            .remove("LOG_FORMAT")
            .filter(|v| !v.is_empty())
            .unwrap_or_else(default_log_format);
        let database_url = layered
            .remove("DATABASE_URL")
            .filter(|v| !v.is_empty())
            .unwrap_or_else(default_database_url);
        let db_max_connections = parse_or(&mut layered, "DB_MAX_CONNECTIONS", default_db_max_connections);
        let db_acquire_timeout_ms =
            parse_or(&mut layered, "DB_ACQUIRE_TIMEOUT_MS", default_db_acquire_timeout_ms);

        let scheduler = SchedulerConfig {
            tick_interval_seconds: parse_or(
                &mut layered,
                "SCHEDULER_TICK_INTERVAL_SECONDS",
                default_scheduler_tick_interval_seconds,
            ),
            chunk_size: parse_or(&mut layered, "SCHEDULER_CHUNK_SIZE", default_scheduler_chunk_size),
            score_decay_enabled: parse_or(&mut layered, "SCHEDULER_SCORE_DECAY_ENABLED", default_true),
        };

        let engine = EngineConfig {
            leaderboard_cooldown_seconds: parse_or(
                &mut layered,
                "LEADERBOARD_COOLDOWN_SECONDS",
                default_leaderboard_cooldown_seconds,
            ),
            appeal_window_days: parse_or(&mut layered, "APPEAL_WINDOW_DAYS", default_appeal_window_days),
            lead_decay_idle_days: parse_or(
                &mut layered,
                "LEAD_DECAY_IDLE_DAYS",
                default_lead_decay_idle_days,
            ),
            lead_decay_points: parse_or(&mut layered, "LEAD_DECAY_POINTS", default_lead_decay_points),
            hot_lead_threshold: parse_or(&mut layered, "HOT_LEAD_THRESHOLD", default_hot_lead_threshold),
            cold_lead_threshold: parse_or(
                &mut layered,
                "COLD_LEAD_THRESHOLD",
                default_cold_lead_threshold,
            ),
            big_deal_amount: parse_or(&mut layered, "BIG_DEAL_AMOUNT", default_big_deal_amount),
            default_warning_threshold: parse_or(
                &mut layered,
                "DEFAULT_WARNING_THRESHOLD",
                default_warning_threshold,
            ),
            cache_capacity: parse_or(&mut layered, "CACHE_CAPACITY", default_cache_capacity),
            followup_penalty_hours: parse_or(
                &mut layered,
                "FOLLOWUP_PENALTY_HOURS",
                default_followup_penalty_hours,
            ),
            followup_warning_hours: parse_or(
                &mut layered,
                "FOLLOWUP_WARNING_HOURS",
                default_followup_warning_hours,
            ),
            kpi_warning_threshold: parse_or(
                &mut layered,
                "KPI_WARNING_THRESHOLD",
                default_kpi_warning_threshold,
            ),
            kpi_warning_days: parse_or(&mut layered, "KPI_WARNING_DAYS", default_kpi_warning_days),
            streak_warning_min_days: parse_or(
                &mut layered,
                "STREAK_WARNING_MIN_DAYS",
                default_streak_warning_min_days,
            ),
            alert_retention_days: parse_or(
                &mut layered,
                "ALERT_RETENTION_DAYS",
                default_alert_retention_days,
            ),
            rank_change_alert_min: parse_or(
                &mut layered,
                "RANK_CHANGE_ALERT_MIN",
                default_rank_change_alert_min,
            ),
        };

        let config = AppConfig {
            profile,
            log_level,
            log_format,
            database_url,
            db_max_connections,
            db_acquire_timeout_ms,
            scheduler,
            engine,
        };

        config.validate()?;
        Ok(config)
    }

    fn collect_layered_env(&self) -> Result<(BTreeMap<String, String>, String), ConfigError> {
        let mut values = BTreeMap::new();

        self.merge_dotenv(self.base_dir.join(".env"), &mut values)?;
        self.merge_dotenv(self.base_dir.join(".env.local"), &mut values)?;

        let profile = env::var("PERF_PROFILE")
            .ok()
            .or_else(|| values.get("PROFILE").cloned())
            .unwrap_or_else(default_profile);

        self.merge_dotenv(
            self.base_dir.join(format!(".env.{}", &profile)),
            &mut values,
        )?;
        self.merge_dotenv(
            self.base_dir.join(format!(".env.{}.local", &profile)),
            &mut values,
        )?;

        Ok((values, profile))
    }

    fn merge_dotenv(
        &self,
        path: PathBuf,
        values: &mut BTreeMap<String, String>,
    ) -> Result<(), ConfigError> {
        match dotenvy::from_path_iter(&path) {
            Ok(iter) => {
                for item in iter {
                    let (key, value) = item.map_err(|source| ConfigError::EnvFile {
                        path: path.clone(),
                        source,
                    })?;
                    if let Some(stripped) = key.strip_prefix("PERF_") {
                        values.insert(stripped.to_string(), value);
                    }
                }
                Ok(())
            }
            Err(dotenvy::Error::Io(ref io_err))
                if io_err.kind() == std::io::ErrorKind::NotFound =>
            {
                Ok(())
            }
            Err(err) => Err(ConfigError::EnvFile { path, source: err }),
        }
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_or<T: std::str::FromStr>(
    layered: &mut BTreeMap<String, String>,
    key: &str,
    default: fn() -> T,
) -> T {
    layered
        .remove(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or_else(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(AppConfig::default().validate().is_ok());
    }

    #[test]
    fn test_scheduler_bounds() {
        let config = SchedulerConfig {
            tick_interval_seconds: 5,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidSchedulerTickInterval { value: 5 })
        ));

        let config = SchedulerConfig {
            chunk_size: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_lead_thresholds_must_be_ordered() {
        let config = EngineConfig {
            hot_lead_threshold: 40,
            cold_lead_threshold: 60,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidLeadThresholds { hot: 40, cold: 60 })
        ));
    }

    #[test]
    fn test_followup_reminder_precedes_deadline() {
        let config = EngineConfig {
            followup_penalty_hours: 4,
            followup_warning_hours: 4,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidFollowupWindow { .. })
        ));

        let config = EngineConfig {
            alert_retention_days: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::NonPositive {
                name: "alert_retention_days",
                value: 0
            })
        ));
    }

    #[test]
    fn test_redacted_json_masks_credentials() {
        let config = AppConfig {
            database_url: "postgres://app:secret@db:5432/perf".to_string(),
            ..Default::default()
        };
        let rendered = config.redacted_json().unwrap();
        assert!(!rendered.contains("secret"));
        assert!(rendered.contains("postgres://[REDACTED]@db:5432/perf"));
    }
}
