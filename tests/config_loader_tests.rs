use performance_engine::config::{ConfigError, ConfigLoader};
use std::{
    env, fs,
    path::PathBuf,
    sync::{Mutex, MutexGuard, OnceLock},
};
use tempfile::TempDir;

const VARS: [&str; 7] = [
    "PERF_PROFILE",
    "PERF_LOG_LEVEL",
    "PERF_LOG_FORMAT",
    "PERF_DATABASE_URL",
    "PERF_SCHEDULER_CHUNK_SIZE",
    "PERF_HOT_LEAD_THRESHOLD",
    "PERF_COLD_LEAD_THRESHOLD",
];

fn env_lock() -> &'static Mutex<()> {
    static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    LOCK.get_or_init(|| Mutex::new(()))
}

fn env_guard() -> MutexGuard<'static, ()> {
    env_lock()
        .lock()
        .unwrap_or_else(|poison| poison.into_inner())
}

fn clear_env() {
    for var in VARS {
        unsafe {
            env::remove_var(var);
        }
    }
}

fn write_env_file(dir: &TempDir, name: &str, contents: &str) {
    let path = dir.path().join(name);
    fs::write(path, contents).unwrap();
}

#[test]
fn loads_defaults_when_no_env_present() {
    let _guard = env_guard();
    clear_env();

    let temp_dir = TempDir::new().unwrap();
    let loader = ConfigLoader::with_base_dir(PathBuf::from(temp_dir.path()));
    let cfg = loader.load().expect("config loads with defaults");

    assert_eq!(cfg.profile, "local");
    assert_eq!(cfg.log_level, "info");
    assert_eq!(cfg.log_format, "json");
    assert_eq!(cfg.database_url, "sqlite::memory:");
    assert_eq!(cfg.scheduler.chunk_size, 50);
    assert_eq!(cfg.scheduler.tick_interval_seconds, 900);
    assert!(cfg.scheduler.score_decay_enabled);
    assert_eq!(cfg.engine.appeal_window_days, 7);
    assert_eq!(cfg.engine.hot_lead_threshold, 80);
    assert_eq!(cfg.engine.cold_lead_threshold, 40);
    assert_eq!(cfg.engine.followup_penalty_hours, 24);
    assert_eq!(cfg.engine.followup_warning_hours, 4);
    assert_eq!(cfg.engine.alert_retention_days, 30);
    clear_env();
}

#[test]
fn layered_env_files_apply_in_order() {
    let _guard = env_guard();
    clear_env();

    let temp_dir = TempDir::new().unwrap();
    write_env_file(&temp_dir, ".env", "PERF_SCHEDULER_CHUNK_SIZE=10\n");
    write_env_file(&temp_dir, ".env.test", "PERF_SCHEDULER_CHUNK_SIZE=20\n");
    write_env_file(&temp_dir, ".env.test.local", "PERF_SCHEDULER_CHUNK_SIZE=30\n");

    // Select profile via .env.local before profile-specific files load.
    write_env_file(
        &temp_dir,
        ".env.local",
        "PERF_PROFILE=test\nPERF_SCHEDULER_CHUNK_SIZE=15\nPERF_LOG_LEVEL=debug\n",
    );

    let loader = ConfigLoader::with_base_dir(PathBuf::from(temp_dir.path()));
    let cfg = loader.load().expect("config loads with layered env files");

    assert_eq!(cfg.profile, "test");
    assert_eq!(cfg.scheduler.chunk_size, 30);
    assert_eq!(cfg.log_level, "debug");
    clear_env();
}

#[test]
fn os_environment_has_highest_precedence() {
    let _guard = env_guard();
    clear_env();

    let temp_dir = TempDir::new().unwrap();
    write_env_file(
        &temp_dir,
        ".env",
        "PERF_SCHEDULER_CHUNK_SIZE=10\nPERF_LOG_FORMAT=pretty\n",
    );

    unsafe {
        env::set_var("PERF_SCHEDULER_CHUNK_SIZE", "75");
    }

    let loader = ConfigLoader::with_base_dir(PathBuf::from(temp_dir.path()));
    let cfg = loader.load().expect("config loads with env override");
    assert_eq!(cfg.scheduler.chunk_size, 75);
    assert_eq!(cfg.log_format, "pretty");

    clear_env();
}

#[test]
fn zero_chunk_size_returns_error() {
    let _guard = env_guard();
    clear_env();

    unsafe {
        env::set_var("PERF_SCHEDULER_CHUNK_SIZE", "0");
    }
    let temp_dir = TempDir::new().unwrap();
    let loader = ConfigLoader::with_base_dir(PathBuf::from(temp_dir.path()));
    let err = loader.load().expect_err("zero chunk size should fail");
    assert!(matches!(err, ConfigError::InvalidSchedulerChunkSize { value: 0 }));

    clear_env();
}

#[test]
fn inverted_lead_thresholds_return_error() {
    let _guard = env_guard();
    clear_env();

    unsafe {
        env::set_var("PERF_HOT_LEAD_THRESHOLD", "30");
        env::set_var("PERF_COLD_LEAD_THRESHOLD", "60");
    }
    let temp_dir = TempDir::new().unwrap();
    let loader = ConfigLoader::with_base_dir(PathBuf::from(temp_dir.path()));
    let err = loader.load().expect_err("cold above hot should fail");
    assert!(format!("{}", err).contains("lead thresholds"));

    clear_env();
}

#[test]
fn database_credentials_are_redacted() {
    let _guard = env_guard();
    clear_env();

    unsafe {
        env::set_var("PERF_DATABASE_URL", "postgres://sales:s3cret@db:5432/perf");
    }
    let temp_dir = TempDir::new().unwrap();
    let loader = ConfigLoader::with_base_dir(PathBuf::from(temp_dir.path()));
    let cfg = loader.load().expect("config loads");
    let redacted = cfg.redacted_json().expect("serializes");
    assert!(!redacted.contains("s3cret"));
    assert!(redacted.contains("[REDACTED]@db:5432/perf"));

    clear_env();
}
