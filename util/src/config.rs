//! Global application configuration manager.
//!
//! `AppConfig` is a lazily initialized, globally accessible singleton containing
//! runtime configuration values loaded from environment variables. It provides
//! thread-safe access and mutation for testing or overrides in runtime environments.

use std::env;
use std::sync::{OnceLock, RwLock};

/// Represents the complete application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub env: String,
    pub project_name: String,
    pub log_level: String,
    pub log_file: String,
    pub log_to_stdout: bool,
    pub database_path: String,
    /// Minutes past a session's start time before a check-in is marked late.
    pub checkin_grace_minutes: i64,
    /// Biometric match confidence below this value is rejected outright.
    pub biometric_min_confidence: f64,
}

/// Lazily-initialized, thread-safe singleton instance of `AppConfig`.
static CONFIG_INSTANCE: OnceLock<RwLock<AppConfig>> = OnceLock::new();

impl AppConfig {
    /// Loads the configuration from `.env` and environment variables.
    ///
    /// This method is used internally to populate the singleton. It panics
    /// if required variables are missing or improperly formatted.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        Self {
            env: env::var("APP_ENV").unwrap_or_else(|_| "development".into()),
            project_name: env::var("PROJECT_NAME").unwrap_or_else(|_| "attendance-engine".into()),
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "services=info".into()),
            log_file: env::var("LOG_FILE").unwrap_or_else(|_| "attendance.log".into()),
            log_to_stdout: env::var("LOG_TO_STDOUT").unwrap_or_else(|_| "false".into()) == "true",
            database_path: env::var("DATABASE_PATH").expect("DATABASE_PATH is required"),
            checkin_grace_minutes: env::var("CHECKIN_GRACE_MINUTES")
                .unwrap_or_else(|_| "15".into())
                .parse()
                .expect("CHECKIN_GRACE_MINUTES must be an integer"),
            biometric_min_confidence: env::var("BIOMETRIC_MIN_CONFIDENCE")
                .unwrap_or_else(|_| "0.6".into())
                .parse()
                .expect("BIOMETRIC_MIN_CONFIDENCE must be a float"),
        }
    }

    /// Returns a shared reference to the global configuration.
    ///
    /// # Panics
    /// Panics if the lock cannot be acquired.
    pub fn global() -> std::sync::RwLockReadGuard<'static, AppConfig> {
        CONFIG_INSTANCE
            .get_or_init(|| RwLock::new(AppConfig::from_env()))
            .read()
            .expect("Failed to acquire AppConfig read lock")
    }

    /// Resets the configuration by reloading from environment variables.
    ///
    /// Useful in tests to clear overrides.
    pub fn reset() {
        if let Some(lock) = CONFIG_INSTANCE.get() {
            let mut cfg = lock.write().expect("Failed to acquire AppConfig write lock");
            *cfg = AppConfig::from_env();
        }
    }
}

/// Path (or DSN) of the attendance database.
pub fn database_path() -> String {
    AppConfig::global().database_path.clone()
}

/// Grace period, in minutes, before a check-in counts as late.
pub fn checkin_grace_minutes() -> i64 {
    AppConfig::global().checkin_grace_minutes
}

/// Minimum acceptable biometric match confidence.
pub fn biometric_min_confidence() -> f64 {
    AppConfig::global().biometric_min_confidence
}
