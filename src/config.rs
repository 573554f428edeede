/// Runtime configuration for the import pipeline
///
/// Values come from the process environment (optionally seeded from `.env`
/// via dotenvy). Every key has a default so an empty environment is valid.
use crate::modules::import_jobs::CompletionPolicy;
use crate::shared::errors::{AppError, AppResult};
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_ATTEMPT_TIMEOUT_SECS: u64 = 300;
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 500;
pub const DEFAULT_REAPER_INTERVAL_SECS: u64 = 30;

#[derive(Debug, Clone)]
pub struct ImportConfig {
    pub max_attempts: u32,
    pub attempt_timeout: Duration,
    pub worker_concurrency: usize,
    pub poll_interval: Duration,
    pub reaper_interval: Duration,
    pub completion_policy: CompletionPolicy,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            attempt_timeout: Duration::from_secs(DEFAULT_ATTEMPT_TIMEOUT_SECS),
            worker_concurrency: default_worker_concurrency(),
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            reaper_interval: Duration::from_secs(DEFAULT_REAPER_INTERVAL_SECS),
            completion_policy: CompletionPolicy::default(),
        }
    }
}

impl ImportConfig {
    /// Age after which an unfinished job with no queued tasks counts as stalled
    pub fn stall_threshold(&self) -> Duration {
        self.attempt_timeout + self.reaper_interval
    }

    /// Load configuration from the environment, falling back to defaults
    pub fn from_env() -> AppResult<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup (environment, test maps)
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> AppResult<Self> {
        let defaults = Self::default();

        let max_attempts: u32 = parse_or("IMPORT_MAX_ATTEMPTS", &lookup, defaults.max_attempts)?;
        if max_attempts == 0 {
            return Err(AppError::ConfigError(
                "IMPORT_MAX_ATTEMPTS must be at least 1".to_string(),
            ));
        }

        let timeout_secs: u64 = parse_or(
            "IMPORT_ATTEMPT_TIMEOUT_SECS",
            &lookup,
            DEFAULT_ATTEMPT_TIMEOUT_SECS,
        )?;
        let worker_concurrency: usize = parse_or(
            "IMPORT_WORKER_CONCURRENCY",
            &lookup,
            defaults.worker_concurrency,
        )?;
        let poll_ms: u64 = parse_or("IMPORT_POLL_INTERVAL_MS", &lookup, DEFAULT_POLL_INTERVAL_MS)?;
        let reaper_secs: u64 = parse_or(
            "IMPORT_REAPER_INTERVAL_SECS",
            &lookup,
            DEFAULT_REAPER_INTERVAL_SECS,
        )?;
        let completion_policy: CompletionPolicy =
            parse_or("IMPORT_COMPLETION_POLICY", &lookup, defaults.completion_policy)?;

        if timeout_secs == 0 || worker_concurrency == 0 {
            return Err(AppError::ConfigError(
                "IMPORT_ATTEMPT_TIMEOUT_SECS and IMPORT_WORKER_CONCURRENCY must be positive"
                    .to_string(),
            ));
        }

        Ok(Self {
            max_attempts,
            attempt_timeout: Duration::from_secs(timeout_secs),
            worker_concurrency,
            poll_interval: Duration::from_millis(poll_ms.max(1)),
            reaper_interval: Duration::from_secs(reaper_secs.max(1)),
            completion_policy,
        })
    }
}

fn parse_or<T>(key: &str, lookup: &impl Fn(&str) -> Option<String>, default: T) -> AppResult<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|e| AppError::ConfigError(format!("{} has invalid value '{}': {}", key, raw, e))),
        _ => Ok(default),
    }
}

/// Worker count derived from available CPUs, clamped for a single-node deployment
pub fn default_worker_concurrency() -> usize {
    const MIN_WORKERS: usize = 2;
    const MAX_WORKERS: usize = 20;
    const WORKERS_PER_CPU: usize = 2;

    let cpu_count = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4);

    (cpu_count * WORKERS_PER_CPU).clamp(MIN_WORKERS, MAX_WORKERS)
}
