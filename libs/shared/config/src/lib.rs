use std::env;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub scheduling: SchedulingConfig,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let config = Self {
            supabase_url: env::var("SUPABASE_URL")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_URL not set, using empty value");
                    String::new()
                }),
            supabase_anon_key: env::var("SUPABASE_ANON_PUBLIC_KEY")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_ANON_PUBLIC_KEY not set, using empty value");
                    String::new()
                }),
            scheduling: SchedulingConfig::from_env(),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.supabase_url.is_empty() && !self.supabase_anon_key.is_empty()
    }
}

/// Business constants and timings for slot computation and availability fetching.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulingConfig {
    /// First hour (inclusive) of the peak window.
    pub peak_start_hour: u32,
    /// Hour (exclusive) at which the peak window ends.
    pub peak_end_hour: u32,
    /// Gaps between same-day work periods shorter than this are flagged.
    pub min_break_minutes: i64,
    pub debounce: Duration,
    pub failure_threshold: u32,
    pub cooldown: Duration,
    pub request_timeout: Duration,
}

impl Default for SchedulingConfig {
    fn default() -> Self {
        Self {
            peak_start_hour: 17,
            peak_end_hour: 21,
            min_break_minutes: 30,
            debounce: Duration::from_millis(500),
            failure_threshold: 3,
            cooldown: Duration::from_secs(30),
            request_timeout: Duration::from_secs(10),
        }
    }
}

impl SchedulingConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            peak_start_hour: env_or("SCHEDULING_PEAK_START_HOUR", defaults.peak_start_hour),
            peak_end_hour: env_or("SCHEDULING_PEAK_END_HOUR", defaults.peak_end_hour),
            min_break_minutes: env_or("SCHEDULING_MIN_BREAK_MINUTES", defaults.min_break_minutes),
            debounce: Duration::from_millis(env_or(
                "AVAILABILITY_DEBOUNCE_MS",
                defaults.debounce.as_millis() as u64,
            )),
            failure_threshold: env_or("AVAILABILITY_FAILURE_THRESHOLD", defaults.failure_threshold),
            cooldown: Duration::from_secs(env_or(
                "AVAILABILITY_COOLDOWN_SECS",
                defaults.cooldown.as_secs(),
            )),
            request_timeout: Duration::from_secs(env_or(
                "AVAILABILITY_REQUEST_TIMEOUT_SECS",
                defaults.request_timeout.as_secs(),
            )),
        }
    }

    pub fn is_peak_hour(&self, hour: u32) -> bool {
        hour >= self.peak_start_hour && hour < self.peak_end_hour
    }
}

fn env_or<T>(key: &str, default: T) -> T
where
    T: FromStr + std::fmt::Display + Copy,
{
    match env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("{} has invalid value {:?}, using default {}", key, raw, default);
            default
        }),
        Err(_) => default,
    }
}
