/*
 *  Copyright 2025 Colliery Software
 *
 *  Licensed under the Apache License, Version 2.0 (the "License");
 *  you may not use this file except in compliance with the License.
 *  You may obtain a copy of the License at
 *
 *      http://www.apache.org/licenses/LICENSE-2.0
 *
 *  Unless required by applicable law or agreed to in writing, software
 *  distributed under the License is distributed on an "AS IS" BASIS,
 *  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 *  See the License for the specific language governing permissions and
 *  limitations under the License.
 */

//! Rollover engine configuration.
//!
//! All knobs live in [`RolloverConfig`]. Defaults match the production
//! deployment; `from_env` overrides them from `NIGHTSHIFT_*` environment
//! variables (read once at startup, after loading a `.env` file if present).

use std::time::Duration;

use crate::retry::RetryPolicy;
use crate::window::MidnightWindow;

/// Configuration parameters for the rollover engine.
#[derive(Debug, Clone)]
pub struct RolloverConfig {
    /// Process-wide kill switch for the whole subsystem, read once at
    /// startup. When false the runner starts no background services.
    pub enabled: bool,

    /// Maximum users per dispatched batch; the last batch of an event may
    /// be smaller.
    pub batch_size: usize,

    /// Period of the midnight-detector tick.
    pub tick_interval: Duration,

    /// Midnight window tolerances.
    pub window: MidnightWindow,

    /// Maximum batches processed concurrently by one worker.
    pub max_concurrent_batches: usize,

    /// Maximum users mutated concurrently within one batch.
    pub max_concurrent_users: usize,

    /// How often the processor worker polls the batch queue.
    pub processor_poll_interval: Duration,

    /// Backoff policy for whole-batch redelivery.
    pub retry_policy: RetryPolicy,

    /// Age after which a Running batch is considered stranded and swept
    /// back to Queued by the worker.
    pub stuck_batch_timeout: Duration,

    /// Ledger entries older than this many days are pruned. `None`
    /// disables pruning.
    pub ledger_retention_days: Option<u32>,
}

impl Default for RolloverConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            batch_size: 100,
            tick_interval: Duration::from_secs(60),
            window: MidnightWindow::default(),
            max_concurrent_batches: 5,
            max_concurrent_users: 10,
            processor_poll_interval: Duration::from_millis(500),
            retry_policy: RetryPolicy::default(),
            stuck_batch_timeout: Duration::from_secs(600),
            ledger_retention_days: Some(90),
        }
    }
}

impl RolloverConfig {
    /// Builds a config from the environment, falling back to defaults for
    /// anything unset or unparseable.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let mut config = Self::default();
        if let Some(enabled) = env_parse::<bool>("NIGHTSHIFT_ENABLED") {
            config.enabled = enabled;
        }
        if let Some(size) = env_parse::<usize>("NIGHTSHIFT_BATCH_SIZE") {
            if size > 0 {
                config.batch_size = size;
            }
        }
        if let Some(secs) = env_parse::<u64>("NIGHTSHIFT_TICK_INTERVAL_SECS") {
            if secs > 0 {
                config.tick_interval = Duration::from_secs(secs);
            }
        }
        if let Some(n) = env_parse::<usize>("NIGHTSHIFT_MAX_CONCURRENT_BATCHES") {
            if n > 0 {
                config.max_concurrent_batches = n;
            }
        }
        if let Some(n) = env_parse::<usize>("NIGHTSHIFT_MAX_CONCURRENT_USERS") {
            if n > 0 {
                config.max_concurrent_users = n;
            }
        }
        if let Some(ms) = env_parse::<u64>("NIGHTSHIFT_PROCESSOR_POLL_INTERVAL_MS") {
            if ms > 0 {
                config.processor_poll_interval = Duration::from_millis(ms);
            }
        }
        if let Some(secs) = env_parse::<u32>("NIGHTSHIFT_NORMAL_GRACE_SECS") {
            config.window.normal_grace_secs = secs;
        }
        if let Some(secs) = env_parse::<u32>("NIGHTSHIFT_DST_GRACE_SECS") {
            config.window.dst_grace_secs = secs;
        }
        if let Some(attempts) = env_parse::<i32>("NIGHTSHIFT_RETRY_MAX_ATTEMPTS") {
            if attempts > 0 {
                config.retry_policy.max_attempts = attempts;
            }
        }
        if let Some(secs) = env_parse::<u64>("NIGHTSHIFT_RETRY_INITIAL_DELAY_SECS") {
            if secs > 0 {
                config.retry_policy.initial_delay = Duration::from_secs(secs);
            }
        }
        if let Some(secs) = env_parse::<u64>("NIGHTSHIFT_RETRY_MAX_DELAY_SECS") {
            if secs > 0 {
                config.retry_policy.max_delay = Duration::from_secs(secs);
            }
        }
        if let Some(secs) = env_parse::<u64>("NIGHTSHIFT_STUCK_BATCH_TIMEOUT_SECS") {
            if secs > 0 {
                config.stuck_batch_timeout = Duration::from_secs(secs);
            }
        }
        if let Some(days) = env_parse::<u32>("NIGHTSHIFT_LEDGER_RETENTION_DAYS") {
            config.ledger_retention_days = if days == 0 { None } else { Some(days) };
        }
        config
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_defaults_match_deployment() {
        let config = RolloverConfig::default();
        assert!(config.enabled);
        assert_eq!(config.batch_size, 100);
        assert_eq!(config.tick_interval, Duration::from_secs(60));
        assert_eq!(config.max_concurrent_batches, 5);
        assert_eq!(config.window.normal_grace_secs, 600);
        assert_eq!(config.window.dst_grace_secs, 1800);
        assert_eq!(config.stuck_batch_timeout, Duration::from_secs(600));
    }

    #[test]
    #[serial]
    fn test_env_overrides_every_knob() {
        let vars = [
            ("NIGHTSHIFT_BATCH_SIZE", "25"),
            ("NIGHTSHIFT_PROCESSOR_POLL_INTERVAL_MS", "250"),
            ("NIGHTSHIFT_NORMAL_GRACE_SECS", "120"),
            ("NIGHTSHIFT_DST_GRACE_SECS", "900"),
            ("NIGHTSHIFT_RETRY_MAX_ATTEMPTS", "2"),
            ("NIGHTSHIFT_RETRY_INITIAL_DELAY_SECS", "5"),
            ("NIGHTSHIFT_RETRY_MAX_DELAY_SECS", "60"),
            ("NIGHTSHIFT_STUCK_BATCH_TIMEOUT_SECS", "300"),
        ];
        for (key, value) in vars {
            std::env::set_var(key, value);
        }

        let config = RolloverConfig::from_env();
        for (key, _) in vars {
            std::env::remove_var(key);
        }

        assert_eq!(config.batch_size, 25);
        assert_eq!(config.processor_poll_interval, Duration::from_millis(250));
        assert_eq!(config.window.normal_grace_secs, 120);
        assert_eq!(config.window.dst_grace_secs, 900);
        assert_eq!(config.retry_policy.max_attempts, 2);
        assert_eq!(config.retry_policy.initial_delay, Duration::from_secs(5));
        assert_eq!(config.retry_policy.max_delay, Duration::from_secs(60));
        assert_eq!(config.stuck_batch_timeout, Duration::from_secs(300));
    }

    #[test]
    #[serial]
    fn test_unparseable_env_values_fall_back_to_defaults() {
        std::env::set_var("NIGHTSHIFT_BATCH_SIZE", "not-a-number");
        std::env::set_var("NIGHTSHIFT_RETRY_MAX_ATTEMPTS", "-3");
        let config = RolloverConfig::from_env();
        std::env::remove_var("NIGHTSHIFT_BATCH_SIZE");
        std::env::remove_var("NIGHTSHIFT_RETRY_MAX_ATTEMPTS");

        assert_eq!(config.batch_size, 100);
        assert_eq!(config.retry_policy.max_attempts, 5);
    }
}
