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

//! Retry policy for batch redelivery.
//!
//! A batch that fails outright goes back to the queue with a delay computed
//! from its attempt number: exponential backoff with a cap and optional
//! jitter. Per-user failures inside a batch are isolated and never retried
//! through this policy; only whole-batch failures are.

use rand::Rng;
use std::time::Duration;

/// Backoff policy applied between batch attempts.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Attempts before a batch is parked as Failed.
    pub max_attempts: i32,
    /// Delay before the second attempt.
    pub initial_delay: Duration,
    /// Multiplier applied per subsequent attempt.
    pub multiplier: f64,
    /// Upper bound on any single delay.
    pub max_delay: Duration,
    /// Randomize each delay by +/- 20% to avoid retry stampedes.
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_secs(30),
            multiplier: 2.0,
            max_delay: Duration::from_secs(600),
            jitter: true,
        }
    }
}

impl RetryPolicy {
    /// Delay before the attempt following `attempt` (1-based).
    pub fn calculate_delay(&self, attempt: i32) -> Duration {
        let exponent = (attempt - 1).max(0);
        let base_ms = self.initial_delay.as_millis() as f64 * self.multiplier.powi(exponent);
        let capped_ms = base_ms.min(self.max_delay.as_millis() as f64);

        let final_ms = if self.jitter {
            capped_ms * rand::thread_rng().gen_range(0.8..1.2)
        } else {
            capped_ms
        };

        Duration::from_millis(final_ms as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> RetryPolicy {
        RetryPolicy {
            jitter: false,
            ..RetryPolicy::default()
        }
    }

    #[test]
    fn test_delay_grows_exponentially() {
        let policy = policy();
        assert_eq!(policy.calculate_delay(1), Duration::from_secs(30));
        assert_eq!(policy.calculate_delay(2), Duration::from_secs(60));
        assert_eq!(policy.calculate_delay(3), Duration::from_secs(120));
    }

    #[test]
    fn test_delay_is_capped() {
        let policy = policy();
        assert_eq!(policy.calculate_delay(10), Duration::from_secs(600));
    }

    #[test]
    fn test_jitter_stays_in_band() {
        let policy = RetryPolicy::default();
        for _ in 0..100 {
            let delay = policy.calculate_delay(1);
            assert!(delay >= Duration::from_secs(24));
            assert!(delay <= Duration::from_secs(36));
        }
    }

    #[test]
    fn test_attempt_zero_is_clamped() {
        let policy = policy();
        assert_eq!(policy.calculate_delay(0), Duration::from_secs(30));
    }
}
