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

//! Midnight Detector / Scheduler
//!
//! A recurring step (1-minute period) that decides, per known timezone,
//! whether "today has just started" there, and if so, whether rollover has
//! already run for that transition.
//!
//! Each tick is internally idempotent: the only gate between detection and
//! dispatch is the ledger claim, and the unique (timezone, rollover_date)
//! constraint lets exactly one of any number of racing ticks (or scheduler
//! replicas) win. There is no leader election and no lock held across a
//! tick.
//!
//! Per-zone state machine: a (timezone, date) pair is **pending** while no
//! ledger row exists and **done** once one does. There is no done -> pending
//! transition; a missed window stays missed until the next calendar day, a
//! deliberate choice favoring safety over completeness.

use chrono::{DateTime, Days, Utc};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::time;
use tracing::{debug, error, info, warn};

use crate::clock;
use crate::config::RolloverConfig;
use crate::error::SchedulerError;
use crate::models::NewUserBatch;
use crate::ports::{BatchDispatcher, LedgerStore, UserDirectory};

/// What one scheduler tick did, for logging and tests.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TickOutcome {
    /// Timezones examined this tick.
    pub zones_checked: usize,
    /// Timezones that were inside their midnight window and won the
    /// ledger claim.
    pub zones_claimed: usize,
    /// Batches handed to the dispatcher.
    pub batches_dispatched: usize,
}

/// The midnight detector.
///
/// Collaborators are injected at construction; the scheduler holds no state
/// of its own beyond configuration.
pub struct MidnightScheduler {
    user_directory: Arc<dyn UserDirectory>,
    ledger: Arc<dyn LedgerStore>,
    dispatcher: Arc<dyn BatchDispatcher>,
    config: RolloverConfig,
}

impl MidnightScheduler {
    pub fn new(
        user_directory: Arc<dyn UserDirectory>,
        ledger: Arc<dyn LedgerStore>,
        dispatcher: Arc<dyn BatchDispatcher>,
        config: RolloverConfig,
    ) -> Self {
        Self {
            user_directory,
            ledger,
            dispatcher,
            config,
        }
    }

    /// Runs the tick loop until a shutdown signal arrives.
    pub async fn run_with_shutdown(&self, mut shutdown: broadcast::Receiver<()>) {
        let mut interval = time::interval(self.config.tick_interval);
        info!(
            "Starting midnight scheduler (period: {:?})",
            self.config.tick_interval
        );

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    match self.tick(Utc::now()).await {
                        Ok(outcome) if outcome.zones_claimed > 0 => {
                            info!(
                                "Scheduler tick: {} zones checked, {} claimed, {} batches dispatched",
                                outcome.zones_checked, outcome.zones_claimed, outcome.batches_dispatched
                            );
                        }
                        Ok(outcome) => {
                            debug!("Scheduler tick: {} zones checked, none due", outcome.zones_checked);
                        }
                        Err(e) => {
                            // Tick-level failure (e.g. timezone list unavailable);
                            // the next tick retries from scratch.
                            error!("Scheduler tick failed: {}", e);
                        }
                    }
                }
                _ = shutdown.recv() => {
                    info!("Midnight scheduler shutdown requested");
                    break;
                }
            }
        }
    }

    /// Executes one scheduling step at the given reference instant.
    ///
    /// Failures processing one timezone never abort the others; they are
    /// logged and the loop continues.
    pub async fn tick(&self, now: DateTime<Utc>) -> Result<TickOutcome, SchedulerError> {
        let timezones = self.user_directory.list_distinct_timezones().await?;

        let mut outcome = TickOutcome {
            zones_checked: timezones.len(),
            ..TickOutcome::default()
        };

        for timezone in &timezones {
            match self.process_zone(timezone, now).await {
                Ok(0) => {}
                Ok(batches) => {
                    outcome.zones_claimed += 1;
                    outcome.batches_dispatched += batches;
                }
                Err(SchedulerError::Clock(e)) => {
                    warn!("Skipping timezone {}: {}", timezone, e);
                }
                Err(e) => {
                    error!("Rollover check failed for timezone {}: {}", timezone, e);
                }
            }
        }

        Ok(outcome)
    }

    /// Checks one timezone and, if it is due and unclaimed, dispatches its
    /// batches. Returns the number of batches dispatched (0 = not due,
    /// already claimed, or no users).
    ///
    /// The user count is checked *before* the ledger claim: an empty
    /// timezone never burns its (timezone, date) slot, so a zone that
    /// gains its first users mid-window is still claimed by a later tick
    /// inside the same window.
    async fn process_zone(
        &self,
        timezone: &str,
        now: DateTime<Utc>,
    ) -> Result<usize, SchedulerError> {
        let local = clock::local_clock(now, timezone)?;
        let dst_transition = clock::is_dst_transition_day(now, timezone);

        if !self.config.window.contains(&local, dst_transition) {
            return Ok(0);
        }

        let target_date = clock::local_date(now, timezone)?;
        let Some(rollover_date) = target_date.checked_sub_days(Days::new(1)) else {
            return Ok(0);
        };

        let user_ids = self
            .user_directory
            .list_user_ids_for_timezone(timezone)
            .await?;
        if user_ids.is_empty() {
            debug!(
                "No users assigned to timezone {}, skipping ledger claim",
                timezone
            );
            return Ok(0);
        }

        if !self.ledger.try_claim(timezone, rollover_date).await? {
            debug!(
                "Rollover already claimed for {} on {}",
                timezone, rollover_date
            );
            return Ok(0);
        }

        let user_count = user_ids.len();
        let batches = partition_batches(
            timezone,
            rollover_date,
            target_date,
            user_ids,
            self.config.batch_size,
        );
        let batch_count = batches.len();
        self.dispatcher.dispatch(&batches).await?;

        info!(
            "Rollover claimed: {} {} -> {} ({} users in {} batches{})",
            timezone,
            rollover_date,
            target_date,
            user_count,
            batch_count,
            if dst_transition {
                ", DST-transition day"
            } else {
                ""
            }
        );

        Ok(batch_count)
    }
}

/// Partitions a rollover event's users into fixed-size batches, the last
/// one possibly smaller. Batch numbers are 1-based.
pub fn partition_batches(
    timezone: &str,
    rollover_date: chrono::NaiveDate,
    target_date: chrono::NaiveDate,
    user_ids: Vec<crate::database::UniversalUuid>,
    batch_size: usize,
) -> Vec<NewUserBatch> {
    let batch_size = batch_size.max(1);
    let total_batches = user_ids.len().div_ceil(batch_size) as i32;

    user_ids
        .chunks(batch_size)
        .enumerate()
        .map(|(index, chunk)| NewUserBatch {
            timezone: timezone.to_string(),
            rollover_date,
            target_date,
            user_ids: chunk.to_vec(),
            batch_number: index as i32 + 1,
            total_batches,
        })
        .collect()
}
