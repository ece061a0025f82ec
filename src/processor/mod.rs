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

//! Batch Rollover Processor
//!
//! Consumes batch work items from the queue and performs the actual task
//! mutation: for each user in the batch, move every incomplete task dated
//! `rollover_date` to `target_date` in one atomic statement.
//!
//! Failure handling is two-tier. A failure for one user is logged and
//! counted but never blocks the rest of the batch; the batch still
//! completes. Only when *every* user in a batch fails is the batch itself
//! considered failed, which sends it back to the queue for redelivery with
//! backoff. Redelivery is safe because the per-user mutation's WHERE clause
//! makes it idempotent.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::{broadcast, Semaphore};
use tokio::task::JoinSet;
use tokio::time;
use tracing::{debug, error, info, warn};

use crate::config::RolloverConfig;
use crate::dal::DAL;
use crate::error::{PortError, ProcessorError};
use crate::models::UserBatchRollover;
use crate::ports::TaskStore;

/// Period of the worker's sweep for batches stranded in Running.
const RECOVERY_SWEEP_INTERVAL: std::time::Duration = std::time::Duration::from_secs(60);

/// Per-batch processing tally.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BatchOutcome {
    /// Task rows moved across all users in the batch.
    pub moved_tasks: usize,
    /// Users whose rollover mutation succeeded (possibly moving 0 tasks).
    pub processed_users: usize,
    /// Users whose rollover mutation failed and were skipped.
    pub failed_users: usize,
}

/// Executes the rollover mutation for one batch of users.
pub struct BatchRolloverProcessor {
    task_store: Arc<dyn TaskStore>,
    max_concurrent_users: usize,
}

impl BatchRolloverProcessor {
    pub fn new(task_store: Arc<dyn TaskStore>, max_concurrent_users: usize) -> Self {
        Self {
            task_store,
            max_concurrent_users: max_concurrent_users.max(1),
        }
    }

    /// Rolls over every user in the batch, bounding in-flight mutations
    /// with a semaphore.
    ///
    /// Returns `Err` only when every user in a non-empty batch failed; the
    /// caller treats that as a whole-batch failure and requeues it.
    pub async fn process(&self, batch: &UserBatchRollover) -> Result<BatchOutcome, ProcessorError> {
        let semaphore = Arc::new(Semaphore::new(self.max_concurrent_users));
        let mut join_set = JoinSet::new();

        for user_id in batch.user_ids.clone() {
            let permit = semaphore.clone().acquire_owned().await?;
            let task_store = Arc::clone(&self.task_store);
            let from_date = batch.rollover_date;
            let to_date = batch.target_date;
            join_set.spawn(async move {
                let _permit = permit;
                let result = task_store
                    .bulk_move_incomplete_tasks(user_id, from_date, to_date)
                    .await;
                (user_id, result)
            });
        }

        let mut outcome = BatchOutcome::default();
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((_, Ok(moved))) => {
                    outcome.moved_tasks += moved;
                    outcome.processed_users += 1;
                }
                Ok((user_id, Err(e))) => {
                    warn!(
                        "Rollover failed for user {} in batch {}/{} ({}): {}",
                        user_id, batch.batch_number, batch.total_batches, batch.timezone, e
                    );
                    outcome.failed_users += 1;
                }
                Err(e) => {
                    warn!("Rollover worker task aborted: {}", e);
                    outcome.failed_users += 1;
                }
            }
        }

        if outcome.processed_users == 0 && outcome.failed_users > 0 {
            return Err(ProcessorError::Port(PortError::Collaborator(format!(
                "all {} users in batch failed",
                outcome.failed_users
            ))));
        }
        Ok(outcome)
    }
}

/// Background worker that polls the batch queue and settles each claimed
/// batch: Completed on success, requeued with backoff on whole-batch
/// failure, parked as Failed once attempts are exhausted.
#[derive(Clone)]
pub struct ProcessorWorker {
    dal: DAL,
    processor: Arc<BatchRolloverProcessor>,
    config: RolloverConfig,
}

impl ProcessorWorker {
    pub fn new(dal: DAL, processor: Arc<BatchRolloverProcessor>, config: RolloverConfig) -> Self {
        Self {
            dal,
            processor,
            config,
        }
    }

    /// Polls the queue until a shutdown signal arrives. In-flight batches
    /// are bounded by `max_concurrent_batches`; a batch still running at
    /// shutdown is recovered by `requeue_stuck_running` on next startup,
    /// and one stranded mid-process (a settle transition that never landed)
    /// is caught by the periodic stale-Running sweep.
    pub async fn run_with_shutdown(&self, mut shutdown: broadcast::Receiver<()>) {
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_batches));
        let mut interval = time::interval(self.config.processor_poll_interval);
        let mut recovery = time::interval(RECOVERY_SWEEP_INTERVAL);
        info!(
            "Starting batch rollover processor (poll: {:?}, max in-flight: {})",
            self.config.processor_poll_interval, self.config.max_concurrent_batches
        );

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    // Back off claiming while saturated; claimed rows sit in
                    // Running and would block redelivery elsewhere.
                    if semaphore.available_permits() == 0 {
                        debug!("All batch slots busy, skipping poll");
                        continue;
                    }

                    match self.dal.rollover_batch().claim_ready(Utc::now()).await {
                        Ok(Some(batch)) => {
                            let permit = match semaphore.clone().acquire_owned().await {
                                Ok(permit) => permit,
                                Err(_) => break,
                            };
                            let worker = self.clone();
                            tokio::spawn(async move {
                                let _permit = permit;
                                if let Err(e) = worker.settle(batch).await {
                                    error!("Failed to settle batch: {}", e);
                                }
                            });
                        }
                        Ok(None) => {}
                        Err(e) => {
                            error!("Failed to claim batch from queue: {}", e);
                        }
                    }
                }
                _ = recovery.tick() => {
                    let cutoff = Utc::now() - self.config.stuck_batch_timeout;
                    match self.dal.rollover_batch().requeue_stale_running(cutoff).await {
                        Ok(0) => {}
                        Ok(requeued) => {
                            warn!("Requeued {} batches stuck in Running", requeued);
                        }
                        Err(e) => {
                            error!("Stale batch sweep failed: {}", e);
                        }
                    }
                }
                _ = shutdown.recv() => {
                    info!("Batch rollover processor shutdown requested");
                    break;
                }
            }
        }
    }

    /// Claims one ready batch and settles it. Returns `Ok(None)` when the
    /// queue has nothing ready at `now`.
    pub async fn claim_and_execute(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Option<BatchOutcome>, ProcessorError> {
        let Some(batch) = self.dal.rollover_batch().claim_ready(now).await? else {
            return Ok(None);
        };
        Ok(Some(self.settle(batch).await?))
    }

    /// Runs a claimed batch and records its terminal queue transition.
    async fn settle(&self, batch: UserBatchRollover) -> Result<BatchOutcome, ProcessorError> {
        match self.processor.process(&batch).await {
            Ok(outcome) => {
                self.dal.rollover_batch().mark_completed(batch.id).await?;
                if outcome.failed_users > 0 {
                    warn!(
                        "Batch {}/{} for {} {} completed with {} failed users ({} ok, {} tasks moved)",
                        batch.batch_number,
                        batch.total_batches,
                        batch.timezone,
                        batch.rollover_date,
                        outcome.failed_users,
                        outcome.processed_users,
                        outcome.moved_tasks
                    );
                } else {
                    info!(
                        "Batch {}/{} for {} {} completed: {} users, {} tasks moved",
                        batch.batch_number,
                        batch.total_batches,
                        batch.timezone,
                        batch.rollover_date,
                        outcome.processed_users,
                        outcome.moved_tasks
                    );
                }
                Ok(outcome)
            }
            Err(e) => {
                let failed_users = batch.user_ids.len();
                if batch.attempt >= batch.max_attempts {
                    error!(
                        "Batch {}/{} for {} {} failed permanently after {} attempts: {}",
                        batch.batch_number,
                        batch.total_batches,
                        batch.timezone,
                        batch.rollover_date,
                        batch.attempt,
                        e
                    );
                    self.dal
                        .rollover_batch()
                        .mark_failed(batch.id, &e.to_string())
                        .await?;
                } else {
                    let delay = self.config.retry_policy.calculate_delay(batch.attempt);
                    warn!(
                        "Batch {}/{} for {} {} failed on attempt {} of {}, retrying in {:?}: {}",
                        batch.batch_number,
                        batch.total_batches,
                        batch.timezone,
                        batch.rollover_date,
                        batch.attempt,
                        batch.max_attempts,
                        delay,
                        e
                    );
                    self.dal
                        .rollover_batch()
                        .schedule_retry(batch.id, Utc::now() + delay, batch.attempt + 1, &e.to_string())
                        .await?;
                }
                Ok(BatchOutcome {
                    failed_users,
                    ..BatchOutcome::default()
                })
            }
        }
    }
}
