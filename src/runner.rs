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

//! Rollover engine runner.
//!
//! Wires the database, DAL, scheduler, and processor together and manages
//! their lifecycle: migrations and queue recovery at startup, background
//! service spawn, broadcast-channel shutdown.
//!
//! Losing the scheduler for a while is safe (the next tick inside a window
//! still claims), so the runner performs no handoff on shutdown beyond
//! signalling the loops; Running batches abandoned mid-flight are requeued
//! by the next startup.

use chrono::{Days, Utc};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time;
use tracing::{error, info, warn};

use crate::config::RolloverConfig;
use crate::dal::DAL;
use crate::database::Database;
use crate::error::RunnerError;
use crate::ports::QueueBatchDispatcher;
use crate::processor::{BatchRolloverProcessor, ProcessorWorker};
use crate::scheduler::MidnightScheduler;

/// Owns the background services of the rollover engine.
pub struct RolloverRunner {
    dal: DAL,
    config: RolloverConfig,
    shutdown: broadcast::Sender<()>,
    handles: Vec<JoinHandle<()>>,
}

impl RolloverRunner {
    /// Connects to the database, runs migrations, and prepares the engine.
    /// No background work starts until [`start`](Self::start).
    pub async fn new(database_url: &str, config: RolloverConfig) -> Result<Self, RunnerError> {
        let database = Database::new(database_url);
        database
            .run_migrations()
            .await
            .map_err(RunnerError::Migration)?;

        let (shutdown, _) = broadcast::channel(1);
        Ok(Self {
            dal: DAL::new(database),
            config,
            shutdown,
            handles: Vec::new(),
        })
    }

    /// Shared access to the data layer, for embedding applications.
    pub fn dal(&self) -> &DAL {
        &self.dal
    }

    /// Spawns the scheduler, processor, and ledger pruning services.
    ///
    /// Honors the `enabled` kill switch: when false nothing is spawned and
    /// the call is a no-op. Batches left Running by a previous process are
    /// requeued first, before any worker can claim.
    pub async fn start(&mut self) -> Result<(), RunnerError> {
        if !self.config.enabled {
            warn!("Rollover engine disabled by configuration, not starting services");
            return Ok(());
        }

        let requeued = self.dal.rollover_batch().requeue_stuck_running().await?;
        if requeued > 0 {
            info!("Requeued {} batches left Running by a previous run", requeued);
        }

        let dal = self.dal.clone();
        let dispatcher = QueueBatchDispatcher::new(
            dal.clone(),
            self.config.retry_policy.max_attempts,
        );
        let scheduler = MidnightScheduler::new(
            Arc::new(dal.clone()),
            Arc::new(dal.clone()),
            Arc::new(dispatcher),
            self.config.clone(),
        );
        let scheduler_shutdown = self.shutdown.subscribe();
        self.handles.push(tokio::spawn(async move {
            scheduler.run_with_shutdown(scheduler_shutdown).await;
        }));

        let processor = Arc::new(BatchRolloverProcessor::new(
            Arc::new(self.dal.clone()),
            self.config.max_concurrent_users,
        ));
        let worker = ProcessorWorker::new(self.dal.clone(), processor, self.config.clone());
        let worker_shutdown = self.shutdown.subscribe();
        self.handles.push(tokio::spawn(async move {
            worker.run_with_shutdown(worker_shutdown).await;
        }));

        if let Some(retention_days) = self.config.ledger_retention_days {
            let dal = self.dal.clone();
            let prune_shutdown = self.shutdown.subscribe();
            self.handles.push(tokio::spawn(async move {
                run_ledger_pruning(dal, retention_days, prune_shutdown).await;
            }));
        }

        info!("Rollover engine started");
        Ok(())
    }

    /// Signals every background service to stop and waits for them.
    pub async fn shutdown(&mut self) {
        info!("Shutting down rollover engine");
        // Ignore send errors: no receivers means nothing was started.
        let _ = self.shutdown.send(());
        for handle in self.handles.drain(..) {
            if let Err(e) = handle.await {
                warn!("Background service ended abnormally: {}", e);
            }
        }
        info!("Rollover engine stopped");
    }
}

/// Daily pruning of ledger entries older than the retention window.
async fn run_ledger_pruning(
    dal: DAL,
    retention_days: u32,
    mut shutdown: broadcast::Receiver<()>,
) {
    let mut interval = time::interval(time::Duration::from_secs(24 * 60 * 60));
    info!(
        "Starting ledger pruning (retention: {} days)",
        retention_days
    );

    loop {
        tokio::select! {
            _ = interval.tick() => {
                let Some(cutoff) = Utc::now()
                    .date_naive()
                    .checked_sub_days(Days::new(retention_days as u64))
                else {
                    continue;
                };
                match dal.rollover_ledger().prune_older_than(cutoff).await {
                    Ok(0) => {}
                    Ok(deleted) => {
                        info!("Pruned {} ledger entries older than {}", deleted, cutoff);
                    }
                    Err(e) => {
                        error!("Ledger pruning failed: {}", e);
                    }
                }
            }
            _ = shutdown.recv() => {
                info!("Ledger pruning shutdown requested");
                break;
            }
        }
    }
}
