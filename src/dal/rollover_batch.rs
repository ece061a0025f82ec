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

//! Rollover Batch Queue Data Access Layer
//!
//! The `rollover_batches` table is the durable at-least-once work queue
//! between the scheduler and the processor. Rows are claimed with an atomic
//! status flip (Queued -> Running) that double-checks the status inside the
//! UPDATE, so multiple processor instances can poll the same table without
//! duplicating work. A batch that fails outright goes back to Queued with a
//! `retry_at` in the future; one that exhausts its attempts is parked as
//! Failed. A batch abandoned mid-flight on process shutdown stays Running
//! until requeued by recovery.

use chrono::{DateTime, Utc};
use diesel::prelude::*;

use super::DAL;
use crate::database::schema::rollover_batches;
use crate::database::universal_types::UniversalUuid;
use crate::error::StorageError;
use crate::models::rollover_batch::{BatchStatus, NewSqliteBatchRow, SqliteBatchRow};
use crate::models::{current_timestamp_string, datetime_to_string, NewUserBatch, UserBatchRollover};

/// Data Access Layer for the rollover batch queue.
pub struct RolloverBatchDAL<'a> {
    dal: &'a DAL,
}

impl<'a> RolloverBatchDAL<'a> {
    /// Creates a new RolloverBatchDAL instance.
    pub fn new(dal: &'a DAL) -> Self {
        Self { dal }
    }

    /// Enqueues every batch of a rollover event in one statement.
    pub async fn enqueue_all(
        &self,
        batches: &[NewUserBatch],
        max_attempts: i32,
    ) -> Result<usize, StorageError> {
        let rows = batches
            .iter()
            .map(|b| NewSqliteBatchRow::from_new_batch(b, max_attempts))
            .collect::<Result<Vec<_>, _>>()?;

        let conn = self
            .dal
            .database
            .pool()
            .get()
            .await
            .map_err(|e| StorageError::ConnectionPool(e.to_string()))?;

        let inserted = conn
            .interact(move |conn| {
                diesel::insert_into(rollover_batches::table)
                    .values(&rows)
                    .execute(conn)
            })
            .await
            .map_err(|e| StorageError::ConnectionPool(e.to_string()))??;
        Ok(inserted)
    }

    /// Atomically claims one ready batch, flipping it Queued -> Running.
    ///
    /// A batch is ready when its status is Queued and its `retry_at` is
    /// either unset or in the past. The UPDATE re-checks the status so two
    /// pollers racing on the same row cannot both claim it.
    pub async fn claim_ready(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Option<UserBatchRollover>, StorageError> {
        let conn = self
            .dal
            .database
            .pool()
            .get()
            .await
            .map_err(|e| StorageError::ConnectionPool(e.to_string()))?;

        let now_str = datetime_to_string(&now);
        let claimed: Option<SqliteBatchRow> = conn
            .interact(move |conn| -> Result<Option<SqliteBatchRow>, diesel::result::Error> {
                let candidate: Option<SqliteBatchRow> = rollover_batches::table
                    .filter(rollover_batches::status.eq(BatchStatus::Queued.as_str()))
                    .filter(
                        rollover_batches::retry_at
                            .is_null()
                            .or(rollover_batches::retry_at.le(now_str.clone())),
                    )
                    .order(rollover_batches::created_at.asc())
                    .first(conn)
                    .optional()?;

                let Some(row) = candidate else {
                    return Ok(None);
                };

                let updated = diesel::update(
                    rollover_batches::table
                        .filter(rollover_batches::id.eq(&row.id))
                        .filter(rollover_batches::status.eq(BatchStatus::Queued.as_str())),
                )
                .set((
                    rollover_batches::status.eq(BatchStatus::Running.as_str()),
                    rollover_batches::updated_at.eq(current_timestamp_string()),
                ))
                .execute(conn)?;

                if updated == 1 {
                    rollover_batches::table
                        .filter(rollover_batches::id.eq(&row.id))
                        .first(conn)
                        .optional()
                } else {
                    // Another poller flipped it first
                    Ok(None)
                }
            })
            .await
            .map_err(|e| StorageError::ConnectionPool(e.to_string()))??;

        claimed.map(UserBatchRollover::try_from).transpose()
    }

    /// Marks a claimed batch as completed.
    pub async fn mark_completed(&self, id: UniversalUuid) -> Result<(), StorageError> {
        self.set_terminal_status(id, BatchStatus::Completed, None)
            .await
    }

    /// Marks a claimed batch as permanently failed.
    pub async fn mark_failed(&self, id: UniversalUuid, error: &str) -> Result<(), StorageError> {
        self.set_terminal_status(id, BatchStatus::Failed, Some(error.to_string()))
            .await
    }

    /// Requeues a claimed batch for a later retry attempt.
    pub async fn schedule_retry(
        &self,
        id: UniversalUuid,
        retry_at: DateTime<Utc>,
        next_attempt: i32,
        error: &str,
    ) -> Result<(), StorageError> {
        let conn = self
            .dal
            .database
            .pool()
            .get()
            .await
            .map_err(|e| StorageError::ConnectionPool(e.to_string()))?;

        let id_blob = id.to_blob();
        let retry_str = datetime_to_string(&retry_at);
        let error = error.to_string();
        conn.interact(move |conn| {
            diesel::update(rollover_batches::table.filter(rollover_batches::id.eq(id_blob)))
                .set((
                    rollover_batches::status.eq(BatchStatus::Queued.as_str()),
                    rollover_batches::retry_at.eq(Some(retry_str)),
                    rollover_batches::attempt.eq(next_attempt),
                    rollover_batches::last_error.eq(Some(error)),
                    rollover_batches::updated_at.eq(current_timestamp_string()),
                ))
                .execute(conn)
        })
        .await
        .map_err(|e| StorageError::ConnectionPool(e.to_string()))??;
        Ok(())
    }

    /// Requeues batches stuck in Running, e.g. abandoned by a crashed
    /// processor. Attempt counts are preserved; queue redelivery is safe
    /// because the per-row task mutation is idempotent.
    pub async fn requeue_stuck_running(&self) -> Result<usize, StorageError> {
        let conn = self
            .dal
            .database
            .pool()
            .get()
            .await
            .map_err(|e| StorageError::ConnectionPool(e.to_string()))?;

        let requeued = conn
            .interact(|conn| {
                diesel::update(
                    rollover_batches::table
                        .filter(rollover_batches::status.eq(BatchStatus::Running.as_str())),
                )
                .set((
                    rollover_batches::status.eq(BatchStatus::Queued.as_str()),
                    rollover_batches::updated_at.eq(current_timestamp_string()),
                ))
                .execute(conn)
            })
            .await
            .map_err(|e| StorageError::ConnectionPool(e.to_string()))??;
        Ok(requeued)
    }

    /// Requeues Running batches whose last transition is older than the
    /// cutoff. Catches rows stranded mid-flight while the process is still
    /// alive, e.g. when a settle transition itself failed; fresh Running
    /// rows belong to in-flight work and are left alone.
    pub async fn requeue_stale_running(
        &self,
        older_than: DateTime<Utc>,
    ) -> Result<usize, StorageError> {
        let conn = self
            .dal
            .database
            .pool()
            .get()
            .await
            .map_err(|e| StorageError::ConnectionPool(e.to_string()))?;

        let cutoff_str = datetime_to_string(&older_than);
        let requeued = conn
            .interact(move |conn| {
                diesel::update(
                    rollover_batches::table
                        .filter(rollover_batches::status.eq(BatchStatus::Running.as_str()))
                        .filter(rollover_batches::updated_at.lt(cutoff_str)),
                )
                .set((
                    rollover_batches::status.eq(BatchStatus::Queued.as_str()),
                    rollover_batches::updated_at.eq(current_timestamp_string()),
                ))
                .execute(conn)
            })
            .await
            .map_err(|e| StorageError::ConnectionPool(e.to_string()))??;
        Ok(requeued)
    }

    /// Lists every batch for a (timezone, rollover_date) event, ordered by
    /// batch number. Observability helper.
    pub async fn list_for_event(
        &self,
        timezone: &str,
        rollover_date: chrono::NaiveDate,
    ) -> Result<Vec<UserBatchRollover>, StorageError> {
        let conn = self
            .dal
            .database
            .pool()
            .get()
            .await
            .map_err(|e| StorageError::ConnectionPool(e.to_string()))?;

        let timezone = timezone.to_string();
        let date_str = crate::models::date_to_string(&rollover_date);
        let rows: Vec<SqliteBatchRow> = conn
            .interact(move |conn| {
                rollover_batches::table
                    .filter(rollover_batches::timezone.eq(timezone))
                    .filter(rollover_batches::rollover_date.eq(date_str))
                    .order(rollover_batches::batch_number.asc())
                    .load(conn)
            })
            .await
            .map_err(|e| StorageError::ConnectionPool(e.to_string()))??;

        rows.into_iter()
            .map(UserBatchRollover::try_from)
            .collect()
    }

    /// Counts batches currently in the given status.
    pub async fn count_with_status(&self, status: BatchStatus) -> Result<i64, StorageError> {
        let conn = self
            .dal
            .database
            .pool()
            .get()
            .await
            .map_err(|e| StorageError::ConnectionPool(e.to_string()))?;

        let count = conn
            .interact(move |conn| {
                rollover_batches::table
                    .filter(rollover_batches::status.eq(status.as_str()))
                    .count()
                    .first(conn)
            })
            .await
            .map_err(|e| StorageError::ConnectionPool(e.to_string()))??;
        Ok(count)
    }

    async fn set_terminal_status(
        &self,
        id: UniversalUuid,
        status: BatchStatus,
        error: Option<String>,
    ) -> Result<(), StorageError> {
        let conn = self
            .dal
            .database
            .pool()
            .get()
            .await
            .map_err(|e| StorageError::ConnectionPool(e.to_string()))?;

        let id_blob = id.to_blob();
        conn.interact(move |conn| {
            diesel::update(rollover_batches::table.filter(rollover_batches::id.eq(id_blob)))
                .set((
                    rollover_batches::status.eq(status.as_str()),
                    rollover_batches::last_error.eq(error),
                    rollover_batches::updated_at.eq(current_timestamp_string()),
                ))
                .execute(conn)
        })
        .await
        .map_err(|e| StorageError::ConnectionPool(e.to_string()))??;
        Ok(())
    }
}
