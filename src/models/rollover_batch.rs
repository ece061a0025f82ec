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

//! User Batch Rollover Model
//!
//! A batch is a bounded-size group of user IDs processed together as one
//! unit of dispatch: "roll over this sub-list of users for this
//! timezone/date". Many batches map to one (timezone, target_date) rollover
//! event; batches are independent units of execution with no ordering
//! guarantee between them. `batch_number`/`total_batches` exist for
//! observability, not correctness.
//!
//! Batches live in the `rollover_batches` table, which doubles as the
//! durable at-least-once work queue: rows move Queued -> Running ->
//! Completed, or back to Queued with a `retry_at` on failure.

use chrono::NaiveDate;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use super::{date_to_string, string_to_date};
use crate::database::universal_types::{UniversalTimestamp, UniversalUuid};
use crate::error::StorageError;

/// Queue state of a batch row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchStatus {
    Queued,
    Running,
    Completed,
    Failed,
}

impl BatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchStatus::Queued => "Queued",
            BatchStatus::Running => "Running",
            BatchStatus::Completed => "Completed",
            BatchStatus::Failed => "Failed",
        }
    }

    pub fn parse(s: &str) -> Result<Self, StorageError> {
        match s {
            "Queued" => Ok(BatchStatus::Queued),
            "Running" => Ok(BatchStatus::Running),
            "Completed" => Ok(BatchStatus::Completed),
            "Failed" => Ok(BatchStatus::Failed),
            other => Err(StorageError::Corrupt(format!(
                "unknown batch status: {}",
                other
            ))),
        }
    }
}

/// A batch as produced by the scheduler, before it has a queue identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewUserBatch {
    pub timezone: String,
    /// The local date being rolled from ("yesterday" in the zone)
    pub rollover_date: NaiveDate,
    /// The new local date ("today" in the zone)
    pub target_date: NaiveDate,
    /// Ordered user IDs, at most the configured batch size
    pub user_ids: Vec<UniversalUuid>,
    /// 1-based position of this batch within the rollover event
    pub batch_number: i32,
    pub total_batches: i32,
}

/// A claimed batch work item as read back from the queue.
#[derive(Debug, Clone)]
pub struct UserBatchRollover {
    pub id: UniversalUuid,
    pub timezone: String,
    pub rollover_date: NaiveDate,
    pub target_date: NaiveDate,
    pub user_ids: Vec<UniversalUuid>,
    pub batch_number: i32,
    pub total_batches: i32,
    pub status: BatchStatus,
    pub attempt: i32,
    pub max_attempts: i32,
    pub created_at: UniversalTimestamp,
}

#[derive(Debug, Queryable, Selectable)]
#[diesel(table_name = crate::database::schema::rollover_batches)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct SqliteBatchRow {
    pub id: Vec<u8>,
    pub timezone: String,
    pub rollover_date: String,
    pub target_date: String,
    pub user_ids: String,
    pub batch_number: i32,
    pub total_batches: i32,
    pub status: String,
    pub attempt: i32,
    pub max_attempts: i32,
    pub retry_at: Option<String>,
    pub last_error: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::database::schema::rollover_batches)]
pub struct NewSqliteBatchRow {
    pub id: Vec<u8>,
    pub timezone: String,
    pub rollover_date: String,
    pub target_date: String,
    pub user_ids: String,
    pub batch_number: i32,
    pub total_batches: i32,
    pub status: String,
    pub attempt: i32,
    pub max_attempts: i32,
    pub created_at: String,
    pub updated_at: String,
}

impl TryFrom<SqliteBatchRow> for UserBatchRollover {
    type Error = StorageError;

    fn try_from(row: SqliteBatchRow) -> Result<Self, Self::Error> {
        let user_blobs: Vec<String> = serde_json::from_str(&row.user_ids)?;
        let user_ids = user_blobs
            .iter()
            .map(|s| {
                s.parse::<uuid::Uuid>()
                    .map(UniversalUuid)
                    .map_err(|e| StorageError::Corrupt(format!("batch user id: {}", e)))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(UserBatchRollover {
            id: UniversalUuid::from_blob(&row.id)
                .map_err(|e| StorageError::Corrupt(format!("batch id: {}", e)))?,
            timezone: row.timezone,
            rollover_date: string_to_date(&row.rollover_date)
                .map_err(|e| StorageError::Corrupt(format!("batch rollover_date: {}", e)))?,
            target_date: string_to_date(&row.target_date)
                .map_err(|e| StorageError::Corrupt(format!("batch target_date: {}", e)))?,
            user_ids,
            batch_number: row.batch_number,
            total_batches: row.total_batches,
            status: BatchStatus::parse(&row.status)?,
            attempt: row.attempt,
            max_attempts: row.max_attempts,
            created_at: UniversalTimestamp::from_rfc3339(&row.created_at)
                .map_err(|e| StorageError::Corrupt(format!("batch created_at: {}", e)))?,
        })
    }
}

impl NewSqliteBatchRow {
    /// Builds an insertable queue row from a scheduler-produced batch.
    pub fn from_new_batch(batch: &NewUserBatch, max_attempts: i32) -> Result<Self, StorageError> {
        let user_strings: Vec<String> = batch.user_ids.iter().map(|u| u.to_string()).collect();
        let now = super::current_timestamp_string();

        Ok(Self {
            id: UniversalUuid::new_v4().to_blob(),
            timezone: batch.timezone.clone(),
            rollover_date: date_to_string(&batch.rollover_date),
            target_date: date_to_string(&batch.target_date),
            user_ids: serde_json::to_string(&user_strings)?,
            batch_number: batch.batch_number,
            total_batches: batch.total_batches,
            status: BatchStatus::Queued.as_str().to_string(),
            attempt: 1,
            max_attempts,
            created_at: now.clone(),
            updated_at: now,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_status_round_trip() {
        for status in [
            BatchStatus::Queued,
            BatchStatus::Running,
            BatchStatus::Completed,
            BatchStatus::Failed,
        ] {
            assert_eq!(BatchStatus::parse(status.as_str()).unwrap(), status);
        }
        assert!(BatchStatus::parse("Paused").is_err());
    }
}
