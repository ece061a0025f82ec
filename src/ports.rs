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

//! Collaborator contracts.
//!
//! The scheduler and processor consume the rest of the system only through
//! these four narrow ports, injected at construction. The diesel DAL
//! provides the production implementations; tests substitute doubles. The
//! unique ledger constraint behind [`LedgerStore`] is the only shared state
//! the engine relies on.

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::dal::DAL;
use crate::database::universal_types::UniversalUuid;
use crate::error::PortError;
use crate::models::NewUserBatch;

/// Read access to the user directory.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Distinct timezones currently assigned to any user.
    async fn list_distinct_timezones(&self) -> Result<Vec<String>, PortError>;

    /// All user IDs assigned to a timezone.
    async fn list_user_ids_for_timezone(
        &self,
        timezone: &str,
    ) -> Result<Vec<UniversalUuid>, PortError>;
}

/// The rollover mutation against the task store.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Moves every incomplete task the user has on `from_date` to
    /// `to_date`; returns the affected row count. Must be a single atomic
    /// statement-equivalent.
    async fn bulk_move_incomplete_tasks(
        &self,
        user_id: UniversalUuid,
        from_date: NaiveDate,
        to_date: NaiveDate,
    ) -> Result<usize, PortError>;
}

/// The idempotency ledger.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Attempts to claim the (timezone, rollover_date) slot. `true` means
    /// this caller now owns the rollover; `false` means it was already
    /// claimed. Must be atomic with respect to concurrent callers.
    async fn try_claim(&self, timezone: &str, rollover_date: NaiveDate)
        -> Result<bool, PortError>;
}

/// Durable at-least-once dispatch of batch work items.
#[async_trait]
pub trait BatchDispatcher: Send + Sync {
    /// Enqueues every batch of one rollover event.
    async fn dispatch(&self, batches: &[NewUserBatch]) -> Result<(), PortError>;
}

#[async_trait]
impl UserDirectory for DAL {
    async fn list_distinct_timezones(&self) -> Result<Vec<String>, PortError> {
        Ok(self.user_directory().list_distinct_timezones().await?)
    }

    async fn list_user_ids_for_timezone(
        &self,
        timezone: &str,
    ) -> Result<Vec<UniversalUuid>, PortError> {
        Ok(self
            .user_directory()
            .list_user_ids_for_timezone(timezone)
            .await?)
    }
}

#[async_trait]
impl TaskStore for DAL {
    async fn bulk_move_incomplete_tasks(
        &self,
        user_id: UniversalUuid,
        from_date: NaiveDate,
        to_date: NaiveDate,
    ) -> Result<usize, PortError> {
        Ok(self
            .task_store()
            .bulk_move_incomplete_tasks(user_id, from_date, to_date)
            .await?)
    }
}

#[async_trait]
impl LedgerStore for DAL {
    async fn try_claim(
        &self,
        timezone: &str,
        rollover_date: NaiveDate,
    ) -> Result<bool, PortError> {
        Ok(self
            .rollover_ledger()
            .try_claim(timezone, rollover_date)
            .await?)
    }
}

/// [`BatchDispatcher`] backed by the `rollover_batches` queue table.
#[derive(Clone, Debug)]
pub struct QueueBatchDispatcher {
    dal: DAL,
    max_attempts: i32,
}

impl QueueBatchDispatcher {
    pub fn new(dal: DAL, max_attempts: i32) -> Self {
        Self { dal, max_attempts }
    }
}

#[async_trait]
impl BatchDispatcher for QueueBatchDispatcher {
    async fn dispatch(&self, batches: &[NewUserBatch]) -> Result<(), PortError> {
        self.dal
            .rollover_batch()
            .enqueue_all(batches, self.max_attempts)
            .await?;
        Ok(())
    }
}
