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

//! Rollover Ledger Data Access Layer
//!
//! The ledger is the engine's single synchronization primitive. A claim is
//! one INSERT against a unique (timezone, rollover_date) index: exactly one
//! of any number of racing scheduler instances wins the insert, and every
//! loser observes the unique-constraint conflict as a normal "already
//! handled" signal. The conflict is therefore mapped to `Ok(false)`, never
//! to an error. Any other storage failure propagates so the caller does not
//! enqueue batches for an unconfirmed claim.

use chrono::NaiveDate;
use diesel::prelude::*;
use diesel::result::DatabaseErrorKind;

use super::DAL;
use crate::database::schema::rollover_ledger;
use crate::error::StorageError;
use crate::models::rollover_ledger::{NewSqliteLedgerRow, SqliteLedgerRow};
use crate::models::{date_to_string, RolloverLedgerEntry};

/// Data Access Layer for rollover ledger operations.
pub struct RolloverLedgerDAL<'a> {
    dal: &'a DAL,
}

impl<'a> RolloverLedgerDAL<'a> {
    /// Creates a new RolloverLedgerDAL instance.
    pub fn new(dal: &'a DAL) -> Self {
        Self { dal }
    }

    /// Attempts to claim the (timezone, rollover_date) slot.
    ///
    /// Returns `Ok(true)` if this caller inserted the entry, `Ok(false)` if
    /// an entry already existed (another instance won the race, or an
    /// earlier tick already handled the transition).
    pub async fn try_claim(
        &self,
        timezone: &str,
        rollover_date: NaiveDate,
    ) -> Result<bool, StorageError> {
        let conn = self
            .dal
            .database
            .pool()
            .get()
            .await
            .map_err(|e| StorageError::ConnectionPool(e.to_string()))?;

        let row = NewSqliteLedgerRow::claim(timezone, rollover_date);
        let result = conn
            .interact(move |conn| {
                diesel::insert_into(rollover_ledger::table)
                    .values(&row)
                    .execute(conn)
            })
            .await
            .map_err(|e| StorageError::ConnectionPool(e.to_string()))?;

        match result {
            Ok(_) => Ok(true),
            Err(diesel::result::Error::DatabaseError(DatabaseErrorKind::UniqueViolation, _)) => {
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Looks up the ledger entry for a (timezone, rollover_date) pair.
    pub async fn get(
        &self,
        timezone: &str,
        rollover_date: NaiveDate,
    ) -> Result<Option<RolloverLedgerEntry>, StorageError> {
        let conn = self
            .dal
            .database
            .pool()
            .get()
            .await
            .map_err(|e| StorageError::ConnectionPool(e.to_string()))?;

        let timezone = timezone.to_string();
        let date_str = date_to_string(&rollover_date);
        let row: Option<SqliteLedgerRow> = conn
            .interact(move |conn| {
                rollover_ledger::table
                    .filter(rollover_ledger::timezone.eq(timezone))
                    .filter(rollover_ledger::rollover_date.eq(date_str))
                    .first(conn)
                    .optional()
            })
            .await
            .map_err(|e| StorageError::ConnectionPool(e.to_string()))??;

        row.map(RolloverLedgerEntry::try_from).transpose()
    }

    /// Counts all ledger entries.
    pub async fn count(&self) -> Result<i64, StorageError> {
        let conn = self
            .dal
            .database
            .pool()
            .get()
            .await
            .map_err(|e| StorageError::ConnectionPool(e.to_string()))?;

        let count = conn
            .interact(|conn| rollover_ledger::table.count().first(conn))
            .await
            .map_err(|e| StorageError::ConnectionPool(e.to_string()))??;
        Ok(count)
    }

    /// Deletes ledger entries whose rollover date is strictly before the
    /// cutoff. Storage hygiene only; never required for correctness.
    pub async fn prune_older_than(&self, cutoff: NaiveDate) -> Result<usize, StorageError> {
        let conn = self
            .dal
            .database
            .pool()
            .get()
            .await
            .map_err(|e| StorageError::ConnectionPool(e.to_string()))?;

        let cutoff_str = date_to_string(&cutoff);
        let deleted = conn
            .interact(move |conn| {
                diesel::delete(
                    rollover_ledger::table.filter(rollover_ledger::rollover_date.lt(cutoff_str)),
                )
                .execute(conn)
            })
            .await
            .map_err(|e| StorageError::ConnectionPool(e.to_string()))??;
        Ok(deleted)
    }
}
