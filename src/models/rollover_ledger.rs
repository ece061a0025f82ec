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

//! Rollover Ledger Model
//!
//! A ledger entry proves a rollover already ran for a (timezone, local-date)
//! pair. Entries are created by the scheduler the first time a timezone is
//! found due on a given local date, never updated, and may be pruned after a
//! retention period for storage hygiene. The unique (timezone, rollover_date)
//! index on the table is the engine's only idempotency gate.

use chrono::NaiveDate;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use super::{date_to_string, string_to_date};
use crate::database::universal_types::{UniversalTimestamp, UniversalUuid};
use crate::error::StorageError;

/// Persisted record proving a rollover already ran for a (timezone,
/// local-date) pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RolloverLedgerEntry {
    pub id: UniversalUuid,
    /// IANA timezone identifier
    pub timezone: String,
    /// The local calendar date being rolled *from* ("yesterday")
    pub rollover_date: NaiveDate,
    pub created_at: UniversalTimestamp,
}

#[derive(Debug, Queryable, Selectable)]
#[diesel(table_name = crate::database::schema::rollover_ledger)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct SqliteLedgerRow {
    pub id: Vec<u8>,
    pub timezone: String,
    pub rollover_date: String,
    pub created_at: String,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::database::schema::rollover_ledger)]
pub struct NewSqliteLedgerRow {
    pub id: Vec<u8>,
    pub timezone: String,
    pub rollover_date: String,
    pub created_at: String,
}

impl TryFrom<SqliteLedgerRow> for RolloverLedgerEntry {
    type Error = StorageError;

    fn try_from(row: SqliteLedgerRow) -> Result<Self, Self::Error> {
        Ok(RolloverLedgerEntry {
            id: UniversalUuid::from_blob(&row.id)
                .map_err(|e| StorageError::Corrupt(format!("ledger id: {}", e)))?,
            timezone: row.timezone,
            rollover_date: string_to_date(&row.rollover_date)
                .map_err(|e| StorageError::Corrupt(format!("ledger rollover_date: {}", e)))?,
            created_at: UniversalTimestamp::from_rfc3339(&row.created_at)
                .map_err(|e| StorageError::Corrupt(format!("ledger created_at: {}", e)))?,
        })
    }
}

impl NewSqliteLedgerRow {
    /// Builds an insertable row for a fresh ledger claim.
    pub fn claim(timezone: &str, rollover_date: NaiveDate) -> Self {
        Self {
            id: UniversalUuid::new_v4().to_blob(),
            timezone: timezone.to_string(),
            rollover_date: date_to_string(&rollover_date),
            created_at: super::current_timestamp_string(),
        }
    }
}
