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

//! Data models for the rollover engine.
//!
//! Each entity has a domain type plus SQLite-specific row types (UUIDs as
//! BLOB, timestamps as RFC3339 TEXT, dates as `YYYY-MM-DD` TEXT) that are
//! converted at the DAL boundary.

pub mod rollover_batch;
pub mod rollover_ledger;
pub mod task;
pub mod user;

pub use rollover_batch::{BatchStatus, NewUserBatch, UserBatchRollover};
pub use rollover_ledger::RolloverLedgerEntry;
pub use task::TaskRecord;
pub use user::UserRecord;

use crate::clock::LOCAL_DATE_FORMAT;
use chrono::{DateTime, NaiveDate, Utc};

/// Format a calendar date for SQLite TEXT storage.
pub fn date_to_string(date: &NaiveDate) -> String {
    date.format(LOCAL_DATE_FORMAT).to_string()
}

/// Parse a stored `YYYY-MM-DD` value back into a date.
pub fn string_to_date(s: &str) -> Result<NaiveDate, chrono::ParseError> {
    NaiveDate::parse_from_str(s, LOCAL_DATE_FORMAT)
}

/// Convert `DateTime<Utc>` to an RFC3339 string for SQLite storage.
pub fn datetime_to_string(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

/// Parse an RFC3339 string from SQLite into `DateTime<Utc>`.
pub fn string_to_datetime(s: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(s).map(|dt| dt.with_timezone(&Utc))
}

/// Get the current timestamp as an RFC3339 string.
pub fn current_timestamp_string() -> String {
    Utc::now().to_rfc3339()
}
