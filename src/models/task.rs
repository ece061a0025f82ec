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

//! Task Model
//!
//! Minimal projection of the task store. Rollover only touches tasks where
//! `scheduled_date` equals the rollover date and `completed_at` is null;
//! backlog tasks (`scheduled_date` null) are never touched.

use chrono::{DateTime, NaiveDate, Utc};
use diesel::prelude::*;

use super::{string_to_date, string_to_datetime};
use crate::database::universal_types::{UniversalTimestamp, UniversalUuid};
use crate::error::StorageError;

/// A task as seen by the rollover engine.
#[derive(Debug, Clone)]
pub struct TaskRecord {
    pub id: UniversalUuid,
    pub user_id: UniversalUuid,
    pub title: String,
    /// None = backlog (unscheduled)
    pub scheduled_date: Option<NaiveDate>,
    /// None = incomplete
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: UniversalTimestamp,
    pub updated_at: UniversalTimestamp,
}

impl TaskRecord {
    pub fn is_complete(&self) -> bool {
        self.completed_at.is_some()
    }
}

#[derive(Debug, Queryable, Selectable)]
#[diesel(table_name = crate::database::schema::tasks)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct SqliteTaskRow {
    pub id: Vec<u8>,
    pub user_id: Vec<u8>,
    pub title: String,
    pub scheduled_date: Option<String>,
    pub completed_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::database::schema::tasks)]
pub struct NewSqliteTaskRow {
    pub id: Vec<u8>,
    pub user_id: Vec<u8>,
    pub title: String,
    pub scheduled_date: Option<String>,
    pub completed_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl TryFrom<SqliteTaskRow> for TaskRecord {
    type Error = StorageError;

    fn try_from(row: SqliteTaskRow) -> Result<Self, Self::Error> {
        let scheduled_date = row
            .scheduled_date
            .as_deref()
            .map(string_to_date)
            .transpose()
            .map_err(|e| StorageError::Corrupt(format!("task scheduled_date: {}", e)))?;
        let completed_at = row
            .completed_at
            .as_deref()
            .map(string_to_datetime)
            .transpose()
            .map_err(|e| StorageError::Corrupt(format!("task completed_at: {}", e)))?;

        Ok(TaskRecord {
            id: UniversalUuid::from_blob(&row.id)
                .map_err(|e| StorageError::Corrupt(format!("task id: {}", e)))?,
            user_id: UniversalUuid::from_blob(&row.user_id)
                .map_err(|e| StorageError::Corrupt(format!("task user_id: {}", e)))?,
            title: row.title,
            scheduled_date,
            completed_at,
            created_at: UniversalTimestamp::from_rfc3339(&row.created_at)
                .map_err(|e| StorageError::Corrupt(format!("task created_at: {}", e)))?,
            updated_at: UniversalTimestamp::from_rfc3339(&row.updated_at)
                .map_err(|e| StorageError::Corrupt(format!("task updated_at: {}", e)))?,
        })
    }
}
