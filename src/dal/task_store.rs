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

//! Task Store Data Access Layer
//!
//! The rollover mutation itself. `bulk_move_incomplete_tasks` is one UPDATE
//! whose WHERE clause carries the idempotency: a task that was already moved
//! no longer matches `scheduled_date == from_date`, so redelivering the same
//! batch is a no-op at the row level. Backlog tasks (`scheduled_date` null)
//! never match and are never touched.

use chrono::{DateTime, NaiveDate, Utc};
use diesel::prelude::*;

use super::DAL;
use crate::database::schema::tasks;
use crate::database::universal_types::UniversalUuid;
use crate::error::StorageError;
use crate::models::task::{NewSqliteTaskRow, SqliteTaskRow};
use crate::models::{current_timestamp_string, date_to_string, datetime_to_string, TaskRecord};

/// Data Access Layer for task store operations.
pub struct TaskStoreDAL<'a> {
    dal: &'a DAL,
}

impl<'a> TaskStoreDAL<'a> {
    /// Creates a new TaskStoreDAL instance.
    pub fn new(dal: &'a DAL) -> Self {
        Self { dal }
    }

    /// Moves every incomplete task a user has scheduled on `from_date` to
    /// `to_date`, in a single atomic statement.
    ///
    /// Returns the number of affected rows. Concurrent edits by the user
    /// are safe: a task completed or rescheduled in between simply stops
    /// matching the WHERE clause.
    pub async fn bulk_move_incomplete_tasks(
        &self,
        user_id: UniversalUuid,
        from_date: NaiveDate,
        to_date: NaiveDate,
    ) -> Result<usize, StorageError> {
        let conn = self
            .dal
            .database
            .pool()
            .get()
            .await
            .map_err(|e| StorageError::ConnectionPool(e.to_string()))?;

        let user_blob = user_id.to_blob();
        let from_str = date_to_string(&from_date);
        let to_str = date_to_string(&to_date);
        let moved = conn
            .interact(move |conn| {
                diesel::update(
                    tasks::table
                        .filter(tasks::user_id.eq(user_blob))
                        .filter(tasks::scheduled_date.eq(Some(from_str)))
                        .filter(tasks::completed_at.is_null()),
                )
                .set((
                    tasks::scheduled_date.eq(Some(to_str)),
                    tasks::updated_at.eq(current_timestamp_string()),
                ))
                .execute(conn)
            })
            .await
            .map_err(|e| StorageError::ConnectionPool(e.to_string()))??;
        Ok(moved)
    }

    /// Creates a task for a user.
    pub async fn create_task(
        &self,
        user_id: UniversalUuid,
        title: &str,
        scheduled_date: Option<NaiveDate>,
        completed_at: Option<DateTime<Utc>>,
    ) -> Result<UniversalUuid, StorageError> {
        let conn = self
            .dal
            .database
            .pool()
            .get()
            .await
            .map_err(|e| StorageError::ConnectionPool(e.to_string()))?;

        let id = UniversalUuid::new_v4();
        let now = current_timestamp_string();
        let row = NewSqliteTaskRow {
            id: id.to_blob(),
            user_id: user_id.to_blob(),
            title: title.to_string(),
            scheduled_date: scheduled_date.map(|d| date_to_string(&d)),
            completed_at: completed_at.map(|ts| datetime_to_string(&ts)),
            created_at: now.clone(),
            updated_at: now,
        };
        conn.interact(move |conn| {
            diesel::insert_into(tasks::table)
                .values(&row)
                .execute(conn)
        })
        .await
        .map_err(|e| StorageError::ConnectionPool(e.to_string()))??;
        Ok(id)
    }

    /// Lists a user's tasks, oldest first.
    pub async fn list_for_user(
        &self,
        user_id: UniversalUuid,
    ) -> Result<Vec<TaskRecord>, StorageError> {
        let conn = self
            .dal
            .database
            .pool()
            .get()
            .await
            .map_err(|e| StorageError::ConnectionPool(e.to_string()))?;

        let user_blob = user_id.to_blob();
        let rows: Vec<SqliteTaskRow> = conn
            .interact(move |conn| {
                tasks::table
                    .filter(tasks::user_id.eq(user_blob))
                    .order(tasks::created_at.asc())
                    .load(conn)
            })
            .await
            .map_err(|e| StorageError::ConnectionPool(e.to_string()))??;

        rows.into_iter().map(TaskRecord::try_from).collect()
    }
}
