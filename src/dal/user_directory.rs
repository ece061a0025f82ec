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

//! User Directory Data Access Layer
//!
//! Read side of the user directory contract: which timezones are in use,
//! and which users sit in a given timezone. Reads reflect committed state;
//! a stale read only delays a user's rollover by one cycle, it never rolls
//! anyone incorrectly.

use diesel::prelude::*;

use super::DAL;
use crate::database::schema::users;
use crate::database::universal_types::UniversalUuid;
use crate::error::StorageError;
use crate::models::user::{NewSqliteUserRow, SqliteUserRow};
use crate::models::{current_timestamp_string, UserRecord};

/// Data Access Layer for user directory operations.
pub struct UserDirectoryDAL<'a> {
    dal: &'a DAL,
}

impl<'a> UserDirectoryDAL<'a> {
    /// Creates a new UserDirectoryDAL instance.
    pub fn new(dal: &'a DAL) -> Self {
        Self { dal }
    }

    /// The distinct set of timezones currently assigned to any user.
    pub async fn list_distinct_timezones(&self) -> Result<Vec<String>, StorageError> {
        let conn = self
            .dal
            .database
            .pool()
            .get()
            .await
            .map_err(|e| StorageError::ConnectionPool(e.to_string()))?;

        let timezones = conn
            .interact(|conn| {
                users::table
                    .select(users::timezone)
                    .distinct()
                    .order(users::timezone.asc())
                    .load::<String>(conn)
            })
            .await
            .map_err(|e| StorageError::ConnectionPool(e.to_string()))??;
        Ok(timezones)
    }

    /// All user IDs assigned to a timezone, in stable creation order so
    /// batch partitioning is deterministic.
    pub async fn list_user_ids_for_timezone(
        &self,
        timezone: &str,
    ) -> Result<Vec<UniversalUuid>, StorageError> {
        let conn = self
            .dal
            .database
            .pool()
            .get()
            .await
            .map_err(|e| StorageError::ConnectionPool(e.to_string()))?;

        let timezone = timezone.to_string();
        let blobs: Vec<Vec<u8>> = conn
            .interact(move |conn| {
                users::table
                    .filter(users::timezone.eq(timezone))
                    .order((users::created_at.asc(), users::id.asc()))
                    .select(users::id)
                    .load(conn)
            })
            .await
            .map_err(|e| StorageError::ConnectionPool(e.to_string()))??;

        blobs
            .iter()
            .map(|b| {
                UniversalUuid::from_blob(b)
                    .map_err(|e| StorageError::Corrupt(format!("user id: {}", e)))
            })
            .collect()
    }

    /// Looks up a user by id.
    pub async fn get_user(&self, id: UniversalUuid) -> Result<Option<UserRecord>, StorageError> {
        let conn = self
            .dal
            .database
            .pool()
            .get()
            .await
            .map_err(|e| StorageError::ConnectionPool(e.to_string()))?;

        let id_blob = id.to_blob();
        let row: Option<SqliteUserRow> = conn
            .interact(move |conn| {
                users::table
                    .filter(users::id.eq(id_blob))
                    .first(conn)
                    .optional()
            })
            .await
            .map_err(|e| StorageError::ConnectionPool(e.to_string()))??;

        row.map(UserRecord::try_from).transpose()
    }

    /// Creates a user with the given timezone assignment.
    pub async fn create_user(&self, timezone: &str) -> Result<UniversalUuid, StorageError> {
        let conn = self
            .dal
            .database
            .pool()
            .get()
            .await
            .map_err(|e| StorageError::ConnectionPool(e.to_string()))?;

        let id = UniversalUuid::new_v4();
        let row = NewSqliteUserRow {
            id: id.to_blob(),
            timezone: timezone.to_string(),
            created_at: current_timestamp_string(),
        };
        conn.interact(move |conn| {
            diesel::insert_into(users::table)
                .values(&row)
                .execute(conn)
        })
        .await
        .map_err(|e| StorageError::ConnectionPool(e.to_string()))??;
        Ok(id)
    }
}
