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

//! User Model
//!
//! Minimal projection of the user directory: the rollover engine only needs
//! a user's identity and assigned IANA timezone.

use diesel::prelude::*;

use crate::database::universal_types::{UniversalTimestamp, UniversalUuid};
use crate::error::StorageError;

/// A user as seen by the rollover engine.
#[derive(Debug, Clone)]
pub struct UserRecord {
    pub id: UniversalUuid,
    pub timezone: String,
    pub created_at: UniversalTimestamp,
}

#[derive(Debug, Queryable, Selectable)]
#[diesel(table_name = crate::database::schema::users)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct SqliteUserRow {
    pub id: Vec<u8>,
    pub timezone: String,
    pub created_at: String,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::database::schema::users)]
pub struct NewSqliteUserRow {
    pub id: Vec<u8>,
    pub timezone: String,
    pub created_at: String,
}

impl TryFrom<SqliteUserRow> for UserRecord {
    type Error = StorageError;

    fn try_from(row: SqliteUserRow) -> Result<Self, Self::Error> {
        Ok(UserRecord {
            id: UniversalUuid::from_blob(&row.id)
                .map_err(|e| StorageError::Corrupt(format!("user id: {}", e)))?,
            timezone: row.timezone,
            created_at: UniversalTimestamp::from_rfc3339(&row.created_at)
                .map_err(|e| StorageError::Corrupt(format!("user created_at: {}", e)))?,
        })
    }
}
