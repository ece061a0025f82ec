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

//! Shared test fixtures: a migrated SQLite database in a temp directory
//! plus seeding helpers.

use chrono::{DateTime, NaiveDate, Utc};
use tempfile::TempDir;

use nightshift::{Database, UniversalUuid, DAL};

pub struct TestFixture {
    pub dal: DAL,
    // Held so the database file outlives the fixture
    _temp_dir: TempDir,
}

impl TestFixture {
    pub async fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let db_path = temp_dir.path().join("nightshift_test.db");
        let database = Database::new(db_path.to_str().expect("non-utf8 temp path"));
        database
            .run_migrations()
            .await
            .expect("Failed to run migrations");

        Self {
            dal: DAL::new(database),
            _temp_dir: temp_dir,
        }
    }

    pub async fn seed_user(&self, timezone: &str) -> UniversalUuid {
        self.dal
            .user_directory()
            .create_user(timezone)
            .await
            .expect("Failed to seed user")
    }

    pub async fn seed_users(&self, timezone: &str, count: usize) -> Vec<UniversalUuid> {
        let mut ids = Vec::with_capacity(count);
        for _ in 0..count {
            ids.push(self.seed_user(timezone).await);
        }
        ids
    }

    pub async fn seed_task(
        &self,
        user_id: UniversalUuid,
        title: &str,
        scheduled_date: Option<NaiveDate>,
        completed_at: Option<DateTime<Utc>>,
    ) -> UniversalUuid {
        self.dal
            .task_store()
            .create_task(user_id, title, scheduled_date, completed_at)
            .await
            .expect("Failed to seed task")
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("invalid test date")
}
