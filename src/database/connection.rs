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

//! Database connection management for SQLite.
//!
//! This module provides an async connection pool implementation using
//! `deadpool-diesel` for managing database connections efficiently. It
//! handles connection pooling, connection lifecycle, and provides a
//! thread-safe way to access database connections.
//!
//! # Features
//!
//! - Connection pooling via deadpool with the Tokio runtime
//! - File path, `sqlite://` URL or `:memory:` configuration
//! - Embedded migrations with WAL and busy_timeout pragmas

use deadpool_diesel::sqlite::{Manager, Pool, Runtime};
use tracing::info;

use super::MIGRATIONS;

/// Represents a pool of SQLite database connections.
///
/// The `Database` struct is `Clone` and can be safely shared between
/// threads. Each clone references the same underlying connection pool.
#[derive(Clone)]
pub struct Database {
    pool: Pool,
    url: String,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database").field("url", &self.url).finish()
    }
}

impl Database {
    /// Creates a new SQLite connection pool.
    ///
    /// # Arguments
    ///
    /// * `connection_string` - A file path, `sqlite://` URL or `:memory:`
    ///
    /// # Panics
    ///
    /// Panics if the connection pool cannot be created.
    pub fn new(connection_string: &str) -> Self {
        let url = Self::build_sqlite_url(connection_string);
        let manager = Manager::new(url.clone(), Runtime::Tokio1);

        // SQLite has limited concurrent write support even with WAL mode.
        // Using a single connection avoids "database is locked" errors.
        let pool_size = 1;
        let pool = Pool::builder(manager)
            .max_size(pool_size)
            .build()
            .expect("Failed to create SQLite connection pool");

        info!("SQLite connection pool initialized (size: {})", pool_size);

        Self { pool, url }
    }

    /// Returns a clone of the connection pool.
    pub fn pool(&self) -> Pool {
        self.pool.clone()
    }

    /// Returns the normalized connection URL.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Strips the `sqlite://` prefix if present.
    fn build_sqlite_url(connection_string: &str) -> String {
        if let Some(path) = connection_string.strip_prefix("sqlite://") {
            path.to_string()
        } else {
            connection_string.to_string()
        }
    }

    /// Runs pending database migrations.
    ///
    /// Sets WAL mode and a busy timeout before applying the embedded
    /// migration set.
    pub async fn run_migrations(&self) -> Result<(), String> {
        let conn = self.pool.get().await.map_err(|e| e.to_string())?;
        conn.interact(|conn| {
            use diesel::prelude::*;
            use diesel_migrations::MigrationHarness;

            // WAL mode allows concurrent reads during writes
            diesel::sql_query("PRAGMA journal_mode=WAL;")
                .execute(conn)
                .map_err(|e| format!("Failed to set WAL mode: {}", e))?;
            // busy_timeout makes SQLite wait instead of immediately failing on locks
            diesel::sql_query("PRAGMA busy_timeout=30000;")
                .execute(conn)
                .map_err(|e| format!("Failed to set busy_timeout: {}", e))?;

            conn.run_pending_migrations(MIGRATIONS)
                .map(|_| ())
                .map_err(|e| format!("Failed to run migrations: {}", e))
        })
        .await
        .map_err(|e| format!("Failed to run migrations: {}", e))??;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sqlite_connection_strings() {
        assert_eq!(
            Database::build_sqlite_url("/path/to/database.db"),
            "/path/to/database.db"
        );
        assert_eq!(Database::build_sqlite_url(":memory:"), ":memory:");
        assert_eq!(Database::build_sqlite_url("./database.db"), "./database.db");
        assert_eq!(
            Database::build_sqlite_url("sqlite:///path/to/db.sqlite"),
            "/path/to/db.sqlite"
        );
    }
}
