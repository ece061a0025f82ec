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

//! Error types for the rollover engine.
//!
//! Each layer carries its own error enum:
//! - [`ClockError`] for timezone resolution failures (per-zone, recoverable)
//! - [`StorageError`] for database and connection-pool failures
//! - [`PortError`] for failures crossing a collaborator contract
//! - [`SchedulerError`] / [`ProcessorError`] / [`RunnerError`] for the
//!   background services
//!
//! A ledger unique-constraint conflict is deliberately *not* represented
//! here: the ledger DAL maps it to `Ok(false)` because a lost claim race is
//! the normal "already handled" signal, not a failure.

use thiserror::Error;

/// Errors from pure timezone arithmetic.
#[derive(Debug, Error)]
pub enum ClockError {
    /// The identifier is not a recognized IANA timezone. Callers must treat
    /// this as "skip this zone", never as a reason to stop the scheduling
    /// loop.
    #[error("unrecognized IANA timezone: {0}")]
    InvalidTimezone(String),
}

/// Errors from the storage layer (pool, interact, diesel).
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] diesel::result::Error),

    #[error("Connection pool error: {0}")]
    ConnectionPool(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A stored value could not be decoded back into its domain type.
    #[error("Corrupt stored value: {0}")]
    Corrupt(String),
}

/// Errors surfaced by a collaborator port (user directory, task store,
/// ledger store, dispatcher).
///
/// The diesel-backed implementations produce [`PortError::Storage`];
/// out-of-process implementations can report anything through
/// [`PortError::Collaborator`].
#[derive(Debug, Error)]
pub enum PortError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("Collaborator failure: {0}")]
    Collaborator(String),
}

/// Errors from the midnight detector / scheduler.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error(transparent)]
    Clock(#[from] ClockError),

    #[error(transparent)]
    Port(#[from] PortError),
}

/// Errors from the batch rollover processor and its worker loop.
#[derive(Debug, Error)]
pub enum ProcessorError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Port(#[from] PortError),

    #[error("Concurrency control error: {0}")]
    Semaphore(#[from] tokio::sync::AcquireError),
}

/// Errors from service wiring and startup.
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("Migration error: {0}")]
    Migration(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}
