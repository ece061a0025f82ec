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

//! # Nightshift
//!
//! Nightshift is a timezone-aware task rollover engine: at local midnight
//! in each user's timezone, every incomplete task dated "yesterday" is
//! moved forward to "today", so users wake up to a current task list
//! without manual rescheduling.
//!
//! The engine has three cooperating parts:
//!
//! - **Clock sampler** ([`clock`]): pure timezone arithmetic over IANA
//!   identifiers, including DST-transition-day detection.
//! - **Midnight scheduler** ([`scheduler`]): a 1-minute tick that detects
//!   zones just past local midnight, claims each (timezone, date)
//!   transition exactly once through a unique-constraint ledger, and
//!   dispatches the zone's users as bounded batches.
//! - **Batch processor** ([`processor`]): drains the durable batch queue
//!   and performs the rollover mutation per user, isolating per-user
//!   failures and redelivering whole-batch failures with backoff.
//!
//! Correctness rests on two idempotency layers rather than on exactly-once
//! delivery: the ledger claim (at most one dispatch per transition) and
//! the mutation's WHERE clause (redelivered batches move nothing twice).
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use nightshift::{RolloverConfig, RolloverRunner};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     nightshift::init_logging(None);
//!
//!     let config = RolloverConfig::from_env();
//!     let mut runner = RolloverRunner::new("nightshift.db", config).await?;
//!     runner.start().await?;
//!
//!     tokio::signal::ctrl_c().await?;
//!     runner.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod clock;
pub mod config;
pub mod dal;
pub mod database;
pub mod error;
pub mod models;
pub mod ports;
pub mod processor;
pub mod retry;
pub mod runner;
pub mod scheduler;
pub mod window;

pub use config::RolloverConfig;
pub use dal::DAL;
pub use database::{Database, UniversalTimestamp, UniversalUuid};
pub use error::{ClockError, PortError, ProcessorError, RunnerError, SchedulerError, StorageError};
pub use models::{BatchStatus, NewUserBatch, TaskRecord, UserBatchRollover, UserRecord};
pub use ports::{BatchDispatcher, LedgerStore, QueueBatchDispatcher, TaskStore, UserDirectory};
pub use processor::{BatchOutcome, BatchRolloverProcessor, ProcessorWorker};
pub use retry::RetryPolicy;
pub use runner::RolloverRunner;
pub use scheduler::{MidnightScheduler, TickOutcome};
pub use window::MidnightWindow;

/// Initializes tracing with an env-filter.
///
/// `filter` overrides `RUST_LOG`; when both are absent the default is
/// `info` for this crate and `warn` elsewhere. Safe to call only once per
/// process.
pub fn init_logging(filter: Option<&str>) {
    use tracing_subscriber::EnvFilter;

    let env_filter = match filter {
        Some(spec) => EnvFilter::new(spec),
        None => EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("warn,nightshift=info")),
    };

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .init();
}
