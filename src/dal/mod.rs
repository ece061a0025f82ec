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

//! Data Access Layer
//!
//! This module provides the data access layer for the rollover engine. Each
//! entity gets a sub-DAL handed out by the main [`DAL`] struct; all database
//! work goes through the pooled connection's `interact` closure.
//!
//! The DAL is also the production implementation of the collaborator ports
//! in [`crate::ports`]: the user directory, task store, ledger store and
//! batch dispatcher contracts are all backed by these sub-DALs.

use crate::database::Database;

pub mod rollover_batch;
pub mod rollover_ledger;
pub mod task_store;
pub mod user_directory;

pub use rollover_batch::RolloverBatchDAL;
pub use rollover_ledger::RolloverLedgerDAL;
pub use task_store::TaskStoreDAL;
pub use user_directory::UserDirectoryDAL;

/// The main Data Access Layer struct.
///
/// `DAL` is `Clone` and can be safely shared between threads; each clone
/// references the same underlying connection pool.
#[derive(Clone, Debug)]
pub struct DAL {
    /// The database instance with connection pool
    pub database: Database,
}

impl DAL {
    /// Creates a new DAL instance.
    pub fn new(database: Database) -> Self {
        DAL { database }
    }

    /// Returns a ledger DAL for rollover ledger operations.
    pub fn rollover_ledger(&self) -> RolloverLedgerDAL {
        RolloverLedgerDAL::new(self)
    }

    /// Returns a batch DAL for the durable batch queue.
    pub fn rollover_batch(&self) -> RolloverBatchDAL {
        RolloverBatchDAL::new(self)
    }

    /// Returns a user directory DAL.
    pub fn user_directory(&self) -> UserDirectoryDAL {
        UserDirectoryDAL::new(self)
    }

    /// Returns a task store DAL.
    pub fn task_store(&self) -> TaskStoreDAL {
        TaskStoreDAL::new(self)
    }
}
