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

//! Diesel schema for the rollover engine.
//!
//! SQLite storage conventions: UUIDs as BLOB, timestamps as RFC3339 TEXT,
//! calendar dates as `YYYY-MM-DD` TEXT. `rollover_ledger` carries the unique
//! (timezone, rollover_date) index that provides the engine's idempotency
//! guarantee.

diesel::table! {
    rollover_ledger (id) {
        id -> Binary,
        timezone -> Text,
        rollover_date -> Text,
        created_at -> Text,
    }
}

diesel::table! {
    rollover_batches (id) {
        id -> Binary,
        timezone -> Text,
        rollover_date -> Text,
        target_date -> Text,
        user_ids -> Text,
        batch_number -> Integer,
        total_batches -> Integer,
        status -> Text,
        attempt -> Integer,
        max_attempts -> Integer,
        retry_at -> Nullable<Text>,
        last_error -> Nullable<Text>,
        created_at -> Text,
        updated_at -> Text,
    }
}

diesel::table! {
    users (id) {
        id -> Binary,
        timezone -> Text,
        created_at -> Text,
    }
}

diesel::table! {
    tasks (id) {
        id -> Binary,
        user_id -> Binary,
        title -> Text,
        scheduled_date -> Nullable<Text>,
        completed_at -> Nullable<Text>,
        created_at -> Text,
        updated_at -> Text,
    }
}

diesel::joinable!(tasks -> users (user_id));

diesel::allow_tables_to_appear_in_same_query!(rollover_ledger, rollover_batches, users, tasks);
