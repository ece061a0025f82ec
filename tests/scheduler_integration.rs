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

//! Integration tests for the midnight scheduler against a real SQLite
//! database: window gating, ledger idempotency, per-zone fault isolation
//! and batch partitioning.

mod common;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serial_test::serial;
use std::sync::Arc;
use std::sync::Mutex;

use common::{date, TestFixture};
use nightshift::{
    BatchDispatcher, BatchStatus, MidnightScheduler, NewUserBatch, PortError, QueueBatchDispatcher,
    RolloverConfig, UniversalUuid, UserDirectory,
};

fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
}

fn scheduler_for(fixture: &TestFixture, config: RolloverConfig) -> MidnightScheduler {
    let dal = fixture.dal.clone();
    let dispatcher =
        QueueBatchDispatcher::new(dal.clone(), config.retry_policy.max_attempts);
    MidnightScheduler::new(
        Arc::new(dal.clone()),
        Arc::new(dal),
        Arc::new(dispatcher),
        config,
    )
}

/// A fixed directory of zones and users, independent of the database.
struct StaticDirectory {
    zones: Vec<String>,
    users: Mutex<Vec<(String, UniversalUuid)>>,
}

impl StaticDirectory {
    fn new(zones: &[&str]) -> Self {
        Self {
            zones: zones.iter().map(|z| z.to_string()).collect(),
            users: Mutex::new(Vec::new()),
        }
    }

    fn add_user(&self, zone: &str) {
        self.users
            .lock()
            .unwrap()
            .push((zone.to_string(), UniversalUuid::new_v4()));
    }
}

#[async_trait]
impl UserDirectory for StaticDirectory {
    async fn list_distinct_timezones(&self) -> Result<Vec<String>, PortError> {
        Ok(self.zones.clone())
    }

    async fn list_user_ids_for_timezone(
        &self,
        timezone: &str,
    ) -> Result<Vec<UniversalUuid>, PortError> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .iter()
            .filter(|(z, _)| z == timezone)
            .map(|(_, id)| *id)
            .collect())
    }
}

/// Records dispatched batches instead of enqueuing them.
#[derive(Default)]
struct RecordingDispatcher {
    batches: Mutex<Vec<NewUserBatch>>,
}

#[async_trait]
impl BatchDispatcher for RecordingDispatcher {
    async fn dispatch(&self, batches: &[NewUserBatch]) -> Result<(), PortError> {
        self.batches.lock().unwrap().extend_from_slice(batches);
        Ok(())
    }
}

#[tokio::test]
#[serial]
async fn test_tick_claims_zone_inside_window() {
    let fixture = TestFixture::new().await;
    let user_id = fixture.seed_user("America/New_York").await;
    let scheduler = scheduler_for(&fixture, RolloverConfig::default());

    // 05:05 UTC on 2024-03-09 is 00:05 local in New York (EST)
    let outcome = scheduler.tick(utc(2024, 3, 9, 5, 5, 0)).await.unwrap();

    assert_eq!(outcome.zones_checked, 1);
    assert_eq!(outcome.zones_claimed, 1);
    assert_eq!(outcome.batches_dispatched, 1);

    let entry = fixture
        .dal
        .rollover_ledger()
        .get("America/New_York", date(2024, 3, 8))
        .await
        .unwrap();
    assert!(entry.is_some());

    let user = fixture
        .dal
        .user_directory()
        .get_user(user_id)
        .await
        .unwrap()
        .expect("seeded user should be readable");
    assert_eq!(user.timezone, "America/New_York");

    let batches = fixture
        .dal
        .rollover_batch()
        .list_for_event("America/New_York", date(2024, 3, 8))
        .await
        .unwrap();
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].status, BatchStatus::Queued);
    assert_eq!(batches[0].target_date, date(2024, 3, 9));
    assert_eq!(batches[0].user_ids, vec![user_id]);
}

#[tokio::test]
#[serial]
async fn test_repeated_ticks_claim_once() {
    let fixture = TestFixture::new().await;
    fixture.seed_user("UTC").await;
    let scheduler = scheduler_for(&fixture, RolloverConfig::default());

    let now = utc(2024, 6, 1, 0, 3, 0);
    let first = scheduler.tick(now).await.unwrap();
    assert_eq!(first.zones_claimed, 1);

    // Later ticks inside the same window observe the ledger and do nothing
    for minute in [4, 5, 9] {
        let again = scheduler
            .tick(utc(2024, 6, 1, 0, minute, 0))
            .await
            .unwrap();
        assert_eq!(again.zones_claimed, 0);
        assert_eq!(again.batches_dispatched, 0);
    }

    let batches = fixture
        .dal
        .rollover_batch()
        .list_for_event("UTC", date(2024, 5, 31))
        .await
        .unwrap();
    assert_eq!(batches.len(), 1);
}

#[tokio::test]
#[serial]
async fn test_concurrent_ticks_claim_once() {
    let fixture = TestFixture::new().await;
    fixture.seed_user("UTC").await;
    let scheduler = Arc::new(scheduler_for(&fixture, RolloverConfig::default()));

    // N racing ticks at the same instant; the unique ledger constraint
    // lets exactly one win
    let now = utc(2024, 6, 1, 0, 3, 0);
    let mut handles = Vec::new();
    for _ in 0..10 {
        let scheduler = Arc::clone(&scheduler);
        handles.push(tokio::spawn(async move { scheduler.tick(now).await }));
    }

    let mut total_claimed = 0;
    let mut total_dispatched = 0;
    for handle in handles {
        let outcome = handle.await.unwrap().unwrap();
        total_claimed += outcome.zones_claimed;
        total_dispatched += outcome.batches_dispatched;
    }
    assert_eq!(total_claimed, 1);
    assert_eq!(total_dispatched, 1);

    assert_eq!(fixture.dal.rollover_ledger().count().await.unwrap(), 1);
    let batches = fixture
        .dal
        .rollover_batch()
        .list_for_event("UTC", date(2024, 5, 31))
        .await
        .unwrap();
    assert_eq!(batches.len(), 1);
}

#[tokio::test]
#[serial]
async fn test_window_boundary_gating() {
    let fixture = TestFixture::new().await;
    fixture.seed_user("UTC").await;
    let scheduler = scheduler_for(&fixture, RolloverConfig::default());

    // One second past the 10-minute grace mark is outside
    let outcome = scheduler.tick(utc(2024, 6, 1, 0, 10, 1)).await.unwrap();
    assert_eq!(outcome.zones_claimed, 0);
    assert!(fixture
        .dal
        .rollover_ledger()
        .get("UTC", date(2024, 5, 31))
        .await
        .unwrap()
        .is_none());

    // Exactly at the mark is inside
    let outcome = scheduler.tick(utc(2024, 6, 1, 0, 10, 0)).await.unwrap();
    assert_eq!(outcome.zones_claimed, 1);
}

#[tokio::test]
#[serial]
async fn test_dst_transition_day_widens_window() {
    let fixture = TestFixture::new().await;
    fixture.seed_user("America/New_York").await;
    let scheduler = scheduler_for(&fixture, RolloverConfig::default());

    // US spring-forward day 2024-03-10. 06:20 UTC is 01:20 EST, outside the
    // normal window but inside the widened one.
    let outcome = scheduler.tick(utc(2024, 3, 10, 6, 20, 0)).await.unwrap();
    assert_eq!(outcome.zones_claimed, 1);

    let entry = fixture
        .dal
        .rollover_ledger()
        .get("America/New_York", date(2024, 3, 9))
        .await
        .unwrap();
    assert!(entry.is_some());
}

#[tokio::test]
#[serial]
async fn test_empty_zone_does_not_burn_ledger_slot() {
    let fixture = TestFixture::new().await;
    let directory = Arc::new(StaticDirectory::new(&["UTC"]));
    let dispatcher = Arc::new(RecordingDispatcher::default());
    let scheduler = MidnightScheduler::new(
        directory.clone(),
        Arc::new(fixture.dal.clone()),
        dispatcher.clone(),
        RolloverConfig::default(),
    );

    let now = utc(2024, 6, 1, 0, 2, 0);
    let outcome = scheduler.tick(now).await.unwrap();
    assert_eq!(outcome.zones_claimed, 0);
    assert!(fixture
        .dal
        .rollover_ledger()
        .get("UTC", date(2024, 5, 31))
        .await
        .unwrap()
        .is_none());

    // A user appearing later in the same window still gets claimed
    directory.add_user("UTC");
    let outcome = scheduler.tick(utc(2024, 6, 1, 0, 7, 0)).await.unwrap();
    assert_eq!(outcome.zones_claimed, 1);
    assert_eq!(dispatcher.batches.lock().unwrap().len(), 1);
}

#[tokio::test]
#[serial]
async fn test_invalid_timezone_does_not_block_others() {
    let fixture = TestFixture::new().await;
    let directory = Arc::new(StaticDirectory::new(&["Not/AZone", "UTC"]));
    directory.add_user("Not/AZone");
    directory.add_user("UTC");
    let dispatcher = Arc::new(RecordingDispatcher::default());
    let scheduler = MidnightScheduler::new(
        directory,
        Arc::new(fixture.dal.clone()),
        dispatcher.clone(),
        RolloverConfig::default(),
    );

    let outcome = scheduler.tick(utc(2024, 6, 1, 0, 2, 0)).await.unwrap();

    assert_eq!(outcome.zones_checked, 2);
    assert_eq!(outcome.zones_claimed, 1);
    let batches = dispatcher.batches.lock().unwrap();
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].timezone, "UTC");
}

#[tokio::test]
#[serial]
async fn test_users_partition_into_numbered_batches() {
    let fixture = TestFixture::new().await;
    let users = fixture.seed_users("UTC", 7).await;
    let config = RolloverConfig {
        batch_size: 3,
        ..RolloverConfig::default()
    };
    let scheduler = scheduler_for(&fixture, config);

    let outcome = scheduler.tick(utc(2024, 6, 1, 0, 1, 0)).await.unwrap();
    assert_eq!(outcome.batches_dispatched, 3);

    let batches = fixture
        .dal
        .rollover_batch()
        .list_for_event("UTC", date(2024, 5, 31))
        .await
        .unwrap();
    assert_eq!(batches.len(), 3);
    assert_eq!(
        batches.iter().map(|b| b.batch_number).collect::<Vec<_>>(),
        vec![1, 2, 3]
    );
    assert!(batches.iter().all(|b| b.total_batches == 3));
    assert_eq!(
        batches.iter().map(|b| b.user_ids.len()).collect::<Vec<_>>(),
        vec![3, 3, 1]
    );

    // No user lost or duplicated across the partition
    let mut dispatched: Vec<_> = batches.iter().flat_map(|b| b.user_ids.clone()).collect();
    let mut expected = users;
    dispatched.sort_by_key(|u| u.to_string());
    expected.sort_by_key(|u| u.to_string());
    assert_eq!(dispatched, expected);
}

#[tokio::test]
#[serial]
async fn test_zones_at_different_offsets_claim_independently() {
    let fixture = TestFixture::new().await;
    fixture.seed_user("Asia/Tokyo").await;
    fixture.seed_user("America/New_York").await;
    let scheduler = scheduler_for(&fixture, RolloverConfig::default());

    // 15:05 UTC on 2024-06-01 is 00:05 on 2024-06-02 in Tokyo, while New
    // York is mid-morning.
    let outcome = scheduler.tick(utc(2024, 6, 1, 15, 5, 0)).await.unwrap();
    assert_eq!(outcome.zones_checked, 2);
    assert_eq!(outcome.zones_claimed, 1);

    assert!(fixture
        .dal
        .rollover_ledger()
        .get("Asia/Tokyo", date(2024, 6, 1))
        .await
        .unwrap()
        .is_some());
    assert!(fixture
        .dal
        .rollover_ledger()
        .get("America/New_York", date(2024, 5, 31))
        .await
        .unwrap()
        .is_none());
}
