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

//! Clock Sampler
//!
//! Pure timezone arithmetic with no side effects. Given a reference UTC
//! instant and an IANA timezone identifier this module answers:
//! - what is the local wall-clock time there right now
//! - what is the zone's UTC offset at that instant
//! - is the local calendar day a DST-transition day
//! - what is the local calendar date
//!
//! The offset is re-derived from the zone database for every instant passed
//! in. It is never cached across a day: a cached offset goes stale exactly on
//! DST-transition days, which are the days this engine most needs to get
//! right.

use chrono::{DateTime, Duration, NaiveDate, Offset, Timelike, Utc};
use chrono_tz::Tz;

use crate::error::ClockError;

/// Date format used for ledger keys and task `scheduled_date` values.
pub const LOCAL_DATE_FORMAT: &str = "%Y-%m-%d";

/// A local wall-clock sample in some timezone.
///
/// Seconds are carried alongside hour/minute so the midnight window can be
/// evaluated with second precision (00:10:00 is the last inside instant of a
/// 10-minute grace window; 00:10:01 is outside).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalClock {
    pub hour: u32,
    pub minute: u32,
    pub second: u32,
}

impl LocalClock {
    /// Seconds elapsed since the start of the current local hour.
    pub fn seconds_into_hour(&self) -> u32 {
        self.minute * 60 + self.second
    }
}

/// Resolves an IANA timezone identifier against the compiled-in tz database.
fn resolve(tz_name: &str) -> Result<Tz, ClockError> {
    tz_name
        .parse::<Tz>()
        .map_err(|_| ClockError::InvalidTimezone(tz_name.to_string()))
}

/// Converts a UTC instant into the zone's wall-clock time.
pub fn local_clock(instant: DateTime<Utc>, tz_name: &str) -> Result<LocalClock, ClockError> {
    let local = instant.with_timezone(&resolve(tz_name)?);
    Ok(LocalClock {
        hour: local.hour(),
        minute: local.minute(),
        second: local.second(),
    })
}

/// The zone's UTC offset in minutes at the given instant, sign-aware
/// (e.g. -300 for EST, +330 for Asia/Kolkata).
pub fn utc_offset_minutes(instant: DateTime<Utc>, tz_name: &str) -> Result<i32, ClockError> {
    let local = instant.with_timezone(&resolve(tz_name)?);
    Ok(local.offset().fix().local_minus_utc() / 60)
}

/// Whether the zone's UTC offset changes within a day of the reference
/// instant (spring-forward or fall-back).
///
/// Compares the offset at `instant - 1 day`, `instant` and `instant + 1 day`.
/// Any resolution failure yields `false`: the transition check only widens
/// the midnight window, so treating an unresolvable zone as non-transitional
/// is safe.
pub fn is_dst_transition_day(instant: DateTime<Utc>, tz_name: &str) -> bool {
    let day = Duration::days(1);
    match (
        utc_offset_minutes(instant - day, tz_name),
        utc_offset_minutes(instant, tz_name),
        utc_offset_minutes(instant + day, tz_name),
    ) {
        (Ok(before), Ok(at), Ok(after)) => before != at || at != after,
        _ => false,
    }
}

/// The zone's calendar date at the given instant.
pub fn local_date(instant: DateTime<Utc>, tz_name: &str) -> Result<NaiveDate, ClockError> {
    Ok(instant.with_timezone(&resolve(tz_name)?).date_naive())
}

/// The zone's calendar date at the given instant as a `YYYY-MM-DD` string.
pub fn format_local_date(instant: DateTime<Utc>, tz_name: &str) -> Result<String, ClockError> {
    Ok(local_date(instant, tz_name)?
        .format(LOCAL_DATE_FORMAT)
        .to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    #[test]
    fn test_local_clock_conversion() {
        // 04:30 UTC is 23:30 the previous evening in New York (EST, -05:00)
        let clock = local_clock(utc(2024, 1, 15, 4, 30, 45), "America/New_York").unwrap();
        assert_eq!(
            clock,
            LocalClock {
                hour: 23,
                minute: 30,
                second: 45
            }
        );

        let clock = local_clock(utc(2024, 1, 15, 4, 30, 0), "UTC").unwrap();
        assert_eq!(clock.hour, 4);
        assert_eq!(clock.minute, 30);
    }

    #[test]
    fn test_invalid_timezone_is_an_error() {
        assert!(matches!(
            local_clock(utc(2024, 1, 15, 0, 0, 0), "Not/AZone"),
            Err(ClockError::InvalidTimezone(_))
        ));
        assert!(utc_offset_minutes(utc(2024, 1, 15, 0, 0, 0), "").is_err());
    }

    #[test]
    fn test_utc_offset_minutes_sign_aware() {
        let instant = utc(2024, 1, 15, 12, 0, 0);
        assert_eq!(utc_offset_minutes(instant, "America/New_York").unwrap(), -300);
        assert_eq!(utc_offset_minutes(instant, "Asia/Kolkata").unwrap(), 330);
        assert_eq!(utc_offset_minutes(instant, "UTC").unwrap(), 0);

        // Summer offset differs from winter offset
        let summer = utc(2024, 7, 15, 12, 0, 0);
        assert_eq!(utc_offset_minutes(summer, "America/New_York").unwrap(), -240);
    }

    #[test]
    fn test_dst_transition_day_detection() {
        // US spring-forward 2024-03-10; the window of +/- 1 day around noon
        // local brackets the offset change.
        assert!(is_dst_transition_day(
            utc(2024, 3, 10, 17, 0, 0),
            "America/New_York"
        ));
        // Fall-back 2024-11-03
        assert!(is_dst_transition_day(
            utc(2024, 11, 3, 17, 0, 0),
            "America/New_York"
        ));
        // An ordinary January day is not transitional
        assert!(!is_dst_transition_day(
            utc(2024, 1, 15, 17, 0, 0),
            "America/New_York"
        ));
        // Zones without DST never transition
        assert!(!is_dst_transition_day(utc(2024, 3, 10, 17, 0, 0), "Asia/Kolkata"));
        // Unresolvable zones report false rather than erroring
        assert!(!is_dst_transition_day(utc(2024, 3, 10, 17, 0, 0), "Bad/Zone"));
    }

    #[test]
    fn test_format_local_date_uses_zone_offset() {
        // 04:30 UTC on the 10th is still the 9th in New York
        assert_eq!(
            format_local_date(utc(2024, 3, 10, 4, 30, 0), "America/New_York").unwrap(),
            "2024-03-09"
        );
        // ...while Tokyo is already on the 10th
        assert_eq!(
            format_local_date(utc(2024, 3, 9, 16, 0, 0), "Asia/Tokyo").unwrap(),
            "2024-03-10"
        );
        assert_eq!(
            format_local_date(utc(2024, 3, 10, 4, 30, 0), "UTC").unwrap(),
            "2024-03-10"
        );
    }
}
