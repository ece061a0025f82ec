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

//! Midnight window
//!
//! The tolerance interval around local midnight during which a timezone is
//! considered "due" for rollover. On a normal day this is a 10-minute grace
//! window starting at local midnight. On a DST-transition day the window is
//! widened to span hours 23, 0 and 1 with a 30-minute grace inside each,
//! tolerating the skipped or repeated hour around the transition.

use crate::clock::LocalClock;

/// Seconds of grace after local midnight on a normal day.
pub const DEFAULT_NORMAL_GRACE_SECS: u32 = 10 * 60;

/// Seconds of grace inside each of hours 23, 0 and 1 on a DST-transition day.
pub const DEFAULT_DST_GRACE_SECS: u32 = 30 * 60;

/// Midnight window configuration.
#[derive(Debug, Clone, Copy)]
pub struct MidnightWindow {
    /// Grace period after local midnight on a normal day, in seconds.
    pub normal_grace_secs: u32,
    /// Grace period within each widened hour on a DST-transition day,
    /// in seconds.
    pub dst_grace_secs: u32,
}

impl Default for MidnightWindow {
    fn default() -> Self {
        Self {
            normal_grace_secs: DEFAULT_NORMAL_GRACE_SECS,
            dst_grace_secs: DEFAULT_DST_GRACE_SECS,
        }
    }
}

impl MidnightWindow {
    /// Whether a local wall-clock sample falls inside the window.
    ///
    /// Boundaries are inclusive at exactly the grace mark: with the default
    /// 10-minute grace, 00:10:00 is inside and 00:10:01 is outside.
    pub fn contains(&self, clock: &LocalClock, dst_transition_day: bool) -> bool {
        if dst_transition_day {
            matches!(clock.hour, 23 | 0 | 1) && clock.seconds_into_hour() <= self.dst_grace_secs
        } else {
            clock.hour == 0 && clock.seconds_into_hour() <= self.normal_grace_secs
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(hour: u32, minute: u32, second: u32) -> LocalClock {
        LocalClock {
            hour,
            minute,
            second,
        }
    }

    #[test]
    fn test_normal_day_window_boundaries() {
        let window = MidnightWindow::default();
        assert!(window.contains(&at(0, 0, 0), false));
        assert!(window.contains(&at(0, 5, 30), false));
        assert!(window.contains(&at(0, 10, 0), false));
        assert!(!window.contains(&at(0, 10, 1), false));
        assert!(!window.contains(&at(0, 11, 0), false));
        assert!(!window.contains(&at(23, 59, 59), false));
        assert!(!window.contains(&at(1, 0, 0), false));
    }

    #[test]
    fn test_dst_day_window_is_widened() {
        let window = MidnightWindow::default();
        assert!(window.contains(&at(23, 5, 0), true));
        assert!(window.contains(&at(0, 5, 0), true));
        assert!(window.contains(&at(1, 5, 0), true));
        assert!(window.contains(&at(23, 30, 0), true));
        assert!(!window.contains(&at(23, 30, 1), true));
        assert!(!window.contains(&at(2, 5, 0), true));
        assert!(!window.contains(&at(22, 59, 0), true));
    }
}
