//! Time window presets and the editable window selection.
//!
//! [`resolve`] maps a [`Preset`] to a concrete [`TimeWindow`] relative to an
//! instant. Calendar boundaries ("today", "this week") are computed in the UTC
//! offset carried by `now`, so callers pass a local time to get local days.
//! Weeks start on Monday. End bounds are the last millisecond before the next
//! boundary.
//!
//! [`WindowSelection`] holds the active preset and window for a chart and
//! applies the bound edits a date/time picker produces.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use time::{Date, Duration, OffsetDateTime, Time};
use tracing::debug;

use relaywatch_types::TimeWindow;

use crate::error::{Error, Result};

/// Length of the seed window for [`Preset::Custom`].
pub const CUSTOM_SEED: Duration = Duration::minutes(5);

/// Named shorthand for a time window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Preset {
    ThisHour,
    Today,
    Yesterday,
    ThisWeek,
    ThisMonth,
    #[serde(rename = "last_1h")]
    LastHour,
    #[serde(rename = "last_12h")]
    Last12Hours,
    #[default]
    #[serde(rename = "last_1d")]
    LastDay,
    #[serde(rename = "last_7d")]
    Last7Days,
    Custom,
}

impl Preset {
    /// All presets, in the order a picker lists them.
    pub const ALL: [Preset; 10] = [
        Preset::LastHour,
        Preset::Last12Hours,
        Preset::LastDay,
        Preset::Last7Days,
        Preset::ThisHour,
        Preset::Today,
        Preset::Yesterday,
        Preset::ThisWeek,
        Preset::ThisMonth,
        Preset::Custom,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Preset::ThisHour => "this_hour",
            Preset::Today => "today",
            Preset::Yesterday => "yesterday",
            Preset::ThisWeek => "this_week",
            Preset::ThisMonth => "this_month",
            Preset::LastHour => "last_1h",
            Preset::Last12Hours => "last_12h",
            Preset::LastDay => "last_1d",
            Preset::Last7Days => "last_7d",
            Preset::Custom => "custom",
        }
    }
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Preset {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        Preset::ALL
            .into_iter()
            .find(|p| p.as_str() == normalized)
            .ok_or_else(|| {
                Error::invalid_config(format!(
                    "unknown preset '{}' (expected one of: {})",
                    s,
                    Preset::ALL.map(Preset::as_str).join(", ")
                ))
            })
    }
}

/// Resolve a preset to a concrete window relative to `now`.
///
/// Pure: the same arguments always yield the same window.
pub fn resolve(preset: Preset, now: OffsetDateTime) -> TimeWindow {
    let midnight = now.replace_time(Time::MIDNIGHT);
    let (start, end) = match preset {
        Preset::ThisHour => {
            let start = midnight + Duration::hours(i64::from(now.hour()));
            (start, start + Duration::HOUR)
        }
        Preset::Today => (midnight, midnight + Duration::DAY),
        Preset::Yesterday => (midnight - Duration::DAY, midnight),
        Preset::ThisWeek => {
            let days = i64::from(now.weekday().number_days_from_monday());
            let start = midnight - Duration::days(days);
            (start, start + Duration::WEEK)
        }
        Preset::ThisMonth => {
            let start = midnight - Duration::days(i64::from(now.day()) - 1);
            (start, start_of_next_month(start))
        }
        Preset::LastHour => return TimeWindow::between(now - Duration::HOUR, now),
        Preset::Last12Hours => return TimeWindow::between(now - Duration::hours(12), now),
        Preset::LastDay => return TimeWindow::between(now - Duration::DAY, now),
        Preset::Last7Days => return TimeWindow::between(now - Duration::WEEK, now),
        Preset::Custom => return TimeWindow::between(now - CUSTOM_SEED, now),
    };
    TimeWindow::between(start, end - Duration::MILLISECOND)
}

/// First instant of the month after the one `first_of_month` starts.
fn start_of_next_month(first_of_month: OffsetDateTime) -> OffsetDateTime {
    // 32 days past the 1st always lands early in the following month.
    let later = first_of_month + Duration::days(32);
    later - Duration::days(i64::from(later.day()) - 1)
}

/// Drop the seconds and sub-second part of a time of day.
fn truncate_to_minute(t: Time) -> Time {
    t - Duration::seconds(i64::from(t.second())) - Duration::nanoseconds(i64::from(t.nanosecond()))
}

/// Which bound of the window an edit targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Bound {
    From,
    To,
}

/// The active preset and window of a chart.
///
/// Every edit switches the preset to [`Preset::Custom`] and re-validates
/// `from <= to`. An edit that would invert the window is ignored and the
/// previous window is kept; edit methods report whether the edit applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowSelection {
    preset: Preset,
    window: TimeWindow,
}

impl WindowSelection {
    /// Start with `preset` resolved against `now`.
    pub fn new(preset: Preset, now: OffsetDateTime) -> Self {
        Self {
            preset,
            window: resolve(preset, now),
        }
    }

    pub fn preset(&self) -> Preset {
        self.preset
    }

    pub fn window(&self) -> TimeWindow {
        self.window
    }

    /// Switch to a preset. Selecting [`Preset::Custom`] keeps the current window.
    pub fn select_preset(&mut self, preset: Preset, now: OffsetDateTime) {
        if preset != Preset::Custom {
            self.window = resolve(preset, now);
        }
        self.preset = preset;
    }

    /// Re-resolve the active preset against a new instant.
    ///
    /// Custom windows are left alone.
    pub fn refresh(&mut self, now: OffsetDateTime) {
        if self.preset != Preset::Custom {
            self.window = resolve(self.preset, now);
        }
    }

    /// Replace the start of the window.
    pub fn set_from(&mut self, from: OffsetDateTime) -> bool {
        self.apply(Bound::From, from)
    }

    /// Replace the end of the window.
    pub fn set_to(&mut self, to: OffsetDateTime) -> bool {
        self.apply(Bound::To, to)
    }

    /// Move the start to another day, keeping its hour and minute.
    pub fn set_from_date(&mut self, date: Date) -> bool {
        let from = self.window.from();
        self.apply(
            Bound::From,
            from.replace_date(date)
                .replace_time(truncate_to_minute(from.time())),
        )
    }

    /// Move the end to another day, keeping its hour and minute.
    pub fn set_to_date(&mut self, date: Date) -> bool {
        let to = self.window.to();
        self.apply(
            Bound::To,
            to.replace_date(date).replace_time(truncate_to_minute(to.time())),
        )
    }

    /// Change the start's hour and minute, keeping its date and seconds.
    pub fn set_from_time(&mut self, hour: u8, minute: u8) -> bool {
        self.apply_time(Bound::From, hour, minute)
    }

    /// Change the end's hour and minute, keeping its date and seconds.
    pub fn set_to_time(&mut self, hour: u8, minute: u8) -> bool {
        self.apply_time(Bound::To, hour, minute)
    }

    fn apply_time(&mut self, bound: Bound, hour: u8, minute: u8) -> bool {
        let current = match bound {
            Bound::From => self.window.from(),
            Bound::To => self.window.to(),
        };
        match Time::from_hms_nano(hour, minute, current.second(), current.nanosecond()) {
            Ok(t) => self.apply(bound, current.replace_time(t)),
            Err(e) => {
                self.preset = Preset::Custom;
                debug!("Ignoring time edit {:02}:{:02}: {}", hour, minute, e);
                false
            }
        }
    }

    fn apply(&mut self, bound: Bound, instant: OffsetDateTime) -> bool {
        self.preset = Preset::Custom;
        let edited = match bound {
            Bound::From => self.window.with_from(instant),
            Bound::To => self.window.with_to(instant),
        };
        match edited {
            Ok(window) => {
                self.window = window;
                true
            }
            Err(e) => {
                debug!("Ignoring window edit: {}", e);
                false
            }
        }
    }
}
