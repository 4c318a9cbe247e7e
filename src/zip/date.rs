//! MS-DOS date & time packing used by ZIP headers.
//!
//! Time: `hhhhh mmmmmm sssss` (seconds halved). Date: `yyyyyyy mmmm ddddd` with
//! the year offset from 1980.

use std::time::SystemTime;

use chrono::{DateTime, Datelike, Local, NaiveDateTime, TimeZone, Timelike};

/// A date and time stored as per the MS-DOS representation used by ZIP files.
#[derive(Debug, Default, PartialEq, Eq, Clone, Copy, Hash)]
pub struct DosDateTime {
    pub time: u16,
    pub date: u16,
}

impl DosDateTime {
    /// 1980-01-01 00:00:00, the earliest representable instant.
    pub const MIN: DosDateTime = DosDateTime {
        time: 0,
        date: (1 << 5) | 1,
    };

    /// Pack a calendar date and wall-clock time.
    ///
    /// Years outside 1980..=2107 are clamped to the nearest representable
    /// instant.
    pub fn from_naive(value: &NaiveDateTime) -> Self {
        let year = value.year();
        if year < 1980 {
            return Self::MIN;
        }
        if year > 2107 {
            return Self {
                time: (23 << 11) | (59 << 5) | (58 / 2),
                date: (127 << 9) | (12 << 5) | 31,
            };
        }

        let time = (value.hour() << 11) | (value.minute() << 5) | (value.second() / 2);
        let date = (((year - 1980) as u32) << 9) | (value.month() << 5) | value.day();
        Self {
            time: time as u16,
            date: date as u16,
        }
    }

    /// Pack a timestamp as seen in the local time zone.
    pub fn from_local<Tz: TimeZone>(value: &DateTime<Tz>) -> Self {
        Self::from_naive(&value.with_timezone(&Local).naive_local())
    }

    /// Pack a file system timestamp (e.g. a last-write time) in local time.
    pub fn from_system_time(value: SystemTime) -> Self {
        Self::from_local(&DateTime::<Local>::from(value))
    }

    pub fn now() -> Self {
        Self::from_local(&Local::now())
    }
}
