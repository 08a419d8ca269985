use std::fmt;

use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Serialize, Serializer};

/// Calendar day of a slot. The sheet stores it as `M/D/YYYY`, which is also
/// the wire format; everything else works on the parsed value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SlotDate(NaiveDate);

impl SlotDate {
    pub fn new(date: NaiveDate) -> Self {
        Self(date)
    }

    /// Accepts `M/D/YYYY` (the sheet's locale format) and ISO `YYYY-MM-DD`.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        let parts: Vec<&str> = s.split('/').map(str::trim).collect();
        if parts.len() == 3 {
            let month: u32 = parts[0].parse().ok()?;
            let day: u32 = parts[1].parse().ok()?;
            let year: i32 = parts[2].parse().ok()?;
            if parts[2].len() != 4 {
                return None;
            }
            return NaiveDate::from_ymd_opt(year, month, day).map(Self);
        }
        NaiveDate::parse_from_str(s, "%Y-%m-%d").ok().map(Self)
    }

    pub fn date(&self) -> NaiveDate {
        self.0
    }

    pub fn weekday(&self) -> Weekday {
        self.0.weekday()
    }
}

impl fmt::Display for SlotDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.0.month(), self.0.day(), self.0.year())
    }
}

impl Serialize for SlotDate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Wall-clock start of a slot, held as minutes since midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SlotTime(u16);

impl SlotTime {
    pub fn from_hm(hour: u32, minute: u32) -> Option<Self> {
        if hour > 23 || minute > 59 {
            return None;
        }
        Some(Self((hour * 60 + minute) as u16))
    }

    /// Parses `10:00 AM`, `10:00am`, `10 AM`, or 24-hour `14:30`.
    pub fn parse(s: &str) -> Option<Self> {
        let upper = s.trim().to_uppercase();
        let (clock, period) = if let Some(rest) = upper.strip_suffix("AM") {
            (rest.trim_end(), Some(false))
        } else if let Some(rest) = upper.strip_suffix("PM") {
            (rest.trim_end(), Some(true))
        } else {
            (upper.as_str(), None)
        };

        let (hour, minute) = match clock.split_once(':') {
            Some((h, m)) => (h.trim().parse::<u32>().ok()?, m.trim().parse::<u32>().ok()?),
            None => (clock.trim().parse::<u32>().ok()?, 0),
        };

        let hour = match period {
            Some(pm) => {
                if !(1..=12).contains(&hour) {
                    return None;
                }
                match (hour, pm) {
                    (12, false) => 0,
                    (12, true) => 12,
                    (h, true) => h + 12,
                    (h, false) => h,
                }
            }
            None => hour,
        };

        Self::from_hm(hour, minute)
    }

    pub fn minutes(&self) -> u32 {
        u32::from(self.0)
    }

    pub fn hour(&self) -> u32 {
        self.minutes() / 60
    }

    pub fn minute(&self) -> u32 {
        self.minutes() % 60
    }
}

impl fmt::Display for SlotTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (hour, period) = match self.hour() {
            0 => (12, "AM"),
            h @ 1..=11 => (h, "AM"),
            12 => (12, "PM"),
            h => (h - 12, "PM"),
        };
        write!(f, "{hour}:{:02} {period}", self.minute())
    }
}

impl Serialize for SlotTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Status tokens staff type into the sheet that mean the slot is open.
const AVAILABLE_TOKENS: [&str; 6] = ["available", "yes", "true", "1", "y", "open"];

pub fn is_available_token(status: &str) -> bool {
    let status = status.trim().to_lowercase();
    AVAILABLE_TOKENS.contains(&status.as_str())
}

/// Barber names are compared trimmed and case-insensitively everywhere.
pub fn same_barber(a: &str, b: &str) -> bool {
    a.trim().to_lowercase() == b.trim().to_lowercase()
}

#[derive(Debug, Clone, PartialEq)]
pub struct SlotRow {
    /// Absolute 1-based row number in the sheet (header is row 1).
    pub row_index: usize,
    pub date: SlotDate,
    pub time: SlotTime,
    pub barber: String,
    pub is_available: bool,
}

impl SlotRow {
    pub fn key(&self) -> SlotKey {
        SlotKey::new(self.date, self.time, &self.barber)
    }
}

/// Natural key of a slot; the sheet does not enforce uniqueness on it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SlotKey {
    pub date: SlotDate,
    pub time: SlotTime,
    barber: String,
}

impl SlotKey {
    pub fn new(date: SlotDate, time: SlotTime, barber: &str) -> Self {
        Self {
            date,
            time,
            barber: barber.trim().to_lowercase(),
        }
    }
}

impl fmt::Display for SlotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.date, self.time, self.barber)
    }
}
