use std::collections::HashSet;
use std::sync::Arc;

use chrono::Timelike;
use serde::Serialize;

use crate::models::slot::same_barber;
use crate::models::{ShopRules, SlotDate, SlotRow, SlotTime};
use crate::services::clock::Clock;
use crate::store::SlotSheet;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimeOption {
    pub time: SlotTime,
    pub barber: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimesResult {
    Open(Vec<TimeOption>),
    /// The requested day is one of the shop's closed weekdays.
    Closed { message: String },
}

/// Read-only availability queries. Never fails: when the slot sheet cannot
/// be read or holds no usable rows, answers come from the fixed schedule.
#[derive(Clone)]
pub struct AvailabilityEngine {
    slots: SlotSheet,
    rules: Arc<ShopRules>,
    clock: Arc<dyn Clock>,
}

impl AvailabilityEngine {
    pub fn new(slots: SlotSheet, rules: Arc<ShopRules>, clock: Arc<dyn Clock>) -> Self {
        Self {
            slots,
            rules,
            clock,
        }
    }

    /// `None` means fall back to the synthetic schedule.
    async fn usable_rows(&self) -> Option<Vec<SlotRow>> {
        match self.slots.load_slots().await {
            Ok(snapshot) if snapshot.rows.is_empty() => {
                tracing::warn!("slot sheet has no usable rows, using fallback schedule");
                None
            }
            Ok(snapshot) => Some(snapshot.rows),
            Err(e) => {
                tracing::warn!(error = %e, "slot sheet unavailable, using fallback schedule");
                None
            }
        }
    }

    pub async fn list_barbers(&self) -> Vec<String> {
        let Some(rows) = self.usable_rows().await else {
            return vec![self.rules.fallback_barber.clone()];
        };

        let mut seen = HashSet::new();
        rows.into_iter()
            .filter(|row| row.is_available)
            .filter(|row| seen.insert(row.barber.to_lowercase()))
            .map(|row| row.barber)
            .collect()
    }

    pub async fn list_dates(&self, barber: Option<&str>) -> Vec<SlotDate> {
        let today = self.rules.today(self.clock.now());

        let Some(rows) = self.usable_rows().await else {
            return self.fallback_dates(today);
        };

        let mut dates: Vec<SlotDate> = rows
            .iter()
            .filter(|row| row.is_available && barber_matches(row, barber))
            .map(|row| row.date)
            .filter(|date| self.offerable(*date, today))
            .collect();
        dates.sort();
        dates.dedup();
        dates
    }

    pub async fn list_times(&self, date: SlotDate, barber: Option<&str>) -> TimesResult {
        if self.rules.is_closed(date) {
            return TimesResult::Closed {
                message: self.rules.closed_day_message.clone(),
            };
        }

        let today = self.rules.today(self.clock.now());
        if !self.offerable(date, today) {
            return TimesResult::Open(Vec::new());
        }

        let candidates: Vec<TimeOption> = match self.usable_rows().await {
            Some(rows) => rows
                .into_iter()
                .filter(|row| row.date == date && row.is_available && barber_matches(row, barber))
                .map(|row| TimeOption {
                    time: row.time,
                    barber: row.barber,
                })
                .collect(),
            None => {
                let barber = barber.unwrap_or(self.rules.fallback_barber.as_str()).to_string();
                self.rules
                    .hourly_marks()
                    .into_iter()
                    .map(|time| TimeOption {
                        time,
                        barber: barber.clone(),
                    })
                    .collect()
            }
        };

        TimesResult::Open(self.bookable_times(date, today, candidates))
    }

    /// Open weekday, not in the past, inside the look-ahead horizon.
    fn offerable(&self, date: SlotDate, today: SlotDate) -> bool {
        !self.rules.is_closed(date) && self.rules.within_horizon(date, today)
    }

    fn fallback_dates(&self, today: SlotDate) -> Vec<SlotDate> {
        today
            .date()
            .iter_days()
            .take(self.rules.lookahead_days as usize)
            .map(SlotDate::new)
            .filter(|date| !self.rules.is_closed(*date))
            .collect()
    }

    /// Sorts, dedupes, and applies business hours plus the same-day lead time.
    fn bookable_times(
        &self,
        date: SlotDate,
        today: SlotDate,
        mut candidates: Vec<TimeOption>,
    ) -> Vec<TimeOption> {
        let earliest = if date == today {
            let now = self.rules.local_time(self.clock.now());
            // A partial minute counts as a whole one.
            let started = u32::from(now.second() > 0 || now.nanosecond() > 0);
            Some(now.hour() * 60 + now.minute() + started + self.rules.lead_time_minutes)
        } else {
            None
        };

        candidates.sort_by_key(|option| option.time);

        let mut seen = HashSet::new();
        candidates
            .into_iter()
            .filter(|option| self.rules.within_hours(option.time))
            .filter(|option| earliest.map_or(true, |min| option.time.minutes() >= min))
            .filter(|option| seen.insert((option.time, option.barber.to_lowercase())))
            .collect()
    }
}

fn barber_matches(row: &SlotRow, barber: Option<&str>) -> bool {
    barber.map_or(true, |b| same_barber(&row.barber, b))
}
