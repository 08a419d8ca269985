use anyhow::Context;
use chrono::{DateTime, Duration, NaiveDateTime, Utc, Weekday};
use chrono_tz::Tz;

use crate::config::AppConfig;
use crate::models::slot::{SlotDate, SlotTime};

const MAX_LOOKAHEAD_DAYS: u32 = 366;
const MAX_LEAD_TIME_MINUTES: u32 = 24 * 60;

/// Fixed business rules the availability engine filters with.
#[derive(Debug, Clone)]
pub struct ShopRules {
    pub time_zone: Tz,
    /// First bookable hour, inclusive.
    pub open_hour: u32,
    /// Hour of the last on-the-hour slot, inclusive.
    pub close_hour: u32,
    pub closed_days: Vec<Weekday>,
    pub lookahead_days: u32,
    pub lead_time_minutes: u32,
    pub fallback_barber: String,
    pub closed_day_message: String,
}

impl ShopRules {
    pub fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        let time_zone: Tz = config
            .shop_timezone
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid SHOP_TIMEZONE {}: {e}", config.shop_timezone))?;
        let closed_days =
            parse_weekdays(&config.closed_weekdays).context("invalid CLOSED_WEEKDAYS")?;

        if config.open_hour >= config.close_hour || config.close_hour > 23 {
            anyhow::bail!(
                "invalid business hours: open {} close {}",
                config.open_hour,
                config.close_hour
            );
        }

        if !(1..=MAX_LOOKAHEAD_DAYS).contains(&config.lookahead_days) {
            anyhow::bail!(
                "invalid LOOKAHEAD_DAYS {}: must be between 1 and {MAX_LOOKAHEAD_DAYS}",
                config.lookahead_days
            );
        }
        if config.lead_time_minutes > MAX_LEAD_TIME_MINUTES {
            anyhow::bail!(
                "invalid LEAD_TIME_MINUTES {}: must be at most {MAX_LEAD_TIME_MINUTES}",
                config.lead_time_minutes
            );
        }

        let mut rules = Self {
            time_zone,
            open_hour: config.open_hour,
            close_hour: config.close_hour,
            closed_days,
            lookahead_days: config.lookahead_days,
            lead_time_minutes: config.lead_time_minutes,
            fallback_barber: config.fallback_barber.clone(),
            closed_day_message: String::new(),
        };
        rules.closed_day_message = rules.default_closed_message(&config.shop_phone);
        Ok(rules)
    }

    /// Shop wall-clock time for a UTC instant.
    pub fn local_time(&self, now: DateTime<Utc>) -> NaiveDateTime {
        now.with_timezone(&self.time_zone).naive_local()
    }

    pub fn today(&self, now: DateTime<Utc>) -> SlotDate {
        SlotDate::new(self.local_time(now).date())
    }

    /// `today <= date < today + lookahead_days`.
    pub fn within_horizon(&self, date: SlotDate, today: SlotDate) -> bool {
        let span = Duration::days(i64::from(self.lookahead_days));
        match today.date().checked_add_signed(span) {
            Some(end) => date >= today && date.date() < end,
            None => date >= today,
        }
    }

    pub fn is_closed(&self, date: SlotDate) -> bool {
        self.closed_days.contains(&date.weekday())
    }

    pub fn within_hours(&self, time: SlotTime) -> bool {
        let minutes = time.minutes();
        minutes >= self.open_hour * 60 && minutes <= self.close_hour * 60
    }

    /// On-the-hour marks from opening through the last slot.
    pub fn hourly_marks(&self) -> Vec<SlotTime> {
        (self.open_hour..=self.close_hour)
            .filter_map(|h| SlotTime::from_hm(h, 0))
            .collect()
    }

    pub fn closed_days_human(&self) -> String {
        let mut days = self.closed_days.clone();
        days.sort_by_key(|d| d.num_days_from_sunday());
        let names: Vec<String> = days.iter().map(|d| format!("{}s", weekday_name(*d))).collect();
        match names.as_slice() {
            [] => String::new(),
            [one] => one.clone(),
            [init @ .., last] => format!("{} and {last}", init.join(", ")),
        }
    }

    fn default_closed_message(&self, phone: &str) -> String {
        let days = self.closed_days_human();
        if phone.is_empty() {
            format!("We're closed on {days}. Please pick another day.")
        } else {
            format!("We're closed on {days}. Please call us at {phone} for special arrangements.")
        }
    }
}

fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

fn parse_weekday(s: &str) -> anyhow::Result<Weekday> {
    match s.trim().to_lowercase().as_str() {
        "mon" => Ok(Weekday::Mon),
        "tue" => Ok(Weekday::Tue),
        "wed" => Ok(Weekday::Wed),
        "thu" => Ok(Weekday::Thu),
        "fri" => Ok(Weekday::Fri),
        "sat" => Ok(Weekday::Sat),
        "sun" => Ok(Weekday::Sun),
        _ => Err(anyhow::anyhow!("invalid weekday: {s}")),
    }
}

pub fn parse_weekdays(list: &str) -> anyhow::Result<Vec<Weekday>> {
    let mut days = Vec::new();
    for token in list.split(',').filter(|t| !t.trim().is_empty()) {
        let day = parse_weekday(token)?;
        if !days.contains(&day) {
            days.push(day);
        }
    }
    Ok(days)
}

#[cfg(test)]
pub(crate) fn test_rules() -> ShopRules {
    ShopRules {
        time_zone: chrono_tz::America::Los_Angeles,
        open_hour: 10,
        close_hour: 19,
        closed_days: vec![Weekday::Sun, Weekday::Wed],
        lookahead_days: 90,
        lead_time_minutes: 120,
        fallback_barber: "Michael".to_string(),
        closed_day_message: "We're closed on Sundays and Wednesdays.".to_string(),
    }
}
