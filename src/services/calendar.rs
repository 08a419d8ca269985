use std::sync::Arc;
use std::time::Duration as StdDuration;

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use reqwest::Url;
use serde_json::json;

use crate::models::{Booking, ServiceSpec};
use crate::services::google_auth::TokenSource;

/// Appointment as it lands on the shop calendar, in shop wall-clock time.
#[derive(Debug, Clone, PartialEq)]
pub struct CalendarEvent {
    pub uid: String,
    pub summary: String,
    pub description: String,
    pub location: String,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub time_zone: String,
    pub color_id: String,
}

impl CalendarEvent {
    pub fn for_booking(
        booking: &Booking,
        service: &ServiceSpec,
        location: &str,
        time_zone: &str,
        uid: String,
    ) -> Self {
        let start = booking
            .date
            .date()
            .and_hms_opt(booking.time.hour(), booking.time.minute(), 0)
            .unwrap_or_else(|| booking.date.date().and_time(chrono::NaiveTime::default()));
        let end = start + Duration::minutes(service.duration_minutes);

        let description = format!(
            "Appointment: {}\nClient: {}\nPhone: {}\nEmail: {}\nDuration: {} minutes\nBarber: {}",
            booking.service,
            booking.name,
            booking
                .formatted_phone()
                .unwrap_or_else(|| "No phone provided".to_string()),
            booking.email.as_deref().unwrap_or("None provided"),
            service.duration_minutes,
            booking.barber,
        );

        Self {
            uid,
            summary: format!("{} - {}", booking.service, booking.name),
            description,
            location: location.to_string(),
            start,
            end,
            time_zone: time_zone.to_string(),
            color_id: service.color_id.clone(),
        }
    }
}

fn escape_ics(text: &str) -> String {
    text.replace('\\', "\\\\")
        .replace(';', "\\;")
        .replace(',', "\\,")
        .replace('\n', "\\n")
}

pub fn generate_ics(event: &CalendarEvent, created_at: DateTime<Utc>) -> String {
    let dtstart = event.start.format("%Y%m%dT%H%M%S").to_string();
    let dtend = event.end.format("%Y%m%dT%H%M%S").to_string();
    let dtstamp = created_at.format("%Y%m%dT%H%M%SZ").to_string();
    let tz = &event.time_zone;
    let uid = &event.uid;
    let summary = escape_ics(&event.summary);
    let description = escape_ics(&event.description);
    let location = escape_ics(&event.location);

    format!(
        "BEGIN:VCALENDAR\r\n\
         VERSION:2.0\r\n\
         PRODID:-//Shopbook//Barber Booking//EN\r\n\
         BEGIN:VEVENT\r\n\
         UID:{uid}\r\n\
         DTSTAMP:{dtstamp}\r\n\
         DTSTART;TZID={tz}:{dtstart}\r\n\
         DTEND;TZID={tz}:{dtend}\r\n\
         SUMMARY:{summary}\r\n\
         DESCRIPTION:{description}\r\n\
         LOCATION:{location}\r\n\
         END:VEVENT\r\n\
         END:VCALENDAR\r\n"
    )
}

#[async_trait]
pub trait CalendarProvider: Send + Sync {
    async fn insert_event(&self, event: &CalendarEvent) -> anyhow::Result<()>;
}

pub struct GoogleCalendarProvider {
    client: reqwest::Client,
    events_url: Url,
    tokens: Arc<dyn TokenSource>,
}

impl GoogleCalendarProvider {
    pub fn new(
        calendar_id: &str,
        tokens: Arc<dyn TokenSource>,
        timeout: StdDuration,
    ) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build Calendar HTTP client")?;
        let mut events_url = Url::parse("https://www.googleapis.com/calendar/v3/calendars")
            .context("invalid Calendar API URL")?;
        events_url
            .path_segments_mut()
            .map_err(|_| anyhow::anyhow!("Calendar API URL cannot carry a path"))?
            .push(calendar_id)
            .push("events");
        Ok(Self {
            client,
            events_url,
            tokens,
        })
    }
}

#[async_trait]
impl CalendarProvider for GoogleCalendarProvider {
    async fn insert_event(&self, event: &CalendarEvent) -> anyhow::Result<()> {
        let body = json!({
            "summary": event.summary,
            "description": event.description,
            "location": event.location,
            "start": {
                "dateTime": event.start.format("%Y-%m-%dT%H:%M:%S").to_string(),
                "timeZone": event.time_zone,
            },
            "end": {
                "dateTime": event.end.format("%Y-%m-%dT%H:%M:%S").to_string(),
                "timeZone": event.time_zone,
            },
            "colorId": event.color_id,
            "reminders": {
                "useDefault": false,
                "overrides": [
                    { "method": "popup", "minutes": 60 },
                    { "method": "popup", "minutes": 15 },
                ],
            },
        });

        let token = self.tokens.bearer_token().await?;
        self.client
            .post(self.events_url.clone())
            .query(&[("sendUpdates", "none")])
            .bearer_auth(&token)
            .json(&body)
            .send()
            .await
            .context("failed to call Calendar API")?
            .error_for_status()
            .context("Calendar API returned error")?;

        Ok(())
    }
}
