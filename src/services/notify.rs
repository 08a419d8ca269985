use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use chrono::{DateTime, Utc};
use tera::{Context, Tera};

use crate::models::{Booking, ServiceCatalog};
use crate::services::calendar::{generate_ics, CalendarEvent, CalendarProvider};
use crate::services::mailer::{Email, EmailAttachment, Mailer};

const CONFIRMATION_TEMPLATE: &str = "booking_confirmation.html";
const SHOP_NOTICE_TEMPLATE: &str = "shop_notice.html";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NotificationReport {
    /// The customer confirmation went out.
    pub emailed: bool,
    pub calendar_inserted: bool,
}

/// Shop details the notifications are addressed from and to.
#[derive(Debug, Clone)]
pub struct ShopContact {
    pub name: String,
    /// Mailbox that receives a copy of every new booking; empty disables it.
    pub email: String,
    pub time_zone: String,
}

/// Best-effort calendar and email fan-out after a reservation. Every step
/// is caught on its own; nothing here reports failure to the caller.
pub struct Notifier {
    calendar: Option<Arc<dyn CalendarProvider>>,
    mailer: Option<Arc<dyn Mailer>>,
    catalog: ServiceCatalog,
    shop: ShopContact,
    templates: Tera,
    timeout: Duration,
}

impl Notifier {
    pub fn new(
        calendar: Option<Arc<dyn CalendarProvider>>,
        mailer: Option<Arc<dyn Mailer>>,
        catalog: ServiceCatalog,
        shop: ShopContact,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        Ok(Self {
            calendar,
            mailer,
            catalog,
            shop,
            templates: email_templates()?,
            timeout,
        })
    }

    pub async fn notify(&self, booking: &Booking, attempt_id: &str, at: DateTime<Utc>) -> NotificationReport {
        let service = self.catalog.resolve(&booking.service);
        let event = CalendarEvent::for_booking(
            booking,
            &service,
            &self.shop.name,
            &self.shop.time_zone,
            format!("{attempt_id}@shopbook"),
        );

        let (calendar_inserted, emailed) = tokio::join!(
            self.insert_event(&event),
            self.send_emails(booking, &event, at)
        );

        NotificationReport {
            emailed,
            calendar_inserted,
        }
    }

    async fn insert_event(&self, event: &CalendarEvent) -> bool {
        let Some(calendar) = &self.calendar else {
            tracing::info!("calendar not configured, skipping event insert");
            return false;
        };

        match tokio::time::timeout(self.timeout, calendar.insert_event(event)).await {
            Ok(Ok(())) => {
                tracing::info!(summary = %event.summary, "calendar event created");
                true
            }
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "failed to create calendar event");
                false
            }
            Err(_) => {
                tracing::warn!("calendar insert timed out");
                false
            }
        }
    }

    /// Customer confirmation and shop notice go out independently; the
    /// result reflects the customer confirmation only.
    async fn send_emails(&self, booking: &Booking, event: &CalendarEvent, at: DateTime<Utc>) -> bool {
        let Some(mailer) = &self.mailer else {
            tracing::info!("email not configured, skipping notifications");
            return false;
        };

        let customer = async {
            match booking.email.as_deref() {
                Some(to) => match self.confirmation_email(to, booking, event, at) {
                    Ok(email) => self.deliver(mailer.as_ref(), &email, "customer confirmation").await,
                    Err(e) => {
                        tracing::warn!(error = %e, "skipping customer confirmation");
                        false
                    }
                },
                None => {
                    tracing::info!("no customer email, skipping confirmation");
                    false
                }
            }
        };

        let shop = async {
            if self.shop.email.is_empty() {
                return false;
            }
            match self.shop_notice(booking) {
                Ok(email) => self.deliver(mailer.as_ref(), &email, "shop notification").await,
                Err(e) => {
                    tracing::warn!(error = %e, "skipping shop notification");
                    false
                }
            }
        };

        let (customer_sent, _) = tokio::join!(customer, shop);
        customer_sent
    }

    async fn deliver(&self, mailer: &dyn Mailer, email: &Email, kind: &str) -> bool {
        match tokio::time::timeout(self.timeout, mailer.send(email)).await {
            Ok(Ok(())) => {
                tracing::info!(kind, "email sent");
                true
            }
            Ok(Err(e)) => {
                tracing::warn!(kind, error = %e, "failed to send email");
                false
            }
            Err(_) => {
                tracing::warn!(kind, "email send timed out");
                false
            }
        }
    }

    fn confirmation_email(
        &self,
        to: &str,
        booking: &Booking,
        event: &CalendarEvent,
        at: DateTime<Utc>,
    ) -> anyhow::Result<Email> {
        let mut context = booking_context(booking);
        context.insert("shop", &self.shop.name);
        context.insert("shop_email", &self.shop.email);
        let html_body = self
            .templates
            .render(CONFIRMATION_TEMPLATE, &context)
            .context("failed to render confirmation email")?;

        Ok(Email {
            to: to.to_string(),
            subject: "Barber Appointment Confirmation".to_string(),
            html_body,
            attachment: Some(EmailAttachment {
                filename: "appointment.ics".to_string(),
                content_type: "text/calendar; charset=utf-8".to_string(),
                data: generate_ics(event, at).into_bytes(),
            }),
        })
    }

    fn shop_notice(&self, booking: &Booking) -> anyhow::Result<Email> {
        let mut context = booking_context(booking);
        if let Some(email) = &booking.email {
            context.insert("email", email);
        }
        if let Some(phone) = booking.formatted_phone() {
            context.insert("phone", &phone);
        }
        let html_body = self
            .templates
            .render(SHOP_NOTICE_TEMPLATE, &context)
            .context("failed to render shop notice")?;

        Ok(Email {
            to: self.shop.email.clone(),
            subject: format!("New Appointment: {} at {}", booking.date, booking.time),
            html_body,
            attachment: None,
        })
    }
}

/// Both notification templates; `.html` names keep tera's autoescape on.
fn email_templates() -> anyhow::Result<Tera> {
    let mut tera = Tera::default();
    tera.add_raw_templates(vec![
        (
            CONFIRMATION_TEMPLATE,
            include_str!("../../templates/booking_confirmation.html"),
        ),
        (
            SHOP_NOTICE_TEMPLATE,
            include_str!("../../templates/shop_notice.html"),
        ),
    ])
    .context("failed to parse email templates")?;
    Ok(tera)
}

fn booking_context(booking: &Booking) -> Context {
    let mut context = Context::new();
    context.insert("name", &booking.name);
    context.insert("date", &booking.date.to_string());
    context.insert("time", &booking.time.to_string());
    context.insert("barber", &booking.barber);
    context.insert("service", &booking.service);
    context
}
