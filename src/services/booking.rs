use std::sync::Arc;

use tracing::Instrument;
use uuid::Uuid;

use crate::models::{Booking, BookingConfirmation, BookingRequest, ShopRules, SlotDate, SlotRow, SlotTime};
use crate::services::clock::Clock;
use crate::services::lock::SlotLock;
use crate::services::notify::Notifier;
use crate::store::{SlotSheet, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum BookingError {
    #[error("{reason}")]
    Validation { field: &'static str, reason: String },

    #[error("This time slot is no longer available. Please select another time.")]
    SlotUnavailable { slot: String },

    #[error("We couldn't reach the booking schedule right now. Please try again in a few minutes.")]
    StoreUnreachable(#[source] StoreError),
}

impl BookingError {
    fn missing(field: &'static str) -> Self {
        BookingError::Validation {
            field,
            reason: format!("Missing required booking information: {field}"),
        }
    }

    fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        BookingError::Validation {
            field,
            reason: reason.into(),
        }
    }
}

/// Decides whether a booking request gets its slot: validate, re-read the
/// sheet under a per-slot lock, flip the first matching available row to
/// `Booked`, then log and notify on a best-effort basis.
pub struct BookingReconciler {
    slots: SlotSheet,
    rules: Arc<ShopRules>,
    clock: Arc<dyn Clock>,
    lock: Arc<dyn SlotLock>,
    notifier: Arc<Notifier>,
}

impl BookingReconciler {
    pub fn new(
        slots: SlotSheet,
        rules: Arc<ShopRules>,
        clock: Arc<dyn Clock>,
        lock: Arc<dyn SlotLock>,
        notifier: Arc<Notifier>,
    ) -> Self {
        Self {
            slots,
            rules,
            clock,
            lock,
            notifier,
        }
    }

    pub async fn submit(&self, request: BookingRequest) -> Result<BookingConfirmation, BookingError> {
        let attempt_id = Uuid::new_v4().to_string();
        let span = tracing::info_span!("booking", attempt = %attempt_id);
        self.process(request, &attempt_id).instrument(span).await
    }

    async fn process(
        &self,
        request: BookingRequest,
        attempt_id: &str,
    ) -> Result<BookingConfirmation, BookingError> {
        let booking = self.validate(request).inspect_err(|e| {
            tracing::info!(error = %e, "booking rejected during validation");
        })?;

        tracing::info!(
            date = %booking.date,
            time = %booking.time,
            barber = %booking.barber,
            "processing booking"
        );

        let row = self.reserve(&booking).await?;
        tracing::info!(row = row.row_index, "slot reserved");

        let at = self.clock.now();
        let sheet_updated = match self.slots.append_booking_record(&booking, at).await {
            Ok(()) => true,
            Err(e) => {
                // The reservation stands; the log entry is best-effort.
                tracing::error!(error = %e, "failed to append booking record");
                false
            }
        };

        let report = self.notifier.notify(&booking, attempt_id, at).await;

        Ok(BookingConfirmation {
            email_sent: report.emailed,
            sheet_updated,
            calendar_updated: report.calendar_inserted,
        })
    }

    /// Checks required fields and formats, and rejects dates already past in
    /// the shop's time zone. Touches no store.
    pub fn validate(&self, request: BookingRequest) -> Result<Booking, BookingError> {
        let required = [
            ("name", &request.name),
            ("barber", &request.barber),
            ("service", &request.service),
            ("date", &request.date),
            ("time", &request.time),
        ];
        if let Some((field, _)) = required.iter().find(|(_, v)| v.trim().is_empty()) {
            return Err(BookingError::missing(*field));
        }

        let date = SlotDate::parse(&request.date)
            .ok_or_else(|| BookingError::invalid("date", format!("Invalid date: {}", request.date)))?;
        let time = SlotTime::parse(&request.time)
            .ok_or_else(|| BookingError::invalid("time", format!("Invalid time: {}", request.time)))?;

        let email = non_blank(request.email);
        if let Some(addr) = &email {
            if !looks_like_email(addr) {
                return Err(BookingError::invalid(
                    "email",
                    format!("Invalid email address: {addr}"),
                ));
            }
        }

        let today = self.rules.today(self.clock.now());
        if date < today {
            return Err(BookingError::invalid(
                "date",
                "That date has already passed. Please choose another day.",
            ));
        }

        Ok(Booking {
            name: request.name.trim().to_string(),
            email,
            phone: non_blank(request.phone),
            barber: request.barber.trim().to_string(),
            service: request.service.trim().to_string(),
            date,
            time,
        })
    }

    async fn reserve(&self, booking: &Booking) -> Result<SlotRow, BookingError> {
        let key = booking.slot_key();
        let _lease = self.lock.acquire(&key).await.map_err(|e| {
            BookingError::StoreUnreachable(StoreError::Unreachable(format!("slot lock: {e:#}")))
        })?;

        // Always a fresh read: staff edit the sheet and other requests may
        // have booked since any earlier snapshot.
        let snapshot = self.slots.load_slots().await.map_err(|e| {
            tracing::error!(error = %e, "failed to load slots for reservation");
            BookingError::StoreUnreachable(e)
        })?;

        let Some(row) = snapshot
            .rows
            .into_iter()
            .find(|row| row.is_available && row.key() == key)
        else {
            tracing::info!(slot = %key, "no available slot matches booking");
            return Err(BookingError::SlotUnavailable {
                slot: key.to_string(),
            });
        };

        self.slots
            .mark_booked(&snapshot.layout, row.row_index)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, row = row.row_index, "failed to mark slot booked");
                BookingError::StoreUnreachable(e)
            })?;

        Ok(row)
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn looks_like_email(addr: &str) -> bool {
    match addr.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && domain.contains('.')
                && !addr.contains(char::is_whitespace)
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use chrono::{DateTime, Utc};

    use super::*;
    use crate::models::availability::test_rules;
    use crate::models::ServiceCatalog;
    use crate::services::clock::FixedClock;
    use crate::services::lock::{InMemorySlotLock, NoopSlotLock};
    use crate::services::notify::testing::{shop, RecordingCalendar, RecordingMailer};
    use crate::store::{SheetStore, SqliteSheetStore};

    /// Wraps the SQLite grid with read latency and injectable failures.
    struct FlakyStore {
        inner: SqliteSheetStore,
        read_delay: Duration,
        fail_reads: bool,
        fail_appends: bool,
        reads: AtomicUsize,
    }

    impl FlakyStore {
        fn new(inner: SqliteSheetStore) -> Self {
            Self {
                inner,
                read_delay: Duration::ZERO,
                fail_reads: false,
                fail_appends: false,
                reads: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl SheetStore for FlakyStore {
        async fn read_rows(&self, sheet: &str) -> anyhow::Result<Vec<Vec<String>>> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            if self.fail_reads {
                anyhow::bail!("invalid credentials");
            }
            let rows = self.inner.read_rows(sheet).await?;
            tokio::time::sleep(self.read_delay).await;
            Ok(rows)
        }

        async fn write_cell(&self, sheet: &str, row: usize, col: usize, value: &str) -> anyhow::Result<()> {
            self.inner.write_cell(sheet, row, col, value).await
        }

        async fn append_row(&self, sheet: &str, values: &[String]) -> anyhow::Result<()> {
            if self.fail_appends {
                anyhow::bail!("append quota exceeded");
            }
            self.inner.append_row(sheet, values).await
        }
    }

    fn row(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    fn seeded() -> SqliteSheetStore {
        let store = SqliteSheetStore::open(":memory:").unwrap();
        store
            .replace_sheet(
                "Available_Times",
                &[
                    row(&["Date", "Time", "Barber", "Status"]),
                    row(&["3/10/2025", "10:00 AM", "Mike", "Booked"]),
                    row(&["3/10/2025", "10:00 AM", "Mike", "Available"]),
                    row(&["3/10/2025", "10:00 AM", "Mike", "Available"]),
                    row(&["3/10/2025", "11:00 AM", "Sam", "Available"]),
                ],
            )
            .unwrap();
        store
    }

    /// Monday 3/3/2025, 5:00 PM in Los Angeles.
    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2025-03-04T01:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn reconciler(store: Arc<dyn SheetStore>, lock: Arc<dyn SlotLock>) -> BookingReconciler {
        let notifier = Notifier::new(
            Some(Arc::new(RecordingCalendar::default())),
            Some(Arc::new(RecordingMailer::default())),
            ServiceCatalog::default(),
            shop(),
            Duration::from_secs(5),
        )
        .unwrap();
        BookingReconciler::new(
            SlotSheet::new(store, "Available_Times", "Form Responses", Duration::from_secs(5)),
            Arc::new(test_rules()),
            Arc::new(FixedClock(now())),
            lock,
            Arc::new(notifier),
        )
    }

    fn request() -> BookingRequest {
        BookingRequest {
            name: "Alice".to_string(),
            email: Some("alice@example.com".to_string()),
            phone: Some("5034008151".to_string()),
            barber: "mike".to_string(),
            service: "Haircut".to_string(),
            date: "3/10/2025".to_string(),
            time: "10:00  am".to_string(),
        }
    }

    #[tokio::test]
    async fn test_accepts_first_available_match() {
        let store = seeded();
        let reconciler = reconciler(Arc::new(store.clone()), Arc::new(InMemorySlotLock::new()));

        let confirmation = reconciler.submit(request()).await.unwrap();
        assert!(confirmation.email_sent);
        assert!(confirmation.sheet_updated);
        assert!(confirmation.calendar_updated);

        let rows = store.read_rows("Available_Times").await.unwrap();
        assert_eq!(rows[2][3], "Booked");
        assert_eq!(rows[3][3], "Available");

        let log = store.read_rows("Form Responses").await.unwrap();
        assert_eq!(log.len(), 2);
        assert_eq!(log[1][1], "Alice");
    }

    #[tokio::test]
    async fn test_duplicate_rows_each_book_once() {
        let store = seeded();
        let reconciler = reconciler(Arc::new(store), Arc::new(InMemorySlotLock::new()));

        assert!(reconciler.submit(request()).await.is_ok());
        assert!(reconciler.submit(request()).await.is_ok());
        let third = reconciler.submit(request()).await.unwrap_err();
        assert!(matches!(third, BookingError::SlotUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_missing_name_rejected_before_store_io() {
        let store = Arc::new(FlakyStore::new(seeded()));
        let reconciler = reconciler(store.clone(), Arc::new(InMemorySlotLock::new()));

        let err = reconciler
            .submit(BookingRequest {
                name: "  ".to_string(),
                ..request()
            })
            .await
            .unwrap_err();

        assert!(matches!(err, BookingError::Validation { field: "name", .. }));
        assert_eq!(store.reads.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_past_date_rejected() {
        let reconciler = reconciler(Arc::new(seeded()), Arc::new(InMemorySlotLock::new()));
        let err = reconciler
            .submit(BookingRequest {
                date: "3/2/2025".to_string(),
                ..request()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, BookingError::Validation { field: "date", .. }));
    }

    #[tokio::test]
    async fn test_invalid_email_rejected() {
        let reconciler = reconciler(Arc::new(seeded()), Arc::new(InMemorySlotLock::new()));
        let err = reconciler
            .submit(BookingRequest {
                email: Some("alice at example".to_string()),
                ..request()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, BookingError::Validation { field: "email", .. }));
    }

    #[test]
    fn test_validate_normalizes_optional_fields() {
        let reconciler = reconciler(Arc::new(seeded()), Arc::new(NoopSlotLock));
        let booking = reconciler
            .validate(BookingRequest {
                email: Some(" ".to_string()),
                phone: Some(String::new()),
                ..request()
            })
            .unwrap();
        assert!(booking.email.is_none());
        assert!(booking.phone.is_none());
        assert_eq!(booking.time.to_string(), "10:00 AM");
    }

    #[tokio::test]
    async fn test_unknown_slot_is_unavailable() {
        let reconciler = reconciler(Arc::new(seeded()), Arc::new(InMemorySlotLock::new()));
        let err = reconciler
            .submit(BookingRequest {
                time: "3:00 PM".to_string(),
                ..request()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, BookingError::SlotUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_unreachable_store_is_not_swallowed() {
        let mut store = FlakyStore::new(seeded());
        store.fail_reads = true;
        let reconciler = reconciler(Arc::new(store), Arc::new(InMemorySlotLock::new()));

        let err = reconciler.submit(request()).await.unwrap_err();
        assert!(matches!(err, BookingError::StoreUnreachable(_)));
    }

    #[tokio::test]
    async fn test_store_timeout_surfaces_unreachable() {
        let mut store = FlakyStore::new(seeded());
        store.read_delay = Duration::from_secs(30);
        let sheet = SlotSheet::new(
            Arc::new(store),
            "Available_Times",
            "Form Responses",
            Duration::from_millis(20),
        );
        let reconciler = BookingReconciler::new(
            sheet,
            Arc::new(test_rules()),
            Arc::new(FixedClock(now())),
            Arc::new(InMemorySlotLock::new()),
            Arc::new(
                Notifier::new(None, None, ServiceCatalog::default(), shop(), Duration::from_secs(1))
                    .unwrap(),
            ),
        );

        let err = reconciler.submit(request()).await.unwrap_err();
        assert!(matches!(err, BookingError::StoreUnreachable(StoreError::Timeout(_))));
    }

    #[tokio::test]
    async fn test_log_failure_keeps_booking() {
        let inner = seeded();
        let mut store = FlakyStore::new(inner.clone());
        store.fail_appends = true;
        let reconciler = reconciler(Arc::new(store), Arc::new(InMemorySlotLock::new()));

        let confirmation = reconciler.submit(request()).await.unwrap();
        assert!(!confirmation.sheet_updated);
        assert!(confirmation.email_sent);

        let rows = inner.read_rows("Available_Times").await.unwrap();
        assert_eq!(rows[2][3], "Booked");
    }

    #[tokio::test]
    async fn test_concurrent_bookings_with_lock_accept_exactly_one() {
        let inner = SqliteSheetStore::open(":memory:").unwrap();
        inner
            .replace_sheet(
                "Available_Times",
                &[
                    row(&["Date", "Time", "Barber", "Status"]),
                    row(&["3/10/2025", "10:00 AM", "Mike", "Available"]),
                ],
            )
            .unwrap();
        let mut store = FlakyStore::new(inner);
        store.read_delay = Duration::from_millis(20);
        let reconciler = reconciler(Arc::new(store), Arc::new(InMemorySlotLock::new()));

        let (a, b) = tokio::join!(reconciler.submit(request()), reconciler.submit(request()));
        let accepted = [&a, &b].iter().filter(|r| r.is_ok()).count();
        assert_eq!(accepted, 1);
        let rejected = [a, b]
            .into_iter()
            .filter(|r| matches!(r, Err(BookingError::SlotUnavailable { .. })))
            .count();
        assert_eq!(rejected, 1);
    }

    #[tokio::test]
    async fn test_concurrent_bookings_without_lock_race() {
        let inner = SqliteSheetStore::open(":memory:").unwrap();
        inner
            .replace_sheet(
                "Available_Times",
                &[
                    row(&["Date", "Time", "Barber", "Status"]),
                    row(&["3/10/2025", "10:00 AM", "Mike", "Available"]),
                ],
            )
            .unwrap();
        let mut store = FlakyStore::new(inner);
        store.read_delay = Duration::from_millis(20);
        let reconciler = reconciler(Arc::new(store), Arc::new(NoopSlotLock));

        // Both read the slot as available before either writes it.
        let (a, b) = tokio::join!(reconciler.submit(request()), reconciler.submit(request()));
        assert!(a.is_ok() && b.is_ok());
    }

    #[test]
    fn test_looks_like_email() {
        assert!(looks_like_email("a@b.co"));
        assert!(!looks_like_email("a@b"));
        assert!(!looks_like_email("@b.co"));
        assert!(!looks_like_email("a b@c.co"));
    }
}
