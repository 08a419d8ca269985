use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};

use super::{bounded, SheetStore, StoreError};
use crate::models::slot::is_available_token;
use crate::models::{Booking, SlotDate, SlotRow, SlotTime};

/// Token written into the status column on reservation.
pub const BOOKED_STATUS: &str = "Booked";

const BOOKING_LOG_HEADER: [&str; 8] = [
    "Timestamp", "Name", "Email", "Phone", "Barber", "Service", "Date", "Time",
];

/// Where the four required slot columns sit in the sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnLayout {
    pub date: usize,
    pub time: usize,
    pub barber: usize,
    pub status: usize,
}

impl ColumnLayout {
    /// Maps a header row to column positions by case-insensitive substring.
    /// Fails rather than guessing when a column is missing or two roles land
    /// on the same column.
    pub fn resolve(header: &[String]) -> Result<Self, StoreError> {
        let headers: Vec<String> = header.iter().map(|h| h.trim().to_lowercase()).collect();

        let layout = Self {
            date: find_column(&headers, "date", |h| h.contains("date"))?,
            time: find_column(&headers, "time", |h| h.contains("time"))?,
            barber: find_column(&headers, "barber", |h| h.contains("barber"))?,
            status: find_column(&headers, "status", |h| {
                h == "status" || h.contains("avail") || h.contains("booked")
            })?,
        };

        let mut cols = [layout.date, layout.time, layout.barber, layout.status];
        cols.sort_unstable();
        if cols.windows(2).any(|w| w[0] == w[1]) {
            return Err(StoreError::Schema(format!(
                "ambiguous columns in {headers:?}"
            )));
        }

        Ok(layout)
    }

    fn widest(&self) -> usize {
        self.date.max(self.time).max(self.barber).max(self.status)
    }
}

fn find_column(
    headers: &[String],
    role: &str,
    pred: impl Fn(&str) -> bool,
) -> Result<usize, StoreError> {
    headers
        .iter()
        .position(|h| pred(h.as_str()))
        .ok_or_else(|| StoreError::Schema(format!("no {role} column in {headers:?}")))
}

/// One consistent read of the slot sheet.
#[derive(Debug, Clone)]
pub struct SlotSnapshot {
    pub layout: ColumnLayout,
    pub rows: Vec<SlotRow>,
}

/// Slot store adapter over a `SheetStore`: slot sheet reads, status
/// write-back, and the booking log.
#[derive(Clone)]
pub struct SlotSheet {
    store: Arc<dyn SheetStore>,
    slots_sheet: String,
    bookings_sheet: String,
    timeout: Duration,
    /// Serializes the empty-check and header write of the booking log.
    log_lock: Arc<tokio::sync::Mutex<()>>,
}

impl SlotSheet {
    pub fn new(
        store: Arc<dyn SheetStore>,
        slots_sheet: impl Into<String>,
        bookings_sheet: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            store,
            slots_sheet: slots_sheet.into(),
            bookings_sheet: bookings_sheet.into(),
            timeout,
            log_lock: Arc::default(),
        }
    }

    pub async fn load_slots(&self) -> Result<SlotSnapshot, StoreError> {
        let grid = bounded(self.timeout, self.store.read_rows(&self.slots_sheet)).await?;
        let (header, body) = grid
            .split_first()
            .ok_or_else(|| StoreError::Schema("slot sheet is empty".to_string()))?;
        let layout = ColumnLayout::resolve(header)?;

        let mut rows = Vec::with_capacity(body.len());
        let mut skipped = 0usize;
        for (offset, cells) in body.iter().enumerate() {
            match parse_row(&layout, offset + 2, cells) {
                Some(row) => rows.push(row),
                None => skipped += 1,
            }
        }

        tracing::debug!(
            sheet = %self.slots_sheet,
            rows = rows.len(),
            skipped,
            "loaded slot sheet"
        );
        Ok(SlotSnapshot { layout, rows })
    }

    /// Writes `Booked` into the status cell of `row_index`. No precondition
    /// on the prior value; callers serialize through a slot lock.
    pub async fn mark_booked(&self, layout: &ColumnLayout, row_index: usize) -> Result<(), StoreError> {
        bounded(
            self.timeout,
            self.store
                .write_cell(&self.slots_sheet, row_index, layout.status, BOOKED_STATUS),
        )
        .await
    }

    pub async fn append_booking_record(
        &self,
        booking: &Booking,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let _log = self.log_lock.lock().await;
        let existing = bounded(self.timeout, self.store.read_rows(&self.bookings_sheet)).await?;
        if existing.iter().all(|row| row.iter().all(|c| c.trim().is_empty())) {
            let header: Vec<String> = BOOKING_LOG_HEADER.iter().map(|h| h.to_string()).collect();
            bounded(self.timeout, self.store.append_row(&self.bookings_sheet, &header)).await?;
        }

        let record = vec![
            at.to_rfc3339_opts(SecondsFormat::Millis, true),
            booking.name.clone(),
            booking.email.clone().unwrap_or_default(),
            booking.phone.clone().unwrap_or_default(),
            booking.barber.clone(),
            booking.service.clone(),
            booking.date.to_string(),
            booking.time.to_string(),
        ];
        bounded(self.timeout, self.store.append_row(&self.bookings_sheet, &record)).await
    }
}

/// `None` for malformed rows: too short, unparseable date or time, or no barber.
fn parse_row(layout: &ColumnLayout, row_index: usize, cells: &[String]) -> Option<SlotRow> {
    if cells.len() <= layout.widest() {
        return None;
    }
    let barber = cells[layout.barber].trim();
    if barber.is_empty() {
        return None;
    }
    Some(SlotRow {
        row_index,
        date: SlotDate::parse(&cells[layout.date])?,
        time: SlotTime::parse(&cells[layout.time])?,
        barber: barber.to_string(),
        is_available: is_available_token(&cells[layout.status]),
    })
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::store::SqliteSheetStore;

    /// Delays every read so concurrent callers overlap.
    struct SlowReads(SqliteSheetStore);

    #[async_trait]
    impl SheetStore for SlowReads {
        async fn read_rows(&self, sheet: &str) -> anyhow::Result<Vec<Vec<String>>> {
            let rows = self.0.read_rows(sheet).await?;
            tokio::time::sleep(Duration::from_millis(20)).await;
            Ok(rows)
        }

        async fn write_cell(&self, sheet: &str, row: usize, col: usize, value: &str) -> anyhow::Result<()> {
            self.0.write_cell(sheet, row, col, value).await
        }

        async fn append_row(&self, sheet: &str, values: &[String]) -> anyhow::Result<()> {
            self.0.append_row(sheet, values).await
        }
    }

    fn row(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    fn sheet_with(rows: &[Vec<String>]) -> (SqliteSheetStore, SlotSheet) {
        let store = SqliteSheetStore::open(":memory:").unwrap();
        store.replace_sheet("Available_Times", rows).unwrap();
        let sheet = SlotSheet::new(
            Arc::new(store.clone()),
            "Available_Times",
            "Form Responses",
            Duration::from_secs(5),
        );
        (store, sheet)
    }

    fn booking() -> Booking {
        Booking {
            name: "Alice".to_string(),
            email: Some("alice@example.com".to_string()),
            phone: None,
            barber: "Mike".to_string(),
            service: "Haircut".to_string(),
            date: SlotDate::parse("3/10/2025").unwrap(),
            time: SlotTime::parse("10:00 AM").unwrap(),
        }
    }

    #[test]
    fn test_resolve_columns_by_substring() {
        let layout = ColumnLayout::resolve(&row(&[
            "Notes",
            "Appointment Date",
            "Start Time",
            "Barber Name",
            "Availability",
        ]))
        .unwrap();
        assert_eq!(
            layout,
            ColumnLayout {
                date: 1,
                time: 2,
                barber: 3,
                status: 4
            }
        );
    }

    #[test]
    fn test_resolve_columns_exact_status() {
        let layout = ColumnLayout::resolve(&row(&["DATE", "TIME", "BARBER", "Status"])).unwrap();
        assert_eq!(layout.status, 3);
    }

    #[test]
    fn test_resolve_columns_fails_closed() {
        let err = ColumnLayout::resolve(&row(&["Date", "Time", "Stylist", "Status"])).unwrap_err();
        assert!(matches!(err, StoreError::Schema(_)));
        assert!(ColumnLayout::resolve(&row(&["Date", "Time", "Barber", "Notes"])).is_err());
    }

    #[test]
    fn test_resolve_columns_rejects_shared_column() {
        assert!(ColumnLayout::resolve(&row(&["Date Time", "Barber", "Status"])).is_err());
    }

    #[tokio::test]
    async fn test_load_slots_skips_malformed_rows() {
        let (_store, sheet) = sheet_with(&[
            row(&["Date", "Time", "Barber", "Status"]),
            row(&["3/10/2025", "10:00 AM", "Mike", "Available"]),
            row(&["3/10/2025", "11:00 AM", "Mike"]),
            row(&["someday", "11:00 AM", "Mike", "Available"]),
            row(&["3/10/2025", "12:00 PM", "Mike", "Booked"]),
        ]);

        let snapshot = sheet.load_slots().await.unwrap();
        assert_eq!(snapshot.rows.len(), 2);
        assert_eq!(snapshot.rows[0].row_index, 2);
        assert!(snapshot.rows[0].is_available);
        assert_eq!(snapshot.rows[1].row_index, 5);
        assert!(!snapshot.rows[1].is_available);
    }

    #[tokio::test]
    async fn test_load_slots_empty_sheet_is_schema_error() {
        let (_store, sheet) = sheet_with(&[]);
        assert!(matches!(
            sheet.load_slots().await.unwrap_err(),
            StoreError::Schema(_)
        ));
    }

    #[tokio::test]
    async fn test_mark_booked_writes_status_cell() {
        let (store, sheet) = sheet_with(&[
            row(&["Barber", "Date", "Time", "Status"]),
            row(&["Mike", "3/10/2025", "10:00 AM", "Available"]),
        ]);
        let snapshot = sheet.load_slots().await.unwrap();
        sheet.mark_booked(&snapshot.layout, 2).await.unwrap();

        let rows = store.read_rows("Available_Times").await.unwrap();
        assert_eq!(rows[1][3], "Booked");
    }

    #[tokio::test]
    async fn test_append_booking_record_writes_header_once() {
        let (store, sheet) = sheet_with(&[]);
        let at = DateTime::parse_from_rfc3339("2025-03-01T18:00:00Z")
            .unwrap()
            .with_timezone(&Utc);

        sheet.append_booking_record(&booking(), at).await.unwrap();
        sheet.append_booking_record(&booking(), at).await.unwrap();

        let rows = store.read_rows("Form Responses").await.unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0][0], "Timestamp");
        assert_eq!(
            rows[1],
            row(&[
                "2025-03-01T18:00:00.000Z",
                "Alice",
                "alice@example.com",
                "",
                "Mike",
                "Haircut",
                "3/10/2025",
                "10:00 AM"
            ])
        );
    }

    #[tokio::test]
    async fn test_concurrent_first_bookings_write_one_header() {
        let store = SqliteSheetStore::open(":memory:").unwrap();
        let sheet = SlotSheet::new(
            Arc::new(SlowReads(store.clone())),
            "Available_Times",
            "Form Responses",
            Duration::from_secs(5),
        );
        let at = DateTime::parse_from_rfc3339("2025-03-01T18:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let other = Booking {
            time: SlotTime::parse("11:00 AM").unwrap(),
            ..booking()
        };

        let first = booking();
        let (a, b) = tokio::join!(
            sheet.append_booking_record(&first, at),
            sheet.append_booking_record(&other, at)
        );
        a.unwrap();
        b.unwrap();

        let rows = store.read_rows("Form Responses").await.unwrap();
        assert_eq!(rows.len(), 3);
        let headers = rows.iter().filter(|r| r[0] == "Timestamp").count();
        assert_eq!(headers, 1);
    }
}
