pub mod google;
pub mod slots;
pub mod sqlite;

use std::time::Duration;

use async_trait::async_trait;

pub use google::GoogleSheetsStore;
pub use slots::{ColumnLayout, SlotSheet, SlotSnapshot};
pub use sqlite::SqliteSheetStore;

/// Row-oriented access to a spreadsheet-like store. Rows are 1-based
/// (row 1 is the header), columns 0-based.
#[async_trait]
pub trait SheetStore: Send + Sync {
    async fn read_rows(&self, sheet: &str) -> anyhow::Result<Vec<Vec<String>>>;

    async fn write_cell(
        &self,
        sheet: &str,
        row: usize,
        col: usize,
        value: &str,
    ) -> anyhow::Result<()>;

    async fn append_row(&self, sheet: &str, values: &[String]) -> anyhow::Result<()>;
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("slot store unreachable: {0}")]
    Unreachable(String),

    #[error("slot sheet layout not recognized: {0}")]
    Schema(String),

    #[error("slot store timed out after {0:?}")]
    Timeout(Duration),
}

/// Runs a store call under `limit`, folding timeouts and transport errors
/// into `StoreError`.
pub(crate) async fn bounded<T, F>(limit: Duration, fut: F) -> Result<T, StoreError>
where
    F: std::future::Future<Output = anyhow::Result<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(StoreError::Unreachable(format!("{e:#}"))),
        Err(_) => Err(StoreError::Timeout(limit)),
    }
}
