use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use rusqlite::Connection;

use super::SheetStore;
use crate::db::{self, queries};

/// Sheet grid kept in SQLite, for single-node deployments and tests.
#[derive(Clone)]
pub struct SqliteSheetStore {
    db: Arc<Mutex<Connection>>,
}

impl SqliteSheetStore {
    pub fn new(db: Arc<Mutex<Connection>>) -> Self {
        Self { db }
    }

    pub fn open(path: &str) -> anyhow::Result<Self> {
        let conn = db::init_db(path)?;
        Ok(Self::new(Arc::new(Mutex::new(conn))))
    }

    fn conn(&self) -> anyhow::Result<MutexGuard<'_, Connection>> {
        self.db
            .lock()
            .map_err(|_| anyhow::anyhow!("sheet database lock poisoned"))
    }

    /// Replaces the whole sheet; used to seed slots from a CSV-like grid.
    pub fn replace_sheet(&self, sheet: &str, rows: &[Vec<String>]) -> anyhow::Result<()> {
        let conn = self.conn()?;
        conn.execute("DELETE FROM sheet_cells WHERE sheet = ?1", [sheet])?;
        for row in rows {
            queries::append_row(&conn, sheet, row)?;
        }
        Ok(())
    }
}

#[async_trait]
impl SheetStore for SqliteSheetStore {
    async fn read_rows(&self, sheet: &str) -> anyhow::Result<Vec<Vec<String>>> {
        let conn = self.conn()?;
        queries::read_sheet(&conn, sheet)
    }

    async fn write_cell(
        &self,
        sheet: &str,
        row: usize,
        col: usize,
        value: &str,
    ) -> anyhow::Result<()> {
        let conn = self.conn()?;
        queries::write_cell(&conn, sheet, row, col, value)
    }

    async fn append_row(&self, sheet: &str, values: &[String]) -> anyhow::Result<()> {
        let conn = self.conn()?;
        queries::append_row(&conn, sheet, values)?;
        Ok(())
    }
}
