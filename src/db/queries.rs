use rusqlite::{params, Connection};

// ── Sheet grid ──

/// Returns the sheet as a dense grid; index 0 is row 1. Rows with no cells
/// come back empty, the way the Sheets API reports them.
pub fn read_sheet(conn: &Connection, sheet: &str) -> anyhow::Result<Vec<Vec<String>>> {
    let mut stmt = conn.prepare(
        "SELECT row_num, col_num, value FROM sheet_cells WHERE sheet = ?1 ORDER BY row_num, col_num",
    )?;

    let cells = stmt
        .query_map([sheet], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let mut grid: Vec<Vec<String>> = Vec::new();
    for (row_num, col_num, value) in cells {
        if row_num < 1 || col_num < 0 {
            continue;
        }
        let (r, c) = (row_num as usize - 1, col_num as usize);
        if grid.len() <= r {
            grid.resize_with(r + 1, Vec::new);
        }
        let row = &mut grid[r];
        if row.len() <= c {
            row.resize(c + 1, String::new());
        }
        row[c] = value;
    }

    Ok(grid)
}

pub fn write_cell(
    conn: &Connection,
    sheet: &str,
    row_num: usize,
    col_num: usize,
    value: &str,
) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO sheet_cells (sheet, row_num, col_num, value) VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(sheet, row_num, col_num) DO UPDATE SET value = excluded.value",
        params![sheet, row_num as i64, col_num as i64, value],
    )?;
    Ok(())
}

/// Writes `values` into the row after the last occupied one and returns its
/// 1-based row number.
pub fn append_row(conn: &Connection, sheet: &str, values: &[String]) -> anyhow::Result<usize> {
    let tx = conn.unchecked_transaction()?;

    let last: Option<i64> = tx.query_row(
        "SELECT MAX(row_num) FROM sheet_cells WHERE sheet = ?1",
        [sheet],
        |row| row.get(0),
    )?;
    let row_num = last.unwrap_or(0) + 1;

    for (col, value) in values.iter().enumerate() {
        tx.execute(
            "INSERT INTO sheet_cells (sheet, row_num, col_num, value) VALUES (?1, ?2, ?3, ?4)",
            params![sheet, row_num, col as i64, value],
        )?;
    }

    tx.commit()?;
    Ok(row_num as usize)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    fn setup_db() -> Connection {
        db::init_db(":memory:").unwrap()
    }

    fn row(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_append_and_read() {
        let conn = setup_db();
        assert_eq!(append_row(&conn, "Slots", &row(&["Date", "Time"])).unwrap(), 1);
        assert_eq!(append_row(&conn, "Slots", &row(&["3/10/2025", "10:00 AM"])).unwrap(), 2);

        let grid = read_sheet(&conn, "Slots").unwrap();
        assert_eq!(grid, vec![row(&["Date", "Time"]), row(&["3/10/2025", "10:00 AM"])]);
    }

    #[test]
    fn test_sheets_are_isolated() {
        let conn = setup_db();
        append_row(&conn, "Slots", &row(&["a"])).unwrap();
        assert!(read_sheet(&conn, "Form Responses").unwrap().is_empty());
    }

    #[test]
    fn test_write_cell_overwrites_and_pads() {
        let conn = setup_db();
        append_row(&conn, "Slots", &row(&["Date"])).unwrap();
        write_cell(&conn, "Slots", 1, 3, "Status").unwrap();
        write_cell(&conn, "Slots", 3, 0, "x").unwrap();
        write_cell(&conn, "Slots", 3, 0, "y").unwrap();

        let grid = read_sheet(&conn, "Slots").unwrap();
        assert_eq!(grid[0], row(&["Date", "", "", "Status"]));
        assert!(grid[1].is_empty());
        assert_eq!(grid[2], row(&["y"]));
    }
}
