use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::Url;
use serde::Deserialize;
use serde_json::json;

use super::SheetStore;
use crate::services::google_auth::TokenSource;

const SHEETS_API: &str = "https://sheets.googleapis.com/v4/spreadsheets/";

/// Google Sheets v4 `values` API client.
pub struct GoogleSheetsStore {
    client: reqwest::Client,
    base_url: Url,
    tokens: Arc<dyn TokenSource>,
}

#[derive(Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<serde_json::Value>>,
}

impl GoogleSheetsStore {
    pub fn new(
        spreadsheet_id: &str,
        tokens: Arc<dyn TokenSource>,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        Self::with_api_base(SHEETS_API, spreadsheet_id, tokens, timeout)
    }

    pub(crate) fn with_api_base(
        api_base: &str,
        spreadsheet_id: &str,
        tokens: Arc<dyn TokenSource>,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build Sheets HTTP client")?;
        let base_url = Url::parse(api_base)
            .and_then(|u| u.join(&format!("{spreadsheet_id}/")))
            .context("invalid spreadsheet id")?;
        Ok(Self {
            client,
            base_url,
            tokens,
        })
    }

    /// `.../values/{range}{suffix}` with the range percent-encoded as one segment.
    fn values_url(&self, range: &str, suffix: &str) -> anyhow::Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| anyhow::anyhow!("Sheets base URL cannot carry a path"))?
            .pop_if_empty()
            .push("values")
            .push(&format!("{range}{suffix}"));
        Ok(url)
    }
}

/// A1 sheet reference; quotes are doubled inside the quoted name.
fn sheet_ref(sheet: &str) -> String {
    format!("'{}'", sheet.replace('\'', "''"))
}

/// 0 → A, 25 → Z, 26 → AA.
pub fn column_letter(mut col: usize) -> String {
    let mut letters = Vec::new();
    loop {
        letters.push(b'A' + (col % 26) as u8);
        if col < 26 {
            break;
        }
        col = col / 26 - 1;
    }
    letters.reverse();
    String::from_utf8_lossy(&letters).into_owned()
}

fn cell_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[async_trait]
impl SheetStore for GoogleSheetsStore {
    async fn read_rows(&self, sheet: &str) -> anyhow::Result<Vec<Vec<String>>> {
        let url = self.values_url(&sheet_ref(sheet), "")?;
        let token = self.tokens.bearer_token().await?;
        let range: ValueRange = self
            .client
            .get(url)
            .bearer_auth(&token)
            .send()
            .await
            .context("failed to call Sheets API")?
            .error_for_status()
            .context("Sheets API returned error")?
            .json()
            .await
            .context("failed to parse Sheets response")?;

        Ok(range
            .values
            .iter()
            .map(|row| row.iter().map(cell_text).collect())
            .collect())
    }

    async fn write_cell(
        &self,
        sheet: &str,
        row: usize,
        col: usize,
        value: &str,
    ) -> anyhow::Result<()> {
        let range = format!("{}!{}{row}", sheet_ref(sheet), column_letter(col));
        let url = self.values_url(&range, "")?;
        let token = self.tokens.bearer_token().await?;

        self.client
            .put(url)
            .query(&[("valueInputOption", "RAW")])
            .bearer_auth(&token)
            .json(&json!({ "values": [[value]] }))
            .send()
            .await
            .context("failed to update Sheets cell")?
            .error_for_status()
            .context("Sheets API returned error")?;

        Ok(())
    }

    async fn append_row(&self, sheet: &str, values: &[String]) -> anyhow::Result<()> {
        let url = self.values_url(&sheet_ref(sheet), ":append")?;
        let token = self.tokens.bearer_token().await?;

        self.client
            .post(url)
            .query(&[
                // Customer-supplied text must never be evaluated as a formula.
                ("valueInputOption", "RAW"),
                ("insertDataOption", "INSERT_ROWS"),
            ])
            .bearer_auth(&token)
            .json(&json!({ "values": [values] }))
            .send()
            .await
            .context("failed to append Sheets row")?
            .error_for_status()
            .context("Sheets API returned error")?;

        Ok(())
    }
}
