pub mod auth;
pub mod error;

pub use auth::{ServiceAccountToken, StaticToken, TokenSource};
pub use error::{Result, SheetsError};

use std::time::Duration;

use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use crate::auth::with_fresh_token;

const BASE_URL: &str = "https://sheets.googleapis.com/v4/spreadsheets";

/// Grid size for newly created tabs.
const NEW_TAB_ROWS: u32 = 5000;
const NEW_TAB_COLUMNS: u32 = 20;

/// Quote a tab title for A1 notation and append a cell range:
/// `a1_range("Bay Area", "K2:K")` → `'Bay Area'!K2:K`.
pub fn a1_range(tab: &str, cells: &str) -> String {
    format!("'{}'!{}", tab.replace('\'', "''"), cells)
}

#[derive(Debug, Deserialize)]
struct SpreadsheetMeta {
    #[serde(default)]
    sheets: Vec<SheetMeta>,
}

#[derive(Debug, Deserialize)]
struct SheetMeta {
    properties: SheetProperties,
}

#[derive(Debug, Deserialize)]
struct SheetProperties {
    title: String,
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

/// Values API client bound to one spreadsheet. Every request carries a
/// bearer token from its [`TokenSource`].
pub struct SheetsClient {
    client: reqwest::Client,
    base_url: String,
    spreadsheet_id: String,
    tokens: Box<dyn TokenSource>,
}

impl SheetsClient {
    pub fn new(spreadsheet_id: &str, tokens: impl TokenSource + 'static) -> Result<Self> {
        Self::with_base_url(BASE_URL, spreadsheet_id, tokens)
    }

    pub fn with_base_url(
        base_url: &str,
        spreadsheet_id: &str,
        tokens: impl TokenSource + 'static,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            spreadsheet_id: spreadsheet_id.to_string(),
            tokens: Box::new(tokens),
        })
    }

    fn url(&self, suffix_segment: Option<&str>) -> Result<url::Url> {
        let mut url = url::Url::parse(&self.base_url)
            .map_err(|e| SheetsError::Parse(format!("invalid base url: {e}")))?;
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| SheetsError::Parse("base url cannot be a base".into()))?;
            match suffix_segment {
                Some(s) => segments.push(s),
                None => segments.push(&self.spreadsheet_id),
            };
        }
        Ok(url)
    }

    fn values_url(&self, range: &str, action: Option<&str>) -> Result<url::Url> {
        let mut url = self.url(None)?;
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| SheetsError::Parse("base url cannot be a base".into()))?;
            segments.push("values");
            match action {
                Some(action) => segments.push(&format!("{range}:{action}")),
                None => segments.push(range),
            };
        }
        Ok(url)
    }

    async fn check(resp: reqwest::Response) -> Result<reqwest::Response> {
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(SheetsError::Api {
                status: status.as_u16(),
                message: body,
            });
        }
        Ok(resp)
    }

    /// Titles of every tab in the spreadsheet.
    pub async fn tab_titles(&self) -> Result<Vec<String>> {
        let url = self.url(None)?;
        let meta: SpreadsheetMeta = with_fresh_token(self.tokens.as_ref(), |token| {
            let req = self
                .client
                .get(url.clone())
                .bearer_auth(token)
                .query(&[("fields", "sheets.properties.title")]);
            async move { Ok::<_, SheetsError>(Self::check(req.send().await?).await?.json().await?) }
        })
        .await?;
        Ok(meta.sheets.into_iter().map(|s| s.properties.title).collect())
    }

    /// Create the tab if missing. Returns whether it was created.
    pub async fn ensure_tab(&self, title: &str) -> Result<bool> {
        let titles = self.tab_titles().await?;
        if titles.iter().any(|t| t == title) {
            return Ok(false);
        }

        let url = self.url(Some(&format!("{}:batchUpdate", self.spreadsheet_id)))?;
        let body = json!({
            "requests": [{
                "addSheet": {
                    "properties": {
                        "title": title,
                        "gridProperties": { "rowCount": NEW_TAB_ROWS, "columnCount": NEW_TAB_COLUMNS }
                    }
                }
            }]
        });
        with_fresh_token(self.tokens.as_ref(), |token| {
            let req = self.client.post(url.clone()).bearer_auth(token).json(&body);
            async move { Self::check(req.send().await?).await.map(|_| ()) }
        })
        .await?;
        info!(tab = title, "Created sheet tab");
        Ok(true)
    }

    /// Cell values in `range`, rendered as text. Missing trailing cells are
    /// simply absent from their row.
    pub async fn get_values(&self, range: &str) -> Result<Vec<Vec<String>>> {
        let url = self.values_url(range, None)?;
        let range: ValueRange = with_fresh_token(self.tokens.as_ref(), |token| {
            let req = self.client.get(url.clone()).bearer_auth(token);
            async move { Ok::<_, SheetsError>(Self::check(req.send().await?).await?.json().await?) }
        })
        .await?;
        Ok(range
            .values
            .into_iter()
            .map(|row| row.into_iter().map(cell_text).collect())
            .collect())
    }

    /// Overwrite `range` with `rows` (RAW input).
    pub async fn update_values(&self, range: &str, rows: &[Vec<Value>]) -> Result<()> {
        let url = self.values_url(range, None)?;
        let body = json!({ "values": rows });
        with_fresh_token(self.tokens.as_ref(), |token| {
            let req = self
                .client
                .put(url.clone())
                .bearer_auth(token)
                .query(&[("valueInputOption", "RAW")])
                .json(&body);
            async move { Self::check(req.send().await?).await.map(|_| ()) }
        })
        .await
    }

    /// Append `rows` after the last row of the table found in `range`.
    pub async fn append_values(&self, range: &str, rows: &[Vec<Value>]) -> Result<()> {
        if rows.is_empty() {
            return Ok(());
        }
        let url = self.values_url(range, Some("append"))?;
        let body = json!({ "values": rows });
        with_fresh_token(self.tokens.as_ref(), |token| {
            let req = self
                .client
                .post(url.clone())
                .bearer_auth(token)
                .query(&[("valueInputOption", "RAW"), ("insertDataOption", "INSERT_ROWS")])
                .json(&body);
            async move { Self::check(req.send().await?).await.map(|_| ()) }
        })
        .await
    }
}

fn cell_text(v: Value) -> String {
    match v {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn a1_range_quotes_titles() {
        assert_eq!(a1_range("California", "A1:N1"), "'California'!A1:N1");
        assert_eq!(a1_range("Joe's Tab", "K2:K"), "'Joe''s Tab'!K2:K");
    }

    #[test]
    fn values_urls_encode_the_range() {
        let client = SheetsClient::new("sheet-1", StaticToken::new("token")).unwrap();
        let url = client.values_url(&a1_range("Bay Area", "K2:K"), None).unwrap();
        assert_eq!(
            url.as_str(),
            "https://sheets.googleapis.com/v4/spreadsheets/sheet-1/values/'Bay%20Area'!K2:K"
        );
        let append = client.values_url(&a1_range("CA", "A2"), Some("append")).unwrap();
        assert!(append.as_str().ends_with("/values/'CA'!A2:append"));
    }

    #[test]
    fn cells_render_as_text() {
        assert_eq!(cell_text(json!("pid-1")), "pid-1");
        assert_eq!(cell_text(json!(32.5)), "32.5");
        assert_eq!(cell_text(Value::Null), "");
    }
}
