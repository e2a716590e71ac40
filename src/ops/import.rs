//! Bulk account import from a CSV file served over HTTP.

use crate::error::{GatewayError, Result};
use crate::schema::Record;
use reqwest::Client;
use serde_json::{Number, Value};
use std::time::Duration;
use tracing::debug;

pub struct AccountImporter {
    client: Client,
}

impl AccountImporter {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::Internal(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }

    /// Download `url` and parse it into records.
    pub async fn fetch(&self, url: &str) -> Result<Vec<Record>> {
        debug!("Fetching import file from {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| import_failed(format!("Failed to download '{}': {}", url, e)))?;

        if !response.status().is_success() {
            return Err(import_failed(format!(
                "Download of '{}' returned status {}",
                url,
                response.status()
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| import_failed(format!("Failed to read '{}': {}", url, e)))?;

        let records = parse_csv(&body)?;
        debug!("Parsed {} records from {}", records.len(), url);
        Ok(records)
    }
}

fn import_failed(cause: String) -> GatewayError {
    GatewayError::ImportFailed { cause }
}

/// Parse CSV with a header row; empty cells are left out of the record.
pub fn parse_csv(input: &str) -> Result<Vec<Record>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(input.as_bytes());

    let headers = reader
        .headers()
        .map_err(|e| import_failed(format!("Invalid CSV header: {}", e)))?
        .clone();

    let mut records = Vec::new();
    for (line, row) in reader.records().enumerate() {
        let row = row.map_err(|e| import_failed(format!("Invalid CSV row {}: {}", line + 1, e)))?;

        let record: Record = headers
            .iter()
            .zip(row.iter())
            .filter_map(|(name, cell)| infer_value(cell).map(|v| (name.to_string(), v)))
            .collect();

        if !record.is_empty() {
            records.push(record);
        }
    }

    Ok(records)
}

pub fn infer_value(cell: &str) -> Option<Value> {
    if cell.is_empty() {
        return None;
    }

    if let Ok(i) = cell.parse::<i64>() {
        return Some(Value::Number(i.into()));
    }

    if let Ok(f) = cell.parse::<f64>() {
        if let Some(n) = Number::from_f64(f) {
            return Some(Value::Number(n));
        }
    }

    match cell {
        "true" => Some(Value::Bool(true)),
        "false" => Some(Value::Bool(false)),
        _ => Some(Value::String(cell.to_string())),
    }
}
