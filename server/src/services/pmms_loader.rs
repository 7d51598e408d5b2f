use bytes::Bytes;
use chrono::{NaiveDate, Utc};
use tracing::{info, warn};

use crate::config::{PMMS_HISTORY_URL, pmms_refresh_interval};
use crate::state::{AppState, PmmsSnapshot};

pub async fn run(state: AppState) {
    let mut interval = tokio::time::interval(pmms_refresh_interval());

    // Fetch immediately on startup, then on every tick
    loop {
        interval.tick().await;

        match fetch_pmms(&state.http_client).await {
            Ok(raw) => match convert_pmms(&raw) {
                Ok((csv, rows)) => {
                    *state.pmms.write().await = Some(PmmsSnapshot {
                        csv: Bytes::from(csv),
                        rows,
                        fetched_at: Utc::now(),
                    });
                    info!("loaded PMMS history with {rows} weeks");
                }
                Err(e) => warn!("failed to convert PMMS history: {e}"),
            },
            Err(e) => {
                warn!("failed to fetch PMMS history: {e}");
            }
        }
    }
}

async fn fetch_pmms(client: &reqwest::Client) -> Result<String, reqwest::Error> {
    let resp = client
        .get(PMMS_HISTORY_URL)
        .send()
        .await?
        .error_for_status()?;
    resp.text().await
}

/// Keep the `date,pmms30,pmms15` columns and rewrite US dates
/// (`%m/%d/%Y`) as ISO dates. Unparsable dates become empty cells.
pub fn convert_pmms(raw: &str) -> Result<(String, usize), String> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(raw.as_bytes());
    let headers = reader
        .headers()
        .map_err(|e| format!("invalid PMMS header: {e}"))?
        .clone();
    if headers.is_empty() {
        return Err("empty PMMS file".to_string());
    }
    let index = |name: &str| {
        headers
            .iter()
            .position(|c| c.eq_ignore_ascii_case(name))
            .ok_or_else(|| format!("missing column {name}"))
    };
    let (date_col, p30_col, p15_col) = (index("date")?, index("pmms30")?, index("pmms15")?);

    let mut writer = csv::Writer::from_writer(Vec::new());
    writer
        .write_record(["date", "pmms30", "pmms15"])
        .map_err(|e| format!("failed to write PMMS csv: {e}"))?;
    let mut rows = 0;
    for record in reader.records() {
        let record = record.map_err(|e| format!("invalid PMMS row: {e}"))?;
        let cell = |i: usize| record.get(i).unwrap_or("");
        let date = NaiveDate::parse_from_str(cell(date_col), "%m/%d/%Y")
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_default();
        writer
            .write_record([date.as_str(), cell(p30_col), cell(p15_col)])
            .map_err(|e| format!("failed to write PMMS csv: {e}"))?;
        rows += 1;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| format!("failed to write PMMS csv: {e}"))?;
    let csv = String::from_utf8(bytes).map_err(|e| format!("PMMS csv is not UTF-8: {e}"))?;
    Ok((csv, rows))
}
