//! Monthly time series and dataset metadata.

use std::collections::HashMap;

use chrono::NaiveDate;
use serde::Deserialize;

/// Metric key to last-month value; `None` for a null entry.
pub type MetricValues = HashMap<String, Option<f64>>;

/// One month of an area's history.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SeriesRow {
    pub date: Option<NaiveDate>,
    pub count: Option<f64>,
    pub resale: Option<f64>,
    pub change_resale: Option<f64>,
    pub trend: Option<f64>,
    /// Trend relative to the first month with a trend value.
    pub since_trend: Option<f64>,
}

impl SeriesRow {
    /// Value of a chart data key (`count`, `resale`, `changeResale`, `trend`,
    /// `sinceTrend`).
    pub fn value(&self, key: &str) -> Option<f64> {
        match key {
            "count" => self.count,
            "resale" => self.resale,
            "changeResale" | "change_resale" => self.change_resale,
            "trend" => self.trend,
            "sinceTrend" | "since_trend" => self.since_trend,
            _ => None,
        }
    }
}

/// Parse a `yyyy-mm` month into the first day of that month.
pub fn parse_month(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(&format!("{}-01", s.trim()), "%Y-%m-%d").ok()
}

/// Leading integer of `s`, ignoring anything after it (`"12.7"` is 12).
fn parse_int_prefix(s: &str) -> Option<f64> {
    let s = s.trim_start();
    let end = s
        .char_indices()
        .find(|&(i, c)| !(c.is_ascii_digit() || (i == 0 && (c == '-' || c == '+'))))
        .map_or(s.len(), |(i, _)| i);
    s[..end].parse::<i64>().ok().map(|v| v as f64)
}

/// Longest leading float literal of `s`.
fn parse_float_prefix(s: &str) -> Option<f64> {
    let s = s.trim_start();
    let bytes = s.as_bytes();
    let mut end = 0;
    let mut best = None;
    let mut seen_dot = false;
    let mut seen_exp = false;
    while end < bytes.len() {
        let c = bytes[end] as char;
        let prev = if end > 0 { bytes[end - 1] as char } else { ' ' };
        let ok = c.is_ascii_digit()
            || ((c == '-' || c == '+') && (end == 0 || prev == 'e' || prev == 'E'))
            || (c == '.' && !seen_dot && !seen_exp)
            || ((c == 'e' || c == 'E') && !seen_exp && end > 0);
        if !ok {
            break;
        }
        seen_dot |= c == '.';
        seen_exp |= c == 'e' || c == 'E';
        end += 1;
        if let Ok(v) = s[..end].parse::<f64>() {
            best = Some(v);
        }
    }
    best
}

/// One CSV line as raw cells; numbers are read from the strings afterwards.
#[derive(Deserialize)]
struct RawRow {
    yyyymm: String,
    #[serde(default)]
    count: String,
    #[serde(default)]
    resale: String,
    #[serde(default, rename = "changeResale")]
    change_resale: String,
    #[serde(default)]
    trend: String,
}

impl From<RawRow> for SeriesRow {
    fn from(raw: RawRow) -> Self {
        Self {
            date: parse_month(&raw.yyyymm),
            count: parse_int_prefix(&raw.count),
            resale: parse_int_prefix(&raw.resale),
            change_resale: parse_float_prefix(&raw.change_resale),
            trend: parse_int_prefix(&raw.trend),
            since_trend: None,
        }
    }
}

/// Parse an area history CSV (`yyyymm,count,resale,changeResale,trend`).
/// Unparsable cells become missing values; a missing header is an error.
pub fn parse_series_csv(text: &str) -> Result<Vec<SeriesRow>, String> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());
    let headers = reader
        .headers()
        .map_err(|e| format!("parse error: {e}"))?;
    if headers.is_empty() {
        return Err("parse error: empty csv".to_string());
    }
    if !headers.iter().any(|h| h == "yyyymm") {
        return Err("parse error: missing yyyymm column".to_string());
    }

    reader
        .deserialize::<RawRow>()
        .map(|row| row.map(SeriesRow::from).map_err(|e| format!("parse error: {e}")))
        .collect()
}

/// Fill `since_trend` for every row.
///
/// Each row is compared against the first row that has a trend value once
/// that row has been reached, and against row 0 before that.
pub fn calc_trend(rows: &mut [SeriesRow]) {
    let first = rows.iter().position(|r| r.trend.is_some());
    let base0 = rows.first().and_then(|r| r.trend);
    let base_first = first.and_then(|i| rows[i].trend);
    for (i, row) in rows.iter_mut().enumerate() {
        let base = match first {
            Some(f) if f > 0 && f <= i => base_first,
            _ => base0,
        };
        row.since_trend = match (row.trend, base) {
            (Some(t), Some(b)) if b != 0.0 => Some(t / b - 1.0),
            _ => None,
        };
    }
}

#[derive(Deserialize)]
struct RawMeta {
    dates: Vec<String>,
    #[serde(rename = "areaLastMonth", default)]
    area_last_month: HashMap<String, HashMap<String, serde_json::Value>>,
}

/// Dataset metadata: the month axis and each area's latest values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Meta {
    pub dates: Vec<NaiveDate>,
    pub area_last_month: HashMap<String, MetricValues>,
}

impl Meta {
    pub fn from_json(text: &str) -> Result<Self, String> {
        let raw: RawMeta = serde_json::from_str(text).map_err(|e| format!("parse error: {e}"))?;
        let dates = raw
            .dates
            .iter()
            .map(|d| parse_month(d).ok_or_else(|| format!("parse error: bad month {d:?}")))
            .collect::<Result<Vec<_>, _>>()?;
        let area_last_month = raw
            .area_last_month
            .into_iter()
            .map(|(area, values)| {
                let values = values.into_iter().map(|(k, v)| (k, v.as_f64())).collect();
                (area, values)
            })
            .collect();
        Ok(Self {
            dates,
            area_last_month,
        })
    }

    /// First and last month.
    pub fn date_range(&self) -> Option<(NaiveDate, NaiveDate)> {
        let min = self.dates.iter().min()?;
        let max = self.dates.iter().max()?;
        Some((*min, *max))
    }

    pub fn area_value(&self, area: &str, key: &str) -> Option<f64> {
        self.area_last_month.get(area)?.get(key).copied().flatten()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: f64, expected: f64) {
        let diff = (actual - expected).abs();
        assert!(diff < 1e-9, "expected {expected}, got {actual}");
    }

    const CSV: &str = "yyyymm,count,resale,changeResale,trend\n\
        2016-01,,,,\n\
        2016-02,12,450000.9,0.051,400000\n\
        2016-03,8,,-0.02,440000\n";

    #[test]
    fn csv_rows_parse_like_number_prefixes() {
        let rows = parse_series_csv(CSV).expect("valid csv");
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].date, NaiveDate::from_ymd_opt(2016, 1, 1));
        assert_eq!(rows[0].count, None);
        assert_eq!(rows[1].resale, Some(450000.0));
        assert_eq!(rows[1].change_resale, Some(0.051));
        assert_eq!(rows[2].resale, None);
        assert_eq!(rows[2].change_resale, Some(-0.02));
    }

    #[test]
    fn missing_header_is_an_error() {
        assert!(parse_series_csv("").is_err());
        assert!(parse_series_csv("a,b\n1,2").is_err());
    }

    #[test]
    fn trend_is_relative_to_first_defined_month() {
        let mut rows = parse_series_csv(CSV).expect("valid csv");
        calc_trend(&mut rows);
        assert_eq!(rows[0].since_trend, None);
        assert_close(rows[1].since_trend.expect("defined"), 0.0);
        assert_close(rows[2].since_trend.expect("defined"), 0.1);
    }

    #[test]
    fn trend_uses_row_zero_when_it_has_a_value() {
        let mut rows = vec![
            SeriesRow {
                trend: Some(100.0),
                ..Default::default()
            },
            SeriesRow {
                trend: Some(150.0),
                ..Default::default()
            },
        ];
        calc_trend(&mut rows);
        assert_close(rows[1].since_trend.expect("defined"), 0.5);
    }

    #[test]
    fn number_prefixes() {
        assert_eq!(parse_int_prefix("12abc"), Some(12.0));
        assert_eq!(parse_int_prefix("-7.9"), Some(-7.0));
        assert_eq!(parse_int_prefix("abc"), None);
        assert_eq!(parse_float_prefix("1.5e3x"), Some(1500.0));
        assert_eq!(parse_float_prefix(".5"), Some(0.5));
        assert_eq!(parse_float_prefix(""), None);
    }

    #[test]
    fn meta_parses_months_and_nulls() {
        let meta = Meta::from_json(
            r#"{"dates":["2016-01","2016-02"],
                "areaLastMonth":{"NYC":{"trend":650000,"rent":null}}}"#,
        )
        .expect("valid meta");
        let (start, end) = meta.date_range().expect("dates present");
        assert_eq!(start, NaiveDate::from_ymd_opt(2016, 1, 1).expect("date"));
        assert_eq!(end, NaiveDate::from_ymd_opt(2016, 2, 1).expect("date"));
        assert_eq!(meta.area_value("NYC", "trend"), Some(650000.0));
        assert_eq!(meta.area_value("NYC", "rent"), None);
        assert_eq!(meta.area_value("Nowhere", "trend"), None);
    }

    #[test]
    fn quoted_cells_and_short_rows() {
        let text = "yyyymm,count,resale,changeResale,trend\n\
            \"2016-04\",\"1,200\",510000,\"0.03\",460000\n\
            2016-05,9\n";
        let rows = parse_series_csv(text).expect("valid csv");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].date, NaiveDate::from_ymd_opt(2016, 4, 1));
        assert_eq!(rows[0].count, Some(1.0));
        assert_eq!(rows[0].resale, Some(510000.0));
        assert_eq!(rows[0].change_resale, Some(0.03));
        assert_eq!(rows[1].count, Some(9.0));
        assert_eq!(rows[1].trend, None);
    }
}
