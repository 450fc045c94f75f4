use std::time::Duration;

use analysis_core::{AnalysisError, DateWindow, PricePoint, PriceSource};
use async_trait::async_trait;
use chrono::{DateTime, Days, NaiveDate, NaiveTime};

const CHART_URL: &str = "https://query2.finance.yahoo.com/v8/finance/chart";
const SOURCE: &str = "yahoo_finance";

/// Yahoo Finance v8 chart API, daily bars.
#[derive(Clone)]
pub struct YahooFinanceClient {
    client: reqwest::Client,
}

impl YahooFinanceClient {
    pub fn new(timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(timeout)
                .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
        }
    }

    async fn fetch_chart(&self, symbol: &str, window: &DateWindow) -> Result<String, AnalysisError> {
        let (period1, period2) = chart_period(window);
        let url = format!(
            "{}/{}?period1={}&period2={}&interval=1d",
            CHART_URL, symbol, period1, period2
        );

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| AnalysisError::upstream(SOURCE, e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AnalysisError::upstream(SOURCE, e.to_string()))?;

        // 404 carries a chart.error body for unknown symbols; let the parser report it.
        if !status.is_success() && status.as_u16() != 404 {
            return Err(AnalysisError::upstream(SOURCE, format!("status {}", status)));
        }
        Ok(body)
    }
}

impl Default for YahooFinanceClient {
    fn default() -> Self {
        Self::new(Duration::from_secs(10))
    }
}

#[async_trait]
impl PriceSource for YahooFinanceClient {
    async fn daily_closes(
        &self,
        symbol: &str,
        window: &DateWindow,
    ) -> Result<Vec<PricePoint>, AnalysisError> {
        let body = self.fetch_chart(symbol, window).await?;
        let points = parse_chart_response(&body, window)?;
        tracing::debug!("Yahoo returned {} daily closes for {}", points.len(), symbol);
        Ok(points)
    }
}

/// Unix seconds covering the whole window; `period2` is exclusive.
fn chart_period(window: &DateWindow) -> (i64, i64) {
    let start = window.start.and_time(NaiveTime::MIN).and_utc().timestamp();
    let end = window
        .end
        .checked_add_days(Days::new(1))
        .unwrap_or(window.end)
        .and_time(NaiveTime::MIN)
        .and_utc()
        .timestamp();
    (start, end)
}

/// Parse a chart response into closes sorted by date, one per day.
///
/// Bars are dated in the exchange's timezone (`meta.gmtoffset`). Bars with a
/// null close (halts, partial days) are skipped. No usable bars is
/// `InsufficientData`.
pub(crate) fn parse_chart_response(
    body: &str,
    window: &DateWindow,
) -> Result<Vec<PricePoint>, AnalysisError> {
    let json: serde_json::Value = serde_json::from_str(body)
        .map_err(|e| AnalysisError::upstream(SOURCE, format!("unreadable response: {}", e)))?;

    if let Some(description) = json
        .get("chart")
        .and_then(|v| v.get("error"))
        .and_then(|v| v.get("description"))
        .and_then(|v| v.as_str())
    {
        return Err(AnalysisError::InsufficientData(format!(
            "no price history: {}",
            description
        )));
    }

    let chart = json
        .get("chart")
        .and_then(|v| v.get("result"))
        .and_then(|v| v.as_array())
        .and_then(|arr| arr.first())
        .ok_or_else(|| AnalysisError::InsufficientData("no chart data found".to_string()))?;

    let gmt_offset = chart
        .get("meta")
        .and_then(|v| v.get("gmtoffset"))
        .and_then(|v| v.as_i64())
        .unwrap_or(0);

    let empty = Vec::new();
    let timestamps = chart
        .get("timestamp")
        .and_then(|v| v.as_array())
        .unwrap_or(&empty);

    let quote = chart
        .get("indicators")
        .and_then(|v| v.get("quote"))
        .and_then(|v| v.as_array())
        .and_then(|arr| arr.first());

    let closes = quote
        .and_then(|q| q.get("close"))
        .and_then(|v| v.as_array())
        .unwrap_or(&empty);
    let volumes = quote
        .and_then(|q| q.get("volume"))
        .and_then(|v| v.as_array())
        .unwrap_or(&empty);

    let mut points: Vec<PricePoint> = Vec::with_capacity(timestamps.len());
    for (i, ts) in timestamps.iter().enumerate() {
        let (Some(ts), Some(close)) = (ts.as_i64(), closes.get(i).and_then(|c| c.as_f64())) else {
            continue;
        };
        let Some(date) = exchange_date(ts, gmt_offset) else {
            continue;
        };
        if !window.contains(date) {
            continue;
        }

        points.push(PricePoint {
            date,
            close,
            volume: volumes.get(i).and_then(|v| v.as_f64()),
        });
    }

    points.sort_by_key(|p| p.date);
    // Keep the last bar for a date (Yahoo may append an intraday bar).
    points.reverse();
    points.dedup_by_key(|p| p.date);
    points.reverse();

    if points.is_empty() {
        return Err(AnalysisError::InsufficientData(
            "price history is empty for the requested window".to_string(),
        ));
    }
    Ok(points)
}

fn exchange_date(ts: i64, gmt_offset: i64) -> Option<NaiveDate> {
    DateTime::from_timestamp(ts + gmt_offset, 0).map(|dt| dt.date_naive())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn window() -> DateWindow {
        DateWindow::new(date(2024, 7, 1), date(2024, 7, 10)).unwrap()
    }

    // 13:30 UTC = 09:30 New York (EDT, -14400).
    const CHART: &str = r#"{
        "chart": {
            "result": [{
                "meta": {"currency": "USD", "symbol": "AAPL", "gmtoffset": -14400, "timezone": "EDT"},
                "timestamp": [1719840600, 1719927000, 1720013400, 1720186200, 1720186260],
                "indicators": {
                    "quote": [{
                        "open": [212.09, 216.15, 220.0, 221.65, 226.0],
                        "close": [216.75, 220.27, null, 226.34, 226.50],
                        "volume": [60402900, 58046200, 37369800, 60412400, 100]
                    }]
                }
            }],
            "error": null
        }
    }"#;

    #[test]
    fn test_parse_chart_response() {
        let points = parse_chart_response(CHART, &window()).unwrap();

        assert_eq!(points.len(), 3);
        assert_eq!(points[0].date, date(2024, 7, 1));
        assert_eq!(points[0].close, 216.75);
        assert_eq!(points[0].volume, Some(60402900.0));
        assert_eq!(points[1].date, date(2024, 7, 2));
        // Null close on Jul 3 is skipped; the duplicate Jul 5 bar keeps the later one.
        assert_eq!(points[2].date, date(2024, 7, 5));
        assert_eq!(points[2].close, 226.50);
    }

    #[test]
    fn test_unknown_symbol_is_insufficient_data() {
        let body = r#"{"chart": {"result": null, "error": {"code": "Not Found", "description": "No data found, symbol may be delisted"}}}"#;
        assert!(matches!(
            parse_chart_response(body, &window()),
            Err(AnalysisError::InsufficientData(_))
        ));
    }

    #[test]
    fn test_bars_outside_window_are_dropped() {
        let narrow = DateWindow::new(date(2024, 7, 4), date(2024, 7, 10)).unwrap();
        let points = parse_chart_response(CHART, &narrow).unwrap();
        assert_eq!(points.len(), 1);

        let later = DateWindow::new(date(2024, 8, 1), date(2024, 8, 10)).unwrap();
        assert!(matches!(
            parse_chart_response(CHART, &later),
            Err(AnalysisError::InsufficientData(_))
        ));
    }

    #[test]
    fn test_chart_period_covers_end_day() {
        let (start, end) = chart_period(&window());
        assert_eq!(start, 1719792000);
        assert_eq!(end, 1720656000);
    }
}
