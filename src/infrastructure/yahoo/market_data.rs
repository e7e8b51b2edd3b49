use crate::domain::errors::ForecastError;
use crate::domain::market::price_series::PriceSeries;
use crate::domain::ports::MarketDataProvider;
use crate::domain::trading::portfolio::Portfolio;
use crate::infrastructure::core::http_client_factory::{
    HttpClientFactory, build_url_with_query, encode,
};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime};
use reqwest_middleware::ClientWithMiddleware;
use serde::Deserialize;
use tracing::{debug, info};

pub const DEFAULT_BASE_URL: &str = "https://query1.finance.yahoo.com";

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: Chart,
}

#[derive(Debug, Deserialize)]
struct Chart {
    result: Option<Vec<ChartResult>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<Quote>,
}

#[derive(Debug, Deserialize)]
struct Quote {
    #[serde(default)]
    close: Vec<Option<f64>>,
}

/// Daily closes from the Yahoo Finance chart endpoint.
pub struct YahooMarketDataProvider {
    client: ClientWithMiddleware,
    base_url: String,
}

impl YahooMarketDataProvider {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: HttpClientFactory::create_client(),
            base_url: base_url.into(),
        }
    }

    fn provider_error(ticker: &str, reason: impl Into<String>) -> ForecastError {
        ForecastError::Provider {
            ticker: ticker.to_string(),
            reason: reason.into(),
        }
    }

    fn parse_chart(ticker: &str, response: ChartResponse) -> Result<PriceSeries, ForecastError> {
        if let Some(err) = response.chart.error {
            if err.code.eq_ignore_ascii_case("Not Found") {
                return Err(ForecastError::NoData {
                    ticker: ticker.to_string(),
                });
            }
            return Err(Self::provider_error(
                ticker,
                format!("{}: {}", err.code, err.description),
            ));
        }

        let Some(result) = response.chart.result.and_then(|r| r.into_iter().next()) else {
            return Err(ForecastError::NoData {
                ticker: ticker.to_string(),
            });
        };
        let timestamps = result.timestamp.unwrap_or_default();
        let closes = result
            .indicators
            .quote
            .into_iter()
            .next()
            .map(|q| q.close)
            .unwrap_or_default();

        let mut series = PriceSeries::new();
        for (ts, close) in timestamps.iter().zip(closes) {
            let date = DateTime::from_timestamp(*ts, 0)
                .ok_or_else(|| Self::provider_error(ticker, format!("bad timestamp {}", ts)))?
                .date_naive();
            // The live bar can repeat the last session's date.
            if series.last_date().is_some_and(|last| date <= last) {
                continue;
            }
            series.push(date, close.unwrap_or(f64::NAN))?;
        }

        let filled = series.fill_missing();
        if filled > 0 {
            debug!("YahooMarketDataProvider: filled {} missing closes for {}", filled, ticker);
        }
        series.seal_actuals();
        Ok(series)
    }
}

#[async_trait]
impl MarketDataProvider for YahooMarketDataProvider {
    async fn fetch(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<PriceSeries, ForecastError> {
        let ticker = Portfolio::normalize_ticker(ticker);
        let period1 = start.and_time(NaiveTime::MIN).and_utc().timestamp();
        let period2 = end.and_time(NaiveTime::MIN).and_utc().timestamp();

        let url = build_url_with_query(
            &format!("{}/v8/finance/chart/{}", self.base_url, encode(&ticker)),
            &[
                ("period1", period1.to_string()),
                ("period2", period2.to_string()),
                ("interval", "1d".to_string()),
                ("events", "history".to_string()),
            ],
        );
        debug!("YahooMarketDataProvider: GET {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| Self::provider_error(&ticker, e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(ForecastError::NoData { ticker });
        }
        if !status.is_success() {
            return Err(Self::provider_error(&ticker, format!("HTTP {}", status)));
        }

        let body: ChartResponse = response
            .json()
            .await
            .map_err(|e| Self::provider_error(&ticker, format!("invalid chart payload: {}", e)))?;

        let series = Self::parse_chart(&ticker, body)?;
        // Only closes strictly before `end` belong to the requested range.
        let series = PriceSeries::from_records(series.records().filter(|r| r.date < end))?;
        if series.is_empty() {
            return Err(ForecastError::NoData { ticker });
        }
        info!(
            "YahooMarketDataProvider: fetched {} closes for {} ({} to {})",
            series.len(),
            ticker,
            start,
            end
        );
        Ok(series)
    }

    fn name(&self) -> &str {
        "yahoo"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_chart_payload() {
        let body: ChartResponse = serde_json::from_value(serde_json::json!({
            "chart": {
                "result": [{
                    "timestamp": [1704205800, 1704292200, 1704378600, 1704378700],
                    "indicators": { "quote": [{ "close": [185.64, null, 181.91, 182.0] }] }
                }],
                "error": null
            }
        }))
        .unwrap();

        let series = YahooMarketDataProvider::parse_chart("AAPL", body).unwrap();
        assert_eq!(series.len(), 3);
        assert_eq!(series.closes(), &[185.64, 185.64, 181.91]);
        assert_eq!(
            series.first().unwrap().date,
            NaiveDate::from_ymd_opt(2024, 1, 2).unwrap()
        );
    }

    #[test]
    fn test_parse_chart_not_found() {
        let body: ChartResponse = serde_json::from_value(serde_json::json!({
            "chart": {
                "result": null,
                "error": { "code": "Not Found", "description": "No data found, symbol may be delisted" }
            }
        }))
        .unwrap();

        assert_eq!(
            YahooMarketDataProvider::parse_chart("XXXX", body),
            Err(ForecastError::NoData {
                ticker: "XXXX".to_string()
            })
        );
    }
}
