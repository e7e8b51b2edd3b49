use crate::application::forecasting::orchestrator::DATE_FORMAT;
use crate::domain::errors::ForecastError;
use crate::domain::market::price_series::PriceSeries;
use crate::domain::ports::MarketDataProvider;
use crate::domain::trading::portfolio::Portfolio;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;
use std::path::PathBuf;
use tracing::{debug, info};

#[derive(Debug, Deserialize)]
struct CsvRow {
    #[serde(alias = "Date")]
    date: String,
    #[serde(alias = "Close")]
    close: Option<f64>,
}

/// Reads `<dir>/<TICKER>.csv` files with `date,close` columns.
///
/// Dates may carry a time suffix (`2024-01-02 00:00:00-05:00`); only the
/// leading `YYYY-MM-DD` is used. Empty closes are filled from neighbours.
pub struct CsvMarketDataProvider {
    dir: PathBuf,
}

impl CsvMarketDataProvider {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, ticker: &str) -> PathBuf {
        self.dir.join(format!("{}.csv", ticker))
    }

    fn parse(
        ticker: &str,
        content: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<PriceSeries, ForecastError> {
        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let mut series = PriceSeries::new();

        for row in rdr.deserialize::<CsvRow>() {
            let row = row.map_err(|e| ForecastError::Provider {
                ticker: ticker.to_string(),
                reason: format!("malformed CSV row: {}", e),
            })?;
            let day = row.date.get(..10).unwrap_or(&row.date);
            let date = NaiveDate::parse_from_str(day, DATE_FORMAT).map_err(|e| {
                ForecastError::Provider {
                    ticker: ticker.to_string(),
                    reason: format!("bad date '{}': {}", row.date, e),
                }
            })?;
            if date >= start && date < end {
                series.push(date, row.close.unwrap_or(f64::NAN))?;
            }
        }

        let filled = series.fill_missing();
        if filled > 0 {
            debug!("CsvMarketDataProvider: filled {} missing closes for {}", filled, ticker);
        }
        series.seal_actuals();
        Ok(series)
    }
}

#[async_trait]
impl MarketDataProvider for CsvMarketDataProvider {
    async fn fetch(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<PriceSeries, ForecastError> {
        let ticker = Portfolio::normalize_ticker(ticker);
        if !Portfolio::is_valid_ticker(&ticker) {
            return Err(ForecastError::Provider {
                reason: format!("'{}' is not a valid symbol", ticker),
                ticker,
            });
        }
        let path = self.path_for(&ticker);
        if !path.exists() {
            return Err(ForecastError::NoData { ticker });
        }

        let content = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| ForecastError::Provider {
                ticker: ticker.clone(),
                reason: format!("failed to read {:?}: {}", path, e),
            })?;

        let series = Self::parse(&ticker, &content, start, end)?;
        if series.is_empty() {
            return Err(ForecastError::NoData { ticker });
        }
        info!("Loaded {} closes for {} from {:?}", series.len(), ticker, path);
        Ok(series)
    }

    fn name(&self) -> &str {
        "csv"
    }
}
