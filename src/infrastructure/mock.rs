use crate::domain::errors::ForecastError;
use crate::domain::market::price_series::{PriceRecord, PriceSeries};
use crate::domain::ports::MarketDataProvider;
use crate::domain::trading::portfolio::Portfolio;
use async_trait::async_trait;
use chrono::{Datelike, Days, NaiveDate, Weekday};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;
use tracing::debug;

/// In-memory market data for tests and offline demos.
///
/// Preloaded series are served as-is (filtered to the requested range).
/// With a random-walk seed, unknown tickers get a reproducible weekday-only
/// walk instead of `NoData`.
#[derive(Debug, Clone, Default)]
pub struct MockMarketDataProvider {
    series: HashMap<String, PriceSeries>,
    random_walk_seed: Option<u64>,
}

impl MockMarketDataProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_series(mut self, ticker: &str, series: PriceSeries) -> Self {
        self.series.insert(Portfolio::normalize_ticker(ticker), series);
        self
    }

    pub fn with_random_walk(mut self, seed: u64) -> Self {
        self.random_walk_seed = Some(seed);
        self
    }

    fn random_walk(ticker: &str, seed: u64, start: NaiveDate, end: NaiveDate) -> PriceSeries {
        let ticker_seed = ticker
            .bytes()
            .fold(seed, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u64));
        let mut rng = StdRng::seed_from_u64(ticker_seed);
        let mut price: f64 = rng.random_range(20.0..400.0);

        let mut series = PriceSeries::new();
        let mut date = start;
        while date < end {
            if !matches!(date.weekday(), Weekday::Sat | Weekday::Sun) {
                price *= 1.0 + rng.random_range(-0.02..0.021);
                // Dates only move forward, so push cannot fail.
                let _ = series.push(date, price);
            }
            match date.checked_add_days(Days::new(1)) {
                Some(next) => date = next,
                None => break,
            }
        }
        series.seal_actuals();
        series
    }
}

fn within(series: &PriceSeries, start: NaiveDate, end: NaiveDate) -> Result<PriceSeries, ForecastError> {
    PriceSeries::from_records(
        series
            .records()
            .filter(|r: &PriceRecord| r.date >= start && r.date < end),
    )
}

#[async_trait]
impl MarketDataProvider for MockMarketDataProvider {
    async fn fetch(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<PriceSeries, ForecastError> {
        let key = Portfolio::normalize_ticker(ticker);
        let series = match (self.series.get(&key), self.random_walk_seed) {
            (Some(stored), _) => within(stored, start, end)?,
            (None, Some(seed)) => Self::random_walk(&key, seed, start, end),
            (None, None) => PriceSeries::new(),
        };

        debug!(
            "MockMarketDataProvider: {} records for {} in [{}, {})",
            series.len(),
            key,
            start,
            end
        );
        if series.is_empty() {
            return Err(ForecastError::NoData { ticker: key });
        }
        Ok(series)
    }

    fn name(&self) -> &str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, m, day).unwrap()
    }

    #[tokio::test]
    async fn test_unknown_ticker_is_no_data() {
        let provider = MockMarketDataProvider::new();
        let err = provider.fetch("nope", d(1, 1), d(2, 1)).await.unwrap_err();
        assert_eq!(
            err,
            ForecastError::NoData {
                ticker: "NOPE".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_stored_series_is_filtered_to_range() {
        let stored = PriceSeries::from_records((1..=10).map(|day| PriceRecord {
            date: d(1, day),
            close: day as f64,
        }))
        .unwrap();
        let provider = MockMarketDataProvider::new().with_series("aapl", stored);

        let series = provider.fetch("AAPL", d(1, 3), d(1, 6)).await.unwrap();
        assert_eq!(series.closes(), &[3.0, 4.0, 5.0]);
    }

    #[tokio::test]
    async fn test_random_walk_is_reproducible_and_skips_weekends() {
        let provider = MockMarketDataProvider::new().with_random_walk(7);
        let a = provider.fetch("MSFT", d(3, 1), d(6, 1)).await.unwrap();
        let b = provider.fetch("MSFT", d(3, 1), d(6, 1)).await.unwrap();

        assert_eq!(a, b);
        assert!(
            a.dates()
                .iter()
                .all(|date| !matches!(date.weekday(), Weekday::Sat | Weekday::Sun))
        );
    }
}
