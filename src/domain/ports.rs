use crate::domain::errors::ForecastError;
use crate::domain::market::price_series::PriceSeries;
use crate::domain::trading::portfolio::Portfolio;
use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;

/// Source of historical daily closes.
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Closes for `ticker` in `[start, end)`. An empty result is reported as
    /// [`ForecastError::NoData`].
    async fn fetch(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<PriceSeries, ForecastError>;

    fn name(&self) -> &str;
}

/// Persistence for the ticker to invested-amount mapping.
pub trait PortfolioStore: Send + Sync {
    /// Returns an empty portfolio when nothing has been saved yet.
    fn load(&self) -> Result<Portfolio>;

    /// Replaces the stored portfolio atomically.
    fn save(&self, portfolio: &Portfolio) -> Result<()>;
}
