use crate::domain::errors::ForecastError;
use crate::domain::market::price_series::{PriceRecord, PriceSeries};
use chrono::NaiveDate;

/// How a walk-forward run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForecastOutcome {
    /// Target date reached (possibly with zero steps).
    Done,
    /// The lookback window underflowed before the target date.
    Exhausted,
}

/// Net and percent return of one position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReturnSummary {
    pub shares: f64,
    pub net_return: f64,
    pub percent_return: f64,
}

/// Successful forecast for one ticker.
#[derive(Debug, Clone)]
pub struct TickerForecast {
    pub initial_price: f64,
    pub final_price: f64,
    pub returns: ReturnSummary,
    /// Historical closes followed by the synthetic forecast points.
    pub series: PriceSeries,
    pub predictions: Vec<PriceRecord>,
    pub outcome: ForecastOutcome,
    pub model: String,
}

#[derive(Debug, Clone)]
pub struct SimulationResult {
    pub ticker: String,
    pub invested_amount: f64,
    pub result: Result<TickerForecast, ForecastError>,
}

impl SimulationResult {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    pub fn failure(&self) -> Option<&ForecastError> {
        self.result.as_ref().err()
    }
}

/// Everything produced by one simulation run, in portfolio order.
#[derive(Debug, Clone)]
pub struct SimulationReport {
    pub target_date: NaiveDate,
    pub results: Vec<SimulationResult>,
}

impl SimulationReport {
    pub fn succeeded(&self) -> impl Iterator<Item = (&SimulationResult, &TickerForecast)> {
        self.results
            .iter()
            .filter_map(|r| r.result.as_ref().ok().map(|f| (r, f)))
    }

    pub fn failed(&self) -> impl Iterator<Item = (&SimulationResult, &ForecastError)> {
        self.results
            .iter()
            .filter_map(|r| r.result.as_ref().err().map(|e| (r, e)))
    }

    /// Invested amount across tickers that produced a forecast.
    pub fn total_invested(&self) -> f64 {
        self.succeeded().map(|(r, _)| r.invested_amount).sum()
    }

    pub fn total_net_return(&self) -> f64 {
        self.succeeded().map(|(_, f)| f.returns.net_return).sum()
    }
}
