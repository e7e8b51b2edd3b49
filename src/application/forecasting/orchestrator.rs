use super::cancellation::CancellationToken;
use super::returns::calculate_returns;
use super::walk_forward::WalkForwardForecaster;
use crate::application::ml::predictor::{ModelSettings, build_predictor};
use crate::application::ml::scaling::MinMaxScaler;
use crate::application::ml::windows::WindowFeaturizer;
use crate::domain::errors::ForecastError;
use crate::domain::market::price_series::PriceSeries;
use crate::domain::ports::MarketDataProvider;
use crate::domain::simulation::{SimulationReport, SimulationResult, TickerForecast};
use crate::domain::trading::portfolio::Portfolio;
use chrono::{Days, NaiveDate, Utc};
use futures::StreamExt;
use rust_decimal::prelude::ToPrimitive;
use std::sync::Arc;
use tracing::{info, warn};

pub const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone)]
pub struct SimulationSettings {
    pub window_size: usize,
    /// Calendar days of history fetched before the as-of date.
    pub history_days: u64,
    /// Tickers processed at once. 1 reproduces the sequential behaviour.
    pub max_concurrent_tickers: usize,
    pub model: ModelSettings,
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            window_size: 60,
            history_days: 250,
            max_concurrent_tickers: 1,
            model: ModelSettings::default(),
        }
    }
}

/// Parses a `YYYY-MM-DD` target date.
pub fn parse_target_date(input: &str) -> Result<NaiveDate, ForecastError> {
    NaiveDate::parse_from_str(input.trim(), DATE_FORMAT).map_err(|_| ForecastError::InvalidDate {
        input: input.to_string(),
    })
}

/// Trains a fresh scaler and model on `series` and walks it forward to
/// `target_date`. Everything here is owned by the calling ticker.
pub fn forecast_ticker(
    series: &PriceSeries,
    settings: &ModelSettings,
    window_size: usize,
    target_date: NaiveDate,
    invested_amount: f64,
    cancel: &CancellationToken,
) -> Result<TickerForecast, ForecastError> {
    let scaler = MinMaxScaler::fit(series)?;
    let normalized = scaler.apply_series(series)?;
    let dataset = WindowFeaturizer::new(window_size).build(&normalized)?;

    let mut model = build_predictor(settings, cancel);
    model.train(&dataset)?;

    let forecast = WalkForwardForecaster::new(model.as_ref(), &scaler, window_size)
        .with_cancellation(cancel.clone())
        .forecast(series, target_date)?;

    let returns = calculate_returns(forecast.initial_price, forecast.final_price, invested_amount)?;

    Ok(TickerForecast {
        initial_price: forecast.initial_price,
        final_price: forecast.final_price,
        returns,
        series: forecast.series,
        predictions: forecast.predictions,
        outcome: forecast.outcome,
        model: format!("{} {}", model.name(), model.version()),
    })
}

/// Runs a forecast for every ticker of a portfolio snapshot.
///
/// A failure on one ticker is recorded on its result and never stops the
/// others. Only an unparsable target date aborts the run.
pub struct SimulationOrchestrator {
    provider: Arc<dyn MarketDataProvider>,
    settings: SimulationSettings,
    as_of: Option<NaiveDate>,
    cancel: CancellationToken,
}

impl SimulationOrchestrator {
    pub fn new(provider: Arc<dyn MarketDataProvider>, settings: SimulationSettings) -> Self {
        Self {
            provider,
            settings,
            as_of: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Fixes the "today" used to bound the history request.
    pub fn with_as_of(mut self, as_of: NaiveDate) -> Self {
        self.as_of = Some(as_of);
        self
    }

    /// Token that stops the run; remaining tickers report `Cancelled`.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn settings(&self) -> &SimulationSettings {
        &self.settings
    }

    pub async fn run(
        &self,
        portfolio: &Portfolio,
        target_date: &str,
    ) -> Result<SimulationReport, ForecastError> {
        let target = parse_target_date(target_date)?;
        Ok(self.run_until(portfolio, target).await)
    }

    pub async fn run_until(&self, portfolio: &Portfolio, target_date: NaiveDate) -> SimulationReport {
        let as_of = self.as_of.unwrap_or_else(|| Utc::now().date_naive());
        let positions: Vec<(String, f64)> = portfolio
            .iter()
            .map(|(ticker, amount)| (ticker.to_string(), amount.to_f64().unwrap_or(0.0)))
            .collect();

        info!(
            "SimulationOrchestrator: simulating {} tickers to {} (as of {}, provider={})",
            positions.len(),
            target_date,
            as_of,
            self.provider.name()
        );

        let results = futures::stream::iter(positions)
            .map(|(ticker, amount)| self.simulate_ticker(ticker, amount, target_date, as_of))
            .buffered(self.settings.max_concurrent_tickers.max(1))
            .collect::<Vec<_>>()
            .await;

        SimulationReport {
            target_date,
            results,
        }
    }

    async fn simulate_ticker(
        &self,
        ticker: String,
        invested_amount: f64,
        target_date: NaiveDate,
        as_of: NaiveDate,
    ) -> SimulationResult {
        let result = self.try_simulate(&ticker, invested_amount, target_date, as_of).await;
        match &result {
            Ok(forecast) => info!(
                "SimulationOrchestrator: {} {:.2} -> {:.2} ({:+.2}%, {} steps)",
                ticker,
                forecast.initial_price,
                forecast.final_price,
                forecast.returns.percent_return,
                forecast.predictions.len()
            ),
            Err(e) => warn!("SimulationOrchestrator: {} skipped: {}", ticker, e),
        }
        SimulationResult {
            ticker,
            invested_amount,
            result,
        }
    }

    async fn try_simulate(
        &self,
        ticker: &str,
        invested_amount: f64,
        target_date: NaiveDate,
        as_of: NaiveDate,
    ) -> Result<TickerForecast, ForecastError> {
        if self.cancel.is_cancelled() {
            return Err(ForecastError::Cancelled);
        }

        let start = as_of
            .checked_sub_days(Days::new(self.settings.history_days))
            .unwrap_or(NaiveDate::MIN);
        let series = self.provider.fetch(ticker, start, as_of).await?;
        if series.is_empty() {
            return Err(ForecastError::NoData {
                ticker: ticker.to_string(),
            });
        }

        let w = self.settings.window_size;
        if series.len() <= w {
            return Err(ForecastError::InsufficientData {
                required: w + 1,
                available: series.len(),
            });
        }

        let model = self.settings.model.clone();
        let cancel = self.cancel.clone();
        tokio::task::spawn_blocking(move || {
            forecast_ticker(&series, &model, w, target_date, invested_amount, &cancel)
        })
        .await
        .map_err(|e| ForecastError::Model {
            reason: format!("forecast worker failed: {}", e),
        })?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ml::predictor::ModelKind;
    use crate::application::ml::recurrent_predictor::RecurrentParams;
    use crate::application::ml::smartcore_predictor::RandomForestParams;
    use crate::domain::market::price_series::PriceRecord;
    use crate::domain::simulation::ForecastOutcome;

    fn trending_series(n: usize) -> PriceSeries {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        PriceSeries::from_records((0..n).map(|i| PriceRecord {
            date: start + Days::new(i as u64),
            close: 50.0 + i as f64 * 0.5 + (i % 3) as f64,
        }))
        .unwrap()
    }

    fn fast_model() -> ModelSettings {
        ModelSettings {
            seed: Some(42),
            random_forest: RandomForestParams {
                n_trees: 10,
                ..RandomForestParams::default()
            },
            ..ModelSettings::default()
        }
    }

    #[test]
    fn test_parse_target_date() {
        assert_eq!(
            parse_target_date("2025-02-14").unwrap(),
            NaiveDate::from_ymd_opt(2025, 2, 14).unwrap()
        );
        assert!(matches!(
            parse_target_date("14/02/2025"),
            Err(ForecastError::InvalidDate { .. })
        ));
    }

    #[test]
    fn test_forecast_ticker_end_to_end() {
        let series = trending_series(40);
        let last = series.last().unwrap();
        let target = last.date + Days::new(7);

        let forecast = forecast_ticker(
            &series,
            &fast_model(),
            10,
            target,
            1_000.0,
            &CancellationToken::new(),
        )
        .unwrap();

        assert_eq!(forecast.predictions.len(), 7);
        assert_eq!(forecast.series.len(), 47);
        assert_eq!(forecast.initial_price, last.close);
        assert_eq!(forecast.final_price, forecast.predictions[6].close);
        let expected_shares = 1_000.0 / last.close;
        assert!((forecast.returns.shares - expected_shares).abs() < 1e-9);
    }

    #[test]
    fn test_all_missing_closes_fail_before_training() {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let mut blank = PriceSeries::from_records((0..30).map(|i| PriceRecord {
            date: start + Days::new(i),
            close: f64::NAN,
        }))
        .unwrap();
        assert_eq!(blank.fill_missing(), 0);

        let err = forecast_ticker(
            &blank,
            &fast_model(),
            10,
            start + Days::new(40),
            100.0,
            &CancellationToken::new(),
        )
        .unwrap_err();
        assert!(matches!(err, ForecastError::InvalidSeries { .. }));
    }

    #[test]
    fn test_recurrent_variant_walks_forward() {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let ramp = PriceSeries::from_records((0..80).map(|i| PriceRecord {
            date: start + Days::new(i),
            close: 50.0 + i as f64 * 0.5,
        }))
        .unwrap();
        let target = ramp.last().unwrap().date + Days::new(6);
        let settings = ModelSettings {
            kind: ModelKind::Recurrent,
            seed: Some(42),
            recurrent: RecurrentParams {
                hidden_size: 8,
                epochs: 20,
                ..RecurrentParams::default()
            },
            ..ModelSettings::default()
        };

        let run = || {
            forecast_ticker(&ramp, &settings, 10, target, 1_000.0, &CancellationToken::new())
                .unwrap()
        };
        let a = run();
        let b = run();

        assert_eq!(a.predictions.len(), 6);
        assert_eq!(a.series.len(), 86);
        assert_eq!(a.outcome, ForecastOutcome::Done);
        assert!(a.final_price.is_finite());
        assert!(a.model.starts_with("GRU Sequence Regressor"));
        assert_eq!(a.final_price, b.final_price);
    }

    #[test]
    fn test_flat_series_reports_degenerate_range() {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let flat = PriceSeries::from_records((0..30).map(|i| PriceRecord {
            date: start + Days::new(i),
            close: 12.0,
        }))
        .unwrap();

        let err = forecast_ticker(
            &flat,
            &fast_model(),
            10,
            start + Days::new(40),
            100.0,
            &CancellationToken::new(),
        )
        .unwrap_err();
        assert_eq!(err, ForecastError::DegenerateRange { value: 12.0 });
    }
}
