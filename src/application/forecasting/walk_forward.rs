use super::cancellation::CancellationToken;
use crate::application::ml::predictor::PricePredictor;
use crate::application::ml::scaling::MinMaxScaler;
use crate::domain::errors::ForecastError;
use crate::domain::market::price_series::{PriceRecord, PriceSeries};
use crate::domain::simulation::ForecastOutcome;
use chrono::{Days, NaiveDate};
use tracing::debug;

/// Result of walking a series forward to a target date.
#[derive(Debug, Clone)]
pub struct Forecast {
    /// Input history extended with one synthetic record per forecast day.
    pub series: PriceSeries,
    pub predictions: Vec<PriceRecord>,
    /// Last actual close before forecasting began.
    pub initial_price: f64,
    /// Prediction for the last day at or before the target date, or the last
    /// actual close when no step ran.
    pub final_price: f64,
    pub outcome: ForecastOutcome,
}

/// Autoregressive one-day-at-a-time forecaster.
///
/// Each step predicts from the last `window_size` closes of the working
/// series, which after the first step include earlier predictions. Days
/// advance by calendar day with no notion of trading sessions.
pub struct WalkForwardForecaster<'a> {
    model: &'a dyn PricePredictor,
    scaler: &'a MinMaxScaler,
    window_size: usize,
    cancel: CancellationToken,
}

impl<'a> WalkForwardForecaster<'a> {
    /// `scaler` must be the one fitted on the model's training data.
    pub fn new(model: &'a dyn PricePredictor, scaler: &'a MinMaxScaler, window_size: usize) -> Self {
        Self {
            model,
            scaler,
            window_size,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn forecast(
        &self,
        history: &PriceSeries,
        target_date: NaiveDate,
    ) -> Result<Forecast, ForecastError> {
        let w = self.window_size;
        let last = match history.last() {
            Some(last) if history.len() >= w => last,
            _ => {
                return Err(ForecastError::InsufficientData {
                    required: w,
                    available: history.len(),
                });
            }
        };

        let horizon = (target_date - last.date).num_days().max(0) as usize;
        let mut series = history.clone();
        series.reserve(horizon);
        let mut predictions = Vec::with_capacity(horizon);
        let mut window = Vec::with_capacity(w);
        let mut outcome = ForecastOutcome::Done;
        let mut next_date = next_day(last.date)?;

        while next_date <= target_date {
            if self.cancel.is_cancelled() {
                return Err(ForecastError::Cancelled);
            }

            let Some(tail) = series.tail(w) else {
                outcome = ForecastOutcome::Exhausted;
                break;
            };
            self.scaler.apply_slice(tail, &mut window)?;

            let predicted = self.model.predict(&window)?;
            let price = self.scaler.inverse(predicted);

            series.push(next_date, price)?;
            predictions.push(PriceRecord {
                date: next_date,
                close: price,
            });
            next_date = next_day(next_date)?;
        }

        let final_price = predictions.last().map_or(last.close, |p| p.close);
        debug!(
            "WalkForwardForecaster: {} steps from {} to {} ({:?}), final={:.4}",
            predictions.len(),
            last.date,
            target_date,
            outcome,
            final_price
        );

        Ok(Forecast {
            series,
            predictions,
            initial_price: last.close,
            final_price,
            outcome,
        })
    }
}

fn next_day(date: NaiveDate) -> Result<NaiveDate, ForecastError> {
    date.checked_add_days(Days::new(1))
        .ok_or_else(|| ForecastError::InvalidDate {
            input: date.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ml::windows::WindowedDataset;

    /// Predicts the last value of the window plus a fixed normalized drift.
    struct DriftPredictor {
        width: usize,
        drift: f64,
    }

    impl PricePredictor for DriftPredictor {
        fn train(&mut self, _dataset: &WindowedDataset) -> Result<(), ForecastError> {
            Ok(())
        }

        fn predict(&self, window: &[f64]) -> Result<f64, ForecastError> {
            crate::application::ml::predictor::check_window(Some(self.width), window)?;
            Ok(window[window.len() - 1] + self.drift)
        }

        fn window_len(&self) -> Option<usize> {
            Some(self.width)
        }

        fn name(&self) -> &str {
            "drift"
        }

        fn version(&self) -> &str {
            "test"
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    /// Five records ending Friday 2024-03-08, closes 100..=104.
    fn history() -> PriceSeries {
        PriceSeries::from_records((0..5).map(|i| PriceRecord {
            date: date(2024, 3, 4 + i),
            close: 100.0 + i as f64,
        }))
        .unwrap()
    }

    fn scaler() -> MinMaxScaler {
        MinMaxScaler::fit(&history()).unwrap()
    }

    #[test]
    fn test_target_not_after_last_date_runs_no_steps() {
        let model = DriftPredictor { width: 3, drift: 0.25 };
        let scaler = scaler();
        let forecaster = WalkForwardForecaster::new(&model, &scaler, 3);

        for target in [date(2024, 3, 8), date(2024, 3, 1)] {
            let forecast = forecaster.forecast(&history(), target).unwrap();
            assert!(forecast.predictions.is_empty());
            assert_eq!(forecast.series.len(), 5);
            assert_eq!(forecast.final_price, 104.0);
            assert_eq!(forecast.initial_price, 104.0);
            assert_eq!(forecast.outcome, ForecastOutcome::Done);
        }
    }

    #[test]
    fn test_next_day_target_runs_exactly_one_step() {
        let model = DriftPredictor { width: 3, drift: 0.25 };
        let scaler = scaler();
        let forecast = WalkForwardForecaster::new(&model, &scaler, 3)
            .forecast(&history(), date(2024, 3, 9))
            .unwrap();

        assert_eq!(forecast.predictions.len(), 1);
        assert_eq!(forecast.series.len(), 6);
        assert_eq!(forecast.series.actual_len(), 5);
        // Range is 4, so a 0.25 normalized drift is one currency unit.
        assert!((forecast.final_price - 105.0).abs() < 1e-9);
    }

    #[test]
    fn test_predictions_feed_back_into_next_window() {
        let model = DriftPredictor { width: 3, drift: 0.25 };
        let scaler = scaler();
        let forecast = WalkForwardForecaster::new(&model, &scaler, 3)
            .forecast(&history(), date(2024, 3, 12))
            .unwrap();

        let closes: Vec<f64> = forecast.predictions.iter().map(|p| p.close).collect();
        let expected = [105.0, 106.0, 107.0, 108.0];
        assert_eq!(closes.len(), expected.len());
        for (got, want) in closes.iter().zip(expected) {
            assert!((got - want).abs() < 1e-9, "{} != {}", got, want);
        }
        assert!((forecast.final_price - 108.0).abs() < 1e-9);
    }

    #[test]
    fn test_dates_advance_one_calendar_day_through_weekend() {
        let model = DriftPredictor { width: 3, drift: 0.0 };
        let scaler = scaler();
        let forecast = WalkForwardForecaster::new(&model, &scaler, 3)
            .forecast(&history(), date(2024, 3, 18))
            .unwrap();

        assert_eq!(forecast.predictions.len(), 10);
        assert_eq!(forecast.predictions[0].date, date(2024, 3, 9));
        for pair in forecast.predictions.windows(2) {
            assert_eq!(pair[1].date, pair[0].date.succ_opt().unwrap());
        }
    }

    #[test]
    fn test_history_shorter_than_window_fails() {
        let model = DriftPredictor { width: 6, drift: 0.0 };
        let scaler = scaler();
        let err = WalkForwardForecaster::new(&model, &scaler, 6)
            .forecast(&history(), date(2024, 3, 9))
            .unwrap_err();
        assert_eq!(
            err,
            ForecastError::InsufficientData {
                required: 6,
                available: 5
            }
        );
    }

    #[test]
    fn test_input_history_is_not_mutated() {
        let model = DriftPredictor { width: 3, drift: 0.1 };
        let scaler = scaler();
        let input = history();
        WalkForwardForecaster::new(&model, &scaler, 3)
            .forecast(&input, date(2024, 3, 20))
            .unwrap();
        assert_eq!(input, history());
    }

    #[test]
    fn test_cancelled_forecast_stops() {
        let model = DriftPredictor { width: 3, drift: 0.1 };
        let scaler = scaler();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = WalkForwardForecaster::new(&model, &scaler, 3)
            .with_cancellation(cancel)
            .forecast(&history(), date(2024, 3, 20))
            .unwrap_err();
        assert_eq!(err, ForecastError::Cancelled);
    }
}
