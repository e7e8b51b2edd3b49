use super::predictor::{ModelSettings, build_predictor};
use super::scaling::MinMaxScaler;
use super::windows::WindowFeaturizer;
use crate::application::forecasting::cancellation::CancellationToken;
use crate::domain::errors::ForecastError;
use crate::domain::market::price_series::PriceSeries;
use tracing::info;

/// Out-of-sample accuracy of one-step predictions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EvaluationReport {
    /// Mean absolute percentage error, in percent.
    pub mape: f64,
    /// Share of test days where the predicted move had the actual move's sign, in percent.
    pub directional_accuracy: f64,
    pub samples: usize,
}

/// Trains on the first `split_ratio` of `series` and scores one-step
/// predictions over the rest. Every test prediction sees actual closes only.
pub fn evaluate_holdout(
    series: &PriceSeries,
    settings: &ModelSettings,
    window_size: usize,
    split_ratio: f64,
) -> Result<EvaluationReport, ForecastError> {
    let closes = series.closes();
    let split = (closes.len() as f64 * split_ratio.clamp(0.0, 1.0)).floor() as usize;
    if split <= window_size || split >= closes.len() {
        return Err(ForecastError::InsufficientData {
            required: window_size + 2,
            available: closes.len(),
        });
    }

    let train = &closes[..split];
    let scaler = MinMaxScaler::fit_values(train)?;
    let mut normalized = Vec::with_capacity(closes.len());
    scaler.apply_slice(closes, &mut normalized)?;

    let dataset = WindowFeaturizer::new(window_size).build(&normalized[..split])?;
    let mut model = build_predictor(settings, &CancellationToken::new());
    model.train(&dataset)?;

    let mut predicted = Vec::with_capacity(closes.len() - split);
    for i in split..closes.len() {
        let window = &normalized[i - window_size..i];
        predicted.push(scaler.inverse(model.predict(window)?));
    }
    let actual = &closes[split..];
    let previous = &closes[split - 1..closes.len() - 1];

    let report = EvaluationReport {
        mape: mean_absolute_percentage_error(actual, &predicted)?,
        directional_accuracy: directional_accuracy(previous, actual, &predicted),
        samples: actual.len(),
    };
    info!(
        "Holdout evaluation ({}): MAPE={:.2}% directional={:.2}% n={}",
        model.name(),
        report.mape,
        report.directional_accuracy,
        report.samples
    );
    Ok(report)
}

pub fn mean_absolute_percentage_error(actual: &[f64], predicted: &[f64]) -> Result<f64, ForecastError> {
    if actual.is_empty() {
        return Err(ForecastError::EmptySeries);
    }
    if actual.iter().any(|&a| a == 0.0) {
        return Err(ForecastError::DivisionByZero {
            context: "actual close of zero in MAPE".to_string(),
        });
    }
    let total: f64 = actual
        .iter()
        .zip(predicted)
        .map(|(a, p)| ((a - p) / a).abs())
        .sum();
    Ok(total / actual.len() as f64 * 100.0)
}

/// Percent of days where `predicted - previous` and `actual - previous` agree in sign.
pub fn directional_accuracy(previous: &[f64], actual: &[f64], predicted: &[f64]) -> f64 {
    let n = actual.len().min(predicted.len()).min(previous.len());
    if n == 0 {
        return 0.0;
    }
    let hits = (0..n)
        .filter(|&i| {
            let real = actual[i] - previous[i];
            let guess = predicted[i] - previous[i];
            real.signum() == guess.signum()
        })
        .count();
    hits as f64 / n as f64 * 100.0
}

/// Percent change from the first to the last close, e.g. for an index benchmark.
pub fn benchmark_return(series: &PriceSeries) -> Result<f64, ForecastError> {
    let (Some(first), Some(last)) = (series.first(), series.last()) else {
        return Err(ForecastError::EmptySeries);
    };
    if first.close == 0.0 {
        return Err(ForecastError::DivisionByZero {
            context: "first benchmark close is zero".to_string(),
        });
    }
    Ok((last.close - first.close) / first.close * 100.0)
}
