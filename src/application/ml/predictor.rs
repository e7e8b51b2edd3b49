use super::recurrent_predictor::{RecurrentParams, RecurrentPredictor};
use super::smartcore_predictor::{RandomForestParams, RandomForestPredictor};
use super::windows::WindowedDataset;
use crate::application::forecasting::cancellation::CancellationToken;
use crate::domain::errors::ForecastError;
use std::fmt;
use std::str::FromStr;

/// Interface for one-step-ahead regression models over normalized windows.
pub trait PricePredictor: Send + Sync {
    /// Fit the model on windows and their next-step targets.
    fn train(&mut self, dataset: &WindowedDataset) -> Result<(), ForecastError>;

    /// Predict the next normalized value from exactly one window of the
    /// trained length.
    fn predict(&self, window: &[f64]) -> Result<f64, ForecastError>;

    /// Window length seen at training time, if trained.
    fn window_len(&self) -> Option<usize>;

    /// Get model name/type
    fn name(&self) -> &str;

    /// Get model version/id
    fn version(&self) -> &str;
}

/// Which regression variant to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ModelKind {
    #[default]
    RandomForest,
    Recurrent,
}

impl FromStr for ModelKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "random_forest" | "rf" | "forest" => Ok(ModelKind::RandomForest),
            "recurrent" | "rnn" | "gru" => Ok(ModelKind::Recurrent),
            _ => anyhow::bail!(
                "Invalid FORECAST_MODEL: {}. Must be 'random_forest' or 'recurrent'",
                s
            ),
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelKind::RandomForest => write!(f, "random_forest"),
            ModelKind::Recurrent => write!(f, "recurrent"),
        }
    }
}

/// Everything needed to construct a fresh, untrained predictor.
#[derive(Debug, Clone, Default)]
pub struct ModelSettings {
    pub kind: ModelKind,
    pub seed: Option<u64>,
    pub random_forest: RandomForestParams,
    pub recurrent: RecurrentParams,
}

/// Builds a new untrained predictor. Each ticker gets its own instance.
pub fn build_predictor(
    settings: &ModelSettings,
    cancel: &CancellationToken,
) -> Box<dyn PricePredictor> {
    match settings.kind {
        ModelKind::RandomForest => Box::new(RandomForestPredictor::new(
            settings.random_forest.clone(),
            settings.seed,
        )),
        ModelKind::Recurrent => Box::new(
            RecurrentPredictor::new(settings.recurrent.clone(), settings.seed)
                .with_cancellation(cancel.clone()),
        ),
    }
}

/// Checks a training set is non-empty and rectangular. Returns the window length.
pub(crate) fn validate_dataset(dataset: &WindowedDataset) -> Result<usize, ForecastError> {
    let first = dataset
        .windows
        .first()
        .ok_or(ForecastError::InsufficientData {
            required: 1,
            available: 0,
        })?;
    let width = first.len();
    if width == 0 {
        return Err(ForecastError::ShapeMismatch {
            expected: 1,
            actual: 0,
        });
    }
    if let Some(bad) = dataset.windows.iter().find(|w| w.len() != width) {
        return Err(ForecastError::ShapeMismatch {
            expected: width,
            actual: bad.len(),
        });
    }
    if dataset.targets.len() != dataset.windows.len() {
        return Err(ForecastError::ShapeMismatch {
            expected: dataset.windows.len(),
            actual: dataset.targets.len(),
        });
    }
    Ok(width)
}

/// Checks a prediction window against the trained length.
pub(crate) fn check_window(trained: Option<usize>, window: &[f64]) -> Result<(), ForecastError> {
    let expected = trained.ok_or(ForecastError::NotTrained)?;
    if window.len() != expected {
        return Err(ForecastError::ShapeMismatch {
            expected,
            actual: window.len(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_kind_parsing() {
        assert_eq!("random_forest".parse::<ModelKind>().unwrap(), ModelKind::RandomForest);
        assert_eq!("GRU".parse::<ModelKind>().unwrap(), ModelKind::Recurrent);
        assert!("svm".parse::<ModelKind>().is_err());
    }

    #[test]
    fn test_validate_dataset_shapes() {
        let empty = WindowedDataset::default();
        assert!(matches!(
            validate_dataset(&empty),
            Err(ForecastError::InsufficientData { .. })
        ));

        let ragged = WindowedDataset {
            windows: vec![vec![0.1, 0.2], vec![0.3]],
            targets: vec![0.3, 0.4],
        };
        assert_eq!(
            validate_dataset(&ragged),
            Err(ForecastError::ShapeMismatch {
                expected: 2,
                actual: 1
            })
        );
    }

    #[test]
    fn test_check_window() {
        assert_eq!(check_window(None, &[0.1]), Err(ForecastError::NotTrained));
        assert!(check_window(Some(2), &[0.1, 0.2]).is_ok());
        assert!(matches!(
            check_window(Some(2), &[0.1]),
            Err(ForecastError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_builds_requested_variant() {
        let cancel = CancellationToken::new();
        let rf = build_predictor(&ModelSettings::default(), &cancel);
        assert_eq!(rf.name(), "SmartCore Random Forest");

        let settings = ModelSettings {
            kind: ModelKind::Recurrent,
            ..ModelSettings::default()
        };
        let rnn = build_predictor(&settings, &cancel);
        assert_eq!(rnn.name(), "GRU Sequence Regressor");
        assert!(rnn.window_len().is_none());
    }
}
