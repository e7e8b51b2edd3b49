use super::predictor::{PricePredictor, check_window, validate_dataset};
use super::windows::WindowedDataset;
use crate::domain::errors::ForecastError;
use smartcore::ensemble::random_forest_regressor::{
    RandomForestRegressor, RandomForestRegressorParameters,
};
use smartcore::linalg::basic::matrix::DenseMatrix;
use tracing::debug;

type Forest = RandomForestRegressor<f64, f64, DenseMatrix<f64>, Vec<f64>>;

#[derive(Debug, Clone)]
pub struct RandomForestParams {
    pub n_trees: usize,
    pub max_depth: Option<u16>,
    pub min_samples_split: usize,
}

impl Default for RandomForestParams {
    fn default() -> Self {
        Self {
            n_trees: 100,
            max_depth: None,
            min_samples_split: 2,
        }
    }
}

/// Ensemble-of-trees regressor treating each window as a flat feature vector.
pub struct RandomForestPredictor {
    model: Option<Forest>,
    params: RandomForestParams,
    seed: u64,
    window_len: Option<usize>,
}

impl RandomForestPredictor {
    /// Without a seed the forest is grown from a random one.
    pub fn new(params: RandomForestParams, seed: Option<u64>) -> Self {
        Self {
            model: None,
            params,
            seed: seed.unwrap_or_else(rand::random),
            window_len: None,
        }
    }

    fn parameters(&self) -> RandomForestRegressorParameters {
        let mut params = RandomForestRegressorParameters::default()
            .with_n_trees(self.params.n_trees)
            .with_min_samples_split(self.params.min_samples_split)
            .with_seed(self.seed);
        if let Some(depth) = self.params.max_depth {
            params = params.with_max_depth(depth);
        }
        params
    }
}

impl PricePredictor for RandomForestPredictor {
    fn train(&mut self, dataset: &WindowedDataset) -> Result<(), ForecastError> {
        let width = validate_dataset(dataset)?;

        let x = DenseMatrix::from_2d_vec(&dataset.windows).map_err(|e| ForecastError::Model {
            reason: format!("Matrix creation failed: {}", e),
        })?;

        debug!(
            "RandomForestPredictor: fitting {} trees on {} windows of {}",
            self.params.n_trees,
            dataset.len(),
            width
        );
        let model = RandomForestRegressor::fit(&x, &dataset.targets, self.parameters())
            .map_err(|e| ForecastError::Model {
                reason: format!("Training failed: {}", e),
            })?;

        self.model = Some(model);
        self.window_len = Some(width);
        Ok(())
    }

    fn predict(&self, window: &[f64]) -> Result<f64, ForecastError> {
        check_window(self.window_len, window)?;
        let model = self.model.as_ref().ok_or(ForecastError::NotTrained)?;

        let input = DenseMatrix::from_2d_vec(&vec![window.to_vec()]).map_err(|e| {
            ForecastError::Model {
                reason: format!("Matrix creation failed: {}", e),
            }
        })?;

        let predictions = model.predict(&input).map_err(|e| ForecastError::Model {
            reason: format!("Prediction failed: {}", e),
        })?;

        predictions.first().copied().ok_or(ForecastError::Model {
            reason: "No prediction returned".to_string(),
        })
    }

    fn window_len(&self) -> Option<usize> {
        self.window_len
    }

    fn name(&self) -> &str {
        "SmartCore Random Forest"
    }

    fn version(&self) -> &str {
        "v1.0"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ml::windows::WindowFeaturizer;

    fn sawtooth(n: usize) -> Vec<f64> {
        (0..n).map(|i| (i % 10) as f64 / 10.0).collect()
    }

    fn small_forest() -> RandomForestParams {
        RandomForestParams {
            n_trees: 20,
            ..RandomForestParams::default()
        }
    }

    #[test]
    fn test_predict_before_train_fails() {
        let model = RandomForestPredictor::new(small_forest(), Some(42));
        assert_eq!(model.predict(&[0.1, 0.2]), Err(ForecastError::NotTrained));
    }

    #[test]
    fn test_train_rejects_empty_dataset() {
        let mut model = RandomForestPredictor::new(small_forest(), Some(42));
        assert!(matches!(
            model.train(&WindowedDataset::default()),
            Err(ForecastError::InsufficientData { .. })
        ));
    }

    #[test]
    fn test_predict_rejects_wrong_window_length() {
        let dataset = WindowFeaturizer::new(5).build(&sawtooth(80)).unwrap();
        let mut model = RandomForestPredictor::new(small_forest(), Some(42));
        model.train(&dataset).unwrap();

        assert_eq!(
            model.predict(&[0.1, 0.2, 0.3]),
            Err(ForecastError::ShapeMismatch {
                expected: 5,
                actual: 3
            })
        );
    }

    #[test]
    fn test_deterministic_with_fixed_seed() {
        let dataset = WindowFeaturizer::new(5).build(&sawtooth(80)).unwrap();
        let window = [0.3, 0.4, 0.5, 0.6, 0.7];

        let mut a = RandomForestPredictor::new(small_forest(), Some(7));
        let mut b = RandomForestPredictor::new(small_forest(), Some(7));
        a.train(&dataset).unwrap();
        b.train(&dataset).unwrap();

        let pa = a.predict(&window).unwrap();
        let pb = b.predict(&window).unwrap();
        assert_eq!(pa, pb);
        // The sawtooth continues with 0.8 after 0.3..0.7.
        assert!((pa - 0.8).abs() < 0.15, "prediction {}", pa);
    }
}
