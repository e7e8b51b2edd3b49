//! Model and lookback settings parsed from environment variables.

use crate::application::ml::predictor::{ModelKind, ModelSettings};
use crate::application::ml::recurrent_predictor::RecurrentParams;
use crate::application::ml::smartcore_predictor::RandomForestParams;
use anyhow::Result;
use std::env;
use std::str::FromStr;

#[derive(Debug, Clone)]
pub struct ForecastEnvConfig {
    pub model: ModelKind,
    pub window_size: usize,
    pub history_days: u64,
    pub seed: Option<u64>,
    pub rf_n_trees: usize,
    pub rf_max_depth: Option<u16>,
    pub rf_min_samples_split: usize,
    pub rnn_hidden_size: usize,
    pub rnn_epochs: usize,
    pub rnn_learning_rate: f64,
    pub rnn_batch_size: usize,
}

fn parsed<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

impl ForecastEnvConfig {
    pub fn from_env() -> Result<Self> {
        let model_str = env::var("FORECAST_MODEL").unwrap_or_else(|_| "random_forest".to_string());
        let model = ModelKind::from_str(&model_str)?;

        // Unset means the default seed; set-but-empty means unseeded.
        let seed = match env::var("FORECAST_SEED") {
            Ok(v) if v.trim().is_empty() => None,
            Ok(v) => Some(v.trim().parse().unwrap_or(42)),
            Err(_) => Some(42),
        };

        let forest = RandomForestParams::default();
        let recurrent = RecurrentParams::default();

        Ok(Self {
            model,
            window_size: parsed("FORECAST_WINDOW_SIZE", 60),
            history_days: parsed("FORECAST_HISTORY_DAYS", 250),
            seed,
            rf_n_trees: parsed("RF_N_TREES", forest.n_trees),
            rf_max_depth: env::var("RF_MAX_DEPTH")
                .ok()
                .and_then(|v| v.trim().parse().ok()),
            rf_min_samples_split: parsed("RF_MIN_SAMPLES_SPLIT", forest.min_samples_split),
            rnn_hidden_size: parsed("RNN_HIDDEN_SIZE", recurrent.hidden_size),
            rnn_epochs: parsed("RNN_EPOCHS", recurrent.epochs),
            rnn_learning_rate: parsed("RNN_LEARNING_RATE", recurrent.learning_rate),
            rnn_batch_size: parsed("RNN_BATCH_SIZE", recurrent.batch_size),
        })
    }

    pub fn model_settings(&self) -> ModelSettings {
        ModelSettings {
            kind: self.model,
            seed: self.seed,
            random_forest: RandomForestParams {
                n_trees: self.rf_n_trees.max(1),
                max_depth: self.rf_max_depth,
                min_samples_split: self.rf_min_samples_split.max(2),
            },
            recurrent: RecurrentParams {
                hidden_size: self.rnn_hidden_size.max(1),
                epochs: self.rnn_epochs,
                learning_rate: self.rnn_learning_rate,
                batch_size: self.rnn_batch_size.max(1),
                ..RecurrentParams::default()
            },
        }
    }
}
