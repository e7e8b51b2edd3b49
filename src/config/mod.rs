//! Configuration loaded from environment variables (and `.env` via dotenvy),
//! split into forecasting and simulation concerns.

mod forecast_config;
mod simulation_config;

pub use forecast_config::ForecastEnvConfig;
pub use simulation_config::{MarketDataSource, SimulationEnvConfig};

use crate::application::forecasting::orchestrator::SimulationSettings;
use crate::application::ml::predictor::ModelSettings;
use crate::domain::ports::MarketDataProvider;
use crate::infrastructure::{CsvMarketDataProvider, MockMarketDataProvider, YahooMarketDataProvider};
use anyhow::{Context, Result};
use std::sync::Arc;

/// Seed for the offline random-walk provider.
const MOCK_WALK_SEED: u64 = 7;

#[derive(Debug, Clone)]
pub struct Config {
    pub forecast: ForecastEnvConfig,
    pub simulation: SimulationEnvConfig,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let forecast = ForecastEnvConfig::from_env().context("Failed to load forecast config")?;
        let simulation =
            SimulationEnvConfig::from_env().context("Failed to load simulation config")?;
        Ok(Self {
            forecast,
            simulation,
        })
    }

    pub fn model_settings(&self) -> ModelSettings {
        self.forecast.model_settings()
    }

    pub fn to_simulation_settings(&self) -> SimulationSettings {
        SimulationSettings {
            window_size: self.forecast.window_size,
            history_days: self.forecast.history_days,
            max_concurrent_tickers: self.simulation.max_concurrent_tickers.max(1),
            model: self.model_settings(),
        }
    }

    pub fn build_provider(&self) -> Arc<dyn MarketDataProvider> {
        match self.simulation.market_data_source {
            MarketDataSource::Mock => {
                Arc::new(MockMarketDataProvider::new().with_random_walk(MOCK_WALK_SEED))
            }
            MarketDataSource::Csv => {
                Arc::new(CsvMarketDataProvider::new(self.simulation.csv_dir.clone()))
            }
            MarketDataSource::Yahoo => Arc::new(YahooMarketDataProvider::new(
                self.simulation.yahoo_base_url.clone(),
            )),
        }
    }
}
