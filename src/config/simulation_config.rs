use anyhow::Result;
use rust_decimal::Decimal;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use crate::infrastructure::portfolio_persistence::JsonPortfolioStore;

/// Where historical closes come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarketDataSource {
    Mock,
    Csv,
    Yahoo,
}

impl FromStr for MarketDataSource {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mock" => Ok(MarketDataSource::Mock),
            "csv" => Ok(MarketDataSource::Csv),
            "yahoo" => Ok(MarketDataSource::Yahoo),
            _ => anyhow::bail!(
                "Invalid MARKET_DATA_SOURCE: {}. Must be 'mock', 'csv', or 'yahoo'",
                s
            ),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SimulationEnvConfig {
    pub starting_balance: Decimal,
    pub portfolio_path: PathBuf,
    pub max_concurrent_tickers: usize,
    pub market_data_source: MarketDataSource,
    pub csv_dir: PathBuf,
    pub yahoo_base_url: String,
}

impl SimulationEnvConfig {
    pub fn from_env() -> Result<Self> {
        let starting_balance = env::var("SIMULATION_STARTING_BALANCE")
            .ok()
            .and_then(|v| Decimal::from_str(v.trim()).ok())
            .filter(|b| *b > Decimal::ZERO)
            .unwrap_or(Decimal::from(1_000_000));

        let portfolio_path = match env::var("SIMULATION_PORTFOLIO_PATH") {
            Ok(p) if !p.trim().is_empty() => PathBuf::from(p),
            _ => JsonPortfolioStore::default_location()?,
        };

        let max_concurrent_tickers = env::var("SIMULATION_MAX_CONCURRENT_TICKERS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(1); // Sequential by default

        let source_str = env::var("MARKET_DATA_SOURCE").unwrap_or_else(|_| "mock".to_string());
        let market_data_source = MarketDataSource::from_str(&source_str)?;

        Ok(Self {
            starting_balance,
            portfolio_path,
            max_concurrent_tickers,
            market_data_source,
            csv_dir: PathBuf::from(
                env::var("MARKET_DATA_CSV_DIR").unwrap_or_else(|_| "data".to_string()),
            ),
            yahoo_base_url: env::var("YAHOO_BASE_URL")
                .unwrap_or_else(|_| crate::infrastructure::yahoo::DEFAULT_BASE_URL.to_string()),
        })
    }
}
