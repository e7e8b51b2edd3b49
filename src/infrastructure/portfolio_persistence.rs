use crate::domain::ports::PortfolioStore;
use crate::domain::trading::portfolio::Portfolio;
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Stores the portfolio as a flat JSON object of ticker to invested amount.
pub struct JsonPortfolioStore {
    file_path: PathBuf,
}

impl JsonPortfolioStore {
    pub fn new(file_path: impl Into<PathBuf>) -> Self {
        Self {
            file_path: file_path.into(),
        }
    }

    /// `~/.stocksim/portfolio.json`
    pub fn default_location() -> Result<PathBuf> {
        let home = std::env::var("HOME").context("Could not find HOME directory")?;
        Ok(PathBuf::from(home).join(".stocksim").join("portfolio.json"))
    }

    pub fn path(&self) -> &Path {
        &self.file_path
    }
}

impl PortfolioStore for JsonPortfolioStore {
    fn load(&self) -> Result<Portfolio> {
        if !self.file_path.exists() {
            return Ok(Portfolio::new());
        }

        let content = fs::read_to_string(&self.file_path)
            .with_context(|| format!("Failed to read portfolio file {:?}", self.file_path))?;
        let portfolio: Portfolio =
            serde_json::from_str(&content).context("Failed to parse portfolio JSON")?;

        info!(
            "Loaded portfolio with {} holdings from {:?}",
            portfolio.len(),
            self.file_path
        );
        Ok(portfolio)
    }

    fn save(&self, portfolio: &Portfolio) -> Result<()> {
        if let Some(dir) = self.file_path.parent() {
            if !dir.as_os_str().is_empty() && !dir.exists() {
                fs::create_dir_all(dir).context("Failed to create portfolio directory")?;
            }
        }

        let content =
            serde_json::to_string_pretty(portfolio).context("Failed to serialize portfolio")?;

        // Atomic write: write to temp file then rename
        let temp_path = self.file_path.with_extension("tmp");
        fs::write(&temp_path, content).context("Failed to write temp portfolio file")?;
        fs::rename(&temp_path, &self.file_path).context("Failed to rename portfolio file")?;

        info!("Saved portfolio to {:?}", self.file_path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn temp_store() -> (JsonPortfolioStore, PathBuf) {
        let dir = std::env::temp_dir().join(format!("stocksim-store-{}", uuid::Uuid::new_v4()));
        (JsonPortfolioStore::new(dir.join("portfolio.json")), dir)
    }

    #[test]
    fn test_missing_file_loads_empty() {
        let (store, _dir) = temp_store();
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn test_save_then_load() {
        let (store, dir) = temp_store();
        let portfolio: Portfolio = [("AAPL".to_string(), dec!(1500)), ("MSFT".to_string(), dec!(250.5))]
            .into_iter()
            .collect();

        store.save(&portfolio).unwrap();
        assert_eq!(store.load().unwrap(), portfolio);
        assert!(!store.path().with_extension("tmp").exists());

        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let (store, dir) = temp_store();
        fs::create_dir_all(&dir).unwrap();
        fs::write(store.path(), "not json").unwrap();

        assert!(store.load().is_err());
        let _ = fs::remove_dir_all(dir);
    }
}
