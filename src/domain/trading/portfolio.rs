use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Ticker symbol to invested amount.
///
/// Serializes as a plain JSON object of numbers, e.g. `{"AAPL": 1500.0}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Portfolio {
    holdings: BTreeMap<String, Decimal>,
}

impl Portfolio {
    pub fn new() -> Self {
        Self::default()
    }

    /// Normalized form used as the holdings key.
    pub fn normalize_ticker(ticker: &str) -> String {
        ticker.trim().to_uppercase()
    }

    /// Symbols are letters, digits and `.`, `-`, `^`, `=` (e.g. `BRK.B`, `^GSPC`).
    /// Path separators and `..` never pass.
    pub fn is_valid_ticker(ticker: &str) -> bool {
        !ticker.is_empty()
            && !ticker.contains("..")
            && ticker
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '^' | '='))
    }

    /// Adds `amount` to the ticker's invested total.
    pub(crate) fn add(&mut self, ticker: String, amount: Decimal) {
        *self.holdings.entry(ticker).or_insert(Decimal::ZERO) += amount;
    }

    pub fn invested(&self, ticker: &str) -> Option<Decimal> {
        self.holdings.get(&Self::normalize_ticker(ticker)).copied()
    }

    pub fn total_invested(&self) -> Decimal {
        self.holdings.values().copied().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Decimal)> {
        self.holdings.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.holdings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.holdings.is_empty()
    }

    pub fn clear(&mut self) {
        self.holdings.clear();
    }
}

impl FromIterator<(String, Decimal)> for Portfolio {
    fn from_iter<T: IntoIterator<Item = (String, Decimal)>>(iter: T) -> Self {
        let mut portfolio = Portfolio::new();
        for (ticker, amount) in iter {
            portfolio.add(Self::normalize_ticker(&ticker), amount);
        }
        portfolio
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_amounts_accumulate_per_ticker() {
        let portfolio: Portfolio = [
            ("aapl".to_string(), Decimal::from(100)),
            ("AAPL ".to_string(), Decimal::from(50)),
            ("MSFT".to_string(), Decimal::from(25)),
        ]
        .into_iter()
        .collect();

        assert_eq!(portfolio.len(), 2);
        assert_eq!(portfolio.invested("AAPL"), Some(Decimal::from(150)));
        assert_eq!(portfolio.total_invested(), Decimal::from(175));
    }

    #[test]
    fn test_serializes_as_plain_number_map() {
        let portfolio: Portfolio = [("AAPL".to_string(), Decimal::from(1000))]
            .into_iter()
            .collect();
        let json = serde_json::to_value(&portfolio).unwrap();
        assert_eq!(json, serde_json::json!({ "AAPL": 1000.0 }));
    }
}
