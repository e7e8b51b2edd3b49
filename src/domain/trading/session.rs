use crate::domain::errors::TradingError;
use crate::domain::trading::portfolio::Portfolio;
use rust_decimal::Decimal;

/// Virtual balance plus the holdings bought from it.
#[derive(Debug, Clone, PartialEq)]
pub struct TradingSession {
    starting_balance: Decimal,
    balance: Decimal,
    portfolio: Portfolio,
}

impl TradingSession {
    pub fn new(starting_balance: Decimal) -> Self {
        Self {
            starting_balance,
            balance: starting_balance,
            portfolio: Portfolio::new(),
        }
    }

    /// Rebuilds a session from persisted holdings. The balance is whatever the
    /// holdings have not consumed.
    pub fn restore(starting_balance: Decimal, portfolio: Portfolio) -> Self {
        let balance = starting_balance - portfolio.total_invested();
        Self {
            starting_balance,
            balance,
            portfolio,
        }
    }

    pub fn balance(&self) -> Decimal {
        self.balance
    }

    pub fn starting_balance(&self) -> Decimal {
        self.starting_balance
    }

    pub fn portfolio(&self) -> &Portfolio {
        &self.portfolio
    }

    /// Immutable copy for a simulation run.
    pub fn snapshot(&self) -> Portfolio {
        self.portfolio.clone()
    }

    /// Spends `amount` of the balance on `ticker`. Returns the new balance.
    pub fn buy(&mut self, ticker: &str, amount: Decimal) -> Result<Decimal, TradingError> {
        let ticker = Portfolio::normalize_ticker(ticker);
        if !Portfolio::is_valid_ticker(&ticker) {
            return Err(TradingError::InvalidTicker { ticker });
        }
        if amount <= Decimal::ZERO {
            return Err(TradingError::InvalidAmount { amount });
        }
        if amount > self.balance {
            return Err(TradingError::InsufficientFunds {
                need: amount,
                available: self.balance,
            });
        }

        self.balance -= amount;
        self.portfolio.add(ticker, amount);
        Ok(self.balance)
    }

    pub fn reset(&mut self) {
        self.portfolio.clear();
        self.balance = self.starting_balance;
    }
}
