pub mod core;
pub mod csv_market_data;
pub mod mock;
pub mod portfolio_persistence;
pub mod yahoo;

pub use csv_market_data::CsvMarketDataProvider;
pub use mock::MockMarketDataProvider;
pub use portfolio_persistence::JsonPortfolioStore;
pub use yahoo::YahooMarketDataProvider;
