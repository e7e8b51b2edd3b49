pub mod market_data;

pub use market_data::{DEFAULT_BASE_URL, YahooMarketDataProvider};
