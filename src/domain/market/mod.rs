// Historical and forecast price data
pub mod price_series;
