// Model training, scaling and evaluation
pub mod ml;

// Walk-forward forecasting and simulation runs
pub mod forecasting;
