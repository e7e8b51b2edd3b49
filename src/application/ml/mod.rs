// Normalization and training-set construction
pub mod scaling;
pub mod windows;

// Model capability and its two variants
pub mod predictor;
pub mod recurrent_predictor;
pub mod smartcore_predictor;

// Hold-out scoring and benchmark comparison
pub mod evaluation;
