// Price data domain
pub mod market;

// Port interfaces
pub mod ports;

// Simulation results
pub mod simulation;

// Virtual trading session and portfolio
pub mod trading;

// Domain-specific error types
pub mod errors;
