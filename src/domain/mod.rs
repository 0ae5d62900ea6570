// Core forecasting domain types
pub mod types;

// Domain-specific error types
pub mod errors;

// Forecast insight generation
pub mod insights;

// Port interfaces
pub mod ports;
