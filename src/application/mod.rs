// Heuristic fallback predictor
pub mod fallback;

// Forecast record formatting
pub mod formatting;

// Trainable forecast backends
pub mod ml;

// Forecast orchestrator
pub mod orchestrator;
