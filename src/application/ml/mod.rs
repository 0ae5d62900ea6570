// Shared backend contract
pub mod backend;

// Concrete forecast backends
pub mod ensemble;
pub mod sequence;
pub mod statistical;

pub use backend::{ForecastBackend, SharedBackend};
