// Library interface for hrvrank
// The binary and the integration tests both go through these modules

pub mod config;
pub mod error;
pub mod interactive;
pub mod logging;
pub mod models;
pub mod norms;
pub mod percentile;
pub mod report;
pub mod stats;

// Re-export commonly used types for convenience
pub use models::*;
pub use norms::NormativeTable;
pub use percentile::{PercentileEstimator, Ranking};
pub use interactive::InteractiveSession;
pub use config::{AppConfig, OutputFormat};
pub use error::{HrvError, Result};
pub use logging::{LogConfig, LogLevel, LogFormat};
