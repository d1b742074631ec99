pub mod coerce;
pub mod config;
pub mod error;
pub mod factory;
pub mod orchestrator;
pub mod prompt;
pub mod providers;
pub mod telemetry;
pub mod traits;
pub mod types;

pub use coerce::{coerce, DEFAULT_RECOMMENDATIONS};
pub use config::*;
pub use error::{ExplainError, ProviderError, ProviderFailure, TelemetryError};
pub use factory::*;
pub use orchestrator::ExplanationOrchestrator;
pub use telemetry::*;
pub use traits::*;
pub use types::*;
