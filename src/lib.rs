pub mod config;
pub mod error;
pub mod model;
pub mod protocol;
pub mod services;

pub use config::{ConfigError, PipelineConfig, ProviderConfig};
pub use error::{PipelineError, QueryError, SchemaViolation, ServiceError};
pub use services::ai::{HttpProvider, LlmProvider, RequestClient};
pub use services::ai_types::{ItemOutcome, ProcessingReport};
pub use services::pipeline::Pipeline;
