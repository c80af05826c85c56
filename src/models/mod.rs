//! Data models: configuration, errors, and pipeline types.

mod config;
mod error;
mod task;

pub use config::{expand_env_vars, ApiConfig, Config, ConfigError, InputConfig, ModelSpec, PipelineConfig};
pub use error::{ApiError, GlossfillError, Result};
pub use task::{CellKey, Direction, FillStats, GenerationOutcome, Task};
