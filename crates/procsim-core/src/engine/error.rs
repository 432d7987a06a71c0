use thiserror::Error;

use super::config::ConfigError;
use crate::core::domain::DomainError;
use crate::core::geometry::GeometryError;
use crate::core::models::ModelError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),

    #[error("Geometry construction failed: {0}")]
    Geometry(#[from] GeometryError),

    #[error("Process model '{model}' failed: {source}")]
    Model {
        model: String,
        #[source]
        source: ModelError,
    },

    #[error("The domain has no surface points to trace")]
    NoSurface,

    #[error("Internal logic error: {0}")]
    Internal(String),
}
