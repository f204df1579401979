use crate::model::Stage;

/// Result type alias for configuration validation
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Configuration contradictions detected before any route is processed.
///
/// Every variant is fatal: a run that hits one of these never starts extraction.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("strategy `{adapter}` for stage `{stage}` sets both `only` and `except`; use one of them")]
    ConflictingFilters { stage: Stage, adapter: String },

    #[error("unknown adapter `{adapter}` configured for stage `{stage}`")]
    UnknownAdapter { stage: Stage, adapter: String },

    #[error("invalid overrides for stage `{stage}`: {message}")]
    InvalidOverride { stage: Stage, message: String },

    #[error("invalid route pattern `{pattern}`: {message}")]
    InvalidPattern { pattern: String, message: String },

    #[error("strategy entry for stage `{stage}` names neither an adapter nor overrides")]
    EmptyDescriptor { stage: Stage },
}

/// Per-route failures. The route is skipped and the run carries on.
#[derive(Debug, thiserror::Error)]
pub enum RouteError {
    #[error("Skipping invalid route {route}: {reason}")]
    InvalidRoute { route: String, reason: String },

    #[error("Skipping route {route}: @hideFromAPIDocumentation was specified")]
    HiddenRoute { route: String },

    #[error("Failed processing route {route} during `{stage}` extraction: {source:#}")]
    Extraction {
        route: String,
        stage: Stage,
        #[source]
        source: anyhow::Error,
    },
}

impl RouteError {
    /// Whether the route was deliberately left out rather than broken.
    pub fn is_skip(&self) -> bool {
        matches!(self, RouteError::InvalidRoute { .. } | RouteError::HiddenRoute { .. })
    }
}
