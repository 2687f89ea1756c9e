use thiserror::Error;

/// Alias for Results returning [`ModelError`]
pub type Result<T> = std::result::Result<T, ModelError>;

/// Failures raised by model backends and the bounded invoker
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("http: {0}")]
    Http(#[from] reqwest::Error),

    #[error("api error: HTTP {status}: {message}")]
    Api { status: u16, message: String },

    #[error("malformed model response: {0}")]
    MalformedResponse(String),

    #[error("model json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("embedding backend: {0}")]
    Embedding(String),

    #[error("projection: {0}")]
    Projection(String),

    #[error("missing configuration: {0}")]
    MissingConfig(String),

    #[error("invoker gate closed")]
    GateClosed,
}
