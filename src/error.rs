use thiserror::Error;

/// Errors that can occur while drawing a stroke into a curve.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum DrawError {
    #[error("the stroke cannot be empty")]
    EmptyStroke,

    #[error("curve fitting failed (status {status})")]
    FitFailed { status: i32 },

    #[error("object transform is not invertible")]
    NonInvertibleTransform,

    #[error("invalid view: {0}")]
    InvalidView(String),

    #[error("failed to load depth buffer: {0}")]
    DepthLoad(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}
