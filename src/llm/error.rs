use thiserror::Error;

/// Failures surfaced by the model lifecycle manager.
///
/// `LoadFailure` is only ever returned as a structured result (plus an
/// observer notification); `NotLoaded` and `Generation` are raised straight
/// to the caller of `generate_response`.
#[derive(Debug, Error)]
pub enum LlmError {
    /// Generation was attempted with no active model handle.
    #[error("model not loaded, call load_model first")]
    NotLoaded,

    /// The provider could not construct a handle. Carries the provider's
    /// failure text verbatim.
    #[error("{0}")]
    LoadFailure(String),

    /// The provider raised during inference.
    #[error("generation failed: {0}")]
    Generation(String),
}
