//! Contract between the lifecycle manager and an external inference
//! provider. The manager never sees provider internals, only a factory for
//! opaque generation handles plus raw progress ticks during a load.

use std::error::Error;
use std::sync::Arc;

use futures::future::BoxFuture;

mod huggingface;

pub use huggingface::HuggingFaceProvider;

pub type ProviderError = Box<dyn Error + Send + Sync>;

/// Stage of a raw provider tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawStatus {
    Progress,
    Done,
}

/// Unnormalized progress tick emitted by a provider while it fetches and
/// initializes model files. `total` may be absent when the remote end does
/// not announce a size.
#[derive(Debug, Clone)]
pub struct RawProgress {
    pub status: RawStatus,
    pub loaded: Option<u64>,
    pub total: Option<u64>,
    pub file: Option<String>,
}

/// Shared so a provider can report from whichever task drives the download.
pub type ProgressHook = Arc<dyn Fn(RawProgress) + Send + Sync>;

/// Options for one handle construction.
pub struct LoadOptions {
    pub quantized: bool,
    pub progress: Option<ProgressHook>,
}

/// One generated candidate.
#[derive(Debug, Clone)]
pub struct Generation {
    pub generated_text: String,
}

/// Resolved sampling options handed to a generation handle.
#[derive(Debug, Clone)]
pub struct SamplingParams {
    pub max_new_tokens: usize,
    pub temperature: f32,
    pub top_k: i32,
    pub top_p: f32,
    pub repetition_penalty: f32,
    pub do_sample: bool,
    /// When false, the prompt echo is excluded from the result.
    pub return_full_text: bool,
}

/// A loaded, ready-to-run model.
pub trait TextGeneration: Send + Sync {
    fn generate<'a>(
        &'a self,
        prompt: &'a str,
        params: SamplingParams,
    ) -> BoxFuture<'a, Result<Vec<Generation>, ProviderError>>;
}

/// Factory for generation handles.
pub trait InferenceProvider: Send + Sync {
    fn load<'a>(
        &'a self,
        model_id: &'a str,
        options: LoadOptions,
    ) -> BoxFuture<'a, Result<Arc<dyn TextGeneration>, ProviderError>>;
}
