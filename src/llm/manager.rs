//! Model lifecycle manager: owns the load/unload/switch/generate state
//! machine for a single active model handle.
//!
//! Error policy is deliberately asymmetric. `load_model` absorbs every
//! provider failure into a structured result plus an observer notification,
//! because the load path drives a progress UI. `generate_response` propagates
//! provider failures to the caller, who holds an open chat turn and decides
//! retry or abort. Do not unify the two.

use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;
use tracing::{error, info};

use super::error::LlmError;
use super::events::{ProgressEvent, ProgressObserver};
use super::generation::GenerationConfig;
use super::provider::{
    InferenceProvider, LoadOptions, ProgressHook, RawStatus, SamplingParams, TextGeneration,
};

/// Point-in-time snapshot of the lifecycle state. Not synchronized with an
/// in-flight load; callers get whatever was true at the moment of the call.
#[derive(Debug, Clone, Serialize)]
pub struct ModelInfo {
    pub current_model: Option<String>,
    pub is_loaded: bool,
    pub loading_progress: f32,
}

/// Successful load result.
#[derive(Debug, Clone)]
pub struct LoadReport {
    pub model: String,
}

struct LifecycleState {
    handle: Option<Arc<dyn TextGeneration>>,
    current_model: Option<String>,
    is_loaded: bool,
    loading_progress: f32,
    load_in_flight: bool,
}

impl LifecycleState {
    fn empty() -> Self {
        Self {
            handle: None,
            current_model: None,
            is_loaded: false,
            loading_progress: 0.0,
            load_in_flight: false,
        }
    }

    fn reset(&mut self) {
        self.handle = None;
        self.current_model = None;
        self.is_loaded = false;
        self.loading_progress = 0.0;
    }
}

/// Manages at most one loaded model at a time. Each instance is independent;
/// there is no process-wide singleton.
pub struct ModelManager {
    provider: Arc<dyn InferenceProvider>,
    quantized: bool,
    state: Arc<Mutex<LifecycleState>>,
}

impl ModelManager {
    pub fn new(provider: Arc<dyn InferenceProvider>, quantized: bool) -> Self {
        Self {
            provider,
            quantized,
            state: Arc::new(Mutex::new(LifecycleState::empty())),
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, LifecycleState> {
        // A panic while holding the lock cannot corrupt the state machine
        // (every mutation is a whole-field assignment), so recover the guard.
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Loads a model through the provider, forwarding its progress ticks to
    /// `observer` as normalized percentage events.
    ///
    /// Any provider failure is caught: the observer receives one terminal
    /// `Error` event, the manager resets to the unloaded state, and the
    /// failure text is returned as `LlmError::LoadFailure`. A second load
    /// while one is in flight is rejected the same way.
    pub async fn load_model(
        &self,
        model_id: &str,
        observer: Option<ProgressObserver>,
    ) -> Result<LoadReport, LlmError> {
        let observer = observer.map(Arc::new);

        {
            let mut state = self.lock_state();
            if state.load_in_flight {
                drop(state);
                let message = "another model load is already in progress".to_string();
                if let Some(obs) = &observer {
                    obs(ProgressEvent::error(&message));
                }
                return Err(LlmError::LoadFailure(message));
            }
            state.load_in_flight = true;
            // The previous handle stays in place until the new one is
            // constructed, but the manager reports unloaded for the whole
            // attempt.
            state.is_loaded = false;
            state.loading_progress = 0.0;
        }

        info!("Loading model: {}", model_id);

        let hook = self.progress_hook(observer.clone());
        let result = self
            .provider
            .load(
                model_id,
                LoadOptions {
                    quantized: self.quantized,
                    progress: Some(hook),
                },
            )
            .await;

        match result {
            Ok(handle) => {
                {
                    let mut state = self.lock_state();
                    state.handle = Some(handle);
                    state.current_model = Some(model_id.to_string());
                    state.is_loaded = true;
                    state.loading_progress = 100.0;
                    state.load_in_flight = false;
                }
                if let Some(obs) = &observer {
                    obs(ProgressEvent::done());
                }
                info!("Model loaded successfully: {}", model_id);
                Ok(LoadReport {
                    model: model_id.to_string(),
                })
            }
            Err(e) => {
                let message = e.to_string();
                error!("Error loading model {}: {}", model_id, message);
                {
                    let mut state = self.lock_state();
                    state.reset();
                    state.load_in_flight = false;
                }
                if let Some(obs) = &observer {
                    obs(ProgressEvent::error(&message));
                }
                Err(LlmError::LoadFailure(message))
            }
        }
    }

    /// Builds the raw-tick hook handed to the provider. Ticks without a
    /// usable total are skipped entirely; `Done` ticks are ignored because
    /// the single terminal event is emitted by `load_model` itself.
    fn progress_hook(&self, observer: Option<Arc<ProgressObserver>>) -> ProgressHook {
        let state = Arc::clone(&self.state);
        Arc::new(move |tick: super::provider::RawProgress| {
            if tick.status != RawStatus::Progress {
                return;
            }
            let (Some(loaded), Some(total)) = (tick.loaded, tick.total) else {
                return;
            };
            if total == 0 {
                return;
            }
            let percentage = (loaded as f32 / total as f32) * 100.0;
            if let Ok(mut state) = state.lock() {
                state.loading_progress = percentage;
            }
            if let Some(obs) = &observer {
                let file = tick.file.as_deref().unwrap_or("model");
                obs(ProgressEvent::progress(percentage, loaded, total, file));
            }
        })
    }

    /// Generates text with the currently loaded model.
    ///
    /// Fails fast with `NotLoaded` before touching the handle; provider
    /// failures propagate as `Generation` errors.
    pub async fn generate_response(
        &self,
        prompt: &str,
        config: Option<GenerationConfig>,
    ) -> Result<String, LlmError> {
        let handle = {
            let state = self.lock_state();
            if !state.is_loaded {
                return Err(LlmError::NotLoaded);
            }
            state.handle.clone().ok_or(LlmError::NotLoaded)?
        };

        let config = config.unwrap_or_default();
        let params = SamplingParams {
            max_new_tokens: config.max_length,
            temperature: config.temperature,
            top_k: config.top_k,
            top_p: config.top_p,
            repetition_penalty: config.repetition_penalty,
            do_sample: true,
            return_full_text: false,
        };

        let outputs = handle
            .generate(prompt, params)
            .await
            .map_err(|e| LlmError::Generation(e.to_string()))?;

        // Single top candidate only; multi-candidate selection is not
        // supported.
        outputs
            .into_iter()
            .next()
            .map(|g| g.generated_text)
            .ok_or_else(|| LlmError::Generation("provider returned no candidates".to_string()))
    }

    /// Unloads the current model, then loads `new_model_id`. Never holds two
    /// handles at once. Not transactional: if the new load fails the manager
    /// stays unloaded and the prior model is not restored.
    pub async fn switch_model(
        &self,
        new_model_id: &str,
        observer: Option<ProgressObserver>,
    ) -> Result<LoadReport, LlmError> {
        self.unload_model();
        self.load_model(new_model_id, observer).await
    }

    /// Clears the handle and resets the lifecycle state. Idempotent and
    /// infallible; dropping the last handle reference is what actually
    /// releases the model's memory.
    pub fn unload_model(&self) {
        let mut state = self.lock_state();
        let had_model = state.current_model.take();
        state.reset();
        if let Some(model) = had_model {
            info!("Model unloaded: {}", model);
        }
    }

    /// Rough token estimate, about four characters per token. Kept cheap and
    /// synchronous on purpose; callers budget history with it, and upgrading
    /// it to real tokenization would break that contract.
    pub fn count_tokens(&self, text: &str) -> usize {
        estimate_tokens(text)
    }

    pub fn model_info(&self) -> ModelInfo {
        let state = self.lock_state();
        ModelInfo {
            current_model: state.current_model.clone(),
            is_loaded: state.is_loaded,
            loading_progress: state.loading_progress,
        }
    }

    pub fn is_model_loaded(&self) -> bool {
        self.lock_state().is_loaded
    }

    pub fn current_model(&self) -> Option<String> {
        self.lock_state().current_model.clone()
    }
}

/// Approximate token count: `ceil(chars / 4)`. An estimate, not a tokenizer.
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(4)
}
