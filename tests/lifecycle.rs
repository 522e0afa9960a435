//! Lifecycle tests for the model manager, driven by a scripted in-memory
//! provider.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::BoxFuture;

use lmchat::llm::provider::{
    Generation, InferenceProvider, LoadOptions, ProviderError, RawProgress, RawStatus,
    SamplingParams, TextGeneration,
};
use lmchat::llm::{LlmError, ModelManager, ProgressEvent, ProgressObserver, ProgressStatus};

/// What the provider should do for one model id.
enum Outcome {
    /// Emit the given (loaded, total) ticks, then hand out a handle that
    /// answers with `replies` (or fails when `generate_error` is set).
    Success {
        ticks: Vec<(Option<u64>, Option<u64>)>,
        replies: Vec<&'static str>,
        generate_error: Option<&'static str>,
    },
    Failure(&'static str),
}

#[derive(Default)]
struct Counters {
    load_calls: AtomicUsize,
    generate_calls: AtomicUsize,
    last_params: Mutex<Option<SamplingParams>>,
    last_prompt: Mutex<Option<String>>,
}

struct MockProvider {
    outcomes: HashMap<String, Outcome>,
    load_delay: Option<Duration>,
    counters: Arc<Counters>,
}

impl MockProvider {
    fn new() -> Self {
        Self {
            outcomes: HashMap::new(),
            load_delay: None,
            counters: Arc::new(Counters::default()),
        }
    }

    fn with(mut self, model_id: &str, outcome: Outcome) -> Self {
        self.outcomes.insert(model_id.to_string(), outcome);
        self
    }

    fn with_delay(mut self, delay: Duration) -> Self {
        self.load_delay = Some(delay);
        self
    }

    fn counters(&self) -> Arc<Counters> {
        Arc::clone(&self.counters)
    }
}

fn ok_outcome() -> Outcome {
    Outcome::Success {
        ticks: vec![(Some(50), Some(100)), (Some(100), Some(100))],
        replies: vec!["hello from the model"],
        generate_error: None,
    }
}

impl InferenceProvider for MockProvider {
    fn load<'a>(
        &'a self,
        model_id: &'a str,
        options: LoadOptions,
    ) -> BoxFuture<'a, Result<Arc<dyn TextGeneration>, ProviderError>> {
        Box::pin(async move {
            self.counters.load_calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.load_delay {
                tokio::time::sleep(delay).await;
            }
            match self.outcomes.get(model_id) {
                Some(Outcome::Failure(message)) => Err((*message).into()),
                Some(Outcome::Success {
                    ticks,
                    replies,
                    generate_error,
                }) => {
                    if let Some(hook) = &options.progress {
                        for (loaded, total) in ticks {
                            hook(RawProgress {
                                status: RawStatus::Progress,
                                loaded: *loaded,
                                total: *total,
                                file: Some("model.bin".to_string()),
                            });
                        }
                        hook(RawProgress {
                            status: RawStatus::Done,
                            loaded: None,
                            total: None,
                            file: Some("model.bin".to_string()),
                        });
                    }
                    Ok(Arc::new(MockHandle {
                        replies: replies.iter().map(|r| r.to_string()).collect(),
                        generate_error: *generate_error,
                        counters: Arc::clone(&self.counters),
                    }) as Arc<dyn TextGeneration>)
                }
                None => Err(format!("model not found: {}", model_id).into()),
            }
        })
    }
}

struct MockHandle {
    replies: Vec<String>,
    generate_error: Option<&'static str>,
    counters: Arc<Counters>,
}

impl TextGeneration for MockHandle {
    fn generate<'a>(
        &'a self,
        prompt: &'a str,
        params: SamplingParams,
    ) -> BoxFuture<'a, Result<Vec<Generation>, ProviderError>> {
        Box::pin(async move {
            self.counters.generate_calls.fetch_add(1, Ordering::SeqCst);
            *self.counters.last_params.lock().unwrap() = Some(params);
            *self.counters.last_prompt.lock().unwrap() = Some(prompt.to_string());
            if let Some(message) = self.generate_error {
                return Err(message.into());
            }
            Ok(self
                .replies
                .iter()
                .map(|text| Generation {
                    generated_text: text.clone(),
                })
                .collect())
        })
    }
}

fn recording_observer() -> (ProgressObserver, Arc<Mutex<Vec<ProgressEvent>>>) {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    let observer: ProgressObserver = Box::new(move |event| sink.lock().unwrap().push(event));
    (observer, events)
}

fn manager_with(provider: MockProvider) -> ModelManager {
    ModelManager::new(Arc::new(provider), true)
}

#[tokio::test]
async fn successful_load_reports_progress_and_state() {
    let manager = manager_with(MockProvider::new().with("demo-model", ok_outcome()));
    let (observer, events) = recording_observer();

    let report = manager.load_model("demo-model", Some(observer)).await.unwrap();
    assert_eq!(report.model, "demo-model");

    assert!(manager.is_model_loaded());
    assert_eq!(manager.current_model().as_deref(), Some("demo-model"));
    let info = manager.model_info();
    assert!(info.is_loaded);
    assert_eq!(info.loading_progress, 100.0);

    let events = events.lock().unwrap();
    assert_eq!(events.len(), 3);
    assert_eq!(events[0].status, ProgressStatus::Progress);
    assert_eq!(events[0].progress, 50.0);
    assert_eq!(events[0].loaded, Some(50));
    assert_eq!(events[0].total, Some(100));
    assert_eq!(events[1].status, ProgressStatus::Progress);
    assert_eq!(events[1].progress, 100.0);
    assert_eq!(events[2].status, ProgressStatus::Done);
    assert_eq!(events[2].progress, 100.0);
}

#[tokio::test]
async fn failed_load_resets_state_even_after_success() {
    let manager = manager_with(
        MockProvider::new()
            .with("good-model", ok_outcome())
            .with("bad-model", Outcome::Failure("model not found")),
    );

    manager.load_model("good-model", None).await.unwrap();
    assert!(manager.is_model_loaded());

    let (observer, events) = recording_observer();
    let err = manager
        .load_model("bad-model", Some(observer))
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "model not found");

    assert!(!manager.is_model_loaded());
    assert_eq!(manager.current_model(), None);

    let events = events.lock().unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].status, ProgressStatus::Error);
    assert_eq!(events[0].message, "model not found");
    assert_eq!(events[0].progress, 0.0);
}

#[tokio::test]
async fn ticks_without_usable_total_are_skipped() {
    let manager = manager_with(MockProvider::new().with(
        "demo-model",
        Outcome::Success {
            ticks: vec![
                (Some(10), None),
                (Some(20), Some(0)),
                (None, Some(100)),
                (Some(25), Some(100)),
                (Some(100), Some(100)),
            ],
            replies: vec!["ok"],
            generate_error: None,
        },
    ));
    let (observer, events) = recording_observer();

    manager.load_model("demo-model", Some(observer)).await.unwrap();

    let events = events.lock().unwrap();
    let progress: Vec<f32> = events
        .iter()
        .filter(|e| e.status == ProgressStatus::Progress)
        .map(|e| e.progress)
        .collect();
    assert_eq!(progress, vec![25.0, 100.0]);
}

#[tokio::test]
async fn progress_is_monotonic_with_exactly_one_terminal_event() {
    let manager = manager_with(MockProvider::new().with(
        "demo-model",
        Outcome::Success {
            ticks: vec![
                (Some(10), Some(100)),
                (Some(30), Some(100)),
                (Some(60), Some(100)),
                (Some(100), Some(100)),
            ],
            replies: vec!["ok"],
            generate_error: None,
        },
    ));
    let (observer, events) = recording_observer();

    manager.load_model("demo-model", Some(observer)).await.unwrap();

    let events = events.lock().unwrap();
    let mut last = 0.0_f32;
    for event in events.iter() {
        assert!(event.progress >= last, "progress went backwards");
        last = event.progress;
    }
    let done_count = events
        .iter()
        .filter(|e| e.status == ProgressStatus::Done)
        .count();
    let error_count = events
        .iter()
        .filter(|e| e.status == ProgressStatus::Error)
        .count();
    assert_eq!(done_count, 1);
    assert_eq!(error_count, 0);
    assert_eq!(events.last().unwrap().status, ProgressStatus::Done);
}

#[tokio::test]
async fn unload_is_idempotent() {
    let manager = manager_with(MockProvider::new().with("demo-model", ok_outcome()));
    manager.load_model("demo-model", None).await.unwrap();

    manager.unload_model();
    let after_first = manager.model_info();
    manager.unload_model();
    let after_second = manager.model_info();

    assert!(!after_first.is_loaded);
    assert_eq!(after_first.current_model, None);
    assert_eq!(after_first.loading_progress, 0.0);
    assert!(!after_second.is_loaded);
    assert_eq!(after_second.current_model, None);
    assert_eq!(after_second.loading_progress, 0.0);
}

#[tokio::test]
async fn failed_switch_leaves_manager_unloaded() {
    let manager = manager_with(
        MockProvider::new()
            .with("model-a", ok_outcome())
            .with("model-b", Outcome::Failure("download interrupted")),
    );

    manager.load_model("model-a", None).await.unwrap();
    let err = manager.switch_model("model-b", None).await.unwrap_err();
    assert!(matches!(err, LlmError::LoadFailure(_)));

    // model-a is not restored.
    assert!(!manager.is_model_loaded());
    assert_eq!(manager.current_model(), None);
}

#[tokio::test]
async fn successful_switch_replaces_the_model() {
    let manager = manager_with(
        MockProvider::new()
            .with("model-a", ok_outcome())
            .with("model-b", ok_outcome()),
    );

    manager.load_model("model-a", None).await.unwrap();
    manager.switch_model("model-b", None).await.unwrap();

    assert!(manager.is_model_loaded());
    assert_eq!(manager.current_model().as_deref(), Some("model-b"));
}

#[tokio::test]
async fn generate_before_load_fails_fast_without_provider_contact() {
    let provider = MockProvider::new().with("demo-model", ok_outcome());
    let counters = provider.counters();
    let manager = manager_with(provider);

    let err = manager.generate_response("hi", None).await.unwrap_err();
    assert!(matches!(err, LlmError::NotLoaded));
    assert_eq!(counters.load_calls.load(Ordering::SeqCst), 0);
    assert_eq!(counters.generate_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn generate_returns_first_candidate_only() {
    let manager = manager_with(MockProvider::new().with(
        "demo-model",
        Outcome::Success {
            ticks: vec![],
            replies: vec!["first candidate", "second candidate"],
            generate_error: None,
        },
    ));
    manager.load_model("demo-model", None).await.unwrap();

    let text = manager.generate_response("hi", None).await.unwrap();
    assert_eq!(text, "first candidate");
}

#[tokio::test]
async fn generate_failure_propagates_to_caller() {
    let manager = manager_with(MockProvider::new().with(
        "demo-model",
        Outcome::Success {
            ticks: vec![],
            replies: vec![],
            generate_error: Some("inference exploded"),
        },
    ));
    manager.load_model("demo-model", None).await.unwrap();

    let err = manager.generate_response("hi", None).await.unwrap_err();
    assert!(matches!(err, LlmError::Generation(_)));
    assert!(err.to_string().contains("inference exploded"));

    // A generation failure does not unload the model.
    assert!(manager.is_model_loaded());
}

#[tokio::test]
async fn generate_fills_config_defaults_field_by_field() {
    let provider = MockProvider::new().with("demo-model", ok_outcome());
    let counters = provider.counters();
    let manager = manager_with(provider);
    manager.load_model("demo-model", None).await.unwrap();

    manager.generate_response("hi", None).await.unwrap();

    let params = counters.last_params.lock().unwrap().clone().unwrap();
    assert_eq!(params.max_new_tokens, 100);
    assert_eq!(params.temperature, 0.7);
    assert_eq!(params.top_k, 50);
    assert_eq!(params.top_p, 0.9);
    assert_eq!(params.repetition_penalty, 1.2);
    assert!(params.do_sample);
    assert!(!params.return_full_text);

    let prompt = counters.last_prompt.lock().unwrap().clone().unwrap();
    assert_eq!(prompt, "hi");
}

#[tokio::test]
async fn overlapping_load_is_rejected() {
    let provider = MockProvider::new()
        .with("slow-model", ok_outcome())
        .with_delay(Duration::from_millis(200));
    let manager = Arc::new(ModelManager::new(Arc::new(provider), true));

    let background = {
        let manager = Arc::clone(&manager);
        tokio::spawn(async move { manager.load_model("slow-model", None).await })
    };

    tokio::time::sleep(Duration::from_millis(50)).await;
    let (observer, events) = recording_observer();
    let err = manager
        .load_model("slow-model", Some(observer))
        .await
        .unwrap_err();
    assert!(matches!(err, LlmError::LoadFailure(_)));
    assert!(err.to_string().contains("already in progress"));
    {
        let events = events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].status, ProgressStatus::Error);
    }

    // The original load is unaffected.
    background.await.unwrap().unwrap();
    assert!(manager.is_model_loaded());
    assert_eq!(manager.current_model().as_deref(), Some("slow-model"));
}

#[tokio::test]
async fn count_tokens_is_a_cheap_estimate_independent_of_state() {
    let manager = manager_with(MockProvider::new().with("demo-model", ok_outcome()));

    assert_eq!(manager.count_tokens(""), 0);
    assert_eq!(manager.count_tokens("abcd"), 1);
    assert_eq!(manager.count_tokens("abcde"), 2);
    assert_eq!(manager.count_tokens(&"x".repeat(403)), 101);

    manager.load_model("demo-model", None).await.unwrap();
    assert_eq!(manager.count_tokens("abcde"), 2);
}
