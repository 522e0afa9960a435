//! Load-and-generate probe for a single model, with machine-readable output.
//!
//! Prints one JSON report between `__JSON_START__` / `__JSON_END__` marker
//! lines so wrapper scripts can scrape it out of the surrounding progress
//! noise.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use tracing::info;

use crate::config::Settings;
use crate::llm::provider::HuggingFaceProvider;
use crate::llm::{ModelManager, ProgressObserver, ProgressStatus};
use crate::utils::truncate_text;

const PROBE_PROMPT: &str = "User: Hello, how are you?\nAssistant:";

#[derive(Debug, Serialize)]
pub struct SmokeReport {
    pub model: String,
    pub status: String,
    pub error: Option<String>,
    pub load_time: Option<String>,
    pub generate_time: Option<String>,
    pub output: Option<String>,
}

/// Loads `model_id` through the real provider, runs one generation, and
/// prints the report. Returns whether the probe succeeded.
pub async fn run(settings: &Settings, model_id: &str) -> Result<bool> {
    info!("Smoke-testing model: {}", model_id);
    println!("Testing model: {}", model_id);

    let provider = Arc::new(HuggingFaceProvider::new(
        settings.models.directory.clone(),
        settings.generation.context_size,
    ));
    let manager = ModelManager::new(provider, settings.models.quantized);

    let bar = ProgressBar::new(100);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("{prefix:.bold.dim} [{bar:40}] {pos}% {wide_msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    bar.set_prefix("download");
    let observer = download_observer(bar.clone());

    let load_started = Instant::now();
    let report = match manager.load_model(model_id, Some(observer)).await {
        Ok(_) => {
            let load_time = load_started.elapsed();
            bar.finish_and_clear();

            let generate_started = Instant::now();
            match manager.generate_response(PROBE_PROMPT, None).await {
                Ok(output) => {
                    println!("Output: {}", truncate_text(&output, 200));
                    SmokeReport {
                        model: model_id.to_string(),
                        status: "success".to_string(),
                        error: None,
                        load_time: Some(format_duration(load_time)),
                        generate_time: Some(format_duration(generate_started.elapsed())),
                        output: Some(output),
                    }
                }
                Err(e) => SmokeReport {
                    model: model_id.to_string(),
                    status: "failed".to_string(),
                    error: Some(e.to_string()),
                    load_time: Some(format_duration(load_time)),
                    generate_time: None,
                    output: None,
                },
            }
        }
        Err(e) => {
            bar.abandon();
            SmokeReport {
                model: model_id.to_string(),
                status: "failed".to_string(),
                error: Some(e.to_string()),
                load_time: None,
                generate_time: None,
                output: None,
            }
        }
    };

    // Markers delimit the single machine-readable line.
    println!("__JSON_START__");
    println!("{}", serde_json::to_string(&report)?);
    println!("__JSON_END__");

    Ok(report.status == "success")
}

/// Adapts a progress bar to the manager's observer callback.
pub fn download_observer(bar: ProgressBar) -> ProgressObserver {
    Box::new(move |event| match event.status {
        ProgressStatus::Progress => {
            bar.set_position(event.progress as u64);
            bar.set_message(event.message.clone());
        }
        ProgressStatus::Done => bar.set_position(100),
        ProgressStatus::Error => bar.set_message(event.message.clone()),
    })
}

fn format_duration(duration: Duration) -> String {
    format!("{:.1}s", duration.as_secs_f64())
}
