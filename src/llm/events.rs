use serde::Serialize;

/// Status attached to a [`ProgressEvent`].
///
/// A load emits zero or more `Progress` events followed by exactly one
/// terminal event: `Done` on success or `Error` on failure, never both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressStatus {
    Progress,
    Done,
    Error,
}

/// Normalized progress update delivered to a load observer.
#[derive(Debug, Clone, Serialize)]
pub struct ProgressEvent {
    pub status: ProgressStatus,
    /// Percentage in [0, 100].
    pub progress: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loaded: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    pub message: String,
}

impl ProgressEvent {
    pub fn progress(percentage: f32, loaded: u64, total: u64, file: &str) -> Self {
        Self {
            status: ProgressStatus::Progress,
            progress: percentage,
            loaded: Some(loaded),
            total: Some(total),
            file: Some(file.to_string()),
            message: format!("Loading {}: {:.0}%", file, percentage),
        }
    }

    pub fn done() -> Self {
        Self {
            status: ProgressStatus::Done,
            progress: 100.0,
            loaded: None,
            total: None,
            file: None,
            message: "Model loaded successfully".to_string(),
        }
    }

    pub fn error(message: &str) -> Self {
        Self {
            status: ProgressStatus::Error,
            progress: 0.0,
            loaded: None,
            total: None,
            file: None,
            message: message.to_string(),
        }
    }
}

/// Callback supplied per load call. The manager holds it only for the
/// duration of that call and drops it afterwards.
pub type ProgressObserver = Box<dyn Fn(ProgressEvent) + Send + Sync>;
