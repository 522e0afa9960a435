// Declare submodules
pub mod catalog;
pub mod error;
pub mod events;
pub mod generation;
pub mod manager;
pub mod provider;

// Re-export types for external use
pub use error::LlmError;
pub use events::{ProgressEvent, ProgressObserver, ProgressStatus};
pub use generation::GenerationConfig;
pub use manager::{LoadReport, ModelInfo, ModelManager};
