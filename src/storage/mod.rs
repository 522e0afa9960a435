//! File-backed conversation persistence: one JSON document per conversation
//! under the configured data directory.

use std::error::Error;
use std::fs;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::llm::GenerationConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversationMetadata {
    pub total_messages: usize,
    /// Sampling configuration used for the most recent assistant turn.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_config: Option<GenerationConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub conversation_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub messages: Vec<Message>,
    pub metadata: ConversationMetadata,
}

pub struct ConversationStore {
    data_dir: PathBuf,
}

impl ConversationStore {
    /// Creates a store rooted at `data_dir`, creating the directory if
    /// needed.
    pub fn new(data_dir: PathBuf) -> Result<Self, Box<dyn Error + Send + Sync>> {
        fs::create_dir_all(&data_dir)?;
        Ok(Self { data_dir })
    }

    /// Creates an empty conversation and returns its id.
    pub fn create_conversation(&self) -> Result<String, Box<dyn Error + Send + Sync>> {
        let conversation_id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let conversation = Conversation {
            conversation_id: conversation_id.clone(),
            created_at: now,
            updated_at: now,
            messages: Vec::new(),
            metadata: ConversationMetadata::default(),
        };

        self.save_conversation(&conversation)?;
        info!("Created new conversation: {}", conversation_id);
        Ok(conversation_id)
    }

    /// Appends a message to an existing conversation. Errors when the
    /// conversation does not exist.
    pub fn add_message(
        &self,
        conversation_id: &str,
        role: &str,
        content: &str,
        model_config: Option<GenerationConfig>,
    ) -> Result<(), Box<dyn Error + Send + Sync>> {
        let mut conversation = self
            .load_conversation(conversation_id)
            .ok_or_else(|| format!("Conversation {} not found", conversation_id))?;

        conversation.messages.push(Message {
            role: role.to_string(),
            content: content.to_string(),
            timestamp: Utc::now(),
        });
        conversation.updated_at = Utc::now();
        conversation.metadata.total_messages = conversation.messages.len();
        if model_config.is_some() {
            conversation.metadata.model_config = model_config;
        }

        self.save_conversation(&conversation)
    }

    /// Loads a conversation, or `None` when it is missing or unreadable.
    pub fn load_conversation(&self, conversation_id: &str) -> Option<Conversation> {
        let path = self.file_path(conversation_id);
        if !path.exists() {
            return None;
        }

        match fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(conversation) => Some(conversation),
                Err(e) => {
                    warn!("Error parsing conversation {}: {}", conversation_id, e);
                    None
                }
            },
            Err(e) => {
                warn!("Error reading conversation {}: {}", conversation_id, e);
                None
            }
        }
    }

    /// Returns the messages of a conversation, optionally only the last
    /// `limit`. Missing conversations yield an empty list.
    pub fn get_messages(&self, conversation_id: &str, limit: Option<usize>) -> Vec<Message> {
        let Some(conversation) = self.load_conversation(conversation_id) else {
            return Vec::new();
        };

        let messages = conversation.messages;
        match limit {
            Some(limit) if messages.len() > limit => {
                messages[messages.len() - limit..].to_vec()
            }
            _ => messages,
        }
    }

    /// Lists the ids of all stored conversations.
    pub fn list_conversations(&self) -> Vec<String> {
        let Ok(entries) = fs::read_dir(&self.data_dir) else {
            return Vec::new();
        };
        entries
            .filter_map(Result::ok)
            .filter_map(|entry| {
                let path = entry.path();
                if path.extension().is_some_and(|ext| ext == "json") {
                    path.file_stem().map(|s| s.to_string_lossy().to_string())
                } else {
                    None
                }
            })
            .collect()
    }

    /// Deletes a conversation; returns whether anything was removed.
    pub fn delete_conversation(&self, conversation_id: &str) -> bool {
        let path = self.file_path(conversation_id);
        if path.exists() && fs::remove_file(&path).is_ok() {
            info!("Deleted conversation: {}", conversation_id);
            true
        } else {
            false
        }
    }

    fn save_conversation(
        &self,
        conversation: &Conversation,
    ) -> Result<(), Box<dyn Error + Send + Sync>> {
        let path = self.file_path(&conversation.conversation_id);
        let content = serde_json::to_string_pretty(conversation)?;
        fs::write(path, content)?;
        Ok(())
    }

    fn file_path(&self, conversation_id: &str) -> PathBuf {
        self.data_dir.join(format!("{}.json", conversation_id))
    }
}
