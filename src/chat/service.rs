//! Chat orchestration: persists turns, windows history under the token
//! estimate, builds the prompt, and extracts a clean reply from the raw
//! generation.

use std::error::Error;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::GenerationSettings;
use crate::llm::manager::estimate_tokens;
use crate::llm::{GenerationConfig, ModelManager};
use crate::storage::{ConversationStore, Message};
use crate::utils::{clean_text, truncate_text};

/// Per-request overrides for the configured generation defaults. Mirrors the
/// knobs the web UI exposes.
#[derive(Debug, Clone, Default)]
pub struct MessageOverrides {
    pub temperature: Option<f32>,
    pub max_length: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplyMetadata {
    pub prompt_tokens: usize,
    pub model_config: GenerationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatReply {
    pub response: String,
    pub conversation_id: String,
    pub metadata: ReplyMetadata,
}

pub struct ChatService {
    store: ConversationStore,
    manager: Arc<ModelManager>,
    defaults: GenerationSettings,
}

impl ChatService {
    pub fn new(
        store: ConversationStore,
        manager: Arc<ModelManager>,
        defaults: GenerationSettings,
    ) -> Self {
        Self {
            store,
            manager,
            defaults,
        }
    }

    pub fn store(&self) -> &ConversationStore {
        &self.store
    }

    pub fn manager(&self) -> &Arc<ModelManager> {
        &self.manager
    }

    /// Handles one user turn end to end: persist, window history, generate,
    /// extract, persist the assistant turn, and report metadata.
    pub async fn process_message(
        &self,
        conversation_id: &str,
        user_message: &str,
        overrides: MessageOverrides,
    ) -> Result<ChatReply, Box<dyn Error + Send + Sync>> {
        self.store
            .add_message(conversation_id, "user", user_message, None)?;

        let messages = self
            .store
            .get_messages(conversation_id, Some(self.defaults.max_history_messages));

        // The message just stored is the last entry; history is everything
        // before it.
        let history = &messages[..messages.len().saturating_sub(1)];
        let budget = self.defaults.max_context_tokens.saturating_sub(100);
        let history_text = format_history(history, budget);
        let prompt = build_prompt(&history_text, user_message);

        info!(
            "Prompt length: {} tokens (estimated)",
            self.manager.count_tokens(&prompt)
        );

        let config = GenerationConfig {
            max_length: overrides.max_length.unwrap_or(self.defaults.max_length),
            temperature: overrides.temperature.unwrap_or(self.defaults.temperature),
            top_k: self.defaults.top_k,
            top_p: self.defaults.top_p,
            repetition_penalty: self.defaults.repetition_penalty,
        };

        let generated = self
            .manager
            .generate_response(&prompt, Some(config.clone()))
            .await?;
        let response = extract_response(&generated);
        info!("Generated reply: {}", truncate_text(&response, 120));

        self.store
            .add_message(conversation_id, "assistant", &response, Some(config.clone()))?;

        Ok(ChatReply {
            response,
            conversation_id: conversation_id.to_string(),
            metadata: ReplyMetadata {
                prompt_tokens: estimate_tokens(&prompt),
                model_config: config,
            },
        })
    }
}

/// Formats stored messages as "User:/Assistant:" lines, dropping the oldest
/// lines while the token estimate exceeds `max_tokens` and more than two
/// lines remain. The newest exchange always survives.
pub fn format_history(messages: &[Message], max_tokens: usize) -> String {
    if messages.is_empty() {
        return String::new();
    }

    let mut lines: Vec<String> = messages
        .iter()
        .map(|message| {
            let role = if message.role == "user" {
                "User"
            } else {
                "Assistant"
            };
            format!("{}: {}", role, message.content)
        })
        .collect();

    let mut text = lines.join("\n");
    while estimate_tokens(&text) > max_tokens && lines.len() > 2 {
        lines.remove(0);
        text = lines.join("\n");
    }
    text
}

/// Assembles the prompt: optional history, the new user line, and a trailing
/// "Assistant:" cue for the model to complete.
pub fn build_prompt(history: &str, new_message: &str) -> String {
    if history.is_empty() {
        format!("User: {}\nAssistant:", new_message)
    } else {
        format!("{}\nUser: {}\nAssistant:", history, new_message)
    }
}

/// Extracts a clean reply from raw generated text: cuts at the first point
/// where the model starts the next turn, strips role prefixes it may have
/// echoed, and normalizes whitespace.
pub fn extract_response(generated: &str) -> String {
    let mut response = generated.trim();

    if let Some(index) = response.find("\nUser:") {
        response = response[..index].trim();
    }
    if let Some(index) = response.find("\nAssistant:") {
        response = response[..index].trim();
    }

    for prefix in ["Assistant:", "Bot:", "AI:"] {
        if let Some(stripped) = response.strip_prefix(prefix) {
            response = stripped.trim();
        }
    }

    clean_text(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn message(role: &str, content: &str) -> Message {
        Message {
            role: role.to_string(),
            content: content.to_string(),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn format_history_renders_roles() {
        let messages = vec![message("user", "hi"), message("assistant", "hello there")];
        assert_eq!(
            format_history(&messages, 100),
            "User: hi\nAssistant: hello there"
        );
    }

    #[test]
    fn format_history_drops_oldest_under_budget() {
        let messages = vec![
            message("user", "a very long opening message that costs tokens"),
            message("assistant", "an equally verbose assistant reply here"),
            message("user", "short"),
            message("assistant", "ok"),
        ];
        let formatted = format_history(&messages, 8);
        assert!(!formatted.contains("opening"));
        assert!(formatted.contains("User: short"));
        assert!(formatted.contains("Assistant: ok"));
    }

    #[test]
    fn format_history_keeps_last_two_lines_even_over_budget() {
        let messages = vec![
            message("user", "first message with plenty of words in it"),
            message("assistant", "second message with plenty of words in it"),
        ];
        let formatted = format_history(&messages, 1);
        assert_eq!(formatted.lines().count(), 2);
    }

    #[test]
    fn build_prompt_with_and_without_history() {
        assert_eq!(build_prompt("", "hi"), "User: hi\nAssistant:");
        assert_eq!(
            build_prompt("User: a\nAssistant: b", "hi"),
            "User: a\nAssistant: b\nUser: hi\nAssistant:"
        );
    }

    #[test]
    fn extract_response_cuts_at_next_turn() {
        assert_eq!(
            extract_response(" Sure!\nUser: and then the model rambles"),
            "Sure!"
        );
        assert_eq!(
            extract_response("Fine.\nAssistant: more rambling"),
            "Fine."
        );
    }

    #[test]
    fn extract_response_strips_role_prefixes() {
        assert_eq!(extract_response("Assistant: hello"), "hello");
        assert_eq!(extract_response("Bot: hi"), "hi");
        assert_eq!(extract_response("AI:  hey"), "hey");
    }

    #[test]
    fn extract_response_normalizes_whitespace() {
        assert_eq!(extract_response("  spaced   out\treply "), "spaced out reply");
    }
}
