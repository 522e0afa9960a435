//! Interactive chat session against a running lmchat server.

use std::error::Error;
use std::io::Write;

use colored::*;
use rustyline::DefaultEditor;
use serde_json::json;

use super::display::{display_assistant_reply, display_error, display_health};
use crate::config::Settings;
use crate::llm::catalog;
use crate::server::types::{
    ChatResponse, CreateConversationResponse, ErrorResponse, HealthResponse,
};

fn print_help() {
    println!("\n{}", "lmchat commands".cyan());
    println!("{}", "=".repeat(50).bright_cyan());
    println!("{} - Exit the chat", "exit, bye, quit".green());
    println!("{}            - Show this help message", "help".green());
    println!("{}           - Clear the screen", "clear".green());
    println!("{}             - Start a new conversation", "new".green());
    println!("{}          - List the curated model catalog", "models".green());
    println!("{}    - Override sampling temperature", "set temp <v>".green());
    println!("{}     - Override reply length in tokens", "set len <n>".green());
    println!("Anything else is sent to the model as a chat message.\n");
}

/// Runs the REPL until the user exits. Talks to the server over HTTP so the
/// session behaves exactly like the web UI.
pub async fn chat_loop(settings: &Settings) -> Result<(), Box<dyn Error + Send + Sync>> {
    println!("Starting chat session");
    print_help();

    let client = reqwest::Client::new();
    let server_url = format!("http://{}:{}", settings.server.host, settings.server.port);

    let health = check_health(&client, &server_url).await;
    display_health(health.as_ref());

    let mut conversation_id = create_conversation(&client, &server_url).await;
    if conversation_id.is_some() {
        println!("{}", "New chat created. Say something!".bright_black());
    }

    let mut temperature: Option<f32> = None;
    let mut max_length: Option<usize> = None;

    let mut rl = DefaultEditor::new()?;

    loop {
        let readline = rl.readline("[you] > ");
        let input = match readline {
            Ok(line) => line,
            Err(_) => {
                println!("Goodbye!");
                break;
            }
        };

        let input = input.trim();
        if input.is_empty() {
            continue;
        }
        let _ = rl.add_history_entry(input);

        match input.to_lowercase().as_str() {
            "exit" | "bye" | "quit" => {
                println!("Goodbye!");
                break;
            }
            "help" => print_help(),
            "clear" => {
                print!("\x1B[2J\x1B[1;1H");
                std::io::stdout().flush()?;
            }
            "new" => {
                conversation_id = create_conversation(&client, &server_url).await;
                if conversation_id.is_some() {
                    println!("{}", "New chat created.".bright_black());
                }
            }
            "models" => catalog::display_catalog(),
            command if command.starts_with("set temp ") => {
                match command["set temp ".len()..].trim().parse::<f32>() {
                    Ok(value) => {
                        temperature = Some(value);
                        println!("Temperature set to {}", value);
                    }
                    Err(_) => println!("Usage: set temp <value>"),
                }
            }
            command if command.starts_with("set len ") => {
                match command["set len ".len()..].trim().parse::<usize>() {
                    Ok(value) => {
                        max_length = Some(value);
                        println!("Max length set to {}", value);
                    }
                    Err(_) => println!("Usage: set len <tokens>"),
                }
            }
            _ => {
                // Lazily create a conversation if the first one failed.
                if conversation_id.is_none() {
                    conversation_id = create_conversation(&client, &server_url).await;
                }
                let Some(id) = conversation_id.as_deref() else {
                    display_error("no conversation available; is the server running?");
                    continue;
                };
                send_message(&client, &server_url, id, input, temperature, max_length).await;
            }
        }
    }

    Ok(())
}

async fn check_health(client: &reqwest::Client, server_url: &str) -> Option<HealthResponse> {
    let response = client
        .get(format!("{}/api/health", server_url))
        .send()
        .await
        .ok()?;
    response.json::<HealthResponse>().await.ok()
}

async fn create_conversation(client: &reqwest::Client, server_url: &str) -> Option<String> {
    let response = client
        .post(format!("{}/api/conversations", server_url))
        .send()
        .await
        .ok()?;
    let body = response.json::<CreateConversationResponse>().await.ok()?;
    body.success.then_some(body.conversation_id)
}

async fn send_message(
    client: &reqwest::Client,
    server_url: &str,
    conversation_id: &str,
    message: &str,
    temperature: Option<f32>,
    max_length: Option<usize>,
) {
    let url = format!(
        "{}/api/conversations/{}/messages",
        server_url, conversation_id
    );
    let body = json!({
        "message": message,
        "temperature": temperature,
        "max_length": max_length,
    });

    let response = match client.post(&url).json(&body).send().await {
        Ok(response) => response,
        Err(e) => {
            display_error(&format!("request failed: {}", e));
            return;
        }
    };

    if response.status().is_success() {
        match response.json::<ChatResponse>().await {
            Ok(reply) => display_assistant_reply(&reply.response),
            Err(e) => display_error(&format!("bad response body: {}", e)),
        }
    } else {
        match response.json::<ErrorResponse>().await {
            Ok(err) => display_error(&err.error),
            Err(e) => display_error(&format!("request rejected: {}", e)),
        }
    }
}
