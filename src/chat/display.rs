use colored::*;

use crate::server::types::HealthResponse;

/// Prints the health-check result the way the web UI's status dot does.
pub fn display_health(health: Option<&HealthResponse>) {
    match health {
        Some(h) if h.status == "healthy" && h.model_loaded => {
            println!("{}", "Connected, model ready".green());
        }
        Some(h) if h.status == "healthy" => {
            println!(
                "{}",
                "Connected, no model loaded yet (replies will fail)".yellow()
            );
        }
        Some(_) => println!("{}", "Server reported an unhealthy status".red()),
        None => println!("{}", "Could not reach the server".red()),
    }
}

pub fn display_assistant_reply(text: &str) {
    println!("{} {}", "[assistant]".cyan().bold(), text);
}

pub fn display_error(text: &str) {
    println!("{} {}", "Error:".red().bold(), text);
}
