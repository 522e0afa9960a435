use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "lmchat", about = "Local language-model chat service", version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start the API server and an interactive chat session (default)
    Run,
    /// Start only the API server
    Serve,
    /// Connect an interactive chat session to a running server
    Chat,
    /// Print the curated model catalog
    Models,
    /// Load one model, run a single generation, and emit a JSON report
    SmokeTest {
        /// Model identifier to probe
        model: String,
    },
}
