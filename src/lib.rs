pub mod chat;
pub mod cli;
pub mod config;
pub mod llm;
pub mod server;
pub mod smoke;
pub mod storage;
pub mod utils;
