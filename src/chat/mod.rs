mod display;
mod repl;
pub mod service;

pub use repl::chat_loop;
pub use service::{ChatReply, ChatService, MessageOverrides};
