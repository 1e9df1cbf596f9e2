//! PikaBot: a chat client and a thin relay to the Gemini API.

pub mod cli;
pub mod client;
pub mod config;
pub mod gemini_client;
pub mod relay;
