mod client;
pub mod config;
pub mod types;

pub use client::{GeminiClient, GeminiError};
pub use config::{Config, ConfigBuilder};
