// src/lib.rs

pub mod config;
pub mod core;

// Re-export
pub use crate::config::ClientConfig;
pub use crate::core::{Client, ClientError, Response};
