// src/core/mod.rs

//! The central module containing the connection, request pipelining, and
//! reply handling logic of the driver.

pub mod client;
pub mod errors;
pub mod protocol;
pub mod registry;
pub mod table;

pub use client::Client;
pub use errors::ClientError;
pub use protocol::Response;
