// src/core/errors.rs

//! Defines the primary error type for the client driver.

use std::sync::Arc;
use thiserror::Error;

/// Every failure a caller of the driver can observe.
///
/// A decode failure is deliberately absent: a malformed reply is turned into an
/// unsuccessful [`Response`](crate::core::protocol::Response) instead, so this
/// channel stays reserved for connection and transport problems.
#[derive(Error, Debug, Clone)]
pub enum ClientError {
    #[error("Not connected")]
    NotConnected,

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Empty query")]
    EmptyCommand,

    #[error("Timed out while connecting")]
    Timeout,

    #[error("Failed to connect: {0}")]
    Dial(Arc<std::io::Error>),

    #[error("IO Error: {0}")]
    Io(Arc<std::io::Error>),

    /// Writing a rendered result failed. The connection is unaffected.
    #[error("Output Error: {0}")]
    Output(Arc<std::io::Error>),

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("{0}")]
    OperationFailed(String),

    #[error("Authentication failed: {0}")]
    AuthFailed(String),
}

impl ClientError {
    /// True for errors that mean the connection can no longer carry requests.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ClientError::NotConnected | ClientError::ConnectionClosed | ClientError::Io(_)
        )
    }
}

impl PartialEq for ClientError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (ClientError::Io(e1), ClientError::Io(e2))
            | (ClientError::Dial(e1), ClientError::Dial(e2))
            | (ClientError::Output(e1), ClientError::Output(e2)) => {
                e1.kind() == e2.kind() && e1.to_string() == e2.to_string()
            }
            (ClientError::InvalidArgument(s1), ClientError::InvalidArgument(s2)) => s1 == s2,
            (ClientError::OperationFailed(s1), ClientError::OperationFailed(s2)) => s1 == s2,
            (ClientError::AuthFailed(s1), ClientError::AuthFailed(s2)) => s1 == s2,
            _ => core::mem::discriminant(self) == core::mem::discriminant(other),
        }
    }
}

impl From<std::io::Error> for ClientError {
    fn from(e: std::io::Error) -> Self {
        ClientError::Io(Arc::new(e))
    }
}
