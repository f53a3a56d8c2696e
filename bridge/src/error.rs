//! Error types for the bridge.
//!
//! Each layer gets its own enum so a log line tells you where the problem
//! started: the socket, the config file, the chat platform or the database.

use std::net::SocketAddr;

/// Errors raised by the datagram transport.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Binding the local socket failed. Fatal at startup.
    #[error("failed to bind UDP socket to {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// Configuring the bound socket failed.
    #[error("failed to configure UDP socket: {0}")]
    Configure(#[source] std::io::Error),

    /// Spawning the receive thread failed.
    #[error("failed to spawn receive thread: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("send to {addr} failed: {source}")]
    Send {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("config file {path} is not valid: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid UDP endpoint {0}")]
    Endpoint(String),
}

/// Failures reported by the chat platform.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlatformError {
    #[error("{what} {id} not found")]
    NotFound { what: &'static str, id: u64 },

    #[error("invalid {what} id {id}")]
    InvalidId { what: &'static str, id: u64 },

    #[error("platform request failed: {0}")]
    Request(String),
}

#[derive(Debug, thiserror::Error)]
pub enum WhitelistError {
    #[error("'{0}' is not a valid Minecraft username")]
    InvalidUsername(String),

    #[error(transparent)]
    AccountType(#[from] protocol::UnknownAccountType),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Startup failures of the bridge as a whole.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}
