//! # Craftbridge
//!
//! Relays traffic between a Minecraft server plugin and a Discord guild over
//! a small UDP protocol.
//!
//! ## Core Responsibilities
//!
//! ### Game to Discord
//! The game server sends chat lines and periodic status reports. Chat is
//! posted into the configured chat channel using the configured templates.
//! Status reports (online players, playtime rankings) are merged into one
//! persistent stats message that is edited in place; if that message
//! disappears a new one is posted and its id saved back to the config file.
//!
//! ### Discord to Game
//! Messages posted in the chat channel are forwarded to the game. Posts in
//! the help and suggestions channels get a thread and a greeting, and
//! suggestions get voting reactions.
//!
//! ### Whitelist
//! Approved Java and Bedrock accounts are kept in SQLite. Every change is
//! mirrored to the game server as a `register` or `unregister` message.
//!
//! ## Architecture Design
//!
//! ### Dedicated Receive Thread
//! A blocking UDP receive loop runs on its own thread and hands datagrams to
//! the async side over a channel. It polls a shutdown flag between reads so
//! the bridge can stop it cleanly.
//!
//! ### Single-Threaded Event Loop
//! All handlers run on one executor, one event at a time. The stats cache
//! and the config store are only ever touched from there, so they need no
//! locking.
//!
//! ### Platform Capability
//! The bridge talks to Discord through the [`platform::Platform`] trait with
//! plain ids. [`platform::RecordingPlatform`] stands in for Discord in dry
//! runs and tests.
//!
//! ## Module Organization
//!
//! - `transport`: socket ownership and the receive thread
//! - `sender`: fire-and-forget outbound datagrams
//! - `dispatcher`: routing of decoded game messages
//! - `reconciler` and `display`: the stats message
//! - `events`: handling of Discord messages
//! - `whitelist`: account registrations
//! - `network`: the [`network::Bridge`] that ties it all together
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use bridge::config::ConfigStore;
//! use bridge::network::Bridge;
//! use bridge::platform::RecordingPlatform;
//! use std::sync::Arc;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = ConfigStore::load("config.json")?;
//!     let bridge = Bridge::new(store, Arc::new(RecordingPlatform::new()))?;
//!
//!     // Processes game datagrams and Discord events until Ctrl+C
//!     bridge.run().await;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod discord;
pub mod dispatcher;
pub mod display;
pub mod error;
pub mod events;
pub mod network;
pub mod platform;
pub mod reconciler;
pub mod sender;
pub mod template;
pub mod transport;
pub mod whitelist;
