//! Capability interface the bridge uses to talk to the chat platform.
//!
//! The bridge never holds platform objects; it only calls these operations
//! with plain ids. [`DiscordPlatform`](crate::discord::DiscordPlatform) is the
//! production implementation, [`RecordingPlatform`] keeps everything in
//! memory for dry runs and tests.

use crate::display::Display;
use crate::error::PlatformError;
use async_trait::async_trait;
use log::info;
use std::collections::{BTreeMap, HashSet};
use std::sync::{Mutex, MutexGuard};

pub type ChannelId = u64;
pub type MessageId = u64;

#[async_trait]
pub trait Platform: Send + Sync {
    /// Posts a plain text message and returns its id.
    async fn send_message(&self, channel: ChannelId, content: &str)
        -> Result<MessageId, PlatformError>;

    /// Posts the stats display as a new message and returns its id.
    async fn send_display(&self, channel: ChannelId, display: &Display)
        -> Result<MessageId, PlatformError>;

    /// Checks that a message still exists and is reachable.
    async fn fetch_message(&self, channel: ChannelId, message: MessageId)
        -> Result<(), PlatformError>;

    /// Replaces the display carried by an existing message.
    async fn edit_display(
        &self,
        channel: ChannelId,
        message: MessageId,
        display: &Display,
    ) -> Result<(), PlatformError>;

    /// Starts a thread from a message and returns the thread's channel id.
    async fn create_thread(
        &self,
        channel: ChannelId,
        message: MessageId,
        name: &str,
    ) -> Result<ChannelId, PlatformError>;

    async fn add_reaction(
        &self,
        channel: ChannelId,
        message: MessageId,
        emoji: &str,
    ) -> Result<(), PlatformError>;
}

/// Content of a message held by [`RecordingPlatform`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Posted {
    Text(String),
    Display(Display),
}

/// One call made against a [`RecordingPlatform`], successful or not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    SendMessage { channel: ChannelId, content: String },
    SendDisplay { channel: ChannelId },
    FetchMessage { channel: ChannelId, message: MessageId },
    EditDisplay { channel: ChannelId, message: MessageId },
    CreateThread { channel: ChannelId, message: MessageId, name: String },
    AddReaction { channel: ChannelId, message: MessageId, emoji: String },
}

#[derive(Debug, Default)]
struct Recorded {
    next_id: u64,
    messages: BTreeMap<(ChannelId, MessageId), Posted>,
    reactions: BTreeMap<(ChannelId, MessageId), Vec<String>>,
    unreachable: HashSet<ChannelId>,
    calls: Vec<Call>,
}

/// In-memory platform that logs every call.
///
/// Message ids are handed out sequentially; messages can be deleted and
/// channels made unreachable to simulate changes made outside the bridge.
#[derive(Debug)]
pub struct RecordingPlatform {
    state: Mutex<Recorded>,
}

impl Default for RecordingPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingPlatform {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(Recorded {
                next_id: 1000,
                ..Recorded::default()
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Recorded> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Seeds a message, e.g. one posted before a restart.
    pub fn insert_message(&self, channel: ChannelId, content: Posted) -> MessageId {
        let mut state = self.lock();
        let id = state.next_id;
        state.next_id += 1;
        state.messages.insert((channel, id), content);
        id
    }

    pub fn delete_message(&self, channel: ChannelId, message: MessageId) -> bool {
        self.lock().messages.remove(&(channel, message)).is_some()
    }

    /// Makes every request against `channel` fail, as with revoked permissions.
    pub fn make_unreachable(&self, channel: ChannelId) {
        self.lock().unreachable.insert(channel);
    }

    pub fn message(&self, channel: ChannelId, message: MessageId) -> Option<Posted> {
        self.lock().messages.get(&(channel, message)).cloned()
    }

    pub fn messages_in(&self, channel: ChannelId) -> Vec<(MessageId, Posted)> {
        self.lock()
            .messages
            .iter()
            .filter(|((c, _), _)| *c == channel)
            .map(|((_, id), posted)| (*id, posted.clone()))
            .collect()
    }

    pub fn reactions(&self, channel: ChannelId, message: MessageId) -> Vec<String> {
        self.lock()
            .reactions
            .get(&(channel, message))
            .cloned()
            .unwrap_or_default()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    fn record(&self, call: Call) {
        info!("[dry-run] {:?}", call);
        self.lock().calls.push(call);
    }

    fn check_reachable(&self, channel: ChannelId) -> Result<(), PlatformError> {
        if self.lock().unreachable.contains(&channel) {
            return Err(PlatformError::Request(format!(
                "missing access to channel {}",
                channel
            )));
        }
        Ok(())
    }

    fn check_exists(&self, channel: ChannelId, message: MessageId) -> Result<(), PlatformError> {
        self.check_reachable(channel)?;
        if !self.lock().messages.contains_key(&(channel, message)) {
            return Err(PlatformError::NotFound {
                what: "message",
                id: message,
            });
        }
        Ok(())
    }

    fn post(&self, channel: ChannelId, content: Posted) -> Result<MessageId, PlatformError> {
        self.check_reachable(channel)?;
        Ok(self.insert_message(channel, content))
    }
}

#[async_trait]
impl Platform for RecordingPlatform {
    async fn send_message(
        &self,
        channel: ChannelId,
        content: &str,
    ) -> Result<MessageId, PlatformError> {
        self.record(Call::SendMessage {
            channel,
            content: content.to_string(),
        });
        self.post(channel, Posted::Text(content.to_string()))
    }

    async fn send_display(
        &self,
        channel: ChannelId,
        display: &Display,
    ) -> Result<MessageId, PlatformError> {
        self.record(Call::SendDisplay { channel });
        self.post(channel, Posted::Display(display.clone()))
    }

    async fn fetch_message(
        &self,
        channel: ChannelId,
        message: MessageId,
    ) -> Result<(), PlatformError> {
        self.record(Call::FetchMessage { channel, message });
        self.check_exists(channel, message)
    }

    async fn edit_display(
        &self,
        channel: ChannelId,
        message: MessageId,
        display: &Display,
    ) -> Result<(), PlatformError> {
        self.record(Call::EditDisplay { channel, message });
        self.check_exists(channel, message)?;
        self.lock()
            .messages
            .insert((channel, message), Posted::Display(display.clone()));
        Ok(())
    }

    async fn create_thread(
        &self,
        channel: ChannelId,
        message: MessageId,
        name: &str,
    ) -> Result<ChannelId, PlatformError> {
        self.record(Call::CreateThread {
            channel,
            message,
            name: name.to_string(),
        });
        self.check_reachable(channel)?;
        // Threads share the id of the message they start from.
        Ok(message)
    }

    async fn add_reaction(
        &self,
        channel: ChannelId,
        message: MessageId,
        emoji: &str,
    ) -> Result<(), PlatformError> {
        self.record(Call::AddReaction {
            channel,
            message,
            emoji: emoji.to_string(),
        });
        self.check_exists(channel, message)?;
        self.lock()
            .reactions
            .entry((channel, message))
            .or_default()
            .push(emoji.to_string());
        Ok(())
    }
}
