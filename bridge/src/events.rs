//! Handling of events coming from the chat platform.
//!
//! Messages posted in the chat channel are forwarded to the game. Posts in
//! the help and suggestions channels each get their own thread with a
//! greeting; suggestions also get voting reactions.

use crate::config::{BridgeConfig, ThreadFormats};
use crate::platform::{ChannelId, MessageId, Platform};
use crate::sender::OutboundSender;
use crate::template;
use log::{debug, error};
use protocol::MessageKind;
use std::ops::Range;

/// What a mention token in message content points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MentionKind {
    /// `<@id>` or `<@!id>`
    User,
    /// `<@&id>`
    Role,
    /// `<#id>`
    Channel,
}

impl MentionKind {
    fn sigil(&self) -> char {
        match self {
            MentionKind::User | MentionKind::Role => '@',
            MentionKind::Channel => '#',
        }
    }
}

/// A resolved mention: the name to show in place of the raw token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mention {
    pub kind: MentionKind,
    pub id: u64,
    pub name: String,
}

fn parse_mention(token: &str) -> Option<(MentionKind, u64)> {
    let (kind, id) = if let Some(id) = token.strip_prefix("@&") {
        (MentionKind::Role, id)
    } else if let Some(id) = token.strip_prefix("@!") {
        (MentionKind::User, id)
    } else if let Some(id) = token.strip_prefix('@') {
        (MentionKind::User, id)
    } else if let Some(id) = token.strip_prefix('#') {
        (MentionKind::Channel, id)
    } else {
        return None;
    };

    if id.is_empty() || !id.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    id.parse().ok().map(|id| (kind, id))
}

/// Finds every user, role and channel mention token in `content`, with the
/// byte range it covers.
pub fn mention_tokens(content: &str) -> Vec<(Range<usize>, MentionKind, u64)> {
    let mut tokens = Vec::new();
    let mut from = 0;

    while let Some(offset) = content[from..].find('<') {
        let start = from + offset;
        from = start + 1;
        let Some(len) = content[start..].find('>') else {
            break;
        };
        if let Some((kind, id)) = parse_mention(&content[start + 1..start + len]) {
            tokens.push((start..start + len + 1, kind, id));
            from = start + len + 1;
        }
    }

    tokens
}

/// A message posted in a guild channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub channel_id: ChannelId,
    pub message_id: MessageId,
    pub author_name: String,
    /// Legacy four digit tag, 0 for accounts on unique usernames.
    pub author_discriminator: u16,
    pub author_bot: bool,
    pub content: String,
    /// Names for the mention tokens in `content` that could be resolved.
    pub mentions: Vec<Mention>,
}

impl ChatMessage {
    /// `name#1234`, or just `name` when the account has no discriminator.
    pub fn author_tag(&self) -> String {
        if self.author_discriminator == 0 {
            self.author_name.clone()
        } else {
            format!("{}#{:04}", self.author_name, self.author_discriminator)
        }
    }

    /// The content with resolved mention tokens replaced by `@name` or
    /// `#name`. Tokens without a matching [`Mention`] are left as they are.
    pub fn clean_content(&self) -> String {
        let mut clean = String::with_capacity(self.content.len());
        let mut last = 0;

        for (span, kind, id) in mention_tokens(&self.content) {
            let Some(mention) = self.mentions.iter().find(|m| m.kind == kind && m.id == id) else {
                continue;
            };
            clean.push_str(&self.content[last..span.start]);
            clean.push(kind.sigil());
            clean.push_str(&mention.name);
            last = span.end;
        }

        clean.push_str(&self.content[last..]);
        clean
    }

    fn fill(&self, template: &str) -> String {
        let author = self.author_tag();
        let content = self.clean_content();
        template::fill(template, |name| match name {
            "author" => Some(author.as_str()),
            "content" => Some(content.as_str()),
            _ => None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlatformEvent {
    MessageCreated(ChatMessage),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOutcome {
    /// Sent to the game; false if the datagram could not be sent.
    Forwarded(bool),
    ThreadOpened(ChannelId),
    Ignored,
    Failed,
}

pub async fn handle_event<P: Platform + ?Sized>(
    event: PlatformEvent,
    platform: &P,
    config: &BridgeConfig,
    sender: &OutboundSender,
) -> EventOutcome {
    match event {
        PlatformEvent::MessageCreated(message) => {
            handle_message(&message, platform, config, sender).await
        }
    }
}

async fn handle_message<P: Platform + ?Sized>(
    message: &ChatMessage,
    platform: &P,
    config: &BridgeConfig,
    sender: &OutboundSender,
) -> EventOutcome {
    // Other bots could echo our own relays back into the game.
    if message.author_bot {
        return EventOutcome::Ignored;
    }

    let modules = &config.modules;

    if let Some(chat) = modules.chat.as_ref().filter(|m| m.channel_id == message.channel_id) {
        debug!("Forwarding chat from channel {}", chat.channel_id);
        let body = format!("{} {}", message.author_tag(), message.clean_content());
        return EventOutcome::Forwarded(sender.send_message(&MessageKind::Chat, &body));
    }

    if let Some(help) = modules.help.as_ref().filter(|m| m.channel_id == message.channel_id) {
        return open_thread(message, platform, &help.formats, &[]).await;
    }

    if let Some(suggestions) = modules
        .suggestions
        .as_ref()
        .filter(|m| m.channel_id == message.channel_id)
    {
        let formats = &suggestions.formats;
        let thread_formats = ThreadFormats {
            thread_title: formats.thread_title.clone(),
            message_greeting: formats.message_greeting.clone(),
        };
        let reactions = [
            formats.reaction_upvote.as_str(),
            formats.reaction_downvote.as_str(),
        ];
        return open_thread(message, platform, &thread_formats, &reactions).await;
    }

    EventOutcome::Ignored
}

async fn open_thread<P: Platform + ?Sized>(
    message: &ChatMessage,
    platform: &P,
    formats: &ThreadFormats,
    reactions: &[&str],
) -> EventOutcome {
    let title = message.fill(&formats.thread_title);
    let thread = match platform
        .create_thread(message.channel_id, message.message_id, &title)
        .await
    {
        Ok(thread) => thread,
        Err(e) => {
            error!(
                "Could not create thread for message {} in channel {}: {}",
                message.message_id, message.channel_id, e
            );
            return EventOutcome::Failed;
        }
    };

    for emoji in reactions {
        if let Err(e) = platform
            .add_reaction(message.channel_id, message.message_id, emoji)
            .await
        {
            error!(
                "Could not add reaction {} to message {}: {}",
                emoji, message.message_id, e
            );
        }
    }

    let greeting = message.fill(&formats.message_greeting);
    if let Err(e) = platform.send_message(thread, &greeting).await {
        error!("Could not greet in thread {}: {}", thread, e);
    }

    EventOutcome::ThreadOpened(thread)
}
