//! Discord implementation of [`Platform`] plus the gateway listener that
//! feeds guild messages back into the bridge.

use crate::display::Display;
use crate::error::PlatformError;
use crate::events::{mention_tokens, ChatMessage, Mention, MentionKind, PlatformEvent};
use crate::platform::{ChannelId, MessageId, Platform};
use async_trait::async_trait;
use log::{error, info, warn};
use tokio::sync::mpsc::UnboundedSender;
use twilight_cache_inmemory::{InMemoryCache, ResourceType};
use twilight_gateway::{Event, EventTypeFlags, Intents, Shard, ShardId, StreamExt};
use twilight_http::error::ErrorType;
use twilight_http::request::channel::reaction::RequestReactionType;
use twilight_http::Client as HttpClient;
use twilight_model::channel::message::Embed;
use twilight_model::channel::Message;
use twilight_model::id::marker::{ChannelMarker, MessageMarker};
use twilight_model::id::Id;
use twilight_model::util::Timestamp;
use twilight_util::builder::embed::{EmbedBuilder, EmbedFieldBuilder};

pub struct DiscordPlatform {
    http: HttpClient,
}

impl DiscordPlatform {
    pub fn new(token: String) -> Self {
        Self {
            http: HttpClient::new(token),
        }
    }
}

fn channel_id(id: ChannelId) -> Result<Id<ChannelMarker>, PlatformError> {
    Id::new_checked(id).ok_or(PlatformError::InvalidId { what: "channel", id })
}

fn message_id(id: MessageId) -> Result<Id<MessageMarker>, PlatformError> {
    Id::new_checked(id).ok_or(PlatformError::InvalidId { what: "message", id })
}

/// 404s become [`PlatformError::NotFound`] so callers can tell a deleted
/// message from an outage.
fn request_error(what: &'static str, id: u64, e: twilight_http::Error) -> PlatformError {
    match e.kind() {
        ErrorType::Response { status, .. } if status.get() == 404 => {
            PlatformError::NotFound { what, id }
        }
        _ => PlatformError::Request(e.to_string()),
    }
}

fn embed(display: &Display) -> Embed {
    let mut builder = EmbedBuilder::new()
        .title(format!("**{}**", display.title))
        .color(display.colour);

    match Timestamp::from_secs(display.timestamp as i64) {
        Ok(timestamp) => builder = builder.timestamp(timestamp),
        Err(e) => warn!("Display timestamp {} is out of range: {}", display.timestamp, e),
    }

    for section in &display.sections {
        builder = builder.field(EmbedFieldBuilder::new(
            format!("**{}**", section.title),
            section.body.clone(),
        ));
    }

    builder.build()
}

#[async_trait]
impl Platform for DiscordPlatform {
    async fn send_message(
        &self,
        channel: ChannelId,
        content: &str,
    ) -> Result<MessageId, PlatformError> {
        let message = self
            .http
            .create_message(channel_id(channel)?)
            .content(content)
            .await
            .map_err(|e| request_error("channel", channel, e))?
            .model()
            .await
            .map_err(|e| PlatformError::Request(e.to_string()))?;

        Ok(message.id.get())
    }

    async fn send_display(
        &self,
        channel: ChannelId,
        display: &Display,
    ) -> Result<MessageId, PlatformError> {
        let embeds = [embed(display)];
        let message = self
            .http
            .create_message(channel_id(channel)?)
            .embeds(&embeds)
            .await
            .map_err(|e| request_error("channel", channel, e))?
            .model()
            .await
            .map_err(|e| PlatformError::Request(e.to_string()))?;

        Ok(message.id.get())
    }

    async fn fetch_message(
        &self,
        channel: ChannelId,
        message: MessageId,
    ) -> Result<(), PlatformError> {
        self.http
            .message(channel_id(channel)?, message_id(message)?)
            .await
            .map_err(|e| request_error("message", message, e))?;
        Ok(())
    }

    async fn edit_display(
        &self,
        channel: ChannelId,
        message: MessageId,
        display: &Display,
    ) -> Result<(), PlatformError> {
        let embeds = [embed(display)];
        self.http
            .update_message(channel_id(channel)?, message_id(message)?)
            .embeds(Some(&embeds))
            .await
            .map_err(|e| request_error("message", message, e))?;
        Ok(())
    }

    async fn create_thread(
        &self,
        channel: ChannelId,
        message: MessageId,
        name: &str,
    ) -> Result<ChannelId, PlatformError> {
        let thread = self
            .http
            .create_thread_from_message(channel_id(channel)?, message_id(message)?, name)
            .await
            .map_err(|e| request_error("message", message, e))?
            .model()
            .await
            .map_err(|e| PlatformError::Request(e.to_string()))?;

        Ok(thread.id.get())
    }

    async fn add_reaction(
        &self,
        channel: ChannelId,
        message: MessageId,
        emoji: &str,
    ) -> Result<(), PlatformError> {
        let reaction = RequestReactionType::Unicode { name: emoji };
        self.http
            .create_reaction(channel_id(channel)?, message_id(message)?, &reaction)
            .await
            .map_err(|e| request_error("message", message, e))?;
        Ok(())
    }
}

/// Resolves the mentions in `message` to display names. Users come with the
/// message; role and channel names need the cache.
fn chat_message(message: &Message, cache: &InMemoryCache) -> ChatMessage {
    let mut mentions: Vec<Mention> = message
        .mentions
        .iter()
        .map(|user| Mention {
            kind: MentionKind::User,
            id: user.id.get(),
            name: user
                .member
                .as_ref()
                .and_then(|member| member.nick.clone())
                .unwrap_or_else(|| user.name.clone()),
        })
        .collect();

    mentions.extend(message.mention_roles.iter().filter_map(|&role| {
        let name = cache.role(role)?.resource().name.clone();
        Some(Mention {
            kind: MentionKind::Role,
            id: role.get(),
            name,
        })
    }));

    for (_, kind, id) in mention_tokens(&message.content) {
        if kind != MentionKind::Channel {
            continue;
        }
        let name = Id::new_checked(id)
            .and_then(|channel| cache.channel(channel))
            .and_then(|channel| channel.name.clone());
        match name {
            Some(name) => mentions.push(Mention { kind, id, name }),
            None => warn!("Channel {} is not cached, leaving its mention as is", id),
        }
    }

    ChatMessage {
        channel_id: message.channel_id.get(),
        message_id: message.id.get(),
        author_name: message.author.name.clone(),
        author_discriminator: message.author.discriminator,
        author_bot: message.author.bot,
        content: message.content.clone(),
        mentions,
    }
}

/// Listens on the gateway and forwards every guild message as a
/// [`PlatformEvent`]. Returns once the bridge stops listening or the shard
/// closes for good.
pub async fn run_gateway(token: String, events: UnboundedSender<PlatformEvent>) {
    let intents = Intents::GUILDS | Intents::GUILD_MESSAGES | Intents::MESSAGE_CONTENT;
    let mut shard = Shard::new(ShardId::ONE, token, intents);
    let cache = InMemoryCache::builder()
        .resource_types(ResourceType::ROLE | ResourceType::CHANNEL)
        .build();
    info!("Connecting to the Discord gateway");

    while let Some(item) = shard.next_event(EventTypeFlags::all()).await {
        let event = match item {
            Ok(event) => event,
            Err(e) => {
                error!("Gateway error: {}", e);
                continue;
            }
        };
        cache.update(&event);

        match event {
            Event::Ready(ready) => {
                info!("Logged in as {} ({})", ready.user.name, ready.user.id);
            }
            Event::MessageCreate(message) => {
                let message = chat_message(&message, &cache);
                if events.send(PlatformEvent::MessageCreated(message)).is_err() {
                    info!("Bridge stopped, closing gateway listener");
                    return;
                }
            }
            _ => {}
        }
    }

    warn!("Gateway connection closed");
}
