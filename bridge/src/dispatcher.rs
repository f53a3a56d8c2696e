//! Routes decoded game server messages to their handlers.
//!
//! Chat kinds are relayed straight into the configured chat channel. Status
//! kinds go through the [`StatusReconciler`]. Anything else is logged and
//! dropped so newer game server plugins cannot break the bridge.

use crate::config::{ChatFormats, ConfigStore};
use crate::display::StatusKind;
use crate::platform::{MessageId, Platform};
use crate::reconciler::{StatusReconciler, SurfaceSync};
use crate::template;
use log::{error, warn};
use protocol::{decode, split_args, Message, MessageKind, DEFAULT_PLAYTIME_LIMIT};
use std::sync::Arc;

/// Game chat kinds and how their bodies are laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatRelay {
    /// `"<name> <text>"`
    Player,
    /// `"<text>"`
    System,
}

impl ChatRelay {
    /// Number of leading space-separated arguments before the free text.
    pub fn arg_count(&self) -> usize {
        match self {
            ChatRelay::Player => 1,
            ChatRelay::System => 0,
        }
    }

    pub fn template<'a>(&self, formats: &'a ChatFormats) -> &'a str {
        match self {
            ChatRelay::Player => &formats.chat,
            ChatRelay::System => &formats.chat_system,
        }
    }

    /// Renders a chat body, or `None` when it has too few pieces.
    pub fn render(&self, formats: &ChatFormats, body: &str) -> Option<String> {
        let args = split_args(body, self.arg_count());
        if args.len() != self.arg_count() + 1 {
            return None;
        }
        Some(template::fill_positional(self.template(formats), &args))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// Not a well-formed frame.
    Malformed,
    /// The frame is fine but the body does not fit its kind.
    MalformedBody,
    /// The module handling this kind has no channel configured.
    Unconfigured,
    /// A kind the bridge only ever sends.
    OutboundOnly,
    UnknownKind,
    PlatformFailure,
}

/// Result of dispatching one message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Relayed(MessageId),
    Reconciled(SurfaceSync),
    Dropped(DropReason),
}

pub struct Dispatcher<P: Platform + ?Sized> {
    platform: Arc<P>,
    store: ConfigStore,
    reconciler: StatusReconciler,
}

impl<P: Platform + ?Sized> Dispatcher<P> {
    pub fn new(platform: Arc<P>, store: ConfigStore) -> Self {
        let playtime_limit = store
            .config()
            .modules
            .stats
            .as_ref()
            .map(|stats| stats.playtime_limit)
            .unwrap_or(DEFAULT_PLAYTIME_LIMIT);

        Self {
            platform,
            store,
            reconciler: StatusReconciler::new(playtime_limit),
        }
    }

    pub fn platform(&self) -> &Arc<P> {
        &self.platform
    }

    pub fn store(&self) -> &ConfigStore {
        &self.store
    }

    pub fn reconciler(&self) -> &StatusReconciler {
        &self.reconciler
    }

    /// Decodes a raw datagram and dispatches it. Malformed frames are logged
    /// with their content and dropped.
    pub async fn dispatch_datagram(&mut self, payload: &[u8]) -> Outcome {
        match decode(payload) {
            Ok(message) => self.dispatch(message).await,
            Err(e) => {
                warn!(
                    "Dropping malformed datagram ({}): {:?}",
                    e,
                    String::from_utf8_lossy(payload)
                );
                Outcome::Dropped(DropReason::Malformed)
            }
        }
    }

    pub async fn dispatch(&mut self, message: Message) -> Outcome {
        match &message.kind {
            MessageKind::Chat => self.relay(ChatRelay::Player, &message.body).await,
            MessageKind::ChatSystem => self.relay(ChatRelay::System, &message.body).await,
            MessageKind::PlayerList => self.reconcile(StatusKind::PlayerList, &message.body).await,
            MessageKind::Playtimes => self.reconcile(StatusKind::Playtimes, &message.body).await,
            MessageKind::Register | MessageKind::Unregister => {
                warn!(
                    "Ignoring '{}' message from the game server, it is outbound only",
                    message.kind
                );
                Outcome::Dropped(DropReason::OutboundOnly)
            }
            MessageKind::Unknown(tag) => {
                warn!("Unrecognized message type '{}'", tag);
                Outcome::Dropped(DropReason::UnknownKind)
            }
        }
    }

    async fn relay(&mut self, relay: ChatRelay, body: &str) -> Outcome {
        let Some(chat) = self.store.config().modules.chat.as_ref() else {
            warn!("No chat channel configured, dropping game chat");
            return Outcome::Dropped(DropReason::Unconfigured);
        };

        let Some(text) = relay.render(&chat.formats, body) else {
            warn!("Chat body '{}' does not match {:?} relay", body, relay);
            return Outcome::Dropped(DropReason::MalformedBody);
        };

        match self.platform.send_message(chat.channel_id, &text).await {
            Ok(message) => Outcome::Relayed(message),
            Err(e) => {
                error!(
                    "Could not relay game chat to channel {}: {}",
                    chat.channel_id, e
                );
                Outcome::Dropped(DropReason::PlatformFailure)
            }
        }
    }

    async fn reconcile(&mut self, kind: StatusKind, body: &str) -> Outcome {
        let sync = self
            .reconciler
            .ingest(kind, body, self.platform.as_ref(), &mut self.store)
            .await;
        Outcome::Reconciled(sync)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_config;
    use crate::platform::{Call, Posted, RecordingPlatform};

    const CHAT: u64 = 100;
    const STATS: u64 = 200;

    /// Collects records logged by this crate on the calling thread, so tests
    /// running in parallel only see their own.
    mod captured_logs {
        use log::{Level, LevelFilter, Log, Metadata, Record};
        use std::cell::RefCell;
        use std::sync::Once;

        thread_local! {
            static RECORDS: RefCell<Vec<(Level, String)>> = RefCell::new(Vec::new());
        }

        struct Capture;

        impl Log for Capture {
            fn enabled(&self, metadata: &Metadata) -> bool {
                metadata.target().starts_with("bridge::")
            }

            fn log(&self, record: &Record) {
                if self.enabled(record.metadata()) {
                    RECORDS.with(|records| {
                        records
                            .borrow_mut()
                            .push((record.level(), record.args().to_string()))
                    });
                }
            }

            fn flush(&self) {}
        }

        static CAPTURE: Capture = Capture;
        static INSTALL: Once = Once::new();

        pub fn start() {
            INSTALL.call_once(|| {
                if log::set_logger(&CAPTURE).is_ok() {
                    log::set_max_level(LevelFilter::Trace);
                }
            });
            RECORDS.with(|records| records.borrow_mut().clear());
        }

        pub fn take() -> Vec<(Level, String)> {
            RECORDS.with(|records| records.borrow_mut().drain(..).collect())
        }
    }

    fn dispatcher() -> Dispatcher<RecordingPlatform> {
        Dispatcher::new(
            Arc::new(RecordingPlatform::new()),
            ConfigStore::in_memory(test_config()),
        )
    }

    #[tokio::test]
    async fn test_player_chat_is_relayed() {
        let mut dispatcher = dispatcher();

        let outcome = dispatcher
            .dispatch_datagram(b"\0chat\0Steve hello there")
            .await;

        let Outcome::Relayed(id) = outcome else {
            panic!("expected relay, got {:?}", outcome);
        };
        assert_eq!(
            dispatcher.platform().message(CHAT, id),
            Some(Posted::Text("**Steve**: hello there".to_string()))
        );
    }

    #[tokio::test]
    async fn test_system_chat_keeps_spaces() {
        let mut dispatcher = dispatcher();

        let outcome = dispatcher
            .dispatch(Message::new(MessageKind::ChatSystem, "Steve joined the game"))
            .await;

        let Outcome::Relayed(id) = outcome else {
            panic!("expected relay, got {:?}", outcome);
        };
        assert_eq!(
            dispatcher.platform().message(CHAT, id),
            Some(Posted::Text("*Steve joined the game*".to_string()))
        );
    }

    #[tokio::test]
    async fn test_chat_without_text_is_dropped() {
        let mut dispatcher = dispatcher();

        let outcome = dispatcher
            .dispatch(Message::new(MessageKind::Chat, "Steve"))
            .await;

        assert_eq!(outcome, Outcome::Dropped(DropReason::MalformedBody));
        assert!(dispatcher.platform().calls().is_empty());
    }

    #[tokio::test]
    async fn test_missing_chat_channel_drops() {
        let mut config = test_config();
        config.modules.chat = None;
        let mut dispatcher = Dispatcher::new(
            Arc::new(RecordingPlatform::new()),
            ConfigStore::in_memory(config),
        );

        let outcome = dispatcher
            .dispatch(Message::new(MessageKind::Chat, "Steve hi"))
            .await;
        assert_eq!(outcome, Outcome::Dropped(DropReason::Unconfigured));
    }

    #[tokio::test]
    async fn test_unreachable_chat_channel_drops() {
        let mut dispatcher = dispatcher();
        dispatcher.platform().make_unreachable(CHAT);

        let outcome = dispatcher
            .dispatch(Message::new(MessageKind::Chat, "Steve hi"))
            .await;
        assert_eq!(outcome, Outcome::Dropped(DropReason::PlatformFailure));
    }

    #[tokio::test]
    async fn test_status_kinds_reach_reconciler() {
        let mut dispatcher = dispatcher();

        let outcome = dispatcher.dispatch_datagram(b"\0playerlist\0Alice,Bob").await;

        assert!(matches!(
            outcome,
            Outcome::Reconciled(SurfaceSync::Created(_))
        ));
        assert_eq!(dispatcher.platform().messages_in(STATS).len(), 1);
        assert_eq!(
            dispatcher
                .reconciler()
                .report(StatusKind::PlayerList)
                .unwrap()
                .raw_payload,
            "Alice,Bob"
        );
    }

    #[tokio::test]
    async fn test_unknown_kind_changes_nothing() {
        let mut dispatcher = dispatcher();

        captured_logs::start();
        let outcome = dispatcher.dispatch_datagram(b"\0bogus\0anything at all").await;
        let records = captured_logs::take();

        assert_eq!(outcome, Outcome::Dropped(DropReason::UnknownKind));
        assert_eq!(
            records,
            vec![(
                log::Level::Warn,
                "Unrecognized message type 'bogus'".to_string()
            )]
        );
        assert!(dispatcher.platform().calls().is_empty());
        assert!(dispatcher.reconciler().report(StatusKind::PlayerList).is_none());
        assert!(dispatcher.reconciler().report(StatusKind::Playtimes).is_none());
        assert_eq!(dispatcher.store().surface().unwrap().message_id, None);
    }

    #[tokio::test]
    async fn test_outbound_kinds_are_not_handled() {
        let mut dispatcher = dispatcher();

        let outcome = dispatcher.dispatch_datagram(b"\0register\0java Steve").await;
        assert_eq!(outcome, Outcome::Dropped(DropReason::OutboundOnly));
        assert!(dispatcher.platform().calls().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_datagram_is_dropped() {
        let mut dispatcher = dispatcher();

        assert_eq!(
            dispatcher.dispatch_datagram(b"no delimiters here").await,
            Outcome::Dropped(DropReason::Malformed)
        );
        assert_eq!(
            dispatcher.dispatch_datagram(b"").await,
            Outcome::Dropped(DropReason::Malformed)
        );
    }

    #[tokio::test]
    async fn test_relay_then_status_share_platform() {
        let mut dispatcher = dispatcher();

        dispatcher.dispatch_datagram(b"\0chat_system\0Server started").await;
        dispatcher.dispatch_datagram(b"\0playtimes\0Alice 3600000").await;

        let calls = dispatcher.platform().calls();
        assert!(matches!(calls[0], Call::SendMessage { channel: CHAT, .. }));
        assert!(matches!(calls[1], Call::SendDisplay { channel: STATS }));
    }

    #[test]
    fn test_chat_relay_render() {
        let formats = ChatFormats::default();
        assert_eq!(
            ChatRelay::Player.render(&formats, "Alex gg everyone"),
            Some("**Alex**: gg everyone".to_string())
        );
        assert_eq!(ChatRelay::Player.render(&formats, "Alex"), None);
        assert_eq!(
            ChatRelay::System.render(&formats, ""),
            Some("**".to_string())
        );
    }
}
