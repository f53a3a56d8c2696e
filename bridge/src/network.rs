//! Bridge context and its event loop.
//!
//! [`Bridge`] owns everything that used to be ambient state: the dispatcher
//! (with the report cache and config store), the outbound sender and the
//! handle to the receive thread. Its loop runs on the single-threaded
//! executor and is the only place handlers execute.

use crate::config::ConfigStore;
use crate::dispatcher::Dispatcher;
use crate::error::BridgeError;
use crate::events::{handle_event, PlatformEvent};
use crate::platform::Platform;
use crate::sender::OutboundSender;
use crate::transport::{Datagram, ReceiverHandle, Transport, TransportState};
use log::{debug, info, warn};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::mpsc;

pub struct Bridge<P: Platform + ?Sized> {
    dispatcher: Dispatcher<P>,
    sender: OutboundSender,
    receiver: ReceiverHandle,

    // Communication channels
    inbound_rx: mpsc::UnboundedReceiver<Datagram>,
    events_tx: mpsc::UnboundedSender<PlatformEvent>,
    events_rx: mpsc::UnboundedReceiver<PlatformEvent>,
}

impl<P: Platform + ?Sized> Bridge<P> {
    /// Binds the socket from the config and starts the receive thread.
    ///
    /// Fails if the socket cannot be bound or the game server endpoint does
    /// not resolve; neither is retried.
    pub fn new(store: ConfigStore, platform: Arc<P>) -> Result<Self, BridgeError> {
        let udp = store.config().udp.clone();
        let destination = udp.sendto_addr()?;

        let transport = Transport::bind(&udp.listen_addr())?;
        let sender = OutboundSender::new(transport.socket(), destination);

        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let receiver = transport.listen(inbound_tx)?;

        info!("Forwarding to game server at {}", destination);

        Ok(Self {
            dispatcher: Dispatcher::new(platform, store),
            sender,
            receiver,
            inbound_rx,
            events_tx,
            events_rx,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.receiver.local_addr()
    }

    /// Outbound path, for callers such as the whitelist.
    pub fn sender(&self) -> OutboundSender {
        self.sender.clone()
    }

    /// Where the platform client pushes its events.
    pub fn event_sender(&self) -> mpsc::UnboundedSender<PlatformEvent> {
        self.events_tx.clone()
    }

    pub fn dispatcher(&self) -> &Dispatcher<P> {
        &self.dispatcher
    }

    /// Runs until Ctrl+C.
    pub async fn run(self) -> TransportState {
        self.run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Could not listen for Ctrl+C: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await
    }

    /// Processes datagrams and platform events until `shutdown` completes,
    /// then stops the receive thread and reports its final state.
    pub async fn run_until<F>(mut self, shutdown: F) -> TransportState
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        info!("Bridge started");

        loop {
            tokio::select! {
                datagram = self.inbound_rx.recv() => {
                    match datagram {
                        Some(datagram) => {
                            let outcome = self.dispatcher.dispatch_datagram(&datagram.payload).await;
                            debug!("Datagram from {}: {:?}", datagram.from, outcome);
                        }
                        None => {
                            warn!("UDP receive loop ended unexpectedly");
                            break;
                        }
                    }
                },

                Some(event) = self.events_rx.recv() => {
                    let outcome = handle_event(
                        event,
                        self.dispatcher.platform().as_ref(),
                        self.dispatcher.store().config(),
                        &self.sender,
                    )
                    .await;
                    debug!("Platform event: {:?}", outcome);
                },

                _ = &mut shutdown => {
                    info!("Bridge shutting down");
                    break;
                }
            }
        }

        self.receiver.close().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_config;
    use crate::platform::RecordingPlatform;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[tokio::test]
    async fn test_stopping_leaves_other_tasks_running() {
        let store = ConfigStore::in_memory(test_config());
        let bridge = Bridge::new(store, Arc::new(RecordingPlatform::new())).unwrap();

        let ran = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&ran);
        tokio::spawn(async move { flag.store(true, Ordering::SeqCst) });

        assert_eq!(bridge.run_until(async {}).await, TransportState::Closed);
        assert!(ran.load(Ordering::SeqCst));
    }
}
