//! Outbound path: frames application events and sends them to the game server.

use crate::error::TransportError;
use log::{debug, error};
use protocol::{encode, MessageKind};
use std::net::{SocketAddr, UdpSocket};
use std::sync::Arc;

/// Sends frames to the game server over the bridge's shared socket.
#[derive(Debug, Clone)]
pub struct OutboundSender {
    socket: Arc<UdpSocket>,
    destination: SocketAddr,
}

impl OutboundSender {
    pub fn new(socket: Arc<UdpSocket>, destination: SocketAddr) -> Self {
        Self {
            socket,
            destination,
        }
    }

    pub fn destination(&self) -> SocketAddr {
        self.destination
    }

    /// Encodes and transmits one message. Returns false on any transport
    /// error after logging enough to diagnose it; never propagates.
    pub fn send_message(&self, kind: &MessageKind, content: &str) -> bool {
        match self.try_send(kind, content) {
            Ok(()) => {
                debug!("Sent '{}' message to {}", kind, self.destination);
                true
            }
            Err(e) => {
                error!("Failed to send UDP packet: {}", e);
                error!("  Destination: {}", self.destination);
                error!("  Type: {}", kind);
                error!("  Content: {}", content);
                false
            }
        }
    }

    fn try_send(&self, kind: &MessageKind, content: &str) -> Result<(), TransportError> {
        let frame = encode(kind, content);
        self.socket
            .send_to(&frame, self.destination)
            .map_err(|source| TransportError::Send {
                addr: self.destination,
                source,
            })?;
        Ok(())
    }
}
