//! Datagram transport: socket ownership and the blocking receive loop.
//!
//! The receive loop runs on its own OS thread so a blocking `recv_from` never
//! stalls the async executor. Each datagram is copied out of the receive
//! buffer and pushed, untouched, into an unbounded channel; decoding and
//! handling happen on the executor side. Sends share the same socket through
//! an `Arc`, which is safe because a UDP send is a single atomic syscall.

use crate::error::TransportError;
use log::{debug, error, info, warn};
use protocol::MAX_DATAGRAM_SIZE;
use std::io::ErrorKind;
use std::net::{SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tokio::sync::mpsc;

/// How long a receive call blocks before checking for shutdown.
const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Lifecycle of the transport.
///
/// `Unbound → Bound → Listening → (Closed | Faulted)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportState {
    Unbound,
    Bound,
    Listening,
    /// Stopped on request.
    Closed,
    /// Stopped because nobody is left to hand datagrams to.
    Faulted,
}

impl TransportState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => TransportState::Unbound,
            1 => TransportState::Bound,
            2 => TransportState::Listening,
            3 => TransportState::Closed,
            _ => TransportState::Faulted,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            TransportState::Unbound => 0,
            TransportState::Bound => 1,
            TransportState::Listening => 2,
            TransportState::Closed => 3,
            TransportState::Faulted => 4,
        }
    }
}

/// Raw datagram handed from the receive thread to the executor.
#[derive(Debug, Clone)]
pub struct Datagram {
    pub payload: Vec<u8>,
    pub from: SocketAddr,
}

/// A bound UDP socket that has not started listening yet.
pub struct Transport {
    socket: Arc<UdpSocket>,
    local_addr: SocketAddr,
}

impl Transport {
    /// Binds the local endpoint. Failure here is fatal for the bridge and is
    /// never retried.
    pub fn bind(addr: &str) -> Result<Self, TransportError> {
        let socket = UdpSocket::bind(addr).map_err(|source| TransportError::Bind {
            addr: addr.to_string(),
            source,
        })?;
        socket
            .set_read_timeout(Some(POLL_INTERVAL))
            .map_err(TransportError::Configure)?;
        let local_addr = socket.local_addr().map_err(TransportError::Configure)?;

        info!("UDP socket bound to {}", local_addr);

        Ok(Self {
            socket: Arc::new(socket),
            local_addr,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Shared handle for the outbound path.
    pub fn socket(&self) -> Arc<UdpSocket> {
        Arc::clone(&self.socket)
    }

    pub fn state(&self) -> TransportState {
        TransportState::Bound
    }

    /// Starts the receive thread. Datagrams arrive on `inbound_tx` in the
    /// order the socket delivered them.
    pub fn listen(
        self,
        inbound_tx: mpsc::UnboundedSender<Datagram>,
    ) -> Result<ReceiverHandle, TransportError> {
        let shutdown = Arc::new(AtomicBool::new(false));
        let state = Arc::new(AtomicU8::new(TransportState::Listening.as_u8()));

        let thread = {
            let socket = Arc::clone(&self.socket);
            let shutdown = Arc::clone(&shutdown);
            let state = Arc::clone(&state);
            thread::Builder::new()
                .name("udp-receiver".to_string())
                .spawn(move || receive_loop(&socket, &inbound_tx, &shutdown, &state))
                .map_err(TransportError::Spawn)?
        };

        info!("Listening for datagrams on {}", self.local_addr);

        Ok(ReceiverHandle {
            local_addr: self.local_addr,
            shutdown,
            state,
            thread: Some(thread),
        })
    }
}

/// Handle to a running receive thread.
pub struct ReceiverHandle {
    local_addr: SocketAddr,
    shutdown: Arc<AtomicBool>,
    state: Arc<AtomicU8>,
    thread: Option<JoinHandle<()>>,
}

impl ReceiverHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn state(&self) -> TransportState {
        TransportState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Asks the receive loop to stop and waits for it. The loop notices within
    /// one poll interval, so this blocks for up to that long.
    pub fn shutdown(mut self) -> TransportState {
        self.stop();
        self.state()
    }

    /// [`shutdown`](Self::shutdown) for async callers: the wait happens on the
    /// blocking pool and the executor keeps running other tasks meanwhile.
    pub async fn close(self) -> TransportState {
        match tokio::task::spawn_blocking(move || self.shutdown()).await {
            Ok(state) => state,
            Err(e) => {
                error!("UDP receive thread could not be joined: {}", e);
                TransportState::Faulted
            }
        }
    }

    fn stop(&mut self) {
        self.shutdown.store(true, Ordering::Release);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!("UDP receive thread panicked");
                self.state
                    .store(TransportState::Faulted.as_u8(), Ordering::Release);
            }
        }
    }
}

impl Drop for ReceiverHandle {
    // Only signals; the thread exits on its own within one poll interval.
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Release);
    }
}

fn receive_loop(
    socket: &UdpSocket,
    inbound_tx: &mpsc::UnboundedSender<Datagram>,
    shutdown: &AtomicBool,
    state: &AtomicU8,
) {
    let mut buffer = [0u8; MAX_DATAGRAM_SIZE];

    loop {
        if shutdown.load(Ordering::Acquire) {
            info!("UDP receive loop stopped");
            state.store(TransportState::Closed.as_u8(), Ordering::Release);
            return;
        }

        match socket.recv_from(&mut buffer) {
            Ok((len, from)) => {
                debug!("Received {} bytes from {}", len, from);
                let datagram = Datagram {
                    payload: buffer[..len].to_vec(),
                    from,
                };
                if inbound_tx.send(datagram).is_err() {
                    if shutdown.load(Ordering::Acquire) {
                        state.store(TransportState::Closed.as_u8(), Ordering::Release);
                    } else {
                        error!("Dispatcher is gone, stopping UDP receive loop");
                        state.store(TransportState::Faulted.as_u8(), Ordering::Release);
                    }
                    return;
                }
            }
            // No data within the poll interval.
            Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {}
            Err(e) => {
                warn!("Error receiving datagram: {}", e);
                thread::sleep(Duration::from_millis(10));
            }
        }
    }
}
