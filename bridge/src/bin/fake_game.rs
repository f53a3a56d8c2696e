//! Stands in for the game server plugin: sends a few sample messages to a
//! running bridge and prints whatever the bridge sends back.

use clap::Parser;
use protocol::{decode, encode, MessageKind, MAX_DATAGRAM_SIZE};
use std::net::SocketAddr;
use tokio::net::UdpSocket;
use tokio::time::{sleep, timeout, Duration, Instant};

#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Address the bridge listens on
    #[clap(short, long, default_value = "127.0.0.1:25566")]
    bridge: SocketAddr,
    /// Address to receive the bridge's messages on (its `sendto` endpoint)
    #[clap(short, long, default_value = "127.0.0.1:25567")]
    listen: SocketAddr,
    /// Seconds to keep listening after the samples are sent
    #[clap(short, long, default_value = "30")]
    wait: u64,
}

fn samples() -> Vec<(MessageKind, &'static str)> {
    vec![
        (MessageKind::ChatSystem, "Steve joined the game"),
        (MessageKind::Chat, "Steve hello from the server"),
        (MessageKind::PlayerList, "Steve,Alex"),
        (MessageKind::Playtimes, "Steve 3600000,Alex 90000"),
    ]
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let socket = UdpSocket::bind(args.listen).await?;
    println!("Fake game server bound to {}", socket.local_addr()?);

    for (kind, body) in samples() {
        println!("Sending {} '{}' to {}", kind, body, args.bridge);
        socket.send_to(&encode(&kind, body), args.bridge).await?;
        sleep(Duration::from_millis(500)).await;
    }

    println!("Waiting {}s for messages from the bridge...", args.wait);
    let deadline = Instant::now() + Duration::from_secs(args.wait);
    let mut buf = [0u8; MAX_DATAGRAM_SIZE];

    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            break;
        }

        match timeout(remaining, socket.recv_from(&mut buf)).await {
            Ok(Ok((len, from))) => match decode(&buf[..len]) {
                Ok(message) => println!("From {}: {} '{}'", from, message.kind, message.body),
                Err(e) => println!("From {}: unreadable frame ({})", from, e),
            },
            Ok(Err(e)) => println!("Error receiving: {}", e),
            Err(_) => break,
        }
    }

    println!("Fake game server finished");
    Ok(())
}
