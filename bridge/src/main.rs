use bridge::config::ConfigStore;
use bridge::discord::{run_gateway, DiscordPlatform};
use bridge::network::Bridge;
use bridge::platform::{Platform, RecordingPlatform};
use bridge::sender::OutboundSender;
use bridge::whitelist::{Whitelist, WhitelistEntry};
use clap::{Parser, Subcommand};
use log::{info, warn};
use protocol::AccountType;
use std::net::UdpSocket;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Command line arguments
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Path to the JSON config file
    #[clap(short, long, default_value = "config.json")]
    config: PathBuf,
    /// Path to the whitelist database
    #[clap(short, long, default_value = "data.db")]
    database: PathBuf,
    /// Discord bot token
    #[clap(long, env = "CRAFTBRIDGE_TOKEN", hide_env_values = true)]
    token: Option<String>,
    /// Log Discord calls instead of making them
    #[clap(long)]
    dry_run: bool,
    #[clap(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the bridge (default)
    Run,
    /// Whitelist an account on the game server
    Register {
        username: String,
        /// java or bedrock
        account_type: AccountType,
        /// Discord user id of the account's owner
        #[clap(long)]
        owner: Option<u64>,
    },
    /// Remove an account from the whitelist
    Unregister {
        username: String,
        account_type: AccountType,
    },
    /// Show registrations of a username
    Lookup {
        username: String,
        account_type: AccountType,
    },
    /// List every registration
    Registrations,
}

/// Main-method of the application.
/// Parses command-line arguments, then either runs the bridge or performs a
/// single whitelist operation.
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();

    let store = ConfigStore::load(&args.config)?;

    match args.command.unwrap_or(Command::Run) {
        Command::Run => run(store, args.token, args.dry_run).await,
        command => manage_whitelist(store, &args.database, command).await,
    }
}

async fn run(
    store: ConfigStore,
    token: Option<String>,
    dry_run: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let (platform, token): (Arc<dyn Platform>, Option<String>) = match token {
        Some(token) if !dry_run => (Arc::new(DiscordPlatform::new(token.clone())), Some(token)),
        Some(_) => (Arc::new(RecordingPlatform::new()), None),
        None => {
            warn!("No Discord token given, running in dry-run mode");
            (Arc::new(RecordingPlatform::new()), None)
        }
    };

    let bridge = Bridge::new(store, platform)?;
    info!("Listening for game server datagrams on {}", bridge.local_addr());

    let gateway = token.map(|token| tokio::spawn(run_gateway(token, bridge.event_sender())));

    let state = bridge.run().await;
    info!("Receive loop finished in state {:?}", state);

    if let Some(gateway) = gateway {
        gateway.abort();
    }
    Ok(())
}

async fn manage_whitelist(
    store: ConfigStore,
    database: &Path,
    command: Command,
) -> Result<(), Box<dyn std::error::Error>> {
    let destination = store.config().udp.sendto_addr()?;
    let socket = Arc::new(UdpSocket::bind("0.0.0.0:0")?);
    let whitelist = Whitelist::open(database, OutboundSender::new(socket, destination)).await?;

    match command {
        Command::Register {
            username,
            account_type,
            owner,
        } => {
            let sent = whitelist.register(&username, account_type, owner).await?;
            report_sent("Registered", &username, account_type, sent);
        }
        Command::Unregister {
            username,
            account_type,
        } => {
            let sent = whitelist.unregister(&username, account_type).await?;
            report_sent("Unregistered", &username, account_type, sent);
        }
        Command::Lookup {
            username,
            account_type,
        } => print_entries(&whitelist.lookup(&username, account_type).await?),
        Command::Registrations => print_entries(&whitelist.list().await?),
        Command::Run => {}
    }

    Ok(())
}

fn report_sent(action: &str, username: &str, account_type: AccountType, sent: bool) {
    println!("{} {} Edition username '{}'", action, account_type.edition(), username);
    if !sent {
        println!("Warning: the game server was not notified, see the log for details");
    }
}

fn print_entries(entries: &[WhitelistEntry]) {
    if entries.is_empty() {
        println!("No registrations found");
        return;
    }
    for entry in entries {
        match entry.owner_id {
            Some(owner) => println!("{:<16} {:<8} owner {}", entry.username, entry.account_type, owner),
            None => println!("{:<16} {}", entry.username, entry.account_type),
        }
    }
}
