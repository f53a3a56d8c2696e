//! Whitelist of approved game accounts.
//!
//! Rows live in SQLite; every mutation is mirrored to the game server as a
//! `register`/`unregister` message so its own whitelist follows along.

use crate::error::WhitelistError;
use crate::sender::OutboundSender;
use log::info;
use protocol::{whitelist_body, AccountType, MessageKind};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WhitelistEntry {
    pub username: String,
    pub account_type: AccountType,
    pub owner_id: Option<u64>,
}

impl TryFrom<SqliteRow> for WhitelistEntry {
    type Error = WhitelistError;

    fn try_from(row: SqliteRow) -> Result<Self, Self::Error> {
        let account_type: String = row.try_get("type")?;
        let owner: Option<i64> = row.try_get("owner")?;
        Ok(Self {
            username: row.try_get("username")?,
            account_type: account_type.parse()?,
            owner_id: owner.map(|id| id as u64),
        })
    }
}

/// Usernames are 3 to 16 word characters.
pub fn validate_username(username: &str) -> Result<(), WhitelistError> {
    let length = username.chars().count();
    let valid = (3..=16).contains(&length)
        && username
            .chars()
            .all(|c| c.is_alphanumeric() || c == '_');

    if valid {
        Ok(())
    } else {
        Err(WhitelistError::InvalidUsername(username.to_string()))
    }
}

pub struct Whitelist {
    pool: SqlitePool,
    sender: OutboundSender,
}

impl Whitelist {
    /// Opens (creating if needed) the database file at `path`.
    pub async fn open(path: impl AsRef<Path>, sender: OutboundSender) -> Result<Self, WhitelistError> {
        let options = SqliteConnectOptions::new()
            .filename(path.as_ref())
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        info!("Opened whitelist database {}", path.as_ref().display());
        Self::with_pool(pool, sender).await
    }

    pub async fn with_pool(pool: SqlitePool, sender: OutboundSender) -> Result<Self, WhitelistError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS mc_accounts (
                username TEXT NOT NULL,
                type TEXT NOT NULL,
                uuid TEXT UNIQUE,
                owner INTEGER
            )
            "#,
        )
        .execute(&pool)
        .await?;

        Ok(Self { pool, sender })
    }

    /// Records the account and tells the game server to whitelist it.
    /// Returns whether the datagram went out.
    pub async fn register(
        &self,
        username: &str,
        account_type: AccountType,
        owner_id: Option<u64>,
    ) -> Result<bool, WhitelistError> {
        validate_username(username)?;

        sqlx::query("INSERT INTO mc_accounts (username, type, owner) VALUES (?, ?, ?)")
            .bind(username)
            .bind(account_type.as_str())
            .bind(owner_id.map(|id| id as i64))
            .execute(&self.pool)
            .await?;

        info!("Registered {} Edition username '{}'", account_type.edition(), username);
        Ok(self
            .sender
            .send_message(&MessageKind::Register, &whitelist_body(account_type, username)))
    }

    /// Removes every registration of the username (case-insensitive) and
    /// tells the game server to drop it.
    pub async fn unregister(
        &self,
        username: &str,
        account_type: AccountType,
    ) -> Result<bool, WhitelistError> {
        validate_username(username)?;
        let username = username.to_lowercase();

        let removed = sqlx::query("DELETE FROM mc_accounts WHERE lower(username) = ? AND type = ?")
            .bind(&username)
            .bind(account_type.as_str())
            .execute(&self.pool)
            .await?
            .rows_affected();

        info!(
            "Unregistered {} Edition username '{}' ({} rows)",
            account_type.edition(),
            username,
            removed
        );
        Ok(self
            .sender
            .send_message(&MessageKind::Unregister, &whitelist_body(account_type, &username)))
    }

    pub async fn lookup(
        &self,
        username: &str,
        account_type: AccountType,
    ) -> Result<Vec<WhitelistEntry>, WhitelistError> {
        sqlx::query("SELECT username, type, owner FROM mc_accounts WHERE lower(username) = ? AND type = ?")
            .bind(username.to_lowercase())
            .bind(account_type.as_str())
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(WhitelistEntry::try_from)
            .collect()
    }

    pub async fn lookup_owner(&self, owner_id: u64) -> Result<Vec<WhitelistEntry>, WhitelistError> {
        sqlx::query("SELECT username, type, owner FROM mc_accounts WHERE owner = ?")
            .bind(owner_id as i64)
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(WhitelistEntry::try_from)
            .collect()
    }

    pub async fn list(&self) -> Result<Vec<WhitelistEntry>, WhitelistError> {
        sqlx::query("SELECT username, type, owner FROM mc_accounts")
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(WhitelistEntry::try_from)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use protocol::decode;
    use std::net::UdpSocket;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio_test::{assert_err, assert_ok};

    async fn whitelist() -> (Whitelist, UdpSocket) {
        let game = UdpSocket::bind("127.0.0.1:0").unwrap();
        game.set_read_timeout(Some(Duration::from_secs(2))).unwrap();
        let socket = Arc::new(UdpSocket::bind("127.0.0.1:0").unwrap());
        let sender = OutboundSender::new(socket, game.local_addr().unwrap());

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        (Whitelist::with_pool(pool, sender).await.unwrap(), game)
    }

    fn next_frame(game: &UdpSocket) -> protocol::Message {
        let mut buf = [0u8; 512];
        let (len, _) = game.recv_from(&mut buf).unwrap();
        decode(&buf[..len]).unwrap()
    }

    #[test]
    fn test_username_validation() {
        assert_ok!(validate_username("Steve"));
        assert_ok!(validate_username("a_b"));
        assert_ok!(validate_username("sixteen_chars_ok"));
        assert_err!(validate_username("ab"));
        assert_err!(validate_username("seventeen_chars_x"));
        assert_err!(validate_username("bad name"));
        assert_err!(validate_username("semi;colon"));
    }

    #[tokio::test]
    async fn test_register_sends_one_datagram() {
        let (whitelist, game) = whitelist().await;

        let sent = whitelist
            .register("Steve", AccountType::Java, None)
            .await
            .unwrap();
        assert!(sent);

        let frame = next_frame(&game);
        assert_eq!(frame.kind, MessageKind::Register);
        assert_eq!(frame.body, "java Steve");

        let entries = whitelist.list().await.unwrap();
        assert_eq!(
            entries,
            vec![WhitelistEntry {
                username: "Steve".to_string(),
                account_type: AccountType::Java,
                owner_id: None,
            }]
        );
    }

    #[tokio::test]
    async fn test_lookup_is_case_insensitive() {
        let (whitelist, _game) = whitelist().await;
        whitelist
            .register("Alex", AccountType::Bedrock, Some(1234567890123))
            .await
            .unwrap();

        let found = whitelist.lookup("ALEX", AccountType::Bedrock).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].owner_id, Some(1234567890123));

        assert!(whitelist.lookup("alex", AccountType::Java).await.unwrap().is_empty());
        assert_eq!(whitelist.lookup_owner(1234567890123).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_unregister_normalizes_username() {
        let (whitelist, game) = whitelist().await;
        whitelist
            .register("Steve", AccountType::Java, None)
            .await
            .unwrap();
        next_frame(&game);

        let sent = whitelist.unregister("STEVE", AccountType::Java).await.unwrap();
        assert!(sent);

        let frame = next_frame(&game);
        assert_eq!(frame.kind, MessageKind::Unregister);
        assert_eq!(frame.body, "java steve");
        assert!(whitelist.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_username_touches_nothing() {
        let (whitelist, _game) = whitelist().await;

        let result = whitelist.register("no", AccountType::Java, None).await;
        assert!(matches!(result, Err(WhitelistError::InvalidUsername(_))));
        assert!(whitelist.list().await.unwrap().is_empty());
    }
}
