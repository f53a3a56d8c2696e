//! Typed bridge configuration backed by a JSON file.
//!
//! The file is read once at startup. The only value the bridge writes back is
//! the id of the status display message, which has to survive restarts.

use crate::error::ConfigError;
use protocol::DEFAULT_PLAYTIME_LIMIT;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::net::{SocketAddr, ToSocketAddrs};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeConfig {
    pub udp: UdpConfig,
    #[serde(default)]
    pub modules: ModulesConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UdpConfig {
    pub listen_address: String,
    pub listen_port: u16,
    pub sendto_address: String,
    pub sendto_port: u16,
}

impl UdpConfig {
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.listen_address, self.listen_port)
    }

    /// Resolves the game server endpoint, accepting host names as well as IPs.
    pub fn sendto_addr(&self) -> Result<SocketAddr, ConfigError> {
        let endpoint = format!("{}:{}", self.sendto_address, self.sendto_port);
        endpoint
            .to_socket_addrs()
            .ok()
            .and_then(|mut addrs| addrs.next())
            .ok_or(ConfigError::Endpoint(endpoint))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModulesConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat: Option<ChatModule>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats: Option<StatsModule>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub help: Option<ThreadModule>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestions: Option<SuggestionsModule>,
}

/// Channel mirrored with the in-game chat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatModule {
    pub channel_id: u64,
    #[serde(default)]
    pub formats: ChatFormats,
}

/// Templates for relayed game chat. `{0}`, `{1}` are the split body pieces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatFormats {
    pub chat: String,
    pub chat_system: String,
}

impl Default for ChatFormats {
    fn default() -> Self {
        Self {
            chat: "**{0}**: {1}".to_string(),
            chat_system: "*{0}*".to_string(),
        }
    }
}

/// Channel hosting the player stats display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsModule {
    pub channel_id: u64,
    #[serde(default)]
    pub message_id: Option<u64>,
    #[serde(default = "default_playtime_limit")]
    pub playtime_limit: usize,
}

fn default_playtime_limit() -> usize {
    DEFAULT_PLAYTIME_LIMIT
}

/// Channel where every new post gets its own thread and a greeting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadModule {
    pub channel_id: u64,
    pub formats: ThreadFormats,
}

/// Templates accept `{author}` and `{content}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadFormats {
    pub thread_title: String,
    pub message_greeting: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuggestionsModule {
    pub channel_id: u64,
    pub formats: SuggestionFormats,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuggestionFormats {
    pub thread_title: String,
    pub message_greeting: String,
    pub reaction_upvote: String,
    pub reaction_downvote: String,
}

/// Where the status display lives on the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplaySurfaceRef {
    pub channel_id: u64,
    pub message_id: Option<u64>,
}

/// Owns the loaded configuration and writes it back when it changes.
///
/// The file is also kept as a raw JSON document so that saving only touches
/// the keys the bridge owns; anything else the operator put in the file is
/// written back as it was. A store created with [`ConfigStore::in_memory`]
/// never touches disk.
#[derive(Debug)]
pub struct ConfigStore {
    path: Option<PathBuf>,
    document: Value,
    config: BridgeConfig,
}

impl ConfigStore {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json_err = |source| ConfigError::Json {
            path: path.display().to_string(),
            source,
        };

        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let document: Value = serde_json::from_str(&raw).map_err(json_err)?;
        let config = BridgeConfig::deserialize(&document).map_err(json_err)?;

        Ok(Self {
            path: Some(path.to_path_buf()),
            document,
            config,
        })
    }

    pub fn in_memory(config: BridgeConfig) -> Self {
        Self {
            path: None,
            document: Value::Null,
            config,
        }
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn surface(&self) -> Option<DisplaySurfaceRef> {
        self.config.modules.stats.as_ref().map(|stats| DisplaySurfaceRef {
            channel_id: stats.channel_id,
            message_id: stats.message_id,
        })
    }

    /// Records the display message id and saves before returning.
    pub fn set_surface_message_id(&mut self, message_id: Option<u64>) -> Result<(), ConfigError> {
        match self.config.modules.stats.as_mut() {
            Some(stats) if stats.message_id != message_id => {
                stats.message_id = message_id;
                self.save()
            }
            _ => Ok(()),
        }
    }

    /// Writes `modules.stats.message_id` into the loaded document and saves
    /// it to a sibling temp file, then renames that into place.
    pub fn save(&mut self) -> Result<(), ConfigError> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        if let Some(stats) = &self.config.modules.stats {
            if let Some(section) = self
                .document
                .pointer_mut("/modules/stats")
                .and_then(Value::as_object_mut)
            {
                section.insert("message_id".to_string(), Value::from(stats.message_id));
            }
        }

        let io_err = |source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        };

        let json = serde_json::to_string_pretty(&self.document).map_err(|source| {
            ConfigError::Json {
                path: path.display().to_string(),
                source,
            }
        })?;

        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(io_err)?;
        fs::rename(&tmp, path).map_err(io_err)?;
        Ok(())
    }
}

#[cfg(test)]
pub(crate) fn test_config() -> BridgeConfig {
    BridgeConfig {
        udp: UdpConfig {
            listen_address: "127.0.0.1".to_string(),
            listen_port: 0,
            sendto_address: "127.0.0.1".to_string(),
            sendto_port: 25567,
        },
        modules: ModulesConfig {
            chat: Some(ChatModule {
                channel_id: 100,
                formats: ChatFormats::default(),
            }),
            stats: Some(StatsModule {
                channel_id: 200,
                message_id: None,
                playtime_limit: DEFAULT_PLAYTIME_LIMIT,
            }),
            help: Some(ThreadModule {
                channel_id: 300,
                formats: ThreadFormats {
                    thread_title: "Help for {author}".to_string(),
                    message_greeting: "Hi {author}, someone will be with you shortly.".to_string(),
                },
            }),
            suggestions: Some(SuggestionsModule {
                channel_id: 400,
                formats: SuggestionFormats {
                    thread_title: "Suggestion from {author}".to_string(),
                    message_greeting: "Thanks {author}! Vote below.".to_string(),
                    reaction_upvote: "👍".to_string(),
                    reaction_downvote: "👎".to_string(),
                },
            }),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const MINIMAL: &str = r#"{
        "udp": {
            "listen_address": "0.0.0.0",
            "listen_port": 25566,
            "sendto_address": "127.0.0.1",
            "sendto_port": 25567
        },
        "modules": {
            "stats": { "channel_id": 42 }
        }
    }"#;

    #[test]
    fn test_load_applies_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(MINIMAL.as_bytes()).unwrap();

        let store = ConfigStore::load(file.path()).unwrap();
        let config = store.config();

        assert_eq!(config.udp.listen_addr(), "0.0.0.0:25566");
        assert!(config.modules.chat.is_none());

        let stats = config.modules.stats.as_ref().unwrap();
        assert_eq!(stats.message_id, None);
        assert_eq!(stats.playtime_limit, DEFAULT_PLAYTIME_LIMIT);
        assert_eq!(
            store.surface(),
            Some(DisplaySurfaceRef {
                channel_id: 42,
                message_id: None
            })
        );
    }

    #[test]
    fn test_load_rejects_bad_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"{ not json").unwrap();

        let result = ConfigStore::load(file.path());
        assert!(matches!(result, Err(ConfigError::Json { .. })));
    }

    #[test]
    fn test_load_missing_file() {
        let result = ConfigStore::load("/definitely/not/here/config.json");
        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }

    #[test]
    fn test_message_id_survives_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, MINIMAL).unwrap();

        let mut store = ConfigStore::load(&path).unwrap();
        store.set_surface_message_id(Some(987654321)).unwrap();

        let reloaded = ConfigStore::load(&path).unwrap();
        assert_eq!(reloaded.surface().unwrap().message_id, Some(987654321));
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn test_saving_keeps_unknown_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            r#"{
                "prefix": "!",
                "admin": { "role_id": 7 },
                "udp": {
                    "listen_address": "0.0.0.0",
                    "listen_port": 25566,
                    "sendto_address": "127.0.0.1",
                    "sendto_port": 25567
                },
                "modules": {
                    "whitelist": { "channel_id": 9 },
                    "stats": { "channel_id": 42, "title": "Server" }
                }
            }"#,
        )
        .unwrap();

        let mut store = ConfigStore::load(&path).unwrap();
        store.set_surface_message_id(Some(99)).unwrap();

        let saved: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(saved["prefix"], "!");
        assert_eq!(saved["admin"]["role_id"], 7);
        assert_eq!(saved["modules"]["whitelist"]["channel_id"], 9);
        assert_eq!(saved["modules"]["stats"]["title"], "Server");
        assert_eq!(saved["modules"]["stats"]["message_id"], 99);
        assert_eq!(saved["udp"]["listen_port"], 25566);

        let reloaded = ConfigStore::load(&path).unwrap();
        assert_eq!(reloaded.surface().unwrap().message_id, Some(99));
    }

    #[test]
    fn test_in_memory_store_never_writes() {
        let mut store = ConfigStore::in_memory(test_config());
        store.set_surface_message_id(Some(5)).unwrap();
        assert_eq!(store.surface().unwrap().message_id, Some(5));
    }

    #[test]
    fn test_sendto_addr_resolution() {
        let config = test_config();
        let addr = config.udp.sendto_addr().unwrap();
        assert_eq!(addr, "127.0.0.1:25567".parse::<SocketAddr>().unwrap());
    }
}
