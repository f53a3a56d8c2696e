//! Wire protocol spoken between the bridge and the game server plugin.
//!
//! Every datagram carries exactly one frame made of three fields separated by
//! a NUL byte:
//!
//! ```text
//! <unused> \0 <kind> \0 <body>
//! ```
//!
//! The leading field is reserved and ignored on decode. The body is the rest
//! of the datagram and may itself contain delimiters; its meaning depends on
//! the kind and is interpreted by the helpers in [`parse`].

use std::fmt;
use std::str::FromStr;

pub mod parse;

pub use parse::{
    format_playtime, parse_player_list, parse_playtimes, split_args, ParseError, PlaytimeEntry,
};

pub const DELIMITER: u8 = 0;
pub const MAX_DATAGRAM_SIZE: usize = 4096;
pub const DEFAULT_PLAYTIME_LIMIT: usize = 10;

/// Tag identifying what a frame's body means.
///
/// Tags the bridge does not know are kept as [`MessageKind::Unknown`] so newer
/// game server plugins can add kinds without breaking older bridges.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MessageKind {
    Chat,
    ChatSystem,
    PlayerList,
    Playtimes,
    Register,
    Unregister,
    Unknown(String),
}

impl MessageKind {
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "chat" => MessageKind::Chat,
            "chat_system" => MessageKind::ChatSystem,
            "playerlist" => MessageKind::PlayerList,
            "playtimes" => MessageKind::Playtimes,
            "register" => MessageKind::Register,
            "unregister" => MessageKind::Unregister,
            other => MessageKind::Unknown(other.to_string()),
        }
    }

    pub fn tag(&self) -> &str {
        match self {
            MessageKind::Chat => "chat",
            MessageKind::ChatSystem => "chat_system",
            MessageKind::PlayerList => "playerlist",
            MessageKind::Playtimes => "playtimes",
            MessageKind::Register => "register",
            MessageKind::Unregister => "unregister",
            MessageKind::Unknown(tag) => tag,
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub kind: MessageKind,
    pub body: String,
}

impl Message {
    pub fn new(kind: MessageKind, body: impl Into<String>) -> Self {
        Self {
            kind,
            body: body.into(),
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        encode(&self.kind, &self.body)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// Fewer than two delimiters in the datagram.
    #[error("truncated frame: expected <unused>\\0<kind>\\0<body>")]
    Truncated,

    #[error("frame field is not valid UTF-8")]
    InvalidUtf8,
}

/// Decodes one datagram into a [`Message`].
///
/// Splits on at most two delimiters, so anything after the second one stays
/// in the body untouched.
pub fn decode(bytes: &[u8]) -> Result<Message, DecodeError> {
    let mut fields = bytes.splitn(3, |byte| *byte == DELIMITER);

    let _unused = fields.next();
    let kind = fields.next().ok_or(DecodeError::Truncated)?;
    let body = fields.next().ok_or(DecodeError::Truncated)?;

    let kind = std::str::from_utf8(kind).map_err(|_| DecodeError::InvalidUtf8)?;
    let body = std::str::from_utf8(body).map_err(|_| DecodeError::InvalidUtf8)?;

    Ok(Message {
        kind: MessageKind::from_tag(kind),
        body: body.to_string(),
    })
}

/// Encodes a frame with an empty leading field.
///
/// The codec does not escape; `kind` must not contain a NUL byte.
pub fn encode(kind: &MessageKind, body: &str) -> Vec<u8> {
    encode_frame("", kind, body)
}

pub fn encode_frame(unused: &str, kind: &MessageKind, body: &str) -> Vec<u8> {
    let tag = kind.tag();
    let mut frame = Vec::with_capacity(unused.len() + tag.len() + body.len() + 2);
    frame.extend_from_slice(unused.as_bytes());
    frame.push(DELIMITER);
    frame.extend_from_slice(tag.as_bytes());
    frame.push(DELIMITER);
    frame.extend_from_slice(body.as_bytes());
    frame
}

/// Edition of a whitelisted game account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccountType {
    Java,
    Bedrock,
}

impl AccountType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountType::Java => "java",
            AccountType::Bedrock => "bedrock",
        }
    }

    /// Human-facing edition name, e.g. `Java`.
    pub fn edition(&self) -> &'static str {
        match self {
            AccountType::Java => "Java",
            AccountType::Bedrock => "Bedrock",
        }
    }
}

impl fmt::Display for AccountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("account type must be either 'java' or 'bedrock', got '{0}'")]
pub struct UnknownAccountType(pub String);

impl FromStr for AccountType {
    type Err = UnknownAccountType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "java" => Ok(AccountType::Java),
            "bedrock" => Ok(AccountType::Bedrock),
            _ => Err(UnknownAccountType(s.to_string())),
        }
    }
}

/// Body of a `register`/`unregister` message.
pub fn whitelist_body(account_type: AccountType, username: &str) -> String {
    format!("{} {}", account_type, username)
}
