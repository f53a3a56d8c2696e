//! Body parsers for the individual message kinds.

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("playtime entry '{0}' has no space between username and time")]
    MissingSeparator(String),

    #[error("playtime entry '{0}' has an invalid millisecond count")]
    InvalidMillis(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaytimeEntry {
    pub username: String,
    pub millis: u64,
}

/// Splits a chat body into at most `arg_count + 1` space separated pieces.
///
/// The last piece keeps any remaining spaces, so `"Steve hello there"` with
/// one argument gives `["Steve", "hello there"]`.
pub fn split_args(body: &str, arg_count: usize) -> Vec<&str> {
    body.splitn(arg_count + 1, ' ').collect()
}

/// Usernames from a `playerlist` body. An empty body means nobody is online.
pub fn parse_player_list(body: &str) -> Vec<&str> {
    if body.is_empty() {
        return Vec::new();
    }
    body.split(',').collect()
}

/// Parses a `playtimes` body, keeping at most `limit` entries.
///
/// Entries stay in the order the game server sent them; the server already
/// ranks them.
pub fn parse_playtimes(body: &str, limit: usize) -> Result<Vec<PlaytimeEntry>, ParseError> {
    if body.is_empty() {
        return Ok(Vec::new());
    }

    body.split(',')
        .take(limit)
        .map(|item| {
            let (username, millis) = item
                .split_once(' ')
                .ok_or_else(|| ParseError::MissingSeparator(item.to_string()))?;
            let millis = millis
                .trim()
                .parse::<u64>()
                .map_err(|_| ParseError::InvalidMillis(item.to_string()))?;
            Ok(PlaytimeEntry {
                username: username.to_string(),
                millis,
            })
        })
        .collect()
}

/// Formats a duration in milliseconds as `"{hours}h {minutes}m"`.
///
/// Rounds to the nearest minute with ties going down, and carries hours from
/// the rounded total so 59m59s reads `1h 0m`.
pub fn format_playtime(millis: u64) -> String {
    let total_minutes = millis.saturating_add(29_999) / 60_000;
    format!("{}h {}m", total_minutes / 60, total_minutes % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_args_keeps_remainder() {
        assert_eq!(split_args("Steve hello there", 1), vec!["Steve", "hello there"]);
        assert_eq!(split_args("Server restarting soon", 0), vec!["Server restarting soon"]);
        assert_eq!(split_args("Steve", 1), vec!["Steve"]);
    }

    #[test]
    fn test_parse_player_list() {
        assert_eq!(parse_player_list("Alice,Bob"), vec!["Alice", "Bob"]);
        assert!(parse_player_list("").is_empty());
    }

    #[test]
    fn test_parse_playtimes_in_arrival_order() {
        let entries = parse_playtimes("Bob 90000,Alice 3600000", 10).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].username, "Bob");
        assert_eq!(entries[0].millis, 90_000);
        assert_eq!(entries[1].username, "Alice");
    }

    #[test]
    fn test_parse_playtimes_limit() {
        let body = (0..15)
            .map(|i| format!("player{} {}", i, i * 1000))
            .collect::<Vec<_>>()
            .join(",");
        let entries = parse_playtimes(&body, 10).unwrap();
        assert_eq!(entries.len(), 10);
        assert_eq!(entries[9].username, "player9");
    }

    #[test]
    fn test_parse_playtimes_entries_past_limit_are_ignored() {
        let entries = parse_playtimes("Alice 1000,garbage", 1).unwrap();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn test_parse_playtimes_malformed() {
        assert_eq!(
            parse_playtimes("Alice", 10),
            Err(ParseError::MissingSeparator("Alice".to_string()))
        );
        assert_eq!(
            parse_playtimes("Alice lots", 10),
            Err(ParseError::InvalidMillis("Alice lots".to_string()))
        );
    }

    #[test]
    fn test_format_playtime() {
        assert_eq!(format_playtime(3_600_000), "1h 0m");
        assert_eq!(format_playtime(90_000), "0h 1m");
        assert_eq!(format_playtime(0), "0h 0m");
        assert_eq!(format_playtime(3_599_999), "1h 0m");
        assert_eq!(format_playtime(5_430_000), "1h 30m");
    }
}
