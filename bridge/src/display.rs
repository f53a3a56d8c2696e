//! Rendering of status reports into the composite stats display.

use protocol::{format_playtime, parse_player_list, parse_playtimes, ParseError};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

pub const DISPLAY_TITLE: &str = "Player Stats";
pub const DISPLAY_COLOUR: u32 = 0xFFAA00;

pub const PLAYER_LIST_TITLE: &str = "Currently Online";
pub const PLAYTIMES_TITLE: &str = "Playtime Rankings";

pub const NO_PLAYERS: &str = "No players online";
pub const NO_DATA: &str = "No data";

/// Longest section body the platform accepts, in characters.
pub const FIELD_LIMIT: usize = 1024;

/// Kinds of status report that share the display. Sections render in the
/// order of [`StatusKind::ALL`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StatusKind {
    PlayerList,
    Playtimes,
}

impl StatusKind {
    pub const ALL: [StatusKind; 2] = [StatusKind::PlayerList, StatusKind::Playtimes];

    pub fn title(&self) -> &'static str {
        match self {
            StatusKind::PlayerList => PLAYER_LIST_TITLE,
            StatusKind::Playtimes => PLAYTIMES_TITLE,
        }
    }

    /// Renders a raw payload into a section body. Never fails: payloads the
    /// parser rejects render as [`NO_DATA`].
    pub fn render(&self, raw: &str, playtime_limit: usize) -> String {
        match self {
            StatusKind::PlayerList => render_player_list(raw),
            StatusKind::Playtimes => match render_playtimes(raw, playtime_limit) {
                Ok(body) => body,
                Err(e) => {
                    log::warn!("Unreadable playtimes payload '{}': {}", raw, e);
                    code_block(&[NO_DATA])
                }
            },
        }
    }
}

/// One titled block of the display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub title: String,
    pub body: String,
}

/// The full stats display as posted to the platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Display {
    pub title: String,
    pub colour: u32,
    /// Seconds since the Unix epoch.
    pub timestamp: u64,
    pub sections: Vec<Section>,
}

impl Display {
    pub fn new(sections: Vec<Section>) -> Self {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::from_secs(0))
            .as_secs();

        Self {
            title: DISPLAY_TITLE.to_string(),
            colour: DISPLAY_COLOUR,
            timestamp,
            sections,
        }
    }

    pub fn section(&self, title: &str) -> Option<&Section> {
        self.sections.iter().find(|section| section.title == title)
    }
}

fn code_block<S: AsRef<str>>(lines: &[S]) -> String {
    let mut block = String::from("```");
    for line in lines {
        block.push('\n');
        block.push_str(line.as_ref());
    }
    block.push_str("\n```");
    block
}

/// Renders online players one per line. Names that would push the block past
/// [`FIELD_LIMIT`] are replaced by a closing `…and N more` line.
pub fn render_player_list(raw: &str) -> String {
    let players = parse_player_list(raw);
    if players.is_empty() {
        return code_block(&[NO_PLAYERS]);
    }

    let mut shown = players.len();
    loop {
        let mut lines: Vec<String> = players[..shown].iter().map(|p| p.to_string()).collect();
        let hidden = players.len() - shown;
        if hidden > 0 {
            lines.push(format!("…and {} more", hidden));
        }

        let block = code_block(&lines);
        if shown == 0 || block.chars().count() <= FIELD_LIMIT {
            return block;
        }
        shown -= 1;
    }
}

pub fn render_playtimes(raw: &str, limit: usize) -> Result<String, ParseError> {
    let entries = parse_playtimes(raw, limit)?;
    if entries.is_empty() {
        return Ok(code_block(&[NO_DATA]));
    }

    // Rank column is wide enough for the largest rank plus its dot.
    let rank_width = limit.to_string().len() + 1;
    let lines: Vec<String> = entries
        .iter()
        .enumerate()
        .map(|(i, entry)| {
            format!(
                "{:<rank_width$} {:<18} {}",
                format!("{}.", i + 1),
                format!("{}:", entry.username),
                format_playtime(entry.millis),
            )
        })
        .collect();

    Ok(code_block(&lines))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_player_list_one_name_per_line() {
        assert_eq!(render_player_list("Alice,Bob"), "```\nAlice\nBob\n```");
    }

    #[test]
    fn test_long_player_list_is_capped() {
        let names: Vec<String> = (0..100).map(|i| format!("Player_{:03}", i)).collect();
        let body = render_player_list(&names.join(","));

        assert!(body.chars().count() <= FIELD_LIMIT);
        assert!(body.starts_with("```\nPlayer_000\n"));

        let lines: Vec<&str> = body.lines().collect();
        let listed = lines.iter().filter(|line| line.starts_with("Player_")).count();
        let more = lines[lines.len() - 2];
        assert_eq!(more, format!("…and {} more", 100 - listed));
        assert!(listed > 80);
    }

    #[test]
    fn test_empty_player_list() {
        assert_eq!(render_player_list(""), "```\nNo players online\n```");
    }

    #[test]
    fn test_playtimes_ranking() {
        let body = render_playtimes("Alice 3600000,Bob 90000", 10).unwrap();
        let lines: Vec<&str> = body.lines().collect();

        assert_eq!(lines.len(), 4);
        assert_eq!(lines[1], "1.  Alice:             1h 0m");
        assert_eq!(lines[2], "2.  Bob:               0h 1m");
    }

    #[test]
    fn test_playtimes_rank_width_follows_limit() {
        let body = render_playtimes("Alice 60000", 100).unwrap();
        assert!(body.contains("1.   Alice:"));
    }

    #[test]
    fn test_malformed_playtimes_fall_back() {
        assert!(render_playtimes("Alice", 10).is_err());
        assert_eq!(
            StatusKind::Playtimes.render("Alice", 10),
            "```\nNo data\n```"
        );
        assert_eq!(StatusKind::Playtimes.render("", 10), "```\nNo data\n```");
    }

    #[test]
    fn test_display_sections_lookup() {
        let display = Display::new(vec![Section {
            title: PLAYER_LIST_TITLE.to_string(),
            body: render_player_list(""),
        }]);

        assert_eq!(display.title, DISPLAY_TITLE);
        assert_eq!(display.colour, DISPLAY_COLOUR);
        assert!(display.section(PLAYER_LIST_TITLE).is_some());
        assert!(display.section(PLAYTIMES_TITLE).is_none());
    }
}
