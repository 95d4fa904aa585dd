//! Turns raw RCON text and loosely shaped status payloads into typed values.
//!
//! Every function here is total: malformed or empty input yields the field's default.

use crate::transport::LiveDetails;
use serde::{
    Deserialize,
    Serialize,
};
use std::collections::HashMap;

pub const DEFAULT_DAY: u32 = 1;
pub const UNKNOWN_TIME: &str = "Unknown";

const BUILD_ID_KEYS: &[&str] = &["BUILDID_s", "BUILDID", "BuildId"];
const MINOR_BUILD_ID_KEYS: &[&str] = &["MINORBUILDID_s", "MINORBUILDID", "MinorBuildId"];
const MAP_KEYS: &[&str] = &["FRIENDLYMAPNAME_s", "MAPNAME_s", "MapName_s", "MAPNAME"];

/// Counts the players in a `ListPlayers` response.
///
/// A line counts when it looks like `0. Name, 0002214a4a67...`, like `Player 3: Name`, or when it is
/// a bare name: non-empty, without digits and without the word `Player`.
pub fn parse_player_count(raw: &str) -> u32 {
    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter(|line| is_indexed_player_line(line) || is_numbered_player_line(line) || is_bare_name_line(line))
        .count() as u32
}

/// `index. name, hex-id`
fn is_indexed_player_line(line: &str) -> bool {
    let Some((index, rest)) = line.split_once('.') else {
        return false;
    };
    if index.is_empty() || !index.chars().all(|c| c.is_ascii_digit()) {
        return false;
    }
    let Some((name, id)) = rest.rsplit_once(',') else {
        return false;
    };
    let id = id.trim();
    !name.trim().is_empty() && !id.is_empty() && id.chars().all(|c| c.is_ascii_hexdigit())
}

/// `Player N: name`
fn is_numbered_player_line(line: &str) -> bool {
    let Some(rest) = line.strip_prefix("Player ") else {
        return false;
    };
    let Some((number, _name)) = rest.split_once(':') else {
        return false;
    };
    !number.is_empty() && number.chars().all(|c| c.is_ascii_digit())
}

fn is_bare_name_line(line: &str) -> bool {
    !line.chars().any(|c| c.is_ascii_digit()) && !line.contains("Player")
}

/// The first integer in a `GetDay` style response, never below day 1.
pub fn parse_day(raw: &str) -> u32 {
    raw.split(|c: char| !c.is_ascii_digit())
        .find(|part| !part.is_empty())
        .and_then(|digits| digits.parse::<u32>().ok())
        .map(|day| day.max(DEFAULT_DAY))
        .unwrap_or(DEFAULT_DAY)
}

pub fn parse_game_time(raw: &str) -> String {
    let time = raw.trim();
    if time.is_empty() {
        UNKNOWN_TIME.to_string()
    } else {
        time.to_string()
    }
}

pub fn parse_version(details: &LiveDetails) -> Option<String> {
    VersionSource::of(details).into_version()
}

pub fn parse_map(details: &LiveDetails) -> Option<String> {
    MapSource::of(details).into_map()
}

// -=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-

/// The `raw` bag attached to live details. Depending on the backend version the attributes are
/// either nested under `attributes` or sit directly in the bag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawDetails {
    Nested { attributes: RawAttributes },
    Flat(RawAttributes),
    Other(serde_json::Value),
}

impl RawDetails {
    pub fn attributes(&self) -> Option<&RawAttributes> {
        match self {
            RawDetails::Nested { attributes } | RawDetails::Flat(attributes) => Some(attributes),
            RawDetails::Other(_) => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawAttributes(HashMap<String, serde_json::Value>);

impl RawAttributes {
    /// The first of `keys` holding a non-empty string or a number.
    pub fn first(&self, keys: &[&str]) -> Option<String> {
        keys.iter().find_map(|key| match self.0.get(*key)? {
            serde_json::Value::String(value) => non_empty(value),
            serde_json::Value::Number(value) => Some(value.to_string()),
            _ => None,
        })
    }
}

impl<K: ToString, V: Into<serde_json::Value>> FromIterator<(K, V)> for RawAttributes {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.to_string(), v.into())).collect())
    }
}

fn non_empty(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

/// Where a server version was found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionSource {
    Explicit(String),
    Build { build: String, minor: Option<String> },
    Unknown,
}

impl VersionSource {
    pub fn of(details: &LiveDetails) -> Self {
        if let Some(version) = details.version.as_deref().and_then(non_empty) {
            return Self::Explicit(version);
        }
        details
            .raw
            .as_ref()
            .and_then(RawDetails::attributes)
            .map(Self::from_attributes)
            .unwrap_or(Self::Unknown)
    }

    pub fn from_attributes(attributes: &RawAttributes) -> Self {
        match attributes.first(BUILD_ID_KEYS) {
            Some(build) => Self::Build {
                build,
                minor: attributes.first(MINOR_BUILD_ID_KEYS),
            },
            None => Self::Unknown,
        }
    }

    pub fn into_version(self) -> Option<String> {
        match self {
            VersionSource::Explicit(version) => Some(version),
            VersionSource::Build { build, minor: Some(minor) } => Some(format!("{build}.{minor}")),
            VersionSource::Build { build, minor: None } => Some(build),
            VersionSource::Unknown => None,
        }
    }
}

/// Where a map name was found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MapSource {
    Explicit(String),
    Attribute(String),
    Unknown,
}

impl MapSource {
    pub fn of(details: &LiveDetails) -> Self {
        if let Some(map) = details.map.as_deref().and_then(non_empty) {
            return Self::Explicit(map);
        }
        details
            .raw
            .as_ref()
            .and_then(RawDetails::attributes)
            .and_then(|attributes| attributes.first(MAP_KEYS))
            .map(Self::Attribute)
            .unwrap_or(Self::Unknown)
    }

    pub fn into_map(self) -> Option<String> {
        match self {
            MapSource::Explicit(map) | MapSource::Attribute(map) => Some(map),
            MapSource::Unknown => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn details(json: &str) -> LiveDetails {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn player_count_formats() {
        assert_eq!(parse_player_count("0. Willow, 0002214a4a6742d9a347bd449b2dc143"), 1);
        assert_eq!(parse_player_count(""), 0);
        assert_eq!(parse_player_count("   \n\n"), 0);
        assert_eq!(
            parse_player_count("0. Willow, 0002214a4a6742d9a347bd449b2dc143\n1. Rex Rider, 76561198000000000\n"),
            2
        );
        assert_eq!(parse_player_count("Player 1: Willow\nPlayer 2: Moss"), 2);
        assert_eq!(parse_player_count("Willow\nMoss"), 2);
    }

    #[test]
    fn player_count_ignores_status_lines() {
        assert_eq!(parse_player_count("No Players Connected"), 0);
        assert_eq!(parse_player_count("Server received, But no response!!"), 1);
        assert_eq!(parse_player_count("12 players online"), 0);
    }

    #[test]
    fn day_is_first_integer() {
        assert_eq!(parse_day("Day 27"), 27);
        assert_eq!(parse_day(""), 1);
        assert_eq!(parse_day("Day 0"), 1);
        assert_eq!(parse_day("no day here"), 1);
        assert_eq!(parse_day("Day 310, 06:12:45"), 310);
        assert_eq!(parse_day("99999999999999"), 1);
    }

    #[test]
    fn game_time_is_trimmed() {
        assert_eq!(parse_game_time("  13:05:22 \n"), "13:05:22");
        assert_eq!(parse_game_time(""), "Unknown");
        assert_eq!(parse_game_time("\n"), "Unknown");
    }

    #[test]
    fn version_from_build_ids() {
        let with_minor = details(r#"{"raw":{"attributes":{"BUILDID_s":"12345","MINORBUILDID_s":"6"}}}"#);
        assert_eq!(parse_version(&with_minor).as_deref(), Some("12345.6"));

        let without_minor = details(r#"{"raw":{"attributes":{"BUILDID_s":"12345"}}}"#);
        assert_eq!(parse_version(&without_minor).as_deref(), Some("12345"));
    }

    #[test]
    fn explicit_version_wins() {
        let both = details(r#"{"version":"358.17","raw":{"attributes":{"BUILDID_s":"12345"}}}"#);
        assert_eq!(VersionSource::of(&both), VersionSource::Explicit("358.17".to_string()));

        let blank = details(r#"{"version":"  ","raw":{"attributes":{"BUILDID_s":"12345"}}}"#);
        assert_eq!(parse_version(&blank).as_deref(), Some("12345"));
    }

    #[test]
    fn flat_and_numeric_attributes() {
        let flat = details(r#"{"raw":{"BUILDID":12345,"MINORBUILDID":6,"MAPNAME_s":"TheIsland_WP"}}"#);
        assert_eq!(parse_version(&flat).as_deref(), Some("12345.6"));
        assert_eq!(parse_map(&flat).as_deref(), Some("TheIsland_WP"));

        let odd = details(r#"{"raw":"not an object"}"#);
        assert_eq!(parse_version(&odd), None);
        assert_eq!(parse_map(&odd), None);
    }

    #[test]
    fn map_prefers_explicit_then_friendly_name() {
        let explicit = details(r#"{"map":"Ragnarok","raw":{"attributes":{"MAPNAME_s":"Ragnarok_WP"}}}"#);
        assert_eq!(MapSource::of(&explicit), MapSource::Explicit("Ragnarok".to_string()));

        let friendly = details(
            r#"{"raw":{"attributes":{"MAPNAME_s":"ScorchedEarth_WP","FRIENDLYMAPNAME_s":"Scorched Earth"}}}"#,
        );
        assert_eq!(parse_map(&friendly).as_deref(), Some("Scorched Earth"));

        assert_eq!(parse_map(&LiveDetails::default()), None);
    }

    #[test]
    fn attributes_from_iter() {
        let attributes: RawAttributes = [("BUILDID_s", "1"), ("MINORBUILDID_s", "")].into_iter().collect();
        assert_eq!(
            VersionSource::from_attributes(&attributes),
            VersionSource::Build {
                build: "1".to_string(),
                minor: None
            }
        );
    }
}
