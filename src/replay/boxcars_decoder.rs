use crate::replay::decoder::ReplayDecoder;
use crate::replay::error::DecodeError;
use crate::replay::models::{MatchDescription, PlayerLine};
use async_trait::async_trait;
use boxcars::{HeaderProp, NetworkParse, ParserBuilder};
use std::path::Path;
use tokio::task;
use tracing::debug;

/// Rocket League replay decoder built on `boxcars`.
///
/// Only the replay header is parsed; network frames carry nothing the
/// scoreboard needs and are by far the most expensive part of a replay.
#[derive(Debug, Clone, Copy, Default)]
pub struct BoxcarsDecoder;

impl BoxcarsDecoder {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ReplayDecoder for BoxcarsDecoder {
    async fn decode(&self, path: &Path) -> Result<MatchDescription, DecodeError> {
        let data = tokio::fs::read(path)
            .await
            .map_err(|e| DecodeError::Io(path.display().to_string(), e.to_string()))?;

        debug!("Decoding {} ({} bytes)", path.display(), data.len());

        task::spawn_blocking(move || decode_bytes(&data))
            .await
            .map_err(|e| DecodeError::TaskFailed(e.to_string()))?
    }
}

pub fn decode_bytes(data: &[u8]) -> Result<MatchDescription, DecodeError> {
    let replay = ParserBuilder::new(data)
        .with_network_parse(NetworkParse::Never)
        .parse()
        .map_err(|e| DecodeError::Malformed(e.to_string()))?;

    match_from_properties(&replay.properties)
}

fn find<'a>(props: &'a [(String, HeaderProp)], key: &str) -> Option<&'a HeaderProp> {
    props.iter().find(|(k, _)| k == key).map(|(_, v)| v)
}

/// Build a match description from replay header properties.
///
/// `MapName` and `Date` are required. A replay without `PlayerStats`
/// (e.g. an abandoned match) yields zero players.
pub fn match_from_properties(
    props: &[(String, HeaderProp)],
) -> Result<MatchDescription, DecodeError> {
    let map = find(props, "MapName")
        .and_then(|v| v.as_string())
        .ok_or(DecodeError::MissingProperty("MapName"))?;
    let date = find(props, "Date")
        .and_then(|v| v.as_string())
        .ok_or(DecodeError::MissingProperty("Date"))?;

    let players = find(props, "PlayerStats")
        .and_then(|v| v.as_array())
        .map(|rows| rows.iter().map(|row| player_from_row(row)).collect())
        .unwrap_or_default();

    Ok(MatchDescription {
        map: map.to_string(),
        date: date.to_string(),
        players,
    })
}

fn player_from_row(row: &[(String, HeaderProp)]) -> PlayerLine {
    let int = |key: &str| find(row, key).and_then(|v| v.as_i32()).unwrap_or(0);

    PlayerLine {
        name: find(row, "Name")
            .and_then(|v| v.as_string())
            .unwrap_or("Unknown")
            .to_string(),
        team: int("Team"),
        goals: int("Goals"),
        assists: int("Assists"),
        saves: int("Saves"),
        shots: int("Shots"),
        score: int("Score"),
    }
}
