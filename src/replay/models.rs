use serde::{Deserialize, Serialize};

/// Structured description of one match, as produced by a replay decoder
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchDescription {
    pub map: String,
    pub date: String,
    #[serde(default)]
    pub players: Vec<PlayerLine>,
}

/// End-of-match scoreboard line for a single player
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerLine {
    pub name: String,
    /// 0 = blue, 1 = orange
    pub team: i32,
    pub goals: i32,
    pub assists: i32,
    pub saves: i32,
    pub shots: i32,
    pub score: i32,
}
