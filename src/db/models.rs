use crate::replay::{MatchDescription, PlayerLine};
use uuid::Uuid;

/// A single column value handed to the record writer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Uuid(Uuid),
    Text(String),
    Int(i64),
}

impl From<Uuid> for Value {
    fn from(value: Uuid) -> Self {
        Value::Uuid(value)
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(i64::from(value))
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

/// Column-to-value mapping for one insert, in column order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Row {
    columns: Vec<(String, Value)>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.columns.push((column.to_string(), value.into()));
        self
    }

    pub fn columns(&self) -> &[(String, Value)] {
        &self.columns
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// One row of the `matches` table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchRecord {
    pub id: Uuid,
    /// Bucket key the replay was read from
    pub storage_path: String,
    pub map: String,
    pub date: String,
}

impl MatchRecord {
    /// A new record with a freshly generated id
    pub fn new(storage_path: &str, description: &MatchDescription) -> Self {
        Self {
            id: Uuid::new_v4(),
            storage_path: storage_path.to_string(),
            map: description.map.clone(),
            date: description.date.clone(),
        }
    }

    pub fn to_row(&self) -> Row {
        Row::new()
            .with("id", self.id)
            .with("storage_path", self.storage_path.as_str())
            .with("map", self.map.as_str())
            .with("date", self.date.as_str())
    }
}

/// One row of the `player_stats` table, owned by a match through `match_id`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerStatRecord {
    pub id: Uuid,
    pub match_id: Uuid,
    pub player_name: String,
    pub team: i32,
    pub goals: i32,
    pub assists: i32,
    pub saves: i32,
    pub shots: i32,
    pub score: i32,
}

impl PlayerStatRecord {
    pub fn new(match_id: Uuid, player: &PlayerLine) -> Self {
        Self {
            id: Uuid::new_v4(),
            match_id,
            player_name: player.name.clone(),
            team: player.team,
            goals: player.goals,
            assists: player.assists,
            saves: player.saves,
            shots: player.shots,
            score: player.score,
        }
    }

    pub fn to_row(&self) -> Row {
        Row::new()
            .with("id", self.id)
            .with("match_id", self.match_id)
            .with("player_name", self.player_name.as_str())
            .with("team", self.team)
            .with("goals", self.goals)
            .with("assists", self.assists)
            .with("saves", self.saves)
            .with("shots", self.shots)
            .with("score", self.score)
    }
}
