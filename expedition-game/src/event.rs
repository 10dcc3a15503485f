//! Scripted events and the monster payloads they carry.
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A selectable option on an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventChoice {
    pub choice_id: String,
    pub text: String,
}

impl EventChoice {
    #[must_use]
    pub fn new(choice_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            choice_id: choice_id.into(),
            text: text.into(),
        }
    }
}

/// Event classification. Unknown server values deserialize as
/// [`EventType::Unknown`] and are handled like any unresolved choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    #[default]
    Generic,
    BossEncounter,
    #[serde(other)]
    Unknown,
}

impl EventType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Generic => "generic",
            Self::BossEncounter => "boss_encounter",
            Self::Unknown => "unknown",
        }
    }
}

/// Monster data as exchanged with the server.
///
/// Fields the client does not interpret are kept in `extra` so that the
/// payload forwarded to the battle service is the one the server sent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct MonsterSnapshot {
    pub monster_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub level: u32,
    #[serde(default)]
    pub hp: i64,
    #[serde(default)]
    pub max_hp: i64,
    #[serde(default)]
    pub mp: i64,
    #[serde(default)]
    pub max_mp: i64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl MonsterSnapshot {
    #[must_use]
    pub fn new(monster_id: impl Into<String>, name: impl Into<String>, level: u32) -> Self {
        Self {
            monster_id: monster_id.into(),
            name: name.into(),
            level,
            ..Self::default()
        }
    }
}

/// An encounter surfaced by `advance`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub description: String,
    #[serde(default)]
    pub choices: Vec<EventChoice>,
    #[serde(default)]
    pub event_type: EventType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boss_data: Option<MonsterSnapshot>,
}

impl Event {
    /// Load an event from JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON cannot be parsed into an event.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    #[must_use]
    pub fn choice(&self, choice_id: &str) -> Option<&EventChoice> {
        self.choices.iter().find(|c| c.choice_id == choice_id)
    }

    #[must_use]
    pub const fn is_boss(&self) -> bool {
        matches!(self.event_type, EventType::BossEncounter)
    }
}

/// Availability of a monster for a new expedition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MonsterCondition {
    #[default]
    Ready,
    Busy,
    CriticallyInjured,
}

/// A monster selected for the expedition team.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamMember {
    pub snapshot: MonsterSnapshot,
    #[serde(default)]
    pub condition: MonsterCondition,
}

impl TeamMember {
    #[must_use]
    pub const fn ready(snapshot: MonsterSnapshot) -> Self {
        Self {
            snapshot,
            condition: MonsterCondition::Ready,
        }
    }

    #[must_use]
    pub fn monster_id(&self) -> &str {
        &self.snapshot.monster_id
    }
}
