//! Match events
//!
//! Every event carries the tick it happened on and a `type` tag; the rest of
//! the fields depend on the game. Logs are plain vectors: two kills on the
//! same tick are two entries.

use serde::{Deserialize, Serialize};

use crate::strategy::UnitKind;
use crate::tactical::{RoundEndReason, Team};
use crate::types::{Scores, Side};

/// A single logged event
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub tick: u32,
    #[serde(flatten)]
    pub kind: EventKind,
}

impl Event {
    pub fn new(tick: u32, kind: EventKind) -> Self {
        Self { tick, kind }
    }

    /// The serialized `type` tag
    pub fn type_name(&self) -> &'static str {
        self.kind.type_name()
    }

    pub fn is_goal(&self) -> bool {
        matches!(self.kind, EventKind::Goal { .. })
    }
}

/// Game-specific event payloads
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    // Sport
    Goal {
        scorer: Side,
        score: Scores,
    },

    // Strategy
    UnitKilled {
        killer: Side,
        victim_type: UnitKind,
    },
    BuildingDestroyed {
        killer: Side,
        victim_type: UnitKind,
    },
    ZoneCaptured {
        zone: String,
        by: Side,
    },

    // Tactical
    Kill {
        killer: String,
        victim: String,
        killer_team: Team,
        victim_team: Team,
    },
    BombPlant {
        planter: String,
    },
    BombDefuse {
        defuser: String,
    },
    BombExplode,
    RoundEnd {
        round: u32,
        winner: Team,
        reason: RoundEndReason,
    },

    // Arena
    Disqualified {
        side: Side,
        agent: String,
    },
}

impl EventKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            EventKind::Goal { .. } => "goal",
            EventKind::UnitKilled { .. } => "unit_killed",
            EventKind::BuildingDestroyed { .. } => "building_destroyed",
            EventKind::ZoneCaptured { .. } => "zone_captured",
            EventKind::Kill { .. } => "kill",
            EventKind::BombPlant { .. } => "bomb_plant",
            EventKind::BombDefuse { .. } => "bomb_defuse",
            EventKind::BombExplode => "bomb_explode",
            EventKind::RoundEnd { .. } => "round_end",
            EventKind::Disqualified { .. } => "disqualified",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_json_shape() {
        let event = Event::new(
            12,
            EventKind::ZoneCaptured {
                zone: "mid".to_string(),
                by: Side::Player2,
            },
        );
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["tick"], 12);
        assert_eq!(value["type"], "zone_captured");
        assert_eq!(value["by"], "player_2");
        assert_eq!(event.type_name(), "zone_captured");
    }

    #[test]
    fn test_unit_variant_has_type_tag() {
        let value = serde_json::to_value(Event::new(40, EventKind::BombExplode)).unwrap();
        assert_eq!(value["type"], "bomb_explode");
        assert_eq!(value["tick"], 40);
    }
}
