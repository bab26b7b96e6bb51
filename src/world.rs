//! Snapshot types.
//!
//! The `Snapshot` struct provides a serializable view of the simulation state
//! that a renderer can turn into billboards.

use crate::components::*;
use crate::squad::SquadRoster;
use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};

/// Snapshot of a single combatant for serialization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CombatantSnapshot {
    pub id: u32,
    pub faction: String,
    pub x: f32,
    pub y: f32,
    pub z: f32,
    /// Smoothed yaw for presentation.
    pub yaw: f32,
    pub health: f32,
    pub health_max: f32,
    pub state: String,
    pub squad: Option<u32>,
    pub leader: bool,
    pub lod: String,
}

/// Snapshot of a squad record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SquadSnapshot {
    pub id: u32,
    pub faction: String,
    pub members: Vec<u32>,
    pub leader: Option<u32>,
    pub objective: Option<[f32; 3]>,
}

/// Living headcount per faction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CombatStatistics {
    pub blue: usize,
    pub red: usize,
    pub total: usize,
}

/// Complete simulation state snapshot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Snapshot {
    /// Current simulation tick.
    pub tick: u64,
    /// Elapsed simulation time in seconds.
    pub time: f32,
    /// All registered combatants, including dead ones awaiting removal.
    pub combatants: Vec<CombatantSnapshot>,
    pub squads: Vec<SquadSnapshot>,
    pub stats: CombatStatistics,
}

impl CombatStatistics {
    /// Count living combatants in the ECS world.
    pub fn from_world(world: &mut World) -> Self {
        let mut stats = Self::default();
        let mut query = world.query::<(&Faction, &BehaviorState)>();
        for (faction, state) in query.iter(world) {
            if state.is_dead() {
                continue;
            }
            match faction {
                Faction::Blue => stats.blue += 1,
                Faction::Red => stats.red += 1,
            }
        }
        stats.total = stats.blue + stats.red;
        stats
    }
}

impl Snapshot {
    /// Create a snapshot from the ECS world.
    pub fn from_world(world: &mut World, tick: u64, time: f32) -> Self {
        let mut combatants = Vec::new();

        let mut query = world.query::<(
            &CombatantId,
            &Faction,
            &Position,
            &Heading,
            &Health,
            &BehaviorState,
            &LodClock,
            Option<&SquadMember>,
        )>();

        for (id, faction, pos, heading, health, state, clock, member) in query.iter(world) {
            combatants.push(CombatantSnapshot {
                id: id.0,
                faction: faction.as_str().to_string(),
                x: pos.0.x,
                y: pos.0.y,
                z: pos.0.z,
                yaw: heading.visual_yaw,
                health: health.current,
                health_max: health.max,
                state: state.as_str().to_string(),
                squad: member.map(|m| m.squad.0),
                leader: member.is_some_and(|m| m.role == SquadRole::Leader),
                lod: clock.tier.as_str().to_string(),
            });
        }
        combatants.sort_by_key(|c| c.id);

        let squads = world
            .resource::<SquadRoster>()
            .iter()
            .map(|squad| SquadSnapshot {
                id: squad.id.0,
                faction: squad.faction.as_str().to_string(),
                members: squad.members.iter().map(|m| m.0).collect(),
                leader: squad.leader.map(|l| l.0),
                objective: squad.objective.map(|o| o.to_array()),
            })
            .collect();

        Self {
            tick,
            time,
            combatants,
            squads,
            stats: CombatStatistics::from_world(world),
        }
    }

    /// Serialize snapshot to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Serialize snapshot to pretty JSON string.
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
