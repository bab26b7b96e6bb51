//! Read-only view of the combatant population for one phase of a tick.
//!
//! Perception, squad steering and hit resolution read other combatants
//! through this snapshot instead of live components, so no combatant ever
//! observes another mid-mutation. It is rebuilt at the start of the tick and
//! again after movement.

use crate::components::*;
use bevy_ecs::prelude::*;
use glam::Vec3;
use std::collections::HashMap;

/// Immutable projection of one combatant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CombatantView {
    pub id: CombatantId,
    pub entity: Entity,
    pub faction: Faction,
    pub position: Vec3,
    pub velocity: Vec3,
    pub yaw: f32,
    pub health: f32,
    pub max_health: f32,
    pub state: BehaviorState,
}

impl CombatantView {
    pub fn is_alive(&self) -> bool {
        !self.state.is_dead()
    }
}

/// Snapshot of all registered combatants, ordered by id (insertion order).
#[derive(Resource, Debug, Default)]
pub struct Population {
    views: Vec<CombatantView>,
    index: HashMap<CombatantId, usize>,
}

impl Population {
    pub fn rebuild(&mut self, views: impl IntoIterator<Item = CombatantView>) {
        self.views.clear();
        self.views.extend(views);
        self.views.sort_by_key(|v| v.id);
        self.index.clear();
        for (i, view) in self.views.iter().enumerate() {
            self.index.insert(view.id, i);
        }
    }

    pub fn get(&self, id: CombatantId) -> Option<&CombatantView> {
        self.index.get(&id).and_then(|&i| self.views.get(i))
    }

    pub fn iter(&self) -> impl Iterator<Item = &CombatantView> {
        self.views.iter()
    }

    /// Living combatants of `faction`.
    pub fn living(&self, faction: Faction) -> impl Iterator<Item = &CombatantView> {
        self.views
            .iter()
            .filter(move |v| v.faction == faction && v.is_alive())
    }

    pub fn len(&self) -> usize {
        self.views.len()
    }

    pub fn is_empty(&self) -> bool {
        self.views.is_empty()
    }
}

/// Host-provided projection of the human player.
#[derive(Resource, Debug, Clone, Copy)]
pub struct PlayerState {
    /// Whether a player exists at all; AI never targets an absent player.
    pub present: bool,
    pub position: Vec3,
    pub velocity: Vec3,
    pub yaw: f32,
    pub faction: Faction,
    pub health: f32,
}

impl Default for PlayerState {
    fn default() -> Self {
        Self {
            present: false,
            position: Vec3::ZERO,
            velocity: Vec3::ZERO,
            yaw: 0.0,
            faction: Faction::Blue,
            health: 100.0,
        }
    }
}

impl PlayerState {
    pub fn is_alive(&self) -> bool {
        self.present && self.health > 0.0
    }
}

/// Viewpoint used for LOD classification, despawning and fallback spawns.
#[derive(Resource, Debug, Clone, Copy)]
pub struct Viewpoint {
    pub position: Vec3,
    pub direction: Vec3,
}

impl Default for Viewpoint {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            direction: Vec3::Z,
        }
    }
}

/// What targeting code needs to know about a target, whatever it is.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TargetView {
    pub position: Vec3,
    pub velocity: Vec3,
    pub faction: Faction,
    pub health: f32,
    pub alive: bool,
}

/// Resolve a weak target reference. `None` means the referent is gone.
pub fn resolve_target(
    target: TargetRef,
    population: &Population,
    player: &PlayerState,
) -> Option<TargetView> {
    match target {
        TargetRef::Combatant(id) => population.get(id).map(|v| TargetView {
            position: v.position,
            velocity: v.velocity,
            faction: v.faction,
            health: v.health,
            alive: v.is_alive(),
        }),
        TargetRef::Player if player.present => Some(TargetView {
            position: player.position,
            velocity: player.velocity,
            faction: player.faction,
            health: player.health,
            alive: player.is_alive(),
        }),
        TargetRef::Player => None,
    }
}

fn collect_views(
    query: &Query<(
        Entity,
        &CombatantId,
        &Faction,
        &Position,
        &Velocity,
        &Heading,
        &Health,
        &BehaviorState,
    )>,
) -> Vec<CombatantView> {
    query
        .iter()
        .map(
            |(entity, id, faction, pos, vel, heading, health, state)| CombatantView {
                id: *id,
                entity,
                faction: *faction,
                position: pos.0,
                velocity: vel.0,
                yaw: heading.yaw,
                health: health.current,
                max_health: health.max,
                state: *state,
            },
        )
        .collect()
}

/// System that snapshots the population at the start of a tick.
pub fn population_snapshot_system(
    mut population: ResMut<Population>,
    query: Query<(
        Entity,
        &CombatantId,
        &Faction,
        &Position,
        &Velocity,
        &Heading,
        &Health,
        &BehaviorState,
    )>,
) {
    population.rebuild(collect_views(&query));
}

/// System that re-snapshots after movement so hit tests see final positions.
pub fn population_refresh_system(
    mut population: ResMut<Population>,
    query: Query<(
        Entity,
        &CombatantId,
        &Faction,
        &Position,
        &Velocity,
        &Heading,
        &Health,
        &BehaviorState,
    )>,
) {
    population.rebuild(collect_views(&query));
}
