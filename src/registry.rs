//! Combatant registry: the only place combatants are created or purged.
//!
//! The registry owns a monotonic id generator scoped to its own lifetime and
//! the id → entity map used to resolve weak [`TargetRef`](crate::TargetRef)s.
//! Dead combatants are not purged immediately; they wait in
//! [`PendingRemovals`] until a tick-counted expiry.

use crate::components::*;
use crate::squad::SquadRoster;
use crate::systems::lod::{SimTick, SimTime};
use bevy_ecs::prelude::*;
use glam::Vec3;
use std::collections::HashMap;
use tracing::debug;

/// Id generator and id → entity lookup.
#[derive(Resource, Debug, Default)]
pub struct CombatantRegistry {
    next_id: u32,
    entities: HashMap<CombatantId, Entity>,
}

impl CombatantRegistry {
    fn allocate(&mut self) -> CombatantId {
        let id = CombatantId(self.next_id);
        self.next_id += 1;
        id
    }

    pub fn entity(&self, id: CombatantId) -> Option<Entity> {
        self.entities.get(&id).copied()
    }

    pub fn contains(&self, id: CombatantId) -> bool {
        self.entities.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = CombatantId> + '_ {
        self.entities.keys().copied()
    }
}

/// A dead combatant waiting to be purged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingRemoval {
    pub id: CombatantId,
    pub expires_at: u64,
}

/// Queue of deferred purges, drained once per tick.
#[derive(Resource, Debug, Default)]
pub struct PendingRemovals(pub Vec<PendingRemoval>);

impl PendingRemovals {
    pub fn schedule(&mut self, id: CombatantId, expires_at: u64) {
        if !self.0.iter().any(|p| p.id == id) {
            self.0.push(PendingRemoval { id, expires_at });
        }
    }

    /// Remove and return every entry whose expiry is at or before `tick`.
    pub fn drain_expired(&mut self, tick: u64) -> Vec<CombatantId> {
        let mut expired = Vec::new();
        self.0.retain(|p| {
            if p.expires_at <= tick {
                expired.push(p.id);
                false
            } else {
                true
            }
        });
        expired
    }

    pub fn is_pending(&self, id: CombatantId) -> bool {
        self.0.iter().any(|p| p.id == id)
    }
}

/// Everything needed to create a combatant.
#[derive(Debug, Clone, Copy)]
pub struct CombatantSpawn {
    pub faction: Faction,
    pub position: Vec3,
    pub yaw: f32,
    pub health: f32,
    pub weapon: WeaponSpec,
    pub skill: SkillProfile,
    pub squad: Option<SquadMember>,
}

impl CombatantSpawn {
    pub fn new(faction: Faction, position: Vec3) -> Self {
        Self {
            faction,
            position,
            yaw: 0.0,
            health: 100.0,
            weapon: WeaponSpec::default(),
            skill: SkillProfile::default(),
            squad: None,
        }
    }

    pub fn facing(mut self, yaw: f32) -> Self {
        self.yaw = yaw;
        self
    }

    pub fn with_skill(mut self, skill: SkillProfile) -> Self {
        self.skill = skill;
        self
    }

    pub fn with_weapon(mut self, weapon: WeaponSpec) -> Self {
        self.weapon = weapon;
        self
    }

    pub fn in_squad(mut self, member: SquadMember) -> Self {
        self.squad = Some(member);
        self
    }
}

/// Create a combatant entity and register it. Does not touch the squad roster.
pub fn spawn_combatant(world: &mut World, spawn: CombatantSpawn) -> CombatantId {
    let now = world.get_resource::<SimTime>().map(|t| t.0).unwrap_or(0.0);
    let id = world.resource_mut::<CombatantRegistry>().allocate();

    let entity = {
        let mut entity = world.spawn(CombatantBundle {
            id,
            faction: spawn.faction,
            position: Position(spawn.position),
            heading: Heading::new(spawn.yaw),
            health: Health::new(spawn.health),
            weapon: spawn.weapon,
            skill: spawn.skill,
            lod: LodClock::new(now),
            ..Default::default()
        });
        if let Some(member) = spawn.squad {
            entity.insert(member);
        }
        entity.id()
    };

    world
        .resource_mut::<CombatantRegistry>()
        .entities
        .insert(id, entity);
    id
}

/// Despawn a combatant and forget it everywhere. Returns `false` for unknown ids.
pub fn purge_combatant(world: &mut World, id: CombatantId) -> bool {
    let Some(entity) = world.resource_mut::<CombatantRegistry>().entities.remove(&id) else {
        return false;
    };
    let member = world.get::<SquadMember>(entity).copied();
    if let Some(member) = member {
        world
            .resource_mut::<SquadRoster>()
            .remove_member(member.squad, id);
    }
    world.despawn(entity);
    world
        .resource_mut::<PendingRemovals>()
        .0
        .retain(|p| p.id != id);
    true
}

/// Exclusive system: purges dead combatants whose death delay has elapsed.
pub fn pending_removal_system(world: &mut World) {
    let tick = world.resource::<SimTick>().0;
    let expired = world.resource_mut::<PendingRemovals>().drain_expired(tick);
    for id in expired {
        if purge_combatant(world, id) {
            debug!(combatant = id.0, tick, "Purged dead combatant");
        }
    }
}
