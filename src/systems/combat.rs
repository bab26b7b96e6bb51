//! Combat resolution - hit testing shots and applying damage.
//!
//! The work is split into two phases, as with any gather/apply pipeline:
//!
//! 1. **Gather** (`hit_resolution_system`) - every queued shot is cast
//!    against the post-movement population snapshot and the player. Hits on
//!    combatants are collected as [`DamageEvent`]s; nothing is mutated yet,
//!    so every shot in a tick sees the same world.
//!
//! 2. **Apply** (`damage_apply_system`) - damage events are applied in
//!    order. A combatant whose health reaches zero is killed: it becomes
//!    `Dead`, leaves its squad immediately and is queued for removal after
//!    the death delay. Later events against it are ignored.

use crate::components::*;
use crate::config::SimConfig;
use crate::hit::{cast_ray, HitCandidate, Ray, ZoneLayout};
use crate::hooks::Collaborators;
use crate::population::{PlayerState, Population};
use crate::registry::{CombatantRegistry, PendingRemovals};
use crate::squad::SquadRoster;
use crate::systems::behavior::{transition, BehaviorEvent};
use crate::systems::lod::SimTick;
use crate::systems::weapons::PendingShots;
use bevy_ecs::prelude::*;
use tracing::debug;

/// Damage dealt to one combatant by one hit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DamageEvent {
    pub target: CombatantId,
    pub attacker: Option<CombatantId>,
    pub amount: f32,
    pub headshot: bool,
}

/// Damage gathered during hit resolution, applied afterwards.
#[derive(Resource, Debug, Default)]
pub struct CombatResults {
    pub damage: Vec<DamageEvent>,
    /// Shots fired this tick.
    pub shots: u32,
    /// Shots that struck a body this tick.
    pub hits: u32,
}

impl CombatResults {
    pub fn clear(&mut self) {
        self.damage.clear();
        self.shots = 0;
        self.hits = 0;
    }
}

/// What applying damage did to a combatant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DamageOutcome {
    /// The id no longer resolves.
    Missing,
    /// Already dead; nothing changed.
    Ignored,
    Wounded,
    Killed,
}

/// A body that hit resolution can strike.
struct Body {
    faction: Faction,
    candidate: HitCandidate<TargetRef>,
}

fn bodies(population: &Population, player: &PlayerState) -> Vec<Body> {
    let mut bodies: Vec<Body> = population
        .iter()
        .filter(|view| view.is_alive())
        .map(|view| Body {
            faction: view.faction,
            candidate: HitCandidate {
                target: TargetRef::Combatant(view.id),
                position: view.position,
                yaw: view.yaw,
                layout: ZoneLayout::for_state(view.state),
            },
        })
        .collect();
    if player.is_alive() {
        bodies.push(Body {
            faction: player.faction,
            candidate: player_candidate(player),
        });
    }
    bodies
}

/// The player's hit zones, always in the upright layout.
pub fn player_candidate(player: &PlayerState) -> HitCandidate<TargetRef> {
    HitCandidate {
        target: TargetRef::Player,
        position: player.position,
        yaw: player.yaw,
        layout: ZoneLayout::Upright,
    }
}

/// System that casts every pending shot and gathers the damage it deals.
///
/// ## Data Access
/// - Reads: SimConfig, PendingShots, Population, Collaborators
/// - Writes: CombatResults, PlayerState (health projection)
pub fn hit_resolution_system(
    config: Res<SimConfig>,
    shots: Res<PendingShots>,
    population: Res<Population>,
    hooks: Res<Collaborators>,
    mut player: ResMut<PlayerState>,
    mut results: ResMut<CombatResults>,
) {
    results.clear();
    if shots.0.is_empty() {
        return;
    }

    let friendly_fire = config.combat.friendly_fire;
    let bodies = bodies(&population, &player);

    for shot in &shots.0 {
        results.shots += 1;
        hooks.muzzle_flash(shot.origin, shot.direction);

        let ray = Ray::new(shot.origin, shot.direction);
        let max_range = config.combat.max_engagement_range.min(shot.weapon.max_range);
        let candidates = bodies
            .iter()
            .filter(|body| friendly_fire || body.faction != shot.faction)
            .filter(|body| body.candidate.target != TargetRef::Combatant(shot.shooter))
            .filter(|body| body.candidate.target != TargetRef::Player || player.is_alive())
            .map(|body| body.candidate);

        let Some(hit) = cast_ray(&ray, max_range, candidates) else {
            hooks.tracer(ray.origin, ray.at(max_range));
            continue;
        };

        results.hits += 1;
        hooks.tracer(ray.origin, hit.point);
        hooks.impact(hit.point, hit.normal);

        let amount = hooks
            .damage_for(hit.distance, hit.headshot)
            .unwrap_or_else(|| shot.weapon.damage_at(hit.distance, hit.headshot));

        match hit.target {
            TargetRef::Combatant(target) => results.damage.push(DamageEvent {
                target,
                attacker: Some(shot.shooter),
                amount,
                headshot: hit.headshot,
            }),
            TargetRef::Player => {
                let died = hooks.apply_damage_to_player(amount, shot.origin, hit.point);
                player.health = (player.health - amount.max(0.0)).max(0.0);
                if died == Some(true) {
                    player.health = 0.0;
                }
                debug!(
                    shooter = shot.shooter.0,
                    amount,
                    headshot = hit.headshot,
                    "Player hit"
                );
            }
        }
    }

    debug!(shots = results.shots, hits = results.hits, "Shots resolved");
}

/// Apply `amount` damage to a combatant, killing it if health reaches zero.
pub fn apply_damage(world: &mut World, id: CombatantId, amount: f32) -> DamageOutcome {
    let Some(entity) = world.resource::<CombatantRegistry>().entity(id) else {
        return DamageOutcome::Missing;
    };
    if world
        .get::<BehaviorState>(entity)
        .map_or(true, |state| state.is_dead())
    {
        return DamageOutcome::Ignored;
    }
    let Some(mut health) = world.get_mut::<Health>(entity) else {
        return DamageOutcome::Missing;
    };
    health.damage(amount);
    if health.is_alive() {
        return DamageOutcome::Wounded;
    }

    kill(world, entity, id);
    DamageOutcome::Killed
}

/// Death bookkeeping: terminal state, squad removal and deferred purge.
fn kill(world: &mut World, entity: Entity, id: CombatantId) {
    if let Some(mut state) = world.get_mut::<BehaviorState>(entity) {
        match transition(*state, BehaviorEvent::Killed) {
            Some(next) => *state = next,
            None => return,
        }
    }
    if let Some(mut velocity) = world.get_mut::<Velocity>(entity) {
        velocity.stop();
    }
    if let Some(mut awareness) = world.get_mut::<Awareness>(entity) {
        awareness.clear();
    }

    let member = world.entity_mut(entity).take::<SquadMember>();
    if let Some(member) = member {
        world
            .resource_mut::<SquadRoster>()
            .remove_member(member.squad, id);
    }

    let expires_at = world.resource::<SimTick>().0
        + world.resource::<SimConfig>().combat.death_delay_ticks;
    world
        .resource_mut::<PendingRemovals>()
        .schedule(id, expires_at);

    let faction = world.get::<Faction>(entity).copied().unwrap_or_default();
    world.resource::<Collaborators>().notify_death(faction);
    debug!(combatant = id.0, faction = faction.as_str(), expires_at, "Combatant killed");
}

/// Exclusive system: applies gathered damage in order.
pub fn damage_apply_system(world: &mut World) {
    let events = std::mem::take(&mut world.resource_mut::<CombatResults>().damage);
    for event in events {
        if apply_damage(world, event.target, event.amount) == DamageOutcome::Killed {
            debug!(
                target = event.target.0,
                attacker = event.attacker.map(|a| a.0),
                headshot = event.headshot,
                "Kill"
            );
        }
    }
}
