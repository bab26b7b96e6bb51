//! Squad steering: leaders seek objectives, followers close on their leader.
//!
//! Leadership is read through the roster and the population snapshot every
//! update, so a dead or purged leader simply reads as "no living leader" and
//! its followers fall back to wandering.

use crate::components::*;
use crate::config::SimConfig;
use crate::hooks::Collaborators;
use crate::population::Population;
use crate::rng::SimRng;
use crate::squad::SquadRoster;
use bevy_ecs::prelude::*;
use glam::Vec3;
use rand::Rng;
use std::f32::consts::TAU;

/// Horizontal velocity toward `target` at `speed`, or zero within `stop_radius`.
pub fn steer_toward(from: Vec3, target: Vec3, speed: f32, stop_radius: f32) -> Vec3 {
    let flat = Vec3::new(target.x - from.x, 0.0, target.z - from.z);
    if flat.length() <= stop_radius {
        return Vec3::ZERO;
    }
    flat.normalize_or_zero() * speed
}

/// System that sets velocity and facing for every combatant due to move.
///
/// Combatants in a combat state hold position while their tier runs combat
/// logic and combat is enabled.
///
/// ## Data Access
/// - Reads: SimConfig, Collaborators, Population, Faction, Position, SquadMember,
///   BehaviorState, LodClock
/// - Writes: Velocity, Heading, Wander, SquadRoster (objectives), SimRng
pub fn squad_steering_system(
    config: Res<SimConfig>,
    hooks: Res<Collaborators>,
    population: Res<Population>,
    mut roster: ResMut<SquadRoster>,
    mut rng: ResMut<SimRng>,
    mut query: Query<(
        &Faction,
        &Position,
        &BehaviorState,
        &LodClock,
        Option<&SquadMember>,
        &mut Velocity,
        &mut Heading,
        &mut Wander,
    )>,
) {
    let squad_cfg = &config.squad;

    for (faction, pos, state, clock, member, mut vel, mut heading, mut wander) in query.iter_mut() {
        if state.is_dead() || !clock.runs_movement() {
            continue;
        }

        if config.combat.enabled && clock.tier.runs_combat() && state.is_combat() {
            vel.stop();
            continue;
        }

        let leader_target = match member {
            Some(m) if m.role == SquadRole::Leader => {
                let objective = hooks
                    .nearest_capturable_zone(pos.0, *faction)
                    .map(|zone| zone.position)
                    .unwrap_or_else(|| config.spawn.enemy_base_for(*faction));
                if let Some(squad) = roster.get_mut(m.squad) {
                    squad.objective = Some(objective);
                }
                Some(steer_toward(
                    pos.0,
                    objective,
                    squad_cfg.move_speed,
                    squad_cfg.objective_radius,
                ))
            }
            Some(m) => roster
                .get(m.squad)
                .and_then(|squad| squad.leader)
                .and_then(|leader| population.get(leader))
                .filter(|leader| leader.is_alive())
                .filter(|leader| leader.position.distance(pos.0) > squad_cfg.follow_distance)
                .map(|leader| steer_toward(pos.0, leader.position, squad_cfg.move_speed, 0.0)),
            None => None,
        };

        vel.0 = match leader_target {
            Some(velocity) => velocity,
            None => {
                wander.timer -= clock.elapsed;
                if wander.timer <= 0.0 {
                    let angle = rng.0.gen_range(0.0..TAU);
                    wander.direction = Vec3::new(angle.sin(), 0.0, angle.cos());
                    wander.timer = squad_cfg.wander_interval;
                }
                wander.direction * squad_cfg.wander_speed
            }
        };

        heading.face(vel.0);
    }
}
