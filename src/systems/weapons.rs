//! Weapon resolution: fire cadence, burst pauses and aim error.
//!
//! Shots are not resolved here. Each fired round becomes a [`ShotIntent`] in
//! [`PendingShots`] and the hit-resolution phase tests it against the
//! population once every combatant has moved.

use crate::components::*;
use crate::config::{CombatConfig, SimConfig};
use crate::rng::SimRng;
use bevy_ecs::prelude::*;
use glam::Vec3;
use rand::Rng;
use std::f32::consts::TAU;

/// A round leaving a barrel this tick.
#[derive(Debug, Clone, Copy)]
pub struct ShotIntent {
    pub shooter: CombatantId,
    pub faction: Faction,
    pub origin: Vec3,
    pub direction: Vec3,
    pub weapon: WeaponSpec,
    pub target: Option<TargetRef>,
    pub suppressive: bool,
}

/// Shots fired this tick, drained by hit resolution.
#[derive(Resource, Debug, Default)]
pub struct PendingShots(pub Vec<ShotIntent>);

/// Gate and account for one round.
///
/// Returns `false` while the weapon is cycling or a burst pause is running.
/// A permitted shot bumps the burst counter and recoil; the shot that
/// completes a burst resets the counter and arms the pause.
pub fn try_fire(fire: &mut FireControl, weapon: &WeaponSpec, skill: &SkillProfile) -> bool {
    if !fire.can_fire() {
        return false;
    }
    fire.cooldown = weapon.fire_interval();
    fire.recoil += weapon.recoil;
    fire.burst_count += 1;
    if fire.burst_count >= skill.burst_length.max(1) {
        fire.burst_count = 0;
        fire.burst_pause = skill.burst_pause;
    }
    true
}

/// Two unit vectors orthogonal to `direction` and to each other.
fn aim_basis(direction: Vec3) -> (Vec3, Vec3) {
    let right = direction
        .cross(Vec3::Y)
        .try_normalize()
        .unwrap_or(Vec3::X);
    let up = right.cross(direction).normalize_or_zero();
    (right, up)
}

/// Aimed-fire direction from `origin` at a target point moving at `velocity`.
///
/// Leads the target by `velocity * (distance / projectile_speed)` scaled by
/// the shooter's leading accuracy, then perturbs the result on both axes
/// orthogonal to the aim by `sin(u)` with `u` uniform in `[-amp, amp]`, where
/// `amp` is aim jitter plus weapon spread plus accumulated recoil.
#[allow(clippy::too_many_arguments)]
pub fn aim_direction<R: Rng + ?Sized>(
    origin: Vec3,
    target: Vec3,
    velocity: Vec3,
    skill: &SkillProfile,
    weapon: &WeaponSpec,
    recoil: f32,
    projectile_speed: f32,
    rng: &mut R,
) -> Vec3 {
    let to_target = target - origin;
    let lead = if projectile_speed > 0.0 {
        velocity * (to_target.length() / projectile_speed) * skill.leading_accuracy
    } else {
        Vec3::ZERO
    };
    let aim = (to_target + lead).try_normalize().unwrap_or(Vec3::Z);

    let amp = (skill.aim_jitter + weapon.spread + recoil).max(0.0);
    let (right, up) = aim_basis(aim);
    let dx = rng.gen_range(-amp..=amp).sin();
    let dy = rng.gen_range(-amp..=amp).sin();
    (aim + right * dx + up * dy).normalize_or_zero()
}

/// Half-angle of the suppressive-fire disk for a given aimed amplitude.
pub fn suppressive_half_angle(aimed_amp: f32, combat: &CombatConfig) -> f32 {
    aimed_amp * combat.suppress_spread_multiplier + combat.suppress_min_spread
}

/// Blind-fire direction at `last_known`, sampled uniformly over a disk.
///
/// The disk sits one unit down the aim line with radius
/// `tan(suppressive_half_angle)`, so its spread is always wider than aimed
/// fire from the same shooter.
pub fn suppressive_direction<R: Rng + ?Sized>(
    origin: Vec3,
    last_known: Vec3,
    skill: &SkillProfile,
    weapon: &WeaponSpec,
    recoil: f32,
    combat: &CombatConfig,
    rng: &mut R,
) -> Vec3 {
    let aim = (last_known - origin).try_normalize().unwrap_or(Vec3::Z);
    let amp = (skill.aim_jitter + weapon.spread + recoil).max(0.0);
    let radius = suppressive_half_angle(amp, combat).tan();

    let r = radius * rng.gen::<f32>().sqrt();
    let theta = rng.gen_range(0.0..TAU);
    let (right, up) = aim_basis(aim);
    (aim + right * (r * theta.cos()) + up * (r * theta.sin())).normalize_or_zero()
}

/// System that cycles weapons and queues shots for engaging and
/// suppressing combatants.
///
/// ## Data Access
/// - Reads: SimConfig, Faction, Position, Awareness, WeaponSpec, SkillProfile, LodClock
/// - Writes: FireControl, PendingShots, SimRng
pub fn weapon_system(
    config: Res<SimConfig>,
    mut rng: ResMut<SimRng>,
    mut shots: ResMut<PendingShots>,
    mut query: Query<(
        &CombatantId,
        &Faction,
        &Position,
        &BehaviorState,
        &Awareness,
        &WeaponSpec,
        &SkillProfile,
        &LodClock,
        &mut FireControl,
    )>,
) {
    shots.0.clear();
    if !config.combat.enabled {
        return;
    }
    let combat = &config.combat;

    for (id, faction, pos, state, awareness, weapon, skill, clock, mut fire) in query.iter_mut() {
        if !clock.runs_combat() {
            continue;
        }
        fire.tick(clock.elapsed, weapon);

        let origin = pos.0 + Vec3::Y * combat.muzzle_height;
        let aim_offset = Vec3::Y * combat.aim_height;

        let planned = match state {
            BehaviorState::Engaging if awareness.visible && awareness.target_alive => {
                awareness.target_position.map(|target| (target + aim_offset, false))
            }
            BehaviorState::Suppressing => awareness
                .last_known_position
                .map(|target| (target + aim_offset, true)),
            _ => None,
        };
        let Some((aim_point, suppressive)) = planned else {
            continue;
        };

        let recoil = fire.recoil;
        if !try_fire(&mut fire, weapon, skill) {
            continue;
        }

        let direction = if suppressive {
            suppressive_direction(origin, aim_point, skill, weapon, recoil, combat, &mut rng.0)
        } else {
            aim_direction(
                origin,
                aim_point,
                awareness.target_velocity,
                skill,
                weapon,
                recoil,
                combat.projectile_speed,
                &mut rng.0,
            )
        };

        shots.0.push(ShotIntent {
            shooter: *id,
            faction: *faction,
            origin,
            direction,
            weapon: *weapon,
            target: awareness.target,
            suppressive,
        });
    }
}
