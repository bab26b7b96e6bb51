//! Movement system - integrates velocity, follows terrain and smooths facing.

use crate::components::*;
use crate::config::SimConfig;
use crate::hooks::Collaborators;
use bevy_ecs::prelude::*;

/// Resource containing the delta time for the current tick.
#[derive(Resource, Default)]
pub struct DeltaTime(pub f32);

/// System that applies velocity to position over each combatant's LOD step,
/// snaps it to the terrain and advances the visual rotation spring.
///
/// Position only moves on ticks where the combatant is due, using the time
/// covered by that update. The visual spring runs every tick for anything
/// not culled so presentation stays smooth between throttled updates.
pub fn movement_system(
    dt: Res<DeltaTime>,
    config: Res<SimConfig>,
    hooks: Res<Collaborators>,
    mut query: Query<(&mut Position, &Velocity, &mut Heading, &BehaviorState, &LodClock)>,
) {
    let delta = dt.0;
    for (mut pos, vel, mut heading, state, clock) in query.iter_mut() {
        if state.is_dead() || !clock.tier.runs_movement() {
            continue;
        }

        if clock.runs_movement() && clock.elapsed > 0.0 {
            pos.0 += vel.0 * clock.elapsed;
            pos.0.y = hooks.height_at(pos.0.x, pos.0.z);
        }

        heading.smooth(config.turn_stiffness, delta);
    }
}
