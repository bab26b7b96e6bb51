//! LOD scheduling.
//!
//! Each tick every combatant is classified by distance to the viewpoint into
//! one of four tiers, and marked due for a logic update when its tier's
//! refresh period has elapsed since its last update. Near combatants are due
//! every tick; culled ones never are.

use crate::components::*;
use crate::config::{LodConfig, SimConfig};
use crate::population::Viewpoint;
use bevy_ecs::prelude::*;

/// Global simulation tick counter.
/// Increments each fixed update, used for death-delay expiry.
#[derive(Resource, Debug, Clone, Copy, Default)]
pub struct SimTick(pub u64);

impl SimTick {
    pub fn increment(&mut self) {
        self.0 = self.0.wrapping_add(1);
    }
}

/// Simulation clock in seconds.
#[derive(Resource, Debug, Clone, Copy, Default)]
pub struct SimTime(pub f32);

/// Tier for a combatant `distance` units from the viewpoint.
#[inline]
pub fn classify(distance: f32, config: &LodConfig) -> LodTier {
    if distance <= config.near_distance {
        LodTier::Near
    } else if distance <= config.medium_distance {
        LodTier::Medium
    } else if distance <= config.far_distance {
        LodTier::Far
    } else {
        LodTier::Culled
    }
}

/// Minimum seconds between logic updates. `None` for tiers that never update.
pub fn refresh_period(tier: LodTier, config: &LodConfig) -> Option<f32> {
    match tier {
        LodTier::Near => Some(0.0),
        LodTier::Medium => Some(config.medium_period),
        LodTier::Far => Some(config.far_period),
        LodTier::Culled => None,
    }
}

/// Updates per second a tier receives at the given tick rate.
pub fn update_frequency(tier: LodTier, config: &LodConfig, fixed_timestep: f32) -> f32 {
    match refresh_period(tier, config) {
        None => 0.0,
        Some(period) => 1.0 / period.max(fixed_timestep),
    }
}

const PERIOD_EPSILON: f32 = 1e-4;

/// System that assigns tiers and marks combatants due for update.
///
/// ## Data Access
/// - Reads: Position, BehaviorState, Viewpoint, SimTime, SimConfig
/// - Writes: LodClock
pub fn lod_assignment_system(
    config: Res<SimConfig>,
    viewpoint: Res<Viewpoint>,
    time: Res<SimTime>,
    mut query: Query<(&Position, &BehaviorState, &mut LodClock)>,
) {
    let now = time.0;
    for (pos, state, mut clock) in query.iter_mut() {
        clock.tier = classify(pos.0.distance(viewpoint.position), &config.lod);
        clock.due = false;
        clock.elapsed = 0.0;

        if state.is_dead() {
            continue;
        }
        let Some(period) = refresh_period(clock.tier, &config.lod) else {
            continue;
        };
        let since = now - clock.last_update;
        if since + PERIOD_EPSILON >= period {
            clock.due = true;
            clock.elapsed = since.clamp(0.0, config.lod.max_step);
            clock.last_update = now;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn lod_world(now: f32) -> World {
        let mut world = World::new();
        world.insert_resource(SimConfig::default());
        world.insert_resource(Viewpoint::default());
        world.insert_resource(SimTime(now));
        world
    }

    #[test]
    fn test_lod_assignment() {
        let mut world = lod_world(0.0);

        // Spawn units at different distances
        let mut unit = |position: Position| {
            world
                .spawn((position, BehaviorState::Patrolling, LodClock::default()))
                .id()
        };
        let near = unit(Position::new(10.0, 0.0, 0.0));
        let medium = unit(Position::new(100.0, 0.0, 0.0));
        let far = unit(Position::new(0.0, 0.0, 200.0));
        let culled = unit(Position::new(500.0, 0.0, 0.0));

        let mut schedule = Schedule::default();
        schedule.add_systems(lod_assignment_system);
        schedule.run(&mut world);

        assert_eq!(world.get::<LodClock>(near).unwrap().tier, LodTier::Near);
        assert_eq!(world.get::<LodClock>(medium).unwrap().tier, LodTier::Medium);
        assert_eq!(world.get::<LodClock>(far).unwrap().tier, LodTier::Far);
        assert_eq!(world.get::<LodClock>(culled).unwrap().tier, LodTier::Culled);
        assert!(!world.get::<LodClock>(culled).unwrap().due);
    }

    #[test]
    fn test_medium_tier_is_throttled() {
        let mut world = lod_world(0.0);
        let dt = SimConfig::default().fixed_timestep;
        let medium = world
            .spawn((Position::new(100.0, 0.0, 0.0), BehaviorState::Patrolling, LodClock::new(0.0)))
            .id();
        let near = world
            .spawn((Position::new(1.0, 0.0, 0.0), BehaviorState::Patrolling, LodClock::new(0.0)))
            .id();

        let mut schedule = Schedule::default();
        schedule.add_systems(lod_assignment_system);

        let mut medium_updates = 0;
        let mut near_updates = 0;
        for tick in 1..=30 {
            world.resource_mut::<SimTime>().0 = tick as f32 * dt;
            schedule.run(&mut world);
            medium_updates += world.get::<LodClock>(medium).unwrap().due as u32;
            near_updates += world.get::<LodClock>(near).unwrap().due as u32;
        }

        assert_eq!(near_updates, 30);
        // One simulated second at a 0.1 s period.
        assert!((9..=11).contains(&medium_updates), "medium updates: {medium_updates}");
    }

    #[test]
    fn test_dead_combatants_are_never_due() {
        let mut world = lod_world(1.0);
        let dead = world
            .spawn((Position::new(1.0, 0.0, 0.0), BehaviorState::Dead, LodClock::new(0.0)))
            .id();
        let mut schedule = Schedule::default();
        schedule.add_systems(lod_assignment_system);
        schedule.run(&mut world);
        assert!(!world.get::<LodClock>(dead).unwrap().due);
    }

    #[test]
    fn test_elapsed_is_clamped() {
        let mut world = lod_world(10.0);
        let e = world
            .spawn((Position::new(1.0, 0.0, 0.0), BehaviorState::Patrolling, LodClock::new(0.0)))
            .id();
        let mut schedule = Schedule::default();
        schedule.add_systems(lod_assignment_system);
        schedule.run(&mut world);
        let clock = world.get::<LodClock>(e).unwrap();
        assert!(clock.due);
        assert_eq!(clock.elapsed, SimConfig::default().lod.max_step);
    }

    proptest! {
        #[test]
        fn prop_farther_never_updates_more_often(a in 0.0f32..500.0, b in 0.0f32..500.0) {
            let config = SimConfig::default();
            let (near, far) = if a <= b { (a, b) } else { (b, a) };
            let lod = &config.lod;
            let frequency =
                |distance| update_frequency(classify(distance, lod), lod, config.fixed_timestep);
            let f_near = frequency(near);
            let f_far = frequency(far);
            prop_assert!(f_far <= f_near);
        }
    }
}
