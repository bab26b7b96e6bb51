//! Spawn scheduling: initial deployment, reinforcements and rebalancing.
//!
//! All of these create or purge combatants, so they run as exclusive
//! systems on `&mut World` after combat resolution for the tick is done.

use crate::components::*;
use crate::config::{SimConfig, SpawnConfig};
use crate::hooks::{Collaborators, Zone};
use crate::population::Viewpoint;
use crate::registry::{purge_combatant, spawn_combatant, CombatantRegistry, CombatantSpawn};
use crate::rng::SimRng;
use crate::squad::{formation_offsets, Squad, SquadRoster};
use crate::systems::movement::DeltaTime;
use bevy_ecs::prelude::*;
use glam::{Quat, Vec3};
use rand::Rng;
use std::collections::VecDeque;
use std::f32::consts::TAU;
use tracing::{debug, info, warn};

/// A squad waiting to be released.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reinforcement {
    pub faction: Faction,
    pub position: Vec3,
    pub size: usize,
}

/// Reinforcements released one per interval, oldest first.
#[derive(Resource, Debug, Default)]
pub struct ReinforcementQueue(pub VecDeque<Reinforcement>);

/// Seconds accumulated toward the next reinforcement release and rebalance.
#[derive(Resource, Debug, Default)]
pub struct SpawnTimers {
    pub reinforcement: f32,
    pub rebalance: f32,
}

fn pick_skill<R: Rng + ?Sized>(rng: &mut R) -> SkillProfile {
    match rng.gen_range(0..10) {
        0..=1 => SkillProfile::veteran(),
        2..=7 => SkillProfile::regular(),
        _ => SkillProfile::recruit(),
    }
}

/// Create a squad of up to `size` combatants around `center`, facing the
/// enemy base.
///
/// The squad is truncated to fit under the population cap. Returns `None`
/// when nothing could be spawned.
pub fn spawn_squad(
    world: &mut World,
    faction: Faction,
    center: Vec3,
    size: usize,
) -> Option<SquadId> {
    let config = world.resource::<SimConfig>().clone();
    let living = world.resource::<CombatantRegistry>().len();
    let room = config.spawn.max_population.saturating_sub(living);
    let size = if size > room {
        warn!(
            faction = faction.as_str(),
            requested = size,
            granted = room,
            "Population cap reached; truncating squad"
        );
        room
    } else {
        size
    };
    if size == 0 {
        return None;
    }

    let formation = config.squad.formation;
    let (offsets, skills) = {
        let mut rng = world.resource_mut::<SimRng>();
        let offsets = formation_offsets(formation, size, &config.squad, &mut rng.0);
        let skills: Vec<SkillProfile> = (0..size).map(|_| pick_skill(&mut rng.0)).collect();
        (offsets, skills)
    };

    let id = world.resource_mut::<SquadRoster>().allocate_id();
    let facing = config.spawn.enemy_base_for(faction) - center;
    let yaw = yaw_of(facing);
    let rotation = Quat::from_rotation_y(yaw);

    let mut squad = Squad::new(id, faction, formation);
    for (index, (offset, skill)) in offsets.into_iter().zip(skills).enumerate() {
        let mut position = center + rotation * offset;
        position.y = world.resource::<Collaborators>().height_at(position.x, position.z);
        let role = if index == 0 {
            SquadRole::Leader
        } else {
            SquadRole::Follower
        };
        let member = spawn_combatant(
            world,
            CombatantSpawn::new(faction, position)
                .facing(yaw)
                .with_skill(skill)
                .in_squad(SquadMember {
                    squad: id,
                    role,
                    formation_offset: offset,
                }),
        );
        if role == SquadRole::Leader {
            squad.leader = Some(member);
        }
        squad.members.push(member);
    }

    info!(
        squad = id.0,
        faction = faction.as_str(),
        size = squad.members.len(),
        x = center.x,
        z = center.z,
        "Squad spawned"
    );
    world.resource_mut::<SquadRoster>().insert(squad);
    Some(id)
}

/// One squad per faction at its base anchor.
pub fn deploy_initial_forces(world: &mut World) -> Vec<SquadId> {
    let spawn = world.resource::<SimConfig>().spawn.clone();
    info!("Deploying initial forces");
    Faction::ALL
        .iter()
        .filter_map(|&faction| {
            spawn_squad(world, faction, spawn.base_for(faction), spawn.squad_size)
        })
        .collect()
}

fn sample_zone_anchor<R: Rng + ?Sized>(zones: &[Zone], config: &SpawnConfig, rng: &mut R) -> Vec3 {
    let zone = zones[rng.gen_range(0..zones.len())];
    let angle = rng.gen_range(0.0..TAU);
    let inner = config.zone_inner_radius.min(config.zone_outer_radius);
    let outer = config.zone_inner_radius.max(config.zone_outer_radius);
    let radius = rng.gen_range(inner..=outer);
    zone.position + Vec3::new(angle.cos(), 0.0, angle.sin()) * radius
}

fn sample_fallback<R: Rng + ?Sized>(
    faction: Faction,
    viewpoint: &Viewpoint,
    config: &SpawnConfig,
    rng: &mut R,
) -> Vec3 {
    let forward = Vec3::new(viewpoint.direction.x, 0.0, viewpoint.direction.z)
        .try_normalize()
        .unwrap_or(Vec3::Z);
    let side = Vec3::new(forward.z, 0.0, -forward.x);
    // Red arrives ahead of the viewpoint, Blue behind it.
    let bias = match faction {
        Faction::Red => 1.0,
        Faction::Blue => -1.0,
    };
    let extent = config.fallback_lateral.abs();
    let lateral = rng.gen_range(-extent..=extent);
    viewpoint.position + forward * (bias * config.fallback_distance) + side * lateral
}

/// Pick a spawn point for a new squad of `faction`.
///
/// Prefers a random point in the annulus around a zone the faction owns,
/// falling back to an offset from the viewpoint. Up to
/// `max_placement_attempts` candidates are tried; if none is clear of every
/// living combatant the last one is nudged once away from its nearest
/// neighbor and accepted as is.
pub fn choose_spawn_position(world: &mut World, faction: Faction) -> Vec3 {
    let config = world.resource::<SimConfig>().spawn.clone();
    let viewpoint = *world.resource::<Viewpoint>();
    let zones = world.resource::<Collaborators>().zones_owned_by(faction);

    let occupied: Vec<Vec3> = world
        .query::<(&Position, &BehaviorState)>()
        .iter(world)
        .filter(|(_, state)| !state.is_dead())
        .map(|(pos, _)| pos.0)
        .collect();
    let nearest = |point: Vec3| {
        occupied
            .iter()
            .copied()
            .min_by(|a, b| a.distance_squared(point).total_cmp(&b.distance_squared(point)))
    };
    let is_clear = |point: Vec3| {
        nearest(point).map_or(true, |n| n.distance(point) >= config.min_separation)
    };

    let mut candidate = viewpoint.position;
    let found = {
        let mut rng = world.resource_mut::<SimRng>();
        let mut found = false;
        for _ in 0..config.max_placement_attempts.max(1) {
            candidate = if zones.is_empty() {
                sample_fallback(faction, &viewpoint, &config, &mut rng.0)
            } else {
                sample_zone_anchor(&zones, &config, &mut rng.0)
            };
            if is_clear(candidate) {
                found = true;
                break;
            }
        }
        found
    };

    if !found {
        if let Some(neighbor) = nearest(candidate) {
            let away = Vec3::new(candidate.x - neighbor.x, 0.0, candidate.z - neighbor.z)
                .try_normalize()
                .unwrap_or(Vec3::X);
            candidate += away * config.nudge_distance;
        }
        warn!(
            faction = faction.as_str(),
            attempts = config.max_placement_attempts,
            "No clear spawn point; accepting nudged candidate"
        );
    }

    candidate.y = world.resource::<Collaborators>().height_at(candidate.x, candidate.z);
    candidate
}

/// Exclusive system: releases one queued reinforcement per interval.
pub fn reinforcement_system(world: &mut World) {
    let dt = world.resource::<DeltaTime>().0;
    let interval = world.resource::<SimConfig>().spawn.reinforcement_interval;

    if world.resource::<ReinforcementQueue>().0.is_empty() {
        world.resource_mut::<SpawnTimers>().reinforcement = 0.0;
        return;
    }

    let due = {
        let mut timers = world.resource_mut::<SpawnTimers>();
        timers.reinforcement += dt;
        timers.reinforcement >= interval
    };
    if !due {
        return;
    }
    let Some(next) = world.resource_mut::<ReinforcementQueue>().0.pop_front() else {
        return;
    };
    world.resource_mut::<SpawnTimers>().reinforcement = 0.0;

    info!(
        faction = next.faction.as_str(),
        size = next.size,
        "Releasing reinforcement"
    );
    if spawn_squad(world, next.faction, next.position, next.size).is_none() {
        warn!(faction = next.faction.as_str(), "Reinforcement dropped");
    }
}

/// Exclusive system: periodically despawns far combatants and tops up
/// understrength factions.
///
/// Living combatants are only despawned beyond both the despawn distance and
/// the engagement range, so nothing that could still be in a fight vanishes.
pub fn rebalance_system(world: &mut World) {
    let dt = world.resource::<DeltaTime>().0;
    let config = world.resource::<SimConfig>().clone();

    {
        let mut timers = world.resource_mut::<SpawnTimers>();
        timers.rebalance += dt;
        if timers.rebalance < config.spawn.rebalance_interval {
            return;
        }
        timers.rebalance = 0.0;
    }

    let viewpoint = world.resource::<Viewpoint>().position;
    let threshold = config
        .spawn
        .despawn_distance
        .max(config.combat.max_engagement_range);

    let far: Vec<CombatantId> = world
        .query::<(&CombatantId, &Position, &BehaviorState)>()
        .iter(world)
        .filter(|(_, pos, state)| !state.is_dead() && pos.0.distance(viewpoint) > threshold)
        .map(|(id, _, _)| *id)
        .collect();
    if !far.is_empty() {
        let removed = far.into_iter().filter(|&id| purge_combatant(world, id)).count();
        info!(removed, threshold, "Despawned distant combatants");
    }

    for faction in Faction::ALL {
        let count = world
            .query::<(&Faction, &BehaviorState)>()
            .iter(world)
            .filter(|(f, state)| **f == faction && !state.is_dead())
            .count();
        if count >= config.spawn.min_per_faction {
            continue;
        }
        debug!(
            faction = faction.as_str(),
            count,
            minimum = config.spawn.min_per_faction,
            "Faction understrength"
        );
        let position = choose_spawn_position(world, faction);
        if spawn_squad(world, faction, position, config.spawn.squad_size).is_some() {
            info!(faction = faction.as_str(), "Rebalance spawned squad");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hooks::ZoneProvider;
    use crate::registry::PendingRemovals;
    use crate::squad::FormationKind;
    use crate::systems::lod::{SimTick, SimTime};

    fn spawn_world() -> World {
        let mut world = World::new();
        world.insert_resource(SimConfig::default());
        world.insert_resource(CombatantRegistry::default());
        world.insert_resource(PendingRemovals::default());
        world.insert_resource(SquadRoster::default());
        world.insert_resource(Collaborators::default());
        world.insert_resource(Viewpoint::default());
        world.insert_resource(SimRng::with_seed(99));
        world.insert_resource(SimTick(0));
        world.insert_resource(SimTime(0.0));
        world.insert_resource(DeltaTime(1.0 / 30.0));
        world.insert_resource(ReinforcementQueue::default());
        world.insert_resource(SpawnTimers::default());
        world
    }

    struct OwnedZone;

    impl ZoneProvider for OwnedZone {
        fn nearest_capturable_zone(&self, _position: Vec3, _faction: Faction) -> Option<Zone> {
            None
        }

        fn zones_owned_by(&self, faction: Faction) -> Vec<Zone> {
            vec![Zone {
                id: 3,
                position: Vec3::new(200.0, 0.0, 0.0),
                owner: Some(faction),
            }]
        }
    }

    #[test]
    fn test_squad_of_four() {
        let mut world = spawn_world();
        let center = Vec3::new(10.0, 0.0, -40.0);
        let id = spawn_squad(&mut world, Faction::Blue, center, 4).unwrap();

        let squad = world.resource::<SquadRoster>().get(id).unwrap().clone();
        assert_eq!(squad.members.len(), 4);
        let leader = squad.leader.unwrap();
        assert_eq!(squad.members[0], leader);

        let radius = SimConfig::default().squad.formation_radius;
        let mut leaders = 0;
        let mut query = world.query::<(&CombatantId, &Position, &SquadMember)>();
        for (cid, pos, member) in query.iter(&world) {
            assert_eq!(member.squad, id);
            if member.role == SquadRole::Leader {
                leaders += 1;
                assert_eq!(*cid, leader);
                assert_eq!(member.formation_offset, Vec3::ZERO);
                assert!(pos.0.distance(center) < 1e-4);
            }
            assert!(pos.0.distance(center) <= radius + 1e-4);
        }
        assert_eq!(leaders, 1);
    }

    #[test]
    fn test_population_cap_truncates() {
        let mut world = spawn_world();
        world.resource_mut::<SimConfig>().spawn.max_population = 6;
        spawn_squad(&mut world, Faction::Blue, Vec3::ZERO, 4).unwrap();
        let second = spawn_squad(&mut world, Faction::Red, Vec3::Z * 50.0, 4).unwrap();
        assert_eq!(world.resource::<SquadRoster>().get(second).unwrap().len(), 2);
        assert!(spawn_squad(&mut world, Faction::Red, Vec3::Z * 60.0, 4).is_none());
    }

    #[test]
    fn test_initial_deployment_uses_bases() {
        let mut world = spawn_world();
        let squads = deploy_initial_forces(&mut world);
        assert_eq!(squads.len(), 2);
        let roster = world.resource::<SquadRoster>();
        let blue = roster.get(squads[0]).unwrap();
        let red = roster.get(squads[1]).unwrap();
        assert_eq!(blue.faction, Faction::Blue);
        assert_eq!(red.faction, Faction::Red);
    }

    #[test]
    fn test_spawn_prefers_owned_zone() {
        let mut world = spawn_world();
        world.resource_mut::<Collaborators>().zones = Some(Box::new(OwnedZone));
        let position = choose_spawn_position(&mut world, Faction::Red);
        let distance = position.distance(Vec3::new(200.0, 0.0, 0.0));
        assert!((5.0 - 1e-3..=15.0 + 1e-3).contains(&distance));
    }

    #[test]
    fn test_fallback_spawn_is_biased_by_faction() {
        let mut world = spawn_world();
        let red = choose_spawn_position(&mut world, Faction::Red);
        let blue = choose_spawn_position(&mut world, Faction::Blue);
        // Viewpoint at the origin looking down +Z.
        assert!(red.z > 0.0);
        assert!(blue.z < 0.0);
    }

    #[test]
    fn test_reinforcements_release_one_per_interval() {
        let mut world = spawn_world();
        {
            let mut queue = world.resource_mut::<ReinforcementQueue>();
            for i in 0..2 {
                queue.0.push_back(Reinforcement {
                    faction: Faction::Red,
                    position: Vec3::new(i as f32 * 30.0, 0.0, 40.0),
                    size: 2,
                });
            }
        }
        world.resource_mut::<SimConfig>().spawn.reinforcement_interval = 0.1;

        let mut schedule = Schedule::default();
        schedule.add_systems(reinforcement_system);

        // 0.1 s at 30 Hz is three ticks; allow one more for rounding.
        for _ in 0..4 {
            schedule.run(&mut world);
        }
        assert!(world.resource::<SquadRoster>().len() >= 1);
        assert!(world.resource::<ReinforcementQueue>().0.len() <= 1);

        for _ in 0..4 {
            schedule.run(&mut world);
        }
        assert_eq!(world.resource::<SquadRoster>().len(), 2);
        assert!(world.resource::<ReinforcementQueue>().0.is_empty());
    }

    #[test]
    fn test_reinforcement_timer_idles_with_empty_queue() {
        let mut world = spawn_world();
        world.resource_mut::<SimConfig>().spawn.reinforcement_interval = 0.1;
        let mut schedule = Schedule::default();
        schedule.add_systems(reinforcement_system);

        for _ in 0..100 {
            schedule.run(&mut world);
        }
        world
            .resource_mut::<ReinforcementQueue>()
            .0
            .push_back(Reinforcement {
                faction: Faction::Blue,
                position: Vec3::ZERO,
                size: 2,
            });

        schedule.run(&mut world);
        assert!(world.resource::<SquadRoster>().is_empty());
        for _ in 0..4 {
            schedule.run(&mut world);
        }
        assert_eq!(world.resource::<SquadRoster>().len(), 1);
    }

    #[test]
    fn test_squads_use_configured_formation() {
        let mut world = spawn_world();
        world.resource_mut::<SimConfig>().squad.formation = FormationKind::Column;
        let id = spawn_squad(&mut world, Faction::Red, Vec3::ZERO, 3).unwrap();
        assert_eq!(
            world.resource::<SquadRoster>().get(id).unwrap().formation,
            FormationKind::Column
        );
    }

    #[test]
    fn test_inverted_sampling_ranges_do_not_panic() {
        let mut world = spawn_world();
        {
            let mut config = world.resource_mut::<SimConfig>();
            config.spawn.zone_inner_radius = 20.0;
            config.spawn.zone_outer_radius = 10.0;
            config.spawn.fallback_lateral = -5.0;
        }
        let fallback = choose_spawn_position(&mut world, Faction::Red);
        assert!(fallback.x.abs() <= 5.0 + 1e-3);

        world.resource_mut::<Collaborators>().zones = Some(Box::new(OwnedZone));
        let anchored = choose_spawn_position(&mut world, Faction::Red);
        let distance = anchored.distance(Vec3::new(200.0, 0.0, 0.0));
        assert!((10.0 - 1e-3..=20.0 + 1e-3).contains(&distance));
    }

    #[test]
    fn test_rebalance_despawns_far_and_tops_up() {
        let mut world = spawn_world();
        world.resource_mut::<SimConfig>().spawn.rebalance_interval = 0.0;
        let far = spawn_combatant(
            &mut world,
            CombatantSpawn::new(Faction::Red, Vec3::new(0.0, 0.0, 1000.0)),
        );

        let mut schedule = Schedule::default();
        schedule.add_systems(rebalance_system);
        schedule.run(&mut world);

        assert!(!world.resource::<CombatantRegistry>().contains(far));
        // Both factions were below the minimum and received a squad.
        let roster = world.resource::<SquadRoster>();
        assert_eq!(roster.len(), 2);
        assert!(roster.iter().all(|s| s.len() == SimConfig::default().spawn.squad_size));
    }
}
