//! End-to-end scenarios driven through the public `SimWorld` API.

use frontline_sim::*;
use glam::Vec3;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

const DT: f32 = 1.0 / 30.0;

fn quiet_sim(seed: u64) -> SimWorld {
    let mut config = SimConfig::default();
    config.spawn.min_per_faction = 0;
    SimWorld::with_seed(config, seed).unwrap()
}

fn run(sim: &mut SimWorld, ticks: usize) {
    for _ in 0..ticks {
        sim.tick(DT);
    }
}

#[derive(Default)]
struct Flashes(AtomicU32);

#[derive(Clone, Default)]
struct RecordingEffects(Arc<Flashes>);

impl EffectSink for RecordingEffects {
    fn tracer(&self, _start: Vec3, _end: Vec3) {}

    fn muzzle_flash(&self, _position: Vec3, _direction: Vec3) {
        self.0 .0.fetch_add(1, Ordering::Relaxed);
    }

    fn impact(&self, _point: Vec3, _normal: Vec3) {}
}

#[test]
fn face_to_face_goes_alert_then_engages() {
    let mut sim = quiet_sim(3);
    sim.set_damage_model(|_d: f32, _h: bool| 0.0f32);
    let blue = sim.spawn_combatant(Faction::Blue, Vec3::ZERO);
    let red = sim.spawn_combatant(Faction::Red, Vec3::new(0.0, 0.0, 10.0));

    sim.tick(DT);
    assert_eq!(sim.combatant(blue).unwrap().state, BehaviorState::Alert);
    assert_eq!(sim.combatant(red).unwrap().state, BehaviorState::Alert);

    // Reaction delays top out at 1.25x the regular 0.5 s.
    run(&mut sim, 25);
    assert_eq!(sim.combatant(blue).unwrap().state, BehaviorState::Engaging);
    assert_eq!(sim.combatant(red).unwrap().state, BehaviorState::Engaging);

    // Nobody moved while in combat.
    assert!(sim.combatant(blue).unwrap().position.distance(Vec3::ZERO) < 1e-3);
}

#[test]
fn lethal_damage_kills_and_purges_after_delay() {
    let mut sim = quiet_sim(4);
    let id = sim.spawn_with(CombatantSpawn {
        health: 40.0,
        ..CombatantSpawn::new(Faction::Red, Vec3::new(0.0, 0.0, 20.0))
    });

    let outcome = sim.apply_damage(id, 999.0);
    assert_eq!(outcome, DamageOutcome::Killed);
    let view = sim.combatant(id).unwrap();
    assert_eq!(view.state, BehaviorState::Dead);
    assert_eq!(view.health, 0.0);
    assert!(sim.is_pending_removal(id));
    assert_eq!(sim.apply_damage(id, 10.0), DamageOutcome::Ignored);
    assert_eq!(sim.combat_statistics().red, 0);

    let delay = sim.config().combat.death_delay_ticks as usize;
    run(&mut sim, delay - 1);
    assert!(sim.combatant(id).is_some());
    run(&mut sim, 1);
    assert!(sim.combatant(id).is_none());
    assert!(!sim.is_pending_removal(id));
}

#[test]
fn squad_loses_dead_members_and_leader() {
    let mut sim = quiet_sim(5);
    let squad_id = sim.spawn_squad(Faction::Blue, Vec3::ZERO, 4).unwrap();
    let squad = sim.squad(squad_id).unwrap();
    assert_eq!(squad.len(), 4);
    let leader = squad.leader.unwrap();
    assert_eq!(squad.members[0], leader);
    let follower = squad.members[1];

    sim.apply_damage(follower, 999.0);
    let squad = sim.squad(squad_id).unwrap();
    assert_eq!(squad.len(), 3);
    assert!(!squad.contains(follower));
    assert_eq!(squad.leader, Some(leader));

    sim.apply_damage(leader, 999.0);
    let squad = sim.squad(squad_id).unwrap();
    assert_eq!(squad.leader, None);
    assert_eq!(squad.len(), 2);

    // Leaderless followers keep wandering.
    run(&mut sim, 10);
    for id in &squad.members {
        let view = sim.combatant(*id).unwrap();
        assert!(view.is_alive());
        assert!(view.velocity.length() > 0.0);
    }
}

#[test]
fn disabled_combat_freezes_states_and_fire() {
    let mut sim = quiet_sim(6);
    let effects = RecordingEffects::default();
    sim.set_effects(effects.clone());
    sim.set_combat_enabled(false);

    let blue = sim.spawn_combatant(Faction::Blue, Vec3::ZERO);
    let red = sim.spawn_combatant(Faction::Red, Vec3::new(0.0, 0.0, 30.0));
    run(&mut sim, 60);

    for id in [blue, red] {
        assert_eq!(sim.combatant(id).unwrap().state, BehaviorState::Patrolling);
    }
    assert_eq!(effects.0 .0.load(Ordering::Relaxed), 0);
    // Movement still runs.
    assert!(sim.combatant(blue).unwrap().position.distance(Vec3::ZERO) > 0.1);

    // A fresh pair spawned facing each other opens fire once combat resumes.
    sim.set_combat_enabled(true);
    sim.spawn_combatant(Faction::Blue, Vec3::new(40.0, 0.0, 0.0));
    sim.spawn_combatant(Faction::Red, Vec3::new(40.0, 0.0, 30.0));
    run(&mut sim, 60);
    assert!(effects.0 .0.load(Ordering::Relaxed) > 0);
}

#[test]
fn battle_keeps_health_and_squads_consistent() {
    let mut sim = SimWorld::with_seed(SimConfig::default(), 11).unwrap();
    sim.deploy_initial_forces();
    let mut dead: BTreeSet<CombatantId> = BTreeSet::new();

    for _ in 0..300 {
        sim.tick(DT);

        let ids = sim.combatant_ids();
        for id in &ids {
            let view = sim.combatant(*id).unwrap();
            assert!(view.health >= 0.0 && view.health <= view.max_health);
            if dead.contains(id) {
                assert_eq!(view.state, BehaviorState::Dead, "combatant {id:?} left Dead");
            }
            if !view.is_alive() {
                assert!(sim.is_pending_removal(*id));
                dead.insert(*id);
            }
        }

        let squads = sim.squads();
        for squad in &squads {
            assert!(!squad.is_empty());
            if let Some(leader) = squad.leader {
                assert!(squad.contains(leader));
            }
            for member in &squad.members {
                let view = sim.combatant(*member).unwrap();
                assert!(view.is_alive());
                assert_eq!(view.faction, squad.faction);
            }
        }

        // Every membership component is mirrored by exactly one roster entry.
        let tagged: BTreeSet<(SquadId, CombatantId)> = sim
            .world_mut()
            .query::<(&CombatantId, &SquadMember)>()
            .iter(sim.world())
            .map(|(id, member)| (member.squad, *id))
            .collect();
        let listed: BTreeSet<(SquadId, CombatantId)> = squads
            .iter()
            .flat_map(|squad| squad.members.iter().map(move |id| (squad.id, *id)))
            .collect();
        assert_eq!(tagged, listed);
        let listed_count: usize = squads.iter().map(|squad| squad.len()).sum();
        assert_eq!(listed_count, listed.len());

        let stats = sim.combat_statistics();
        assert_eq!(stats.total, stats.blue + stats.red);
        assert!(ids.len() <= sim.config().spawn.max_population);
    }
}

#[test]
fn same_seed_same_battle() {
    let play = |seed| {
        let mut sim = SimWorld::with_seed(SimConfig::default(), seed).unwrap();
        sim.deploy_initial_forces();
        run(&mut sim, 120);
        sim.snapshot_json().unwrap()
    };
    assert_eq!(play(42), play(42));
}
