//! Public API for the simulation.
//!
//! This module provides the main interface for a host engine (or any other
//! client) to drive the combat core, register collaborators and read state.
//!
//! ## Fixed Timestep
//!
//! `tick(dt)` runs exactly one update of `dt` seconds. `step(dt)` instead
//! accumulates frame time and runs as many fixed updates (default 30 Hz) as
//! have elapsed, so behavior does not depend on frame rate.
//!
//! ## Update Budget
//!
//! Combatants are tiered by distance to the viewpoint. Near ones run every
//! update, medium ones run full logic on a throttled period, far ones only
//! move, and anything beyond is skipped.

use crate::components::*;
use crate::config::SimConfig;
use crate::error::Result;
use crate::hit::{cast_ray, HitCandidate, Ray, ZoneLayout};
use crate::hooks::*;
use crate::population::*;
use crate::registry::*;
use crate::rng::SimRng;
use crate::squad::{Squad, SquadRoster};
use crate::systems::*;
use crate::world::{CombatStatistics, Snapshot};
use bevy_ecs::prelude::*;
use glam::Vec3;
use std::path::Path;
use tracing::{debug, info, warn};

/// Outcome of a shot fired by the human player.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PlayerShotResult {
    pub hit: bool,
    pub point: Option<Vec3>,
    pub target: Option<CombatantId>,
    pub killed: bool,
    pub headshot: bool,
}

/// Outcome of testing a ray against the player's own hit zones.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct IncomingHit {
    pub hit: bool,
    pub point: Option<Vec3>,
    pub headshot: bool,
}

/// The main simulation world container.
///
/// Holds the ECS world and schedule, providing a clean API for:
/// - Deploying and reinforcing forces
/// - Stepping the simulation forward
/// - Resolving the player's shots and shots at the player
/// - Registering external collaborators
/// - Extracting state snapshots
pub struct SimWorld {
    world: World,
    schedule: Schedule,
    /// Accumulated time for fixed timestep.
    time_accumulator: f32,
}

impl Default for SimWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl SimWorld {
    /// Create a new empty simulation world.
    pub fn new() -> Self {
        Self::build(SimConfig::default())
    }

    /// Create a simulation world from a TOML configuration file.
    pub fn from_config_file(path: impl AsRef<Path>) -> Result<Self> {
        Self::with_config(SimConfig::from_toml_file(path)?)
    }

    /// Create a simulation world with a seeded RNG.
    pub fn with_seed(config: SimConfig, seed: u64) -> Result<Self> {
        let mut sim = Self::with_config(config)?;
        sim.world.insert_resource(SimRng::with_seed(seed));
        Ok(sim)
    }

    /// Create a new simulation world with custom configuration.
    ///
    /// Fails with [`SimError::InvalidConfig`](crate::SimError::InvalidConfig)
    /// when the configuration is inconsistent.
    pub fn with_config(config: SimConfig) -> Result<Self> {
        if let Err(err) = config.validate() {
            warn!(%err, "Rejected simulation configuration");
            return Err(err);
        }
        Ok(Self::build(config))
    }

    fn build(config: SimConfig) -> Self {
        let mut world = World::new();

        // Clock
        world.insert_resource(DeltaTime(config.fixed_timestep));
        world.insert_resource(SimTick(0));
        world.insert_resource(SimTime(0.0));
        world.insert_resource(SimRng::default());

        // Population bookkeeping
        world.insert_resource(CombatantRegistry::default());
        world.insert_resource(PendingRemovals::default());
        world.insert_resource(SquadRoster::default());
        world.insert_resource(Population::default());

        // Host-provided state
        world.insert_resource(PlayerState::default());
        world.insert_resource(Viewpoint::default());
        world.insert_resource(Collaborators::default());

        // Per-tick scratch
        world.insert_resource(PendingShots::default());
        world.insert_resource(CombatResults::default());
        world.insert_resource(ReinforcementQueue::default());
        world.insert_resource(SpawnTimers::default());

        world.insert_resource(config);

        // Phases run strictly in order: classify, behave, move, fire,
        // resolve, apply, bookkeeping.
        let mut schedule = Schedule::default();
        schedule.add_systems(
            (
                population_snapshot_system,
                lod_assignment_system,
                perception_system,
                behavior_state_system,
                squad_steering_system,
                movement_system,
                population_refresh_system,
                weapon_system,
                hit_resolution_system,
                damage_apply_system,
                pending_removal_system,
                reinforcement_system,
                rebalance_system,
            )
                .chain(),
        );

        Self {
            world,
            schedule,
            time_accumulator: 0.0,
        }
    }

    /// Run exactly one update of `dt` seconds.
    pub fn tick(&mut self, dt: f32) {
        if dt <= 0.0 {
            return;
        }
        self.fixed_update(dt);
    }

    /// Step the simulation forward by `dt` seconds.
    ///
    /// Uses fixed timestep internally - accumulates time and runs fixed updates
    /// as needed.
    pub fn step(&mut self, dt: f32) {
        let fixed_dt = self.world.resource::<SimConfig>().fixed_timestep;
        if fixed_dt <= 0.0 {
            return;
        }

        self.time_accumulator += dt.max(0.0);

        while self.time_accumulator >= fixed_dt {
            self.fixed_update(fixed_dt);
            self.time_accumulator -= fixed_dt;
        }
    }

    /// Run a single fixed timestep update.
    fn fixed_update(&mut self, dt: f32) {
        self.world.resource_mut::<DeltaTime>().0 = dt;
        self.world.resource_mut::<SimTick>().increment();
        self.world.resource_mut::<SimTime>().0 += dt;

        self.schedule.run(&mut self.world);
    }

    // ------------------------------------------------------------------
    // Forces
    // ------------------------------------------------------------------

    /// Place one squad per faction at its base anchor.
    pub fn deploy_initial_forces(&mut self) -> Vec<SquadId> {
        deploy_initial_forces(&mut self.world)
    }

    /// Queue a squad for release at the next reinforcement interval.
    pub fn queue_reinforcement(&mut self, faction: Faction, position: Vec3, size: usize) {
        self.world
            .resource_mut::<ReinforcementQueue>()
            .0
            .push_back(Reinforcement {
                faction,
                position,
                size,
            });
        debug!(faction = faction.as_str(), size, "Reinforcement queued");
    }

    /// Spawn a squad immediately.
    pub fn spawn_squad(&mut self, faction: Faction, center: Vec3, size: usize) -> Option<SquadId> {
        spawn_squad(&mut self.world, faction, center, size)
    }

    /// Spawn a lone combatant outside any squad, facing the enemy base.
    pub fn spawn_combatant(&mut self, faction: Faction, position: Vec3) -> CombatantId {
        let yaw = yaw_of(
            self.world.resource::<SimConfig>().spawn.enemy_base_for(faction) - position,
        );
        spawn_combatant(
            &mut self.world,
            CombatantSpawn::new(faction, position).facing(yaw),
        )
    }

    /// Spawn a lone combatant from a full description.
    pub fn spawn_with(&mut self, spawn: CombatantSpawn) -> CombatantId {
        spawn_combatant(&mut self.world, spawn)
    }

    /// Damage a combatant directly, with full death bookkeeping.
    pub fn apply_damage(&mut self, id: CombatantId, amount: f32) -> DamageOutcome {
        apply_damage(&mut self.world, id, amount)
    }

    // ------------------------------------------------------------------
    // Host state
    // ------------------------------------------------------------------

    /// Set the viewpoint used for LOD, despawning and fallback spawns.
    pub fn set_viewpoint(&mut self, position: Vec3, direction: Vec3) {
        *self.world.resource_mut::<Viewpoint>() = Viewpoint {
            position,
            direction,
        };
    }

    pub fn set_player_state(&mut self, player: PlayerState) {
        *self.world.resource_mut::<PlayerState>() = player;
    }

    pub fn player_state(&self) -> PlayerState {
        *self.world.resource::<PlayerState>()
    }

    /// Globally enable or disable combat. Movement keeps running either way.
    pub fn set_combat_enabled(&mut self, enabled: bool) {
        self.world.resource_mut::<SimConfig>().combat.enabled = enabled;
        info!(enabled, "Combat toggled");
    }

    pub fn set_friendly_fire(&mut self, enabled: bool) {
        self.world.resource_mut::<SimConfig>().combat.friendly_fire = enabled;
    }

    // ------------------------------------------------------------------
    // Collaborators
    // ------------------------------------------------------------------

    pub fn set_terrain(&mut self, terrain: impl TerrainQuery + 'static) {
        self.world.resource_mut::<Collaborators>().terrain = Some(Box::new(terrain));
    }

    pub fn set_zone_provider(&mut self, zones: impl ZoneProvider + 'static) {
        self.world.resource_mut::<Collaborators>().zones = Some(Box::new(zones));
    }

    pub fn set_damage_model(&mut self, damage: impl DamageModel + 'static) {
        self.world.resource_mut::<Collaborators>().damage = Some(Box::new(damage));
    }

    pub fn set_player_health(&mut self, sink: impl PlayerHealthSink + 'static) {
        self.world.resource_mut::<Collaborators>().player_health = Some(Box::new(sink));
    }

    pub fn set_effects(&mut self, effects: impl EffectSink + 'static) {
        self.world.resource_mut::<Collaborators>().effects = Some(Box::new(effects));
    }

    pub fn set_score(&mut self, score: impl ScoreSink + 'static) {
        self.world.resource_mut::<Collaborators>().score = Some(Box::new(score));
    }

    // ------------------------------------------------------------------
    // Player interaction
    // ------------------------------------------------------------------

    /// Resolve a shot fired by the player against living AI opponents.
    ///
    /// Damage comes from `damage`; a kill goes through the same death
    /// bookkeeping as AI kills and is reported to the score collaborator.
    pub fn resolve_player_shot(&mut self, ray: Ray, damage: &dyn DamageModel) -> PlayerShotResult {
        let player_faction = self.world.resource::<PlayerState>().faction;
        let config = self.world.resource::<SimConfig>();
        let friendly_fire = config.combat.friendly_fire;
        let max_range = config.combat.max_engagement_range;

        let mut query = self
            .world
            .query::<(&CombatantId, &Faction, &Position, &Heading, &BehaviorState)>();
        let candidates: Vec<HitCandidate<CombatantId>> = query
            .iter(&self.world)
            .filter(|(_, faction, _, _, state)| {
                !state.is_dead() && (friendly_fire || **faction != player_faction)
            })
            .map(|(id, _, pos, heading, state)| HitCandidate {
                target: *id,
                position: pos.0,
                yaw: heading.yaw,
                layout: ZoneLayout::for_state(*state),
            })
            .collect();

        let Some(hit) = cast_ray(&ray, max_range, candidates) else {
            return PlayerShotResult::default();
        };

        let amount = damage.damage_for(hit.distance, hit.headshot);
        let killed = apply_damage(&mut self.world, hit.target, amount) == DamageOutcome::Killed;
        if killed {
            self.world.resource::<Collaborators>().notify_kill();
            debug!(target = hit.target.0, headshot = hit.headshot, "Player kill");
        }

        PlayerShotResult {
            hit: true,
            point: Some(hit.point),
            target: Some(hit.target),
            killed,
            headshot: hit.headshot,
        }
    }

    /// Test a ray against the player's own hit zones.
    pub fn resolve_incoming_hit(&self, ray: Ray) -> IncomingHit {
        let player = self.world.resource::<PlayerState>();
        if !player.is_alive() {
            return IncomingHit::default();
        }
        let max_range = self.world.resource::<SimConfig>().combat.max_engagement_range;
        match cast_ray(&ray, max_range, [player_candidate(player)]) {
            Some(hit) => IncomingHit {
                hit: true,
                point: Some(hit.point),
                headshot: hit.headshot,
            },
            None => IncomingHit::default(),
        }
    }

    /// Living headcount per faction.
    pub fn combat_statistics(&mut self) -> CombatStatistics {
        CombatStatistics::from_world(&mut self.world)
    }

    // ------------------------------------------------------------------
    // Introspection
    // ------------------------------------------------------------------

    /// Current view of one combatant, read straight from its components.
    pub fn combatant(&self, id: CombatantId) -> Option<CombatantView> {
        let world = &self.world;
        let entity = world.resource::<CombatantRegistry>().entity(id)?;
        let health = world.get::<Health>(entity)?;
        Some(CombatantView {
            id,
            entity,
            faction: *world.get::<Faction>(entity)?,
            position: world.get::<Position>(entity)?.0,
            velocity: world.get::<Velocity>(entity)?.0,
            yaw: world.get::<Heading>(entity)?.yaw,
            health: health.current,
            max_health: health.max,
            state: *world.get::<BehaviorState>(entity)?,
        })
    }

    /// Ids of every registered combatant, in id order.
    pub fn combatant_ids(&self) -> Vec<CombatantId> {
        let mut ids: Vec<_> = self.world.resource::<CombatantRegistry>().ids().collect();
        ids.sort();
        ids
    }

    pub fn squad(&self, id: SquadId) -> Option<Squad> {
        self.world.resource::<SquadRoster>().get(id).cloned()
    }

    pub fn squads(&self) -> Vec<Squad> {
        self.world.resource::<SquadRoster>().iter().cloned().collect()
    }

    /// Whether `id` is dead and waiting for its removal tick.
    pub fn is_pending_removal(&self, id: CombatantId) -> bool {
        self.world.resource::<PendingRemovals>().is_pending(id)
    }

    pub fn config(&self) -> &SimConfig {
        self.world.resource::<SimConfig>()
    }

    /// Get the current tick number.
    pub fn current_tick(&self) -> u64 {
        self.world.resource::<SimTick>().0
    }

    /// Get the elapsed simulation time.
    pub fn current_time(&self) -> f32 {
        self.world.resource::<SimTime>().0
    }

    /// Get a snapshot of the current simulation state.
    pub fn snapshot(&mut self) -> Snapshot {
        let tick = self.current_tick();
        let time = self.current_time();
        Snapshot::from_world(&mut self.world, tick, time)
    }

    /// Get the snapshot as a JSON string.
    pub fn snapshot_json(&mut self) -> Result<String> {
        Ok(self.snapshot().to_json()?)
    }

    /// Get the underlying ECS world (for advanced use).
    pub fn world(&self) -> &World {
        &self.world
    }

    /// Get mutable access to the underlying ECS world.
    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }
}
