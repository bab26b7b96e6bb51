//! Simulation configuration.
//!
//! All tuning constants live in [`SimConfig`], which is inserted into the ECS
//! world as a resource. Every section has defaults, so a TOML file only needs
//! to name the values it overrides.

use crate::components::Faction;
use crate::squad::FormationKind;
use crate::error::{Result, SimError};
use bevy_ecs::prelude::*;
use glam::Vec3;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level configuration for the simulation.
#[derive(Resource, Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Fixed timestep in seconds (e.g., 1/30 = 0.0333 for 30 Hz).
    pub fixed_timestep: f32,
    /// Stiffness of the visual rotation spring (1/s).
    pub turn_stiffness: f32,
    pub lod: LodConfig,
    pub combat: CombatConfig,
    pub spawn: SpawnConfig,
    pub squad: SquadConfig,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            fixed_timestep: 1.0 / 30.0,
            turn_stiffness: 10.0,
            lod: LodConfig::default(),
            combat: CombatConfig::default(),
            spawn: SpawnConfig::default(),
            squad: SquadConfig::default(),
        }
    }
}

/// Distance thresholds and refresh periods for LOD tiers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LodConfig {
    /// Within this distance: full logic every tick.
    pub near_distance: f32,
    /// Within this distance: full logic every `medium_period` seconds.
    pub medium_distance: f32,
    /// Within this distance: movement only every `far_period` seconds.
    pub far_distance: f32,
    pub medium_period: f32,
    pub far_period: f32,
    /// Upper bound on the time step handed to a throttled update.
    pub max_step: f32,
}

impl Default for LodConfig {
    fn default() -> Self {
        Self {
            near_distance: 60.0,
            medium_distance: 150.0,
            far_distance: 300.0,
            medium_period: 0.1,
            far_period: 0.25,
            max_step: 0.5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CombatConfig {
    /// Global switch; when off, no transitions or weapon fire happen.
    pub enabled: bool,
    pub friendly_fire: bool,
    /// Rays are tested out to this distance.
    pub max_engagement_range: f32,
    /// Assumed bullet speed used when leading moving targets.
    pub projectile_speed: f32,
    /// Seconds of blind fire after losing sight of a target.
    pub suppress_duration: f32,
    /// Suppressive spread relative to aimed spread (must be > 1).
    pub suppress_spread_multiplier: f32,
    /// Minimum extra half-angle added to suppressive spread, in radians.
    pub suppress_min_spread: f32,
    /// Ticks a dead combatant stays in the registry before purge.
    pub death_delay_ticks: u64,
    /// Faction that treats the human player as a priority target.
    pub aggressor: Option<Faction>,
    /// Height above feet where shots leave the barrel.
    pub muzzle_height: f32,
    /// Height above feet that shooters aim at.
    pub aim_height: f32,
}

impl Default for CombatConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            friendly_fire: false,
            max_engagement_range: 150.0,
            projectile_speed: 400.0,
            suppress_duration: 3.0,
            suppress_spread_multiplier: 3.0,
            suppress_min_spread: 0.03,
            death_delay_ticks: 90,
            aggressor: Some(Faction::Red),
            muzzle_height: 1.5,
            aim_height: 1.2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpawnConfig {
    pub blue_base: Vec3,
    pub red_base: Vec3,
    pub squad_size: usize,
    /// Seconds between reinforcement releases.
    pub reinforcement_interval: f32,
    /// Seconds between rebalancing passes.
    pub rebalance_interval: f32,
    /// Living combatants beyond this distance from the viewpoint are despawned.
    pub despawn_distance: f32,
    /// A faction below this headcount gets a new squad on rebalance.
    pub min_per_faction: usize,
    /// Hard cap on registry size.
    pub max_population: usize,
    pub zone_inner_radius: f32,
    pub zone_outer_radius: f32,
    /// Distance ahead of (Red) or behind (Blue) the viewpoint for fallback spawns.
    pub fallback_distance: f32,
    /// Maximum lateral offset for fallback spawns.
    pub fallback_lateral: f32,
    /// Candidates closer than this to a living combatant are rejected.
    pub min_separation: f32,
    pub nudge_distance: f32,
    pub max_placement_attempts: u32,
}

impl Default for SpawnConfig {
    fn default() -> Self {
        Self {
            blue_base: Vec3::new(0.0, 0.0, -120.0),
            red_base: Vec3::new(0.0, 0.0, 120.0),
            squad_size: 4,
            reinforcement_interval: 5.0,
            rebalance_interval: 3.0,
            despawn_distance: 400.0,
            min_per_faction: 4,
            max_population: 60,
            zone_inner_radius: 5.0,
            zone_outer_radius: 15.0,
            fallback_distance: 120.0,
            fallback_lateral: 40.0,
            min_separation: 6.0,
            nudge_distance: 8.0,
            max_placement_attempts: 6,
        }
    }
}

impl SpawnConfig {
    pub fn base_for(&self, faction: Faction) -> Vec3 {
        match faction {
            Faction::Blue => self.blue_base,
            Faction::Red => self.red_base,
        }
    }

    /// Fallback objective for a squad leader: the opposing base.
    pub fn enemy_base_for(&self, faction: Faction) -> Vec3 {
        self.base_for(faction.opponent())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SquadConfig {
    /// Layout given to newly spawned squads.
    pub formation: FormationKind,
    pub lateral_spacing: f32,
    pub longitudinal_spacing: f32,
    pub jitter: f32,
    /// Followers are never placed farther than this from the squad center.
    pub formation_radius: f32,
    /// Followers farther than this from their leader close the gap.
    pub follow_distance: f32,
    pub move_speed: f32,
    pub wander_speed: f32,
    pub wander_interval: f32,
    /// Leaders stop once this close to their objective.
    pub objective_radius: f32,
}

impl Default for SquadConfig {
    fn default() -> Self {
        Self {
            formation: FormationKind::Wedge,
            lateral_spacing: 3.0,
            longitudinal_spacing: 3.0,
            jitter: 0.5,
            formation_radius: 10.0,
            follow_distance: 6.0,
            move_speed: 3.0,
            wander_speed: 1.0,
            wander_interval: 3.0,
            objective_radius: 5.0,
        }
    }
}

impl SimConfig {
    /// Parse a TOML document and validate it.
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: SimConfig = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let source = std::fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }

    /// Check cross-field constraints the type system can't express.
    pub fn validate(&self) -> Result<()> {
        if !(self.fixed_timestep > 0.0) {
            return Err(SimError::InvalidConfig(
                "fixed_timestep must be positive".to_string(),
            ));
        }
        let lod = &self.lod;
        if !(0.0 <= lod.near_distance
            && lod.near_distance <= lod.medium_distance
            && lod.medium_distance <= lod.far_distance)
        {
            return Err(SimError::InvalidConfig(format!(
                "lod distances must be ascending: near={} medium={} far={}",
                lod.near_distance, lod.medium_distance, lod.far_distance
            )));
        }
        if !(0.0 <= lod.medium_period && lod.medium_period <= lod.far_period) {
            return Err(SimError::InvalidConfig(format!(
                "lod periods must be ascending: medium={} far={}",
                lod.medium_period, lod.far_period
            )));
        }
        if self.combat.suppress_spread_multiplier <= 1.0 {
            return Err(SimError::InvalidConfig(
                "suppress_spread_multiplier must exceed 1".to_string(),
            ));
        }
        let spawn = &self.spawn;
        if spawn.zone_inner_radius > spawn.zone_outer_radius {
            return Err(SimError::InvalidConfig(format!(
                "zone annulus is inverted: inner={} outer={}",
                spawn.zone_inner_radius, spawn.zone_outer_radius
            )));
        }
        if spawn.fallback_lateral < 0.0 || self.squad.jitter < 0.0 {
            return Err(SimError::InvalidConfig(format!(
                "negative sampling extent: fallback_lateral={} jitter={}",
                spawn.fallback_lateral, self.squad.jitter
            )));
        }
        if spawn.despawn_distance < self.combat.max_engagement_range {
            return Err(SimError::InvalidConfig(format!(
                "despawn_distance {} is inside max_engagement_range {}",
                spawn.despawn_distance, self.combat.max_engagement_range
            )));
        }
        Ok(())
    }
}
