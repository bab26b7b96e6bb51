//! Capability interfaces for systems outside the combat core.
//!
//! Terrain, capturable zones, the damage model, the player's health, visual
//! effects and scoring are owned by the host. Each is an optional trait
//! object registered on the [`Collaborators`] resource; when one is missing
//! the dependent behavior falls back or is skipped.

use crate::components::Faction;
use bevy_ecs::prelude::*;
use glam::Vec3;
use tracing::debug;

/// A capturable zone as seen by the spawn scheduler and squad leaders.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Zone {
    pub id: u32,
    pub position: Vec3,
    pub owner: Option<Faction>,
}

/// Terrain height sampling.
pub trait TerrainQuery: Send + Sync {
    fn height_at(&self, x: f32, z: f32) -> f32;
}

/// Capturable-zone bookkeeping.
pub trait ZoneProvider: Send + Sync {
    /// Nearest zone to `position` that `faction` does not own yet.
    fn nearest_capturable_zone(&self, position: Vec3, faction: Faction) -> Option<Zone>;
    fn zones_owned_by(&self, faction: Faction) -> Vec<Zone>;
}

/// Weapon damage as a function of distance and hit location.
pub trait DamageModel: Send + Sync {
    fn damage_for(&self, distance: f32, headshot: bool) -> f32;
}

impl<F> DamageModel for F
where
    F: Fn(f32, bool) -> f32 + Send + Sync,
{
    fn damage_for(&self, distance: f32, headshot: bool) -> f32 {
        self(distance, headshot)
    }
}

/// Receives damage dealt to the human player. Returns whether the player died.
pub trait PlayerHealthSink: Send + Sync {
    fn apply_damage_to_player(&self, amount: f32, from: Vec3, to: Vec3) -> bool;
}

/// Fire-and-forget visual effects.
pub trait EffectSink: Send + Sync {
    fn tracer(&self, start: Vec3, end: Vec3);
    fn muzzle_flash(&self, position: Vec3, direction: Vec3);
    fn impact(&self, point: Vec3, normal: Vec3);
}

/// Scoring and ticket bookkeeping.
pub trait ScoreSink: Send + Sync {
    fn notify_death(&self, faction: Faction);
    fn notify_kill(&self);
}

/// Registered collaborators. All optional.
#[derive(Resource, Default)]
pub struct Collaborators {
    pub terrain: Option<Box<dyn TerrainQuery>>,
    pub zones: Option<Box<dyn ZoneProvider>>,
    pub damage: Option<Box<dyn DamageModel>>,
    pub player_health: Option<Box<dyn PlayerHealthSink>>,
    pub effects: Option<Box<dyn EffectSink>>,
    pub score: Option<Box<dyn ScoreSink>>,
}

impl Collaborators {
    /// Terrain height, or flat ground at y = 0 without a terrain query.
    pub fn height_at(&self, x: f32, z: f32) -> f32 {
        self.terrain.as_ref().map(|t| t.height_at(x, z)).unwrap_or(0.0)
    }

    pub fn nearest_capturable_zone(&self, position: Vec3, faction: Faction) -> Option<Zone> {
        match &self.zones {
            Some(zones) => zones.nearest_capturable_zone(position, faction),
            None => {
                debug!("No zone provider registered; skipping objective lookup");
                None
            }
        }
    }

    pub fn zones_owned_by(&self, faction: Faction) -> Vec<Zone> {
        match &self.zones {
            Some(zones) => zones.zones_owned_by(faction),
            None => {
                debug!("No zone provider registered; skipping zone anchors");
                Vec::new()
            }
        }
    }

    /// External damage for a hit, if a damage model is registered.
    pub fn damage_for(&self, distance: f32, headshot: bool) -> Option<f32> {
        self.damage.as_ref().map(|d| d.damage_for(distance, headshot))
    }

    /// Forward damage to the player. Returns `None` when no sink is registered.
    pub fn apply_damage_to_player(&self, amount: f32, from: Vec3, to: Vec3) -> Option<bool> {
        match &self.player_health {
            Some(sink) => Some(sink.apply_damage_to_player(amount, from, to)),
            None => {
                debug!(amount, "No player health sink registered; dropping player damage");
                None
            }
        }
    }

    pub fn tracer(&self, start: Vec3, end: Vec3) {
        if let Some(effects) = &self.effects {
            effects.tracer(start, end);
        }
    }

    pub fn muzzle_flash(&self, position: Vec3, direction: Vec3) {
        if let Some(effects) = &self.effects {
            effects.muzzle_flash(position, direction);
        }
    }

    pub fn impact(&self, point: Vec3, normal: Vec3) {
        if let Some(effects) = &self.effects {
            effects.impact(point, normal);
        }
    }

    pub fn notify_death(&self, faction: Faction) {
        if let Some(score) = &self.score {
            score.notify_death(faction);
        }
    }

    pub fn notify_kill(&self) {
        if let Some(score) = &self.score {
            score.notify_kill();
        }
    }
}
