//! Frontline - Combat Simulation Core
//!
//! A fixed-timestep ECS simulation of squad-based infantry combat between two
//! factions: perception and behavior state machines, burst fire with aim
//! error, multi-sphere hit detection, squad formations, spawn scheduling and
//! distance-based level of detail.
//! Uses `bevy_ecs` for the entity-component-system architecture.

pub mod api;
pub mod components;
pub mod config;
pub mod error;
pub mod hit;
pub mod hooks;
pub mod population;
pub mod registry;
pub mod rng;
pub mod squad;
pub mod systems;
pub mod world;

pub use api::{IncomingHit, PlayerShotResult, SimWorld};
pub use components::*;
pub use config::{CombatConfig, LodConfig, SimConfig, SpawnConfig, SquadConfig};
pub use error::{Result, SimError};
pub use hit::{Ray, RayHit, ZoneLayout};
pub use hooks::{
    Collaborators, DamageModel, EffectSink, PlayerHealthSink, ScoreSink, TerrainQuery, Zone,
    ZoneProvider,
};
pub use population::{CombatantView, PlayerState, Viewpoint};
pub use registry::CombatantSpawn;
pub use squad::{FormationKind, Squad};
pub use systems::*;
pub use world::{CombatStatistics, Snapshot};
