//! ECS Systems for the Frontline simulation.
//!
//! Systems contain the game logic that operates on components.
//!
//! ## Tick Pipeline
//!
//! One fixed update runs every system below exactly once, strictly in this
//! order, so no combatant ever observes another mid-mutation:
//!
//! **Classify**
//! - `population_snapshot_system` - Snapshots the population for this tick
//! - `lod_assignment_system` - Assigns LOD tiers and marks combatants due
//!
//! **Behave**
//! - `perception_system` - Finds and revalidates targets
//! - `behavior_state_system` - Advances the state machine
//!
//! **Move**
//! - `squad_steering_system` - Leader objectives, follower cohesion, wander
//! - `movement_system` - Integrates velocity, follows terrain, smooths facing
//! - `population_refresh_system` - Re-snapshots post-movement positions
//!
//! **Fire and resolve**
//! - `weapon_system` - Burst cadence and aim, queues shots
//! - `hit_resolution_system` - Ray tests shots, gathers damage
//! - `damage_apply_system` - Applies damage and kills (exclusive)
//!
//! **Bookkeeping** (exclusive)
//! - `pending_removal_system` - Purges combatants whose death delay expired
//! - `reinforcement_system` - Releases queued reinforcements
//! - `rebalance_system` - Despawns distant combatants and tops up factions

pub mod behavior;
pub mod combat;
pub mod lod;
pub mod movement;
pub mod perception;
pub mod spawning;
pub mod squads;
pub mod weapons;

pub use behavior::*;
pub use combat::*;
pub use lod::*;
pub use movement::*;
pub use perception::*;
pub use spawning::*;
pub use squads::*;
pub use weapons::*;
