//! ECS Components for the Frontline combat simulation.
//!
//! Components are pure data containers attached to combatant entities.
//! All game logic lives in systems that query these components.

use bevy_ecs::prelude::*;
use glam::Vec3;
use serde::{Deserialize, Serialize};
use std::f32::consts::{PI, TAU};

// ============================================================================
// SPATIAL COMPONENTS
// ============================================================================

/// World-space position of a combatant's feet (y is up).
#[derive(Component, Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position(pub Vec3);

impl Position {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self(Vec3::new(x, y, z))
    }
}

/// World-space velocity in units per second.
#[derive(Component, Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Velocity(pub Vec3);

impl Velocity {
    pub fn stop(&mut self) {
        self.0 = Vec3::ZERO;
    }
}

/// Wraps an angle into `(-PI, PI]`.
#[inline]
pub fn wrap_angle(angle: f32) -> f32 {
    let wrapped = (angle + PI).rem_euclid(TAU) - PI;
    if wrapped <= -PI {
        wrapped + TAU
    } else {
        wrapped
    }
}

/// Yaw of a direction about +Y, with yaw 0 facing +Z.
#[inline]
pub fn yaw_of(direction: Vec3) -> f32 {
    direction.x.atan2(direction.z)
}

/// Logical facing plus a smoothed visual facing used only by presentation.
#[derive(Component, Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Heading {
    /// Logical yaw used by perception and aiming.
    pub yaw: f32,
    /// Smoothed yaw handed to the renderer.
    pub visual_yaw: f32,
    /// Angular velocity of the visual spring.
    pub visual_rate: f32,
}

impl Heading {
    pub fn new(yaw: f32) -> Self {
        let yaw = wrap_angle(yaw);
        Self {
            yaw,
            visual_yaw: yaw,
            visual_rate: 0.0,
        }
    }

    /// Horizontal unit vector the combatant is facing.
    pub fn forward(&self) -> Vec3 {
        Vec3::new(self.yaw.sin(), 0.0, self.yaw.cos())
    }

    /// Turns the logical heading toward `direction` (horizontal part only).
    pub fn face(&mut self, direction: Vec3) {
        let flat = Vec3::new(direction.x, 0.0, direction.z);
        if flat.length_squared() > 1e-6 {
            self.yaw = yaw_of(flat);
        }
    }

    /// Advances the critically damped spring pulling `visual_yaw` toward `yaw`.
    pub fn smooth(&mut self, stiffness: f32, dt: f32) {
        if dt <= 0.0 {
            return;
        }
        let x = stiffness * dt;
        let decay = 1.0 / (1.0 + x + 0.48 * x * x + 0.235 * x * x * x);
        let change = wrap_angle(self.visual_yaw - self.yaw);
        let temp = (self.visual_rate + stiffness * change) * dt;
        self.visual_rate = (self.visual_rate - stiffness * temp) * decay;
        self.visual_yaw = wrap_angle(self.yaw + (change + temp) * decay);
    }
}

/// Local wander state for combatants with no leader to follow.
#[derive(Component, Debug, Clone, Copy, Default)]
pub struct Wander {
    pub direction: Vec3,
    pub timer: f32,
}

// ============================================================================
// IDENTITY COMPONENTS
// ============================================================================

/// Registry-assigned identity of a combatant. Never reused within a registry.
#[derive(
    Component, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct CombatantId(pub u32);

/// One of the two opposing sides.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Faction {
    #[default]
    Blue,
    Red,
}

impl Faction {
    pub const ALL: [Faction; 2] = [Faction::Blue, Faction::Red];

    pub fn opponent(&self) -> Faction {
        match self {
            Faction::Blue => Faction::Red,
            Faction::Red => Faction::Blue,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Faction::Blue => "Blue",
            Faction::Red => "Red",
        }
    }
}

// ============================================================================
// COMBAT COMPONENTS
// ============================================================================

/// Health of a combatant. `current` stays within `[0, max]`.
#[derive(Component, Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Health {
    pub current: f32,
    pub max: f32,
}

impl Health {
    pub fn new(max: f32) -> Self {
        Self { current: max, max }
    }

    pub fn is_alive(&self) -> bool {
        self.current > 0.0
    }

    pub fn damage(&mut self, amount: f32) {
        self.current = (self.current - amount.max(0.0)).clamp(0.0, self.max);
    }
}

impl Default for Health {
    fn default() -> Self {
        Self::new(100.0)
    }
}

/// Behavior state of a combatant. `Dead` is terminal.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum BehaviorState {
    #[default]
    Patrolling,
    Alert,
    Engaging,
    Suppressing,
    Dead,
}

impl BehaviorState {
    pub fn is_dead(&self) -> bool {
        matches!(self, BehaviorState::Dead)
    }

    /// States in which the combatant holds position to react or fire.
    pub fn is_combat(&self) -> bool {
        matches!(
            self,
            BehaviorState::Alert | BehaviorState::Engaging | BehaviorState::Suppressing
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BehaviorState::Patrolling => "Patrolling",
            BehaviorState::Alert => "Alert",
            BehaviorState::Engaging => "Engaging",
            BehaviorState::Suppressing => "Suppressing",
            BehaviorState::Dead => "Dead",
        }
    }
}

/// Countdown timers owned by the behavior state machine.
#[derive(Component, Debug, Clone, Copy, Default)]
pub struct BehaviorTimers {
    /// Remaining reaction delay while `Alert`.
    pub reaction: f32,
    /// Remaining blind-fire time while `Suppressing`.
    pub suppress: f32,
}

/// Either another combatant (weak, looked up every tick) or the human player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TargetRef {
    Combatant(CombatantId),
    Player,
}

/// Perception output consumed by behavior and weapons.
#[derive(Component, Debug, Clone, Copy, Default)]
pub struct Awareness {
    pub target: Option<TargetRef>,
    /// Target passed the range and field-of-view check this update.
    pub visible: bool,
    /// Target still resolves and is not dead.
    pub target_alive: bool,
    pub target_position: Option<Vec3>,
    pub target_velocity: Vec3,
    /// Where blind fire is aimed while suppressing.
    pub last_known_position: Option<Vec3>,
}

impl Awareness {
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

/// Static description of a combatant's firearm.
#[derive(Component, Debug, Clone, Copy, Serialize, Deserialize)]
pub struct WeaponSpec {
    pub rounds_per_minute: f32,
    /// Intrinsic cone half-angle in radians.
    pub spread: f32,
    /// Extra half-angle added per shot, in radians.
    pub recoil: f32,
    /// Recoil recovered per second, in radians.
    pub recoil_recovery: f32,
    pub base_damage: f32,
    pub falloff_start: f32,
    pub falloff_end: f32,
    pub min_damage_fraction: f32,
    pub headshot_multiplier: f32,
    pub max_range: f32,
}

impl Default for WeaponSpec {
    fn default() -> Self {
        Self {
            rounds_per_minute: 600.0,
            spread: 0.01,
            recoil: 0.008,
            recoil_recovery: 0.08,
            base_damage: 25.0,
            falloff_start: 30.0,
            falloff_end: 120.0,
            min_damage_fraction: 0.4,
            headshot_multiplier: 2.5,
            max_range: 150.0,
        }
    }
}

impl WeaponSpec {
    /// Seconds between rounds.
    pub fn fire_interval(&self) -> f32 {
        if self.rounds_per_minute <= 0.0 {
            f32::INFINITY
        } else {
            60.0 / self.rounds_per_minute
        }
    }

    /// Damage at `distance`, used when no external damage model is registered.
    pub fn damage_at(&self, distance: f32, headshot: bool) -> f32 {
        let fraction = if distance <= self.falloff_start {
            1.0
        } else if distance >= self.falloff_end || self.falloff_end <= self.falloff_start {
            self.min_damage_fraction
        } else {
            let t = (distance - self.falloff_start) / (self.falloff_end - self.falloff_start);
            1.0 + (self.min_damage_fraction - 1.0) * t
        };
        let multiplier = if headshot {
            self.headshot_multiplier
        } else {
            1.0
        };
        self.base_damage * fraction * multiplier
    }
}

/// Per-combatant skill parameters.
#[derive(Component, Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SkillProfile {
    /// Mean seconds between sighting a target and opening fire.
    pub reaction_delay: f32,
    /// Aim jitter half-angle in radians.
    pub aim_jitter: f32,
    /// Shots per burst.
    pub burst_length: u32,
    /// Seconds of mandatory pause after a burst.
    pub burst_pause: f32,
    /// Fraction of the ideal lead applied to moving targets.
    pub leading_accuracy: f32,
    pub visual_range: f32,
    /// Full field-of-view angle in radians.
    pub field_of_view: f32,
}

impl SkillProfile {
    pub fn regular() -> Self {
        Self {
            reaction_delay: 0.5,
            aim_jitter: 0.03,
            burst_length: 4,
            burst_pause: 0.8,
            leading_accuracy: 0.6,
            visual_range: 120.0,
            field_of_view: 120f32.to_radians(),
        }
    }

    pub fn veteran() -> Self {
        Self {
            reaction_delay: 0.3,
            aim_jitter: 0.015,
            burst_length: 5,
            burst_pause: 0.6,
            leading_accuracy: 0.85,
            visual_range: 140.0,
            field_of_view: 140f32.to_radians(),
        }
    }

    pub fn recruit() -> Self {
        Self {
            reaction_delay: 0.8,
            aim_jitter: 0.06,
            burst_length: 3,
            burst_pause: 1.2,
            leading_accuracy: 0.3,
            visual_range: 100.0,
            field_of_view: 100f32.to_radians(),
        }
    }
}

impl Default for SkillProfile {
    fn default() -> Self {
        Self::regular()
    }
}

/// Mutable fire-cadence bookkeeping.
#[derive(Component, Debug, Clone, Copy, Default)]
pub struct FireControl {
    /// Seconds until the weapon can cycle again.
    pub cooldown: f32,
    /// Shots fired since the last burst-pause reset.
    pub burst_count: u32,
    /// Seconds of burst pause remaining.
    pub burst_pause: f32,
    /// Accumulated recoil half-angle in radians.
    pub recoil: f32,
}

impl FireControl {
    pub fn tick(&mut self, dt: f32, weapon: &WeaponSpec) {
        self.cooldown = (self.cooldown - dt).max(0.0);
        self.burst_pause = (self.burst_pause - dt).max(0.0);
        self.recoil = (self.recoil - weapon.recoil_recovery * dt).max(0.0);
    }

    pub fn can_fire(&self) -> bool {
        self.cooldown <= 0.0 && self.burst_pause <= 0.0
    }
}

// ============================================================================
// SQUAD COMPONENTS
// ============================================================================

/// Unique identifier for a squad.
#[derive(
    Component, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct SquadId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SquadRole {
    Leader,
    Follower,
}

/// Membership of a living combatant in a squad. Removed on death.
#[derive(Component, Debug, Clone, Copy)]
pub struct SquadMember {
    pub squad: SquadId,
    pub role: SquadRole,
    /// Offset from the squad center assigned at creation.
    pub formation_offset: Vec3,
}

// ============================================================================
// LOD COMPONENTS
// ============================================================================

/// Update-frequency tier assigned by distance to the viewpoint.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum LodTier {
    /// Full logic every tick.
    #[default]
    Near,
    /// Full logic at a throttled refresh period.
    Medium,
    /// Movement and orientation only, at a longer period.
    Far,
    /// Not updated.
    Culled,
}

impl LodTier {
    pub fn runs_combat(&self) -> bool {
        matches!(self, LodTier::Near | LodTier::Medium)
    }

    pub fn runs_movement(&self) -> bool {
        !matches!(self, LodTier::Culled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LodTier::Near => "Near",
            LodTier::Medium => "Medium",
            LodTier::Far => "Far",
            LodTier::Culled => "Culled",
        }
    }
}

/// LOD scheduling state for one combatant.
#[derive(Component, Debug, Clone, Copy, Default)]
pub struct LodClock {
    pub tier: LodTier,
    /// Simulation time of the last logic update.
    pub last_update: f32,
    /// Whether this combatant is due for a logic update this tick.
    pub due: bool,
    /// Seconds covered by this tick's update.
    pub elapsed: f32,
}

impl LodClock {
    pub fn new(now: f32) -> Self {
        Self {
            last_update: now,
            ..Default::default()
        }
    }

    #[inline]
    pub fn runs_combat(&self) -> bool {
        self.due && self.tier.runs_combat()
    }

    #[inline]
    pub fn runs_movement(&self) -> bool {
        self.due && self.tier.runs_movement()
    }
}

// ============================================================================
// BUNDLE HELPERS
// ============================================================================

/// Bundle for spawning a complete combatant entity.
#[derive(Bundle, Default)]
pub struct CombatantBundle {
    pub id: CombatantId,
    pub faction: Faction,
    pub position: Position,
    pub velocity: Velocity,
    pub heading: Heading,
    pub health: Health,
    pub state: BehaviorState,
    pub timers: BehaviorTimers,
    pub awareness: Awareness,
    pub weapon: WeaponSpec,
    pub skill: SkillProfile,
    pub fire_control: FireControl,
    pub lod: LodClock,
    pub wander: Wander,
}

impl Default for CombatantId {
    fn default() -> Self {
        Self(0)
    }
}
