//! Behavior state machine.
//!
//! States are a plain enum and every legal move is listed in [`transition`].
//! The system derives at most one [`BehaviorEvent`] per combatant per update
//! from its perception output and timers, looks the move up in the table and
//! applies the entry side effects of the new state.

use crate::components::*;
use crate::config::SimConfig;
use crate::rng::SimRng;
use bevy_ecs::prelude::*;
use rand::Rng;
use tracing::debug;

/// Inputs that can move a combatant between states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BehaviorEvent {
    /// An opponent is in range and in the field of view.
    TargetSighted,
    /// The reaction delay ran out with the target still visible.
    ReactionElapsed,
    /// The target left range or the field of view.
    TargetLost,
    /// The engaged target is dead or gone.
    TargetKilled,
    /// The blind-fire window closed.
    SuppressExpired,
    /// Health reached zero.
    Killed,
}

/// The transition table. `None` means the event does not apply in `state`.
pub fn transition(state: BehaviorState, event: BehaviorEvent) -> Option<BehaviorState> {
    use BehaviorEvent::*;
    use BehaviorState::*;

    match (state, event) {
        (Dead, _) => None,
        (_, Killed) => Some(Dead),
        (Patrolling, TargetSighted) => Some(Alert),
        (Alert, ReactionElapsed) => Some(Engaging),
        (Alert, TargetLost) => Some(Patrolling),
        (Engaging, TargetLost) => Some(Suppressing),
        (Engaging, TargetKilled) => Some(Patrolling),
        (Suppressing, SuppressExpired) => Some(Patrolling),
        _ => None,
    }
}

/// The event implied by a combatant's current perception and timers.
pub fn next_event(
    state: BehaviorState,
    awareness: &Awareness,
    timers: &BehaviorTimers,
) -> Option<BehaviorEvent> {
    match state {
        BehaviorState::Patrolling if awareness.target.is_some() && awareness.visible => {
            Some(BehaviorEvent::TargetSighted)
        }
        BehaviorState::Alert if !awareness.visible => Some(BehaviorEvent::TargetLost),
        BehaviorState::Alert if timers.reaction <= 0.0 => Some(BehaviorEvent::ReactionElapsed),
        BehaviorState::Engaging if !awareness.target_alive => Some(BehaviorEvent::TargetKilled),
        BehaviorState::Engaging if !awareness.visible => Some(BehaviorEvent::TargetLost),
        BehaviorState::Suppressing if timers.suppress <= 0.0 => {
            Some(BehaviorEvent::SuppressExpired)
        }
        _ => None,
    }
}

/// System that advances the state machine for every due combatant.
///
/// ## Data Access
/// - Reads: SimConfig, SkillProfile, LodClock
/// - Writes: BehaviorState, BehaviorTimers, Awareness, Heading, SimRng
pub fn behavior_state_system(
    config: Res<SimConfig>,
    mut rng: ResMut<SimRng>,
    mut query: Query<(
        &CombatantId,
        &SkillProfile,
        &LodClock,
        &mut BehaviorState,
        &mut BehaviorTimers,
        &mut Awareness,
        &mut Heading,
        &Position,
    )>,
) {
    if !config.combat.enabled {
        return;
    }

    for (id, skill, clock, mut state, mut timers, mut awareness, mut heading, pos) in
        query.iter_mut()
    {
        if !clock.runs_combat() || state.is_dead() {
            continue;
        }

        timers.reaction = (timers.reaction - clock.elapsed).max(0.0);
        timers.suppress = (timers.suppress - clock.elapsed).max(0.0);

        if let Some(next) = next_event(*state, &awareness, &timers)
            .and_then(|event| transition(*state, event))
        {
            debug!(
                combatant = id.0,
                from = state.as_str(),
                to = next.as_str(),
                "State transition"
            );
            match next {
                BehaviorState::Alert => {
                    let scale = rng.0.gen_range(0.75f32..=1.25);
                    timers.reaction = skill.reaction_delay * scale;
                }
                BehaviorState::Suppressing => {
                    timers.suppress = config.combat.suppress_duration;
                    awareness.target = None;
                    awareness.visible = false;
                    awareness.target_position = None;
                }
                BehaviorState::Patrolling => {
                    awareness.clear();
                    timers.reaction = 0.0;
                    timers.suppress = 0.0;
                }
                BehaviorState::Engaging | BehaviorState::Dead => {}
            }
            *state = next;
        }

        let focus = match *state {
            BehaviorState::Alert | BehaviorState::Engaging => awareness.target_position,
            BehaviorState::Suppressing => awareness.last_known_position,
            _ => None,
        };
        if let Some(point) = focus {
            heading.face(point - pos.0);
        }
    }
}
