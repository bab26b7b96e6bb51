//! Perception: nearest-opponent search and sight checks.
//!
//! Sight is range plus field of view only. Nothing occludes.

use crate::components::*;
use crate::config::SimConfig;
use crate::population::{resolve_target, Population, PlayerState};
use bevy_ecs::prelude::*;
use glam::Vec3;

/// Whether an observer at `position` facing `heading` can see `target`.
///
/// True iff the target is within `skill.visual_range` and the horizontal
/// angle between the facing and the direction to the target is at most half
/// the field of view.
pub fn can_see(position: Vec3, heading: &Heading, skill: &SkillProfile, target: Vec3) -> bool {
    let to_target = target - position;
    if to_target.length_squared() > skill.visual_range * skill.visual_range {
        return false;
    }
    let flat = Vec3::new(to_target.x, 0.0, to_target.z);
    let Some(direction) = flat.try_normalize() else {
        // Standing on top of it.
        return true;
    };
    let cos = heading.forward().dot(direction).clamp(-1.0, 1.0);
    cos.acos() <= skill.field_of_view * 0.5 + 1e-5
}

/// Nearest living opponent within visual range, scanning in id order.
///
/// When the observer's faction is the aggressor and the player is alive,
/// hostile and within visual range, the player is returned regardless of
/// how close any AI opponent is.
pub fn find_nearest_opponent(
    position: Vec3,
    faction: Faction,
    skill: &SkillProfile,
    population: &Population,
    player: &PlayerState,
    aggressor: Option<Faction>,
) -> Option<TargetRef> {
    let range_sq = skill.visual_range * skill.visual_range;

    if aggressor == Some(faction)
        && player.is_alive()
        && player.faction != faction
        && player.position.distance_squared(position) <= range_sq
    {
        return Some(TargetRef::Player);
    }

    let mut best: Option<(CombatantId, f32)> = None;
    for view in population.living(faction.opponent()) {
        let dist_sq = view.position.distance_squared(position);
        if dist_sq > range_sq {
            continue;
        }
        if best.map_or(true, |(_, d)| dist_sq < d) {
            best = Some((view.id, dist_sq));
        }
    }
    best.map(|(id, _)| TargetRef::Combatant(id))
}

/// System that refreshes each due combatant's [`Awareness`].
///
/// Patrolling combatants search for a new target. Alert and engaging
/// combatants keep their target and only revalidate it. Suppressing
/// combatants fire blind and do not look.
///
/// ## Data Access
/// - Reads: SimConfig, Population, PlayerState, Position, Heading, SkillProfile, LodClock
/// - Writes: Awareness
pub fn perception_system(
    config: Res<SimConfig>,
    population: Res<Population>,
    player: Res<PlayerState>,
    mut query: Query<(
        &Faction,
        &Position,
        &Heading,
        &SkillProfile,
        &BehaviorState,
        &LodClock,
        &mut Awareness,
    )>,
) {
    if !config.combat.enabled {
        return;
    }

    for (faction, pos, heading, skill, state, clock, mut awareness) in query.iter_mut() {
        if !clock.runs_combat() {
            continue;
        }

        match state {
            BehaviorState::Patrolling => {
                awareness.target = find_nearest_opponent(
                    pos.0,
                    *faction,
                    skill,
                    &population,
                    &player,
                    config.combat.aggressor,
                );
            }
            BehaviorState::Alert | BehaviorState::Engaging => {}
            BehaviorState::Suppressing | BehaviorState::Dead => continue,
        }

        let resolved = awareness
            .target
            .and_then(|target| resolve_target(target, &population, &player));

        match resolved {
            Some(view) => {
                awareness.target_alive = view.alive;
                awareness.target_position = Some(view.position);
                awareness.target_velocity = view.velocity;
                awareness.visible = view.alive && can_see(pos.0, heading, skill, view.position);
                if awareness.visible {
                    awareness.last_known_position = Some(view.position);
                }
            }
            None => {
                awareness.target_alive = false;
                awareness.target_position = None;
                awareness.target_velocity = Vec3::ZERO;
                awareness.visible = false;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::population::CombatantView;
    use std::f32::consts::PI;

    fn view(id: u32, faction: Faction, x: f32, z: f32) -> CombatantView {
        CombatantView {
            id: CombatantId(id),
            entity: Entity::from_raw(id),
            faction,
            position: Vec3::new(x, 0.0, z),
            velocity: Vec3::ZERO,
            yaw: 0.0,
            health: 100.0,
            max_health: 100.0,
            state: BehaviorState::Patrolling,
        }
    }

    #[test]
    fn test_can_see_range_and_fov() {
        let skill = SkillProfile::regular();
        let heading = Heading::new(0.0); // facing +Z

        assert!(can_see(Vec3::ZERO, &heading, &skill, Vec3::new(0.0, 0.0, 50.0)));
        assert!(!can_see(Vec3::ZERO, &heading, &skill, Vec3::new(0.0, 0.0, 121.0)));
        assert!(!can_see(Vec3::ZERO, &heading, &skill, Vec3::new(0.0, 0.0, -10.0)));
        // 60 degrees off axis is exactly the half-angle of a 120 degree FOV.
        let edge = Vec3::new((PI / 3.0).sin(), 0.0, (PI / 3.0).cos()) * 20.0;
        assert!(can_see(Vec3::ZERO, &heading, &skill, edge));
        let outside = Vec3::new((PI / 2.5).sin(), 0.0, (PI / 2.5).cos()) * 20.0;
        assert!(!can_see(Vec3::ZERO, &heading, &skill, outside));
    }

    #[test]
    fn test_nearest_opponent_ignores_allies_and_range() {
        let mut population = Population::default();
        population.rebuild([
            view(0, Faction::Blue, 0.0, 2.0),
            view(1, Faction::Red, 0.0, 40.0),
            view(2, Faction::Red, 0.0, 25.0),
            view(3, Faction::Red, 0.0, 300.0),
        ]);
        let skill = SkillProfile::regular();
        let player = PlayerState::default();

        let found =
            find_nearest_opponent(Vec3::ZERO, Faction::Blue, &skill, &population, &player, None);
        assert_eq!(found, Some(TargetRef::Combatant(CombatantId(2))));
    }

    #[test]
    fn test_ties_go_to_first_scanned() {
        let mut population = Population::default();
        population.rebuild([view(4, Faction::Red, 10.0, 0.0), view(7, Faction::Red, -10.0, 0.0)]);
        let found = find_nearest_opponent(
            Vec3::ZERO,
            Faction::Blue,
            &SkillProfile::regular(),
            &population,
            &PlayerState::default(),
            None,
        );
        assert_eq!(found, Some(TargetRef::Combatant(CombatantId(4))));
    }

    #[test]
    fn test_aggressor_prefers_player() {
        let mut population = Population::default();
        population.rebuild([view(1, Faction::Blue, 0.0, 5.0)]);
        let player = PlayerState {
            present: true,
            position: Vec3::new(0.0, 0.0, 80.0),
            ..Default::default()
        };
        let skill = SkillProfile::regular();
        let search = |player: &PlayerState, aggressor: Option<Faction>| {
            find_nearest_opponent(Vec3::ZERO, Faction::Red, &skill, &population, player, aggressor)
        };

        assert_eq!(search(&player, Some(Faction::Red)), Some(TargetRef::Player));

        // Not the aggressor: plain nearest search, player ignored.
        let red = search(&player, None);
        assert_eq!(red, Some(TargetRef::Combatant(CombatantId(1))));

        // Player out of range falls back to AI targets.
        let far_player = PlayerState {
            position: Vec3::new(0.0, 0.0, 500.0),
            ..player
        };
        let red = search(&far_player, Some(Faction::Red));
        assert_eq!(red, Some(TargetRef::Combatant(CombatantId(1))));
    }
}
