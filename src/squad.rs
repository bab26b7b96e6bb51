//! Squads: membership bookkeeping and formation layout.

use crate::components::*;
use crate::config::SquadConfig;
use bevy_ecs::prelude::*;
use glam::Vec3;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Formation layout used when a squad is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FormationKind {
    /// Leader in front, followers in rows of three behind.
    #[default]
    Wedge,
    /// Followers in single file behind the leader.
    Column,
}

impl FormationKind {
    fn row_width(&self) -> usize {
        match self {
            FormationKind::Wedge => 3,
            FormationKind::Column => 1,
        }
    }
}

/// A squad record. `leader`, when present, is always in `members`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Squad {
    pub id: SquadId,
    pub faction: Faction,
    pub members: Vec<CombatantId>,
    pub leader: Option<CombatantId>,
    pub formation: FormationKind,
    pub objective: Option<Vec3>,
}

impl Squad {
    pub fn new(id: SquadId, faction: Faction, formation: FormationKind) -> Self {
        Self {
            id,
            faction,
            members: Vec::new(),
            leader: None,
            formation,
            objective: None,
        }
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn contains(&self, id: CombatantId) -> bool {
        self.members.contains(&id)
    }
}

/// All live squads, keyed by id.
#[derive(Resource, Debug, Default)]
pub struct SquadRoster {
    next_id: u32,
    squads: BTreeMap<SquadId, Squad>,
}

impl SquadRoster {
    pub fn allocate_id(&mut self) -> SquadId {
        let id = SquadId(self.next_id);
        self.next_id += 1;
        id
    }

    pub fn insert(&mut self, squad: Squad) {
        self.squads.insert(squad.id, squad);
    }

    pub fn get(&self, id: SquadId) -> Option<&Squad> {
        self.squads.get(&id)
    }

    pub fn get_mut(&mut self, id: SquadId) -> Option<&mut Squad> {
        self.squads.get_mut(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Squad> {
        self.squads.values()
    }

    pub fn len(&self) -> usize {
        self.squads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.squads.is_empty()
    }

    /// Drop `member` from `squad`. A departing leader is not replaced, and a
    /// squad left with no members is removed. Returns whether anything changed.
    pub fn remove_member(&mut self, squad: SquadId, member: CombatantId) -> bool {
        let Some(record) = self.squads.get_mut(&squad) else {
            return false;
        };
        let before = record.members.len();
        record.members.retain(|&m| m != member);
        if record.leader == Some(member) {
            record.leader = None;
            debug!(squad = squad.0, leader = member.0, "Squad lost its leader");
        }
        let changed = record.members.len() != before;
        if record.members.is_empty() {
            self.squads.remove(&squad);
            debug!(squad = squad.0, "Squad disbanded");
        }
        changed
    }
}

/// Formation offsets relative to the squad center, leader first.
///
/// Index 0 is always the zero offset. Followers fill rows of
/// `FormationKind::row_width` behind the leader, each jittered by up to
/// `config.jitter` on both horizontal axes and clamped to
/// `config.formation_radius`.
pub fn formation_offsets<R: Rng + ?Sized>(
    kind: FormationKind,
    size: usize,
    config: &SquadConfig,
    rng: &mut R,
) -> Vec<Vec3> {
    let width = kind.row_width();
    let mut offsets = Vec::with_capacity(size);
    if size == 0 {
        return offsets;
    }
    offsets.push(Vec3::ZERO);

    for follower in 0..size - 1 {
        let row = (follower / width) as f32 + 1.0;
        let col = (follower % width) as f32 - (width as f32 - 1.0) / 2.0;
        let mut offset = Vec3::new(
            col * config.lateral_spacing,
            0.0,
            -row * config.longitudinal_spacing,
        );
        if config.jitter > 0.0 {
            offset.x += rng.gen_range(-config.jitter..=config.jitter);
            offset.z += rng.gen_range(-config.jitter..=config.jitter);
        }
        offsets.push(offset.clamp_length_max(config.formation_radius));
    }
    offsets
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_wedge_layout() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let config = SquadConfig::default();
        let offsets = formation_offsets(FormationKind::Wedge, 7, &config, &mut rng);

        assert_eq!(offsets.len(), 7);
        assert_eq!(offsets[0], Vec3::ZERO);
        for offset in &offsets[1..] {
            assert!(offset.length() <= config.formation_radius + 1e-4);
            assert!(offset.z < 0.0);
            assert_eq!(offset.y, 0.0);
        }
        // Fourth follower starts the second row.
        assert!(offsets[4].z < offsets[1].z - config.longitudinal_spacing / 2.0);
    }

    #[test]
    fn test_column_layout_is_single_file() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let config = SquadConfig {
            jitter: 0.0,
            ..Default::default()
        };
        let offsets = formation_offsets(FormationKind::Column, 3, &config, &mut rng);
        assert_eq!(offsets[1], Vec3::new(0.0, 0.0, -3.0));
        assert_eq!(offsets[2], Vec3::new(0.0, 0.0, -6.0));
    }

    #[test]
    fn test_radius_clamp() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let config = SquadConfig {
            formation_radius: 4.0,
            ..Default::default()
        };
        let offsets = formation_offsets(FormationKind::Wedge, 12, &config, &mut rng);
        assert!(offsets.iter().all(|o| o.length() <= 4.0 + 1e-4));
    }

    #[test]
    fn test_remove_member_clears_leader_and_disbands() {
        let mut roster = SquadRoster::default();
        let id = roster.allocate_id();
        let mut squad = Squad::new(id, Faction::Blue, FormationKind::Wedge);
        squad.members = vec![CombatantId(1), CombatantId(2)];
        squad.leader = Some(CombatantId(1));
        roster.insert(squad);

        assert!(roster.remove_member(id, CombatantId(1)));
        let squad = roster.get(id).unwrap();
        assert_eq!(squad.leader, None);
        assert_eq!(squad.members, vec![CombatantId(2)]);

        assert!(!roster.remove_member(id, CombatantId(9)));
        assert!(roster.remove_member(id, CombatantId(2)));
        assert!(roster.get(id).is_none());
        assert!(!roster.remove_member(id, CombatantId(2)));
    }
}
