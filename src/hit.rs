//! Ray versus multi-sphere hit detection.
//!
//! Every combatant is approximated by a few spheres (head, torso, legs)
//! whose layout follows its behavior state: upright while patrolling, a
//! ready crouch when alert, and a compact firing stance while engaging or
//! suppressing. A ray reports the first zone it touches along its length.

use crate::components::BehaviorState;
use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

/// A sphere relative to a combatant's feet, in its local (unrotated) frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HitZone {
    pub offset: Vec3,
    pub radius: f32,
    pub head: bool,
}

const fn zone(x: f32, y: f32, z: f32, radius: f32, head: bool) -> HitZone {
    HitZone {
        offset: Vec3::new(x, y, z),
        radius,
        head,
    }
}

const UPRIGHT: [HitZone; 3] = [
    zone(0.0, 1.7, 0.0, 0.25, true),
    zone(0.0, 1.25, 0.0, 0.4, false),
    zone(0.0, 0.6, 0.0, 0.35, false),
];

const READY: [HitZone; 3] = [
    zone(0.0, 1.6, 0.05, 0.22, true),
    zone(0.0, 1.2, 0.0, 0.42, false),
    zone(0.0, 0.55, 0.0, 0.38, false),
];

const COMPACT: [HitZone; 3] = [
    zone(0.0, 1.38, 0.12, 0.17, true),
    zone(0.0, 1.05, 0.0, 0.42, false),
    zone(0.0, 0.5, 0.0, 0.4, false),
];

/// Pose-dependent set of hit zones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ZoneLayout {
    Upright,
    Ready,
    Compact,
}

impl ZoneLayout {
    pub fn for_state(state: BehaviorState) -> Self {
        match state {
            BehaviorState::Engaging | BehaviorState::Suppressing => ZoneLayout::Compact,
            BehaviorState::Alert => ZoneLayout::Ready,
            BehaviorState::Patrolling | BehaviorState::Dead => ZoneLayout::Upright,
        }
    }

    pub fn zones(&self) -> &'static [HitZone] {
        match self {
            ZoneLayout::Upright => &UPRIGHT,
            ZoneLayout::Ready => &READY,
            ZoneLayout::Compact => &COMPACT,
        }
    }

    pub fn head(&self) -> &'static HitZone {
        &self.zones()[0]
    }
}

/// A ray with a normalized direction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
}

impl Ray {
    /// Build a ray; a zero direction falls back to +Z.
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self {
            origin,
            direction: direction.try_normalize().unwrap_or(Vec3::Z),
        }
    }

    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }
}

/// Result of a ray test against one body.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit<T> {
    pub target: T,
    /// Ray parameter of closest approach to the struck zone's center.
    pub distance: f32,
    /// Hit point snapped onto the zone's surface.
    pub point: Vec3,
    /// Outward surface normal at `point`.
    pub normal: Vec3,
    pub headshot: bool,
}

/// A body that can be struck: where it stands, which way it faces, and its pose.
#[derive(Debug, Clone, Copy)]
pub struct HitCandidate<T> {
    pub target: T,
    pub position: Vec3,
    pub yaw: f32,
    pub layout: ZoneLayout,
}

/// Tests `ray` against a single sphere.
///
/// Returns `(t, point, normal)` when the closest approach lies within
/// `[0, max_range]` and inside the sphere.
pub fn intersect_sphere(
    ray: &Ray,
    center: Vec3,
    radius: f32,
    max_range: f32,
) -> Option<(f32, Vec3, Vec3)> {
    let t = (center - ray.origin).dot(ray.direction);
    if t < 0.0 || t > max_range {
        return None;
    }
    let closest = ray.at(t);
    if closest.distance_squared(center) > radius * radius {
        return None;
    }
    let normal = (closest - center)
        .try_normalize()
        .unwrap_or(-ray.direction);
    Some((t, center + normal * radius, normal))
}

/// Tests `ray` against every zone of one body and keeps the nearest.
pub fn intersect_body<T: Copy>(
    ray: &Ray,
    candidate: &HitCandidate<T>,
    max_range: f32,
) -> Option<RayHit<T>> {
    let rotation = Quat::from_rotation_y(candidate.yaw);
    let mut best: Option<RayHit<T>> = None;
    for zone in candidate.layout.zones() {
        let center = candidate.position + rotation * zone.offset;
        if let Some((t, point, normal)) = intersect_sphere(ray, center, zone.radius, max_range) {
            if best.map_or(true, |b| t < b.distance) {
                best = Some(RayHit {
                    target: candidate.target,
                    distance: t,
                    point,
                    normal,
                    headshot: zone.head,
                });
            }
        }
    }
    best
}

/// Casts `ray` through all candidates and returns the hit with the smallest `t`.
pub fn cast_ray<T, I>(ray: &Ray, max_range: f32, candidates: I) -> Option<RayHit<T>>
where
    T: Copy,
    I: IntoIterator<Item = HitCandidate<T>>,
{
    let mut best: Option<RayHit<T>> = None;
    for candidate in candidates {
        if let Some(hit) = intersect_body(ray, &candidate, max_range) {
            if best.map_or(true, |b| hit.distance < b.distance) {
                best = Some(hit);
            }
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn body(target: u32, x: f32, z: f32, layout: ZoneLayout) -> HitCandidate<u32> {
        HitCandidate {
            target,
            position: Vec3::new(x, 0.0, z),
            yaw: 0.0,
            layout,
        }
    }

    #[test]
    fn test_ray_through_zone_center_reports_its_distance() {
        let torso = UPRIGHT[1];
        let center = Vec3::new(0.0, torso.offset.y, 25.0);
        let ray = Ray::new(Vec3::new(0.0, torso.offset.y, 0.0), Vec3::Z);

        let hit = cast_ray(&ray, 150.0, [body(7, 0.0, 25.0, ZoneLayout::Upright)]).unwrap();
        assert_eq!(hit.target, 7);
        assert!(!hit.headshot);
        assert_relative_eq!(hit.distance, center.z, epsilon = 1e-4);
        // Snapped onto the surface facing the shooter.
        assert_relative_eq!(hit.point.distance(center), torso.radius, epsilon = 1e-4);
        assert!(hit.normal.z < 0.0);
    }

    #[test]
    fn test_nearest_body_wins() {
        let ray = Ray::new(Vec3::new(0.0, 1.2, 0.0), Vec3::Z);
        let hit = cast_ray(
            &ray,
            150.0,
            [
                body(1, 0.0, 40.0, ZoneLayout::Upright),
                body(2, 0.0, 20.0, ZoneLayout::Upright),
                body(3, 0.0, 60.0, ZoneLayout::Upright),
            ],
        )
        .unwrap();
        assert_eq!(hit.target, 2);
    }

    #[test]
    fn test_headshot_detected() {
        let head = UPRIGHT[0];
        let ray = Ray::new(Vec3::new(0.0, head.offset.y, 0.0), Vec3::Z);
        let hit = cast_ray(&ray, 150.0, [body(1, 0.0, 10.0, ZoneLayout::Upright)]).unwrap();
        assert!(hit.headshot);
    }

    #[test]
    fn test_compact_pose_shrinks_head() {
        let y = UPRIGHT[0].offset.y;
        let ray = Ray::new(Vec3::new(0.0, y, 0.0), Vec3::Z);
        assert!(cast_ray(&ray, 150.0, [body(1, 0.0, 10.0, ZoneLayout::Upright)]).is_some());
        assert!(cast_ray(&ray, 150.0, [body(1, 0.0, 10.0, ZoneLayout::Compact)]).is_none());
        assert!(ZoneLayout::Compact.head().radius < ZoneLayout::Upright.head().radius);
        assert!(ZoneLayout::Compact.head().radius < ZoneLayout::Ready.head().radius);
    }

    #[test]
    fn test_out_of_range_and_behind_miss() {
        let ray = Ray::new(Vec3::new(0.0, 1.2, 0.0), Vec3::Z);
        assert!(cast_ray(&ray, 50.0, [body(1, 0.0, 80.0, ZoneLayout::Upright)]).is_none());
        assert!(cast_ray(&ray, 150.0, [body(1, 0.0, -10.0, ZoneLayout::Upright)]).is_none());
    }

    #[test]
    fn test_grazing_miss() {
        let ray = Ray::new(Vec3::new(1.0, 1.2, 0.0), Vec3::Z);
        assert!(cast_ray(&ray, 150.0, [body(1, 0.0, 10.0, ZoneLayout::Upright)]).is_none());
    }

    #[test]
    fn test_layout_follows_state() {
        assert_eq!(ZoneLayout::for_state(BehaviorState::Engaging), ZoneLayout::Compact);
        assert_eq!(ZoneLayout::for_state(BehaviorState::Suppressing), ZoneLayout::Compact);
        assert_eq!(ZoneLayout::for_state(BehaviorState::Alert), ZoneLayout::Ready);
        assert_eq!(ZoneLayout::for_state(BehaviorState::Patrolling), ZoneLayout::Upright);
    }
}
