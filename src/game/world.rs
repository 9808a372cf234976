//! Collision world queried by gameplay code
//!
//! Gameplay never talks to a physics engine directly. It asks a [`World`] for
//! the nearest blocking hit along a line or a swept sphere, for the floor
//! under a point, and whether a sphere would overlap level geometry.
//! [`ArenaWorld`] is the in-process implementation: axis-aligned static boxes
//! plus per-tick dynamic spheres for characters, props and projectiles.

use glam::Vec3;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Which colliders a query considers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceChannel {
    /// Level geometry only
    Static,
    /// Level geometry plus every dynamic collider
    Visibility,
}

/// Dynamic entity categories the world can report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Character,
    Prop,
    Projectile,
}

/// An entity struck by a trace
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HitEntity {
    pub id: Uuid,
    pub kind: EntityKind,
}

/// Nearest blocking hit of a query
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TraceHit {
    /// Fraction of the query segment travelled before the hit (0..=1)
    pub fraction: f32,
    /// Query origin position at the moment of the hit
    pub location: Vec3,
    /// Point on the struck surface
    pub impact_point: Vec3,
    pub normal: Vec3,
    /// `None` for level geometry
    pub entity: Option<HitEntity>,
}

/// Collision queries the simulation relies on
pub trait World {
    fn line_trace(
        &self,
        start: Vec3,
        end: Vec3,
        channel: TraceChannel,
        ignore: &[Uuid],
    ) -> Option<TraceHit>;

    fn sphere_sweep(
        &self,
        start: Vec3,
        end: Vec3,
        radius: f32,
        channel: TraceChannel,
        ignore: &[Uuid],
    ) -> Option<TraceHit>;

    /// Height of the highest walkable surface at or just below `feet`
    fn ground_height(&self, feet: Vec3) -> Option<f32>;

    /// Would a sphere at `center` overlap level geometry
    fn blocks_sphere(&self, center: Vec3, radius: f32) -> bool;

    /// Anything below this height has fallen out of the world
    fn kill_z(&self) -> f32;
}

/// Axis-aligned box of level geometry
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self {
            min: min.min(max),
            max: min.max(max),
        }
    }

    fn expanded(&self, by: f32) -> Self {
        Self {
            min: self.min - Vec3::splat(by),
            max: self.max + Vec3::splat(by),
        }
    }

    fn contains_xy(&self, point: Vec3) -> bool {
        point.x >= self.min.x && point.x <= self.max.x && point.y >= self.min.y && point.y <= self.max.y
    }

    /// Closest point of the box to `point`
    fn clamp(&self, point: Vec3) -> Vec3 {
        point.clamp(self.min, self.max)
    }

    /// Slab test. Returns the entry fraction and the face normal.
    fn intersect_segment(&self, start: Vec3, end: Vec3) -> Option<(f32, Vec3)> {
        let dir = end - start;
        let mut t_min = 0.0_f32;
        let mut t_max = 1.0_f32;
        let mut normal = -dir.normalize_or_zero();
        let mut entered = false;

        for axis in 0..3 {
            let (s, d, lo, hi) = (start[axis], dir[axis], self.min[axis], self.max[axis]);
            if d.abs() < f32::EPSILON {
                if s < lo || s > hi {
                    return None;
                }
                continue;
            }

            let inv = 1.0 / d;
            let (mut t1, mut t2) = ((lo - s) * inv, (hi - s) * inv);
            let mut face = Vec3::ZERO;
            face[axis] = -d.signum();
            if t1 > t2 {
                std::mem::swap(&mut t1, &mut t2);
            }
            if t1 > t_min {
                t_min = t1;
                normal = face;
                entered = true;
            }
            t_max = t_max.min(t2);
            if t_min > t_max {
                return None;
            }
        }

        // Started inside the box
        if !entered {
            return Some((0.0, normal));
        }
        Some((t_min, normal))
    }
}

/// Ray against a sphere, fraction of the first contact
fn intersect_sphere(start: Vec3, end: Vec3, center: Vec3, radius: f32) -> Option<f32> {
    let d = end - start;
    let f = start - center;
    let c = f.length_squared() - radius * radius;
    if c <= 0.0 {
        return Some(0.0);
    }

    let a = d.length_squared();
    if a < f32::EPSILON {
        return None;
    }
    let b = 2.0 * f.dot(d);
    let disc = b * b - 4.0 * a * c;
    if disc < 0.0 {
        return None;
    }

    let t = (-b - disc.sqrt()) / (2.0 * a);
    (0.0..=1.0).contains(&t).then_some(t)
}

/// A sphere collider rebuilt every tick from live entities
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DynamicCollider {
    pub entity: HitEntity,
    pub center: Vec3,
    pub radius: f32,
}

/// Box-based arena level plus the current dynamic colliders
#[derive(Debug, Clone)]
pub struct ArenaWorld {
    statics: Vec<Aabb>,
    dynamics: Vec<DynamicCollider>,
    spawn_points: Vec<Vec3>,
    kill_z: f32,
}

/// Vertical tolerance when looking for the floor under a character
const GROUND_PROBE: f32 = 2.0;

impl ArenaWorld {
    pub fn empty(kill_z: f32) -> Self {
        Self {
            statics: Vec::new(),
            dynamics: Vec::new(),
            spawn_points: Vec::new(),
            kill_z,
        }
    }

    /// Walled square arena with a few pillars to wall-jump off
    pub fn standard() -> Self {
        let mut world = Self::empty(-2_000.0);
        let half = 4_000.0;
        let wall = 100.0;
        let height = 800.0;

        // Floor
        world.add_box(Aabb::new(Vec3::new(-half, -half, -100.0), Vec3::new(half, half, 0.0)));

        // Perimeter
        world.add_box(Aabb::new(Vec3::new(-half, -half, 0.0), Vec3::new(half, -half + wall, height)));
        world.add_box(Aabb::new(Vec3::new(-half, half - wall, 0.0), Vec3::new(half, half, height)));
        world.add_box(Aabb::new(Vec3::new(-half, -half, 0.0), Vec3::new(-half + wall, half, height)));
        world.add_box(Aabb::new(Vec3::new(half - wall, -half, 0.0), Vec3::new(half, half, height)));

        // Pillars
        for (x, y) in [(-1_500.0, -1_500.0), (1_500.0, -1_500.0), (-1_500.0, 1_500.0), (1_500.0, 1_500.0)] {
            world.add_box(Aabb::new(Vec3::new(x - 150.0, y - 150.0, 0.0), Vec3::new(x + 150.0, y + 150.0, 1_200.0)));
        }

        for (x, y) in [
            (-3_000.0, -3_000.0),
            (3_000.0, -3_000.0),
            (-3_000.0, 3_000.0),
            (3_000.0, 3_000.0),
            (0.0, -2_500.0),
            (0.0, 2_500.0),
            (-2_500.0, 0.0),
            (2_500.0, 0.0),
        ] {
            world.spawn_points.push(Vec3::new(x, y, 0.0));
        }

        world
    }

    pub fn add_box(&mut self, aabb: Aabb) {
        self.statics.push(aabb);
    }

    pub fn add_spawn_point(&mut self, feet: Vec3) {
        self.spawn_points.push(feet);
    }

    /// Spawn positions at floor level
    pub fn spawn_points(&self) -> &[Vec3] {
        &self.spawn_points
    }

    /// Replace the dynamic colliders for the coming tick
    pub fn set_dynamics(&mut self, colliders: Vec<DynamicCollider>) {
        self.dynamics = colliders;
    }

    pub fn dynamics(&self) -> &[DynamicCollider] {
        &self.dynamics
    }

    /// Drop every collider belonging to `id` before the next rebuild
    pub fn remove_dynamic(&mut self, id: Uuid) {
        self.dynamics.retain(|d| d.entity.id != id);
    }

    fn sweep(
        &self,
        start: Vec3,
        end: Vec3,
        radius: f32,
        channel: TraceChannel,
        ignore: &[Uuid],
    ) -> Option<TraceHit> {
        let mut best: Option<TraceHit> = None;
        let dir = end - start;

        let mut consider = |fraction: f32, normal: Vec3, impact: Vec3, entity: Option<HitEntity>| {
            if best.map_or(true, |b| fraction < b.fraction) {
                best = Some(TraceHit {
                    fraction,
                    location: start + dir * fraction,
                    impact_point: impact,
                    normal,
                    entity,
                });
            }
        };

        for aabb in &self.statics {
            if let Some((fraction, normal)) = aabb.expanded(radius).intersect_segment(start, end) {
                let location = start + dir * fraction;
                consider(fraction, normal, aabb.clamp(location), None);
            }
        }

        if channel == TraceChannel::Visibility {
            for collider in self
                .dynamics
                .iter()
                .filter(|c| !ignore.contains(&c.entity.id))
            {
                if let Some(fraction) = intersect_sphere(start, end, collider.center, collider.radius + radius) {
                    let location = start + dir * fraction;
                    let normal = (location - collider.center).normalize_or_zero();
                    let impact = collider.center + normal * collider.radius;
                    consider(fraction, normal, impact, Some(collider.entity));
                }
            }
        }

        best
    }
}

impl World for ArenaWorld {
    fn line_trace(
        &self,
        start: Vec3,
        end: Vec3,
        channel: TraceChannel,
        ignore: &[Uuid],
    ) -> Option<TraceHit> {
        self.sweep(start, end, 0.0, channel, ignore)
    }

    fn sphere_sweep(
        &self,
        start: Vec3,
        end: Vec3,
        radius: f32,
        channel: TraceChannel,
        ignore: &[Uuid],
    ) -> Option<TraceHit> {
        self.sweep(start, end, radius, channel, ignore)
    }

    fn ground_height(&self, feet: Vec3) -> Option<f32> {
        self.statics
            .iter()
            .filter(|b| b.contains_xy(feet) && b.max.z <= feet.z + GROUND_PROBE)
            .map(|b| b.max.z)
            .fold(None, |acc: Option<f32>, z| Some(acc.map_or(z, |a| a.max(z))))
    }

    fn blocks_sphere(&self, center: Vec3, radius: f32) -> bool {
        self.statics
            .iter()
            .any(|b| b.clamp(center).distance_squared(center) < radius * radius)
    }

    fn kill_z(&self) -> f32 {
        self.kill_z
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corridor() -> ArenaWorld {
        let mut world = ArenaWorld::empty(-1_000.0);
        world.add_box(Aabb::new(Vec3::new(-500.0, -500.0, -10.0), Vec3::new(500.0, 500.0, 0.0)));
        world.add_box(Aabb::new(Vec3::new(-500.0, 80.0, 0.0), Vec3::new(500.0, 120.0, 400.0)));
        world
    }

    #[test]
    fn line_trace_reports_nearest_face() {
        let world = corridor();
        let hit = world
            .line_trace(Vec3::new(0.0, 0.0, 100.0), Vec3::new(0.0, 200.0, 100.0), TraceChannel::Static, &[])
            .expect("wall in the way");
        assert!((hit.location.y - 80.0).abs() < 1e-3);
        assert_eq!(hit.normal, Vec3::new(0.0, -1.0, 0.0));
        assert!(hit.entity.is_none());
    }

    #[test]
    fn line_trace_misses_open_space() {
        let world = corridor();
        let hit = world.line_trace(
            Vec3::new(0.0, 0.0, 100.0),
            Vec3::new(0.0, -200.0, 100.0),
            TraceChannel::Static,
            &[],
        );
        assert!(hit.is_none());
    }

    #[test]
    fn sphere_sweep_touches_nearby_wall() {
        let world = corridor();
        let start = Vec3::new(0.0, 30.0, 150.0);
        assert!(world
            .sphere_sweep(start, start + Vec3::Z * 100.0, 60.0, TraceChannel::Static, &[])
            .is_some());
        let far = Vec3::new(0.0, -200.0, 150.0);
        assert!(world
            .sphere_sweep(far, far + Vec3::Z * 100.0, 60.0, TraceChannel::Static, &[])
            .is_none());
    }

    #[test]
    fn dynamic_colliders_respect_channel_and_ignore_list() {
        let mut world = corridor();
        let id = Uuid::new_v4();
        world.set_dynamics(vec![DynamicCollider {
            entity: HitEntity { id, kind: EntityKind::Character },
            center: Vec3::new(0.0, 40.0, 100.0),
            radius: 20.0,
        }]);
        let (start, end) = (Vec3::new(0.0, -100.0, 100.0), Vec3::new(0.0, 200.0, 100.0));

        let hit = world.line_trace(start, end, TraceChannel::Visibility, &[]).unwrap();
        assert_eq!(hit.entity.map(|e| e.id), Some(id));

        let hit = world.line_trace(start, end, TraceChannel::Static, &[]).unwrap();
        assert!(hit.entity.is_none());

        let hit = world.line_trace(start, end, TraceChannel::Visibility, &[id]).unwrap();
        assert!(hit.entity.is_none());
    }

    #[test]
    fn ground_height_finds_floor_under_feet() {
        let world = corridor();
        assert_eq!(world.ground_height(Vec3::new(0.0, 0.0, 0.5)), Some(0.0));
        assert_eq!(world.ground_height(Vec3::new(900.0, 0.0, 0.5)), None);
    }

    #[test]
    fn standard_arena_has_spawn_points_inside_walls() {
        let world = ArenaWorld::standard();
        assert!(!world.spawn_points().is_empty());
        for spawn in world.spawn_points() {
            assert!(!world.blocks_sphere(*spawn + Vec3::Z * 90.0, 55.0));
        }
    }
}
