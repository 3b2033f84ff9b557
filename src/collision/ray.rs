//! Ray cast inputs and outputs shared by shapes, the tree, and the world.

use super::aabb::AABB;
use crate::math::{UnitVec2, Vec2};

/// A directed segment from `p1` to `p2`, truncated to `max_fraction` of its
/// length.
#[derive(Clone, Copy, Debug)]
pub struct RayCastInput {
    pub p1: Vec2,
    pub p2: Vec2,
    pub max_fraction: f64,
}

impl RayCastInput {
    pub fn new(p1: Vec2, p2: Vec2) -> Self {
        Self {
            p1,
            p2,
            max_fraction: 1.0,
        }
    }

    /// The point at the given fraction along the segment.
    pub fn point_at(&self, fraction: f64) -> Vec2 {
        self.p1 * (1.0 - fraction) + self.p2 * fraction
    }
}

/// A hit from a ray cast: where along the ray, and the surface normal there.
#[derive(Clone, Copy, Debug)]
pub struct RayHit {
    pub fraction: f64,
    pub normal: UnitVec2,
}

/// Segment-vs-AABB test using the slab method.
/// Returns the entry fraction if the segment reaches the box.
pub fn ray_aabb(input: &RayCastInput, aabb: &AABB) -> Option<f64> {
    let mut tmin = f64::NEG_INFINITY;
    let mut tmax = f64::INFINITY;

    let p = input.p1;
    let d = input.p2 - input.p1;

    for i in 0..2 {
        let (p_i, d_i, min_i, max_i) = if i == 0 {
            (p.x, d.x, aabb.min.x, aabb.max.x)
        } else {
            (p.y, d.y, aabb.min.y, aabb.max.y)
        };
        if d_i.abs() < f64::EPSILON {
            // parallel to this slab
            if p_i < min_i || p_i > max_i {
                return None;
            }
        } else {
            let inv_d = 1.0 / d_i;
            let mut t1 = (min_i - p_i) * inv_d;
            let mut t2 = (max_i - p_i) * inv_d;
            if t1 > t2 {
                std::mem::swap(&mut t1, &mut t2);
            }
            tmin = tmin.max(t1);
            tmax = tmax.min(t2);
            if tmin > tmax {
                return None;
            }
        }
    }

    if tmin > input.max_fraction || tmax < 0.0 {
        return None;
    }
    Some(tmin.max(0.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ray_hits_box_from_outside() {
        let aabb = AABB::new(Vec2::new(1.0, -1.0), Vec2::new(2.0, 1.0));
        let input = RayCastInput::new(Vec2::new(0.0, 0.0), Vec2::new(4.0, 0.0));
        let t = ray_aabb(&input, &aabb).unwrap();
        assert!((t - 0.25).abs() < 1e-12);
    }

    #[test]
    fn ray_misses_box_beyond_max_fraction() {
        let aabb = AABB::new(Vec2::new(10.0, -1.0), Vec2::new(11.0, 1.0));
        let mut input = RayCastInput::new(Vec2::new(0.0, 0.0), Vec2::new(4.0, 0.0));
        assert!(ray_aabb(&input, &aabb).is_none());
        input.p2 = Vec2::new(40.0, 0.0);
        input.max_fraction = 0.2;
        assert!(ray_aabb(&input, &aabb).is_none());
        input.max_fraction = 1.0;
        assert!(ray_aabb(&input, &aabb).is_some());
    }

    #[test]
    fn ray_starting_inside_reports_zero() {
        let aabb = AABB::new(Vec2::new(-1.0, -1.0), Vec2::new(1.0, 1.0));
        let input = RayCastInput::new(Vec2::new(0.0, 0.0), Vec2::new(4.0, 0.0));
        assert_eq!(ray_aabb(&input, &aabb), Some(0.0));
    }
}
