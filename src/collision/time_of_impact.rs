//! Time of impact: when do two swept shapes first come within a target
//! distance of each other?

use super::distance::{distance, DistanceInput, SimplexCache};
use super::shape::DistanceProxy;
use crate::math::{self as m, Sweep, UnitVec2, Vec2};

#[derive(Clone, Copy, Debug)]
pub struct ToiInput<'a> {
    pub proxy_a: &'a DistanceProxy<'a>,
    pub proxy_b: &'a DistanceProxy<'a>,
    pub sweep_a: Sweep,
    pub sweep_b: Sweep,
    /// Search window upper bound; 1 is the end of the step.
    pub t_max: f64,
    /// Penetration depth the search aims for.
    pub target_depth: f64,
    /// Half-width of the accepted band around the target.
    pub tolerance: f64,
    pub max_toi_iters: u32,
    pub max_root_iters: u32,
    pub max_distance_iters: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ToiState {
    /// The search did not run to a conclusion; treat conservatively.
    Unknown,
    /// Iteration budget exhausted before a conclusion.
    Failed,
    /// The shapes were already too deep at the start of the window.
    Overlapped,
    /// First contact found at the reported time.
    Touching,
    /// The shapes never come within range during the window.
    Separated,
}

#[derive(Clone, Copy, Debug)]
pub struct ToiOutput {
    pub state: ToiState,
    pub t: f64,
    pub toi_iterations: u32,
    pub root_iterations: u32,
    pub distance_iterations: u32,
}

/// Compute the earliest time in `[0, t_max]` at which the swept shapes reach
/// the target separation band.
///
/// Conservative advancement: each outer iteration queries closest features
/// at the current time, then root-finds the earliest time at which those
/// features reach the target separation, alternating secant and bisection
/// steps. Repeats until the deepest feature pair is inside the band.
pub fn time_of_impact(input: &ToiInput<'_>) -> ToiOutput {
    let mut output = ToiOutput {
        state: ToiState::Unknown,
        t: input.t_max,
        toi_iterations: 0,
        root_iterations: 0,
        distance_iterations: 0,
    };

    let proxy_a = input.proxy_a;
    let proxy_b = input.proxy_b;
    let mut sweep_a = input.sweep_a;
    let mut sweep_b = input.sweep_b;
    sweep_a.normalize_angles();
    sweep_b.normalize_angles();

    let total_radius = proxy_a.vertex_radius + proxy_b.vertex_radius;
    // target separation between the vertex clouds; the surfaces then
    // overlap by target_depth
    let target = (total_radius - input.target_depth).max(4.0 * input.tolerance);
    let tolerance = input.tolerance;
    debug_assert!(target > tolerance);

    let t_max = input.t_max;
    let mut t1 = 0.0;
    let mut cache = SimplexCache::default();

    loop {
        let xf_a = sweep_a.transform_at(t1);
        let xf_b = sweep_b.transform_at(t1);

        let dist_out = distance(
            &mut cache,
            &DistanceInput {
                proxy_a,
                proxy_b,
                xf_a,
                xf_b,
                use_radii: false,
                max_iterations: input.max_distance_iters,
            },
        );
        output.distance_iterations += dist_out.iterations;

        if dist_out.distance < target - tolerance {
            // deeper than the target band already
            output.state = if t1 > 0.0 {
                ToiState::Failed
            } else {
                ToiState::Overlapped
            };
            output.t = t1;
            break;
        }
        if dist_out.distance < target + tolerance {
            output.state = ToiState::Touching;
            output.t = t1;
            break;
        }

        let mut fcn = SeparationFunction::new(&cache, proxy_a, &sweep_a, proxy_b, &sweep_b, t1);

        // push t1 forward until the deepest feature pair at the end of the
        // window is no deeper than the target
        let mut done = false;
        let mut t2 = t_max;
        let mut push_back_iter = 0;
        loop {
            let (s2, index_a, index_b) = fcn.find_min_separation(proxy_a, proxy_b, t2);

            if s2 > target + tolerance {
                output.state = ToiState::Separated;
                output.t = t_max;
                done = true;
                break;
            }
            if s2 > target - tolerance {
                // the end of the window is in the band; advance to it
                t1 = t2;
                break;
            }

            let mut s1 = fcn.evaluate(proxy_a, proxy_b, index_a, index_b, t1);
            if s1 < target - tolerance {
                output.state = ToiState::Failed;
                output.t = t1;
                done = true;
                break;
            }
            if s1 <= target + tolerance {
                output.state = ToiState::Touching;
                output.t = t1;
                done = true;
                break;
            }

            // root-find s(t) == target on [t1, t2]
            let mut root_iters = 0;
            let mut a1 = t1;
            let mut a2 = t2;
            let mut s2_local = s2;
            loop {
                let t = if root_iters % 2 == 1 {
                    // secant step
                    a1 + (target - s1) * (a2 - a1) / (s2_local - s1)
                } else {
                    0.5 * (a1 + a2)
                };
                root_iters += 1;
                output.root_iterations += 1;

                let s = fcn.evaluate(proxy_a, proxy_b, index_a, index_b, t);
                if (s - target).abs() < tolerance {
                    t2 = t;
                    break;
                }
                if s > target {
                    a1 = t;
                    s1 = s;
                } else {
                    a2 = t;
                    s2_local = s;
                }
                if root_iters >= input.max_root_iters {
                    break;
                }
            }

            push_back_iter += 1;
            if push_back_iter >= crate::settings::MAX_POLYGON_VERTICES as u32 {
                break;
            }
        }

        output.toi_iterations += 1;
        if done {
            break;
        }
        if output.toi_iterations >= input.max_toi_iters {
            output.state = ToiState::Failed;
            output.t = t1;
            break;
        }
    }

    output
}

/// A 1D view of the gap between two swept shapes along a fixed axis chosen
/// from the closest features found by GJK.
#[derive(Clone, Copy, Debug)]
struct SeparationFunction {
    sweep_a: Sweep,
    sweep_b: Sweep,
    kind: SeparationKind,
    /// World axis for `Points`, local to the face's shape otherwise.
    axis: UnitVec2,
    /// Face midpoint in the face shape's frame.
    local_point: Vec2,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum SeparationKind {
    Points,
    FaceA,
    FaceB,
}

impl SeparationFunction {
    fn new(
        cache: &SimplexCache,
        proxy_a: &DistanceProxy<'_>,
        sweep_a: &Sweep,
        proxy_b: &DistanceProxy<'_>,
        sweep_b: &Sweep,
        t1: f64,
    ) -> Self {
        debug_assert!(cache.count > 0 && cache.count < 3);
        let xf_a = sweep_a.transform_at(t1);
        let xf_b = sweep_b.transform_at(t1);

        if cache.count == 1 {
            let local_a = proxy_a.vertex(cache.index_a[0]);
            let local_b = proxy_b.vertex(cache.index_b[0]);
            let point_a = xf_a.apply(local_a);
            let point_b = xf_b.apply(local_b);
            let axis = UnitVec2::normalize_or_zero(point_b - point_a);
            return Self {
                sweep_a: *sweep_a,
                sweep_b: *sweep_b,
                kind: SeparationKind::Points,
                axis,
                local_point: Vec2::zero(),
            };
        }

        if cache.index_a[0] == cache.index_a[1] {
            // two points on B, one on A: separation along B's face normal
            let b1 = proxy_b.vertex(cache.index_b[0]);
            let b2 = proxy_b.vertex(cache.index_b[1]);
            let mut axis = UnitVec2::normalize_or_zero(m::right_normal(b2 - b1));
            let normal = xf_b.q.rotate_unit(axis);
            let local_point = (b1 + b2) * 0.5;
            let point_b = xf_b.apply(local_point);
            let point_a = xf_a.apply(proxy_a.vertex(cache.index_a[0]));
            if (point_a - point_b).dot(*normal) < 0.0 {
                axis = -axis;
            }
            Self {
                sweep_a: *sweep_a,
                sweep_b: *sweep_b,
                kind: SeparationKind::FaceB,
                axis,
                local_point,
            }
        } else {
            // two points on A
            let a1 = proxy_a.vertex(cache.index_a[0]);
            let a2 = proxy_a.vertex(cache.index_a[1]);
            let mut axis = UnitVec2::normalize_or_zero(m::right_normal(a2 - a1));
            let normal = xf_a.q.rotate_unit(axis);
            let local_point = (a1 + a2) * 0.5;
            let point_a = xf_a.apply(local_point);
            let point_b = xf_b.apply(proxy_b.vertex(cache.index_b[0]));
            if (point_b - point_a).dot(*normal) < 0.0 {
                axis = -axis;
            }
            Self {
                sweep_a: *sweep_a,
                sweep_b: *sweep_b,
                kind: SeparationKind::FaceA,
                axis,
                local_point,
            }
        }
    }

    /// The smallest separation over all feature pairs at time `t`, plus the
    /// indices of the pair achieving it.
    fn find_min_separation(
        &self,
        proxy_a: &DistanceProxy<'_>,
        proxy_b: &DistanceProxy<'_>,
        t: f64,
    ) -> (f64, usize, usize) {
        let xf_a = self.sweep_a.transform_at(t);
        let xf_b = self.sweep_b.transform_at(t);

        match self.kind {
            SeparationKind::Points => {
                let axis_a = xf_a.q.inverse_rotate(*self.axis);
                let axis_b = xf_b.q.inverse_rotate(-*self.axis);
                let index_a = proxy_a.support(axis_a);
                let index_b = proxy_b.support(axis_b);
                let point_a = xf_a.apply(proxy_a.vertex(index_a));
                let point_b = xf_b.apply(proxy_b.vertex(index_b));
                ((point_b - point_a).dot(*self.axis), index_a, index_b)
            }
            SeparationKind::FaceA => {
                let normal = xf_a.q.rotate_unit(self.axis);
                let point_a = xf_a.apply(self.local_point);
                let axis_b = xf_b.q.inverse_rotate(-*normal);
                let index_b = proxy_b.support(axis_b);
                let point_b = xf_b.apply(proxy_b.vertex(index_b));
                ((point_b - point_a).dot(*normal), usize::MAX, index_b)
            }
            SeparationKind::FaceB => {
                let normal = xf_b.q.rotate_unit(self.axis);
                let point_b = xf_b.apply(self.local_point);
                let axis_a = xf_a.q.inverse_rotate(-*normal);
                let index_a = proxy_a.support(axis_a);
                let point_a = xf_a.apply(proxy_a.vertex(index_a));
                ((point_a - point_b).dot(*normal), index_a, usize::MAX)
            }
        }
    }

    /// Separation of a specific feature pair at time `t`.
    fn evaluate(
        &self,
        proxy_a: &DistanceProxy<'_>,
        proxy_b: &DistanceProxy<'_>,
        index_a: usize,
        index_b: usize,
        t: f64,
    ) -> f64 {
        let xf_a = self.sweep_a.transform_at(t);
        let xf_b = self.sweep_b.transform_at(t);

        match self.kind {
            SeparationKind::Points => {
                let point_a = xf_a.apply(proxy_a.vertex(index_a));
                let point_b = xf_b.apply(proxy_b.vertex(index_b));
                (point_b - point_a).dot(*self.axis)
            }
            SeparationKind::FaceA => {
                let normal = xf_a.q.rotate_unit(self.axis);
                let point_a = xf_a.apply(self.local_point);
                let point_b = xf_b.apply(proxy_b.vertex(index_b));
                (point_b - point_a).dot(*normal)
            }
            SeparationKind::FaceB => {
                let normal = xf_b.q.rotate_unit(self.axis);
                let point_b = xf_b.apply(self.local_point);
                let point_a = xf_a.apply(proxy_a.vertex(index_a));
                (point_a - point_b).dot(*normal)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collision::shape::{Circle, Polygon, Shape};
    use crate::math::Position;

    fn stationary_sweep(at: Vec2) -> Sweep {
        Sweep {
            local_center: Vec2::zero(),
            pos0: Position {
                linear: at,
                angular: 0.0,
            },
            pos1: Position {
                linear: at,
                angular: 0.0,
            },
            alpha0: 0.0,
        }
    }

    fn moving_sweep(from: Vec2, to: Vec2) -> Sweep {
        Sweep {
            local_center: Vec2::zero(),
            pos0: Position {
                linear: from,
                angular: 0.0,
            },
            pos1: Position {
                linear: to,
                angular: 0.0,
            },
            alpha0: 0.0,
        }
    }

    fn run_toi(
        shape_a: &Shape,
        sweep_a: Sweep,
        shape_b: &Shape,
        sweep_b: Sweep,
    ) -> ToiOutput {
        let proxy_a = shape_a.child_proxy(0);
        let proxy_b = shape_b.child_proxy(0);
        time_of_impact(&ToiInput {
            proxy_a: &proxy_a,
            proxy_b: &proxy_b,
            sweep_a,
            sweep_b,
            t_max: 1.0,
            target_depth: 3.0 * crate::settings::LINEAR_SLOP,
            tolerance: crate::settings::LINEAR_SLOP / 4.0,
            max_toi_iters: 20,
            max_root_iters: 30,
            max_distance_iters: 20,
        })
    }

    #[test]
    fn fast_circle_hits_stationary_circle() {
        let a = Shape::Circle(Circle::new(0.5));
        let b = Shape::Circle(Circle::new(0.5));
        let out = run_toi(
            &a,
            stationary_sweep(Vec2::zero()),
            &b,
            moving_sweep(Vec2::new(10.0, 0.0), Vec2::new(0.0, 0.0)),
        );
        assert_eq!(out.state, ToiState::Touching);
        // surfaces meet (with target depth ~0.015) when centers are ~0.985 apart
        assert!((out.t - 0.9015).abs() < 0.01, "t = {}", out.t);
    }

    #[test]
    fn passing_circles_never_touch() {
        let a = Shape::Circle(Circle::new(0.5));
        let b = Shape::Circle(Circle::new(0.5));
        let out = run_toi(
            &a,
            stationary_sweep(Vec2::zero()),
            &b,
            moving_sweep(Vec2::new(-10.0, 5.0), Vec2::new(10.0, 5.0)),
        );
        assert_eq!(out.state, ToiState::Separated);
        assert_eq!(out.t, 1.0);
    }

    #[test]
    fn initial_overlap_is_reported() {
        let a = Shape::Circle(Circle::new(0.5));
        let b = Shape::Circle(Circle::new(0.5));
        let out = run_toi(
            &a,
            stationary_sweep(Vec2::zero()),
            &b,
            moving_sweep(Vec2::new(0.1, 0.0), Vec2::new(5.0, 0.0)),
        );
        assert_eq!(out.state, ToiState::Overlapped);
        assert_eq!(out.t, 0.0);
    }

    #[test]
    fn box_catches_up_with_box() {
        let a = Shape::Polygon(Polygon::new_box(0.5, 0.5));
        let b = Shape::Polygon(Polygon::new_box(0.5, 0.5));
        // A chases B and closes the 4-unit gap at relative speed 8
        let out = run_toi(
            &a,
            moving_sweep(Vec2::new(0.0, 0.0), Vec2::new(8.0, 0.0)),
            &b,
            stationary_sweep(Vec2::new(5.0, 0.0)),
        );
        assert_eq!(out.state, ToiState::Touching);
        // faces meet when A has moved 4 minus the skin allowance
        assert!((out.t - 0.5).abs() < 0.01, "t = {}", out.t);
    }

    #[test]
    fn tunneling_pair_is_caught_mid_window() {
        let a = Shape::Circle(Circle::new(0.1));
        let b = Shape::Circle(Circle::new(0.1));
        // B passes all the way through A within one step
        let out = run_toi(
            &a,
            stationary_sweep(Vec2::zero()),
            &b,
            moving_sweep(Vec2::new(-20.0, 0.0), Vec2::new(20.0, 0.0)),
        );
        assert_eq!(out.state, ToiState::Touching);
        // contact at roughly x = -0.2 of a 40-unit sweep
        assert!((out.t - 0.495).abs() < 0.005, "t = {}", out.t);
    }
}
