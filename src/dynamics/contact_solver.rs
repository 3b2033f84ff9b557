//! Sequential-impulse solving of contact constraints.
//!
//! The island copies body state into [`BodyConstraint`] buffers, the solver
//! iterates impulses against those buffers, and the island writes the
//! results back to the bodies afterwards.

use super::ContactKey;
use crate::collision::{Manifold, ManifoldType};
use crate::math::{self as m, Mat22, Position, Rotation, Transform, UnitVec2, Vec2, Velocity};
use crate::settings::{StepConf, MAX_MANIFOLD_POINTS};

/// Condition-number guard for the two-point block solver; above this the
/// points are too close together and we fall back to per-point solving.
const MAX_CONDITION: f64 = 1000.0;

/// A body's solver-local state: the mutable position/velocity the iterations
/// work on, plus immutable mass data.
#[derive(Clone, Copy, Debug)]
pub(crate) struct BodyConstraint {
    /// Center-of-mass position.
    pub position: Position,
    pub velocity: Velocity,
    pub inv_mass: f64,
    pub inv_inertia: f64,
    pub local_center: Vec2,
}

impl BodyConstraint {
    /// The body-origin transform implied by the current solver position.
    pub fn transform(&self) -> Transform {
        let q = Rotation::from_angle(self.position.angular);
        Transform {
            p: self.position.linear - q.rotate(self.local_center),
            q,
        }
    }
}

/// Everything the contact solver needs to know about one island contact.
#[derive(Clone, Debug)]
pub(crate) struct ContactSolverDef {
    pub contact_key: ContactKey,
    pub manifold: Manifold,
    /// Island-local body indices.
    pub index_a: usize,
    pub index_b: usize,
    pub friction: f64,
    pub restitution: f64,
    pub tangent_speed: f64,
    pub radius_a: f64,
    pub radius_b: f64,
}

#[derive(Clone, Copy, Debug, Default)]
struct VelocityConstraintPoint {
    r_a: Vec2,
    r_b: Vec2,
    normal_impulse: f64,
    tangent_impulse: f64,
    normal_mass: f64,
    tangent_mass: f64,
    velocity_bias: f64,
}

#[derive(Clone, Debug)]
struct VelocityConstraint {
    points: [VelocityConstraintPoint; MAX_MANIFOLD_POINTS],
    count: usize,
    normal: UnitVec2,
    normal_mass: Mat22,
    k: Mat22,
    index_a: usize,
    index_b: usize,
    inv_mass_a: f64,
    inv_mass_b: f64,
    inv_i_a: f64,
    inv_i_b: f64,
    friction: f64,
    restitution: f64,
    tangent_speed: f64,
    contact_key: ContactKey,
}

#[derive(Clone, Debug)]
struct PositionConstraint {
    local_points: [Vec2; MAX_MANIFOLD_POINTS],
    count: usize,
    local_normal: UnitVec2,
    local_point: Vec2,
    ty: ManifoldType,
    index_a: usize,
    index_b: usize,
    radius_a: f64,
    radius_b: f64,
}

/// Gauss-Seidel contact solver over one island.
pub(crate) struct ContactSolver {
    velocity_constraints: Vec<VelocityConstraint>,
    position_constraints: Vec<PositionConstraint>,
}

impl ContactSolver {
    /// Build constraints from the island's contacts and initialize masses,
    /// anchors, and restitution bias from the current body state.
    pub fn new(
        defs: &[ContactSolverDef],
        bodies: &[BodyConstraint],
        conf: &StepConf,
        warm_start_scale: f64,
    ) -> Self {
        let mut solver = Self {
            velocity_constraints: Vec::with_capacity(defs.len()),
            position_constraints: Vec::with_capacity(defs.len()),
        };

        for def in defs {
            let manifold = &def.manifold;
            debug_assert!(manifold.point_count() > 0);

            let mut pc = PositionConstraint {
                local_points: [Vec2::zero(); MAX_MANIFOLD_POINTS],
                count: manifold.point_count(),
                local_normal: manifold.local_normal,
                local_point: manifold.local_point,
                ty: manifold.ty,
                index_a: def.index_a,
                index_b: def.index_b,
                radius_a: def.radius_a,
                radius_b: def.radius_b,
            };
            for (i, p) in manifold.points().iter().enumerate() {
                pc.local_points[i] = p.local_point;
            }

            let body_a = &bodies[def.index_a];
            let body_b = &bodies[def.index_b];
            let mut vc = VelocityConstraint {
                points: [VelocityConstraintPoint::default(); MAX_MANIFOLD_POINTS],
                count: manifold.point_count(),
                normal: UnitVec2::ZERO,
                normal_mass: Mat22::default(),
                k: Mat22::default(),
                index_a: def.index_a,
                index_b: def.index_b,
                inv_mass_a: body_a.inv_mass,
                inv_mass_b: body_b.inv_mass,
                inv_i_a: body_a.inv_inertia,
                inv_i_b: body_b.inv_inertia,
                friction: def.friction,
                restitution: def.restitution,
                tangent_speed: def.tangent_speed,
                contact_key: def.contact_key,
            };
            for (i, p) in manifold.points().iter().enumerate() {
                vc.points[i].normal_impulse = warm_start_scale * p.normal_impulse;
                vc.points[i].tangent_impulse = warm_start_scale * p.tangent_impulse;
            }

            solver.initialize_constraint(&mut vc, &pc, bodies, conf);
            solver.velocity_constraints.push(vc);
            solver.position_constraints.push(pc);
        }

        solver
    }

    fn initialize_constraint(
        &self,
        vc: &mut VelocityConstraint,
        pc: &PositionConstraint,
        bodies: &[BodyConstraint],
        conf: &StepConf,
    ) {
        let body_a = &bodies[vc.index_a];
        let body_b = &bodies[vc.index_b];
        let xf_a = body_a.transform();
        let xf_b = body_b.transform();

        let manifold = position_constraint_manifold(pc);
        let world = crate::collision::WorldManifold::new(
            &manifold,
            xf_a,
            pc.radius_a,
            xf_b,
            pc.radius_b,
        );
        vc.normal = world.normal;
        let tangent = m::right_normal(*vc.normal);

        for i in 0..vc.count {
            let point = &mut vc.points[i];
            let (world_point, _) = world.points[i];
            point.r_a = world_point - body_a.position.linear;
            point.r_b = world_point - body_b.position.linear;

            let rn_a = m::cross(point.r_a, *vc.normal);
            let rn_b = m::cross(point.r_b, *vc.normal);
            let k_normal = vc.inv_mass_a
                + vc.inv_mass_b
                + vc.inv_i_a * rn_a * rn_a
                + vc.inv_i_b * rn_b * rn_b;
            point.normal_mass = if k_normal > 0.0 { 1.0 / k_normal } else { 0.0 };

            let rt_a = m::cross(point.r_a, tangent);
            let rt_b = m::cross(point.r_b, tangent);
            let k_tangent = vc.inv_mass_a
                + vc.inv_mass_b
                + vc.inv_i_a * rt_a * rt_a
                + vc.inv_i_b * rt_b * rt_b;
            point.tangent_mass = if k_tangent > 0.0 { 1.0 / k_tangent } else { 0.0 };

            // restitution bias from the approach speed
            let dv = body_b.velocity.point_velocity(point.r_b)
                - body_a.velocity.point_velocity(point.r_a);
            let v_rel = vc.normal.dot(dv);
            point.velocity_bias = if v_rel < -conf.velocity_threshold {
                -vc.restitution * v_rel
            } else {
                0.0
            };
        }

        // prepare the coupled 2x2 system when both points are independent
        // enough for it to be well conditioned
        if vc.count == 2 && conf.do_block_solve {
            let rn1_a = m::cross(vc.points[0].r_a, *vc.normal);
            let rn1_b = m::cross(vc.points[0].r_b, *vc.normal);
            let rn2_a = m::cross(vc.points[1].r_a, *vc.normal);
            let rn2_b = m::cross(vc.points[1].r_b, *vc.normal);

            let k11 = vc.inv_mass_a
                + vc.inv_mass_b
                + vc.inv_i_a * rn1_a * rn1_a
                + vc.inv_i_b * rn1_b * rn1_b;
            let k22 = vc.inv_mass_a
                + vc.inv_mass_b
                + vc.inv_i_a * rn2_a * rn2_a
                + vc.inv_i_b * rn2_b * rn2_b;
            let k12 = vc.inv_mass_a
                + vc.inv_mass_b
                + vc.inv_i_a * rn1_a * rn2_a
                + vc.inv_i_b * rn1_b * rn2_b;

            if k11 * k11 < MAX_CONDITION * (k11 * k22 - k12 * k12) {
                vc.k = Mat22::new(Vec2::new(k11, k12), Vec2::new(k12, k22));
                vc.normal_mass = vc.k.inverse();
            } else {
                // nearly redundant points; solve them one at a time
                vc.count = 1;
            }
        }
    }

    /// Apply the impulses carried over from the previous step.
    pub fn warm_start(&mut self, bodies: &mut [BodyConstraint]) {
        for vc in &self.velocity_constraints {
            let tangent = m::right_normal(*vc.normal);
            for point in &vc.points[..vc.count] {
                let impulse =
                    *vc.normal * point.normal_impulse + tangent * point.tangent_impulse;
                let body_a = &mut bodies[vc.index_a];
                body_a.velocity.linear -= impulse * vc.inv_mass_a;
                body_a.velocity.angular -= vc.inv_i_a * m::cross(point.r_a, impulse);
                let body_b = &mut bodies[vc.index_b];
                body_b.velocity.linear += impulse * vc.inv_mass_b;
                body_b.velocity.angular += vc.inv_i_b * m::cross(point.r_b, impulse);
            }
        }
    }

    /// One Gauss-Seidel pass over all velocity constraints: friction first,
    /// then the normal impulses. Returns the largest incremental impulse
    /// magnitude applied, for convergence checks.
    pub fn solve_velocity_constraints(&mut self, bodies: &mut [BodyConstraint]) -> f64 {
        let mut max_incremental = 0.0f64;

        for vc in &mut self.velocity_constraints {
            let (mut v_a, w_a_init) = {
                let b = &bodies[vc.index_a];
                (b.velocity.linear, b.velocity.angular)
            };
            let mut w_a = w_a_init;
            let (mut v_b, w_b_init) = {
                let b = &bodies[vc.index_b];
                (b.velocity.linear, b.velocity.angular)
            };
            let mut w_b = w_b_init;

            let normal = *vc.normal;
            let tangent = m::right_normal(normal);

            // friction, bounded by the Coulomb cone around the current
            // normal impulse
            for point in &mut vc.points[..vc.count] {
                let dv = (v_b + m::cross_sv(w_b, point.r_b))
                    - (v_a + m::cross_sv(w_a, point.r_a));
                let vt = dv.dot(tangent) - vc.tangent_speed;
                let lambda = point.tangent_mass * -vt;

                let max_friction = vc.friction * point.normal_impulse;
                let new_impulse =
                    (point.tangent_impulse + lambda).clamp(-max_friction, max_friction);
                let lambda = new_impulse - point.tangent_impulse;
                point.tangent_impulse = new_impulse;
                max_incremental = max_incremental.max(lambda.abs());

                let impulse = tangent * lambda;
                v_a -= impulse * vc.inv_mass_a;
                w_a -= vc.inv_i_a * m::cross(point.r_a, impulse);
                v_b += impulse * vc.inv_mass_b;
                w_b += vc.inv_i_b * m::cross(point.r_b, impulse);
            }

            if vc.count == 1 {
                let point = &mut vc.points[0];
                let dv = (v_b + m::cross_sv(w_b, point.r_b))
                    - (v_a + m::cross_sv(w_a, point.r_a));
                let vn = dv.dot(normal);
                let lambda = -point.normal_mass * (vn - point.velocity_bias);

                let new_impulse = (point.normal_impulse + lambda).max(0.0);
                let lambda = new_impulse - point.normal_impulse;
                point.normal_impulse = new_impulse;
                max_incremental = max_incremental.max(lambda.abs());

                let impulse = normal * lambda;
                v_a -= impulse * vc.inv_mass_a;
                w_a -= vc.inv_i_a * m::cross(point.r_a, impulse);
                v_b += impulse * vc.inv_mass_b;
                w_b += vc.inv_i_b * m::cross(point.r_b, impulse);
            } else {
                max_incremental = max_incremental.max(block_solve_normal(
                    vc, &mut v_a, &mut w_a, &mut v_b, &mut w_b,
                ));
            }

            let body_a = &mut bodies[vc.index_a];
            body_a.velocity = Velocity {
                linear: v_a,
                angular: w_a,
            };
            let body_b = &mut bodies[vc.index_b];
            body_b.velocity = Velocity {
                linear: v_b,
                angular: w_b,
            };
        }

        max_incremental
    }

    /// Hand the accumulated impulses back to the caller, per contact point,
    /// for persistence in the source manifolds.
    pub fn store_impulses(&self, mut store: impl FnMut(ContactKey, usize, f64, f64)) {
        for vc in &self.velocity_constraints {
            for (i, point) in vc.points[..vc.count].iter().enumerate() {
                store(vc.contact_key, i, point.normal_impulse, point.tangent_impulse);
            }
        }
    }

    /// One pass of positional correction. Returns the minimum separation
    /// seen, which the caller compares against the configured tolerance.
    pub fn solve_position_constraints(
        &self,
        bodies: &mut [BodyConstraint],
        resolution_rate: f64,
        linear_slop: f64,
        max_correction: f64,
    ) -> f64 {
        let mut min_separation = 0.0f64;

        for pc in &self.position_constraints {
            let (inv_mass_a, inv_i_a, inv_mass_b, inv_i_b) = {
                let a = &bodies[pc.index_a];
                let b = &bodies[pc.index_b];
                (a.inv_mass, a.inv_inertia, b.inv_mass, b.inv_inertia)
            };

            for i in 0..pc.count {
                let xf_a = bodies[pc.index_a].transform();
                let xf_b = bodies[pc.index_b].transform();
                let psm = position_solver_manifold(pc, &xf_a, &xf_b, i);
                min_separation = min_separation.min(psm.separation);

                let correction = (resolution_rate * (psm.separation + linear_slop))
                    .clamp(-max_correction, 0.0);

                let r_a = psm.point - bodies[pc.index_a].position.linear;
                let r_b = psm.point - bodies[pc.index_b].position.linear;

                let rn_a = m::cross(r_a, *psm.normal);
                let rn_b = m::cross(r_b, *psm.normal);
                let k = inv_mass_a + inv_mass_b + inv_i_a * rn_a * rn_a + inv_i_b * rn_b * rn_b;

                let impulse = if k > 0.0 { -correction / k } else { 0.0 };
                let p = *psm.normal * impulse;

                let body_a = &mut bodies[pc.index_a];
                body_a.position.linear -= p * inv_mass_a;
                body_a.position.angular -= inv_i_a * m::cross(r_a, p);
                let body_b = &mut bodies[pc.index_b];
                body_b.position.linear += p * inv_mass_b;
                body_b.position.angular += inv_i_b * m::cross(r_b, p);
            }
        }

        min_separation
    }
}

/// Solve the coupled normal impulses of a two-point constraint.
///
/// The four complementarity cases from the original solver, in order: both
/// impulses positive, only the first, only the second, neither. The first
/// case whose solution is feasible wins; if none is, the accumulated
/// impulses are left as the preceding per-point iterations set them.
fn block_solve_normal(
    vc: &mut VelocityConstraint,
    v_a: &mut Vec2,
    w_a: &mut f64,
    v_b: &mut Vec2,
    w_b: &mut f64,
) -> f64 {
    let normal = *vc.normal;

    let a = Vec2::new(vc.points[0].normal_impulse, vc.points[1].normal_impulse);
    debug_assert!(a.x >= 0.0 && a.y >= 0.0);

    let dv1 = (*v_b + m::cross_sv(*w_b, vc.points[0].r_b))
        - (*v_a + m::cross_sv(*w_a, vc.points[0].r_a));
    let dv2 = (*v_b + m::cross_sv(*w_b, vc.points[1].r_b))
        - (*v_a + m::cross_sv(*w_a, vc.points[1].r_a));
    let vn = Vec2::new(dv1.dot(normal), dv2.dot(normal));

    let b = Vec2::new(
        vn.x - vc.points[0].velocity_bias,
        vn.y - vc.points[1].velocity_bias,
    ) - vc.k.mul_vec(a);

    let apply = |vc: &mut VelocityConstraint,
                 x: Vec2,
                 v_a: &mut Vec2,
                 w_a: &mut f64,
                 v_b: &mut Vec2,
                 w_b: &mut f64| {
        let d = x - Vec2::new(vc.points[0].normal_impulse, vc.points[1].normal_impulse);
        let p1 = normal * d.x;
        let p2 = normal * d.y;
        *v_a -= (p1 + p2) * vc.inv_mass_a;
        *w_a -= vc.inv_i_a
            * (m::cross(vc.points[0].r_a, p1) + m::cross(vc.points[1].r_a, p2));
        *v_b += (p1 + p2) * vc.inv_mass_b;
        *w_b += vc.inv_i_b
            * (m::cross(vc.points[0].r_b, p1) + m::cross(vc.points[1].r_b, p2));
        vc.points[0].normal_impulse = x.x;
        vc.points[1].normal_impulse = x.y;
        d.x.abs().max(d.y.abs())
    };

    // case 1: both points stay in contact
    let x = -vc.normal_mass.mul_vec(b);
    if x.x >= 0.0 && x.y >= 0.0 {
        return apply(vc, x, v_a, w_a, v_b, w_b);
    }

    // case 2: point 1 in contact, point 2 separating
    let x = Vec2::new(-vc.points[0].normal_mass * b.x, 0.0);
    let vn2 = vc.k.ex.y * x.x + b.y;
    if x.x >= 0.0 && vn2 >= 0.0 {
        return apply(vc, x, v_a, w_a, v_b, w_b);
    }

    // case 3: point 2 in contact, point 1 separating
    let x = Vec2::new(0.0, -vc.points[1].normal_mass * b.y);
    let vn1 = vc.k.ey.x * x.y + b.x;
    if x.y >= 0.0 && vn1 >= 0.0 {
        return apply(vc, x, v_a, w_a, v_b, w_b);
    }

    // case 4: both separating
    if b.x >= 0.0 && b.y >= 0.0 {
        return apply(vc, Vec2::zero(), v_a, w_a, v_b, w_b);
    }

    0.0
}

/// Rebuild a manifold value from a position constraint for world-manifold
/// evaluation.
fn position_constraint_manifold(pc: &PositionConstraint) -> Manifold {
    let mut manifold = Manifold::from_frame(pc.ty, pc.local_normal, pc.local_point);
    for i in 0..pc.count {
        manifold.push_raw(pc.local_points[i]);
    }
    manifold
}

struct PositionSolverManifold {
    normal: UnitVec2,
    point: Vec2,
    separation: f64,
}

/// World normal, point and separation of one constraint point at the
/// current (partially corrected) positions.
fn position_solver_manifold(
    pc: &PositionConstraint,
    xf_a: &Transform,
    xf_b: &Transform,
    index: usize,
) -> PositionSolverManifold {
    debug_assert!(pc.count > 0);
    match pc.ty {
        ManifoldType::Circles => {
            let point_a = xf_a.apply(pc.local_point);
            let point_b = xf_b.apply(pc.local_points[0]);
            let normal = UnitVec2::try_normalize(point_b - point_a)
                .map(|(u, _)| u)
                .unwrap_or(UnitVec2::X);
            PositionSolverManifold {
                normal,
                point: (point_a + point_b) * 0.5,
                separation: (point_b - point_a).dot(*normal) - pc.radius_a - pc.radius_b,
            }
        }
        ManifoldType::FaceA => {
            let normal = xf_a.q.rotate_unit(pc.local_normal);
            let plane_point = xf_a.apply(pc.local_point);
            let clip_point = xf_b.apply(pc.local_points[index]);
            PositionSolverManifold {
                normal,
                point: clip_point,
                separation: (clip_point - plane_point).dot(*normal) - pc.radius_a - pc.radius_b,
            }
        }
        ManifoldType::FaceB => {
            let normal = xf_b.q.rotate_unit(pc.local_normal);
            let plane_point = xf_b.apply(pc.local_point);
            let clip_point = xf_a.apply(pc.local_points[index]);
            PositionSolverManifold {
                // point from A to B
                normal: -normal,
                point: clip_point,
                separation: (clip_point - plane_point).dot(*normal) - pc.radius_a - pc.radius_b,
            }
        }
        ManifoldType::Unset => unreachable!("position constraint without a manifold"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collision::{collide_shapes, Polygon, Shape};
    use thunderdome::Arena;

    fn island_pair(separation_x: f64) -> (Vec<BodyConstraint>, Vec<ContactSolverDef>, f64) {
        let shape = Shape::Polygon(Polygon::new_box(0.5, 0.5));
        let xf_a = Transform::IDENTITY;
        let xf_b = Transform::new(Vec2::new(separation_x, 0.0), 0.0);
        let manifold = collide_shapes(
            &shape.child_proxy(0),
            xf_a,
            &shape.child_proxy(0),
            xf_b,
        );
        assert!(manifold.is_touching());

        let bodies = vec![
            BodyConstraint {
                position: Position {
                    linear: Vec2::zero(),
                    angular: 0.0,
                },
                velocity: Velocity {
                    linear: Vec2::new(1.0, 0.0),
                    angular: 0.0,
                },
                inv_mass: 1.0,
                inv_inertia: 1.0,
                local_center: Vec2::zero(),
            },
            BodyConstraint {
                position: Position {
                    linear: Vec2::new(separation_x, 0.0),
                    angular: 0.0,
                },
                velocity: Velocity::default(),
                inv_mass: 1.0,
                inv_inertia: 1.0,
                local_center: Vec2::zero(),
            },
        ];

        let mut arena = Arena::new();
        let key = ContactKey(arena.insert(()));
        let radius = shape.vertex_radius();
        let defs = vec![ContactSolverDef {
            contact_key: key,
            manifold,
            index_a: 0,
            index_b: 1,
            friction: 0.5,
            restitution: 0.0,
            tangent_speed: 0.0,
            radius_a: radius,
            radius_b: radius,
        }];
        (bodies, defs, radius)
    }

    #[test]
    fn velocity_iterations_stop_approach() {
        let (mut bodies, defs, _) = island_pair(0.99);
        let conf = StepConf::default();
        let mut solver = ContactSolver::new(&defs, &bodies, &conf, 0.0);

        for _ in 0..conf.reg_velocity_iterations {
            solver.solve_velocity_constraints(&mut bodies);
        }
        // equal masses, inelastic: both end up at the common velocity
        let rel = bodies[1].velocity.linear.x - bodies[0].velocity.linear.x;
        assert!(rel.abs() < 1e-6, "relative normal velocity {}", rel);
        assert!((bodies[0].velocity.linear.x - 0.5).abs() < 1e-6);
    }

    #[test]
    fn impulses_accumulate_and_convergence_reports_zero() {
        let (mut bodies, defs, _) = island_pair(0.99);
        let conf = StepConf::default();
        let mut solver = ContactSolver::new(&defs, &bodies, &conf, 0.0);

        let first = solver.solve_velocity_constraints(&mut bodies);
        assert!(first > 0.0);
        for _ in 0..20 {
            solver.solve_velocity_constraints(&mut bodies);
        }
        let settled = solver.solve_velocity_constraints(&mut bodies);
        assert!(settled < 1e-9, "still moving impulses: {}", settled);

        let mut total = 0.0;
        solver.store_impulses(|_, _, normal, _| total += normal);
        assert!(total > 0.0);
    }

    #[test]
    fn position_pass_reduces_penetration() {
        // overlapping by 0.2
        let (mut bodies, defs, _) = island_pair(0.8);
        let conf = StepConf::default();
        let solver = ContactSolver::new(&defs, &bodies, &conf, 0.0);

        let before = solver.solve_position_constraints(
            &mut bodies,
            conf.reg_resolution_rate,
            conf.linear_slop,
            conf.max_linear_correction,
        );
        assert!(before < -0.1);

        for _ in 0..50 {
            solver.solve_position_constraints(
                &mut bodies,
                conf.reg_resolution_rate,
                conf.linear_slop,
                conf.max_linear_correction,
            );
        }
        let gap = bodies[1].position.linear.x - bodies[0].position.linear.x;
        assert!(gap > 0.95, "bodies still overlapping: gap {}", gap);
    }

    #[test]
    fn warm_start_applies_stored_impulses() {
        let (mut bodies, mut defs, _) = island_pair(0.99);
        for p in defs[0].manifold.points_mut() {
            p.normal_impulse = 1.0;
        }
        let conf = StepConf::default();
        let mut solver = ContactSolver::new(&defs, &bodies, &conf, 1.0);
        let v_before = bodies[1].velocity.linear.x;
        solver.warm_start(&mut bodies);
        // impulses push B along +x
        assert!(bodies[1].velocity.linear.x > v_before);
    }

    #[test]
    fn restitution_bias_bounces() {
        let (mut bodies, mut defs, _) = island_pair(0.99);
        defs[0].restitution = 1.0;
        bodies[0].velocity.linear = Vec2::new(5.0, 0.0);
        let conf = StepConf::default();
        let mut solver = ContactSolver::new(&defs, &bodies, &conf, 0.0);
        for _ in 0..20 {
            solver.solve_velocity_constraints(&mut bodies);
        }
        // perfectly elastic, equal masses: velocities swap
        let rel_out = bodies[1].velocity.linear.x - bodies[0].velocity.linear.x;
        assert!((rel_out - 5.0).abs() < 0.1, "relative velocity {}", rel_out);
    }
}
