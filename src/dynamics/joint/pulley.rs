//! A pulley joint suspends two bodies from fixed ground anchors so that
//! `length_a + ratio * length_b` stays constant.

use super::JointCtx;
use crate::math::{self as m, Rotation, UnitVec2, Vec2};
use crate::settings::LINEAR_SLOP;

#[derive(Clone, Debug)]
pub struct PulleyJoint {
    ground_anchor_a: Vec2,
    ground_anchor_b: Vec2,
    local_anchor_a: Vec2,
    local_anchor_b: Vec2,
    ratio: f64,
    /// `length_a + ratio * length_b` at creation time.
    constant: f64,

    impulse: f64,

    // per-step solver data
    u_a: UnitVec2,
    u_b: UnitVec2,
    r_a: Vec2,
    r_b: Vec2,
    mass: f64,
}

impl PulleyJoint {
    /// `lengths` are the initial rope lengths from each body anchor to its
    /// ground anchor.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        ground_anchor_a: Vec2,
        ground_anchor_b: Vec2,
        local_anchor_a: Vec2,
        local_anchor_b: Vec2,
        length_a: f64,
        length_b: f64,
        ratio: f64,
    ) -> Self {
        debug_assert!(ratio > f64::EPSILON);
        Self {
            ground_anchor_a,
            ground_anchor_b,
            local_anchor_a,
            local_anchor_b,
            ratio,
            constant: length_a + ratio * length_b,
            impulse: 0.0,
            u_a: UnitVec2::ZERO,
            u_b: UnitVec2::ZERO,
            r_a: Vec2::zero(),
            r_b: Vec2::zero(),
            mass: 0.0,
        }
    }

    pub fn ratio(&self) -> f64 {
        self.ratio
    }

    pub(crate) fn shift_origin(&mut self, new_origin: Vec2) {
        self.ground_anchor_a -= new_origin;
        self.ground_anchor_b -= new_origin;
    }

    pub(crate) fn init_velocity_constraints(&mut self, ctx: &mut JointCtx<'_>) {
        let (inv_m_a, inv_i_a, inv_m_b, inv_i_b) = ctx.inv_masses();
        let (pos_a, pos_b) = ctx.positions();
        let q_a = Rotation::from_angle(pos_a.angular);
        let q_b = Rotation::from_angle(pos_b.angular);

        self.r_a = q_a.rotate(self.local_anchor_a - ctx.body_a().local_center);
        self.r_b = q_b.rotate(self.local_anchor_b - ctx.body_b().local_center);

        self.u_a = UnitVec2::normalize_or_zero(pos_a.linear + self.r_a - self.ground_anchor_a);
        self.u_b = UnitVec2::normalize_or_zero(pos_b.linear + self.r_b - self.ground_anchor_b);

        let cr_a = m::cross(self.r_a, *self.u_a);
        let cr_b = m::cross(self.r_b, *self.u_b);

        let mass_a = inv_m_a + inv_i_a * cr_a * cr_a;
        let mass_b = inv_m_b + inv_i_b * cr_b * cr_b;
        let inv_mass = mass_a + self.ratio * self.ratio * mass_b;
        self.mass = if inv_mass > 0.0 { 1.0 / inv_mass } else { 0.0 };

        if ctx.warm_start {
            let p_a = *self.u_a * -self.impulse;
            let p_b = *self.u_b * (-self.ratio * self.impulse);

            let (mut v_a, mut v_b) = ctx.velocities();
            v_a.linear += p_a * inv_m_a;
            v_a.angular += inv_i_a * m::cross(self.r_a, p_a);
            v_b.linear += p_b * inv_m_b;
            v_b.angular += inv_i_b * m::cross(self.r_b, p_b);
            ctx.set_velocities(v_a, v_b);
        } else {
            self.impulse = 0.0;
        }
    }

    pub(crate) fn solve_velocity_constraints(&mut self, ctx: &mut JointCtx<'_>) -> bool {
        let (inv_m_a, inv_i_a, inv_m_b, inv_i_b) = ctx.inv_masses();
        let (mut v_a, mut v_b) = ctx.velocities();

        let vp_a = v_a.linear + m::cross_sv(v_a.angular, self.r_a);
        let vp_b = v_b.linear + m::cross_sv(v_b.angular, self.r_b);

        let c_dot = -self.u_a.dot(vp_a) - self.ratio * self.u_b.dot(vp_b);
        let impulse = -self.mass * c_dot;
        self.impulse += impulse;

        let p_a = *self.u_a * -impulse;
        let p_b = *self.u_b * (-self.ratio * impulse);
        v_a.linear += p_a * inv_m_a;
        v_a.angular += inv_i_a * m::cross(self.r_a, p_a);
        v_b.linear += p_b * inv_m_b;
        v_b.angular += inv_i_b * m::cross(self.r_b, p_b);

        ctx.set_velocities(v_a, v_b);
        impulse.abs() <= f64::EPSILON
    }

    pub(crate) fn solve_position_constraints(&mut self, ctx: &mut JointCtx<'_>) -> bool {
        let (inv_m_a, inv_i_a, inv_m_b, inv_i_b) = ctx.inv_masses();
        let (mut pos_a, mut pos_b) = ctx.positions();
        let q_a = Rotation::from_angle(pos_a.angular);
        let q_b = Rotation::from_angle(pos_b.angular);

        let r_a = q_a.rotate(self.local_anchor_a - ctx.body_a().local_center);
        let r_b = q_b.rotate(self.local_anchor_b - ctx.body_b().local_center);

        let p_anchor_a = pos_a.linear + r_a;
        let p_anchor_b = pos_b.linear + r_b;

        let (u_a, length_a) = UnitVec2::try_normalize(p_anchor_a - self.ground_anchor_a)
            .unwrap_or((UnitVec2::ZERO, 0.0));
        let (u_b, length_b) = UnitVec2::try_normalize(p_anchor_b - self.ground_anchor_b)
            .unwrap_or((UnitVec2::ZERO, 0.0));

        let cr_a = m::cross(r_a, *u_a);
        let cr_b = m::cross(r_b, *u_b);
        let mass_a = inv_m_a + inv_i_a * cr_a * cr_a;
        let mass_b = inv_m_b + inv_i_b * cr_b * cr_b;
        let inv_mass = mass_a + self.ratio * self.ratio * mass_b;
        let mass = if inv_mass > 0.0 { 1.0 / inv_mass } else { 0.0 };

        let c = self.constant - length_a - self.ratio * length_b;
        let impulse = -mass * c;

        let p_a = *u_a * -impulse;
        let p_b = *u_b * (-self.ratio * impulse);
        pos_a.linear += p_a * inv_m_a;
        pos_a.angular += inv_i_a * m::cross(r_a, p_a);
        pos_b.linear += p_b * inv_m_b;
        pos_b.angular += inv_i_b * m::cross(r_b, p_b);

        ctx.set_positions(pos_a, pos_b);
        c.abs() < LINEAR_SLOP
    }

    pub fn reaction_force(&self, inv_dt: f64) -> Vec2 {
        *self.u_b * (self.impulse * inv_dt)
    }

    pub fn reaction_torque(&self, _inv_dt: f64) -> f64 {
        0.0
    }
}
