//! A rope joint caps the distance between two anchors. It does nothing
//! while the rope is slack.

use super::JointCtx;
use crate::math::{self as m, Rotation, UnitVec2, Vec2};
use crate::settings::LINEAR_SLOP;

const MAX_LINEAR_CORRECTION: f64 = 0.2;

#[derive(Clone, Debug)]
pub struct RopeJoint {
    local_anchor_a: Vec2,
    local_anchor_b: Vec2,
    max_length: f64,

    impulse: f64,

    // per-step solver data
    u: UnitVec2,
    r_a: Vec2,
    r_b: Vec2,
    mass: f64,
    length: f64,
}

impl RopeJoint {
    pub fn new(local_anchor_a: Vec2, local_anchor_b: Vec2, max_length: f64) -> Self {
        Self {
            local_anchor_a,
            local_anchor_b,
            max_length,
            impulse: 0.0,
            u: UnitVec2::ZERO,
            r_a: Vec2::zero(),
            r_b: Vec2::zero(),
            mass: 0.0,
            length: 0.0,
        }
    }

    pub fn max_length(&self) -> f64 {
        self.max_length
    }

    pub fn set_max_length(&mut self, length: f64) {
        self.max_length = length;
    }

    /// Whether the rope was taut at the start of the step.
    pub fn is_taut(&self) -> bool {
        self.length >= self.max_length
    }

    pub(crate) fn init_velocity_constraints(&mut self, ctx: &mut JointCtx<'_>) {
        let (inv_m_a, inv_i_a, inv_m_b, inv_i_b) = ctx.inv_masses();
        let (pos_a, pos_b) = ctx.positions();
        let q_a = Rotation::from_angle(pos_a.angular);
        let q_b = Rotation::from_angle(pos_b.angular);

        self.r_a = q_a.rotate(self.local_anchor_a - ctx.body_a().local_center);
        self.r_b = q_b.rotate(self.local_anchor_b - ctx.body_b().local_center);
        let d = (pos_b.linear + self.r_b) - (pos_a.linear + self.r_a);

        match UnitVec2::try_normalize(d) {
            Some((u, length)) => {
                self.u = u;
                self.length = length;
            }
            None => {
                self.u = UnitVec2::ZERO;
                self.length = 0.0;
                self.mass = 0.0;
                self.impulse = 0.0;
                return;
            }
        }

        let cr_a = m::cross(self.r_a, *self.u);
        let cr_b = m::cross(self.r_b, *self.u);
        let inv_mass = inv_m_a + inv_m_b + inv_i_a * cr_a * cr_a + inv_i_b * cr_b * cr_b;
        self.mass = if inv_mass != 0.0 { 1.0 / inv_mass } else { 0.0 };

        if ctx.warm_start {
            let p = *self.u * self.impulse;
            let (mut v_a, mut v_b) = ctx.velocities();
            v_a.linear -= p * inv_m_a;
            v_a.angular -= inv_i_a * m::cross(self.r_a, p);
            v_b.linear += p * inv_m_b;
            v_b.angular += inv_i_b * m::cross(self.r_b, p);
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
        let c = self.length - self.max_length;
        let mut c_dot = self.u.dot(vp_b - vp_a);
        // predictive: start resisting just before the rope goes taut
        if c < 0.0 {
            c_dot += ctx.inv_dt * c;
        }

        let mut impulse = -self.mass * c_dot;
        let old = self.impulse;
        // the rope can only pull
        self.impulse = (old + impulse).min(0.0);
        impulse = self.impulse - old;

        let p = *self.u * impulse;
        v_a.linear -= p * inv_m_a;
        v_a.angular -= inv_i_a * m::cross(self.r_a, p);
        v_b.linear += p * inv_m_b;
        v_b.angular += inv_i_b * m::cross(self.r_b, p);

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
        let d = (pos_b.linear + r_b) - (pos_a.linear + r_a);

        let (u, length) = match UnitVec2::try_normalize(d) {
            Some(pair) => pair,
            None => return true,
        };
        let c = (length - self.max_length).clamp(0.0, MAX_LINEAR_CORRECTION);

        let impulse = -self.mass * c;
        let p = *u * impulse;

        pos_a.linear -= p * inv_m_a;
        pos_a.angular -= inv_i_a * m::cross(r_a, p);
        pos_b.linear += p * inv_m_b;
        pos_b.angular += inv_i_b * m::cross(r_b, p);

        ctx.set_positions(pos_a, pos_b);
        length - self.max_length < LINEAR_SLOP
    }

    pub fn reaction_force(&self, inv_dt: f64) -> Vec2 {
        *self.u * (self.impulse * inv_dt)
    }

    pub fn reaction_torque(&self, _inv_dt: f64) -> f64 {
        0.0
    }
}
