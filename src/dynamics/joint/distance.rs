//! A distance joint keeps two anchor points a fixed length apart, or acts
//! as a damped spring when a frequency is set.

use super::JointCtx;
use crate::math::{self as m, Rotation, UnitVec2, Vec2};
use crate::settings::LINEAR_SLOP;

const MAX_LINEAR_CORRECTION: f64 = 0.2;

#[derive(Clone, Debug)]
pub struct DistanceJoint {
    local_anchor_a: Vec2,
    local_anchor_b: Vec2,
    rest_length: f64,
    /// Oscillation frequency in hertz; zero makes the joint rigid.
    frequency: f64,
    damping_ratio: f64,

    impulse: f64,

    // per-step solver data
    u: UnitVec2,
    r_a: Vec2,
    r_b: Vec2,
    mass: f64,
    bias: f64,
    gamma: f64,
}

impl DistanceJoint {
    pub fn new(local_anchor_a: Vec2, local_anchor_b: Vec2, rest_length: f64) -> Self {
        Self {
            local_anchor_a,
            local_anchor_b,
            rest_length,
            frequency: 0.0,
            damping_ratio: 0.0,
            impulse: 0.0,
            u: UnitVec2::ZERO,
            r_a: Vec2::zero(),
            r_b: Vec2::zero(),
            mass: 0.0,
            bias: 0.0,
            gamma: 0.0,
        }
    }

    /// Soften the joint into a damped harmonic oscillator.
    pub fn with_spring(mut self, frequency_hz: f64, damping_ratio: f64) -> Self {
        self.frequency = frequency_hz;
        self.damping_ratio = damping_ratio;
        self
    }

    pub fn rest_length(&self) -> f64 {
        self.rest_length
    }

    pub fn set_rest_length(&mut self, length: f64) {
        self.rest_length = length;
    }

    pub(crate) fn init_velocity_constraints(&mut self, ctx: &mut JointCtx<'_>) {
        let (inv_m_a, inv_i_a, inv_m_b, inv_i_b) = ctx.inv_masses();
        let (pos_a, pos_b) = ctx.positions();
        let q_a = Rotation::from_angle(pos_a.angular);
        let q_b = Rotation::from_angle(pos_b.angular);

        self.r_a = q_a.rotate(self.local_anchor_a - ctx.body_a().local_center);
        self.r_b = q_b.rotate(self.local_anchor_b - ctx.body_b().local_center);
        let d = (pos_b.linear + self.r_b) - (pos_a.linear + self.r_a);

        let (u, length) = match UnitVec2::try_normalize(d) {
            Some(pair) => pair,
            None => (UnitVec2::ZERO, 0.0),
        };
        self.u = u;

        let cr_a = m::cross(self.r_a, *self.u);
        let cr_b = m::cross(self.r_b, *self.u);
        let inv_mass = inv_m_a + inv_m_b + inv_i_a * cr_a * cr_a + inv_i_b * cr_b * cr_b;
        self.mass = if inv_mass != 0.0 { 1.0 / inv_mass } else { 0.0 };

        if self.frequency > 0.0 {
            let c = length - self.rest_length;
            let omega = std::f64::consts::TAU * self.frequency;
            let damping = 2.0 * self.mass * self.damping_ratio * omega;
            let stiffness = self.mass * omega * omega;

            let h = ctx.dt;
            self.gamma = h * (damping + h * stiffness);
            self.gamma = if self.gamma != 0.0 { 1.0 / self.gamma } else { 0.0 };
            self.bias = c * h * stiffness * self.gamma;

            let inv_mass = inv_mass + self.gamma;
            self.mass = if inv_mass != 0.0 { 1.0 / inv_mass } else { 0.0 };
        } else {
            self.gamma = 0.0;
            self.bias = 0.0;
        }

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
        let c_dot = self.u.dot(vp_b - vp_a);

        let impulse = -self.mass * (c_dot + self.bias + self.gamma * self.impulse);
        self.impulse += impulse;

        let p = *self.u * impulse;
        v_a.linear -= p * inv_m_a;
        v_a.angular -= inv_i_a * m::cross(self.r_a, p);
        v_b.linear += p * inv_m_b;
        v_b.angular += inv_i_b * m::cross(self.r_b, p);

        ctx.set_velocities(v_a, v_b);
        impulse.abs() <= f64::EPSILON
    }

    pub(crate) fn solve_position_constraints(&mut self, ctx: &mut JointCtx<'_>) -> bool {
        if self.frequency > 0.0 {
            // the spring handles its own length error
            return true;
        }
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
        let c = (length - self.rest_length).clamp(-MAX_LINEAR_CORRECTION, MAX_LINEAR_CORRECTION);

        let impulse = -self.mass * c;
        let p = *u * impulse;

        pos_a.linear -= p * inv_m_a;
        pos_a.angular -= inv_i_a * m::cross(r_a, p);
        pos_b.linear += p * inv_m_b;
        pos_b.angular += inv_i_b * m::cross(r_b, p);

        ctx.set_positions(pos_a, pos_b);
        c.abs() < LINEAR_SLOP
    }

    pub fn reaction_force(&self, inv_dt: f64) -> Vec2 {
        *self.u * (self.impulse * inv_dt)
    }

    pub fn reaction_torque(&self, _inv_dt: f64) -> f64 {
        0.0
    }
}
