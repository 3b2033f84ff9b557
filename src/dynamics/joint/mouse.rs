//! A mouse joint drags an anchor point on body B toward a world-space
//! target through a critically-dampable spring. Body A is unused beyond
//! anchoring the joint in the graph.

use super::JointCtx;
use crate::math::{self as m, Mat22, Rotation, Vec2};

#[derive(Clone, Debug)]
pub struct MouseJoint {
    local_anchor_b: Vec2,
    target: Vec2,
    max_force: f64,
    frequency: f64,
    damping_ratio: f64,

    impulse: Vec2,

    // per-step solver data
    r_b: Vec2,
    mass: Mat22,
    c: Vec2,
    beta: f64,
    gamma: f64,
}

impl MouseJoint {
    pub fn new(local_anchor_b: Vec2, target: Vec2, max_force: f64) -> Self {
        Self {
            local_anchor_b,
            target,
            max_force,
            frequency: 5.0,
            damping_ratio: 0.7,
            impulse: Vec2::zero(),
            r_b: Vec2::zero(),
            mass: Mat22::default(),
            c: Vec2::zero(),
            beta: 0.0,
            gamma: 0.0,
        }
    }

    pub fn with_spring(mut self, frequency_hz: f64, damping_ratio: f64) -> Self {
        self.frequency = frequency_hz;
        self.damping_ratio = damping_ratio;
        self
    }

    pub fn target(&self) -> Vec2 {
        self.target
    }

    /// Move the drag target. The body must be woken by the caller.
    pub fn set_target(&mut self, target: Vec2) {
        self.target = target;
    }

    pub(crate) fn shift_origin(&mut self, new_origin: Vec2) {
        self.target -= new_origin;
    }

    pub(crate) fn init_velocity_constraints(&mut self, ctx: &mut JointCtx<'_>) {
        let (_, _, inv_m_b, inv_i_b) = ctx.inv_masses();
        let (_, pos_b) = ctx.positions();
        let q_b = Rotation::from_angle(pos_b.angular);

        let mass = if inv_m_b > 0.0 { 1.0 / inv_m_b } else { 0.0 };

        let omega = std::f64::consts::TAU * self.frequency;
        let damping = 2.0 * mass * self.damping_ratio * omega;
        let stiffness = mass * omega * omega;

        let h = ctx.dt;
        self.gamma = h * (damping + h * stiffness);
        if self.gamma != 0.0 {
            self.gamma = 1.0 / self.gamma;
        }
        self.beta = h * stiffness * self.gamma;

        self.r_b = q_b.rotate(self.local_anchor_b - ctx.body_b().local_center);

        let k11 = inv_m_b + inv_i_b * self.r_b.y * self.r_b.y + self.gamma;
        let k12 = -inv_i_b * self.r_b.x * self.r_b.y;
        let k22 = inv_m_b + inv_i_b * self.r_b.x * self.r_b.x + self.gamma;
        self.mass = Mat22::new(Vec2::new(k11, k12), Vec2::new(k12, k22)).inverse();

        self.c = (pos_b.linear + self.r_b - self.target) * self.beta;

        if ctx.warm_start {
            let (v_a, mut v_b) = ctx.velocities();
            v_b.linear += self.impulse * inv_m_b;
            v_b.angular += inv_i_b * m::cross(self.r_b, self.impulse);
            ctx.set_velocities(v_a, v_b);
        } else {
            self.impulse = Vec2::zero();
        }
    }

    pub(crate) fn solve_velocity_constraints(&mut self, ctx: &mut JointCtx<'_>) -> bool {
        let (_, _, inv_m_b, inv_i_b) = ctx.inv_masses();
        let (v_a, mut v_b) = ctx.velocities();

        let c_dot = v_b.linear + m::cross_sv(v_b.angular, self.r_b);
        let mut impulse = self.mass.mul_vec(-(c_dot + self.c + self.impulse * self.gamma));

        // cap the total force the mouse can exert
        let old = self.impulse;
        self.impulse += impulse;
        let max_impulse = ctx.dt * self.max_force;
        if self.impulse.mag_sq() > max_impulse * max_impulse {
            self.impulse *= max_impulse / self.impulse.mag();
        }
        impulse = self.impulse - old;

        v_b.linear += impulse * inv_m_b;
        v_b.angular += inv_i_b * m::cross(self.r_b, impulse);

        ctx.set_velocities(v_a, v_b);
        impulse.mag_sq() <= f64::EPSILON * f64::EPSILON
    }

    pub(crate) fn solve_position_constraints(&mut self, _ctx: &mut JointCtx<'_>) -> bool {
        // the spring handles position error
        true
    }

    pub fn reaction_force(&self, inv_dt: f64) -> Vec2 {
        self.impulse * inv_dt
    }

    pub fn reaction_torque(&self, _inv_dt: f64) -> f64 {
        0.0
    }
}
