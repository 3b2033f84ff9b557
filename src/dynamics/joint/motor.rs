//! A motor joint steers body B toward a target offset and angle relative
//! to body A, with bounded force and torque.

use super::JointCtx;
use crate::math::{self as m, Mat22, Rotation, Vec2};

#[derive(Clone, Debug)]
pub struct MotorJoint {
    /// Target position of body B's origin in body A's frame.
    linear_offset: Vec2,
    /// Target relative angle.
    angular_offset: f64,
    max_force: f64,
    max_torque: f64,
    /// Fraction of position error fed back per step, in `[0, 1]`.
    correction_factor: f64,

    linear_impulse: Vec2,
    angular_impulse: f64,

    // per-step solver data
    r_a: Vec2,
    r_b: Vec2,
    linear_error: Vec2,
    angular_error: f64,
    linear_mass: Mat22,
    angular_mass: f64,
}

impl MotorJoint {
    pub fn new(linear_offset: Vec2, angular_offset: f64, max_force: f64, max_torque: f64) -> Self {
        Self {
            linear_offset,
            angular_offset,
            max_force,
            max_torque,
            correction_factor: 0.3,
            linear_impulse: Vec2::zero(),
            angular_impulse: 0.0,
            r_a: Vec2::zero(),
            r_b: Vec2::zero(),
            linear_error: Vec2::zero(),
            angular_error: 0.0,
            linear_mass: Mat22::default(),
            angular_mass: 0.0,
        }
    }

    pub fn with_correction_factor(mut self, factor: f64) -> Self {
        self.correction_factor = factor.clamp(0.0, 1.0);
        self
    }

    pub fn set_linear_offset(&mut self, offset: Vec2) {
        self.linear_offset = offset;
    }

    pub fn set_angular_offset(&mut self, offset: f64) {
        self.angular_offset = offset;
    }

    pub(crate) fn init_velocity_constraints(&mut self, ctx: &mut JointCtx<'_>) {
        let (inv_m_a, inv_i_a, inv_m_b, inv_i_b) = ctx.inv_masses();
        let (pos_a, pos_b) = ctx.positions();
        let q_a = Rotation::from_angle(pos_a.angular);
        let q_b = Rotation::from_angle(pos_b.angular);

        self.r_a = q_a.rotate(self.linear_offset - ctx.body_a().local_center);
        self.r_b = q_b.rotate(-ctx.body_b().local_center);

        let k11 = inv_m_a
            + inv_m_b
            + inv_i_a * self.r_a.y * self.r_a.y
            + inv_i_b * self.r_b.y * self.r_b.y;
        let k12 = -inv_i_a * self.r_a.x * self.r_a.y - inv_i_b * self.r_b.x * self.r_b.y;
        let k22 = inv_m_a
            + inv_m_b
            + inv_i_a * self.r_a.x * self.r_a.x
            + inv_i_b * self.r_b.x * self.r_b.x;
        self.linear_mass = Mat22::new(Vec2::new(k11, k12), Vec2::new(k12, k22)).inverse();

        let inv_angular = inv_i_a + inv_i_b;
        self.angular_mass = if inv_angular > 0.0 {
            1.0 / inv_angular
        } else {
            0.0
        };

        self.linear_error = (pos_b.linear + self.r_b) - (pos_a.linear + self.r_a);
        self.angular_error = pos_b.angular - pos_a.angular - self.angular_offset;

        if ctx.warm_start {
            let (mut v_a, mut v_b) = ctx.velocities();
            v_a.linear -= self.linear_impulse * inv_m_a;
            v_a.angular -= inv_i_a * (m::cross(self.r_a, self.linear_impulse) + self.angular_impulse);
            v_b.linear += self.linear_impulse * inv_m_b;
            v_b.angular += inv_i_b * (m::cross(self.r_b, self.linear_impulse) + self.angular_impulse);
            ctx.set_velocities(v_a, v_b);
        } else {
            self.linear_impulse = Vec2::zero();
            self.angular_impulse = 0.0;
        }
    }

    pub(crate) fn solve_velocity_constraints(&mut self, ctx: &mut JointCtx<'_>) -> bool {
        let (inv_m_a, inv_i_a, inv_m_b, inv_i_b) = ctx.inv_masses();
        let (mut v_a, mut v_b) = ctx.velocities();
        let h = ctx.dt;
        let inv_h = ctx.inv_dt;
        let mut max_inc = 0.0f64;

        // angular drive
        {
            let c_dot = v_b.angular - v_a.angular
                + inv_h * self.correction_factor * self.angular_error;
            let mut impulse = -self.angular_mass * c_dot;

            let old = self.angular_impulse;
            let max_impulse = h * self.max_torque;
            self.angular_impulse = (old + impulse).clamp(-max_impulse, max_impulse);
            impulse = self.angular_impulse - old;
            max_inc = max_inc.max(impulse.abs());

            v_a.angular -= inv_i_a * impulse;
            v_b.angular += inv_i_b * impulse;
        }

        // linear drive
        {
            let c_dot = (v_b.linear + m::cross_sv(v_b.angular, self.r_b))
                - (v_a.linear + m::cross_sv(v_a.angular, self.r_a))
                + self.linear_error * (inv_h * self.correction_factor);
            let mut impulse = -self.linear_mass.mul_vec(c_dot);

            let old = self.linear_impulse;
            self.linear_impulse += impulse;
            let max_impulse = h * self.max_force;
            if self.linear_impulse.mag_sq() > max_impulse * max_impulse {
                self.linear_impulse *= max_impulse / self.linear_impulse.mag();
            }
            impulse = self.linear_impulse - old;
            max_inc = max_inc.max(impulse.mag());

            v_a.linear -= impulse * inv_m_a;
            v_a.angular -= inv_i_a * m::cross(self.r_a, impulse);
            v_b.linear += impulse * inv_m_b;
            v_b.angular += inv_i_b * m::cross(self.r_b, impulse);
        }

        ctx.set_velocities(v_a, v_b);
        max_inc <= f64::EPSILON
    }

    pub(crate) fn solve_position_constraints(&mut self, _ctx: &mut JointCtx<'_>) -> bool {
        // errors are driven down by the velocity bias
        true
    }

    pub fn reaction_force(&self, inv_dt: f64) -> Vec2 {
        self.linear_impulse * inv_dt
    }

    pub fn reaction_torque(&self, inv_dt: f64) -> f64 {
        self.angular_impulse * inv_dt
    }
}
