//! A weld joint locks two bodies' relative position and angle. With a
//! frequency set, the angular lock softens into a damped spring.

use super::JointCtx;
use crate::math::{self as m, Mat33, Rotation, Vec2, Vec3};
use crate::settings::{ANGULAR_SLOP, LINEAR_SLOP};

#[derive(Clone, Debug)]
pub struct WeldJoint {
    local_anchor_a: Vec2,
    local_anchor_b: Vec2,
    reference_angle: f64,
    frequency: f64,
    damping_ratio: f64,

    impulse: Vec3,

    // per-step solver data
    r_a: Vec2,
    r_b: Vec2,
    mass: Mat33,
    bias: f64,
    gamma: f64,
}

impl WeldJoint {
    pub fn new(local_anchor_a: Vec2, local_anchor_b: Vec2, reference_angle: f64) -> Self {
        Self {
            local_anchor_a,
            local_anchor_b,
            reference_angle,
            frequency: 0.0,
            damping_ratio: 0.0,
            impulse: Vec3::zero(),
            r_a: Vec2::zero(),
            r_b: Vec2::zero(),
            mass: Mat33::default(),
            bias: 0.0,
            gamma: 0.0,
        }
    }

    /// Soften the angular lock into a damped spring.
    pub fn with_spring(mut self, frequency_hz: f64, damping_ratio: f64) -> Self {
        self.frequency = frequency_hz;
        self.damping_ratio = damping_ratio;
        self
    }

    pub(crate) fn init_velocity_constraints(&mut self, ctx: &mut JointCtx<'_>) {
        let (inv_m_a, inv_i_a, inv_m_b, inv_i_b) = ctx.inv_masses();
        let (pos_a, pos_b) = ctx.positions();
        let q_a = Rotation::from_angle(pos_a.angular);
        let q_b = Rotation::from_angle(pos_b.angular);

        self.r_a = q_a.rotate(self.local_anchor_a - ctx.body_a().local_center);
        self.r_b = q_b.rotate(self.local_anchor_b - ctx.body_b().local_center);

        let k11 = inv_m_a
            + inv_m_b
            + inv_i_a * self.r_a.y * self.r_a.y
            + inv_i_b * self.r_b.y * self.r_b.y;
        let k12 = -inv_i_a * self.r_a.x * self.r_a.y - inv_i_b * self.r_b.x * self.r_b.y;
        let k13 = -inv_i_a * self.r_a.y - inv_i_b * self.r_b.y;
        let k22 = inv_m_a
            + inv_m_b
            + inv_i_a * self.r_a.x * self.r_a.x
            + inv_i_b * self.r_b.x * self.r_b.x;
        let k23 = inv_i_a * self.r_a.x + inv_i_b * self.r_b.x;
        let k33 = inv_i_a + inv_i_b;

        self.mass = Mat33 {
            ex: Vec3::new(k11, k12, k13),
            ey: Vec3::new(k12, k22, k23),
            ez: Vec3::new(k13, k23, k33),
        };

        if self.frequency > 0.0 {
            let c = pos_b.angular - pos_a.angular - self.reference_angle;
            let inv_i = k33;
            let i = if inv_i != 0.0 { 1.0 / inv_i } else { 0.0 };

            let omega = std::f64::consts::TAU * self.frequency;
            let damping = 2.0 * i * self.damping_ratio * omega;
            let stiffness = i * omega * omega;

            let h = ctx.dt;
            self.gamma = h * (damping + h * stiffness);
            self.gamma = if self.gamma != 0.0 { 1.0 / self.gamma } else { 0.0 };
            self.bias = c * h * stiffness * self.gamma;

            let k33 = inv_i + self.gamma;
            self.mass.ez.z = k33;
        } else {
            self.gamma = 0.0;
            self.bias = 0.0;
        }

        if ctx.warm_start {
            let p = Vec2::new(self.impulse.x, self.impulse.y);
            let (mut v_a, mut v_b) = ctx.velocities();
            v_a.linear -= p * inv_m_a;
            v_a.angular -= inv_i_a * (m::cross(self.r_a, p) + self.impulse.z);
            v_b.linear += p * inv_m_b;
            v_b.angular += inv_i_b * (m::cross(self.r_b, p) + self.impulse.z);
            ctx.set_velocities(v_a, v_b);
        } else {
            self.impulse = Vec3::zero();
        }
    }

    pub(crate) fn solve_velocity_constraints(&mut self, ctx: &mut JointCtx<'_>) -> bool {
        let (inv_m_a, inv_i_a, inv_m_b, inv_i_b) = ctx.inv_masses();
        let (mut v_a, mut v_b) = ctx.velocities();
        let mut max_inc = 0.0f64;

        if self.frequency > 0.0 {
            // soft angular constraint solved separately
            let c_dot2 = v_b.angular - v_a.angular;
            let k33 = self.mass.ez.z;
            let impulse2 = if k33 > 0.0 {
                -(c_dot2 + self.bias + self.gamma * self.impulse.z) / k33
            } else {
                0.0
            };
            self.impulse.z += impulse2;
            max_inc = max_inc.max(impulse2.abs());
            v_a.angular -= inv_i_a * impulse2;
            v_b.angular += inv_i_b * impulse2;

            let c_dot1 = (v_b.linear + m::cross_sv(v_b.angular, self.r_b))
                - (v_a.linear + m::cross_sv(v_a.angular, self.r_a));
            let impulse1 = -self.mass.solve22(c_dot1);
            self.impulse.x += impulse1.x;
            self.impulse.y += impulse1.y;
            max_inc = max_inc.max(impulse1.mag());

            v_a.linear -= impulse1 * inv_m_a;
            v_a.angular -= inv_i_a * m::cross(self.r_a, impulse1);
            v_b.linear += impulse1 * inv_m_b;
            v_b.angular += inv_i_b * m::cross(self.r_b, impulse1);
        } else {
            let c_dot1 = (v_b.linear + m::cross_sv(v_b.angular, self.r_b))
                - (v_a.linear + m::cross_sv(v_a.angular, self.r_a));
            let c_dot2 = v_b.angular - v_a.angular;
            let c_dot = Vec3::new(c_dot1.x, c_dot1.y, c_dot2);

            let impulse = -self.mass.solve33(c_dot);
            self.impulse += impulse;
            max_inc = max_inc.max(impulse.mag());

            let p = Vec2::new(impulse.x, impulse.y);
            v_a.linear -= p * inv_m_a;
            v_a.angular -= inv_i_a * (m::cross(self.r_a, p) + impulse.z);
            v_b.linear += p * inv_m_b;
            v_b.angular += inv_i_b * (m::cross(self.r_b, p) + impulse.z);
        }

        ctx.set_velocities(v_a, v_b);
        max_inc <= f64::EPSILON
    }

    pub(crate) fn solve_position_constraints(&mut self, ctx: &mut JointCtx<'_>) -> bool {
        let (inv_m_a, inv_i_a, inv_m_b, inv_i_b) = ctx.inv_masses();
        let (mut pos_a, mut pos_b) = ctx.positions();
        let q_a = Rotation::from_angle(pos_a.angular);
        let q_b = Rotation::from_angle(pos_b.angular);

        let r_a = q_a.rotate(self.local_anchor_a - ctx.body_a().local_center);
        let r_b = q_b.rotate(self.local_anchor_b - ctx.body_b().local_center);

        let c1 = (pos_b.linear + r_b) - (pos_a.linear + r_a);
        let c2 = pos_b.angular - pos_a.angular - self.reference_angle;

        let position_error = c1.mag();
        let angular_error = c2.abs();

        let k11 = inv_m_a + inv_m_b + inv_i_a * r_a.y * r_a.y + inv_i_b * r_b.y * r_b.y;
        let k12 = -inv_i_a * r_a.x * r_a.y - inv_i_b * r_b.x * r_b.y;
        let k13 = -inv_i_a * r_a.y - inv_i_b * r_b.y;
        let k22 = inv_m_a + inv_m_b + inv_i_a * r_a.x * r_a.x + inv_i_b * r_b.x * r_b.x;
        let k23 = inv_i_a * r_a.x + inv_i_b * r_b.x;
        let k33 = inv_i_a + inv_i_b;
        let k = Mat33 {
            ex: Vec3::new(k11, k12, k13),
            ey: Vec3::new(k12, k22, k23),
            ez: Vec3::new(k13, k23, k33),
        };

        let (p, lambda) = if self.frequency > 0.0 {
            // the spring owns the angular error
            let p = -k.solve22(c1);
            (p, 0.0)
        } else {
            let impulse = -k.solve33(Vec3::new(c1.x, c1.y, c2));
            (Vec2::new(impulse.x, impulse.y), impulse.z)
        };

        pos_a.linear -= p * inv_m_a;
        pos_a.angular -= inv_i_a * (m::cross(r_a, p) + lambda);
        pos_b.linear += p * inv_m_b;
        pos_b.angular += inv_i_b * (m::cross(r_b, p) + lambda);

        ctx.set_positions(pos_a, pos_b);
        position_error <= LINEAR_SLOP && angular_error <= ANGULAR_SLOP
    }

    pub fn reaction_force(&self, inv_dt: f64) -> Vec2 {
        Vec2::new(self.impulse.x, self.impulse.y) * inv_dt
    }

    pub fn reaction_torque(&self, inv_dt: f64) -> f64 {
        self.impulse.z * inv_dt
    }
}
