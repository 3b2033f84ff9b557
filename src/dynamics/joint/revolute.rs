//! A revolute joint pins two bodies together at a point, leaving relative
//! rotation free. Rotation can be bounded by a limit and driven by a motor.

use super::JointCtx;
use crate::math::{self as m, Mat22, Rotation, Vec2};
use crate::settings::{ANGULAR_SLOP, LINEAR_SLOP};

const MAX_ANGULAR_CORRECTION: f64 = 8.0 / 180.0 * std::f64::consts::PI;

#[derive(Clone, Debug)]
pub struct RevoluteJoint {
    local_anchor_a: Vec2,
    local_anchor_b: Vec2,
    reference_angle: f64,

    enable_limit: bool,
    lower_angle: f64,
    upper_angle: f64,
    enable_motor: bool,
    motor_speed: f64,
    max_motor_torque: f64,

    // accumulated impulses
    impulse: Vec2,
    motor_impulse: f64,
    lower_impulse: f64,
    upper_impulse: f64,

    // per-step solver data
    r_a: Vec2,
    r_b: Vec2,
    k: Mat22,
    axial_mass: f64,
    angle: f64,
}

impl RevoluteJoint {
    /// Anchors are in each body's local frame; `reference_angle` is the
    /// relative angle (`angle_b - angle_a`) considered zero.
    pub fn new(local_anchor_a: Vec2, local_anchor_b: Vec2, reference_angle: f64) -> Self {
        Self {
            local_anchor_a,
            local_anchor_b,
            reference_angle,
            enable_limit: false,
            lower_angle: 0.0,
            upper_angle: 0.0,
            enable_motor: false,
            motor_speed: 0.0,
            max_motor_torque: 0.0,
            impulse: Vec2::zero(),
            motor_impulse: 0.0,
            lower_impulse: 0.0,
            upper_impulse: 0.0,
            r_a: Vec2::zero(),
            r_b: Vec2::zero(),
            k: Mat22::default(),
            axial_mass: 0.0,
            angle: 0.0,
        }
    }

    pub fn with_limit(mut self, lower: f64, upper: f64) -> Self {
        self.enable_limit = true;
        self.lower_angle = lower;
        self.upper_angle = upper;
        self
    }

    pub fn with_motor(mut self, speed: f64, max_torque: f64) -> Self {
        self.enable_motor = true;
        self.motor_speed = speed;
        self.max_motor_torque = max_torque;
        self
    }

    pub fn set_motor_speed(&mut self, speed: f64) {
        self.motor_speed = speed;
    }

    pub fn motor_speed(&self) -> f64 {
        self.motor_speed
    }

    pub fn local_anchor_a(&self) -> Vec2 {
        self.local_anchor_a
    }

    pub fn local_anchor_b(&self) -> Vec2 {
        self.local_anchor_b
    }

    pub fn reference_angle(&self) -> f64 {
        self.reference_angle
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
        let k22 = inv_m_a
            + inv_m_b
            + inv_i_a * self.r_a.x * self.r_a.x
            + inv_i_b * self.r_b.x * self.r_b.x;
        self.k = Mat22::new(Vec2::new(k11, k12), Vec2::new(k12, k22));

        let inv_i = inv_i_a + inv_i_b;
        self.axial_mass = if inv_i > 0.0 { 1.0 / inv_i } else { 0.0 };
        self.angle = pos_b.angular - pos_a.angular - self.reference_angle;

        if !self.enable_limit {
            self.lower_impulse = 0.0;
            self.upper_impulse = 0.0;
        }
        if !self.enable_motor {
            self.motor_impulse = 0.0;
        }

        if ctx.warm_start {
            let (mut v_a, mut v_b) = ctx.velocities();
            let axial = self.motor_impulse + self.lower_impulse - self.upper_impulse;
            v_a.linear -= self.impulse * inv_m_a;
            v_a.angular -= inv_i_a * (m::cross(self.r_a, self.impulse) + axial);
            v_b.linear += self.impulse * inv_m_b;
            v_b.angular += inv_i_b * (m::cross(self.r_b, self.impulse) + axial);
            ctx.set_velocities(v_a, v_b);
        } else {
            self.impulse = Vec2::zero();
            self.motor_impulse = 0.0;
            self.lower_impulse = 0.0;
            self.upper_impulse = 0.0;
        }
    }

    pub(crate) fn solve_velocity_constraints(&mut self, ctx: &mut JointCtx<'_>) -> bool {
        let (inv_m_a, inv_i_a, inv_m_b, inv_i_b) = ctx.inv_masses();
        let (mut v_a, mut v_b) = ctx.velocities();
        let mut max_inc = 0.0f64;

        // motor
        if self.enable_motor {
            let c_dot = v_b.angular - v_a.angular - self.motor_speed;
            let mut impulse = -self.axial_mass * c_dot;
            let old = self.motor_impulse;
            let max_impulse = ctx.dt * self.max_motor_torque;
            self.motor_impulse = (old + impulse).clamp(-max_impulse, max_impulse);
            impulse = self.motor_impulse - old;
            max_inc = max_inc.max(impulse.abs());
            v_a.angular -= inv_i_a * impulse;
            v_b.angular += inv_i_b * impulse;
        }

        // limits
        if self.enable_limit {
            // lower bound
            {
                let c = self.angle - self.lower_angle;
                let c_dot = v_b.angular - v_a.angular;
                let mut impulse = -self.axial_mass * (c_dot + c.max(0.0) * ctx.inv_dt);
                let old = self.lower_impulse;
                self.lower_impulse = (old + impulse).max(0.0);
                impulse = self.lower_impulse - old;
                max_inc = max_inc.max(impulse.abs());
                v_a.angular -= inv_i_a * impulse;
                v_b.angular += inv_i_b * impulse;
            }
            // upper bound, mirrored
            {
                let c = self.upper_angle - self.angle;
                let c_dot = v_a.angular - v_b.angular;
                let mut impulse = -self.axial_mass * (c_dot + c.max(0.0) * ctx.inv_dt);
                let old = self.upper_impulse;
                self.upper_impulse = (old + impulse).max(0.0);
                impulse = self.upper_impulse - old;
                max_inc = max_inc.max(impulse.abs());
                v_a.angular += inv_i_a * impulse;
                v_b.angular -= inv_i_b * impulse;
            }
        }

        // point-to-point
        {
            let c_dot = (v_b.linear + m::cross_sv(v_b.angular, self.r_b))
                - (v_a.linear + m::cross_sv(v_a.angular, self.r_a));
            let impulse = self.k.solve(-c_dot);
            self.impulse += impulse;
            max_inc = max_inc.max(impulse.mag());

            v_a.linear -= impulse * inv_m_a;
            v_a.angular -= inv_i_a * m::cross(self.r_a, impulse);
            v_b.linear += impulse * inv_m_b;
            v_b.angular += inv_i_b * m::cross(self.r_b, impulse);
        }

        ctx.set_velocities(v_a, v_b);
        max_inc <= f64::EPSILON
    }

    pub(crate) fn solve_position_constraints(&mut self, ctx: &mut JointCtx<'_>) -> bool {
        let (inv_m_a, inv_i_a, inv_m_b, inv_i_b) = ctx.inv_masses();
        let (mut pos_a, mut pos_b) = ctx.positions();
        let mut angular_error = 0.0;

        if self.enable_limit {
            let angle = pos_b.angular - pos_a.angular - self.reference_angle;
            let mut c = 0.0;
            if (self.upper_angle - self.lower_angle) < 2.0 * ANGULAR_SLOP {
                c = (angle - self.lower_angle).clamp(-MAX_ANGULAR_CORRECTION, MAX_ANGULAR_CORRECTION);
            } else if angle <= self.lower_angle {
                c = (angle - self.lower_angle + ANGULAR_SLOP).clamp(-MAX_ANGULAR_CORRECTION, 0.0);
            } else if angle >= self.upper_angle {
                c = (angle - self.upper_angle - ANGULAR_SLOP).clamp(0.0, MAX_ANGULAR_CORRECTION);
            }
            let impulse = -self.axial_mass * c;
            pos_a.angular -= inv_i_a * impulse;
            pos_b.angular += inv_i_b * impulse;
            angular_error = c.abs();
        }

        // pull the anchor points together
        let q_a = Rotation::from_angle(pos_a.angular);
        let q_b = Rotation::from_angle(pos_b.angular);
        let r_a = q_a.rotate(self.local_anchor_a - ctx.body_a().local_center);
        let r_b = q_b.rotate(self.local_anchor_b - ctx.body_b().local_center);

        let c = (pos_b.linear + r_b) - (pos_a.linear + r_a);
        let position_error = c.mag();

        let k11 = inv_m_a + inv_m_b + inv_i_a * r_a.y * r_a.y + inv_i_b * r_b.y * r_b.y;
        let k12 = -inv_i_a * r_a.x * r_a.y - inv_i_b * r_b.x * r_b.y;
        let k22 = inv_m_a + inv_m_b + inv_i_a * r_a.x * r_a.x + inv_i_b * r_b.x * r_b.x;
        let k = Mat22::new(Vec2::new(k11, k12), Vec2::new(k12, k22));
        let impulse = -k.solve(c);

        pos_a.linear -= impulse * inv_m_a;
        pos_a.angular -= inv_i_a * m::cross(r_a, impulse);
        pos_b.linear += impulse * inv_m_b;
        pos_b.angular += inv_i_b * m::cross(r_b, impulse);

        ctx.set_positions(pos_a, pos_b);
        position_error <= LINEAR_SLOP && angular_error <= ANGULAR_SLOP
    }

    pub fn reaction_force(&self, inv_dt: f64) -> Vec2 {
        self.impulse * inv_dt
    }

    pub fn reaction_torque(&self, inv_dt: f64) -> f64 {
        (self.motor_impulse + self.lower_impulse - self.upper_impulse) * inv_dt
    }
}
