//! A wheel joint: body B rides on an axis fixed in body A, with a damped
//! suspension spring along the axis and an optional drive motor on the
//! wheel's rotation.

use super::JointCtx;
use crate::math::{self as m, Rotation, UnitVec2, Vec2};
use crate::settings::LINEAR_SLOP;

#[derive(Clone, Debug)]
pub struct WheelJoint {
    local_anchor_a: Vec2,
    local_anchor_b: Vec2,
    /// Suspension axis in body A's frame.
    local_axis_a: UnitVec2,

    frequency: f64,
    damping_ratio: f64,
    enable_motor: bool,
    motor_speed: f64,
    max_motor_torque: f64,

    // accumulated impulses
    impulse: f64,
    spring_impulse: f64,
    motor_impulse: f64,

    // per-step solver data
    ax: UnitVec2,
    ay: UnitVec2,
    s_ax: f64,
    s_bx: f64,
    s_ay: f64,
    s_by: f64,
    mass: f64,
    spring_mass: f64,
    motor_mass: f64,
    bias: f64,
    gamma: f64,
}

impl WheelJoint {
    pub fn new(local_anchor_a: Vec2, local_anchor_b: Vec2, local_axis_a: UnitVec2) -> Self {
        Self {
            local_anchor_a,
            local_anchor_b,
            local_axis_a,
            frequency: 2.0,
            damping_ratio: 0.7,
            enable_motor: false,
            motor_speed: 0.0,
            max_motor_torque: 0.0,
            impulse: 0.0,
            spring_impulse: 0.0,
            motor_impulse: 0.0,
            ax: UnitVec2::X,
            ay: UnitVec2::Y,
            s_ax: 0.0,
            s_bx: 0.0,
            s_ay: 0.0,
            s_by: 0.0,
            mass: 0.0,
            spring_mass: 0.0,
            motor_mass: 0.0,
            bias: 0.0,
            gamma: 0.0,
        }
    }

    pub fn with_spring(mut self, frequency_hz: f64, damping_ratio: f64) -> Self {
        self.frequency = frequency_hz;
        self.damping_ratio = damping_ratio;
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

    pub(crate) fn init_velocity_constraints(&mut self, ctx: &mut JointCtx<'_>) {
        let (inv_m_a, inv_i_a, inv_m_b, inv_i_b) = ctx.inv_masses();
        let (pos_a, pos_b) = ctx.positions();
        let q_a = Rotation::from_angle(pos_a.angular);
        let q_b = Rotation::from_angle(pos_b.angular);

        let r_a = q_a.rotate(self.local_anchor_a - ctx.body_a().local_center);
        let r_b = q_b.rotate(self.local_anchor_b - ctx.body_b().local_center);
        let d = (pos_b.linear + r_b) - (pos_a.linear + r_a);

        // point-on-line constraint perpendicular to the axis
        self.ay = q_a.rotate_unit(self.local_axis_a.rot90());
        self.s_ay = m::cross(d + r_a, *self.ay);
        self.s_by = m::cross(r_b, *self.ay);
        let inv_mass = inv_m_a
            + inv_m_b
            + inv_i_a * self.s_ay * self.s_ay
            + inv_i_b * self.s_by * self.s_by;
        self.mass = if inv_mass > 0.0 { 1.0 / inv_mass } else { 0.0 };

        // suspension spring along the axis
        self.ax = q_a.rotate_unit(self.local_axis_a);
        self.s_ax = m::cross(d + r_a, *self.ax);
        self.s_bx = m::cross(r_b, *self.ax);
        let inv_spring_mass = inv_m_a
            + inv_m_b
            + inv_i_a * self.s_ax * self.s_ax
            + inv_i_b * self.s_bx * self.s_bx;

        self.spring_mass = 0.0;
        self.bias = 0.0;
        self.gamma = 0.0;
        if self.frequency > 0.0 && inv_spring_mass > 0.0 {
            self.spring_mass = 1.0 / inv_spring_mass;
            let c = d.dot(*self.ax);
            let omega = std::f64::consts::TAU * self.frequency;
            let damping = 2.0 * self.spring_mass * self.damping_ratio * omega;
            let stiffness = self.spring_mass * omega * omega;

            let h = ctx.dt;
            self.gamma = h * (damping + h * stiffness);
            if self.gamma > 0.0 {
                self.gamma = 1.0 / self.gamma;
            }
            self.bias = c * h * stiffness * self.gamma;
            let inv = inv_spring_mass + self.gamma;
            self.spring_mass = if inv > 0.0 { 1.0 / inv } else { 0.0 };
        } else {
            self.spring_impulse = 0.0;
        }

        if self.enable_motor {
            let inv = inv_i_a + inv_i_b;
            self.motor_mass = if inv > 0.0 { 1.0 / inv } else { 0.0 };
        } else {
            self.motor_mass = 0.0;
            self.motor_impulse = 0.0;
        }

        if ctx.warm_start {
            let p = *self.ay * self.impulse + *self.ax * self.spring_impulse;
            let l_a = self.impulse * self.s_ay + self.spring_impulse * self.s_ax
                + self.motor_impulse;
            let l_b = self.impulse * self.s_by + self.spring_impulse * self.s_bx
                + self.motor_impulse;

            let (mut v_a, mut v_b) = ctx.velocities();
            v_a.linear -= p * inv_m_a;
            v_a.angular -= inv_i_a * l_a;
            v_b.linear += p * inv_m_b;
            v_b.angular += inv_i_b * l_b;
            ctx.set_velocities(v_a, v_b);
        } else {
            self.impulse = 0.0;
            self.spring_impulse = 0.0;
            self.motor_impulse = 0.0;
        }
    }

    pub(crate) fn solve_velocity_constraints(&mut self, ctx: &mut JointCtx<'_>) -> bool {
        let (inv_m_a, inv_i_a, inv_m_b, inv_i_b) = ctx.inv_masses();
        let (mut v_a, mut v_b) = ctx.velocities();
        let mut max_inc = 0.0f64;

        // suspension spring
        {
            let c_dot = self.ax.dot(v_b.linear - v_a.linear) + self.s_bx * v_b.angular
                - self.s_ax * v_a.angular;
            let impulse = -self.spring_mass
                * (c_dot + self.bias + self.gamma * self.spring_impulse);
            self.spring_impulse += impulse;
            max_inc = max_inc.max(impulse.abs());

            let p = *self.ax * impulse;
            v_a.linear -= p * inv_m_a;
            v_a.angular -= inv_i_a * impulse * self.s_ax;
            v_b.linear += p * inv_m_b;
            v_b.angular += inv_i_b * impulse * self.s_bx;
        }

        // drive motor
        {
            let c_dot = v_b.angular - v_a.angular - self.motor_speed;
            let mut impulse = -self.motor_mass * c_dot;

            let old = self.motor_impulse;
            let max_impulse = ctx.dt * self.max_motor_torque;
            self.motor_impulse = (old + impulse).clamp(-max_impulse, max_impulse);
            impulse = self.motor_impulse - old;
            max_inc = max_inc.max(impulse.abs());

            v_a.angular -= inv_i_a * impulse;
            v_b.angular += inv_i_b * impulse;
        }

        // point-on-line
        {
            let c_dot = self.ay.dot(v_b.linear - v_a.linear) + self.s_by * v_b.angular
                - self.s_ay * v_a.angular;
            let impulse = -self.mass * c_dot;
            self.impulse += impulse;
            max_inc = max_inc.max(impulse.abs());

            let p = *self.ay * impulse;
            v_a.linear -= p * inv_m_a;
            v_a.angular -= inv_i_a * impulse * self.s_ay;
            v_b.linear += p * inv_m_b;
            v_b.angular += inv_i_b * impulse * self.s_by;
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
        let d = (pos_b.linear + r_b) - (pos_a.linear + r_a);

        let ay = q_a.rotate_unit(self.local_axis_a.rot90());
        let s_ay = m::cross(d + r_a, *ay);
        let s_by = m::cross(r_b, *ay);

        let c = d.dot(*ay);
        let inv_k =
            inv_m_a + inv_m_b + inv_i_a * s_ay * s_ay + inv_i_b * s_by * s_by;
        let impulse = if inv_k != 0.0 { -c / inv_k } else { 0.0 };

        let p = *ay * impulse;
        pos_a.linear -= p * inv_m_a;
        pos_a.angular -= inv_i_a * impulse * s_ay;
        pos_b.linear += p * inv_m_b;
        pos_b.angular += inv_i_b * impulse * s_by;

        ctx.set_positions(pos_a, pos_b);
        c.abs() <= LINEAR_SLOP
    }

    pub fn reaction_force(&self, inv_dt: f64) -> Vec2 {
        (*self.ay * self.impulse + *self.ax * self.spring_impulse) * inv_dt
    }

    pub fn reaction_torque(&self, inv_dt: f64) -> f64 {
        self.motor_impulse * inv_dt
    }
}
