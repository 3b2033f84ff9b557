//! A prismatic joint allows translation along one axis fixed in body A and
//! forbids relative rotation. Translation can be bounded and motor-driven.

use super::JointCtx;
use crate::math::{self as m, Mat22, Rotation, UnitVec2, Vec2, Vec3};
use crate::settings::{ANGULAR_SLOP, LINEAR_SLOP};

const MAX_LINEAR_CORRECTION: f64 = 0.2;

#[derive(Clone, Debug)]
pub struct PrismaticJoint {
    local_anchor_a: Vec2,
    local_anchor_b: Vec2,
    /// Translation axis in body A's frame.
    local_axis_a: UnitVec2,
    reference_angle: f64,

    enable_limit: bool,
    lower_translation: f64,
    upper_translation: f64,
    enable_motor: bool,
    motor_speed: f64,
    max_motor_force: f64,

    // accumulated impulses: (perpendicular, angular) and axial
    impulse: Vec2,
    motor_impulse: f64,
    lower_impulse: f64,
    upper_impulse: f64,

    // per-step solver data
    axis: UnitVec2,
    perp: UnitVec2,
    s1: f64,
    s2: f64,
    a1: f64,
    a2: f64,
    k: Mat22,
    axial_mass: f64,
    translation: f64,
}

impl PrismaticJoint {
    pub fn new(local_anchor_a: Vec2, local_anchor_b: Vec2, local_axis_a: UnitVec2) -> Self {
        Self {
            local_anchor_a,
            local_anchor_b,
            local_axis_a,
            reference_angle: 0.0,
            enable_limit: false,
            lower_translation: 0.0,
            upper_translation: 0.0,
            enable_motor: false,
            motor_speed: 0.0,
            max_motor_force: 0.0,
            impulse: Vec2::zero(),
            motor_impulse: 0.0,
            lower_impulse: 0.0,
            upper_impulse: 0.0,
            axis: UnitVec2::X,
            perp: UnitVec2::Y,
            s1: 0.0,
            s2: 0.0,
            a1: 0.0,
            a2: 0.0,
            k: Mat22::default(),
            axial_mass: 0.0,
            translation: 0.0,
        }
    }

    pub fn with_reference_angle(mut self, angle: f64) -> Self {
        self.reference_angle = angle;
        self
    }

    pub fn with_limit(mut self, lower: f64, upper: f64) -> Self {
        self.enable_limit = true;
        self.lower_translation = lower;
        self.upper_translation = upper;
        self
    }

    pub fn with_motor(mut self, speed: f64, max_force: f64) -> Self {
        self.enable_motor = true;
        self.motor_speed = speed;
        self.max_motor_force = max_force;
        self
    }

    pub fn set_motor_speed(&mut self, speed: f64) {
        self.motor_speed = speed;
    }

    pub fn local_anchor_a(&self) -> Vec2 {
        self.local_anchor_a
    }

    pub fn local_anchor_b(&self) -> Vec2 {
        self.local_anchor_b
    }

    pub fn local_axis_a(&self) -> UnitVec2 {
        self.local_axis_a
    }

    pub fn reference_angle(&self) -> f64 {
        self.reference_angle
    }

    pub(crate) fn init_velocity_constraints(&mut self, ctx: &mut JointCtx<'_>) {
        let (inv_m_a, inv_i_a, inv_m_b, inv_i_b) = ctx.inv_masses();
        let (pos_a, pos_b) = ctx.positions();
        let q_a = Rotation::from_angle(pos_a.angular);
        let q_b = Rotation::from_angle(pos_b.angular);

        let r_a = q_a.rotate(self.local_anchor_a - ctx.body_a().local_center);
        let r_b = q_b.rotate(self.local_anchor_b - ctx.body_b().local_center);
        let d = (pos_b.linear + r_b) - (pos_a.linear + r_a);

        self.axis = q_a.rotate_unit(self.local_axis_a);
        self.a1 = m::cross(d + r_a, *self.axis);
        self.a2 = m::cross(r_b, *self.axis);
        let inv_axial =
            inv_m_a + inv_m_b + inv_i_a * self.a1 * self.a1 + inv_i_b * self.a2 * self.a2;
        self.axial_mass = if inv_axial > 0.0 { 1.0 / inv_axial } else { 0.0 };

        self.perp = self.axis.rot90();
        self.s1 = m::cross(d + r_a, *self.perp);
        self.s2 = m::cross(r_b, *self.perp);

        let k11 = inv_m_a + inv_m_b + inv_i_a * self.s1 * self.s1 + inv_i_b * self.s2 * self.s2;
        let k12 = inv_i_a * self.s1 + inv_i_b * self.s2;
        let mut k22 = inv_i_a + inv_i_b;
        if k22 == 0.0 {
            // both bodies have fixed rotation
            k22 = 1.0;
        }
        self.k = Mat22::new(Vec2::new(k11, k12), Vec2::new(k12, k22));

        self.translation = self.axis.dot(d);
        if !self.enable_limit {
            self.lower_impulse = 0.0;
            self.upper_impulse = 0.0;
        }
        if !self.enable_motor {
            self.motor_impulse = 0.0;
        }

        if ctx.warm_start {
            let axial = self.motor_impulse + self.lower_impulse - self.upper_impulse;
            let p = *self.perp * self.impulse.x + *self.axis * axial;
            let l_a = self.impulse.x * self.s1 + self.impulse.y + axial * self.a1;
            let l_b = self.impulse.x * self.s2 + self.impulse.y + axial * self.a2;

            let (mut v_a, mut v_b) = ctx.velocities();
            v_a.linear -= p * inv_m_a;
            v_a.angular -= inv_i_a * l_a;
            v_b.linear += p * inv_m_b;
            v_b.angular += inv_i_b * l_b;
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

        if self.enable_motor {
            let c_dot = self.axis.dot(v_b.linear - v_a.linear) + self.a2 * v_b.angular
                - self.a1 * v_a.angular;
            let mut impulse = self.axial_mass * (self.motor_speed - c_dot);
            let old = self.motor_impulse;
            let max_impulse = ctx.dt * self.max_motor_force;
            self.motor_impulse = (old + impulse).clamp(-max_impulse, max_impulse);
            impulse = self.motor_impulse - old;
            max_inc = max_inc.max(impulse.abs());

            let p = *self.axis * impulse;
            v_a.linear -= p * inv_m_a;
            v_a.angular -= inv_i_a * impulse * self.a1;
            v_b.linear += p * inv_m_b;
            v_b.angular += inv_i_b * impulse * self.a2;
        }

        if self.enable_limit {
            // lower
            {
                let c = self.translation - self.lower_translation;
                let c_dot = self.axis.dot(v_b.linear - v_a.linear) + self.a2 * v_b.angular
                    - self.a1 * v_a.angular;
                let mut impulse = -self.axial_mass * (c_dot + c.max(0.0) * ctx.inv_dt);
                let old = self.lower_impulse;
                self.lower_impulse = (old + impulse).max(0.0);
                impulse = self.lower_impulse - old;
                max_inc = max_inc.max(impulse.abs());

                let p = *self.axis * impulse;
                v_a.linear -= p * inv_m_a;
                v_a.angular -= inv_i_a * impulse * self.a1;
                v_b.linear += p * inv_m_b;
                v_b.angular += inv_i_b * impulse * self.a2;
            }
            // upper
            {
                let c = self.upper_translation - self.translation;
                let c_dot = self.axis.dot(v_a.linear - v_b.linear) + self.a1 * v_a.angular
                    - self.a2 * v_b.angular;
                let mut impulse = -self.axial_mass * (c_dot + c.max(0.0) * ctx.inv_dt);
                let old = self.upper_impulse;
                self.upper_impulse = (old + impulse).max(0.0);
                impulse = self.upper_impulse - old;
                max_inc = max_inc.max(impulse.abs());

                let p = *self.axis * impulse;
                v_a.linear += p * inv_m_a;
                v_a.angular += inv_i_a * impulse * self.a1;
                v_b.linear -= p * inv_m_b;
                v_b.angular -= inv_i_b * impulse * self.a2;
            }
        }

        // perpendicular and angular constraint
        {
            let c_dot = Vec2::new(
                self.perp.dot(v_b.linear - v_a.linear) + self.s2 * v_b.angular
                    - self.s1 * v_a.angular,
                v_b.angular - v_a.angular,
            );
            let impulse = self.k.solve(-c_dot);
            self.impulse += impulse;
            max_inc = max_inc.max(impulse.mag());

            let p = *self.perp * impulse.x;
            let l_a = impulse.x * self.s1 + impulse.y;
            let l_b = impulse.x * self.s2 + impulse.y;
            v_a.linear -= p * inv_m_a;
            v_a.angular -= inv_i_a * l_a;
            v_b.linear += p * inv_m_b;
            v_b.angular += inv_i_b * l_b;
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

        let axis = q_a.rotate_unit(self.local_axis_a);
        let a1 = m::cross(d + r_a, *axis);
        let a2 = m::cross(r_b, *axis);
        let perp = axis.rot90();
        let s1 = m::cross(d + r_a, *perp);
        let s2 = m::cross(r_b, *perp);

        let c1 = Vec2::new(perp.dot(d), pos_b.angular - pos_a.angular - self.reference_angle);
        let mut linear_error = c1.x.abs();
        let angular_error = c1.y.abs();

        let mut active = false;
        let mut c2 = 0.0;
        if self.enable_limit {
            let translation = axis.dot(d);
            if (self.upper_translation - self.lower_translation) < 2.0 * LINEAR_SLOP {
                c2 = translation.clamp(-MAX_LINEAR_CORRECTION, MAX_LINEAR_CORRECTION);
                linear_error = linear_error.max(translation.abs());
                active = true;
            } else if translation <= self.lower_translation {
                c2 = (translation - self.lower_translation + LINEAR_SLOP)
                    .clamp(-MAX_LINEAR_CORRECTION, 0.0);
                linear_error = linear_error.max(self.lower_translation - translation);
                active = true;
            } else if translation >= self.upper_translation {
                c2 = (translation - self.upper_translation - LINEAR_SLOP)
                    .clamp(0.0, MAX_LINEAR_CORRECTION);
                linear_error = linear_error.max(translation - self.upper_translation);
                active = true;
            }
        }

        let impulse = if active {
            let k11 = inv_m_a + inv_m_b + inv_i_a * s1 * s1 + inv_i_b * s2 * s2;
            let k12 = inv_i_a * s1 + inv_i_b * s2;
            let k13 = inv_i_a * s1 * a1 + inv_i_b * s2 * a2;
            let mut k22 = inv_i_a + inv_i_b;
            if k22 == 0.0 {
                k22 = 1.0;
            }
            let k23 = inv_i_a * a1 + inv_i_b * a2;
            let k33 = inv_m_a + inv_m_b + inv_i_a * a1 * a1 + inv_i_b * a2 * a2;

            let k = m::Mat33 {
                ex: Vec3::new(k11, k12, k13),
                ey: Vec3::new(k12, k22, k23),
                ez: Vec3::new(k13, k23, k33),
            };
            let solved = k.solve33(-Vec3::new(c1.x, c1.y, c2));
            Vec3::new(solved.x, solved.y, solved.z)
        } else {
            let k11 = inv_m_a + inv_m_b + inv_i_a * s1 * s1 + inv_i_b * s2 * s2;
            let k12 = inv_i_a * s1 + inv_i_b * s2;
            let mut k22 = inv_i_a + inv_i_b;
            if k22 == 0.0 {
                k22 = 1.0;
            }
            let k = Mat22::new(Vec2::new(k11, k12), Vec2::new(k12, k22));
            let solved = k.solve(-c1);
            Vec3::new(solved.x, solved.y, 0.0)
        };

        let p = *perp * impulse.x + *axis * impulse.z;
        let l_a = impulse.x * s1 + impulse.y + impulse.z * a1;
        let l_b = impulse.x * s2 + impulse.y + impulse.z * a2;

        pos_a.linear -= p * inv_m_a;
        pos_a.angular -= inv_i_a * l_a;
        pos_b.linear += p * inv_m_b;
        pos_b.angular += inv_i_b * l_b;

        ctx.set_positions(pos_a, pos_b);
        linear_error <= LINEAR_SLOP && angular_error <= ANGULAR_SLOP
    }

    pub fn reaction_force(&self, inv_dt: f64) -> Vec2 {
        (*self.perp * self.impulse.x
            + *self.axis * (self.motor_impulse + self.lower_impulse - self.upper_impulse))
            * inv_dt
    }

    pub fn reaction_torque(&self, inv_dt: f64) -> f64 {
        self.impulse.y * inv_dt
    }
}
