//! A gear joint couples the coordinates of two revolute or prismatic
//! joints so that `coord_a + ratio * coord_b` stays constant.
//!
//! As in the original, the parent joints must attach their body to a
//! non-dynamic ground body; the ground poses are sampled when the gear is
//! created and treated as fixed.

use super::JointCtx;
use crate::dynamics::JointKey;
use crate::math::{self as m, Rotation, Transform, UnitVec2, Vec2};
use crate::settings::LINEAR_SLOP;

/// Snapshot of one parent joint's constraint axis.
#[derive(Clone, Debug)]
pub(crate) enum GearAxis {
    Revolute {
        ground_angle: f64,
        reference_angle: f64,
    },
    Prismatic {
        ground_pose: Transform,
        ground_local_anchor: Vec2,
        ground_local_axis: UnitVec2,
        /// Anchor on the geared body, in its local frame.
        body_local_anchor: Vec2,
    },
}

#[derive(Clone, Debug)]
pub struct GearJoint {
    joint_a: JointKey,
    joint_b: JointKey,
    ratio: f64,

    /// Filled in by the world at creation from the parent joints.
    pub(crate) axis_a: Option<GearAxis>,
    pub(crate) axis_b: Option<GearAxis>,
    pub(crate) constant: f64,

    impulse: f64,

    // per-step solver data
    jv_a: Vec2,
    jw_a: f64,
    jv_b: Vec2,
    jw_b: f64,
    mass: f64,
}

impl GearJoint {
    /// `joint_a` drives body A of this gear; `joint_b` drives body B.
    /// Both must be revolute or prismatic joints.
    pub fn new(joint_a: JointKey, joint_b: JointKey, ratio: f64) -> Self {
        Self {
            joint_a,
            joint_b,
            ratio,
            axis_a: None,
            axis_b: None,
            constant: 0.0,
            impulse: 0.0,
            jv_a: Vec2::zero(),
            jw_a: 0.0,
            jv_b: Vec2::zero(),
            jw_b: 0.0,
            mass: 0.0,
        }
    }

    pub fn joint_a(&self) -> JointKey {
        self.joint_a
    }

    pub fn joint_b(&self) -> JointKey {
        self.joint_b
    }

    pub fn ratio(&self) -> f64 {
        self.ratio
    }

    pub fn set_ratio(&mut self, ratio: f64) {
        self.ratio = ratio;
    }

    pub(crate) fn shift_origin(&mut self, new_origin: Vec2) {
        for axis in [&mut self.axis_a, &mut self.axis_b].into_iter().flatten() {
            if let GearAxis::Prismatic { ground_pose, .. } = axis {
                ground_pose.p -= new_origin;
            }
        }
    }

    fn coordinate(axis: &GearAxis, pose: &Transform, angle: f64) -> f64 {
        match axis {
            GearAxis::Revolute {
                ground_angle,
                reference_angle,
            } => angle - ground_angle - reference_angle,
            GearAxis::Prismatic {
                ground_pose,
                ground_local_anchor,
                ground_local_axis,
                body_local_anchor,
            } => {
                let u = ground_pose.q.rotate_unit(*ground_local_axis);
                let anchor_ground = ground_pose.apply(*ground_local_anchor);
                let anchor_body = pose.apply(*body_local_anchor);
                (anchor_body - anchor_ground).dot(*u)
            }
        }
    }

    /// Compute the reference constant from the bodies' current poses.
    /// Called once by the world when the gear is created.
    pub(crate) fn initialize_constant(&mut self, pose_a: &Transform, pose_b: &Transform) {
        let (axis_a, axis_b) = match (&self.axis_a, &self.axis_b) {
            (Some(a), Some(b)) => (a, b),
            _ => return,
        };
        let coord_a = Self::coordinate(axis_a, pose_a, pose_a.q.angle());
        let coord_b = Self::coordinate(axis_b, pose_b, pose_b.q.angle());
        self.constant = coord_a + self.ratio * coord_b;
    }

    pub(crate) fn init_velocity_constraints(&mut self, ctx: &mut JointCtx<'_>) {
        let (inv_m_a, inv_i_a, inv_m_b, inv_i_b) = ctx.inv_masses();
        let (pos_a, pos_b) = ctx.positions();

        let mut mass = 0.0;

        match self.axis_a.clone() {
            Some(GearAxis::Revolute { .. }) => {
                self.jv_a = Vec2::zero();
                self.jw_a = 1.0;
                mass += inv_i_a;
            }
            Some(GearAxis::Prismatic {
                ground_pose,
                ground_local_axis,
                body_local_anchor,
                ..
            }) => {
                let u = ground_pose.q.rotate(*ground_local_axis);
                let q_a = Rotation::from_angle(pos_a.angular);
                let r_a = q_a.rotate(body_local_anchor - ctx.body_a().local_center);
                self.jv_a = u;
                self.jw_a = m::cross(r_a, u);
                mass += inv_m_a + inv_i_a * self.jw_a * self.jw_a;
            }
            None => {
                self.jv_a = Vec2::zero();
                self.jw_a = 0.0;
            }
        }

        match self.axis_b.clone() {
            Some(GearAxis::Revolute { .. }) => {
                self.jv_b = Vec2::zero();
                self.jw_b = self.ratio;
                mass += self.ratio * self.ratio * inv_i_b;
            }
            Some(GearAxis::Prismatic {
                ground_pose,
                ground_local_axis,
                body_local_anchor,
                ..
            }) => {
                let u = ground_pose.q.rotate(*ground_local_axis);
                let q_b = Rotation::from_angle(pos_b.angular);
                let r_b = q_b.rotate(body_local_anchor - ctx.body_b().local_center);
                self.jv_b = u * self.ratio;
                self.jw_b = self.ratio * m::cross(r_b, u);
                mass += self.ratio * self.ratio * inv_m_b + inv_i_b * self.jw_b * self.jw_b;
            }
            None => {
                self.jv_b = Vec2::zero();
                self.jw_b = 0.0;
            }
        }

        self.mass = if mass > 0.0 { 1.0 / mass } else { 0.0 };

        if ctx.warm_start {
            let (mut v_a, mut v_b) = ctx.velocities();
            v_a.linear += self.jv_a * (inv_m_a * self.impulse);
            v_a.angular += inv_i_a * self.impulse * self.jw_a;
            v_b.linear += self.jv_b * (inv_m_b * self.impulse);
            v_b.angular += inv_i_b * self.impulse * self.jw_b;
            ctx.set_velocities(v_a, v_b);
        } else {
            self.impulse = 0.0;
        }
    }

    pub(crate) fn solve_velocity_constraints(&mut self, ctx: &mut JointCtx<'_>) -> bool {
        let (inv_m_a, inv_i_a, inv_m_b, inv_i_b) = ctx.inv_masses();
        let (mut v_a, mut v_b) = ctx.velocities();

        let c_dot = self.jv_a.dot(v_a.linear)
            + self.jw_a * v_a.angular
            + self.jv_b.dot(v_b.linear)
            + self.jw_b * v_b.angular;

        let impulse = -self.mass * c_dot;
        self.impulse += impulse;

        v_a.linear += self.jv_a * (inv_m_a * impulse);
        v_a.angular += inv_i_a * impulse * self.jw_a;
        v_b.linear += self.jv_b * (inv_m_b * impulse);
        v_b.angular += inv_i_b * impulse * self.jw_b;

        ctx.set_velocities(v_a, v_b);
        impulse.abs() <= f64::EPSILON
    }

    pub(crate) fn solve_position_constraints(&mut self, ctx: &mut JointCtx<'_>) -> bool {
        let (axis_a, axis_b) = match (&self.axis_a, &self.axis_b) {
            (Some(a), Some(b)) => (a.clone(), b.clone()),
            _ => return true,
        };
        let (inv_m_a, inv_i_a, inv_m_b, inv_i_b) = ctx.inv_masses();
        let (mut pos_a, mut pos_b) = ctx.positions();

        let pose_a = ctx.bodies[ctx.index_a].transform();
        let pose_b = ctx.bodies[ctx.index_b].transform();
        let coord_a = Self::coordinate(&axis_a, &pose_a, pos_a.angular);
        let coord_b = Self::coordinate(&axis_b, &pose_b, pos_b.angular);

        let c = self.constant - (coord_a + self.ratio * coord_b);
        if self.mass == 0.0 {
            return true;
        }
        let impulse = self.mass * c;

        pos_a.linear += self.jv_a * (inv_m_a * impulse);
        pos_a.angular += inv_i_a * impulse * self.jw_a;
        pos_b.linear += self.jv_b * (inv_m_b * impulse);
        pos_b.angular += inv_i_b * impulse * self.jw_b;

        ctx.set_positions(pos_a, pos_b);
        c.abs() < LINEAR_SLOP
    }

    pub fn reaction_force(&self, inv_dt: f64) -> Vec2 {
        self.jv_b * (self.impulse * inv_dt)
    }

    pub fn reaction_torque(&self, inv_dt: f64) -> f64 {
        self.jw_b * self.impulse * inv_dt
    }
}
