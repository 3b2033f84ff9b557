//! Joints: velocity and position constraints connecting pairs of bodies.

use super::contact_solver::BodyConstraint;
use super::{BodyKey, JointKey};
use crate::math::{Position, Vec2, Velocity};

pub mod distance;
pub mod friction;
pub mod gear;
pub mod motor;
pub mod mouse;
pub mod prismatic;
pub mod pulley;
pub mod revolute;
pub mod rope;
pub mod weld;
pub mod wheel;

pub use distance::DistanceJoint;
pub use friction::FrictionJoint;
pub use gear::GearJoint;
pub use motor::MotorJoint;
pub use mouse::MouseJoint;
pub use prismatic::PrismaticJoint;
pub use pulley::PulleyJoint;
pub use revolute::RevoluteJoint;
pub use rope::RopeJoint;
pub use weld::WeldJoint;
pub use wheel::WheelJoint;

/// Construction parameters for a joint: the two bodies and the
/// kind-specific constraint data.
#[derive(Clone, Debug)]
pub struct JointDef {
    pub body_a: BodyKey,
    pub body_b: BodyKey,
    /// Whether fixtures of the two connected bodies may still collide.
    pub collide_connected: bool,
    pub kind: JointKind,
}

impl JointDef {
    pub fn new(body_a: BodyKey, body_b: BodyKey, kind: JointKind) -> Self {
        Self {
            body_a,
            body_b,
            collide_connected: false,
            kind,
        }
    }

    pub fn with_collide_connected(mut self, collide: bool) -> Self {
        self.collide_connected = collide;
        self
    }
}

/// The kind-specific data of a joint. Constraint math is dispatched by
/// matching on this.
#[derive(Clone, Debug)]
pub enum JointKind {
    /// Pins two bodies at a point; optional angular limit and motor.
    Revolute(RevoluteJoint),
    /// Restricts motion to a translation axis; optional limit and motor.
    Prismatic(PrismaticJoint),
    /// Keeps two anchor points at a fixed (or spring-like) distance.
    Distance(DistanceJoint),
    /// Locks two bodies together, with optional angular softness.
    Weld(WeldJoint),
    /// Drags a body's anchor point toward a movable target.
    Mouse(MouseJoint),
    /// An upper bound on the distance between two anchors.
    Rope(RopeJoint),
    /// Two bodies suspended from ground anchors with a transmission ratio.
    Pulley(PulleyJoint),
    /// Couples the coordinates of two revolute/prismatic joints.
    Gear(GearJoint),
    /// An axle with a suspension spring and drive motor.
    Wheel(WheelJoint),
    /// Applies friction-like damping between two bodies.
    Friction(FrictionJoint),
    /// Drives a body toward a target offset from another body.
    Motor(MotorJoint),
}

/// A joint owned by a world.
#[derive(Clone, Debug)]
pub struct Joint {
    pub(crate) body_a: BodyKey,
    pub(crate) body_b: BodyKey,
    pub(crate) collide_connected: bool,
    pub(crate) kind: JointKind,
    /// Transient mark used by the island builder.
    pub(crate) islanded: bool,
    /// Island-local body indices, assigned before each island solve.
    pub(crate) index_a: usize,
    pub(crate) index_b: usize,
}

/// Everything a joint's solver hooks can see: the island body buffer and
/// the step timing.
pub(crate) struct JointCtx<'a> {
    pub bodies: &'a mut [BodyConstraint],
    pub index_a: usize,
    pub index_b: usize,
    pub dt: f64,
    pub inv_dt: f64,
    /// When false, accumulated impulses are cleared instead of re-applied.
    pub warm_start: bool,
}

impl JointCtx<'_> {
    #[inline]
    pub fn body_a(&self) -> &BodyConstraint {
        &self.bodies[self.index_a]
    }

    #[inline]
    pub fn body_b(&self) -> &BodyConstraint {
        &self.bodies[self.index_b]
    }

    #[inline]
    pub fn velocities(&self) -> (Velocity, Velocity) {
        (self.bodies[self.index_a].velocity, self.bodies[self.index_b].velocity)
    }

    #[inline]
    pub fn set_velocities(&mut self, a: Velocity, b: Velocity) {
        self.bodies[self.index_a].velocity = a;
        self.bodies[self.index_b].velocity = b;
    }

    #[inline]
    pub fn positions(&self) -> (Position, Position) {
        (self.bodies[self.index_a].position, self.bodies[self.index_b].position)
    }

    #[inline]
    pub fn set_positions(&mut self, a: Position, b: Position) {
        self.bodies[self.index_a].position = a;
        self.bodies[self.index_b].position = b;
    }

    /// `(inv_mass_a, inv_inertia_a, inv_mass_b, inv_inertia_b)`
    #[inline]
    pub fn inv_masses(&self) -> (f64, f64, f64, f64) {
        let a = &self.bodies[self.index_a];
        let b = &self.bodies[self.index_b];
        (a.inv_mass, a.inv_inertia, b.inv_mass, b.inv_inertia)
    }
}

impl Joint {
    pub(crate) fn new(def: JointDef) -> Self {
        Self {
            body_a: def.body_a,
            body_b: def.body_b,
            collide_connected: def.collide_connected,
            kind: def.kind,
            islanded: false,
            index_a: 0,
            index_b: 0,
        }
    }

    pub fn body_a(&self) -> BodyKey {
        self.body_a
    }

    pub fn body_b(&self) -> BodyKey {
        self.body_b
    }

    pub fn collide_connected(&self) -> bool {
        self.collide_connected
    }

    pub fn kind(&self) -> &JointKind {
        &self.kind
    }

    pub fn kind_mut(&mut self) -> &mut JointKind {
        &mut self.kind
    }

    /// Other joints this joint references, if any (gears).
    pub(crate) fn referenced_joints(&self) -> [Option<JointKey>; 2] {
        match &self.kind {
            JointKind::Gear(g) => [Some(g.joint_a()), Some(g.joint_b())],
            _ => [None, None],
        }
    }

    /// Rebase any world-space data the joint carries.
    pub(crate) fn shift_origin(&mut self, new_origin: Vec2) {
        match &mut self.kind {
            JointKind::Mouse(j) => j.shift_origin(new_origin),
            JointKind::Pulley(j) => j.shift_origin(new_origin),
            JointKind::Gear(j) => j.shift_origin(new_origin),
            _ => {}
        }
    }

    pub(crate) fn init_velocity_constraints(&mut self, ctx: &mut JointCtx<'_>) {
        match &mut self.kind {
            JointKind::Revolute(j) => j.init_velocity_constraints(ctx),
            JointKind::Prismatic(j) => j.init_velocity_constraints(ctx),
            JointKind::Distance(j) => j.init_velocity_constraints(ctx),
            JointKind::Weld(j) => j.init_velocity_constraints(ctx),
            JointKind::Mouse(j) => j.init_velocity_constraints(ctx),
            JointKind::Rope(j) => j.init_velocity_constraints(ctx),
            JointKind::Pulley(j) => j.init_velocity_constraints(ctx),
            JointKind::Gear(j) => j.init_velocity_constraints(ctx),
            JointKind::Wheel(j) => j.init_velocity_constraints(ctx),
            JointKind::Friction(j) => j.init_velocity_constraints(ctx),
            JointKind::Motor(j) => j.init_velocity_constraints(ctx),
        }
    }

    /// One velocity iteration. Returns true when the joint applied no
    /// meaningful new impulse.
    pub(crate) fn solve_velocity_constraints(&mut self, ctx: &mut JointCtx<'_>) -> bool {
        match &mut self.kind {
            JointKind::Revolute(j) => j.solve_velocity_constraints(ctx),
            JointKind::Prismatic(j) => j.solve_velocity_constraints(ctx),
            JointKind::Distance(j) => j.solve_velocity_constraints(ctx),
            JointKind::Weld(j) => j.solve_velocity_constraints(ctx),
            JointKind::Mouse(j) => j.solve_velocity_constraints(ctx),
            JointKind::Rope(j) => j.solve_velocity_constraints(ctx),
            JointKind::Pulley(j) => j.solve_velocity_constraints(ctx),
            JointKind::Gear(j) => j.solve_velocity_constraints(ctx),
            JointKind::Wheel(j) => j.solve_velocity_constraints(ctx),
            JointKind::Friction(j) => j.solve_velocity_constraints(ctx),
            JointKind::Motor(j) => j.solve_velocity_constraints(ctx),
        }
    }

    /// One position iteration. Returns true when the constraint error is
    /// within tolerance.
    pub(crate) fn solve_position_constraints(&mut self, ctx: &mut JointCtx<'_>) -> bool {
        match &mut self.kind {
            JointKind::Revolute(j) => j.solve_position_constraints(ctx),
            JointKind::Prismatic(j) => j.solve_position_constraints(ctx),
            JointKind::Distance(j) => j.solve_position_constraints(ctx),
            JointKind::Weld(j) => j.solve_position_constraints(ctx),
            JointKind::Mouse(j) => j.solve_position_constraints(ctx),
            JointKind::Rope(j) => j.solve_position_constraints(ctx),
            JointKind::Pulley(j) => j.solve_position_constraints(ctx),
            JointKind::Gear(j) => j.solve_position_constraints(ctx),
            JointKind::Wheel(j) => j.solve_position_constraints(ctx),
            JointKind::Friction(j) => j.solve_position_constraints(ctx),
            JointKind::Motor(j) => j.solve_position_constraints(ctx),
        }
    }

    /// The accumulated reaction force at the B anchor, in newtons.
    pub fn reaction_force(&self, inv_dt: f64) -> Vec2 {
        match &self.kind {
            JointKind::Revolute(j) => j.reaction_force(inv_dt),
            JointKind::Prismatic(j) => j.reaction_force(inv_dt),
            JointKind::Distance(j) => j.reaction_force(inv_dt),
            JointKind::Weld(j) => j.reaction_force(inv_dt),
            JointKind::Mouse(j) => j.reaction_force(inv_dt),
            JointKind::Rope(j) => j.reaction_force(inv_dt),
            JointKind::Pulley(j) => j.reaction_force(inv_dt),
            JointKind::Gear(j) => j.reaction_force(inv_dt),
            JointKind::Wheel(j) => j.reaction_force(inv_dt),
            JointKind::Friction(j) => j.reaction_force(inv_dt),
            JointKind::Motor(j) => j.reaction_force(inv_dt),
        }
    }

    /// The accumulated reaction torque on body B, in newton-metres.
    pub fn reaction_torque(&self, inv_dt: f64) -> f64 {
        match &self.kind {
            JointKind::Revolute(j) => j.reaction_torque(inv_dt),
            JointKind::Prismatic(j) => j.reaction_torque(inv_dt),
            JointKind::Distance(j) => j.reaction_torque(inv_dt),
            JointKind::Weld(j) => j.reaction_torque(inv_dt),
            JointKind::Mouse(j) => j.reaction_torque(inv_dt),
            JointKind::Rope(j) => j.reaction_torque(inv_dt),
            JointKind::Pulley(j) => j.reaction_torque(inv_dt),
            JointKind::Gear(j) => j.reaction_torque(inv_dt),
            JointKind::Wheel(j) => j.reaction_torque(inv_dt),
            JointKind::Friction(j) => j.reaction_torque(inv_dt),
            JointKind::Motor(j) => j.reaction_torque(inv_dt),
        }
    }
}
