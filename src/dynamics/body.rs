//! Rigid bodies.

use super::{ContactKey, FixtureKey, JointKey};
use crate::math::{Position, Sweep, Transform, Vec2, Velocity};

/// The type of a body determines how it is treated in physics updates.
///
/// Two capabilities derive from it: *speedable* bodies may carry velocity
/// (kinematic and dynamic), *accelerable* bodies respond to forces
/// (dynamic only).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde-types", derive(serde::Serialize, serde::Deserialize))]
pub enum BodyType {
    /// Does not respond to forces and cannot move.
    #[default]
    Static,
    /// Does not respond to forces but can be moved by setting its velocity.
    Kinematic,
    /// The default simulated body; responds to forces and collisions.
    Dynamic,
}

impl BodyType {
    /// Whether bodies of this type may have a non-zero velocity.
    #[inline]
    pub fn is_speedable(&self) -> bool {
        !matches!(self, BodyType::Static)
    }

    /// Whether forces and accelerations apply to bodies of this type.
    #[inline]
    pub fn is_accelerable(&self) -> bool {
        matches!(self, BodyType::Dynamic)
    }
}

/// Construction parameters for a body.
#[derive(Clone, Copy, Debug)]
#[cfg_attr(feature = "serde-types", derive(serde::Serialize, serde::Deserialize))]
pub struct BodyDef {
    pub body_type: BodyType,
    pub position: Vec2,
    pub angle: f64,
    pub linear_velocity: Vec2,
    pub angular_velocity: f64,
    pub linear_damping: f64,
    pub angular_damping: f64,
    /// Whether the body may be put to sleep when its island goes still.
    pub allow_sleep: bool,
    pub awake: bool,
    pub fixed_rotation: bool,
    /// Marks the body for continuous collision detection against other
    /// dynamic bodies.
    pub bullet: bool,
    pub enabled: bool,
}

impl Default for BodyDef {
    fn default() -> Self {
        Self {
            body_type: BodyType::Static,
            position: Vec2::zero(),
            angle: 0.0,
            linear_velocity: Vec2::zero(),
            angular_velocity: 0.0,
            linear_damping: 0.0,
            angular_damping: 0.0,
            allow_sleep: true,
            awake: true,
            fixed_rotation: false,
            bullet: false,
            enabled: true,
        }
    }
}

impl BodyDef {
    pub fn new(body_type: BodyType) -> Self {
        Self {
            body_type,
            ..Self::default()
        }
    }

    pub fn dynamic() -> Self {
        Self::new(BodyType::Dynamic)
    }

    pub fn kinematic() -> Self {
        Self::new(BodyType::Kinematic)
    }

    pub fn with_position(mut self, position: Vec2) -> Self {
        self.position = position;
        self
    }

    pub fn with_angle(mut self, angle: f64) -> Self {
        self.angle = angle;
        self
    }

    pub fn with_linear_velocity(mut self, velocity: Vec2) -> Self {
        self.linear_velocity = velocity;
        self
    }

    pub fn with_angular_velocity(mut self, velocity: f64) -> Self {
        self.angular_velocity = velocity;
        self
    }

    pub fn with_linear_damping(mut self, damping: f64) -> Self {
        self.linear_damping = damping;
        self
    }

    pub fn with_angular_damping(mut self, damping: f64) -> Self {
        self.angular_damping = damping;
        self
    }

    pub fn with_fixed_rotation(mut self, fixed: bool) -> Self {
        self.fixed_rotation = fixed;
        self
    }

    pub fn with_bullet(mut self, bullet: bool) -> Self {
        self.bullet = bullet;
        self
    }

    pub fn has_valid_numbers(&self) -> bool {
        self.position.x.is_finite()
            && self.position.y.is_finite()
            && self.angle.is_finite()
            && self.linear_velocity.x.is_finite()
            && self.linear_velocity.y.is_finite()
            && self.angular_velocity.is_finite()
            && self.linear_damping >= 0.0
            && self.angular_damping >= 0.0
    }
}

/// A rigid body: a pose, a motion state, and mass properties, plus the
/// fixtures attached to it.
///
/// Bodies are created through [`World::create_body`](crate::World::create_body)
/// and referenced by [`BodyKey`](super::BodyKey).
#[derive(Clone, Debug)]
pub struct Body {
    pub(crate) body_type: BodyType,
    /// The body origin transform, always equal to the sweep's pose at the
    /// end of the current step.
    pub(crate) xf: Transform,
    pub(crate) sweep: Sweep,
    pub(crate) velocity: Velocity,
    /// Acceleration applied each step (gravity plus applied forces).
    pub(crate) linear_acceleration: Vec2,
    pub(crate) angular_acceleration: f64,

    pub(crate) inv_mass: f64,
    pub(crate) inv_rot_inertia: f64,
    pub(crate) linear_damping: f64,
    pub(crate) angular_damping: f64,

    pub(crate) awake: bool,
    pub(crate) auto_sleep: bool,
    /// Marked for continuous collision detection.
    pub(crate) bullet: bool,
    pub(crate) fixed_rotation: bool,
    pub(crate) enabled: bool,
    pub(crate) mass_data_dirty: bool,

    /// Seconds this body has spent below the sleep velocity tolerances.
    pub(crate) under_active_time: f64,

    /// Attached fixtures in creation order.
    pub(crate) fixtures: Vec<FixtureKey>,
    /// Contacts involving this body's fixtures.
    pub(crate) contacts: Vec<ContactKey>,
    /// Joints attached to this body.
    pub(crate) joints: Vec<JointKey>,

    /// Transient mark used by the island builder.
    pub(crate) islanded: bool,
    /// This body's slot in the island currently being solved.
    pub(crate) island_index: usize,
}

impl Body {
    pub(crate) fn new(def: &BodyDef) -> Self {
        let xf = Transform::new(def.position, def.angle);
        let pos = Position {
            linear: def.position,
            angular: def.angle,
        };
        let speedable = def.body_type.is_speedable();
        Self {
            body_type: def.body_type,
            xf,
            sweep: Sweep {
                local_center: Vec2::zero(),
                pos0: pos,
                pos1: pos,
                alpha0: 0.0,
            },
            velocity: if speedable {
                Velocity {
                    linear: def.linear_velocity,
                    angular: def.angular_velocity,
                }
            } else {
                Velocity::default()
            },
            linear_acceleration: Vec2::zero(),
            angular_acceleration: 0.0,
            // a dynamic body defaults to unit mass until fixtures define it
            inv_mass: if def.body_type.is_accelerable() {
                1.0
            } else {
                0.0
            },
            inv_rot_inertia: 0.0,
            linear_damping: def.linear_damping,
            angular_damping: def.angular_damping,
            awake: def.awake && speedable,
            auto_sleep: def.allow_sleep,
            bullet: def.bullet,
            fixed_rotation: def.fixed_rotation,
            enabled: def.enabled,
            mass_data_dirty: false,
            under_active_time: 0.0,
            fixtures: Vec::new(),
            contacts: Vec::new(),
            joints: Vec::new(),
            islanded: false,
            island_index: 0,
        }
    }

    pub fn body_type(&self) -> BodyType {
        self.body_type
    }

    #[inline]
    pub fn is_speedable(&self) -> bool {
        self.body_type.is_speedable()
    }

    #[inline]
    pub fn is_accelerable(&self) -> bool {
        self.body_type.is_accelerable()
    }

    pub fn is_awake(&self) -> bool {
        self.awake
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Whether this body may not be tunneled through. Bullets are, and so
    /// are all non-speedable (static) bodies.
    pub fn is_impenetrable(&self) -> bool {
        self.bullet || !self.is_speedable()
    }

    pub fn is_fixed_rotation(&self) -> bool {
        self.fixed_rotation
    }

    /// The body origin transform (not the center of mass).
    pub fn transform(&self) -> Transform {
        self.xf
    }

    /// The motion of the body over the current step, as seen by continuous
    /// collision detection.
    pub fn sweep(&self) -> &Sweep {
        &self.sweep
    }

    pub fn position(&self) -> Vec2 {
        self.xf.p
    }

    pub fn angle(&self) -> f64 {
        self.sweep.pos1.angular
    }

    /// The world-space center of mass.
    pub fn world_center(&self) -> Vec2 {
        self.sweep.pos1.linear
    }

    pub fn local_center(&self) -> Vec2 {
        self.sweep.local_center
    }

    pub fn velocity(&self) -> Velocity {
        self.velocity
    }

    pub fn linear_velocity(&self) -> Vec2 {
        self.velocity.linear
    }

    pub fn angular_velocity(&self) -> f64 {
        self.velocity.angular
    }

    /// The mass in kilograms, or zero for non-dynamic bodies and bodies with
    /// infinite mass.
    pub fn mass(&self) -> f64 {
        if self.inv_mass != 0.0 {
            1.0 / self.inv_mass
        } else {
            0.0
        }
    }

    pub fn inv_mass(&self) -> f64 {
        self.inv_mass
    }

    pub fn inv_rot_inertia(&self) -> f64 {
        self.inv_rot_inertia
    }

    pub fn under_active_time(&self) -> f64 {
        self.under_active_time
    }

    pub fn fixtures(&self) -> &[FixtureKey] {
        &self.fixtures
    }

    pub fn contacts(&self) -> &[ContactKey] {
        &self.contacts
    }

    pub fn joints(&self) -> &[JointKey] {
        &self.joints
    }

    /// Map a point from body-local coordinates to world coordinates.
    pub fn world_point(&self, local: Vec2) -> Vec2 {
        self.xf.apply(local)
    }

    /// Map a world point into body-local coordinates.
    pub fn local_point(&self, world: Vec2) -> Vec2 {
        self.xf.apply_inverse(world)
    }

    /// The velocity of a world-space point attached to this body.
    pub fn velocity_at_point(&self, world_point: Vec2) -> Vec2 {
        self.velocity
            .point_velocity(world_point - self.sweep.pos1.linear)
    }

    //
    // crate-internal mutators, driven by the world and the solver
    //

    /// Wake the body up, resetting the stillness clock.
    pub(crate) fn set_awake(&mut self) {
        if self.is_speedable() {
            self.awake = true;
            self.under_active_time = 0.0;
        }
    }

    /// Put the body to sleep: zero its velocity but keep its position.
    pub(crate) fn unset_awake(&mut self) {
        if self.awake {
            self.awake = false;
            self.velocity = Velocity::default();
            self.under_active_time = 0.0;
            self.linear_acceleration = Vec2::zero();
            self.angular_acceleration = 0.0;
        }
    }

    /// Set the pose at the end of the step from the sweep.
    pub(crate) fn synchronize_transform(&mut self) {
        self.xf = self.sweep.transform_at(1.0);
    }

    /// The body origin transform at the start of the sweep.
    pub(crate) fn transform0(&self) -> Transform {
        self.sweep.transform_at(0.0)
    }

    /// Teleport the body, resetting its sweep to the new pose.
    pub(crate) fn set_transform_internal(&mut self, position: Vec2, angle: f64) {
        self.xf = Transform::new(position, angle);
        let center = self.xf.apply(self.sweep.local_center);
        let pos = Position {
            linear: center,
            angular: angle,
        };
        self.sweep.pos0 = pos;
        self.sweep.pos1 = pos;
        self.sweep.alpha0 = 0.0;
    }

    /// Advance the sweep to time `alpha` within the step and pin the pose
    /// there. Used by TOI sub-stepping.
    pub(crate) fn advance(&mut self, alpha: f64) {
        if alpha < 1.0 {
            self.sweep.advance0(alpha);
        }
        self.sweep.pos1 = self.sweep.pos0;
        self.xf = self.sweep.transform_at(1.0);
    }

    /// Whether this body's velocity is within the sleep tolerances.
    pub(crate) fn is_under_active(&self, lin_tol: f64, ang_tol: f64) -> bool {
        self.velocity.linear.mag_sq() <= lin_tol * lin_tol
            && self.velocity.angular * self.velocity.angular <= ang_tol * ang_tol
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_bodies_are_impenetrable_and_never_awake() {
        let b = Body::new(&BodyDef::default());
        assert!(b.is_impenetrable());
        assert!(!b.awake);
        assert!(!b.is_speedable());
        assert_eq!(b.inv_mass, 0.0);
    }

    #[test]
    fn dynamic_body_starts_with_unit_mass() {
        let b = Body::new(&BodyDef::dynamic().with_position(Vec2::new(1.0, 2.0)));
        assert!(b.awake);
        assert_eq!(b.mass(), 1.0);
        assert_eq!(b.position(), Vec2::new(1.0, 2.0));
        assert_eq!(b.transform(), b.sweep.transform_at(1.0));
    }

    #[test]
    fn sleep_zeroes_velocity_but_not_position() {
        let mut b = Body::new(
            &BodyDef::dynamic()
                .with_position(Vec2::new(3.0, 4.0))
                .with_linear_velocity(Vec2::new(1.0, 0.0)),
        );
        b.unset_awake();
        assert!(!b.awake);
        assert!(b.velocity.is_zero());
        assert_eq!(b.position(), Vec2::new(3.0, 4.0));

        // waking a static body is a no-op
        let mut s = Body::new(&BodyDef::default());
        s.set_awake();
        assert!(!s.awake);
    }

    #[test]
    fn advance_pins_the_sweep() {
        let mut b = Body::new(&BodyDef::dynamic());
        b.sweep.pos1 = Position {
            linear: Vec2::new(10.0, 0.0),
            angular: 1.0,
        };
        b.advance(0.5);
        assert_eq!(b.sweep.pos0, b.sweep.pos1);
        assert!((b.sweep.pos1.linear.x - 5.0).abs() < 1e-12);
        assert!((b.sweep.pos1.angular - 0.5).abs() < 1e-12);
        assert_eq!(b.transform(), b.sweep.transform_at(1.0));
    }
}
