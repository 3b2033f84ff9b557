//! The world: owns all bodies, fixtures, contacts, and joints, and advances
//! them through time.

use super::body::{Body, BodyDef, BodyType};
use super::contact::Contact;
use super::contact_solver::{BodyConstraint, ContactSolver, ContactSolverDef};
use super::fixture::{Fixture, FixtureDef, FixtureProxy};
use super::island::{self, Island};
use super::joint::{gear::GearAxis, Joint, JointCtx, JointDef, JointKind};
use super::{BodyKey, ContactKey, FixtureKey, JointKey};
use crate::collision::broad_phase::BroadPhase;
use crate::collision::dynamic_tree::ProxyId;
use crate::collision::time_of_impact::{time_of_impact, ToiInput, ToiState};
use crate::collision::{
    collide_shapes, distance, Manifold, RayCastInput, Shape, WorldManifold, AABB,
};
use crate::math::{self as m, Transform, UnitVec2, Vec2, Velocity};
use crate::settings::{StepConf, WorldConf, MAX_BODIES, MAX_CONTACTS, MAX_JOINTS};

use itertools::izip;
use thunderdome::Arena;

/// The ways a world mutation can be refused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum WorldError {
    /// A mutating operation was attempted while the world is mid-step.
    /// Nothing was changed.
    #[error("world is locked during a step")]
    Locked,
    /// A definition contained a non-finite number, an invalid shape, or a
    /// stale key.
    #[error("invalid argument")]
    InvalidArgument,
    /// Creating the object would exceed a hard capacity limit.
    #[error("capacity exceeded")]
    CapacityExceeded,
}

/// Answer from a pre-solve callback.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ListenerResponse {
    Keep,
    /// Skip collision response for this contact this step.
    Disable,
}

/// Answer from an AABB query callback.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QueryResponse {
    Continue,
    Stop,
}

/// Answer from a ray cast callback after a reported hit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RayCastResponse {
    /// Stop the cast entirely.
    Terminate,
    /// Pretend this fixture wasn't hit; keep the current ray length.
    Ignore,
    /// Shorten the ray to the reported hit.
    Clip,
    /// Restore the ray to its full length.
    Reset,
}

/// Accumulated impulses of one contact, reported to post-solve listeners.
#[derive(Clone, Copy, Debug, Default)]
pub struct ContactImpulses {
    pub normal: [f64; 2],
    pub tangent: [f64; 2],
    pub count: usize,
}

/// Receives simulation events.
///
/// Callbacks run synchronously during the step with the world locked: the
/// world reference they receive answers queries, but mutations return
/// [`WorldError::Locked`].
#[allow(unused_variables)]
pub trait ContactListener {
    /// Two fixtures began touching.
    fn begin_contact(&mut self, world: &mut World, contact: ContactKey) {}
    /// Two fixtures stopped touching (or their contact is being destroyed).
    fn end_contact(&mut self, world: &mut World, contact: ContactKey) {}
    /// A touching contact is about to be solved. Return
    /// [`ListenerResponse::Disable`] to skip its collision response.
    fn pre_solve(
        &mut self,
        world: &mut World,
        contact: ContactKey,
        old_manifold: &Manifold,
    ) -> ListenerResponse {
        ListenerResponse::Keep
    }
    /// An island containing this contact has been solved.
    fn post_solve(&mut self, world: &mut World, contact: ContactKey, impulses: &ContactImpulses) {}
    /// A fixture is being destroyed implicitly (its body is going away).
    fn say_goodbye_fixture(&mut self, world: &mut World, fixture: FixtureKey) {}
    /// A joint is being destroyed implicitly (an attached body is going
    /// away, or a joint it references was destroyed).
    fn say_goodbye_joint(&mut self, world: &mut World, joint: JointKey) {}
}

type ListenerSlot = Option<Box<dyn ContactListener>>;

//
// Step statistics
//

/// Counters from the pre-solve phase of a step.
#[derive(Clone, Copy, Debug, Default)]
pub struct PreStepStats {
    pub contacts_destroyed: u32,
    pub contacts_added: u32,
    pub contacts_ignored: u32,
    pub contacts_updated: u32,
    pub contacts_skipped: u32,
}

/// Counters from the regular (discrete) solver phase.
#[derive(Clone, Copy, Debug)]
pub struct RegStepStats {
    pub islands_found: u32,
    pub islands_solved: u32,
    pub sum_velocity_iterations: u32,
    pub sum_position_iterations: u32,
    pub bodies_slept: u32,
    pub proxies_moved: u32,
    pub contacts_added: u32,
    pub max_incremental_impulse: f64,
    pub min_separation: f64,
}

impl Default for RegStepStats {
    fn default() -> Self {
        Self {
            islands_found: 0,
            islands_solved: 0,
            sum_velocity_iterations: 0,
            sum_position_iterations: 0,
            bodies_slept: 0,
            proxies_moved: 0,
            contacts_added: 0,
            max_incremental_impulse: 0.0,
            min_separation: f64::INFINITY,
        }
    }
}

/// Counters from the continuous (time-of-impact) solver phase.
#[derive(Clone, Copy, Debug)]
pub struct ToiStepStats {
    pub islands_found: u32,
    pub islands_solved: u32,
    pub contacts_updated_toi: u32,
    pub contacts_at_max_sub_steps: u32,
    pub sum_velocity_iterations: u32,
    pub sum_position_iterations: u32,
    pub proxies_moved: u32,
    pub contacts_added: u32,
    pub max_incremental_impulse: f64,
    pub min_separation: f64,
}

impl Default for ToiStepStats {
    fn default() -> Self {
        Self {
            islands_found: 0,
            islands_solved: 0,
            contacts_updated_toi: 0,
            contacts_at_max_sub_steps: 0,
            sum_velocity_iterations: 0,
            sum_position_iterations: 0,
            proxies_moved: 0,
            contacts_added: 0,
            max_incremental_impulse: 0.0,
            min_separation: f64::INFINITY,
        }
    }
}

/// Everything one call to [`World::step`] did.
#[derive(Clone, Copy, Debug, Default)]
pub struct StepStats {
    pub pre: PreStepStats,
    pub reg: RegStepStats,
    pub toi: ToiStepStats,
}

#[derive(Clone, Copy, Debug)]
struct ProxyData {
    fixture: FixtureKey,
    child: usize,
}

#[derive(Clone, Copy, Debug, Default)]
struct IslandResults {
    velocity_iterations: u32,
    position_iterations: u32,
    max_incremental_impulse: f64,
    min_separation: f64,
    solved: bool,
    bodies_slept: u32,
}

/// A 2D physics world.
///
/// All simulation state lives here; [`step`](World::step) advances it. The
/// world is locked for the duration of a step: mutations attempted from
/// listener callbacks fail with [`WorldError::Locked`].
pub struct World {
    conf: WorldConf,
    bodies: Arena<Body>,
    fixtures: Arena<Fixture>,
    contacts: Arena<Contact>,
    joints: Arena<Joint>,
    broad_phase: BroadPhase<ProxyData>,
    listener: ListenerSlot,

    locked: bool,
    new_fixtures: bool,
    step_complete: bool,
    /// Inverse of the last non-zero time step.
    inv_dt0: f64,

    /// Reused DFS stack for island building.
    island_stack: Vec<BodyKey>,
    /// Reused buffer of candidate pairs from the broad phase.
    pair_buffer: Vec<(ProxyId, ProxyData, ProxyId, ProxyData)>,
}

impl Default for World {
    fn default() -> Self {
        Self::new(WorldConf::default())
    }
}

impl World {
    pub fn new(conf: WorldConf) -> Self {
        Self {
            conf,
            bodies: Arena::new(),
            fixtures: Arena::new(),
            contacts: Arena::new(),
            joints: Arena::new(),
            broad_phase: BroadPhase::new(),
            listener: None,
            locked: false,
            new_fixtures: false,
            step_complete: true,
            inv_dt0: 0.0,
            island_stack: Vec::new(),
            pair_buffer: Vec::new(),
        }
    }

    pub fn set_listener(&mut self, listener: Box<dyn ContactListener>) {
        self.listener = Some(listener);
    }

    pub fn gravity(&self) -> Vec2 {
        self.conf.gravity
    }

    pub fn set_gravity(&mut self, gravity: Vec2) -> Result<(), WorldError> {
        self.check_unlocked()?;
        self.conf.gravity = gravity;
        Ok(())
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// Inverse of the previous step's dt; zero before the first step.
    pub fn inv_dt0(&self) -> f64 {
        self.inv_dt0
    }

    fn check_unlocked(&self) -> Result<(), WorldError> {
        if self.locked {
            Err(WorldError::Locked)
        } else {
            Ok(())
        }
    }

    //
    // Bodies
    //

    pub fn create_body(&mut self, def: &BodyDef) -> Result<BodyKey, WorldError> {
        self.check_unlocked()?;
        if !def.has_valid_numbers() {
            return Err(WorldError::InvalidArgument);
        }
        if self.bodies.len() as u32 >= MAX_BODIES {
            return Err(WorldError::CapacityExceeded);
        }
        Ok(BodyKey(self.bodies.insert(Body::new(def))))
    }

    /// Destroy a body and everything attached to it. Attached joints and
    /// fixtures are reported to the listener's `say_goodbye` hooks.
    pub fn destroy_body(&mut self, key: BodyKey) -> Result<(), WorldError> {
        self.check_unlocked()?;
        if !self.bodies.contains(key.0) {
            return Err(WorldError::InvalidArgument);
        }
        let mut listener = self.listener.take();
        // listener callbacks fired during teardown must not mutate
        self.locked = true;

        let joints = self.bodies[key.0].joints.clone();
        for joint_key in joints {
            if self.joints.contains(joint_key.0) {
                if let Some(l) = listener.as_mut() {
                    l.say_goodbye_joint(self, joint_key);
                }
                self.destroy_joint_internal(joint_key, &mut listener);
            }
        }

        let contacts = self.bodies[key.0].contacts.clone();
        for contact_key in contacts {
            self.destroy_contact(contact_key, &mut listener);
        }

        let fixtures = self.bodies[key.0].fixtures.clone();
        for fixture_key in fixtures {
            if let Some(l) = listener.as_mut() {
                l.say_goodbye_fixture(self, fixture_key);
            }
            self.destroy_proxies(fixture_key);
            self.fixtures.remove(fixture_key.0);
        }

        self.bodies.remove(key.0);
        self.locked = false;
        self.listener = listener;
        Ok(())
    }

    pub fn body(&self, key: BodyKey) -> Option<&Body> {
        self.bodies.get(key.0)
    }

    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    pub fn body_keys(&self) -> impl Iterator<Item = BodyKey> + '_ {
        self.bodies.iter().map(|(index, _)| BodyKey(index))
    }

    /// Teleport a body, resetting its sweep.
    pub fn set_transform(&mut self, key: BodyKey, position: Vec2, angle: f64) -> Result<(), WorldError> {
        self.check_unlocked()?;
        if !self.bodies.contains(key.0) || !position.x.is_finite() || !position.y.is_finite() {
            return Err(WorldError::InvalidArgument);
        }
        self.bodies[key.0].set_transform_internal(position, angle);
        let conf = StepConf::default();
        self.synchronize_body_proxies(key, &conf);
        Ok(())
    }

    pub fn set_linear_velocity(&mut self, key: BodyKey, velocity: Vec2) -> Result<(), WorldError> {
        self.check_unlocked()?;
        let body = self.bodies.get_mut(key.0).ok_or(WorldError::InvalidArgument)?;
        if !body.is_speedable() {
            return Ok(());
        }
        if velocity != Vec2::zero() {
            body.set_awake();
        }
        body.velocity.linear = velocity;
        Ok(())
    }

    pub fn set_angular_velocity(&mut self, key: BodyKey, velocity: f64) -> Result<(), WorldError> {
        self.check_unlocked()?;
        let body = self.bodies.get_mut(key.0).ok_or(WorldError::InvalidArgument)?;
        if !body.is_speedable() {
            return Ok(());
        }
        if velocity != 0.0 {
            body.set_awake();
        }
        body.velocity.angular = velocity;
        Ok(())
    }

    /// Apply a force at the center of mass. Forces persist (as accelerations)
    /// until [`clear_forces`](World::clear_forces).
    pub fn apply_force_to_center(&mut self, key: BodyKey, force: Vec2) -> Result<(), WorldError> {
        self.check_unlocked()?;
        let body = self.bodies.get_mut(key.0).ok_or(WorldError::InvalidArgument)?;
        if !body.is_accelerable() {
            return Ok(());
        }
        body.set_awake();
        body.linear_acceleration += force * body.inv_mass;
        Ok(())
    }

    /// Apply a force at a world point, inducing torque about the center.
    pub fn apply_force(&mut self, key: BodyKey, force: Vec2, point: Vec2) -> Result<(), WorldError> {
        self.check_unlocked()?;
        let body = self.bodies.get_mut(key.0).ok_or(WorldError::InvalidArgument)?;
        if !body.is_accelerable() {
            return Ok(());
        }
        body.set_awake();
        body.linear_acceleration += force * body.inv_mass;
        body.angular_acceleration +=
            m::cross(point - body.sweep.pos1.linear, force) * body.inv_rot_inertia;
        Ok(())
    }

    pub fn apply_torque(&mut self, key: BodyKey, torque: f64) -> Result<(), WorldError> {
        self.check_unlocked()?;
        let body = self.bodies.get_mut(key.0).ok_or(WorldError::InvalidArgument)?;
        if !body.is_accelerable() {
            return Ok(());
        }
        body.set_awake();
        body.angular_acceleration += torque * body.inv_rot_inertia;
        Ok(())
    }

    /// Instantly change the body's velocity by an impulse at a world point.
    pub fn apply_linear_impulse(
        &mut self,
        key: BodyKey,
        impulse: Vec2,
        point: Vec2,
    ) -> Result<(), WorldError> {
        self.check_unlocked()?;
        let body = self.bodies.get_mut(key.0).ok_or(WorldError::InvalidArgument)?;
        if !body.is_accelerable() {
            return Ok(());
        }
        body.set_awake();
        body.velocity.linear += impulse * body.inv_mass;
        body.velocity.angular +=
            m::cross(point - body.sweep.pos1.linear, impulse) * body.inv_rot_inertia;
        Ok(())
    }

    pub fn apply_angular_impulse(&mut self, key: BodyKey, impulse: f64) -> Result<(), WorldError> {
        self.check_unlocked()?;
        let body = self.bodies.get_mut(key.0).ok_or(WorldError::InvalidArgument)?;
        if !body.is_accelerable() {
            return Ok(());
        }
        body.set_awake();
        body.velocity.angular += impulse * body.inv_rot_inertia;
        Ok(())
    }

    /// Zero the accumulated accelerations of every body.
    pub fn clear_forces(&mut self) -> Result<(), WorldError> {
        self.check_unlocked()?;
        for (_, body) in self.bodies.iter_mut() {
            body.linear_acceleration = Vec2::zero();
            body.angular_acceleration = 0.0;
        }
        Ok(())
    }

    pub fn set_awake(&mut self, key: BodyKey) -> Result<(), WorldError> {
        self.check_unlocked()?;
        let body = self.bodies.get_mut(key.0).ok_or(WorldError::InvalidArgument)?;
        body.set_awake();
        Ok(())
    }

    pub fn put_to_sleep(&mut self, key: BodyKey) -> Result<(), WorldError> {
        self.check_unlocked()?;
        let body = self.bodies.get_mut(key.0).ok_or(WorldError::InvalidArgument)?;
        body.unset_awake();
        Ok(())
    }

    pub fn set_bullet(&mut self, key: BodyKey, bullet: bool) -> Result<(), WorldError> {
        self.check_unlocked()?;
        if !self.bodies.contains(key.0) {
            return Err(WorldError::InvalidArgument);
        }
        self.bodies[key.0].bullet = bullet;
        self.refresh_contact_impenetrability(key);
        Ok(())
    }

    pub fn set_sleeping_allowed(&mut self, key: BodyKey, allowed: bool) -> Result<(), WorldError> {
        self.check_unlocked()?;
        let body = self.bodies.get_mut(key.0).ok_or(WorldError::InvalidArgument)?;
        body.auto_sleep = allowed;
        if !allowed {
            body.set_awake();
        }
        Ok(())
    }

    /// Change a body's type, rebuilding its contacts and mass data.
    pub fn set_body_type(&mut self, key: BodyKey, body_type: BodyType) -> Result<(), WorldError> {
        self.check_unlocked()?;
        if !self.bodies.contains(key.0) {
            return Err(WorldError::InvalidArgument);
        }
        if self.bodies[key.0].body_type == body_type {
            return Ok(());
        }

        {
            let body = &mut self.bodies[key.0];
            body.body_type = body_type;
            if !body_type.is_speedable() {
                body.velocity = Velocity::default();
                body.sweep.pos0 = body.sweep.pos1;
                body.under_active_time = 0.0;
                body.awake = false;
            } else {
                body.set_awake();
            }
            if !body_type.is_accelerable() {
                body.linear_acceleration = Vec2::zero();
                body.angular_acceleration = 0.0;
            }
        }
        self.reset_mass_data(key);
        self.refresh_contact_impenetrability(key);

        // existing contacts are stale under the new type
        let mut listener = self.listener.take();
        self.locked = true;
        let contacts = self.bodies[key.0].contacts.clone();
        for contact_key in contacts {
            self.destroy_contact(contact_key, &mut listener);
        }
        self.locked = false;
        self.listener = listener;

        // retouch proxies so the broad phase re-pairs this body
        let fixtures = self.bodies[key.0].fixtures.clone();
        for fixture_key in fixtures {
            for i in 0..self.fixtures[fixture_key.0].proxies.len() {
                let proxy_id = self.fixtures[fixture_key.0].proxies[i].proxy_id;
                self.broad_phase.touch_proxy(proxy_id);
            }
        }
        self.new_fixtures = true;
        Ok(())
    }

    pub fn set_enabled(&mut self, key: BodyKey, enabled: bool) -> Result<(), WorldError> {
        self.check_unlocked()?;
        if !self.bodies.contains(key.0) {
            return Err(WorldError::InvalidArgument);
        }
        if self.bodies[key.0].enabled == enabled {
            return Ok(());
        }
        self.bodies[key.0].enabled = enabled;

        let fixtures = self.bodies[key.0].fixtures.clone();
        if enabled {
            for fixture_key in fixtures {
                self.create_proxies(fixture_key);
            }
            self.new_fixtures = true;
        } else {
            for fixture_key in fixtures {
                self.destroy_proxies(fixture_key);
            }
            let mut listener = self.listener.take();
            self.locked = true;
            let contacts = self.bodies[key.0].contacts.clone();
            for contact_key in contacts {
                self.destroy_contact(contact_key, &mut listener);
            }
            self.locked = false;
            self.listener = listener;
        }
        Ok(())
    }

    fn refresh_contact_impenetrability(&mut self, key: BodyKey) {
        let contacts = self.bodies[key.0].contacts.clone();
        for contact_key in contacts {
            let (a, b) = {
                let c = &self.contacts[contact_key.0];
                (c.body_a, c.body_b)
            };
            let flag =
                self.bodies[a.0].is_impenetrable() || self.bodies[b.0].is_impenetrable();
            self.contacts[contact_key.0].is_impenetrable = flag;
        }
    }

    //
    // Fixtures
    //

    pub fn create_fixture(
        &mut self,
        body_key: BodyKey,
        shape: Shape,
        def: &FixtureDef,
    ) -> Result<FixtureKey, WorldError> {
        self.check_unlocked()?;
        if !self.bodies.contains(body_key.0) || !def.has_valid_numbers() {
            return Err(WorldError::InvalidArgument);
        }
        let vertex_radius = shape.vertex_radius();
        if vertex_radius < self.conf.min_vertex_radius
            || vertex_radius > self.conf.max_vertex_radius
        {
            return Err(WorldError::InvalidArgument);
        }

        let fixture_key = FixtureKey(self.fixtures.insert(Fixture::new(body_key, shape, def)));
        self.bodies[body_key.0].fixtures.push(fixture_key);

        if self.bodies[body_key.0].enabled {
            self.create_proxies(fixture_key);
        }
        self.reset_mass_data(body_key);
        self.bodies[body_key.0].set_awake();
        self.new_fixtures = true;
        Ok(fixture_key)
    }

    pub fn destroy_fixture(&mut self, key: FixtureKey) -> Result<(), WorldError> {
        self.check_unlocked()?;
        if !self.fixtures.contains(key.0) {
            return Err(WorldError::InvalidArgument);
        }
        let body_key = self.fixtures[key.0].body;

        // drop contacts that involve this fixture
        let mut listener = self.listener.take();
        self.locked = true;
        let contacts = self.bodies[body_key.0].contacts.clone();
        for contact_key in contacts {
            let involved = {
                let c = &self.contacts[contact_key.0];
                c.fixture_a == key || c.fixture_b == key
            };
            if involved {
                self.destroy_contact(contact_key, &mut listener);
            }
        }
        self.locked = false;
        self.listener = listener;

        self.destroy_proxies(key);
        self.bodies[body_key.0].fixtures.retain(|&f| f != key);
        self.fixtures.remove(key.0);
        self.reset_mass_data(body_key);
        self.bodies[body_key.0].set_awake();
        Ok(())
    }

    pub fn fixture(&self, key: FixtureKey) -> Option<&Fixture> {
        self.fixtures.get(key.0)
    }

    pub fn fixture_count(&self) -> usize {
        self.fixtures.len()
    }

    /// Change a fixture's collision filter. Existing contacts with it are
    /// re-checked on the next step.
    pub fn set_filter(
        &mut self,
        key: FixtureKey,
        filter: super::fixture::Filter,
    ) -> Result<(), WorldError> {
        self.check_unlocked()?;
        if !self.fixtures.contains(key.0) {
            return Err(WorldError::InvalidArgument);
        }
        self.fixtures[key.0].filter = filter;
        let body_key = self.fixtures[key.0].body;
        let contacts = self.bodies[body_key.0].contacts.clone();
        for contact_key in contacts {
            let c = &mut self.contacts[contact_key.0];
            if c.fixture_a == key || c.fixture_b == key {
                c.needs_filtering = true;
            }
        }
        for i in 0..self.fixtures[key.0].proxies.len() {
            let proxy_id = self.fixtures[key.0].proxies[i].proxy_id;
            self.broad_phase.touch_proxy(proxy_id);
        }
        Ok(())
    }

    fn create_proxies(&mut self, fixture_key: FixtureKey) {
        let body_key = self.fixtures[fixture_key.0].body;
        let xf = self.bodies[body_key.0].xf;
        let child_count = self.fixtures[fixture_key.0].shape.child_count();
        let extension = StepConf::default().aabb_extension;

        for child in 0..child_count {
            let aabb = self.fixtures[fixture_key.0].shape.compute_aabb(&xf, child);
            let proxy_id = self.broad_phase.create_proxy(
                aabb,
                ProxyData {
                    fixture: fixture_key,
                    child,
                },
                extension,
            );
            self.fixtures[fixture_key.0].proxies.push(FixtureProxy {
                aabb,
                proxy_id,
                child_index: child,
            });
        }
    }

    fn destroy_proxies(&mut self, fixture_key: FixtureKey) {
        let proxies = std::mem::take(&mut self.fixtures[fixture_key.0].proxies);
        for proxy in proxies {
            self.broad_phase.destroy_proxy(proxy.proxy_id);
        }
    }

    /// Recompute a body's mass properties from its fixtures.
    fn reset_mass_data(&mut self, body_key: BodyKey) {
        let (is_dynamic, fixed_rotation, fixtures) = {
            let body = &self.bodies[body_key.0];
            (
                body.is_accelerable(),
                body.fixed_rotation,
                body.fixtures.clone(),
            )
        };

        if !is_dynamic {
            let body = &mut self.bodies[body_key.0];
            body.inv_mass = 0.0;
            body.inv_rot_inertia = 0.0;
            body.sweep.local_center = Vec2::zero();
            let origin_pos = m::Position {
                linear: body.xf.p,
                angular: body.sweep.pos1.angular,
            };
            body.sweep.pos0 = origin_pos;
            body.sweep.pos1 = origin_pos;
            return;
        }

        let mut mass = 0.0;
        let mut center = Vec2::zero();
        let mut inertia = 0.0;
        for fixture_key in &fixtures {
            let fixture = &self.fixtures[fixture_key.0];
            if fixture.density == 0.0 {
                continue;
            }
            let md = fixture.shape.mass_data(fixture.density);
            mass += md.mass;
            center += md.center * md.mass;
            inertia += md.inertia;
        }

        // force a minimum mass so dynamic bodies always respond to forces
        if mass > 0.0 {
            center /= mass;
        } else {
            mass = 1.0;
        }

        let body = &mut self.bodies[body_key.0];
        body.inv_mass = 1.0 / mass;
        if inertia > 0.0 && !fixed_rotation {
            // shift inertia from the body origin to the center of mass
            let inertia_about_center = inertia - mass * center.mag_sq();
            body.inv_rot_inertia = if inertia_about_center > 0.0 {
                1.0 / inertia_about_center
            } else {
                0.0
            };
        } else {
            body.inv_rot_inertia = 0.0;
        }

        let old_center = body.sweep.pos1.linear;
        body.sweep.local_center = center;
        let new_center = body.xf.apply(center);
        body.sweep.pos0.linear = new_center;
        body.sweep.pos1.linear = new_center;
        // the velocity of the new center includes rotation about the old one
        body.velocity.linear += m::cross_sv(body.velocity.angular, new_center - old_center);
    }

    //
    // Joints
    //

    pub fn create_joint(&mut self, def: JointDef) -> Result<JointKey, WorldError> {
        self.check_unlocked()?;
        if !self.bodies.contains(def.body_a.0)
            || !self.bodies.contains(def.body_b.0)
            || def.body_a == def.body_b
        {
            return Err(WorldError::InvalidArgument);
        }
        if self.joints.len() as u32 >= MAX_JOINTS {
            return Err(WorldError::CapacityExceeded);
        }

        let mut joint = Joint::new(def);

        // gears snapshot their parent joints' geometry up front
        if let JointKind::Gear(_) = &joint.kind {
            self.bind_gear(&mut joint)?;
        }

        let body_a = joint.body_a;
        let body_b = joint.body_b;
        let collide_connected = joint.collide_connected;
        let key = JointKey(self.joints.insert(joint));
        self.bodies[body_a.0].joints.push(key);
        self.bodies[body_b.0].joints.push(key);
        self.bodies[body_a.0].set_awake();
        self.bodies[body_b.0].set_awake();

        if !collide_connected {
            // existing contacts between the pair must be filtered out
            let contacts = self.bodies[body_b.0].contacts.clone();
            for contact_key in contacts {
                let c = &mut self.contacts[contact_key.0];
                if (c.body_a == body_a && c.body_b == body_b)
                    || (c.body_a == body_b && c.body_b == body_a)
                {
                    c.needs_filtering = true;
                }
            }
        }
        Ok(key)
    }

    fn bind_gear(&mut self, joint: &mut Joint) -> Result<(), WorldError> {
        let (parent_a, parent_b) = match &joint.kind {
            JointKind::Gear(g) => (g.joint_a(), g.joint_b()),
            _ => unreachable!(),
        };
        let axis_from = |world: &World, parent_key: JointKey| -> Option<GearAxis> {
            let parent = world.joints.get(parent_key.0)?;
            let ground = world.bodies.get(parent.body_a.0)?;
            match &parent.kind {
                JointKind::Revolute(r) => Some(GearAxis::Revolute {
                    ground_angle: ground.sweep.pos1.angular,
                    reference_angle: r.reference_angle(),
                }),
                JointKind::Prismatic(p) => Some(GearAxis::Prismatic {
                    ground_pose: ground.xf,
                    ground_local_anchor: p.local_anchor_a(),
                    ground_local_axis: p.local_axis_a(),
                    body_local_anchor: p.local_anchor_b(),
                }),
                _ => None,
            }
        };
        let axis_a = axis_from(self, parent_a).ok_or(WorldError::InvalidArgument)?;
        let axis_b = axis_from(self, parent_b).ok_or(WorldError::InvalidArgument)?;
        let pose_a = self.bodies[joint.body_a.0].xf;
        let pose_b = self.bodies[joint.body_b.0].xf;
        if let JointKind::Gear(g) = &mut joint.kind {
            g.axis_a = Some(axis_a);
            g.axis_b = Some(axis_b);
            g.initialize_constant(&pose_a, &pose_b);
        }
        Ok(())
    }

    pub fn destroy_joint(&mut self, key: JointKey) -> Result<(), WorldError> {
        self.check_unlocked()?;
        if !self.joints.contains(key.0) {
            return Err(WorldError::InvalidArgument);
        }
        let mut listener = self.listener.take();
        self.locked = true;
        self.destroy_joint_internal(key, &mut listener);
        self.locked = false;
        self.listener = listener;
        Ok(())
    }

    fn destroy_joint_internal(&mut self, key: JointKey, listener: &mut ListenerSlot) {
        // gears referencing this joint die with it
        let dependents: Vec<JointKey> = self
            .joints
            .iter()
            .filter(|(_, j)| j.referenced_joints().contains(&Some(key)))
            .map(|(index, _)| JointKey(index))
            .collect();
        for dependent in dependents {
            if let Some(l) = listener.as_mut() {
                l.say_goodbye_joint(self, dependent);
            }
            self.destroy_joint_internal(dependent, listener);
        }

        let joint = match self.joints.remove(key.0) {
            Some(j) => j,
            None => return,
        };
        for body_key in [joint.body_a, joint.body_b] {
            if let Some(body) = self.bodies.get_mut(body_key.0) {
                body.joints.retain(|&j| j != key);
                body.set_awake();
            }
        }
        if !joint.collide_connected {
            // the pair may collide again; re-check any surviving contacts
            if let Some(body) = self.bodies.get(joint.body_b.0) {
                for contact_key in body.contacts.clone() {
                    let c = &mut self.contacts[contact_key.0];
                    if (c.body_a == joint.body_a && c.body_b == joint.body_b)
                        || (c.body_a == joint.body_b && c.body_b == joint.body_a)
                    {
                        c.needs_filtering = true;
                    }
                }
            }
        }
    }

    pub fn joint(&self, key: JointKey) -> Option<&Joint> {
        self.joints.get(key.0)
    }

    pub fn joint_mut(&mut self, key: JointKey) -> Option<&mut Joint> {
        self.joints.get_mut(key.0)
    }

    pub fn joint_count(&self) -> usize {
        self.joints.len()
    }

    //
    // Contacts
    //

    pub fn contact(&self, key: ContactKey) -> Option<&Contact> {
        self.contacts.get(key.0)
    }

    pub fn contact_mut(&mut self, key: ContactKey) -> Option<&mut Contact> {
        self.contacts.get_mut(key.0)
    }

    pub fn contact_count(&self) -> usize {
        self.contacts.len()
    }

    pub fn contact_keys(&self) -> impl Iterator<Item = ContactKey> + '_ {
        self.contacts.iter().map(|(index, _)| ContactKey(index))
    }

    pub fn touching_contact_count(&self) -> usize {
        self.contacts.iter().filter(|(_, c)| c.touching).count()
    }

    pub fn awake_body_count(&self) -> usize {
        self.bodies.iter().filter(|(_, b)| b.awake).count()
    }

    /// Whether the joint graph allows fixtures of these two bodies to
    /// collide, and at least one of the bodies is dynamic.
    fn bodies_should_collide(&self, a: BodyKey, b: BodyKey) -> bool {
        if !self.bodies[a.0].is_accelerable() && !self.bodies[b.0].is_accelerable() {
            return false;
        }
        for &joint_key in &self.bodies[b.0].joints {
            let joint = &self.joints[joint_key.0];
            let connects = (joint.body_a == a && joint.body_b == b)
                || (joint.body_a == b && joint.body_b == a);
            if connects && !joint.collide_connected {
                return false;
            }
        }
        true
    }

    fn find_new_contacts(&mut self) -> u32 {
        let mut pairs = std::mem::take(&mut self.pair_buffer);
        pairs.clear();
        self.broad_phase.update_pairs(|id_a, data_a, id_b, data_b| {
            pairs.push((id_a, data_a, id_b, data_b));
        });

        let mut added = 0;
        for &(id_a, data_a, id_b, data_b) in &pairs {
            if self.add_pair(id_a, data_a, id_b, data_b) {
                added += 1;
            }
        }
        self.pair_buffer = pairs;
        added
    }

    fn add_pair(
        &mut self,
        id_a: ProxyId,
        data_a: ProxyData,
        id_b: ProxyId,
        data_b: ProxyData,
    ) -> bool {
        if !self.fixtures.contains(data_a.fixture.0) || !self.fixtures.contains(data_b.fixture.0) {
            return false;
        }
        let body_a = self.fixtures[data_a.fixture.0].body;
        let body_b = self.fixtures[data_b.fixture.0].body;
        if body_a == body_b {
            return false;
        }
        if !self.bodies_should_collide(body_a, body_b) {
            return false;
        }
        {
            let filter_a = self.fixtures[data_a.fixture.0].filter;
            let filter_b = self.fixtures[data_b.fixture.0].filter;
            if !filter_a.should_collide(&filter_b) {
                return false;
            }
        }

        // search the body with fewer contacts for an existing pairing
        let pair = (id_a.min(id_b), id_a.max(id_b));
        let search = if self.bodies[body_a.0].contacts.len() < self.bodies[body_b.0].contacts.len()
        {
            body_a
        } else {
            body_b
        };
        for &contact_key in &self.bodies[search.0].contacts {
            if self.contacts[contact_key.0].proxy_pair == pair {
                return false;
            }
        }

        if self.contacts.len() as u32 >= MAX_CONTACTS {
            return false;
        }

        let is_sensor_pair =
            self.fixtures[data_a.fixture.0].is_sensor || self.fixtures[data_b.fixture.0].is_sensor;
        let is_impenetrable = self.bodies[body_a.0].is_impenetrable()
            || self.bodies[body_b.0].is_impenetrable();
        let contact = Contact::new(
            data_a.fixture,
            data_a.child,
            body_a,
            data_b.fixture,
            data_b.child,
            body_b,
            pair,
            self.fixtures[data_a.fixture.0].friction,
            self.fixtures[data_b.fixture.0].friction,
            self.fixtures[data_a.fixture.0].restitution,
            self.fixtures[data_b.fixture.0].restitution,
            is_impenetrable,
            is_sensor_pair,
        );
        let key = ContactKey(self.contacts.insert(contact));
        self.bodies[body_a.0].contacts.push(key);
        self.bodies[body_b.0].contacts.push(key);

        if !is_sensor_pair {
            self.bodies[body_a.0].set_awake();
            self.bodies[body_b.0].set_awake();
        }
        true
    }

    fn destroy_contact(&mut self, key: ContactKey, listener: &mut ListenerSlot) {
        let contact = match self.contacts.get(key.0) {
            Some(c) => c,
            None => return,
        };
        let (body_a, body_b, touching) = (contact.body_a, contact.body_b, contact.touching);
        if touching {
            if let Some(l) = listener.as_mut() {
                l.end_contact(self, key);
            }
            // separating bodies may settle differently; keep them simulating
            if let Some(b) = self.bodies.get_mut(body_a.0) {
                b.set_awake();
            }
            if let Some(b) = self.bodies.get_mut(body_b.0) {
                b.set_awake();
            }
        }
        if let Some(b) = self.bodies.get_mut(body_a.0) {
            b.contacts.retain(|&c| c != key);
        }
        if let Some(b) = self.bodies.get_mut(body_b.0) {
            b.contacts.retain(|&c| c != key);
        }
        self.contacts.remove(key.0);
    }

    /// Destroy contacts whose proxies no longer overlap or whose filtering
    /// now rejects the pair.
    fn destroy_stale_contacts(&mut self, listener: &mut ListenerSlot) -> u32 {
        let keys: Vec<ContactKey> = self.contact_keys().collect();
        let mut destroyed = 0;
        for key in keys {
            let (pair, needs_filtering, fixture_a, fixture_b, body_a, body_b) = {
                let c = &self.contacts[key.0];
                (
                    c.proxy_pair,
                    c.needs_filtering,
                    c.fixture_a,
                    c.fixture_b,
                    c.body_a,
                    c.body_b,
                )
            };
            if !self.broad_phase.test_overlap(pair.0, pair.1) {
                self.destroy_contact(key, listener);
                destroyed += 1;
                continue;
            }
            if needs_filtering {
                let filters_agree = {
                    let fa = &self.fixtures[fixture_a.0];
                    let fb = &self.fixtures[fixture_b.0];
                    fa.filter.should_collide(&fb.filter)
                };
                if !self.bodies_should_collide(body_a, body_b) || !filters_agree {
                    self.destroy_contact(key, listener);
                    destroyed += 1;
                    continue;
                }
                self.contacts[key.0].needs_filtering = false;
            }
        }
        destroyed
    }

    /// Recompute a contact's manifold from the bodies' current transforms,
    /// carry over matching impulses, and fire touch events.
    fn update_contact(&mut self, key: ContactKey, listener: &mut ListenerSlot) {
        let old_manifold = self.contacts[key.0].manifold;

        let (new_manifold, sensor_touching, is_sensor) = {
            let contact = &self.contacts[key.0];
            let fixture_a = &self.fixtures[contact.fixture_a.0];
            let fixture_b = &self.fixtures[contact.fixture_b.0];
            let xf_a = self.bodies[contact.body_a.0].xf;
            let xf_b = self.bodies[contact.body_b.0].xf;
            let proxy_a = fixture_a.shape.child_proxy(contact.child_a);
            let proxy_b = fixture_b.shape.child_proxy(contact.child_b);

            if contact.is_sensor_pair {
                let touching = distance::test_overlap(&proxy_a, xf_a, &proxy_b, xf_b);
                (Manifold::EMPTY, touching, true)
            } else {
                let mut manifold = collide_shapes(&proxy_a, xf_a, &proxy_b, xf_b);
                if manifold.is_touching() {
                    // chains are one-sided; cull hits on their back side
                    let radius_a = fixture_a.shape.vertex_radius();
                    let radius_b = fixture_b.shape.vertex_radius();
                    let world =
                        WorldManifold::new(&manifold, xf_a, radius_a, xf_b, radius_b);
                    if chain_backside(&fixture_a.shape, contact.child_a, &xf_a, world.normal, false)
                        || chain_backside(
                            &fixture_b.shape,
                            contact.child_b,
                            &xf_b,
                            world.normal,
                            true,
                        )
                    {
                        manifold = Manifold::EMPTY;
                    }
                }
                (manifold, false, false)
            }
        };

        let was_touching = self.contacts[key.0].touching;
        let now_touching = if is_sensor {
            let c = &mut self.contacts[key.0];
            c.manifold = Manifold::EMPTY;
            c.needs_updating = false;
            c.touching = sensor_touching;
            sensor_touching
        } else {
            self.contacts[key.0].replace_manifold(new_manifold)
        };

        if let Some(l) = listener.as_mut() {
            if now_touching != was_touching {
                if now_touching {
                    l.begin_contact(self, key);
                } else {
                    l.end_contact(self, key);
                }
            }
            if now_touching && !is_sensor {
                if l.pre_solve(self, key, &old_manifold) == ListenerResponse::Disable {
                    self.contacts[key.0].enabled = false;
                }
            }
        }
    }

    fn update_contacts(&mut self, listener: &mut ListenerSlot) -> (u32, u32, u32) {
        let keys: Vec<ContactKey> = self.contact_keys().collect();
        let (mut ignored, mut updated, mut skipped) = (0, 0, 0);
        for key in keys {
            let (awake, needs_updating) = {
                let c = &self.contacts[key.0];
                (
                    self.bodies[c.body_a.0].awake || self.bodies[c.body_b.0].awake,
                    c.needs_updating,
                )
            };
            if !awake {
                ignored += 1;
                continue;
            }
            self.contacts[key.0].enabled = true;
            if needs_updating {
                self.update_contact(key, listener);
                updated += 1;
            } else {
                skipped += 1;
            }
        }
        (ignored, updated, skipped)
    }

    /// Mark every contact of bodies that moved as needing a manifold
    /// refresh.
    fn flag_contacts_for_updating(&mut self) {
        for (_, contact) in self.contacts.iter_mut() {
            contact.needs_updating = true;
        }
    }

    //
    // Stepping
    //

    /// Advance the simulation by `conf.dt` seconds.
    ///
    /// Fails with [`WorldError::Locked`] when called re-entrantly from a
    /// listener callback; the world is unchanged in that case.
    pub fn step(&mut self, conf: &StepConf) -> Result<StepStats, WorldError> {
        self.check_unlocked()?;
        let _span = tracy_span!("world step", "step");

        self.locked = true;
        let mut listener = self.listener.take();
        let mut stats = StepStats::default();

        stats.pre.contacts_destroyed = self.destroy_stale_contacts(&mut listener);
        if self.new_fixtures {
            self.new_fixtures = false;
            stats.pre.contacts_added = self.find_new_contacts();
        }

        if conf.dt > 0.0 {
            self.inv_dt0 = conf.inv_dt();
            self.flag_contacts_for_updating();
            let (ignored, updated, skipped) = {
                let _span = tracy_span!("narrow phase", "step");
                self.update_contacts(&mut listener)
            };
            stats.pre.contacts_ignored = ignored;
            stats.pre.contacts_updated = updated;
            stats.pre.contacts_skipped = skipped;

            if self.step_complete {
                let _span = tracy_span!("solve islands", "step");
                stats.reg = self.solve_reg(conf, &mut listener);
            }
            if conf.do_toi {
                let _span = tracy_span!("solve toi", "step");
                stats.toi = self.solve_toi(conf, &mut listener);
            }
        }

        self.listener = listener;
        self.locked = false;
        Ok(stats)
    }

    fn solve_reg(&mut self, conf: &StepConf, listener: &mut ListenerSlot) -> RegStepStats {
        let mut stats = RegStepStats::default();

        for (_, body) in self.bodies.iter_mut() {
            body.islanded = false;
        }
        for (_, contact) in self.contacts.iter_mut() {
            contact.islanded = false;
        }
        for (_, joint) in self.joints.iter_mut() {
            joint.islanded = false;
        }

        let body_keys: Vec<BodyKey> = self.body_keys().collect();
        let mut stack = std::mem::take(&mut self.island_stack);
        for key in &body_keys {
            let eligible = {
                let body = &self.bodies[key.0];
                !body.islanded && body.awake && body.enabled && body.is_speedable()
            };
            if !eligible {
                continue;
            }
            stats.islands_found += 1;

            let fixtures = &self.fixtures;
            let island = island::build_island(
                *key,
                &mut self.bodies,
                &mut self.contacts,
                &mut self.joints,
                |contact| {
                    fixtures[contact.fixture_a.0].is_sensor
                        || fixtures[contact.fixture_b.0].is_sensor
                },
                &mut stack,
            );

            let results = self.solve_reg_island(conf, &island, listener);
            stats.max_incremental_impulse = stats
                .max_incremental_impulse
                .max(results.max_incremental_impulse);
            stats.min_separation = stats.min_separation.min(results.min_separation);
            stats.sum_velocity_iterations += results.velocity_iterations;
            stats.sum_position_iterations += results.position_iterations;
            stats.bodies_slept += results.bodies_slept;
            if results.solved {
                stats.islands_solved += 1;
            }
        }
        self.island_stack = stack;

        // moved bodies need fresh broad-phase data
        for key in &body_keys {
            let moved = {
                let body = &self.bodies[key.0];
                body.islanded && body.is_speedable()
            };
            if moved {
                stats.proxies_moved += self.synchronize_body_proxies(*key, conf);
            }
        }
        stats.contacts_added = self.find_new_contacts();
        stats
    }

    fn solve_reg_island(
        &mut self,
        conf: &StepConf,
        island: &Island,
        listener: &mut ListenerSlot,
    ) -> IslandResults {
        let mut results = IslandResults {
            velocity_iterations: conf.reg_velocity_iterations,
            position_iterations: conf.reg_position_iterations,
            min_separation: f64::INFINITY,
            ..IslandResults::default()
        };
        let h = conf.dt;
        let gravity = self.conf.gravity;

        // copy body state into solver-local buffers, integrating forces
        let mut body_constraints = Vec::with_capacity(island.bodies.len());
        for (i, &body_key) in island.bodies.iter().enumerate() {
            let body = &mut self.bodies[body_key.0];
            body.island_index = i;
            body.sweep.pos0 = body.sweep.pos1;
            let mut velocity = body.velocity;
            if body.is_accelerable() && body.awake {
                velocity.linear += (gravity + body.linear_acceleration) * h;
                velocity.angular += body.angular_acceleration * h;
                velocity.linear /= 1.0 + h * body.linear_damping;
                velocity.angular /= 1.0 + h * body.angular_damping;
            }
            body_constraints.push(BodyConstraint {
                position: body.sweep.pos1,
                velocity,
                inv_mass: body.inv_mass,
                inv_inertia: body.inv_rot_inertia,
                local_center: body.sweep.local_center,
            });
        }

        let contact_defs = self.gather_contact_defs(&island.contacts);
        let mut solver = ContactSolver::new(
            &contact_defs,
            &body_constraints,
            conf,
            if conf.do_warm_start { 1.0 } else { 0.0 },
        );
        if conf.do_warm_start {
            solver.warm_start(&mut body_constraints);
        }

        for &joint_key in &island.joints {
            let (index_a, index_b) = {
                let joint = &self.joints[joint_key.0];
                (
                    self.bodies[joint.body_a.0].island_index,
                    self.bodies[joint.body_b.0].island_index,
                )
            };
            let joint = &mut self.joints[joint_key.0];
            joint.index_a = index_a;
            joint.index_b = index_b;
            let mut ctx = JointCtx {
                bodies: &mut body_constraints,
                index_a,
                index_b,
                dt: h,
                inv_dt: conf.inv_dt(),
                warm_start: conf.do_warm_start,
            };
            joint.init_velocity_constraints(&mut ctx);
        }

        for i in 0..conf.reg_velocity_iterations {
            let mut joints_okay = true;
            for &joint_key in &island.joints {
                let joint = &mut self.joints[joint_key.0];
                let mut ctx = JointCtx {
                    bodies: &mut body_constraints,
                    index_a: joint.index_a,
                    index_b: joint.index_b,
                    dt: h,
                    inv_dt: conf.inv_dt(),
                    warm_start: conf.do_warm_start,
                };
                joints_okay &= joint.solve_velocity_constraints(&mut ctx);
            }
            let incremental = solver.solve_velocity_constraints(&mut body_constraints);
            results.max_incremental_impulse = results.max_incremental_impulse.max(incremental);
            if joints_okay && incremental == 0.0 {
                results.velocity_iterations = i + 1;
                break;
            }
        }

        integrate_positions(&mut body_constraints, h, conf);

        for i in 0..conf.reg_position_iterations {
            let min_separation = solver.solve_position_constraints(
                &mut body_constraints,
                conf.reg_resolution_rate,
                conf.linear_slop,
                conf.max_linear_correction,
            );
            results.min_separation = results.min_separation.min(min_separation);
            let contacts_okay = min_separation >= conf.reg_min_separation;

            let mut joints_okay = true;
            for &joint_key in &island.joints {
                let joint = &mut self.joints[joint_key.0];
                let mut ctx = JointCtx {
                    bodies: &mut body_constraints,
                    index_a: joint.index_a,
                    index_b: joint.index_b,
                    dt: h,
                    inv_dt: conf.inv_dt(),
                    warm_start: conf.do_warm_start,
                };
                joints_okay &= joint.solve_position_constraints(&mut ctx);
            }
            if contacts_okay && joints_okay {
                results.position_iterations = i + 1;
                results.solved = true;
                break;
            }
        }

        self.write_back_island(island, &body_constraints, &solver, listener, true);

        // sleeping
        if conf.min_still_time_to_sleep.is_finite() {
            let mut min_under_active = f64::INFINITY;
            for &body_key in &island.bodies {
                let body = &mut self.bodies[body_key.0];
                if !body.is_speedable() {
                    continue;
                }
                let still = body.auto_sleep
                    && body.is_under_active(
                        conf.linear_sleep_tolerance,
                        conf.angular_sleep_tolerance,
                    );
                if still && body.is_accelerable() {
                    body.under_active_time += h;
                    min_under_active = min_under_active.min(body.under_active_time);
                } else {
                    body.under_active_time = 0.0;
                    min_under_active = 0.0;
                }
            }
            if min_under_active >= conf.min_still_time_to_sleep && results.solved {
                for &body_key in &island.bodies {
                    let body = &mut self.bodies[body_key.0];
                    if body.is_speedable() && body.awake {
                        body.unset_awake();
                        results.bodies_slept += 1;
                    }
                }
            }
        }

        results
    }

    fn gather_contact_defs(&self, contacts: &[ContactKey]) -> Vec<ContactSolverDef> {
        contacts
            .iter()
            .map(|&contact_key| {
                let contact = &self.contacts[contact_key.0];
                ContactSolverDef {
                    contact_key,
                    manifold: contact.manifold,
                    index_a: self.bodies[contact.body_a.0].island_index,
                    index_b: self.bodies[contact.body_b.0].island_index,
                    friction: contact.friction,
                    restitution: contact.restitution,
                    tangent_speed: contact.tangent_speed,
                    radius_a: self.fixtures[contact.fixture_a.0].shape.vertex_radius(),
                    radius_b: self.fixtures[contact.fixture_b.0].shape.vertex_radius(),
                }
            })
            .collect()
    }

    /// Copy solved state back to bodies and manifolds; notify post-solve.
    fn write_back_island(
        &mut self,
        island: &Island,
        body_constraints: &[BodyConstraint],
        solver: &ContactSolver,
        listener: &mut ListenerSlot,
        store_impulses: bool,
    ) {
        for (&body_key, constraint) in izip!(&island.bodies, body_constraints) {
            let body = &mut self.bodies[body_key.0];
            body.velocity = constraint.velocity;
            body.sweep.pos1 = constraint.position;
            body.sweep.normalize_angles();
            body.synchronize_transform();
        }

        let mut reported: Vec<(ContactKey, ContactImpulses)> = Vec::new();
        solver.store_impulses(|contact_key, index, normal, tangent| {
            if store_impulses {
                let points = self.contacts[contact_key.0].manifold.points_mut();
                if index < points.len() {
                    points[index].normal_impulse = normal;
                    points[index].tangent_impulse = tangent;
                }
            }
            match reported.last_mut() {
                Some((key, impulses)) if *key == contact_key => {
                    impulses.normal[index] = normal;
                    impulses.tangent[index] = tangent;
                    impulses.count = impulses.count.max(index + 1);
                }
                _ => {
                    let mut impulses = ContactImpulses::default();
                    impulses.normal[index] = normal;
                    impulses.tangent[index] = tangent;
                    impulses.count = index + 1;
                    reported.push((contact_key, impulses));
                }
            }
        });

        if let Some(l) = listener.as_mut() {
            for (contact_key, impulses) in reported {
                l.post_solve(self, contact_key, &impulses);
            }
        }
    }

    fn synchronize_body_proxies(&mut self, key: BodyKey, conf: &StepConf) -> u32 {
        let (xf0, xf1, fixtures) = {
            let body = &self.bodies[key.0];
            (body.transform0(), body.xf, body.fixtures.clone())
        };
        let displacement = xf1.p - xf0.p;
        let mut moved = 0;
        for fixture_key in fixtures {
            for i in 0..self.fixtures[fixture_key.0].proxies.len() {
                let (child, proxy_id) = {
                    let proxy = &self.fixtures[fixture_key.0].proxies[i];
                    (proxy.child_index, proxy.proxy_id)
                };
                let aabb = {
                    let shape = &self.fixtures[fixture_key.0].shape;
                    shape.compute_aabb(&xf0, child).union(&shape.compute_aabb(&xf1, child))
                };
                self.fixtures[fixture_key.0].proxies[i].aabb = aabb;
                if self.broad_phase.move_proxy(
                    proxy_id,
                    aabb,
                    displacement,
                    conf.aabb_extension,
                    conf.displace_multiplier,
                ) {
                    moved += 1;
                }
            }
        }
        moved
    }

    //
    // Continuous collision
    //

    fn solve_toi(&mut self, conf: &StepConf, listener: &mut ListenerSlot) -> ToiStepStats {
        let mut stats = ToiStepStats::default();

        if self.step_complete {
            for (_, body) in self.bodies.iter_mut() {
                body.islanded = false;
                body.sweep.alpha0 = 0.0;
            }
            for (_, contact) in self.contacts.iter_mut() {
                contact.islanded = false;
                contact.clear_toi();
            }
        }

        loop {
            let (updated, at_max) = self.update_contact_tois(conf);
            stats.contacts_updated_toi += updated;
            stats.contacts_at_max_sub_steps += at_max;

            // the soonest impact in the remainder of the step
            let mut min_toi = 1.0 - f64::EPSILON;
            let mut min_contact: Option<ContactKey> = None;
            for (index, contact) in self.contacts.iter() {
                if let Some(toi) = contact.toi {
                    if toi < min_toi {
                        min_toi = toi;
                        min_contact = Some(ContactKey(index));
                    }
                }
            }

            let contact_key = match min_contact {
                Some(key) => key,
                None => {
                    self.step_complete = true;
                    break;
                }
            };

            let results = self.solve_toi_contact(conf, contact_key, min_toi, listener);
            if let Some(results) = results {
                stats.islands_found += 1;
                stats.min_separation = stats.min_separation.min(results.min_separation);
                stats.max_incremental_impulse = stats
                    .max_incremental_impulse
                    .max(results.max_incremental_impulse);
                stats.sum_velocity_iterations += results.velocity_iterations;
                stats.sum_position_iterations += results.position_iterations;
                if results.solved {
                    stats.islands_solved += 1;
                }
            }

            // reset island flags and commit displaced bodies to the
            // broad phase
            let body_keys: Vec<BodyKey> = self.body_keys().collect();
            for key in body_keys {
                if !self.bodies[key.0].islanded {
                    continue;
                }
                self.bodies[key.0].islanded = false;
                if !self.bodies[key.0].is_accelerable() {
                    continue;
                }
                stats.proxies_moved += self.synchronize_body_proxies(key, conf);
                // invalidate cached TOIs of everything touching this body
                let contacts = self.bodies[key.0].contacts.clone();
                for contact_key in contacts {
                    let contact = &mut self.contacts[contact_key.0];
                    contact.islanded = false;
                    contact.toi = None;
                }
            }
            stats.contacts_added += self.find_new_contacts();
        }
        stats
    }

    /// Compute TOIs for eligible contacts lacking one. Returns
    /// `(updated, at_max_sub_steps)` counts.
    fn update_contact_tois(&mut self, conf: &StepConf) -> (u32, u32) {
        let keys: Vec<ContactKey> = self.contact_keys().collect();
        let mut updated = 0;
        let mut at_max = 0;

        for key in keys {
            let (eligible, body_a, body_b) = {
                let contact = &self.contacts[key.0];
                if contact.toi.is_some() {
                    continue;
                }
                let body_a = &self.bodies[contact.body_a.0];
                let body_b = &self.bodies[contact.body_b.0];
                let active = (body_a.awake && body_a.is_speedable())
                    || (body_b.awake && body_b.is_speedable());
                let eligible = contact.enabled
                    && !contact.is_sensor_pair
                    && active
                    && contact.is_impenetrable;
                (eligible, contact.body_a, contact.body_b)
            };
            if !eligible {
                continue;
            }
            if self.contacts[key.0].toi_count >= conf.max_sub_steps {
                at_max += 1;
                continue;
            }

            // bring both sweeps to the same start time
            let alpha0 = {
                let a0 = self.bodies[body_a.0].sweep.alpha0;
                let b0 = self.bodies[body_b.0].sweep.alpha0;
                a0.max(b0)
            };
            debug_assert!((0.0..1.0).contains(&alpha0));
            self.bodies[body_a.0].sweep.advance0(alpha0);
            self.bodies[body_b.0].sweep.advance0(alpha0);

            let output = {
                let contact = &self.contacts[key.0];
                let proxy_a = self.fixtures[contact.fixture_a.0]
                    .shape
                    .child_proxy(contact.child_a);
                let proxy_b = self.fixtures[contact.fixture_b.0]
                    .shape
                    .child_proxy(contact.child_b);
                time_of_impact(&ToiInput {
                    proxy_a: &proxy_a,
                    proxy_b: &proxy_b,
                    sweep_a: self.bodies[body_a.0].sweep,
                    sweep_b: self.bodies[body_b.0].sweep,
                    t_max: 1.0,
                    target_depth: conf.target_depth,
                    tolerance: conf.tolerance,
                    max_toi_iters: conf.max_toi_iters,
                    max_root_iters: conf.max_root_iters,
                    max_distance_iters: conf.max_distance_iters,
                })
            };

            // failures are coerced to "no impact this step"
            let toi = match output.state {
                ToiState::Touching | ToiState::Overlapped => {
                    (alpha0 + (1.0 - alpha0) * output.t).min(1.0)
                }
                ToiState::Separated | ToiState::Failed | ToiState::Unknown => 1.0,
            };
            self.contacts[key.0].toi = Some(toi);
            updated += 1;
        }
        (updated, at_max)
    }

    fn solve_toi_contact(
        &mut self,
        conf: &StepConf,
        contact_key: ContactKey,
        toi: f64,
        listener: &mut ListenerSlot,
    ) -> Option<IslandResults> {
        let (body_a_key, body_b_key) = {
            let contact = &self.contacts[contact_key.0];
            (contact.body_a, contact.body_b)
        };

        let backup_a = self.bodies[body_a_key.0].sweep;
        let backup_b = self.bodies[body_b_key.0].sweep;

        // move the pair to the impact time and refresh their manifold there
        self.bodies[body_a_key.0].advance(toi);
        self.bodies[body_b_key.0].advance(toi);
        self.contacts[contact_key.0].enabled = true;
        self.contacts[contact_key.0].needs_updating = true;
        self.update_contact(contact_key, listener);
        self.contacts[contact_key.0].toi = None;
        self.contacts[contact_key.0].toi_count += 1;

        let (enabled, touching) = {
            let contact = &self.contacts[contact_key.0];
            (contact.enabled, contact.touching)
        };
        if !enabled || !touching {
            // stale TOI: rewind and move on
            self.contacts[contact_key.0].enabled = false;
            self.bodies[body_a_key.0].sweep = backup_a;
            self.bodies[body_b_key.0].sweep = backup_b;
            self.bodies[body_a_key.0].synchronize_transform();
            self.bodies[body_b_key.0].synchronize_transform();
            return None;
        }

        self.bodies[body_a_key.0].set_awake();
        self.bodies[body_b_key.0].set_awake();

        // build a local island around the impact
        let mut island = Island::default();
        island.bodies.push(body_a_key);
        self.bodies[body_a_key.0].islanded = true;
        island.bodies.push(body_b_key);
        self.bodies[body_b_key.0].islanded = true;
        island.contacts.push(contact_key);
        self.contacts[contact_key.0].islanded = true;

        if self.bodies[body_a_key.0].is_accelerable() {
            self.process_contacts_for_toi(&mut island, body_a_key, toi, listener);
        }
        if self.bodies[body_b_key.0].is_accelerable() {
            self.process_contacts_for_toi(&mut island, body_b_key, toi, listener);
        }
        for &body_key in &island.bodies {
            if !self.bodies[body_key.0].is_speedable() {
                self.bodies[body_key.0].islanded = false;
            }
        }

        let sub_conf = StepConf {
            dt: (1.0 - toi) * conf.dt,
            ..*conf
        };
        Some(self.solve_toi_island(&sub_conf, &island, listener))
    }

    /// Grow a TOI island along the seed body's other contacts, advancing the
    /// bodies on the far side to the impact time.
    fn process_contacts_for_toi(
        &mut self,
        island: &mut Island,
        body_key: BodyKey,
        toi: f64,
        listener: &mut ListenerSlot,
    ) {
        let body_impenetrable = self.bodies[body_key.0].is_impenetrable();
        let contacts = self.bodies[body_key.0].contacts.clone();

        for contact_key in contacts {
            let (skip, other) = {
                let contact = &self.contacts[contact_key.0];
                let other = if contact.body_a == body_key {
                    contact.body_b
                } else {
                    contact.body_a
                };
                // only chase pairs that continuous collision cares about
                let relevant =
                    body_impenetrable || self.bodies[other.0].is_impenetrable();
                (
                    contact.islanded || contact.is_sensor_pair || !relevant,
                    other,
                )
            };
            if skip {
                continue;
            }

            let other_islanded = self.bodies[other.0].islanded;
            let backup = self.bodies[other.0].sweep;
            if !other_islanded {
                self.bodies[other.0].advance(toi);
            }

            self.contacts[contact_key.0].enabled = true;
            self.contacts[contact_key.0].needs_updating = true;
            self.update_contact(contact_key, listener);

            let (enabled, touching) = {
                let contact = &self.contacts[contact_key.0];
                (contact.enabled, contact.touching)
            };
            if !enabled || !touching {
                if !other_islanded {
                    self.bodies[other.0].sweep = backup;
                    self.bodies[other.0].synchronize_transform();
                }
                continue;
            }

            self.contacts[contact_key.0].islanded = true;
            island.contacts.push(contact_key);
            if !other_islanded {
                self.bodies[other.0].set_awake();
                self.bodies[other.0].islanded = true;
                island.bodies.push(other);
            }
        }
    }

    /// Solve a TOI island: positions first to separate the impact, then
    /// velocities, with no warm starting and no force integration.
    fn solve_toi_island(
        &mut self,
        conf: &StepConf,
        island: &Island,
        listener: &mut ListenerSlot,
    ) -> IslandResults {
        let mut results = IslandResults {
            velocity_iterations: conf.toi_velocity_iterations,
            position_iterations: conf.toi_position_iterations,
            min_separation: f64::INFINITY,
            ..IslandResults::default()
        };

        let mut body_constraints = Vec::with_capacity(island.bodies.len());
        for (i, &body_key) in island.bodies.iter().enumerate() {
            let body = &mut self.bodies[body_key.0];
            body.island_index = i;
            body_constraints.push(BodyConstraint {
                position: body.sweep.pos1,
                velocity: body.velocity,
                inv_mass: body.inv_mass,
                inv_inertia: body.inv_rot_inertia,
                local_center: body.sweep.local_center,
            });
        }

        let contact_defs = self.gather_contact_defs(&island.contacts);
        let mut solver = ContactSolver::new(&contact_defs, &body_constraints, conf, 0.0);

        for i in 0..conf.toi_position_iterations {
            let min_separation = solver.solve_position_constraints(
                &mut body_constraints,
                conf.toi_resolution_rate,
                conf.linear_slop,
                conf.max_linear_correction,
            );
            results.min_separation = results.min_separation.min(min_separation);
            if min_separation >= conf.toi_min_separation {
                results.position_iterations = i + 1;
                results.solved = true;
                break;
            }
        }

        // commit the corrected poses as the new sweep start
        for (&body_key, constraint) in izip!(&island.bodies, &body_constraints) {
            self.bodies[body_key.0].sweep.pos0 = constraint.position;
        }

        for i in 0..conf.toi_velocity_iterations {
            let incremental = solver.solve_velocity_constraints(&mut body_constraints);
            if incremental == 0.0 {
                results.velocity_iterations = i + 1;
                break;
            }
            results.max_incremental_impulse =
                results.max_incremental_impulse.max(incremental);
        }

        integrate_positions(&mut body_constraints, conf.dt, conf);

        // impulses from TOI sub-steps can be huge; don't warm start off them
        self.write_back_island(island, &body_constraints, &solver, listener, false);

        results
    }

    //
    // Queries
    //

    /// Visit every fixture child whose fat AABB overlaps `aabb`.
    pub fn query_aabb(
        &mut self,
        aabb: AABB,
        mut callback: impl FnMut(FixtureKey, usize) -> QueryResponse,
    ) {
        self.broad_phase.query(aabb, |_, data| {
            callback(data.fixture, data.child) == QueryResponse::Continue
        });
    }

    /// Cast a ray from `p1` to `p2`, reporting fixture hits with the hit
    /// point, surface normal, and fraction along the ray.
    pub fn ray_cast(
        &mut self,
        p1: Vec2,
        p2: Vec2,
        mut callback: impl FnMut(FixtureKey, usize, Vec2, UnitVec2, f64) -> RayCastResponse,
    ) {
        let input = RayCastInput::new(p1, p2);
        let fixtures = &self.fixtures;
        let bodies = &self.bodies;
        self.broad_phase.ray_cast(&input, |sub_input, _, data| {
            let fixture = match fixtures.get(data.fixture.0) {
                Some(f) => f,
                None => return sub_input.max_fraction,
            };
            let xf = bodies[fixture.body.0].xf;
            match fixture.shape.ray_cast(sub_input, &xf, data.child) {
                Some(hit) => {
                    let point = sub_input.point_at(hit.fraction);
                    match callback(data.fixture, data.child, point, hit.normal, hit.fraction) {
                        RayCastResponse::Terminate => 0.0,
                        RayCastResponse::Ignore => sub_input.max_fraction,
                        RayCastResponse::Clip => hit.fraction,
                        RayCastResponse::Reset => input.max_fraction,
                    }
                }
                None => sub_input.max_fraction,
            }
        });
    }

    /// Rebase every position in the world so that `new_origin` becomes the
    /// origin.
    pub fn shift_origin(&mut self, new_origin: Vec2) -> Result<(), WorldError> {
        self.check_unlocked()?;
        for (_, body) in self.bodies.iter_mut() {
            body.xf.p -= new_origin;
            body.sweep.pos0.linear -= new_origin;
            body.sweep.pos1.linear -= new_origin;
        }
        for (_, joint) in self.joints.iter_mut() {
            joint.shift_origin(new_origin);
        }
        let conf = StepConf::default();
        let keys: Vec<BodyKey> = self.body_keys().collect();
        for key in keys {
            self.synchronize_body_proxies(key, &conf);
        }
        Ok(())
    }

    /// Structural check of the broad-phase tree; meant for tests.
    pub fn validate_broad_phase(&self) -> bool {
        self.broad_phase.validate()
    }
}

/// Advance positions by velocity, clamping per-step translation and
/// rotation so fast bodies can't skip the narrow phase entirely.
fn integrate_positions(bodies: &mut [BodyConstraint], h: f64, conf: &StepConf) {
    for body in bodies {
        let mut velocity = body.velocity;
        let translation = velocity.linear * h;
        if translation.mag_sq() > conf.max_translation * conf.max_translation {
            velocity.linear *= conf.max_translation / translation.mag();
        }
        let rotation = velocity.angular * h;
        if rotation.abs() > conf.max_rotation {
            velocity.angular *= conf.max_rotation / rotation.abs();
        }
        body.velocity = velocity;
        body.position.linear += velocity.linear * h;
        body.position.angular += velocity.angular * h;
    }
}

/// Whether a contact normal points somewhere a chain child can't be hit
/// from: its back side, or an interior corner.
///
/// Chains are one-sided, and their ghost vertices say what the neighboring
/// edges look like: at a concave corner, normals leaning past the shared
/// vertex belong to the chain's interior and are discarded.
fn chain_backside(
    shape: &Shape,
    child: usize,
    xf: &Transform,
    world_normal: UnitVec2,
    is_b: bool,
) -> bool {
    let chain = match shape {
        Shape::Chain(chain) => chain,
        _ => return false,
    };
    let edge = chain.child_edge(child);
    let front = match edge.normal() {
        Some(n) => *n,
        None => return false,
    };
    // the world normal points from A to B
    let outgoing = if is_b { -*world_normal } else { *world_normal };
    let local_out = xf.q.inverse_rotate(outgoing);
    if local_out.dot(front) < 0.0 {
        return true;
    }

    // how far the normal has rotated off the face normal; face contacts
    // sit at zero
    let lean = m::cross(front, local_out);
    let e = edge.v1 - edge.v0;
    if let Some(ghost) = edge.ghost_next {
        let e_next = ghost - edge.v1;
        // concave corner at v1: normals rotated clockwise past the face
        // belong to the interior
        if m::cross(e, e_next) < 0.0 && lean < -1e-9 {
            return true;
        }
    }
    if let Some(ghost) = edge.ghost_prev {
        let e_prev = edge.v0 - ghost;
        if m::cross(e_prev, e) < 0.0 && lean > 1e-9 {
            return true;
        }
    }
    false
}
