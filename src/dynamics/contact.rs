//! Contacts: persistent records of overlapping fixture pairs.

use super::fixture::{mix_friction, mix_restitution};
use super::{BodyKey, FixtureKey};
use crate::collision::dynamic_tree::ProxyId;
use crate::collision::Manifold;

/// A persistent pairing of two fixture children whose fat AABBs overlap.
///
/// The contact caches the manifold between the shapes so that contact-point
/// impulses survive from step to step (warm starting), and carries the
/// bookkeeping the TOI sub-stepper needs.
#[derive(Clone, Debug)]
pub struct Contact {
    pub(crate) fixture_a: FixtureKey,
    pub(crate) fixture_b: FixtureKey,
    pub(crate) child_a: usize,
    pub(crate) child_b: usize,
    pub(crate) body_a: BodyKey,
    pub(crate) body_b: BodyKey,
    /// Unordered broad-phase pair this contact was created for.
    pub(crate) proxy_pair: (ProxyId, ProxyId),

    pub(crate) manifold: Manifold,

    /// Cached time of impact for the current step, once computed.
    pub(crate) toi: Option<f64>,
    /// How many TOI sub-steps this contact has consumed this step.
    pub(crate) toi_count: u32,

    /// Cleared by the pre-solve listener to skip collision response.
    pub(crate) enabled: bool,
    pub(crate) touching: bool,
    /// Set when a fixture's filter changed and the pair must be re-checked.
    pub(crate) needs_filtering: bool,
    /// Set when the manifold is stale and must be recomputed.
    pub(crate) needs_updating: bool,
    /// Either body is impenetrable, so this pair participates in CCD.
    pub(crate) is_impenetrable: bool,
    pub(crate) is_sensor_pair: bool,
    /// Transient mark used by the island builder.
    pub(crate) islanded: bool,

    pub(crate) friction: f64,
    pub(crate) restitution: f64,
    /// Surface translation speed along the tangent, for conveyor-belt
    /// effects. Feeds the friction constraint only; restitution ignores it.
    pub(crate) tangent_speed: f64,
}

impl Contact {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        fixture_a: FixtureKey,
        child_a: usize,
        body_a: BodyKey,
        fixture_b: FixtureKey,
        child_b: usize,
        body_b: BodyKey,
        proxy_pair: (ProxyId, ProxyId),
        friction_a: f64,
        friction_b: f64,
        restitution_a: f64,
        restitution_b: f64,
        is_impenetrable: bool,
        is_sensor_pair: bool,
    ) -> Self {
        Self {
            fixture_a,
            fixture_b,
            child_a,
            child_b,
            body_a,
            body_b,
            proxy_pair,
            manifold: Manifold::EMPTY,
            toi: None,
            toi_count: 0,
            enabled: true,
            touching: false,
            needs_filtering: false,
            needs_updating: true,
            is_impenetrable,
            is_sensor_pair,
            islanded: false,
            friction: mix_friction(friction_a, friction_b),
            restitution: mix_restitution(restitution_a, restitution_b),
            tangent_speed: 0.0,
        }
    }

    pub fn fixture_a(&self) -> FixtureKey {
        self.fixture_a
    }

    pub fn fixture_b(&self) -> FixtureKey {
        self.fixture_b
    }

    pub fn child_a(&self) -> usize {
        self.child_a
    }

    pub fn child_b(&self) -> usize {
        self.child_b
    }

    pub fn body_a(&self) -> BodyKey {
        self.body_a
    }

    pub fn body_b(&self) -> BodyKey {
        self.body_b
    }

    pub fn manifold(&self) -> &Manifold {
        &self.manifold
    }

    pub fn is_touching(&self) -> bool {
        self.touching
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn friction(&self) -> f64 {
        self.friction
    }

    /// Override the mixed friction coefficient for this contact.
    pub fn set_friction(&mut self, friction: f64) {
        self.friction = friction;
    }

    pub fn restitution(&self) -> f64 {
        self.restitution
    }

    /// Override the mixed restitution coefficient for this contact.
    pub fn set_restitution(&mut self, restitution: f64) {
        self.restitution = restitution;
    }

    pub fn tangent_speed(&self) -> f64 {
        self.tangent_speed
    }

    /// Set the conveyor-belt surface speed, in metres per second along the
    /// contact tangent.
    pub fn set_tangent_speed(&mut self, speed: f64) {
        self.tangent_speed = speed;
    }

    pub fn toi(&self) -> Option<f64> {
        self.toi
    }

    /// Replace the cached manifold, carrying accumulated impulses over to
    /// any new point whose contact feature matches an old one.
    ///
    /// Returns whether the contact is now touching.
    pub(crate) fn replace_manifold(&mut self, mut new_manifold: Manifold) -> bool {
        let old = &self.manifold;
        for new_point in new_manifold.points_mut() {
            if let Some(old_point) = old
                .points()
                .iter()
                .find(|p| p.feature == new_point.feature)
            {
                new_point.normal_impulse = old_point.normal_impulse;
                new_point.tangent_impulse = old_point.tangent_impulse;
            }
        }
        self.manifold = new_manifold;
        self.needs_updating = false;
        self.touching = self.manifold.is_touching();
        self.touching
    }

    /// Forget the TOI computed for the current step.
    pub(crate) fn clear_toi(&mut self) {
        self.toi = None;
        self.toi_count = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collision::shape::{Polygon, Shape};
    use crate::collision::{collide_shapes, ContactFeature};
    use crate::math::{Transform, Vec2};
    use thunderdome::Arena;

    fn dummy_contact() -> Contact {
        // arena only used to mint plausible keys
        let mut arena = Arena::new();
        let k1 = arena.insert(());
        let k2 = arena.insert(());
        Contact::new(
            FixtureKey(k1),
            0,
            BodyKey(k1),
            FixtureKey(k2),
            0,
            BodyKey(k2),
            (0, 1),
            0.5,
            0.5,
            0.0,
            1.0,
            false,
            false,
        )
    }

    #[test]
    fn friction_and_restitution_mixing_defaults() {
        let c = dummy_contact();
        assert!((c.friction() - 0.5).abs() < 1e-12);
        assert_eq!(c.restitution(), 1.0);
    }

    #[test]
    fn impulses_carry_over_by_matching_feature() {
        let shape = Shape::Polygon(Polygon::new_box(1.0, 1.0));
        let xf_b = Transform::new(Vec2::new(1.5, 0.0), 0.0);
        let manifold = collide_shapes(
            &shape.child_proxy(0),
            Transform::IDENTITY,
            &shape.child_proxy(0),
            xf_b,
        );
        assert_eq!(manifold.point_count(), 2);

        let mut contact = dummy_contact();
        assert!(contact.replace_manifold(manifold));

        // pretend the solver accumulated impulses
        for (i, p) in contact.manifold.points_mut().iter_mut().enumerate() {
            p.normal_impulse = 10.0 + i as f64;
            p.tangent_impulse = 1.0 + i as f64;
        }
        let features: Vec<ContactFeature> =
            contact.manifold.points().iter().map(|p| p.feature).collect();

        // a fresh manifold from slightly moved shapes keeps the features
        let manifold2 = collide_shapes(
            &shape.child_proxy(0),
            Transform::IDENTITY,
            &shape.child_proxy(0),
            Transform::new(Vec2::new(1.51, 0.0), 0.0),
        );
        assert!(contact.replace_manifold(manifold2));

        for p in contact.manifold.points() {
            let idx = features.iter().position(|f| *f == p.feature).unwrap();
            assert_eq!(p.normal_impulse, 10.0 + idx as f64);
            assert_eq!(p.tangent_impulse, 1.0 + idx as f64);
        }
    }

    #[test]
    fn unmatched_points_start_cold() {
        let shape = Shape::Polygon(Polygon::new_box(1.0, 1.0));
        let mut contact = dummy_contact();
        let manifold = collide_shapes(
            &shape.child_proxy(0),
            Transform::IDENTITY,
            &shape.child_proxy(0),
            Transform::new(Vec2::new(1.5, 0.0), 0.0),
        );
        contact.replace_manifold(manifold);
        for p in contact.manifold.points_mut() {
            p.normal_impulse = 5.0;
        }
        // a completely different configuration yields different features
        let manifold2 = collide_shapes(
            &shape.child_proxy(0),
            Transform::IDENTITY,
            &shape.child_proxy(0),
            Transform::new(Vec2::new(0.0, 1.5), 0.0),
        );
        contact.replace_manifold(manifold2);
        for p in contact.manifold.points() {
            assert_eq!(p.normal_impulse, 0.0);
        }
    }
}
