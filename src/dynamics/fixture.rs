//! Fixtures: shapes attached to bodies with surface material and filtering.

use super::BodyKey;
use crate::collision::dynamic_tree::ProxyId;
use crate::collision::{Shape, AABB};

/// Collision filtering data.
///
/// Two fixtures collide when their category/mask bits accept each other,
/// unless they share a non-zero group index, which then forces the answer
/// (positive always collides, negative never).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde-types", derive(serde::Serialize, serde::Deserialize))]
pub struct Filter {
    pub category_bits: u16,
    pub mask_bits: u16,
    pub group_index: i16,
}

impl Default for Filter {
    fn default() -> Self {
        Self {
            category_bits: 0x0001,
            mask_bits: 0xFFFF,
            group_index: 0,
        }
    }
}

impl Filter {
    pub fn should_collide(&self, other: &Filter) -> bool {
        if self.group_index == other.group_index && self.group_index != 0 {
            return self.group_index > 0;
        }
        (self.mask_bits & other.category_bits) != 0 && (self.category_bits & other.mask_bits) != 0
    }
}

/// Material and filtering parameters for a fixture.
#[derive(Clone, Copy, Debug)]
#[cfg_attr(feature = "serde-types", derive(serde::Serialize, serde::Deserialize))]
pub struct FixtureDef {
    pub friction: f64,
    pub restitution: f64,
    /// Mass per square metre.
    pub density: f64,
    /// Sensors detect overlap but generate no collision response.
    pub is_sensor: bool,
    pub filter: Filter,
}

impl Default for FixtureDef {
    fn default() -> Self {
        Self {
            friction: 0.2,
            restitution: 0.0,
            density: 0.0,
            is_sensor: false,
            filter: Filter::default(),
        }
    }
}

impl FixtureDef {
    pub fn with_density(mut self, density: f64) -> Self {
        self.density = density;
        self
    }

    pub fn with_friction(mut self, friction: f64) -> Self {
        self.friction = friction;
        self
    }

    pub fn with_restitution(mut self, restitution: f64) -> Self {
        self.restitution = restitution;
        self
    }

    pub fn sensor(mut self) -> Self {
        self.is_sensor = true;
        self
    }

    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = filter;
        self
    }

    pub fn has_valid_numbers(&self) -> bool {
        self.friction.is_finite()
            && self.friction >= 0.0
            && self.restitution.is_finite()
            && self.density.is_finite()
            && self.density >= 0.0
    }
}

/// One broad-phase entry of a fixture: a leaf per shape child.
#[derive(Clone, Copy, Debug)]
pub struct FixtureProxy {
    pub aabb: AABB,
    pub proxy_id: ProxyId,
    pub child_index: usize,
}

/// A shape bound to a body.
#[derive(Clone, Debug)]
pub struct Fixture {
    pub(crate) body: BodyKey,
    pub(crate) shape: Shape,
    pub(crate) friction: f64,
    pub(crate) restitution: f64,
    pub(crate) density: f64,
    pub(crate) is_sensor: bool,
    pub(crate) filter: Filter,
    /// One entry per shape child while registered in the broad phase.
    pub(crate) proxies: Vec<FixtureProxy>,
}

impl Fixture {
    pub(crate) fn new(body: BodyKey, shape: Shape, def: &FixtureDef) -> Self {
        Self {
            body,
            shape,
            friction: def.friction,
            restitution: def.restitution,
            density: def.density,
            is_sensor: def.is_sensor,
            filter: def.filter,
            proxies: Vec::new(),
        }
    }

    pub fn body(&self) -> BodyKey {
        self.body
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn friction(&self) -> f64 {
        self.friction
    }

    pub fn restitution(&self) -> f64 {
        self.restitution
    }

    pub fn density(&self) -> f64 {
        self.density
    }

    pub fn is_sensor(&self) -> bool {
        self.is_sensor
    }

    pub fn filter(&self) -> Filter {
        self.filter
    }

    pub fn proxy_count(&self) -> usize {
        self.proxies.len()
    }
}

/// Default friction mixing: the geometric mean, so that one slippery
/// surface makes the pair slippery.
pub(crate) fn mix_friction(a: f64, b: f64) -> f64 {
    (a * b).sqrt()
}

/// Default restitution mixing: the bouncier surface wins.
pub(crate) fn mix_restitution(a: f64, b: f64) -> f64 {
    a.max(b)
}
