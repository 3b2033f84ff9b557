//! ballast2d is an impulse-based 2D rigid body physics library: a dynamic
//! AABB tree broad phase, feature-tagged contact manifolds, sequential
//! impulse constraint solving over islands, and conservative-advancement
//! continuous collision detection.
//!
//! The entry point is [`World`]: create bodies, attach fixtures and joints,
//! then call [`World::step`] once per frame.

#[macro_use]
mod tracy_helpers {
    macro_rules! tracy_span {
        ($name: literal, $func_name: literal) => {
            tracy_client::span!($name)
        };
    }
}

pub mod math;

pub mod settings;
pub use settings::{StepConf, WorldConf};

pub mod collision;
pub use collision::{Chain, Circle, Edge, Manifold, Polygon, Shape, AABB};

pub mod dynamics;
pub use dynamics::{
    Body, BodyDef, BodyKey, BodyType, Contact, ContactKey, ContactListener, Filter, Fixture,
    FixtureDef, FixtureKey, Joint, JointDef, JointKey, JointKind, StepStats, World, WorldError,
};
