//! Simulation: bodies, fixtures, contacts, joints, constraint solving, and
//! the world that steps them.

pub mod body;
pub use body::{Body, BodyDef, BodyType};

pub mod fixture;
pub use fixture::{Filter, Fixture, FixtureDef};

pub mod contact;
pub use contact::Contact;

pub mod island;

pub mod contact_solver;

pub mod joint;
pub use joint::{Joint, JointDef, JointKind};

pub mod world;
pub use world::{
    ContactImpulses, ContactListener, ListenerResponse, PreStepStats, QueryResponse,
    RayCastResponse, RegStepStats, StepStats, ToiStepStats, World, WorldError,
};

use thunderdome::Index;

macro_rules! arena_key {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
        pub struct $name(pub(crate) Index);
    };
}

arena_key! {
    /// Generational handle to a body owned by a [`World`].
    BodyKey
}
arena_key! {
    /// Generational handle to a fixture owned by a [`World`].
    FixtureKey
}
arena_key! {
    /// Generational handle to a contact owned by a [`World`].
    ContactKey
}
arena_key! {
    /// Generational handle to a joint owned by a [`World`].
    JointKey
}
