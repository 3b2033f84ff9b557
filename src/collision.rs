//! Geometry and spatial indexing: shapes, closest-point and manifold
//! computation, the broad-phase tree, and time-of-impact search.

pub mod aabb;
pub use aabb::AABB;

pub mod ray;
pub use ray::{RayCastInput, RayHit};

pub mod shape;
pub use shape::{Chain, Circle, DistanceProxy, Edge, MassData, Polygon, Shape};

pub mod distance;
pub use distance::{test_overlap, DistanceInput, DistanceOutput, SimplexCache};

pub mod manifold;
pub use manifold::{
    collide_shapes, ContactFeature, FeatureType, Manifold, ManifoldPoint, ManifoldType,
    WorldManifold,
};

pub mod dynamic_tree;
pub use dynamic_tree::{DynamicTree, ProxyId};

pub mod broad_phase;
pub use broad_phase::BroadPhase;

pub mod time_of_impact;
pub use time_of_impact::{time_of_impact, ToiInput, ToiOutput, ToiState};
