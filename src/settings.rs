//! Step configuration and global tuning limits.

use crate::math::Vec2;

use std::f64::consts::PI;

/// Baseline length tolerance in metres. Most other tolerances derive from it.
pub const LINEAR_SLOP: f64 = 0.005;
/// Baseline angle tolerance in radians (about 2 degrees).
pub const ANGULAR_SLOP: f64 = 2.0 / 180.0 * PI;
/// Maximum vertex count of a convex polygon shape.
pub const MAX_POLYGON_VERTICES: usize = 8;
/// Maximum number of contact points between two shapes.
pub const MAX_MANIFOLD_POINTS: usize = 2;

/// Creation caps. Creating past these returns no handle rather than failing
/// the step.
pub const MAX_BODIES: u32 = 0xFFFF;
pub const MAX_JOINTS: u32 = 0xFFFF;
pub const MAX_CONTACTS: u32 = 0xFFFF_FFF0;

/// World-level construction parameters.
#[derive(Clone, Copy, Debug)]
#[cfg_attr(feature = "serde-types", derive(serde::Serialize, serde::Deserialize))]
pub struct WorldConf {
    /// Acceleration applied to every accelerable body, in m/s².
    pub gravity: Vec2,
    /// Smallest vertex radius a shape in this world may have.
    pub min_vertex_radius: f64,
    /// Largest vertex radius a shape in this world may have.
    pub max_vertex_radius: f64,
}

impl Default for WorldConf {
    fn default() -> Self {
        Self {
            gravity: Vec2::new(0.0, -9.81),
            min_vertex_radius: LINEAR_SLOP / 4.0,
            max_vertex_radius: 255.0 * LINEAR_SLOP,
        }
    }
}

impl WorldConf {
    pub fn with_gravity(mut self, gravity: Vec2) -> Self {
        self.gravity = gravity;
        self
    }
}

/// Parameters for one call to [`World::step`](crate::World::step).
///
/// The defaults are a workable general-purpose tuning; the iteration counts
/// trade accuracy against time linearly.
#[derive(Clone, Copy, Debug)]
#[cfg_attr(feature = "serde-types", derive(serde::Serialize, serde::Deserialize))]
pub struct StepConf {
    /// Time to advance the simulation by, in seconds. May be zero.
    pub dt: f64,

    /// Velocity iterations for the regular (island) solver.
    pub reg_velocity_iterations: u32,
    /// Position iterations for the regular solver.
    pub reg_position_iterations: u32,
    /// Velocity iterations for the time-of-impact solver.
    pub toi_velocity_iterations: u32,
    /// Position iterations for the time-of-impact solver.
    pub toi_position_iterations: u32,

    /// Length below which penetration is ignored.
    pub linear_slop: f64,
    /// Angle below which angular error is ignored.
    pub angular_slop: f64,
    /// Largest translation of a body over one step, in metres.
    pub max_translation: f64,
    /// Largest rotation of a body over one step, in radians. At most π.
    pub max_rotation: f64,
    /// Cap on a single position-solver correction, in metres.
    pub max_linear_correction: f64,
    /// Cap on a single position-solver angular correction, in radians.
    pub max_angular_correction: f64,
    /// Fraction of position error resolved per regular position iteration.
    pub reg_resolution_rate: f64,
    /// Fraction of position error resolved per TOI position iteration.
    pub toi_resolution_rate: f64,
    /// Separation above which the regular position solver may stop early.
    /// A small negative number.
    pub reg_min_separation: f64,
    /// Separation above which the TOI position solver may stop early.
    pub toi_min_separation: f64,
    /// Relative normal velocity below which restitution is suppressed, m/s.
    pub velocity_threshold: f64,

    /// Amount leaf AABBs are fattened by in the broad-phase tree.
    pub aabb_extension: f64,
    /// How far a moved proxy's AABB is extended along its displacement.
    pub displace_multiplier: f64,

    /// Penetration depth the TOI solver aims for.
    pub target_depth: f64,
    /// Half-width of the band around `target_depth` accepted as touching.
    pub tolerance: f64,
    /// TOI sub-steps allowed per contact per step.
    pub max_sub_steps: u32,
    /// Outer iterations of the TOI root finder per contact.
    pub max_toi_iters: u32,
    /// GJK calls allowed per TOI computation.
    pub max_distance_iters: u32,
    /// Secant/bisection iterations per separation root.
    pub max_root_iters: u32,

    /// Time a whole island must stay still before it is put to sleep, seconds.
    pub min_still_time_to_sleep: f64,
    /// Linear speed below which a body counts as still, m/s.
    pub linear_sleep_tolerance: f64,
    /// Angular speed below which a body counts as still, rad/s.
    pub angular_sleep_tolerance: f64,

    /// Whether to seed the velocity solver with the previous step's impulses.
    pub do_warm_start: bool,
    /// Whether to run continuous collision detection.
    pub do_toi: bool,
    /// Whether two-point contacts use the coupled block solver.
    pub do_block_solve: bool,
}

impl Default for StepConf {
    fn default() -> Self {
        Self {
            dt: 1.0 / 60.0,
            reg_velocity_iterations: 8,
            reg_position_iterations: 3,
            toi_velocity_iterations: 8,
            toi_position_iterations: 20,
            linear_slop: LINEAR_SLOP,
            angular_slop: ANGULAR_SLOP,
            max_translation: 2.0,
            max_rotation: 0.5 * PI,
            max_linear_correction: 0.2,
            max_angular_correction: 8.0 / 180.0 * PI,
            reg_resolution_rate: 0.2,
            toi_resolution_rate: 0.75,
            reg_min_separation: -3.0 * LINEAR_SLOP,
            toi_min_separation: -1.5 * LINEAR_SLOP,
            velocity_threshold: 1.0,
            aabb_extension: 0.1,
            displace_multiplier: 2.0,
            target_depth: 3.0 * LINEAR_SLOP,
            tolerance: LINEAR_SLOP / 4.0,
            max_sub_steps: 8,
            max_toi_iters: 20,
            max_distance_iters: 20,
            max_root_iters: 30,
            min_still_time_to_sleep: 0.5,
            linear_sleep_tolerance: 0.01,
            angular_sleep_tolerance: 2.0 / 180.0 * PI,
            do_warm_start: true,
            do_toi: true,
            do_block_solve: true,
        }
    }
}

impl StepConf {
    pub fn with_dt(mut self, dt: f64) -> Self {
        self.dt = dt;
        self
    }

    /// The inverse time step, or zero for a zero-time step.
    pub fn inv_dt(&self) -> f64 {
        if self.dt != 0.0 {
            1.0 / self.dt
        } else {
            0.0
        }
    }
}
