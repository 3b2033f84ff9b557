//! Vector and transform types for doing physics math with `ultraviolet`.

pub use ultraviolet::DVec2 as Vec2;

use std::f64::consts::TAU;

/// The scalar 2D cross product `a.x * b.y - a.y * b.x`.
#[inline]
pub fn cross(a: Vec2, b: Vec2) -> f64 {
    a.x * b.y - a.y * b.x
}

/// Cross product of the out-of-plane vector `(0, 0, s)` with `v`.
#[inline]
pub fn cross_sv(s: f64, v: Vec2) -> Vec2 {
    Vec2::new(-s * v.y, s * v.x)
}

/// The vector `v` rotated 90 degrees counterclockwise.
#[inline]
pub fn left_normal(v: Vec2) -> Vec2 {
    Vec2::new(-v.y, v.x)
}

/// The vector `v` rotated 90 degrees clockwise.
#[inline]
pub fn right_normal(v: Vec2) -> Vec2 {
    Vec2::new(v.y, -v.x)
}

//
// Unit vector
//

/// A vector with unit length, or the zero sentinel.
///
/// The sentinel stands in for "no meaningful direction" (e.g. the normal of
/// an unset manifold) and is invalid as input to rotations.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde-types", derive(serde::Serialize, serde::Deserialize))]
pub struct UnitVec2(Vec2);

impl UnitVec2 {
    pub const ZERO: Self = Self(Vec2 { x: 0.0, y: 0.0 });
    pub const X: Self = Self(Vec2 { x: 1.0, y: 0.0 });
    pub const Y: Self = Self(Vec2 { x: 0.0, y: 1.0 });

    /// Build a unit vector from an angle in radians, measured from the x axis.
    #[inline]
    pub fn from_angle(radians: f64) -> Self {
        Self(Vec2::new(radians.cos(), radians.sin()))
    }

    /// Normalize `v`, returning the direction and the original magnitude.
    /// Returns None for vectors too short to carry a direction.
    pub fn try_normalize(v: Vec2) -> Option<(Self, f64)> {
        let mag_sq = v.mag_sq();
        if mag_sq < f64::EPSILON * f64::EPSILON {
            return None;
        }
        let mag = mag_sq.sqrt();
        Some((Self(v / mag), mag))
    }

    /// Normalize `v`, falling back to the zero sentinel.
    pub fn normalize_or_zero(v: Vec2) -> Self {
        Self::try_normalize(v).map(|(u, _)| u).unwrap_or(Self::ZERO)
    }

    /// Wrap a vector that is already known to have unit length.
    #[inline]
    pub fn new_unchecked(v: Vec2) -> Self {
        Self(v)
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        self.0 != Vec2::zero()
    }

    /// The unit vector rotated 90 degrees counterclockwise.
    #[inline]
    pub fn rot90(&self) -> Self {
        Self(left_normal(self.0))
    }
}

impl std::ops::Deref for UnitVec2 {
    type Target = Vec2;
    #[inline]
    fn deref(&self) -> &Vec2 {
        &self.0
    }
}

impl std::ops::Neg for UnitVec2 {
    type Output = Self;
    #[inline]
    fn neg(self) -> Self {
        Self(-self.0)
    }
}

impl From<UnitVec2> for Vec2 {
    #[inline]
    fn from(u: UnitVec2) -> Vec2 {
        u.0
    }
}

//
// Rotation
//

/// A 2D rotation stored as the cosine/sine pair of its angle.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde-types", derive(serde::Serialize, serde::Deserialize))]
pub struct Rotation {
    pub cos: f64,
    pub sin: f64,
}

impl Rotation {
    pub const IDENTITY: Self = Self { cos: 1.0, sin: 0.0 };

    #[inline]
    pub fn from_angle(radians: f64) -> Self {
        Self {
            cos: radians.cos(),
            sin: radians.sin(),
        }
    }

    #[inline]
    pub fn angle(&self) -> f64 {
        self.sin.atan2(self.cos)
    }

    /// The rotated x axis, i.e. the direction this rotation points.
    #[inline]
    pub fn x_axis(&self) -> UnitVec2 {
        UnitVec2::new_unchecked(Vec2::new(self.cos, self.sin))
    }

    #[inline]
    pub fn rotate(&self, v: Vec2) -> Vec2 {
        Vec2::new(
            self.cos * v.x - self.sin * v.y,
            self.sin * v.x + self.cos * v.y,
        )
    }

    #[inline]
    pub fn inverse_rotate(&self, v: Vec2) -> Vec2 {
        Vec2::new(
            self.cos * v.x + self.sin * v.y,
            -self.sin * v.x + self.cos * v.y,
        )
    }

    #[inline]
    pub fn rotate_unit(&self, u: UnitVec2) -> UnitVec2 {
        UnitVec2::new_unchecked(self.rotate(*u))
    }

    #[inline]
    pub fn inverse_rotate_unit(&self, u: UnitVec2) -> UnitVec2 {
        UnitVec2::new_unchecked(self.inverse_rotate(*u))
    }

    /// Compose two rotations: the result rotates by `other`, then by `self`.
    #[inline]
    pub fn mul(&self, other: Self) -> Self {
        Self {
            cos: self.cos * other.cos - self.sin * other.sin,
            sin: self.sin * other.cos + self.cos * other.sin,
        }
    }

    /// The rotation from `self`'s frame to `other`'s frame.
    #[inline]
    pub fn inv_mul(&self, other: Self) -> Self {
        Self {
            cos: self.cos * other.cos + self.sin * other.sin,
            sin: self.cos * other.sin - self.sin * other.cos,
        }
    }
}

impl Default for Rotation {
    fn default() -> Self {
        Self::IDENTITY
    }
}

//
// Transform
//

/// A rigid transform: rotation about the origin followed by a translation.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde-types", derive(serde::Serialize, serde::Deserialize))]
pub struct Transform {
    pub p: Vec2,
    pub q: Rotation,
}

impl Transform {
    pub const IDENTITY: Self = Self {
        p: Vec2 { x: 0.0, y: 0.0 },
        q: Rotation { cos: 1.0, sin: 0.0 },
    };

    #[inline]
    pub fn new(p: Vec2, angle: f64) -> Self {
        Self {
            p,
            q: Rotation::from_angle(angle),
        }
    }

    /// Map a point from the local frame to the world frame.
    #[inline]
    pub fn apply(&self, v: Vec2) -> Vec2 {
        self.q.rotate(v) + self.p
    }

    /// Map a point from the world frame to the local frame.
    #[inline]
    pub fn apply_inverse(&self, v: Vec2) -> Vec2 {
        self.q.inverse_rotate(v - self.p)
    }

    /// Compose transforms: `self.mul(other).apply(v) == self.apply(other.apply(v))`.
    #[inline]
    pub fn mul(&self, other: Self) -> Self {
        Self {
            p: self.q.rotate(other.p) + self.p,
            q: self.q.mul(other.q),
        }
    }

    /// The transform of `other`'s frame as seen from `self`'s frame.
    #[inline]
    pub fn inv_mul(&self, other: Self) -> Self {
        Self {
            p: self.q.inverse_rotate(other.p - self.p),
            q: self.q.inv_mul(other.q),
        }
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

//
// Position and velocity
//

/// The linear and angular position of a body's center of mass.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Position {
    /// Center of mass location in metres.
    pub linear: Vec2,
    /// Orientation in radians. Unbounded; normalized only across sweeps.
    pub angular: f64,
}

impl Position {
    #[inline]
    pub fn lerp(a: Self, b: Self, t: f64) -> Self {
        Self {
            linear: a.linear * (1.0 - t) + b.linear * t,
            angular: a.angular * (1.0 - t) + b.angular * t,
        }
    }
}

impl std::ops::Add for Position {
    type Output = Self;
    fn add(self, other: Self) -> Self {
        Self {
            linear: self.linear + other.linear,
            angular: self.angular + other.angular,
        }
    }
}
impl std::ops::AddAssign for Position {
    fn add_assign(&mut self, other: Self) {
        *self = *self + other;
    }
}

/// Velocity of a body.
///
// Equivalent to a Vec3 but with names for the translational and rotational part.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Velocity {
    /// Linear velocity in metres per second.
    pub linear: Vec2,
    /// Angular velocity in radians per second.
    pub angular: f64,
}

impl Velocity {
    /// Get the linear velocity of a point offset from the center of mass.
    #[inline]
    pub fn point_velocity(&self, offset: Vec2) -> Vec2 {
        self.linear + cross_sv(self.angular, offset)
    }

    #[inline]
    pub fn is_zero(&self) -> bool {
        self.linear == Vec2::zero() && self.angular == 0.0
    }
}

impl std::ops::Add for Velocity {
    type Output = Self;
    fn add(self, other: Self) -> Self {
        Self {
            linear: self.linear + other.linear,
            angular: self.angular + other.angular,
        }
    }
}
impl std::ops::AddAssign for Velocity {
    fn add_assign(&mut self, other: Self) {
        *self = *self + other;
    }
}
impl std::ops::Mul<f64> for Velocity {
    type Output = Velocity;
    fn mul(self, rhs: f64) -> Velocity {
        Velocity {
            linear: self.linear * rhs,
            angular: self.angular * rhs,
        }
    }
}

//
// Sweep
//

/// The motion of a body's center of mass over the current time step,
/// used by continuous collision detection.
///
/// `alpha0` is the fraction of the step that `pos0` already accounts for;
/// time-of-impact sub-stepping advances it toward 1.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Sweep {
    /// Center of mass in body-local coordinates.
    pub local_center: Vec2,
    pub pos0: Position,
    pub pos1: Position,
    pub alpha0: f64,
}

impl Sweep {
    /// Advance `pos0` to the pose at time `alpha`, leaving `pos1` untouched.
    ///
    /// `alpha` is usually ahead of `alpha0`, but may be behind it when a
    /// time-of-impact island pulls a neighbor back to its own impact time;
    /// the interpolation extrapolates consistently in that case.
    pub fn advance0(&mut self, alpha: f64) {
        debug_assert!(self.alpha0 < 1.0 && alpha < 1.0);
        let beta = (alpha - self.alpha0) / (1.0 - self.alpha0);
        self.pos0 = Position::lerp(self.pos0, self.pos1, beta);
        self.alpha0 = alpha;
    }

    /// The body origin transform at interpolation factor `beta` in `[0, 1]`.
    pub fn transform_at(&self, beta: f64) -> Transform {
        let pos = Position::lerp(self.pos0, self.pos1, beta);
        let q = Rotation::from_angle(pos.angular);
        Transform {
            p: pos.linear - q.rotate(self.local_center),
            q,
        }
    }

    /// Reduce `pos0.angular` into `(-2π, 2π)` and shift `pos1.angular` by the
    /// same amount so the angular difference is preserved.
    pub fn normalize_angles(&mut self) {
        let d = TAU * (self.pos0.angular / TAU).floor();
        self.pos0.angular -= d;
        self.pos1.angular -= d;
    }
}

//
// Small linear solvers
//

/// A 2x2 matrix stored in column-major order.
#[derive(Clone, Copy, Debug, Default)]
pub struct Mat22 {
    pub ex: Vec2,
    pub ey: Vec2,
}

impl Mat22 {
    #[inline]
    pub fn new(ex: Vec2, ey: Vec2) -> Self {
        Self { ex, ey }
    }

    pub fn mul_vec(&self, v: Vec2) -> Vec2 {
        Vec2::new(
            self.ex.x * v.x + self.ey.x * v.y,
            self.ex.y * v.x + self.ey.y * v.y,
        )
    }

    /// Solve `A x = b` without computing the inverse.
    /// Returns zero when the matrix is singular.
    pub fn solve(&self, b: Vec2) -> Vec2 {
        let mut det = self.ex.x * self.ey.y - self.ey.x * self.ex.y;
        if det != 0.0 {
            det = 1.0 / det;
        }
        Vec2::new(
            det * (self.ey.y * b.x - self.ey.x * b.y),
            det * (self.ex.x * b.y - self.ex.y * b.x),
        )
    }

    pub fn inverse(&self) -> Self {
        let mut det = self.ex.x * self.ey.y - self.ey.x * self.ex.y;
        if det != 0.0 {
            det = 1.0 / det;
        }
        Self {
            ex: Vec2::new(det * self.ey.y, -det * self.ex.y),
            ey: Vec2::new(-det * self.ey.x, det * self.ex.x),
        }
    }
}

pub use ultraviolet::DVec3 as Vec3;

/// 3D cross product, used by the 3x3 solver.
#[inline]
pub fn cross3(a: Vec3, b: Vec3) -> Vec3 {
    Vec3::new(
        a.y * b.z - a.z * b.y,
        a.z * b.x - a.x * b.z,
        a.x * b.y - a.y * b.x,
    )
}

/// A 3x3 matrix stored in column-major order, for 3-DOF joint constraints.
#[derive(Clone, Copy, Debug, Default)]
pub struct Mat33 {
    pub ex: Vec3,
    pub ey: Vec3,
    pub ez: Vec3,
}

impl Mat33 {
    /// Solve `A x = b` in all three dimensions.
    /// Returns zero when the matrix is singular.
    pub fn solve33(&self, b: Vec3) -> Vec3 {
        let mut det = self.ex.dot(cross3(self.ey, self.ez));
        if det != 0.0 {
            det = 1.0 / det;
        }
        Vec3::new(
            det * b.dot(cross3(self.ey, self.ez)),
            det * self.ex.dot(cross3(b, self.ez)),
            det * self.ex.dot(cross3(self.ey, b)),
        )
    }

    /// Solve the upper-left 2x2 block of `A x = b`.
    pub fn solve22(&self, b: Vec2) -> Vec2 {
        let mut det = self.ex.x * self.ey.y - self.ey.x * self.ex.y;
        if det != 0.0 {
            det = 1.0 / det;
        }
        Vec2::new(
            det * (self.ey.y * b.x - self.ey.x * b.y),
            det * (self.ex.x * b.y - self.ex.y * b.x),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn transform_roundtrip() {
        let xf = Transform::new(Vec2::new(3.0, -2.0), 1.2);
        let points = [
            Vec2::new(0.0, 0.0),
            Vec2::new(1.0, 1.0),
            Vec2::new(-5.5, 0.25),
        ];
        for p in points {
            let back = xf.apply_inverse(xf.apply(p));
            assert!(approx(back.x, p.x) && approx(back.y, p.y));
        }
    }

    #[test]
    fn transform_composition_matches_sequential_application() {
        let a = Transform::new(Vec2::new(1.0, 2.0), 0.7);
        let b = Transform::new(Vec2::new(-0.5, 4.0), -1.9);
        let v = Vec2::new(2.0, -3.0);
        let composed = a.mul(b).apply(v);
        let sequential = a.apply(b.apply(v));
        assert!(approx(composed.x, sequential.x) && approx(composed.y, sequential.y));

        let rel = a.inv_mul(b);
        let via_rel = a.apply(rel.apply(v));
        let direct = b.apply(v);
        assert!(approx(via_rel.x, direct.x) && approx(via_rel.y, direct.y));
    }

    #[test]
    fn unit_vec_normalization() {
        let (u, mag) = UnitVec2::try_normalize(Vec2::new(3.0, 4.0)).unwrap();
        assert!(approx(mag, 5.0));
        assert!(approx(u.mag_sq(), 1.0));
        assert!(UnitVec2::try_normalize(Vec2::zero()).is_none());
        assert!(!UnitVec2::ZERO.is_valid());
    }

    #[test]
    fn sweep_advance_preserves_endpoint() {
        let mut sweep = Sweep {
            local_center: Vec2::new(0.1, 0.2),
            pos0: Position {
                linear: Vec2::new(0.0, 0.0),
                angular: 0.0,
            },
            pos1: Position {
                linear: Vec2::new(4.0, 2.0),
                angular: PI / 2.0,
            },
            alpha0: 0.0,
        };
        let end_before = sweep.transform_at(1.0);
        sweep.advance0(0.5);
        let end_after = sweep.transform_at(1.0);
        assert!(approx(end_before.p.x, end_after.p.x));
        assert!(approx(end_before.p.y, end_after.p.y));
        assert!(approx(end_before.q.angle(), end_after.q.angle()));
        // pos0 should now be the midpoint
        assert!(approx(sweep.pos0.linear.x, 2.0));
        assert!(approx(sweep.pos0.angular, PI / 4.0));
    }

    #[test]
    fn angle_normalization_preserves_difference() {
        let mut sweep = Sweep {
            local_center: Vec2::zero(),
            pos0: Position {
                linear: Vec2::zero(),
                angular: 7.0 * PI,
            },
            pos1: Position {
                linear: Vec2::zero(),
                angular: 7.5 * PI,
            },
            alpha0: 0.0,
        };
        let diff_before = sweep.pos1.angular - sweep.pos0.angular;
        sweep.normalize_angles();
        assert!(sweep.pos0.angular.abs() < TAU);
        assert!(approx(sweep.pos1.angular - sweep.pos0.angular, diff_before));
    }

    #[test]
    fn mat22_solve() {
        let m = Mat22::new(Vec2::new(2.0, 1.0), Vec2::new(1.0, 3.0));
        let b = Vec2::new(5.0, 10.0);
        let x = m.solve(b);
        let back = m.mul_vec(x);
        assert!(approx(back.x, b.x) && approx(back.y, b.y));
    }

    #[test]
    fn mat33_solve() {
        let m = Mat33 {
            ex: Vec3::new(2.0, 1.0, 0.5),
            ey: Vec3::new(1.0, 3.0, 0.0),
            ez: Vec3::new(0.5, 0.0, 4.0),
        };
        let b = Vec3::new(1.0, -2.0, 3.0);
        let x = m.solve33(b);
        let back = Vec3::new(
            m.ex.x * x.x + m.ey.x * x.y + m.ez.x * x.z,
            m.ex.y * x.x + m.ey.y * x.y + m.ez.y * x.z,
            m.ex.z * x.x + m.ey.z * x.y + m.ez.z * x.z,
        );
        assert!(approx(back.x, b.x) && approx(back.y, b.y) && approx(back.z, b.z));
    }
}
