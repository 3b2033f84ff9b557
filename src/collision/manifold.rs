//! Contact manifolds: the narrow-phase output describing where and how two
//! convex shapes touch.

use super::shape::DistanceProxy;
use crate::math::{self as m, Transform, UnitVec2, Vec2};
use crate::settings::{LINEAR_SLOP, MAX_MANIFOLD_POINTS};

/// How many times longer than its vertex radius a face must be before a
/// corner-to-corner collision prefers a face manifold over a circles one.
const CIRCLES_RATIO: f64 = 4.0;

/// Identifies which geometric features of the two shapes generated a contact
/// point. Stable across steps for persistent contacts, which makes it the
/// key for impulse warm starting.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde-types", derive(serde::Serialize, serde::Deserialize))]
pub struct ContactFeature {
    pub type_a: FeatureType,
    pub index_a: u8,
    pub type_b: FeatureType,
    pub index_b: u8,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde-types", derive(serde::Serialize, serde::Deserialize))]
pub enum FeatureType {
    #[default]
    Vertex,
    Face,
}

impl ContactFeature {
    pub fn face_vertex(index_a: u8, index_b: u8) -> Self {
        Self {
            type_a: FeatureType::Face,
            index_a,
            type_b: FeatureType::Vertex,
            index_b,
        }
    }

    pub fn vertex_vertex(index_a: u8, index_b: u8) -> Self {
        Self {
            type_a: FeatureType::Vertex,
            index_a,
            type_b: FeatureType::Vertex,
            index_b,
        }
    }

    /// Swap the A and B roles.
    pub fn flipped(self) -> Self {
        Self {
            type_a: self.type_b,
            index_a: self.index_b,
            type_b: self.type_a,
            index_b: self.index_a,
        }
    }
}

/// One point of a manifold, with the impulses accumulated at it.
///
/// The impulses persist across steps: when a refreshed manifold produces a
/// point with the same [`ContactFeature`], the old impulses seed the solver.
#[derive(Clone, Copy, Debug, Default)]
pub struct ManifoldPoint {
    /// Contact location in the frame of shape B for face-A manifolds, shape
    /// A for face-B manifolds, and the own shape's frame for circles.
    pub local_point: Vec2,
    pub normal_impulse: f64,
    pub tangent_impulse: f64,
    pub feature: ContactFeature,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ManifoldType {
    #[default]
    Unset,
    /// Point-to-point contact; the normal runs between the two local points.
    Circles,
    /// Contact against a face of shape A.
    FaceA,
    /// Contact against a face of shape B.
    FaceB,
}

/// Up to two contact points between two convex shapes, in local coordinates
/// so the data stays valid while the bodies move.
#[derive(Clone, Copy, Debug, Default)]
pub struct Manifold {
    pub ty: ManifoldType,
    /// Face normal in the reference shape's frame. Zero sentinel for
    /// `Unset` and `Circles`.
    pub local_normal: UnitVec2,
    /// Reference face midpoint, or shape A's contact point for `Circles`.
    pub local_point: Vec2,
    points: [ManifoldPoint; MAX_MANIFOLD_POINTS],
    count: usize,
}

impl Manifold {
    pub const EMPTY: Self = Self {
        ty: ManifoldType::Unset,
        local_normal: UnitVec2::ZERO,
        local_point: Vec2 { x: 0.0, y: 0.0 },
        points: [
            ManifoldPoint {
                local_point: Vec2 { x: 0.0, y: 0.0 },
                normal_impulse: 0.0,
                tangent_impulse: 0.0,
                feature: ContactFeature {
                    type_a: FeatureType::Vertex,
                    index_a: 0,
                    type_b: FeatureType::Vertex,
                    index_b: 0,
                },
            };
            MAX_MANIFOLD_POINTS
        ],
        count: 0,
    };

    fn for_circles(local_point_a: Vec2, index_a: u8, local_point_b: Vec2, index_b: u8) -> Self {
        let mut manifold = Self {
            ty: ManifoldType::Circles,
            local_normal: UnitVec2::ZERO,
            local_point: local_point_a,
            ..Self::EMPTY
        };
        manifold.push(ManifoldPoint {
            local_point: local_point_b,
            feature: ContactFeature::vertex_vertex(index_a, index_b),
            ..ManifoldPoint::default()
        });
        manifold
    }

    fn for_face_a(local_normal: UnitVec2, local_point: Vec2) -> Self {
        Self {
            ty: ManifoldType::FaceA,
            local_normal,
            local_point,
            ..Self::EMPTY
        }
    }

    fn for_face_b(local_normal: UnitVec2, local_point: Vec2) -> Self {
        Self {
            ty: ManifoldType::FaceB,
            local_normal,
            local_point,
            ..Self::EMPTY
        }
    }

    fn push(&mut self, point: ManifoldPoint) {
        debug_assert!(self.count < MAX_MANIFOLD_POINTS);
        self.points[self.count] = point;
        self.count += 1;
    }

    /// Append a bare point; used when reassembling a manifold from solver
    /// constraint data.
    pub(crate) fn push_raw(&mut self, local_point: Vec2) {
        self.push(ManifoldPoint {
            local_point,
            ..ManifoldPoint::default()
        });
    }

    /// A manifold frame with no points yet.
    pub(crate) fn from_frame(ty: ManifoldType, local_normal: UnitVec2, local_point: Vec2) -> Self {
        Self {
            ty,
            local_normal,
            local_point,
            ..Self::EMPTY
        }
    }

    pub fn points(&self) -> &[ManifoldPoint] {
        &self.points[..self.count]
    }

    pub fn points_mut(&mut self) -> &mut [ManifoldPoint] {
        &mut self.points[..self.count]
    }

    pub fn point_count(&self) -> usize {
        self.count
    }

    pub fn is_touching(&self) -> bool {
        self.count > 0
    }
}

/// A manifold's normal and contact points resolved into world space.
#[derive(Clone, Copy, Debug)]
pub struct WorldManifold {
    pub normal: UnitVec2,
    /// World point and signed separation per manifold point.
    pub points: [(Vec2, f64); MAX_MANIFOLD_POINTS],
    pub count: usize,
}

impl WorldManifold {
    pub fn new(
        manifold: &Manifold,
        xf_a: Transform,
        radius_a: f64,
        xf_b: Transform,
        radius_b: f64,
    ) -> Self {
        let mut out = Self {
            normal: UnitVec2::ZERO,
            points: [(Vec2::zero(), 0.0); MAX_MANIFOLD_POINTS],
            count: manifold.count,
        };
        match manifold.ty {
            ManifoldType::Unset => {}
            ManifoldType::Circles => {
                let point_a = xf_a.apply(manifold.local_point);
                let point_b = xf_b.apply(manifold.points[0].local_point);
                let normal = UnitVec2::try_normalize(point_b - point_a)
                    .map(|(u, _)| u)
                    .unwrap_or(UnitVec2::X);
                let c_a = point_a + *normal * radius_a;
                let c_b = point_b - *normal * radius_b;
                out.normal = normal;
                out.points[0] = ((c_a + c_b) * 0.5, (c_b - c_a).dot(*normal));
            }
            ManifoldType::FaceA => {
                let normal = xf_a.q.rotate_unit(manifold.local_normal);
                let plane_point = xf_a.apply(manifold.local_point);
                out.normal = normal;
                for (i, p) in manifold.points().iter().enumerate() {
                    let clip_point = xf_b.apply(p.local_point);
                    let dist = (clip_point - plane_point).dot(*normal);
                    let c_a = clip_point + *normal * (radius_a - dist);
                    let c_b = clip_point - *normal * radius_b;
                    out.points[i] = ((c_a + c_b) * 0.5, (c_b - c_a).dot(*normal));
                }
            }
            ManifoldType::FaceB => {
                let normal = xf_b.q.rotate_unit(manifold.local_normal);
                let plane_point = xf_b.apply(manifold.local_point);
                for (i, p) in manifold.points().iter().enumerate() {
                    let clip_point = xf_a.apply(p.local_point);
                    let dist = (clip_point - plane_point).dot(*normal);
                    let c_b = clip_point + *normal * (radius_b - dist);
                    let c_a = clip_point - *normal * radius_a;
                    out.points[i] = ((c_a + c_b) * 0.5, (c_a - c_b).dot(*normal));
                }
                // the world normal always points from A to B
                out.normal = -normal;
            }
        }
        out
    }
}

//
// Narrow phase entry point
//

/// Compute the contact manifold between two shape children.
///
/// Dispatches on vertex counts: point vs point is a circles manifold, point
/// vs face picks the closest face region, face vs face clips the incident
/// edge against the reference face.
pub fn collide_shapes(
    proxy_a: &DistanceProxy<'_>,
    xf_a: Transform,
    proxy_b: &DistanceProxy<'_>,
    xf_b: Transform,
) -> Manifold {
    let count_a = proxy_a.vertex_count();
    let count_b = proxy_b.vertex_count();

    if count_a == 1 && count_b == 1 {
        return collide_circles(proxy_a, xf_a, proxy_b, xf_b);
    }
    if count_a == 1 {
        return collide_face_circle(Flip::Yes, proxy_b, xf_b, proxy_a, xf_a);
    }
    if count_b == 1 {
        return collide_face_circle(Flip::No, proxy_a, xf_a, proxy_b, xf_b);
    }

    let total_radius = proxy_a.vertex_radius + proxy_b.vertex_radius;

    let sep_a = max_separation(proxy_a, xf_a, proxy_b, xf_b);
    if sep_a.separation > total_radius {
        return Manifold::EMPTY;
    }
    let sep_b = max_separation(proxy_b, xf_b, proxy_a, xf_a);
    if sep_b.separation > total_radius {
        return Manifold::EMPTY;
    }

    // bias toward shape A to keep the reference side stable between steps
    let tol = LINEAR_SLOP / 10.0;
    if sep_b.separation > sep_a.separation + tol {
        face_manifold(Flip::Yes, proxy_b, xf_b, sep_b, proxy_a, xf_a)
    } else {
        face_manifold(Flip::No, proxy_a, xf_a, sep_a, proxy_b, xf_b)
    }
}

/// Whether shape "1" of a single-sided collision routine is actually
/// fixture B, so manifold types and features must be mirrored on output.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Flip {
    No,
    Yes,
}

fn collide_circles(
    proxy_a: &DistanceProxy<'_>,
    xf_a: Transform,
    proxy_b: &DistanceProxy<'_>,
    xf_b: Transform,
) -> Manifold {
    let p_a = xf_a.apply(proxy_a.vertex(0));
    let p_b = xf_b.apply(proxy_b.vertex(0));
    let total_radius = proxy_a.vertex_radius + proxy_b.vertex_radius;
    if (p_b - p_a).mag_sq() > total_radius * total_radius {
        return Manifold::EMPTY;
    }
    Manifold::for_circles(proxy_a.vertex(0), 0, proxy_b.vertex(0), 0)
}

/// Collide a faced shape ("1") against a single-vertex shape (the circle).
/// `flip` records which of the two is fixture A.
fn collide_face_circle(
    flip: Flip,
    shape: &DistanceProxy<'_>,
    shape_xf: Transform,
    circle: &DistanceProxy<'_>,
    circle_xf: Transform,
) -> Manifold {
    let circle_local = circle.vertex(0);
    // circle center in the faced shape's frame
    let c_local = shape_xf.apply_inverse(circle_xf.apply(circle_local));
    let total_radius = shape.vertex_radius + circle.vertex_radius;
    let count = shape.vertex_count();

    // face the circle is closest to
    let mut index_of_max = 0;
    let mut max_separation = f64::NEG_INFINITY;
    for i in 0..count {
        let n = match shape.normal(i) {
            Some(n) => n,
            None => return Manifold::EMPTY,
        };
        let s = n.dot(c_local - shape.vertex(i));
        if s > total_radius {
            return Manifold::EMPTY;
        }
        if s > max_separation {
            max_separation = s;
            index_of_max = i;
        }
    }
    let index_next = (index_of_max + 1) % count;
    let v1 = shape.vertex(index_of_max);
    let v2 = shape.vertex(index_next);
    let face_normal = shape.normal(index_of_max).unwrap();
    let face_center = (v1 + v2) * 0.5;

    let face_point_manifold = || {
        let feature = ContactFeature::face_vertex(index_of_max as u8, 0);
        match flip {
            Flip::No => {
                let mut manifold = Manifold::for_face_a(face_normal, face_center);
                manifold.push(ManifoldPoint {
                    local_point: circle_local,
                    feature,
                    ..ManifoldPoint::default()
                });
                manifold
            }
            Flip::Yes => {
                let mut manifold = Manifold::for_face_b(face_normal, face_center);
                manifold.push(ManifoldPoint {
                    local_point: circle_local,
                    feature: feature.flipped(),
                    ..ManifoldPoint::default()
                });
                manifold
            }
        }
    };

    if max_separation < 0.0 {
        // center is inside the shape
        return face_point_manifold();
    }

    // past either end of the face, the contact is corner to corner
    if (c_local - v1).dot(v2 - v1) <= 0.0 {
        if (c_local - v1).mag_sq() > total_radius * total_radius {
            return Manifold::EMPTY;
        }
        return corner_circle_manifold(flip, v1, index_of_max as u8, circle_local);
    }
    if (c_local - v2).dot(v1 - v2) <= 0.0 {
        if (c_local - v2).mag_sq() > total_radius * total_radius {
            return Manifold::EMPTY;
        }
        return corner_circle_manifold(flip, v2, index_next as u8, circle_local);
    }

    if (c_local - face_center).dot(*face_normal) > total_radius {
        return Manifold::EMPTY;
    }
    face_point_manifold()
}

fn corner_circle_manifold(
    flip: Flip,
    corner: Vec2,
    corner_index: u8,
    circle_local: Vec2,
) -> Manifold {
    match flip {
        Flip::No => Manifold::for_circles(corner, corner_index, circle_local, 0),
        Flip::Yes => Manifold::for_circles(circle_local, 0, corner, corner_index),
    }
}

//
// Face-vs-face collision
//

#[derive(Clone, Copy, Debug)]
struct MaxSeparation {
    separation: f64,
    /// Face index on the queried shape.
    index1: usize,
    /// Index of the other shape's vertex deepest past that face.
    index2: usize,
}

/// For each face of `proxy1`, project all of `proxy2`'s vertices onto the
/// face normal; report the face whose deepest vertex is least deep.
fn max_separation(
    proxy1: &DistanceProxy<'_>,
    xf1: Transform,
    proxy2: &DistanceProxy<'_>,
    xf2: Transform,
) -> MaxSeparation {
    let mut best = MaxSeparation {
        separation: f64::NEG_INFINITY,
        index1: 0,
        index2: 0,
    };
    for i in 0..proxy1.vertex_count() {
        let normal = match proxy1.normal(i) {
            Some(n) => xf1.q.rotate_unit(n),
            None => continue,
        };
        let v1 = xf1.apply(proxy1.vertex(i));

        let mut min_sep = f64::INFINITY;
        let mut min_index = 0;
        for j in 0..proxy2.vertex_count() {
            let s = normal.dot(xf2.apply(proxy2.vertex(j)) - v1);
            if s < min_sep {
                min_sep = s;
                min_index = j;
            }
        }
        if min_sep > best.separation {
            best = MaxSeparation {
                separation: min_sep,
                index1: i,
                index2: min_index,
            };
        }
    }
    best
}

#[derive(Clone, Copy, Debug)]
struct ClipVertex {
    v: Vec2,
    cf: ContactFeature,
}

/// Sutherland-Hodgman style clip of a two-point segment against a plane.
/// A point born at the plane crossing takes on a vertex-face feature naming
/// the clip vertex.
fn clip_segment_to_line(
    segment: &[ClipVertex],
    normal: Vec2,
    offset: f64,
    clip_vertex_index: usize,
) -> Vec<ClipVertex> {
    let mut out = Vec::with_capacity(2);
    if segment.len() < 2 {
        return out;
    }

    let distance0 = normal.dot(segment[0].v) - offset;
    let distance1 = normal.dot(segment[1].v) - offset;

    if distance0 <= 0.0 {
        out.push(segment[0]);
    }
    if distance1 <= 0.0 {
        out.push(segment[1]);
    }
    if distance0 * distance1 < 0.0 {
        let interp = distance0 / (distance0 - distance1);
        out.push(ClipVertex {
            v: segment[0].v + (segment[1].v - segment[0].v) * interp,
            cf: ContactFeature {
                type_a: FeatureType::Vertex,
                index_a: clip_vertex_index as u8,
                type_b: FeatureType::Face,
                index_b: segment[0].cf.index_b,
            },
        });
    }
    out
}

/// The face-vs-face case: `shape1` holds the reference face `sep.index1`,
/// `shape2` the incident edge. `flip` says whether shape1 is fixture B.
fn face_manifold(
    flip: Flip,
    shape1: &DistanceProxy<'_>,
    xf1: Transform,
    sep: MaxSeparation,
    shape2: &DistanceProxy<'_>,
    xf2: Transform,
) -> Manifold {
    let r1 = shape1.vertex_radius;
    let r2 = shape2.vertex_radius;
    let total_radius = r1 + r2;

    let count1 = shape1.vertex_count();
    let count2 = shape2.vertex_count();
    let idx1 = sep.index1;
    let idx1_next = (idx1 + 1) % count1;

    let rel_v1 = shape1.vertex(idx1);
    let rel_v2 = shape1.vertex(idx1_next);
    let abs_v1 = xf1.apply(rel_v1);
    let abs_v2 = xf1.apply(rel_v2);

    let (rel_edge_dir, edge_len) = match UnitVec2::try_normalize(rel_v2 - rel_v1) {
        Some(pair) => pair,
        None => return Manifold::EMPTY,
    };
    let abs_edge_dir = xf1.q.rotate_unit(rel_edge_dir);
    let face_normal = shape1
        .normal(idx1)
        .unwrap_or_else(|| UnitVec2::new_unchecked(m::right_normal(*rel_edge_dir)));

    // incident edge on shape2: of the two faces meeting at the deepest
    // vertex, the one most anti-parallel to the reference normal
    let ref_normal_in_2 = xf2.q.inverse_rotate_unit(xf1.q.rotate_unit(face_normal));
    let idx2_prev = (sep.index2 + count2 - 1) % count2;
    let s_prev = shape2
        .normal(idx2_prev)
        .map(|n| n.dot(*ref_normal_in_2))
        .unwrap_or(f64::INFINITY);
    let s_curr = shape2
        .normal(sep.index2)
        .map(|n| n.dot(*ref_normal_in_2))
        .unwrap_or(f64::INFINITY);
    let incident1 = if s_prev < s_curr { idx2_prev } else { sep.index2 };
    let incident2 = (incident1 + 1) % count2;

    let incident_edge = [
        ClipVertex {
            v: xf2.apply(shape2.vertex(incident1)),
            cf: ContactFeature::face_vertex(idx1 as u8, incident1 as u8),
        },
        ClipVertex {
            v: xf2.apply(shape2.vertex(incident2)),
            cf: ContactFeature::face_vertex(idx1 as u8, incident2 as u8),
        },
    ];

    // clip against the planes through the reference face's end vertices
    let offset1 = -abs_edge_dir.dot(abs_v1);
    let offset2 = abs_edge_dir.dot(abs_v2);
    let clipped = clip_segment_to_line(&incident_edge, -*abs_edge_dir, offset1, idx1);
    let clipped = clip_segment_to_line(&clipped, *abs_edge_dir, offset2, idx1_next);

    if clipped.len() == 2 {
        let abs_normal = xf1.q.rotate_unit(face_normal);
        let abs_offset = abs_normal.dot(abs_v1);
        let rel_midpoint = (rel_v1 + rel_v2) * 0.5;

        let mut manifold = match flip {
            Flip::No => Manifold::for_face_a(face_normal, rel_midpoint),
            Flip::Yes => Manifold::for_face_b(face_normal, rel_midpoint),
        };
        for cp in &clipped {
            if abs_normal.dot(cp.v) - abs_offset <= total_radius {
                manifold.push(ManifoldPoint {
                    local_point: xf2.apply_inverse(cp.v),
                    feature: match flip {
                        Flip::No => cp.cf,
                        Flip::Yes => cp.cf.flipped(),
                    },
                    ..ManifoldPoint::default()
                });
            }
        }
        if manifold.point_count() > 0 {
            return manifold;
        }
    }

    // no face overlap: the shapes can only be touching corner to corner
    corner_corner_manifold(
        flip,
        shape1,
        (idx1, idx1_next),
        (rel_v1, rel_v2),
        (abs_v1, abs_v2),
        rel_edge_dir,
        edge_len,
        shape2,
        xf2,
        (incident1, incident2),
        total_radius,
    )
}

#[allow(clippy::too_many_arguments)]
fn corner_corner_manifold(
    flip: Flip,
    shape1: &DistanceProxy<'_>,
    (idx1, idx1_next): (usize, usize),
    (rel_v1, rel_v2): (Vec2, Vec2),
    (abs_v1, abs_v2): (Vec2, Vec2),
    rel_edge_dir: UnitVec2,
    edge_len: f64,
    shape2: &DistanceProxy<'_>,
    xf2: Transform,
    (incident1, incident2): (usize, usize),
    total_radius: f64,
) -> Manifold {
    let shape2_rel_v1 = shape2.vertex(incident1);
    let shape2_abs_v1 = xf2.apply(shape2_rel_v1);
    let shape2_rel_v2 = shape2.vertex(incident2);
    let shape2_abs_v2 = xf2.apply(shape2_rel_v2);
    let total_radius_sq = total_radius * total_radius;

    // long faces keep a face manifold so corners slide rather than snag
    let use_face = edge_len > CIRCLES_RATIO * shape1.vertex_radius;
    let face_normal = UnitVec2::new_unchecked(m::right_normal(*rel_edge_dir));

    let pairs = [
        (rel_v1, idx1, shape2_rel_v1, incident1, abs_v1, shape2_abs_v1),
        (rel_v1, idx1, shape2_rel_v2, incident2, abs_v1, shape2_abs_v2),
        (rel_v2, idx1_next, shape2_rel_v2, incident2, abs_v2, shape2_abs_v2),
        (rel_v2, idx1_next, shape2_rel_v1, incident1, abs_v2, shape2_abs_v1),
    ];
    for (rel1, i1, rel2, i2, abs1, abs2) in pairs {
        if (abs1 - abs2).mag_sq() > total_radius_sq {
            continue;
        }
        if use_face {
            let feature = ContactFeature {
                type_a: FeatureType::Vertex,
                index_a: i1 as u8,
                type_b: FeatureType::Vertex,
                index_b: i2 as u8,
            };
            let mut manifold = match flip {
                Flip::No => Manifold::for_face_a(face_normal, rel1),
                Flip::Yes => Manifold::for_face_b(face_normal, rel1),
            };
            manifold.push(ManifoldPoint {
                local_point: rel2,
                feature: match flip {
                    Flip::No => feature,
                    Flip::Yes => feature.flipped(),
                },
                ..ManifoldPoint::default()
            });
            return manifold;
        }
        return match flip {
            Flip::No => Manifold::for_circles(rel1, i1 as u8, rel2, i2 as u8),
            Flip::Yes => Manifold::for_circles(rel2, i2 as u8, rel1, i1 as u8),
        };
    }
    Manifold::EMPTY
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collision::shape::{Circle, Edge, Polygon, Shape};

    fn approx(a: f64, b: f64, tol: f64) -> bool {
        (a - b).abs() < tol
    }

    fn collide(shape_a: &Shape, xf_a: Transform, shape_b: &Shape, xf_b: Transform) -> Manifold {
        collide_shapes(&shape_a.child_proxy(0), xf_a, &shape_b.child_proxy(0), xf_b)
    }

    #[test]
    fn separated_circles_produce_nothing() {
        let a = Shape::Circle(Circle::new(1.0));
        let b = Shape::Circle(Circle::new(1.0));
        let manifold = collide(
            &a,
            Transform::IDENTITY,
            &b,
            Transform::new(Vec2::new(3.0, 0.0), 0.0),
        );
        assert_eq!(manifold.ty, ManifoldType::Unset);
        assert_eq!(manifold.point_count(), 0);
    }

    #[test]
    fn touching_circles() {
        let a = Shape::Circle(Circle::new(1.0));
        let b = Shape::Circle(Circle::new(1.0));
        let manifold = collide(
            &a,
            Transform::IDENTITY,
            &b,
            Transform::new(Vec2::new(1.5, 0.0), 0.0),
        );
        assert_eq!(manifold.ty, ManifoldType::Circles);
        assert_eq!(manifold.point_count(), 1);
        assert_eq!(manifold.local_point, Vec2::zero());
        assert_eq!(manifold.points()[0].local_point, Vec2::zero());
        assert_eq!(
            manifold.points()[0].feature,
            ContactFeature::vertex_vertex(0, 0)
        );

        let world = WorldManifold::new(
            &manifold,
            Transform::IDENTITY,
            1.0,
            Transform::new(Vec2::new(1.5, 0.0), 0.0),
            1.0,
        );
        assert!(approx(world.normal.x, 1.0, 1e-12));
        assert!(approx(world.points[0].1, -0.5, 1e-12));
    }

    #[test]
    fn identical_overlapping_squares() {
        let shape = Shape::Polygon(Polygon::new_box(1.0, 1.0));
        let manifold = collide(&shape, Transform::IDENTITY, &shape, Transform::IDENTITY);

        assert_eq!(manifold.ty, ManifoldType::FaceA);
        assert!(approx(manifold.local_normal.x, 1.0, 1e-12));
        assert!(approx(manifold.local_normal.y, 0.0, 1e-12));
        assert_eq!(manifold.local_point, Vec2::new(1.0, 0.0));
        assert_eq!(manifold.point_count(), 2);

        let p0 = manifold.points()[0];
        assert_eq!(p0.local_point, Vec2::new(-1.0, 1.0));
        assert_eq!(p0.feature, ContactFeature::face_vertex(0, 2));

        let p1 = manifold.points()[1];
        assert_eq!(p1.local_point, Vec2::new(-1.0, -1.0));
        assert_eq!(p1.feature, ContactFeature::face_vertex(0, 3));
    }

    #[test]
    fn vertically_stacked_squares() {
        let shape = Shape::Polygon(Polygon::new_box(2.0, 2.0));
        let manifold = collide(
            &shape,
            Transform::new(Vec2::new(0.0, -1.0), 0.0),
            &shape,
            Transform::new(Vec2::new(0.0, 1.0), 0.0),
        );

        assert_eq!(manifold.ty, ManifoldType::FaceA);
        assert_eq!(manifold.local_point, Vec2::new(0.0, 2.0));
        assert!(approx(manifold.local_normal.y, 1.0, 1e-12));
        assert_eq!(manifold.point_count(), 2);
        assert_eq!(manifold.points()[0].local_point, Vec2::new(-2.0, -2.0));
        assert_eq!(manifold.points()[0].feature, ContactFeature::face_vertex(1, 3));
        assert_eq!(manifold.points()[1].local_point, Vec2::new(2.0, -2.0));
        assert_eq!(manifold.points()[1].feature, ContactFeature::face_vertex(1, 0));
    }

    #[test]
    fn circle_resting_on_triangle_vertex() {
        let triangle = Shape::Polygon(
            Polygon::new(&[
                Vec2::new(-1.0, -1.0),
                Vec2::new(1.0, -1.0),
                Vec2::new(0.0, 1.0),
            ])
            .unwrap(),
        );
        let circle = Shape::Circle(Circle::new(1.0));
        // tangent to the top vertex from above, pushed down a hair to touch
        let manifold = collide(
            &triangle,
            Transform::IDENTITY,
            &circle,
            Transform::new(Vec2::new(0.0, 1.99), 0.0),
        );

        assert_eq!(manifold.ty, ManifoldType::Circles);
        assert_eq!(manifold.point_count(), 1);
        assert_eq!(manifold.local_point, Vec2::new(0.0, 1.0));
        assert_eq!(manifold.points()[0].local_point, Vec2::zero());
        assert!(!manifold.local_normal.is_valid());
    }

    #[test]
    fn edge_below_box_face() {
        let edge = Shape::Edge(Edge::new(Vec2::new(-1.0, 0.0), Vec2::new(1.0, 0.0)));
        let shape = Shape::Polygon(Polygon::new_box(1.0, 1.0));
        let manifold = collide(
            &edge,
            Transform::new(Vec2::new(0.0, -1.0), 0.0),
            &shape,
            Transform::IDENTITY,
        );

        assert_eq!(manifold.ty, ManifoldType::FaceA);
        assert!(approx(manifold.local_normal.y, 1.0, 1e-12));
        assert!(approx(manifold.local_normal.x, 0.0, 1e-12));
        assert_eq!(manifold.point_count(), 2);
        // contact points are the box's bottom corners, in the box's frame
        let xs: Vec<f64> = manifold.points().iter().map(|p| p.local_point.x).collect();
        assert!(xs.contains(&1.0) && xs.contains(&-1.0));
        for p in manifold.points() {
            assert!(approx(p.local_point.y, -1.0, 1e-12));
        }
    }

    #[test]
    fn rotated_rectangle_against_circle() {
        let rect = Shape::Polygon(Polygon::new_box(2.2, 4.8));
        let circle = Shape::Circle(Circle::new(1.0));
        let manifold = collide(
            &rect,
            Transform::new(Vec2::new(-1.0, 0.0), std::f64::consts::FRAC_PI_4),
            &circle,
            Transform::new(Vec2::new(3.0, 0.0), 0.0),
        );

        assert_eq!(manifold.ty, ManifoldType::FaceA);
        assert!(approx(manifold.local_normal.x, 1.0, 1e-12));
        assert!(approx(manifold.local_normal.y, 0.0, 1e-12));
        assert_eq!(manifold.local_point, Vec2::new(2.2, 0.0));
        assert_eq!(manifold.point_count(), 1);
    }

    #[test]
    fn world_manifold_separation_of_overlapping_squares() {
        let shape = Shape::Polygon(Polygon::new_box(1.0, 1.0));
        let xf_b = Transform::new(Vec2::new(1.5, 0.0), 0.0);
        let manifold = collide(&shape, Transform::IDENTITY, &shape, xf_b);
        assert_eq!(manifold.ty, ManifoldType::FaceA);
        let r = shape.vertex_radius();
        let world = WorldManifold::new(&manifold, Transform::IDENTITY, r, xf_b, r);
        for i in 0..world.count {
            // boxes overlap by 0.5 before radii
            assert!(approx(world.points[i].1, -0.5 - 2.0 * r, 1e-9));
        }
    }
}
