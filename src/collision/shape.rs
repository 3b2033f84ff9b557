//! Convex collision shapes and their uniform vertex-cloud interface.

use super::aabb::AABB;
use super::ray::{RayCastInput, RayHit};
use crate::math::{self as m, Rotation, Transform, UnitVec2, Vec2};
use crate::settings::{LINEAR_SLOP, MAX_POLYGON_VERTICES};

/// Rounding radius used by polygons and edges so their surfaces have a small
/// skin, which keeps the contact solver from jittering at exact touch.
pub const DEFAULT_VERTEX_RADIUS: f64 = 2.0 * LINEAR_SLOP;

/// The physical shape of a fixture.
///
/// All shapes are convex except [`Chain`], which is a sequence of edge
/// children. Operations that work per convex piece take a child index.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde-types", derive(serde::Serialize, serde::Deserialize))]
pub enum Shape {
    Circle(Circle),
    Edge(Edge),
    Polygon(Polygon),
    Chain(Chain),
}

/// A solid circle, offset from the body origin by `center`.
#[derive(Clone, Copy, Debug)]
#[cfg_attr(feature = "serde-types", derive(serde::Serialize, serde::Deserialize))]
pub struct Circle {
    pub center: Vec2,
    pub radius: f64,
}

/// A line segment with a small rounding radius.
///
/// The optional ghost vertices record the neighboring chain vertices; the
/// narrow phase uses them to discard collisions with a chain's interior.
#[derive(Clone, Copy, Debug)]
#[cfg_attr(feature = "serde-types", derive(serde::Serialize, serde::Deserialize))]
pub struct Edge {
    pub v0: Vec2,
    pub v1: Vec2,
    pub vertex_radius: f64,
    pub ghost_prev: Option<Vec2>,
    pub ghost_next: Option<Vec2>,
}

/// A convex polygon with at most [`MAX_POLYGON_VERTICES`] vertices in
/// counterclockwise order.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde-types", derive(serde::Serialize, serde::Deserialize))]
pub struct Polygon {
    vertices: Vec<Vec2>,
    normals: Vec<UnitVec2>,
    centroid: Vec2,
    pub vertex_radius: f64,
}

/// An open polyline decomposed into edge children.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde-types", derive(serde::Serialize, serde::Deserialize))]
pub struct Chain {
    vertices: Vec<Vec2>,
}

/// Mass properties of a shape at a reference density.
#[derive(Clone, Copy, Debug, Default)]
pub struct MassData {
    /// Center of mass relative to the body origin.
    pub center: Vec2,
    pub mass: f64,
    /// Rotational inertia about the body origin.
    pub inertia: f64,
}

impl Circle {
    pub fn new(radius: f64) -> Self {
        Self {
            center: Vec2::zero(),
            radius,
        }
    }

    pub fn with_center(mut self, center: Vec2) -> Self {
        self.center = center;
        self
    }
}

impl Edge {
    pub fn new(v0: Vec2, v1: Vec2) -> Self {
        Self {
            v0,
            v1,
            vertex_radius: DEFAULT_VERTEX_RADIUS,
            ghost_prev: None,
            ghost_next: None,
        }
    }

    /// The edge normal, 90 degrees clockwise from `v1 - v0`, so that a
    /// counterclockwise-wound chain's normals face outward.
    pub fn normal(&self) -> Option<UnitVec2> {
        UnitVec2::try_normalize(m::right_normal(self.v1 - self.v0)).map(|(u, _)| u)
    }
}

impl Polygon {
    /// Build a convex polygon from 3..=8 points.
    ///
    /// The points need not be ordered; the convex hull is computed and
    /// vertices are stored counterclockwise. Returns None when the points
    /// are too few, collinear, or would collapse to a degenerate hull.
    pub fn new(points: &[Vec2]) -> Option<Self> {
        if points.len() < 3 || points.len() > MAX_POLYGON_VERTICES {
            return None;
        }
        if points.iter().any(|p| !p.x.is_finite() || !p.y.is_finite()) {
            return None;
        }

        // weld nearly-coincident points
        let weld_dist_sq = (0.5 * LINEAR_SLOP) * (0.5 * LINEAR_SLOP);
        let mut unique: Vec<Vec2> = Vec::with_capacity(points.len());
        for &p in points {
            if unique.iter().all(|&q| (p - q).mag_sq() > weld_dist_sq) {
                unique.push(p);
            }
        }
        if unique.len() < 3 {
            return None;
        }

        // gift-wrap the convex hull, counterclockwise
        let rightmost = (0..unique.len())
            .max_by(|&a, &b| {
                let (pa, pb) = (unique[a], unique[b]);
                pa.x.partial_cmp(&pb.x)
                    .expect("There was a NaN somewhere")
                    .then(pa.y.partial_cmp(&pb.y).expect("There was a NaN somewhere"))
            })
            .expect("hull of an empty point set");

        let mut hull: Vec<usize> = Vec::with_capacity(unique.len());
        let mut ih = rightmost;
        loop {
            hull.push(ih);
            let mut ie = (ih + 1) % unique.len();
            for j in 0..unique.len() {
                if ie == ih {
                    ie = j;
                    continue;
                }
                let r = unique[ie] - unique[hull[hull.len() - 1]];
                let v = unique[j] - unique[hull[hull.len() - 1]];
                let c = m::cross(r, v);
                if c < 0.0 || (c == 0.0 && v.mag_sq() > r.mag_sq()) {
                    ie = j;
                }
            }
            ih = ie;
            if ie == rightmost {
                break;
            }
        }
        if hull.len() < 3 {
            return None;
        }

        let vertices: Vec<Vec2> = hull.into_iter().map(|i| unique[i]).collect();
        let mut normals = Vec::with_capacity(vertices.len());
        for i in 0..vertices.len() {
            let edge = vertices[(i + 1) % vertices.len()] - vertices[i];
            let (n, _) = UnitVec2::try_normalize(m::right_normal(edge))?;
            normals.push(n);
        }

        let centroid = polygon_centroid(&vertices);
        Some(Self {
            vertices,
            normals,
            centroid,
            vertex_radius: DEFAULT_VERTEX_RADIUS,
        })
    }

    /// An axis-aligned box with the given half extents, centered on the
    /// body origin.
    pub fn new_box(half_width: f64, half_height: f64) -> Self {
        let (hw, hh) = (half_width, half_height);
        // bottom right first, counterclockwise
        Self {
            vertices: vec![
                Vec2::new(hw, -hh),
                Vec2::new(hw, hh),
                Vec2::new(-hw, hh),
                Vec2::new(-hw, -hh),
            ],
            normals: vec![UnitVec2::X, UnitVec2::Y, -UnitVec2::X, -UnitVec2::Y],
            centroid: Vec2::zero(),
            vertex_radius: DEFAULT_VERTEX_RADIUS,
        }
    }

    /// A box with the given half extents, offset and rotated relative to the
    /// body origin.
    pub fn new_offset_box(half_width: f64, half_height: f64, center: Vec2, angle: f64) -> Self {
        let q = Rotation::from_angle(angle);
        let mut b = Self::new_box(half_width, half_height);
        for v in &mut b.vertices {
            *v = q.rotate(*v) + center;
        }
        for n in &mut b.normals {
            *n = q.rotate_unit(*n);
        }
        b.centroid = center;
        b
    }

    pub fn vertices(&self) -> &[Vec2] {
        &self.vertices
    }

    pub fn normals(&self) -> &[UnitVec2] {
        &self.normals
    }

    pub fn centroid(&self) -> Vec2 {
        self.centroid
    }
}

fn polygon_centroid(vertices: &[Vec2]) -> Vec2 {
    // triangle-fan decomposition about the mean point
    let ref_point = vertices.iter().fold(Vec2::zero(), |acc, &v| acc + v) / vertices.len() as f64;
    let mut center = Vec2::zero();
    let mut area = 0.0;
    for i in 0..vertices.len() {
        let e1 = vertices[i] - ref_point;
        let e2 = vertices[(i + 1) % vertices.len()] - ref_point;
        let tri_area = 0.5 * m::cross(e1, e2);
        area += tri_area;
        center += (e1 + e2) * (tri_area / 3.0);
    }
    ref_point + center / area
}

impl Chain {
    /// A chain needs at least two vertices to have one edge child.
    pub fn new(vertices: Vec<Vec2>) -> Option<Self> {
        if vertices.len() < 2 {
            return None;
        }
        Some(Self { vertices })
    }

    pub fn vertices(&self) -> &[Vec2] {
        &self.vertices
    }

    /// The indexed edge child, with ghost vertices filled in from neighbors.
    pub fn child_edge(&self, index: usize) -> Edge {
        Edge {
            v0: self.vertices[index],
            v1: self.vertices[index + 1],
            vertex_radius: DEFAULT_VERTEX_RADIUS,
            ghost_prev: index.checked_sub(1).map(|i| self.vertices[i]),
            ghost_next: self.vertices.get(index + 2).copied(),
        }
    }
}

//
// Uniform vertex-cloud view
//

/// A shape child viewed as a convex cloud of rounded vertices: the interface
/// consumed by GJK distance, TOI, and overlap tests.
#[derive(Clone, Debug)]
pub struct DistanceProxy<'a> {
    verts: ProxyVerts<'a>,
    norms: ProxyNorms<'a>,
    pub vertex_radius: f64,
}

#[derive(Clone, Debug)]
enum ProxyVerts<'a> {
    Inline { buf: [Vec2; 2], count: usize },
    Slice(&'a [Vec2]),
}

#[derive(Clone, Debug)]
enum ProxyNorms<'a> {
    None,
    /// An edge's two sides: the outward normal and its negation.
    Inline([UnitVec2; 2]),
    Slice(&'a [UnitVec2]),
}

impl<'a> DistanceProxy<'a> {
    pub fn vertex_count(&self) -> usize {
        match &self.verts {
            ProxyVerts::Inline { count, .. } => *count,
            ProxyVerts::Slice(s) => s.len(),
        }
    }

    pub fn vertex(&self, index: usize) -> Vec2 {
        match &self.verts {
            ProxyVerts::Inline { buf, count } => {
                debug_assert!(index < *count);
                buf[index]
            }
            ProxyVerts::Slice(s) => s[index],
        }
    }

    pub fn vertices(&self) -> &[Vec2] {
        match &self.verts {
            ProxyVerts::Inline { buf, count } => &buf[..*count],
            ProxyVerts::Slice(s) => s,
        }
    }

    /// The outward normal of the face starting at `index`,
    /// if this proxy has faces.
    pub fn normal(&self, index: usize) -> Option<UnitVec2> {
        match &self.norms {
            ProxyNorms::None => None,
            ProxyNorms::Inline(n) => n.get(index).copied(),
            ProxyNorms::Slice(s) => s.get(index).copied(),
        }
    }

    /// The index of the vertex furthest along direction `d`.
    pub fn support(&self, d: Vec2) -> usize {
        let verts = self.vertices();
        let mut best = 0;
        let mut best_dot = verts[0].dot(d);
        for (i, v) in verts.iter().enumerate().skip(1) {
            let dot = v.dot(d);
            if dot > best_dot {
                best = i;
                best_dot = dot;
            }
        }
        best
    }
}

impl Shape {
    /// The number of convex pieces this shape decomposes into.
    pub fn child_count(&self) -> usize {
        match self {
            Shape::Circle(_) | Shape::Edge(_) | Shape::Polygon(_) => 1,
            Shape::Chain(chain) => chain.vertices.len() - 1,
        }
    }

    /// The rounding radius of the shape's surface.
    pub fn vertex_radius(&self) -> f64 {
        match self {
            Shape::Circle(c) => c.radius,
            Shape::Edge(e) => e.vertex_radius,
            Shape::Polygon(p) => p.vertex_radius,
            Shape::Chain(_) => DEFAULT_VERTEX_RADIUS,
        }
    }

    /// View the indexed child as a vertex cloud.
    pub fn child_proxy(&self, index: usize) -> DistanceProxy<'_> {
        match self {
            Shape::Circle(c) => DistanceProxy {
                verts: ProxyVerts::Inline {
                    buf: [c.center, Vec2::zero()],
                    count: 1,
                },
                norms: ProxyNorms::None,
                vertex_radius: c.radius,
            },
            Shape::Edge(e) => DistanceProxy {
                verts: ProxyVerts::Inline {
                    buf: [e.v0, e.v1],
                    count: 2,
                },
                norms: match e.normal() {
                    Some(n) => ProxyNorms::Inline([n, -n]),
                    None => ProxyNorms::None,
                },
                vertex_radius: e.vertex_radius,
            },
            Shape::Polygon(p) => DistanceProxy {
                verts: ProxyVerts::Slice(&p.vertices),
                norms: ProxyNorms::Slice(&p.normals),
                vertex_radius: p.vertex_radius,
            },
            Shape::Chain(chain) => {
                debug_assert!(index < chain.vertices.len() - 1);
                let edge = chain.child_edge(index);
                DistanceProxy {
                    verts: ProxyVerts::Inline {
                        buf: [edge.v0, edge.v1],
                        count: 2,
                    },
                    norms: match edge.normal() {
                        Some(n) => ProxyNorms::Inline([n, -n]),
                        None => ProxyNorms::None,
                    },
                    vertex_radius: edge.vertex_radius,
                }
            }
        }
    }

    /// The tight AABB of the indexed child under transform `xf`.
    pub fn compute_aabb(&self, xf: &Transform, child: usize) -> AABB {
        match self {
            Shape::Circle(c) => {
                let center = xf.apply(c.center);
                AABB::point(center).padded(c.radius)
            }
            Shape::Edge(e) => {
                let (a, b) = (xf.apply(e.v0), xf.apply(e.v1));
                AABB::point(a).union(&AABB::point(b)).padded(e.vertex_radius)
            }
            Shape::Polygon(p) => {
                let mut aabb = AABB::point(xf.apply(p.vertices[0]));
                for &v in &p.vertices[1..] {
                    aabb.grow_to_contain(xf.apply(v));
                }
                aabb.padded(p.vertex_radius)
            }
            Shape::Chain(chain) => {
                let a = xf.apply(chain.vertices[child]);
                let b = xf.apply(chain.vertices[child + 1]);
                AABB::point(a)
                    .union(&AABB::point(b))
                    .padded(DEFAULT_VERTEX_RADIUS)
            }
        }
    }

    /// Mass properties at the given density. Edges and chains have no area
    /// and report zero mass.
    pub fn mass_data(&self, density: f64) -> MassData {
        match self {
            Shape::Circle(c) => {
                let mass = density * std::f64::consts::PI * c.radius * c.radius;
                MassData {
                    center: c.center,
                    mass,
                    inertia: mass * (0.5 * c.radius * c.radius + c.center.mag_sq()),
                }
            }
            Shape::Edge(e) => MassData {
                center: (e.v0 + e.v1) * 0.5,
                mass: 0.0,
                inertia: 0.0,
            },
            Shape::Polygon(p) => polygon_mass_data(&p.vertices, density),
            Shape::Chain(chain) => MassData {
                center: chain.vertices.iter().fold(Vec2::zero(), |acc, &v| acc + v)
                    / chain.vertices.len() as f64,
                mass: 0.0,
                inertia: 0.0,
            },
        }
    }

    /// Whether a world-space point is inside the shape. Always false for
    /// edges and chains, which have no interior.
    pub fn test_point(&self, xf: &Transform, point: Vec2) -> bool {
        match self {
            Shape::Circle(c) => {
                let local = xf.apply_inverse(point);
                (local - c.center).mag_sq() <= c.radius * c.radius
            }
            Shape::Polygon(p) => {
                let local = xf.apply_inverse(point);
                p.vertices
                    .iter()
                    .zip(p.normals.iter())
                    .all(|(&v, n)| n.dot(local - v) <= 0.0)
            }
            Shape::Edge(_) | Shape::Chain(_) => false,
        }
    }

    /// Cast a ray against the indexed child.
    pub fn ray_cast(&self, input: &RayCastInput, xf: &Transform, child: usize) -> Option<RayHit> {
        match self {
            Shape::Circle(c) => ray_circle(input, xf, c),
            Shape::Edge(e) => ray_edge(input, xf, e.v0, e.v1),
            Shape::Polygon(p) => ray_polygon(input, xf, p),
            Shape::Chain(chain) => {
                let e = chain.child_edge(child);
                ray_edge(input, xf, e.v0, e.v1)
            }
        }
    }
}

fn polygon_mass_data(vertices: &[Vec2], density: f64) -> MassData {
    let ref_point = vertices.iter().fold(Vec2::zero(), |acc, &v| acc + v) / vertices.len() as f64;

    let mut area = 0.0;
    let mut center = Vec2::zero();
    let mut inertia = 0.0;
    for i in 0..vertices.len() {
        let e1 = vertices[i] - ref_point;
        let e2 = vertices[(i + 1) % vertices.len()] - ref_point;
        let d = m::cross(e1, e2);
        let tri_area = 0.5 * d;
        area += tri_area;
        center += (e1 + e2) * (tri_area / 3.0);
        // second moment of the triangle about ref_point
        let intx2 = e1.x * e1.x + e2.x * e1.x + e2.x * e2.x;
        let inty2 = e1.y * e1.y + e2.y * e1.y + e2.y * e2.y;
        inertia += (0.25 / 3.0) * d * (intx2 + inty2);
    }

    let mass = density * area;
    center /= area;
    let com = ref_point + center;
    // parallel axis: shift from ref_point to the centroid, then to the origin
    let inertia_about_origin =
        density * inertia - mass * center.mag_sq() + mass * com.mag_sq();
    MassData {
        center: com,
        mass,
        inertia: inertia_about_origin,
    }
}

fn ray_circle(input: &RayCastInput, xf: &Transform, c: &Circle) -> Option<RayHit> {
    let center = xf.apply(c.center);
    let s = input.p1 - center;
    let b = s.mag_sq() - c.radius * c.radius;

    let r = input.p2 - input.p1;
    let cc = s.dot(r);
    let rr = r.mag_sq();
    let sigma = cc * cc - rr * b;
    if sigma < 0.0 || rr < f64::EPSILON {
        return None;
    }

    let t = -(cc + sigma.sqrt()) / rr;
    if (0.0..=input.max_fraction).contains(&t) {
        let normal = UnitVec2::normalize_or_zero(s + r * t);
        Some(RayHit {
            fraction: t,
            normal,
        })
    } else {
        None
    }
}

fn ray_edge(input: &RayCastInput, xf: &Transform, v0: Vec2, v1: Vec2) -> Option<RayHit> {
    // work in the edge's local frame
    let p1 = xf.apply_inverse(input.p1);
    let p2 = xf.apply_inverse(input.p2);
    let d = p2 - p1;

    let e = v1 - v0;
    let (normal, _) = UnitVec2::try_normalize(m::right_normal(e))?;

    // p = p1 + t * d, (p - v0) . n = 0
    let numerator = normal.dot(v0 - p1);
    let denominator = normal.dot(d);
    if denominator == 0.0 {
        return None;
    }
    let t = numerator / denominator;
    if t < 0.0 || t > input.max_fraction {
        return None;
    }

    let hit_point = p1 + d * t;
    // fraction along the segment
    let ee = e.mag_sq();
    if ee == 0.0 {
        return None;
    }
    let s = (hit_point - v0).dot(e) / ee;
    if !(0.0..=1.0).contains(&s) {
        return None;
    }

    // face the normal against the ray
    let n = if numerator > 0.0 { -normal } else { normal };
    Some(RayHit {
        fraction: t,
        normal: xf.q.rotate_unit(n),
    })
}

fn ray_polygon(input: &RayCastInput, xf: &Transform, poly: &Polygon) -> Option<RayHit> {
    let p1 = xf.apply_inverse(input.p1);
    let p2 = xf.apply_inverse(input.p2);
    let d = p2 - p1;

    let mut lower = 0.0;
    let mut upper = input.max_fraction;
    let mut hit_index: Option<usize> = None;

    for (i, (&v, n)) in poly.vertices.iter().zip(poly.normals.iter()).enumerate() {
        let numerator = n.dot(v - p1);
        let denominator = n.dot(d);

        if denominator == 0.0 {
            if numerator < 0.0 {
                return None;
            }
        } else {
            let t = numerator / denominator;
            if denominator < 0.0 && t > lower {
                // entering the half-plane
                lower = t;
                hit_index = Some(i);
            } else if denominator > 0.0 && t < upper {
                // leaving the half-plane
                upper = t;
            }
        }
        if upper < lower {
            return None;
        }
    }

    hit_index.map(|i| RayHit {
        fraction: lower,
        normal: xf.q.rotate_unit(poly.normals[i]),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn box_has_ccw_vertices_and_orthogonal_normals() {
        let b = Polygon::new_box(2.0, 1.0);
        let verts = b.vertices();
        let norms = b.normals();
        assert_eq!(verts.len(), 4);
        for i in 0..4 {
            let edge = verts[(i + 1) % 4] - verts[i];
            // normals perpendicular to their edge
            assert!(approx(norms[i].dot(edge), 0.0));
            // CCW winding
            let next = verts[(i + 2) % 4] - verts[(i + 1) % 4];
            assert!(m::cross(edge, next) > 0.0);
        }
    }

    #[test]
    fn hull_reorders_and_rejects_degenerate_input() {
        // a clockwise triangle gets rewound counterclockwise
        let tri = Polygon::new(&[
            Vec2::new(0.0, 1.0),
            Vec2::new(1.0, -1.0),
            Vec2::new(-1.0, -1.0),
        ])
        .unwrap();
        let verts = tri.vertices();
        let mut area2 = 0.0;
        for i in 0..verts.len() {
            area2 += m::cross(verts[i], verts[(i + 1) % verts.len()]);
        }
        assert!(area2 > 0.0);

        // collinear points have no hull
        assert!(Polygon::new(&[
            Vec2::new(0.0, 0.0),
            Vec2::new(1.0, 0.0),
            Vec2::new(2.0, 0.0),
        ])
        .is_none());
        assert!(Polygon::new(&[Vec2::new(0.0, 0.0), Vec2::new(1.0, 0.0)]).is_none());
    }

    #[test]
    fn circle_mass_data() {
        let c = Shape::Circle(Circle::new(2.0).with_center(Vec2::new(1.0, 0.0)));
        let md = c.mass_data(0.5);
        let expected_mass = 0.5 * std::f64::consts::PI * 4.0;
        assert!(approx(md.mass, expected_mass));
        assert!(approx(md.center.x, 1.0));
        assert!(approx(md.inertia, expected_mass * (0.5 * 4.0 + 1.0)));
    }

    #[test]
    fn box_mass_data_matches_formula() {
        let b = Shape::Polygon(Polygon::new_box(1.0, 1.0));
        let md = b.mass_data(1.0);
        assert!(approx(md.mass, 4.0));
        assert!(approx(md.center.x, 0.0) && approx(md.center.y, 0.0));
        // I = m (w^2 + h^2) / 12 for a centered box (w = h = 2)
        assert!(approx(md.inertia, 4.0 * (4.0 + 4.0) / 12.0));
    }

    #[test]
    fn aabb_of_rotated_box() {
        let b = Shape::Polygon(Polygon::new_box(1.0, 1.0));
        let xf = Transform::new(Vec2::new(5.0, 0.0), std::f64::consts::FRAC_PI_4);
        let aabb = b.compute_aabb(&xf, 0);
        let half_diag = std::f64::consts::SQRT_2;
        assert!((aabb.max.x - (5.0 + half_diag)).abs() < 0.05);
        assert!((aabb.min.x - (5.0 - half_diag)).abs() < 0.05);
    }

    #[test]
    fn chain_children_carry_ghosts() {
        let chain = Chain::new(vec![
            Vec2::new(0.0, 0.0),
            Vec2::new(1.0, 0.0),
            Vec2::new(2.0, 1.0),
            Vec2::new(3.0, 1.0),
        ])
        .unwrap();
        let shape = Shape::Chain(chain.clone());
        assert_eq!(shape.child_count(), 3);

        let first = chain.child_edge(0);
        assert!(first.ghost_prev.is_none());
        assert_eq!(first.ghost_next, Some(Vec2::new(2.0, 1.0)));

        let middle = chain.child_edge(1);
        assert_eq!(middle.ghost_prev, Some(Vec2::new(0.0, 0.0)));
        assert_eq!(middle.ghost_next, Some(Vec2::new(3.0, 1.0)));

        let last = chain.child_edge(2);
        assert!(last.ghost_next.is_none());
    }

    #[test]
    fn point_tests() {
        let b = Shape::Polygon(Polygon::new_box(1.0, 1.0));
        let xf = Transform::new(Vec2::new(2.0, 0.0), 0.0);
        assert!(b.test_point(&xf, Vec2::new(2.5, 0.5)));
        assert!(!b.test_point(&xf, Vec2::new(0.5, 0.5)));

        let c = Shape::Circle(Circle::new(1.0));
        assert!(c.test_point(&Transform::IDENTITY, Vec2::new(0.5, 0.5)));
        assert!(!c.test_point(&Transform::IDENTITY, Vec2::new(1.0, 1.0)));
    }

    #[test]
    fn ray_against_circle_and_box() {
        let c = Shape::Circle(Circle::new(1.0));
        let xf = Transform::new(Vec2::new(5.0, 0.0), 0.0);
        let input = RayCastInput::new(Vec2::new(0.0, 0.0), Vec2::new(10.0, 0.0));
        let hit = c.ray_cast(&input, &xf, 0).unwrap();
        assert!(approx(hit.fraction, 0.4));
        assert!(approx(hit.normal.x, -1.0));

        let b = Shape::Polygon(Polygon::new_box(1.0, 1.0));
        let hit = b.ray_cast(&input, &xf, 0).unwrap();
        assert!(approx(hit.fraction, 0.4));
        assert!(approx(hit.normal.x, -1.0));

        // pointing away
        let miss = RayCastInput::new(Vec2::new(0.0, 0.0), Vec2::new(-10.0, 0.0));
        assert!(c.ray_cast(&miss, &xf, 0).is_none());
        assert!(b.ray_cast(&miss, &xf, 0).is_none());
    }

    #[test]
    fn support_points() {
        let b = Shape::Polygon(Polygon::new_box(1.0, 2.0));
        let proxy = b.child_proxy(0);
        let i = proxy.support(Vec2::new(1.0, 1.0));
        assert_eq!(proxy.vertex(i), Vec2::new(1.0, 2.0));

        let c = Shape::Circle(Circle::new(1.0).with_center(Vec2::new(3.0, 0.0)));
        let proxy = c.child_proxy(0);
        assert_eq!(proxy.vertex_count(), 1);
        assert_eq!(proxy.vertex(proxy.support(Vec2::new(0.0, 1.0))), Vec2::new(3.0, 0.0));
    }
}
