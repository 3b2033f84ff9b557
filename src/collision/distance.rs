//! Closest-point queries between convex shapes (GJK).

use super::shape::DistanceProxy;
use crate::math::{self as m, Transform, Vec2};

/// Vertex-index pairs of a previously found simplex, reusable to warm-start
/// the next query on the same shape pair.
#[derive(Clone, Copy, Debug, Default)]
pub struct SimplexCache {
    /// Size measure of the cached simplex, used to detect staleness.
    pub metric: f64,
    pub count: usize,
    pub index_a: [usize; 3],
    pub index_b: [usize; 3],
}

#[derive(Clone, Copy, Debug)]
pub struct DistanceInput<'a> {
    pub proxy_a: &'a DistanceProxy<'a>,
    pub proxy_b: &'a DistanceProxy<'a>,
    pub xf_a: Transform,
    pub xf_b: Transform,
    /// Whether to shrink the reported distance by the vertex radii.
    pub use_radii: bool,
    pub max_iterations: u32,
}

#[derive(Clone, Copy, Debug)]
pub struct DistanceOutput {
    /// Witness point on shape A, in world space.
    pub point_a: Vec2,
    /// Witness point on shape B, in world space.
    pub point_b: Vec2,
    pub distance: f64,
    pub iterations: u32,
}

#[derive(Clone, Copy, Debug, Default)]
struct SimplexVertex {
    /// Support point on proxy A in world space.
    w_a: Vec2,
    /// Support point on proxy B in world space.
    w_b: Vec2,
    /// `w_b - w_a`, a point on the Minkowski difference.
    w: Vec2,
    /// Barycentric coordinate of `w` in the closest feature.
    a: f64,
    index_a: usize,
    index_b: usize,
}

#[derive(Clone, Copy, Debug, Default)]
struct Simplex {
    v: [SimplexVertex; 3],
    count: usize,
}

impl Simplex {
    fn read_cache(
        cache: &SimplexCache,
        proxy_a: &DistanceProxy<'_>,
        xf_a: &Transform,
        proxy_b: &DistanceProxy<'_>,
        xf_b: &Transform,
    ) -> Self {
        let mut s = Simplex::default();
        s.count = cache.count;
        for i in 0..s.count {
            let index_a = cache.index_a[i];
            let index_b = cache.index_b[i];
            let w_a = xf_a.apply(proxy_a.vertex(index_a));
            let w_b = xf_b.apply(proxy_b.vertex(index_b));
            s.v[i] = SimplexVertex {
                w_a,
                w_b,
                w: w_b - w_a,
                a: 0.0,
                index_a,
                index_b,
            };
        }

        // discard a stale cache whose simplex size changed too much
        if s.count > 1 {
            let metric1 = cache.metric;
            let metric2 = s.metric();
            if metric2 < 0.5 * metric1 || 2.0 * metric1 < metric2 || metric2 < f64::EPSILON {
                s.count = 0;
            }
        }

        if s.count == 0 {
            let w_a = xf_a.apply(proxy_a.vertex(0));
            let w_b = xf_b.apply(proxy_b.vertex(0));
            s.v[0] = SimplexVertex {
                w_a,
                w_b,
                w: w_b - w_a,
                a: 1.0,
                index_a: 0,
                index_b: 0,
            };
            s.count = 1;
        }
        s
    }

    fn write_cache(&self, cache: &mut SimplexCache) {
        cache.metric = self.metric();
        cache.count = self.count;
        for i in 0..self.count {
            cache.index_a[i] = self.v[i].index_a;
            cache.index_b[i] = self.v[i].index_b;
        }
    }

    fn metric(&self) -> f64 {
        match self.count {
            1 => 0.0,
            2 => (self.v[1].w - self.v[0].w).mag(),
            3 => m::cross(self.v[1].w - self.v[0].w, self.v[2].w - self.v[0].w),
            _ => 0.0,
        }
    }

    fn search_direction(&self) -> Vec2 {
        match self.count {
            1 => -self.v[0].w,
            2 => {
                let e12 = self.v[1].w - self.v[0].w;
                let sgn = m::cross(e12, -self.v[0].w);
                if sgn > 0.0 {
                    m::left_normal(e12)
                } else {
                    m::right_normal(e12)
                }
            }
            _ => Vec2::zero(),
        }
    }

    fn closest_point(&self) -> Vec2 {
        match self.count {
            1 => self.v[0].w,
            2 => self.v[0].w * self.v[0].a + self.v[1].w * self.v[1].a,
            _ => Vec2::zero(),
        }
    }

    fn witness_points(&self) -> (Vec2, Vec2) {
        match self.count {
            1 => (self.v[0].w_a, self.v[0].w_b),
            2 => (
                self.v[0].w_a * self.v[0].a + self.v[1].w_a * self.v[1].a,
                self.v[0].w_b * self.v[0].a + self.v[1].w_b * self.v[1].a,
            ),
            3 => {
                let p = self.v[0].w_a * self.v[0].a
                    + self.v[1].w_a * self.v[1].a
                    + self.v[2].w_a * self.v[2].a;
                (p, p)
            }
            _ => (Vec2::zero(), Vec2::zero()),
        }
    }

    /// Closest point on a segment to the origin, in barycentric terms.
    fn solve2(&mut self) {
        let w1 = self.v[0].w;
        let w2 = self.v[1].w;
        let e12 = w2 - w1;

        let d12_2 = -w1.dot(e12);
        if d12_2 <= 0.0 {
            // region w1
            self.v[0].a = 1.0;
            self.count = 1;
            return;
        }
        let d12_1 = w2.dot(e12);
        if d12_1 <= 0.0 {
            // region w2
            self.v[0] = self.v[1];
            self.v[0].a = 1.0;
            self.count = 1;
            return;
        }
        // interior
        let inv_d12 = 1.0 / (d12_1 + d12_2);
        self.v[0].a = d12_1 * inv_d12;
        self.v[1].a = d12_2 * inv_d12;
        self.count = 2;
    }

    /// Closest feature of a triangle to the origin, in barycentric terms.
    fn solve3(&mut self) {
        let w1 = self.v[0].w;
        let w2 = self.v[1].w;
        let w3 = self.v[2].w;

        let e12 = w2 - w1;
        let d12_1 = w2.dot(e12);
        let d12_2 = -w1.dot(e12);

        let e13 = w3 - w1;
        let d13_1 = w3.dot(e13);
        let d13_2 = -w1.dot(e13);

        let e23 = w3 - w2;
        let d23_1 = w3.dot(e23);
        let d23_2 = -w2.dot(e23);

        let n123 = m::cross(e12, e13);
        let d123_1 = n123 * m::cross(w2, w3);
        let d123_2 = n123 * m::cross(w3, w1);
        let d123_3 = n123 * m::cross(w1, w2);

        if d12_2 <= 0.0 && d13_2 <= 0.0 {
            // region w1
            self.v[0].a = 1.0;
            self.count = 1;
            return;
        }
        if d12_1 > 0.0 && d12_2 > 0.0 && d123_3 <= 0.0 {
            // region e12
            let inv = 1.0 / (d12_1 + d12_2);
            self.v[0].a = d12_1 * inv;
            self.v[1].a = d12_2 * inv;
            self.count = 2;
            return;
        }
        if d13_1 > 0.0 && d13_2 > 0.0 && d123_2 <= 0.0 {
            // region e13
            let inv = 1.0 / (d13_1 + d13_2);
            self.v[0].a = d13_1 * inv;
            self.v[2].a = d13_2 * inv;
            self.v[1] = self.v[2];
            self.count = 2;
            return;
        }
        if d12_1 <= 0.0 && d23_2 <= 0.0 {
            // region w2
            self.v[0] = self.v[1];
            self.v[0].a = 1.0;
            self.count = 1;
            return;
        }
        if d13_1 <= 0.0 && d23_1 <= 0.0 {
            // region w3
            self.v[0] = self.v[2];
            self.v[0].a = 1.0;
            self.count = 1;
            return;
        }
        if d23_1 > 0.0 && d23_2 > 0.0 && d123_1 <= 0.0 {
            // region e23
            let inv = 1.0 / (d23_1 + d23_2);
            self.v[1].a = d23_1 * inv;
            self.v[2].a = d23_2 * inv;
            self.v[0] = self.v[2];
            self.count = 2;
            return;
        }
        // interior: origin is enclosed
        let inv = 1.0 / (d123_1 + d123_2 + d123_3);
        self.v[0].a = d123_1 * inv;
        self.v[1].a = d123_2 * inv;
        self.v[2].a = d123_3 * inv;
        self.count = 3;
    }
}

/// Find the closest points between two convex vertex clouds.
///
/// The cache, when carried between calls on a slowly moving pair, usually
/// lets the refinement finish in one or two iterations.
pub fn distance(cache: &mut SimplexCache, input: &DistanceInput<'_>) -> DistanceOutput {
    let proxy_a = input.proxy_a;
    let proxy_b = input.proxy_b;

    let mut simplex = Simplex::read_cache(cache, proxy_a, &input.xf_a, proxy_b, &input.xf_b);

    let mut iter = 0;
    // indices making up the simplex at loop top, to detect repeats
    let mut save_a = [0usize; 3];
    let mut save_b = [0usize; 3];

    while iter < input.max_iterations {
        let save_count = simplex.count;
        for i in 0..save_count {
            save_a[i] = simplex.v[i].index_a;
            save_b[i] = simplex.v[i].index_b;
        }

        match simplex.count {
            2 => simplex.solve2(),
            3 => simplex.solve3(),
            _ => {}
        }

        // a full triangle encloses the origin: overlap
        if simplex.count == 3 {
            break;
        }

        let d = simplex.search_direction();
        if d.mag_sq() < f64::EPSILON * f64::EPSILON {
            // the origin sits on a simplex feature; witness points are valid
            // but a support direction is not
            break;
        }

        let index_a = proxy_a.support(input.xf_a.q.inverse_rotate(-d));
        let index_b = proxy_b.support(input.xf_b.q.inverse_rotate(d));
        let w_a = input.xf_a.apply(proxy_a.vertex(index_a));
        let w_b = input.xf_b.apply(proxy_b.vertex(index_b));

        iter += 1;

        // stop on a repeated support point: no progress possible
        let repeat = (0..save_count).any(|i| index_a == save_a[i] && index_b == save_b[i]);
        if repeat {
            break;
        }

        simplex.v[simplex.count] = SimplexVertex {
            w_a,
            w_b,
            w: w_b - w_a,
            a: 0.0,
            index_a,
            index_b,
        };
        simplex.count += 1;
    }

    let (mut point_a, mut point_b) = simplex.witness_points();
    let mut dist = (point_b - point_a).mag();
    simplex.write_cache(cache);

    if input.use_radii {
        let r_a = proxy_a.vertex_radius;
        let r_b = proxy_b.vertex_radius;
        if dist > r_a + r_b && dist > f64::EPSILON {
            // shapes still separated; move witness points onto the surfaces
            dist -= r_a + r_b;
            let normal = (point_b - point_a).normalized();
            point_a += normal * r_a;
            point_b -= normal * r_b;
        } else {
            // overlapping rounded shapes: collapse to the midpoint
            let p = (point_a + point_b) * 0.5;
            point_a = p;
            point_b = p;
            dist = 0.0;
        }
    }

    DistanceOutput {
        point_a,
        point_b,
        distance: dist,
        iterations: iter,
    }
}

/// Whether two shape children overlap, with their surface radii included.
pub fn test_overlap(
    proxy_a: &DistanceProxy<'_>,
    xf_a: Transform,
    proxy_b: &DistanceProxy<'_>,
    xf_b: Transform,
) -> bool {
    let mut cache = SimplexCache::default();
    let input = DistanceInput {
        proxy_a,
        proxy_b,
        xf_a,
        xf_b,
        use_radii: true,
        max_iterations: 20,
    };
    let out = distance(&mut cache, &input);
    out.distance < 10.0 * f64::EPSILON
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collision::shape::{Circle, Polygon, Shape};

    fn approx(a: f64, b: f64, tol: f64) -> bool {
        (a - b).abs() < tol
    }

    fn run_distance(shape_a: &Shape, xf_a: Transform, shape_b: &Shape, xf_b: Transform) -> DistanceOutput {
        let proxy_a = shape_a.child_proxy(0);
        let proxy_b = shape_b.child_proxy(0);
        let mut cache = SimplexCache::default();
        distance(
            &mut cache,
            &DistanceInput {
                proxy_a: &proxy_a,
                proxy_b: &proxy_b,
                xf_a,
                xf_b,
                use_radii: false,
                max_iterations: 20,
            },
        )
    }

    #[test]
    fn distance_between_separated_circles() {
        let a = Shape::Circle(Circle::new(1.0));
        let b = Shape::Circle(Circle::new(1.0));
        let out = run_distance(
            &a,
            Transform::IDENTITY,
            &b,
            Transform::new(Vec2::new(5.0, 0.0), 0.0),
        );
        // circle proxies are their centers; radii excluded here
        assert!(approx(out.distance, 5.0, 1e-9));
    }

    #[test]
    fn distance_between_boxes_face_to_face() {
        let a = Shape::Polygon(Polygon::new_box(1.0, 1.0));
        let b = Shape::Polygon(Polygon::new_box(1.0, 1.0));
        let out = run_distance(
            &a,
            Transform::IDENTITY,
            &b,
            Transform::new(Vec2::new(5.0, 0.0), 0.0),
        );
        assert!(approx(out.distance, 3.0, 1e-9));
        assert!(approx(out.point_a.x, 1.0, 1e-9));
        assert!(approx(out.point_b.x, 4.0, 1e-9));
    }

    #[test]
    fn distance_corner_to_corner() {
        let a = Shape::Polygon(Polygon::new_box(1.0, 1.0));
        let b = Shape::Polygon(Polygon::new_box(1.0, 1.0));
        let out = run_distance(
            &a,
            Transform::IDENTITY,
            &b,
            Transform::new(Vec2::new(4.0, 4.0), 0.0),
        );
        let expected = (2.0f64 * 2.0 + 2.0 * 2.0).sqrt();
        assert!(approx(out.distance, expected, 1e-9));
    }

    #[test]
    fn overlap_reports_zero_distance() {
        let a = Shape::Polygon(Polygon::new_box(1.0, 1.0));
        let b = Shape::Polygon(Polygon::new_box(1.0, 1.0));
        let out = run_distance(
            &a,
            Transform::IDENTITY,
            &b,
            Transform::new(Vec2::new(0.5, 0.0), 0.0),
        );
        assert!(out.distance < 1e-9);
    }

    #[test]
    fn test_overlap_includes_radii() {
        let a = Shape::Circle(Circle::new(1.0));
        let b = Shape::Circle(Circle::new(1.0));
        let proxy_a = a.child_proxy(0);
        let proxy_b = b.child_proxy(0);
        assert!(test_overlap(
            &proxy_a,
            Transform::IDENTITY,
            &proxy_b,
            Transform::new(Vec2::new(1.9, 0.0), 0.0),
        ));
        assert!(!test_overlap(
            &proxy_a,
            Transform::IDENTITY,
            &proxy_b,
            Transform::new(Vec2::new(2.1, 0.0), 0.0),
        ));
    }

    #[test]
    fn cached_simplex_converges_faster_on_second_query() {
        let a = Shape::Polygon(Polygon::new_box(1.0, 1.0));
        let b = Shape::Polygon(Polygon::new_box(1.0, 1.0));
        let proxy_a = a.child_proxy(0);
        let proxy_b = b.child_proxy(0);
        let mut cache = SimplexCache::default();
        let input = DistanceInput {
            proxy_a: &proxy_a,
            proxy_b: &proxy_b,
            xf_a: Transform::IDENTITY,
            xf_b: Transform::new(Vec2::new(5.0, 0.1), 0.0),
            use_radii: false,
            max_iterations: 20,
        };
        let first = distance(&mut cache, &input);
        // nudge B slightly and re-query with the warm cache
        let input2 = DistanceInput {
            xf_b: Transform::new(Vec2::new(5.0, 0.11), 0.0),
            ..input
        };
        let second = distance(&mut cache, &input2);
        assert!(second.iterations <= first.iterations);
        assert!(approx(second.distance, 3.0, 1e-6));
    }
}
