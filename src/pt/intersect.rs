use super::*;

// Low-level ray/primitive tests. These are the only routines that touch
// raw geometry; everything above them works through `Shape`.

const TRIANGLE_PARALLEL_EPSILON: f32 = 1e-8;

// Solves |origin + t*dir - center|^2 = radius^2 for the smallest positive
// root, falling back to the larger one when the origin is inside the
// sphere. The direction does not have to be unit length.
pub fn ray_sphere(origin: &Point3, dir: &Vec3, center: &Point3, radius: f32) -> Option<f32> {
    let oc = origin - center;
    let a = dir.dot(dir);
    let b = oc.dot(dir);
    let c = oc.dot(&oc) - radius * radius;

    // Origin outside the sphere and pointing away from it.
    if c > 0.0 && b > 0.0 {
        return None;
    }

    let disc = b * b - a * c;
    if disc < 0.0 {
        return None;
    }

    let d = disc.sqrt();
    let t = (-b - d) / a;
    if t > 0.0 {
        return Some(t);
    }
    let t = (-b + d) / a;
    if t > 0.0 {
        return Some(t);
    }
    None
}

// Moeller-Trumbore. Returns (t, u, v) with barycentrics relative to
// (v1, v2); zero-area and edge-on triangles reject through the
// determinant guard.
pub fn ray_triangle(
    origin: &Point3,
    dir: &Vec3,
    v0: &Point3,
    v1: &Point3,
    v2: &Point3,
) -> Option<(f32, f32, f32)> {
    let e1 = v1 - v0;
    let e2 = v2 - v0;
    let pvec = dir.cross(&e2);
    let det = e1.dot(&pvec);
    if det.abs() < TRIANGLE_PARALLEL_EPSILON {
        return None;
    }

    let inv_det = 1.0 / det;
    let tvec = origin - v0;
    let u = tvec.dot(&pvec) * inv_det;
    if !(0.0..=1.0).contains(&u) {
        return None;
    }

    let qvec = tvec.cross(&e1);
    let v = dir.dot(&qvec) * inv_det;
    if v < 0.0 || u + v > 1.0 {
        return None;
    }

    let t = e2.dot(&qvec) * inv_det;
    if t > 0.0 {
        Some((t, u, v))
    } else {
        None
    }
}

//
// Ray/AABB slab test with precomputed reciprocals and direction signs.
//

pub struct RayAabbIntersector {
    inv_dir: Vec3,
    dir_neg: [bool; 3],
}

impl RayAabbIntersector {
    pub fn new(ray: &Ray) -> Self {
        let inv_dir = Vec3::new(1.0 / ray.dir.x, 1.0 / ray.dir.y, 1.0 / ray.dir.z);
        let dir_neg = [inv_dir.x < 0.0, inv_dir.y < 0.0, inv_dir.z < 0.0];
        Self { inv_dir, dir_neg }
    }

    #[inline]
    pub fn dir_neg(&self, axis: usize) -> bool {
        self.dir_neg[axis]
    }

    // Conservative error bound on the slab max, per PBRT.
    #[inline]
    fn gamma(n: f32) -> f32 {
        const MACHINE_EPSILON: f32 = f32::EPSILON * 0.5;
        (n * MACHINE_EPSILON) / (1.0 - n * MACHINE_EPSILON)
    }

    // Hits iff the slab interval satisfies t_min < t_max_limit and
    // t_max > 0. Zero direction components produce +/- infinity in
    // `inv_dir` and fall out of the comparisons naturally.
    pub fn hit(&self, ray: &Ray, aabb: &Aabb, t_max_limit: f32) -> bool {
        let mut mn_tx: f32;
        let mut mn_ty: f32;
        let mut mn_tz: f32;
        let mut mx_tx: f32;
        let mut mx_ty: f32;
        let mut mx_tz: f32;
        if self.dir_neg[0] {
            mn_tx = aabb.max().x;
            mx_tx = aabb.min().x;
        } else {
            mn_tx = aabb.min().x;
            mx_tx = aabb.max().x;
        }
        if self.dir_neg[1] {
            mn_ty = aabb.max().y;
            mx_ty = aabb.min().y;
        } else {
            mn_ty = aabb.min().y;
            mx_ty = aabb.max().y;
        }
        if self.dir_neg[2] {
            mn_tz = aabb.max().z;
            mx_tz = aabb.min().z;
        } else {
            mn_tz = aabb.min().z;
            mx_tz = aabb.max().z;
        }
        mn_tx = (mn_tx - ray.origin.x) * self.inv_dir.x;
        mn_ty = (mn_ty - ray.origin.y) * self.inv_dir.y;
        mn_tz = (mn_tz - ray.origin.z) * self.inv_dir.z;
        mx_tx = (mx_tx - ray.origin.x) * self.inv_dir.x;
        mx_ty = (mx_ty - ray.origin.y) * self.inv_dir.y;
        mx_tz = (mx_tz - ray.origin.z) * self.inv_dir.z;

        // Keeps grazing hits (t_min == t_max) classified as hits.
        mx_tx *= 1.0 + 2.0 * Self::gamma(3.0);
        mx_ty *= 1.0 + 2.0 * Self::gamma(3.0);
        mx_tz *= 1.0 + 2.0 * Self::gamma(3.0);

        if mn_tx > mx_ty || mn_ty > mx_tx {
            return false;
        }
        if mn_ty > mn_tx {
            mn_tx = mn_ty;
        }
        if mx_ty < mx_tx {
            mx_tx = mx_ty;
        }
        if mn_tx > mx_tz || mn_tz > mx_tx {
            return false;
        }
        if mn_tz > mn_tx {
            mn_tx = mn_tz;
        }
        if mx_tz < mx_tx {
            mx_tx = mx_tz;
        }

        (mn_tx < t_max_limit) && (mx_tx > 0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ray_sphere_head_on() {
        // Unit sphere at origin, ray from (0,0,5) toward -z.
        let t = ray_sphere(
            &Point3::new(0.0, 0.0, 5.0),
            &Vec3::new(0.0, 0.0, -1.0),
            &Point3::origin(),
            1.0,
        )
        .unwrap();
        assert_ulps_eq!(t, 4.0, max_ulps = 4);
    }

    #[test]
    fn test_ray_sphere_from_inside() {
        let t = ray_sphere(
            &Point3::origin(),
            &Vec3::new(0.0, 0.0, -1.0),
            &Point3::origin(),
            1.0,
        )
        .unwrap();
        assert_ulps_eq!(t, 1.0, max_ulps = 4);
    }

    #[test]
    fn test_ray_sphere_miss_and_behind() {
        assert!(ray_sphere(
            &Point3::new(0.0, 3.0, 5.0),
            &Vec3::new(0.0, 0.0, -1.0),
            &Point3::origin(),
            1.0,
        )
        .is_none());
        // Sphere entirely behind the ray.
        assert!(ray_sphere(
            &Point3::new(0.0, 0.0, 5.0),
            &Vec3::new(0.0, 0.0, 1.0),
            &Point3::origin(),
            1.0,
        )
        .is_none());
    }

    #[test]
    fn test_ray_sphere_unnormalized_dir() {
        // Same geometry as the head-on case, direction scaled by 2:
        // t halves because it is measured in direction units.
        let t = ray_sphere(
            &Point3::new(0.0, 0.0, 5.0),
            &Vec3::new(0.0, 0.0, -2.0),
            &Point3::origin(),
            1.0,
        )
        .unwrap();
        assert_ulps_eq!(t, 2.0, max_ulps = 4);
    }

    #[test]
    fn test_ray_triangle_hit() {
        let (t, u, v) = ray_triangle(
            &Point3::new(0.25, 0.25, 1.0),
            &Vec3::new(0.0, 0.0, -1.0),
            &Point3::new(0.0, 0.0, 0.0),
            &Point3::new(1.0, 0.0, 0.0),
            &Point3::new(0.0, 1.0, 0.0),
        )
        .unwrap();
        assert_ulps_eq!(t, 1.0, max_ulps = 4);
        assert_ulps_eq!(u, 0.25, max_ulps = 4);
        assert_ulps_eq!(v, 0.25, max_ulps = 4);
    }

    #[test]
    fn test_ray_triangle_parallel() {
        assert!(ray_triangle(
            &Point3::new(0.25, 0.25, 1.0),
            &Vec3::new(1.0, 0.0, 0.0),
            &Point3::new(0.0, 0.0, 0.0),
            &Point3::new(1.0, 0.0, 0.0),
            &Point3::new(0.0, 1.0, 0.0),
        )
        .is_none());
    }

    #[test]
    fn test_ray_triangle_zero_area() {
        // Degenerate triangle rejects through the determinant guard.
        assert!(ray_triangle(
            &Point3::new(0.25, 0.25, 1.0),
            &Vec3::new(0.0, 0.0, -1.0),
            &Point3::new(0.0, 0.0, 0.0),
            &Point3::new(1.0, 0.0, 0.0),
            &Point3::new(2.0, 0.0, 0.0),
        )
        .is_none());
    }

    #[test]
    fn test_ray_triangle_outside_barycentrics() {
        assert!(ray_triangle(
            &Point3::new(0.75, 0.75, 1.0),
            &Vec3::new(0.0, 0.0, -1.0),
            &Point3::new(0.0, 0.0, 0.0),
            &Point3::new(1.0, 0.0, 0.0),
            &Point3::new(0.0, 1.0, 0.0),
        )
        .is_none());
    }

    #[test]
    fn test_ray_aabb_basic() {
        let aabb = Aabb::from_min_max(&Point3::new(-1.0, -1.0, -1.0), &Point3::new(1.0, 1.0, 1.0));
        let hit_ray = Ray::new(Point3::new(0.0, 0.0, 5.0), Vec3::new(0.0, 0.0, -1.0));
        assert!(RayAabbIntersector::new(&hit_ray).hit(&hit_ray, &aabb, f32::INFINITY));

        let miss_ray = Ray::new(Point3::new(0.0, 3.0, 5.0), Vec3::new(0.0, 0.0, -1.0));
        assert!(!RayAabbIntersector::new(&miss_ray).hit(&miss_ray, &aabb, f32::INFINITY));

        // Box entirely behind the ray.
        let behind_ray = Ray::new(Point3::new(0.0, 0.0, 5.0), Vec3::new(0.0, 0.0, 1.0));
        assert!(!RayAabbIntersector::new(&behind_ray).hit(&behind_ray, &aabb, f32::INFINITY));

        // Box beyond the current closest hit.
        assert!(!RayAabbIntersector::new(&hit_ray).hit(&hit_ray, &aabb, 2.0));
    }

    #[test]
    fn test_ray_aabb_grazing_flat_box() {
        // Planar box: the slab interval degenerates to t_min == t_max and
        // must still count as a hit.
        let aabb = Aabb::from_min_max(&Point3::new(-1.0, 0.0, -1.0), &Point3::new(1.0, 0.0, 1.0));
        let ray = Ray::new(Point3::new(0.0, 5.0, 0.0), Vec3::new(0.0, -1.0, 0.0));
        assert!(RayAabbIntersector::new(&ray).hit(&ray, &aabb, f32::INFINITY));
    }

    #[test]
    fn test_ray_aabb_zero_direction_component() {
        // dir.y == 0 produces infinite inv_dir; the comparisons must
        // resolve it without special cases.
        let aabb = Aabb::from_min_max(&Point3::new(-1.0, -1.0, -1.0), &Point3::new(1.0, 1.0, 1.0));
        let inside_slab = Ray::new(Point3::new(0.0, 0.5, 5.0), Vec3::new(0.0, 0.0, -1.0));
        assert!(RayAabbIntersector::new(&inside_slab).hit(&inside_slab, &aabb, f32::INFINITY));

        let outside_slab = Ray::new(Point3::new(0.0, 2.0, 5.0), Vec3::new(0.0, 0.0, -1.0));
        assert!(!RayAabbIntersector::new(&outside_slab).hit(&outside_slab, &aabb, f32::INFINITY));
    }

    #[test]
    fn test_ray_aabb_negative_direction() {
        let aabb = Aabb::from_min_max(&Point3::new(2.0, 2.0, 2.0), &Point3::new(3.0, 3.0, 3.0));
        let ray = Ray::new(Point3::new(5.0, 5.0, 5.0), Vec3::new(-1.0, -1.0, -1.0));
        assert!(RayAabbIntersector::new(&ray).hit(&ray, &aabb, f32::INFINITY));
    }
}
