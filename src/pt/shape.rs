use super::*;

pub type MeshId = u32;

//
// Mesh instance
//

// A model placed in the world: vertex arrays with the instance transform
// already baked in. Triangles index into these arrays and stay small.

#[derive(Debug)]
pub struct MeshInstance {
    pub positions: Vec<Point3>,
    pub normals: Vec<Vec3>,
    pub tangents: Vec<Vec3>,
    pub uvs: Vec<Vec2>,
    pub material: MaterialId,
}

//
// Intersection data
//

// Stack-scoped record for a single ray query. `t` starts at infinity and
// only ever decreases; shapes refuse to fill it in unless they are the
// new closest hit.

#[derive(Clone, Copy, Debug)]
pub struct IntersectionData {
    pub t: f32,
    pub position: Point3,
    pub normal: Vec3,
    pub tangent: Vec3,
    pub bitangent: Vec3,
    pub uv: Vec2,
    pub wo: Vec3,
    pub material: MaterialId,
}

impl IntersectionData {
    pub fn new(ray: &Ray) -> Self {
        Self {
            t: f32::INFINITY,
            position: Point3::origin(),
            normal: Vec3::zeros(),
            tangent: Vec3::zeros(),
            bitangent: Vec3::zeros(),
            uv: Vec2::zeros(),
            wo: -ray.dir,
            material: 0,
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct SurfaceSample {
    pub position: Point3,
    pub normal: Vec3,
    pub pdf: f32,
}

//
// Shapes
//

#[derive(Clone, Debug)]
pub enum Shape {
    Sphere(Sphere),
    Triangle(Triangle),
}

#[derive(Clone, Debug)]
pub struct Sphere {
    pub center: Point3,
    pub radius: f32,
    pub material: MaterialId,
    local_to_world: Mat4,
    world_to_local: Mat4,
}

#[derive(Clone, Copy, Debug)]
pub struct Triangle {
    pub mesh: MeshId,
    pub indices: [u32; 3],
}

impl Sphere {
    pub fn new(center: Point3, radius: f32, rotation: Option<Vec3>, material: MaterialId) -> Self {
        assert!(radius > 0.0, "sphere radius must be positive");
        let mut local_to_world = Mat4::new_translation(&center.coords);
        if let Some(r) = rotation {
            local_to_world *= Mat4::from_axis_angle(&Vec3::y_axis(), r.y)
                * Mat4::from_axis_angle(&Vec3::x_axis(), r.x)
                * Mat4::from_axis_angle(&Vec3::z_axis(), r.z);
        }
        local_to_world *= Mat4::new_scaling(radius);
        let world_to_local = local_to_world
            .try_inverse()
            .expect("sphere transform must be invertible");
        Self {
            center,
            radius,
            material,
            local_to_world,
            world_to_local,
        }
    }

    // Intersection runs in local space against a unit sphere at the
    // origin. The local ray keeps the world parameterization, so `t`
    // transfers back without rescaling.
    fn local_ray(&self, ray: &Ray) -> Ray {
        Ray::new(
            self.world_to_local.transform_point(&ray.origin),
            self.world_to_local.transform_vector(&ray.dir),
        )
    }

    fn intersect(&self, ray: &Ray, hit: &mut IntersectionData) -> bool {
        let local = self.local_ray(ray);
        let Some(t) = intersect::ray_sphere(&local.origin, &local.dir, &Point3::origin(), 1.0)
        else {
            return false;
        };
        if t >= hit.t {
            return false;
        }

        hit.t = t;
        hit.material = self.material;
        hit.position = ray.evaluate(t);
        hit.normal = (hit.position - self.center) / self.radius;

        let local_pos = local.evaluate(t);
        let theta = local_pos.z.atan2(local_pos.x);
        let phi = (-local_pos.y).clamp(-1.0, 1.0).acos();
        hit.uv = Vec2::new((-0.5 * (theta * INV_PI + 1.0)).rem_euclid(1.0), phi * INV_PI);

        let local_tangent = Vec3::new(-theta.sin(), 0.0, theta.cos());
        hit.tangent = self
            .local_to_world
            .transform_vector(&local_tangent)
            .normalize();
        hit.bitangent = hit.normal.cross(&hit.tangent);
        true
    }

    fn test_if_hit(&self, ray: &Ray, t_max: f32) -> bool {
        let local = self.local_ray(ray);
        match intersect::ray_sphere(&local.origin, &local.dir, &Point3::origin(), 1.0) {
            Some(t) => t < t_max,
            None => false,
        }
    }

    fn area(&self) -> f32 {
        4.0 * PI * self.radius * self.radius
    }

    fn sample_area(&self, sampler: &mut UniformSampler) -> SurfaceSample {
        let normal = uniform_sample_sphere(sampler.sample(), sampler.sample());
        SurfaceSample {
            position: self.center + self.radius * normal,
            normal,
            pdf: 1.0 / self.area(),
        }
    }

    fn world_space_aabb(&self) -> Aabb {
        let extent = Vec3::repeat(self.radius);
        Aabb::from_min_max(&(self.center - extent), &(self.center + extent))
    }
}

impl Triangle {
    fn vertices<'a>(&self, meshes: &'a [MeshInstance]) -> (&'a MeshInstance, [Point3; 3]) {
        let mesh = &meshes[self.mesh as usize];
        let [i0, i1, i2] = self.indices;
        (
            mesh,
            [
                mesh.positions[i0 as usize],
                mesh.positions[i1 as usize],
                mesh.positions[i2 as usize],
            ],
        )
    }

    fn intersect(&self, meshes: &[MeshInstance], ray: &Ray, hit: &mut IntersectionData) -> bool {
        let (mesh, [v0, v1, v2]) = self.vertices(meshes);
        let Some((t, u, v)) = intersect::ray_triangle(&ray.origin, &ray.dir, &v0, &v1, &v2) else {
            return false;
        };
        if t >= hit.t {
            return false;
        }

        let [i0, i1, i2] = self.indices.map(|i| i as usize);
        let w = 1.0 - u - v;

        hit.t = t;
        hit.material = mesh.material;
        hit.position = ray.evaluate(t);
        hit.normal =
            (w * mesh.normals[i0] + u * mesh.normals[i1] + v * mesh.normals[i2]).normalize();
        hit.uv = w * mesh.uvs[i0] + u * mesh.uvs[i1] + v * mesh.uvs[i2];

        // Orthonormalize the interpolated tangent against the shading
        // normal; interpolation can drag it out of the tangent plane.
        let tangent = w * mesh.tangents[i0] + u * mesh.tangents[i1] + v * mesh.tangents[i2];
        let tangent = tangent - tangent.dot(&hit.normal) * hit.normal;
        hit.tangent = if tangent.norm_squared() > 1e-12 {
            tangent.normalize()
        } else {
            orthonormal_tangent(&hit.normal)
        };
        hit.bitangent = hit.normal.cross(&hit.tangent);
        true
    }

    fn test_if_hit(&self, meshes: &[MeshInstance], ray: &Ray, t_max: f32) -> bool {
        let (_, [v0, v1, v2]) = self.vertices(meshes);
        match intersect::ray_triangle(&ray.origin, &ray.dir, &v0, &v1, &v2) {
            Some((t, _, _)) => t < t_max,
            None => false,
        }
    }

    fn area(&self, meshes: &[MeshInstance]) -> f32 {
        let (_, [v0, v1, v2]) = self.vertices(meshes);
        0.5 * (v1 - v0).cross(&(v2 - v0)).norm()
    }

    fn sample_area(&self, meshes: &[MeshInstance], sampler: &mut UniformSampler) -> SurfaceSample {
        let (mesh, [v0, v1, v2]) = self.vertices(meshes);
        let (u, v) = uniform_sample_triangle(sampler.sample(), sampler.sample());
        let w = 1.0 - u - v;
        let [i0, i1, i2] = self.indices.map(|i| i as usize);
        SurfaceSample {
            position: Point3::from(w * v0.coords + u * v1.coords + v * v2.coords),
            normal: (w * mesh.normals[i0] + u * mesh.normals[i1] + v * mesh.normals[i2])
                .normalize(),
            pdf: 1.0 / self.area(meshes),
        }
    }

    fn world_space_aabb(&self, meshes: &[MeshInstance]) -> Aabb {
        let (_, vertices) = self.vertices(meshes);
        Aabb::from_points(vertices.iter())
    }
}

impl Shape {
    pub fn material(&self, meshes: &[MeshInstance]) -> MaterialId {
        match self {
            Self::Sphere(sphere) => sphere.material,
            Self::Triangle(triangle) => meshes[triangle.mesh as usize].material,
        }
    }

    // Updates `hit` only when the new intersection is strictly closer.
    pub fn intersect(&self, meshes: &[MeshInstance], ray: &Ray, hit: &mut IntersectionData) -> bool {
        match self {
            Self::Sphere(sphere) => sphere.intersect(ray, hit),
            Self::Triangle(triangle) => triangle.intersect(meshes, ray, hit),
        }
    }

    // Shadow-ray predicate; never computes shading data.
    pub fn test_if_hit(&self, meshes: &[MeshInstance], ray: &Ray, t_max: f32) -> bool {
        match self {
            Self::Sphere(sphere) => sphere.test_if_hit(ray, t_max),
            Self::Triangle(triangle) => triangle.test_if_hit(meshes, ray, t_max),
        }
    }

    pub fn area(&self, meshes: &[MeshInstance]) -> f32 {
        match self {
            Self::Sphere(sphere) => sphere.area(),
            Self::Triangle(triangle) => triangle.area(meshes),
        }
    }

    pub fn sample_area(
        &self,
        meshes: &[MeshInstance],
        sampler: &mut UniformSampler,
    ) -> SurfaceSample {
        match self {
            Self::Sphere(sphere) => sphere.sample_area(sampler),
            Self::Triangle(triangle) => triangle.sample_area(meshes, sampler),
        }
    }

    pub fn world_space_aabb(&self, meshes: &[MeshInstance]) -> Aabb {
        match self {
            Self::Sphere(sphere) => sphere.world_space_aabb(),
            Self::Triangle(triangle) => triangle.world_space_aabb(meshes),
        }
    }
}

// Arbitrary unit tangent perpendicular to `n`.
pub fn orthonormal_tangent(n: &Vec3) -> Vec3 {
    let axis = if n.x.abs() < 0.9 {
        Vec3::x_axis()
    } else {
        Vec3::y_axis()
    };
    axis.cross(n).normalize()
}
