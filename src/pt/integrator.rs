use super::*;

// Offset applied along the shading normal before spawning secondary and
// shadow rays.
pub const SELF_INTERSECT_EPSILON: f32 = 1e-5;

// Unidirectional path tracing with explicit next-event estimation.
// Emission is counted only on the primary hit; every later bounce sees
// emitters exclusively through `estimate_direct`, which keeps the two
// strategies from double-counting.
pub fn radiance(scene: &Scene, ray: &Ray, sampler: &mut UniformSampler) -> ColorRgb {
    let mut ray = *ray;
    let mut radiance = ColorRgb::BLACK;
    let mut throughput = ColorRgb::WHITE;

    for bounce in 0..scene.max_depth {
        let mut hit = IntersectionData::new(&ray);
        if !scene.intersect(&ray, &mut hit) {
            radiance += throughput * scene.sample_environment(&ray);
            break;
        }

        hit.position += SELF_INTERSECT_EPSILON * hit.normal;

        let material = &scene.materials[hit.material as usize];
        if bounce == 0 && hit.wo.dot(&hit.normal) > 0.0 {
            radiance += throughput * material.ke;
        }

        let brdf = material.compute_brdf(&scene.textures, &hit);
        radiance += throughput * scene.ambient * brdf.albedo();
        radiance += throughput * estimate_direct(scene, &hit, &brdf, sampler);

        let Some(sample) = brdf.sample_f(&hit.wo, sampler) else {
            break;
        };
        if sample.f.is_black() {
            break;
        }
        throughput *= sample.f * sample.wi.dot(&hit.normal).abs() / sample.pdf;
        if throughput.is_black() {
            break;
        }

        ray = Ray::new(hit.position, sample.wi);
    }

    debug_assert!(radiance.is_finite(), "non-finite radiance: {radiance}");
    radiance
}

// Monte Carlo estimate of the direct contribution of every light at
// `hit`, averaged over each light's own sample budget. Zero-pdf and
// below-horizon samples are dead; occlusion is an any-hit query stopped
// just short of the light.
fn estimate_direct(
    scene: &Scene,
    hit: &IntersectionData,
    brdf: &Brdf,
    sampler: &mut UniformSampler,
) -> ColorRgb {
    let mut direct = ColorRgb::BLACK;
    for light in &scene.lights {
        let n_samples = light.n_samples();
        let mut acc = ColorRgb::BLACK;
        for _ in 0..n_samples {
            let sample = light.sample_li(&hit.position, &scene.meshes, sampler);
            if sample.pdf == 0.0 {
                continue;
            }
            let cos_theta = hit.normal.dot(&sample.wi);
            if cos_theta <= 0.0 {
                continue;
            }
            let shadow_ray = Ray::new(hit.position, sample.wi);
            if scene.occluded(&shadow_ray, sample.distance - SELF_INTERSECT_EPSILON) {
                continue;
            }
            acc += brdf.f(&hit.wo, &sample.wi) * sample.li * (cos_theta / sample.pdf);
        }
        direct += acc / n_samples as f32;
    }
    direct
}

#[cfg(test)]
mod tests {
    use super::*;

    fn camera_stub() -> Camera {
        Camera::default()
    }

    fn scene_with(
        shapes: Vec<Shape>,
        meshes: Vec<MeshInstance>,
        materials: Vec<Material>,
        lights: Vec<Light>,
        max_depth: u32,
    ) -> Scene {
        let bvh = Bvh::build(shapes, &meshes, SplitMethod::Sah);
        Scene {
            camera: camera_stub(),
            bvh,
            meshes,
            materials,
            textures: vec![],
            lights,
            environment: Environment::Solid(ColorRgb::BLACK),
            ambient: ColorRgb::BLACK,
            max_depth,
            samples_per_pixel: vec![1],
            samples_per_area_light: 1,
            split_method: SplitMethod::Sah,
            tonemap: false,
            resolution: (8, 8),
            output_filename: PathBuf::from("out.png"),
            seed: 0,
        }
    }

    #[test]
    fn test_directional_light_analytic_value() {
        // Single diffuse sphere, one directional light shining along -z,
        // black background: a primary hit on the lit hemisphere is
        // exactly albedo * color * cos(theta) / pi.
        let albedo = ColorRgb::new(0.8, 0.6, 0.4);
        let color = ColorRgb::new(2.0, 2.0, 2.0);
        let scene = scene_with(
            vec![Shape::Sphere(Sphere::new(Point3::origin(), 1.0, None, 0))],
            vec![],
            vec![Material {
                albedo,
                ..Material::default()
            }],
            vec![Light::Directional {
                direction: Vec3::new(0.0, 0.0, -1.0),
                color,
                n_samples: 1,
            }],
            1,
        );

        let mut sampler = UniformSampler::with_seed(61);
        let ray = Ray::new(Point3::new(0.0, 0.0, 5.0), Vec3::new(0.0, 0.0, -1.0));
        let value = radiance(&scene, &ray, &mut sampler);
        let expected = albedo * color * INV_PI;
        assert_abs_diff_eq!(value.red(), expected.red(), epsilon = 1e-4);
        assert_abs_diff_eq!(value.green(), expected.green(), epsilon = 1e-4);
        assert_abs_diff_eq!(value.blue(), expected.blue(), epsilon = 1e-4);

        // The far hemisphere faces away from the light and stays black.
        let ray = Ray::new(Point3::new(0.0, 0.0, -5.0), Vec3::new(0.0, 0.0, 1.0));
        let value = radiance(&scene, &ray, &mut sampler);
        assert!(value.is_black());
    }

    #[test]
    fn test_environment_on_miss() {
        let scene = Scene {
            environment: Environment::Solid(ColorRgb::new(0.25, 0.5, 0.75)),
            ..scene_with(
                vec![Shape::Sphere(Sphere::new(Point3::origin(), 1.0, None, 0))],
                vec![],
                vec![Material::default()],
                vec![],
                3,
            )
        };
        let mut sampler = UniformSampler::with_seed(67);
        let ray = Ray::new(Point3::new(0.0, 5.0, 0.0), Vec3::new(0.0, 1.0, 0.0));
        let value = radiance(&scene, &ray, &mut sampler);
        assert_ulps_eq!(value.red(), 0.25, max_ulps = 4);
        assert_ulps_eq!(value.blue(), 0.75, max_ulps = 4);
    }

    #[test]
    fn test_point_light_shadowing() {
        // Occluder between the lit surface and a point light kills the
        // direct term.
        let albedo = ColorRgb::new(0.5, 0.5, 0.5);
        let lit = scene_with(
            vec![Shape::Sphere(Sphere::new(Point3::origin(), 1.0, None, 0))],
            vec![],
            vec![Material {
                albedo,
                ..Material::default()
            }],
            vec![Light::Point {
                position: Point3::new(0.0, 0.0, 3.0),
                color: ColorRgb::new(4.0, 4.0, 4.0),
                n_samples: 1,
            }],
            1,
        );
        // Small blocker close to the light, off the camera ray's path.
        let shadowed = scene_with(
            vec![
                Shape::Sphere(Sphere::new(Point3::origin(), 1.0, None, 0)),
                Shape::Sphere(Sphere::new(Point3::new(0.0, 0.0, 2.5), 0.2, None, 0)),
            ],
            vec![],
            vec![Material {
                albedo,
                ..Material::default()
            }],
            vec![Light::Point {
                position: Point3::new(0.0, 0.0, 3.0),
                color: ColorRgb::new(4.0, 4.0, 4.0),
                n_samples: 1,
            }],
            1,
        );

        let mut sampler = UniformSampler::with_seed(71);
        // Grazing ray that enters the sphere exactly at (0,0,1), so the
        // hit point faces the light head on at distance 2.
        let ray = Ray::new(
            Point3::new(3.0, 0.0, 2.0),
            (Vec3::new(0.0, 0.0, 1.0) - Vec3::new(3.0, 0.0, 2.0)).normalize(),
        );
        let value = radiance(&lit, &ray, &mut sampler);
        let expected = albedo * INV_PI * (4.0 / 4.0);
        assert_abs_diff_eq!(value.red(), expected.red(), epsilon = 1e-2);

        let value = radiance(&shadowed, &ray, &mut sampler);
        assert!(value.is_black());
    }

    #[test]
    fn test_emission_only_on_primary_hit() {
        let ke = ColorRgb::new(3.0, 3.0, 3.0);
        let scene = scene_with(
            vec![Shape::Sphere(Sphere::new(Point3::origin(), 1.0, None, 0))],
            vec![],
            vec![Material {
                albedo: ColorRgb::BLACK,
                ke,
                ..Material::default()
            }],
            vec![],
            4,
        );
        let mut sampler = UniformSampler::with_seed(73);
        let ray = Ray::new(Point3::new(0.0, 0.0, 5.0), Vec3::new(0.0, 0.0, -1.0));
        let value = radiance(&scene, &ray, &mut sampler);
        // Black albedo terminates the path after the primary emission.
        assert_ulps_eq!(value.red(), 3.0, max_ulps = 4);
    }

    // Uniformly emissive closed room with albedo 0.5: the geometric
    // series Le * (1 + rho + rho^2 + ...) stays finite and well under
    // Le / (1 - rho) at any finite depth.
    #[test]
    fn test_closed_room_energy_is_bounded() {
        let half = 1.0;
        let mut positions = Vec::new();
        let mut normals = Vec::new();
        let mut triangles = Vec::new();
        let faces: [(Vec3, Vec3, Vec3); 6] = [
            (Vec3::x(), Vec3::y(), Vec3::z()),
            (-Vec3::x(), Vec3::y(), -Vec3::z()),
            (Vec3::y(), Vec3::z(), Vec3::x()),
            (-Vec3::y(), Vec3::z(), -Vec3::x()),
            (Vec3::z(), Vec3::x(), Vec3::y()),
            (-Vec3::z(), Vec3::x(), -Vec3::y()),
        ];
        for (inward, a, b) in faces {
            let center = Point3::origin() - half * inward;
            let base = positions.len() as u32;
            positions.push(center - half * a - half * b);
            positions.push(center + half * a - half * b);
            positions.push(center + half * a + half * b);
            positions.push(center - half * a + half * b);
            normals.extend([inward; 4]);
            triangles.push([base, base + 1, base + 2]);
            triangles.push([base, base + 2, base + 3]);
        }
        let count = positions.len();
        let mesh = MeshInstance {
            positions,
            normals,
            tangents: vec![Vec3::x(); count],
            uvs: vec![Vec2::zeros(); count],
            material: 0,
        };
        let meshes = vec![mesh];
        let ke = ColorRgb::WHITE;
        let material = Material {
            albedo: ColorRgb::new(0.5, 0.5, 0.5),
            ke,
            ..Material::default()
        };
        let shapes = triangles
            .iter()
            .map(|&indices| Shape::Triangle(Triangle { mesh: 0, indices }))
            .collect::<Vec<_>>();
        let lights = shapes
            .iter()
            .map(|shape| Light::Area {
                shape: shape.clone(),
                ke,
                n_samples: 1,
            })
            .collect::<Vec<_>>();
        let scene = scene_with(shapes, meshes, vec![material], lights, 4);

        let mut sampler = UniformSampler::with_seed(79);
        let mut mean = ColorRgb::BLACK;
        let n = 500;
        for i in 0..n {
            let dir = uniform_sample_sphere(sampler.sample(), sampler.sample());
            let value = radiance(
                &scene,
                &Ray::new(Point3::new(0.1, -0.2, 0.05 + 0.0001 * i as f32), dir),
                &mut sampler,
            );
            assert!(value.is_finite());
            assert!(value.red() >= 0.0 && value.green() >= 0.0 && value.blue() >= 0.0);
            mean += value;
        }
        mean = mean / n as f32;
        // Expectation is ~1.9 Le; leave generous room for the corner
        // singularity of the area-light estimator.
        assert!(mean.red() > 1.0 && mean.red() < 3.5, "mean={mean}");
    }
}
