use super::*;

//
// Anti-aliasing
//

// Sub-pixel offset patterns, in units of one pixel step. Sample index
// cycles through the fixed tables; Jitter draws fresh offsets instead.

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum AntiAliasing {
    None,
    Regular2x2Grid,
    Regular4x4Grid,
    Rotated2x2Grid,
    Jitter,
}

const REGULAR_2X2_OFFSETS: [(f32, f32); 4] =
    [(-0.25, -0.25), (0.25, -0.25), (0.25, 0.25), (-0.25, 0.25)];

const REGULAR_4X4_OFFSETS: [(f32, f32); 16] = [
    (-0.375, -0.375),
    (-0.125, -0.375),
    (0.125, -0.375),
    (0.375, -0.375),
    (-0.375, -0.125),
    (-0.125, -0.125),
    (0.125, -0.125),
    (0.375, -0.125),
    (-0.375, 0.125),
    (-0.125, 0.125),
    (0.125, 0.125),
    (0.375, 0.125),
    (-0.375, 0.375),
    (-0.125, 0.375),
    (0.125, 0.375),
    (0.375, 0.375),
];

const ROTATED_2X2_OFFSETS: [(f32, f32); 4] =
    [(-0.375, -0.125), (0.125, -0.375), (0.375, 0.125), (-0.125, 0.375)];

impl AntiAliasing {
    // Unknown names warn and fall back to no anti-aliasing.
    pub fn from_name(name: &str) -> Self {
        match name {
            "NONE" => Self::None,
            "REGULAR_2X2_GRID" => Self::Regular2x2Grid,
            "REGULAR_4X4_GRID" => Self::Regular4x4Grid,
            "ROTATED_2x2_GRID" => Self::Rotated2x2Grid,
            "JITTER_5" => Self::Jitter,
            other => {
                warn!("antialiasing algorithm '{other}' is not a valid option, using NONE");
                Self::None
            }
        }
    }

    pub fn iterations(self) -> u32 {
        match self {
            Self::None => 1,
            Self::Regular2x2Grid | Self::Rotated2x2Grid => 4,
            Self::Regular4x4Grid => 16,
            Self::Jitter => 5,
        }
    }

    pub fn offset(self, iteration: u32, sampler: &mut UniformSampler) -> (f32, f32) {
        match self {
            Self::None => (0.0, 0.0),
            Self::Regular2x2Grid => REGULAR_2X2_OFFSETS[iteration as usize % 4],
            Self::Regular4x4Grid => REGULAR_4X4_OFFSETS[iteration as usize % 16],
            Self::Rotated2x2Grid => ROTATED_2X2_OFFSETS[iteration as usize % 4],
            Self::Jitter => (sampler.sample() - 0.5, sampler.sample() - 0.5),
        }
    }
}

//
// Render driver
//

// Renders the scene once per entry in the samples-per-pixel sequence,
// post-processes and writes each image. Sequences longer than one
// disambiguate the output files with the sample count.
pub fn render_scene(scene: &Scene) -> Result<()> {
    let multiple = scene.samples_per_pixel.len() > 1;
    for &samples_per_pixel in &scene.samples_per_pixel {
        let timer = Instant::now();
        let mut image = render_once(scene, samples_per_pixel)?;
        info!(
            "Rendered {}x{} at {samples_per_pixel} spp in {:.03} s",
            image.width(),
            image.height(),
            timer.elapsed().as_secs_f64()
        );
        let mean_luminance = image.pixels().iter().map(ColorRgb::luminance).sum::<f32>()
            / image.pixels().len() as f32;
        debug!("Mean linear luminance {mean_luminance:.4}");

        post_process(&mut image, &scene.camera, scene.tonemap);

        let path = if multiple {
            suffixed_filename(&scene.output_filename, samples_per_pixel)?
        } else {
            scene.output_filename.clone()
        };
        image.save(&path)?;
        info!("Wrote {}", path.display());
    }
    Ok(())
}

// One full pass over the image at a fixed sample budget. Rows render in
// parallel; each row owns a deterministically seeded sampler so results
// do not depend on scheduling.
pub fn render_once(scene: &Scene, samples_per_pixel: u32) -> Result<Image> {
    use indicatif::{ProgressBar, ProgressStyle};

    let (width, height) = scene.resolution;
    let camera = &scene.camera;

    // Image plane basis: upper-left pixel center plus per-pixel steps.
    let view = camera.view_dir();
    let up = camera.up_dir();
    let right = camera.right_dir();
    let half_h = (0.5 * camera.vfov).tan();
    let half_w = half_h * camera.aspect_ratio;
    let du = right * (2.0 * half_w / width as f32);
    let dv = -up * (2.0 * half_h / height as f32);
    let ul = camera.position + view + half_h * up - half_w * right + 0.5 * (du + dv);

    let progress = ProgressBar::new(u64::from(height)).with_style(ProgressStyle::with_template(
        "{wide_bar} elapsed={elapsed_precise} eta={eta_precise}",
    )?);
    let rows_per_tick = (height + 99) / 100;
    let rows_done = AtomicU32::new(0);

    let antialiasing = camera.antialiasing;
    let mut image = Image::new(width, height);
    image
        .pixels_mut()
        .par_chunks_mut(width as usize)
        .enumerate()
        .for_each(|(row, pixels)| {
            let mut sampler = UniformSampler::with_seed(
                scene
                    .seed
                    .wrapping_add((row as u64).wrapping_mul(0x9e37_79b9_7f4a_7c15)),
            );
            for (col, pixel) in pixels.iter_mut().enumerate() {
                let pixel_center = ul + row as f32 * dv + col as f32 * du;
                let mut acc = ColorRgb::BLACK;
                for sample in 0..samples_per_pixel {
                    let (s, t) =
                        antialiasing.offset(sample % antialiasing.iterations(), &mut sampler);
                    let target = pixel_center + s * du + t * dv;
                    let ray = Ray::new(camera.position, (target - camera.position).normalize());
                    acc += integrator::radiance(scene, &ray, &mut sampler);
                }
                *pixel = acc / samples_per_pixel as f32;
            }

            let done = rows_done.fetch_add(1, Ordering::Relaxed) + 1;
            if done % rows_per_tick == 0 {
                progress.inc(u64::from(rows_per_tick));
            }
        });
    progress.finish_and_clear();

    Ok(image)
}

fn suffixed_filename(path: &Path, samples_per_pixel: u32) -> Result<PathBuf> {
    let stem = path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .ok_or_else(|| anyhow!("output filename {} has no stem", path.display()))?;
    let ext = path
        .extension()
        .and_then(|ext| ext.to_str())
        .ok_or_else(|| anyhow!("output filename {} has no extension", path.display()))?;
    Ok(path.with_file_name(format!("{stem}_{samples_per_pixel}.{ext}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_antialiasing_tables() {
        assert_eq!(AntiAliasing::None.iterations(), 1);
        assert_eq!(AntiAliasing::Regular2x2Grid.iterations(), 4);
        assert_eq!(AntiAliasing::Regular4x4Grid.iterations(), 16);
        assert_eq!(AntiAliasing::Jitter.iterations(), 5);

        let mut sampler = UniformSampler::new();
        assert_eq!(
            AntiAliasing::None.offset(0, &mut sampler),
            (0.0, 0.0)
        );
        assert_eq!(
            AntiAliasing::Regular2x2Grid.offset(2, &mut sampler),
            (0.25, 0.25)
        );
        for _ in 0..64 {
            let (s, t) = AntiAliasing::Jitter.offset(0, &mut sampler);
            assert!((-0.5..0.5).contains(&s) && (-0.5..0.5).contains(&t));
        }
    }

    #[test]
    fn test_antialiasing_fallback() {
        assert_eq!(AntiAliasing::from_name("JITTER_5"), AntiAliasing::Jitter);
        assert_eq!(AntiAliasing::from_name("no_such_thing"), AntiAliasing::None);
    }

    #[test]
    fn test_suffixed_filename() {
        let path = suffixed_filename(Path::new("renders/out.png"), 64).unwrap();
        assert_eq!(path, Path::new("renders/out_64.png"));
        assert!(suffixed_filename(Path::new("out"), 64).is_err());
    }

    #[test]
    fn test_render_centers_on_view_direction() {
        // Camera at +z looking down -z at a unit sphere, one directional
        // light head on. The center pixel ray matches the view direction
        // exactly, so its value is the analytic Lambertian response; the
        // corner rays miss and return the background.
        let albedo = ColorRgb::new(0.6, 0.6, 0.6);
        let shapes = vec![Shape::Sphere(Sphere::new(Point3::origin(), 1.0, None, 0))];
        let bvh = Bvh::build(shapes, &[], SplitMethod::Sah);
        let scene = Scene {
            camera: Camera {
                position: Point3::new(0.0, 0.0, 5.0),
                aspect_ratio: 1.0,
                antialiasing: AntiAliasing::None,
                ..Camera::default()
            },
            bvh,
            meshes: vec![],
            materials: vec![Material {
                albedo,
                ..Material::default()
            }],
            textures: vec![],
            lights: vec![Light::Directional {
                direction: Vec3::new(0.0, 0.0, -1.0),
                color: ColorRgb::WHITE,
                n_samples: 1,
            }],
            environment: Environment::Solid(ColorRgb::new(0.0, 0.0, 0.25)),
            ambient: ColorRgb::BLACK,
            max_depth: 1,
            samples_per_pixel: vec![1],
            samples_per_area_light: 1,
            split_method: SplitMethod::Sah,
            tonemap: false,
            resolution: (9, 9),
            output_filename: PathBuf::from("out.png"),
            seed: 0,
        };

        let image = render_once(&scene, 1).unwrap();
        assert_eq!(image.width(), 9);
        assert_eq!(image.height(), 9);
        for pixel in image.pixels() {
            assert!(pixel.is_finite());
        }

        let center = image.pixel(4, 4);
        let expected = albedo * INV_PI;
        assert_abs_diff_eq!(center.red(), expected.red(), epsilon = 1e-4);

        let corner = image.pixel(0, 0);
        assert_ulps_eq!(corner.blue(), 0.25, max_ulps = 4);
        assert_ulps_eq!(corner.red(), 0.0, max_ulps = 1);
    }
}
