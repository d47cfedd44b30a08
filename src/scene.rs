use super::*;

//
// Camera
//

#[derive(Clone, Debug)]
pub struct Camera {
    pub position: Point3,
    // Euler angles in radians, applied yaw (y) then pitch (x) then roll (z).
    pub rotation: Vec3,
    pub vfov: f32,
    pub aspect_ratio: f32,
    pub exposure: f32,
    pub gamma: f32,
    pub antialiasing: AntiAliasing,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            position: Point3::origin(),
            rotation: Vec3::zeros(),
            vfov: 45.0_f32.to_radians(),
            aspect_ratio: 16.0 / 9.0,
            exposure: 1.0,
            gamma: 2.2,
            antialiasing: AntiAliasing::Jitter,
        }
    }
}

impl Camera {
    fn rotation_matrix(&self) -> Mat4 {
        Mat4::from_axis_angle(&Vec3::y_axis(), self.rotation.y)
            * Mat4::from_axis_angle(&Vec3::x_axis(), self.rotation.x)
            * Mat4::from_axis_angle(&Vec3::z_axis(), self.rotation.z)
    }

    pub fn view_dir(&self) -> Vec3 {
        self.rotation_matrix().transform_vector(&-Vec3::z())
    }

    pub fn up_dir(&self) -> Vec3 {
        self.rotation_matrix().transform_vector(&Vec3::y())
    }

    pub fn right_dir(&self) -> Vec3 {
        self.view_dir().cross(&self.up_dir())
    }
}

//
// Environment
//

#[derive(Debug)]
pub enum Environment {
    Solid(ColorRgb),
    Skybox(Skybox),
}

//
// Scene
//

// Render-ready scene: the loader resolves every name to an arena index,
// expands instances into shapes and hands the shape list to the BVH
// builder, which owns it from then on.

#[derive(Debug)]
pub struct Scene {
    pub camera: Camera,
    pub bvh: Bvh,
    pub meshes: Vec<MeshInstance>,
    pub materials: Vec<Material>,
    pub textures: Vec<Texture>,
    pub lights: Vec<Light>,
    pub environment: Environment,
    pub ambient: ColorRgb,
    pub max_depth: u32,
    pub samples_per_pixel: Vec<u32>,
    pub samples_per_area_light: u32,
    pub split_method: SplitMethod,
    pub tonemap: bool,
    pub resolution: (u32, u32),
    pub output_filename: PathBuf,
    pub seed: u64,
}

impl Scene {
    #[inline]
    pub fn intersect(&self, ray: &Ray, hit: &mut IntersectionData) -> bool {
        self.bvh.intersect(&self.meshes, ray, hit)
    }

    #[inline]
    pub fn occluded(&self, ray: &Ray, t_max: f32) -> bool {
        self.bvh.occluded(&self.meshes, ray, t_max)
    }

    pub fn sample_environment(&self, ray: &Ray) -> ColorRgb {
        match &self.environment {
            Environment::Solid(color) => *color,
            Environment::Skybox(skybox) => skybox.sample(&ray.dir),
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading scene file {}", path.display()))?;
        let file: SceneFile = serde_json::from_str(&text)
            .with_context(|| format!("parsing scene file {}", path.display()))?;
        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
        build_scene(file, base_dir)
    }
}

//
// Scene file
//

fn default_one() -> u32 {
    1
}

fn default_max_depth() -> u32 {
    5
}

fn default_scale() -> [f32; 3] {
    [1.0, 1.0, 1.0]
}

#[derive(Deserialize, Debug)]
#[serde(deny_unknown_fields)]
struct SceneFile {
    #[serde(rename = "AmbientLight")]
    ambient_light: Option<ColorEntry>,
    #[serde(rename = "BackgroundColor")]
    background_color: Option<ColorEntry>,
    #[serde(rename = "BVH")]
    bvh: Option<BvhEntry>,
    #[serde(rename = "Camera")]
    camera: Option<CameraEntry>,
    #[serde(rename = "Materials", default)]
    materials: Vec<MaterialEntry>,
    #[serde(rename = "Textures", default)]
    textures: Vec<TextureEntry>,
    #[serde(rename = "Models", default)]
    models: Vec<ModelEntry>,
    #[serde(rename = "ModelInstances", default)]
    model_instances: Vec<ModelInstanceEntry>,
    #[serde(rename = "Spheres", default)]
    spheres: Vec<SphereEntry>,
    #[serde(rename = "PointLights", default)]
    point_lights: Vec<PointLightEntry>,
    #[serde(rename = "DirectionalLights", default)]
    directional_lights: Vec<DirectionalLightEntry>,
    #[serde(rename = "Skybox")]
    skybox: Option<SkyboxEntry>,
    #[serde(rename = "MaxDepth", default = "default_max_depth")]
    max_depth: u32,
    #[serde(rename = "SamplesPerAreaLight", default = "default_one")]
    samples_per_area_light: u32,
    #[serde(rename = "SamplesPerPixel", default)]
    samples_per_pixel: SamplesPerPixel,
    #[serde(rename = "Tonemap", default)]
    tonemap: bool,
    #[serde(rename = "OutputImageData")]
    output: OutputEntry,
}

#[derive(Deserialize, Debug)]
#[serde(deny_unknown_fields)]
struct ColorEntry {
    color: [f32; 3],
}

#[derive(Deserialize, Debug)]
#[serde(deny_unknown_fields)]
struct BvhEntry {
    #[serde(rename = "splitMethod")]
    split_method: String,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
struct CameraEntry {
    #[serde(default)]
    position: [f32; 3],
    // Degrees in the file.
    #[serde(default)]
    rotation: [f32; 3],
    vfov: Option<f32>,
    #[serde(rename = "aspectRatio")]
    aspect_ratio: Option<f32>,
    exposure: Option<f32>,
    gamma: Option<f32>,
    antialiasing: Option<String>,
}

#[derive(Deserialize, Debug)]
#[serde(deny_unknown_fields)]
struct MaterialEntry {
    name: String,
    #[serde(default)]
    albedo: Option<[f32; 3]>,
    #[serde(rename = "Ks")]
    ks: Option<[f32; 3]>,
    #[serde(rename = "Ns")]
    ns: Option<f32>,
    #[serde(rename = "Ke")]
    ke: Option<[f32; 3]>,
    #[serde(rename = "Tr")]
    tr: Option<[f32; 3]>,
    ior: Option<f32>,
    #[serde(rename = "albedoTexture")]
    albedo_texture: Option<String>,
}

#[derive(Deserialize, Debug)]
#[serde(deny_unknown_fields)]
struct TextureEntry {
    name: String,
    filename: String,
    #[serde(rename = "flipVertically", default)]
    flip_vertically: bool,
}

#[derive(Deserialize, Debug)]
#[serde(deny_unknown_fields)]
struct ModelEntry {
    name: String,
    filename: String,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
struct TransformEntry {
    #[serde(default)]
    position: [f32; 3],
    // Degrees in the file.
    #[serde(default)]
    rotation: [f32; 3],
    #[serde(default = "default_scale")]
    scale: [f32; 3],
}

#[derive(Deserialize, Debug)]
#[serde(deny_unknown_fields)]
struct ModelInstanceEntry {
    #[serde(default)]
    transform: TransformEntry,
    model: String,
    material: Option<String>,
}

#[derive(Deserialize, Debug)]
#[serde(deny_unknown_fields)]
struct SphereEntry {
    #[serde(default)]
    transform: TransformEntry,
    material: Option<String>,
}

#[derive(Deserialize, Debug)]
#[serde(deny_unknown_fields)]
struct PointLightEntry {
    color: [f32; 3],
    position: [f32; 3],
}

#[derive(Deserialize, Debug)]
#[serde(deny_unknown_fields)]
struct DirectionalLightEntry {
    color: [f32; 3],
    direction: [f32; 3],
}

#[derive(Deserialize, Debug)]
#[serde(deny_unknown_fields)]
struct SkyboxEntry {
    name: String,
    right: String,
    left: String,
    top: String,
    bottom: String,
    back: String,
    front: String,
    #[serde(rename = "flipVertically", default)]
    flip_vertically: bool,
}

#[derive(Deserialize, Debug)]
#[serde(untagged)]
enum SamplesPerPixel {
    One(u32),
    Many(Vec<u32>),
}

impl Default for SamplesPerPixel {
    fn default() -> Self {
        Self::One(1)
    }
}

impl SamplesPerPixel {
    fn into_vec(self) -> Vec<u32> {
        match self {
            Self::One(n) => vec![n],
            Self::Many(list) => list,
        }
    }
}

#[derive(Deserialize, Debug)]
#[serde(deny_unknown_fields)]
struct OutputEntry {
    filename: String,
    resolution: [u32; 2],
}

//
// Loader
//

fn build_scene(file: SceneFile, base_dir: &Path) -> Result<Scene> {
    let [width, height] = file.output.resolution;
    ensure!(width > 0 && height > 0, "image resolution must be non-zero");
    ensure!(file.max_depth >= 1, "MaxDepth must be at least 1");
    ensure!(
        file.samples_per_area_light >= 1,
        "SamplesPerAreaLight must be at least 1"
    );
    let samples_per_pixel = file.samples_per_pixel.into_vec();
    ensure!(
        !samples_per_pixel.is_empty() && samples_per_pixel.iter().all(|&n| n >= 1),
        "SamplesPerPixel entries must be at least 1"
    );

    // Textures.
    let mut textures = Vec::with_capacity(file.textures.len());
    let mut texture_ids = HashMap::new();
    for entry in &file.textures {
        let texture = Texture::load(&entry.name, &base_dir.join(&entry.filename), entry.flip_vertically)?;
        info!("Loaded texture '{}'", texture.name);
        texture_ids.insert(entry.name.clone(), textures.len() as TextureId);
        textures.push(texture);
    }

    // Materials.
    let mut materials = Vec::with_capacity(file.materials.len());
    let mut material_ids = HashMap::new();
    for entry in file.materials {
        let defaults = Material::default();
        let albedo_texture = entry
            .albedo_texture
            .map(|name| {
                texture_ids
                    .get(&name)
                    .copied()
                    .ok_or_else(|| anyhow!("material {} references unknown texture {name}", entry.name))
            })
            .transpose()?;
        material_ids.insert(entry.name.clone(), materials.len() as MaterialId);
        materials.push(Material {
            name: entry.name,
            albedo: entry.albedo.map_or(defaults.albedo, ColorRgb::from),
            ks: entry.ks.map_or(defaults.ks, ColorRgb::from),
            ns: entry.ns.unwrap_or(defaults.ns),
            ke: entry.ke.map_or(defaults.ke, ColorRgb::from),
            tr: entry.tr.map_or(defaults.tr, ColorRgb::from),
            ior: entry.ior.unwrap_or(defaults.ior),
            albedo_texture,
        });
    }
    let mut default_material = None;
    let mut resolve_material = |name: Option<&str>, materials: &mut Vec<Material>| -> Result<MaterialId> {
        match name {
            Some(name) => material_ids
                .get(name)
                .copied()
                .ok_or_else(|| anyhow!("unknown material {name}")),
            None => Ok(*default_material.get_or_insert_with(|| {
                materials.push(Material {
                    name: "default".to_owned(),
                    ..Material::default()
                });
                (materials.len() - 1) as MaterialId
            })),
        }
    };

    // Models.
    let mut models = HashMap::new();
    for entry in &file.models {
        let model = Model::load(&entry.name, &base_dir.join(&entry.filename))?;
        info!(
            "Loaded model '{}' ({} triangles)",
            model.name,
            model.triangles.len()
        );
        models.insert(entry.name.clone(), model);
    }

    // Shapes.
    let mut meshes = Vec::new();
    let mut shapes = Vec::new();
    for entry in file.model_instances {
        let model = models
            .get(&entry.model)
            .ok_or_else(|| anyhow!("instance references unknown model {}", entry.model))?;
        let material = resolve_material(entry.material.as_deref(), &mut materials)?;
        let mesh_id = meshes.len() as MeshId;
        meshes.push(instantiate(model, &entry.transform, material));
        shapes.extend(model.triangles.iter().map(|&indices| {
            Shape::Triangle(Triangle {
                mesh: mesh_id,
                indices,
            })
        }));
    }
    for entry in file.spheres {
        let material = resolve_material(entry.material.as_deref(), &mut materials)?;
        let t = &entry.transform;
        ensure!(
            t.scale[0] > 0.0 && t.scale[0] == t.scale[1] && t.scale[1] == t.scale[2],
            "sphere scale must be uniform and positive"
        );
        let rotation = rotation_radians(&t.rotation);
        shapes.push(Shape::Sphere(Sphere::new(
            Point3::from(Vec3::from(t.position)),
            t.scale[0],
            (rotation != Vec3::zeros()).then_some(rotation),
            material,
        )));
    }
    ensure!(!shapes.is_empty(), "scene contains no shapes");

    // Lights. Shapes with emissive materials register as area lights
    // before the BVH takes the shape list over.
    let mut lights = Vec::new();
    for entry in file.point_lights {
        lights.push(Light::Point {
            position: Point3::from(Vec3::from(entry.position)),
            color: ColorRgb::from(entry.color),
            n_samples: 1,
        });
    }
    for entry in file.directional_lights {
        lights.push(Light::Directional {
            direction: Vec3::from(entry.direction).normalize(),
            color: ColorRgb::from(entry.color),
            n_samples: 1,
        });
    }
    for shape in &shapes {
        let material = &materials[shape.material(&meshes) as usize];
        if material.is_emissive() {
            lights.push(Light::Area {
                shape: shape.clone(),
                ke: material.ke,
                n_samples: file.samples_per_area_light,
            });
        }
    }

    // Environment.
    let environment = match file.skybox {
        Some(entry) => {
            let skybox = Skybox::load(
                &entry.name,
                &base_dir.join(&entry.right),
                &base_dir.join(&entry.left),
                &base_dir.join(&entry.top),
                &base_dir.join(&entry.bottom),
                &base_dir.join(&entry.back),
                &base_dir.join(&entry.front),
                entry.flip_vertically,
            )?;
            info!("Loaded skybox '{}'", skybox.name);
            Environment::Skybox(skybox)
        }
        None => Environment::Solid(
            file.background_color
                .map_or(ColorRgb::BLACK, |entry| ColorRgb::from(entry.color)),
        ),
    };

    // BVH.
    let split_method = match file.bvh.as_ref().map(|entry| entry.split_method.as_str()) {
        None | Some("SAH") => SplitMethod::Sah,
        Some("Middle") => SplitMethod::Middle,
        Some("EqualCounts") => SplitMethod::EqualCounts,
        Some(other) => bail!("unknown BVH split method '{other}'"),
    };
    let bvh = Bvh::build(shapes, &meshes, split_method);

    // Camera.
    let camera_entry = file.camera.unwrap_or_default();
    let defaults = Camera::default();
    let camera = Camera {
        position: Point3::from(Vec3::from(camera_entry.position)),
        rotation: rotation_radians(&camera_entry.rotation),
        vfov: camera_entry.vfov.map_or(defaults.vfov, f32::to_radians),
        aspect_ratio: camera_entry.aspect_ratio.unwrap_or(defaults.aspect_ratio),
        exposure: camera_entry.exposure.unwrap_or(defaults.exposure),
        gamma: camera_entry.gamma.unwrap_or(defaults.gamma),
        antialiasing: camera_entry
            .antialiasing
            .as_deref()
            .map_or(defaults.antialiasing, AntiAliasing::from_name),
    };

    Ok(Scene {
        camera,
        bvh,
        meshes,
        materials,
        textures,
        lights,
        environment,
        ambient: file
            .ambient_light
            .map_or(ColorRgb::BLACK, |entry| ColorRgb::from(entry.color)),
        max_depth: file.max_depth,
        samples_per_pixel,
        samples_per_area_light: file.samples_per_area_light,
        split_method,
        tonemap: file.tonemap,
        resolution: (width, height),
        output_filename: PathBuf::from(file.output.filename),
        seed: 0,
    })
}

fn rotation_radians(degrees: &[f32; 3]) -> Vec3 {
    Vec3::new(
        degrees[0].to_radians(),
        degrees[1].to_radians(),
        degrees[2].to_radians(),
    )
}

// Bakes the instance transform into a standalone mesh. Normals go
// through the inverse transpose so non-uniform scales keep them
// perpendicular.
fn instantiate(model: &Model, transform: &TransformEntry, material: MaterialId) -> MeshInstance {
    let rotation = rotation_radians(&transform.rotation);
    let matrix = Mat4::new_translation(&Vec3::from(transform.position))
        * Mat4::from_axis_angle(&Vec3::y_axis(), rotation.y)
        * Mat4::from_axis_angle(&Vec3::x_axis(), rotation.x)
        * Mat4::from_axis_angle(&Vec3::z_axis(), rotation.z)
        * Mat4::new_nonuniform_scaling(&Vec3::from(transform.scale));
    let linear = matrix.fixed_view::<3, 3>(0, 0).into_owned();
    let normal_matrix = linear
        .try_inverse()
        .map_or(linear, |inverse| inverse.transpose());

    MeshInstance {
        positions: model
            .positions
            .iter()
            .map(|p| matrix.transform_point(p))
            .collect(),
        normals: model
            .normals
            .iter()
            .map(|n| (normal_matrix * n).normalize())
            .collect(),
        tangents: model
            .tangents
            .iter()
            .map(|t| (linear * t).normalize())
            .collect(),
        uvs: model.uvs.clone(),
        material,
    }
}

//
// Tests
//
