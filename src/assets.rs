use super::*;

pub type TextureId = u32;

//
// Texture
//

// Decoded 8-bit image promoted to linear f32 on load (values as stored,
// scaled to [0,1]). Lookups filter bilinearly with repeat wrapping.

#[derive(Debug)]
pub struct Texture {
    pub name: String,
    width: u32,
    height: u32,
    pixels: Vec<ColorRgb>,
}

impl Texture {
    pub fn load(name: &str, path: &Path, flip_vertically: bool) -> Result<Self> {
        let decoded = imagelib::open(path)
            .with_context(|| format!("loading texture {} from {}", name, path.display()))?;
        let decoded = if flip_vertically {
            decoded.flipv()
        } else {
            decoded
        };
        let rgb = decoded.to_rgb8();
        let (width, height) = rgb.dimensions();
        ensure!(width > 0 && height > 0, "texture {name} is empty");
        let pixels = rgb
            .pixels()
            .map(|p| {
                ColorRgb::new(
                    f32::from(p[0]) / 255.0,
                    f32::from(p[1]) / 255.0,
                    f32::from(p[2]) / 255.0,
                )
            })
            .collect();
        Ok(Self {
            name: name.to_owned(),
            width,
            height,
            pixels,
        })
    }

    pub fn solid(name: &str, width: u32, height: u32, color: ColorRgb) -> Self {
        Self {
            name: name.to_owned(),
            width,
            height,
            pixels: vec![color; (width * height) as usize],
        }
    }

    #[inline]
    fn texel(&self, x: u32, y: u32) -> ColorRgb {
        self.pixels[(y * self.width + x) as usize]
    }

    // Bilinear lookup with repeat wrapping on both axes.
    pub fn sample(&self, u: f32, v: f32) -> ColorRgb {
        let x = u.rem_euclid(1.0) * self.width as f32 - 0.5;
        let y = v.rem_euclid(1.0) * self.height as f32 - 0.5;
        let x0 = x.floor();
        let y0 = y.floor();
        let fx = x - x0;
        let fy = y - y0;

        let wrap = |i: f32, n: u32| -> u32 { (i.rem_euclid(n as f32)) as u32 % n };
        let x0i = wrap(x0, self.width);
        let x1i = (x0i + 1) % self.width;
        let y0i = wrap(y0, self.height);
        let y1i = (y0i + 1) % self.height;

        let top = lerp_color(&self.texel(x0i, y0i), &self.texel(x1i, y0i), fx);
        let bottom = lerp_color(&self.texel(x0i, y1i), &self.texel(x1i, y1i), fx);
        lerp_color(&top, &bottom, fy)
    }
}

//
// Skybox
//

// Six-face cube map. The face is picked by the dominant axis of the ray
// direction, then sampled like any other texture.

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum CubeFace {
    Right,
    Left,
    Top,
    Bottom,
    Back,
    Front,
}

#[derive(Debug)]
pub struct Skybox {
    pub name: String,
    // Indexed by CubeFace discriminant.
    faces: [Texture; 6],
}

impl Skybox {
    #[allow(clippy::too_many_arguments)]
    pub fn load(
        name: &str,
        right: &Path,
        left: &Path,
        top: &Path,
        bottom: &Path,
        back: &Path,
        front: &Path,
        flip_vertically: bool,
    ) -> Result<Self> {
        let load = |path: &Path| Texture::load(name, path, flip_vertically);
        Ok(Self {
            name: name.to_owned(),
            faces: [
                load(right)?,
                load(left)?,
                load(top)?,
                load(bottom)?,
                load(back)?,
                load(front)?,
            ],
        })
    }

    #[cfg(test)]
    pub fn solid_faces(name: &str, colors: [ColorRgb; 6]) -> Self {
        Self {
            name: name.to_owned(),
            faces: colors.map(|c| Texture::solid(name, 2, 2, c)),
        }
    }

    pub fn sample(&self, dir: &Vec3) -> ColorRgb {
        let (face, u, v) = Self::face_uv(dir);
        self.faces[face as usize].sample(u, v)
    }

    // Standard cube-map mapping: project onto the dominant-axis face and
    // remap the remaining two components into [0,1].
    fn face_uv(dir: &Vec3) -> (CubeFace, f32, f32) {
        let abs = dir.abs();
        let (face, sc, tc, ma) = if abs.x >= abs.y && abs.x >= abs.z {
            if dir.x > 0.0 {
                (CubeFace::Right, -dir.z, -dir.y, abs.x)
            } else {
                (CubeFace::Left, dir.z, -dir.y, abs.x)
            }
        } else if abs.y >= abs.z {
            if dir.y > 0.0 {
                (CubeFace::Top, dir.x, dir.z, abs.y)
            } else {
                (CubeFace::Bottom, dir.x, -dir.z, abs.y)
            }
        } else if dir.z > 0.0 {
            (CubeFace::Front, dir.x, -dir.y, abs.z)
        } else {
            (CubeFace::Back, -dir.x, -dir.y, abs.z)
        };
        let u = 0.5 * (sc / ma + 1.0);
        let v = 0.5 * (tc / ma + 1.0);
        (face, u, v)
    }
}

//
// Model
//

// Wavefront OBJ subset: v/vt/vn and f records, fan triangulation,
// negative indices. Faces mixing the three index spaces are unified into
// single-index vertex arrays; missing normals are generated flat and
// tangents derive from the uv parameterization when it exists.

pub struct Model {
    pub name: String,
    pub positions: Vec<Point3>,
    pub normals: Vec<Vec3>,
    pub tangents: Vec<Vec3>,
    pub uvs: Vec<Vec2>,
    pub triangles: Vec<[u32; 3]>,
}

impl Model {
    pub fn load(name: &str, path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("loading model {} from {}", name, path.display()))?;
        Self::parse(name, &text)
    }

    pub fn parse(name: &str, text: &str) -> Result<Self> {
        let mut obj_positions: Vec<Point3> = Vec::new();
        let mut obj_uvs: Vec<Vec2> = Vec::new();
        let mut obj_normals: Vec<Vec3> = Vec::new();

        // (position, uv, normal) triple -> unified index.
        let mut vertex_cache: HashMap<(u32, u32, u32), u32> = HashMap::new();
        let mut model = Self {
            name: name.to_owned(),
            positions: Vec::new(),
            normals: Vec::new(),
            tangents: Vec::new(),
            uvs: Vec::new(),
            triangles: Vec::new(),
        };
        let mut missing_normals = false;

        for (line_number, line) in text.lines().enumerate() {
            let line = line.trim();
            let mut fields = line.split_whitespace();
            let context = || format!("model {name}, line {}", line_number + 1);
            match fields.next() {
                Some("v") => obj_positions.push(parse_point3(&mut fields).with_context(&context)?),
                Some("vt") => obj_uvs.push(parse_vec2(&mut fields).with_context(&context)?),
                Some("vn") => obj_normals.push(parse_vec3(&mut fields).with_context(&context)?),
                Some("f") => {
                    let mut face = Vec::with_capacity(4);
                    for corner in fields {
                        let (pi, ti, ni) = parse_face_corner(
                            corner,
                            obj_positions.len(),
                            obj_uvs.len(),
                            obj_normals.len(),
                        )
                        .with_context(&context)?;
                        missing_normals |= ni.is_none();
                        let key = (
                            pi,
                            ti.map_or(u32::MAX, |i| i),
                            ni.map_or(u32::MAX, |i| i),
                        );
                        let unified = *vertex_cache.entry(key).or_insert_with(|| {
                            model.positions.push(obj_positions[pi as usize]);
                            model
                                .uvs
                                .push(ti.map_or(Vec2::zeros(), |i| obj_uvs[i as usize]));
                            model
                                .normals
                                .push(ni.map_or(Vec3::zeros(), |i| obj_normals[i as usize]));
                            (model.positions.len() - 1) as u32
                        });
                        face.push(unified);
                    }
                    ensure!(face.len() >= 3, "{}: face with fewer than 3 corners", context());
                    for i in 1..face.len() - 1 {
                        model.triangles.push([face[0], face[i], face[i + 1]]);
                    }
                }
                // Groups, objects, materials and comments are skipped.
                _ => {}
            }
        }

        ensure!(!model.triangles.is_empty(), "model {name} has no faces");
        if missing_normals {
            model.generate_normals();
        }
        model.generate_tangents();
        Ok(model)
    }

    // Area-weighted vertex normals for vertices the file left bare.
    fn generate_normals(&mut self) {
        let mut accumulated = vec![Vec3::zeros(); self.positions.len()];
        for triangle in &self.triangles {
            let [i0, i1, i2] = triangle.map(|i| i as usize);
            let face = (self.positions[i1] - self.positions[i0])
                .cross(&(self.positions[i2] - self.positions[i0]));
            accumulated[i0] += face;
            accumulated[i1] += face;
            accumulated[i2] += face;
        }
        for (normal, acc) in self.normals.iter_mut().zip(&accumulated) {
            if normal.norm_squared() == 0.0 {
                *normal = if acc.norm_squared() > 0.0 {
                    acc.normalize()
                } else {
                    Vec3::y()
                };
            }
        }
    }

    // Per-vertex tangents from the uv gradients, orthogonalized against
    // the normal; degenerate parameterizations fall back to an arbitrary
    // frame.
    fn generate_tangents(&mut self) {
        let mut accumulated = vec![Vec3::zeros(); self.positions.len()];
        for triangle in &self.triangles {
            let [i0, i1, i2] = triangle.map(|i| i as usize);
            let e1 = self.positions[i1] - self.positions[i0];
            let e2 = self.positions[i2] - self.positions[i0];
            let duv1 = self.uvs[i1] - self.uvs[i0];
            let duv2 = self.uvs[i2] - self.uvs[i0];
            let det = duv1.x * duv2.y - duv2.x * duv1.y;
            if det.abs() > 1e-12 {
                let tangent = (e1 * duv2.y - e2 * duv1.y) / det;
                accumulated[i0] += tangent;
                accumulated[i1] += tangent;
                accumulated[i2] += tangent;
            }
        }
        self.tangents = self
            .normals
            .iter()
            .zip(&accumulated)
            .map(|(normal, acc)| {
                let projected = acc - acc.dot(normal) * normal;
                if projected.norm_squared() > 1e-12 {
                    projected.normalize()
                } else {
                    pt::orthonormal_tangent(normal)
                }
            })
            .collect();
    }
}

fn parse_point3<'a>(fields: &mut impl Iterator<Item = &'a str>) -> Result<Point3> {
    Ok(Point3::from(parse_vec3(fields)?))
}

fn parse_vec3<'a>(fields: &mut impl Iterator<Item = &'a str>) -> Result<Vec3> {
    let mut parse = || -> Result<f32> {
        fields
            .next()
            .ok_or_else(|| anyhow!("missing component"))?
            .parse::<f32>()
            .context("invalid float")
    };
    Ok(Vec3::new(parse()?, parse()?, parse()?))
}

fn parse_vec2<'a>(fields: &mut impl Iterator<Item = &'a str>) -> Result<Vec2> {
    let mut parse = || -> Result<f32> {
        fields
            .next()
            .ok_or_else(|| anyhow!("missing component"))?
            .parse::<f32>()
            .context("invalid float")
    };
    Ok(Vec2::new(parse()?, parse()?))
}

// `f` corner of the form v, v/vt, v//vn or v/vt/vn with 1-based or
// negative (from-the-end) indices.
fn parse_face_corner(
    corner: &str,
    num_positions: usize,
    num_uvs: usize,
    num_normals: usize,
) -> Result<(u32, Option<u32>, Option<u32>)> {
    let resolve = |field: Option<&str>, count: usize| -> Result<Option<u32>> {
        let Some(field) = field else {
            return Ok(None);
        };
        if field.is_empty() {
            return Ok(None);
        }
        let raw = field.parse::<i64>().context("invalid face index")?;
        let index = if raw < 0 {
            count as i64 + raw
        } else {
            raw - 1
        };
        ensure!(
            (0..count as i64).contains(&index),
            "face index {raw} out of range (count {count})"
        );
        Ok(Some(index as u32))
    };

    let mut parts = corner.split('/');
    let position = resolve(parts.next(), num_positions)?
        .ok_or_else(|| anyhow!("face corner without position index"))?;
    let uv = resolve(parts.next(), num_uvs)?;
    let normal = resolve(parts.next(), num_normals)?;
    Ok((position, uv, normal))
}

//
// Tests
//
