use super::*;

pub type MaterialId = u32;

//
// Material
//

// Lambertian diffuse with optional emission. The specular fields (Ks,
// Ns, Tr, ior) are parsed and carried for scene fidelity; the diffuse
// core does not read them.

#[derive(Clone, Debug)]
pub struct Material {
    pub name: String,
    pub albedo: ColorRgb,
    pub ks: ColorRgb,
    pub ns: f32,
    pub ke: ColorRgb,
    pub tr: ColorRgb,
    pub ior: f32,
    pub albedo_texture: Option<TextureId>,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            name: String::new(),
            albedo: ColorRgb::new(1.0, 0.1, 0.6),
            ks: ColorRgb::new(0.7, 0.7, 0.7),
            ns: 40.0,
            ke: ColorRgb::BLACK,
            tr: ColorRgb::BLACK,
            ior: 1.0,
            albedo_texture: None,
        }
    }
}

impl Material {
    pub fn is_emissive(&self) -> bool {
        !self.ke.is_black()
    }

    pub fn albedo_at(&self, textures: &[Texture], uv: &Vec2) -> ColorRgb {
        let mut albedo = self.albedo;
        if let Some(texture) = self.albedo_texture {
            albedo *= textures[texture as usize].sample(uv.x, uv.y);
        }
        albedo
    }

    pub fn compute_brdf(&self, textures: &[Texture], hit: &IntersectionData) -> Brdf {
        Brdf {
            albedo: self.albedo_at(textures, &hit.uv),
            tangent: hit.tangent,
            bitangent: hit.bitangent,
            normal: hit.normal,
        }
    }
}

//
// BRDF
//

// Per-hit scattering closure: textured albedo plus the orthonormal
// shading frame captured from the intersection.

#[derive(Clone, Copy, Debug)]
pub struct Brdf {
    albedo: ColorRgb,
    tangent: Vec3,
    bitangent: Vec3,
    normal: Vec3,
}

#[derive(Clone, Copy, Debug)]
pub struct BrdfSample {
    pub wi: Vec3,
    pub f: ColorRgb,
    pub pdf: f32,
}

impl Brdf {
    pub fn albedo(&self) -> ColorRgb {
        self.albedo
    }

    // Callers multiply by |N.wi| themselves.
    pub fn f(&self, _wo: &Vec3, _wi: &Vec3) -> ColorRgb {
        self.albedo * INV_PI
    }

    pub fn pdf(&self, wo: &Vec3, wi: &Vec3) -> f32 {
        let same_hemisphere = wo.dot(&self.normal) * wi.dot(&self.normal) > 0.0;
        if same_hemisphere {
            cosine_hemisphere_pdf(wi.dot(&self.normal).abs())
        } else {
            0.0
        }
    }

    // Cosine-weighted importance sample of the hemisphere around the
    // shading normal. None when the pdf degenerates to zero.
    pub fn sample_f(&self, wo: &Vec3, sampler: &mut UniformSampler) -> Option<BrdfSample> {
        let local = cosine_sample_hemisphere(sampler.sample(), sampler.sample());
        let wi = local.x * self.tangent + local.y * self.bitangent + local.z * self.normal;
        let pdf = self.pdf(wo, &wi);
        if pdf > 0.0 {
            Some(BrdfSample {
                wi,
                f: self.f(wo, &wi),
                pdf,
            })
        } else {
            None
        }
    }
}
