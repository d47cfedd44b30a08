use super::*;

//
// Lights
//

// Radiance arriving at `reference` from one sampled direction, with the
// pdf measured with respect to solid angle at the reference point. A
// zero pdf means the sample carries no contribution (light behind its
// own surface, edge-on area light).

#[derive(Clone, Copy, Debug)]
pub struct LightSample {
    pub li: ColorRgb,
    pub wi: Vec3,
    pub distance: f32,
    pub pdf: f32,
}

#[derive(Clone, Debug)]
pub enum Light {
    Point {
        position: Point3,
        color: ColorRgb,
        n_samples: u32,
    },
    Directional {
        direction: Vec3,
        color: ColorRgb,
        n_samples: u32,
    },
    Area {
        shape: Shape,
        ke: ColorRgb,
        n_samples: u32,
    },
}

impl Light {
    pub fn n_samples(&self) -> u32 {
        match self {
            Self::Point { n_samples, .. }
            | Self::Directional { n_samples, .. }
            | Self::Area { n_samples, .. } => *n_samples,
        }
    }

    pub fn sample_li(
        &self,
        reference: &Point3,
        meshes: &[MeshInstance],
        sampler: &mut UniformSampler,
    ) -> LightSample {
        match self {
            Self::Point {
                position, color, ..
            } => {
                let to_light = position - reference;
                let distance = to_light.norm();
                LightSample {
                    li: *color / (distance * distance),
                    wi: to_light / distance,
                    distance,
                    pdf: 1.0,
                }
            }
            Self::Directional {
                direction, color, ..
            } => LightSample {
                li: *color,
                wi: -direction,
                distance: f32::INFINITY,
                pdf: 1.0,
            },
            Self::Area { shape, ke, .. } => {
                let surface = shape.sample_area(meshes, sampler);
                let to_light = surface.position - reference;
                let distance = to_light.norm();
                let wi = to_light / distance;
                // Emitted radiance is constant over the surface; the
                // area pdf converts to solid angle through the emitter's
                // facing term. Edge-on or back-facing samples are dead.
                let cos_light = surface.normal.dot(&-wi);
                if cos_light <= 0.0 {
                    return LightSample {
                        li: ColorRgb::BLACK,
                        wi,
                        distance,
                        pdf: 0.0,
                    };
                }
                LightSample {
                    li: *ke,
                    wi,
                    distance,
                    pdf: surface.pdf * distance * distance / cos_light,
                }
            }
        }
    }
}
