use super::*;

//
// Uniform sampler
//

#[derive(Clone)]
pub struct UniformSampler {
    state: rand_pcg::Pcg64Mcg,
    distribution: rand::distributions::Uniform<f32>,
}

impl UniformSampler {
    pub fn new() -> Self {
        Self::with_seed(0)
    }

    pub fn with_seed(seed: u64) -> Self {
        Self {
            state: rand_pcg::Pcg64Mcg::seed_from_u64(seed),
            distribution: rand::distributions::Uniform::new(0.0, 1.0),
        }
    }

    pub fn sample(&mut self) -> f32 {
        self.distribution.sample(&mut self.state)
    }
}

impl Default for UniformSampler {
    fn default() -> Self {
        Self::new()
    }
}

//
// Distributions
//

// Cosine-weighted hemisphere around +z; pairs with the (tangent,
// bitangent, normal) frame of a surface hit. pdf is cos(theta)/pi.
pub fn cosine_sample_hemisphere(s: f32, t: f32) -> Vec3 {
    let r = s.sqrt();
    let phi = TAU * t;
    Vec3::new(r * phi.cos(), r * phi.sin(), (1.0 - s).max(0.0).sqrt())
}

pub fn cosine_hemisphere_pdf(cos_theta: f32) -> f32 {
    cos_theta * INV_PI
}

pub fn uniform_sample_sphere(s: f32, t: f32) -> Vec3 {
    let z = 1.0 - 2.0 * s;
    let r = 2.0 * (s * (1.0 - s)).max(0.0).sqrt();
    let phi = TAU * t;
    Vec3::new(z, r * phi.cos(), r * phi.sin())
}

// Uniform barycentrics (u, v) over a triangle.
pub fn uniform_sample_triangle(s: f32, t: f32) -> (f32, f32) {
    let sq = s.sqrt();
    (sq * (1.0 - t), sq * t)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sampler_is_deterministic() {
        let mut a = UniformSampler::with_seed(7);
        let mut b = UniformSampler::with_seed(7);
        for _ in 0..64 {
            assert_eq!(a.sample(), b.sample());
        }
    }

    #[test]
    fn test_sampler_range() {
        let mut sampler = UniformSampler::new();
        for _ in 0..4096 {
            let x = sampler.sample();
            assert!((0.0..1.0).contains(&x));
        }
    }

    #[test]
    fn test_cosine_hemisphere_distribution() {
        // Every sample is unit length, lies in the upper hemisphere, and
        // its pdf matches cos(theta)/pi exactly. The Monte Carlo estimate
        // of the hemisphere integral of cos(theta)/pi under this pdf is 1
        // by construction; E[cos(theta)] = 2/3 checks the distribution.
        let mut sampler = UniformSampler::with_seed(11);
        let n = 100_000;
        let mut mean_cos = 0.0;
        for _ in 0..n {
            let w = cosine_sample_hemisphere(sampler.sample(), sampler.sample());
            assert!(w.z >= 0.0);
            assert_abs_diff_eq!(w.norm(), 1.0, epsilon = 1e-4);
            let pdf = cosine_hemisphere_pdf(w.z);
            assert_abs_diff_eq!(pdf, w.z * INV_PI, epsilon = 1e-6);
            mean_cos += f64::from(w.z);
        }
        mean_cos /= f64::from(n);
        assert_abs_diff_eq!(mean_cos, 2.0 / 3.0, epsilon = 5e-3);
    }

    #[test]
    fn test_uniform_sphere_distribution() {
        let mut sampler = UniformSampler::with_seed(13);
        let n = 100_000;
        let mut mean = na::Vector3::<f64>::zeros();
        for _ in 0..n {
            let w = uniform_sample_sphere(sampler.sample(), sampler.sample());
            assert_abs_diff_eq!(w.norm(), 1.0, epsilon = 1e-4);
            mean += w.cast::<f64>();
        }
        mean /= f64::from(n);
        // Centered on the origin.
        assert_abs_diff_eq!(mean.norm(), 0.0, epsilon = 1e-2);
    }

    #[test]
    fn test_uniform_triangle_barycentrics() {
        let mut sampler = UniformSampler::with_seed(17);
        for _ in 0..10_000 {
            let (u, v) = uniform_sample_triangle(sampler.sample(), sampler.sample());
            assert!(u >= 0.0 && v >= 0.0 && u + v <= 1.0 + 1e-6);
        }
    }
}
