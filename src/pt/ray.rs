use super::*;

// Direction is unit length by convention when a ray enters the integrator,
// but intersection routines never assume it: rays transformed into a
// shape's local space keep their world-space parameterization.

#[derive(Clone, Copy, Debug)]
pub struct Ray {
    pub origin: Point3,
    pub dir: Vec3,
}

impl Ray {
    #[inline]
    pub fn new(origin: Point3, dir: Vec3) -> Self {
        Self { origin, dir }
    }

    #[inline]
    pub fn evaluate(&self, t: f32) -> Point3 {
        self.origin + t * self.dir
    }
}
