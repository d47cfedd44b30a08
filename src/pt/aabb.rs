use super::*;

#[repr(C)]
#[derive(Pod, Zeroable, Clone, Copy, Debug, PartialEq)]
pub struct Aabb {
    extents: [Point3; 2],
}

impl Aabb {
    // Empty box: union with any point or box is idempotent.
    #[inline]
    pub fn new() -> Self {
        Self {
            extents: [
                Vec3::repeat(f32::INFINITY).into(),
                Vec3::repeat(f32::NEG_INFINITY).into(),
            ],
        }
    }

    #[inline]
    pub fn from_min_max(min: &Point3, max: &Point3) -> Self {
        Self {
            extents: [*min, *max],
        }
    }

    pub fn from_points<'a, Iter>(points: Iter) -> Self
    where
        Iter: IntoIterator<Item = &'a Point3>,
    {
        let mut aabb = Self::new();
        for point in points {
            aabb.extend(point);
        }
        aabb
    }

    #[inline]
    pub fn min(&self) -> Point3 {
        self.extents[0]
    }

    #[inline]
    pub fn max(&self) -> Point3 {
        self.extents[1]
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.extents[0].x > self.extents[1].x
    }

    #[inline]
    pub fn centroid(&self) -> Point3 {
        na::center(&self.min(), &self.max())
    }

    #[inline]
    pub fn extents(&self) -> Vec3 {
        self.max() - self.min()
    }

    pub fn extend(&mut self, point: &Point3) {
        self.extents[0] = self.min().coords.inf(&point.coords).into();
        self.extents[1] = self.max().coords.sup(&point.coords).into();
    }

    pub fn merge(&mut self, other: &Aabb) {
        self.extents[0] = self.min().inf(&other.min());
        self.extents[1] = self.max().sup(&other.max());
    }

    pub fn merged(&self, other: &Aabb) -> Self {
        Self {
            extents: [self.min().inf(&other.min()), self.max().sup(&other.max())],
        }
    }

    pub fn longest_dimension(&self) -> usize {
        let d = self.extents();
        if d.x > d.y && d.x > d.z {
            0
        } else if d.y > d.z {
            1
        } else {
            2
        }
    }

    pub fn surface_area(&self) -> f32 {
        if self.is_empty() {
            return 0.0;
        }
        let d = self.extents();
        2.0 * (d.x * d.y + d.x * d.z + d.y * d.z)
    }

    // Relative position of `point` inside the box, (0,0,0) at min and
    // (1,1,1) at max. Degenerate axes map to 0.
    pub fn offset(&self, point: &Point3) -> Vec3 {
        let mut o = point - self.min();
        let d = self.extents();
        for k in 0..3 {
            if d[k] > 0.0 {
                o[k] /= d[k];
            }
        }
        o
    }
}

impl Default for Aabb {
    fn default() -> Self {
        Self::new()
    }
}
