//! Math utilities and helpers.

use glam::Vec3;

/// A coordinate axis.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    /// All three axes in X, Y, Z order.
    pub const ALL: [Self; 3] = [Self::X, Self::Y, Self::Z];

    /// Component index of this axis in a `Vec3`.
    #[inline]
    pub const fn index(self) -> usize {
        match self {
            Self::X => 0,
            Self::Y => 1,
            Self::Z => 2,
        }
    }

    /// Unit vector pointing along the positive axis.
    #[inline]
    pub const fn unit(self) -> Vec3 {
        match self {
            Self::X => Vec3::X,
            Self::Y => Vec3::Y,
            Self::Z => Vec3::Z,
        }
    }

    /// The two remaining axes, in ascending order.
    #[inline]
    pub const fn others(self) -> (Self, Self) {
        match self {
            Self::X => (Self::Y, Self::Z),
            Self::Y => (Self::X, Self::Z),
            Self::Z => (Self::X, Self::Y),
        }
    }
}

/// Ray for raycasting operations.
#[derive(Clone, Copy, Debug)]
pub struct Ray {
    /// Ray origin
    pub origin: Vec3,
    /// Ray direction (normalized)
    pub direction: Vec3,
}

impl Ray {
    /// Create a new ray
    #[inline]
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self {
            origin,
            direction: direction.normalize(),
        }
    }

    /// Ray travelling along an axis, towards positive values when `sign >= 0`.
    #[inline]
    pub fn along(origin: Vec3, axis: Axis, sign: f32) -> Self {
        let direction = if sign < 0.0 { -axis.unit() } else { axis.unit() };
        Self { origin, direction }
    }

    /// Get a point along the ray at distance t
    #[inline]
    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }

    /// The same ray with its origin shifted by `offset`.
    #[inline]
    #[must_use]
    pub fn translated(&self, offset: Vec3) -> Self {
        Self {
            origin: self.origin + offset,
            direction: self.direction,
        }
    }
}

/// Axis-Aligned Bounding Box.
///
/// Overlap and ray tests treat the box as an open set: boxes that only share a
/// face do not intersect, and a ray grazing a face or edge does not hit.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Aabb {
    /// Minimum corner
    pub min: Vec3,
    /// Maximum corner
    pub max: Vec3,
}

impl Aabb {
    /// Create a new AABB from min and max corners
    #[inline]
    pub const fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Create an AABB from its center and full size
    #[inline]
    pub fn from_center_size(center: Vec3, size: Vec3) -> Self {
        let half = size * 0.5;
        Self {
            min: center - half,
            max: center + half,
        }
    }

    /// Create an AABB for a unit cube at the given position
    #[inline]
    pub fn unit_cube(pos: Vec3) -> Self {
        Self {
            min: pos,
            max: pos + Vec3::ONE,
        }
    }

    /// Get the center of the AABB
    #[inline]
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Get the size of the AABB
    #[inline]
    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    /// Get the half-extents of the AABB
    #[inline]
    pub fn half_extents(&self) -> Vec3 {
        self.size() * 0.5
    }

    /// Check if a point is inside the AABB (boundary included)
    #[inline]
    pub fn contains_point(&self, point: Vec3) -> bool {
        point.x >= self.min.x
            && point.x <= self.max.x
            && point.y >= self.min.y
            && point.y <= self.max.y
            && point.z >= self.min.z
            && point.z <= self.max.z
    }

    /// Check if this AABB overlaps another with non-zero volume
    #[inline]
    pub fn intersects(&self, other: &Aabb) -> bool {
        self.min.x < other.max.x
            && self.max.x > other.min.x
            && self.min.y < other.max.y
            && self.max.y > other.min.y
            && self.min.z < other.max.z
            && self.max.z > other.min.z
    }

    /// The box moved by `offset`.
    #[inline]
    #[must_use]
    pub fn translated(&self, offset: Vec3) -> Aabb {
        Aabb {
            min: self.min + offset,
            max: self.max + offset,
        }
    }

    /// The volume swept by moving this box `distance` along `axis`.
    #[must_use]
    pub fn swept(&self, axis: Axis, distance: f32) -> Aabb {
        let mut swept = *self;
        let i = axis.index();
        if distance < 0.0 {
            swept.min[i] += distance;
        } else {
            swept.max[i] += distance;
        }
        swept
    }

    /// Ray-AABB intersection, returns `(t_near, t_far)` or `None` if no intersection.
    ///
    /// `t_near` is clamped to zero when the origin lies inside the box. Rays
    /// lying in a face plane or passing exactly through an edge are misses.
    pub fn intersect_ray(&self, ray: &Ray) -> Option<(f32, f32)> {
        if !ray.origin.is_finite() || !ray.direction.is_finite() {
            return None;
        }

        let mut t_near = f32::NEG_INFINITY;
        let mut t_far = f32::INFINITY;

        for axis in 0..3 {
            let origin = ray.origin[axis];
            let direction = ray.direction[axis];
            let (lo, hi) = (self.min[axis], self.max[axis]);

            if direction == 0.0 {
                // Parallel to this slab: must be strictly inside it
                if origin <= lo || origin >= hi {
                    return None;
                }
                continue;
            }

            let inv = direction.recip();
            let t1 = (lo - origin) * inv;
            let t2 = (hi - origin) * inv;
            t_near = t_near.max(t1.min(t2));
            t_far = t_far.min(t1.max(t2));
        }

        if t_near < t_far && t_far > 0.0 {
            Some((t_near.max(0.0), t_far))
        } else {
            None
        }
    }

    /// Expand AABB to include a point
    #[inline]
    pub fn expand_to_include(&mut self, point: Vec3) {
        self.min = self.min.min(point);
        self.max = self.max.max(point);
    }

    /// Merge two AABBs
    #[inline]
    #[must_use]
    pub fn merge(&self, other: &Aabb) -> Aabb {
        Aabb {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }
}
