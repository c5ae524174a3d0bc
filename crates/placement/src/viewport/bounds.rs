use glam::Vec3;

/// Axis-aligned bounding box
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Compute AABB from a set of points. Returns `None` for an empty set.
    pub fn from_points(points: &[Vec3]) -> Option<Self> {
        let first = *points.first()?;
        let mut min = first;
        let mut max = first;
        for p in &points[1..] {
            min = min.min(*p);
            max = max.max(*p);
        }
        Some(Self { min, max })
    }

    /// Smallest box containing both
    pub fn union(&self, other: &Aabb) -> Aabb {
        Aabb {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    /// Center of the bounding box
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Extent along each axis
    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    /// Largest extent along any axis
    pub fn largest_dimension(&self) -> f32 {
        self.size().max_element()
    }

    /// Box after a non-negative per-axis scale about the local origin
    pub fn scaled(&self, scale: Vec3) -> Aabb {
        let a = self.min * scale;
        let b = self.max * scale;
        Aabb {
            min: a.min(b),
            max: a.max(b),
        }
    }

    /// Box moved by `offset`
    pub fn translated(&self, offset: Vec3) -> Aabb {
        Aabb {
            min: self.min + offset,
            max: self.max + offset,
        }
    }

    /// All components finite and min <= max
    pub fn is_valid(&self) -> bool {
        self.min.is_finite() && self.max.is_finite() && self.min.cmple(self.max).all()
    }
}
