//! Axis-aligned bounding boxes.

use crate::error::ConfigError;
use bevy::prelude::Vec3;

/// Axis-aligned box given by its min and max corners.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox {
    pub min: Vec3,
    pub max: Vec3,
}

impl BoundingBox {
    /// Build from two corners in any order; the result is componentwise ordered.
    pub fn new(a: Vec3, b: Vec3) -> Self {
        Self {
            min: a.min(b),
            max: a.max(b),
        }
    }

    /// Tightest box around `points`, `None` when empty.
    pub fn from_points<I: IntoIterator<Item = Vec3>>(points: I) -> Option<Self> {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        Some(iter.fold(Self::new(first, first), |bbox, p| Self {
            min: bbox.min.min(p),
            max: bbox.max.max(p),
        }))
    }

    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        Self {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    /// Union of every box, `None` for an empty iterator.
    pub fn union_all<'a, I: IntoIterator<Item = &'a BoundingBox>>(boxes: I) -> Option<Self> {
        boxes
            .into_iter()
            .fold(None, |acc: Option<BoundingBox>, b| match acc {
                Some(acc) => Some(acc.union(b)),
                None => Some(*b),
            })
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    /// Largest extent over all three axes.
    pub fn max_extent(&self) -> f32 {
        self.size().max_element()
    }

    /// Largest horizontal (X/Y) extent.
    pub fn footprint(&self) -> f32 {
        let size = self.size();
        size.x.max(size.y)
    }

    /// Grow every side by `ratio` times the box size along that axis.
    ///
    /// `ratio = 0` returns the box unchanged; larger ratios never shrink it.
    pub fn pad(&self, ratio: f32) -> Result<BoundingBox, ConfigError> {
        if !ratio.is_finite() || ratio < 0.0 {
            return Err(ConfigError::InvalidPadRatio(ratio));
        }
        let margin = self.size() * ratio;
        Ok(Self {
            min: self.min - margin,
            max: self.max + margin,
        })
    }

    pub fn contains(&self, point: Vec3) -> bool {
        point.cmpge(self.min).all() && point.cmple(self.max).all()
    }

    pub fn is_degenerate(&self) -> bool {
        self.size().min_element() <= 0.0
    }

    pub fn corners(&self) -> [Vec3; 8] {
        let (a, b) = (self.min, self.max);
        [
            Vec3::new(a.x, a.y, a.z),
            Vec3::new(b.x, a.y, a.z),
            Vec3::new(a.x, b.y, a.z),
            Vec3::new(b.x, b.y, a.z),
            Vec3::new(a.x, a.y, b.z),
            Vec3::new(b.x, a.y, b.z),
            Vec3::new(a.x, b.y, b.z),
            Vec3::new(b.x, b.y, b.z),
        ]
    }
}
