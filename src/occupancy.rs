//! Occupancy point sampling.
//!
//! Points are drawn uniformly inside a (padded) bounding box and labelled with a
//! bracketed-by-geometry test: a point is occupied when a ray toward a known exterior
//! reference point hits something before reaching it *and* a ray in the opposite
//! direction hits something too.
//!
//! This is an approximation. It labels the whole region between two surfaces as inside,
//! which suits foliage-like models seen from the camera but misclassifies concave shapes
//! and scenes with several separate objects.
//!
//! Labelled points are moved into the camera frame and written as `N x 4` little-endian
//! `f32` tables `(x, y, z, occupied)`, rounded to 4 decimals.

use crate::bbox::BoundingBox;
use crate::camera::world_to_camera;
use crate::error::HostError;
use crate::host::RayCaster;
use bevy::log::debug;
use bevy::prelude::{Transform, Vec3};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::Path;

/// Values per table row.
pub const ROW_WIDTH: usize = 4;

const ROW_BYTES: usize = ROW_WIDTH * std::mem::size_of::<f32>();

/// Sampling settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OccupancyConfig {
    /// Points per sample (`k`)
    pub samples: usize,
    /// Fraction of the box size added on every side before sampling
    pub pad_ratio: f32,
}

impl Default for OccupancyConfig {
    fn default() -> Self {
        Self {
            samples: 1024,
            pad_ratio: 0.1,
        }
    }
}

/// One labelled sample point.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OccupancyPoint {
    /// World-space position
    pub world: Vec3,
    pub occupied: bool,
    /// Camera-relative position, set by [`to_camera_frame`]
    pub camera: Option<Vec3>,
}

/// Draw `count` points with `point = u * min + (1 - u) * max`, `u` uniform per axis.
pub fn sample_points<R: Rng + ?Sized>(bbox: &BoundingBox, count: usize, rng: &mut R) -> Vec<Vec3> {
    (0..count)
        .map(|_| {
            let u = Vec3::new(rng.gen(), rng.gen(), rng.gen());
            u * bbox.min + (Vec3::ONE - u) * bbox.max
        })
        .collect()
}

/// Bracketed-by-geometry label for a single point.
///
/// The forward ray runs from `point` toward `reference` and stops at it; the backward
/// ray runs the other way without a limit. A point that coincides with the reference
/// is unoccupied.
pub fn is_occupied<C: RayCaster + ?Sized>(
    caster: &C,
    point: Vec3,
    reference: Vec3,
) -> Result<bool, HostError> {
    let ray = reference - point;
    let length = ray.length();
    if length <= f32::EPSILON {
        return Ok(false);
    }
    if caster.ray_cast(point, ray, Some(length))?.is_none() {
        return Ok(false);
    }
    Ok(caster.ray_cast(point, -ray, None)?.is_some())
}

/// Label every point against `reference`.
pub fn classify_points<C: RayCaster + ?Sized>(
    caster: &C,
    points: &[Vec3],
    reference: Vec3,
) -> Result<Vec<OccupancyPoint>, HostError> {
    points
        .iter()
        .enumerate()
        .map(|(i, &world)| {
            if i % 1000 == 0 {
                debug!("Ray casting occupancy point {}", i);
            }
            Ok(OccupancyPoint {
                world,
                occupied: is_occupied(caster, world, reference)?,
                camera: None,
            })
        })
        .collect()
}

/// Fill in camera-relative coordinates using the inverse of the camera's world matrix.
pub fn to_camera_frame(points: &mut [OccupancyPoint], camera: &Transform) {
    let inverse = world_to_camera(camera);
    for point in points.iter_mut() {
        point.camera = Some(inverse.transform_point3(point.world));
    }
}

fn round4(value: f32) -> f32 {
    (value * 10_000.0).round() / 10_000.0
}

/// Persisted `N x 4` occupancy table.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct OccupancyTable {
    pub rows: Vec<[f32; ROW_WIDTH]>,
}

impl OccupancyTable {
    /// Build rows from camera-relative coordinates (world coordinates for points that were
    /// never transformed), rounded to 4 decimals.
    pub fn from_points(points: &[OccupancyPoint]) -> Self {
        let rows = points
            .iter()
            .map(|p| {
                let v = p.camera.unwrap_or(p.world);
                [
                    round4(v.x),
                    round4(v.y),
                    round4(v.z),
                    if p.occupied { 1.0 } else { 0.0 },
                ]
            })
            .collect();
        Self { rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn occupied_count(&self) -> usize {
        self.rows.iter().filter(|row| row[3] != 0.0).count()
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.rows
            .iter()
            .flat_map(|row| row.iter().flat_map(|v| v.to_le_bytes()))
            .collect()
    }

    pub fn from_bytes(bytes: &[u8]) -> io::Result<Self> {
        if bytes.len() % ROW_BYTES != 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "occupancy table of {} bytes is not a multiple of {}",
                    bytes.len(),
                    ROW_BYTES
                ),
            ));
        }
        let rows = bytes
            .chunks_exact(ROW_BYTES)
            .map(|chunk| {
                let mut row = [0.0f32; ROW_WIDTH];
                for (value, raw) in row.iter_mut().zip(chunk.chunks_exact(4)) {
                    *value = f32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]);
                }
                row
            })
            .collect();
        Ok(Self { rows })
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        fs::write(path, self.to_bytes())
    }

    pub fn load<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        Self::from_bytes(&fs::read(path)?)
    }
}
