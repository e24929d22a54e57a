//! Scene host contract.
//!
//! Everything the pipeline needs from a 3D application goes through [`SceneHost`]:
//! creating cameras and lights, importing rasters and models, posing objects, bounding
//! box queries and render-to-file calls. Objects are addressed by [`ObjectId`] handles
//! returned from the creating call, never by name.
//!
//! Ray queries live in the separate [`RayCaster`] trait so the occupancy sampler can be
//! driven by anything that intersects rays, not only by a full host.

use crate::backend::RenderSettings;
use crate::bbox::BoundingBox;
use crate::camera::Projection;
use crate::error::HostError;
use crate::{RenderPass, Resolution};
use bevy::prelude::{Transform, Vec3};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Stable handle to a host object.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectId(pub u64);

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What a handle refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectKind {
    Mesh,
    Camera,
    Light,
    Marker,
    Other,
}

/// First intersection along a ray.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RayHit {
    pub point: Vec3,
    pub normal: Vec3,
    pub object: ObjectId,
    pub distance: f32,
}

/// Intersection queries against the current scene.
pub trait RayCaster {
    /// Cast from `origin` along `direction`; `max_distance` of `None` means unbounded.
    ///
    /// `direction` need not be normalized. Returns `Ok(None)` when nothing is hit.
    fn ray_cast(
        &self,
        origin: Vec3,
        direction: Vec3,
        max_distance: Option<f32>,
    ) -> Result<Option<RayHit>, HostError>;
}

/// A single render-to-file call.
#[derive(Clone, Debug, PartialEq)]
pub struct RenderRequest {
    pub pass: RenderPass,
    pub resolution: Resolution,
    pub output: PathBuf,
    pub camera: ObjectId,
}

impl RenderRequest {
    pub fn new(pass: RenderPass, resolution: Resolution, output: impl AsRef<Path>, camera: ObjectId) -> Self {
        Self {
            pass,
            resolution,
            output: output.as_ref().to_path_buf(),
            camera,
        }
    }
}

/// Scene graph, importer and renderer of the host application.
///
/// All calls are synchronous and block until the host is done; a host is never shared
/// between concurrent samples.
pub trait SceneHost: RayCaster {
    /// Apply device and sampler settings before the first render.
    fn configure(&mut self, settings: &RenderSettings) -> Result<(), HostError>;

    /// Create a camera and make it the active scene camera.
    fn create_camera(&mut self, projection: Projection, clip_end: f32) -> Result<ObjectId, HostError>;

    fn create_sun(&mut self, energy: f32, size: f32) -> Result<ObjectId, HostError>;

    /// Update the strength and angular size of an existing sun.
    fn set_sun(&mut self, sun: ObjectId, energy: f32, size: f32) -> Result<(), HostError>;

    /// Ambient world lighting strength.
    fn set_world_lighting(&mut self, strength: f32) -> Result<(), HostError>;

    /// Import an elevation raster as displaced geometry; returns every object created.
    fn import_elevation(&mut self, path: &Path) -> Result<Vec<ObjectId>, HostError>;

    /// Assign a texture raster as the material of `target`.
    fn apply_texture(&mut self, target: ObjectId, path: &Path) -> Result<(), HostError>;

    /// Import a model file; returns every object created.
    fn import_model(&mut self, path: &Path) -> Result<Vec<ObjectId>, HostError>;

    /// UV sphere primitive, e.g. the reference sphere of DEM scenes.
    fn create_sphere(&mut self, center: Vec3, radius: f32) -> Result<ObjectId, HostError>;

    /// Small cube marking an occupancy sample, coloured by its label.
    fn add_marker(&mut self, position: Vec3, size: f32, occupied: bool) -> Result<ObjectId, HostError>;

    fn set_transform(&mut self, object: ObjectId, transform: &Transform) -> Result<(), HostError>;

    /// Show or hide an object in both viewport and render.
    fn set_visible(&mut self, object: ObjectId, visible: bool) -> Result<(), HostError>;

    fn object_kind(&self, object: ObjectId) -> Result<ObjectKind, HostError>;

    fn is_visible(&self, object: ObjectId) -> Result<bool, HostError>;

    /// World-space bounds of a mesh, `None` for objects without geometry.
    fn bounding_box(&self, object: ObjectId) -> Result<Option<BoundingBox>, HostError>;

    fn render(&mut self, request: &RenderRequest) -> Result<(), HostError>;

    fn delete(&mut self, objects: &[ObjectId]) -> Result<(), HostError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_id_display() {
        assert_eq!(ObjectId(7).to_string(), "#7");
    }

    #[test]
    fn test_object_id_serializes_as_number() {
        assert_eq!(serde_json::to_string(&ObjectId(42)).unwrap(), "42");
    }

    #[test]
    fn test_render_request_new() {
        let req = RenderRequest::new(
            RenderPass::Depth,
            Resolution::square(64),
            "out/3_depth.png",
            ObjectId(1),
        );
        assert_eq!(req.output, PathBuf::from("out/3_depth.png"));
        assert_eq!(req.pass, RenderPass::Depth);
    }
}
