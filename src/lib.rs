//! dem-synth: randomized scene sampling for synthetic DEM render datasets
//!
//! This library drives a 3D host application to produce labelled image datasets from
//! digital elevation models: every sample places the sun and the camera at random, rotates
//! the terrain, and renders one image per [`RenderPass`]. A second mode samples random
//! points inside an object's bounding box and labels them occupied/unoccupied with ray
//! casts, giving weak 3D supervision next to each render.
//!
//! The host (scene graph, importer, renderer, ray caster) is abstracted as
//! [`host::SceneHost`]. Two hosts ship with the crate:
//!
//! - [`script_host::ScriptHost`] records every call as a JSON command script that a
//!   host-side shim can replay.
//! - [`analytic::AnalyticScene`] answers bounding box and ray queries for sphere geometry,
//!   which is enough to run the occupancy pipeline end to end without a host.
//!
//! # Parameter generation
//!
//! ```ignore
//! use dem_synth::params::{generate_parameters, save_parameters, ParameterConfig};
//!
//! let config = ParameterConfig::default(); // 200 repeats x 100 images, top view on
//! let params = generate_parameters(&config, &mut rand::thread_rng())?;
//! save_parameters("arrays/shader.json", &params)?;
//! ```
//!
//! # DEM dataset
//!
//! ```ignore
//! use dem_synth::{catalog::AssetCatalog, driver::{DemRunConfig, SceneDriver}};
//! use dem_synth::script_host::ScriptHost;
//!
//! let catalog = AssetCatalog::scan("tiff_files/dems", "tiff_files/texs", None)?;
//! let params = dem_synth::params::load_parameters("arrays/shader.json")?;
//! let mut host = ScriptHost::new();
//! let summary = SceneDriver::new(&mut host).run_dem(&catalog, &params, &DemRunConfig::default())?;
//! host.save("output/host_script.json")?;
//! ```
//!
//! # Occupancy samples
//!
//! ```ignore
//! use dem_synth::{analytic::AnalyticScene, driver::{OccupancyRunConfig, SceneDriver}};
//!
//! let mut scene = AnalyticScene::new();
//! scene.register_model("tree.blend", vec![Sphere::new(Vec3::ZERO, 2.0)]);
//! let config = OccupancyRunConfig::new("tree.blend", "out/tree");
//! SceneDriver::new(&mut scene).run_occupancy(&config, &mut rand::thread_rng())?;
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub mod analytic;
pub mod backend;
pub mod bbox;
pub mod camera;
pub mod catalog;
pub mod cli;
pub mod dataset;
pub mod driver;
pub mod error;
pub mod host;
pub mod occupancy;
pub mod params;
pub mod script_host;
pub mod spherical;

pub use error::{AssetError, ConfigError, HostError, PipelineError};

/// Object rotation as Euler angles in degrees, host convention.
///
/// The angles are applied about the world X, then Y, then Z axis, i.e. the resulting
/// rotation is `Rz * Ry * Rx`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ObjectRotation {
    /// Rotation around X-axis in degrees
    pub x: f64,
    /// Rotation around Y-axis in degrees
    pub y: f64,
    /// Rotation around the vertical Z-axis in degrees
    pub z: f64,
}

impl ObjectRotation {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn from_array(arr: [f64; 3]) -> Self {
        Self::new(arr[0], arr[1], arr[2])
    }

    /// Build from angles given in radians.
    pub fn from_radians(arr: [f64; 3]) -> Self {
        Self::new(arr[0].to_degrees(), arr[1].to_degrees(), arr[2].to_degrees())
    }

    /// Identity rotation (no rotation)
    pub fn identity() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }

    /// Spin about the vertical axis only; how terrain tiles are rotated per sample.
    pub fn about_z(degrees: f64) -> Self {
        Self::new(0.0, 0.0, degrees)
    }

    pub fn to_array(&self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }

    /// Convert to a bevy quaternion (f64 -> f32).
    pub fn to_quat(&self) -> Quat {
        Quat::from_rotation_z((self.z as f32).to_radians())
            * Quat::from_rotation_y((self.y as f32).to_radians())
            * Quat::from_rotation_x((self.x as f32).to_radians())
    }

    /// Convert to a bevy transform (rotation only, no translation)
    pub fn to_transform(&self) -> Transform {
        Transform::from_rotation(self.to_quat())
    }
}

impl Default for ObjectRotation {
    fn default() -> Self {
        Self::identity()
    }
}

/// Output image size in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn square(size: u32) -> Self {
        Self::new(size, size)
    }

    pub fn to_array(&self) -> [u32; 2] {
        [self.width, self.height]
    }
}

impl Default for Resolution {
    fn default() -> Self {
        Self::square(512)
    }
}

/// One rendered output per sample.
///
/// Each pass is a separate render call with its own host configuration, instead of
/// keeping duplicated scene objects around for the shading and normals variants.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderPass {
    Composite,
    Albedo,
    Depth,
    Normals,
    Shading,
    Mask,
    Specular,
    Lights,
}

/// Temporary lighting used while a pass renders.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LightingOverride {
    /// World (ambient) lighting strength during the pass
    pub world_strength: f32,
    /// Sun energy during the pass
    pub sun_energy: f32,
}

impl RenderPass {
    /// Every pass, in output order.
    pub const ALL: [RenderPass; 8] = [
        RenderPass::Composite,
        RenderPass::Albedo,
        RenderPass::Depth,
        RenderPass::Normals,
        RenderPass::Shading,
        RenderPass::Mask,
        RenderPass::Specular,
        RenderPass::Lights,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RenderPass::Composite => "composite",
            RenderPass::Albedo => "albedo",
            RenderPass::Depth => "depth",
            RenderPass::Normals => "normals",
            RenderPass::Shading => "shading",
            RenderPass::Mask => "mask",
            RenderPass::Specular => "specular",
            RenderPass::Lights => "lights",
        }
    }

    /// `{index}_{pass}.png`
    pub fn file_name(&self, index: usize) -> String {
        format!("{}_{}.png", index, self.as_str())
    }

    /// Albedo is rendered under flat world light with the sun switched off.
    pub fn lighting_override(&self) -> Option<LightingOverride> {
        match self {
            RenderPass::Albedo => Some(LightingOverride {
                world_strength: 2.0,
                sun_energy: 0.0,
            }),
            _ => None,
        }
    }
}

impl fmt::Display for RenderPass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RenderPass {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RenderPass::ALL
            .iter()
            .copied()
            .find(|pass| pass.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ConfigError::UnknownPass(s.to_string()))
    }
}

// Re-export bevy types that consumers will need
pub use bevy::prelude::{Mat4, Quat, Transform, Vec3};
