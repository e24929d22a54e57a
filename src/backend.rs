//! Render device selection and host render settings.
//!
//! This module decides how the host renders, not what it renders:
//!
//! - Device choice (CPU or GPU) with an environment override (`DEM_SYNTH_DEVICE`)
//! - Path-tracer sampler presets (the GPU preset trades noise for throughput)
//! - Camera volume and colour management defaults for the two dataset kinds

use crate::Resolution;
use bevy::log::warn;
use serde::{Deserialize, Serialize};
use std::env;

/// Environment variable that overrides the configured device.
pub const DEVICE_ENV: &str = "DEM_SYNTH_DEVICE";

/// Where the host's path tracer runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderDevice {
    Cpu,
    Gpu,
}

impl RenderDevice {
    /// Value understood by the host and by [`DEVICE_ENV`]
    pub fn as_env(&self) -> &'static str {
        match self {
            RenderDevice::Cpu => "cpu",
            RenderDevice::Gpu => "gpu",
        }
    }

    /// Human-readable name
    pub fn name(&self) -> &'static str {
        match self {
            RenderDevice::Cpu => "CPU",
            RenderDevice::Gpu => "GPU",
        }
    }
}

/// Path tracer quality settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplerSettings {
    /// Samples per pixel, `None` keeps the host default
    pub samples: Option<u32>,
    /// Render tile size in pixels
    pub tile_size: Option<[u32; 2]>,
    pub max_bounces: Option<u32>,
    pub caustics: bool,
}

impl Default for SamplerSettings {
    fn default() -> Self {
        Self {
            samples: None,
            tile_size: None,
            max_bounces: None,
            caustics: true,
        }
    }
}

impl SamplerSettings {
    /// 20 samples, 256x256 tiles, 5 bounces, caustics off.
    pub fn gpu_preset() -> Self {
        Self {
            samples: Some(20),
            tile_size: Some([256, 256]),
            max_bounces: Some(5),
            caustics: false,
        }
    }
}

/// Everything the host needs before the first render call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderSettings {
    pub device: RenderDevice,
    /// Host render engine name
    pub engine: String,
    pub sampler: SamplerSettings,
    pub resolution: Resolution,
    /// Full width of the orthographic view volume
    pub ortho_scale: f32,
    pub clip_end: f32,
    /// Colour management view transform and look, `None` keeps the host default
    pub view_transform: Option<(String, String)>,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self::dem_default()
    }
}

impl RenderSettings {
    /// Orthographic DEM renders: 512x512, ortho scale 256, clip end 350, CPU.
    pub fn dem_default() -> Self {
        Self {
            device: RenderDevice::Cpu,
            engine: "CYCLES".to_string(),
            sampler: SamplerSettings::default(),
            resolution: Resolution::square(512),
            ortho_scale: 256.0,
            clip_end: 350.0,
            view_transform: None,
        }
    }

    /// Perspective model renders with filmic colour management.
    pub fn model_default(size: u32) -> Self {
        Self {
            resolution: Resolution::square(size),
            clip_end: 100.0,
            view_transform: Some(("Filmic".to_string(), "Filmic - Base Contrast".to_string())),
            ..Self::dem_default()
        }
    }

    /// Switch device; the GPU also selects the fast sampler preset.
    pub fn with_device(mut self, device: RenderDevice) -> Self {
        self.device = device;
        self.sampler = match device {
            RenderDevice::Gpu => SamplerSettings::gpu_preset(),
            RenderDevice::Cpu => SamplerSettings::default(),
        };
        self
    }

    pub fn with_resolution(mut self, resolution: Resolution) -> Self {
        self.resolution = resolution;
        self
    }

    /// Camera distance from the origin for DEM renders: half the ortho scale.
    pub fn camera_radius(&self) -> f32 {
        self.ortho_scale / 2.0
    }

    /// Device after applying the environment override.
    pub fn selected_device(&self) -> RenderDevice {
        match env::var(DEVICE_ENV) {
            Ok(value) => parse_device(&value).unwrap_or_else(|| {
                warn!("Ignoring unknown {}={}", DEVICE_ENV, value);
                self.device
            }),
            Err(_) => self.device,
        }
    }

    /// Settings with the environment override applied.
    pub fn resolved(&self) -> Self {
        let device = self.selected_device();
        if device == self.device {
            self.clone()
        } else {
            self.clone().with_device(device)
        }
    }
}

/// Parse a device string from the environment or the command line
pub fn parse_device(s: &str) -> Option<RenderDevice> {
    match s.trim().to_lowercase().as_str() {
        "cpu" => Some(RenderDevice::Cpu),
        "gpu" | "cuda" | "optix" => Some(RenderDevice::Gpu),
        _ => None,
    }
}
