//! Dataset index and read-back of rendered outputs
//!
//! Every driver run leaves two JSON files next to its outputs:
//!
//! - `metadata.json`: what kind of run it was, passes, resolution, sample count
//! - `index.json`: one [`SampleRecord`] per rendered sample
//!
//! [`Dataset`] loads them back and resolves per-sample parameters, pass images and
//! occupancy tables, which is what training code and the `inspect` command need.
//!
//! # Usage
//!
//! ```ignore
//! use dem_synth::dataset::Dataset;
//! use dem_synth::RenderPass;
//!
//! let dataset = Dataset::load("output")?;
//! let albedo = dataset.pass_image(0, RenderPass::Albedo)?;
//! let params = dataset.parameters(0)?;
//! ```

use crate::occupancy::OccupancyTable;
use crate::params::{SampleParameters, PARAMETER_WIDTH};
use crate::RenderPass;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Index format version.
pub const DATASET_VERSION: &str = "1.0";

pub const METADATA_FILE: &str = "metadata.json";
pub const INDEX_FILE: &str = "index.json";

/// Key used in [`SampleRecord::files`] for the occupancy visualisation render.
pub const VIZ_OCCUPANCY_KEY: &str = "viz_occupancy";

/// Error type for dataset loading
#[derive(Error, Debug)]
pub enum DatasetError {
    #[error("dataset directory not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("invalid metadata: {0}")]
    InvalidMetadata(String),

    #[error("sample {0} not in index")]
    SampleNotFound(usize),

    /// The sample exists but has no output of this kind
    #[error("sample {index} has no {output} output")]
    MissingOutput { index: usize, output: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
}

/// Which driver loop produced the dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatasetKind {
    /// Orthographic DEM renders, one image per pass per sample
    Dem,
    /// Perspective model renders with occupancy tables
    Occupancy,
}

/// Dataset-level description
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetMetadata {
    pub version: String,
    pub kind: DatasetKind,
    /// Elevation rasters or model files used
    pub objects: Vec<String>,
    /// Samples per object
    pub repeat: usize,
    pub sample_count: usize,
    pub passes: Vec<RenderPass>,
    pub resolution: [u32; 2],
    /// Parameter array the samples were drawn from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameter_file: Option<String>,
    /// Occupancy points per sample
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub occupancy_points: Option<usize>,
}

/// Metadata for a single sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleRecord {
    /// Sample index; also the prefix of its DEM output files
    pub index: usize,
    pub object: String,
    pub repeat_index: usize,
    /// Persisted parameter row the sample was posed with
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<[f64; PARAMETER_WIDTH]>,
    pub camera_position: [f32; 3],
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sun_direction: Option<[f32; 3]>,
    /// Output file per pass name, relative to the dataset root
    pub files: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub occupancy_file: Option<String>,
}

impl SampleRecord {
    pub fn file(&self, key: &str) -> Option<&str> {
        self.files.get(key).map(String::as_str)
    }
}

/// Write `metadata.json` and `index.json` under `root`.
pub fn write_index<P: AsRef<Path>>(
    root: P,
    metadata: &DatasetMetadata,
    records: &[SampleRecord],
) -> Result<(), DatasetError> {
    let root = root.as_ref();
    fs::create_dir_all(root)?;
    fs::write(
        root.join(METADATA_FILE),
        serde_json::to_string_pretty(metadata)?,
    )?;
    fs::write(root.join(INDEX_FILE), serde_json::to_string_pretty(records)?)?;
    Ok(())
}

/// A rendered dataset loaded from disk
pub struct Dataset {
    root: PathBuf,
    pub metadata: DatasetMetadata,
    records: Vec<SampleRecord>,
}

impl Dataset {
    /// Load a dataset directory written by a driver run
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, DatasetError> {
        let root = path.as_ref().to_path_buf();

        if !root.exists() {
            return Err(DatasetError::NotFound(root));
        }

        let metadata_path = root.join(METADATA_FILE);
        if !metadata_path.exists() {
            return Err(DatasetError::InvalidMetadata(format!(
                "{} not found",
                METADATA_FILE
            )));
        }
        let metadata: DatasetMetadata = serde_json::from_str(&fs::read_to_string(&metadata_path)?)?;

        let index_path = root.join(INDEX_FILE);
        let records: Vec<SampleRecord> = if index_path.exists() {
            serde_json::from_str(&fs::read_to_string(&index_path)?)?
        } else {
            Vec::new()
        };

        Ok(Self {
            root,
            metadata,
            records,
        })
    }

    /// Check if a dataset exists at the given path
    pub fn exists<P: AsRef<Path>>(path: P) -> bool {
        let root = path.as_ref();
        root.exists() && root.join(METADATA_FILE).exists()
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn samples(&self) -> &[SampleRecord] {
        &self.records
    }

    pub fn sample(&self, index: usize) -> Result<&SampleRecord, DatasetError> {
        self.records
            .iter()
            .find(|r| r.index == index)
            .ok_or(DatasetError::SampleNotFound(index))
    }

    /// Parameters a DEM sample was rendered with
    pub fn parameters(&self, index: usize) -> Result<SampleParameters, DatasetError> {
        let row = self
            .sample(index)?
            .parameters
            .ok_or_else(|| DatasetError::MissingOutput {
                index,
                output: "parameters".to_string(),
            })?;
        SampleParameters::from_row(index, &row)
            .map_err(|e| DatasetError::InvalidMetadata(e.to_string()))
    }

    /// Absolute path of an indexed output
    pub fn output_path(&self, index: usize, key: &str) -> Result<PathBuf, DatasetError> {
        let file = self
            .sample(index)?
            .file(key)
            .ok_or_else(|| DatasetError::MissingOutput {
                index,
                output: key.to_string(),
            })?;
        Ok(self.root.join(file))
    }

    /// Decode one pass image as RGBA
    pub fn pass_image(&self, index: usize, pass: RenderPass) -> Result<image::RgbaImage, DatasetError> {
        let path = self.output_path(index, pass.as_str())?;
        Ok(image::open(path)?.to_rgba8())
    }

    pub fn occupancy(&self, index: usize) -> Result<OccupancyTable, DatasetError> {
        let file = self
            .sample(index)?
            .occupancy_file
            .as_ref()
            .ok_or_else(|| DatasetError::MissingOutput {
                index,
                output: "occupancy".to_string(),
            })?;
        Ok(OccupancyTable::load(self.root.join(file))?)
    }

    /// Indexed outputs that are not on disk
    pub fn missing_files(&self) -> Vec<PathBuf> {
        self.records
            .iter()
            .flat_map(|r| r.files.values().chain(r.occupancy_file.iter()))
            .map(|file| self.root.join(file))
            .filter(|path| !path.exists())
            .collect()
    }
}
