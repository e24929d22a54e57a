//! Error types.
//!
//! Failures fall into three classes that are surfaced at different points of a run:
//!
//! - [`ConfigError`]: malformed bounds, ranges or arguments. Raised before the host is
//!   touched so a bad invocation never leaves a half-built scene behind.
//! - [`AssetError`]: missing directories, mismatched raster counts, imports that produced
//!   no mesh or more than one candidate mesh.
//! - [`HostError`]: anything the scene host reports (import/render failures, unknown
//!   handles, capabilities it does not provide).
//!
//! [`PipelineError`] wraps all of them for the driver and the binaries.

use crate::host::ObjectId;
use std::path::PathBuf;
use thiserror::Error;

/// Invalid configuration detected before any host interaction.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// Low and high bound lists have different lengths
    #[error("bound `{name}`: low has {low} components but high has {high}")]
    BoundLengthMismatch {
        name: String,
        low: usize,
        high: usize,
    },

    /// A bound list does not match the number of components the quantity has
    #[error("bound `{name}`: expected {expected} components, got {actual}")]
    BoundArity {
        name: String,
        expected: usize,
        actual: usize,
    },

    /// low > high (or a NaN) for one component
    #[error("bound `{name}`: component {component} has low {low} above high {high}")]
    InvertedBound {
        name: String,
        component: usize,
        low: f64,
        high: f64,
    },

    /// A bound whose quantity cannot be negative (sun energy, sun size)
    #[error("bound `{name}`: component {component} has negative low {low}")]
    NegativeBound {
        name: String,
        component: usize,
        low: f64,
    },

    /// `high - low` is not representable, so the range cannot be sampled
    #[error("bound `{name}`: component {component} span {low}..{high} overflows")]
    BoundSpan {
        name: String,
        component: usize,
        low: f64,
        high: f64,
    },

    #[error("n_repeat must be at least 1")]
    ZeroRepeat,

    /// A record count that does not fit in `usize`
    #[error("{name} overflows: {left} x {right}")]
    CountOverflow {
        name: String,
        left: usize,
        right: usize,
    },

    #[error("invalid index range {start}..{finish}")]
    InvalidRange { start: usize, finish: usize },

    /// The run needs more parameter records than the parameter file holds
    #[error("parameter record {index} requested but only {len} records are available")]
    ParameterIndexOutOfRange { index: usize, len: usize },

    /// A persisted parameter row has the wrong number of fields
    #[error("parameter row {row} has {width} fields, expected {expected}")]
    RowWidth {
        row: usize,
        width: usize,
        expected: usize,
    },

    #[error("pad ratio must be a non-negative finite number, got {0}")]
    InvalidPadRatio(f32),

    #[error("camera framing: {0}")]
    InvalidFraming(String),

    #[error("unknown render pass `{0}`")]
    UnknownPass(String),

    #[error("unknown render device `{0}`")]
    UnknownDevice(String),

    #[error("missing required argument {0}")]
    MissingArgument(String),

    #[error("invalid value `{value}` for {flag}")]
    InvalidArgument { flag: String, value: String },
}

/// Problems with the input rasters or with what an import produced.
#[derive(Error, Debug)]
pub enum AssetError {
    #[error("asset directory not found: {}", .0.display())]
    DirectoryNotFound(PathBuf),

    #[error("failed to list {}: {source}", path.display())]
    Listing {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// DEM and texture directories do not pair up one-to-one
    #[error("found {dems} elevation rasters but {textures} texture rasters")]
    CountMismatch { dems: usize, textures: usize },

    #[error("asset index {index} out of range ({len} assets)")]
    IndexOutOfRange { index: usize, len: usize },

    /// Import succeeded but produced no mesh object
    #[error("importing {} produced no mesh object", .0.display())]
    NoMeshImported(PathBuf),

    /// Import produced several meshes where exactly one was expected
    #[error("importing {} produced {count} mesh objects, expected exactly one", path.display())]
    AmbiguousImport { path: PathBuf, count: usize },

    #[error("no visible mesh to compute a bounding box from")]
    NoVisibleMesh,
}

/// Errors reported by (or about) the scene host.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum HostError {
    /// The host does not provide this capability
    #[error("host does not support {operation}")]
    Unsupported { operation: &'static str },

    #[error("unknown object handle {0:?}")]
    UnknownObject(ObjectId),

    #[error("import of {} failed: {reason}", path.display())]
    ImportFailed { path: PathBuf, reason: String },

    #[error("render to {} failed: {reason}", path.display())]
    RenderFailed { path: PathBuf, reason: String },

    #[error("host backend error: {0}")]
    Backend(String),
}

/// Umbrella error for driver runs and the command-line tools.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Asset(#[from] AssetError),

    #[error(transparent)]
    Host(#[from] HostError),

    #[error(transparent)]
    Dataset(#[from] crate::dataset::DatasetError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
}
