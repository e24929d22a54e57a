//! Elevation/texture raster pairing.
//!
//! Two directories hold the inputs: one with elevation rasters, one with the matching
//! texture rasters. Files are paired by position after sorting both listings by file
//! name, so the two directories must use names that sort identically.

use crate::error::AssetError;
use bevy::log::info;
use std::fs;
use std::path::{Path, PathBuf};

/// One elevation raster and its texture.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AssetPair {
    pub dem: PathBuf,
    pub texture: PathBuf,
}

impl AssetPair {
    /// File stem of the elevation raster, e.g. `tile_01` for `dems/tile_01.tif`.
    pub fn name(&self) -> String {
        self.dem
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Sorted, paired raster listing.
#[derive(Clone, Debug, Default)]
pub struct AssetCatalog {
    pairs: Vec<AssetPair>,
}

fn list_files(dir: &Path) -> Result<Vec<PathBuf>, AssetError> {
    if !dir.is_dir() {
        return Err(AssetError::DirectoryNotFound(dir.to_path_buf()));
    }
    let listing = |source| AssetError::Listing {
        path: dir.to_path_buf(),
        source,
    };
    let mut files = Vec::new();
    for entry in fs::read_dir(dir).map_err(listing)? {
        let path = entry.map_err(listing)?.path();
        let hidden = path
            .file_name()
            .is_some_and(|name| name.to_string_lossy().starts_with('.'));
        if path.is_file() && !hidden {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

impl AssetCatalog {
    /// List both directories, sort, keep the first `max_load` of each, and pair them.
    ///
    /// Truncation happens after sorting, so the same files are selected on every run.
    /// `max_load` of `None` or `Some(0)` keeps everything.
    pub fn scan<P: AsRef<Path>, Q: AsRef<Path>>(
        dem_root: P,
        texture_root: Q,
        max_load: Option<usize>,
    ) -> Result<Self, AssetError> {
        let mut dems = list_files(dem_root.as_ref())?;
        let mut textures = list_files(texture_root.as_ref())?;

        if let Some(max) = max_load.filter(|&max| max > 0) {
            dems.truncate(max);
            textures.truncate(max);
        }
        if dems.len() != textures.len() {
            return Err(AssetError::CountMismatch {
                dems: dems.len(),
                textures: textures.len(),
            });
        }

        info!(
            "Found {} elevation/texture pairs in {}",
            dems.len(),
            dem_root.as_ref().display()
        );
        Ok(Self::from_pairs(
            dems.into_iter()
                .zip(textures)
                .map(|(dem, texture)| AssetPair { dem, texture })
                .collect(),
        ))
    }

    pub fn from_pairs(pairs: Vec<AssetPair>) -> Self {
        Self { pairs }
    }

    pub fn get(&self, index: usize) -> Result<&AssetPair, AssetError> {
        self.pairs.get(index).ok_or(AssetError::IndexOutOfRange {
            index,
            len: self.pairs.len(),
        })
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AssetPair> {
        self.pairs.iter()
    }
}
