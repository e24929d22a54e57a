//! Scene driver: the per-object load, pose, render and cleanup loops.
//!
//! [`SceneDriver`] owns a mutable borrow of a [`SceneHost`] for the whole run, so scene
//! access is strictly sequential: one object is loaded, posed and rendered for all of its
//! samples, then removed before the next one is touched. Every host call blocks until
//! the host is done.
//!
//! Two loops are provided:
//!
//! - [`SceneDriver::run_dem`]: textured elevation rasters under an orthographic camera,
//!   posed from a persisted parameter array, one image per [`RenderPass`]
//! - [`SceneDriver::run_occupancy`]: one model under a randomly framed perspective
//!   camera, with an occupancy table per sample
//!
//! All configuration is validated before the host is touched. Host failures abort the
//! run; outputs of earlier samples stay on disk.
//!
//! # Example
//!
//! ```ignore
//! use dem_synth::driver::{DemRunConfig, SceneDriver};
//!
//! let config = DemRunConfig {
//!     output_dir: "output/normals".into(),
//!     start: 0,
//!     finish: Some(10),
//!     repeat: 10,
//!     ..Default::default()
//! };
//! let summary = SceneDriver::new(&mut host).run_dem(&catalog, &params, &config)?;
//! println!("{} samples, {} renders", summary.samples, summary.renders);
//! ```

use crate::backend::RenderSettings;
use crate::bbox::BoundingBox;
use crate::camera::{camera_transform, random_sun_direction, CameraFraming, Projection};
use crate::catalog::AssetCatalog;
use crate::dataset::{
    write_index, DatasetKind, DatasetMetadata, SampleRecord, DATASET_VERSION, VIZ_OCCUPANCY_KEY,
};
use crate::error::{AssetError, ConfigError, PipelineError};
use crate::host::{ObjectId, ObjectKind, RenderRequest, SceneHost};
use crate::occupancy::{
    classify_points, sample_points, to_camera_frame, OccupancyConfig, OccupancyPoint, OccupancyTable,
};
use crate::params::SampleParameters;
use crate::{RenderPass, Resolution};
use bevy::log::{debug, info};
use bevy::prelude::{Transform, Vec3};
use rand::Rng;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Sun created with the scene, before any sample overrides it.
const INITIAL_SUN: (f32, f32) = (0.5, 0.1);

/// World lighting outside of lighting overrides.
const BASE_WORLD_STRENGTH: f32 = 0.0;

/// Radius of the reference sphere at the origin of DEM scenes.
pub const REFERENCE_SPHERE_RADIUS: f32 = 100.0;

/// Lifecycle of a driver run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DriverState {
    /// Idle, no run in progress
    Idle,
    /// Creating camera and lights
    SettingUp,
    /// Importing an object
    LoadingAssets,
    /// Moving camera, sun and object for a sample
    Posing,
    /// Issuing render calls
    Rendering,
    /// Removing the current object
    Cleanup,
}

/// Configuration for the DEM loop.
#[derive(Clone, Debug)]
pub struct DemRunConfig {
    pub output_dir: PathBuf,
    /// First object index
    pub start: usize,
    /// One past the last object index, `None` for the whole catalog
    pub finish: Option<usize>,
    /// Samples per object
    pub repeat: usize,
    pub settings: RenderSettings,
    pub passes: Vec<RenderPass>,
    /// Recorded in the dataset metadata
    pub parameter_file: Option<String>,
    /// Add a [`REFERENCE_SPHERE_RADIUS`] sphere at the origin before the first object
    pub reference_sphere: bool,
    /// Write `metadata.json` and `index.json` after the run
    pub write_index: bool,
}

impl Default for DemRunConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("output"),
            start: 0,
            finish: None,
            repeat: 10,
            settings: RenderSettings::dem_default(),
            passes: RenderPass::ALL.to_vec(),
            parameter_file: None,
            reference_sphere: true,
            write_index: true,
        }
    }
}

impl DemRunConfig {
    /// Parameter record used for repeat `rep` of object `object`.
    pub fn sample_index(&self, object: usize, rep: usize) -> usize {
        object * self.repeat + rep
    }
}

/// Configuration for the occupancy loop.
#[derive(Clone, Debug)]
pub struct OccupancyRunConfig {
    /// Model file to import
    pub model: PathBuf,
    pub output_dir: PathBuf,
    /// File name prefix of every output
    pub prefix: String,
    /// Rendered samples (`n`)
    pub samples: usize,
    pub occupancy: OccupancyConfig,
    pub framing: CameraFraming,
    pub projection: Projection,
    pub settings: RenderSettings,
    /// Minimum sun elevation in degrees
    pub sun_min_inclination_deg: f32,
    /// Extra render per sample with the model hidden and occupied points as markers
    pub viz_occupancy: bool,
    pub marker_size: f32,
    pub write_index: bool,
}

impl OccupancyRunConfig {
    /// `out` is a path prefix such as `renders/tree`: outputs go next to it and start
    /// with its file name.
    pub fn new(model: impl AsRef<Path>, out: impl AsRef<Path>) -> Self {
        let out = out.as_ref();
        let output_dir = out
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        let prefix = out
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "sample".to_string());
        Self {
            model: model.as_ref().to_path_buf(),
            output_dir,
            prefix,
            samples: 10,
            occupancy: OccupancyConfig::default(),
            framing: CameraFraming::default(),
            projection: Projection::default(),
            settings: RenderSettings::model_default(1024),
            sun_min_inclination_deg: 30.0,
            viz_occupancy: false,
            marker_size: 0.1,
            write_index: true,
        }
    }

    /// `{prefix}_n{n}_k{k}`
    pub fn sample_basename(&self, n: usize) -> String {
        format!("{}_n{}_k{}", self.prefix, n, self.occupancy.samples)
    }
}

/// Outcome of a run.
#[derive(Clone, Debug, Default)]
pub struct RunSummary {
    pub objects: usize,
    pub samples: usize,
    pub renders: usize,
    /// Occupancy points labelled occupied, over all samples
    pub occupied_points: usize,
    pub total_points: usize,
    pub records: Vec<SampleRecord>,
}

fn relative_name(path: &Path) -> String {
    path.file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Drives a scene host through a dataset run.
pub struct SceneDriver<'a, H: SceneHost + ?Sized> {
    host: &'a mut H,
    state: DriverState,
}

impl<'a, H: SceneHost + ?Sized> SceneDriver<'a, H> {
    pub fn new(host: &'a mut H) -> Self {
        Self {
            host,
            state: DriverState::Idle,
        }
    }

    pub fn state(&self) -> DriverState {
        self.state
    }

    pub fn host(&self) -> &H {
        &*self.host
    }

    /// Render every pass of the DEM loop for objects `[start, finish)`.
    ///
    /// Sample `k = i * repeat + rep` of object `i` is posed from `params[k]`: the camera
    /// sits at `ortho_scale / 2` times the record's camera direction and looks at the
    /// origin, the sun is rotated by Euler `(0, phi, theta)` and the object is rotated
    /// about Z. Outputs are `{k}_{pass}.png` in `output_dir`.
    ///
    /// The driver is back in [`DriverState::Idle`] when this returns, on failure too.
    pub fn run_dem(
        &mut self,
        catalog: &AssetCatalog,
        params: &[SampleParameters],
        config: &DemRunConfig,
    ) -> Result<RunSummary, PipelineError> {
        let result = self.dem_loop(catalog, params, config);
        self.state = DriverState::Idle;
        result
    }

    fn dem_loop(
        &mut self,
        catalog: &AssetCatalog,
        params: &[SampleParameters],
        config: &DemRunConfig,
    ) -> Result<RunSummary, PipelineError> {
        if config.repeat == 0 {
            return Err(ConfigError::ZeroRepeat.into());
        }
        let finish = config.finish.unwrap_or(catalog.len());
        if config.start > finish {
            return Err(ConfigError::InvalidRange {
                start: config.start,
                finish,
            }
            .into());
        }
        if finish > catalog.len() {
            return Err(AssetError::IndexOutOfRange {
                index: finish - 1,
                len: catalog.len(),
            }
            .into());
        }
        let needed = finish
            .checked_mul(config.repeat)
            .ok_or_else(|| ConfigError::CountOverflow {
                name: "finish * repeat".to_string(),
                left: finish,
                right: config.repeat,
            })?;
        if config.start < finish && needed > params.len() {
            return Err(ConfigError::ParameterIndexOutOfRange {
                index: needed - 1,
                len: params.len(),
            }
            .into());
        }

        self.state = DriverState::SettingUp;
        let settings = config.settings.resolved();
        info!(
            "Rendering objects {}..{} x {} repeats on {}",
            config.start,
            finish,
            config.repeat,
            settings.device.name()
        );
        fs::create_dir_all(&config.output_dir)?;
        self.host.configure(&settings)?;
        let camera = self
            .host
            .create_camera(Projection::orthographic(settings.ortho_scale), settings.clip_end)?;
        let sun = self.host.create_sun(INITIAL_SUN.0, INITIAL_SUN.1)?;
        self.host.set_world_lighting(BASE_WORLD_STRENGTH)?;
        if config.reference_sphere {
            self.host.create_sphere(Vec3::ZERO, REFERENCE_SPHERE_RADIUS)?;
        }

        let mut summary = RunSummary::default();
        for i in config.start..finish {
            let pair = catalog.get(i)?;

            self.state = DriverState::LoadingAssets;
            let imported = self.host.import_elevation(&pair.dem)?;
            let shape = self.single_mesh(&imported, &pair.dem)?;
            self.host.apply_texture(shape, &pair.texture)?;

            for rep in 0..config.repeat {
                let k = config.sample_index(i, rep);
                let p = &params[k];

                self.state = DriverState::Posing;
                let eye = p.camera_position(settings.camera_radius());
                self.host
                    .set_transform(camera, &camera_transform(eye, Vec3::ZERO))?;
                let sun_transform = Transform::from_translation(p.sun.scaled(settings.camera_radius()))
                    .with_rotation(p.sun_rotation());
                self.host.set_transform(sun, &sun_transform)?;
                let light = (p.sun_energy as f32, p.sun_size as f32);
                self.host.set_sun(sun, light.0, light.1)?;
                self.host
                    .set_transform(shape, &p.object_rotation().to_transform())?;

                self.state = DriverState::Rendering;
                let mut files = BTreeMap::new();
                for pass in &config.passes {
                    let output = config.output_dir.join(pass.file_name(k));
                    self.render_pass(*pass, camera, sun, light, settings.resolution, &output)?;
                    files.insert(pass.as_str().to_string(), relative_name(&output));
                    summary.renders += 1;
                }

                summary.records.push(SampleRecord {
                    index: k,
                    object: pair.name(),
                    repeat_index: rep,
                    parameters: Some(p.to_row()),
                    camera_position: eye.to_array(),
                    sun_direction: Some(p.sun.to_vec3().to_array()),
                    files,
                    occupancy_file: None,
                });
                summary.samples += 1;
                debug!("Rendered sample {} (object {}, repeat {})", k, i, rep);
            }

            self.state = DriverState::Cleanup;
            self.host.delete(&imported)?;
            summary.objects += 1;
            info!("Finished object {} ({})", i, pair.name());
        }

        if config.write_index {
            let metadata = DatasetMetadata {
                version: DATASET_VERSION.to_string(),
                kind: DatasetKind::Dem,
                objects: catalog
                    .iter()
                    .skip(config.start)
                    .take(finish - config.start)
                    .map(|pair| pair.name())
                    .collect(),
                repeat: config.repeat,
                sample_count: summary.samples,
                passes: config.passes.clone(),
                resolution: settings.resolution.to_array(),
                parameter_file: config.parameter_file.clone(),
                occupancy_points: None,
            };
            write_index(&config.output_dir, &metadata, &summary.records)?;
        }

        info!(
            "DEM run complete: {} samples, {} renders",
            summary.samples, summary.renders
        );
        Ok(summary)
    }

    /// Render a model from random viewpoints and label occupancy points for each one.
    ///
    /// The model's visible meshes define a bounding box that is padded once. Every sample
    /// draws a sun direction and a framed camera position, aims the camera at the box
    /// centre, labels points with the camera as the exterior reference and writes
    /// `{basename}_render.png` and `{basename}_occupancy.occ`.
    ///
    /// The driver is back in [`DriverState::Idle`] when this returns, on failure too.
    pub fn run_occupancy<R: Rng + ?Sized>(
        &mut self,
        config: &OccupancyRunConfig,
        rng: &mut R,
    ) -> Result<RunSummary, PipelineError> {
        let result = self.occupancy_loop(config, rng);
        self.state = DriverState::Idle;
        result
    }

    fn occupancy_loop<R: Rng + ?Sized>(
        &mut self,
        config: &OccupancyRunConfig,
        rng: &mut R,
    ) -> Result<RunSummary, PipelineError> {
        if !(config.marker_size.is_finite() && config.marker_size > 0.0) {
            return Err(ConfigError::InvalidArgument {
                flag: "marker_size".to_string(),
                value: config.marker_size.to_string(),
            }
            .into());
        }
        if config.projection.min_fov().is_none() {
            return Err(
                ConfigError::InvalidFraming("framing needs a perspective camera".to_string()).into(),
            );
        }

        self.state = DriverState::SettingUp;
        let settings = config.settings.resolved();
        fs::create_dir_all(&config.output_dir)?;
        self.host.configure(&settings)?;

        self.state = DriverState::LoadingAssets;
        let imported = self.host.import_model(&config.model)?;
        let meshes = self.visible_meshes(&imported)?;
        if meshes.is_empty() {
            return Err(AssetError::NoMeshImported(config.model.clone()).into());
        }
        let bbox = self.union_bbox(&meshes)?.pad(config.occupancy.pad_ratio)?;
        info!(
            "Loaded {} ({} meshes), sampling box {:?}..{:?}",
            config.model.display(),
            meshes.len(),
            bbox.min,
            bbox.max
        );

        let sun = self.host.create_sun(1.0, INITIAL_SUN.1)?;
        let camera = self
            .host
            .create_camera(config.projection, settings.clip_end)?;

        let mut summary = RunSummary {
            objects: 1,
            ..Default::default()
        };
        let target = bbox.center();
        for n in 0..config.samples {
            let basename = config.sample_basename(n);

            self.state = DriverState::Posing;
            let sun_dir = random_sun_direction(rng, config.sun_min_inclination_deg.to_radians());
            self.host
                .set_transform(sun, &camera_transform(sun_dir, Vec3::ZERO))?;
            let eye = config
                .framing
                .random_camera_location(&config.projection, &bbox, rng)?;
            let camera_pose = camera_transform(eye, target);
            self.host.set_transform(camera, &camera_pose)?;

            let points = sample_points(&bbox, config.occupancy.samples, rng);
            let mut labelled = classify_points(&*self.host, &points, eye)?;
            to_camera_frame(&mut labelled, &camera_pose);

            self.state = DriverState::Rendering;
            let mut files = BTreeMap::new();
            let image = config.output_dir.join(format!("{}_render.png", basename));
            self.host.render(&RenderRequest::new(
                RenderPass::Composite,
                settings.resolution,
                &image,
                camera,
            ))?;
            summary.renders += 1;
            files.insert(RenderPass::Composite.as_str().to_string(), relative_name(&image));
            info!("Wrote {}", image.display());

            let table = OccupancyTable::from_points(&labelled);
            let occupancy_path = config.output_dir.join(format!("{}_occupancy.occ", basename));
            table.save(&occupancy_path)?;
            summary.occupied_points += table.occupied_count();
            summary.total_points += table.len();
            info!("Wrote {}", occupancy_path.display());

            if config.viz_occupancy {
                let viz = config
                    .output_dir
                    .join(format!("{}.viz_occupancy.png", basename));
                self.render_occupancy_markers(
                    &meshes,
                    &labelled,
                    config.marker_size,
                    camera,
                    settings.resolution,
                    &viz,
                )?;
                summary.renders += 1;
                files.insert(VIZ_OCCUPANCY_KEY.to_string(), relative_name(&viz));
                info!("Wrote {}", viz.display());
            }

            summary.records.push(SampleRecord {
                index: n,
                object: relative_name(&config.model),
                repeat_index: n,
                parameters: None,
                camera_position: eye.to_array(),
                sun_direction: Some(sun_dir.to_array()),
                files,
                occupancy_file: Some(relative_name(&occupancy_path)),
            });
            summary.samples += 1;
        }

        if config.write_index {
            let metadata = DatasetMetadata {
                version: DATASET_VERSION.to_string(),
                kind: DatasetKind::Occupancy,
                objects: vec![relative_name(&config.model)],
                repeat: config.samples,
                sample_count: summary.samples,
                passes: vec![RenderPass::Composite],
                resolution: settings.resolution.to_array(),
                parameter_file: None,
                occupancy_points: Some(config.occupancy.samples),
            };
            write_index(&config.output_dir, &metadata, &summary.records)?;
        }

        info!(
            "Occupancy run complete: {} samples, {}/{} points occupied",
            summary.samples, summary.occupied_points, summary.total_points
        );
        Ok(summary)
    }

    /// The one mesh among `imported`.
    fn single_mesh(&self, imported: &[ObjectId], path: &Path) -> Result<ObjectId, PipelineError> {
        let mut meshes = Vec::new();
        for id in imported {
            if self.host.object_kind(*id)? == ObjectKind::Mesh {
                meshes.push(*id);
            }
        }
        match meshes.as_slice() {
            [] => Err(AssetError::NoMeshImported(path.to_path_buf()).into()),
            [mesh] => Ok(*mesh),
            _ => Err(AssetError::AmbiguousImport {
                path: path.to_path_buf(),
                count: meshes.len(),
            }
            .into()),
        }
    }

    fn visible_meshes(&self, imported: &[ObjectId]) -> Result<Vec<ObjectId>, PipelineError> {
        let mut meshes = Vec::new();
        for id in imported {
            if self.host.object_kind(*id)? == ObjectKind::Mesh && self.host.is_visible(*id)? {
                meshes.push(*id);
            }
        }
        Ok(meshes)
    }

    fn union_bbox(&self, meshes: &[ObjectId]) -> Result<BoundingBox, PipelineError> {
        let mut boxes = Vec::with_capacity(meshes.len());
        for id in meshes {
            if let Some(bbox) = self.host.bounding_box(*id)? {
                boxes.push(bbox);
            }
        }
        BoundingBox::union_all(&boxes).ok_or_else(|| AssetError::NoVisibleMesh.into())
    }

    /// Render one pass, applying and then reverting its lighting override.
    fn render_pass(
        &mut self,
        pass: RenderPass,
        camera: ObjectId,
        sun: ObjectId,
        light: (f32, f32),
        resolution: Resolution,
        output: &Path,
    ) -> Result<(), PipelineError> {
        let request = RenderRequest::new(pass, resolution, output, camera);
        match pass.lighting_override() {
            Some(ovr) => {
                self.host.set_world_lighting(ovr.world_strength)?;
                self.host.set_sun(sun, ovr.sun_energy, light.1)?;
                let rendered = self.host.render(&request);
                self.host.set_world_lighting(BASE_WORLD_STRENGTH)?;
                self.host.set_sun(sun, light.0, light.1)?;
                rendered?;
            }
            None => self.host.render(&request)?,
        }
        Ok(())
    }

    /// Hide the model, show occupied points as markers, render, then restore the scene.
    fn render_occupancy_markers(
        &mut self,
        model: &[ObjectId],
        points: &[OccupancyPoint],
        marker_size: f32,
        camera: ObjectId,
        resolution: Resolution,
        output: &Path,
    ) -> Result<(), PipelineError> {
        for id in model {
            self.host.set_visible(*id, false)?;
        }
        let mut markers = Vec::new();
        for point in points.iter().filter(|p| p.occupied) {
            markers.push(self.host.add_marker(point.world, marker_size, true)?);
        }
        let rendered = self.host.render(&RenderRequest::new(
            RenderPass::Composite,
            resolution,
            output,
            camera,
        ));
        self.host.delete(&markers)?;
        for id in model {
            self.host.set_visible(*id, true)?;
        }
        rendered?;
        Ok(())
    }
}
