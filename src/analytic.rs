//! In-memory host made of spheres.
//!
//! [`AnalyticScene`] implements the whole [`SceneHost`] contract without an external
//! application. Geometry is limited to spheres, which is enough to answer bounding box and
//! ray queries exactly. Render calls are recorded (with the lighting and camera state at
//! the time of the call) instead of producing images.
//!
//! Model and elevation "files" are resolved through a registry: register the spheres a
//! path stands for, then import it like a real asset. The registry can also be read from
//! a JSON scene file:
//!
//! ```json
//! { "models": { "models/tree.blend": [ { "center": [0, 0, 4], "radius": 2 } ] } }
//! ```

use crate::backend::RenderSettings;
use crate::bbox::BoundingBox;
use crate::camera::Projection;
use crate::error::{HostError, PipelineError};
use crate::host::{ObjectId, ObjectKind, RayCaster, RayHit, RenderRequest, SceneHost};
use bevy::log::debug;
use bevy::prelude::{Transform, Vec3};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

/// Sphere in object-local coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Sphere {
    pub center: Vec3,
    pub radius: f32,
}

impl Sphere {
    pub fn new(center: Vec3, radius: f32) -> Self {
        Self { center, radius }
    }

    pub fn contains(&self, point: Vec3) -> bool {
        point.distance_squared(self.center) < self.radius * self.radius
    }

    pub fn bounding_box(&self) -> BoundingBox {
        BoundingBox::new(
            self.center - Vec3::splat(self.radius),
            self.center + Vec3::splat(self.radius),
        )
    }

    /// Nearest positive ray parameter `t` with `origin + t * direction` on the surface.
    ///
    /// A ray starting inside the sphere hits the far side.
    pub fn intersect(&self, origin: Vec3, direction: Vec3) -> Option<f32> {
        let a = direction.length_squared();
        if a <= f32::EPSILON {
            return None;
        }
        let oc = origin - self.center;
        let half_b = oc.dot(direction);
        let c = oc.length_squared() - self.radius * self.radius;
        let discriminant = half_b * half_b - a * c;
        if discriminant < 0.0 {
            return None;
        }
        let root = discriminant.sqrt();
        let near = (-half_b - root) / a;
        let far = (-half_b + root) / a;
        [near, far].into_iter().find(|t| *t > 1e-6)
    }

    fn transformed(&self, transform: &Transform) -> Sphere {
        Sphere {
            center: transform.transform_point(self.center),
            radius: self.radius * transform.scale.abs().max_element(),
        }
    }
}

#[derive(Clone, Debug)]
struct SceneObject {
    kind: ObjectKind,
    transform: Transform,
    visible: bool,
    geometry: Option<Sphere>,
    projection: Option<Projection>,
    light: Option<(f32, f32)>,
    occupied: Option<bool>,
}

impl SceneObject {
    fn new(kind: ObjectKind) -> Self {
        Self {
            kind,
            transform: Transform::IDENTITY,
            visible: true,
            geometry: None,
            projection: None,
            light: None,
            occupied: None,
        }
    }

    fn world_sphere(&self) -> Option<Sphere> {
        self.geometry.map(|s| s.transformed(&self.transform))
    }
}

/// On-disk registry: asset path to the spheres it stands for.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SceneFile {
    pub models: BTreeMap<PathBuf, Vec<Sphere>>,
}

/// Scene state captured at a render call.
#[derive(Clone, Debug, PartialEq)]
pub struct RenderRecord {
    pub request: RenderRequest,
    pub camera: Transform,
    pub world_strength: f32,
    /// Energy of every sun, in creation order
    pub sun_energy: Vec<f32>,
    pub visible_meshes: usize,
    pub visible_markers: usize,
}

/// Sphere-only scene host.
#[derive(Debug, Default)]
pub struct AnalyticScene {
    next_id: u64,
    objects: BTreeMap<ObjectId, SceneObject>,
    registry: HashMap<PathBuf, Vec<Sphere>>,
    textures: HashMap<ObjectId, PathBuf>,
    world_strength: f32,
    settings: Option<RenderSettings>,
    renders: Vec<RenderRecord>,
}

impl AnalyticScene {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `path` importable as the given spheres (one mesh object per sphere).
    pub fn register_model(&mut self, path: impl AsRef<Path>, spheres: Vec<Sphere>) {
        self.registry.insert(path.as_ref().to_path_buf(), spheres);
    }

    /// Build a scene whose registry comes from a JSON [`SceneFile`].
    pub fn from_scene_file<P: AsRef<Path>>(path: P) -> Result<Self, PipelineError> {
        let json = fs::read_to_string(path.as_ref())?;
        let file: SceneFile = serde_json::from_str(&json)?;
        let mut scene = Self::new();
        for (model, spheres) in file.models {
            scene.register_model(model, spheres);
        }
        Ok(scene)
    }

    /// Add a mesh directly, bypassing the registry.
    pub fn add_sphere(&mut self, sphere: Sphere) -> ObjectId {
        let mut object = SceneObject::new(ObjectKind::Mesh);
        object.geometry = Some(sphere);
        self.insert(object)
    }

    pub fn renders(&self) -> &[RenderRecord] {
        &self.renders
    }

    pub fn settings(&self) -> Option<&RenderSettings> {
        self.settings.as_ref()
    }

    pub fn world_strength(&self) -> f32 {
        self.world_strength
    }

    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    pub fn objects_of_kind(&self, kind: ObjectKind) -> Vec<ObjectId> {
        self.objects
            .iter()
            .filter(|(_, o)| o.kind == kind)
            .map(|(id, _)| *id)
            .collect()
    }

    pub fn transform(&self, object: ObjectId) -> Result<Transform, HostError> {
        Ok(self.get(object)?.transform)
    }

    pub fn texture(&self, object: ObjectId) -> Option<&Path> {
        self.textures.get(&object).map(PathBuf::as_path)
    }

    pub fn projection(&self, camera: ObjectId) -> Result<Projection, HostError> {
        self.get(camera)?
            .projection
            .ok_or(HostError::UnknownObject(camera))
    }

    /// `(energy, size)` of a sun.
    pub fn sun_state(&self, sun: ObjectId) -> Result<(f32, f32), HostError> {
        self.get(sun)?.light.ok_or(HostError::UnknownObject(sun))
    }

    /// Occupancy label a marker was created with.
    pub fn marker_label(&self, marker: ObjectId) -> Result<bool, HostError> {
        self.get(marker)?
            .occupied
            .ok_or(HostError::UnknownObject(marker))
    }

    fn insert(&mut self, object: SceneObject) -> ObjectId {
        let id = ObjectId(self.next_id);
        self.next_id += 1;
        self.objects.insert(id, object);
        id
    }

    fn get(&self, id: ObjectId) -> Result<&SceneObject, HostError> {
        self.objects.get(&id).ok_or(HostError::UnknownObject(id))
    }

    fn get_mut(&mut self, id: ObjectId) -> Result<&mut SceneObject, HostError> {
        self.objects.get_mut(&id).ok_or(HostError::UnknownObject(id))
    }

    fn import_registered(&mut self, path: &Path) -> Result<Vec<ObjectId>, HostError> {
        let spheres = self
            .registry
            .get(path)
            .cloned()
            .ok_or_else(|| HostError::ImportFailed {
                path: path.to_path_buf(),
                reason: "no geometry registered for this path".to_string(),
            })?;
        Ok(spheres
            .into_iter()
            .map(|sphere| self.add_sphere(sphere))
            .collect())
    }
}

impl RayCaster for AnalyticScene {
    fn ray_cast(
        &self,
        origin: Vec3,
        direction: Vec3,
        max_distance: Option<f32>,
    ) -> Result<Option<RayHit>, HostError> {
        let length = direction.length();
        if length <= f32::EPSILON {
            return Ok(None);
        }
        let unit = direction / length;

        let mut best: Option<RayHit> = None;
        for (id, object) in &self.objects {
            if object.kind != ObjectKind::Mesh || !object.visible {
                continue;
            }
            let Some(sphere) = object.world_sphere() else {
                continue;
            };
            let Some(t) = sphere.intersect(origin, unit) else {
                continue;
            };
            if max_distance.is_some_and(|max| t > max) {
                continue;
            }
            if best.is_some_and(|hit| hit.distance <= t) {
                continue;
            }
            let point = origin + unit * t;
            best = Some(RayHit {
                point,
                normal: (point - sphere.center).normalize_or_zero(),
                object: *id,
                distance: t,
            });
        }
        Ok(best)
    }
}

impl SceneHost for AnalyticScene {
    fn configure(&mut self, settings: &RenderSettings) -> Result<(), HostError> {
        self.settings = Some(settings.clone());
        Ok(())
    }

    fn create_camera(&mut self, projection: Projection, _clip_end: f32) -> Result<ObjectId, HostError> {
        let mut camera = SceneObject::new(ObjectKind::Camera);
        camera.projection = Some(projection);
        Ok(self.insert(camera))
    }

    fn create_sun(&mut self, energy: f32, size: f32) -> Result<ObjectId, HostError> {
        let mut sun = SceneObject::new(ObjectKind::Light);
        sun.light = Some((energy, size));
        Ok(self.insert(sun))
    }

    fn set_sun(&mut self, sun: ObjectId, energy: f32, size: f32) -> Result<(), HostError> {
        let object = self.get_mut(sun)?;
        if object.kind != ObjectKind::Light {
            return Err(HostError::UnknownObject(sun));
        }
        object.light = Some((energy, size));
        Ok(())
    }

    fn set_world_lighting(&mut self, strength: f32) -> Result<(), HostError> {
        self.world_strength = strength;
        Ok(())
    }

    fn import_elevation(&mut self, path: &Path) -> Result<Vec<ObjectId>, HostError> {
        self.import_registered(path)
    }

    fn apply_texture(&mut self, target: ObjectId, path: &Path) -> Result<(), HostError> {
        self.get(target)?;
        self.textures.insert(target, path.to_path_buf());
        Ok(())
    }

    fn import_model(&mut self, path: &Path) -> Result<Vec<ObjectId>, HostError> {
        self.import_registered(path)
    }

    fn create_sphere(&mut self, center: Vec3, radius: f32) -> Result<ObjectId, HostError> {
        Ok(self.add_sphere(Sphere::new(center, radius)))
    }

    fn add_marker(&mut self, position: Vec3, size: f32, occupied: bool) -> Result<ObjectId, HostError> {
        let mut marker = SceneObject::new(ObjectKind::Marker);
        marker.transform = Transform::from_translation(position).with_scale(Vec3::splat(size));
        marker.occupied = Some(occupied);
        Ok(self.insert(marker))
    }

    fn set_transform(&mut self, object: ObjectId, transform: &Transform) -> Result<(), HostError> {
        self.get_mut(object)?.transform = *transform;
        Ok(())
    }

    fn set_visible(&mut self, object: ObjectId, visible: bool) -> Result<(), HostError> {
        self.get_mut(object)?.visible = visible;
        Ok(())
    }

    fn object_kind(&self, object: ObjectId) -> Result<ObjectKind, HostError> {
        Ok(self.get(object)?.kind)
    }

    fn is_visible(&self, object: ObjectId) -> Result<bool, HostError> {
        Ok(self.get(object)?.visible)
    }

    fn bounding_box(&self, object: ObjectId) -> Result<Option<BoundingBox>, HostError> {
        Ok(self.get(object)?.world_sphere().map(|s| s.bounding_box()))
    }

    fn render(&mut self, request: &RenderRequest) -> Result<(), HostError> {
        let camera = self.get(request.camera)?;
        if camera.kind != ObjectKind::Camera {
            return Err(HostError::RenderFailed {
                path: request.output.clone(),
                reason: format!("{} is not a camera", request.camera),
            });
        }
        let camera = camera.transform;

        let visible = |kind: ObjectKind| {
            self.objects
                .values()
                .filter(|o| o.kind == kind && o.visible)
                .count()
        };
        let record = RenderRecord {
            request: request.clone(),
            camera,
            world_strength: self.world_strength,
            sun_energy: self
                .objects
                .values()
                .filter_map(|o| o.light.map(|(energy, _)| energy))
                .collect(),
            visible_meshes: visible(ObjectKind::Mesh),
            visible_markers: visible(ObjectKind::Marker),
        };
        debug!("Recorded {} render to {}", request.pass, request.output.display());
        self.renders.push(record);
        Ok(())
    }

    fn delete(&mut self, objects: &[ObjectId]) -> Result<(), HostError> {
        for id in objects {
            self.get(*id)?;
        }
        for id in objects {
            self.objects.remove(id);
            self.textures.remove(id);
        }
        Ok(())
    }
}
