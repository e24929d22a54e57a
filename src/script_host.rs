//! Host that records a replayable command script.
//!
//! [`ScriptHost`] accepts every [`SceneHost`] call, assigns object handles itself and
//! appends one [`HostCommand`] per call. The resulting JSON script is replayed inside the
//! 3D application by a thin shim that maps handles to the objects it creates.
//!
//! Queries that need real geometry (bounding boxes, ray casts) cannot be answered ahead
//! of time and return [`HostError::Unsupported`]. Imports are assumed to create exactly
//! one mesh; the shim is responsible for failing the replay otherwise.

use crate::backend::RenderSettings;
use crate::bbox::BoundingBox;
use crate::camera::Projection;
use crate::error::{HostError, PipelineError};
use crate::host::{ObjectId, ObjectKind, RayCaster, RayHit, RenderRequest, SceneHost};
use crate::{RenderPass, Resolution};
use bevy::prelude::{Transform, Vec3};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Script format version written to every file.
pub const SCRIPT_VERSION: &str = "1.0";

/// One recorded host call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum HostCommand {
    Configure {
        settings: RenderSettings,
    },
    CreateCamera {
        id: ObjectId,
        projection: Projection,
        clip_end: f32,
    },
    CreateSun {
        id: ObjectId,
        energy: f32,
        size: f32,
    },
    SetSun {
        id: ObjectId,
        energy: f32,
        size: f32,
    },
    SetWorldLighting {
        strength: f32,
    },
    ImportElevation {
        id: ObjectId,
        path: PathBuf,
    },
    ApplyTexture {
        target: ObjectId,
        path: PathBuf,
    },
    ImportModel {
        id: ObjectId,
        path: PathBuf,
    },
    CreateSphere {
        id: ObjectId,
        center: [f32; 3],
        radius: f32,
    },
    AddMarker {
        id: ObjectId,
        position: [f32; 3],
        size: f32,
        occupied: bool,
    },
    SetTransform {
        id: ObjectId,
        translation: [f32; 3],
        /// Quaternion `[x, y, z, w]`
        rotation: [f32; 4],
        scale: [f32; 3],
    },
    SetVisible {
        id: ObjectId,
        visible: bool,
    },
    Render {
        pass: RenderPass,
        resolution: Resolution,
        output: PathBuf,
        camera: ObjectId,
    },
    Delete {
        ids: Vec<ObjectId>,
    },
}

#[derive(Debug, Serialize, Deserialize)]
struct ScriptFile {
    version: String,
    commands: Vec<HostCommand>,
}

/// Command-recording scene host.
#[derive(Debug, Default)]
pub struct ScriptHost {
    next_id: u64,
    objects: BTreeMap<ObjectId, (ObjectKind, bool)>,
    commands: Vec<HostCommand>,
}

impl ScriptHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn commands(&self) -> &[HostCommand] {
        &self.commands
    }

    /// Number of render calls recorded so far.
    pub fn render_count(&self) -> usize {
        self.commands
            .iter()
            .filter(|c| matches!(c, HostCommand::Render { .. }))
            .count()
    }

    /// Handles that are currently alive.
    pub fn live_objects(&self) -> Vec<ObjectId> {
        self.objects.keys().copied().collect()
    }

    /// Write the script as pretty JSON, creating parent directories.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), PipelineError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let file = ScriptFile {
            version: SCRIPT_VERSION.to_string(),
            commands: self.commands.clone(),
        };
        fs::write(path, serde_json::to_string_pretty(&file)?)?;
        Ok(())
    }

    /// Read back the commands of a saved script.
    pub fn load_commands<P: AsRef<Path>>(path: P) -> Result<Vec<HostCommand>, PipelineError> {
        let json = fs::read_to_string(path)?;
        let file: ScriptFile = serde_json::from_str(&json)?;
        Ok(file.commands)
    }

    fn allocate(&mut self, kind: ObjectKind) -> ObjectId {
        let id = ObjectId(self.next_id);
        self.next_id += 1;
        self.objects.insert(id, (kind, true));
        id
    }

    fn check(&self, id: ObjectId) -> Result<(ObjectKind, bool), HostError> {
        self.objects
            .get(&id)
            .copied()
            .ok_or(HostError::UnknownObject(id))
    }
}

impl RayCaster for ScriptHost {
    fn ray_cast(
        &self,
        _origin: Vec3,
        _direction: Vec3,
        _max_distance: Option<f32>,
    ) -> Result<Option<RayHit>, HostError> {
        Err(HostError::Unsupported {
            operation: "ray casting",
        })
    }
}

impl SceneHost for ScriptHost {
    fn configure(&mut self, settings: &RenderSettings) -> Result<(), HostError> {
        self.commands.push(HostCommand::Configure {
            settings: settings.clone(),
        });
        Ok(())
    }

    fn create_camera(&mut self, projection: Projection, clip_end: f32) -> Result<ObjectId, HostError> {
        let id = self.allocate(ObjectKind::Camera);
        self.commands.push(HostCommand::CreateCamera {
            id,
            projection,
            clip_end,
        });
        Ok(id)
    }

    fn create_sun(&mut self, energy: f32, size: f32) -> Result<ObjectId, HostError> {
        let id = self.allocate(ObjectKind::Light);
        self.commands.push(HostCommand::CreateSun { id, energy, size });
        Ok(id)
    }

    fn set_sun(&mut self, sun: ObjectId, energy: f32, size: f32) -> Result<(), HostError> {
        match self.check(sun)? {
            (ObjectKind::Light, _) => {
                self.commands.push(HostCommand::SetSun {
                    id: sun,
                    energy,
                    size,
                });
                Ok(())
            }
            _ => Err(HostError::UnknownObject(sun)),
        }
    }

    fn set_world_lighting(&mut self, strength: f32) -> Result<(), HostError> {
        self.commands.push(HostCommand::SetWorldLighting { strength });
        Ok(())
    }

    fn import_elevation(&mut self, path: &Path) -> Result<Vec<ObjectId>, HostError> {
        let id = self.allocate(ObjectKind::Mesh);
        self.commands.push(HostCommand::ImportElevation {
            id,
            path: path.to_path_buf(),
        });
        Ok(vec![id])
    }

    fn apply_texture(&mut self, target: ObjectId, path: &Path) -> Result<(), HostError> {
        self.check(target)?;
        self.commands.push(HostCommand::ApplyTexture {
            target,
            path: path.to_path_buf(),
        });
        Ok(())
    }

    fn import_model(&mut self, path: &Path) -> Result<Vec<ObjectId>, HostError> {
        let id = self.allocate(ObjectKind::Mesh);
        self.commands.push(HostCommand::ImportModel {
            id,
            path: path.to_path_buf(),
        });
        Ok(vec![id])
    }

    fn create_sphere(&mut self, center: Vec3, radius: f32) -> Result<ObjectId, HostError> {
        let id = self.allocate(ObjectKind::Mesh);
        self.commands.push(HostCommand::CreateSphere {
            id,
            center: center.to_array(),
            radius,
        });
        Ok(id)
    }

    fn add_marker(&mut self, position: Vec3, size: f32, occupied: bool) -> Result<ObjectId, HostError> {
        let id = self.allocate(ObjectKind::Marker);
        self.commands.push(HostCommand::AddMarker {
            id,
            position: position.to_array(),
            size,
            occupied,
        });
        Ok(id)
    }

    fn set_transform(&mut self, object: ObjectId, transform: &Transform) -> Result<(), HostError> {
        self.check(object)?;
        self.commands.push(HostCommand::SetTransform {
            id: object,
            translation: transform.translation.to_array(),
            rotation: transform.rotation.to_array(),
            scale: transform.scale.to_array(),
        });
        Ok(())
    }

    fn set_visible(&mut self, object: ObjectId, visible: bool) -> Result<(), HostError> {
        self.check(object)?;
        if let Some(entry) = self.objects.get_mut(&object) {
            entry.1 = visible;
        }
        self.commands.push(HostCommand::SetVisible {
            id: object,
            visible,
        });
        Ok(())
    }

    fn object_kind(&self, object: ObjectId) -> Result<ObjectKind, HostError> {
        Ok(self.check(object)?.0)
    }

    fn is_visible(&self, object: ObjectId) -> Result<bool, HostError> {
        Ok(self.check(object)?.1)
    }

    fn bounding_box(&self, _object: ObjectId) -> Result<Option<BoundingBox>, HostError> {
        Err(HostError::Unsupported {
            operation: "bounding box queries",
        })
    }

    fn render(&mut self, request: &RenderRequest) -> Result<(), HostError> {
        match self.check(request.camera)? {
            (ObjectKind::Camera, _) => {}
            _ => {
                return Err(HostError::RenderFailed {
                    path: request.output.clone(),
                    reason: format!("{} is not a camera", request.camera),
                })
            }
        }
        self.commands.push(HostCommand::Render {
            pass: request.pass,
            resolution: request.resolution,
            output: request.output.clone(),
            camera: request.camera,
        });
        Ok(())
    }

    fn delete(&mut self, objects: &[ObjectId]) -> Result<(), HostError> {
        for id in objects {
            self.check(*id)?;
        }
        for id in objects {
            self.objects.remove(id);
        }
        self.commands.push(HostCommand::Delete {
            ids: objects.to_vec(),
        });
        Ok(())
    }
}
