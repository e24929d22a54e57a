//! Camera framing, sun placement and camera-relative coordinates.
//!
//! World space is Z-up. A camera looks down its local -Z with local +Y as up, so after
//! [`world_to_camera`] camera-right is +X, camera-up is +Y and everything in front of the
//! lens has negative Z.

use crate::bbox::BoundingBox;
use crate::error::ConfigError;
use bevy::prelude::{Mat4, Quat, Transform, Vec3};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::f32::consts::{FRAC_PI_2, TAU};

/// Horizontal and vertical field of view of the host's default 50mm lens on a 36mm
/// sensor, in radians.
pub const DEFAULT_FOV: f32 = 0.691_111_16;

/// Camera projection and its intrinsic parameters.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Projection {
    /// Field of view angles in radians
    Perspective { fov_x: f32, fov_y: f32 },
    /// Full width of the view volume in world units
    Orthographic { scale: f32 },
}

impl Default for Projection {
    fn default() -> Self {
        Projection::Perspective {
            fov_x: DEFAULT_FOV,
            fov_y: DEFAULT_FOV,
        }
    }
}

impl Projection {
    pub fn orthographic(scale: f32) -> Self {
        Projection::Orthographic { scale }
    }

    /// Narrower of the two view angles; `None` for orthographic cameras.
    pub fn min_fov(&self) -> Option<f32> {
        match self {
            Projection::Perspective { fov_x, fov_y } => Some(fov_x.min(*fov_y)),
            Projection::Orthographic { .. } => None,
        }
    }
}

/// Limits for random camera placement around a target box.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CameraFraming {
    /// Absolute camera height range
    pub height_limits: (f32, f32),
    /// Multipliers applied to `optimal - min` distance, each offset by the footprint
    pub distance_ratio: (f32, f32),
}

impl Default for CameraFraming {
    fn default() -> Self {
        Self {
            height_limits: (3.0, 15.0),
            distance_ratio: (0.5, 2.0),
        }
    }
}

fn lerp_sample<R: Rng + ?Sized>(rng: &mut R, (low, high): (f32, f32)) -> f32 {
    low + rng.gen::<f32>() * (high - low)
}

impl CameraFraming {
    /// Distance at which the whole box fits inside the narrower view angle.
    pub fn optimal_distance(fov: f32, bbox: &BoundingBox) -> f32 {
        0.5 * bbox.max_extent() / (fov / 2.0).tan()
    }

    /// `(optimal - footprint) * ratio + footprint` for both ratios.
    ///
    /// The range is not corrected: a box wider than it is deep in view can yield
    /// `low > high`, and a point box yields `(0, 0)`.
    pub fn distance_range(&self, fov: f32, bbox: &BoundingBox) -> (f32, f32) {
        let optimal = Self::optimal_distance(fov, bbox);
        let min_distance = bbox.footprint();
        let span = optimal - min_distance;
        (
            span * self.distance_ratio.0 + min_distance,
            span * self.distance_ratio.1 + min_distance,
        )
    }

    /// Random camera position around `bbox`.
    ///
    /// Distance and height are uniform over their limits, azimuth is uniform over
    /// `[0, 2pi)`. The inclination comes from the height above the box centre, and the
    /// offset vector is rotated out from +X and translated by the centre.
    pub fn random_camera_location<R: Rng + ?Sized>(
        &self,
        projection: &Projection,
        bbox: &BoundingBox,
        rng: &mut R,
    ) -> Result<Vec3, ConfigError> {
        let fov = projection.min_fov().ok_or_else(|| {
            ConfigError::InvalidFraming("framing needs a perspective camera".to_string())
        })?;
        let range = self.distance_range(fov, bbox);
        if !(range.0 > 0.0 && range.1 > 0.0 && range.0.is_finite() && range.1.is_finite()) {
            return Err(ConfigError::InvalidFraming(format!(
                "distance range ({}, {}) is not positive",
                range.0, range.1
            )));
        }

        let distance = lerp_sample(rng, range);
        let height = lerp_sample(rng, self.height_limits);
        let azimuth = rng.gen_range(0.0..TAU);
        let center = bbox.center();
        let inclination = ((height - center.z) / distance).atan();

        Ok(rotate_out(distance, inclination, azimuth) + center)
    }
}

/// `(distance, 0, 0)` rotated by Euler `(0, -inclination, azimuth)`.
///
/// Positive inclination lifts the vector above the XY plane, azimuth turns it from +X
/// toward +Y.
pub fn rotate_out(distance: f32, inclination: f32, azimuth: f32) -> Vec3 {
    let rotation = Quat::from_rotation_z(azimuth) * Quat::from_rotation_y(-inclination);
    rotation * Vec3::new(distance, 0.0, 0.0)
}

/// Random unit sun direction above the horizon.
///
/// Inclination is uniform over `[min_inclination, pi/2]` (radians), azimuth over
/// `[0, 2pi)`.
pub fn random_sun_direction<R: Rng + ?Sized>(rng: &mut R, min_inclination: f32) -> Vec3 {
    let inclination = lerp_sample(rng, (min_inclination, FRAC_PI_2));
    let azimuth = rng.gen_range(0.0..TAU);
    rotate_out(1.0, inclination, azimuth)
}

/// Rotation that aims local -Z from `eye` at `target` with local +Y kept toward world +Z.
pub fn look_rotation(eye: Vec3, target: Vec3) -> Quat {
    Transform::from_translation(eye)
        .looking_at(target, Vec3::Z)
        .rotation
}

/// Camera placed at `eye` and aimed at `target`.
pub fn camera_transform(eye: Vec3, target: Vec3) -> Transform {
    Transform::from_translation(eye).looking_at(target, Vec3::Z)
}

/// Inverse of the camera's world matrix.
pub fn world_to_camera(camera: &Transform) -> Mat4 {
    camera.compute_matrix().inverse()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn approx(a: Vec3, b: Vec3, eps: f32) -> bool {
        (a - b).length() < eps
    }

    fn tree_box() -> BoundingBox {
        BoundingBox::new(Vec3::new(-2.0, -2.0, 0.0), Vec3::new(2.0, 2.0, 8.0))
    }

    #[test]
    fn test_default_projection_fov() {
        let fov = Projection::default().min_fov().unwrap();
        assert!((fov - 2.0 * (18.0f32 / 50.0).atan()).abs() < 1e-5);
        assert!(Projection::orthographic(256.0).min_fov().is_none());
    }

    #[test]
    fn test_distance_range() {
        let framing = CameraFraming::default();
        let bbox = tree_box();
        let fov = DEFAULT_FOV;
        let optimal = 0.5 * 8.0 / (fov / 2.0).tan();
        let (low, high) = framing.distance_range(fov, &bbox);
        assert!((low - ((optimal - 4.0) * 0.5 + 4.0)).abs() < 1e-4);
        assert!((high - ((optimal - 4.0) * 2.0 + 4.0)).abs() < 1e-4);
    }

    #[test]
    fn test_random_camera_within_distance_range() {
        let framing = CameraFraming::default();
        let bbox = tree_box();
        let projection = Projection::default();
        let (low, high) = framing.distance_range(DEFAULT_FOV, &bbox);
        let mut rng = StdRng::seed_from_u64(3);

        for _ in 0..200 {
            let eye = framing
                .random_camera_location(&projection, &bbox, &mut rng)
                .unwrap();
            let distance = (eye - bbox.center()).length();
            assert!(distance >= low.min(high) - 1e-3 && distance <= low.max(high) + 1e-3);
        }
    }

    #[test]
    fn test_degenerate_box_is_rejected() {
        let framing = CameraFraming::default();
        let point = BoundingBox::new(Vec3::ONE, Vec3::ONE);
        assert_eq!(framing.distance_range(DEFAULT_FOV, &point), (0.0, 0.0));

        let mut rng = StdRng::seed_from_u64(0);
        let err = framing
            .random_camera_location(&Projection::default(), &point, &mut rng)
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidFraming(_)));
    }

    #[test]
    fn test_orthographic_framing_is_rejected() {
        let mut rng = StdRng::seed_from_u64(0);
        let result = CameraFraming::default().random_camera_location(
            &Projection::orthographic(256.0),
            &tree_box(),
            &mut rng,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_rotate_out() {
        assert!(approx(rotate_out(2.0, 0.0, 0.0), Vec3::new(2.0, 0.0, 0.0), 1e-6));
        assert!(approx(rotate_out(1.0, FRAC_PI_2, 0.0), Vec3::Z, 1e-6));
        assert!(approx(
            rotate_out(1.0, 0.0, FRAC_PI_2),
            Vec3::Y,
            1e-6
        ));
    }

    #[test]
    fn test_random_sun_above_min_inclination() {
        let mut rng = StdRng::seed_from_u64(11);
        let min = 30f32.to_radians();
        for _ in 0..200 {
            let sun = random_sun_direction(&mut rng, min);
            assert!((sun.length() - 1.0).abs() < 1e-5);
            // Elevation above the horizon is at least the minimum inclination
            assert!(sun.z >= min.sin() - 1e-5);
        }
    }

    #[test]
    fn test_look_rotation_aims_minus_z() {
        let eye = Vec3::new(10.0, -4.0, 6.0);
        let target = Vec3::new(1.0, 2.0, 3.0);
        let forward = look_rotation(eye, target) * Vec3::NEG_Z;
        assert!(approx(forward, (target - eye).normalize(), 1e-5));
        // Up stays on the world-up side
        let up = look_rotation(eye, target) * Vec3::Y;
        assert!(up.z > 0.0);
    }

    #[test]
    fn test_look_straight_down_does_not_panic() {
        let transform = camera_transform(Vec3::new(0.0, 0.0, 128.0), Vec3::ZERO);
        let forward = transform.rotation * Vec3::NEG_Z;
        assert!(approx(forward, Vec3::NEG_Z, 1e-5));
    }

    #[test]
    fn test_target_maps_to_negative_depth() {
        let bbox = tree_box();
        let mut rng = StdRng::seed_from_u64(5);
        let framing = CameraFraming::default();
        for _ in 0..20 {
            let eye = framing
                .random_camera_location(&Projection::default(), &bbox, &mut rng)
                .unwrap();
            let camera = camera_transform(eye, bbox.center());
            let distance = (eye - bbox.center()).length();
            let local = world_to_camera(&camera).transform_point3(bbox.center());
            assert!(approx(local, Vec3::new(0.0, 0.0, -distance), 1e-3));
        }
    }
}
