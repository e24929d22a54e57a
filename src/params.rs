//! Randomized per-sample sun, camera and object parameters.
//!
//! Each [`SampleParameters`] record holds everything needed to pose one render:
//! sun direction, energy and size, camera direction on the unit sphere, and the terrain's
//! rotation about the vertical axis. Records are generated in bulk, persisted as fixed
//! width rows of 13 numbers and consumed in order by the scene driver.
//!
//! Row layout:
//!
//! | fields | meaning |
//! |---|---|
//! | 0..5 | sun `x, y, z, phi, theta` (unit sphere, radians) |
//! | 5..7 | sun energy, sun size |
//! | 7..12 | camera `x, y, z, phi, theta` (unit sphere, radians) |
//! | 12 | object rotation about Z in degrees |
//!
//! Nothing here seeds a random source; pass a seeded `StdRng` for reproducible arrays.

use crate::error::{ConfigError, PipelineError};
use crate::spherical::{spherical_to_cartesian, SphericalPoint};
use crate::ObjectRotation;
use bevy::prelude::{Quat, Vec3};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

/// Number of numeric fields in a persisted parameter row.
pub const PARAMETER_WIDTH: usize = 13;

/// One side of a sampling bound: a scalar applied to every component, or one value per
/// component.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Bound {
    Scalar(f64),
    List(Vec<f64>),
}

impl Bound {
    fn len(&self) -> Option<usize> {
        match self {
            Bound::Scalar(_) => None,
            Bound::List(values) => Some(values.len()),
        }
    }

    fn component(&self, index: usize) -> f64 {
        match self {
            Bound::Scalar(value) => *value,
            Bound::List(values) => values[index],
        }
    }
}

impl From<f64> for Bound {
    fn from(value: f64) -> Self {
        Bound::Scalar(value)
    }
}

impl From<Vec<f64>> for Bound {
    fn from(values: Vec<f64>) -> Self {
        Bound::List(values)
    }
}

/// Uniform sampling range `[low, high]`, componentwise for list bounds.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ParameterRange {
    pub low: Bound,
    pub high: Bound,
}

impl ParameterRange {
    pub fn new(low: impl Into<Bound>, high: impl Into<Bound>) -> Self {
        Self {
            low: low.into(),
            high: high.into(),
        }
    }

    /// Resolve into `arity` `(low, high)` pairs.
    ///
    /// Scalars broadcast to every component. Lists must agree in length with each other
    /// and with `arity`; nothing is truncated or padded.
    pub fn resolve(&self, name: &str, arity: usize) -> Result<Vec<(f64, f64)>, ConfigError> {
        if let (Some(low), Some(high)) = (self.low.len(), self.high.len()) {
            if low != high {
                return Err(ConfigError::BoundLengthMismatch {
                    name: name.to_string(),
                    low,
                    high,
                });
            }
        }
        if let Some(actual) = self.low.len().or(self.high.len()) {
            if actual != arity {
                return Err(ConfigError::BoundArity {
                    name: name.to_string(),
                    expected: arity,
                    actual,
                });
            }
        }

        (0..arity)
            .map(|component| {
                let low = self.low.component(component);
                let high = self.high.component(component);
                // Also rejects NaN bounds
                if !(low <= high && high.is_finite() && low.is_finite()) {
                    return Err(ConfigError::InvertedBound {
                        name: name.to_string(),
                        component,
                        low,
                        high,
                    });
                }
                if !(high - low).is_finite() {
                    return Err(ConfigError::BoundSpan {
                        name: name.to_string(),
                        component,
                        low,
                        high,
                    });
                }
                Ok((low, high))
            })
            .collect()
    }

    /// [`resolve`](Self::resolve) for quantities that cannot be negative.
    pub fn resolve_non_negative(
        &self,
        name: &str,
        arity: usize,
    ) -> Result<Vec<(f64, f64)>, ConfigError> {
        let bounds = self.resolve(name, arity)?;
        if let Some((component, &(low, _))) =
            bounds.iter().enumerate().find(|(_, (low, _))| *low < 0.0)
        {
            return Err(ConfigError::NegativeBound {
                name: name.to_string(),
                component,
                low,
            });
        }
        Ok(bounds)
    }
}

fn draw<R: Rng + ?Sized>(rng: &mut R, bounds: &[(f64, f64)]) -> Vec<f64> {
    bounds
        .iter()
        .map(|&(low, high)| rng.gen_range(low..=high))
        .collect()
}

/// Bounds and counts for a parameter array.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ParameterConfig {
    /// Sun `[phi, theta]` in degrees
    pub sun_phi_theta: ParameterRange,
    /// Sun `[energy, size]`
    pub sun_energy_size: ParameterRange,
    /// Camera `[phi, theta]` in degrees
    pub camera_phi_theta: ParameterRange,
    /// Object rotation about Z in degrees
    pub rotation: ParameterRange,
    /// Renders per object
    pub n_repeat: usize,
    /// Number of objects
    pub n_images: usize,
    /// Replace the first record of every repeat block with [`SampleParameters::top_view`]
    pub top_view: bool,
}

impl Default for ParameterConfig {
    fn default() -> Self {
        Self {
            sun_phi_theta: ParameterRange::new(vec![0.0, -180.0], vec![70.0, 180.0]),
            sun_energy_size: ParameterRange::new(vec![2.0, 0.01], vec![5.0, 0.5]),
            camera_phi_theta: ParameterRange::new(vec![0.0, -180.0], vec![35.0, 180.0]),
            rotation: ParameterRange::new(-180.0, 180.0),
            n_repeat: 200,
            n_images: 100,
            top_view: true,
        }
    }
}

impl ParameterConfig {
    /// Total records: `n_repeat * n_images`.
    pub fn sample_count(&self) -> Result<usize, ConfigError> {
        self.n_repeat
            .checked_mul(self.n_images)
            .ok_or_else(|| ConfigError::CountOverflow {
                name: "n_repeat * n_images".to_string(),
                left: self.n_repeat,
                right: self.n_images,
            })
    }
}

/// Parameters for one rendered sample.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SampleParameters {
    /// Sun direction on the unit sphere
    pub sun: SphericalPoint,
    pub sun_energy: f64,
    pub sun_size: f64,
    /// Camera direction on the unit sphere, scaled by the operational radius when posed
    pub camera: SphericalPoint,
    /// Object rotation about the vertical axis, degrees
    pub rotation_deg: f64,
}

impl SampleParameters {
    /// Canonical reference frame: sun and camera straight up, energy 3.0, size 0.1,
    /// no rotation.
    pub fn top_view() -> Self {
        Self {
            sun: SphericalPoint::ZENITH,
            sun_energy: 3.0,
            sun_size: 0.1,
            camera: SphericalPoint::ZENITH,
            rotation_deg: 0.0,
        }
    }

    pub fn is_top_view(&self) -> bool {
        *self == Self::top_view()
    }

    pub fn to_row(&self) -> [f64; PARAMETER_WIDTH] {
        let mut row = [0.0; PARAMETER_WIDTH];
        row[0..5].copy_from_slice(&self.sun.to_array());
        row[5] = self.sun_energy;
        row[6] = self.sun_size;
        row[7..12].copy_from_slice(&self.camera.to_array());
        row[12] = self.rotation_deg;
        row
    }

    /// Parse a persisted row; `index` is only used for the error message.
    pub fn from_row(index: usize, row: &[f64]) -> Result<Self, ConfigError> {
        if row.len() != PARAMETER_WIDTH {
            return Err(ConfigError::RowWidth {
                row: index,
                width: row.len(),
                expected: PARAMETER_WIDTH,
            });
        }
        let five = |start: usize| [row[start], row[start + 1], row[start + 2], row[start + 3], row[start + 4]];
        Ok(Self {
            sun: SphericalPoint::from_array(five(0)),
            sun_energy: row[5],
            sun_size: row[6],
            camera: SphericalPoint::from_array(five(7)),
            rotation_deg: row[12],
        })
    }

    /// Camera position at distance `rho` from the origin.
    pub fn camera_position(&self, rho: f32) -> Vec3 {
        self.camera.scaled(rho)
    }

    /// Sun lamp orientation: Euler `(0, phi, theta)`, so the lamp's -Z axis points from
    /// the sun position toward the origin.
    pub fn sun_rotation(&self) -> Quat {
        ObjectRotation::from_radians([0.0, self.sun.phi, self.sun.theta]).to_quat()
    }

    pub fn object_rotation(&self) -> ObjectRotation {
        ObjectRotation::about_z(self.rotation_deg)
    }
}

/// Generate `config.sample_count()` records.
///
/// Sun energy and size bounds must be non-negative.
///
/// All bounds are validated before the first draw. Every bounded quantity is drawn
/// independently and uniformly. With `top_view` set, records at indices that are
/// multiples of `n_repeat` are the canonical top view instead.
pub fn generate_parameters<R: Rng + ?Sized>(
    config: &ParameterConfig,
    rng: &mut R,
) -> Result<Vec<SampleParameters>, ConfigError> {
    if config.n_repeat == 0 {
        return Err(ConfigError::ZeroRepeat);
    }
    let sun_angles = config.sun_phi_theta.resolve("sun_phi_theta", 2)?;
    let sun_light = config
        .sun_energy_size
        .resolve_non_negative("sun_energy_size", 2)?;
    let camera_angles = config.camera_phi_theta.resolve("camera_phi_theta", 2)?;
    let rotation = config.rotation.resolve("rotation", 1)?;

    let count = config.sample_count()?;

    let params = (0..count)
        .map(|i| {
            if config.top_view && i % config.n_repeat == 0 {
                return SampleParameters::top_view();
            }
            let sun = draw(rng, &sun_angles);
            let light = draw(rng, &sun_light);
            let camera = draw(rng, &camera_angles);
            let rotation_deg = draw(rng, &rotation)[0];
            SampleParameters {
                sun: spherical_to_cartesian(sun[0], sun[1], 1.0),
                sun_energy: light[0],
                sun_size: light[1],
                camera: spherical_to_cartesian(camera[0], camera[1], 1.0),
                rotation_deg,
            }
        })
        .collect();
    Ok(params)
}

/// Write records as a JSON array of 13-number rows.
pub fn save_parameters<P: AsRef<Path>>(
    path: P,
    params: &[SampleParameters],
) -> Result<(), PipelineError> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let rows: Vec<[f64; PARAMETER_WIDTH]> = params.iter().map(SampleParameters::to_row).collect();
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer(&mut writer, &rows)?;
    writer.flush()?;
    Ok(())
}

/// Read records written by [`save_parameters`]; rows of the wrong width are rejected.
pub fn load_parameters<P: AsRef<Path>>(path: P) -> Result<Vec<SampleParameters>, PipelineError> {
    let reader = BufReader::new(File::open(path.as_ref())?);
    let rows: Vec<Vec<f64>> = serde_json::from_reader(reader)?;
    let params = rows
        .iter()
        .enumerate()
        .map(|(i, row)| SampleParameters::from_row(i, row))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(params)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use tempfile::TempDir;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(42)
    }

    #[test]
    fn test_default_config() {
        let config = ParameterConfig::default();
        assert_eq!(config.sample_count(), Ok(20_000));
        assert!(config.top_view);
    }

    #[test]
    fn test_top_view_row() {
        let row = SampleParameters::top_view().to_row();
        assert_eq!(
            row,
            [0.0, 0.0, 1.0, 0.0, 0.0, 3.0, 0.1, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0]
        );
    }

    #[test]
    fn test_concrete_two_record_scenario() {
        let config = ParameterConfig {
            sun_phi_theta: ParameterRange::new(vec![0.0, -180.0], vec![70.0, 180.0]),
            n_repeat: 2,
            n_images: 1,
            ..Default::default()
        };
        let params = generate_parameters(&config, &mut rng()).unwrap();
        assert_eq!(params.len(), 2);
        assert!(params[0].is_top_view());

        let sun_phi = params[1].sun.phi.to_degrees();
        let sun_theta = params[1].sun.theta.to_degrees();
        assert!((0.0..=70.0 + 1e-9).contains(&sun_phi));
        assert!((-180.0 - 1e-9..=180.0 + 1e-9).contains(&sun_theta));
    }

    #[test]
    fn test_records_within_bounds() {
        let config = ParameterConfig {
            n_repeat: 5,
            n_images: 40,
            top_view: false,
            ..Default::default()
        };
        let params = generate_parameters(&config, &mut rng()).unwrap();
        assert_eq!(params.len(), 200);

        let tol = 1e-9;
        for p in &params {
            assert!(p.sun.phi.to_degrees() >= -tol && p.sun.phi.to_degrees() <= 70.0 + tol);
            assert!(p.sun.theta.to_degrees().abs() <= 180.0 + tol);
            assert!(p.sun_energy >= 2.0 && p.sun_energy <= 5.0);
            assert!(p.sun_size >= 0.01 && p.sun_size <= 0.5);
            assert!(p.camera.phi.to_degrees() >= -tol && p.camera.phi.to_degrees() <= 35.0 + tol);
            assert!(p.camera.theta.to_degrees().abs() <= 180.0 + tol);
            assert!(p.rotation_deg.abs() <= 180.0);
            // Directions live on the unit sphere
            assert!((p.sun.radius() - 1.0).abs() < 1e-9);
            assert!((p.camera.radius() - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_one_top_view_per_repeat_block() {
        let config = ParameterConfig {
            n_repeat: 4,
            n_images: 6,
            ..Default::default()
        };
        let params = generate_parameters(&config, &mut rng()).unwrap();
        for block in params.chunks(4) {
            let top = block.iter().filter(|p| p.is_top_view()).count();
            assert_eq!(top, 1);
            assert!(block[0].is_top_view());
        }
    }

    #[test]
    fn test_top_view_disabled() {
        let config = ParameterConfig {
            n_repeat: 3,
            n_images: 3,
            top_view: false,
            ..Default::default()
        };
        let params = generate_parameters(&config, &mut rng()).unwrap();
        assert!(params.iter().all(|p| !p.is_top_view()));
    }

    #[test]
    fn test_seeded_generation_is_reproducible() {
        let config = ParameterConfig {
            n_repeat: 3,
            n_images: 2,
            ..Default::default()
        };
        let a = generate_parameters(&config, &mut StdRng::seed_from_u64(9)).unwrap();
        let b = generate_parameters(&config, &mut StdRng::seed_from_u64(9)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_mismatched_bound_lengths_fail_fast() {
        let config = ParameterConfig {
            sun_phi_theta: ParameterRange::new(vec![0.0, -180.0, 1.0], vec![70.0, 180.0]),
            ..Default::default()
        };
        let err = generate_parameters(&config, &mut rng()).unwrap_err();
        assert_eq!(
            err,
            ConfigError::BoundLengthMismatch {
                name: "sun_phi_theta".to_string(),
                low: 3,
                high: 2,
            }
        );
    }

    #[test]
    fn test_wrong_arity_fails() {
        let config = ParameterConfig {
            rotation: ParameterRange::new(vec![-10.0, 0.0], vec![10.0, 5.0]),
            ..Default::default()
        };
        let err = generate_parameters(&config, &mut rng()).unwrap_err();
        assert!(matches!(err, ConfigError::BoundArity { expected: 1, actual: 2, .. }));
    }

    #[test]
    fn test_inverted_bound_fails() {
        let range = ParameterRange::new(vec![5.0, 0.0], vec![2.0, 1.0]);
        let err = range.resolve("sun_energy_size", 2).unwrap_err();
        assert!(matches!(err, ConfigError::InvertedBound { component: 0, .. }));
    }

    #[test]
    fn test_scalar_bound_broadcasts() {
        let range = ParameterRange::new(0.0, vec![1.0, 2.0]);
        assert_eq!(range.resolve("x", 2).unwrap(), vec![(0.0, 1.0), (0.0, 2.0)]);

        let scalar = ParameterRange::new(-1.0, 1.0);
        assert_eq!(scalar.resolve("x", 1).unwrap(), vec![(-1.0, 1.0)]);
    }

    #[test]
    fn test_degenerate_bound_is_constant() {
        let config = ParameterConfig {
            rotation: ParameterRange::new(15.0, 15.0),
            n_repeat: 2,
            n_images: 2,
            top_view: false,
            ..Default::default()
        };
        let params = generate_parameters(&config, &mut rng()).unwrap();
        assert!(params.iter().all(|p| p.rotation_deg == 15.0));
    }

    #[test]
    fn test_zero_repeat_rejected() {
        let config = ParameterConfig {
            n_repeat: 0,
            ..Default::default()
        };
        assert_eq!(
            generate_parameters(&config, &mut rng()),
            Err(ConfigError::ZeroRepeat)
        );
    }

    #[test]
    fn test_row_width_checked() {
        let err = SampleParameters::from_row(3, &[0.0; 12]).unwrap_err();
        assert_eq!(
            err,
            ConfigError::RowWidth {
                row: 3,
                width: 12,
                expected: 13,
            }
        );
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("arrays").join("shader.json");

        let config = ParameterConfig {
            n_repeat: 2,
            n_images: 3,
            ..Default::default()
        };
        let params = generate_parameters(&config, &mut rng()).unwrap();
        save_parameters(&path, &params).unwrap();

        let loaded = load_parameters(&path).unwrap();
        assert_eq!(loaded.len(), 6);
        assert!(loaded[0].is_top_view());
        assert!(loaded[2].is_top_view());
        assert_eq!(loaded[1].to_row(), params[1].to_row());
    }

    #[test]
    fn test_load_rejects_short_rows() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("bad.json");
        std::fs::write(&path, "[[1.0, 2.0, 3.0]]").unwrap();

        let err = load_parameters(&path).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Config(ConfigError::RowWidth { row: 0, width: 3, .. })
        ));
    }

    #[test]
    fn test_sun_rotation_points_light_at_origin() {
        let mut p = SampleParameters::top_view();
        p.sun = spherical_to_cartesian(40.0, 120.0, 1.0);
        // Lamp shines along its local -Z
        let light_dir = p.sun_rotation() * Vec3::NEG_Z;
        let expected = -p.sun.to_vec3();
        assert!((light_dir - expected).length() < 1e-4);
    }

    #[test]
    fn test_camera_position_scaling() {
        let p = SampleParameters::top_view();
        let pos = p.camera_position(128.0);
        assert!((pos - Vec3::new(0.0, 0.0, 128.0)).length() < 1e-4);
    }

    #[test]
    fn test_negative_sun_light_rejected() {
        let config = ParameterConfig {
            sun_energy_size: ParameterRange::new(vec![-5.0, -1.0], vec![-2.0, -0.5]),
            n_repeat: 2,
            n_images: 2,
            ..Default::default()
        };
        let err = generate_parameters(&config, &mut rng()).unwrap_err();
        assert_eq!(
            err,
            ConfigError::NegativeBound {
                name: "sun_energy_size".to_string(),
                component: 0,
                low: -5.0
            }
        );

        // Size alone below zero
        let config = ParameterConfig {
            sun_energy_size: ParameterRange::new(vec![0.0, -0.1], vec![5.0, 0.5]),
            ..config
        };
        assert!(matches!(
            generate_parameters(&config, &mut rng()),
            Err(ConfigError::NegativeBound { component: 1, .. })
        ));
    }

    #[test]
    fn test_zero_sun_light_allowed() {
        let config = ParameterConfig {
            sun_energy_size: ParameterRange::new(0.0, 1.0),
            n_repeat: 3,
            n_images: 1,
            top_view: false,
            ..Default::default()
        };
        let params = generate_parameters(&config, &mut rng()).unwrap();
        assert!(params.iter().all(|p| p.sun_energy >= 0.0 && p.sun_size >= 0.0));
    }

    #[test]
    fn test_unrepresentable_span_rejected() {
        let config = ParameterConfig {
            rotation: ParameterRange::new(-1e308, 1e308),
            n_repeat: 1,
            n_images: 1,
            ..Default::default()
        };
        let err = generate_parameters(&config, &mut rng()).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::BoundSpan { ref name, component: 0, .. } if name == "rotation"
        ));
    }

    #[test]
    fn test_sample_count_overflow() {
        let config = ParameterConfig {
            n_repeat: usize::MAX / 2 + 1,
            n_images: 2,
            ..Default::default()
        };
        assert!(matches!(
            config.sample_count(),
            Err(ConfigError::CountOverflow { .. })
        ));
        assert!(matches!(
            generate_parameters(&config, &mut rng()),
            Err(ConfigError::CountOverflow { .. })
        ));
    }
}
