//! Spherical to Cartesian conversion for sun and camera placement.
//!
//! Convention (Z-up world):
//! - `phi`: inclination from the vertical +Z axis (0 = straight up)
//! - `theta`: azimuth in the XY plane, measured from +X toward +Y
//! - `rho`: radius
//!
//! ```text
//! x = rho * sin(phi) * cos(theta)
//! y = rho * sin(phi) * sin(theta)
//! z = rho * cos(phi)
//! ```

use bevy::prelude::Vec3;
use serde::{Deserialize, Serialize};

/// Cartesian position together with the angles (radians) it was built from.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SphericalPoint {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    /// Inclination in radians
    pub phi: f64,
    /// Azimuth in radians
    pub theta: f64,
}

impl SphericalPoint {
    /// Straight up on the unit sphere.
    pub const ZENITH: Self = Self {
        x: 0.0,
        y: 0.0,
        z: 1.0,
        phi: 0.0,
        theta: 0.0,
    };

    /// `[x, y, z, phi, theta]`, the layout used in persisted parameter rows.
    pub fn to_array(&self) -> [f64; 5] {
        [self.x, self.y, self.z, self.phi, self.theta]
    }

    pub fn from_array(arr: [f64; 5]) -> Self {
        Self {
            x: arr[0],
            y: arr[1],
            z: arr[2],
            phi: arr[3],
            theta: arr[4],
        }
    }

    pub fn position(&self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }

    /// Position as a bevy vector (f64 -> f32).
    pub fn to_vec3(&self) -> Vec3 {
        Vec3::new(self.x as f32, self.y as f32, self.z as f32)
    }

    /// Position scaled by an operational radius, e.g. half the ortho scale.
    pub fn scaled(&self, rho: f32) -> Vec3 {
        self.to_vec3() * rho
    }

    pub fn radius(&self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }
}

/// Convert `(phi, theta)` in degrees plus radius `rho` to Cartesian coordinates.
///
/// Total over all real inputs; `rho = 0` yields the origin.
pub fn spherical_to_cartesian(phi_deg: f64, theta_deg: f64, rho: f64) -> SphericalPoint {
    spherical_to_cartesian_radians(phi_deg.to_radians(), theta_deg.to_radians(), rho)
}

/// Same as [`spherical_to_cartesian`] with the angles already in radians.
pub fn spherical_to_cartesian_radians(phi: f64, theta: f64, rho: f64) -> SphericalPoint {
    SphericalPoint {
        x: rho * phi.sin() * theta.cos(),
        y: rho * phi.sin() * theta.sin(),
        z: rho * phi.cos(),
        phi,
        theta,
    }
}

/// Inverse conversion: returns `(phi, theta, rho)` with the angles in radians.
///
/// `phi` is in `[0, pi]` and `theta` in `(-pi, pi]`. At the poles `theta` is 0.
pub fn cartesian_to_spherical(x: f64, y: f64, z: f64) -> (f64, f64, f64) {
    let horizontal = (x * x + y * y).sqrt();
    let rho = (horizontal * horizontal + z * z).sqrt();
    let phi = horizontal.atan2(z);
    let theta = y.atan2(x);
    (phi, theta, rho)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    const EPS: f64 = 1e-9;

    #[test]
    fn test_zenith() {
        let p = spherical_to_cartesian(0.0, 0.0, 1.0);
        assert_eq!(p, SphericalPoint::ZENITH);
    }

    #[test]
    fn test_zenith_ignores_azimuth() {
        let p = spherical_to_cartesian(0.0, 123.0, 1.0);
        assert!(p.x.abs() < EPS);
        assert!(p.y.abs() < EPS);
        assert!((p.z - 1.0).abs() < EPS);
    }

    #[test]
    fn test_horizon_axes() {
        // phi = 90 lies on the horizon; theta = 0 is +X, theta = 90 is +Y
        let px = spherical_to_cartesian(90.0, 0.0, 2.0);
        assert!((px.x - 2.0).abs() < EPS);
        assert!(px.y.abs() < EPS);
        assert!(px.z.abs() < EPS);

        let py = spherical_to_cartesian(90.0, 90.0, 2.0);
        assert!(py.x.abs() < EPS);
        assert!((py.y - 2.0).abs() < EPS);
    }

    #[test]
    fn test_angles_returned_in_radians() {
        let p = spherical_to_cartesian(45.0, -90.0, 1.0);
        assert!((p.phi - std::f64::consts::FRAC_PI_4).abs() < EPS);
        assert!((p.theta + std::f64::consts::FRAC_PI_2).abs() < EPS);
    }

    #[test]
    fn test_zero_radius_is_origin() {
        let p = spherical_to_cartesian(33.0, 71.0, 0.0);
        assert_eq!(p.position(), [0.0, 0.0, 0.0]);
        assert_eq!(p.radius(), 0.0);
    }

    #[test]
    fn test_roundtrip_and_radius() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..500 {
            // Stay away from the poles where theta is undefined
            let phi_deg = rng.gen_range(0.5..179.5);
            let theta_deg = rng.gen_range(-179.5..179.5);
            let rho = rng.gen_range(0.01..500.0);

            let p = spherical_to_cartesian(phi_deg, theta_deg, rho);
            assert!((p.radius() - rho).abs() < 1e-9 * rho.max(1.0));

            let (phi, theta, r) = cartesian_to_spherical(p.x, p.y, p.z);
            assert!((phi - p.phi).abs() < 1e-9, "phi {} vs {}", phi, p.phi);
            assert!((theta - p.theta).abs() < 1e-9, "theta {} vs {}", theta, p.theta);
            assert!((r - rho).abs() < 1e-9 * rho.max(1.0));
        }
    }

    #[test]
    fn test_scaled_position() {
        let p = spherical_to_cartesian(0.0, 0.0, 1.0);
        let v = p.scaled(128.0);
        assert!((v.z - 128.0).abs() < 1e-4);
        assert!(v.x.abs() < 1e-4);
    }

    #[test]
    fn test_array_layout() {
        let p = spherical_to_cartesian(30.0, 60.0, 1.0);
        let arr = p.to_array();
        assert_eq!(arr[3], p.phi);
        assert_eq!(arr[4], p.theta);
        assert_eq!(SphericalPoint::from_array(arr), p);
    }
}
