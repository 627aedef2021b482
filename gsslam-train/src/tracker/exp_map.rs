//! Exponential maps from 6-vectors to rigid transforms
//!
//! Tangent vectors are laid out as `[tx, ty, tz, wx, wy, wz]`: translation
//! first, axis-angle rotation second.

use glam::{Mat3, Vec3};

/// Below this angle the trigonometric coefficients switch to their Taylor series.
const SMALL_ANGLE: f32 = 1e-2;

/// Skew-symmetric matrix such that `skew(v) * u == v.cross(u)`.
pub fn skew(v: Vec3) -> Mat3 {
    Mat3::from_cols(
        Vec3::new(0.0, v.z, -v.y),
        Vec3::new(-v.z, 0.0, v.x),
        Vec3::new(v.y, -v.x, 0.0),
    )
}

/// Coefficients `sin θ / θ`, `(1 - cos θ) / θ²`, `(θ - sin θ) / θ³`.
fn coefficients(theta: f32) -> (f32, f32, f32) {
    let theta_sq = theta * theta;
    if theta < SMALL_ANGLE {
        (
            1.0 - theta_sq / 6.0,
            0.5 - theta_sq / 24.0,
            1.0 / 6.0 - theta_sq / 120.0,
        )
    } else {
        let (sin, cos) = theta.sin_cos();
        (
            sin / theta,
            (1.0 - cos) / theta_sq,
            (theta - sin) / (theta_sq * theta),
        )
    }
}

/// Rodrigues' formula.
pub fn exp_so3(omega: Vec3) -> Mat3 {
    let (a, b, _) = coefficients(omega.length());
    let w = skew(omega);
    Mat3::IDENTITY + w * a + w * w * b
}

/// Rotation from the exponential map, translation taken as is.
pub fn exp_so3xr3(tangent: &[f32; 6]) -> (Mat3, Vec3) {
    let (translation, omega) = split(tangent);
    (exp_so3(omega), translation)
}

/// Full SE(3) exponential: the translation is pushed through the left Jacobian.
pub fn exp_se3(tangent: &[f32; 6]) -> (Mat3, Vec3) {
    let (translation, omega) = split(tangent);
    let (a, b, c) = coefficients(omega.length());
    let w = skew(omega);
    let w_sq = w * w;
    let rotation = Mat3::IDENTITY + w * a + w_sq * b;
    let v = Mat3::IDENTITY + w * b + w_sq * c;
    (rotation, v * translation)
}

fn split(tangent: &[f32; 6]) -> (Vec3, Vec3) {
    (
        Vec3::new(tangent[0], tangent[1], tangent[2]),
        Vec3::new(tangent[3], tangent[4], tangent[5]),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_2;

    #[test]
    fn test_skew_matches_cross_product() {
        let v = Vec3::new(1.0, 2.0, 3.0);
        let u = Vec3::new(-0.5, 0.25, 4.0);
        assert!((skew(v) * u - v.cross(u)).length() < 1e-6);
    }

    #[test]
    fn test_zero_tangent_is_identity() {
        let (r, t) = exp_se3(&[0.0; 6]);
        assert_eq!(r, Mat3::IDENTITY);
        assert_eq!(t, Vec3::ZERO);
        let (r, t) = exp_so3xr3(&[0.0; 6]);
        assert_eq!(r, Mat3::IDENTITY);
        assert_eq!(t, Vec3::ZERO);
    }

    #[test]
    fn test_exp_so3_quarter_turn() {
        let r = exp_so3(Vec3::new(0.0, 0.0, FRAC_PI_2));
        assert!((r * Vec3::X - Vec3::Y).length() < 1e-6);
        assert!((r.determinant() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_small_angle_is_continuous() {
        for angle in [0.9e-2, 1.1e-2] {
            let r = exp_so3(Vec3::new(0.0, 0.0, angle));
            assert!(r.abs_diff_eq(Mat3::from_rotation_z(angle), 1e-6));
        }
    }

    #[test]
    fn test_se3_translation_follows_rotation() {
        // Pure translation stays put when there is no rotation.
        let (_, t) = exp_se3(&[1.0, 2.0, 3.0, 0.0, 0.0, 0.0]);
        assert!((t - Vec3::new(1.0, 2.0, 3.0)).length() < 1e-6);

        // A screw motion bends the translation; SO3xR3 does not.
        let tangent = [1.0, 0.0, 0.0, 0.0, 0.0, FRAC_PI_2];
        let (r_se3, t_se3) = exp_se3(&tangent);
        let (r_so3, t_so3) = exp_so3xr3(&tangent);
        assert!(r_se3.abs_diff_eq(r_so3, 1e-6));
        assert_eq!(t_so3, Vec3::X);
        assert!(t_se3.y > 0.1);
    }
}
