//! Camera models handed to the pipeline under test.
use cgmath::{InnerSpace, Point2, Point3, Vector2};

use std::fmt;
use std::str::FromStr;

use crate::Error;

/// Sensor width of every synthetic camera, in pixels.
pub const DEFAULT_WIDTH: u32 = 2000;
/// Sensor height of every synthetic camera, in pixels.
pub const DEFAULT_HEIGHT: u32 = 1600;

/// Projection model of a camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraKind {
    Perspective,
    Fisheye,
}

impl FromStr for CameraKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "perspective" => Ok(CameraKind::Perspective),
            "fisheye" => Ok(CameraKind::Fisheye),
            other => Err(Error::UnknownCameraKind(other.to_string())),
        }
    }
}

impl fmt::Display for CameraKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CameraKind::Perspective => write!(f, "perspective"),
            CameraKind::Fisheye => write!(f, "fisheye"),
        }
    }
}

/// Camera intrinsics with a two parameter radial distortion.
///
/// The `*_prior` fields hold the calibration estimate fed to the pipeline under test. They are
/// equal to the true values at creation.
#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    pub id: String,
    pub kind: CameraKind,
    /// Focal length, normalized by the largest sensor dimension.
    pub focal: f64,
    pub k1: f64,
    pub k2: f64,
    pub focal_prior: f64,
    pub k1_prior: f64,
    pub k2_prior: f64,
    pub width: u32,
    pub height: u32,
}

impl Camera {
    pub fn new(kind: CameraKind, id: &str, focal: f64, k1: f64, k2: f64) -> Self {
        Camera {
            id: id.to_string(),
            kind: kind,
            focal: focal,
            k1: k1,
            k2: k2,
            focal_prior: focal,
            k1_prior: k1,
            k2_prior: k2,
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
        }
    }

    /// Project a point from camera space into normalized image coordinates. The camera looks
    /// down the positive z axis, points at or behind the image plane have no projection.
    pub fn project(&self, p: Point3<f64>) -> Option<Point2<f64>> {
        if p.z <= 0.0 {
            return None;
        }
        let p_ = Vector2::new(p.x / p.z, p.y / p.z);
        let scale = match self.kind {
            CameraKind::Perspective => {
                let r2 = p_.magnitude2();
                self.focal * (1.0 + self.k1 * r2 + self.k2 * r2 * r2)
            }
            CameraKind::Fisheye => {
                let r = p_.magnitude();
                let theta = r.atan();
                let theta2 = theta * theta;
                let d = 1.0 + self.k1 * theta2 + self.k2 * theta2 * theta2;
                // theta / r tends to 1 at the optical axis
                if r < 1e-12 {
                    self.focal * d
                } else {
                    self.focal * d * theta / r
                }
            }
        };
        Some(Point2::new(scale * p_.x, scale * p_.y))
    }

    /// Check whether normalized image coordinates fall on the sensor.
    pub fn is_inside(&self, p: Point2<f64>) -> bool {
        let size = self.width.max(self.height) as f64;
        let half_w = self.width as f64 / (2.0 * size);
        let half_h = self.height as f64 / (2.0 * size);
        p.x.abs() <= half_w && p.y.abs() <= half_h
    }
}

/// Build a camera from its kind tag, either `perspective` or `fisheye`.
pub fn get_camera(kind: &str, id: &str, focal: f64, k1: f64, k2: f64) -> Result<Camera, Error> {
    let kind = CameraKind::from_str(kind)?;
    Ok(Camera::new(kind, id, focal, k1, k2))
}

#[test]
fn test_get_camera_priors() {
    let c = get_camera("fisheye", "cam", 0.7, -0.2, 0.05).unwrap();
    assert_eq!(c.kind, CameraKind::Fisheye);
    assert_eq!(c.focal_prior, c.focal);
    assert_eq!(c.k1_prior, -0.2);
    assert_eq!(c.k2_prior, 0.05);
    assert_eq!((c.width, c.height), (2000, 1600));
}

#[test]
fn test_unknown_camera_kind() {
    match get_camera("orthographic", "cam", 1.0, 0.0, 0.0) {
        Err(Error::UnknownCameraKind(kind)) => assert_eq!(kind, "orthographic"),
        other => panic!("expected an unknown camera kind error, got {:?}", other),
    }
}

#[test]
fn test_project_center() {
    let p = Point3::new(0.0, 0.0, 3.0);
    for kind in &[CameraKind::Perspective, CameraKind::Fisheye] {
        let c = Camera::new(*kind, "cam", 1.0, 0.1, 0.1);
        let uv = c.project(p).unwrap();
        assert!(uv.x == 0.0 && uv.y == 0.0);
    }
}

#[test]
fn test_project_behind() {
    let c = Camera::new(CameraKind::Perspective, "cam", 1.0, 0.0, 0.0);
    assert!(c.project(Point3::new(0.1, 0.1, -1.0)).is_none());
}

#[test]
fn test_project_undistorted() {
    let c = Camera::new(CameraKind::Perspective, "cam", 0.5, 0.0, 0.0);
    let uv = c.project(Point3::new(1.0, -2.0, 4.0)).unwrap();
    assert!((uv.x - 0.125).abs() < 1e-12 && (uv.y + 0.25).abs() < 1e-12);
    assert!(c.is_inside(uv));
    assert!(!c.is_inside(Point2::new(0.51, 0.0)));
    assert!(!c.is_inside(Point2::new(0.0, 0.41)));
}
