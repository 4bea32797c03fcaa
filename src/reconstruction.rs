//! Reconstruction: the world state exchanged with the pipeline under test.
use cgmath::prelude::*;
use cgmath::{Basis3, Point3, Quaternion, Rad, Vector3};

use std::collections::BTreeMap;

use crate::camera::Camera;
use crate::Error;

/// Convert an axis-angle (Rodrigues) vector to a rotation.
pub fn from_rodrigues(x: Vector3<f64>) -> Basis3<f64> {
    let theta = x.magnitude();
    if theta > 1e-12 {
        Basis3::from_axis_angle(x / theta, Rad(theta))
    } else {
        // first order approximation around the identity
        Basis3::from(Quaternion::new(1.0, x.x / 2.0, x.y / 2.0, x.z / 2.0).normalize())
    }
}

/// Convert a rotation to its axis-angle (Rodrigues) vector, with angle in `[0, pi]`.
pub fn to_rodrigues(r: Basis3<f64>) -> Vector3<f64> {
    let q = Quaternion::from(r);
    let q = if q.s < 0.0 { -q } else { q };
    let sin_half = q.v.magnitude();
    if sin_half < 1e-12 {
        return q.v * 2.0;
    }
    let angle = 2.0 * sin_half.atan2(q.s);
    q.v / sin_half * angle
}

/// Camera pose. `rotation` maps world directions into the camera frame and `origin` is the
/// camera center in world coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    pub rotation: Basis3<f64>,
    pub origin: Point3<f64>,
}

impl Pose {
    pub fn new(rotation: Basis3<f64>, origin: Point3<f64>) -> Self {
        Pose { rotation, origin }
    }

    /// Project a point from the world into the camera coordinate system.
    pub fn to_camera(&self, p: Point3<f64>) -> Point3<f64> {
        Point3::from_vec(self.rotation.rotate_vector(p - self.origin))
    }

    /// Project a point from the camera coordinate system back into the world.
    pub fn to_world(&self, p: Point3<f64>) -> Point3<f64> {
        self.origin + self.rotation.invert().rotate_vector(p.to_vec())
    }
}

/// Prior information attached to a shot, as read from its EXIF.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ShotMetadata {
    pub gps_position: Option<Point3<f64>>,
    pub gps_dop: Option<f64>,
    pub capture_time: Option<f64>,
}

/// One exposure of a camera.
#[derive(Debug, Clone, PartialEq)]
pub struct Shot {
    pub id: String,
    /// Id of the camera in the owning reconstruction.
    pub camera: String,
    pub pose: Pose,
    pub metadata: ShotMetadata,
}

/// A reconstructed 3D point.
#[derive(Debug, Clone, PartialEq)]
pub struct Point {
    pub id: String,
    pub coordinates: Point3<f64>,
    pub color: Option<[u8; 3]>,
}

/// Cameras, shots and points of a scene, each keyed by id.
///
/// Entities with the same id in two reconstructions are the same entity, which is how ground
/// truth and estimates are matched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Reconstruction {
    pub cameras: BTreeMap<String, Camera>,
    pub shots: BTreeMap<String, Shot>,
    pub points: BTreeMap<String, Point>,
}

impl Reconstruction {
    pub fn new() -> Self {
        Reconstruction::default()
    }

    pub fn add_camera(&mut self, camera: Camera) {
        self.cameras.insert(camera.id.clone(), camera);
    }

    /// Add a shot. Its camera must already be part of the reconstruction.
    pub fn add_shot(&mut self, shot: Shot) -> Result<(), Error> {
        if !self.cameras.contains_key(&shot.camera) {
            return Err(Error::MissingCamera {
                shot: shot.id,
                camera: shot.camera,
            });
        }
        self.shots.insert(shot.id.clone(), shot);
        Ok(())
    }

    pub fn add_point(&mut self, point: Point) {
        self.points.insert(point.id.clone(), point);
    }

    /// Camera used by `shot`.
    pub fn shot_camera(&self, shot: &Shot) -> Option<&Camera> {
        self.cameras.get(&shot.camera)
    }

    pub fn num_cameras(&self) -> usize {
        self.cameras.len()
    }

    pub fn num_shots(&self) -> usize {
        self.shots.len()
    }

    pub fn num_points(&self) -> usize {
        self.points.len()
    }

    /// Smallest and largest coordinates of shot origins and points.
    pub fn extent(&self) -> Option<(Point3<f64>, Point3<f64>)> {
        let mut coords = self
            .shots
            .values()
            .map(|s| s.pose.origin)
            .chain(self.points.values().map(|p| p.coordinates));
        let first = coords.next()?;
        Some(coords.fold((first, first), |(min, max), y| {
            (
                Point3::new(min.x.min(y.x), min.y.min(y.y), min.z.min(y.z)),
                Point3::new(max.x.max(y.x), max.y.max(y.y), max.z.max(y.z)),
            )
        }))
    }
}

impl std::fmt::Display for Reconstruction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Reconstruction with {} cameras, {} shots, and {} points",
            self.num_cameras(),
            self.num_shots(),
            self.num_points()
        )
    }
}

#[test]
fn test_rodrigues_isomorphic() {
    use cgmath::AbsDiffEq;
    let r = Vector3::new(0.3, -0.2, 1.1);
    assert!(to_rodrigues(from_rodrigues(r)).abs_diff_eq(&r, 1e-10));
    let small = Vector3::new(1e-14, 0.0, -1e-14);
    assert!(to_rodrigues(from_rodrigues(small)).abs_diff_eq(&small, 1e-20));
}

#[test]
fn test_pose_isomorphic() {
    use cgmath::AbsDiffEq;
    let pose = Pose::new(
        from_rodrigues(Vector3::new(0.1, 2.0, -0.4)),
        Point3::new(3.0, -1.0, 0.5),
    );
    let p = Point3::new(1.0, 3.0, -1.0);
    assert!(pose.to_world(pose.to_camera(p)).abs_diff_eq(&p, 1e-10));
    assert!(pose.to_camera(pose.origin).abs_diff_eq(&Point3::origin(), 1e-12));
}

#[test]
fn test_add_shot_missing_camera() {
    let mut r = Reconstruction::new();
    let shot = Shot {
        id: "shot0".to_string(),
        camera: "nope".to_string(),
        pose: Pose::new(Basis3::one(), Point3::origin()),
        metadata: ShotMetadata::default(),
    };
    assert!(r.add_shot(shot.clone()).is_err());
    r.add_camera(crate::camera::Camera::new(
        crate::camera::CameraKind::Perspective,
        "nope",
        1.0,
        0.0,
        0.0,
    ));
    assert!(r.add_shot(shot).is_ok());
    assert_eq!(r.num_shots(), 1);
    let (min, max) = r.extent().unwrap();
    assert_eq!(min, max);
}
