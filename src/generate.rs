//! Functions to generate street geometry and camera trajectories along a path.
//!
//! Paths are parametrized by `t`, where `t` in `[0, 1]` covers the whole path. Distances along
//! the path are converted to `t` with the nominal [`PathGenerator::length`].
//!
//! Example usage:
//! ```
//! use rand::SeedableRng;
//! use synthsfm::generate::*;
//!
//! let mut rng = rand::rngs::StdRng::seed_from_u64(0);
//! let path = get_scene_generator("line", 20.0).unwrap();
//! // street points around the path
//! let samples = samples_random_count(100, &mut rng);
//! let (walls, floor) = generate_street(&samples, &path, 3.0, 8.0, &mut rng);
//! // cameras every 2 meters, jittered by half a meter
//! let samples = samples_interval(0.0, 20.0, 2.0, 0.5, path.length(), &mut rng).unwrap();
//! let (positions, rotations) = generate_cameras(&samples, &path, 1.5);
//! assert_eq!((walls.len(), floor.len(), positions.len()), (200, 100, 10));
//! assert_eq!(positions.len(), rotations.len());
//! ```

use cgmath::prelude::*;
use cgmath::{Basis3, Matrix3, Point2, Point3, Quaternion, Vector2, Vector3};
use indicatif::{ProgressBar, ProgressStyle};
use rand::distributions::{Distribution, Normal};
use rand::Rng;

use std::f64::consts::PI;
use std::fmt;
use std::str::FromStr;

use crate::camera::Camera;
use crate::noise::NoiseSpec;
use crate::reconstruction::*;
use crate::Error;

pub(crate) fn progress_bar(length: u64, message: &str, verbose: bool) -> ProgressBar {
    if !verbose {
        return ProgressBar::hidden();
    }

    let pb = ProgressBar::new(length);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{msg} [{bar:40}] {percent}% ({eta})")
            .progress_chars("#-"),
    );
    pb.set_message(message);
    pb
}

/// Shape of the path a street follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeneratorKind {
    Ellipse,
    Line,
    Curve,
}

impl FromStr for GeneratorKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ellipse" => Ok(GeneratorKind::Ellipse),
            "line" => Ok(GeneratorKind::Line),
            "curve" => Ok(GeneratorKind::Curve),
            other => Err(Error::UnknownGeneratorKind(other.to_string())),
        }
    }
}

impl fmt::Display for GeneratorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GeneratorKind::Ellipse => write!(f, "ellipse"),
            GeneratorKind::Line => write!(f, "line"),
            GeneratorKind::Curve => write!(f, "curve"),
        }
    }
}

/// A planar path in the ground (z = 0) plane.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PathGenerator {
    /// Full ellipse centered on the origin, with axes `x_size` and `y_size`.
    Ellipse { x_size: f64, y_size: f64 },
    /// Straight line along x, starting at the origin.
    Line { length: f64 },
    /// S-shaped curve advancing along x.
    Curve { length: f64 },
}

impl PathGenerator {
    /// Bind a path shape to a size. Ellipses are four times longer than wide.
    pub fn new(kind: GeneratorKind, length: f64) -> Self {
        match kind {
            GeneratorKind::Ellipse => PathGenerator::Ellipse {
                x_size: length,
                y_size: length / 4.0,
            },
            GeneratorKind::Line => PathGenerator::Line { length },
            GeneratorKind::Curve => PathGenerator::Curve { length },
        }
    }

    /// Nominal length of the path, used to turn distances into `t`.
    pub fn length(&self) -> f64 {
        match *self {
            PathGenerator::Ellipse { x_size, .. } => x_size,
            PathGenerator::Line { length } | PathGenerator::Curve { length } => length,
        }
    }

    /// Position on the path.
    pub fn point(&self, t: f64) -> Point2<f64> {
        match *self {
            PathGenerator::Ellipse { x_size, y_size } => Point2::new(
                (t * 2.0 * PI).cos() * x_size / 2.0,
                (t * 2.0 * PI).sin() * y_size / 2.0,
            ),
            PathGenerator::Line { length } => Point2::new(t * length, 0.0),
            PathGenerator::Curve { length } => {
                Point2::new(t * length, (t * 3.0 * PI).sin() * length / 10.0)
            }
        }
    }

    /// Unit direction of travel.
    pub fn tangent(&self, t: f64) -> Vector2<f64> {
        let d = match *self {
            PathGenerator::Ellipse { x_size, y_size } => Vector2::new(
                -(t * 2.0 * PI).sin() * PI * x_size,
                (t * 2.0 * PI).cos() * PI * y_size,
            ),
            PathGenerator::Line { length } => Vector2::new(length, 0.0),
            PathGenerator::Curve { length } => {
                Vector2::new(length, (t * 3.0 * PI).cos() * 3.0 * PI * length / 10.0)
            }
        };
        if d.magnitude2() > 0.0 {
            d.normalize()
        } else {
            Vector2::unit_x()
        }
    }

    /// Unit vector pointing to the left of the direction of travel.
    pub fn normal(&self, t: f64) -> Vector2<f64> {
        let d = self.tangent(t);
        Vector2::new(-d.y, d.x)
    }
}

/// Select a path shape by name, one of `ellipse`, `line` or `curve`.
pub fn get_scene_generator(kind: &str, length: f64) -> Result<PathGenerator, Error> {
    let kind = GeneratorKind::from_str(kind)?;
    Ok(PathGenerator::new(kind, length))
}

/// `count` uniformly distributed path parameters in `[0, 1)`.
pub fn samples_random_count<R: Rng>(count: usize, rng: &mut R) -> Vec<f64> {
    (0..count).map(|_| rng.gen::<f64>()).collect()
}

/// Largest number of samples [`samples_interval`] generates.
pub const MAX_INTERVAL_SAMPLES: usize = 1_000_000;

/// Path parameters spaced every `interval` meters, from `start` and over `length` meters, each
/// jittered with Gaussian noise of `interval_noise` meters.
///
/// Fails when more than [`MAX_INTERVAL_SAMPLES`] samples would be generated.
pub fn samples_interval<R: Rng>(
    start: f64,
    length: f64,
    interval: f64,
    interval_noise: f64,
    path_length: f64,
    rng: &mut R,
) -> Result<Vec<f64>, Error> {
    if !(length > 0.0 && interval > 0.0 && path_length > 0.0) {
        return Ok(Vec::new());
    }
    let requested = (length / interval).floor();
    // also catches infinite lengths
    if !(requested <= MAX_INTERVAL_SAMPLES as f64) {
        return Err(Error::TooManySamples {
            requested,
            limit: MAX_INTERVAL_SAMPLES,
        });
    }
    let count = requested as usize;
    let jitter = if interval_noise > 0.0 {
        Some(Normal::new(0.0, interval_noise / path_length))
    } else {
        None
    };
    Ok((0..count)
        .map(|i| {
            let t = (start + i as f64 * interval) / path_length;
            match &jitter {
                Some(n) => t + n.sample(rng),
                None => t,
            }
        })
        .collect())
}

/// Generate the walls and the floor of a street following `path`.
///
/// Every sample gives one point on each wall, `width / 2` to the left and right of the path at
/// a random height below `height`, and one floor point at a random offset across the street.
pub fn generate_street<R: Rng>(
    samples: &[f64],
    path: &PathGenerator,
    height: f64,
    width: f64,
    rng: &mut R,
) -> (Vec<Point3<f64>>, Vec<Point3<f64>>) {
    let mut walls = Vec::with_capacity(samples.len() * 2);
    for side in &[1.0, -1.0] {
        for t in samples {
            let p = path.point(*t) + path.normal(*t) * (side * width / 2.0);
            walls.push(Point3::new(p.x, p.y, rng.gen::<f64>() * height));
        }
    }

    let floor = samples
        .iter()
        .map(|t| {
            let shift = (rng.gen::<f64>() - 0.5) * width;
            let p = path.point(*t) + path.normal(*t) * shift;
            Point3::new(p.x, p.y, 0.0)
        })
        .collect();

    (walls, floor)
}

/// Rotation of a camera looking along `direction` (a unit vector in the ground plane) with its
/// image up pointing to the sky.
///
/// Camera axes are x to the right of travel, y down, z forward.
pub fn camera_rotation(direction: Vector2<f64>) -> Basis3<f64> {
    let right = Vector3::new(direction.y, -direction.x, 0.0);
    let down = Vector3::new(0.0, 0.0, -1.0);
    let forward = Vector3::new(direction.x, direction.y, 0.0);
    // rows of the world to camera rotation
    let m = Matrix3::from_cols(right, down, forward).transpose();
    Basis3::from(Quaternion::from(m).normalize())
}

/// Generate camera positions `height` above the path and rotations looking along it.
pub fn generate_cameras(
    samples: &[f64],
    path: &PathGenerator,
    height: f64,
) -> (Vec<Point3<f64>>, Vec<Basis3<f64>>) {
    samples
        .iter()
        .map(|t| {
            let p = path.point(*t);
            (
                Point3::new(p.x, p.y, height),
                camera_rotation(path.tangent(*t)),
            )
        })
        .unzip()
}

/// A sequence of shots taken by a single camera.
#[derive(Debug, Clone)]
pub struct Trajectory {
    pub camera: Camera,
    pub positions: Vec<Point3<f64>>,
    pub rotations: Vec<Basis3<f64>>,
    /// GPS noise for the shots of this trajectory. `None` defers to the noise given when the
    /// EXIFs are generated.
    pub gps_noise: Option<NoiseSpec>,
}

impl Trajectory {
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

/// Id of the `index`th shot of a generated reconstruction.
pub fn shot_id(index: usize) -> String {
    format!("shot{}", index)
}

/// Assemble point clouds and trajectories into a reconstruction.
///
/// Points are numbered in order across `clouds`, shots in order across `trajectories`, so the
/// same inputs always give the same ids.
pub fn create_reconstruction(
    clouds: &[(&[Point3<f64>], [u8; 3])],
    trajectories: &[Trajectory],
) -> Result<Reconstruction, Error> {
    let mut reconstruction = Reconstruction::new();

    for (points, color) in clouds {
        let shift = reconstruction.num_points();
        for (i, p) in points.iter().enumerate() {
            reconstruction.add_point(Point {
                id: (shift + i).to_string(),
                coordinates: *p,
                color: Some(*color),
            });
        }
    }

    for trajectory in trajectories {
        let shift = reconstruction.num_shots();
        reconstruction.add_camera(trajectory.camera.clone());
        for (i, (position, rotation)) in trajectory
            .positions
            .iter()
            .zip(trajectory.rotations.iter())
            .enumerate()
        {
            reconstruction.add_shot(Shot {
                id: shot_id(shift + i),
                camera: trajectory.camera.id.clone(),
                pose: Pose::new(*rotation, *position),
                metadata: ShotMetadata::default(),
            })?;
        }
    }

    Ok(reconstruction)
}

#[test]
fn test_unknown_generator_kind() {
    match get_scene_generator("spiral", 10.0) {
        Err(Error::UnknownGeneratorKind(kind)) => assert_eq!(kind, "spiral"),
        other => panic!("expected an unknown generator kind error, got {:?}", other),
    }
}

#[test]
fn test_ellipse_shape() {
    let path = get_scene_generator("ellipse", 40.0).unwrap();
    assert_eq!(
        path,
        PathGenerator::Ellipse {
            x_size: 40.0,
            y_size: 10.0
        }
    );
    assert!((path.point(0.0) - Point2::new(20.0, 0.0)).magnitude() < 1e-12);
    assert!((path.point(0.25) - Point2::new(0.0, 5.0)).magnitude() < 1e-12);
    // counter clockwise
    assert!((path.tangent(0.0) - Vector2::new(0.0, 1.0)).magnitude() < 1e-12);
}

#[test]
fn test_tangent_matches_finite_difference() {
    for kind in &[GeneratorKind::Ellipse, GeneratorKind::Line, GeneratorKind::Curve] {
        let path = PathGenerator::new(*kind, 30.0);
        for t in &[0.1, 0.37, 0.8] {
            let h = 1e-6;
            let d = (path.point(t + h) - path.point(t - h)).normalize();
            assert!((path.tangent(*t) - d).magnitude() < 1e-6);
        }
    }
}

#[test]
fn test_samples_interval() {
    use rand::SeedableRng;
    let mut rng = rand::rngs::StdRng::seed_from_u64(1);
    let samples = samples_interval(5.0, 50.0, 2.0, 0.0, 100.0, &mut rng).unwrap();
    assert_eq!(samples.len(), 25);
    assert!((samples[0] - 0.05).abs() < 1e-12);
    assert!((samples[1] - 0.07).abs() < 1e-12);
    assert!(samples_interval(0.0, 0.0, 2.0, 0.5, 100.0, &mut rng)
        .unwrap()
        .is_empty());
    assert!(samples_interval(0.0, 10.0, 0.0, 0.5, 100.0, &mut rng)
        .unwrap()
        .is_empty());
}

#[test]
fn test_samples_interval_too_many() {
    use rand::SeedableRng;
    let mut rng = rand::rngs::StdRng::seed_from_u64(1);
    match samples_interval(0.0, 1e12, 1e-9, 0.0, 100.0, &mut rng) {
        Err(Error::TooManySamples { limit, .. }) => assert_eq!(limit, MAX_INTERVAL_SAMPLES),
        other => panic!("expected a too many samples error, got {:?}", other.map(|s| s.len())),
    }
    assert!(samples_interval(0.0, std::f64::INFINITY, 1.0, 0.0, 100.0, &mut rng).is_err());
    let samples = samples_interval(0.0, MAX_INTERVAL_SAMPLES as f64, 1.0, 0.0, 1e6, &mut rng);
    assert_eq!(samples.unwrap().len(), MAX_INTERVAL_SAMPLES);
}

#[test]
fn test_street_geometry() {
    use rand::SeedableRng;
    let mut rng = rand::rngs::StdRng::seed_from_u64(3);
    let path = PathGenerator::new(GeneratorKind::Line, 10.0);
    let samples = samples_random_count(30, &mut rng);
    let (walls, floor) = generate_street(&samples, &path, 2.0, 6.0, &mut rng);
    assert_eq!(walls.len(), 60);
    assert_eq!(floor.len(), 30);
    assert!(walls.iter().all(|p| (p.y.abs() - 3.0).abs() < 1e-12));
    assert!(walls.iter().all(|p| p.z >= 0.0 && p.z < 2.0));
    assert!(floor.iter().all(|p| p.z == 0.0 && p.y.abs() <= 3.0));
}

#[test]
fn test_camera_looks_along_path() {
    let path = PathGenerator::new(GeneratorKind::Ellipse, 20.0);
    let (positions, rotations) = generate_cameras(&[0.1, 0.6], &path, 1.5);
    for ((position, rotation), t) in positions.iter().zip(rotations.iter()).zip(&[0.1, 0.6]) {
        assert_eq!(position.z, 1.5);
        let d = path.tangent(*t);
        let pose = Pose::new(*rotation, *position);
        // a point ahead is on the optical axis
        let ahead = pose.to_camera(position + Vector3::new(d.x, d.y, 0.0) * 4.0);
        assert!(ahead.x.abs() < 1e-9 && ahead.y.abs() < 1e-9 && (ahead.z - 4.0).abs() < 1e-9);
        // the sky is up in the image
        let above = pose.to_camera(position + Vector3::new(0.0, 0.0, 1.0));
        assert!((above.y + 1.0).abs() < 1e-9);
    }
}

#[test]
fn test_create_reconstruction_ids() {
    let camera = Camera::new(crate::camera::CameraKind::Perspective, "c", 1.0, 0.0, 0.0);
    let trajectory = Trajectory {
        camera: camera.clone(),
        positions: vec![Point3::new(0.0, 0.0, 0.0); 3],
        rotations: vec![Basis3::one(); 3],
        gps_noise: None,
    };
    let floor = vec![Point3::new(1.0, 0.0, 0.0); 2];
    let walls = vec![Point3::new(2.0, 0.0, 0.0); 4];
    let r = create_reconstruction(
        &[(floor.as_slice(), [1, 2, 3]), (walls.as_slice(), [4, 5, 6])],
        &[trajectory.clone(), trajectory],
    )
    .unwrap();
    assert_eq!(r.num_points(), 6);
    assert_eq!(r.points["1"].color, Some([1, 2, 3]));
    assert_eq!(r.points["5"].color, Some([4, 5, 6]));
    assert_eq!(r.num_shots(), 6);
    assert_eq!(r.num_cameras(), 1);
    assert!(r.shots.contains_key("shot5"));
}
