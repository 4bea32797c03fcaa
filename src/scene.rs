//! Fluent builder for synthetic street scenes.
use cgmath::{Basis3, Point3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use std::collections::BTreeMap;

use crate::camera::Camera;
use crate::generate::*;
use crate::geo::GeoReference;
use crate::metrics::{self, ErrorReport};
use crate::noise::{perturb_points, perturb_rotations, NoiseSpec};
use crate::observations::{generate_exifs, generate_track_data, ExifRecord, TrackData};
use crate::observations::DEFAULT_SPEED_MS;
use crate::reconstruction::{Reconstruction, Shot};
use crate::Error;

/// Color of floor points.
pub const FLOOR_COLOR: [u8; 3] = [120, 90, 10];
/// Color of wall points.
pub const WALL_COLOR: [u8; 3] = [10, 90, 130];

/// Noise applied to a camera sequence.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SequenceNoise {
    /// Noise on camera positions, in meters.
    pub position: NoiseSpec,
    /// Noise on camera rotations, in radians.
    pub rotation: NoiseSpec,
    /// GPS noise of the sequence's EXIFs. `None` uses the noise given to
    /// [`SyntheticScene::get_scene_exifs`].
    pub gps: Option<NoiseSpec>,
}

/// A street scene under construction.
///
/// `add_street` must be called before anything that needs scene geometry: adding camera
/// sequences, perturbing the street or deriving reconstructions fail with
/// [`Error::UninitializedScene`] otherwise.
pub struct SyntheticScene<R: Rng = StdRng> {
    generator: PathGenerator,
    rng: R,
    wall_points: Option<Vec<Point3<f64>>>,
    floor_points: Option<Vec<Point3<f64>>>,
    width: Option<f64>,
    trajectories: Vec<Trajectory>,
    geo_reference: GeoReference,
    exifs: Vec<ExifRecord>,
    verbose: bool,
}

impl SyntheticScene<StdRng> {
    /// Scene with a deterministic random source: the same seed and calls give the same scene.
    pub fn from_seed(generator: PathGenerator, seed: u64) -> Self {
        SyntheticScene::new(generator, StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng> SyntheticScene<R> {
    pub fn new(generator: PathGenerator, rng: R) -> Self {
        SyntheticScene {
            generator,
            rng,
            wall_points: None,
            floor_points: None,
            width: None,
            trajectories: Vec::new(),
            geo_reference: GeoReference::default(),
            exifs: Vec::new(),
            verbose: false,
        }
    }

    /// Show progress bars for long computations.
    pub fn verbose(&mut self, verbose: bool) -> &mut Self {
        self.verbose = verbose;
        self
    }

    /// Geodetic position of the scene origin, used for GPS records.
    pub fn geo_reference(&mut self, reference: GeoReference) -> &mut Self {
        self.geo_reference = reference;
        self
    }

    pub fn generator(&self) -> &PathGenerator {
        &self.generator
    }

    /// Street width, once a street was added.
    pub fn width(&self) -> Option<f64> {
        self.width
    }

    pub fn wall_points(&self) -> Option<&[Point3<f64>]> {
        self.wall_points.as_ref().map(|p| p.as_slice())
    }

    pub fn floor_points(&self) -> Option<&[Point3<f64>]> {
        self.floor_points.as_ref().map(|p| p.as_slice())
    }

    pub fn trajectories(&self) -> &[Trajectory] {
        &self.trajectories
    }

    /// Lay a street of walls and floor along the path, from `points_count / 3` random positions.
    /// Replaces any previous street.
    pub fn add_street(&mut self, points_count: usize, height: f64, width: f64) -> &mut Self {
        let samples = samples_random_count(points_count / 3, &mut self.rng);
        let (walls, floor) =
            generate_street(&samples, &self.generator, height, width, &mut self.rng);
        log::debug!(
            "street of {} wall and {} floor points along {}",
            walls.len(),
            floor.len(),
            self.generator.length()
        );
        self.wall_points = Some(walls);
        self.floor_points = Some(floor);
        self.width = Some(width);
        self
    }

    /// Perturb the wall points in place.
    pub fn perturb_walls(&mut self, noise: NoiseSpec) -> Result<&mut Self, Error> {
        let walls = self
            .wall_points
            .as_mut()
            .ok_or(Error::UninitializedScene("perturb_walls"))?;
        perturb_points(walls, &noise, &mut self.rng)?;
        log::debug!("perturbed walls with noise {}", noise);
        Ok(self)
    }

    /// Perturb the floor points in place.
    pub fn perturb_floor(&mut self, noise: NoiseSpec) -> Result<&mut Self, Error> {
        let floor = self
            .floor_points
            .as_mut()
            .ok_or(Error::UninitializedScene("perturb_floor"))?;
        perturb_points(floor, &noise, &mut self.rng)?;
        log::debug!("perturbed floor with noise {}", noise);
        Ok(self)
    }

    /// Drive `camera` along the path, from `start` over `length` meters, taking a shot every
    /// `interval` meters (jittered by a quarter of `interval`) at `height` above the ground.
    ///
    /// Every call adds an independent sequence of shots.
    pub fn add_camera_sequence(
        &mut self,
        camera: Camera,
        start: f64,
        length: f64,
        height: f64,
        interval: f64,
        noise: SequenceNoise,
    ) -> Result<&mut Self, Error> {
        if self.wall_points.is_none() {
            return Err(Error::UninitializedScene("add_camera_sequence"));
        }
        let samples = samples_interval(
            start,
            length,
            interval,
            0.25 * interval,
            self.generator.length(),
            &mut self.rng,
        )?;
        let (mut positions, mut rotations): (Vec<Point3<f64>>, Vec<Basis3<f64>>) =
            generate_cameras(&samples, &self.generator, height);
        perturb_points(&mut positions, &noise.position, &mut self.rng)?;
        perturb_rotations(&mut rotations, &noise.rotation, &mut self.rng)?;

        log::debug!(
            "camera sequence of {} shots with camera {}",
            positions.len(),
            camera.id
        );
        self.trajectories.push(Trajectory {
            camera,
            positions,
            rotations,
            gps_noise: noise.gps,
        });
        Ok(self)
    }

    fn clouds(&self, operation: &'static str) -> Result<[(&[Point3<f64>], [u8; 3]); 2], Error> {
        match (&self.floor_points, &self.wall_points) {
            (Some(floor), Some(walls)) => Ok([
                (floor.as_slice(), FLOOR_COLOR),
                (walls.as_slice(), WALL_COLOR),
            ]),
            _ => Err(Error::UninitializedScene(operation)),
        }
    }

    /// Ground truth reconstruction of the scene in its current state.
    pub fn get_reconstruction(&self) -> Result<Reconstruction, Error> {
        let clouds = self.clouds("get_reconstruction")?;
        let reconstruction = create_reconstruction(&clouds, &self.trajectories)?;
        log::debug!("assembled {}", reconstruction);
        Ok(reconstruction)
    }

    /// One EXIF record per shot, with GPS positions perturbed by the noise of their sequence,
    /// or `gps_noise` for sequences without one.
    ///
    /// The records are kept and their GPS readings are what [`SyntheticScene::compare`]
    /// measures GPS errors against.
    pub fn get_scene_exifs(&mut self, gps_noise: NoiseSpec) -> Result<Vec<ExifRecord>, Error> {
        let reconstruction = self.get_reconstruction()?;
        // same numbering as create_reconstruction
        let noises: BTreeMap<String, NoiseSpec> = self
            .trajectories
            .iter()
            .flat_map(|t| std::iter::repeat(t.gps_noise.unwrap_or(gps_noise)).take(t.len()))
            .enumerate()
            .map(|(i, n)| (shot_id(i), n))
            .collect();
        let exifs = generate_exifs(
            &reconstruction,
            |shot: &Shot| noises.get(&shot.id).copied().unwrap_or(gps_noise),
            &self.geo_reference,
            DEFAULT_SPEED_MS,
            &mut self.rng,
        )?;
        log::debug!("generated {} exifs", exifs.len());
        self.exifs = exifs.clone();
        Ok(exifs)
    }

    /// Observations of every point within `maximum_depth` of the shots, with projections and
    /// depths perturbed by `noise`.
    pub fn get_tracks_data(
        &mut self,
        maximum_depth: f64,
        noise: NoiseSpec,
    ) -> Result<TrackData, Error> {
        let reconstruction = self.get_reconstruction()?;
        generate_track_data(
            &reconstruction,
            maximum_depth,
            &noise,
            self.verbose,
            &mut self.rng,
        )
    }

    /// Score `estimate` against the ground truth. GPS errors are measured against the records of
    /// the last [`SyntheticScene::get_scene_exifs`] call, if any.
    pub fn compare(&self, estimate: &Reconstruction) -> Result<ErrorReport, Error> {
        let mut reference = self.get_reconstruction()?;
        reference.apply_exifs(&self.exifs);
        Ok(metrics::compare(&reference, estimate))
    }
}

#[cfg(test)]
fn test_scene() -> SyntheticScene {
    let generator = PathGenerator::new(GeneratorKind::Line, 40.0);
    let mut scene = SyntheticScene::from_seed(generator, 11);
    scene.add_street(90, 3.0, 8.0);
    scene
}

#[cfg(test)]
fn test_camera(id: &str) -> Camera {
    Camera::new(crate::camera::CameraKind::Perspective, id, 0.8, 0.0, 0.0)
}

#[test]
fn test_uninitialized_scene() {
    let generator = PathGenerator::new(GeneratorKind::Line, 40.0);
    let mut scene = SyntheticScene::from_seed(generator, 0);
    assert!(scene.get_reconstruction().is_err());
    assert!(scene.perturb_floor(NoiseSpec::Isotropic(0.1)).is_err());
    match scene.add_camera_sequence(test_camera("c"), 0.0, 10.0, 1.5, 2.0, Default::default()) {
        Err(Error::UninitializedScene(operation)) => assert_eq!(operation, "add_camera_sequence"),
        Err(e) => panic!("unexpected error {}", e),
        Ok(_) => panic!("camera sequence added to a scene without street"),
    }
    assert!(scene.trajectories().is_empty());
}

#[test]
fn test_street() {
    let scene = test_scene();
    assert_eq!(scene.wall_points().unwrap().len(), 60);
    assert_eq!(scene.floor_points().unwrap().len(), 30);
    assert_eq!(scene.width(), Some(8.0));
    let r = scene.get_reconstruction().unwrap();
    assert_eq!(r.num_points(), 90);
    assert_eq!(r.points["0"].color, Some(FLOOR_COLOR));
    assert_eq!(r.points["89"].color, Some(WALL_COLOR));
}

#[test]
fn test_perturb_none_keeps_scene() {
    let mut scene = test_scene();
    let before = scene.get_reconstruction().unwrap();
    scene
        .perturb_walls(NoiseSpec::None)
        .unwrap()
        .perturb_floor(NoiseSpec::None)
        .unwrap();
    assert_eq!(scene.get_reconstruction().unwrap(), before);

    scene.perturb_floor(NoiseSpec::Isotropic(0.2)).unwrap();
    let after = scene.get_reconstruction().unwrap();
    assert_ne!(after.points["0"], before.points["0"]);
    // walls untouched
    assert_eq!(after.points["89"], before.points["89"]);
}

#[test]
fn test_sequences_accumulate() {
    let mut scene = test_scene();
    scene
        .add_camera_sequence(test_camera("a"), 0.0, 20.0, 1.5, 2.0, Default::default())
        .unwrap()
        .add_camera_sequence(test_camera("b"), 20.0, 10.0, 1.5, 1.0, Default::default())
        .unwrap();
    let r = scene.get_reconstruction().unwrap();
    assert_eq!(r.num_cameras(), 2);
    assert_eq!(r.num_shots(), 20);
    assert_eq!(r.shots["shot9"].camera, "a");
    assert_eq!(r.shots["shot10"].camera, "b");
    assert!(r.shots.values().all(|s| s.pose.origin.z == 1.5));
}

#[test]
fn test_gps_noise_per_sequence() {
    let mut scene = test_scene();
    let quiet = SequenceNoise {
        gps: Some(NoiseSpec::None),
        ..Default::default()
    };
    scene
        .add_camera_sequence(test_camera("a"), 0.0, 10.0, 1.5, 2.0, quiet)
        .unwrap()
        .add_camera_sequence(test_camera("b"), 10.0, 10.0, 1.5, 2.0, Default::default())
        .unwrap();
    let exifs = scene.get_scene_exifs(NoiseSpec::Isotropic(3.0)).unwrap();
    assert_eq!(exifs.len(), 10);
    let r = scene.get_reconstruction().unwrap();
    for exif in &exifs {
        let truth = r.shots[&exif.shot_id].pose.origin;
        if exif.camera == "a" {
            assert_eq!(exif.gps.position, truth);
            assert_eq!(exif.gps.dop, 0.0);
        } else {
            assert_ne!(exif.gps.position, truth);
            assert_eq!(exif.gps.dop, 3.0);
        }
    }

    // the truth is compared to the noisy GPS readings
    let report = scene.compare(&r).unwrap();
    assert!(report.gps_average > 0.0);
    assert_eq!(report.position_average, 0.0);
}

#[test]
fn test_tracks_respect_maximum_depth() {
    let mut scene = test_scene();
    scene
        .add_camera_sequence(test_camera("a"), 0.0, 30.0, 1.5, 3.0, Default::default())
        .unwrap();
    let tracks = scene
        .get_tracks_data(12.0, NoiseSpec::Isotropic(0.05))
        .unwrap();
    assert!(tracks.num_observations() > 0);
    for track in tracks.tracks.values() {
        for observation in track.values() {
            assert!(observation.depth > 0.0 && observation.depth <= 12.0);
        }
    }
}
