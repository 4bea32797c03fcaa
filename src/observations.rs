//! Synthetic inputs for the pipeline under test: EXIF/GPS records and feature tracks.
use cgmath::prelude::*;
use cgmath::{Point2, Point3};
use indicatif::ParallelProgressIterator;
use itertools::Itertools;
use rand::Rng;
use rayon::prelude::*;
use rstar::RTree;

use std::collections::BTreeMap;
use std::convert::TryInto;

use crate::generate::progress_bar;
use crate::geo::{lla_from_topocentric, GeoReference};
use crate::noise::{perturb_points, NoiseSpec};
use crate::reconstruction::{Point, Reconstruction, Shot};
use crate::Error;

/// Speed of the simulated capture vehicle, used to derive capture times.
pub const DEFAULT_SPEED_MS: f64 = 10.0;
/// Scale of every synthetic feature, in normalized image coordinates.
pub const DEFAULT_FEATURE_SCALE: f64 = 0.004;

/// Simulated GPS reading of a shot.
#[derive(Debug, Clone, PartialEq)]
pub struct GpsRecord {
    /// Noisy position in the topocentric frame of the scene.
    pub position: Point3<f64>,
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: f64,
    /// Dilution of precision, the magnitude of the injected noise.
    pub dop: f64,
}

/// Simulated EXIF of a shot.
#[derive(Debug, Clone, PartialEq)]
pub struct ExifRecord {
    pub shot_id: String,
    pub camera: String,
    pub make: String,
    pub width: u32,
    pub height: u32,
    pub focal_ratio: f64,
    /// Seconds since the first shot.
    pub capture_time: f64,
    pub gps: GpsRecord,
}

// Shots ordered as they were generated: "shot2" before "shot10".
fn shots_in_capture_order(reconstruction: &Reconstruction) -> Vec<&Shot> {
    reconstruction
        .shots
        .values()
        .sorted_by(|a, b| (a.id.len(), &a.id).cmp(&(b.id.len(), &b.id)))
        .collect()
}

/// Generate one EXIF record per shot, with GPS positions perturbed by `gps_noise(shot)`.
///
/// Capture times assume the shots are taken in order by a vehicle driving at `speed_ms`.
pub fn generate_exifs<R, F>(
    reconstruction: &Reconstruction,
    gps_noise: F,
    reference: &GeoReference,
    speed_ms: f64,
    rng: &mut R,
) -> Result<Vec<ExifRecord>, Error>
where
    R: Rng,
    F: Fn(&Shot) -> NoiseSpec,
{
    let mut previous: Option<Point3<f64>> = None;
    let mut capture_time = 0.0;
    let mut exifs = Vec::with_capacity(reconstruction.num_shots());
    for shot in shots_in_capture_order(reconstruction) {
        let origin = shot.pose.origin;
        if let Some(p) = previous {
            capture_time += (origin - p).magnitude() / speed_ms;
        }
        previous = Some(origin);

        let noise = gps_noise(shot);
        let mut position = [origin];
        perturb_points(&mut position, &noise, rng)?;
        let (latitude, longitude, altitude) = lla_from_topocentric(position[0], reference);

        // shots always reference a camera of their reconstruction
        let (width, height, focal) = match reconstruction.shot_camera(shot) {
            Some(c) => (c.width, c.height, c.focal),
            None => continue,
        };
        exifs.push(ExifRecord {
            shot_id: shot.id.clone(),
            camera: shot.camera.clone(),
            make: shot.camera.clone(),
            width: width,
            height: height,
            focal_ratio: focal,
            capture_time: capture_time,
            gps: GpsRecord {
                position: position[0],
                latitude: latitude,
                longitude: longitude,
                altitude: altitude,
                dop: noise.magnitude(),
            },
        });
    }
    Ok(exifs)
}

impl Reconstruction {
    /// Attach the GPS readings and capture times of `exifs` to the matching shots, the way a
    /// pipeline loads its priors.
    pub fn apply_exifs(&mut self, exifs: &[ExifRecord]) {
        for exif in exifs {
            if let Some(shot) = self.shots.get_mut(&exif.shot_id) {
                shot.metadata.gps_position = Some(exif.gps.position);
                shot.metadata.gps_dop = Some(exif.gps.dop);
                shot.metadata.capture_time = Some(exif.capture_time);
            }
        }
    }
}

/// A point seen by a shot.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    /// Index of the feature in the shot's feature list.
    pub feature_id: usize,
    /// Noisy normalized image coordinates.
    pub projection: Point2<f64>,
    /// Noisy distance along the optical axis.
    pub depth: f64,
    pub scale: f64,
    pub color: Option<[u8; 3]>,
}

/// Feature tracks: for every observed point, its observation in every shot seeing it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackData {
    pub tracks: BTreeMap<String, BTreeMap<String, Observation>>,
}

impl TrackData {
    pub fn num_tracks(&self) -> usize {
        self.tracks.len()
    }

    /// Number of point-shot observations.
    pub fn num_observations(&self) -> usize {
        self.tracks.values().map(|t| t.len()).sum()
    }

    /// Features of every shot that sees at least one point, as `(point id, observation)` sorted
    /// by feature id.
    pub fn features(&self) -> BTreeMap<&str, Vec<(&str, &Observation)>> {
        let mut features: BTreeMap<&str, Vec<(&str, &Observation)>> = BTreeMap::new();
        for (point_id, track) in &self.tracks {
            for (shot_id, observation) in track {
                features
                    .entry(shot_id.as_str())
                    .or_default()
                    .push((point_id.as_str(), observation));
            }
        }
        for f in features.values_mut() {
            f.sort_by_key(|(_, o)| o.feature_id);
        }
        features
    }
}

#[derive(Debug, Clone, PartialEq, Copy)]
struct WrappedPoint(Point3<f64>, usize);

impl rstar::Point for WrappedPoint {
    type Scalar = f64;
    const DIMENSIONS: usize = 3;

    fn generate(generator: impl Fn(usize) -> Self::Scalar) -> Self {
        WrappedPoint(
            Point3::new(generator(0), generator(1), generator(2)),
            std::usize::MAX,
        )
    }

    fn nth(&self, index: usize) -> Self::Scalar {
        let WrappedPoint(p, _) = self;
        match index {
            0 => p.x,
            1 => p.y,
            2 => p.z,
            _ => unreachable!(),
        }
    }

    fn nth_mut(&mut self, index: usize) -> &mut Self::Scalar {
        let WrappedPoint(p, _) = self;
        match index {
            0 => &mut p.x,
            1 => &mut p.y,
            2 => &mut p.z,
            _ => unreachable!(),
        }
    }
}

/// Noise free observation of point `index` by a shot.
struct Candidate {
    index: usize,
    projection: Point2<f64>,
    depth: f64,
}

/// Points within `maximum_depth` of each shot, in front of it and projecting inside its image.
fn visible_points(
    reconstruction: &Reconstruction,
    shots: &[&Shot],
    points: &[&Point],
    maximum_depth: f64,
    verbose: bool,
) -> Vec<Vec<Candidate>> {
    let rtree = RTree::bulk_load(
        points
            .iter()
            .enumerate()
            .map(|(i, p)| WrappedPoint(p.coordinates, i))
            .collect(),
    );
    shots
        .par_iter()
        .progress_with(progress_bar(
            shots.len().try_into().unwrap_or(u64::MAX),
            "Computing visibility",
            verbose,
        ))
        .map(|shot| {
            let camera = match reconstruction.shot_camera(shot) {
                Some(c) => c,
                None => return Vec::new(),
            };
            let mut candidates = rtree
                .locate_within_distance(
                    WrappedPoint(shot.pose.origin, std::usize::MAX),
                    maximum_depth * maximum_depth,
                )
                .filter_map(|WrappedPoint(p, i)| {
                    let p_camera = shot.pose.to_camera(*p);
                    camera
                        .project(p_camera)
                        .filter(|uv| camera.is_inside(*uv))
                        .map(|uv| Candidate {
                            index: *i,
                            projection: uv,
                            depth: p_camera.z,
                        })
                })
                .collect::<Vec<_>>();
            // r-tree order is arbitrary
            candidates.sort_by_key(|c| c.index);
            candidates
        })
        .collect()
}

/// Generate the observations of every point within `maximum_depth` of a shot.
///
/// Projections get Gaussian noise with the x and y sigmas of `noise`, depths get Gaussian noise
/// proportional to the depth with the z sigma of `noise`. The depth cutoff is applied to the
/// noisy depth: every emitted depth is in `(0, maximum_depth]`.
pub fn generate_track_data<R: Rng>(
    reconstruction: &Reconstruction,
    maximum_depth: f64,
    noise: &NoiseSpec,
    verbose: bool,
    rng: &mut R,
) -> Result<TrackData, Error> {
    // fail before the visibility pass
    noise.validate()?;
    let shots = shots_in_capture_order(reconstruction);
    let points = reconstruction.points.values().collect::<Vec<_>>();
    let visibility = visible_points(reconstruction, &shots, &points, maximum_depth, verbose);

    let mut data = TrackData::default();
    for (shot, candidates) in shots.iter().zip(visibility) {
        let mut feature_id = 0;
        for candidate in candidates {
            // x, y perturb the projection, z is the relative depth error
            let mut sample = [Point3::new(candidate.projection.x, candidate.projection.y, 1.0)];
            perturb_points(&mut sample, noise, rng)?;
            let depth = candidate.depth * sample[0].z;
            if depth <= 0.0 || depth > maximum_depth {
                continue;
            }

            let point = points[candidate.index];
            data.tracks
                .entry(point.id.clone())
                .or_default()
                .insert(
                    shot.id.clone(),
                    Observation {
                        feature_id: feature_id,
                        projection: Point2::new(sample[0].x, sample[0].y),
                        depth: depth,
                        scale: DEFAULT_FEATURE_SCALE,
                        color: point.color,
                    },
                );
            feature_id += 1;
        }
    }
    log::info!(
        "generated {} observations of {} tracks",
        data.num_observations(),
        data.num_tracks()
    );
    Ok(data)
}

#[cfg(test)]
fn test_reconstruction() -> Reconstruction {
    use crate::camera::{Camera, CameraKind};
    use crate::reconstruction::{Pose, ShotMetadata};
    use cgmath::Basis3;

    let mut r = Reconstruction::new();
    r.add_camera(Camera::new(CameraKind::Perspective, "cam", 1.0, 0.0, 0.0));
    for i in 0..3 {
        r.add_shot(Shot {
            id: format!("shot{}", i),
            camera: "cam".to_string(),
            pose: Pose::new(Basis3::one(), Point3::new(i as f64 * 3.0, 0.0, 0.0)),
            metadata: ShotMetadata::default(),
        })
        .unwrap();
    }
    // points along the optical axis of the first shot, and one behind it
    for (i, z) in [2.0, 5.0, 9.0, -1.0].iter().enumerate() {
        r.add_point(Point {
            id: i.to_string(),
            coordinates: Point3::new(0.0, 0.0, *z),
            color: Some([1, 2, 3]),
        });
    }
    r
}

#[cfg(test)]
fn test_rng() -> rand::rngs::StdRng {
    use rand::SeedableRng;
    rand::rngs::StdRng::seed_from_u64(11)
}

#[test]
fn test_exifs_without_noise() {
    let r = test_reconstruction();
    let exifs = generate_exifs(
        &r,
        |_| NoiseSpec::None,
        &GeoReference::default(),
        DEFAULT_SPEED_MS,
        &mut test_rng(),
    )
    .unwrap();
    assert_eq!(exifs.len(), 3);
    for exif in &exifs {
        assert_eq!(exif.gps.position, r.shots[&exif.shot_id].pose.origin);
        assert_eq!(exif.gps.dop, 0.0);
        assert_eq!((exif.width, exif.height), (2000, 1600));
    }
    assert_eq!(exifs[0].capture_time, 0.0);
    assert!((exifs[2].capture_time - 0.6).abs() < 1e-12);
}

#[test]
fn test_exifs_with_noise() {
    let mut r = test_reconstruction();
    let exifs = generate_exifs(
        &r,
        |s| {
            if s.id == "shot1" {
                NoiseSpec::None
            } else {
                NoiseSpec::Isotropic(2.0)
            }
        },
        &GeoReference::default(),
        DEFAULT_SPEED_MS,
        &mut test_rng(),
    )
    .unwrap();
    assert_ne!(exifs[0].gps.position, r.shots["shot0"].pose.origin);
    assert_eq!(exifs[1].gps.position, r.shots["shot1"].pose.origin);
    assert_eq!(exifs[2].gps.dop, 2.0);

    r.apply_exifs(&exifs);
    assert_eq!(
        r.shots["shot0"].metadata.gps_position,
        Some(exifs[0].gps.position)
    );
}

#[test]
fn test_tracks_without_noise() {
    let r = test_reconstruction();
    let data = generate_track_data(&r, 6.0, &NoiseSpec::None, false, &mut test_rng()).unwrap();
    // shot0 sees the points at depth 2 and 5, shot1 at 3 is beside them on the x axis
    let track = &data.tracks["0"];
    assert_eq!(track["shot0"].depth, 2.0);
    assert_eq!(track["shot0"].projection, Point2::new(0.0, 0.0));
    assert_eq!(track["shot0"].color, Some([1, 2, 3]));
    assert_eq!(data.tracks["1"]["shot0"].depth, 5.0);
    assert_eq!(data.tracks["1"]["shot0"].feature_id, 1);
    assert!(!data.tracks.contains_key("2"));
    assert!(!data.tracks.contains_key("3"));
    assert_eq!(data.features()["shot0"].len(), 2);
}

#[test]
fn test_track_depth_cutoff_with_noise() {
    let r = test_reconstruction();
    let maximum_depth = 5.0;
    let data = generate_track_data(
        &r,
        maximum_depth,
        &NoiseSpec::Isotropic(0.2),
        false,
        &mut test_rng(),
    )
    .unwrap();
    for track in data.tracks.values() {
        for observation in track.values() {
            assert!(observation.depth > 0.0 && observation.depth <= maximum_depth);
        }
    }
}
