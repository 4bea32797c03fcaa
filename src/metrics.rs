//! Error metrics between a ground truth reconstruction and an estimate of it.
//!
//! Entities are matched by id: a shot or point of the estimate is compared to the reference
//! entity with the same id, entities missing on either side are only counted by the
//! completeness ratios.
use cgmath::prelude::*;
use cgmath::{Quaternion, Vector3};

use std::fmt;

use crate::reconstruction::Reconstruction;

/// Summary of the errors of an estimate. Averages and standard deviations of an empty set of
/// matched entities are 0.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ErrorReport {
    pub position_average: f64,
    pub position_std: f64,
    pub gps_average: f64,
    pub gps_std: f64,
    /// Radians.
    pub rotation_average: f64,
    /// Radians.
    pub rotation_std: f64,
    pub points_average: f64,
    pub points_std: f64,
    pub ratio_cameras: f64,
    pub ratio_points: f64,
}

impl ErrorReport {
    /// Name and value of every metric.
    pub fn fields(&self) -> [(&'static str, f64); 10] {
        [
            ("position_average", self.position_average),
            ("position_std", self.position_std),
            ("gps_average", self.gps_average),
            ("gps_std", self.gps_std),
            ("rotation_average", self.rotation_average),
            ("rotation_std", self.rotation_std),
            ("points_average", self.points_average),
            ("points_std", self.points_std),
            ("ratio_cameras", self.ratio_cameras),
            ("ratio_points", self.ratio_points),
        ]
    }
}

impl fmt::Display for ErrorReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (name, value)) in self.fields().iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{:<17} {:.6}", name, value)?;
        }
        Ok(())
    }
}

/// Estimated minus reference position of every shot present in both reconstructions.
pub fn position_errors(reference: &Reconstruction, estimate: &Reconstruction) -> Vec<Vector3<f64>> {
    estimate
        .shots
        .values()
        .filter_map(|s| {
            reference
                .shots
                .get(&s.id)
                .map(|r| s.pose.origin - r.pose.origin)
        })
        .collect()
}

/// Estimated position minus GPS reading of every matched shot. The GPS reading comes from the
/// estimate's metadata, or the reference's when the estimate has none.
pub fn gps_errors(reference: &Reconstruction, estimate: &Reconstruction) -> Vec<Vector3<f64>> {
    estimate
        .shots
        .values()
        .filter_map(|s| {
            let r = reference.shots.get(&s.id)?;
            let gps = s.metadata.gps_position.or(r.metadata.gps_position)?;
            Some(s.pose.origin - gps)
        })
        .collect()
}

/// Angle between the reference and estimated rotations of every matched shot, in radians.
pub fn rotation_errors(reference: &Reconstruction, estimate: &Reconstruction) -> Vec<f64> {
    estimate
        .shots
        .values()
        .filter_map(|s| {
            let r = reference.shots.get(&s.id)?;
            let q1 = Quaternion::from(r.pose.rotation);
            let q2 = Quaternion::from(s.pose.rotation);
            // vector part of q1^-1 * q2, so identical rotations give exactly 0
            let v = q2.v * q1.s - q1.v * q2.s - q1.v.cross(q2.v);
            let s = q1.s * q2.s + q1.v.dot(q2.v);
            Some(2.0 * v.magnitude().atan2(s.abs()))
        })
        .collect()
}

/// Estimated minus reference coordinates of every point present in both reconstructions.
pub fn points_errors(reference: &Reconstruction, estimate: &Reconstruction) -> Vec<Vector3<f64>> {
    estimate
        .points
        .values()
        .filter_map(|p| {
            reference
                .points
                .get(&p.id)
                .map(|r| p.coordinates - r.coordinates)
        })
        .collect()
}

fn ratio(estimated: usize, reference: usize) -> f64 {
    if reference == 0 {
        0.0
    } else {
        estimated as f64 / reference as f64
    }
}

/// Fraction of the reference shots and points present in the estimate.
pub fn completeness_errors(reference: &Reconstruction, estimate: &Reconstruction) -> (f64, f64) {
    (
        ratio(estimate.num_shots(), reference.num_shots()),
        ratio(estimate.num_points(), reference.num_points()),
    )
}

// Norms of the per axis mean and population standard deviation.
fn vector_statistics(errors: &[Vector3<f64>]) -> (f64, f64) {
    if errors.is_empty() {
        return (0.0, 0.0);
    }
    let n = errors.len() as f64;
    let mean = errors.iter().fold(Vector3::zero(), |acc, e| acc + e) / n;
    let variance = errors.iter().fold(Vector3::zero(), |acc, e| {
        let d = e - mean;
        acc + Vector3::new(d.x * d.x, d.y * d.y, d.z * d.z)
    }) / n;
    let std = Vector3::new(variance.x.sqrt(), variance.y.sqrt(), variance.z.sqrt());
    (mean.magnitude(), std.magnitude())
}

fn scalar_statistics(errors: &[f64]) -> (f64, f64) {
    if errors.is_empty() {
        return (0.0, 0.0);
    }
    let n = errors.len() as f64;
    let mean = errors.iter().sum::<f64>() / n;
    let variance = errors.iter().map(|e| (e - mean) * (e - mean)).sum::<f64>() / n;
    (mean, variance.sqrt())
}

/// Score `estimate` against the ground truth `reference`.
pub fn compare(reference: &Reconstruction, estimate: &Reconstruction) -> ErrorReport {
    let (position_average, position_std) =
        vector_statistics(&position_errors(reference, estimate));
    let (gps_average, gps_std) = vector_statistics(&gps_errors(reference, estimate));
    let (rotation_average, rotation_std) =
        scalar_statistics(&rotation_errors(reference, estimate));
    let (points_average, points_std) = vector_statistics(&points_errors(reference, estimate));
    let (ratio_cameras, ratio_points) = completeness_errors(reference, estimate);

    ErrorReport {
        position_average,
        position_std,
        gps_average,
        gps_std,
        rotation_average,
        rotation_std,
        points_average,
        points_std,
        ratio_cameras,
        ratio_points,
    }
}

#[cfg(test)]
fn test_reconstruction() -> Reconstruction {
    use crate::camera::{Camera, CameraKind};
    use crate::reconstruction::{from_rodrigues, Point, Pose, Shot, ShotMetadata};
    use cgmath::Point3;

    let mut r = Reconstruction::new();
    r.add_camera(Camera::new(CameraKind::Perspective, "c", 1.0, 0.0, 0.0));
    for i in 0..4 {
        r.add_shot(Shot {
            id: format!("shot{}", i),
            camera: "c".to_string(),
            pose: Pose::new(
                from_rodrigues(Vector3::new(0.1 * i as f64, 0.5, -0.2)),
                Point3::new(i as f64, 1.0, 1.5),
            ),
            metadata: ShotMetadata::default(),
        })
        .unwrap();
        r.add_point(Point {
            id: i.to_string(),
            coordinates: Point3::new(i as f64, -2.0, 0.0),
            color: None,
        });
    }
    r
}

#[test]
fn test_compare_identical() {
    let r = test_reconstruction();
    let report = compare(&r, &r);
    assert_eq!(report.position_average, 0.0);
    assert_eq!(report.position_std, 0.0);
    assert_eq!(report.rotation_average, 0.0);
    assert_eq!(report.points_average, 0.0);
    // no GPS readings to compare to
    assert_eq!(report.gps_average, 0.0);
    assert_eq!(report.ratio_cameras, 1.0);
    assert_eq!(report.ratio_points, 1.0);
}

#[test]
fn test_compare_empty_estimate() {
    let r = test_reconstruction();
    let report = compare(&r, &Reconstruction::new());
    assert_eq!(report, ErrorReport::default());
    let report = compare(&Reconstruction::new(), &Reconstruction::new());
    assert_eq!(report, ErrorReport::default());
}

#[test]
fn test_constant_offset() {
    use approx::assert_relative_eq;
    let reference = test_reconstruction();
    let mut estimate = reference.clone();
    for s in estimate.shots.values_mut() {
        s.pose.origin += Vector3::new(3.0, 4.0, 0.0);
    }
    estimate.points.remove("0");
    let report = compare(&reference, &estimate);
    assert_relative_eq!(report.position_average, 5.0, epsilon = 1e-12);
    assert_relative_eq!(report.position_std, 0.0, epsilon = 1e-12);
    assert_relative_eq!(report.ratio_points, 0.75);
    assert_eq!(report.ratio_cameras, 1.0);
}

#[test]
fn test_rotation_error_angle() {
    use crate::reconstruction::from_rodrigues;
    use approx::assert_relative_eq;
    let reference = test_reconstruction();
    let mut estimate = reference.clone();
    for s in estimate.shots.values_mut() {
        // rotate the camera frame by 0.3 rad
        s.pose.rotation = from_rodrigues(Vector3::new(0.0, 0.0, 0.3)) * s.pose.rotation;
    }
    let errors = rotation_errors(&reference, &estimate);
    assert_eq!(errors.len(), 4);
    for e in errors {
        assert_relative_eq!(e, 0.3, epsilon = 1e-9);
    }
}

#[test]
fn test_gps_errors_fall_back_to_reference() {
    use cgmath::Point3;
    let mut reference = test_reconstruction();
    let estimate = reference.clone();
    let shot = reference.shots.get_mut("shot2").unwrap();
    shot.metadata.gps_position = Some(shot.pose.origin + Vector3::new(0.0, 0.0, 2.0));
    let errors = gps_errors(&reference, &estimate);
    assert_eq!(errors, vec![Vector3::new(0.0, 0.0, -2.0)]);

    let mut estimate = estimate;
    estimate.shots.get_mut("shot2").unwrap().metadata.gps_position =
        Some(Point3::new(2.0, 1.0, 1.0));
    let errors = gps_errors(&reference, &estimate);
    assert_eq!(errors, vec![Vector3::new(0.0, 0.0, 0.5)]);
}

#[test]
fn test_report_display() {
    let report = ErrorReport {
        ratio_cameras: 1.0,
        ..ErrorReport::default()
    };
    let text = report.to_string();
    assert_eq!(text.lines().count(), 10);
    assert!(text.contains("ratio_cameras     1.000000"));
}
