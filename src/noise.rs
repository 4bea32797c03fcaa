//! Functions for adding Gaussian noise to points and rotations.
use cgmath::{Basis3, Point3, Vector3};
use rand::distributions::{Distribution, Normal};
use rand::Rng;

use std::fmt;
use std::str::FromStr;

use crate::reconstruction::{from_rodrigues, to_rodrigues};
use crate::Error;

/// Magnitude of a perturbation. Sigmas are standard deviations of zero mean Gaussian noise.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NoiseSpec {
    /// No perturbation at all. Perturbing with this is a no-op that draws no random numbers.
    None,
    /// Same sigma on every axis.
    Isotropic(f64),
    /// One sigma per axis.
    PerAxis(Vector3<f64>),
}

impl Default for NoiseSpec {
    fn default() -> Self {
        NoiseSpec::None
    }
}

impl From<f64> for NoiseSpec {
    fn from(sigma: f64) -> Self {
        NoiseSpec::Isotropic(sigma)
    }
}

impl NoiseSpec {
    /// Same sigma on every axis. Fails on a negative or non-finite sigma.
    pub fn isotropic(sigma: f64) -> Result<Self, Error> {
        NoiseSpec::Isotropic(sigma).validate()
    }

    /// One sigma per axis. Fails on a negative or non-finite sigma.
    pub fn per_axis(sigmas: Vector3<f64>) -> Result<Self, Error> {
        NoiseSpec::PerAxis(sigmas).validate()
    }

    /// Return the spec itself if every sigma is finite and non negative.
    pub fn validate(self) -> Result<Self, Error> {
        match self.sigmas() {
            Some(s) if [s.x, s.y, s.z].iter().any(|x| !x.is_finite() || *x < 0.0) => {
                Err(Error::InvalidNoise(self.to_string()))
            }
            _ => Ok(self),
        }
    }

    /// Per axis sigmas, or `None` when nothing should be perturbed.
    pub fn sigmas(&self) -> Option<Vector3<f64>> {
        match *self {
            NoiseSpec::None => None,
            NoiseSpec::Isotropic(s) => Some(Vector3::new(s, s, s)),
            NoiseSpec::PerAxis(v) => Some(v),
        }
    }

    /// Largest sigma of the spec, 0 for `None`.
    pub fn magnitude(&self) -> f64 {
        match self.sigmas() {
            Some(s) => s.x.max(s.y).max(s.z),
            None => 0.0,
        }
    }

    /// Independent normal distributions for x, y and z. A zero sigma always samples 0.
    pub(crate) fn distributions(&self) -> Result<Option<[Normal; 3]>, Error> {
        Ok(self
            .validate()?
            .sigmas()
            .map(|s| [Normal::new(0.0, s.x), Normal::new(0.0, s.y), Normal::new(0.0, s.z)]))
    }
}

/// Parses `none`, a single sigma (`0.1`) or three comma separated sigmas (`0.1,0.1,0.5`).
impl FromStr for NoiseSpec {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("none") {
            return Ok(NoiseSpec::None);
        }
        let sigmas = s
            .split(',')
            .map(|x| f64::from_str(x.trim()))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| Error::InvalidNoise(s.to_string()))?;
        let spec = match sigmas.as_slice() {
            [sigma] => NoiseSpec::Isotropic(*sigma),
            [x, y, z] => NoiseSpec::PerAxis(Vector3::new(*x, *y, *z)),
            _ => return Err(Error::InvalidNoise(s.to_string())),
        };
        spec.validate().map_err(|_| Error::InvalidNoise(s.to_string()))
    }
}

impl fmt::Display for NoiseSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NoiseSpec::None => write!(f, "none"),
            NoiseSpec::Isotropic(s) => write!(f, "{}", s),
            NoiseSpec::PerAxis(v) => write!(f, "{},{},{}", v.x, v.y, v.z),
        }
    }
}

/// Add Gaussian noise to every point, independently per point and axis.
///
/// Fails without touching `points` if `spec` has a negative or non-finite sigma.
pub fn perturb_points<R: Rng>(
    points: &mut [Point3<f64>],
    spec: &NoiseSpec,
    rng: &mut R,
) -> Result<(), Error> {
    let [nx, ny, nz] = match spec.distributions()? {
        Some(d) => d,
        None => return Ok(()),
    };
    for p in points.iter_mut() {
        *p += Vector3::new(nx.sample(rng), ny.sample(rng), nz.sample(rng));
    }
    Ok(())
}

/// Add Gaussian noise to the axis-angle representation of every rotation. Sigmas are in radians.
pub fn perturb_rotations<R: Rng>(
    rotations: &mut [Basis3<f64>],
    spec: &NoiseSpec,
    rng: &mut R,
) -> Result<(), Error> {
    let [nx, ny, nz] = match spec.distributions()? {
        Some(d) => d,
        None => return Ok(()),
    };
    for r in rotations.iter_mut() {
        let rodrigues =
            to_rodrigues(*r) + Vector3::new(nx.sample(rng), ny.sample(rng), nz.sample(rng));
        *r = from_rodrigues(rodrigues);
    }
    Ok(())
}

#[cfg(test)]
fn test_rng() -> rand::rngs::StdRng {
    use rand::SeedableRng;
    rand::rngs::StdRng::seed_from_u64(7)
}

#[test]
fn test_perturb_none_is_noop() {
    let mut points = vec![Point3::new(0.1, 0.2, 0.3), Point3::new(-1e300, 5e-320, 7.0)];
    let original = points.clone();
    let mut rng = test_rng();
    perturb_points(&mut points, &NoiseSpec::None, &mut rng).unwrap();
    for (a, b) in points.iter().zip(original.iter()) {
        assert_eq!(a.x.to_bits(), b.x.to_bits());
        assert_eq!(a.y.to_bits(), b.y.to_bits());
        assert_eq!(a.z.to_bits(), b.z.to_bits());
    }

    // no random numbers were drawn
    let mut fresh = test_rng();
    assert_eq!(rng.gen::<u64>(), fresh.gen::<u64>());
}

#[test]
fn test_perturb_points_moves_every_point() {
    let mut points = vec![Point3::new(1.0, 2.0, 3.0); 50];
    perturb_points(&mut points, &NoiseSpec::Isotropic(0.5), &mut test_rng()).unwrap();
    assert!(points.iter().all(|p| *p != Point3::new(1.0, 2.0, 3.0)));
    // independent draws per point
    assert!(points.windows(2).all(|w| w[0] != w[1]));
}

#[test]
fn test_perturb_points_per_axis() {
    let mut points = vec![Point3::new(0.0, 0.0, 0.0); 200];
    let spec = NoiseSpec::PerAxis(Vector3::new(1.0, 0.0, 0.0));
    perturb_points(&mut points, &spec, &mut test_rng()).unwrap();
    assert!(points.iter().any(|p| p.x.abs() > 0.1));
    assert!(points.iter().all(|p| p.y == 0.0 && p.z == 0.0));
}

#[test]
fn test_perturb_rotations_stay_rotations() {
    use cgmath::{AbsDiffEq, Matrix, Matrix3, SquareMatrix};
    let mut rotations = vec![from_rodrigues(Vector3::new(0.2, -0.1, 1.5)); 20];
    perturb_rotations(&mut rotations, &NoiseSpec::Isotropic(0.3), &mut test_rng()).unwrap();
    for r in rotations {
        let m: Matrix3<f64> = r.into();
        let should_be_identity = m.transpose() * m;
        assert!(should_be_identity.abs_diff_eq(&Matrix3::identity(), 1e-10));
        assert!((m.determinant() - 1.0).abs() < 1e-10);
    }
}

#[test]
fn test_parse_noise_spec() {
    assert_eq!("none".parse::<NoiseSpec>().unwrap(), NoiseSpec::None);
    assert_eq!("0.5".parse::<NoiseSpec>().unwrap(), NoiseSpec::Isotropic(0.5));
    assert_eq!(
        "1, 2,3".parse::<NoiseSpec>().unwrap(),
        NoiseSpec::PerAxis(Vector3::new(1.0, 2.0, 3.0))
    );
    assert!("1,2".parse::<NoiseSpec>().is_err());
    assert!("-1".parse::<NoiseSpec>().is_err());
    assert!("loud".parse::<NoiseSpec>().is_err());
    assert_eq!(NoiseSpec::PerAxis(Vector3::new(1.0, 2.0, 3.0)).magnitude(), 3.0);
}

#[test]
fn test_zero_sigma_axis_is_untouched() {
    let mut points = vec![Point3::new(1.0, 0.25, 0.0); 20];
    let spec = NoiseSpec::per_axis(Vector3::new(0.5, 0.5, 0.0)).unwrap();
    perturb_points(&mut points, &spec, &mut test_rng()).unwrap();
    assert!(points.iter().all(|p| p.z.to_bits() == 0.0f64.to_bits()));
    assert!(points.iter().any(|p| p.x != 1.0));

    let mut points = vec![Point3::new(1.0, 0.25, -7.5); 20];
    perturb_points(&mut points, &NoiseSpec::Isotropic(0.0), &mut test_rng()).unwrap();
    assert!(points.iter().all(|p| *p == Point3::new(1.0, 0.25, -7.5)));
}

#[test]
fn test_negative_sigma_is_rejected() {
    assert!(NoiseSpec::isotropic(-3.0).is_err());
    assert!(NoiseSpec::per_axis(Vector3::new(0.1, std::f64::NAN, 0.1)).is_err());
    assert_eq!(NoiseSpec::isotropic(0.0).unwrap(), NoiseSpec::Isotropic(0.0));

    let mut points = vec![Point3::new(1.0, 2.0, 3.0); 3];
    let mut rng = test_rng();
    match perturb_points(&mut points, &NoiseSpec::from(-3.0), &mut rng) {
        Err(Error::InvalidNoise(spec)) => assert_eq!(spec, "-3"),
        other => panic!("expected an invalid noise error, got {:?}", other),
    }
    assert!(points.iter().all(|p| *p == Point3::new(1.0, 2.0, 3.0)));

    let mut rotations = vec![from_rodrigues(Vector3::new(0.1, 0.2, 0.3))];
    let spec = NoiseSpec::PerAxis(Vector3::new(0.1, -0.1, 0.1));
    assert!(perturb_rotations(&mut rotations, &spec, &mut rng).is_err());
}
