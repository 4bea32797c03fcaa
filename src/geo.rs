//! Conversions between local topocentric coordinates and WGS84 latitude/longitude/altitude.
use cgmath::{Point3, Vector3};

const WGS84_A: f64 = 6378137.0;
const WGS84_B: f64 = 6356752.314245;

/// Geodetic origin of the local east-north-up frame the scenes are built in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoReference {
    /// Degrees.
    pub latitude: f64,
    /// Degrees.
    pub longitude: f64,
    /// Meters.
    pub altitude: f64,
}

impl Default for GeoReference {
    fn default() -> Self {
        GeoReference {
            latitude: 47.0,
            longitude: 6.0,
            altitude: 0.0,
        }
    }
}

/// Earth-centered earth-fixed coordinates of a geodetic position (degrees, meters).
pub fn ecef_from_lla(lat: f64, lon: f64, alt: f64) -> Vector3<f64> {
    let a2 = WGS84_A * WGS84_A;
    let b2 = WGS84_B * WGS84_B;
    let (lat, lon) = (lat.to_radians(), lon.to_radians());
    let l = 1.0 / (a2 * lat.cos().powi(2) + b2 * lat.sin().powi(2)).sqrt();
    Vector3::new(
        (a2 * l + alt) * lat.cos() * lon.cos(),
        (a2 * l + alt) * lat.cos() * lon.sin(),
        (b2 * l + alt) * lat.sin(),
    )
}

/// Geodetic position (degrees, meters) of earth-centered earth-fixed coordinates.
pub fn lla_from_ecef(p: Vector3<f64>) -> (f64, f64, f64) {
    let a = WGS84_A;
    let b = WGS84_B;
    let e2 = (a * a - b * b) / (a * a);
    let ep2 = (a * a - b * b) / (b * b);
    let r = (p.x * p.x + p.y * p.y).sqrt();
    let theta = (p.z * a).atan2(r * b);
    let lon = p.y.atan2(p.x);
    let lat = (p.z + ep2 * b * theta.sin().powi(3)).atan2(r - e2 * a * theta.cos().powi(3));
    let n = a / (1.0 - e2 * lat.sin().powi(2)).sqrt();
    let alt = r / lat.cos() - n;
    (lat.to_degrees(), lon.to_degrees(), alt)
}

// East, north and up axes of the topocentric frame in ECEF.
fn enu_axes(reference: &GeoReference) -> [Vector3<f64>; 3] {
    let (sa, ca) = reference.latitude.to_radians().sin_cos();
    let (so, co) = reference.longitude.to_radians().sin_cos();
    [
        Vector3::new(-so, co, 0.0),
        Vector3::new(-sa * co, -sa * so, ca),
        Vector3::new(ca * co, ca * so, sa),
    ]
}

/// Geodetic position (degrees, meters) of a point given in the topocentric frame of `reference`.
pub fn lla_from_topocentric(p: Point3<f64>, reference: &GeoReference) -> (f64, f64, f64) {
    let [east, north, up] = enu_axes(reference);
    let origin = ecef_from_lla(reference.latitude, reference.longitude, reference.altitude);
    lla_from_ecef(origin + east * p.x + north * p.y + up * p.z)
}

/// Topocentric coordinates, in the frame of `reference`, of a geodetic position.
pub fn topocentric_from_lla(lat: f64, lon: f64, alt: f64, reference: &GeoReference) -> Point3<f64> {
    use cgmath::InnerSpace;
    let [east, north, up] = enu_axes(reference);
    let origin = ecef_from_lla(reference.latitude, reference.longitude, reference.altitude);
    let d = ecef_from_lla(lat, lon, alt) - origin;
    Point3::new(d.dot(east), d.dot(north), d.dot(up))
}

#[test]
fn test_reference_is_origin() {
    let reference = GeoReference::default();
    let (lat, lon, alt) = lla_from_topocentric(Point3::new(0.0, 0.0, 0.0), &reference);
    assert!((lat - 47.0).abs() < 1e-9);
    assert!((lon - 6.0).abs() < 1e-9);
    assert!(alt.abs() < 1e-3);
}

#[test]
fn test_topocentric_isomorphic() {
    let reference = GeoReference {
        latitude: -33.9,
        longitude: 151.2,
        altitude: 40.0,
    };
    let p = Point3::new(120.0, -35.0, 3.5);
    let (lat, lon, alt) = lla_from_topocentric(p, &reference);
    // south of the reference
    assert!(lat < reference.latitude);
    let back = topocentric_from_lla(lat, lon, alt, &reference);
    assert!((back.x - p.x).abs() < 1e-3);
    assert!((back.y - p.y).abs() < 1e-3);
    assert!((back.z - p.z).abs() < 1e-3);
}
