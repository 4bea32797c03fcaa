//! Synthetic ground truth for structure-from-motion pipelines.
//!
//! A [`SyntheticScene`] lays a street along a path, drives one or more camera sequences through
//! it and assembles the result into a ground truth [`Reconstruction`]. From there, simulated
//! inputs for the pipeline under test (EXIF/GPS records, feature tracks) can be derived, and the
//! pipeline's output can be scored against the ground truth with [`compare`].
//!
//! Example usage:
//! ```
//! use synthsfm::*;
//!
//! let generator = get_scene_generator("ellipse", 50.0).unwrap();
//! let camera = get_camera("perspective", "camera", 0.9, -0.1, 0.01).unwrap();
//! let mut scene = SyntheticScene::from_seed(generator, 42);
//! scene
//!     .add_street(300, 2.0, 10.0)
//!     .add_camera_sequence(camera, 0.0, 50.0, 1.5, 2.0, SequenceNoise::default())
//!     .unwrap();
//! let reconstruction = scene.get_reconstruction().unwrap();
//! let report = scene.compare(&reconstruction).unwrap();
//! assert_eq!(report.ratio_cameras, 1.0);
//! ```

pub mod camera;
pub mod generate;
pub mod geo;
pub mod metrics;
pub mod noise;
pub mod observations;
pub mod reconstruction;
pub mod scene;

pub use camera::*;
pub use generate::{get_scene_generator, GeneratorKind, PathGenerator, Trajectory};
pub use metrics::{compare, ErrorReport};
pub use noise::*;
pub use observations::{ExifRecord, GpsRecord, Observation, TrackData};
pub use reconstruction::*;
pub use scene::*;

/// Errors raised while configuring or assembling a synthetic scene.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("unknown camera kind `{0}`, expected `perspective` or `fisheye`")]
    UnknownCameraKind(String),
    #[error("unknown generator kind `{0}`, expected `ellipse`, `line` or `curve`")]
    UnknownGeneratorKind(String),
    #[error("uninitialized scene: {0} requires a street, call add_street first")]
    UninitializedScene(&'static str),
    #[error("shot `{shot}` references camera `{camera}` which is not part of the reconstruction")]
    MissingCamera { shot: String, camera: String },
    #[error("invalid noise specification `{0}`")]
    InvalidNoise(String),
    #[error("{requested} samples requested, at most {limit} are supported")]
    TooManySamples { requested: f64, limit: usize },
}
