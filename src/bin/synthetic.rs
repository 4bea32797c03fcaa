extern crate structopt;
extern crate synthsfm;

use structopt::StructOpt;

use synthsfm::*;

#[derive(StructOpt, Debug)]
#[structopt(
    name = "synthetic",
    about = "Build a synthetic street scene, perturb a copy of it and score the copy against the ground truth."
)]
struct Opt {
    /// Path shape: ellipse, line or curve.
    #[structopt(long = "generator", default_value = "ellipse")]
    generator: GeneratorKind,

    #[structopt(long = "length", default_value = "50")]
    length: f64,

    /// Number of street points, a third of them on the floor.
    #[structopt(long = "points", default_value = "300")]
    points: usize,

    #[structopt(long = "street-height", default_value = "2")]
    street_height: f64,

    #[structopt(long = "street-width", default_value = "10")]
    street_width: f64,

    /// Camera model: perspective or fisheye.
    #[structopt(long = "camera", default_value = "perspective")]
    camera: CameraKind,

    #[structopt(long = "focal", default_value = "0.9")]
    focal: f64,

    #[structopt(long = "k1", default_value = "-0.1")]
    k1: f64,

    #[structopt(long = "k2", default_value = "0.01")]
    k2: f64,

    #[structopt(long = "camera-height", default_value = "1.5")]
    camera_height: f64,

    /// Distance between shots.
    #[structopt(long = "interval", default_value = "2")]
    interval: f64,

    /// Noise specs are `none`, a sigma (`0.1`) or per axis sigmas (`0.1,0.1,0.5`).
    #[structopt(long = "position-noise", default_value = "none")]
    position_noise: NoiseSpec,

    #[structopt(long = "rotation-noise", default_value = "none")]
    rotation_noise: NoiseSpec,

    #[structopt(long = "gps-noise", default_value = "none")]
    gps_noise: NoiseSpec,

    #[structopt(long = "walls-noise", default_value = "none")]
    walls_noise: NoiseSpec,

    #[structopt(long = "floor-noise", default_value = "none")]
    floor_noise: NoiseSpec,

    #[structopt(long = "max-depth", default_value = "20")]
    max_depth: f64,

    #[structopt(long = "track-noise", default_value = "none")]
    track_noise: NoiseSpec,

    #[structopt(long = "seed", default_value = "0")]
    seed: u64,

    #[structopt(short = "v", long = "verbose")]
    verbose: bool,
}

fn main() -> Result<(), Error> {
    env_logger::init();
    let opt = Opt::from_args();

    let generator = PathGenerator::new(opt.generator, opt.length);
    let camera = Camera::new(opt.camera, "camera", opt.focal, opt.k1, opt.k2);

    let mut truth = SyntheticScene::from_seed(generator, opt.seed);
    truth
        .verbose(opt.verbose)
        .add_street(opt.points, opt.street_height, opt.street_width)
        .add_camera_sequence(
            camera.clone(),
            0.0,
            opt.length,
            opt.camera_height,
            opt.interval,
            SequenceNoise::default(),
        )?;

    // Same seed and sampling as the truth, perturbations come after the shared draws.
    let mut estimate = SyntheticScene::from_seed(generator, opt.seed);
    estimate
        .add_street(opt.points, opt.street_height, opt.street_width)
        .add_camera_sequence(
            camera,
            0.0,
            opt.length,
            opt.camera_height,
            opt.interval,
            SequenceNoise {
                position: opt.position_noise,
                rotation: opt.rotation_noise,
                gps: None,
            },
        )?
        .perturb_walls(opt.walls_noise)?
        .perturb_floor(opt.floor_noise)?;

    println!("{}", truth.get_reconstruction()?);
    let exifs = truth.get_scene_exifs(opt.gps_noise)?;
    println!("{} exifs", exifs.len());
    let tracks = truth.get_tracks_data(opt.max_depth, opt.track_noise)?;
    println!(
        "{} observations of {} tracks",
        tracks.num_observations(),
        tracks.num_tracks()
    );

    let mut reconstruction = estimate.get_reconstruction()?;
    reconstruction.apply_exifs(&exifs);
    println!("{}", truth.compare(&reconstruction)?);
    Ok(())
}
