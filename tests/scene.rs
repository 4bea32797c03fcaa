use synthsfm::*;

fn street_scene(seed: u64) -> SyntheticScene {
    let generator = get_scene_generator("ellipse", 50.0).unwrap();
    let mut scene = SyntheticScene::from_seed(generator, seed);
    scene.add_street(300, 2.0, 10.0);
    scene
}

fn camera() -> Camera {
    get_camera("perspective", "camera", 0.9, -0.1, 0.01).unwrap()
}

#[test]
fn unperturbed_scene_matches_itself() {
    let mut scene = street_scene(42);
    scene
        .add_camera_sequence(camera(), 0.0, 50.0, 1.5, 2.0, SequenceNoise::default())
        .unwrap()
        .perturb_walls(NoiseSpec::None)
        .unwrap()
        .perturb_floor(NoiseSpec::None)
        .unwrap();
    let reconstruction = scene.get_reconstruction().unwrap();
    assert_eq!(reconstruction.num_points(), 300);
    assert_eq!(reconstruction.num_shots(), 25);

    let report = scene.compare(&reconstruction).unwrap();
    assert_eq!(report.position_average, 0.0);
    assert_eq!(report.position_std, 0.0);
    assert_eq!(report.rotation_average, 0.0);
    assert_eq!(report.rotation_std, 0.0);
    assert_eq!(report.points_average, 0.0);
    assert_eq!(report.ratio_cameras, 1.0);
    assert_eq!(report.ratio_points, 1.0);
}

#[test]
fn reconstruction_is_a_snapshot() {
    let mut scene = street_scene(1);
    scene
        .add_camera_sequence(camera(), 5.0, 20.0, 1.5, 2.0, SequenceNoise::default())
        .unwrap();
    assert_eq!(
        scene.get_reconstruction().unwrap(),
        scene.get_reconstruction().unwrap()
    );
}

#[test]
fn one_shot_per_sample() {
    let mut scene = street_scene(5);
    let fisheye = get_camera("fisheye", "fisheye", 0.5, 0.0, 0.0).unwrap();
    scene
        .add_camera_sequence(camera(), 0.0, 30.0, 1.5, 3.0, SequenceNoise::default())
        .unwrap()
        .add_camera_sequence(fisheye, 30.0, 20.0, 2.0, 4.0, SequenceNoise::default())
        .unwrap();
    let trajectories = scene.trajectories();
    assert_eq!(trajectories.len(), 2);
    assert_eq!(trajectories[0].len(), 10);
    assert_eq!(trajectories[1].len(), 5);

    let reconstruction = scene.get_reconstruction().unwrap();
    assert_eq!(reconstruction.num_shots(), 15);
    for shot in reconstruction.shots.values() {
        let index: usize = shot.id["shot".len()..].parse().unwrap();
        let expected = if index < 10 { "camera" } else { "fisheye" };
        assert_eq!(shot.camera, expected, "shot {}", shot.id);
        assert!(reconstruction.shot_camera(shot).is_some());
    }
}

fn position_std(sigma: f64) -> f64 {
    let mut truth = street_scene(7);
    let mut noisy = street_scene(7);
    truth
        .add_camera_sequence(camera(), 0.0, 50.0, 1.5, 2.0, SequenceNoise::default())
        .unwrap();
    noisy
        .add_camera_sequence(
            camera(),
            0.0,
            50.0,
            1.5,
            2.0,
            SequenceNoise {
                position: NoiseSpec::Isotropic(sigma),
                ..Default::default()
            },
        )
        .unwrap();
    let report = truth.compare(&noisy.get_reconstruction().unwrap()).unwrap();
    // only positions were perturbed
    assert_eq!(report.rotation_average, 0.0);
    assert_eq!(report.points_average, 0.0);
    report.position_std
}

#[test]
fn position_std_grows_with_noise() {
    let small = position_std(0.1);
    let large = position_std(0.5);
    assert!(small > 0.0);
    assert!(large > small);
}

#[test]
fn empty_estimate_reports_zeros() {
    let mut scene = street_scene(3);
    scene
        .add_camera_sequence(camera(), 0.0, 50.0, 1.5, 2.0, SequenceNoise::default())
        .unwrap();
    let report = scene.compare(&Reconstruction::new()).unwrap();
    assert_eq!(report, ErrorReport::default());
    assert!(report.fields().iter().all(|(_, v)| v.is_finite()));
}

#[test]
fn partial_estimate_ratios() {
    let mut scene = street_scene(3);
    scene
        .add_camera_sequence(camera(), 0.0, 50.0, 1.5, 2.0, SequenceNoise::default())
        .unwrap();
    let mut estimate = scene.get_reconstruction().unwrap();
    for i in 0..5 {
        estimate.shots.remove(&format!("shot{}", i));
    }
    for i in 0..150 {
        estimate.points.remove(&i.to_string());
    }
    let report = scene.compare(&estimate).unwrap();
    assert_eq!(report.ratio_cameras, 0.8);
    assert_eq!(report.ratio_points, 0.5);
    assert_eq!(report.position_average, 0.0);
}

#[test]
fn orthographic_camera_is_rejected() {
    match get_camera("orthographic", "camera", 1.0, 0.0, 0.0) {
        Err(Error::UnknownCameraKind(kind)) => assert_eq!(kind, "orthographic"),
        other => panic!("expected an unknown camera kind error, got {:?}", other),
    }
}

#[test]
fn scene_requires_street() {
    let generator = get_scene_generator("curve", 30.0).unwrap();
    let mut scene = SyntheticScene::from_seed(generator, 0);
    assert!(scene
        .add_camera_sequence(camera(), 0.0, 30.0, 1.5, 2.0, SequenceNoise::default())
        .is_err());
    assert!(scene.perturb_walls(NoiseSpec::Isotropic(0.1)).is_err());
    assert!(scene.get_scene_exifs(NoiseSpec::None).is_err());
    assert!(scene.get_tracks_data(10.0, NoiseSpec::None).is_err());
    match scene.get_reconstruction() {
        Err(Error::UninitializedScene(_)) => {}
        other => panic!("expected an uninitialized scene error, got {:?}", other),
    }
}

#[test]
fn track_depths_are_bounded() {
    let mut scene = street_scene(9);
    scene
        .add_camera_sequence(camera(), 0.0, 50.0, 1.5, 2.0, SequenceNoise::default())
        .unwrap();
    let maximum_depth = 8.0;
    let tracks = scene
        .get_tracks_data(
            maximum_depth,
            NoiseSpec::PerAxis(cgmath::Vector3::new(0.001, 0.001, 0.2)),
        )
        .unwrap();
    assert!(tracks.num_tracks() > 0);
    for track in tracks.tracks.values() {
        for observation in track.values() {
            assert!(observation.depth > 0.0 && observation.depth <= maximum_depth);
        }
    }
    // every observation is listed once among the features of its shot
    let features = tracks.features();
    let count: usize = features.values().map(|f| f.len()).sum();
    assert_eq!(count, tracks.num_observations());
}

#[test]
fn exifs_follow_the_shots() {
    let mut scene = street_scene(2);
    scene
        .add_camera_sequence(camera(), 0.0, 50.0, 1.5, 2.0, SequenceNoise::default())
        .unwrap();
    let exifs = scene.get_scene_exifs(NoiseSpec::None).unwrap();
    assert_eq!(exifs.len(), 25);
    assert_eq!(exifs[0].capture_time, 0.0);
    assert!(exifs.windows(2).all(|w| w[1].capture_time > w[0].capture_time));
    assert!(exifs.iter().all(|e| e.width == 2000 && e.height == 1600));

    let mut estimate = scene.get_reconstruction().unwrap();
    estimate.apply_exifs(&exifs);
    let report = scene.compare(&estimate).unwrap();
    assert_eq!(report.gps_average, 0.0);
}

#[test]
fn rotation_noise_only_moves_rotations() {
    let mut truth = street_scene(4);
    let mut noisy = street_scene(4);
    truth
        .add_camera_sequence(camera(), 0.0, 50.0, 1.5, 2.0, SequenceNoise::default())
        .unwrap();
    noisy
        .add_camera_sequence(
            camera(),
            0.0,
            50.0,
            1.5,
            2.0,
            SequenceNoise {
                rotation: NoiseSpec::isotropic(0.05).unwrap(),
                ..Default::default()
            },
        )
        .unwrap();
    let report = truth.compare(&noisy.get_reconstruction().unwrap()).unwrap();
    assert!(report.rotation_average > 0.0);
    assert!(report.rotation_std > 0.0);
    assert_eq!(report.position_average, 0.0);
    assert_eq!(report.position_std, 0.0);
    assert_eq!(report.points_average, 0.0);
}

#[test]
fn invalid_noise_leaves_scene_untouched() {
    let mut scene = street_scene(6);
    let before = scene.get_reconstruction().unwrap();
    match scene.perturb_floor(NoiseSpec::Isotropic(-1.0)) {
        Err(Error::InvalidNoise(_)) => {}
        Err(e) => panic!("unexpected error {}", e),
        Ok(_) => panic!("negative sigma accepted"),
    }
    let noise = SequenceNoise {
        position: NoiseSpec::PerAxis(cgmath::Vector3::new(0.1, -0.1, 0.1)),
        ..Default::default()
    };
    assert!(scene
        .add_camera_sequence(camera(), 0.0, 50.0, 1.5, 2.0, noise)
        .is_err());
    assert!(scene.trajectories().is_empty());
    assert_eq!(scene.get_reconstruction().unwrap(), before);
}
