use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::process::Command;

#[test]
fn synthetic_default_scene() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::cargo_bin("synthetic")?;
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Reconstruction with 1 cameras, 25 shots"))
        .stdout(predicate::str::contains("25 exifs"))
        .stdout(predicate::str::contains("ratio_cameras     1.000000"));

    Ok(())
}

#[test]
fn synthetic_noisy_scene() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::cargo_bin("synthetic")?;
    cmd.arg("--generator")
        .arg("curve")
        .arg("--camera")
        .arg("fisheye")
        .arg("--position-noise")
        .arg("0.1")
        .arg("--rotation-noise")
        .arg("0.01,0.01,0.05")
        .arg("--gps-noise")
        .arg("2")
        .arg("--track-noise")
        .arg("0.001,0.001,0.01")
        .arg("--seed")
        .arg("3");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("observations of"))
        .stdout(predicate::str::contains("position_std"));

    Ok(())
}

#[test]
fn unknown_camera_kind() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::cargo_bin("synthetic")?;
    cmd.arg("--camera").arg("orthographic");
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("orthographic"));

    Ok(())
}

#[test]
fn invalid_noise() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::cargo_bin("synthetic")?;
    cmd.arg("--gps-noise").arg("1,2");
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("invalid noise"));

    Ok(())
}
