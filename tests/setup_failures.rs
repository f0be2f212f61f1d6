use std::io::Write;
use std::process::Command;

fn detector() -> Command {
    Command::new(env!("CARGO_BIN_EXE_haar-weapon-detector"))
}

#[test]
fn missing_cascade_exits_nonzero_before_opening_the_camera() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("cascade_1.2.xml");

    // Unlikely index: reaching the camera step would fail with its own message.
    let output = detector()
        .args(["--cascade", missing.to_str().unwrap(), "--camera", "97"])
        .output()
        .unwrap();

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("failed to load cascade classifier"), "{stderr}");
    assert!(stderr.contains("cascade file not found"), "{stderr}");
    assert!(!stderr.contains("failed to open camera"), "{stderr}");
    assert!(output.stdout.is_empty());
}

#[test]
fn unreadable_cascade_exits_nonzero() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "<opencv_storage></opencv_storage>").unwrap();

    let output = detector()
        .args(["--cascade", file.path().to_str().unwrap(), "--camera", "97"])
        .output()
        .unwrap();

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("could not be loaded as a classifier"), "{stderr}");
}

#[test]
fn invalid_scale_factor_exits_nonzero() {
    let output = detector()
        .args(["--scale-factor", "1.0", "--camera", "97"])
        .output()
        .unwrap();

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("scale factor must be greater than 1.0"), "{stderr}");
}

#[test]
fn oversized_resize_width_exits_nonzero_before_loading_anything() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("cascade_1.2.xml");

    let output = detector()
        .args([
            "--cascade",
            missing.to_str().unwrap(),
            "--camera",
            "97",
            "--resize-width",
            "3000000000",
        ])
        .output()
        .unwrap();

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("resize width must be at most"), "{stderr}");
    assert!(!stderr.contains("failed to load cascade classifier"), "{stderr}");
    assert!(!stderr.contains("failed to open camera"), "{stderr}");
}
