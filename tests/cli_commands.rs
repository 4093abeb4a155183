//! Tests against the built `petaug` binary

#![cfg(feature = "cli")]

mod common;

use common::write_jpeg;
use std::process::{Command, Output};
use tempfile::TempDir;

fn petaug(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_petaug"))
        .args(args)
        .arg("--no-progress")
        .env_remove("RUST_LOG")
        .env(
            "PETAUG_CACHE_DIR",
            std::env::temp_dir().join("petaug-cli-test-cache"),
        )
        .output()
        .expect("failed to run petaug")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn test_help_lists_every_stage() {
    let output = petaug(&["--help"]);
    assert!(output.status.success());
    let text = stdout(&output);
    for command in [
        "setup",
        "repair",
        "segment",
        "inpaint",
        "ip-adapter",
        "clean-integrity",
        "clean-similarity",
        "pipeline",
        "models",
    ] {
        assert!(text.contains(command), "missing {command} in help:\n{text}");
    }
}

#[test]
fn test_invalid_arguments_exit_non_zero() {
    assert!(!petaug(&["pipeline", "--step", "train"]).status.success());
    assert!(!petaug(&["segment", "--model", "isnet"]).status.success());
    assert!(!petaug(&["ip-adapter", "--scale", "1.5"]).status.success());
}

#[test]
fn test_clean_integrity_dry_run_then_delete() {
    let temp_dir = TempDir::new().unwrap();
    let target = temp_dir.path().join("augmented");
    write_jpeg(&target.join("Beagle/Beagle_01_snow.jpg"), [1, 2, 3]);
    let corrupt = target.join("Beagle/corrupt.jpg");
    std::fs::write(&corrupt, b"").unwrap();
    let target_arg = target.to_str().unwrap();

    let dry_run = petaug(&["clean-integrity", "--target-dir", target_arg]);
    assert!(dry_run.status.success());
    let text = stdout(&dry_run);
    assert!(text.contains("Empty file (0 bytes): corrupt.jpg"), "{text}");
    assert!(text.contains("Run with --delete"), "{text}");
    assert!(corrupt.exists());

    let delete = petaug(&["clean-integrity", "--target-dir", target_arg, "--delete"]);
    assert!(delete.status.success());
    assert!(stdout(&delete).contains("Successfully cleaned 1 corrupted files"));
    assert!(!corrupt.exists());

    let again = petaug(&["clean-integrity", "--target-dir", target_arg]);
    assert!(stdout(&again).contains("No corrupted files found"));
}

#[test]
fn test_missing_directory_is_a_handled_early_return() {
    let temp_dir = TempDir::new().unwrap();
    let missing = temp_dir.path().join("nope");
    let output = petaug(&["clean-integrity", "--target-dir", missing.to_str().unwrap()]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("Directory not found"));
}

#[test]
fn test_segment_without_images_exits_cleanly() {
    let temp_dir = TempDir::new().unwrap();
    let raw = temp_dir.path().join("raw");
    std::fs::create_dir_all(&raw).unwrap();
    let output = petaug(&[
        "segment",
        "--input-dir",
        raw.to_str().unwrap(),
        "--output-dir",
        temp_dir.path().join("masks").to_str().unwrap(),
    ]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("No images found"));
}

#[test]
fn test_augmentation_with_missing_raw_dir_exits_cleanly() {
    let temp_dir = TempDir::new().unwrap();
    let missing = temp_dir.path().join("missing_raw");
    let out = temp_dir.path().join("out");
    // nothing listens here; the raw tree check must come first
    let unreachable_server = "http://127.0.0.1:9";

    for command in ["inpaint", "ip-adapter"] {
        let output = petaug(&[
            command,
            "--raw-dir",
            missing.to_str().unwrap(),
            "--output-dir",
            out.to_str().unwrap(),
            "--diffusion-url",
            unreachable_server,
        ]);
        assert!(output.status.success(), "{command}: {output:?}");
        let text = stdout(&output);
        assert!(text.contains("Raw directory not found"), "{command}: {text}");
        assert!(text.contains("missing_raw"), "{command}: {text}");
    }
    assert!(!out.exists());
}

#[test]
fn test_gpu_id_beyond_port_range_rejected() {
    assert!(!petaug(&["inpaint", "--gpu-id", "70000"]).status.success());
    assert!(!petaug(&["pipeline", "--gpu-id", "4294967295"]).status.success());
}
