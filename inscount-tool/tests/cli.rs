/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

use std::path::Path;
use std::path::PathBuf;
use std::process::Command;

use inscount_engine::BlockSpec;
use inscount_engine::GuestImage;
use inscount_engine::InstructionSpec;
use inscount_engine::Step;
use inscount_engine::ThreadSpec;
use inscount_engine::TraceSpec;

fn inscount() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_inscount"));
    cmd.env_remove("RUST_LOG_FILE");
    cmd
}

fn write_image(dir: &Path, image: &GuestImage) -> PathBuf {
    let path = dir.join("guest.json");
    std::fs::write(&path, image.to_json().unwrap()).unwrap();
    path
}

fn three_blocks() -> GuestImage {
    GuestImage::new(
        "three-blocks",
        vec![TraceSpec::new(vec![
            BlockSpec::new(vec![
                InstructionSpec::new(0x1000).read(0x8000),
                InstructionSpec::new(0x1004),
            ]),
            BlockSpec::straight_line(0x1008, 3),
            BlockSpec::new(vec![InstructionSpec::new(0x1014).write(0x8008)]),
        ])],
        vec![ThreadSpec::new(vec![
            Step::run(0x1000),
            Step::run(0x1008),
            Step::run(0x1014),
        ])],
    )
}

#[test]
fn writes_report() {
    let dir = tempfile::tempdir().unwrap();
    let image = write_image(dir.path(), &three_blocks());
    let out = dir.path().join("report.out");

    let status = inscount()
        .arg("-o")
        .arg(&out)
        .arg(&image)
        .args(["--", "-n", "3"])
        .status()
        .unwrap();
    assert!(status.success());

    let report = std::fs::read_to_string(&out).unwrap();
    let lines: Vec<_> = report.lines().collect();
    assert_eq!(lines.len(), 9);
    assert_eq!(lines[0], "// Benchmark Characteristics");
    assert!(lines[1].starts_with("// Time: "));
    assert_eq!(lines[2], format!("// Benchmark: {} -n 3 ", image.display()));
    assert_eq!(lines[3], "");
    assert_eq!(
        &lines[4..],
        [
            "// Program Stats",
            "Basic Blocks: 3",
            "Memory Reads: 1",
            "Memory Writes: 1",
            "Total Instructions: 6",
        ]
    );
}

#[test]
fn instruction_visits_flag() {
    let dir = tempfile::tempdir().unwrap();
    let image = write_image(dir.path(), &three_blocks());
    let out = dir.path().join("report.out");

    let status = inscount()
        .arg("--instruction-visits")
        .arg("-o")
        .arg(&out)
        .arg(&image)
        .status()
        .unwrap();
    assert!(status.success());

    let report = std::fs::read_to_string(&out).unwrap();
    assert!(report.ends_with("Total Instructions: 6\nInstruction Visits: 6\n"));
}

#[test]
fn default_output_file() {
    let dir = tempfile::tempdir().unwrap();
    let image = write_image(dir.path(), &three_blocks());

    let status = inscount()
        .current_dir(dir.path())
        .arg(&image)
        .status()
        .unwrap();
    assert!(status.success());

    let report = std::fs::read_to_string(dir.path().join("inscount.out")).unwrap();
    assert!(report.contains("Basic Blocks: 3\n"));
}

#[test]
fn propagates_guest_exit_code() {
    let dir = tempfile::tempdir().unwrap();
    let image = write_image(dir.path(), &three_blocks().exit_code(3));
    let out = dir.path().join("report.out");

    let status = inscount().arg("-o").arg(&out).arg(&image).status().unwrap();
    assert_eq!(status.code(), Some(3));
    // The report is still written.
    assert!(std::fs::read_to_string(&out).unwrap().contains("Total Instructions: 6\n"));
}

#[test]
fn usage_error() {
    let output = inscount().arg("--no-such-flag").output().unwrap();
    assert_eq!(output.status.code(), Some(255));

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.starts_with("Performs basic benchmarking for input programs\n"));
    assert!(stderr.contains("Usage:"));
}

#[test]
fn missing_program_is_a_usage_error() {
    let output = inscount().output().unwrap();
    assert_eq!(output.status.code(), Some(255));
}

#[test]
fn unreadable_image() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("report.out");

    let output = inscount()
        .arg("-o")
        .arg(&out)
        .arg(dir.path().join("missing.json"))
        .output()
        .unwrap();
    assert!(!output.status.success());
    assert_ne!(output.status.code(), Some(255));
    assert!(String::from_utf8_lossy(&output.stderr).contains("missing.json"));
}

#[test]
fn missing_image_keeps_previous_report() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("report.out");
    std::fs::write(&out, "previous good report\n").unwrap();

    let status = inscount()
        .arg("-o")
        .arg(&out)
        .arg(dir.path().join("missing.json"))
        .status()
        .unwrap();
    assert_eq!(status.code(), Some(1));
    assert_eq!(
        std::fs::read_to_string(&out).unwrap(),
        "previous good report\n"
    );
}

#[test]
fn invalid_image_keeps_previous_report() {
    let dir = tempfile::tempdir().unwrap();
    let mut image = three_blocks();
    image.threads[0].steps.push(Step::run(0x9000));
    let image = write_image(dir.path(), &image);
    let out = dir.path().join("report.out");
    std::fs::write(&out, "previous good report\n").unwrap();

    let output = inscount().arg("-o").arg(&out).arg(&image).output().unwrap();
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("0x9000"));
    assert_eq!(
        std::fs::read_to_string(&out).unwrap(),
        "previous good report\n"
    );
}

#[test]
fn report_path_in_missing_directory() {
    let dir = tempfile::tempdir().unwrap();
    let image = write_image(dir.path(), &three_blocks());

    let output = inscount()
        .arg("-o")
        .arg(dir.path().join("nope").join("report.out"))
        .arg(&image)
        .output()
        .unwrap();
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("cannot create report file"));
}
