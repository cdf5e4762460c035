use std::fs;
use std::path::Path;
use std::process::Command;

use tempfile::tempdir;

fn run_retrograde(cwd: &Path, args: &[&str]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_retrograde"))
        .current_dir(cwd)
        .args(args)
        .output()
        .expect("retrograde command should run")
}

#[test]
fn version_includes_revision() {
    let dir = tempdir().expect("tempdir should create");
    let output = run_retrograde(dir.path(), &["--version"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains(env!("CARGO_PKG_VERSION")), "{stdout}");
    assert!(stdout.contains('('), "{stdout}");
}

#[test]
fn check_prints_resolved_and_clamped_preset() {
    let dir = tempdir().expect("tempdir should create");
    let preset = dir.path().join("amber.yaml");
    fs::write(
        &preset,
        "mode:\n  kind: crt\n  warp: 4.0\ntone:\n  light: \"#ffb000\"\n",
    )
    .expect("preset should write");

    let output = run_retrograde(dir.path(), &["check", "amber.yaml"]);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    assert!(stdout.starts_with("OK: amber.yaml (crt)"), "{stdout}");
    assert!(stdout.contains("warp: 1.0"), "{stdout}");
    assert!(stdout.contains("scanline: 0.8"), "{stdout}");
}

#[test]
fn check_rejects_unknown_fields_with_location() {
    let dir = tempdir().expect("tempdir should create");
    let preset = dir.path().join("typo.yaml");
    fs::write(&preset, "tone:\n  colums: 80\n").expect("preset should write");

    let output = run_retrograde(dir.path(), &["check", "typo.yaml"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("colums"), "{stderr}");
    assert!(stderr.contains("line"), "{stderr}");
}

#[test]
fn render_rejects_unknown_mode_before_touching_the_gpu() {
    let dir = tempdir().expect("tempdir should create");
    let output = run_retrograde(dir.path(), &["render", "in.png", "--mode", "sepia"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("unknown effect mode 'sepia'"), "{stderr}");
}

#[test]
fn render_rejects_ascii_flags_outside_ascii_mode() {
    let dir = tempdir().expect("tempdir should create");
    let output = run_retrograde(
        dir.path(),
        &["render", "in.png", "--mode", "halftone", "--ramp", "braille"],
    );
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("only apply to ASCII mode"), "{stderr}");
}

#[test]
fn ramp_and_chars_are_mutually_exclusive() {
    let dir = tempdir().expect("tempdir should create");
    let output = run_retrograde(
        dir.path(),
        &["render", "in.png", "--ramp", "binary", "--chars", " .#"],
    );
    assert!(!output.status.success());
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn render_rejects_scales_outside_the_presets() {
    let dir = tempdir().expect("tempdir should create");
    let output = run_retrograde(dir.path(), &["render", "in.png", "--scale", "10000000"]);
    assert!(!output.status.success());
    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("0.5, 1, 2, 4, 8"), "{stderr}");
}

#[test]
fn render_help_lists_known_fonts() {
    let dir = tempdir().expect("tempdir should create");
    let output = run_retrograde(dir.path(), &["render", "--help"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Menlo"), "{stdout}");
    assert!(stdout.contains("Andale Mono"), "{stdout}");
}
