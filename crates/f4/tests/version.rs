//! Tests for the f4 CLI version flags

mod common;

use common::f4;

/// Helper function to test version output
fn assert_version_output(args: &[&str]) {
    let output = f4()
        .args(args)
        .output()
        .expect("Failed to execute f4 command");

    assert!(output.status.success(), "Command should exit successfully");

    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(
        stdout.contains("For4 CLI"),
        "Output should contain 'For4 CLI': {}",
        stdout
    );

    assert!(
        stdout.contains(env!("CARGO_PKG_VERSION")),
        "Output should contain version '{}': {}",
        env!("CARGO_PKG_VERSION"),
        stdout
    );
}

#[test]
fn test_version_flag() {
    assert_version_output(&["--version"]);
}

#[test]
fn test_version_flag_short() {
    assert_version_output(&["-v"]);
}
