//! CLI integration tests for the demo mode.

use std::process::Command;

#[test]
fn demo_cli_drains_the_stack_cleanly() {
    let bin = env!("CARGO_BIN_EXE_chip_factory");
    // Run the demo binary with default settings.
    let output = Command::new(bin)
        .output()
        .expect("failed to run demo binary");

    // Demo should exit cleanly.
    assert!(
        output.status.success(),
        "demo exited with non-zero status: {:?}",
        output.status
    );

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(
        stdout.contains("DEMO SUMMARY"),
        "demo summary missing from output"
    );

    let summary_line = |prefix: &str| {
        stdout
            .lines()
            .find(|line| line.starts_with(prefix))
            .unwrap_or_else(|| panic!("{prefix} line missing"))
    };

    // The full quota must be produced, soldered, and accounted for.
    assert_eq!(summary_line("chips_produced=").trim(), "chips_produced=5");
    assert_eq!(summary_line("chips_soldered=").trim(), "chips_soldered=5");
    assert_eq!(summary_line("leftover=").trim(), "leftover=0");
    assert_eq!(
        summary_line("duplicate_chips=").trim(),
        "duplicate_chips=false"
    );
}
