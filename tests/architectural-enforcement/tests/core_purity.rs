//! Integration Test: Canvas Core Purity
//!
//! The canvas core is synchronous and in-memory. Every operation runs under
//! a lock and must return promptly.
//!
//! **Policy**:
//! - No `std::thread::sleep` anywhere in the core
//! - No `std::net`, no `tokio`
//! - `std::fs` only in the configuration module

use std::path::Path;

use architectural_enforcement::{core_src, scan, Violation};

fn report(title: &str, violations: &[Violation]) {
    if violations.is_empty() {
        return;
    }
    eprintln!("\n❌ {title}\n");
    for violation in violations {
        eprintln!("  ❌ {violation}");
    }
    panic!(
        "\nFound {} violation(s) in canvas/core/src.\nFix these before merging!",
        violations.len()
    );
}

#[test]
fn test_core_source_exists() {
    assert!(
        core_src().join("lib.rs").exists(),
        "expected canvas core sources at {}",
        core_src().display()
    );
}

#[test]
fn test_no_sleep_in_core() {
    let violations = scan(&core_src(), &["thread::sleep", "sleep("], |_| false);
    report("sleep() calls found in the canvas core", &violations);
}

#[test]
fn test_no_network_or_runtime_in_core() {
    let violations = scan(&core_src(), &["std::net", "tokio"], |_| false);
    report("Network I/O or async runtime found in the canvas core", &violations);
}

#[test]
fn test_fs_only_in_config() {
    let config_dir = core_src().join("config");
    let violations = scan(&core_src(), &["std::fs"], |path: &Path| {
        path.starts_with(&config_dir)
    });
    report("File system access outside the config module", &violations);
}

#[test]
fn test_core_manifest_has_no_runtime() {
    let manifest = std::fs::read_to_string(core_src().join("../Cargo.toml")).unwrap();
    let deps = manifest
        .split("[dependencies]")
        .nth(1)
        .and_then(|rest| rest.split("[dev-dependencies]").next())
        .unwrap_or("");
    assert!(
        !deps.lines().any(|l| l.trim_start().starts_with("tokio")),
        "canvas-core must not depend on tokio"
    );
}
