//! Shared utilities for integration tests.
#![allow(dead_code)]

/// Check namespace test dependencies. Returns `true` if tests should be
/// skipped (prints the reason to stderr). Use at the top of every test.
pub fn skip_without_netns() -> bool {
    if netem_link::check_privileges() {
        false
    } else {
        eprintln!("Skipping: requires `ip` and passwordless sudo");
        true
    }
}

/// True if `tc qdisc show` for `iface` inside `ns` mentions `needle`.
pub fn qdisc_contains(ns: &netem_link::Namespace, iface: &str, needle: &str) -> bool {
    let out = ns
        .exec("tc", &["qdisc", "show", "dev", iface])
        .expect("tc qdisc show");
    String::from_utf8_lossy(&out.stdout).contains(needle)
}
