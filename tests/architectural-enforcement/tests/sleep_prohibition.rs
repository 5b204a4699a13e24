//! Integration Test: Sleep Prohibition
//!
//! **Policy**: Production code MUST NOT call sleep methods. A turn advances
//! only when the network delivers bytes; waiting is done by awaiting I/O or
//! channels, never by sleeping and polling.
//! **Exceptions**: test code

use architectural_enforcement::{assert_clean, scan, PRODUCTION_TREES};

/// Test that production code does not contain sleep() calls
#[test]
fn test_no_sleep_in_production_code() {
    let violations = scan(PRODUCTION_TREES, |code| {
        code.contains("::sleep(") || code.contains(".sleep(")
    });
    assert_clean("No sleep in production code (wait on I/O)", &violations);
}

/// Test that production code does not block the async runtime
#[test]
fn test_no_blocking_io_in_core() {
    let violations = scan(&["ragchat/core/src"], |code| {
        code.contains("reqwest::blocking") || code.contains("std::io::stdin")
    });
    assert_clean("No blocking I/O in the core library", &violations);
}
