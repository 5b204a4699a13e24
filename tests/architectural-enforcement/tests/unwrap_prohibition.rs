//! Integration Test: No Panicking Shortcuts in the Core Library
//!
//! **Policy**: The core library propagates errors with `?` and typed errors.
//! `unwrap()` and `expect()` are allowed in tests and in the binary's `main`
//! only.

use architectural_enforcement::{assert_clean, scan, CORE_TREE};

#[test]
fn test_no_unwrap_in_core_production_code() {
    let violations = scan(&[CORE_TREE], |code| {
        code.contains(".unwrap()") || code.contains(".expect(")
    });
    assert_clean("No unwrap()/expect() in ragchat-core", &violations);
}

#[test]
fn test_no_panic_macros_in_core_production_code() {
    let violations = scan(&[CORE_TREE], |code| {
        code.contains("panic!(") || code.contains("todo!(") || code.contains("unimplemented!(")
    });
    assert_clean("No panic!/todo!/unimplemented! in ragchat-core", &violations);
}
