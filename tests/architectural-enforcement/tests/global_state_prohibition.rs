//! Integration Test: No Process-Wide State
//!
//! **Policy**: Turn state is owned per panel. Two panels must never share one
//! state machine, so production code must not hold mutable statics.

use architectural_enforcement::{assert_clean, scan, PRODUCTION_TREES};

const FORBIDDEN: &[&str] = &[
    "static mut ",
    "lazy_static!",
    "thread_local!",
    "OnceLock<",
    "OnceCell<",
    "LazyLock<",
];

#[test]
fn test_no_global_mutable_state() {
    let violations = scan(PRODUCTION_TREES, |code| {
        FORBIDDEN.iter().any(|pattern| code.contains(pattern))
    });
    assert_clean("No process-wide mutable state", &violations);
}

#[test]
fn test_orchestrator_is_not_shared_through_statics() {
    let violations = scan(PRODUCTION_TREES, |code| {
        let code = code.trim_start();
        (code.starts_with("static ") || code.starts_with("pub static "))
            && (code.contains("Orchestrator") || code.contains("Mutex") || code.contains("RwLock"))
    });
    assert_clean("Orchestrator state is owned per panel", &violations);
}
