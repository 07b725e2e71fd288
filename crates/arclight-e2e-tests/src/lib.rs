//! Integration-test-only crate; the tests live under `tests/`.
