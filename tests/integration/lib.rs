//! Shared helpers for Haven integration tests.
//!
//! Intentionally minimal: each file under tests/ builds its own fixtures.
