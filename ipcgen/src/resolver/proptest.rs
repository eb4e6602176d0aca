//! Property-based tests for path handling and type rendering helpers.
