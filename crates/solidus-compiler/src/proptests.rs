//! Property-based tests for compiled sequences.
