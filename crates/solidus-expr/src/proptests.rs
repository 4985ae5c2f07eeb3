//! Property-based tests for derivatives and deduplication.
