//! Shared storage integration tests.
//!
//! Tests the TrackingStore interface against all implementations.
//! Each implementation module imports these test functions and runs them.

pub mod tracking_store_tests;
