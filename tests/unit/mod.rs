//! Unit tests for individual components

mod error_test;
mod runtime_test;
mod tracking_test;
