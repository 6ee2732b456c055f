//! Integration test suite.

mod common;

mod pipeline_test;
mod resumption_test;
mod store_test;
