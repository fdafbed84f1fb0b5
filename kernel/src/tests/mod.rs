//! Kernel Unit Tests Module
//!
//! Tests that drive the global scheduler. Each one boots its own tasking
//! instance on the test thread through [`harness`].


mod lifecycle_tests;
