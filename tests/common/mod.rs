//! Common test utilities and fixtures for campus-atlas integration tests
//!
//! This module provides:
//! - `TestCampus` builder for creating data directories with areatree,
//!   source snapshots, overlays and map catalogs
//! - Invariant assertions over compiled entity graphs

#![allow(dead_code)]

pub mod assertions;
pub mod test_campus;

pub use assertions::*;
pub use test_campus::{standard_campus, TestCampus};
