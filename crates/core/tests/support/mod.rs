//! Shared test helpers for `stockade-core` integration tests.
//!
//! An in-memory store that understands the core's labelled statements, and
//! lightweight mocks for the async ports.

#![allow(dead_code)]

pub mod memory;
pub mod mocks;
