//! Shared test utilities for matchday integration tests.
//!
//! This module provides:
//! - `TestHarness` for isolated runs against a temporary data tree
//! - Builders for index records and raw match payloads
//! - A scripted `MatchSource` that never touches the network

pub mod builders;
pub mod harness;

pub use builders::*;
pub use harness::TestHarness;
