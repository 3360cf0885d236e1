//! Shared test utilities for scanfolio integration tests.
//!
//! - `TestHarness` wires a scheduler and session around scripted collaborators
//! - `fakes` holds the scripted analysis service, intake and observers
//! - `builders` creates page results and config documents without boilerplate

pub mod builders;
pub mod fakes;
pub mod harness;

pub use builders::*;
pub use fakes::*;
pub use harness::TestHarness;
