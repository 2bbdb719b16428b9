//! # System Module
//!
//! Proposal pipeline stage resolution.
//!
//! The resolver is pure and deterministic; it recomputes the stage from the
//! latest snapshot of a record every time it is asked.

mod stage;

pub use stage::*;
