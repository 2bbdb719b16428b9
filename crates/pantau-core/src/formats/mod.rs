//! # Formats Module
//!
//! Binary snapshot format for offline datasets.
//!
//! File I/O lives in the app layer; this module only turns snapshots into
//! bytes and back.

mod persistence;

pub use persistence::*;
