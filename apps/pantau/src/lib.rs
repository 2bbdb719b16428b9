//! # Pantau
//!
//! Dashboard backend for village proposal oversight: a cached view over a
//! remote record store, aggregated with `pantau-core`.
//!
//! - [`remote`] - record store client and lenient wire parsing
//! - [`cache`] - TTL cache controller, roster store, background refresh
//! - [`api`] - axum HTTP API
//! - [`cli`] - clap commands
//! - [`config`] - `pantau.toml` + environment

pub mod api;
pub mod cache;
pub mod cli;
pub mod config;
pub mod remote;
