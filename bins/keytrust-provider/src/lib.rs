//! Keytrust provider library exports.
//!
//! The engine modules are usable without the REST transport; tests drive both.

pub mod access;
pub mod api;
pub mod apps;
pub mod config;
pub mod db;
pub mod error;
pub mod notify;
pub mod status;
pub mod trust;
pub mod types;
