//! Transports for the provider.

pub mod rest;
