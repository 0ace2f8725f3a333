//! Shared test utilities for keytrust.
//!
//! Fixtures write straight to the provider schema so tests can seed key rings, user ids,
//! certifications and registrations without going through the engine under test.
//!
//! ## Module Organization
//!
//! - [`time`] - Timestamp utilities
//! - [`fixtures`] - Registration and key ring seeding
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use keytrust_test_utils::fixtures::{self, KeyFixture, VERIFIED_SELF};
//!
//! # async fn seed(pool: &sqlx::SqlitePool) -> Result<(), sqlx::Error> {
//! fixtures::register_app(pool, "org.example.mail").await?;
//! KeyFixture::new(0xA)
//!     .user_id("Alice <alice@example.com>", "alice@example.com")
//!     .certified(VERIFIED_SELF)
//!     .insert(pool)
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod fixtures;
pub mod time;

pub use fixtures::KeyFixture;
