//! # pantsu-core
//!
//! Core types, traits, and abstractions for the pantsu-booru image board.
//!
//! This crate provides the foundational data structures and trait definitions
//! that the store implementation (`pantsu-db`) depends on: the typed row
//! snapshots, the error taxonomy, tag normalization rules, configuration and
//! logging setup.

pub mod config;
pub mod credentials;
pub mod defaults;
pub mod error;
pub mod logging;
pub mod models;
pub mod tags;
pub mod traits;

// Re-export commonly used types at crate root
pub use config::{BooruConfig, LogFormat};
pub use credentials::{Argon2Hasher, PasswordHasher};
pub use error::{Error, Result};
pub use models::*;
pub use tags::{normalize_query, normalize_tag, normalize_tags, parse_tag_string, validate_tag};
pub use traits::*;
