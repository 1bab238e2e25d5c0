//! VaultIO Common - Shared types and utilities
//!
//! This crate provides common types and error definitions used across
//! all VaultIO components.

pub mod error;
pub mod types;

pub use error::{Direction, Error, Result};
pub use types::*;
