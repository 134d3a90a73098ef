//! Common utilities shared across the storefront gateway crates.

#![warn(clippy::pedantic)]

/// Module for JWT utilities (size limits, header inspection, expiry checks)
pub mod jwt;

/// Module for the injectable wall clock
pub mod clock;
