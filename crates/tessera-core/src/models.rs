//! Domain models for Tessera.
//!
//! These are the core types shared across all crates.

pub mod session;
pub mod subscription;
pub mod tenant;
pub mod user;
