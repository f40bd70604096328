//! Tessera Core: domain models, error taxonomy and repository traits
//! shared by the storage, authentication and server crates.

pub mod api;
pub mod error;
pub mod models;
pub mod repository;
