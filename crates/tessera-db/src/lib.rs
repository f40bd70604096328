//! Tessera Database: SurrealDB storage for the master and tenant
//! databases.
//!
//! This crate provides:
//! - Connection management ([`DbManager`], [`DbConfig`], [`ConnectionDescriptor`])
//! - Schema migrations ([`migrate_master`], [`migrate_tenant`])
//! - Repository implementations of the `tessera-core` traits
//! - Tenant provisioning ([`TenantProvisioner`]) and resolution
//!   ([`ConnectionResolver`])
//! - The startup sweep ([`bootstrap`])
//! - Error types ([`DbError`])

mod connection;
mod directory;
mod error;
mod provision;
mod resolver;
mod schema;
mod startup;

pub mod repository;

pub use connection::{ConnectionDescriptor, Credentials, DbConfig, DbManager};
pub use directory::SurrealUserDirectory;
pub use error::DbError;
pub use provision::{RepairReport, TenantNaming, TenantProvisioner};
pub use resolver::{ConnectionPool, ConnectionResolver};
pub use schema::{migrate_master, migrate_tenant};
pub use startup::{StartupReport, bootstrap};
