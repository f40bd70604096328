//! Startup migration sweep.

use surrealdb::{Connection, Surreal};
use tessera_core::error::{TesseraError, TesseraResult};
use tessera_core::models::tenant::TenantRecord;
use tessera_core::repository::TenantRegistry;
use tracing::{error, info, warn};

use crate::connection::ConnectionDescriptor;
use crate::error::DbError;
use crate::resolver::ConnectionPool;
use crate::schema::{migrate_master, migrate_tenant};

/// What the startup sweep did.
#[derive(Debug, Default)]
pub struct StartupReport {
    pub migrated: Vec<String>,
    /// Registered but not fully provisioned; left for repair.
    pub skipped: Vec<String>,
    pub failed: Vec<(String, TesseraError)>,
}

/// Migrate the master database, then every known tenant in turn.
///
/// A master failure aborts startup. Tenant failures are logged and
/// collected so one broken tenant does not block the rest.
pub async fn bootstrap<C: Connection, R: TenantRegistry>(
    master: &Surreal<C>,
    registry: &R,
    pool: &ConnectionPool,
) -> TesseraResult<StartupReport> {
    migrate_master(master).await.map_err(|e| {
        error!(error = %e, "Master migration failed");
        TesseraError::from(e)
    })?;
    info!("Master database ready");

    let mut report = StartupReport::default();
    for record in registry.list().await? {
        let identifier = record.subdomain_identifier.clone();

        if !record.is_ready() {
            warn!(
                tenant = %identifier,
                status = %record.status,
                "Skipping incompletely provisioned tenant"
            );
            report.skipped.push(identifier);
            continue;
        }

        match migrate_one(&record, pool).await {
            Ok(()) => report.migrated.push(identifier),
            Err(e) => {
                error!(tenant = %identifier, error = %e, "Tenant migration failed, skipping");
                report.failed.push((identifier, e.into()));
            }
        }
    }

    info!(
        migrated = report.migrated.len(),
        skipped = report.skipped.len(),
        failed = report.failed.len(),
        "Tenant migration sweep finished"
    );
    Ok(report)
}

async fn migrate_one(record: &TenantRecord, pool: &ConnectionPool) -> Result<(), DbError> {
    let descriptor: ConnectionDescriptor = record.connection_descriptor.parse()?;
    let db = pool.open(&descriptor).await?;
    migrate_tenant(&db).await
}
