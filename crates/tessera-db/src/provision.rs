//! Tenant provisioning.
//!
//! Provisioning runs as a sequence of stages: create the database,
//! register it, connect, migrate. The stages are not transactional. The
//! registry row records how far a tenant got, so a rerun or [`repair`]
//! picks up at the first incomplete stage.
//!
//! [`repair`]: TenantProvisioner::repair

use std::sync::Arc;

use surrealdb::{Connection, Surreal};
use tessera_core::error::{TesseraError, TesseraResult};
use tessera_core::models::tenant::{
    CreateTenantRecord, ProvisionStage, ProvisionStatus, TenantRecord, normalize_subdomain,
};
use tessera_core::repository::TenantRegistry;
use tracing::{error, info, warn};

use crate::connection::{ConnectionDescriptor, DbConfig, is_identifier};
use crate::error::DbError;
use crate::resolver::ConnectionPool;
use crate::schema::migrate_tenant;

/// Derives a tenant's database name and descriptor from its identifier.
#[derive(Debug, Clone)]
pub struct TenantNaming {
    pub endpoint: String,
    pub namespace: String,
    pub suffix: String,
}

impl TenantNaming {
    pub fn from_config(config: &DbConfig) -> Self {
        Self {
            endpoint: config.endpoint.clone(),
            namespace: config.namespace.clone(),
            suffix: config.tenant_database_suffix.clone(),
        }
    }

    /// `acme-corp` becomes `acme_corp_tenant`.
    pub fn database_name(&self, identifier: &str) -> String {
        format!("{}{}", identifier.replace('-', "_"), self.suffix)
    }

    pub fn descriptor(&self, identifier: &str) -> ConnectionDescriptor {
        ConnectionDescriptor {
            endpoint: self.endpoint.clone(),
            namespace: self.namespace.clone(),
            database: self.database_name(identifier),
        }
    }
}

/// Outcome of a [`TenantProvisioner::repair`] pass.
#[derive(Debug, Default)]
pub struct RepairReport {
    /// Tenants brought to `Migrated` by this pass.
    pub repaired: Vec<String>,
    /// Tenants that are still incomplete, with the error that stopped them.
    pub failed: Vec<(String, TesseraError)>,
}

/// Creates tenant databases and drives their registry rows to `Migrated`.
pub struct TenantProvisioner<C: Connection, R: TenantRegistry> {
    master: Surreal<C>,
    registry: R,
    pool: Arc<ConnectionPool>,
    naming: TenantNaming,
}

impl<C: Connection, R: TenantRegistry> TenantProvisioner<C, R> {
    pub fn new(
        master: Surreal<C>,
        registry: R,
        pool: Arc<ConnectionPool>,
        naming: TenantNaming,
    ) -> Self {
        Self {
            master,
            registry,
            pool,
            naming,
        }
    }

    pub fn registry(&self) -> &R {
        &self.registry
    }

    /// Provision a new tenant, or resume one left incomplete.
    ///
    /// A tenant that is already fully provisioned is rejected at the
    /// `register` stage before any database is touched.
    pub async fn provision(&self, subdomain_identifier: &str) -> TesseraResult<TenantRecord> {
        let identifier =
            normalize_subdomain(subdomain_identifier).map_err(TesseraError::validation)?;

        let existing = self
            .registry
            .lookup(&identifier)
            .await
            .map_err(|e| TesseraError::provision(ProvisionStage::Register, e))?;

        let record = match existing {
            Some(record) if record.status == ProvisionStatus::Migrated => {
                warn!(tenant = %identifier, "Tenant already provisioned");
                return Err(TesseraError::provision(
                    ProvisionStage::Register,
                    format!("tenant '{identifier}' already exists"),
                ));
            }
            Some(record) => {
                info!(
                    tenant = %identifier,
                    status = %record.status,
                    "Resuming incomplete provisioning"
                );
                record
            }
            None => {
                let descriptor = self.naming.descriptor(&identifier);
                self.create_database(&descriptor).await?;

                info!(tenant = %identifier, "Registering tenant");
                self.registry
                    .register(CreateTenantRecord {
                        subdomain_identifier: identifier.clone(),
                        connection_descriptor: descriptor.to_string(),
                    })
                    .await
                    .map_err(|e| {
                        error!(tenant = %identifier, error = %e, "Tenant registration failed");
                        TesseraError::provision(ProvisionStage::Register, e)
                    })?
            }
        };

        self.complete(record).await
    }

    /// Run the remaining stages for a registered tenant.
    pub async fn complete(&self, mut record: TenantRecord) -> TesseraResult<TenantRecord> {
        let identifier = record.subdomain_identifier.clone();

        let descriptor: ConnectionDescriptor = record
            .connection_descriptor
            .parse()
            .map_err(|e: DbError| TesseraError::provision(ProvisionStage::Connect, e))?;

        info!(tenant = %identifier, database = %descriptor.database, "Connecting to tenant database");
        let db = self.pool.open(&descriptor).await.map_err(|e| {
            error!(tenant = %identifier, error = %e, "Tenant connection failed");
            TesseraError::provision(ProvisionStage::Connect, e)
        })?;

        if record.status < ProvisionStatus::Connected {
            record = self
                .registry
                .set_status(record.id, ProvisionStatus::Connected)
                .await
                .map_err(|e| TesseraError::provision(ProvisionStage::Connect, e))?;
        }

        info!(tenant = %identifier, "Migrating tenant database");
        migrate_tenant(&db).await.map_err(|e| {
            error!(tenant = %identifier, error = %e, "Tenant migration failed");
            TesseraError::provision(ProvisionStage::Migrate, e)
        })?;

        if record.status < ProvisionStatus::Migrated {
            record = self
                .registry
                .set_status(record.id, ProvisionStatus::Migrated)
                .await
                .map_err(|e| TesseraError::provision(ProvisionStage::Migrate, e))?;
        }

        info!(tenant = %identifier, "Tenant provisioned");
        Ok(record)
    }

    /// Resume every registered tenant that has not reached `Migrated`.
    pub async fn repair(&self) -> TesseraResult<RepairReport> {
        let mut report = RepairReport::default();

        for record in self.registry.list().await? {
            if record.status == ProvisionStatus::Migrated {
                continue;
            }

            let identifier = record.subdomain_identifier.clone();
            info!(tenant = %identifier, status = %record.status, "Repairing tenant");
            match self.complete(record).await {
                Ok(_) => report.repaired.push(identifier),
                Err(e) => {
                    warn!(tenant = %identifier, error = %e, "Tenant repair failed");
                    report.failed.push((identifier, e));
                }
            }
        }

        info!(
            repaired = report.repaired.len(),
            failed = report.failed.len(),
            "Repair pass finished"
        );
        Ok(report)
    }

    /// `DEFINE DATABASE` in the master's namespace. An existing database is
    /// reused.
    async fn create_database(&self, descriptor: &ConnectionDescriptor) -> TesseraResult<()> {
        let name = &descriptor.database;
        if !is_identifier(name) {
            return Err(TesseraError::provision(
                ProvisionStage::Create,
                format!("invalid database name '{name}'"),
            ));
        }

        info!(database = %name, "Creating tenant database");
        let outcome = self
            .master
            .query(format!("DEFINE DATABASE {name}"))
            .await
            .map_err(DbError::from)
            .and_then(|response| response.check().map(drop).map_err(DbError::from));

        match outcome {
            Ok(()) => Ok(()),
            Err(e) if e.is_already_exists() => {
                info!(database = %name, "Tenant database already exists, reusing it");
                Ok(())
            }
            Err(e) => {
                error!(database = %name, error = %e, "Tenant database creation failed");
                Err(TesseraError::provision(ProvisionStage::Create, e))
            }
        }
    }
}
