//! SurrealDB implementation of [`TenantRegistry`].

use chrono::{DateTime, Utc};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tessera_core::error::{TesseraError, TesseraResult};
use tessera_core::models::tenant::{CreateTenantRecord, ProvisionStatus, TenantRecord};
use tessera_core::repository::TenantRegistry;
use uuid::Uuid;

use crate::error::DbError;

/// DB-side row struct for queries where the UUID is already known.
#[derive(Debug, SurrealValue)]
struct TenantRow {
    subdomain_identifier: String,
    connection_descriptor: String,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    deleted_at: Option<DateTime<Utc>>,
}

impl TenantRow {
    fn into_record(self, id: Uuid) -> Result<TenantRecord, DbError> {
        let status = self.status.parse::<ProvisionStatus>().map_err(DbError::Corrupt)?;
        Ok(TenantRecord {
            id,
            subdomain_identifier: self.subdomain_identifier,
            connection_descriptor: self.connection_descriptor,
            status,
            created_at: self.created_at,
            updated_at: self.updated_at,
            deleted_at: self.deleted_at,
        })
    }
}

/// DB-side row struct that includes the record ID via `meta::id(id)`.
#[derive(Debug, SurrealValue)]
struct TenantRowWithId {
    record_id: String,
    subdomain_identifier: String,
    connection_descriptor: String,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    deleted_at: Option<DateTime<Utc>>,
}

impl TenantRowWithId {
    fn try_into_record(self) -> Result<TenantRecord, DbError> {
        let id = Uuid::parse_str(&self.record_id)
            .map_err(|e| DbError::Corrupt(format!("invalid tenant UUID: {e}")))?;
        let status = self.status.parse::<ProvisionStatus>().map_err(DbError::Corrupt)?;
        Ok(TenantRecord {
            id,
            subdomain_identifier: self.subdomain_identifier,
            connection_descriptor: self.connection_descriptor,
            status,
            created_at: self.created_at,
            updated_at: self.updated_at,
            deleted_at: self.deleted_at,
        })
    }
}

/// Tenant registry backed by the master database.
///
/// Uniqueness of `subdomain_identifier` is enforced by a unique index, so
/// concurrent registrations of the same identifier cannot both succeed.
pub struct SurrealTenantRegistry<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> Clone for SurrealTenantRegistry<C> {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
        }
    }
}

impl<C: Connection> SurrealTenantRegistry<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> TenantRegistry for SurrealTenantRegistry<C> {
    async fn register(&self, input: CreateTenantRecord) -> TesseraResult<TenantRecord> {
        let id = Uuid::new_v4();
        let id_str = id.to_string();

        let result = self
            .db
            .query(
                "CREATE type::record('tenant', $id) SET \
                 subdomain_identifier = $subdomain, \
                 connection_descriptor = $descriptor, \
                 status = $status",
            )
            .bind(("id", id_str.clone()))
            .bind(("subdomain", input.subdomain_identifier.clone()))
            .bind(("descriptor", input.connection_descriptor))
            .bind(("status", ProvisionStatus::Registered.as_str()))
            .await
            .map_err(DbError::from)?;

        let mut result = result.check().map_err(|e| {
            let err = DbError::from(e);
            if err.is_unique_violation() {
                tracing::warn!(
                    subdomain = %input.subdomain_identifier,
                    "Tenant identifier already registered"
                );
                TesseraError::AlreadyExists {
                    entity: format!("tenant '{}'", input.subdomain_identifier),
                }
            } else {
                err.into()
            }
        })?;

        let rows: Vec<TenantRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "tenant".into(),
            id: id_str,
        })?;

        Ok(row.into_record(id)?)
    }

    async fn lookup(&self, subdomain_identifier: &str) -> TesseraResult<Option<TenantRecord>> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM tenant \
                 WHERE subdomain_identifier = $subdomain \
                 AND deleted_at IS NONE",
            )
            .bind(("subdomain", subdomain_identifier.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<TenantRowWithId> = result.take(0).map_err(DbError::from)?;
        rows.into_iter()
            .next()
            .map(|row| row.try_into_record().map_err(Into::into))
            .transpose()
    }

    async fn list(&self) -> TesseraResult<Vec<TenantRecord>> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM tenant \
                 WHERE deleted_at IS NONE \
                 ORDER BY created_at ASC",
            )
            .await
            .map_err(DbError::from)?;

        let rows: Vec<TenantRowWithId> = result.take(0).map_err(DbError::from)?;
        let records = rows
            .into_iter()
            .map(|row| row.try_into_record())
            .collect::<Result<Vec<_>, DbError>>()?;
        Ok(records)
    }

    async fn set_status(&self, id: Uuid, status: ProvisionStatus) -> TesseraResult<TenantRecord> {
        let id_str = id.to_string();

        let result = self
            .db
            .query(
                "UPDATE type::record('tenant', $id) SET \
                 status = $status, updated_at = time::now()",
            )
            .bind(("id", id_str.clone()))
            .bind(("status", status.as_str()))
            .await
            .map_err(DbError::from)?;
        let mut result = result.check().map_err(DbError::from)?;

        let rows: Vec<TenantRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "tenant".into(),
            id: id_str,
        })?;

        Ok(row.into_record(id)?)
    }

    async fn soft_delete(&self, id: Uuid) -> TesseraResult<()> {
        self.db
            .query(
                "UPDATE type::record('tenant', $id) SET \
                 deleted_at = time::now(), updated_at = time::now()",
            )
            .bind(("id", id.to_string()))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(DbError::from)?;

        Ok(())
    }
}
