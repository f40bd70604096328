//! Tenant connection resolution.
//!
//! [`ConnectionPool`] keeps one engine client per endpoint and hands out
//! per-database sessions cloned from it. The master database and every
//! tenant database on an endpoint therefore share one engine, which is
//! what makes `DEFINE DATABASE` on the master visible to the tenant
//! client (and, for `mem://`, keeps them in the same datastore).

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex};

use surrealdb::Surreal;
use surrealdb::engine::any::Any;
use tessera_core::error::{TesseraError, TesseraResult};
use tessera_core::models::tenant::normalize_subdomain;
use tessera_core::repository::TenantRegistry;
use tokio::sync::OnceCell;
use tracing::{debug, error};

use crate::connection::{self, ConnectionDescriptor, Credentials};
use crate::error::DbError;

type Slot = Arc<OnceCell<Surreal<Any>>>;

/// Lazily opened clients: engines keyed by endpoint, database sessions
/// keyed by descriptor.
///
/// A failed open leaves the slot empty so the next caller retries.
pub struct ConnectionPool {
    credentials: Option<Credentials>,
    engines: Mutex<HashMap<String, Slot>>,
    databases: Mutex<HashMap<ConnectionDescriptor, Slot>>,
}

impl ConnectionPool {
    pub fn new(credentials: Option<Credentials>) -> Self {
        Self {
            credentials,
            engines: Mutex::new(HashMap::new()),
            databases: Mutex::new(HashMap::new()),
        }
    }

    /// Return a client with `descriptor`'s namespace and database
    /// selected, opening the endpoint on first use.
    pub async fn open(&self, descriptor: &ConnectionDescriptor) -> Result<Surreal<Any>, DbError> {
        let cell = slot(&self.databases, descriptor)?;

        let db = cell
            .get_or_try_init(|| async {
                debug!(descriptor = %descriptor, "Connection cache miss");
                let engine = self.engine(&descriptor.endpoint).await?;
                // A clone is a new session on the same engine.
                let db = engine.clone();
                db.use_ns(descriptor.namespace.as_str())
                    .use_db(descriptor.database.as_str())
                    .await?;
                Ok::<_, DbError>(db)
            })
            .await?;

        Ok(db.clone())
    }

    async fn engine(&self, endpoint: &str) -> Result<Surreal<Any>, DbError> {
        let cell = slot(&self.engines, &endpoint.to_owned())?;
        let engine = cell
            .get_or_try_init(|| connection::connect(endpoint, self.credentials.as_ref()))
            .await?;
        Ok(engine.clone())
    }
}

fn slot<K: Eq + Hash + Clone>(map: &Mutex<HashMap<K, Slot>>, key: &K) -> Result<Slot, DbError> {
    let mut slots = map
        .lock()
        .map_err(|_| DbError::Corrupt("connection pool lock poisoned".into()))?;
    Ok(slots.entry(key.clone()).or_default().clone())
}

/// Maps a tenant identifier to a live client for that tenant's database.
pub struct ConnectionResolver<R: TenantRegistry> {
    registry: R,
    pool: Arc<ConnectionPool>,
}

impl<R: TenantRegistry> ConnectionResolver<R> {
    pub fn new(registry: R, pool: Arc<ConnectionPool>) -> Self {
        Self { registry, pool }
    }

    pub fn pool(&self) -> &Arc<ConnectionPool> {
        &self.pool
    }

    /// Resolve `subdomain_identifier` to its tenant database.
    ///
    /// Only fully migrated tenants are served; a tenant left mid-way by a
    /// failed provisioning run reports [`TesseraError::TenantNotReady`].
    pub async fn resolve(&self, subdomain_identifier: &str) -> TesseraResult<Surreal<Any>> {
        let identifier =
            normalize_subdomain(subdomain_identifier).map_err(TesseraError::validation)?;

        let record = self
            .registry
            .lookup(&identifier)
            .await?
            .ok_or_else(|| TesseraError::UnknownTenant {
                identifier: identifier.clone(),
            })?;

        if !record.is_ready() {
            return Err(TesseraError::TenantNotReady {
                identifier,
                status: record.status,
            });
        }

        let descriptor: ConnectionDescriptor = record.connection_descriptor.parse()?;

        self.pool.open(&descriptor).await.map_err(|e| {
            error!(
                tenant = %identifier,
                descriptor = %descriptor,
                error = %e,
                "Tenant database unreachable"
            );
            TesseraError::Connection(e.to_string())
        })
    }
}
