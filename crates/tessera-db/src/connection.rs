//! SurrealDB connection management.
//!
//! Every database, master or tenant, is reached through a
//! [`ConnectionDescriptor`]: an engine endpoint plus a namespace and a
//! database name. The `any` engine picks the transport from the endpoint
//! scheme, so `ws://…` talks to a server and `mem://` runs in-process.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use surrealdb::Surreal;
use surrealdb::engine::any::{self, Any};
use surrealdb::opt::auth::Root;
use tracing::info;

use crate::error::DbError;
use crate::resolver::ConnectionPool;

/// Configuration for connecting to SurrealDB.
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Engine endpoint (e.g., `ws://127.0.0.1:8000` or `mem://`).
    pub endpoint: String,
    /// Namespace shared by the master and all tenant databases.
    pub namespace: String,
    /// Master database name.
    pub database: String,
    /// Root credentials. `None` skips sign-in (embedded engines).
    pub credentials: Option<Credentials>,
    /// Appended to the lower-cased subdomain to name a tenant database.
    pub tenant_database_suffix: String,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            endpoint: "ws://127.0.0.1:8000".into(),
            namespace: "tessera".into(),
            database: "master".into(),
            credentials: Some(Credentials {
                username: "root".into(),
                password: "root".into(),
            }),
            tenant_database_suffix: "_tenant".into(),
        }
    }
}

impl DbConfig {
    /// Descriptor of the master database.
    pub fn master_descriptor(&self) -> ConnectionDescriptor {
        ConnectionDescriptor {
            endpoint: self.endpoint.clone(),
            namespace: self.namespace.clone(),
            database: self.database.clone(),
        }
    }
}

#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Where a database lives.
///
/// Rendered as `<endpoint>#<namespace>/<database>`. Credentials are never
/// part of a descriptor; they come from [`DbConfig`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConnectionDescriptor {
    pub endpoint: String,
    pub namespace: String,
    pub database: String,
}

impl fmt::Display for ConnectionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}/{}", self.endpoint, self.namespace, self.database)
    }
}

impl FromStr for ConnectionDescriptor {
    type Err = DbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || DbError::Descriptor(s.to_string());

        let (endpoint, location) = s.rsplit_once('#').ok_or_else(malformed)?;
        let (namespace, database) = location.split_once('/').ok_or_else(malformed)?;

        if endpoint.is_empty()
            || !endpoint.contains("://")
            || !is_identifier(namespace)
            || !is_identifier(database)
        {
            return Err(malformed());
        }

        Ok(Self {
            endpoint: endpoint.to_string(),
            namespace: namespace.to_string(),
            database: database.to_string(),
        })
    }
}

/// `[a-z0-9_]+`: safe to splice into DEFINE statements unquoted.
pub(crate) fn is_identifier(s: &str) -> bool {
    !s.is_empty()
        && s
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

/// Owns the connection pool and the master database client.
#[derive(Clone)]
pub struct DbManager {
    db: Surreal<Any>,
    pool: Arc<ConnectionPool>,
}

impl DbManager {
    /// Connect to the master database described by `config`.
    ///
    /// The master client is opened through the same pool as tenant
    /// databases, so both run on one engine.
    pub async fn connect(config: &DbConfig) -> Result<Self, DbError> {
        let pool = Arc::new(ConnectionPool::new(config.credentials.clone()));
        let db = pool.open(&config.master_descriptor()).await?;
        Ok(Self { db, pool })
    }

    /// Returns a reference to the underlying SurrealDB client.
    pub fn client(&self) -> &Surreal<Any> {
        &self.db
    }

    pub fn pool(&self) -> &Arc<ConnectionPool> {
        &self.pool
    }
}

/// Connect to `endpoint` and sign in when credentials are given.
///
/// No namespace or database is selected; [`ConnectionPool`] does that on
/// per-database clones of the returned client.
pub(crate) async fn connect(
    endpoint: &str,
    credentials: Option<&Credentials>,
) -> Result<Surreal<Any>, DbError> {
    info!(endpoint, "Connecting to SurrealDB");

    let db = any::connect(endpoint).await?;

    if let Some(creds) = credentials {
        db.signin(Root {
            username: creds.username.clone(),
            password: creds.password.clone(),
        })
        .await?;
    }

    info!(endpoint, "Connected to SurrealDB");

    Ok(db)
}
