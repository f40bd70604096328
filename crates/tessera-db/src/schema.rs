//! Schema definitions and migration runner for SurrealDB.
//!
//! The master database and every tenant database carry their own
//! `_migration` table, so each one is migrated independently. All table
//! definitions use SCHEMAFULL mode. UUIDs are stored as strings.

use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::info;

use crate::error::DbError;

// -----------------------------------------------------------------------
// Migration tracking
// -----------------------------------------------------------------------

const MIGRATION_TABLE_DDL: &str = "\
DEFINE TABLE IF NOT EXISTS _migration SCHEMAFULL;
DEFINE FIELD IF NOT EXISTS version ON TABLE _migration TYPE int;
DEFINE FIELD IF NOT EXISTS name ON TABLE _migration TYPE string;
DEFINE FIELD IF NOT EXISTS applied_at ON TABLE _migration TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX IF NOT EXISTS idx_migration_version ON TABLE _migration \
    COLUMNS version UNIQUE;
";

#[derive(Debug, SurrealValue)]
struct MigrationRecord {
    version: u32,
}

struct Migration {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

static MASTER_MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    name: "master_initial_schema",
    sql: MASTER_SCHEMA_V1,
}];

static TENANT_MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    name: "tenant_initial_schema",
    sql: TENANT_SCHEMA_V1,
}];

// -----------------------------------------------------------------------
// Master schema v1
// -----------------------------------------------------------------------

const MASTER_SCHEMA_V1: &str = "\
-- =======================================================================
-- Tenant registry
-- =======================================================================
DEFINE TABLE tenant SCHEMAFULL;
DEFINE FIELD subdomain_identifier ON TABLE tenant TYPE string;
DEFINE FIELD connection_descriptor ON TABLE tenant TYPE string;
DEFINE FIELD status ON TABLE tenant TYPE string \
    ASSERT $value IN ['Registered', 'Connected', 'Migrated'];
DEFINE FIELD created_at ON TABLE tenant TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE tenant TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD deleted_at ON TABLE tenant TYPE option<datetime>;
DEFINE INDEX idx_tenant_subdomain ON TABLE tenant \
    COLUMNS subdomain_identifier UNIQUE;

-- =======================================================================
-- Subscriptions
-- =======================================================================
DEFINE TABLE subscription_type SCHEMAFULL;
DEFINE FIELD name ON TABLE subscription_type TYPE string;
DEFINE FIELD price ON TABLE subscription_type TYPE int;
DEFINE FIELD renewal_period_months ON TABLE subscription_type TYPE int \
    ASSERT $value >= 1 AND $value <= 24;
DEFINE FIELD auto_renew ON TABLE subscription_type TYPE bool \
    DEFAULT false;
DEFINE FIELD created_at ON TABLE subscription_type TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE subscription_type TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_subscription_type_name ON TABLE subscription_type \
    COLUMNS name UNIQUE;

DEFINE TABLE subscription_info SCHEMAFULL;
DEFINE FIELD tenant_id ON TABLE subscription_info TYPE string;
DEFINE FIELD subscription_type_id ON TABLE subscription_info TYPE string;
DEFINE FIELD created_at ON TABLE subscription_info TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE subscription_info TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_subscription_info_tenant ON TABLE subscription_info \
    COLUMNS tenant_id UNIQUE;

-- =======================================================================
-- Master users (privileged, host logins)
-- =======================================================================
DEFINE TABLE master_user SCHEMAFULL;
DEFINE FIELD email ON TABLE master_user TYPE string;
DEFINE FIELD password_hash ON TABLE master_user TYPE string;
DEFINE FIELD account_type ON TABLE master_user TYPE int DEFAULT 0;
DEFINE FIELD first_name ON TABLE master_user TYPE option<string>;
DEFINE FIELD last_name ON TABLE master_user TYPE option<string>;
DEFINE FIELD created_at ON TABLE master_user TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE master_user TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_master_user_email ON TABLE master_user \
    COLUMNS email UNIQUE;

-- =======================================================================
-- Sessions
-- =======================================================================
DEFINE TABLE session SCHEMAFULL;
DEFINE FIELD token_hash ON TABLE session TYPE string;
DEFINE FIELD profile_blob ON TABLE session TYPE string;
DEFINE FIELD version ON TABLE session TYPE int;
DEFINE FIELD expires_at ON TABLE session TYPE datetime;
DEFINE FIELD created_at ON TABLE session TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE session TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_session_token ON TABLE session \
    COLUMNS token_hash UNIQUE;
DEFINE INDEX idx_session_expiry ON TABLE session \
    COLUMNS expires_at;
";

// -----------------------------------------------------------------------
// Tenant schema v1
// -----------------------------------------------------------------------

const TENANT_SCHEMA_V1: &str = "\
DEFINE TABLE user SCHEMAFULL;
DEFINE FIELD email ON TABLE user TYPE string;
DEFINE FIELD password_hash ON TABLE user TYPE string;
DEFINE FIELD account_type ON TABLE user TYPE int DEFAULT 0;
DEFINE FIELD first_name ON TABLE user TYPE option<string>;
DEFINE FIELD last_name ON TABLE user TYPE option<string>;
DEFINE FIELD created_at ON TABLE user TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE user TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_user_email ON TABLE user \
    COLUMNS email UNIQUE;
";

// -----------------------------------------------------------------------
// Public API
// -----------------------------------------------------------------------

/// Apply the master schema (registry, subscriptions, master users,
/// sessions). Safe to re-run.
pub async fn migrate_master<C: Connection>(db: &Surreal<C>) -> Result<(), DbError> {
    run_migrations(db, "master", MASTER_MIGRATIONS).await
}

/// Apply the tenant schema (user table) to a tenant database. Safe to
/// re-run.
pub async fn migrate_tenant<C: Connection>(db: &Surreal<C>) -> Result<(), DbError> {
    run_migrations(db, "tenant", TENANT_MIGRATIONS).await
}

/// Run all pending migrations of `set` against the given client.
///
/// Creates a `_migration` tracking table on first run, then applies
/// each migration whose version exceeds the current maximum.
async fn run_migrations<C: Connection>(
    db: &Surreal<C>,
    set: &'static str,
    migrations: &'static [Migration],
) -> Result<(), DbError> {
    db.query(MIGRATION_TABLE_DDL)
        .await?
        .check()
        .map_err(|e| DbError::Migration(e.to_string()))?;

    let mut result = db
        .query("SELECT version FROM _migration ORDER BY version DESC LIMIT 1")
        .await?;
    let records: Vec<MigrationRecord> = result.take(0)?;
    let current_version = records.first().map(|m| m.version).unwrap_or(0);

    for migration in migrations {
        if migration.version <= current_version {
            continue;
        }

        info!(
            set,
            version = migration.version,
            name = migration.name,
            "Applying migration"
        );
        db.query(migration.sql).await?.check().map_err(|e| {
            DbError::Migration(format!(
                "Migration v{} '{}' failed: {}",
                migration.version, migration.name, e,
            ))
        })?;

        db.query(
            "CREATE _migration SET version = $version, \
             name = $name",
        )
        .bind(("version", migration.version))
        .bind(("name", migration.name))
        .await?
        .check()
        .map_err(|e| {
            DbError::Migration(format!(
                "Failed to record migration v{}: {}",
                migration.version, e,
            ))
        })?;

        info!(set, version = migration.version, "Migration applied");
    }

    Ok(())
}
