//! SurrealDB implementation of [`UserRepository`].
//!
//! One implementation serves both user tables: `master_user` in the master
//! database and `user` in each tenant database. Passwords arrive already
//! hashed; this layer never sees a raw password.

use chrono::{DateTime, Utc};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tessera_core::error::{TesseraError, TesseraResult};
use tessera_core::models::user::{CreateUser, User};
use tessera_core::repository::UserRepository;
use uuid::Uuid;

use crate::error::DbError;

/// Which user table a repository reads and writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserTable {
    /// `master_user` in the master database.
    Master,
    /// `user` in a tenant database.
    Tenant,
}

impl UserTable {
    fn name(self) -> &'static str {
        match self {
            UserTable::Master => "master_user",
            UserTable::Tenant => "user",
        }
    }
}

/// DB-side row struct for queries where the UUID is already known.
#[derive(Debug, SurrealValue)]
struct UserRow {
    email: String,
    password_hash: String,
    account_type: i64,
    first_name: Option<String>,
    last_name: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl UserRow {
    fn into_user(self, id: Uuid) -> User {
        User {
            id,
            email: self.email,
            password_hash: self.password_hash,
            account_type: self.account_type,
            first_name: self.first_name,
            last_name: self.last_name,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// DB-side row struct that includes the record ID via `meta::id(id)`.
#[derive(Debug, SurrealValue)]
struct UserRowWithId {
    record_id: String,
    email: String,
    password_hash: String,
    account_type: i64,
    first_name: Option<String>,
    last_name: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl UserRowWithId {
    fn try_into_user(self) -> Result<User, DbError> {
        let id = Uuid::parse_str(&self.record_id)
            .map_err(|e| DbError::Corrupt(format!("invalid user UUID: {e}")))?;
        Ok(User {
            id,
            email: self.email,
            password_hash: self.password_hash,
            account_type: self.account_type,
            first_name: self.first_name,
            last_name: self.last_name,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// SurrealDB implementation of the User repository.
#[derive(Clone)]
pub struct SurrealUserRepository<C: Connection> {
    db: Surreal<C>,
    table: UserTable,
}

impl<C: Connection> SurrealUserRepository<C> {
    pub fn new(db: Surreal<C>, table: UserTable) -> Self {
        Self { db, table }
    }

    /// Master users on the master database.
    pub fn master(db: Surreal<C>) -> Self {
        Self::new(db, UserTable::Master)
    }

    /// Tenant users on a tenant database handle.
    pub fn tenant(db: Surreal<C>) -> Self {
        Self::new(db, UserTable::Tenant)
    }
}

impl<C: Connection> UserRepository for SurrealUserRepository<C> {
    async fn create(&self, input: CreateUser) -> TesseraResult<User> {
        let id = Uuid::new_v4();
        let id_str = id.to_string();
        let email = input.email.trim().to_lowercase();

        let result = self
            .db
            .query(
                "CREATE type::record($table, $id) SET \
                 email = $email, \
                 password_hash = $password_hash, \
                 account_type = $account_type, \
                 first_name = $first_name, \
                 last_name = $last_name",
            )
            .bind(("table", self.table.name()))
            .bind(("id", id_str.clone()))
            .bind(("email", email.clone()))
            .bind(("password_hash", input.password_hash))
            .bind(("account_type", input.account_type))
            .bind(("first_name", input.first_name))
            .bind(("last_name", input.last_name))
            .await
            .map_err(DbError::from)?;

        let mut result = result.check().map_err(|e| {
            let err = DbError::from(e);
            if err.is_unique_violation() {
                TesseraError::AlreadyExists {
                    entity: format!("user with email {email}"),
                }
            } else {
                err.into()
            }
        })?;

        let rows: Vec<UserRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: self.table.name().into(),
            id: id_str,
        })?;

        Ok(row.into_user(id))
    }

    async fn get_by_id(&self, id: Uuid) -> TesseraResult<User> {
        let id_str = id.to_string();

        let mut result = self
            .db
            .query("SELECT * FROM type::record($table, $id)")
            .bind(("table", self.table.name()))
            .bind(("id", id_str.clone()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<UserRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: self.table.name().into(),
            id: id_str,
        })?;

        Ok(row.into_user(id))
    }

    async fn get_by_email(&self, email: &str) -> TesseraResult<User> {
        let email = email.trim().to_lowercase();

        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * \
                 FROM type::table($table) WHERE email = $email",
            )
            .bind(("table", self.table.name()))
            .bind(("email", email.clone()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<UserRowWithId> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: self.table.name().into(),
            id: format!("email={email}"),
        })?;

        Ok(row.try_into_user()?)
    }
}
