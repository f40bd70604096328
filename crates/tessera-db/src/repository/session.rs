//! SurrealDB implementation of [`SessionRepository`].
//!
//! Profiles are stored as one opaque JSON blob. Updates are guarded by a
//! version column so a stale writer gets [`TesseraError::SessionConflict`]
//! instead of silently overwriting a newer session.

use chrono::{DateTime, Utc};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tessera_core::error::{TesseraError, TesseraResult};
use tessera_core::models::session::Session;
use tessera_core::repository::SessionRepository;
use uuid::Uuid;

use crate::error::DbError;

#[derive(Debug, SurrealValue)]
struct SessionRowWithId {
    record_id: String,
    token_hash: String,
    profile_blob: String,
    version: u64,
    expires_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl SessionRowWithId {
    fn try_into_session(self) -> Result<Session, DbError> {
        let id = Uuid::parse_str(&self.record_id)
            .map_err(|e| DbError::Corrupt(format!("invalid session UUID: {e}")))?;
        let (host, client) =
            Session::decode_profiles(&self.profile_blob).map_err(DbError::Corrupt)?;
        Ok(Session {
            id,
            token_hash: self.token_hash,
            host,
            client,
            version: self.version,
            expires_at: self.expires_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// Row shape returned by CREATE / UPDATE, where the id is already known.
#[derive(Debug, SurrealValue)]
struct SessionWriteRow {
    version: u64,
    updated_at: DateTime<Utc>,
}

/// SurrealDB implementation of the Session repository.
#[derive(Clone)]
pub struct SurrealSessionRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealSessionRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> SessionRepository for SurrealSessionRepository<C> {
    async fn find(&self, token_hash: &str) -> TesseraResult<Option<Session>> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM session \
                 WHERE token_hash = $token_hash",
            )
            .bind(("token_hash", token_hash.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<SessionRowWithId> = result.take(0).map_err(DbError::from)?;
        rows.into_iter()
            .next()
            .map(|row| row.try_into_session().map_err(Into::into))
            .transpose()
    }

    async fn save(&self, session: &Session) -> TesseraResult<Session> {
        let blob = session
            .encode_profiles()
            .map_err(|e| TesseraError::Session(format!("cannot encode profiles: {e}")))?;

        let query = if session.is_persisted() {
            self.db
                .query(
                    "UPDATE type::record('session', $id) SET \
                     profile_blob = $blob, \
                     version = version + 1, \
                     expires_at = $expires_at, \
                     updated_at = time::now() \
                     WHERE version = $version",
                )
                .bind(("version", session.version))
        } else {
            self.db.query(
                "CREATE type::record('session', $id) SET \
                 token_hash = $token_hash, \
                 profile_blob = $blob, \
                 version = 1, \
                 expires_at = $expires_at",
            )
        };

        let result = query
            .bind(("id", session.id.to_string()))
            .bind(("token_hash", session.token_hash.clone()))
            .bind(("blob", blob))
            .bind(("expires_at", session.expires_at))
            .await
            .map_err(DbError::from)?;
        let mut result = result.check().map_err(DbError::from)?;

        let rows: Vec<SessionWriteRow> = result.take(0).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or(TesseraError::SessionConflict)?;

        let mut saved = session.clone();
        saved.version = row.version;
        saved.updated_at = row.updated_at;
        Ok(saved)
    }

    async fn delete(&self, token_hash: &str) -> TesseraResult<()> {
        self.db
            .query("DELETE session WHERE token_hash = $token_hash")
            .bind(("token_hash", token_hash.to_string()))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(DbError::from)?;

        Ok(())
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> TesseraResult<u64> {
        let mut result = self
            .db
            .query("DELETE session WHERE expires_at <= $now RETURN BEFORE")
            .bind(("now", now))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<SessionWriteRow> = result.take(0).map_err(DbError::from)?;
        Ok(rows.len() as u64)
    }
}
