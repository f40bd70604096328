//! Repository trait definitions for data access abstraction.
//!
//! All repository operations are async. The registry, subscriptions,
//! master users and sessions live in the master database; tenant users
//! live in each tenant's own database.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::TesseraResult;
use crate::models::{
    session::{LoginScope, Session},
    subscription::{CreateSubscriptionType, SubscriptionInfo, SubscriptionType},
    tenant::{CreateTenantRecord, ProvisionStatus, TenantRecord},
    user::{CreateUser, User},
};

// ---------------------------------------------------------------------------
// Master database
// ---------------------------------------------------------------------------

pub trait TenantRegistry: Send + Sync {
    fn register(
        &self,
        input: CreateTenantRecord,
    ) -> impl Future<Output = TesseraResult<TenantRecord>> + Send;

    /// Find a live (not soft-deleted) tenant by identifier.
    fn lookup(
        &self,
        subdomain_identifier: &str,
    ) -> impl Future<Output = TesseraResult<Option<TenantRecord>>> + Send;

    /// Snapshot of every live tenant, oldest first.
    fn list(&self) -> impl Future<Output = TesseraResult<Vec<TenantRecord>>> + Send;

    fn set_status(
        &self,
        id: Uuid,
        status: ProvisionStatus,
    ) -> impl Future<Output = TesseraResult<TenantRecord>> + Send;

    fn soft_delete(&self, id: Uuid) -> impl Future<Output = TesseraResult<()>> + Send;
}

pub trait SubscriptionRepository: Send + Sync {
    fn create_type(
        &self,
        input: CreateSubscriptionType,
    ) -> impl Future<Output = TesseraResult<SubscriptionType>> + Send;
    fn get_type(&self, id: Uuid) -> impl Future<Output = TesseraResult<SubscriptionType>> + Send;
    /// Attach a plan to a tenant, replacing any previous assignment.
    fn assign(
        &self,
        tenant_id: Uuid,
        subscription_type_id: Uuid,
    ) -> impl Future<Output = TesseraResult<SubscriptionInfo>> + Send;
    fn get_for_tenant(
        &self,
        tenant_id: Uuid,
    ) -> impl Future<Output = TesseraResult<Option<SubscriptionInfo>>> + Send;
}

pub trait SessionRepository: Send + Sync {
    fn find(
        &self,
        token_hash: &str,
    ) -> impl Future<Output = TesseraResult<Option<Session>>> + Send;

    /// Insert (version 0) or update (version must match the stored one).
    ///
    /// Returns the stored session with its new version. A version mismatch
    /// fails with [`TesseraError::SessionConflict`](crate::error::TesseraError::SessionConflict).
    fn save(&self, session: &Session) -> impl Future<Output = TesseraResult<Session>> + Send;

    fn delete(&self, token_hash: &str) -> impl Future<Output = TesseraResult<()>> + Send;

    /// Remove every session that expired before `now`. Returns the count.
    fn delete_expired(
        &self,
        now: DateTime<Utc>,
    ) -> impl Future<Output = TesseraResult<u64>> + Send;
}

// ---------------------------------------------------------------------------
// Users (master or tenant table)
// ---------------------------------------------------------------------------

pub trait UserRepository: Send + Sync {
    fn create(&self, input: CreateUser) -> impl Future<Output = TesseraResult<User>> + Send;
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = TesseraResult<User>> + Send;
    fn get_by_email(&self, email: &str) -> impl Future<Output = TesseraResult<User>> + Send;
}

/// Finds the user behind a login, in whichever database the scope names.
pub trait UserDirectory: Send + Sync {
    fn find_by_email(
        &self,
        scope: &LoginScope,
        email: &str,
    ) -> impl Future<Output = TesseraResult<Option<User>>> + Send;
}

// ---------------------------------------------------------------------------
// Credentials
// ---------------------------------------------------------------------------

/// Opaque password hashing capability.
pub trait CredentialVerifier: Send + Sync {
    fn hash(&self, password: &str) -> TesseraResult<String>;
    fn verify(&self, password: &str, digest: &str) -> TesseraResult<bool>;
}
