//! User domain model.
//!
//! Master users (privileged, host logins) and tenant users share one shape;
//! they live in different tables and different databases.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    /// Opaque digest produced by a [`CredentialVerifier`](crate::repository::CredentialVerifier).
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub account_type: i64,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUser {
    pub email: String,
    /// Already hashed; storage never sees the raw password.
    pub password_hash: String,
    pub account_type: i64,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}
