//! Tenant domain model.
//!
//! Every tenant owns a dedicated database. The master database keeps one
//! [`TenantRecord`] per tenant describing how to reach it and how far
//! provisioning got.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Registry entry for a tenant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenantRecord {
    pub id: Uuid,
    /// Lower-cased subdomain label (e.g. `acme`). Unique and immutable.
    pub subdomain_identifier: String,
    /// Opaque string the resolver uses to open the tenant database.
    pub connection_descriptor: String,
    /// Last provisioning stage that completed.
    pub status: ProvisionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl TenantRecord {
    pub fn is_ready(&self) -> bool {
        self.status == ProvisionStatus::Migrated && self.deleted_at.is_none()
    }
}

/// Fields required to register a tenant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTenantRecord {
    pub subdomain_identifier: String,
    pub connection_descriptor: String,
}

/// Completion marker stored on a [`TenantRecord`].
///
/// A record only exists once its database has been created, so the first
/// persisted marker is `Registered`. Variants are ordered by progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ProvisionStatus {
    Registered,
    Connected,
    Migrated,
}

impl ProvisionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Registered => "Registered",
            Self::Connected => "Connected",
            Self::Migrated => "Migrated",
        }
    }
}

impl fmt::Display for ProvisionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProvisionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Registered" => Ok(Self::Registered),
            "Connected" => Ok(Self::Connected),
            "Migrated" => Ok(Self::Migrated),
            other => Err(format!("unknown provision status: {other}")),
        }
    }
}

/// Step of the provisioning sequence that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProvisionStage {
    Create,
    Register,
    Connect,
    Migrate,
}

impl fmt::Display for ProvisionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Create => "create",
            Self::Register => "register",
            Self::Connect => "connect",
            Self::Migrate => "migrate",
        })
    }
}

/// Normalize and validate a subdomain identifier.
///
/// Identifiers are DNS labels: 1 to 63 characters of `[a-z0-9-]`, not
/// starting or ending with `-`. Input is trimmed and lower-cased first.
pub fn normalize_subdomain(raw: &str) -> Result<String, String> {
    let ident = raw.trim().to_ascii_lowercase();
    if ident.is_empty() {
        return Err("subdomain identifier must not be empty".into());
    }
    if ident.len() > 63 {
        return Err("subdomain identifier must be at most 63 characters".into());
    }
    if ident.starts_with('-') || ident.ends_with('-') {
        return Err("subdomain identifier must not start or end with '-'".into());
    }
    if !ident
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        return Err("subdomain identifier may only contain letters, digits and '-'".into());
    }
    Ok(ident)
}
