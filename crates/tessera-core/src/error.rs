//! Error types for the Tessera system.

use thiserror::Error;

use crate::models::tenant::{ProvisionStage, ProvisionStatus};

#[derive(Debug, Error)]
pub enum TesseraError {
    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Unknown tenant: {identifier}")]
    UnknownTenant { identifier: String },

    #[error("Tenant {identifier} is not ready (provisioning stopped at {status})")]
    TenantNotReady {
        identifier: String,
        status: ProvisionStatus,
    },

    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Entity already exists: {entity}")]
    AlreadyExists { entity: String },

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Provisioning failed at stage '{stage}': {reason}")]
    Provision {
        stage: ProvisionStage,
        reason: String,
    },

    #[error("Migration error: {0}")]
    Migration(String),

    /// Wrong password or unknown identity. Never says which.
    #[error("Authentication failed")]
    CredentialMismatch,

    #[error("Not authorized")]
    Unauthorized,

    #[error("Session was modified concurrently")]
    SessionConflict,

    #[error("Session error: {0}")]
    Session(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Cryptography error: {0}")]
    Crypto(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl TesseraError {
    /// Shorthand for a provisioning failure at `stage`.
    pub fn provision(stage: ProvisionStage, reason: impl ToString) -> Self {
        Self::Provision {
            stage,
            reason: reason.to_string(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// HTTP status class this error surfaces as.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Validation { .. } => 400,
            Self::CredentialMismatch | Self::Unauthorized => 401,
            Self::UnknownTenant { .. } | Self::NotFound { .. } => 404,
            Self::AlreadyExists { .. } | Self::SessionConflict => 409,
            Self::TenantNotReady { .. } => 503,
            Self::Connection(_)
            | Self::Provision { .. }
            | Self::Migration(_)
            | Self::Session(_)
            | Self::Database(_)
            | Self::Crypto(_)
            | Self::Internal(_) => 500,
        }
    }

    /// Message safe to hand back to a client.
    ///
    /// Server-side failures keep their detail out of the response.
    /// Provisioning reports the failing stage with a fixed cause.
    pub fn public_message(&self) -> String {
        match self {
            Self::Validation { message } => message.clone(),
            Self::CredentialMismatch => {
                "Email or password provided are incorrect, please try again.".into()
            }
            Self::Unauthorized => "You are not authorized to view this.".into(),
            Self::UnknownTenant { .. } => "Tenant not found.".into(),
            Self::Provision { stage, .. } => {
                let cause = match stage {
                    ProvisionStage::Create => "the tenant database could not be created",
                    ProvisionStage::Register => "the tenant could not be registered or already exists",
                    ProvisionStage::Connect => "the tenant database could not be reached",
                    ProvisionStage::Migrate => "the tenant schema could not be applied",
                };
                format!("Tenant provisioning failed during '{stage}': {cause}.")
            }
            Self::TenantNotReady { .. } => "Tenant is not available yet.".into(),
            other if other.status_code() < 500 => other.to_string(),
            _ => "Something went wrong.".into(),
        }
    }
}

pub type TesseraResult<T> = Result<T, TesseraError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn taxonomy_maps_to_status_classes() {
        assert_eq!(TesseraError::validation("bad").status_code(), 400);
        assert_eq!(
            TesseraError::UnknownTenant {
                identifier: "acme".into()
            }
            .status_code(),
            404
        );
        assert_eq!(TesseraError::Connection("down".into()).status_code(), 500);
        assert_eq!(
            TesseraError::provision(ProvisionStage::Migrate, "boom").status_code(),
            500
        );
        assert_eq!(TesseraError::CredentialMismatch.status_code(), 401);
    }

    #[test]
    fn credential_mismatch_message_is_generic() {
        let msg = TesseraError::CredentialMismatch.public_message();
        assert!(!msg.to_lowercase().contains("not found"));
        assert!(!msg.to_lowercase().contains("exist"));
    }

    #[test]
    fn provision_message_names_stage() {
        let err = TesseraError::provision(ProvisionStage::Create, "engine refused");
        assert!(err.public_message().contains("'create'"));
        assert!(err.to_string().contains("engine refused"));
    }

    #[test]
    fn provision_message_hides_engine_detail() {
        let err = TesseraError::provision(
            ProvisionStage::Migrate,
            "Migration failed: table 'user' in database 'acme_tenant' already exists",
        );
        let msg = err.public_message();
        assert_eq!(
            msg,
            "Tenant provisioning failed during 'migrate': the tenant schema could not be applied."
        );
        assert!(!msg.contains("acme_tenant"));
    }

    #[test]
    fn internal_detail_is_hidden() {
        let err = TesseraError::Database("row 42 corrupted".into());
        assert!(!err.public_message().contains("row 42"));
    }
}
