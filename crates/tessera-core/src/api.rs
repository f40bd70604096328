//! Request and response payloads exchanged with clients.

use serde::{Deserialize, Serialize};

use crate::error::TesseraError;
use crate::models::tenant::ProvisionStage;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

impl LoginRequest {
    /// Presence check only; format and complexity rules live elsewhere.
    pub fn validate(&self) -> Result<(), TesseraError> {
        if self.email.trim().is_empty() || self.password.is_empty() {
            return Err(TesseraError::validation(
                "Email or password provided are incorrect, please try again.",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status")]
pub enum LoginResponse {
    #[serde(rename = "authorized")]
    Authorized { message: String },
    #[serde(rename = "already authorized")]
    AlreadyAuthorized { message: String },
    #[serde(rename = "locked out")]
    LockedOut {
        message: String,
        #[serde(rename = "minutesRemaining")]
        minutes_remaining: i64,
    },
    #[serde(rename = "failed")]
    Failed { message: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvisionRequest {
    #[serde(rename = "subDomainIdentifier")]
    pub sub_domain_identifier: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvisionResponse {
    pub message: String,
    #[serde(rename = "subDomainIdentifier")]
    pub sub_domain_identifier: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<ProvisionStage>,
}

impl From<&TesseraError> for ErrorResponse {
    fn from(err: &TesseraError) -> Self {
        let stage = match err {
            TesseraError::Provision { stage, .. } => Some(*stage),
            _ => None,
        };
        Self {
            message: err.public_message(),
            stage,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locked_out_wire_shape() {
        let body = serde_json::to_value(LoginResponse::LockedOut {
            message: "locked".into(),
            minutes_remaining: 20,
        })
        .unwrap();
        assert_eq!(body["status"], "locked out");
        assert_eq!(body["minutesRemaining"], 20);
    }

    #[test]
    fn provision_request_uses_camel_case_field() {
        let req: ProvisionRequest =
            serde_json::from_str(r#"{"subDomainIdentifier":"acme"}"#).unwrap();
        assert_eq!(req.sub_domain_identifier, "acme");
    }

    #[test]
    fn error_response_carries_stage() {
        let err = TesseraError::provision(ProvisionStage::Migrate, "schema rejected");
        let body = serde_json::to_value(ErrorResponse::from(&err)).unwrap();
        assert_eq!(body["stage"], "migrate");

        let body = serde_json::to_value(ErrorResponse::from(&TesseraError::Unauthorized)).unwrap();
        assert!(body.get("stage").is_none());
    }

    #[test]
    fn empty_credentials_fail_validation() {
        let req = LoginRequest {
            email: " ".into(),
            password: "x".into(),
        };
        assert!(matches!(req.validate(), Err(TesseraError::Validation { .. })));
    }
}
