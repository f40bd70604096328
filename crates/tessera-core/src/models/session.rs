//! Session domain model.
//!
//! A session carries at most one [`HostProfile`] (master logins) and at most
//! one [`ClientProfile`] (tenant logins). Both are persisted together as an
//! opaque blob: a JSON array of tagged [`SessionProfile`] values, decoded
//! once when the session is loaded.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Which login surface an attempt belongs to.
///
/// Host counters are keyed by identity alone. Tenant counters are keyed by
/// tenant first, so the same email on two tenants never shares a counter.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LoginScope {
    Host,
    Tenant(String),
}

/// Failed-login bookkeeping for one identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginAttempt {
    pub count: u32,
    pub last_attempt_at: DateTime<Utc>,
}

impl LoginAttempt {
    pub fn first(now: DateTime<Utc>) -> Self {
        Self {
            count: 1,
            last_attempt_at: now,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HostProfile {
    /// Keyed by normalized identity (email).
    pub login_attempts: HashMap<String, LoginAttempt>,
    pub authorized: bool,
    pub authorized_at: Option<DateTime<Utc>>,
    pub user_id: Option<Uuid>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClientProfile {
    /// tenant identifier -> identity -> attempt.
    pub login_attempts: HashMap<String, HashMap<String, LoginAttempt>>,
    /// tenant identifier -> authorized.
    pub authorization_map: HashMap<String, bool>,
}

/// Persisted form of one profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "profile", rename_all = "snake_case")]
pub enum SessionProfile {
    Host(HostProfile),
    Client(ClientProfile),
}

#[derive(Debug, Clone)]
pub struct Session {
    pub id: Uuid,
    /// SHA-256 of the opaque token carried by the client.
    pub token_hash: String,
    pub host: Option<HostProfile>,
    pub client: Option<ClientProfile>,
    /// Optimistic concurrency counter. `0` means never saved.
    pub version: u64,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Normalize a login identity before it is used as a counter key.
pub fn normalize_identity(raw: &str) -> String {
    raw.trim().to_lowercase()
}

impl Session {
    /// A fresh, unsaved session with empty profiles.
    pub fn new(token_hash: String, now: DateTime<Utc>, expires_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            token_hash,
            host: None,
            client: None,
            version: 0,
            expires_at,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_persisted(&self) -> bool {
        self.version > 0
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    /// Serialize both profiles into the stored blob.
    pub fn encode_profiles(&self) -> Result<String, serde_json::Error> {
        let mut profiles = Vec::with_capacity(2);
        if let Some(host) = &self.host {
            profiles.push(SessionProfile::Host(host.clone()));
        }
        if let Some(client) = &self.client {
            profiles.push(SessionProfile::Client(client.clone()));
        }
        serde_json::to_string(&profiles)
    }

    /// Decode a stored blob, rejecting more than one profile of a kind.
    pub fn decode_profiles(
        blob: &str,
    ) -> Result<(Option<HostProfile>, Option<ClientProfile>), String> {
        let profiles: Vec<SessionProfile> =
            serde_json::from_str(blob).map_err(|e| format!("invalid profile blob: {e}"))?;

        let mut host = None;
        let mut client = None;
        for profile in profiles {
            match profile {
                SessionProfile::Host(p) => {
                    if host.replace(p).is_some() {
                        return Err("session holds more than one host profile".into());
                    }
                }
                SessionProfile::Client(p) => {
                    if client.replace(p).is_some() {
                        return Err("session holds more than one client profile".into());
                    }
                }
            }
        }
        Ok((host, client))
    }

    pub fn is_authorized(&self, scope: &LoginScope) -> bool {
        match scope {
            LoginScope::Host => self.host.as_ref().is_some_and(|h| h.authorized),
            LoginScope::Tenant(tenant) => self
                .client
                .as_ref()
                .and_then(|c| c.authorization_map.get(tenant))
                .copied()
                .unwrap_or(false),
        }
    }

    pub fn login_attempt(&self, scope: &LoginScope, identity: &str) -> Option<&LoginAttempt> {
        match scope {
            LoginScope::Host => self.host.as_ref()?.login_attempts.get(identity),
            LoginScope::Tenant(tenant) => self
                .client
                .as_ref()?
                .login_attempts
                .get(tenant)?
                .get(identity),
        }
    }

    pub fn set_login_attempt(&mut self, scope: &LoginScope, identity: &str, attempt: LoginAttempt) {
        self.attempts_mut(scope).insert(identity.to_owned(), attempt);
    }

    /// Mark the scope as authorized. `user_id` is only kept for host logins.
    pub fn authorize(&mut self, scope: &LoginScope, user_id: Uuid, now: DateTime<Utc>) {
        match scope {
            LoginScope::Host => {
                let host = self.host.get_or_insert_with(HostProfile::default);
                host.authorized = true;
                host.authorized_at = Some(now);
                host.user_id = Some(user_id);
            }
            LoginScope::Tenant(tenant) => {
                self.client
                    .get_or_insert_with(ClientProfile::default)
                    .authorization_map
                    .insert(tenant.clone(), true);
            }
        }
    }

    /// Clear the authorization flag for the scope. Returns whether it was set.
    pub fn revoke(&mut self, scope: &LoginScope) -> bool {
        match scope {
            LoginScope::Host => match self.host.as_mut() {
                Some(host) if host.authorized => {
                    host.authorized = false;
                    host.user_id = None;
                    true
                }
                _ => false,
            },
            LoginScope::Tenant(tenant) => self
                .client
                .as_mut()
                .and_then(|c| c.authorization_map.remove(tenant))
                .unwrap_or(false),
        }
    }

    /// The master user behind an authorized host profile.
    pub fn authorized_host_user(&self) -> Option<Uuid> {
        self.host
            .as_ref()
            .filter(|h| h.authorized)
            .and_then(|h| h.user_id)
    }

    fn attempts_mut(&mut self, scope: &LoginScope) -> &mut HashMap<String, LoginAttempt> {
        match scope {
            LoginScope::Host => {
                &mut self
                    .host
                    .get_or_insert_with(HostProfile::default)
                    .login_attempts
            }
            LoginScope::Tenant(tenant) => self
                .client
                .get_or_insert_with(ClientProfile::default)
                .login_attempts
                .entry(tenant.clone())
                .or_default(),
        }
    }
}
