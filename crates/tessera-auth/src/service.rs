//! Login service: throttle gate, credential check and session updates.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tessera_core::api::{LoginRequest, LoginResponse};
use tessera_core::error::{TesseraError, TesseraResult};
use tessera_core::models::session::{LoginScope, Session, normalize_identity};
use tessera_core::models::tenant::normalize_subdomain;
use tessera_core::repository::{CredentialVerifier, SessionRepository, UserDirectory};
use tokio::sync::OwnedMutexGuard;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::AuthError;
use crate::lock::SessionLocks;
use crate::session::{SessionLoad, SessionStore};
use crate::session_token::{hash_session_token, is_well_formed};
use crate::throttle::{Decision, Outcome, ThrottlePolicy, minutes_remaining};

/// An attempt that passed the gate and awaits its outcome.
///
/// Holds the session lock until committed or dropped.
pub struct PendingLogin {
    load: SessionLoad,
    scope: LoginScope,
    identity: String,
    _guard: OwnedMutexGuard<()>,
}

impl PendingLogin {
    pub fn session(&self) -> &Session {
        &self.load.session
    }

    pub fn scope(&self) -> &LoginScope {
        &self.scope
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }
}

/// Result of the throttle gate.
pub enum Gate {
    Proceed(PendingLogin),
    AlreadyAuthorized,
    LockedOut { minutes_remaining: i64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginOutcome {
    Authorized { user_id: Uuid },
    AlreadyAuthorized,
    LockedOut { minutes_remaining: i64 },
    InvalidCredentials,
}

impl LoginOutcome {
    pub fn into_response(self) -> LoginResponse {
        match self {
            LoginOutcome::Authorized { .. } => LoginResponse::Authorized {
                message: "User authorized with application.".into(),
            },
            LoginOutcome::AlreadyAuthorized => LoginResponse::AlreadyAuthorized {
                message: "User already authorized with application.".into(),
            },
            LoginOutcome::LockedOut { minutes_remaining } => LoginResponse::LockedOut {
                message: "You have been locked out for too many attempts to login.".into(),
                minutes_remaining,
            },
            LoginOutcome::InvalidCredentials => LoginResponse::Failed {
                message: TesseraError::CredentialMismatch.public_message(),
            },
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoginReply {
    /// Token to set on the client when a new session was started and saved.
    pub issued_token: Option<String>,
    pub outcome: LoginOutcome,
}

/// Login orchestration for host and tenant scopes.
///
/// Generic over repository implementations so that the auth layer
/// has no dependency on the database crate.
pub struct LoginService<S: SessionRepository, D: UserDirectory, V: CredentialVerifier> {
    sessions: Arc<SessionStore<S>>,
    directory: D,
    verifier: V,
    policy: ThrottlePolicy,
    locks: SessionLocks,
}

impl<S, D, V> LoginService<S, D, V>
where
    S: SessionRepository,
    D: UserDirectory,
    V: CredentialVerifier,
{
    pub fn new(
        sessions: Arc<SessionStore<S>>,
        directory: D,
        verifier: V,
        policy: ThrottlePolicy,
    ) -> Self {
        Self {
            sessions,
            directory,
            verifier,
            policy,
            locks: SessionLocks::new(),
        }
    }

    pub fn sessions(&self) -> &Arc<SessionStore<S>> {
        &self.sessions
    }

    /// Run the throttle gate for `identity` on the session behind `token`.
    ///
    /// A restarted lockout window is persisted before this returns.
    pub async fn check(
        &self,
        token: Option<&str>,
        scope: LoginScope,
        identity: &str,
        now: DateTime<Utc>,
    ) -> TesseraResult<Gate> {
        let scope = normalize_scope(scope)?;
        let identity = normalize_identity(identity);

        // Lock before loading so the session read is the latest one.
        let (mut load, guard) = match token.filter(|t| is_well_formed(t)) {
            Some(raw) => {
                let guard = self.locks.acquire(&hash_session_token(raw)).await;
                (self.sessions.get(Some(raw), now).await?, guard)
            }
            None => {
                let load = self.sessions.get(None, now).await?;
                let guard = self.locks.acquire(&load.session.token_hash).await;
                (load, guard)
            }
        };

        let decision = self.policy.check(&mut load.session, &scope, &identity, now);
        if decision.mutated_session() {
            info!(identity = %identity, "Lockout window elapsed, counter restarted");
            load.session = self.sessions.save(&load.session).await?;
        }

        Ok(match decision {
            Decision::Proceed { .. } => Gate::Proceed(PendingLogin {
                load,
                scope,
                identity,
                _guard: guard,
            }),
            Decision::AlreadyAuthorized => Gate::AlreadyAuthorized,
            Decision::LockedOut { remaining } => {
                warn!(identity = %identity, ?scope, "Login attempt while locked out");
                Gate::LockedOut {
                    minutes_remaining: minutes_remaining(remaining),
                }
            }
        })
    }

    /// Record the verified outcome, persist the session and release it.
    pub async fn commit(
        &self,
        pending: PendingLogin,
        outcome: Outcome,
        now: DateTime<Utc>,
    ) -> TesseraResult<LoginReply> {
        let PendingLogin {
            mut load,
            scope,
            identity,
            _guard,
        } = pending;

        self.policy
            .commit(&mut load.session, &scope, &identity, outcome, now);
        self.sessions.save(&load.session).await?;

        let outcome = match outcome {
            Outcome::Success { user_id } => {
                info!(identity = %identity, ?scope, "Login succeeded");
                LoginOutcome::Authorized { user_id }
            }
            Outcome::Failure => {
                warn!(identity = %identity, ?scope, "Login failed");
                LoginOutcome::InvalidCredentials
            }
        };

        Ok(LoginReply {
            issued_token: load.issued_token,
            outcome,
        })
    }

    /// Full login: gate, credential check, commit.
    ///
    /// Storage or lookup errors during the credential check are returned
    /// as errors and do not count as failed attempts.
    pub async fn login(
        &self,
        token: Option<&str>,
        scope: LoginScope,
        request: &LoginRequest,
    ) -> TesseraResult<LoginReply> {
        request.validate()?;
        let now = Utc::now();

        let pending = match self.check(token, scope, &request.email, now).await? {
            Gate::Proceed(pending) => pending,
            Gate::AlreadyAuthorized => {
                return Ok(LoginReply {
                    issued_token: None,
                    outcome: LoginOutcome::AlreadyAuthorized,
                });
            }
            Gate::LockedOut { minutes_remaining } => {
                return Ok(LoginReply {
                    issued_token: None,
                    outcome: LoginOutcome::LockedOut { minutes_remaining },
                });
            }
        };

        let user = self
            .directory
            .find_by_email(pending.scope(), pending.identity())
            .await?;

        let outcome = match user {
            Some(user) => {
                if self.verifier.verify(&request.password, &user.password_hash)? {
                    Outcome::Success { user_id: user.id }
                } else {
                    Outcome::Failure
                }
            }
            None => Outcome::Failure,
        };

        self.commit(pending, outcome, Utc::now()).await
    }

    /// Clear the authorization for `scope`. Returns whether it was set.
    pub async fn logout(&self, token: &str, scope: LoginScope) -> TesseraResult<bool> {
        let scope = normalize_scope(scope)?;
        let now = Utc::now();
        let token_hash = hash_session_token(token);

        let _guard = self.locks.acquire(&token_hash).await;
        let Some(mut session) = self.sessions.find(token, now).await? else {
            return Ok(false);
        };

        if !session.revoke(&scope) {
            return Ok(false);
        }
        self.sessions.save(&session).await?;
        info!(?scope, "Logged out");
        Ok(true)
    }

    /// The master user authorized on the session behind `token`.
    pub async fn require_host(&self, token: Option<&str>) -> TesseraResult<Uuid> {
        let token = token.ok_or(AuthError::NotAuthorized)?;
        self.sessions
            .find(token, Utc::now())
            .await?
            .and_then(|s| s.authorized_host_user())
            .ok_or_else(|| AuthError::NotAuthorized.into())
    }
}

fn normalize_scope(scope: LoginScope) -> TesseraResult<LoginScope> {
    match scope {
        LoginScope::Host => Ok(LoginScope::Host),
        LoginScope::Tenant(raw) => normalize_subdomain(&raw)
            .map(LoginScope::Tenant)
            .map_err(TesseraError::validation),
    }
}
