//! Login throttle state machine.
//!
//! Counters live in the session profile, one per identity and scope.
//! [`ThrottlePolicy::check`] runs before credentials are verified and
//! [`ThrottlePolicy::commit`] records the outcome afterwards. Neither
//! touches storage; the caller persists the session.

use chrono::{DateTime, Duration, Utc};
use tessera_core::models::session::{LoginAttempt, LoginScope, Session};
use uuid::Uuid;

use crate::config::AuthConfig;

/// Gate result for one login attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Credentials may be verified.
    Proceed {
        /// Counter state after the check.
        attempt: Option<LoginAttempt>,
        /// The lockout window had elapsed and the counter was restarted.
        /// The session was mutated and must be saved.
        window_reset: bool,
    },
    /// The scope is already authorized on this session.
    AlreadyAuthorized,
    /// Too many recent failures.
    LockedOut { remaining: Duration },
}

impl Decision {
    /// Whether `check` changed the session.
    pub fn mutated_session(&self) -> bool {
        matches!(
            self,
            Decision::Proceed {
                window_reset: true,
                ..
            }
        )
    }
}

/// Result of verifying credentials.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success { user_id: Uuid },
    Failure,
}

/// Whole minutes left on a lockout, rounded up.
pub fn minutes_remaining(remaining: Duration) -> i64 {
    let secs = remaining.num_seconds().max(0);
    (secs + 59) / 60
}

#[derive(Debug, Clone, Copy)]
pub struct ThrottlePolicy {
    max_failures: u32,
    window: Duration,
}

impl Default for ThrottlePolicy {
    fn default() -> Self {
        Self::from_config(&AuthConfig::default())
    }
}

impl ThrottlePolicy {
    pub fn new(max_failures: u32, window: Duration) -> Self {
        Self {
            max_failures,
            window,
        }
    }

    pub fn from_config(config: &AuthConfig) -> Self {
        Self::new(
            config.max_failed_attempts,
            Duration::seconds(config.lockout_window_secs as i64),
        )
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Decide whether an attempt for `identity` may proceed.
    ///
    /// Authorization short-circuits before counters are read. A locked
    /// counter whose window has elapsed is restarted at one.
    pub fn check(
        &self,
        session: &mut Session,
        scope: &LoginScope,
        identity: &str,
        now: DateTime<Utc>,
    ) -> Decision {
        if session.is_authorized(scope) {
            return Decision::AlreadyAuthorized;
        }

        let Some(attempt) = session.login_attempt(scope, identity).copied() else {
            return Decision::Proceed {
                attempt: None,
                window_reset: false,
            };
        };

        if attempt.count < self.max_failures {
            return Decision::Proceed {
                attempt: Some(attempt),
                window_reset: false,
            };
        }

        let elapsed = now - attempt.last_attempt_at;
        if elapsed > self.window {
            let restarted = LoginAttempt::first(now);
            session.set_login_attempt(scope, identity, restarted);
            return Decision::Proceed {
                attempt: Some(restarted),
                window_reset: true,
            };
        }

        Decision::LockedOut {
            remaining: self.window - elapsed,
        }
    }

    /// Record the outcome of a verified attempt on the session.
    pub fn commit(
        &self,
        session: &mut Session,
        scope: &LoginScope,
        identity: &str,
        outcome: Outcome,
        now: DateTime<Utc>,
    ) {
        let current = session.login_attempt(scope, identity).copied();
        match outcome {
            Outcome::Failure => {
                let next = match current {
                    Some(attempt) => LoginAttempt {
                        count: attempt.count.saturating_add(1),
                        last_attempt_at: now,
                    },
                    None => LoginAttempt::first(now),
                };
                session.set_login_attempt(scope, identity, next);
            }
            Outcome::Success { user_id } => {
                if let Some(attempt) = current {
                    session.set_login_attempt(
                        scope,
                        identity,
                        LoginAttempt {
                            count: 0,
                            ..attempt
                        },
                    );
                }
                session.authorize(scope, user_id, now);
            }
        }
    }
}
