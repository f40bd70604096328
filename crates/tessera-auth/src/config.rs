//! Authentication configuration.

/// Configuration for sessions, login throttling and password hashing.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Optional pepper prepended to passwords before Argon2id hashing and
    /// verification.
    pub pepper: Option<String>,
    /// Failed attempts tolerated before an identity is locked (default: 3).
    pub max_failed_attempts: u32,
    /// Lockout window in seconds, measured from the last failed attempt
    /// (default: 1800 = 30 minutes).
    pub lockout_window_secs: u64,
    /// Session lifetime in seconds (default: 86_400 = 24 hours).
    pub session_lifetime_secs: u64,
    /// Interval between expired-session sweeps (default: 3600 = 1 hour).
    pub session_sweep_interval_secs: u64,
    /// Cookie carrying the opaque session token.
    pub session_cookie_name: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            pepper: None,
            max_failed_attempts: 3,
            lockout_window_secs: 1800,
            session_lifetime_secs: 86_400,
            session_sweep_interval_secs: 3600,
            session_cookie_name: "tessera.sid".into(),
        }
    }
}
