//! Tessera Auth: session store, login throttling and password
//! verification.

pub mod config;
pub mod error;
pub mod lock;
pub mod password;
pub mod service;
pub mod session;
pub mod session_token;
pub mod throttle;

pub use config::AuthConfig;
pub use error::AuthError;
pub use password::Argon2Verifier;
pub use service::{Gate, LoginOutcome, LoginReply, LoginService, PendingLogin};
pub use session::{SessionLoad, SessionStore};
pub use throttle::{Decision, Outcome, ThrottlePolicy};
