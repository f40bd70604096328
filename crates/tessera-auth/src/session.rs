//! Session store: token issuance, loading, persistence and expiry sweep.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tessera_core::error::TesseraResult;
use tessera_core::models::session::Session;
use tessera_core::repository::SessionRepository;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::AuthConfig;
use crate::session_token::{generate_session_token, hash_session_token, is_well_formed};

/// A session as loaded for one request.
#[derive(Debug, Clone)]
pub struct SessionLoad {
    pub session: Session,
    /// Raw token to hand back to the client when the session is new.
    pub issued_token: Option<String>,
}

/// Expiring store of session token to profile blob.
pub struct SessionStore<S: SessionRepository> {
    repo: S,
    lifetime: Duration,
}

impl<S: SessionRepository> SessionStore<S> {
    pub fn new(repo: S, lifetime: Duration) -> Self {
        Self { repo, lifetime }
    }

    pub fn from_config(repo: S, config: &AuthConfig) -> Self {
        Self::new(repo, Duration::seconds(config.session_lifetime_secs as i64))
    }

    /// Load the live session behind `token`, if any.
    pub async fn find(&self, token: &str, now: DateTime<Utc>) -> TesseraResult<Option<Session>> {
        if !is_well_formed(token) {
            return Ok(None);
        }
        let found = self.repo.find(&hash_session_token(token)).await?;
        Ok(found.filter(|s| !s.is_expired(now)))
    }

    /// Load the session behind `token`, or start a new unsaved one with
    /// empty profiles and a fresh token.
    pub async fn get(&self, token: Option<&str>, now: DateTime<Utc>) -> TesseraResult<SessionLoad> {
        if let Some(token) = token.filter(|t| is_well_formed(t)) {
            let token_hash = hash_session_token(token);
            match self.repo.find(&token_hash).await? {
                Some(session) if !session.is_expired(now) => {
                    return Ok(SessionLoad {
                        session,
                        issued_token: None,
                    });
                }
                Some(_) => {
                    debug!("Session expired, issuing a new one");
                    self.repo.delete(&token_hash).await?;
                }
                None => debug!("Unknown session token, issuing a new one"),
            }
        }

        let token = generate_session_token();
        let session = Session::new(hash_session_token(&token), now, now + self.lifetime);
        Ok(SessionLoad {
            session,
            issued_token: Some(token),
        })
    }

    /// Persist `session`, returning it with its new version.
    pub async fn save(&self, session: &Session) -> TesseraResult<Session> {
        self.repo.save(session).await
    }

    /// Delete every session that expired before `now`.
    pub async fn sweep(&self, now: DateTime<Utc>) -> TesseraResult<u64> {
        let removed = self.repo.delete_expired(now).await?;
        if removed > 0 {
            info!(removed, "Expired sessions swept");
        }
        Ok(removed)
    }
}

impl<S: SessionRepository + 'static> SessionStore<S> {
    /// Run [`sweep`](Self::sweep) every `every` on a background task.
    ///
    /// Failures are logged and retried on the next tick.
    pub fn spawn_sweeper(self: Arc<Self>, every: std::time::Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first tick fires immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if let Err(e) = self.sweep(Utc::now()).await {
                    warn!(error = %e, "Session sweep failed");
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration as StdDuration;

    use super::*;

    #[derive(Default)]
    struct MemoryRepo {
        rows: Mutex<HashMap<String, Session>>,
    }

    impl SessionRepository for MemoryRepo {
        async fn find(&self, token_hash: &str) -> TesseraResult<Option<Session>> {
            Ok(self.rows.lock().unwrap().get(token_hash).cloned())
        }

        async fn save(&self, session: &Session) -> TesseraResult<Session> {
            let mut stored = session.clone();
            stored.version += 1;
            self.rows
                .lock()
                .unwrap()
                .insert(stored.token_hash.clone(), stored.clone());
            Ok(stored)
        }

        async fn delete(&self, token_hash: &str) -> TesseraResult<()> {
            self.rows.lock().unwrap().remove(token_hash);
            Ok(())
        }

        async fn delete_expired(&self, now: DateTime<Utc>) -> TesseraResult<u64> {
            let mut rows = self.rows.lock().unwrap();
            let before = rows.len();
            rows.retain(|_, s| !s.is_expired(now));
            Ok((before - rows.len()) as u64)
        }
    }

    fn store() -> Arc<SessionStore<MemoryRepo>> {
        Arc::new(SessionStore::new(MemoryRepo::default(), Duration::hours(1)))
    }

    #[tokio::test]
    async fn expired_session_is_replaced_on_get() {
        let store = store();
        let now = Utc::now();
        let token = generate_session_token();
        let stale = Session::new(hash_session_token(&token), now - Duration::hours(2), now);
        store.save(&stale).await.unwrap();

        let load = store.get(Some(&token), now).await.unwrap();
        assert!(load.issued_token.is_some());
        assert_ne!(load.session.token_hash, stale.token_hash);
        assert!(store.repo.find(&stale.token_hash).await.unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn sweeper_deletes_expired_sessions_each_interval() {
        let store = store();
        let now = Utc::now();

        let stale = Session::new(
            hash_session_token(&generate_session_token()),
            now - Duration::hours(2),
            now - Duration::hours(1),
        );
        store.save(&stale).await.unwrap();
        let live = store.get(None, now).await.unwrap().session;
        store.save(&live).await.unwrap();

        let sweeper = Arc::clone(&store).spawn_sweeper(StdDuration::from_secs(60));

        // No sweep on spawn.
        tokio::time::sleep(StdDuration::from_secs(30)).await;
        assert!(store.repo.find(&stale.token_hash).await.unwrap().is_some());

        tokio::time::sleep(StdDuration::from_secs(31)).await;
        assert!(store.repo.find(&stale.token_hash).await.unwrap().is_none());
        assert!(store.repo.find(&live.token_hash).await.unwrap().is_some());

        sweeper.abort();
    }
}
