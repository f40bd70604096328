//! Integration tests for the login service against in-memory SurrealDB.

use std::sync::Arc;

use chrono::{Duration, Utc};
use surrealdb::engine::any::Any;
use tessera_auth::{
    Argon2Verifier, Gate, LoginOutcome, LoginService, Outcome, SessionStore, ThrottlePolicy,
};
use tessera_core::api::{LoginRequest, LoginResponse};
use tessera_core::error::TesseraError;
use tessera_core::models::session::LoginScope;
use tessera_core::models::user::CreateUser;
use tessera_core::repository::{CredentialVerifier, UserRepository};
use tessera_db::repository::{SurrealSessionRepository, SurrealTenantRegistry, SurrealUserRepository};
use tessera_db::{
    ConnectionResolver, DbConfig, DbManager, SurrealUserDirectory, TenantNaming,
    TenantProvisioner,
};
use uuid::Uuid;

type Service = LoginService<
    SurrealSessionRepository<Any>,
    SurrealUserDirectory<Any, SurrealTenantRegistry<Any>>,
    Argon2Verifier,
>;

const PASSWORD: &str = "correct-horse-battery";

struct Fixture {
    service: Arc<Service>,
    root_id: Uuid,
    acme_user_id: Uuid,
}

fn mem_config() -> DbConfig {
    DbConfig {
        endpoint: "mem://".into(),
        namespace: "tessera".into(),
        database: "master".into(),
        credentials: None,
        tenant_database_suffix: "_tenant".into(),
    }
}

fn user(email: &str, verifier: &Argon2Verifier) -> CreateUser {
    CreateUser {
        email: email.into(),
        password_hash: verifier.hash(PASSWORD).unwrap(),
        account_type: 0,
        first_name: None,
        last_name: None,
    }
}

/// Master with one master user, plus tenants `acme` (with a user) and
/// `globex`.
async fn setup() -> Fixture {
    let config = mem_config();
    let manager = DbManager::connect(&config).await.unwrap();
    let master = manager.client().clone();
    tessera_db::migrate_master(&master).await.unwrap();

    let provisioner = TenantProvisioner::new(
        master.clone(),
        SurrealTenantRegistry::new(master.clone()),
        Arc::clone(manager.pool()),
        TenantNaming::from_config(&config),
    );
    provisioner.provision("acme").await.unwrap();
    provisioner.provision("globex").await.unwrap();

    let resolver = Arc::new(ConnectionResolver::new(
        SurrealTenantRegistry::new(master.clone()),
        Arc::clone(manager.pool()),
    ));

    let verifier = Argon2Verifier::new(Some("test-pepper".into()));
    let root = SurrealUserRepository::master(master.clone())
        .create(user("root@example.com", &verifier))
        .await
        .unwrap();
    let acme_user = SurrealUserRepository::tenant(resolver.resolve("acme").await.unwrap())
        .create(user("alice@example.com", &verifier))
        .await
        .unwrap();

    let sessions = Arc::new(SessionStore::new(
        SurrealSessionRepository::new(master.clone()),
        Duration::hours(24),
    ));
    let service = LoginService::new(
        sessions,
        SurrealUserDirectory::new(master, resolver),
        verifier,
        ThrottlePolicy::default(),
    );

    Fixture {
        service: Arc::new(service),
        root_id: root.id,
        acme_user_id: acme_user.id,
    }
}

fn request(email: &str, password: &str) -> LoginRequest {
    LoginRequest {
        email: email.into(),
        password: password.into(),
    }
}

/// A saved, empty session and its raw token.
async fn saved_session(service: &Service) -> String {
    let load = service.sessions().get(None, Utc::now()).await.unwrap();
    service.sessions().save(&load.session).await.unwrap();
    load.issued_token.unwrap()
}

#[tokio::test]
async fn host_login_authorizes_session() {
    let f = setup().await;

    let reply = f
        .service
        .login(None, LoginScope::Host, &request("Root@Example.com", PASSWORD))
        .await
        .unwrap();
    assert_eq!(reply.outcome, LoginOutcome::Authorized { user_id: f.root_id });
    let token = reply.issued_token.expect("new session should issue a token");

    assert_eq!(f.service.require_host(Some(&token)).await.unwrap(), f.root_id);

    let again = f
        .service
        .login(Some(&token), LoginScope::Host, &request("root@example.com", PASSWORD))
        .await
        .unwrap();
    assert_eq!(again.outcome, LoginOutcome::AlreadyAuthorized);
    assert!(again.issued_token.is_none());
}

#[tokio::test]
async fn wrong_password_and_unknown_email_look_the_same() {
    let f = setup().await;

    let wrong = f
        .service
        .login(None, LoginScope::Host, &request("root@example.com", "nope"))
        .await
        .unwrap();
    let unknown = f
        .service
        .login(None, LoginScope::Host, &request("ghost@example.com", "nope"))
        .await
        .unwrap();

    assert_eq!(wrong.outcome, LoginOutcome::InvalidCredentials);
    assert_eq!(unknown.outcome, LoginOutcome::InvalidCredentials);
    assert_eq!(
        wrong.outcome.into_response(),
        unknown.outcome.into_response()
    );
}

#[tokio::test]
async fn three_failures_lock_out_even_the_right_password() {
    let f = setup().await;
    let req = request("root@example.com", "wrong");

    let first = f.service.login(None, LoginScope::Host, &req).await.unwrap();
    let token = first.issued_token.unwrap();
    for _ in 0..2 {
        let reply = f
            .service
            .login(Some(&token), LoginScope::Host, &req)
            .await
            .unwrap();
        assert_eq!(reply.outcome, LoginOutcome::InvalidCredentials);
    }

    let locked = f
        .service
        .login(Some(&token), LoginScope::Host, &request("root@example.com", PASSWORD))
        .await
        .unwrap();
    match locked.outcome {
        LoginOutcome::LockedOut { minutes_remaining } => assert_eq!(minutes_remaining, 30),
        other => panic!("expected LockedOut, got {other:?}"),
    }
    match locked.outcome.into_response() {
        LoginResponse::LockedOut {
            minutes_remaining, ..
        } => assert_eq!(minutes_remaining, 30),
        other => panic!("unexpected response {other:?}"),
    }

    let err = f.service.require_host(Some(&token)).await.unwrap_err();
    assert!(matches!(err, TesseraError::Unauthorized));
}

#[tokio::test]
async fn lockout_window_restart_is_persisted_at_check() {
    let f = setup().await;
    let token = saved_session(&f.service).await;
    let now = Utc::now();

    for minutes_ago in [40, 39, 38] {
        let at = now - Duration::minutes(minutes_ago);
        let gate = f
            .service
            .check(Some(&token), LoginScope::Host, "root@example.com", at)
            .await
            .unwrap();
        let Gate::Proceed(pending) = gate else {
            panic!("attempt {minutes_ago} minutes ago should proceed");
        };
        f.service.commit(pending, Outcome::Failure, at).await.unwrap();
    }

    let gate = f
        .service
        .check(Some(&token), LoginScope::Host, "root@example.com", now)
        .await
        .unwrap();
    let Gate::Proceed(pending) = gate else {
        panic!("window has elapsed, attempt should proceed");
    };
    assert_eq!(
        pending
            .session()
            .login_attempt(&LoginScope::Host, "root@example.com")
            .map(|a| a.count),
        Some(1)
    );
    drop(pending);

    // Dropped without a commit: the restart is already stored.
    let stored = f.service.sessions().find(&token, now).await.unwrap().unwrap();
    let attempt = stored
        .login_attempt(&LoginScope::Host, "root@example.com")
        .copied()
        .unwrap();
    assert_eq!(attempt.count, 1);
    assert_eq!(attempt.last_attempt_at.timestamp(), now.timestamp());
}

#[tokio::test]
async fn success_after_two_failures_resets_count() {
    let f = setup().await;
    let scope = LoginScope::Tenant("acme".into());
    let token = saved_session(&f.service).await;

    for _ in 0..2 {
        f.service
            .login(Some(&token), scope.clone(), &request("alice@example.com", "wrong"))
            .await
            .unwrap();
    }
    let reply = f
        .service
        .login(Some(&token), scope.clone(), &request("alice@example.com", PASSWORD))
        .await
        .unwrap();
    assert_eq!(
        reply.outcome,
        LoginOutcome::Authorized {
            user_id: f.acme_user_id
        }
    );

    let stored = f
        .service
        .sessions()
        .find(&token, Utc::now())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        stored.login_attempt(&scope, "alice@example.com").map(|a| a.count),
        Some(0)
    );
    assert!(stored.is_authorized(&scope));
    // A tenant login never grants host access.
    assert!(f.service.require_host(Some(&token)).await.is_err());
}

#[tokio::test]
async fn tenant_counters_are_isolated() {
    let f = setup().await;
    let token = saved_session(&f.service).await;
    let acme = LoginScope::Tenant("acme".into());
    let globex = LoginScope::Tenant("globex".into());

    for _ in 0..3 {
        f.service
            .login(Some(&token), acme.clone(), &request("alice@example.com", "wrong"))
            .await
            .unwrap();
    }

    let acme_reply = f
        .service
        .login(Some(&token), acme, &request("alice@example.com", PASSWORD))
        .await
        .unwrap();
    assert!(matches!(acme_reply.outcome, LoginOutcome::LockedOut { .. }));

    // Same email, different tenant: not locked, just unknown there.
    let globex_reply = f
        .service
        .login(Some(&token), globex, &request("alice@example.com", PASSWORD))
        .await
        .unwrap();
    assert_eq!(globex_reply.outcome, LoginOutcome::InvalidCredentials);
}

#[tokio::test]
async fn lookup_errors_do_not_count_as_failures() {
    let f = setup().await;
    let token = saved_session(&f.service).await;
    let scope = LoginScope::Tenant("nobody".into());

    for _ in 0..4 {
        let err = f
            .service
            .login(Some(&token), scope.clone(), &request("alice@example.com", "wrong"))
            .await
            .unwrap_err();
        assert!(matches!(err, TesseraError::UnknownTenant { .. }));
    }

    let stored = f
        .service
        .sessions()
        .find(&token, Utc::now())
        .await
        .unwrap()
        .unwrap();
    assert!(stored.login_attempt(&scope, "alice@example.com").is_none());
}

#[tokio::test]
async fn logout_revokes_host_authorization() {
    let f = setup().await;

    let reply = f
        .service
        .login(None, LoginScope::Host, &request("root@example.com", PASSWORD))
        .await
        .unwrap();
    let token = reply.issued_token.unwrap();

    assert!(f.service.logout(&token, LoginScope::Host).await.unwrap());
    assert!(!f.service.logout(&token, LoginScope::Host).await.unwrap());

    let err = f.service.require_host(Some(&token)).await.unwrap_err();
    assert_eq!(err.status_code(), 401);
    assert!(f.service.require_host(None).await.is_err());
}

#[tokio::test]
async fn invalid_requests_are_rejected_before_the_gate() {
    let f = setup().await;

    let err = f
        .service
        .login(None, LoginScope::Host, &request("", PASSWORD))
        .await
        .unwrap_err();
    assert!(matches!(err, TesseraError::Validation { .. }));

    let err = f
        .service
        .login(None, LoginScope::Tenant("not a tenant".into()), &request("a@b.c", "x"))
        .await
        .unwrap_err();
    assert!(matches!(err, TesseraError::Validation { .. }));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_failures_cannot_pass_the_lockout() {
    let f = setup().await;
    let token = saved_session(&f.service).await;

    let mut tasks = Vec::new();
    for _ in 0..8 {
        let service = Arc::clone(&f.service);
        let token = token.clone();
        tasks.push(tokio::spawn(async move {
            service
                .login(
                    Some(&token),
                    LoginScope::Host,
                    &request("root@example.com", "wrong"),
                )
                .await
                .unwrap()
                .outcome
        }));
    }

    let mut failed = 0;
    let mut locked = 0;
    for task in tasks {
        match task.await.unwrap() {
            LoginOutcome::InvalidCredentials => failed += 1,
            LoginOutcome::LockedOut { .. } => locked += 1,
            other => panic!("unexpected outcome {other:?}"),
        }
    }
    assert_eq!(failed, 3);
    assert_eq!(locked, 5);
}
