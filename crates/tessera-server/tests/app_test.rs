//! End-to-end tests of the wired application on the in-memory engine.

use tessera_auth::{AuthConfig, LoginOutcome};
use tessera_core::api::{ErrorResponse, LoginRequest, ProvisionRequest};
use tessera_core::error::TesseraError;
use tessera_core::models::subscription::CreateSubscriptionType;
use tessera_core::models::tenant::ProvisionStage;
use tessera_core::repository::SubscriptionRepository;
use tessera_db::DbConfig;
use tessera_server::{AppContext, ServerConfig};

fn mem_config() -> ServerConfig {
    ServerConfig {
        db: DbConfig {
            endpoint: "mem://".into(),
            namespace: "tessera".into(),
            database: "master".into(),
            credentials: None,
            tenant_database_suffix: "_tenant".into(),
        },
        auth: AuthConfig {
            pepper: Some("test-pepper".into()),
            ..AuthConfig::default()
        },
    }
}

/// Started context plus the session token of a logged-in master user.
async fn started_with_admin() -> (AppContext, String) {
    let ctx = AppContext::build(mem_config()).await.unwrap();
    ctx.start().await.unwrap();

    ctx.create_master_user("admin@example.com", "admin-password", Some("Ada".into()), None)
        .await
        .unwrap();
    let reply = ctx
        .host_login(
            None,
            &LoginRequest {
                email: "admin@example.com".into(),
                password: "admin-password".into(),
            },
        )
        .await
        .unwrap();
    assert!(matches!(reply.outcome, LoginOutcome::Authorized { .. }));

    (ctx, reply.issued_token.unwrap())
}

fn provision_request(identifier: &str) -> ProvisionRequest {
    ProvisionRequest {
        sub_domain_identifier: identifier.into(),
    }
}

#[tokio::test]
async fn start_on_empty_master() {
    let ctx = AppContext::build(mem_config()).await.unwrap();
    let (startup, repair) = ctx.start().await.unwrap();
    assert!(startup.migrated.is_empty());
    assert!(repair.repaired.is_empty());
}

#[tokio::test]
async fn provisioning_requires_host_login() {
    let ctx = AppContext::build(mem_config()).await.unwrap();
    ctx.start().await.unwrap();

    let err = ctx
        .provision(None, &provision_request("acme"))
        .await
        .unwrap_err();
    assert!(matches!(err, TesseraError::Unauthorized));
    assert_eq!(
        ErrorResponse::from(&err).message,
        "You are not authorized to view this."
    );
}

#[tokio::test]
async fn provision_then_tenant_login() {
    let (ctx, admin) = started_with_admin().await;

    let response = ctx
        .provision(Some(&admin), &provision_request("Acme"))
        .await
        .unwrap();
    assert_eq!(response.sub_domain_identifier, "acme");

    ctx.create_tenant_user("acme", "alice@example.com", "alice-password")
        .await
        .unwrap();

    let reply = ctx
        .tenant_login(
            None,
            "acme",
            &LoginRequest {
                email: "alice@example.com".into(),
                password: "alice-password".into(),
            },
        )
        .await
        .unwrap();
    assert!(matches!(reply.outcome, LoginOutcome::Authorized { .. }));

    // A second startup sweep migrates the new tenant.
    let (startup, _) = ctx.start().await.unwrap();
    assert_eq!(startup.migrated, vec!["acme".to_string()]);
}

#[tokio::test]
async fn duplicate_provision_reports_register_stage() {
    let (ctx, admin) = started_with_admin().await;

    ctx.provision(Some(&admin), &provision_request("acme"))
        .await
        .unwrap();
    let err = ctx
        .provision(Some(&admin), &provision_request("acme"))
        .await
        .unwrap_err();

    let body = ErrorResponse::from(&err);
    assert_eq!(body.stage, Some(ProvisionStage::Register));
    assert!(body.message.contains("register"));
}

#[tokio::test]
async fn subscribe_tenant_to_plan() {
    let (ctx, admin) = started_with_admin().await;
    ctx.provision(Some(&admin), &provision_request("acme"))
        .await
        .unwrap();

    let plan = ctx
        .subscriptions
        .create_type(CreateSubscriptionType {
            name: "monthly".into(),
            price: 1500,
            renewal_period_months: 1,
            auto_renew: true,
        })
        .await
        .unwrap();

    let info = ctx.subscribe(Some(&admin), "acme", plan.id).await.unwrap();
    assert_eq!(info.subscription_type_id, plan.id);

    let err = ctx
        .subscribe(Some(&admin), "globex", plan.id)
        .await
        .unwrap_err();
    assert!(matches!(err, TesseraError::UnknownTenant { .. }));

    let err = ctx.subscribe(None, "acme", plan.id).await.unwrap_err();
    assert!(matches!(err, TesseraError::Unauthorized));
}

#[tokio::test]
async fn sweeper_task_can_be_stopped() {
    let ctx = AppContext::build(mem_config()).await.unwrap();
    ctx.start().await.unwrap();

    let sweeper = ctx.spawn_sweeper();
    assert!(!sweeper.is_finished());
    sweeper.abort();
    assert!(sweeper.await.unwrap_err().is_cancelled());
}
