//! Tessera Server: wiring of the master database, tenant resolution,
//! provisioning and login into one [`AppContext`].

use std::sync::Arc;
use std::time::Duration;

use surrealdb::engine::any::Any;
use tessera_auth::{
    Argon2Verifier, AuthConfig, LoginReply, LoginService, SessionStore, ThrottlePolicy,
};
use tessera_core::api::{LoginRequest, ProvisionRequest, ProvisionResponse};
use tessera_core::error::{TesseraError, TesseraResult};
use tessera_core::models::session::LoginScope;
use tessera_core::models::subscription::SubscriptionInfo;
use tessera_core::models::tenant::normalize_subdomain;
use tessera_core::models::user::{CreateUser, User};
use tessera_core::repository::{
    CredentialVerifier, SubscriptionRepository, TenantRegistry, UserRepository,
};
use tessera_db::repository::{
    SurrealSessionRepository, SurrealSubscriptionRepository, SurrealTenantRegistry,
    SurrealUserRepository,
};
use tessera_db::{
    ConnectionResolver, DbConfig, DbManager, RepairReport, StartupReport, SurrealUserDirectory,
    TenantNaming, TenantProvisioner,
};
use tokio::task::JoinHandle;
use tracing::info;
use uuid::Uuid;

pub type Registry = SurrealTenantRegistry<Any>;
pub type Directory = SurrealUserDirectory<Any, Registry>;
pub type Login = LoginService<SurrealSessionRepository<Any>, Directory, Argon2Verifier>;

/// Top-level configuration.
#[derive(Debug, Clone, Default)]
pub struct ServerConfig {
    pub db: DbConfig,
    pub auth: AuthConfig,
}

/// Everything a request handler needs, built once at startup.
pub struct AppContext {
    pub config: ServerConfig,
    pub db: DbManager,
    pub registry: Registry,
    pub provisioner: TenantProvisioner<Any, Registry>,
    pub resolver: Arc<ConnectionResolver<Registry>>,
    pub subscriptions: SurrealSubscriptionRepository<Any>,
    pub sessions: Arc<SessionStore<SurrealSessionRepository<Any>>>,
    pub login: Login,
    verifier: Argon2Verifier,
}

impl AppContext {
    /// Connect to the master database and wire the services.
    pub async fn build(config: ServerConfig) -> TesseraResult<Self> {
        let db = DbManager::connect(&config.db).await?;
        let master = db.client().clone();
        let pool = Arc::clone(db.pool());

        let registry = SurrealTenantRegistry::new(master.clone());
        let provisioner = TenantProvisioner::new(
            master.clone(),
            registry.clone(),
            Arc::clone(&pool),
            TenantNaming::from_config(&config.db),
        );
        let resolver = Arc::new(ConnectionResolver::new(registry.clone(), pool));

        let verifier = Argon2Verifier::new(config.auth.pepper.clone());
        let sessions = Arc::new(SessionStore::from_config(
            SurrealSessionRepository::new(master.clone()),
            &config.auth,
        ));
        let login = LoginService::new(
            Arc::clone(&sessions),
            SurrealUserDirectory::new(master.clone(), Arc::clone(&resolver)),
            verifier.clone(),
            ThrottlePolicy::from_config(&config.auth),
        );

        Ok(Self {
            subscriptions: SurrealSubscriptionRepository::new(master),
            config,
            db,
            registry,
            provisioner,
            resolver,
            sessions,
            login,
            verifier,
        })
    }

    /// Migrate the master and every known tenant, then resume any tenant
    /// left incomplete by an earlier run.
    pub async fn start(&self) -> TesseraResult<(StartupReport, RepairReport)> {
        let startup =
            tessera_db::bootstrap(self.db.client(), &self.registry, self.db.pool()).await?;
        let repair = self.provisioner.repair().await?;
        Ok((startup, repair))
    }

    /// Start the periodic expired-session sweep.
    pub fn spawn_sweeper(&self) -> JoinHandle<()> {
        let every = Duration::from_secs(self.config.auth.session_sweep_interval_secs);
        info!(interval_secs = every.as_secs(), "Starting session sweeper");
        Arc::clone(&self.sessions).spawn_sweeper(every)
    }

    /// Provision a tenant on behalf of an authorized master user.
    pub async fn provision(
        &self,
        session_token: Option<&str>,
        request: &ProvisionRequest,
    ) -> TesseraResult<ProvisionResponse> {
        let master_user = self.login.require_host(session_token).await?;
        let record = self
            .provisioner
            .provision(&request.sub_domain_identifier)
            .await?;
        info!(tenant = %record.subdomain_identifier, %master_user, "Tenant provisioned on request");

        Ok(ProvisionResponse {
            message: "Tenant created successfully.".into(),
            sub_domain_identifier: record.subdomain_identifier,
        })
    }

    /// Log in as a master user.
    pub async fn host_login(
        &self,
        session_token: Option<&str>,
        request: &LoginRequest,
    ) -> TesseraResult<LoginReply> {
        self.login
            .login(session_token, LoginScope::Host, request)
            .await
    }

    /// Log in as a user of `tenant`.
    pub async fn tenant_login(
        &self,
        session_token: Option<&str>,
        tenant: &str,
        request: &LoginRequest,
    ) -> TesseraResult<LoginReply> {
        self.login
            .login(session_token, LoginScope::Tenant(tenant.to_owned()), request)
            .await
    }

    /// Create a master user from a raw password.
    pub async fn create_master_user(
        &self,
        email: &str,
        password: &str,
        first_name: Option<String>,
        last_name: Option<String>,
    ) -> TesseraResult<User> {
        SurrealUserRepository::master(self.db.client().clone())
            .create(CreateUser {
                email: email.to_owned(),
                password_hash: self.verifier.hash(password)?,
                account_type: 0,
                first_name,
                last_name,
            })
            .await
    }

    /// Create a user inside `tenant`'s database from a raw password.
    pub async fn create_tenant_user(
        &self,
        tenant: &str,
        email: &str,
        password: &str,
    ) -> TesseraResult<User> {
        let db = self.resolver.resolve(tenant).await?;
        SurrealUserRepository::tenant(db)
            .create(CreateUser {
                email: email.to_owned(),
                password_hash: self.verifier.hash(password)?,
                account_type: 0,
                first_name: None,
                last_name: None,
            })
            .await
    }

    /// Attach a subscription plan to a tenant. Master users only.
    pub async fn subscribe(
        &self,
        session_token: Option<&str>,
        tenant: &str,
        subscription_type_id: Uuid,
    ) -> TesseraResult<SubscriptionInfo> {
        self.login.require_host(session_token).await?;
        let tenant_id = self.tenant_id(tenant).await?;
        self.subscriptions
            .assign(tenant_id, subscription_type_id)
            .await
    }

    async fn tenant_id(&self, tenant: &str) -> TesseraResult<Uuid> {
        let identifier = normalize_subdomain(tenant).map_err(TesseraError::validation)?;
        match self.registry.lookup(&identifier).await? {
            Some(record) => Ok(record.id),
            None => Err(TesseraError::UnknownTenant { identifier }),
        }
    }
}
