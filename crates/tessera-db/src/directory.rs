//! Scope-aware user lookup for logins.

use std::sync::Arc;

use surrealdb::{Connection, Surreal};
use tessera_core::error::{TesseraError, TesseraResult};
use tessera_core::models::session::LoginScope;
use tessera_core::models::user::User;
use tessera_core::repository::{TenantRegistry, UserDirectory, UserRepository};

use crate::repository::SurrealUserRepository;
use crate::resolver::ConnectionResolver;

/// Host logins read `master_user` on the master database. Tenant logins
/// resolve the tenant first and read its `user` table.
pub struct SurrealUserDirectory<C: Connection, R: TenantRegistry> {
    master: Surreal<C>,
    resolver: Arc<ConnectionResolver<R>>,
}

impl<C: Connection, R: TenantRegistry> SurrealUserDirectory<C, R> {
    pub fn new(master: Surreal<C>, resolver: Arc<ConnectionResolver<R>>) -> Self {
        Self { master, resolver }
    }
}

impl<C: Connection, R: TenantRegistry> UserDirectory for SurrealUserDirectory<C, R> {
    async fn find_by_email(&self, scope: &LoginScope, email: &str) -> TesseraResult<Option<User>> {
        let found = match scope {
            LoginScope::Host => {
                SurrealUserRepository::master(self.master.clone())
                    .get_by_email(email)
                    .await
            }
            LoginScope::Tenant(identifier) => {
                let db = self.resolver.resolve(identifier).await?;
                SurrealUserRepository::tenant(db).get_by_email(email).await
            }
        };

        match found {
            Ok(user) => Ok(Some(user)),
            Err(TesseraError::NotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }
}
