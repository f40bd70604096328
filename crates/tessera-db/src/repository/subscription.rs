//! SurrealDB implementation of [`SubscriptionRepository`].

use chrono::{DateTime, Utc};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tessera_core::error::{TesseraError, TesseraResult};
use tessera_core::models::subscription::{
    CreateSubscriptionType, SubscriptionInfo, SubscriptionType,
};
use tessera_core::repository::SubscriptionRepository;
use uuid::Uuid;

use crate::error::DbError;

#[derive(Debug, SurrealValue)]
struct SubscriptionTypeRow {
    name: String,
    price: u64,
    renewal_period_months: u32,
    auto_renew: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl SubscriptionTypeRow {
    fn into_type(self, id: Uuid) -> SubscriptionType {
        SubscriptionType {
            id,
            name: self.name,
            price: self.price,
            renewal_period_months: self.renewal_period_months,
            auto_renew: self.auto_renew,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Debug, SurrealValue)]
struct SubscriptionInfoRowWithId {
    record_id: String,
    tenant_id: String,
    subscription_type_id: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl SubscriptionInfoRowWithId {
    fn try_into_info(self) -> Result<SubscriptionInfo, DbError> {
        let parse = |field: &str, raw: &str| {
            Uuid::parse_str(raw).map_err(|e| DbError::Corrupt(format!("invalid {field} UUID: {e}")))
        };
        Ok(SubscriptionInfo {
            id: parse("subscription", &self.record_id)?,
            tenant_id: parse("tenant", &self.tenant_id)?,
            subscription_type_id: parse("subscription type", &self.subscription_type_id)?,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// Subscription plans and tenant assignments in the master database.
#[derive(Clone)]
pub struct SurrealSubscriptionRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealSubscriptionRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> SubscriptionRepository for SurrealSubscriptionRepository<C> {
    async fn create_type(&self, input: CreateSubscriptionType) -> TesseraResult<SubscriptionType> {
        if !(1..=24).contains(&input.renewal_period_months) {
            return Err(TesseraError::validation(
                "renewal period must be between 1 and 24 months",
            ));
        }

        let id = Uuid::new_v4();
        let id_str = id.to_string();

        let result = self
            .db
            .query(
                "CREATE type::record('subscription_type', $id) SET \
                 name = $name, price = $price, \
                 renewal_period_months = $renewal, \
                 auto_renew = $auto_renew",
            )
            .bind(("id", id_str.clone()))
            .bind(("name", input.name))
            .bind(("price", input.price))
            .bind(("renewal", input.renewal_period_months))
            .bind(("auto_renew", input.auto_renew))
            .await
            .map_err(DbError::from)?;
        let mut result = result.check().map_err(DbError::from)?;

        let rows: Vec<SubscriptionTypeRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "subscription_type".into(),
            id: id_str,
        })?;

        Ok(row.into_type(id))
    }

    async fn get_type(&self, id: Uuid) -> TesseraResult<SubscriptionType> {
        let id_str = id.to_string();

        let mut result = self
            .db
            .query("SELECT * FROM type::record('subscription_type', $id)")
            .bind(("id", id_str.clone()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<SubscriptionTypeRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "subscription_type".into(),
            id: id_str,
        })?;

        Ok(row.into_type(id))
    }

    async fn assign(
        &self,
        tenant_id: Uuid,
        subscription_type_id: Uuid,
    ) -> TesseraResult<SubscriptionInfo> {
        // Fail early with NotFound rather than storing a dangling reference.
        self.get_type(subscription_type_id).await?;

        let result = self
            .db
            .query(
                "BEGIN TRANSACTION; \
                 DELETE subscription_info WHERE tenant_id = $tenant_id; \
                 CREATE type::record('subscription_info', $id) SET \
                 tenant_id = $tenant_id, \
                 subscription_type_id = $type_id; \
                 COMMIT TRANSACTION;",
            )
            .bind(("id", Uuid::new_v4().to_string()))
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("type_id", subscription_type_id.to_string()))
            .await
            .map_err(DbError::from)?;
        result.check().map_err(DbError::from)?;

        self.get_for_tenant(tenant_id)
            .await?
            .ok_or_else(|| TesseraError::NotFound {
                entity: "subscription_info".into(),
                id: format!("tenant={tenant_id}"),
            })
    }

    async fn get_for_tenant(&self, tenant_id: Uuid) -> TesseraResult<Option<SubscriptionInfo>> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM subscription_info \
                 WHERE tenant_id = $tenant_id",
            )
            .bind(("tenant_id", tenant_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<SubscriptionInfoRowWithId> = result.take(0).map_err(DbError::from)?;
        rows.into_iter()
            .next()
            .map(|row| row.try_into_info().map_err(Into::into))
            .transpose()
    }
}
