//! Subscription reference data linked to tenants.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A purchasable plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionType {
    pub id: Uuid,
    pub name: String,
    /// Price in minor currency units.
    pub price: u64,
    /// Renewal period in months (1 to 24).
    pub renewal_period_months: u32,
    pub auto_renew: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSubscriptionType {
    pub name: String,
    pub price: u64,
    pub renewal_period_months: u32,
    pub auto_renew: bool,
}

/// Links a tenant to its current [`SubscriptionType`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionInfo {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub subscription_type_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
