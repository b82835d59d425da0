use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

text_enum!(
    /// Lifecycle of a subscription row. Only `active` rows admit traffic.
    SubscriptionStatus {
        Active => "active",
        Suspended => "suspended",
        Revoked => "revoked",
    }
);

text_enum!(
    /// Staff role carried in the bearer token.
    Role {
        Staff => "staff",
        Manager => "manager",
        Admin => "admin",
        PlatformAdmin => "platform_admin",
    }
);

impl Role {
    pub fn level(self) -> u8 {
        match self {
            Role::Staff => 0,
            Role::Manager => 1,
            Role::Admin => 2,
            Role::PlatformAdmin => 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Plan {
    pub id: Uuid,
    pub name: String,
    pub monthly_price: Decimal,
    pub max_properties: i32,
    pub max_rooms_per_property: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    pub id: Uuid,
    pub account_id: Uuid,
    pub property_id: Option<Uuid>,
    pub plan_id: Option<Uuid>,
    pub status: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAccountRequest {
    pub name: String,
    pub email: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetActiveRequest {
    pub is_active: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePlanRequest {
    pub name: String,
    pub monthly_price: Decimal,
    pub max_properties: Option<i32>,
    pub max_rooms_per_property: Option<i32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePropertyRequest {
    pub account_id: Uuid,
    pub name: String,
    pub legal_name: Option<String>,
    pub tax_id: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub tax_rate: Option<Decimal>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSubscriptionRequest {
    pub account_id: Uuid,
    /// Omitted for a subscription covering every property of the account.
    pub property_id: Option<Uuid>,
    pub plan_id: Option<Uuid>,
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
    pub days: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSubscriptionRequest {
    pub plan_id: Option<Uuid>,
    pub status: Option<SubscriptionStatus>,
    pub ends_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct ExtendSubscriptionRequest {
    pub days: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionQuery {
    pub account_id: Option<Uuid>,
    pub property_id: Option<Uuid>,
    pub status: Option<SubscriptionStatus>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roles_are_ordered() {
        assert!(Role::PlatformAdmin.level() > Role::Admin.level());
        assert!(Role::Manager.level() > Role::Staff.level());
        assert_eq!("platform_admin".parse::<Role>().unwrap(), Role::PlatformAdmin);
    }

    #[test]
    fn subscription_status_uses_lowercase_names() {
        assert_eq!(SubscriptionStatus::Active.as_str(), "active");
        assert_eq!("revoked".parse::<SubscriptionStatus>().unwrap(), SubscriptionStatus::Revoked);
        assert!("Active".parse::<SubscriptionStatus>().is_err());
        assert_eq!(
            serde_json::to_value(SubscriptionStatus::Suspended).unwrap(),
            serde_json::json!("suspended")
        );
    }
}
