use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

text_enum!(
    PaymentMethod {
        Cash => "Cash",
        Card => "Card",
        Transfer => "Transfer",
        Other => "Other",
    }
);

text_enum!(
    PaymentKind {
        Deposit => "Deposit",
        Payment => "Payment",
    }
);

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Charge {
    pub id: Uuid,
    pub property_id: Uuid,
    pub reservation_id: Uuid,
    pub product_id: Option<Uuid>,
    pub concept_id: Option<Uuid>,
    pub description: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub id: Uuid,
    pub property_id: Uuid,
    pub reservation_id: Uuid,
    pub number: String,
    pub amount: Decimal,
    pub method: String,
    pub reference: Option<String>,
    pub kind: String,
    pub notes: Option<String>,
    pub paid_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateChargeRequest {
    pub reservation_id: Uuid,
    pub product_id: Option<Uuid>,
    pub concept_id: Option<Uuid>,
    /// Required when neither a product nor a concept supplies one.
    pub description: Option<String>,
    pub quantity: Option<i32>,
    /// Defaults to the product's sale price or the concept's default price.
    pub unit_price: Option<Decimal>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePaymentRequest {
    pub reservation_id: Uuid,
    pub amount: Decimal,
    pub method: Option<PaymentMethod>,
    pub reference: Option<String>,
    pub kind: Option<PaymentKind>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FolioQuery {
    pub reservation_id: Option<Uuid>,
    pub from: Option<chrono::NaiveDate>,
    pub to: Option<chrono::NaiveDate>,
    pub method: Option<PaymentMethod>,
}
