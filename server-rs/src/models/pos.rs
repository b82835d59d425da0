use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::PaymentMethod;

/// A sale paid at the counter. Linking a reservation only records who bought;
/// the folio is not touched.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Sale {
    pub id: Uuid,
    pub property_id: Uuid,
    pub number: String,
    pub reservation_id: Option<Uuid>,
    pub method: String,
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct SaleLine {
    pub id: Uuid,
    pub sale_id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub subtotal: Decimal,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleLineRequest {
    pub product_id: Uuid,
    pub quantity: i32,
    /// Overrides the product's sale price.
    pub unit_price: Option<Decimal>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSaleRequest {
    pub reservation_id: Option<Uuid>,
    pub method: Option<PaymentMethod>,
    pub notes: Option<String>,
    pub lines: Vec<SaleLineRequest>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleQuery {
    pub reservation_id: Option<Uuid>,
    pub from: Option<chrono::NaiveDate>,
    pub to: Option<chrono::NaiveDate>,
}

/// Something handed to a guest for the stay (remote, towel, key card).
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct LoanableItem {
    pub id: Uuid,
    pub property_id: Uuid,
    pub code: String,
    pub name: String,
    pub description: Option<String>,
    pub requires_return: bool,
    pub replacement_cost: Decimal,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoanableItemRequest {
    pub code: String,
    pub name: String,
    pub description: Option<String>,
    pub requires_return: Option<bool>,
    pub replacement_cost: Option<Decimal>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ReservationLoan {
    pub id: Uuid,
    pub property_id: Uuid,
    pub reservation_id: Uuid,
    pub item_id: Uuid,
    pub quantity: i32,
    pub quantity_returned: Option<i32>,
    pub charged_unit_cost: Option<Decimal>,
    pub charge_id: Option<Uuid>,
    pub notes: Option<String>,
    pub lent_at: DateTime<Utc>,
    pub returned_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LendRequest {
    pub item_id: Uuid,
    pub quantity: Option<i32>,
    pub notes: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReturnLoanRequest {
    /// Defaults to everything that was lent.
    pub quantity_returned: Option<i32>,
    /// Defaults to the item's replacement cost.
    pub unit_cost: Option<Decimal>,
    /// Set to false to record missing units without billing them.
    pub charge_missing: Option<bool>,
}
