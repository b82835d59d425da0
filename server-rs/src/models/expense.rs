use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::PaymentMethod;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Expense {
    pub id: Uuid,
    pub property_id: Uuid,
    pub category: String,
    pub concept: String,
    pub description: Option<String>,
    pub amount: Decimal,
    pub spent_on: NaiveDate,
    pub method: String,
    pub supplier_name: Option<String>,
    pub invoice_number: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpenseRequest {
    pub category: String,
    pub concept: String,
    pub description: Option<String>,
    pub amount: Decimal,
    pub spent_on: Option<NaiveDate>,
    pub method: Option<PaymentMethod>,
    pub supplier_name: Option<String>,
    pub invoice_number: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpenseQuery {
    pub category: Option<String>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub method: Option<PaymentMethod>,
}

/// Spend of one category over a period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct CategoryTotal {
    pub category: String,
    pub count: i64,
    pub total: Decimal,
}
