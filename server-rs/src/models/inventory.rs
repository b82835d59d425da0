use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::lifecycle::Lifecycle;

text_enum!(
    MovementKind {
        In => "In",
        Out => "Out",
        Sale => "Sale",
        Adjust => "Adjust",
    }
);

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: Uuid,
    pub property_id: Uuid,
    pub category_id: Option<Uuid>,
    pub code: String,
    pub name: String,
    pub description: Option<String>,
    pub cost_price: Decimal,
    pub sale_price: Decimal,
    pub stock_on_hand: i32,
    pub reorder_level: i32,
    pub unit: String,
    pub image_url: Option<String>,
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub lifecycle: Lifecycle,
}

impl Product {
    pub fn needs_reorder(&self) -> bool {
        self.stock_on_hand <= self.reorder_level
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ProductCategory {
    pub id: Uuid,
    pub property_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub lifecycle: Lifecycle,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct InventoryMovement {
    pub id: Uuid,
    pub property_id: Uuid,
    pub product_id: Uuid,
    pub kind: String,
    pub quantity: i32,
    pub stock_before: i32,
    pub stock_after: i32,
    pub reference: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ChargeConcept {
    pub id: Uuid,
    pub property_id: Uuid,
    pub code: String,
    pub name: String,
    pub description: Option<String>,
    pub default_price: Decimal,
    pub taxable: bool,
    pub category: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductRequest {
    pub category_id: Option<Uuid>,
    pub code: String,
    pub name: String,
    pub description: Option<String>,
    pub cost_price: Option<Decimal>,
    pub sale_price: Decimal,
    /// Only honoured on create; later changes go through movements.
    pub stock_on_hand: Option<i32>,
    pub reorder_level: Option<i32>,
    pub unit: Option<String>,
    pub image_url: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductQuery {
    pub category_id: Option<Uuid>,
    pub search: Option<String>,
    pub low_stock: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct CategoryRequest {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct MovementRequest {
    pub kind: MovementKind,
    /// Units moved; for `Adjust` the new absolute stock level.
    pub quantity: i32,
    pub reference: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChargeConceptRequest {
    pub code: String,
    pub name: String,
    pub description: Option<String>,
    pub default_price: Option<Decimal>,
    pub taxable: Option<bool>,
    pub category: Option<String>,
    pub is_active: Option<bool>,
}
