use axum::{
    extract::{Path, State},
    Json,
};
use rust_decimal::Decimal;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::middleware::TenantContext;
use crate::models::*;
use crate::AppState;

pub async fn list_concepts(
    State(state): State<AppState>,
    tenant: axum::Extension<TenantContext>,
) -> AppResult<Json<Value>> {
    let concepts: Vec<ChargeConcept> = sqlx::query_as(
        "SELECT * FROM charge_concepts WHERE property_id = $1 ORDER BY category, name",
    )
    .bind(tenant.property_id)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(json!({ "concepts": concepts })))
}

fn validate(body: &ChargeConceptRequest) -> AppResult<()> {
    if body.code.trim().is_empty() || body.name.trim().is_empty() {
        return Err(AppError::BadRequest("Code and name are required".into()));
    }
    if body.default_price.is_some_and(|p| p < Decimal::ZERO) {
        return Err(AppError::BadRequest("Default price cannot be negative".into()));
    }
    Ok(())
}

pub async fn create_concept(
    State(state): State<AppState>,
    tenant: axum::Extension<TenantContext>,
    Json(body): Json<ChargeConceptRequest>,
) -> AppResult<Json<Value>> {
    validate(&body)?;

    let concept: ChargeConcept = sqlx::query_as(
        r#"INSERT INTO charge_concepts (id, property_id, code, name, description, default_price, taxable, category, is_active)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) RETURNING *"#,
    )
    .bind(Uuid::new_v4())
    .bind(tenant.property_id)
    .bind(body.code.trim().to_uppercase())
    .bind(body.name.trim())
    .bind(&body.description)
    .bind(body.default_price.unwrap_or(Decimal::ZERO))
    .bind(body.taxable.unwrap_or(true))
    .bind(body.category.as_deref().unwrap_or("Service"))
    .bind(body.is_active.unwrap_or(true))
    .fetch_one(&state.db)
    .await?;

    Ok(Json(json!({ "concept": concept })))
}

pub async fn update_concept(
    State(state): State<AppState>,
    tenant: axum::Extension<TenantContext>,
    Path(id): Path<Uuid>,
    Json(body): Json<ChargeConceptRequest>,
) -> AppResult<Json<Value>> {
    validate(&body)?;

    let concept: ChargeConcept = sqlx::query_as(
        r#"UPDATE charge_concepts SET code = $3, name = $4, description = $5,
            default_price = COALESCE($6, default_price), taxable = COALESCE($7, taxable),
            category = COALESCE($8, category), is_active = COALESCE($9, is_active)
        WHERE id = $1 AND property_id = $2 RETURNING *"#,
    )
    .bind(id)
    .bind(tenant.property_id)
    .bind(body.code.trim().to_uppercase())
    .bind(body.name.trim())
    .bind(&body.description)
    .bind(body.default_price)
    .bind(body.taxable)
    .bind(&body.category)
    .bind(body.is_active)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| AppError::NotFound("Charge concept not found".into()))?;

    Ok(Json(json!({ "concept": concept })))
}
