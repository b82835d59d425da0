use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::middleware::TenantContext;
use crate::models::*;
use crate::AppState;

pub async fn list_suppliers(
    State(state): State<AppState>,
    tenant: axum::Extension<TenantContext>,
) -> AppResult<Json<Value>> {
    let suppliers: Vec<Supplier> = sqlx::query_as(
        "SELECT * FROM suppliers WHERE property_id = $1 AND deleted_at IS NULL ORDER BY name",
    )
    .bind(tenant.property_id)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(json!({ "suppliers": suppliers })))
}

pub async fn get_supplier(
    State(state): State<AppState>,
    tenant: axum::Extension<TenantContext>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Value>> {
    let supplier: Supplier = sqlx::query_as(
        "SELECT * FROM suppliers WHERE id = $1 AND property_id = $2 AND deleted_at IS NULL",
    )
    .bind(id)
    .bind(tenant.property_id)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| AppError::NotFound("Supplier not found".into()))?;

    Ok(Json(json!({ "supplier": supplier })))
}

pub async fn create_supplier(
    State(state): State<AppState>,
    tenant: axum::Extension<TenantContext>,
    Json(body): Json<SupplierRequest>,
) -> AppResult<Json<Value>> {
    if body.name.trim().is_empty() {
        return Err(AppError::BadRequest("Supplier name required".into()));
    }

    let supplier: Supplier = sqlx::query_as(
        r#"INSERT INTO suppliers (id, property_id, name, tax_id, contact_name, phone, email, address, notes)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) RETURNING *"#,
    )
    .bind(Uuid::new_v4())
    .bind(tenant.property_id)
    .bind(body.name.trim())
    .bind(&body.tax_id)
    .bind(&body.contact_name)
    .bind(&body.phone)
    .bind(&body.email)
    .bind(&body.address)
    .bind(&body.notes)
    .fetch_one(&state.db)
    .await?;

    Ok(Json(json!({ "supplier": supplier })))
}

pub async fn update_supplier(
    State(state): State<AppState>,
    tenant: axum::Extension<TenantContext>,
    Path(id): Path<Uuid>,
    Json(body): Json<SupplierRequest>,
) -> AppResult<Json<Value>> {
    if body.name.trim().is_empty() {
        return Err(AppError::BadRequest("Supplier name required".into()));
    }

    let supplier: Supplier = sqlx::query_as(
        r#"UPDATE suppliers SET name = $3, tax_id = $4, contact_name = $5, phone = $6, email = $7,
            address = $8, notes = $9
        WHERE id = $1 AND property_id = $2 AND deleted_at IS NULL RETURNING *"#,
    )
    .bind(id)
    .bind(tenant.property_id)
    .bind(body.name.trim())
    .bind(&body.tax_id)
    .bind(&body.contact_name)
    .bind(&body.phone)
    .bind(&body.email)
    .bind(&body.address)
    .bind(&body.notes)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| AppError::NotFound("Supplier not found".into()))?;

    Ok(Json(json!({ "supplier": supplier })))
}

pub async fn delete_supplier(
    State(state): State<AppState>,
    tenant: axum::Extension<TenantContext>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Value>> {
    soft_delete(&state.db, SoftDeletable::Suppliers, tenant.property_id, id).await?;
    Ok(Json(json!({ "success": true })))
}
