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

fn validate(body: &RoomTypeRequest) -> AppResult<(i32, i32)> {
    if body.code.trim().is_empty() || body.name.trim().is_empty() {
        return Err(AppError::BadRequest("Code and name are required".into()));
    }
    if body.base_rate < Decimal::ZERO || body.extra_person_rate.is_some_and(|r| r < Decimal::ZERO) {
        return Err(AppError::BadRequest("Rates cannot be negative".into()));
    }
    let base = body.base_occupancy.unwrap_or(2);
    let max = body.max_occupancy.unwrap_or(base);
    if base < 1 || max < base {
        return Err(AppError::BadRequest(
            "Occupancy must be at least 1 and max cannot be below base".into(),
        ));
    }
    Ok((base, max))
}

pub async fn list_room_types(
    State(state): State<AppState>,
    tenant: axum::Extension<TenantContext>,
) -> AppResult<Json<Value>> {
    let room_types: Vec<RoomType> = sqlx::query_as(
        "SELECT * FROM room_types WHERE property_id = $1 AND deleted_at IS NULL ORDER BY base_rate, name",
    )
    .bind(tenant.property_id)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(json!({ "roomTypes": room_types })))
}

pub async fn get_room_type(
    State(state): State<AppState>,
    tenant: axum::Extension<TenantContext>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Value>> {
    let room_type: RoomType = sqlx::query_as(
        "SELECT * FROM room_types WHERE id = $1 AND property_id = $2 AND deleted_at IS NULL",
    )
    .bind(id)
    .bind(tenant.property_id)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| AppError::NotFound("Room type not found".into()))?;

    let room_count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM rooms WHERE room_type_id = $1 AND deleted_at IS NULL",
    )
    .bind(id)
    .fetch_one(&state.db)
    .await?;

    Ok(Json(json!({ "roomType": room_type, "roomCount": room_count })))
}

pub async fn create_room_type(
    State(state): State<AppState>,
    tenant: axum::Extension<TenantContext>,
    Json(body): Json<RoomTypeRequest>,
) -> AppResult<Json<Value>> {
    let (base, max) = validate(&body)?;

    let room_type: RoomType = sqlx::query_as(
        r#"INSERT INTO room_types (id, property_id, code, name, description, base_occupancy, max_occupancy,
            base_rate, extra_person_rate, amenities)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) RETURNING *"#,
    )
    .bind(Uuid::new_v4())
    .bind(tenant.property_id)
    .bind(body.code.trim().to_uppercase())
    .bind(body.name.trim())
    .bind(&body.description)
    .bind(base)
    .bind(max)
    .bind(body.base_rate)
    .bind(body.extra_person_rate.unwrap_or(Decimal::ZERO))
    .bind(body.amenities.clone().unwrap_or_else(|| json!([])))
    .fetch_one(&state.db)
    .await?;

    Ok(Json(json!({ "roomType": room_type })))
}

pub async fn update_room_type(
    State(state): State<AppState>,
    tenant: axum::Extension<TenantContext>,
    Path(id): Path<Uuid>,
    Json(body): Json<RoomTypeRequest>,
) -> AppResult<Json<Value>> {
    let (base, max) = validate(&body)?;

    let room_type: RoomType = sqlx::query_as(
        r#"UPDATE room_types SET code = $3, name = $4, description = $5, base_occupancy = $6,
            max_occupancy = $7, base_rate = $8, extra_person_rate = COALESCE($9, extra_person_rate),
            amenities = COALESCE($10, amenities)
        WHERE id = $1 AND property_id = $2 AND deleted_at IS NULL RETURNING *"#,
    )
    .bind(id)
    .bind(tenant.property_id)
    .bind(body.code.trim().to_uppercase())
    .bind(body.name.trim())
    .bind(&body.description)
    .bind(base)
    .bind(max)
    .bind(body.base_rate)
    .bind(body.extra_person_rate)
    .bind(&body.amenities)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| AppError::NotFound("Room type not found".into()))?;

    Ok(Json(json!({ "roomType": room_type })))
}

pub async fn delete_room_type(
    State(state): State<AppState>,
    tenant: axum::Extension<TenantContext>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Value>> {
    let in_use: bool = sqlx::query_scalar(
        "SELECT EXISTS (SELECT 1 FROM rooms WHERE room_type_id = $1 AND deleted_at IS NULL)",
    )
    .bind(id)
    .fetch_one(&state.db)
    .await?;
    if in_use {
        return Err(AppError::Conflict("Room type still has rooms".into()));
    }

    soft_delete(&state.db, SoftDeletable::RoomTypes, tenant.property_id, id).await?;
    Ok(Json(json!({ "success": true })))
}
