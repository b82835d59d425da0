use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::middleware::TenantContext;
use crate::models::*;
use crate::services::pricing;
use crate::AppState;

use super::reservations::SUMMARY_SELECT;

pub async fn list_rooms(
    State(state): State<AppState>,
    tenant: axum::Extension<TenantContext>,
    Query(q): Query<RoomQuery>,
) -> AppResult<Json<Value>> {
    let rooms: Vec<Room> = sqlx::query_as(
        r#"SELECT * FROM rooms
        WHERE property_id = $1 AND deleted_at IS NULL
          AND ($2::text IS NULL OR status = $2)
          AND ($3::text IS NULL OR cleaning_status = $3)
          AND ($4::text IS NULL OR maintenance_status = $4)
          AND ($5::uuid IS NULL OR room_type_id = $5)
          AND ($6::int IS NULL OR floor = $6)
        ORDER BY floor, number"#,
    )
    .bind(tenant.property_id)
    .bind(q.status.map(RoomStatus::as_str))
    .bind(q.cleaning_status.map(CleaningStatus::as_str))
    .bind(q.maintenance_status.map(RoomMaintenance::as_str))
    .bind(q.room_type_id)
    .bind(q.floor)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(json!({ "rooms": rooms })))
}

/// Rooms free for every night of `[checkIn, checkOut)` and fit to sell.
pub async fn available_rooms(
    State(state): State<AppState>,
    tenant: axum::Extension<TenantContext>,
    Query(q): Query<AvailabilityQuery>,
) -> AppResult<Json<Value>> {
    let nights = pricing::nights_between(q.check_in, q.check_out)?;

    let sql = format!(
        r#"SELECT r.* FROM rooms r
        WHERE r.property_id = $1 AND {live}
          AND r.status <> 'OutOfService' AND r.maintenance_status <> 'OutOfService'
          AND ($4::uuid IS NULL OR r.room_type_id = $4)
          AND NOT EXISTS (
            SELECT 1 FROM reservations res
            WHERE res.room_id = r.id AND res.status IN {holding}
              AND res.check_in < $3 AND res.check_out > $2
          )
        ORDER BY r.floor, r.number"#,
        live = live("r"),
        holding = ROOM_HOLDING_STATUSES,
    );
    let rooms: Vec<Room> = sqlx::query_as(&sql)
        .bind(tenant.property_id)
        .bind(q.check_in)
        .bind(q.check_out)
        .bind(q.room_type_id)
        .fetch_all(&state.db)
        .await?;

    Ok(Json(json!({ "rooms": rooms, "nights": nights })))
}

pub async fn get_room(
    State(state): State<AppState>,
    tenant: axum::Extension<TenantContext>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Value>> {
    let room: Room = sqlx::query_as(
        "SELECT * FROM rooms WHERE id = $1 AND property_id = $2 AND deleted_at IS NULL",
    )
    .bind(id)
    .bind(tenant.property_id)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| AppError::NotFound("Room not found".into()))?;

    let sql = format!("{SUMMARY_SELECT} WHERE res.room_id = $1 AND res.status = 'CheckIn' LIMIT 1");
    let current: Option<ReservationSummary> = sqlx::query_as(&sql)
        .bind(id)
        .fetch_optional(&state.db)
        .await?;

    Ok(Json(json!({ "room": room, "currentStay": current })))
}

async fn ensure_room_type(db: &sqlx::PgPool, property_id: Uuid, room_type_id: Uuid) -> AppResult<()> {
    let exists: bool = sqlx::query_scalar(
        "SELECT EXISTS (SELECT 1 FROM room_types WHERE id = $1 AND property_id = $2 AND deleted_at IS NULL)",
    )
    .bind(room_type_id)
    .bind(property_id)
    .fetch_one(db)
    .await?;
    if !exists {
        return Err(AppError::NotFound("Room type not found".into()));
    }
    Ok(())
}

pub async fn create_room(
    State(state): State<AppState>,
    tenant: axum::Extension<TenantContext>,
    Json(body): Json<CreateRoomRequest>,
) -> AppResult<Json<Value>> {
    let number = body.number.trim();
    if number.is_empty() {
        return Err(AppError::BadRequest("Room number required".into()));
    }
    ensure_room_type(&state.db, tenant.property_id, body.room_type_id).await?;

    let taken: bool = sqlx::query_scalar(
        "SELECT EXISTS (SELECT 1 FROM rooms WHERE property_id = $1 AND number = $2 AND deleted_at IS NULL)",
    )
    .bind(tenant.property_id)
    .bind(number)
    .fetch_one(&state.db)
    .await?;
    if taken {
        return Err(AppError::Conflict(format!("Room {number} already exists")));
    }

    let room: Room = sqlx::query_as(
        r#"INSERT INTO rooms (id, property_id, room_type_id, number, floor, notes)
        VALUES ($1, $2, $3, $4, $5, $6) RETURNING *"#,
    )
    .bind(Uuid::new_v4())
    .bind(tenant.property_id)
    .bind(body.room_type_id)
    .bind(number)
    .bind(body.floor.unwrap_or(1))
    .bind(&body.notes)
    .fetch_one(&state.db)
    .await?;

    Ok(Json(json!({ "room": room })))
}

pub async fn update_room(
    State(state): State<AppState>,
    tenant: axum::Extension<TenantContext>,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateRoomRequest>,
) -> AppResult<Json<Value>> {
    if let Some(room_type_id) = body.room_type_id {
        ensure_room_type(&state.db, tenant.property_id, room_type_id).await?;
    }

    let room: Room = sqlx::query_as(
        r#"UPDATE rooms SET
            room_type_id = COALESCE($3, room_type_id),
            number = COALESCE($4, number),
            floor = COALESCE($5, floor),
            notes = COALESCE($6, notes)
        WHERE id = $1 AND property_id = $2 AND deleted_at IS NULL RETURNING *"#,
    )
    .bind(id)
    .bind(tenant.property_id)
    .bind(body.room_type_id)
    .bind(body.number.as_deref().map(str::trim))
    .bind(body.floor)
    .bind(&body.notes)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| AppError::NotFound("Room not found".into()))?;

    Ok(Json(json!({ "room": room })))
}

/// Manual override of any of the three room status axes.
pub async fn set_room_status(
    State(state): State<AppState>,
    tenant: axum::Extension<TenantContext>,
    Path(id): Path<Uuid>,
    Json(body): Json<RoomStatusRequest>,
) -> AppResult<Json<Value>> {
    if body.status.is_none() && body.cleaning_status.is_none() && body.maintenance_status.is_none() {
        return Err(AppError::BadRequest("Nothing to update".into()));
    }

    let room: Room = sqlx::query_as(
        r#"UPDATE rooms SET
            status = COALESCE($3, status),
            cleaning_status = COALESCE($4, cleaning_status),
            maintenance_status = COALESCE($5, maintenance_status)
        WHERE id = $1 AND property_id = $2 AND deleted_at IS NULL RETURNING *"#,
    )
    .bind(id)
    .bind(tenant.property_id)
    .bind(body.status.map(RoomStatus::as_str))
    .bind(body.cleaning_status.map(CleaningStatus::as_str))
    .bind(body.maintenance_status.map(RoomMaintenance::as_str))
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| AppError::NotFound("Room not found".into()))?;

    tracing::info!(property_id = %tenant.property_id, room = %room.number, status = %room.status, "room status set");
    Ok(Json(json!({ "room": room })))
}

pub async fn delete_room(
    State(state): State<AppState>,
    tenant: axum::Extension<TenantContext>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Value>> {
    let sql = format!(
        "SELECT EXISTS (SELECT 1 FROM reservations WHERE room_id = $1 AND status IN {ROOM_HOLDING_STATUSES})"
    );
    let booked: bool = sqlx::query_scalar(&sql).bind(id).fetch_one(&state.db).await?;
    if booked {
        return Err(AppError::Conflict("Room has active reservations".into()));
    }

    soft_delete(&state.db, SoftDeletable::Rooms, tenant.property_id, id).await?;
    Ok(Json(json!({ "success": true })))
}
