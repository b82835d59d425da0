use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::Utc;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::middleware::TenantContext;
use crate::models::*;
use crate::services::reservations;
use crate::AppState;

use super::{page, search_pattern};

/// Select list and joins producing `ReservationSummary` rows from `res`.
pub(crate) const SUMMARY_SELECT: &str = r#"SELECT res.id, res.number, res.client_id,
        CASE WHEN c.client_type = 'Company' AND c.company_name IS NOT NULL THEN c.company_name
             ELSE TRIM(c.first_name || ' ' || COALESCE(c.last_name, '')) END AS client_name,
        res.room_id, r.number AS room_number, rt.name AS room_type_name,
        res.check_in, res.check_out, res.nights, res.adults, res.children,
        res.total, res.balance_due, res.status
    FROM reservations res
    JOIN clients c ON c.id = res.client_id
    LEFT JOIN rooms r ON r.id = res.room_id
    LEFT JOIN room_types rt ON rt.id = res.room_type_id"#;

pub async fn list_reservations(
    State(state): State<AppState>,
    tenant: axum::Extension<TenantContext>,
    Query(q): Query<ReservationQuery>,
) -> AppResult<Json<Value>> {
    let (limit, offset) = page(q.limit, q.offset, 200);
    let pattern = search_pattern(q.search.as_deref());

    // from/to select stays overlapping the window
    let sql = format!(
        r#"{SUMMARY_SELECT}
        WHERE res.property_id = $1
          AND ($2::text IS NULL OR res.status = $2)
          AND ($3::uuid IS NULL OR res.client_id = $3)
          AND ($4::uuid IS NULL OR res.room_id = $4)
          AND ($5::date IS NULL OR res.check_out > $5)
          AND ($6::date IS NULL OR res.check_in <= $6)
          AND ($7::text IS NULL OR res.number ILIKE $7 OR c.first_name ILIKE $7
               OR c.last_name ILIKE $7 OR c.company_name ILIKE $7)
        ORDER BY res.check_in DESC, res.number DESC
        LIMIT $8 OFFSET $9"#
    );
    let rows: Vec<ReservationSummary> = sqlx::query_as(&sql)
        .bind(tenant.property_id)
        .bind(q.status.map(ReservationStatus::as_str))
        .bind(q.client_id)
        .bind(q.room_id)
        .bind(q.from)
        .bind(q.to)
        .bind(pattern)
        .bind(limit)
        .bind(offset)
        .fetch_all(&state.db)
        .await?;

    Ok(Json(json!({ "reservations": rows, "limit": limit, "offset": offset })))
}

pub async fn arrivals(
    State(state): State<AppState>,
    tenant: axum::Extension<TenantContext>,
) -> AppResult<Json<Value>> {
    let sql = format!(
        "{SUMMARY_SELECT} WHERE res.property_id = $1 AND res.check_in = $2 \
         AND res.status IN ('Pending', 'Confirmed') ORDER BY res.arrival_time NULLS LAST, r.number"
    );
    let rows: Vec<ReservationSummary> = sqlx::query_as(&sql)
        .bind(tenant.property_id)
        .bind(Utc::now().date_naive())
        .fetch_all(&state.db)
        .await?;

    Ok(Json(json!({ "arrivals": rows })))
}

pub async fn departures(
    State(state): State<AppState>,
    tenant: axum::Extension<TenantContext>,
) -> AppResult<Json<Value>> {
    let sql = format!(
        "{SUMMARY_SELECT} WHERE res.property_id = $1 AND res.check_out = $2 \
         AND res.status = 'CheckIn' ORDER BY r.number"
    );
    let rows: Vec<ReservationSummary> = sqlx::query_as(&sql)
        .bind(tenant.property_id)
        .bind(Utc::now().date_naive())
        .fetch_all(&state.db)
        .await?;

    Ok(Json(json!({ "departures": rows })))
}

pub async fn get_reservation(
    State(state): State<AppState>,
    tenant: axum::Extension<TenantContext>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Value>> {
    let reservation: Reservation = sqlx::query_as(
        "SELECT * FROM reservations WHERE id = $1 AND property_id = $2",
    )
    .bind(id)
    .bind(tenant.property_id)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| AppError::NotFound("Reservation not found".into()))?;

    let client: Option<Client> = sqlx::query_as("SELECT * FROM clients WHERE id = $1")
        .bind(reservation.client_id)
        .fetch_optional(&state.db)
        .await?;

    let charges: Vec<Charge> = sqlx::query_as(
        "SELECT * FROM charges WHERE reservation_id = $1 ORDER BY created_at",
    )
    .bind(id)
    .fetch_all(&state.db)
    .await?;

    let payments: Vec<Payment> = sqlx::query_as(
        "SELECT * FROM payments WHERE reservation_id = $1 ORDER BY paid_at",
    )
    .bind(id)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(json!({
        "reservation": reservation,
        "client": client,
        "charges": charges,
        "payments": payments,
    })))
}

pub async fn create_reservation(
    State(state): State<AppState>,
    tenant: axum::Extension<TenantContext>,
    Json(body): Json<CreateReservationRequest>,
) -> AppResult<Json<Value>> {
    let reservation = reservations::create(
        &state.db,
        tenant.property_id,
        state.config.billing.default_tax_rate,
        body,
    )
    .await?;
    Ok(Json(json!({ "reservation": reservation })))
}

pub async fn update_reservation(
    State(state): State<AppState>,
    tenant: axum::Extension<TenantContext>,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateReservationRequest>,
) -> AppResult<Json<Value>> {
    let reservation = reservations::update(
        &state.db,
        tenant.property_id,
        id,
        state.config.billing.default_tax_rate,
        body,
    )
    .await?;
    Ok(Json(json!({ "reservation": reservation })))
}

pub async fn confirm(
    State(state): State<AppState>,
    tenant: axum::Extension<TenantContext>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Value>> {
    let reservation = reservations::confirm(&state.db, tenant.property_id, id).await?;
    Ok(Json(json!({ "reservation": reservation })))
}

pub async fn check_in(
    State(state): State<AppState>,
    tenant: axum::Extension<TenantContext>,
    Path(id): Path<Uuid>,
    body: Option<Json<CheckInRequest>>,
) -> AppResult<Json<Value>> {
    let room_id = body.and_then(|Json(b)| b.room_id);
    let reservation = reservations::check_in(&state.db, tenant.property_id, id, room_id).await?;
    Ok(Json(json!({ "reservation": reservation })))
}

pub async fn check_out(
    State(state): State<AppState>,
    tenant: axum::Extension<TenantContext>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Value>> {
    let reservation = reservations::check_out(&state.db, tenant.property_id, id).await?;
    Ok(Json(json!({ "reservation": reservation })))
}

pub async fn cancel(
    State(state): State<AppState>,
    tenant: axum::Extension<TenantContext>,
    Path(id): Path<Uuid>,
    body: Option<Json<CancelRequest>>,
) -> AppResult<Json<Value>> {
    let reason = body.and_then(|Json(b)| b.reason);
    let reservation = reservations::cancel(
        &state.db,
        tenant.property_id,
        id,
        reason.as_deref(),
        state.config.billing.release_on_cancel,
    )
    .await?;
    Ok(Json(json!({ "reservation": reservation })))
}

pub async fn no_show(
    State(state): State<AppState>,
    tenant: axum::Extension<TenantContext>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Value>> {
    let reservation = reservations::no_show(
        &state.db,
        tenant.property_id,
        id,
        state.config.billing.release_on_cancel,
    )
    .await?;
    Ok(Json(json!({ "reservation": reservation })))
}
