use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::middleware::TenantContext;
use crate::models::*;
use crate::AppState;

use super::reservations::SUMMARY_SELECT;
use super::{page, search_pattern, PaginationQuery};

fn validate(body: &ClientRequest) -> AppResult<ClientType> {
    let kind = body.client_type.unwrap_or(ClientType::Person);
    if body.first_name.trim().is_empty() {
        return Err(AppError::BadRequest("First name required".into()));
    }
    if kind == ClientType::Company && body.company_name.as_deref().map_or(true, |c| c.trim().is_empty()) {
        return Err(AppError::BadRequest("Company clients need a company name".into()));
    }
    if matches!(body.email.as_deref(), Some(e) if !e.is_empty() && !e.contains('@')) {
        return Err(AppError::BadRequest("Invalid email".into()));
    }
    Ok(kind)
}

pub async fn list_clients(
    State(state): State<AppState>,
    tenant: axum::Extension<TenantContext>,
    Query(q): Query<ClientQuery>,
) -> AppResult<Json<Value>> {
    let (limit, offset) = page(q.limit, q.offset, 200);
    let pattern = search_pattern(q.search.as_deref());

    let clients: Vec<Client> = sqlx::query_as(
        r#"SELECT * FROM clients
        WHERE property_id = $1 AND deleted_at IS NULL
          AND ($2::text IS NULL OR first_name ILIKE $2 OR last_name ILIKE $2 OR company_name ILIKE $2
               OR email ILIKE $2 OR phone ILIKE $2 OR document_number ILIKE $2)
          AND ($3::bool IS NULL OR is_vip = $3)
          AND ($4::text IS NULL OR loyalty_tier = $4)
        ORDER BY last_name NULLS LAST, first_name
        LIMIT $5 OFFSET $6"#,
    )
    .bind(tenant.property_id)
    .bind(pattern)
    .bind(q.vip)
    .bind(&q.tier)
    .bind(limit)
    .bind(offset)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(json!({ "clients": clients, "limit": limit, "offset": offset })))
}

async fn fetch_client(db: &sqlx::PgPool, property_id: Uuid, id: Uuid) -> AppResult<Client> {
    sqlx::query_as("SELECT * FROM clients WHERE id = $1 AND property_id = $2 AND deleted_at IS NULL")
        .bind(id)
        .bind(property_id)
        .fetch_optional(db)
        .await?
        .ok_or_else(|| AppError::NotFound("Client not found".into()))
}

pub async fn get_client(
    State(state): State<AppState>,
    tenant: axum::Extension<TenantContext>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Value>> {
    let client = fetch_client(&state.db, tenant.property_id, id).await?;
    let display_name = client.display_name();
    Ok(Json(json!({ "client": client, "displayName": display_name })))
}

pub async fn create_client(
    State(state): State<AppState>,
    tenant: axum::Extension<TenantContext>,
    Json(body): Json<ClientRequest>,
) -> AppResult<Json<Value>> {
    let kind = validate(&body)?;

    let client: Client = sqlx::query_as(
        r#"INSERT INTO clients (id, property_id, client_type, first_name, last_name, company_name, tax_id,
            email, phone, document_type, document_number, nationality, address, is_vip, loyalty_tier, notes)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16) RETURNING *"#,
    )
    .bind(Uuid::new_v4())
    .bind(tenant.property_id)
    .bind(kind.as_str())
    .bind(body.first_name.trim())
    .bind(&body.last_name)
    .bind(&body.company_name)
    .bind(&body.tax_id)
    .bind(body.email.as_deref().map(str::to_lowercase))
    .bind(&body.phone)
    .bind(&body.document_type)
    .bind(&body.document_number)
    .bind(&body.nationality)
    .bind(&body.address)
    .bind(body.is_vip.unwrap_or(false))
    .bind(&body.loyalty_tier)
    .bind(&body.notes)
    .fetch_one(&state.db)
    .await?;

    Ok(Json(json!({ "client": client })))
}

pub async fn update_client(
    State(state): State<AppState>,
    tenant: axum::Extension<TenantContext>,
    Path(id): Path<Uuid>,
    Json(body): Json<ClientRequest>,
) -> AppResult<Json<Value>> {
    let kind = validate(&body)?;

    let client: Client = sqlx::query_as(
        r#"UPDATE clients SET client_type = $3, first_name = $4, last_name = $5, company_name = $6,
            tax_id = $7, email = $8, phone = $9, document_type = $10, document_number = $11,
            nationality = $12, address = $13, is_vip = COALESCE($14, is_vip),
            loyalty_tier = $15, notes = $16
        WHERE id = $1 AND property_id = $2 AND deleted_at IS NULL RETURNING *"#,
    )
    .bind(id)
    .bind(tenant.property_id)
    .bind(kind.as_str())
    .bind(body.first_name.trim())
    .bind(&body.last_name)
    .bind(&body.company_name)
    .bind(&body.tax_id)
    .bind(body.email.as_deref().map(str::to_lowercase))
    .bind(&body.phone)
    .bind(&body.document_type)
    .bind(&body.document_number)
    .bind(&body.nationality)
    .bind(&body.address)
    .bind(body.is_vip)
    .bind(&body.loyalty_tier)
    .bind(&body.notes)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| AppError::NotFound("Client not found".into()))?;

    Ok(Json(json!({ "client": client })))
}

pub async fn delete_client(
    State(state): State<AppState>,
    tenant: axum::Extension<TenantContext>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Value>> {
    let sql = format!(
        "SELECT EXISTS (SELECT 1 FROM reservations WHERE client_id = $1 AND status IN {ROOM_HOLDING_STATUSES})"
    );
    let active: bool = sqlx::query_scalar(&sql).bind(id).fetch_one(&state.db).await?;
    if active {
        return Err(AppError::Conflict("Client has active reservations".into()));
    }

    soft_delete(&state.db, SoftDeletable::Clients, tenant.property_id, id).await?;
    Ok(Json(json!({ "success": true })))
}

/// Stay history of a guest, newest first.
pub async fn client_reservations(
    State(state): State<AppState>,
    tenant: axum::Extension<TenantContext>,
    Path(id): Path<Uuid>,
    Query(p): Query<PaginationQuery>,
) -> AppResult<Json<Value>> {
    fetch_client(&state.db, tenant.property_id, id).await?;
    let (limit, offset) = page(p.limit, p.offset, 100);

    let sql = format!(
        "{SUMMARY_SELECT} WHERE res.property_id = $1 AND res.client_id = $2 \
         ORDER BY res.check_in DESC LIMIT $3 OFFSET $4"
    );
    let rows: Vec<ReservationSummary> = sqlx::query_as(&sql)
        .bind(tenant.property_id)
        .bind(id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&state.db)
        .await?;

    Ok(Json(json!({ "reservations": rows })))
}
