use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{Datelike, Utc};
use rust_decimal::Decimal;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::db;
use crate::error::AppResult;
use crate::middleware::{AuthUser, TenantContext};
use crate::models::*;
use crate::services::folio::{self, lock_reservation, write_folio, Folio};
use crate::AppState;

pub async fn list_payments(
    State(state): State<AppState>,
    tenant: axum::Extension<TenantContext>,
    Query(q): Query<FolioQuery>,
) -> AppResult<Json<Value>> {
    let payments: Vec<Payment> = sqlx::query_as(
        r#"SELECT * FROM payments
        WHERE property_id = $1
          AND ($2::uuid IS NULL OR reservation_id = $2)
          AND ($3::date IS NULL OR paid_at::date >= $3)
          AND ($4::date IS NULL OR paid_at::date <= $4)
          AND ($5::text IS NULL OR method = $5)
        ORDER BY paid_at DESC
        LIMIT 500"#,
    )
    .bind(tenant.property_id)
    .bind(q.reservation_id)
    .bind(q.from)
    .bind(q.to)
    .bind(q.method.map(PaymentMethod::as_str))
    .fetch_all(&state.db)
    .await?;

    let total: Decimal = payments.iter().map(|p| p.amount).sum();
    Ok(Json(json!({ "payments": payments, "total": total })))
}

pub async fn create_payment(
    State(state): State<AppState>,
    tenant: axum::Extension<TenantContext>,
    user: axum::Extension<AuthUser>,
    Json(body): Json<CreatePaymentRequest>,
) -> AppResult<Json<Value>> {
    let property_id = tenant.property_id;
    let mut tx = state.db.begin().await?;

    let reservation = lock_reservation(&mut tx, property_id, body.reservation_id).await?;
    let folio = Folio::of(&reservation).post_payment(body.amount)?;

    let number = db::next_document_number(&mut tx, property_id, "PAY", Utc::now().year(), 5).await?;

    let payment: Payment = sqlx::query_as(
        r#"INSERT INTO payments (id, property_id, reservation_id, number, amount, method, reference, kind, notes)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) RETURNING *"#,
    )
    .bind(Uuid::new_v4())
    .bind(property_id)
    .bind(reservation.id)
    .bind(&number)
    .bind(body.amount)
    .bind(body.method.unwrap_or(PaymentMethod::Cash).as_str())
    .bind(&body.reference)
    .bind(body.kind.unwrap_or(PaymentKind::Payment).as_str())
    .bind(&body.notes)
    .fetch_one(&mut *tx)
    .await?;

    let balance_due = write_folio(&mut tx, reservation.id, folio).await?;

    tx.commit().await?;

    tracing::info!(
        %property_id,
        user_id = %user.id,
        reservation = %reservation.number,
        payment = %number,
        amount = %body.amount,
        %balance_due,
        "payment posted"
    );

    Ok(Json(json!({ "payment": payment, "balanceDue": balance_due })))
}

/// Refunds a payment by removing it from the folio. Manager only.
pub async fn delete_payment(
    State(state): State<AppState>,
    tenant: axum::Extension<TenantContext>,
    user: axum::Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Value>> {
    let reversal = folio::reverse_payment(&state.db, tenant.property_id, id).await?;

    tracing::info!(
        property_id = %tenant.property_id,
        user_id = %user.id,
        reservation = %reversal.reservation.number,
        payment = %reversal.line.number,
        amount = %reversal.line.amount,
        "payment refunded"
    );
    Ok(Json(json!({ "success": true, "balanceDue": reversal.balance_due })))
}
