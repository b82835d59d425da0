use axum::{
    extract::{Path, Query, State},
    Json,
};
use rust_decimal::Decimal;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::middleware::TenantContext;
use crate::models::*;
use crate::services::folio::{self, lock_reservation, write_folio, Folio};
use crate::services::{inventory, pricing};
use crate::AppState;

pub async fn list_charges(
    State(state): State<AppState>,
    tenant: axum::Extension<TenantContext>,
    Query(q): Query<FolioQuery>,
) -> AppResult<Json<Value>> {
    let charges: Vec<Charge> = sqlx::query_as(
        r#"SELECT * FROM charges
        WHERE property_id = $1
          AND ($2::uuid IS NULL OR reservation_id = $2)
          AND ($3::date IS NULL OR created_at::date >= $3)
          AND ($4::date IS NULL OR created_at::date <= $4)
        ORDER BY created_at DESC
        LIMIT 500"#,
    )
    .bind(tenant.property_id)
    .bind(q.reservation_id)
    .bind(q.from)
    .bind(q.to)
    .fetch_all(&state.db)
    .await?;

    let total: Decimal = charges.iter().map(|c| c.total).sum();
    Ok(Json(json!({ "charges": charges, "total": total })))
}

/// What a charge line bills for, resolved from the catalogue or the request.
struct LineSource {
    description: String,
    unit_price: Decimal,
    taxable: bool,
}

pub async fn create_charge(
    State(state): State<AppState>,
    tenant: axum::Extension<TenantContext>,
    Json(body): Json<CreateChargeRequest>,
) -> AppResult<Json<Value>> {
    if body.product_id.is_some() && body.concept_id.is_some() {
        return Err(AppError::BadRequest("A charge references a product or a concept, not both".into()));
    }
    let quantity = body.quantity.unwrap_or(1);
    let property_id = tenant.property_id;

    let mut tx = state.db.begin().await?;

    let reservation = lock_reservation(&mut tx, property_id, body.reservation_id).await?;
    let status = reservation.status()?;
    if !status.accepts_charges() {
        return Err(AppError::InvalidTransition {
            from: status.as_str().to_string(),
            action: "charge",
        });
    }

    let source = if let Some(product_id) = body.product_id {
        let product: Product = sqlx::query_as(
            "SELECT * FROM products WHERE id = $1 AND property_id = $2 AND deleted_at IS NULL",
        )
        .bind(product_id)
        .bind(property_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Product not found".into()))?;
        LineSource {
            description: body.description.clone().unwrap_or(product.name),
            unit_price: body.unit_price.unwrap_or(product.sale_price),
            taxable: true,
        }
    } else if let Some(concept_id) = body.concept_id {
        let concept: ChargeConcept = sqlx::query_as(
            "SELECT * FROM charge_concepts WHERE id = $1 AND property_id = $2 AND is_active",
        )
        .bind(concept_id)
        .bind(property_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Charge concept not found".into()))?;
        LineSource {
            description: body.description.clone().unwrap_or(concept.name),
            unit_price: body.unit_price.unwrap_or(concept.default_price),
            taxable: concept.taxable,
        }
    } else {
        let description = body
            .description
            .clone()
            .filter(|d| !d.trim().is_empty())
            .ok_or_else(|| AppError::BadRequest("Description required".into()))?;
        let unit_price = body
            .unit_price
            .ok_or_else(|| AppError::BadRequest("Unit price required".into()))?;
        LineSource {
            description,
            unit_price,
            taxable: true,
        }
    };

    let tax_rate = if source.taxable {
        let rate: Decimal = sqlx::query_scalar("SELECT tax_rate FROM properties WHERE id = $1")
            .bind(property_id)
            .fetch_optional(&mut *tx)
            .await?
            .unwrap_or(state.config.billing.default_tax_rate);
        Some(rate)
    } else {
        None
    };
    let amounts = pricing::price_line(quantity, source.unit_price, tax_rate)?;

    let charge: Charge = sqlx::query_as(
        r#"INSERT INTO charges (id, property_id, reservation_id, product_id, concept_id, description,
            quantity, unit_price, subtotal, tax, total, notes)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12) RETURNING *"#,
    )
    .bind(Uuid::new_v4())
    .bind(property_id)
    .bind(reservation.id)
    .bind(body.product_id)
    .bind(body.concept_id)
    .bind(source.description.trim())
    .bind(quantity)
    .bind(source.unit_price)
    .bind(amounts.subtotal)
    .bind(amounts.tax)
    .bind(amounts.total)
    .bind(&body.notes)
    .fetch_one(&mut *tx)
    .await?;

    let movement = match body.product_id {
        Some(product_id) => {
            inventory::sell_for_charge(&mut tx, property_id, product_id, quantity, &reservation.number).await?
        }
        None => None,
    };

    let balance_due = write_folio(&mut tx, reservation.id, Folio::of(&reservation).post_charge(amounts.total)).await?;

    tx.commit().await?;

    tracing::info!(
        %property_id,
        reservation = %reservation.number,
        amount = %amounts.total,
        %balance_due,
        "charge posted"
    );

    Ok(Json(json!({
        "charge": charge,
        "balanceDue": balance_due,
        "stockMovement": movement,
    })))
}

/// Removes a charge from the folio. Stock taken by a product sale stays taken.
pub async fn delete_charge(
    State(state): State<AppState>,
    tenant: axum::Extension<TenantContext>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Value>> {
    let reversal = folio::reverse_charge(&state.db, tenant.property_id, id).await?;

    tracing::info!(
        property_id = %tenant.property_id,
        reservation = %reversal.reservation.number,
        amount = %reversal.line.total,
        "charge reversed"
    );
    Ok(Json(json!({ "success": true, "balanceDue": reversal.balance_due })))
}
