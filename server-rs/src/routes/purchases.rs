use axum::{
    extract::{Path, State},
    Json,
};
use chrono::Utc;
use rust_decimal::Decimal;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::middleware::TenantContext;
use crate::models::*;
use crate::services::{inventory, pricing};
use crate::AppState;

pub async fn list_purchases(
    State(state): State<AppState>,
    tenant: axum::Extension<TenantContext>,
) -> AppResult<Json<Value>> {
    let rows: Vec<(Uuid, Option<Uuid>, Option<String>, chrono::NaiveDate, Option<String>, Decimal, i64)> =
        sqlx::query_as(
            r#"SELECT p.id, p.supplier_id, s.name, p.purchased_on, p.invoice_number, p.total,
                (SELECT COUNT(*) FROM purchase_lines l WHERE l.purchase_id = p.id)::bigint
            FROM purchases p
            LEFT JOIN suppliers s ON s.id = p.supplier_id
            WHERE p.property_id = $1
            ORDER BY p.purchased_on DESC, p.created_at DESC"#,
        )
        .bind(tenant.property_id)
        .fetch_all(&state.db)
        .await?;

    let purchases: Vec<Value> = rows
        .iter()
        .map(|(id, supplier_id, supplier_name, purchased_on, invoice, total, lines)| {
            json!({
                "id": id,
                "supplierId": supplier_id,
                "supplierName": supplier_name,
                "purchasedOn": purchased_on,
                "invoiceNumber": invoice,
                "total": total,
                "lineCount": lines,
            })
        })
        .collect();

    Ok(Json(json!({ "purchases": purchases })))
}

pub async fn get_purchase(
    State(state): State<AppState>,
    tenant: axum::Extension<TenantContext>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Value>> {
    let purchase: Purchase = sqlx::query_as("SELECT * FROM purchases WHERE id = $1 AND property_id = $2")
        .bind(id)
        .bind(tenant.property_id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Purchase not found".into()))?;

    let lines: Vec<PurchaseLine> = sqlx::query_as("SELECT * FROM purchase_lines WHERE purchase_id = $1")
        .bind(id)
        .fetch_all(&state.db)
        .await?;

    Ok(Json(json!({ "purchase": purchase, "lines": lines })))
}

fn validate_lines(lines: &[PurchaseLineRequest]) -> AppResult<()> {
    if lines.is_empty() {
        return Err(AppError::BadRequest("A purchase needs at least one line".into()));
    }
    for line in lines {
        if line.quantity < 1 {
            return Err(AppError::BadRequest("Line quantity must be at least 1".into()));
        }
        if line.unit_cost < Decimal::ZERO {
            return Err(AppError::BadRequest("Unit cost cannot be negative".into()));
        }
    }
    Ok(())
}

/// Records a supplier invoice and receives every line into stock in one
/// transaction.
pub async fn create_purchase(
    State(state): State<AppState>,
    tenant: axum::Extension<TenantContext>,
    Json(body): Json<CreatePurchaseRequest>,
) -> AppResult<Json<Value>> {
    validate_lines(&body.lines)?;
    let tax = pricing::round_money(body.tax.unwrap_or(Decimal::ZERO));
    if tax < Decimal::ZERO {
        return Err(AppError::BadRequest("Tax cannot be negative".into()));
    }
    pricing::ensure_amount(tax, "Purchase tax")?;
    let property_id = tenant.property_id;

    let mut tx = state.db.begin().await?;

    if let Some(supplier_id) = body.supplier_id {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM suppliers WHERE id = $1 AND property_id = $2 AND deleted_at IS NULL)",
        )
        .bind(supplier_id)
        .bind(property_id)
        .fetch_one(&mut *tx)
        .await?;
        if !exists {
            return Err(AppError::NotFound("Supplier not found".into()));
        }
    }

    let purchase_id = Uuid::new_v4();
    sqlx::query(
        r#"INSERT INTO purchases (id, property_id, supplier_id, purchased_on, invoice_number, notes)
        VALUES ($1, $2, $3, $4, $5, $6)"#,
    )
    .bind(purchase_id)
    .bind(property_id)
    .bind(body.supplier_id)
    .bind(body.purchased_on.unwrap_or_else(|| Utc::now().date_naive()))
    .bind(&body.invoice_number)
    .bind(&body.notes)
    .execute(&mut *tx)
    .await?;

    let reference = body
        .invoice_number
        .clone()
        .unwrap_or_else(|| format!("Purchase {purchase_id}"));

    let mut subtotal = Decimal::ZERO;
    let mut lines = Vec::with_capacity(body.lines.len());
    for line in &body.lines {
        let line_subtotal = pricing::price_line(line.quantity, line.unit_cost, None)?.subtotal;

        inventory::receive_purchase_line(
            &mut tx,
            property_id,
            line.product_id,
            line.quantity,
            line.unit_cost,
            &reference,
        )
        .await?;

        let row: PurchaseLine = sqlx::query_as(
            r#"INSERT INTO purchase_lines (id, purchase_id, product_id, quantity, unit_cost, subtotal)
            VALUES ($1, $2, $3, $4, $5, $6) RETURNING *"#,
        )
        .bind(Uuid::new_v4())
        .bind(purchase_id)
        .bind(line.product_id)
        .bind(line.quantity)
        .bind(line.unit_cost)
        .bind(line_subtotal)
        .fetch_one(&mut *tx)
        .await?;

        subtotal = pricing::add_amounts(subtotal, line_subtotal, "Purchase subtotal")?;
        lines.push(row);
    }

    let purchase: Purchase = sqlx::query_as(
        "UPDATE purchases SET subtotal = $2, tax = $3, total = $4 WHERE id = $1 RETURNING *",
    )
    .bind(purchase_id)
    .bind(subtotal)
    .bind(tax)
    .bind(pricing::add_amounts(subtotal, tax, "Purchase total")?)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    tracing::info!(%property_id, %purchase_id, lines = lines.len(), total = %purchase.total, "purchase received");
    Ok(Json(json!({ "purchase": purchase, "lines": lines })))
}

/// Removes a purchase and its lines. Stock already received is kept.
pub async fn delete_purchase(
    State(state): State<AppState>,
    tenant: axum::Extension<TenantContext>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Value>> {
    let mut tx = state.db.begin().await?;

    sqlx::query("DELETE FROM purchase_lines WHERE purchase_id = $1 AND purchase_id IN (SELECT id FROM purchases WHERE property_id = $2)")
        .bind(id)
        .bind(tenant.property_id)
        .execute(&mut *tx)
        .await?;

    let result = sqlx::query("DELETE FROM purchases WHERE id = $1 AND property_id = $2")
        .bind(id)
        .bind(tenant.property_id)
        .execute(&mut *tx)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Purchase not found".into()));
    }

    tx.commit().await?;
    Ok(Json(json!({ "success": true })))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(quantity: i32, cost: &str) -> PurchaseLineRequest {
        PurchaseLineRequest {
            product_id: Uuid::new_v4(),
            quantity,
            unit_cost: cost.parse().unwrap(),
        }
    }

    #[test]
    fn purchases_need_positive_lines() {
        assert!(validate_lines(&[]).is_err());
        assert!(validate_lines(&[line(0, "10")]).is_err());
        assert!(validate_lines(&[line(2, "-1")]).is_err());
        assert!(validate_lines(&[line(2, "12.50"), line(1, "0")]).is_ok());
    }
}
