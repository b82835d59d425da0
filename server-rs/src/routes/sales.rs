use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{Datelike, Utc};
use rust_decimal::Decimal;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::db;
use crate::error::{AppError, AppResult};
use crate::middleware::TenantContext;
use crate::models::*;
use crate::services::inventory;
use crate::services::pricing::{self, LineAmounts};
use crate::AppState;

fn validate_lines(lines: &[SaleLineRequest]) -> AppResult<()> {
    if lines.is_empty() {
        return Err(AppError::BadRequest("A sale needs at least one line".into()));
    }
    for line in lines {
        if line.quantity < 1 {
            return Err(AppError::BadRequest("Line quantity must be at least 1".into()));
        }
        if line.unit_price.is_some_and(|p| p < Decimal::ZERO) {
            return Err(AppError::BadRequest("Unit price cannot be negative".into()));
        }
    }
    Ok(())
}

/// Sums priced lines into the ticket's totals.
fn sale_totals(lines: &[LineAmounts]) -> AppResult<LineAmounts> {
    lines.iter().try_fold(
        LineAmounts {
            subtotal: Decimal::ZERO,
            tax: Decimal::ZERO,
            total: Decimal::ZERO,
        },
        |acc, line| {
            Ok(LineAmounts {
                subtotal: pricing::add_amounts(acc.subtotal, line.subtotal, "Sale subtotal")?,
                tax: pricing::add_amounts(acc.tax, line.tax, "Sale tax")?,
                total: pricing::add_amounts(acc.total, line.total, "Sale total")?,
            })
        },
    )
}

pub async fn list_sales(
    State(state): State<AppState>,
    tenant: axum::Extension<TenantContext>,
    Query(q): Query<SaleQuery>,
) -> AppResult<Json<Value>> {
    let sales: Vec<Sale> = sqlx::query_as(
        r#"SELECT * FROM sales
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

    let total: Decimal = sales.iter().map(|s| s.total).sum();
    Ok(Json(json!({ "sales": sales, "total": total })))
}

pub async fn get_sale(
    State(state): State<AppState>,
    tenant: axum::Extension<TenantContext>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Value>> {
    let sale: Sale = sqlx::query_as("SELECT * FROM sales WHERE id = $1 AND property_id = $2")
        .bind(id)
        .bind(tenant.property_id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Sale not found".into()))?;

    let lines: Vec<SaleLine> = sqlx::query_as("SELECT * FROM sale_lines WHERE sale_id = $1")
        .bind(id)
        .fetch_all(&state.db)
        .await?;

    Ok(Json(json!({ "sale": sale, "lines": lines })))
}

/// Rings up a counter sale. Every line must be in stock; a shortage on any
/// line rolls the whole ticket back.
pub async fn create_sale(
    State(state): State<AppState>,
    tenant: axum::Extension<TenantContext>,
    Json(body): Json<CreateSaleRequest>,
) -> AppResult<Json<Value>> {
    validate_lines(&body.lines)?;
    let property_id = tenant.property_id;

    let mut tx = state.db.begin().await?;

    if let Some(reservation_id) = body.reservation_id {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM reservations WHERE id = $1 AND property_id = $2)",
        )
        .bind(reservation_id)
        .bind(property_id)
        .fetch_one(&mut *tx)
        .await?;
        if !exists {
            return Err(AppError::NotFound("Reservation not found".into()));
        }
    }

    let tax_rate: Decimal = sqlx::query_scalar("SELECT tax_rate FROM properties WHERE id = $1")
        .bind(property_id)
        .fetch_optional(&mut *tx)
        .await?
        .unwrap_or(state.config.billing.default_tax_rate);

    let number = db::next_document_number(&mut tx, property_id, "SAL", Utc::now().year(), 5).await?;
    let sale_id = Uuid::new_v4();
    sqlx::query(
        r#"INSERT INTO sales (id, property_id, number, reservation_id, method, subtotal, tax, total, notes)
        VALUES ($1, $2, $3, $4, $5, 0, 0, 0, $6)"#,
    )
    .bind(sale_id)
    .bind(property_id)
    .bind(&number)
    .bind(body.reservation_id)
    .bind(body.method.unwrap_or(PaymentMethod::Cash).as_str())
    .bind(&body.notes)
    .execute(&mut *tx)
    .await?;

    let mut priced = Vec::with_capacity(body.lines.len());
    let mut lines = Vec::with_capacity(body.lines.len());
    for line in &body.lines {
        let product: Product = sqlx::query_as(
            "SELECT * FROM products WHERE id = $1 AND property_id = $2 AND deleted_at IS NULL",
        )
        .bind(line.product_id)
        .bind(property_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Product not found".into()))?;

        let unit_price = line.unit_price.unwrap_or(product.sale_price);
        let amounts = pricing::price_line(line.quantity, unit_price, Some(tax_rate))?;

        inventory::record_movement(
            &mut tx,
            property_id,
            product.id,
            MovementKind::Sale,
            line.quantity,
            Some(&number),
            None,
        )
        .await?;

        let row: SaleLine = sqlx::query_as(
            r#"INSERT INTO sale_lines (id, sale_id, product_id, quantity, unit_price, subtotal)
            VALUES ($1, $2, $3, $4, $5, $6) RETURNING *"#,
        )
        .bind(Uuid::new_v4())
        .bind(sale_id)
        .bind(product.id)
        .bind(line.quantity)
        .bind(unit_price)
        .bind(amounts.subtotal)
        .fetch_one(&mut *tx)
        .await?;

        priced.push(amounts);
        lines.push(row);
    }

    let totals = sale_totals(&priced)?;
    let sale: Sale = sqlx::query_as(
        "UPDATE sales SET subtotal = $2, tax = $3, total = $4 WHERE id = $1 RETURNING *",
    )
    .bind(sale_id)
    .bind(totals.subtotal)
    .bind(totals.tax)
    .bind(totals.total)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    tracing::info!(%property_id, sale = %sale.number, lines = lines.len(), total = %sale.total, "counter sale recorded");
    Ok(Json(json!({ "sale": sale, "lines": lines })))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(quantity: i32, price: Option<&str>) -> SaleLineRequest {
        SaleLineRequest {
            product_id: Uuid::new_v4(),
            quantity,
            unit_price: price.map(|p| p.parse().unwrap()),
        }
    }

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn sales_need_positive_lines() {
        assert!(validate_lines(&[]).is_err());
        assert!(validate_lines(&[line(0, None)]).is_err());
        assert!(validate_lines(&[line(1, Some("-2"))]).is_err());
        assert!(validate_lines(&[line(2, None), line(1, Some("0"))]).is_ok());
    }

    #[test]
    fn ticket_totals_add_up_the_lines() {
        let rate = Some(dec("0.16"));
        let lines = vec![
            pricing::price_line(2, dec("25.00"), rate).unwrap(),
            pricing::price_line(1, dec("12.50"), rate).unwrap(),
        ];
        let totals = sale_totals(&lines).unwrap();
        assert_eq!(totals.subtotal, dec("62.50"));
        assert_eq!(totals.tax, lines[0].tax + lines[1].tax);
        assert_eq!(totals.total, totals.subtotal + totals.tax);
    }
}
