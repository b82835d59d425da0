use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::middleware::TenantContext;
use crate::models::*;
use crate::services::pricing;
use crate::AppState;

fn validate_expense(body: &ExpenseRequest) -> AppResult<()> {
    if body.category.trim().is_empty() || body.concept.trim().is_empty() {
        return Err(AppError::BadRequest("Category and concept are required".into()));
    }
    if body.amount <= Decimal::ZERO {
        return Err(AppError::BadRequest("Expense amount must be positive".into()));
    }
    pricing::ensure_amount(body.amount, "Expense amount")?;
    Ok(())
}

/// Adds up per-category spend into the period total.
fn period_total(categories: &[CategoryTotal]) -> AppResult<Decimal> {
    categories
        .iter()
        .try_fold(Decimal::ZERO, |acc, c| pricing::add_amounts(acc, c.total, "Expense total"))
}

pub async fn list_expenses(
    State(state): State<AppState>,
    tenant: axum::Extension<TenantContext>,
    Query(q): Query<ExpenseQuery>,
) -> AppResult<Json<Value>> {
    let expenses: Vec<Expense> = sqlx::query_as(
        r#"SELECT * FROM expenses
        WHERE property_id = $1
          AND ($2::text IS NULL OR category = $2)
          AND ($3::date IS NULL OR spent_on >= $3)
          AND ($4::date IS NULL OR spent_on <= $4)
          AND ($5::text IS NULL OR method = $5)
        ORDER BY spent_on DESC, created_at DESC
        LIMIT 500"#,
    )
    .bind(tenant.property_id)
    .bind(q.category.as_deref().map(str::trim).filter(|c| !c.is_empty()))
    .bind(q.from)
    .bind(q.to)
    .bind(q.method.map(PaymentMethod::as_str))
    .fetch_all(&state.db)
    .await?;

    let total: Decimal = expenses.iter().map(|e| e.amount).sum();
    Ok(Json(json!({ "expenses": expenses, "total": total })))
}

pub async fn list_categories(
    State(state): State<AppState>,
    tenant: axum::Extension<TenantContext>,
) -> AppResult<Json<Value>> {
    let categories: Vec<String> =
        sqlx::query_scalar("SELECT DISTINCT category FROM expenses WHERE property_id = $1 ORDER BY category")
            .bind(tenant.property_id)
            .fetch_all(&state.db)
            .await?;

    Ok(Json(json!({ "categories": categories })))
}

#[derive(Debug, Deserialize)]
pub struct PeriodQuery {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

pub async fn expense_summary(
    State(state): State<AppState>,
    tenant: axum::Extension<TenantContext>,
    Query(q): Query<PeriodQuery>,
) -> AppResult<Json<Value>> {
    let categories: Vec<CategoryTotal> = sqlx::query_as(
        r#"SELECT category, COUNT(*)::bigint AS count, SUM(amount) AS total
        FROM expenses
        WHERE property_id = $1
          AND ($2::date IS NULL OR spent_on >= $2)
          AND ($3::date IS NULL OR spent_on <= $3)
        GROUP BY category
        ORDER BY total DESC"#,
    )
    .bind(tenant.property_id)
    .bind(q.from)
    .bind(q.to)
    .fetch_all(&state.db)
    .await?;

    let total = period_total(&categories)?;
    Ok(Json(json!({ "byCategory": categories, "total": total })))
}

pub async fn get_expense(
    State(state): State<AppState>,
    tenant: axum::Extension<TenantContext>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Value>> {
    let expense: Expense = sqlx::query_as("SELECT * FROM expenses WHERE id = $1 AND property_id = $2")
        .bind(id)
        .bind(tenant.property_id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Expense not found".into()))?;

    Ok(Json(json!({ "expense": expense })))
}

pub async fn create_expense(
    State(state): State<AppState>,
    tenant: axum::Extension<TenantContext>,
    Json(body): Json<ExpenseRequest>,
) -> AppResult<Json<Value>> {
    validate_expense(&body)?;

    let expense: Expense = sqlx::query_as(
        r#"INSERT INTO expenses (id, property_id, category, concept, description, amount, spent_on, method,
            supplier_name, invoice_number, notes)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) RETURNING *"#,
    )
    .bind(Uuid::new_v4())
    .bind(tenant.property_id)
    .bind(body.category.trim())
    .bind(body.concept.trim())
    .bind(&body.description)
    .bind(body.amount)
    .bind(body.spent_on.unwrap_or_else(|| Utc::now().date_naive()))
    .bind(body.method.unwrap_or(PaymentMethod::Cash).as_str())
    .bind(&body.supplier_name)
    .bind(&body.invoice_number)
    .bind(&body.notes)
    .fetch_one(&state.db)
    .await?;

    tracing::info!(property_id = %tenant.property_id, category = %expense.category, amount = %expense.amount, "expense recorded");
    Ok(Json(json!({ "expense": expense })))
}

pub async fn update_expense(
    State(state): State<AppState>,
    tenant: axum::Extension<TenantContext>,
    Path(id): Path<Uuid>,
    Json(body): Json<ExpenseRequest>,
) -> AppResult<Json<Value>> {
    validate_expense(&body)?;

    let expense: Expense = sqlx::query_as(
        r#"UPDATE expenses SET category = $3, concept = $4, description = $5, amount = $6,
            spent_on = COALESCE($7, spent_on), method = COALESCE($8, method), supplier_name = $9,
            invoice_number = $10, notes = $11
        WHERE id = $1 AND property_id = $2 RETURNING *"#,
    )
    .bind(id)
    .bind(tenant.property_id)
    .bind(body.category.trim())
    .bind(body.concept.trim())
    .bind(&body.description)
    .bind(body.amount)
    .bind(body.spent_on)
    .bind(body.method.map(PaymentMethod::as_str))
    .bind(&body.supplier_name)
    .bind(&body.invoice_number)
    .bind(&body.notes)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| AppError::NotFound("Expense not found".into()))?;

    Ok(Json(json!({ "expense": expense })))
}

pub async fn delete_expense(
    State(state): State<AppState>,
    tenant: axum::Extension<TenantContext>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Value>> {
    let result = sqlx::query("DELETE FROM expenses WHERE id = $1 AND property_id = $2")
        .bind(id)
        .bind(tenant.property_id)
        .execute(&state.db)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Expense not found".into()));
    }
    Ok(Json(json!({ "success": true })))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expense(category: &str, amount: &str) -> ExpenseRequest {
        ExpenseRequest {
            category: category.into(),
            concept: "Detergent".into(),
            description: None,
            amount: amount.parse().unwrap(),
            spent_on: None,
            method: None,
            supplier_name: None,
            invoice_number: None,
            notes: None,
        }
    }

    #[test]
    fn expenses_need_a_category_and_a_positive_amount() {
        assert!(validate_expense(&expense("Cleaning", "120.50")).is_ok());
        assert!(validate_expense(&expense("  ", "120.50")).is_err());
        assert!(validate_expense(&expense("Cleaning", "0")).is_err());
        assert!(validate_expense(&expense("Cleaning", "-4")).is_err());
        assert!(validate_expense(&expense("Cleaning", "10000000000")).is_err());
    }

    #[test]
    fn summary_total_adds_every_category() {
        let categories = vec![
            CategoryTotal { category: "Cleaning".into(), count: 3, total: "310.00".parse().unwrap() },
            CategoryTotal { category: "Utilities".into(), count: 1, total: "1200.40".parse().unwrap() },
        ];
        assert_eq!(period_total(&categories).unwrap(), "1510.40".parse::<Decimal>().unwrap());
        assert_eq!(period_total(&[]).unwrap(), Decimal::ZERO);
    }
}
