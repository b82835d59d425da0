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
use crate::services::loans;
use crate::AppState;

fn validate_item(body: &LoanableItemRequest) -> AppResult<()> {
    if body.code.trim().is_empty() || body.name.trim().is_empty() {
        return Err(AppError::BadRequest("Code and name are required".into()));
    }
    if body.replacement_cost.is_some_and(|c| c < Decimal::ZERO) {
        return Err(AppError::BadRequest("Replacement cost cannot be negative".into()));
    }
    Ok(())
}

pub async fn list_items(
    State(state): State<AppState>,
    tenant: axum::Extension<TenantContext>,
) -> AppResult<Json<Value>> {
    let items: Vec<LoanableItem> =
        sqlx::query_as("SELECT * FROM loanable_items WHERE property_id = $1 ORDER BY name")
            .bind(tenant.property_id)
            .fetch_all(&state.db)
            .await?;

    Ok(Json(json!({ "items": items })))
}

pub async fn create_item(
    State(state): State<AppState>,
    tenant: axum::Extension<TenantContext>,
    Json(body): Json<LoanableItemRequest>,
) -> AppResult<Json<Value>> {
    validate_item(&body)?;

    let item: LoanableItem = sqlx::query_as(
        r#"INSERT INTO loanable_items (id, property_id, code, name, description, requires_return,
            replacement_cost, is_active)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING *"#,
    )
    .bind(Uuid::new_v4())
    .bind(tenant.property_id)
    .bind(body.code.trim())
    .bind(body.name.trim())
    .bind(&body.description)
    .bind(body.requires_return.unwrap_or(true))
    .bind(body.replacement_cost.unwrap_or(Decimal::ZERO))
    .bind(body.is_active.unwrap_or(true))
    .fetch_one(&state.db)
    .await?;

    Ok(Json(json!({ "item": item })))
}

pub async fn update_item(
    State(state): State<AppState>,
    tenant: axum::Extension<TenantContext>,
    Path(id): Path<Uuid>,
    Json(body): Json<LoanableItemRequest>,
) -> AppResult<Json<Value>> {
    validate_item(&body)?;

    let item: LoanableItem = sqlx::query_as(
        r#"UPDATE loanable_items SET code = $3, name = $4, description = $5,
            requires_return = COALESCE($6, requires_return),
            replacement_cost = COALESCE($7, replacement_cost),
            is_active = COALESCE($8, is_active)
        WHERE id = $1 AND property_id = $2 RETURNING *"#,
    )
    .bind(id)
    .bind(tenant.property_id)
    .bind(body.code.trim())
    .bind(body.name.trim())
    .bind(&body.description)
    .bind(body.requires_return)
    .bind(body.replacement_cost)
    .bind(body.is_active)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| AppError::NotFound("Loanable item not found".into()))?;

    Ok(Json(json!({ "item": item })))
}

pub async fn list_reservation_loans(
    State(state): State<AppState>,
    tenant: axum::Extension<TenantContext>,
    Path(reservation_id): Path<Uuid>,
) -> AppResult<Json<Value>> {
    let rows: Vec<(Uuid, String, String, i32, Option<i32>, Option<Uuid>, chrono::DateTime<chrono::Utc>, Option<chrono::DateTime<chrono::Utc>>)> =
        sqlx::query_as(
            r#"SELECT l.id, i.code, i.name, l.quantity, l.quantity_returned, l.charge_id, l.lent_at, l.returned_at
            FROM reservation_loans l
            JOIN loanable_items i ON i.id = l.item_id
            WHERE l.reservation_id = $1 AND l.property_id = $2
            ORDER BY l.lent_at"#,
        )
        .bind(reservation_id)
        .bind(tenant.property_id)
        .fetch_all(&state.db)
        .await?;

    let loans: Vec<Value> = rows
        .iter()
        .map(|(id, code, name, quantity, returned, charge_id, lent_at, returned_at)| {
            json!({
                "id": id,
                "itemCode": code,
                "itemName": name,
                "quantity": quantity,
                "quantityReturned": returned,
                "chargeId": charge_id,
                "lentAt": lent_at,
                "returnedAt": returned_at,
                "outstanding": returned_at.is_none(),
            })
        })
        .collect();

    Ok(Json(json!({ "loans": loans })))
}

pub async fn lend_item(
    State(state): State<AppState>,
    tenant: axum::Extension<TenantContext>,
    Path(reservation_id): Path<Uuid>,
    Json(body): Json<LendRequest>,
) -> AppResult<Json<Value>> {
    let loan = loans::lend(&state.db, tenant.property_id, reservation_id, &body).await?;
    Ok(Json(json!({ "loan": loan })))
}

pub async fn return_loan(
    State(state): State<AppState>,
    tenant: axum::Extension<TenantContext>,
    Path(id): Path<Uuid>,
    body: Option<Json<ReturnLoanRequest>>,
) -> AppResult<Json<Value>> {
    let body = body.map(|Json(b)| b).unwrap_or_default();
    let outcome = loans::return_loan(
        &state.db,
        tenant.property_id,
        id,
        &body,
        state.config.billing.default_tax_rate,
    )
    .await?;

    Ok(Json(json!({
        "loan": outcome.loan,
        "missing": outcome.missing,
        "charge": outcome.charge,
        "balanceDue": outcome.balance_due,
    })))
}

/// Drops a loan recorded by mistake. Returned loans are history and stay.
pub async fn delete_loan(
    State(state): State<AppState>,
    tenant: axum::Extension<TenantContext>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Value>> {
    let deleted: Option<bool> = sqlx::query_scalar(
        r#"DELETE FROM reservation_loans l
        WHERE l.id = $1 AND l.property_id = $2 AND l.returned_at IS NULL
        RETURNING TRUE"#,
    )
    .bind(id)
    .bind(tenant.property_id)
    .fetch_optional(&state.db)
    .await?;

    if deleted.is_none() {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM reservation_loans WHERE id = $1 AND property_id = $2)",
        )
        .bind(id)
        .bind(tenant.property_id)
        .fetch_one(&state.db)
        .await?;
        return Err(if exists {
            AppError::Conflict("A returned loan cannot be deleted".into())
        } else {
            AppError::NotFound("Loan not found".into())
        });
    }
    Ok(Json(json!({ "success": true })))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(code: &str, cost: Option<&str>) -> LoanableItemRequest {
        LoanableItemRequest {
            code: code.into(),
            name: "Hair dryer".into(),
            description: None,
            requires_return: None,
            replacement_cost: cost.map(|c| c.parse().unwrap()),
            is_active: None,
        }
    }

    #[test]
    fn items_need_a_code_and_a_sane_cost() {
        assert!(validate_item(&item("HD-1", Some("450"))).is_ok());
        assert!(validate_item(&item("HD-1", None)).is_ok());
        assert!(validate_item(&item(" ", None)).is_err());
        assert!(validate_item(&item("HD-1", Some("-1"))).is_err());
    }
}
