use axum::{extract::State, Json};
use rust_decimal::Decimal;
use serde_json::{json, Value};

use crate::error::{AppError, AppResult};
use crate::middleware::TenantContext;
use crate::models::*;
use crate::services::access_gate;
use crate::AppState;

pub async fn get_property(
    State(state): State<AppState>,
    tenant: axum::Extension<TenantContext>,
) -> AppResult<Json<Value>> {
    let property: Property = sqlx::query_as("SELECT * FROM properties WHERE id = $1")
        .bind(tenant.property_id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Property not found".into()))?;

    Ok(Json(json!({ "property": property })))
}

pub async fn update_property(
    State(state): State<AppState>,
    tenant: axum::Extension<TenantContext>,
    Json(body): Json<UpdatePropertyRequest>,
) -> AppResult<Json<Value>> {
    if let Some(rate) = body.tax_rate {
        if rate.is_sign_negative() || rate >= Decimal::ONE {
            return Err(AppError::BadRequest("Tax rate must be a fraction between 0 and 1".into()));
        }
    }
    if matches!(body.stars, Some(s) if !(1..=5).contains(&s)) {
        return Err(AppError::BadRequest("Stars must be between 1 and 5".into()));
    }

    let property: Property = sqlx::query_as(
        r#"UPDATE properties SET
            name = COALESCE($2, name),
            legal_name = COALESCE($3, legal_name),
            tax_id = COALESCE($4, tax_id),
            address = COALESCE($5, address),
            city = COALESCE($6, city),
            region = COALESCE($7, region),
            country = COALESCE($8, country),
            phone = COALESCE($9, phone),
            email = COALESCE($10, email),
            check_in_time = COALESCE($11, check_in_time),
            check_out_time = COALESCE($12, check_out_time),
            stars = COALESCE($13, stars),
            tax_rate = COALESCE($14, tax_rate)
        WHERE id = $1 RETURNING *"#,
    )
    .bind(tenant.property_id)
    .bind(body.name.as_deref().map(str::trim))
    .bind(&body.legal_name)
    .bind(&body.tax_id)
    .bind(&body.address)
    .bind(&body.city)
    .bind(&body.region)
    .bind(&body.country)
    .bind(&body.phone)
    .bind(&body.email)
    .bind(&body.check_in_time)
    .bind(&body.check_out_time)
    .bind(body.stars)
    .bind(body.tax_rate)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| AppError::NotFound("Property not found".into()))?;

    access_gate::invalidate(&state.db, &state.cache, tenant.account_id, Some(tenant.property_id)).await;
    Ok(Json(json!({ "property": property })))
}
