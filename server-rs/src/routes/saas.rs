//! Platform administration: plans, tenant accounts, their properties and
//! subscriptions. Every mutation that can change a gate decision drops the
//! cached snapshots it affects.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::models::*;
use crate::services::{access_gate, subscriptions};
use crate::AppState;

// Plans

pub async fn list_plans(State(state): State<AppState>) -> AppResult<Json<Value>> {
    let plans: Vec<Plan> = sqlx::query_as("SELECT * FROM plans ORDER BY monthly_price")
        .fetch_all(&state.db)
        .await?;
    Ok(Json(json!({ "plans": plans })))
}

fn validate_plan(body: &CreatePlanRequest) -> AppResult<()> {
    if body.name.trim().is_empty() {
        return Err(AppError::BadRequest("Plan name required".into()));
    }
    if body.monthly_price.is_sign_negative() {
        return Err(AppError::BadRequest("Price cannot be negative".into()));
    }
    Ok(())
}

pub async fn create_plan(
    State(state): State<AppState>,
    Json(body): Json<CreatePlanRequest>,
) -> AppResult<Json<Value>> {
    validate_plan(&body)?;

    let plan: Plan = sqlx::query_as(
        r#"INSERT INTO plans (id, name, monthly_price, max_properties, max_rooms_per_property)
        VALUES ($1, $2, $3, $4, $5) RETURNING *"#,
    )
    .bind(Uuid::new_v4())
    .bind(body.name.trim())
    .bind(body.monthly_price)
    .bind(body.max_properties.unwrap_or(1))
    .bind(body.max_rooms_per_property.unwrap_or(50))
    .fetch_one(&state.db)
    .await?;

    Ok(Json(json!({ "plan": plan })))
}

pub async fn update_plan(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<CreatePlanRequest>,
) -> AppResult<Json<Value>> {
    validate_plan(&body)?;

    let plan: Plan = sqlx::query_as(
        r#"UPDATE plans SET name = $2, monthly_price = $3,
            max_properties = COALESCE($4, max_properties),
            max_rooms_per_property = COALESCE($5, max_rooms_per_property)
        WHERE id = $1 RETURNING *"#,
    )
    .bind(id)
    .bind(body.name.trim())
    .bind(body.monthly_price)
    .bind(body.max_properties)
    .bind(body.max_rooms_per_property)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| AppError::NotFound("Plan not found".into()))?;

    Ok(Json(json!({ "plan": plan })))
}

// Accounts

pub async fn list_accounts(State(state): State<AppState>) -> AppResult<Json<Value>> {
    let rows: Vec<(Uuid, String, String, bool, chrono::DateTime<Utc>, i64)> = sqlx::query_as(
        r#"SELECT a.id, a.name, a.email, a.is_active, a.created_at,
            COUNT(p.id) FILTER (WHERE p.deleted_at IS NULL)::bigint AS property_count
        FROM accounts a LEFT JOIN properties p ON p.account_id = a.id
        GROUP BY a.id ORDER BY a.name"#,
    )
    .fetch_all(&state.db)
    .await?;

    let accounts: Vec<Value> = rows
        .iter()
        .map(|(id, name, email, active, created, count)| {
            json!({"id": id, "name": name, "email": email, "isActive": active, "createdAt": created, "propertyCount": count})
        })
        .collect();

    Ok(Json(json!({ "accounts": accounts })))
}

pub async fn create_account(
    State(state): State<AppState>,
    Json(body): Json<CreateAccountRequest>,
) -> AppResult<Json<Value>> {
    if body.name.trim().is_empty() || !body.email.contains('@') {
        return Err(AppError::BadRequest("Account name and a valid email are required".into()));
    }

    let account: Account = sqlx::query_as(
        "INSERT INTO accounts (id, name, email) VALUES ($1, $2, $3) RETURNING *",
    )
    .bind(Uuid::new_v4())
    .bind(body.name.trim())
    .bind(body.email.trim().to_lowercase())
    .fetch_one(&state.db)
    .await?;

    tracing::info!(account_id = %account.id, "tenant account created");
    Ok(Json(json!({ "account": account })))
}

pub async fn set_account_active(
    State(state): State<AppState>,
    admin: axum::Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(body): Json<SetActiveRequest>,
) -> AppResult<Json<Value>> {
    let account: Account = sqlx::query_as(
        "UPDATE accounts SET is_active = $2 WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(body.is_active)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| AppError::NotFound("Account not found".into()))?;

    access_gate::invalidate(&state.db, &state.cache, id, None).await;
    tracing::info!(admin_id = %admin.id, account_id = %id, active = body.is_active, "account activation changed");

    Ok(Json(json!({ "account": account })))
}

// Properties

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyListQuery {
    pub account_id: Option<Uuid>,
}

pub async fn list_properties(
    State(state): State<AppState>,
    Query(q): Query<PropertyListQuery>,
) -> AppResult<Json<Value>> {
    let properties: Vec<Property> = sqlx::query_as(
        r#"SELECT * FROM properties
        WHERE deleted_at IS NULL AND ($1::uuid IS NULL OR account_id = $1)
        ORDER BY name"#,
    )
    .bind(q.account_id)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(json!({ "properties": properties })))
}

pub async fn create_property(
    State(state): State<AppState>,
    Json(body): Json<CreatePropertyRequest>,
) -> AppResult<Json<Value>> {
    if body.name.trim().is_empty() {
        return Err(AppError::BadRequest("Property name required".into()));
    }
    let tax_rate = body.tax_rate.unwrap_or(state.config.billing.default_tax_rate);
    if tax_rate.is_sign_negative() || tax_rate >= rust_decimal::Decimal::ONE {
        return Err(AppError::BadRequest("Tax rate must be a fraction between 0 and 1".into()));
    }

    let property: Property = sqlx::query_as(
        r#"INSERT INTO properties (id, account_id, name, legal_name, tax_id, city, country, email, phone, tax_rate)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) RETURNING *"#,
    )
    .bind(Uuid::new_v4())
    .bind(body.account_id)
    .bind(body.name.trim())
    .bind(&body.legal_name)
    .bind(&body.tax_id)
    .bind(&body.city)
    .bind(&body.country)
    .bind(&body.email)
    .bind(&body.phone)
    .bind(tax_rate)
    .fetch_one(&state.db)
    .await?;

    tracing::info!(property_id = %property.id, account_id = %property.account_id, "property created");
    Ok(Json(json!({ "property": property })))
}

// Subscriptions

fn with_days_remaining(subscription: &Subscription, now: chrono::DateTime<Utc>) -> AppResult<Value> {
    let mut value = serde_json::to_value(subscription)
        .map_err(|e| AppError::Internal(format!("serialize subscription: {e}")))?;
    value["daysRemaining"] = json!(subscriptions::days_remaining(subscription.ends_at, now));
    Ok(value)
}

pub async fn list_subscriptions(
    State(state): State<AppState>,
    Query(q): Query<SubscriptionQuery>,
) -> AppResult<Json<Value>> {
    let rows: Vec<Subscription> = sqlx::query_as(
        r#"SELECT * FROM subscriptions
        WHERE ($1::uuid IS NULL OR account_id = $1)
          AND ($2::uuid IS NULL OR property_id = $2 OR property_id IS NULL)
          AND ($3::text IS NULL OR status = $3)
        ORDER BY ends_at DESC"#,
    )
    .bind(q.account_id)
    .bind(q.property_id)
    .bind(q.status.map(SubscriptionStatus::as_str))
    .fetch_all(&state.db)
    .await?;

    let now = Utc::now();
    let subscriptions = rows
        .iter()
        .map(|s| with_days_remaining(s, now))
        .collect::<AppResult<Vec<_>>>()?;

    Ok(Json(json!({ "subscriptions": subscriptions })))
}

pub async fn create_subscription(
    State(state): State<AppState>,
    admin: axum::Extension<AuthUser>,
    Json(body): Json<CreateSubscriptionRequest>,
) -> AppResult<Json<Value>> {
    let now = Utc::now();
    let days = body.days.unwrap_or(state.config.billing.default_subscription_days);
    let (starts_at, ends_at) = subscriptions::initial_window(body.starts_at, body.ends_at, days, now)?;

    if let Some(property_id) = body.property_id {
        let owner: Option<Uuid> = sqlx::query_scalar("SELECT account_id FROM properties WHERE id = $1")
            .bind(property_id)
            .fetch_optional(&state.db)
            .await?;
        if owner != Some(body.account_id) {
            return Err(AppError::BadRequest("Property does not belong to the account".into()));
        }
    }

    let subscription: Subscription = sqlx::query_as(
        r#"INSERT INTO subscriptions (id, account_id, property_id, plan_id, status, starts_at, ends_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING *"#,
    )
    .bind(Uuid::new_v4())
    .bind(body.account_id)
    .bind(body.property_id)
    .bind(body.plan_id)
    .bind(SubscriptionStatus::Active.as_str())
    .bind(starts_at)
    .bind(ends_at)
    .fetch_one(&state.db)
    .await?;

    access_gate::invalidate(&state.db, &state.cache, body.account_id, body.property_id).await;
    tracing::info!(admin_id = %admin.id, subscription_id = %subscription.id, ends_at = %subscription.ends_at, "subscription created");

    Ok(Json(json!({ "subscription": with_days_remaining(&subscription, now)? })))
}

pub async fn update_subscription(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateSubscriptionRequest>,
) -> AppResult<Json<Value>> {
    let subscription: Subscription = sqlx::query_as(
        r#"UPDATE subscriptions SET
            plan_id = COALESCE($2, plan_id),
            status = COALESCE($3, status),
            ends_at = COALESCE($4, ends_at),
            updated_at = NOW()
        WHERE id = $1 RETURNING *"#,
    )
    .bind(id)
    .bind(body.plan_id)
    .bind(body.status.map(SubscriptionStatus::as_str))
    .bind(body.ends_at)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| AppError::NotFound("Subscription not found".into()))?;

    access_gate::invalidate(&state.db, &state.cache, subscription.account_id, subscription.property_id).await;
    Ok(Json(json!({ "subscription": with_days_remaining(&subscription, Utc::now())? })))
}

pub async fn extend_subscription(
    State(state): State<AppState>,
    admin: axum::Extension<AuthUser>,
    Path(id): Path<Uuid>,
    body: Option<Json<ExtendSubscriptionRequest>>,
) -> AppResult<Json<Value>> {
    let days = body
        .and_then(|Json(b)| b.days)
        .unwrap_or(state.config.billing.default_subscription_days);
    let now = Utc::now();

    let mut tx = state.db.begin().await?;

    let current: Subscription = sqlx::query_as("SELECT * FROM subscriptions WHERE id = $1 FOR UPDATE")
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Subscription not found".into()))?;

    let ends_at = subscriptions::extended_end(current.ends_at, now, days)?;

    let subscription: Subscription = sqlx::query_as(
        "UPDATE subscriptions SET ends_at = $2, status = $3, updated_at = NOW() WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(ends_at)
    .bind(SubscriptionStatus::Active.as_str())
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    access_gate::invalidate(&state.db, &state.cache, subscription.account_id, subscription.property_id).await;
    tracing::info!(admin_id = %admin.id, subscription_id = %id, days, ends_at = %ends_at, "subscription extended");

    Ok(Json(json!({ "subscription": with_days_remaining(&subscription, now)? })))
}

pub async fn revoke_subscription(
    State(state): State<AppState>,
    admin: axum::Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Value>> {
    let subscription: Subscription = sqlx::query_as(
        "UPDATE subscriptions SET status = $2, updated_at = NOW() WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(SubscriptionStatus::Revoked.as_str())
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| AppError::NotFound("Subscription not found".into()))?;

    access_gate::invalidate(&state.db, &state.cache, subscription.account_id, subscription.property_id).await;
    tracing::info!(admin_id = %admin.id, subscription_id = %id, "subscription revoked");

    Ok(Json(json!({ "success": true })))
}
