use axum::{
    extract::{Path, Query, State},
    Json,
};
use rust_decimal::Decimal;
use serde_json::{json, Value};
use sqlx::PgConnection;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::middleware::TenantContext;
use crate::models::*;
use crate::services::housekeeping;
use crate::AppState;

pub async fn list_tasks(
    State(state): State<AppState>,
    tenant: axum::Extension<TenantContext>,
    Query(q): Query<MaintenanceQuery>,
) -> AppResult<Json<Value>> {
    let sql = format!(
        r#"SELECT * FROM maintenance_tasks
        WHERE property_id = $1
          AND ($2::text IS NULL OR status = $2)
          AND ($3::text IS NULL OR priority = $3)
          AND ($4::uuid IS NULL OR room_id = $4)
        ORDER BY reported_on DESC, {}"#,
        Priority::order_by("priority")
    );
    let tasks: Vec<MaintenanceTask> = sqlx::query_as(&sql)
        .bind(tenant.property_id)
        .bind(q.status.map(MaintenanceTaskStatus::as_str))
        .bind(q.priority.map(Priority::as_str))
        .bind(q.room_id)
        .fetch_all(&state.db)
        .await?;

    Ok(Json(json!({ "tasks": tasks })))
}

pub async fn open_tasks(
    State(state): State<AppState>,
    tenant: axum::Extension<TenantContext>,
) -> AppResult<Json<Value>> {
    let sql = format!(
        r#"SELECT * FROM maintenance_tasks
        WHERE property_id = $1 AND status IN ('Pending', 'InProgress')
        ORDER BY {}, reported_on"#,
        Priority::order_by("priority")
    );
    let tasks: Vec<MaintenanceTask> = sqlx::query_as(&sql)
        .bind(tenant.property_id)
        .fetch_all(&state.db)
        .await?;

    Ok(Json(json!({ "tasks": tasks })))
}

fn validate(body: &CreateMaintenanceRequest) -> AppResult<()> {
    if body.title.trim().is_empty() {
        return Err(AppError::BadRequest("Title required".into()));
    }
    if body.estimated_cost.is_some_and(|c| c < Decimal::ZERO) {
        return Err(AppError::BadRequest("Estimated cost cannot be negative".into()));
    }
    Ok(())
}

async fn ensure_room(conn: &mut PgConnection, property_id: Uuid, room_id: Uuid) -> AppResult<()> {
    let exists: bool = sqlx::query_scalar(
        "SELECT EXISTS (SELECT 1 FROM rooms WHERE id = $1 AND property_id = $2 AND deleted_at IS NULL)",
    )
    .bind(room_id)
    .bind(property_id)
    .fetch_one(conn)
    .await?;
    if !exists {
        return Err(AppError::NotFound("Room not found".into()));
    }
    Ok(())
}

pub async fn create_task(
    State(state): State<AppState>,
    tenant: axum::Extension<TenantContext>,
    Json(body): Json<CreateMaintenanceRequest>,
) -> AppResult<Json<Value>> {
    validate(&body)?;
    let priority = body.priority.unwrap_or(Priority::Normal);

    let mut tx = state.db.begin().await?;

    if let Some(room_id) = body.room_id {
        ensure_room(&mut tx, tenant.property_id, room_id).await?;
    }

    let task: MaintenanceTask = sqlx::query_as(
        r#"INSERT INTO maintenance_tasks (id, property_id, room_id, title, description, kind, priority, status,
            assignee_id, assignee_name, scheduled_for, estimated_cost, notes)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13) RETURNING *"#,
    )
    .bind(Uuid::new_v4())
    .bind(tenant.property_id)
    .bind(body.room_id)
    .bind(body.title.trim())
    .bind(&body.description)
    .bind(body.kind.unwrap_or(MaintenanceKind::Corrective).as_str())
    .bind(priority.as_str())
    .bind(MaintenanceTaskStatus::Pending.as_str())
    .bind(body.assignee_id)
    .bind(&body.assignee_name)
    .bind(body.scheduled_for)
    .bind(body.estimated_cost)
    .bind(&body.notes)
    .fetch_one(&mut *tx)
    .await?;

    if let (Some(room_id), Some(flag)) = (body.room_id, housekeeping::maintenance_on_open(priority)) {
        housekeeping::set_maintenance_status(&mut tx, tenant.property_id, room_id, flag).await?;
    }

    tx.commit().await?;

    tracing::info!(property_id = %tenant.property_id, task_id = %task.id, %priority, "maintenance task opened");
    Ok(Json(json!({ "task": task })))
}

pub async fn update_task(
    State(state): State<AppState>,
    tenant: axum::Extension<TenantContext>,
    Path(id): Path<Uuid>,
    Json(body): Json<CreateMaintenanceRequest>,
) -> AppResult<Json<Value>> {
    validate(&body)?;

    let mut tx = state.db.begin().await?;

    if let Some(room_id) = body.room_id {
        ensure_room(&mut tx, tenant.property_id, room_id).await?;
    }

    let task: MaintenanceTask = sqlx::query_as(
        r#"UPDATE maintenance_tasks SET
            room_id = COALESCE($3, room_id),
            title = $4,
            description = COALESCE($5, description),
            kind = COALESCE($6, kind),
            priority = COALESCE($7, priority),
            assignee_id = COALESCE($8, assignee_id),
            assignee_name = COALESCE($9, assignee_name),
            scheduled_for = COALESCE($10, scheduled_for),
            estimated_cost = COALESCE($11, estimated_cost),
            notes = COALESCE($12, notes)
        WHERE id = $1 AND property_id = $2 RETURNING *"#,
    )
    .bind(id)
    .bind(tenant.property_id)
    .bind(body.room_id)
    .bind(body.title.trim())
    .bind(&body.description)
    .bind(body.kind.map(MaintenanceKind::as_str))
    .bind(body.priority.map(Priority::as_str))
    .bind(body.assignee_id)
    .bind(&body.assignee_name)
    .bind(body.scheduled_for)
    .bind(body.estimated_cost)
    .bind(&body.notes)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| AppError::NotFound("Task not found".into()))?;

    tx.commit().await?;
    Ok(Json(json!({ "task": task })))
}

/// Moves a task along. Closing the last open task of a room returns the
/// room's maintenance flag to `Ok`.
pub async fn update_status(
    State(state): State<AppState>,
    tenant: axum::Extension<TenantContext>,
    Path(id): Path<Uuid>,
    Json(body): Json<MaintenanceStatusRequest>,
) -> AppResult<Json<Value>> {
    if body.actual_cost.is_some_and(|c| c < Decimal::ZERO) {
        return Err(AppError::BadRequest("Actual cost cannot be negative".into()));
    }
    let completed = body.status == MaintenanceTaskStatus::Completed;

    let mut tx = state.db.begin().await?;

    let task: MaintenanceTask = sqlx::query_as(
        r#"UPDATE maintenance_tasks SET
            status = $3,
            completed_on = CASE WHEN $4 THEN CURRENT_DATE ELSE completed_on END,
            actual_cost = COALESCE($5, actual_cost),
            notes = COALESCE($6, notes)
        WHERE id = $1 AND property_id = $2 RETURNING *"#,
    )
    .bind(id)
    .bind(tenant.property_id)
    .bind(body.status.as_str())
    .bind(completed)
    .bind(body.actual_cost)
    .bind(&body.notes)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| AppError::NotFound("Task not found".into()))?;

    if let Some(room_id) = task.room_id {
        let other_open: i64 = sqlx::query_scalar(
            r#"SELECT COUNT(*) FROM maintenance_tasks
            WHERE room_id = $1 AND id <> $2 AND status IN ('Pending', 'InProgress')"#,
        )
        .bind(room_id)
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        if let Some(flag) = housekeeping::maintenance_on_status(body.status, other_open) {
            housekeeping::set_maintenance_status(&mut tx, tenant.property_id, room_id, flag).await?;
        }
    }

    tx.commit().await?;

    tracing::info!(property_id = %tenant.property_id, task_id = %id, status = %body.status, "maintenance task updated");
    Ok(Json(json!({ "task": task })))
}

pub async fn delete_task(
    State(state): State<AppState>,
    tenant: axum::Extension<TenantContext>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Value>> {
    let result = sqlx::query("DELETE FROM maintenance_tasks WHERE id = $1 AND property_id = $2")
        .bind(id)
        .bind(tenant.property_id)
        .execute(&state.db)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Task not found".into()));
    }
    Ok(Json(json!({ "success": true })))
}
