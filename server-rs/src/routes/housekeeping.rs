use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::Utc;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::middleware::TenantContext;
use crate::models::*;
use crate::services::housekeeping;
use crate::AppState;

pub async fn list_tasks(
    State(state): State<AppState>,
    tenant: axum::Extension<TenantContext>,
    Query(q): Query<HousekeepingQuery>,
) -> AppResult<Json<Value>> {
    let sql = format!(
        r#"SELECT * FROM housekeeping_tasks
        WHERE property_id = $1
          AND ($2::date IS NULL OR scheduled_for = $2)
          AND ($3::text IS NULL OR status = $3)
          AND ($4::uuid IS NULL OR room_id = $4)
          AND ($5::uuid IS NULL OR assignee_id = $5)
        ORDER BY scheduled_for DESC, {}, created_at"#,
        Priority::order_by("priority")
    );
    let tasks: Vec<HousekeepingTask> = sqlx::query_as(&sql)
        .bind(tenant.property_id)
        .bind(q.date)
        .bind(q.status.map(HousekeepingStatus::as_str))
        .bind(q.room_id)
        .bind(q.assignee_id)
        .fetch_all(&state.db)
        .await?;

    Ok(Json(json!({ "tasks": tasks })))
}

/// Today's cleaning board, most urgent first.
pub async fn today_board(
    State(state): State<AppState>,
    tenant: axum::Extension<TenantContext>,
) -> AppResult<Json<Value>> {
    let sql = format!(
        r#"SELECT t.id, t.room_id, r.number AS room_number, r.floor, t.kind, t.priority, t.status,
            t.assignee_name, t.notes
        FROM housekeeping_tasks t
        JOIN rooms r ON r.id = t.room_id
        WHERE t.property_id = $1 AND t.scheduled_for = $2
        ORDER BY {}, r.floor, r.number"#,
        Priority::order_by("t.priority")
    );
    let tasks: Vec<HousekeepingBoardEntry> = sqlx::query_as(&sql)
        .bind(tenant.property_id)
        .bind(Utc::now().date_naive())
        .fetch_all(&state.db)
        .await?;

    let pending = tasks
        .iter()
        .filter(|t| t.status == HousekeepingStatus::Pending.as_str())
        .count();
    let in_progress = tasks
        .iter()
        .filter(|t| t.status == HousekeepingStatus::InProgress.as_str())
        .count();

    Ok(Json(json!({
        "tasks": tasks,
        "summary": {
            "total": tasks.len(),
            "pending": pending,
            "inProgress": in_progress,
            "done": tasks.len() - pending - in_progress,
        }
    })))
}

pub async fn create_task(
    State(state): State<AppState>,
    tenant: axum::Extension<TenantContext>,
    Json(body): Json<CreateHousekeepingRequest>,
) -> AppResult<Json<Value>> {
    let room_exists: bool = sqlx::query_scalar(
        "SELECT EXISTS (SELECT 1 FROM rooms WHERE id = $1 AND property_id = $2 AND deleted_at IS NULL)",
    )
    .bind(body.room_id)
    .bind(tenant.property_id)
    .fetch_one(&state.db)
    .await?;
    if !room_exists {
        return Err(AppError::NotFound("Room not found".into()));
    }

    let task: HousekeepingTask = sqlx::query_as(
        r#"INSERT INTO housekeeping_tasks (id, property_id, room_id, scheduled_for, kind, priority, status,
            assignee_id, assignee_name, notes)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) RETURNING *"#,
    )
    .bind(Uuid::new_v4())
    .bind(tenant.property_id)
    .bind(body.room_id)
    .bind(body.scheduled_for.unwrap_or_else(|| Utc::now().date_naive()))
    .bind(body.kind.unwrap_or(HousekeepingKind::Stayover).as_str())
    .bind(body.priority.unwrap_or(Priority::Normal).as_str())
    .bind(HousekeepingStatus::Pending.as_str())
    .bind(body.assignee_id)
    .bind(&body.assignee_name)
    .bind(&body.notes)
    .fetch_one(&state.db)
    .await?;

    Ok(Json(json!({ "task": task })))
}

/// Moves a task along and mirrors the progress onto the room's cleaning status.
pub async fn update_status(
    State(state): State<AppState>,
    tenant: axum::Extension<TenantContext>,
    Path(id): Path<Uuid>,
    Json(body): Json<TaskStatusRequest<HousekeepingStatus>>,
) -> AppResult<Json<Value>> {
    let started = body.status == HousekeepingStatus::InProgress;
    let finished = matches!(
        body.status,
        HousekeepingStatus::Completed | HousekeepingStatus::Verified
    );

    let mut tx = state.db.begin().await?;

    let task: HousekeepingTask = sqlx::query_as(
        r#"UPDATE housekeeping_tasks SET
            status = $3,
            started_at = CASE WHEN $4 THEN COALESCE(started_at, NOW()) ELSE started_at END,
            finished_at = CASE WHEN $5 THEN COALESCE(finished_at, NOW()) ELSE finished_at END,
            notes = COALESCE($6, notes)
        WHERE id = $1 AND property_id = $2 RETURNING *"#,
    )
    .bind(id)
    .bind(tenant.property_id)
    .bind(body.status.as_str())
    .bind(started)
    .bind(finished)
    .bind(&body.notes)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| AppError::NotFound("Task not found".into()))?;

    if let Some(cleaning) = housekeeping::cleaning_status_for(body.status) {
        housekeeping::set_cleaning_status(&mut tx, tenant.property_id, task.room_id, cleaning).await?;
    }

    tx.commit().await?;

    tracing::info!(property_id = %tenant.property_id, task_id = %id, status = %body.status, "housekeeping task updated");
    Ok(Json(json!({ "task": task })))
}

pub async fn assign_task(
    State(state): State<AppState>,
    tenant: axum::Extension<TenantContext>,
    Path(id): Path<Uuid>,
    Json(body): Json<AssignRequest>,
) -> AppResult<Json<Value>> {
    if body.assignee_name.trim().is_empty() {
        return Err(AppError::BadRequest("Assignee name required".into()));
    }

    let task: HousekeepingTask = sqlx::query_as(
        r#"UPDATE housekeeping_tasks SET assignee_id = $3, assignee_name = $4
        WHERE id = $1 AND property_id = $2 RETURNING *"#,
    )
    .bind(id)
    .bind(tenant.property_id)
    .bind(body.assignee_id)
    .bind(body.assignee_name.trim())
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| AppError::NotFound("Task not found".into()))?;

    Ok(Json(json!({ "task": task })))
}

pub async fn delete_task(
    State(state): State<AppState>,
    tenant: axum::Extension<TenantContext>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Value>> {
    let result = sqlx::query("DELETE FROM housekeeping_tasks WHERE id = $1 AND property_id = $2")
        .bind(id)
        .bind(tenant.property_id)
        .execute(&state.db)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Task not found".into()));
    }
    Ok(Json(json!({ "success": true })))
}
