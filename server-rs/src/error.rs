use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use once_cell::sync::OnceCell;
use rust_decimal::Decimal;
use serde_json::{json, Map, Value};
use uuid::Uuid;

use crate::services::access_gate::GateError;

static EXPOSE_DETAILS: OnceCell<bool> = OnceCell::new();

/// Attach the underlying message of 500 responses as `detail`. Set once at startup.
pub fn expose_internal_details(enabled: bool) {
    let _ = EXPOSE_DETAILS.set(enabled);
}

fn details_exposed() -> bool {
    EXPOSE_DETAILS.get().copied().unwrap_or(false)
}

const EXCLUSION_VIOLATION: &str = "23P01";
const UNIQUE_VIOLATION: &str = "23505";
const FOREIGN_KEY_VIOLATION: &str = "23503";

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Rate limited")]
    RateLimited,

    #[error(transparent)]
    Gate(#[from] GateError),

    #[error("Outstanding balance: {balance}")]
    OutstandingBalance { balance: Decimal },

    #[error("No room assigned")]
    NoRoomAssigned,

    #[error("Room {room_id} is not available")]
    RoomUnavailable { room_id: Uuid },

    #[error("Insufficient stock: {available} available, {requested} requested")]
    InsufficientStock { available: i32, requested: i32 },

    #[error("Cannot {action} a reservation in status {from}")]
    InvalidTransition { from: String, action: &'static str },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("JWT error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Maps an exclusion-constraint violation on a reservation write to
    /// `RoomUnavailable`; any other error passes through.
    pub fn room_conflict(err: sqlx::Error, room_id: Uuid) -> Self {
        match db_code(&err).as_deref() {
            Some(EXCLUSION_VIOLATION) => AppError::RoomUnavailable { room_id },
            _ => AppError::Database(err),
        }
    }

    fn parts(&self) -> (StatusCode, String, Map<String, Value>) {
        let mut context = Map::new();
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg.clone()),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg.clone()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            AppError::RateLimited => (
                StatusCode::TOO_MANY_REQUESTS,
                "Too many requests".to_string(),
            ),
            AppError::Gate(e) => {
                context = e.context();
                (e.status(), e.to_string())
            }
            AppError::OutstandingBalance { balance } => {
                context.insert("balance".into(), json!(balance));
                (
                    StatusCode::BAD_REQUEST,
                    "Reservation has an outstanding balance".to_string(),
                )
            }
            AppError::NoRoomAssigned => (
                StatusCode::BAD_REQUEST,
                "A room must be assigned before check-in".to_string(),
            ),
            AppError::RoomUnavailable { room_id } => {
                context.insert("roomId".into(), json!(room_id));
                (
                    StatusCode::CONFLICT,
                    "Room is not available for the requested dates".to_string(),
                )
            }
            AppError::InsufficientStock {
                available,
                requested,
            } => {
                context.insert("available".into(), json!(available));
                context.insert("requested".into(), json!(requested));
                (StatusCode::BAD_REQUEST, "Insufficient stock".to_string())
            }
            AppError::InvalidTransition { from, action } => {
                context.insert("status".into(), json!(from));
                context.insert("action".into(), json!(action));
                (StatusCode::CONFLICT, self.to_string())
            }
            AppError::Database(e) => match db_code(e).as_deref() {
                Some(UNIQUE_VIOLATION) => {
                    (StatusCode::CONFLICT, "Duplicate record".to_string())
                }
                Some(FOREIGN_KEY_VIOLATION) => (
                    StatusCode::BAD_REQUEST,
                    "Referenced record does not exist".to_string(),
                ),
                _ => {
                    tracing::error!("Database error: {e}");
                    internal(&mut context, e.to_string())
                }
            },
            AppError::Redis(e) => {
                tracing::error!("Redis error: {e}");
                internal(&mut context, e.to_string())
            }
            AppError::Jwt(_) => (StatusCode::UNAUTHORIZED, "Invalid token".to_string()),
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {msg}");
                internal(&mut context, msg.clone())
            }
        };
        (status, message, context)
    }
}

fn internal(context: &mut Map<String, Value>, detail: String) -> (StatusCode, String) {
    if details_exposed() {
        context.insert("detail".into(), json!(detail));
    }
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "Internal server error".to_string(),
    )
}

fn db_code(err: &sqlx::Error) -> Option<String> {
    match err {
        sqlx::Error::Database(db) => db.code().map(|c| c.into_owned()),
        _ => None,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message, context) = self.parts();

        let mut body = Map::new();
        body.insert("error".into(), json!(message));
        body.extend(context);
        (status, Json(Value::Object(body))).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_of(err: AppError) -> (StatusCode, Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn outstanding_balance_reports_the_amount() {
        let (status, body) = body_of(AppError::OutstandingBalance {
            balance: "1320.00".parse().unwrap(),
        })
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["balance"], json!("1320.00"));
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn insufficient_stock_carries_both_quantities() {
        let (status, body) = body_of(AppError::InsufficientStock {
            available: 2,
            requested: 5,
        })
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["available"], 2);
        assert_eq!(body["requested"], 5);
    }

    #[tokio::test]
    async fn room_unavailable_is_a_conflict() {
        let room_id = Uuid::new_v4();
        let (status, body) = body_of(AppError::RoomUnavailable { room_id }).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["roomId"], json!(room_id));
    }

    #[tokio::test]
    async fn internal_errors_hide_their_message() {
        let (status, body) = body_of(AppError::Internal("pool exhausted".into())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Internal server error");
        assert!(body.get("detail").is_none());
    }

    #[tokio::test]
    async fn missing_rows_are_not_reclassified() {
        let (status, _) = body_of(AppError::room_conflict(
            sqlx::Error::RowNotFound,
            Uuid::new_v4(),
        ))
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }
}
