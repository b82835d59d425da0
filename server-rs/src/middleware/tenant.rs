use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use chrono::Utc;

use crate::error::AppError;
use crate::middleware::auth::AuthUser;
use crate::services::access_gate::{authorize, check_affiliation, load_snapshot, parse_property_id};
use crate::AppState;

pub use crate::services::access_gate::TenantContext;

/// Middleware: resolves the property from the tenant header and admits the
/// request only while the property has a current subscription. Must run
/// after `authenticate`. Sets TenantContext in extensions.
pub async fn require_subscription(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let user = req
        .extensions()
        .get::<AuthUser>()
        .cloned()
        .ok_or_else(|| AppError::Unauthorized("Authentication required".into()))?;

    let header = req
        .headers()
        .get(state.config.tenant.header.as_str())
        .and_then(|v| v.to_str().ok());
    let property_id = parse_property_id(header)?;
    let affiliation = user.affiliation();
    check_affiliation(property_id, &affiliation).map_err(|e| {
        tracing::warn!(user_id = %user.id, %property_id, "token not affiliated with the requested property");
        e
    })?;

    let snapshot = load_snapshot(
        &state.db,
        &state.cache,
        property_id,
        state.config.tenant.subscription_cache_secs,
    )
    .await?;

    let tenant = authorize(property_id, &affiliation, snapshot.as_ref(), Utc::now())
        .map_err(|e| {
            tracing::warn!(user_id = %user.id, %property_id, reason = %e, "request blocked by access gate");
            e
        })?;

    req.extensions_mut().insert(tenant);
    Ok(next.run(req).await)
}
