use axum::{extract::Request, middleware::Next, response::Response};

use crate::error::AppError;
use crate::middleware::auth::AuthUser;
use crate::models::Role;

fn check_role(req: &Request, min_role: Role) -> Result<(), AppError> {
    let user = req
        .extensions()
        .get::<AuthUser>()
        .ok_or_else(|| AppError::Unauthorized("Authentication required".into()))?;

    if user.role.level() < min_role.level() {
        return Err(AppError::Forbidden(format!(
            "Requires {} role or higher",
            min_role
        )));
    }
    Ok(())
}

/// Middleware: requires manager role or higher.
/// Use via `axum::middleware::from_fn(require_manager)` after `authenticate`.
pub async fn require_manager(req: Request, next: Next) -> Result<Response, AppError> {
    check_role(&req, Role::Manager)?;
    Ok(next.run(req).await)
}

/// Middleware: SaaS administration is reserved to platform operators.
pub async fn require_platform_admin(req: Request, next: Next) -> Result<Response, AppError> {
    check_role(&req, Role::PlatformAdmin)?;
    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use uuid::Uuid;

    fn request_as(role: Option<Role>) -> Request {
        let mut req = Request::new(Body::empty());
        if let Some(role) = role {
            req.extensions_mut().insert(AuthUser {
                id: Uuid::new_v4(),
                role,
                property_id: None,
                account_id: None,
            });
        }
        req
    }

    #[test]
    fn manager_passes_manager_check_but_not_platform_check() {
        let req = request_as(Some(Role::Manager));
        assert!(check_role(&req, Role::Manager).is_ok());
        assert!(matches!(
            check_role(&req, Role::PlatformAdmin),
            Err(AppError::Forbidden(_))
        ));
    }

    #[test]
    fn anonymous_request_is_unauthorized() {
        assert!(matches!(
            check_role(&request_as(None), Role::Staff),
            Err(AppError::Unauthorized(_))
        ));
    }
}
