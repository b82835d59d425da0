use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::Role;
use crate::services::access_gate::Affiliation;
use crate::AppState;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // user id
    pub role: Option<String>,
    #[serde(rename = "propertyId", default, skip_serializing_if = "Option::is_none")]
    pub property_id: Option<Uuid>,
    #[serde(rename = "accountId", default, skip_serializing_if = "Option::is_none")]
    pub account_id: Option<Uuid>,
    pub exp: i64,
    pub iat: i64,
}

#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: Uuid,
    pub role: Role,
    pub property_id: Option<Uuid>,
    pub account_id: Option<Uuid>,
}

impl AuthUser {
    pub fn affiliation(&self) -> Affiliation {
        Affiliation {
            property_id: self.property_id,
            account_id: self.account_id,
            platform: self.role == Role::PlatformAdmin,
        }
    }
}

pub fn verify_token(token: &str, secret: &str) -> AppResult<Claims> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )?;
    Ok(data.claims)
}

fn extract_bearer(req: &Request) -> Option<String> {
    req.headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(String::from)
}

fn user_from_claims(claims: Claims) -> AppResult<AuthUser> {
    let id = Uuid::parse_str(&claims.sub)
        .map_err(|_| AppError::Unauthorized("Invalid token subject".into()))?;
    // Unknown roles get the least privilege.
    let role = claims
        .role
        .as_deref()
        .and_then(|r| r.parse().ok())
        .unwrap_or(Role::Staff);

    Ok(AuthUser {
        id,
        role,
        property_id: claims.property_id,
        account_id: claims.account_id,
    })
}

/// Middleware: requires valid JWT. Sets AuthUser in extensions.
pub async fn authenticate(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = extract_bearer(&req)
        .ok_or_else(|| AppError::Unauthorized("No token provided".into()))?;

    let claims = verify_token(&token, &state.config.jwt.secret)?;
    let user = user_from_claims(claims)?;

    req.extensions_mut().insert(user);
    Ok(next.run(req).await)
}

#[cfg(test)]
pub fn sign_test_token(
    user_id: Uuid,
    role: Role,
    property_id: Option<Uuid>,
    account_id: Option<Uuid>,
    secret: &str,
) -> String {
    use jsonwebtoken::{encode, EncodingKey, Header};

    let now = chrono::Utc::now().timestamp();
    let claims = Claims {
        sub: user_id.to_string(),
        role: Some(role.as_str().to_string()),
        property_id,
        account_id,
        exp: now + 3600,
        iat: now,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_round_trips_affiliation() {
        let user = Uuid::new_v4();
        let property = Uuid::new_v4();
        let token = sign_test_token(user, Role::Manager, Some(property), None, "s3cret");

        let claims = verify_token(&token, "s3cret").unwrap();
        let auth = user_from_claims(claims).unwrap();
        assert_eq!(auth.id, user);
        assert_eq!(auth.role, Role::Manager);
        assert_eq!(auth.affiliation().property_id, Some(property));
        assert_eq!(auth.affiliation().account_id, None);
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = sign_test_token(Uuid::new_v4(), Role::Staff, None, None, "one");
        assert!(matches!(verify_token(&token, "two"), Err(AppError::Jwt(_))));
    }

    #[test]
    fn unknown_role_falls_back_to_staff() {
        let claims = Claims {
            sub: Uuid::new_v4().to_string(),
            role: Some("owner".into()),
            property_id: None,
            account_id: None,
            exp: 0,
            iat: 0,
        };
        assert_eq!(user_from_claims(claims).unwrap().role, Role::Staff);
    }

    #[test]
    fn non_uuid_subject_is_unauthorized() {
        let claims = Claims {
            sub: "42".into(),
            role: None,
            property_id: None,
            account_id: None,
            exp: 0,
            iat: 0,
        };
        assert!(matches!(user_from_claims(claims), Err(AppError::Unauthorized(_))));
    }
}
