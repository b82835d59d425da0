//! Subscription gate in front of every operational endpoint.
//!
//! The decision itself ([`authorize`]) is a pure function of the requested
//! property, the caller's affiliation, a snapshot of the property's
//! subscriptions and the current instant. Loading and caching the snapshot
//! lives next to it.

use axum::http::StatusCode;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use uuid::Uuid;

use crate::cache::Cache;
use crate::error::AppResult;
use crate::models::SubscriptionStatus;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GateError {
    #[error("Property identifier required")]
    MissingTenantIdentifier,

    #[error("You do not have access to this property")]
    TenantNotPermitted,

    #[error("No active subscription for this property")]
    NoActiveSubscription { lapsed: bool },

    #[error("Subscription expired on {expired_on}")]
    SubscriptionExpired { expired_on: NaiveDate },
}

impl GateError {
    pub fn status(&self) -> StatusCode {
        match self {
            GateError::MissingTenantIdentifier => StatusCode::BAD_REQUEST,
            _ => StatusCode::FORBIDDEN,
        }
    }

    /// Extra response fields. Subscription failures carry `blocked: true`
    /// so clients can route the user to a renewal screen.
    pub fn context(&self) -> Map<String, Value> {
        let mut context = Map::new();
        match self {
            GateError::NoActiveSubscription { lapsed } => {
                context.insert("blocked".into(), json!(true));
                context.insert("lapsed".into(), json!(lapsed));
            }
            GateError::SubscriptionExpired { expired_on } => {
                context.insert("blocked".into(), json!(true));
                context.insert("expiresOn".into(), json!(expired_on));
            }
            GateError::MissingTenantIdentifier | GateError::TenantNotPermitted => {}
        }
        context
    }
}

/// Which properties a caller may act on, as stated by their token.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Affiliation {
    /// Set for users bound to a single property.
    pub property_id: Option<Uuid>,
    /// Set for users that may act on any property of one account.
    pub account_id: Option<Uuid>,
    /// Platform operators are bound to no tenant and may address any.
    pub platform: bool,
}

/// Everything the gate needs to know about one property.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertySnapshot {
    pub property_id: Uuid,
    pub account_id: Uuid,
    pub account_active: bool,
    /// Rows for this property plus the account-wide ones.
    pub subscriptions: Vec<SubscriptionWindow>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionWindow {
    pub status: String,
    pub ends_at: DateTime<Utc>,
}

impl SubscriptionWindow {
    fn is_active(&self) -> bool {
        self.status == SubscriptionStatus::Active.as_str()
    }
}

/// Property a request is scoped to, once the gate has let it through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TenantContext {
    pub property_id: Uuid,
    pub account_id: Uuid,
}

/// Reads the tenant header. Absent, blank and malformed values are all
/// treated as a missing identifier.
pub fn parse_property_id(header: Option<&str>) -> Result<Uuid, GateError> {
    header
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .and_then(|v| Uuid::parse_str(v).ok())
        .ok_or(GateError::MissingTenantIdentifier)
}

/// Checks what the token alone can decide: a token pinned to one property
/// cannot address another, and a tenant user with neither a property nor an
/// account may address none. Needs no store lookup, so the gate runs it
/// before loading the snapshot.
pub fn check_affiliation(property_id: Uuid, affiliation: &Affiliation) -> Result<(), GateError> {
    match (affiliation.property_id, affiliation.account_id) {
        (Some(own), _) if own != property_id => Err(GateError::TenantNotPermitted),
        (None, None) if !affiliation.platform => Err(GateError::TenantNotPermitted),
        _ => Ok(()),
    }
}

/// Decides whether a caller may operate on `property_id` at `now`.
///
/// `snapshot` is `None` when the property does not exist (or is retired);
/// that is reported the same way as a property without a subscription.
/// Expiry compares UTC calendar dates and the end date itself is still
/// usable.
pub fn authorize(
    property_id: Uuid,
    affiliation: &Affiliation,
    snapshot: Option<&PropertySnapshot>,
    now: DateTime<Utc>,
) -> Result<TenantContext, GateError> {
    check_affiliation(property_id, affiliation)?;

    let snapshot = snapshot.ok_or(GateError::NoActiveSubscription { lapsed: false })?;

    if let Some(account) = affiliation.account_id {
        if account != snapshot.account_id {
            return Err(GateError::TenantNotPermitted);
        }
    }

    let lapsed = !snapshot.subscriptions.is_empty();
    if !snapshot.account_active {
        return Err(GateError::NoActiveSubscription { lapsed });
    }

    let latest_active_end = snapshot
        .subscriptions
        .iter()
        .filter(|s| s.is_active())
        .map(|s| s.ends_at.date_naive())
        .max()
        .ok_or(GateError::NoActiveSubscription { lapsed })?;

    if latest_active_end < now.date_naive() {
        return Err(GateError::SubscriptionExpired {
            expired_on: latest_active_end,
        });
    }

    Ok(TenantContext {
        property_id,
        account_id: snapshot.account_id,
    })
}

fn snapshot_key(property_id: Uuid) -> String {
    format!("gate:property:{property_id}")
}

/// Loads the property's snapshot, going through Redis when `ttl_secs > 0`.
pub async fn load_snapshot(
    db: &sqlx::PgPool,
    cache: &Cache,
    property_id: Uuid,
    ttl_secs: u64,
) -> AppResult<Option<PropertySnapshot>> {
    let key = snapshot_key(property_id);
    if ttl_secs > 0 {
        if let Some(snapshot) = cache.get_json::<PropertySnapshot>(&key).await {
            return Ok(Some(snapshot));
        }
    }

    let property: Option<(Uuid, bool)> = sqlx::query_as(
        r#"SELECT p.account_id, a.is_active
        FROM properties p JOIN accounts a ON a.id = p.account_id
        WHERE p.id = $1 AND p.deleted_at IS NULL"#,
    )
    .bind(property_id)
    .fetch_optional(db)
    .await?;

    let Some((account_id, account_active)) = property else {
        return Ok(None);
    };

    let subscriptions: Vec<SubscriptionWindow> = sqlx::query_as(
        r#"SELECT status, ends_at FROM subscriptions
        WHERE account_id = $1 AND (property_id = $2 OR property_id IS NULL)"#,
    )
    .bind(account_id)
    .bind(property_id)
    .fetch_all(db)
    .await?;

    let snapshot = PropertySnapshot {
        property_id,
        account_id,
        account_active,
        subscriptions,
    };

    if ttl_secs > 0 {
        cache.set_json(&key, &snapshot, ttl_secs).await;
    }
    Ok(Some(snapshot))
}

async fn affected_properties(
    db: &sqlx::PgPool,
    account_id: Uuid,
    property_id: Option<Uuid>,
) -> AppResult<Vec<Uuid>> {
    match property_id {
        Some(id) => Ok(vec![id]),
        None => Ok(sqlx::query_scalar("SELECT id FROM properties WHERE account_id = $1")
            .bind(account_id)
            .fetch_all(db)
            .await?),
    }
}

/// Drops cached snapshots touched by a change to `property_id`, or to every
/// property of `account_id` when the change is account-wide. Runs after the
/// change is committed, so failures are logged and left to the cache TTL.
pub async fn invalidate(db: &sqlx::PgPool, cache: &Cache, account_id: Uuid, property_id: Option<Uuid>) {
    if !cache.is_enabled() {
        return;
    }

    match affected_properties(db, account_id, property_id).await {
        Ok(properties) => {
            for id in properties {
                cache.del(&snapshot_key(id)).await;
            }
        }
        Err(e) => {
            tracing::warn!(%account_id, error = %e, "gate cache invalidation failed; entries expire with their TTL");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    fn window(status: &str, ends_at: DateTime<Utc>) -> SubscriptionWindow {
        SubscriptionWindow {
            status: status.to_string(),
            ends_at,
        }
    }

    fn member(snap: &PropertySnapshot) -> Affiliation {
        Affiliation {
            account_id: Some(snap.account_id),
            ..Affiliation::default()
        }
    }

    fn operator() -> Affiliation {
        Affiliation {
            platform: true,
            ..Affiliation::default()
        }
    }

    fn snapshot(subscriptions: Vec<SubscriptionWindow>) -> PropertySnapshot {
        PropertySnapshot {
            property_id: Uuid::new_v4(),
            account_id: Uuid::new_v4(),
            account_active: true,
            subscriptions,
        }
    }

    #[test]
    fn header_must_hold_a_uuid() {
        assert_eq!(parse_property_id(None), Err(GateError::MissingTenantIdentifier));
        assert_eq!(parse_property_id(Some("  ")), Err(GateError::MissingTenantIdentifier));
        assert_eq!(parse_property_id(Some("hotel-1")), Err(GateError::MissingTenantIdentifier));

        let id = Uuid::new_v4();
        assert_eq!(parse_property_id(Some(&format!(" {id} "))), Ok(id));
    }

    #[test]
    fn active_subscription_admits_the_request() {
        let snap = snapshot(vec![window("active", at(2025, 12, 31, 0))]);
        let ctx = authorize(snap.property_id, &member(&snap), Some(&snap), at(2025, 6, 1, 9)).unwrap();
        assert_eq!(ctx.property_id, snap.property_id);
        assert_eq!(ctx.account_id, snap.account_id);
    }

    #[test]
    fn end_date_is_inclusive() {
        let snap = snapshot(vec![window("active", at(2025, 6, 30, 0))]);
        let affiliation = member(&snap);

        assert!(authorize(snap.property_id, &affiliation, Some(&snap), at(2025, 6, 30, 23)).is_ok());
        assert_eq!(
            authorize(snap.property_id, &affiliation, Some(&snap), at(2025, 7, 1, 0)),
            Err(GateError::SubscriptionExpired {
                expired_on: NaiveDate::from_ymd_opt(2025, 6, 30).unwrap()
            })
        );
    }

    #[test]
    fn expiry_reports_the_latest_active_end() {
        let snap = snapshot(vec![
            window("active", at(2025, 3, 1, 0)),
            window("active", at(2025, 4, 15, 0)),
            window("revoked", at(2026, 1, 1, 0)),
        ]);
        let err = authorize(snap.property_id, &member(&snap), Some(&snap), at(2025, 5, 1, 0))
            .unwrap_err();
        assert_eq!(
            err,
            GateError::SubscriptionExpired {
                expired_on: NaiveDate::from_ymd_opt(2025, 4, 15).unwrap()
            }
        );
        assert_eq!(err.context()["expiresOn"], json!("2025-04-15"));
        assert_eq!(err.context()["blocked"], json!(true));
    }

    #[test]
    fn no_subscription_rows_is_not_lapsed() {
        let snap = snapshot(vec![]);
        assert_eq!(
            authorize(snap.property_id, &member(&snap), Some(&snap), at(2025, 1, 1, 0)),
            Err(GateError::NoActiveSubscription { lapsed: false })
        );
    }

    #[test]
    fn only_non_active_rows_is_lapsed() {
        let snap = snapshot(vec![window("suspended", at(2030, 1, 1, 0))]);
        assert_eq!(
            authorize(snap.property_id, &member(&snap), Some(&snap), at(2025, 1, 1, 0)),
            Err(GateError::NoActiveSubscription { lapsed: true })
        );
    }

    #[test]
    fn unknown_property_fails_closed() {
        let err = authorize(Uuid::new_v4(), &operator(), None, at(2025, 1, 1, 0)).unwrap_err();
        assert_eq!(err, GateError::NoActiveSubscription { lapsed: false });
        assert_eq!(err.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn deactivated_account_is_blocked() {
        let mut snap = snapshot(vec![window("active", at(2030, 1, 1, 0))]);
        snap.account_active = false;
        assert_eq!(
            authorize(snap.property_id, &member(&snap), Some(&snap), at(2025, 1, 1, 0)),
            Err(GateError::NoActiveSubscription { lapsed: true })
        );
    }

    #[test]
    fn property_bound_user_cannot_switch_properties() {
        let snap = snapshot(vec![window("active", at(2030, 1, 1, 0))]);
        let affiliation = Affiliation {
            property_id: Some(Uuid::new_v4()),
            ..Affiliation::default()
        };
        let err = authorize(snap.property_id, &affiliation, Some(&snap), at(2025, 1, 1, 0)).unwrap_err();
        assert_eq!(err, GateError::TenantNotPermitted);
        assert!(err.context().is_empty());

        let own = Affiliation {
            property_id: Some(snap.property_id),
            ..Affiliation::default()
        };
        assert!(check_affiliation(snap.property_id, &own).is_ok());
    }

    #[test]
    fn account_user_is_limited_to_its_account() {
        let snap = snapshot(vec![window("active", at(2030, 1, 1, 0))]);
        let outsider = Affiliation {
            account_id: Some(Uuid::new_v4()),
            ..Affiliation::default()
        };
        assert_eq!(
            authorize(snap.property_id, &outsider, Some(&snap), at(2025, 1, 1, 0)),
            Err(GateError::TenantNotPermitted)
        );

        assert!(authorize(snap.property_id, &member(&snap), Some(&snap), at(2025, 1, 1, 0)).is_ok());
    }

    #[test]
    fn unaffiliated_tenant_user_is_refused() {
        let snap = snapshot(vec![window("active", at(2030, 1, 1, 0))]);
        assert_eq!(
            authorize(snap.property_id, &Affiliation::default(), Some(&snap), at(2025, 1, 1, 0)),
            Err(GateError::TenantNotPermitted)
        );
        assert_eq!(
            check_affiliation(snap.property_id, &Affiliation::default()),
            Err(GateError::TenantNotPermitted)
        );

        // platform operators are not bound to a tenant
        assert!(authorize(snap.property_id, &operator(), Some(&snap), at(2025, 1, 1, 0)).is_ok());
    }

    #[test]
    fn missing_identifier_is_a_bad_request() {
        assert_eq!(GateError::MissingTenantIdentifier.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            GateError::NoActiveSubscription { lapsed: true }.context()["blocked"],
            json!(true)
        );
    }

    fn unreachable_pool() -> sqlx::PgPool {
        sqlx::postgres::PgPoolOptions::new()
            .acquire_timeout(std::time::Duration::from_millis(200))
            .connect_lazy("postgres://nobody@127.0.0.1:1/none")
            .unwrap()
    }

    #[tokio::test]
    async fn single_property_invalidation_needs_no_store() {
        let property = Uuid::new_v4();
        let affected = affected_properties(&unreachable_pool(), Uuid::new_v4(), Some(property))
            .await
            .unwrap();
        assert_eq!(affected, vec![property]);
    }

    #[tokio::test]
    async fn invalidation_failure_is_not_an_error() {
        let db = unreachable_pool();
        assert!(affected_properties(&db, Uuid::new_v4(), None).await.is_err());
        // returns unit: a committed admin change is never reported as failed
        let () = invalidate(&db, &Cache::disabled(), Uuid::new_v4(), None).await;
    }
}
