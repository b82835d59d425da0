use axum::{
    http::{HeaderName, HeaderValue, Method},
    middleware as axum_mw,
    routing::{get, patch, post, put},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

mod cache;
mod config;
mod db;
mod error;
#[cfg(test)]
mod fixtures;
mod middleware;
mod models;
mod routes;
mod services;

use cache::Cache;
use config::Config;
use middleware::rate_limit::RateLimiter;

#[derive(Clone)]
pub struct AppState {
    pub db: sqlx::PgPool,
    pub cache: Cache,
    pub config: Arc<Config>,
    pub rate_limiter: RateLimiter,
}

fn cors_layer(config: &Config) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|o| o.parse().ok())
        .collect();

    let allow_origin = if origins.is_empty() || config.cors_origins.iter().any(|o| o == "*") {
        AllowOrigin::from(Any)
    } else {
        AllowOrigin::list(origins)
    };

    let tenant_header = HeaderName::from_bytes(config.tenant.header.as_bytes())
        .unwrap_or(HeaderName::from_static("x-hotel-id"));

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
            tenant_header,
        ])
}

fn build_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config);

    // --- Platform administration (no tenant header, platform admins only) ---
    let saas_routes = Router::new()
        .route(
            "/plans",
            get(routes::saas::list_plans).post(routes::saas::create_plan),
        )
        .route("/plans/:id", put(routes::saas::update_plan))
        .route(
            "/accounts",
            get(routes::saas::list_accounts).post(routes::saas::create_account),
        )
        .route("/accounts/:id/active", patch(routes::saas::set_account_active))
        .route(
            "/properties",
            get(routes::saas::list_properties).post(routes::saas::create_property),
        )
        .route(
            "/subscriptions",
            get(routes::saas::list_subscriptions).post(routes::saas::create_subscription),
        )
        .route(
            "/subscriptions/:id",
            put(routes::saas::update_subscription).delete(routes::saas::revoke_subscription),
        )
        .route(
            "/subscriptions/:id/extend",
            post(routes::saas::extend_subscription),
        )
        .layer(axum_mw::from_fn(middleware::admin::require_platform_admin))
        .layer(axum_mw::from_fn_with_state(
            state.clone(),
            middleware::rate_limit::rate_limit,
        ))
        .layer(axum_mw::from_fn_with_state(
            state.clone(),
            middleware::auth::authenticate,
        ));

    // --- Hotel operations (bearer token + access gate) ---
    let operative_routes = Router::new()
        .route(
            "/property",
            get(routes::property::get_property).put(routes::property::update_property),
        )
        .route(
            "/room-types",
            get(routes::room_types::list_room_types).post(routes::room_types::create_room_type),
        )
        .route(
            "/room-types/:id",
            get(routes::room_types::get_room_type)
                .put(routes::room_types::update_room_type)
                .delete(routes::room_types::delete_room_type),
        )
        .route(
            "/rooms",
            get(routes::rooms::list_rooms).post(routes::rooms::create_room),
        )
        .route("/rooms/available", get(routes::rooms::available_rooms))
        .route(
            "/rooms/:id",
            get(routes::rooms::get_room)
                .put(routes::rooms::update_room)
                .delete(routes::rooms::delete_room),
        )
        .route("/rooms/:id/status", patch(routes::rooms::set_room_status))
        .route(
            "/clients",
            get(routes::clients::list_clients).post(routes::clients::create_client),
        )
        .route(
            "/clients/:id",
            get(routes::clients::get_client)
                .put(routes::clients::update_client)
                .delete(routes::clients::delete_client),
        )
        .route(
            "/clients/:id/reservations",
            get(routes::clients::client_reservations),
        )
        .route(
            "/reservations",
            get(routes::reservations::list_reservations)
                .post(routes::reservations::create_reservation),
        )
        .route("/reservations/arrivals", get(routes::reservations::arrivals))
        .route("/reservations/departures", get(routes::reservations::departures))
        .route(
            "/reservations/:id",
            get(routes::reservations::get_reservation).put(routes::reservations::update_reservation),
        )
        .route("/reservations/:id/confirm", patch(routes::reservations::confirm))
        .route("/reservations/:id/check-in", patch(routes::reservations::check_in))
        .route("/reservations/:id/check-out", patch(routes::reservations::check_out))
        .route("/reservations/:id/cancel", patch(routes::reservations::cancel))
        .route("/reservations/:id/no-show", patch(routes::reservations::no_show))
        .route(
            "/charges",
            get(routes::charges::list_charges).post(routes::charges::create_charge),
        )
        .route("/charges/:id", axum::routing::delete(routes::charges::delete_charge))
        .route(
            "/payments",
            get(routes::payments::list_payments).post(routes::payments::create_payment),
        )
        .route(
            "/payments/:id",
            axum::routing::delete(routes::payments::delete_payment)
                .layer(axum_mw::from_fn(middleware::admin::require_manager)),
        )
        .route(
            "/housekeeping",
            get(routes::housekeeping::list_tasks).post(routes::housekeeping::create_task),
        )
        .route("/housekeeping/today", get(routes::housekeeping::today_board))
        .route(
            "/housekeeping/:id",
            axum::routing::delete(routes::housekeeping::delete_task),
        )
        .route(
            "/housekeeping/:id/status",
            patch(routes::housekeeping::update_status),
        )
        .route(
            "/housekeeping/:id/assign",
            put(routes::housekeeping::assign_task),
        )
        .route(
            "/maintenance",
            get(routes::maintenance::list_tasks).post(routes::maintenance::create_task),
        )
        .route("/maintenance/open", get(routes::maintenance::open_tasks))
        .route(
            "/maintenance/:id",
            put(routes::maintenance::update_task).delete(routes::maintenance::delete_task),
        )
        .route(
            "/maintenance/:id/status",
            patch(routes::maintenance::update_status),
        )
        .route(
            "/products",
            get(routes::products::list_products).post(routes::products::create_product),
        )
        .route(
            "/products/categories",
            get(routes::products::list_categories).post(routes::products::create_category),
        )
        .route(
            "/products/:id",
            get(routes::products::get_product)
                .put(routes::products::update_product)
                .delete(routes::products::delete_product),
        )
        .route(
            "/products/:id/movements",
            get(routes::products::list_movements).post(routes::products::create_movement),
        )
        .route(
            "/charge-concepts",
            get(routes::charge_concepts::list_concepts).post(routes::charge_concepts::create_concept),
        )
        .route(
            "/charge-concepts/:id",
            put(routes::charge_concepts::update_concept),
        )
        .route(
            "/suppliers",
            get(routes::suppliers::list_suppliers).post(routes::suppliers::create_supplier),
        )
        .route(
            "/suppliers/:id",
            get(routes::suppliers::get_supplier)
                .put(routes::suppliers::update_supplier)
                .delete(routes::suppliers::delete_supplier),
        )
        .route(
            "/purchases",
            get(routes::purchases::list_purchases).post(routes::purchases::create_purchase),
        )
        .route(
            "/purchases/:id",
            get(routes::purchases::get_purchase).delete(routes::purchases::delete_purchase),
        )
        .route(
            "/expenses",
            get(routes::expenses::list_expenses).post(routes::expenses::create_expense),
        )
        .route("/expenses/categories", get(routes::expenses::list_categories))
        .route("/expenses/summary", get(routes::expenses::expense_summary))
        .route(
            "/expenses/:id",
            get(routes::expenses::get_expense)
                .put(routes::expenses::update_expense)
                .delete(routes::expenses::delete_expense),
        )
        .route(
            "/sales",
            get(routes::sales::list_sales).post(routes::sales::create_sale),
        )
        .route("/sales/:id", get(routes::sales::get_sale))
        .route(
            "/loanables",
            get(routes::loans::list_items).post(routes::loans::create_item),
        )
        .route("/loanables/:id", put(routes::loans::update_item))
        .route(
            "/reservations/:id/loans",
            get(routes::loans::list_reservation_loans).post(routes::loans::lend_item),
        )
        .route("/loans/:id", axum::routing::delete(routes::loans::delete_loan))
        .route("/loans/:id/return", patch(routes::loans::return_loan))
        // Layers run bottom-up: authenticate, then rate limit, then the gate.
        .layer(axum_mw::from_fn_with_state(
            state.clone(),
            middleware::tenant::require_subscription,
        ))
        .layer(axum_mw::from_fn_with_state(
            state.clone(),
            middleware::rate_limit::rate_limit,
        ))
        .layer(axum_mw::from_fn_with_state(
            state.clone(),
            middleware::auth::authenticate,
        ));

    // --- Compose full API ---
    let api = Router::new()
        .nest("/saas", saas_routes)
        .merge(operative_routes);

    Router::new()
        .nest("/api/v1", api)
        .route("/health", get(routes::health::health))
        // Global middleware
        .layer(CompressionLayer::new())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    let config = Config::from_env();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .json()
        .init();

    error::expose_internal_details(config.is_development());

    let pool = db::create_pool(&config)
        .await
        .expect("failed to connect to PostgreSQL");
    db::run_migrations(&pool)
        .await
        .expect("failed to run database migrations");

    let cache = match Cache::new(&config).await {
        Ok(cache) => cache,
        Err(e) => {
            tracing::warn!(error = %e, "Redis unavailable; continuing without cache");
            Cache::disabled()
        }
    };

    let rate_limiter =
        RateLimiter::new(config.rate_limit.max_requests, config.rate_limit.window_secs);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let state = AppState {
        db: pool,
        cache,
        config: Arc::new(config),
        rate_limiter,
    };

    let router = build_router(state);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("failed to bind listen address");

    tracing::info!(%addr, "Hotel PMS API listening");

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .expect("server error");
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use crate::models::Role;
    use sqlx::postgres::PgPoolOptions;
    use tower::ServiceExt;
    use uuid::Uuid;

    fn test_state() -> AppState {
        let config = Config::for_tests();
        // never connects: every request below is rejected before touching the store
        let db = PgPoolOptions::new()
            .connect_lazy("postgres://hotel_admin@localhost/hotel_pms_test")
            .unwrap();
        AppState {
            db,
            cache: Cache::disabled(),
            rate_limiter: RateLimiter::new(config.rate_limit.max_requests, config.rate_limit.window_secs),
            config: Arc::new(config),
        }
    }

    fn token(role: Role) -> String {
        middleware::auth::sign_test_token(Uuid::new_v4(), role, None, None, "test-secret")
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn operative_routes_require_a_token() {
        let app = build_router(test_state());
        let response = app
            .oneshot(Request::get("/api/v1/rooms").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = body_json(response).await;
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn missing_tenant_header_is_a_bad_request() {
        let app = build_router(test_state());
        let response = app
            .oneshot(
                Request::get("/api/v1/rooms")
                    .header("authorization", format!("Bearer {}", token(Role::Staff)))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn malformed_tenant_header_is_a_bad_request() {
        let app = build_router(test_state());
        let response = app
            .oneshot(
                Request::get("/api/v1/reservations")
                    .header("authorization", format!("Bearer {}", token(Role::Manager)))
                    .header("x-hotel-id", "not-a-uuid")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn staff_cannot_reach_saas_administration() {
        let app = build_router(test_state());
        let response = app
            .oneshot(
                Request::get("/api/v1/saas/accounts")
                    .header("authorization", format!("Bearer {}", token(Role::Staff)))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn token_pinned_to_another_property_is_refused() {
        let pinned = middleware::auth::sign_test_token(
            Uuid::new_v4(),
            Role::Staff,
            Some(Uuid::new_v4()),
            None,
            "test-secret",
        );
        let app = build_router(test_state());
        let response = app
            .oneshot(
                Request::get("/api/v1/rooms")
                    .header("authorization", format!("Bearer {pinned}"))
                    .header("x-hotel-id", Uuid::new_v4().to_string())
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn token_without_affiliation_is_refused() {
        let app = build_router(test_state());
        let response = app
            .oneshot(
                Request::get("/api/v1/rooms")
                    .header("authorization", format!("Bearer {}", token(Role::Admin)))
                    .header("x-hotel-id", Uuid::new_v4().to_string())
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let body = body_json(response).await;
        assert!(body.get("blocked").is_none());
    }
}
