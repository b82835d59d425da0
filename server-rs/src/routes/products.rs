use axum::{
    extract::{Path, Query, State},
    Json,
};
use rust_decimal::Decimal;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::middleware::TenantContext;
use crate::models::*;
use crate::services::inventory;
use crate::AppState;

use super::{page, search_pattern, PaginationQuery};

pub async fn list_products(
    State(state): State<AppState>,
    tenant: axum::Extension<TenantContext>,
    Query(q): Query<ProductQuery>,
) -> AppResult<Json<Value>> {
    let products: Vec<Product> = sqlx::query_as(
        r#"SELECT * FROM products
        WHERE property_id = $1 AND deleted_at IS NULL
          AND ($2::uuid IS NULL OR category_id = $2)
          AND ($3::text IS NULL OR name ILIKE $3 OR code ILIKE $3)
          AND (NOT $4 OR stock_on_hand <= reorder_level)
        ORDER BY name"#,
    )
    .bind(tenant.property_id)
    .bind(q.category_id)
    .bind(search_pattern(q.search.as_deref()))
    .bind(q.low_stock.unwrap_or(false))
    .fetch_all(&state.db)
    .await?;

    let low_stock = products.iter().filter(|p| p.needs_reorder()).count();
    Ok(Json(json!({ "products": products, "lowStockCount": low_stock })))
}

async fn fetch_product(db: &sqlx::PgPool, property_id: Uuid, id: Uuid) -> AppResult<Product> {
    sqlx::query_as("SELECT * FROM products WHERE id = $1 AND property_id = $2 AND deleted_at IS NULL")
        .bind(id)
        .bind(property_id)
        .fetch_optional(db)
        .await?
        .ok_or_else(|| AppError::NotFound("Product not found".into()))
}

pub async fn get_product(
    State(state): State<AppState>,
    tenant: axum::Extension<TenantContext>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Value>> {
    let product = fetch_product(&state.db, tenant.property_id, id).await?;
    Ok(Json(json!({ "product": product })))
}

fn validate(body: &ProductRequest) -> AppResult<()> {
    if body.code.trim().is_empty() || body.name.trim().is_empty() {
        return Err(AppError::BadRequest("Code and name are required".into()));
    }
    if body.sale_price < Decimal::ZERO || body.cost_price.is_some_and(|c| c < Decimal::ZERO) {
        return Err(AppError::BadRequest("Prices cannot be negative".into()));
    }
    if body.stock_on_hand.is_some_and(|s| s < 0) || body.reorder_level.is_some_and(|r| r < 0) {
        return Err(AppError::BadRequest("Stock levels cannot be negative".into()));
    }
    Ok(())
}

pub async fn create_product(
    State(state): State<AppState>,
    tenant: axum::Extension<TenantContext>,
    Json(body): Json<ProductRequest>,
) -> AppResult<Json<Value>> {
    validate(&body)?;
    let opening_stock = body.stock_on_hand.unwrap_or(0);

    let mut tx = state.db.begin().await?;

    let product: Product = sqlx::query_as(
        r#"INSERT INTO products (id, property_id, category_id, code, name, description, cost_price, sale_price,
            stock_on_hand, reorder_level, unit, image_url)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 0, $9, $10, $11) RETURNING *"#,
    )
    .bind(Uuid::new_v4())
    .bind(tenant.property_id)
    .bind(body.category_id)
    .bind(body.code.trim().to_uppercase())
    .bind(body.name.trim())
    .bind(&body.description)
    .bind(body.cost_price.unwrap_or(Decimal::ZERO))
    .bind(body.sale_price)
    .bind(body.reorder_level.unwrap_or(5))
    .bind(body.unit.as_deref().unwrap_or("PCS"))
    .bind(&body.image_url)
    .fetch_one(&mut *tx)
    .await?;

    // opening stock goes through the ledger like any other receipt
    let product = if opening_stock > 0 {
        inventory::record_movement(
            &mut tx,
            tenant.property_id,
            product.id,
            MovementKind::In,
            opening_stock,
            Some("Opening stock"),
            None,
        )
        .await?;
        Product {
            stock_on_hand: opening_stock,
            ..product
        }
    } else {
        product
    };

    tx.commit().await?;
    Ok(Json(json!({ "product": product })))
}

pub async fn update_product(
    State(state): State<AppState>,
    tenant: axum::Extension<TenantContext>,
    Path(id): Path<Uuid>,
    Json(body): Json<ProductRequest>,
) -> AppResult<Json<Value>> {
    validate(&body)?;

    let product: Product = sqlx::query_as(
        r#"UPDATE products SET category_id = $3, code = $4, name = $5, description = $6,
            cost_price = COALESCE($7, cost_price), sale_price = $8,
            reorder_level = COALESCE($9, reorder_level), unit = COALESCE($10, unit),
            image_url = COALESCE($11, image_url)
        WHERE id = $1 AND property_id = $2 AND deleted_at IS NULL RETURNING *"#,
    )
    .bind(id)
    .bind(tenant.property_id)
    .bind(body.category_id)
    .bind(body.code.trim().to_uppercase())
    .bind(body.name.trim())
    .bind(&body.description)
    .bind(body.cost_price)
    .bind(body.sale_price)
    .bind(body.reorder_level)
    .bind(&body.unit)
    .bind(&body.image_url)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| AppError::NotFound("Product not found".into()))?;

    Ok(Json(json!({ "product": product })))
}

pub async fn delete_product(
    State(state): State<AppState>,
    tenant: axum::Extension<TenantContext>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Value>> {
    soft_delete(&state.db, SoftDeletable::Products, tenant.property_id, id).await?;
    Ok(Json(json!({ "success": true })))
}

// Categories

pub async fn list_categories(
    State(state): State<AppState>,
    tenant: axum::Extension<TenantContext>,
) -> AppResult<Json<Value>> {
    let categories: Vec<ProductCategory> = sqlx::query_as(
        "SELECT * FROM product_categories WHERE property_id = $1 AND deleted_at IS NULL ORDER BY name",
    )
    .bind(tenant.property_id)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(json!({ "categories": categories })))
}

pub async fn create_category(
    State(state): State<AppState>,
    tenant: axum::Extension<TenantContext>,
    Json(body): Json<CategoryRequest>,
) -> AppResult<Json<Value>> {
    if body.name.trim().is_empty() {
        return Err(AppError::BadRequest("Category name required".into()));
    }

    let category: ProductCategory = sqlx::query_as(
        "INSERT INTO product_categories (id, property_id, name, description) VALUES ($1, $2, $3, $4) RETURNING *",
    )
    .bind(Uuid::new_v4())
    .bind(tenant.property_id)
    .bind(body.name.trim())
    .bind(&body.description)
    .fetch_one(&state.db)
    .await?;

    Ok(Json(json!({ "category": category })))
}

// Movements

pub async fn list_movements(
    State(state): State<AppState>,
    tenant: axum::Extension<TenantContext>,
    Path(id): Path<Uuid>,
    Query(p): Query<PaginationQuery>,
) -> AppResult<Json<Value>> {
    let (limit, offset) = page(p.limit, p.offset, 200);

    let movements: Vec<InventoryMovement> = sqlx::query_as(
        r#"SELECT * FROM inventory_movements
        WHERE product_id = $1 AND property_id = $2
        ORDER BY created_at DESC
        LIMIT $3 OFFSET $4"#,
    )
    .bind(id)
    .bind(tenant.property_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(json!({ "movements": movements })))
}

pub async fn create_movement(
    State(state): State<AppState>,
    tenant: axum::Extension<TenantContext>,
    Path(id): Path<Uuid>,
    Json(body): Json<MovementRequest>,
) -> AppResult<Json<Value>> {
    let mut tx = state.db.begin().await?;

    let movement = inventory::record_movement(
        &mut tx,
        tenant.property_id,
        id,
        body.kind,
        body.quantity,
        body.reference.as_deref(),
        body.notes.as_deref(),
    )
    .await?;

    tx.commit().await?;

    tracing::info!(
        property_id = %tenant.property_id,
        product_id = %id,
        kind = %body.kind,
        before = movement.stock_before,
        after = movement.stock_after,
        "stock movement recorded"
    );
    Ok(Json(json!({ "movement": movement })))
}
