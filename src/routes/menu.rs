use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::{
    error::ApiError,
    models::menu::{CreateMenuRequest, MenuType, UpdateMenuRequest},
    services::menu::MenuService,
    AppState,
};

/// GET /api/menu — all entries with their variant attached.
pub async fn list_menus(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let menus = MenuService::list(&state.db).await?;
    Ok(Json(serde_json::to_value(menus).unwrap()))
}

/// GET /api/menu/{id}
pub async fn get_menu(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    let menu = MenuService::get(&state.db, id).await?;
    Ok(Json(serde_json::to_value(menu).unwrap()))
}

/// GET /api/menu/type/{type} where type is normal, kids or allergy.
pub async fn list_menus_by_type(
    State(state): State<AppState>,
    Path(menu_type): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let menu_type = MenuType::parse(&menu_type)
        .ok_or_else(|| ApiError::Validation("Invalid menu type".into()))?;
    let menus = MenuService::list_by_type(&state.db, menu_type).await?;
    Ok(Json(serde_json::to_value(menus).unwrap()))
}

/// GET /api/menu/weekly — the full 7x3 grid, rebuilt on every call.
pub async fn weekly_menu(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let grid = MenuService::weekly(&state.db).await?;
    Ok(Json(serde_json::to_value(grid).unwrap()))
}

/// POST /api/menu — create a base entry plus its variant row.
pub async fn create_menu(
    State(state): State<AppState>,
    Json(body): Json<CreateMenuRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let new = body.validate()?;
    let (menu, specific) = MenuService::create_with_variant(&state.db, new).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "menu": menu, "specificMenu": specific })),
    ))
}

/// PUT /api/menu/{id} — partial update of base fields only.
pub async fn update_menu(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateMenuRequest>,
) -> Result<Json<Value>, ApiError> {
    let menu = MenuService::update(&state.db, id, &body).await?;
    Ok(Json(serde_json::to_value(menu).unwrap()))
}

/// DELETE /api/menu/{id}
pub async fn delete_menu(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    MenuService::delete(&state.db, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
