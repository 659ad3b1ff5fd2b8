use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    routing::{get, post, put},
    Json, Router,
};
use tracing::instrument;
use uuid::Uuid;

use crate::{
    auth::{
        extractors::CurrentUser,
        guard::{restaurant_for_manage, MANAGE_ROLES},
    },
    error::ApiError,
    menu_items::{
        dto::{
            CreateMenuItemRequest, DeletedMenuItem, ListMenuItemsQuery, MenuItemList,
            MenuItemView, UpdateMenuItemRequest,
        },
        repo_types::MenuItem,
        services,
    },
    response::{ApiResponse, ApiResult},
    restaurants::handlers::parse_image_upload,
    state::AppState,
};

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/restaurants/:restaurant_id/menu-items",
            get(list_menu_items),
        )
        .route(
            "/restaurants/:restaurant_id/menu-items/:item_id",
            get(get_menu_item),
        )
}

pub fn write_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/restaurants/:restaurant_id/menu-items",
            post(create_menu_item),
        )
        .route(
            "/restaurants/:restaurant_id/menu-items/:item_id",
            put(update_menu_item).delete(delete_menu_item),
        )
        .route(
            "/restaurants/:restaurant_id/menu-items/:item_id/upload",
            post(upload_menu_item_image),
        )
        .layer(DefaultBodyLimit::max(20 * 1024 * 1024))
}

/// Load an item and check it belongs to the restaurant named in the path.
async fn item_in_restaurant(
    state: &AppState,
    restaurant_id: Uuid,
    item_id: Uuid,
) -> Result<MenuItem, ApiError> {
    let item = MenuItem::find_by_id(&state.db, item_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("menu item not found with id {item_id}")))?;
    if item.restaurant_id != restaurant_id {
        return Err(ApiError::Validation(
            "menu item does not belong to this restaurant".into(),
        ));
    }
    Ok(item)
}

#[instrument(skip(state))]
pub async fn list_menu_items(
    State(state): State<AppState>,
    Path(restaurant_id): Path<Uuid>,
    Query(q): Query<ListMenuItemsQuery>,
) -> ApiResult<MenuItemList> {
    let order_by = services::order_by_clause(q.sort.as_deref());
    let items =
        MenuItem::list_for_restaurant(&state.db, restaurant_id, q.category, q.available, order_by)
            .await?;
    let mut views = Vec::with_capacity(items.len());
    for item in items {
        views.push(services::into_view(&state, item).await?);
    }
    Ok(ApiResponse::success(MenuItemList {
        count: views.len(),
        items: views,
    }))
}

#[instrument(skip(state))]
pub async fn get_menu_item(
    State(state): State<AppState>,
    Path((restaurant_id, item_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<MenuItemView> {
    let item = item_in_restaurant(&state, restaurant_id, item_id).await?;
    Ok(ApiResponse::success(services::into_view(&state, item).await?))
}

#[instrument(skip(state, payload))]
pub async fn create_menu_item(
    State(state): State<AppState>,
    CurrentUser(principal): CurrentUser,
    Path(restaurant_id): Path<Uuid>,
    Json(payload): Json<CreateMenuItemRequest>,
) -> ApiResult<MenuItem> {
    principal.require_role(MANAGE_ROLES)?;
    // also proves the parent restaurant exists before the insert
    let restaurant = restaurant_for_manage(&state.db, &principal, restaurant_id).await?;
    let item = services::create(&state, restaurant.id, payload).await?;
    Ok(ApiResponse::created(item))
}

#[instrument(skip(state, payload))]
pub async fn update_menu_item(
    State(state): State<AppState>,
    CurrentUser(principal): CurrentUser,
    Path((restaurant_id, item_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<UpdateMenuItemRequest>,
) -> ApiResult<MenuItem> {
    principal.require_role(MANAGE_ROLES)?;
    restaurant_for_manage(&state.db, &principal, restaurant_id).await?;
    let item = item_in_restaurant(&state, restaurant_id, item_id).await?;
    let updated = services::update(&state, item.id, payload).await?;
    Ok(ApiResponse::success(updated))
}

#[instrument(skip(state))]
pub async fn delete_menu_item(
    State(state): State<AppState>,
    CurrentUser(principal): CurrentUser,
    Path((restaurant_id, item_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<DeletedMenuItem> {
    principal.require_role(MANAGE_ROLES)?;
    restaurant_for_manage(&state.db, &principal, restaurant_id).await?;
    let item = item_in_restaurant(&state, restaurant_id, item_id).await?;
    MenuItem::delete(&state.db, item.id).await?;
    Ok(ApiResponse::success(DeletedMenuItem { id: item.id }))
}

#[instrument(skip(state, mp))]
pub async fn upload_menu_item_image(
    State(state): State<AppState>,
    CurrentUser(principal): CurrentUser,
    Path((restaurant_id, item_id)): Path<(Uuid, Uuid)>,
    mp: Multipart,
) -> ApiResult<MenuItemView> {
    principal.require_role(MANAGE_ROLES)?;
    restaurant_for_manage(&state.db, &principal, restaurant_id).await?;
    let item = item_in_restaurant(&state, restaurant_id, item_id).await?;

    let upload = parse_image_upload(mp).await?;
    let updated = services::upload_image(&state, &item, upload).await?;
    Ok(ApiResponse::success(services::into_view(&state, updated).await?))
}
