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
    response::{ApiResponse, ApiResult},
    restaurants::{
        dto::{
            CreateRestaurantRequest, DeleteSummary, ListRestaurantsQuery, RestaurantDetails,
            UpdateRestaurantRequest,
        },
        repo::{self, RestaurantFilter},
        repo_types::Restaurant,
        services::{self, ImageUpload},
    },
    state::AppState,
};

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/restaurants", get(list_restaurants))
        .route("/restaurants/:restaurant_id", get(get_restaurant))
}

pub fn write_routes() -> Router<AppState> {
    Router::new()
        .route("/restaurants", post(create_restaurant))
        .route(
            "/restaurants/:restaurant_id",
            put(update_restaurant).delete(delete_restaurant),
        )
        .route("/restaurants/:restaurant_id/upload", post(upload_image))
        .layer(DefaultBodyLimit::max(20 * 1024 * 1024))
}

#[instrument(skip(state))]
pub async fn list_restaurants(
    State(state): State<AppState>,
    Query(q): Query<ListRestaurantsQuery>,
) -> ApiResult<Vec<Restaurant>> {
    let filter = RestaurantFilter {
        status: q.status,
        cuisine: q.cuisine,
        owner_id: q.owner_id,
    };
    let order_by = services::order_by_clause(q.sort.as_deref());
    let rows = Restaurant::list(
        &state.db,
        &filter,
        order_by,
        q.limit.clamp(1, 100),
        q.offset.max(0),
    )
    .await?;
    Ok(ApiResponse::success(rows))
}

#[instrument(skip(state))]
pub async fn get_restaurant(
    State(state): State<AppState>,
    Path(restaurant_id): Path<Uuid>,
) -> ApiResult<RestaurantDetails> {
    let restaurant = Restaurant::find_by_id(&state.db, restaurant_id)
        .await?
        .ok_or_else(|| {
            ApiError::NotFound(format!("restaurant not found with id {restaurant_id}"))
        })?;
    let images = repo::list_images(&state.db, restaurant_id).await?;
    let images = services::presign_gallery(&state, images).await?;
    Ok(ApiResponse::success(RestaurantDetails { restaurant, images }))
}

#[instrument(skip(state, payload))]
pub async fn create_restaurant(
    State(state): State<AppState>,
    CurrentUser(principal): CurrentUser,
    Json(payload): Json<CreateRestaurantRequest>,
) -> ApiResult<Restaurant> {
    principal.require_role(MANAGE_ROLES)?;
    let restaurant = services::create(&state, principal.id, payload).await?;
    Ok(ApiResponse::created(restaurant))
}

#[instrument(skip(state, payload))]
pub async fn update_restaurant(
    State(state): State<AppState>,
    CurrentUser(principal): CurrentUser,
    Path(restaurant_id): Path<Uuid>,
    Json(payload): Json<UpdateRestaurantRequest>,
) -> ApiResult<Restaurant> {
    principal.require_role(MANAGE_ROLES)?;
    let restaurant = restaurant_for_manage(&state.db, &principal, restaurant_id).await?;
    let updated = services::update(&state, restaurant.id, payload).await?;
    Ok(ApiResponse::success(updated))
}

#[instrument(skip(state))]
pub async fn delete_restaurant(
    State(state): State<AppState>,
    CurrentUser(principal): CurrentUser,
    Path(restaurant_id): Path<Uuid>,
) -> ApiResult<DeleteSummary> {
    principal.require_role(MANAGE_ROLES)?;
    let restaurant = restaurant_for_manage(&state.db, &principal, restaurant_id).await?;
    let summary = services::delete_cascade(&state, &restaurant).await?;
    Ok(ApiResponse::success(summary))
}

#[instrument(skip(state, mp))]
pub async fn upload_image(
    State(state): State<AppState>,
    CurrentUser(principal): CurrentUser,
    Path(restaurant_id): Path<Uuid>,
    mp: Multipart,
) -> ApiResult<RestaurantDetails> {
    principal.require_role(MANAGE_ROLES)?;
    let restaurant = restaurant_for_manage(&state.db, &principal, restaurant_id).await?;

    let upload = parse_image_upload(mp).await?;
    let images = services::upload_image(&state, restaurant.id, upload).await?;
    let images = services::presign_gallery(&state, images).await?;
    Ok(ApiResponse::success(RestaurantDetails { restaurant, images }))
}

/// Pull the `file` part plus optional `caption` / `is_primary` fields out of
/// a multipart body.
pub(crate) async fn parse_image_upload(mut mp: Multipart) -> Result<ImageUpload, ApiError> {
    let mut body = None;
    let mut content_type = None;
    let mut caption = None;
    let mut is_primary = None;

    while let Ok(Some(field)) = mp.next_field().await {
        match field.name() {
            Some("file") => {
                content_type = Some(
                    field
                        .content_type()
                        .map(|s| s.to_string())
                        .unwrap_or_else(|| "application/octet-stream".into()),
                );
                body = Some(field.bytes().await.map_err(|e| {
                    ApiError::Upload(format!("failed to read upload: {e}"))
                })?);
            }
            Some("caption") => {
                caption = field.text().await.ok();
            }
            Some("is_primary") | Some("isPrimary") => {
                is_primary = field.text().await.ok().map(|v| v == "true" || v == "1");
            }
            _ => {}
        }
    }

    let body = body.ok_or_else(|| ApiError::Upload("please upload a file".into()))?;
    Ok(ImageUpload {
        body,
        content_type: content_type.unwrap_or_else(|| "application/octet-stream".into()),
        caption,
        is_primary,
    })
}
