use anyhow::Context;
use bytes::Bytes;
use tracing::{error, info};
use uuid::Uuid;

use crate::error::{conflict_on_unique, ApiError};
use crate::restaurants::dto::{
    CreateRestaurantRequest, DeleteSummary, ImageView, UpdateRestaurantRequest,
};
use crate::restaurants::repo::{self, NewRestaurant, RestaurantPatch};
use crate::restaurants::repo_types::{Restaurant, RestaurantImage, RestaurantStatus};
use crate::state::AppState;
use crate::storage::{restaurant_image_key, StorageClient};

const PRICE_RANGES: &[&str] = &["$", "$$", "$$$", "$$$$"];

// ---- validate ----

fn validate_name(name: &str) -> Result<String, ApiError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ApiError::Validation("please add a restaurant name".into()));
    }
    if name.len() > 100 {
        return Err(ApiError::Validation(
            "name cannot be more than 100 characters".into(),
        ));
    }
    Ok(name.to_string())
}

fn validate_description(description: &str) -> Result<String, ApiError> {
    if description.is_empty() {
        return Err(ApiError::Validation("please add a description".into()));
    }
    if description.len() > 2000 {
        return Err(ApiError::Validation(
            "description cannot be more than 2000 characters".into(),
        ));
    }
    Ok(description.to_string())
}

fn validate_price_range(price_range: &str) -> Result<String, ApiError> {
    if !PRICE_RANGES.contains(&price_range) {
        return Err(ApiError::Validation(
            "please specify a price range ($ to $$$$)".into(),
        ));
    }
    Ok(price_range.to_string())
}

fn validate_phone(phone: &str) -> Result<String, ApiError> {
    let phone = phone.trim();
    if phone.is_empty() {
        return Err(ApiError::Validation(
            "please provide a contact phone number".into(),
        ));
    }
    if phone.len() > 20 {
        return Err(ApiError::Validation(
            "phone number cannot be more than 20 characters".into(),
        ));
    }
    Ok(phone.to_string())
}

pub fn validate_new(req: CreateRestaurantRequest) -> Result<NewRestaurant, ApiError> {
    let name = validate_name(&req.name)?;
    let description = validate_description(&req.description)?;
    if req.address.trim().is_empty() {
        return Err(ApiError::Validation("please add an address".into()));
    }
    if req.cuisine.is_empty() {
        return Err(ApiError::Validation(
            "please specify at least one cuisine type".into(),
        ));
    }
    Ok(NewRestaurant {
        name,
        description,
        address: req.address.trim().to_string(),
        cuisine: req.cuisine,
        price_range: validate_price_range(&req.price_range)?,
        phone: validate_phone(&req.phone)?,
        status: req.status.unwrap_or(RestaurantStatus::Inactive),
    })
}

pub fn validate_patch(req: UpdateRestaurantRequest) -> Result<RestaurantPatch, ApiError> {
    let name = req.name.as_deref().map(validate_name).transpose()?;
    let description = req
        .description
        .as_deref()
        .map(validate_description)
        .transpose()?;
    if let Some(cuisine) = &req.cuisine {
        if cuisine.is_empty() {
            return Err(ApiError::Validation(
                "please specify at least one cuisine type".into(),
            ));
        }
    }
    Ok(RestaurantPatch {
        name,
        description,
        address: req.address.map(|a| a.trim().to_string()),
        cuisine: req.cuisine,
        price_range: req
            .price_range
            .as_deref()
            .map(validate_price_range)
            .transpose()?,
        phone: req.phone.as_deref().map(validate_phone).transpose()?,
        status: req.status,
    })
}

/// Whitelisted sort keys; anything else falls back to name order.
pub fn order_by_clause(sort: Option<&str>) -> &'static str {
    match sort {
        Some("newest") | Some("created_at") => "created_at DESC",
        Some("status") => "status ASC, name ASC",
        _ => "name ASC",
    }
}

// ---- persist ----

pub async fn create(
    state: &AppState,
    owner_id: Uuid,
    req: CreateRestaurantRequest,
) -> Result<Restaurant, ApiError> {
    let new = validate_new(req)?;
    let restaurant = Restaurant::insert(&state.db, owner_id, &new)
        .await
        .map_err(|e| conflict_on_unique(e, "a restaurant with that name already exists"))?;
    info!(restaurant_id = %restaurant.id, owner_id = %owner_id, "restaurant created");
    Ok(restaurant)
}

pub async fn update(
    state: &AppState,
    restaurant_id: Uuid,
    req: UpdateRestaurantRequest,
) -> Result<Restaurant, ApiError> {
    let patch = validate_patch(req)?;
    Restaurant::update(&state.db, restaurant_id, &patch)
        .await
        .map_err(|e| conflict_on_unique(e, "a restaurant with that name already exists"))
}

/// Outcome of the cascade transaction. Zero restaurants removed means the row
/// vanished between the guard's load and the delete, so the whole cascade must
/// roll back as NotFound rather than commit orphaned deletions.
pub(crate) fn cascade_summary(
    restaurant_id: Uuid,
    menu_items_deleted: u64,
    images_deleted: u64,
    restaurants_removed: u64,
) -> Result<DeleteSummary, ApiError> {
    if restaurants_removed == 0 {
        return Err(ApiError::NotFound(format!(
            "restaurant not found with id {restaurant_id}"
        )));
    }
    Ok(DeleteSummary {
        menu_items_deleted,
        images_deleted,
    })
}

/// Cascade delete: menu items, gallery rows, then the restaurant, all in one
/// transaction. A mid-cascade failure rolls back and surfaces as an internal
/// error rather than committing a partial state. Stored objects are removed
/// best-effort once the commit has succeeded.
pub async fn delete_cascade(
    state: &AppState,
    restaurant: &Restaurant,
) -> Result<DeleteSummary, ApiError> {
    let keys = repo::image_keys(&state.db, restaurant.id).await?;

    let mut tx = state.db.begin().await.context("begin cascade delete")?;
    let menu_items_deleted =
        crate::menu_items::repo::delete_all_for_restaurant_tx(&mut tx, restaurant.id)
            .await
            .context("cascade: delete menu items")?;
    let images_deleted = repo::delete_images_tx(&mut tx, restaurant.id)
        .await
        .context("cascade: delete image rows")?;
    let removed = Restaurant::delete_tx(&mut tx, restaurant.id)
        .await
        .context("cascade: delete restaurant")?;
    let summary = cascade_summary(restaurant.id, menu_items_deleted, images_deleted, removed)?;
    tx.commit().await.context("commit cascade delete")?;

    for key in keys {
        discard_stored_object(state.storage.as_ref(), &key).await;
    }

    info!(
        restaurant_id = %restaurant.id,
        summary.menu_items_deleted,
        summary.images_deleted,
        "restaurant deleted"
    );
    Ok(summary)
}

// ---- images ----

pub struct ImageUpload {
    pub body: Bytes,
    pub content_type: String,
    pub caption: Option<String>,
    pub is_primary: Option<bool>,
}

pub(crate) fn validate_image(
    content_type: &str,
    size: usize,
    max_bytes: usize,
) -> Result<(), ApiError> {
    if !content_type.starts_with("image/") {
        return Err(ApiError::Upload("please upload an image file".into()));
    }
    if size > max_bytes {
        return Err(ApiError::Upload(format!(
            "please upload an image smaller than {} bytes",
            max_bytes
        )));
    }
    Ok(())
}

/// A new image becomes primary when the gallery has no primary yet, or when
/// the caller explicitly asks for it; existing primaries are then demoted so
/// the gallery never holds two.
pub(crate) fn resolve_primary(has_existing_primary: bool, requested: Option<bool>) -> bool {
    if !has_existing_primary {
        return true;
    }
    requested.unwrap_or(false)
}

/// Delete a stored object whose database record never landed (or was just
/// removed); failures only log, the caller's own result stands.
pub(crate) async fn discard_stored_object(storage: &dyn StorageClient, key: &str) {
    if let Err(e) = storage.delete_object(key).await {
        error!(error = ?e, key = %key, "orphaned stored object");
    }
}

async fn persist_gallery_row(
    state: &AppState,
    restaurant_id: Uuid,
    image_id: Uuid,
    key: &str,
    caption: Option<&str>,
    requested_primary: Option<bool>,
) -> Result<bool, ApiError> {
    let has_primary = repo::has_primary_image(&state.db, restaurant_id).await?;
    let is_primary = resolve_primary(has_primary, requested_primary);

    let mut tx = state.db.begin().await.context("begin image insert")?;
    if is_primary && has_primary {
        repo::demote_primary_tx(&mut tx, restaurant_id).await?;
    }
    repo::insert_image_tx(&mut tx, image_id, restaurant_id, key, caption, is_primary).await?;
    tx.commit().await.context("commit image insert")?;
    Ok(is_primary)
}

pub async fn upload_image(
    state: &AppState,
    restaurant_id: Uuid,
    upload: ImageUpload,
) -> Result<Vec<RestaurantImage>, ApiError> {
    validate_image(
        &upload.content_type,
        upload.body.len(),
        state.config.max_upload_bytes,
    )?;

    let image_id = Uuid::new_v4();
    let key = restaurant_image_key(restaurant_id, image_id, &upload.content_type);

    state
        .storage
        .put_object(&key, upload.body, &upload.content_type)
        .await
        .with_context(|| format!("put_object {key}"))?;

    let is_primary = match persist_gallery_row(
        state,
        restaurant_id,
        image_id,
        &key,
        upload.caption.as_deref(),
        upload.is_primary,
    )
    .await
    {
        Ok(is_primary) => is_primary,
        Err(err) => {
            // the object is already stored; take it back out instead of
            // leaving it orphaned
            discard_stored_object(state.storage.as_ref(), &key).await;
            return Err(err);
        }
    };

    info!(restaurant_id = %restaurant_id, image_id = %image_id, is_primary, "image uploaded");
    Ok(repo::list_images(&state.db, restaurant_id).await?)
}

pub async fn presign_gallery(
    state: &AppState,
    images: Vec<RestaurantImage>,
) -> anyhow::Result<Vec<ImageView>> {
    let mut out = Vec::with_capacity(images.len());
    for image in images {
        let url = state.storage.presign(&image.s3_key).await?;
        out.push(ImageView {
            id: image.id,
            url,
            caption: image.caption,
            is_primary: image.is_primary,
        });
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::restaurants::dto::CreateRestaurantRequest;
    use async_trait::async_trait;
    use std::sync::Mutex;

    fn create_req() -> CreateRestaurantRequest {
        CreateRestaurantRequest {
            name: "Cafe X".into(),
            description: "Small plates".into(),
            address: "1 Main St".into(),
            cuisine: vec!["bistro".into()],
            price_range: "$$".into(),
            phone: "555-123-4567".into(),
            status: None,
        }
    }

    #[test]
    fn validate_new_accepts_complete_request() {
        let new = validate_new(create_req()).unwrap();
        assert_eq!(new.name, "Cafe X");
        assert_eq!(new.price_range, "$$");
        assert_eq!(new.phone, "555-123-4567");
        assert_eq!(new.status, RestaurantStatus::Inactive);
    }

    #[test]
    fn validate_new_rejects_missing_fields() {
        let mut req = create_req();
        req.name = "  ".into();
        assert!(matches!(
            validate_new(req).unwrap_err(),
            ApiError::Validation(_)
        ));

        let mut req = create_req();
        req.cuisine.clear();
        assert!(validate_new(req).is_err());

        let mut req = create_req();
        req.name = "x".repeat(101);
        assert!(validate_new(req).is_err());
    }

    #[test]
    fn price_range_must_be_a_known_tier() {
        for tier in ["$", "$$", "$$$", "$$$$"] {
            let mut req = create_req();
            req.price_range = tier.into();
            assert!(validate_new(req).is_ok());
        }

        let mut req = create_req();
        req.price_range = "$$$$$".into();
        assert!(validate_new(req).is_err());

        let mut req = create_req();
        req.price_range = "cheap".into();
        assert!(matches!(
            validate_new(req).unwrap_err(),
            ApiError::Validation(_)
        ));
    }

    #[test]
    fn phone_is_required_and_bounded() {
        let mut req = create_req();
        req.phone = "  ".into();
        assert!(validate_new(req).is_err());

        let mut req = create_req();
        req.phone = "5".repeat(21);
        assert!(validate_new(req).is_err());
    }

    #[test]
    fn patch_validates_provided_fields_only() {
        let patch = validate_patch(UpdateRestaurantRequest {
            name: None,
            description: None,
            address: None,
            cuisine: None,
            price_range: Some("$$$".into()),
            phone: None,
            status: None,
        })
        .unwrap();
        assert_eq!(patch.price_range.as_deref(), Some("$$$"));

        assert!(validate_patch(UpdateRestaurantRequest {
            name: None,
            description: None,
            address: None,
            cuisine: None,
            price_range: Some("free".into()),
            phone: None,
            status: None,
        })
        .is_err());
    }

    #[test]
    fn order_by_only_emits_whitelisted_clauses() {
        assert_eq!(order_by_clause(Some("newest")), "created_at DESC");
        assert_eq!(order_by_clause(Some("name")), "name ASC");
        assert_eq!(order_by_clause(Some("; DROP TABLE users")), "name ASC");
        assert_eq!(order_by_clause(None), "name ASC");
    }

    #[test]
    fn cascade_keeps_counts_when_restaurant_removed() {
        let id = Uuid::new_v4();
        let summary = cascade_summary(id, 3, 2, 1).unwrap();
        assert_eq!(summary.menu_items_deleted, 3);
        assert_eq!(summary.images_deleted, 2);
    }

    #[test]
    fn cascade_with_no_restaurant_row_is_not_found() {
        let id = Uuid::new_v4();
        let err = cascade_summary(id, 3, 2, 0).unwrap_err();
        match err {
            ApiError::NotFound(msg) => assert!(msg.contains(&id.to_string())),
            other => panic!("expected NotFound, got {other:?}"),
        }
    }

    #[test]
    fn first_image_always_becomes_primary() {
        assert!(resolve_primary(false, None));
        assert!(resolve_primary(false, Some(false)));
    }

    #[test]
    fn second_image_without_flag_keeps_existing_primary() {
        assert!(!resolve_primary(true, None));
        assert!(!resolve_primary(true, Some(false)));
    }

    #[test]
    fn explicit_flag_takes_primary_over() {
        assert!(resolve_primary(true, Some(true)));
    }

    #[test]
    fn image_validation_checks_type_and_size() {
        assert!(validate_image("image/png", 100, 1024).is_ok());
        assert!(matches!(
            validate_image("application/pdf", 100, 1024).unwrap_err(),
            ApiError::Upload(_)
        ));
        assert!(matches!(
            validate_image("image/png", 2048, 1024).unwrap_err(),
            ApiError::Upload(_)
        ));
    }

    #[derive(Default)]
    struct RecordingStorage {
        deleted: Mutex<Vec<String>>,
        fail_delete: bool,
    }

    #[async_trait]
    impl StorageClient for RecordingStorage {
        async fn put_object(
            &self,
            _key: &str,
            _body: Bytes,
            _content_type: &str,
        ) -> anyhow::Result<()> {
            Ok(())
        }

        async fn delete_object(&self, key: &str) -> anyhow::Result<()> {
            if self.fail_delete {
                anyhow::bail!("delete refused");
            }
            self.deleted.lock().unwrap().push(key.to_string());
            Ok(())
        }

        async fn presign_get(&self, key: &str, _seconds: u64) -> anyhow::Result<String> {
            Ok(key.to_string())
        }
    }

    #[tokio::test]
    async fn failed_persist_removes_the_stored_object() {
        let storage = RecordingStorage::default();
        discard_stored_object(&storage, "restaurants/a/b.jpg").await;
        assert_eq!(
            storage.deleted.lock().unwrap().as_slice(),
            ["restaurants/a/b.jpg"]
        );
    }

    #[tokio::test]
    async fn orphan_cleanup_failure_does_not_propagate() {
        let storage = RecordingStorage {
            fail_delete: true,
            ..Default::default()
        };
        discard_stored_object(&storage, "restaurants/a/b.jpg").await;
        assert!(storage.deleted.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn presign_gallery_uses_storage_urls() {
        let state = AppState::fake();
        let images = vec![RestaurantImage {
            id: Uuid::new_v4(),
            restaurant_id: Uuid::new_v4(),
            s3_key: "restaurants/a/b.jpg".into(),
            caption: Some("front".into()),
            is_primary: true,
            created_at: time::OffsetDateTime::UNIX_EPOCH,
        }];
        let views = presign_gallery(&state, images).await.unwrap();
        assert_eq!(views.len(), 1);
        assert!(views[0].url.contains("restaurants/a/b.jpg"));
        assert!(views[0].is_primary);
    }
}
