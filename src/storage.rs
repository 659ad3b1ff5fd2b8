use anyhow::Context;
use async_trait::async_trait;
use aws_config::{defaults, BehaviorVersion};
use aws_credential_types::Credentials;
use aws_sdk_s3::{
    config::{Builder as S3ConfigBuilder, Region},
    presigning::PresigningConfig,
    Client,
};
use aws_smithy_types::byte_stream::ByteStream;
use bytes::Bytes;
use uuid::Uuid;

use crate::config::StorageConfig;

/// Presigned read URLs stay valid long enough for a page render, not longer.
pub const PRESIGN_TTL_SECS: u64 = 10 * 60;

/// Object keys are namespaced per owning resource so a restaurant's objects
/// can be enumerated and cleaned up by prefix.
pub fn restaurant_image_key(restaurant_id: Uuid, image_id: Uuid, content_type: &str) -> String {
    format!(
        "restaurants/{}/{}.{}",
        restaurant_id,
        image_id,
        ext_from_mime(content_type).unwrap_or("bin")
    )
}

pub fn menu_item_image_key(restaurant_id: Uuid, image_id: Uuid, content_type: &str) -> String {
    format!(
        "menu-items/{}/{}.{}",
        restaurant_id,
        image_id,
        ext_from_mime(content_type).unwrap_or("bin")
    )
}

pub(crate) fn ext_from_mime(ct: &str) -> Option<&'static str> {
    match ct {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/webp" => Some("webp"),
        "image/heic" => Some("heic"),
        _ => None,
    }
}

/// Blob store contract: store bytes under a key, delete, presign reads.
/// Errors propagate to the caller; nothing here retries.
#[async_trait]
pub trait StorageClient: Send + Sync {
    async fn put_object(&self, key: &str, body: Bytes, content_type: &str) -> anyhow::Result<()>;
    async fn delete_object(&self, key: &str) -> anyhow::Result<()>;
    async fn presign_get(&self, key: &str, seconds: u64) -> anyhow::Result<String>;

    /// Presign with the standard read TTL.
    async fn presign(&self, key: &str) -> anyhow::Result<String> {
        self.presign_get(key, PRESIGN_TTL_SECS).await
    }
}

#[derive(Clone)]
pub struct S3Storage {
    client: Client,
    bucket: String,
}

impl S3Storage {
    pub async fn new(config: &StorageConfig) -> anyhow::Result<Self> {
        let shared = defaults(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .credentials_provider(Credentials::new(
                config.access_key.clone(),
                config.secret_key.clone(),
                None,
                None,
                "static",
            ))
            .endpoint_url(&config.endpoint)
            .load()
            .await;

        // path-style addressing so MinIO-style endpoints work
        let conf = S3ConfigBuilder::from(&shared)
            .endpoint_url(&config.endpoint)
            .force_path_style(true)
            .build();

        Ok(Self {
            client: Client::from_conf(conf),
            bucket: config.bucket.clone(),
        })
    }
}

#[async_trait]
impl StorageClient for S3Storage {
    async fn put_object(&self, key: &str, body: Bytes, content_type: &str) -> anyhow::Result<()> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(body))
            .content_type(content_type)
            .send()
            .await
            .context("s3 put_object")?;
        Ok(())
    }

    async fn delete_object(&self, key: &str) -> anyhow::Result<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .context("s3 delete_object")?;
        Ok(())
    }

    async fn presign_get(&self, key: &str, seconds: u64) -> anyhow::Result<String> {
        let req = self.client.get_object().bucket(&self.bucket).key(key);
        let presigned = req
            .presigned(PresigningConfig::expires_in(
                std::time::Duration::from_secs(seconds),
            )?)
            .await
            .context("s3 presign_get")?;
        Ok(presigned.uri().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::AppState;

    #[test]
    fn restaurant_keys_are_namespaced_by_restaurant() {
        let rid = Uuid::new_v4();
        let iid = Uuid::new_v4();
        let key = restaurant_image_key(rid, iid, "image/png");
        assert_eq!(key, format!("restaurants/{rid}/{iid}.png"));
    }

    #[test]
    fn menu_item_keys_are_namespaced_by_restaurant() {
        let rid = Uuid::new_v4();
        let iid = Uuid::new_v4();
        let key = menu_item_image_key(rid, iid, "image/jpeg");
        assert_eq!(key, format!("menu-items/{rid}/{iid}.jpg"));
    }

    #[test]
    fn unknown_mime_falls_back_to_bin() {
        let rid = Uuid::new_v4();
        let iid = Uuid::new_v4();
        let key = restaurant_image_key(rid, iid, "application/octet-stream");
        assert!(key.ends_with(".bin"));
    }

    #[test]
    fn mime_extension_mapping() {
        assert_eq!(ext_from_mime("image/jpeg"), Some("jpg"));
        assert_eq!(ext_from_mime("image/jpg"), Some("jpg"));
        assert_eq!(ext_from_mime("image/png"), Some("png"));
        assert_eq!(ext_from_mime("image/webp"), Some("webp"));
        assert_eq!(ext_from_mime("image/heic"), Some("heic"));
        assert_eq!(ext_from_mime("application/pdf"), None);
    }

    #[tokio::test]
    async fn default_presign_uses_standard_ttl() {
        let state = AppState::fake();
        let url = state.storage.presign("restaurants/a/b.jpg").await.unwrap();
        assert!(url.contains("restaurants/a/b.jpg"));
    }
}
