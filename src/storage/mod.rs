//! Object storage for user-uploaded images (avatars, post covers).
//!
//! Optional: when no bucket is configured the upload endpoints report the
//! feature as unavailable and the rest of the application is unaffected.

use anyhow::{Context, Result};
use s3::creds::Credentials;
use s3::region::Region;
use s3::Bucket;
use tracing::debug;
use uuid::Uuid;

use crate::config::Config;

/// S3-backed image store.
#[derive(Clone)]
pub struct ImageStore {
    bucket: Box<Bucket>,
    prefix: String,
}

impl ImageStore {
    /// Create a store from configuration. Returns `Ok(None)` when no bucket
    /// is configured.
    pub fn from_config(config: &Config) -> Result<Option<Self>> {
        let Some(bucket_name) = &config.s3_bucket else {
            return Ok(None);
        };

        let access_key = std::env::var("AWS_ACCESS_KEY_ID").context("AWS_ACCESS_KEY_ID not set")?;
        let secret_key =
            std::env::var("AWS_SECRET_ACCESS_KEY").context("AWS_SECRET_ACCESS_KEY not set")?;

        let credentials = Credentials::new(Some(&access_key), Some(&secret_key), None, None, None)
            .context("Failed to create S3 credentials")?;

        let region = if let Some(endpoint) = &config.s3_endpoint {
            Region::Custom {
                region: config.s3_region.clone(),
                endpoint: endpoint.clone(),
            }
        } else {
            config.s3_region.parse().unwrap_or(Region::UsEast1)
        };

        let bucket = Bucket::new(bucket_name, region, credentials)
            .context("Failed to create S3 bucket")?;

        // Use path-style for custom endpoints (MinIO, R2, etc.)
        let bucket = if config.s3_endpoint.is_some() {
            bucket.with_path_style()
        } else {
            bucket
        };

        Ok(Some(Self {
            bucket,
            prefix: config.s3_prefix.clone(),
        }))
    }

    /// Store image bytes under a fresh key, returning the key.
    ///
    /// The key embeds a UUID so uploads never collide or overwrite.
    pub async fn store_image(
        &self,
        kind: &str,
        filename: &str,
        data: &[u8],
    ) -> Result<String> {
        let content_type = mime_guess::from_path(filename)
            .first_or_octet_stream()
            .to_string();

        let extension = filename.rsplit('.').next().unwrap_or("bin");
        let key = format!("{}{kind}/{}.{extension}", self.prefix, Uuid::new_v4());

        debug!(key = %key, content_type = %content_type, size = data.len(), "Uploading image");

        self.bucket
            .put_object_with_content_type(&key, data, &content_type)
            .await
            .context("Failed to upload image")?;

        Ok(key)
    }

    /// Delete a stored image.
    pub async fn delete_image(&self, key: &str) -> Result<()> {
        debug!(key = %key, "Deleting image");

        self.bucket
            .delete_object(key)
            .await
            .context("Failed to delete image")?;

        Ok(())
    }

    /// Public URL for a stored key.
    #[must_use]
    pub fn public_url(&self, key: &str) -> String {
        format!("https://{}.s3.amazonaws.com/{key}", self.bucket.name())
    }
}

impl std::fmt::Debug for ImageStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageStore")
            .field("bucket", &self.bucket.name())
            .finish()
    }
}
