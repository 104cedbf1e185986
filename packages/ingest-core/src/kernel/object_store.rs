//! Tenant-scoped blob storage for uploaded documents.
//!
//! Wraps an S3-compatible store (MinIO in most deployments) and keeps
//! every object under the owning tenant's prefix:
//! `tenant_{id}/documents/{timestamp}_{filename}`.

use anyhow::{Context, Result};
use bytes::Bytes;
use chrono::Utc;
use futures::TryStreamExt;
use object_store::aws::AmazonS3Builder;
use object_store::path::Path as ObjectPath;
use object_store::ObjectStore;
use std::sync::Arc;

use crate::common::TenantId;
use crate::config::Config;

pub struct DocumentStorage {
    store: Arc<dyn ObjectStore>,
}

impl DocumentStorage {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    /// Build against the configured S3/MinIO endpoint.
    pub fn from_config(config: &Config) -> Result<Self> {
        let endpoint = config
            .minio_endpoint
            .as_deref()
            .context("MINIO_ENDPOINT must be set")?;
        let access_key = config
            .minio_access_key
            .as_deref()
            .context("MINIO_ACCESS_KEY must be set")?;
        let secret_key = config
            .minio_secret_key
            .as_deref()
            .context("MINIO_SECRET_KEY must be set")?;
        let bucket = config
            .minio_bucket_name
            .as_deref()
            .context("MINIO_BUCKET_NAME must be set")?;

        let store = AmazonS3Builder::new()
            .with_endpoint(endpoint)
            .with_access_key_id(access_key)
            .with_secret_access_key(secret_key)
            .with_bucket_name(bucket)
            .with_region("us-east-1")
            .with_allow_http(true)
            .build()
            .context("Failed to initialize object store client")?;

        Ok(Self {
            store: Arc::new(store),
        })
    }

    /// Store an uploaded file under the tenant's documents prefix and
    /// return the object path.
    pub async fn upload_document(
        &self,
        tenant_id: TenantId,
        filename: &str,
        data: Bytes,
    ) -> Result<String> {
        let timestamp = Utc::now().format("%Y%m%d_%H%M%S");
        let key = format!("tenant_{tenant_id}/documents/{timestamp}_{filename}");
        let path = ObjectPath::from(key.clone());

        self.store
            .put(&path, data.into())
            .await
            .with_context(|| format!("Failed to upload object {key}"))?;

        tracing::debug!(tenant_id = %tenant_id, key = %key, "Uploaded document blob");
        Ok(key)
    }

    pub async fn download(&self, key: &str) -> Result<Bytes> {
        let path = ObjectPath::from(key);
        let result = self
            .store
            .get(&path)
            .await
            .with_context(|| format!("Failed to fetch object {key}"))?;
        result
            .bytes()
            .await
            .with_context(|| format!("Failed to read object {key}"))
    }

    pub async fn delete(&self, key: &str) -> Result<()> {
        let path = ObjectPath::from(key);
        self.store
            .delete(&path)
            .await
            .with_context(|| format!("Failed to delete object {key}"))
    }

    /// List document object paths for one tenant.
    pub async fn list_documents(&self, tenant_id: TenantId) -> Result<Vec<String>> {
        let prefix = ObjectPath::from(format!("tenant_{tenant_id}/documents"));
        let objects: Vec<_> = self
            .store
            .list(Some(&prefix))
            .try_collect()
            .await
            .context("Failed to list tenant documents")?;
        Ok(objects.into_iter().map(|m| m.location.to_string()).collect())
    }
}
