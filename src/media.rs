use anyhow::Context;
use async_trait::async_trait;
use aws_config::{defaults, BehaviorVersion};
use aws_credential_types::Credentials;
use aws_sdk_s3::{
    config::{Builder as S3ConfigBuilder, Region},
    Client,
};
use aws_smithy_types::byte_stream::ByteStream;
use bytes::Bytes;
use tracing::warn;
use uuid::Uuid;

use crate::config::MediaConfig;

/// External image host. Stores raw bytes under a key and hands back the
/// public URL the stored record will carry.
#[async_trait]
pub trait MediaStore: Send + Sync {
    async fn put_object(
        &self,
        key: &str,
        body: Bytes,
        content_type: &str,
    ) -> anyhow::Result<String>;
}

/// S3-compatible implementation (MinIO in development).
#[derive(Clone)]
pub struct S3Media {
    client: Client,
    bucket: String,
    public_base_url: String,
}

impl S3Media {
    pub async fn connect(config: &MediaConfig) -> anyhow::Result<Self> {
        let shared = defaults(BehaviorVersion::latest())
            .region(Region::new("us-east-1"))
            .credentials_provider(Credentials::new(
                config.access_key.as_str(),
                config.secret_key.as_str(),
                None,
                None,
                "static",
            ))
            .endpoint_url(config.endpoint.as_str())
            .load()
            .await;

        let conf = S3ConfigBuilder::from(&shared)
            .endpoint_url(config.endpoint.as_str())
            .force_path_style(true)
            .build();

        Ok(Self {
            client: Client::from_conf(conf),
            bucket: config.bucket.clone(),
            public_base_url: config.public_base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl MediaStore for S3Media {
    async fn put_object(
        &self,
        key: &str,
        body: Bytes,
        content_type: &str,
    ) -> anyhow::Result<String> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(body))
            .content_type(content_type)
            .send()
            .await
            .context("s3 put_object")?;
        Ok(format!("{}/{}", self.public_base_url, key))
    }
}

/// Best-effort upload. An unconfigured port or a failed put yields `None`
/// and the caller proceeds without an image reference; the entity write
/// itself is never aborted by the image host.
pub async fn try_upload(
    media: Option<&dyn MediaStore>,
    key_prefix: &str,
    content_type: &str,
    body: Bytes,
) -> Option<String> {
    let media = media?;
    let key = object_key(key_prefix, content_type);
    match media.put_object(&key, body, content_type).await {
        Ok(url) => Some(url),
        Err(err) => {
            warn!(error = %err, key = %key, "image upload failed, continuing without image");
            None
        }
    }
}

fn object_key(prefix: &str, content_type: &str) -> String {
    format!("{prefix}/{}.{}", Uuid::new_v4(), ext_from_mime(content_type))
}

fn ext_from_mime(content_type: &str) -> &'static str {
    match content_type {
        "image/png" => "png",
        "image/webp" => "webp",
        "image/gif" => "gif",
        _ => "jpg",
    }
}
