use std::sync::Arc;

use crate::config::AppConfig;
use crate::media::{MediaStore, S3Media};
use crate::store::{self, Store};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub config: Arc<AppConfig>,
    pub media: Option<Arc<dyn MediaStore>>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let store = store::connect(&config).await?;

        let media = match config.media.as_ref() {
            Some(media_config) => {
                Some(Arc::new(S3Media::connect(media_config).await?) as Arc<dyn MediaStore>)
            }
            None => {
                tracing::info!("media storage not configured, image uploads disabled");
                None
            }
        };

        Ok(Self {
            store,
            config,
            media,
        })
    }

    /// JSON store in a caller-owned directory plus a media fake; the test
    /// JWT config matches what the token tests assert against.
    #[cfg(test)]
    pub async fn fake(dir: &std::path::Path) -> Self {
        use async_trait::async_trait;
        use bytes::Bytes;

        #[derive(Clone)]
        struct FakeMedia;
        #[async_trait]
        impl MediaStore for FakeMedia {
            async fn put_object(
                &self,
                key: &str,
                _body: Bytes,
                _content_type: &str,
            ) -> anyhow::Result<String> {
                Ok(format!("https://fake.local/{}", key))
            }
        }

        let store = Arc::new(
            store::JsonStore::open(&dir.join("db.json"))
                .await
                .expect("open test store"),
        ) as Arc<dyn Store>;

        let config = Arc::new(AppConfig {
            store_backend: crate::config::StoreBackend::Json,
            database_url: String::new(),
            json_store_path: dir.join("db.json"),
            jwt: crate::config::JwtConfig {
                secret: "test-secret".into(),
                issuer: "test-issuer".into(),
                audience: "test-aud".into(),
                ttl_minutes: 5,
                refresh_ttl_minutes: 60,
            },
            media: None,
        });

        Self {
            store,
            config,
            media: Some(Arc::new(FakeMedia)),
        }
    }
}
