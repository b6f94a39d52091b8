use std::path::PathBuf;

/// Which persistence backend to run against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Json,
    Postgres,
}

/// `DB_MODE=json` selects the document store; any other value (or none)
/// means PostgreSQL.
fn backend_from(mode: &str) -> StoreBackend {
    if mode == "json" {
        StoreBackend::Json
    } else {
        StoreBackend::Postgres
    }
}

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
    pub refresh_ttl_minutes: i64,
}

/// S3-compatible object storage for offer images and avatars. Optional;
/// without it the service runs with uploads disabled.
#[derive(Debug, Clone)]
pub struct MediaConfig {
    pub endpoint: String,
    pub bucket: String,
    pub access_key: String,
    pub secret_key: String,
    pub public_base_url: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub store_backend: StoreBackend,
    pub database_url: String,
    pub json_store_path: PathBuf,
    pub jwt: JwtConfig,
    pub media: Option<MediaConfig>,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let store_backend = backend_from(
            &std::env::var("DB_MODE").unwrap_or_else(|_| "postgres".into()),
        );
        // DATABASE_URL is only required when the relational backend runs.
        let database_url = match store_backend {
            StoreBackend::Postgres => std::env::var("DATABASE_URL")?,
            StoreBackend::Json => std::env::var("DATABASE_URL").unwrap_or_default(),
        };
        let json_store_path =
            PathBuf::from(std::env::var("DB_JSON_PATH").unwrap_or_else(|_| "db.json".into()));

        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "troq".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "troq-users".into()),
            ttl_minutes: std::env::var("JWT_TTL_MINUTES")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(60),
            refresh_ttl_minutes: std::env::var("JWT_REFRESH_TTL_MINUTES")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(60 * 24 * 14),
        };

        let media = match (
            std::env::var("MINIO_ENDPOINT"),
            std::env::var("MINIO_BUCKET"),
            std::env::var("MINIO_ACCESS_KEY"),
            std::env::var("MINIO_SECRET_KEY"),
        ) {
            (Ok(endpoint), Ok(bucket), Ok(access_key), Ok(secret_key)) => {
                let public_base_url = std::env::var("MINIO_PUBLIC_URL")
                    .unwrap_or_else(|_| format!("{endpoint}/{bucket}"));
                Some(MediaConfig {
                    endpoint,
                    bucket,
                    access_key,
                    secret_key,
                    public_base_url,
                })
            }
            _ => None,
        };

        Ok(Self {
            store_backend,
            database_url,
            json_store_path,
            jwt,
            media,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_selector_only_recognises_json() {
        assert_eq!(backend_from("json"), StoreBackend::Json);
        assert_eq!(backend_from("postgres"), StoreBackend::Postgres);
        assert_eq!(backend_from("JSON"), StoreBackend::Postgres);
        assert_eq!(backend_from(""), StoreBackend::Postgres);
        assert_eq!(backend_from("sqlite"), StoreBackend::Postgres);
    }
}
