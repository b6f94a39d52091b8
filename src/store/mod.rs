//! Persistence port with two interchangeable backends.
//!
//! [`connect`] picks the backend from configuration at startup; everything
//! above it holds an `Arc<dyn Store>` and cannot tell which one it got.

use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use crate::config::{AppConfig, StoreBackend};

mod error;
mod json;
mod postgres;
mod types;

pub use error::StoreError;
pub use json::JsonStore;
pub use postgres::PgStore;
pub use types::{
    CategoryFilter, NewOffer, NewUser, Offer, OfferDetails, OfferFilter, OfferSummary, OfferType,
    OfferUpdate, User, UserProfile, UserUpdate, UNKNOWN_AUTHOR_EMAIL, UNKNOWN_AUTHOR_NAME,
};

pub type StoreResult<T> = Result<T, StoreError>;

/// Contract both backends implement. Callers pass the acting identity
/// explicitly; the store decides ownership and reports `AccessDenied`
/// itself so the two backends stay behaviorally identical.
#[async_trait]
pub trait Store: Send + Sync {
    /// Credential included; login verifies against this record.
    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>>;
    /// Returns the generated id; `DuplicateEmail` when the email exists.
    async fn create_user(&self, user: NewUser) -> StoreResult<Uuid>;
    async fn find_user_by_id(&self, id: Uuid) -> StoreResult<Option<UserProfile>>;
    async fn find_user_by_id_with_password(&self, id: Uuid) -> StoreResult<Option<User>>;
    /// `DuplicateEmail` when the new email belongs to a different user,
    /// `NotFound` when the id is unknown, in that order.
    async fn update_user(&self, id: Uuid, update: UserUpdate) -> StoreResult<UserProfile>;
    async fn update_user_password(&self, id: Uuid, password_hash: &str) -> StoreResult<Uuid>;
    /// Case-insensitive substring match on fullname, ordered by fullname.
    /// A blank term yields an empty list without touching storage.
    async fn find_users_by_name(&self, term: &str) -> StoreResult<Vec<UserProfile>>;

    async fn create_offer(&self, offer: NewOffer) -> StoreResult<Uuid>;
    /// Public listing with resolved author names, newest first.
    async fn list_offers(&self, filter: OfferFilter) -> StoreResult<Vec<OfferSummary>>;
    async fn get_offer(&self, id: Uuid) -> StoreResult<Option<OfferDetails>>;
    /// Raw record for the edit form. `None` covers both a missing offer
    /// and one owned by someone else.
    async fn get_offer_for_owner(&self, id: Uuid, owner_id: Uuid) -> StoreResult<Option<Offer>>;
    async fn list_offers_by_owner(&self, owner_id: Uuid) -> StoreResult<Vec<Offer>>;
    async fn update_offer(
        &self,
        id: Uuid,
        owner_id: Uuid,
        update: OfferUpdate,
    ) -> StoreResult<Offer>;
    async fn delete_offer(&self, id: Uuid, owner_id: Uuid) -> StoreResult<()>;
}

/// Connect the backend named by configuration.
pub async fn connect(config: &AppConfig) -> anyhow::Result<Arc<dyn Store>> {
    match config.store_backend {
        StoreBackend::Json => {
            let store = JsonStore::open(&config.json_store_path).await?;
            tracing::info!(path = %config.json_store_path.display(), "using JSON document store");
            Ok(Arc::new(store))
        }
        StoreBackend::Postgres => {
            let store = PgStore::connect(&config.database_url).await?;
            tracing::info!("using PostgreSQL store");
            Ok(Arc::new(store))
        }
    }
}
