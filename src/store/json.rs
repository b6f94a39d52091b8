use std::path::{Path, PathBuf};

use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tokio::fs;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::error::StoreError;
use super::types::{
    CategoryFilter, NewOffer, NewUser, Offer, OfferDetails, OfferFilter, OfferSummary,
    OfferUpdate, User, UserProfile, UserUpdate, UNKNOWN_AUTHOR_EMAIL, UNKNOWN_AUTHOR_NAME,
};
use super::{Store, StoreResult};

/// The entire store as persisted: one document, two collections.
#[derive(Debug, Default, Serialize, Deserialize)]
struct Document {
    #[serde(default)]
    users: Vec<User>,
    #[serde(default)]
    offers: Vec<Offer>,
}

/// Flat-file backend. Every operation reads the whole document from disk;
/// mutations rewrite it through a temp file and an atomic rename, so a
/// concurrent reader never sees a torn document. The mutex serializes
/// read-modify-write cycles within this process.
pub struct JsonStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonStore {
    /// Opens the store at `path`. A missing document is initialized empty
    /// and persisted immediately; an unreadable one fails startup.
    pub async fn open(path: &Path) -> anyhow::Result<Self> {
        let store = Self {
            path: path.to_path_buf(),
            write_lock: Mutex::new(()),
        };
        if fs::metadata(&store.path).await.is_ok() {
            store.load().await.context("read store document")?;
        } else {
            if let Some(parent) = store.path.parent() {
                if !parent.as_os_str().is_empty() {
                    fs::create_dir_all(parent)
                        .await
                        .context("create store directory")?;
                }
            }
            store.persist(&Document::default()).await?;
        }
        Ok(store)
    }

    async fn load(&self) -> StoreResult<Document> {
        let raw = fs::read(&self.path).await?;
        let doc = serde_json::from_slice(&raw)?;
        Ok(doc)
    }

    async fn persist(&self, doc: &Document) -> StoreResult<()> {
        let mut tmp = self.path.as_os_str().to_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        let raw = serde_json::to_vec_pretty(doc)?;
        fs::write(&tmp, raw).await?;
        fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

fn resolve_author(users: &[User], owner_id: Uuid) -> (String, String) {
    users
        .iter()
        .find(|u| u.id == owner_id)
        .map(|u| (u.fullname.clone(), u.email.clone()))
        .unwrap_or_else(|| {
            (
                UNKNOWN_AUTHOR_NAME.to_string(),
                UNKNOWN_AUTHOR_EMAIL.to_string(),
            )
        })
}

fn matches_search(offer: &Offer, term: &str) -> bool {
    let needle = term.to_lowercase();
    offer.title.to_lowercase().contains(&needle)
        || offer
            .description
            .as_deref()
            .map_or(false, |d| d.to_lowercase().contains(&needle))
}

fn matches_category(offer: &Offer, filter: &CategoryFilter) -> bool {
    match filter {
        CategoryFilter::OfferType(kind) => offer.offer_type == kind.as_str(),
        CategoryFilter::Category(tag) => offer.category.as_deref() == Some(tag.as_str()),
    }
}

fn summary(offer: &Offer, users: &[User]) -> OfferSummary {
    let (author_name, _) = resolve_author(users, offer.owner_id);
    OfferSummary {
        id: offer.id,
        offer_type: offer.offer_type.clone(),
        title: offer.title.clone(),
        description: offer.description.clone(),
        created_at: offer.created_at,
        image_url: offer.image_url.clone(),
        phone: offer.phone.clone(),
        address: offer.address.clone(),
        category: offer.category.clone(),
        author_name,
    }
}

#[async_trait]
impl Store for JsonStore {
    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let doc = self.load().await?;
        Ok(doc.users.into_iter().find(|u| u.email == email))
    }

    async fn create_user(&self, user: NewUser) -> StoreResult<Uuid> {
        let _guard = self.write_lock.lock().await;
        let mut doc = self.load().await?;
        if doc.users.iter().any(|u| u.email == user.email) {
            return Err(StoreError::DuplicateEmail);
        }
        let record = User {
            id: Uuid::new_v4(),
            fullname: user.fullname,
            email: user.email,
            password_hash: user.password_hash,
            created_at: OffsetDateTime::now_utc(),
            avatar_url: None,
        };
        let id = record.id;
        doc.users.push(record);
        self.persist(&doc).await?;
        Ok(id)
    }

    async fn find_user_by_id(&self, id: Uuid) -> StoreResult<Option<UserProfile>> {
        let doc = self.load().await?;
        Ok(doc
            .users
            .into_iter()
            .find(|u| u.id == id)
            .map(UserProfile::from))
    }

    async fn find_user_by_id_with_password(&self, id: Uuid) -> StoreResult<Option<User>> {
        let doc = self.load().await?;
        Ok(doc.users.into_iter().find(|u| u.id == id))
    }

    async fn update_user(&self, id: Uuid, update: UserUpdate) -> StoreResult<UserProfile> {
        let _guard = self.write_lock.lock().await;
        let mut doc = self.load().await?;
        // The email check runs first; an update aimed at an unknown id but
        // carrying a taken email still reports the conflict.
        if doc.users.iter().any(|u| u.email == update.email && u.id != id) {
            return Err(StoreError::DuplicateEmail);
        }
        let user = doc
            .users
            .iter_mut()
            .find(|u| u.id == id)
            .ok_or_else(StoreError::user_not_found)?;
        user.fullname = update.fullname;
        user.email = update.email;
        if let Some(avatar) = update.avatar_url {
            user.avatar_url = avatar;
        }
        let profile = UserProfile::from(user.clone());
        self.persist(&doc).await?;
        Ok(profile)
    }

    async fn update_user_password(&self, id: Uuid, password_hash: &str) -> StoreResult<Uuid> {
        let _guard = self.write_lock.lock().await;
        let mut doc = self.load().await?;
        let user = doc
            .users
            .iter_mut()
            .find(|u| u.id == id)
            .ok_or_else(StoreError::user_not_found)?;
        user.password_hash = password_hash.to_string();
        self.persist(&doc).await?;
        Ok(id)
    }

    async fn find_users_by_name(&self, term: &str) -> StoreResult<Vec<UserProfile>> {
        let needle = term.trim().to_lowercase();
        if needle.is_empty() {
            return Ok(Vec::new());
        }
        let doc = self.load().await?;
        let mut users: Vec<UserProfile> = doc
            .users
            .into_iter()
            .filter(|u| u.fullname.to_lowercase().contains(&needle))
            .map(UserProfile::from)
            .collect();
        users.sort_by(|a, b| a.fullname.to_lowercase().cmp(&b.fullname.to_lowercase()));
        Ok(users)
    }

    async fn create_offer(&self, offer: NewOffer) -> StoreResult<Uuid> {
        let _guard = self.write_lock.lock().await;
        let mut doc = self.load().await?;
        let record = Offer {
            id: Uuid::new_v4(),
            owner_id: offer.owner_id,
            offer_type: offer.offer_type.as_str().to_string(),
            title: offer.title,
            category: offer.category,
            description: offer.description,
            image_url: offer.image_url,
            phone: offer.phone,
            address: offer.address,
            created_at: OffsetDateTime::now_utc(),
        };
        let id = record.id;
        doc.offers.push(record);
        self.persist(&doc).await?;
        Ok(id)
    }

    async fn list_offers(&self, filter: OfferFilter) -> StoreResult<Vec<OfferSummary>> {
        let doc = self.load().await?;
        let category = filter.category_filter();
        let mut rows: Vec<OfferSummary> = doc
            .offers
            .iter()
            .filter(|o| filter.search_term().map_or(true, |t| matches_search(o, t)))
            .filter(|o| category.as_ref().map_or(true, |c| matches_category(o, c)))
            .map(|o| summary(o, &doc.users))
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }

    async fn get_offer(&self, id: Uuid) -> StoreResult<Option<OfferDetails>> {
        let doc = self.load().await?;
        let Some(offer) = doc.offers.iter().find(|o| o.id == id) else {
            return Ok(None);
        };
        let (author_name, author_email) = resolve_author(&doc.users, offer.owner_id);
        Ok(Some(OfferDetails {
            id: offer.id,
            offer_type: offer.offer_type.clone(),
            title: offer.title.clone(),
            description: offer.description.clone(),
            created_at: offer.created_at,
            image_url: offer.image_url.clone(),
            phone: offer.phone.clone(),
            address: offer.address.clone(),
            category: offer.category.clone(),
            author_name,
            author_email,
        }))
    }

    async fn get_offer_for_owner(&self, id: Uuid, owner_id: Uuid) -> StoreResult<Option<Offer>> {
        let doc = self.load().await?;
        Ok(doc
            .offers
            .into_iter()
            .find(|o| o.id == id && o.owner_id == owner_id))
    }

    async fn list_offers_by_owner(&self, owner_id: Uuid) -> StoreResult<Vec<Offer>> {
        let doc = self.load().await?;
        let mut rows: Vec<Offer> = doc
            .offers
            .into_iter()
            .filter(|o| o.owner_id == owner_id)
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }

    async fn update_offer(
        &self,
        id: Uuid,
        owner_id: Uuid,
        update: OfferUpdate,
    ) -> StoreResult<Offer> {
        let _guard = self.write_lock.lock().await;
        let mut doc = self.load().await?;
        let offer = doc
            .offers
            .iter_mut()
            .find(|o| o.id == id)
            .ok_or_else(StoreError::offer_not_found)?;
        if offer.owner_id != owner_id {
            return Err(StoreError::AccessDenied);
        }
        offer.offer_type = update.offer_type.as_str().to_string();
        offer.title = update.title;
        offer.category = update.category;
        offer.description = update.description;
        offer.image_url = update.image_url;
        offer.phone = update.phone;
        offer.address = update.address;
        let updated = offer.clone();
        self.persist(&doc).await?;
        Ok(updated)
    }

    async fn delete_offer(&self, id: Uuid, owner_id: Uuid) -> StoreResult<()> {
        let _guard = self.write_lock.lock().await;
        let mut doc = self.load().await?;
        let pos = doc
            .offers
            .iter()
            .position(|o| o.id == id)
            .ok_or_else(StoreError::offer_not_found)?;
        if doc.offers[pos].owner_id != owner_id {
            return Err(StoreError::AccessDenied);
        }
        doc.offers.remove(pos);
        self.persist(&doc).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::OfferType;
    use std::time::Duration;
    use tempfile::TempDir;

    async fn open_store(dir: &TempDir) -> JsonStore {
        JsonStore::open(&dir.path().join("db.json")).await.unwrap()
    }

    async fn seed_user(store: &JsonStore, fullname: &str, email: &str) -> Uuid {
        store
            .create_user(NewUser {
                fullname: fullname.into(),
                email: email.into(),
                password_hash: "hash".into(),
            })
            .await
            .unwrap()
    }

    fn offer(owner_id: Uuid, offer_type: OfferType, title: &str) -> NewOffer {
        NewOffer {
            owner_id,
            offer_type,
            title: title.into(),
            category: None,
            description: None,
            image_url: None,
            phone: None,
            address: None,
        }
    }

    async fn raw_document(dir: &TempDir) -> serde_json::Value {
        let raw = fs::read(dir.path().join("db.json")).await.unwrap();
        serde_json::from_slice(&raw).unwrap()
    }

    #[tokio::test]
    async fn open_initializes_missing_document() {
        let dir = tempfile::tempdir().unwrap();
        let _store = open_store(&dir).await;
        let doc = raw_document(&dir).await;
        assert_eq!(doc["users"], serde_json::json!([]));
        assert_eq!(doc["offers"], serde_json::json!([]));
    }

    #[tokio::test]
    async fn reopen_preserves_existing_data() {
        let dir = tempfile::tempdir().unwrap();
        let user_id;
        {
            let store = open_store(&dir).await;
            user_id = seed_user(&store, "Ana Silva", "ana@x.com").await;
            store
                .create_offer(offer(user_id, OfferType::Sell, "Bike"))
                .await
                .unwrap();
        }
        let store = open_store(&dir).await;
        let profile = store.find_user_by_id(user_id).await.unwrap().unwrap();
        assert_eq!(profile.fullname, "Ana Silva");
        assert_eq!(store.list_offers_by_owner(user_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn created_user_persists_interop_field_names() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir).await;
        seed_user(&store, "Ana Silva", "ana@x.com").await;

        let doc = raw_document(&dir).await;
        let user = &doc["users"][0];
        assert_eq!(user["password"], "hash");
        assert!(user.get("password_hash").is_none());
        assert!(user["avatar_url"].is_null());
        assert!(user.as_object().unwrap().contains_key("avatar_url"));
    }

    #[tokio::test]
    async fn create_user_rejects_duplicate_email() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir).await;
        seed_user(&store, "Ana Silva", "ana@x.com").await;

        let err = store
            .create_user(NewUser {
                fullname: "Other".into(),
                email: "ana@x.com".into(),
                password_hash: "hash2".into(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::DuplicateEmail));
    }

    #[tokio::test]
    async fn find_user_by_email_includes_credential() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir).await;
        seed_user(&store, "Ana Silva", "ana@x.com").await;

        let user = store.find_user_by_email("ana@x.com").await.unwrap().unwrap();
        assert_eq!(user.password_hash, "hash");
        assert!(store
            .find_user_by_email("nobody@x.com")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn update_user_applies_tri_state_avatar() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir).await;
        let id = seed_user(&store, "Ana Silva", "ana@x.com").await;

        let set = store
            .update_user(
                id,
                UserUpdate {
                    fullname: "Ana S.".into(),
                    email: "ana@x.com".into(),
                    avatar_url: Some(Some("https://img/x.png".into())),
                },
            )
            .await
            .unwrap();
        assert_eq!(set.avatar_url.as_deref(), Some("https://img/x.png"));

        // None leaves the stored avatar alone.
        let kept = store
            .update_user(
                id,
                UserUpdate {
                    fullname: "Ana Maria".into(),
                    email: "ana@x.com".into(),
                    avatar_url: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(kept.fullname, "Ana Maria");
        assert_eq!(kept.avatar_url.as_deref(), Some("https://img/x.png"));

        let cleared = store
            .update_user(
                id,
                UserUpdate {
                    fullname: "Ana Maria".into(),
                    email: "ana@x.com".into(),
                    avatar_url: Some(None),
                },
            )
            .await
            .unwrap();
        assert_eq!(cleared.avatar_url, None);
    }

    #[tokio::test]
    async fn update_user_rejects_email_of_another_user() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir).await;
        let ana = seed_user(&store, "Ana", "ana@x.com").await;
        seed_user(&store, "Bea", "bea@x.com").await;

        let err = store
            .update_user(
                ana,
                UserUpdate {
                    fullname: "Ana".into(),
                    email: "bea@x.com".into(),
                    avatar_url: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::DuplicateEmail));

        // Keeping your own email is not a conflict.
        store
            .update_user(
                ana,
                UserUpdate {
                    fullname: "Ana".into(),
                    email: "ana@x.com".into(),
                    avatar_url: None,
                },
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn update_user_checks_email_before_existence() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir).await;
        seed_user(&store, "Ana", "ana@x.com").await;

        let err = store
            .update_user(
                Uuid::new_v4(),
                UserUpdate {
                    fullname: "Ghost".into(),
                    email: "ana@x.com".into(),
                    avatar_url: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::DuplicateEmail));

        let err = store
            .update_user(
                Uuid::new_v4(),
                UserUpdate {
                    fullname: "Ghost".into(),
                    email: "ghost@x.com".into(),
                    avatar_url: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { entity: "User" }));
    }

    #[tokio::test]
    async fn update_password_replaces_hash() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir).await;
        let id = seed_user(&store, "Ana", "ana@x.com").await;

        let returned = store.update_user_password(id, "new-hash").await.unwrap();
        assert_eq!(returned, id);
        let user = store.find_user_by_email("ana@x.com").await.unwrap().unwrap();
        assert_eq!(user.password_hash, "new-hash");

        let err = store
            .update_user_password(Uuid::new_v4(), "h")
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { entity: "User" }));
    }

    #[tokio::test]
    async fn name_search_is_blank_safe_and_ordered() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir).await;
        seed_user(&store, "Carlos", "carlos@x.com").await;
        seed_user(&store, "ana maria", "am@x.com").await;
        seed_user(&store, "Ana Silva", "ana@x.com").await;

        assert!(store.find_users_by_name("").await.unwrap().is_empty());
        assert!(store.find_users_by_name("   ").await.unwrap().is_empty());

        let hits = store.find_users_by_name("AN").await.unwrap();
        let names: Vec<_> = hits.iter().map(|u| u.fullname.as_str()).collect();
        assert_eq!(names, vec!["ana maria", "Ana Silva"]);
    }

    #[tokio::test]
    async fn offer_round_trips_with_author_name() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir).await;
        let ana = seed_user(&store, "Ana Silva", "ana@x.com").await;

        let id = store
            .create_offer(NewOffer {
                owner_id: ana,
                offer_type: OfferType::Sell,
                title: "Bike".into(),
                category: Some("sports".into()),
                description: Some("Barely used".into()),
                image_url: Some("https://img/bike.png".into()),
                phone: Some("(11) 91234-5678".into()),
                address: Some("Rua A, 1".into()),
            })
            .await
            .unwrap();

        let details = store.get_offer(id).await.unwrap().unwrap();
        assert_eq!(details.offer_type, "sell");
        assert_eq!(details.title, "Bike");
        assert_eq!(details.category.as_deref(), Some("sports"));
        assert_eq!(details.description.as_deref(), Some("Barely used"));
        assert_eq!(details.phone.as_deref(), Some("(11) 91234-5678"));
        assert_eq!(details.address.as_deref(), Some("Rua A, 1"));
        assert_eq!(details.author_name, "Ana Silva");
        assert_eq!(details.author_email, "ana@x.com");

        assert!(store.get_offer(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn missing_owner_falls_back_to_unknown_author() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir).await;
        let id = store
            .create_offer(offer(Uuid::new_v4(), OfferType::Trade, "Orphan"))
            .await
            .unwrap();

        let details = store.get_offer(id).await.unwrap().unwrap();
        assert_eq!(details.author_name, UNKNOWN_AUTHOR_NAME);
        assert_eq!(details.author_email, UNKNOWN_AUTHOR_EMAIL);

        let listed = store.list_offers(OfferFilter::default()).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].author_name, UNKNOWN_AUTHOR_NAME);
    }

    #[tokio::test]
    async fn listing_is_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir).await;
        let ana = seed_user(&store, "Ana", "ana@x.com").await;

        store
            .create_offer(offer(ana, OfferType::Sell, "First"))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        store
            .create_offer(offer(ana, OfferType::Sell, "Second"))
            .await
            .unwrap();

        let rows = store.list_offers(OfferFilter::default()).await.unwrap();
        let titles: Vec<_> = rows.iter().map(|o| o.title.as_str()).collect();
        assert_eq!(titles, vec!["Second", "First"]);
    }

    #[tokio::test]
    async fn search_matches_title_or_description() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir).await;
        let ana = seed_user(&store, "Ana", "ana@x.com").await;

        store
            .create_offer(NewOffer {
                description: Some("comes in the original shoebox".into()),
                ..offer(ana, OfferType::Sell, "Vintage camera")
            })
            .await
            .unwrap();
        store
            .create_offer(offer(ana, OfferType::Sell, "Running SHOES"))
            .await
            .unwrap();
        store
            .create_offer(offer(ana, OfferType::Sell, "Couch"))
            .await
            .unwrap();

        let hits = store
            .list_offers(OfferFilter::new(Some("shoe".into()), None))
            .await
            .unwrap();
        let mut titles: Vec<_> = hits.iter().map(|o| o.title.as_str()).collect();
        titles.sort();
        assert_eq!(titles, vec!["Running SHOES", "Vintage camera"]);
    }

    #[tokio::test]
    async fn category_filter_is_type_aware() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir).await;
        let ana = seed_user(&store, "Ana Silva", "ana@x.com").await;
        store
            .create_offer(NewOffer {
                category: Some("sports".into()),
                phone: Some("(11) 91234-5678".into()),
                ..offer(ana, OfferType::Sell, "Bike")
            })
            .await
            .unwrap();

        let all = store.list_offers(OfferFilter::default()).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].author_name, "Ana Silva");

        // "sell" is in the offer-type set, so it filters the type column.
        let by_type = store
            .list_offers(OfferFilter::new(None, Some("sell".into())))
            .await
            .unwrap();
        assert_eq!(by_type.len(), 1);

        let by_category = store
            .list_offers(OfferFilter::new(None, Some("sports".into())))
            .await
            .unwrap();
        assert_eq!(by_category.len(), 1);

        let miss = store
            .list_offers(OfferFilter::new(None, Some("vehicles".into())))
            .await
            .unwrap();
        assert!(miss.is_empty());
    }

    #[tokio::test]
    async fn search_and_category_filters_combine() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir).await;
        let ana = seed_user(&store, "Ana", "ana@x.com").await;
        store
            .create_offer(offer(ana, OfferType::Sell, "Blue bike"))
            .await
            .unwrap();
        store
            .create_offer(offer(ana, OfferType::Trade, "Red bike"))
            .await
            .unwrap();

        let hits = store
            .list_offers(OfferFilter::new(Some("bike".into()), Some("sell".into())))
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].title, "Blue bike");
    }

    #[tokio::test]
    async fn owner_scoped_lookup_hides_foreign_offers() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir).await;
        let ana = seed_user(&store, "Ana", "ana@x.com").await;
        let bea = seed_user(&store, "Bea", "bea@x.com").await;
        let id = store
            .create_offer(offer(ana, OfferType::Sell, "Bike"))
            .await
            .unwrap();

        assert!(store.get_offer_for_owner(id, ana).await.unwrap().is_some());
        // Foreign and missing are indistinguishable.
        assert!(store.get_offer_for_owner(id, bea).await.unwrap().is_none());
        assert!(store
            .get_offer_for_owner(Uuid::new_v4(), ana)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn my_offers_lists_only_own_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir).await;
        let ana = seed_user(&store, "Ana", "ana@x.com").await;
        let bea = seed_user(&store, "Bea", "bea@x.com").await;

        store
            .create_offer(offer(ana, OfferType::Sell, "Old"))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        store
            .create_offer(offer(ana, OfferType::Trade, "New"))
            .await
            .unwrap();
        store
            .create_offer(offer(bea, OfferType::Sell, "Hers"))
            .await
            .unwrap();

        let mine = store.list_offers_by_owner(ana).await.unwrap();
        let titles: Vec<_> = mine.iter().map(|o| o.title.as_str()).collect();
        assert_eq!(titles, vec!["New", "Old"]);
    }

    #[tokio::test]
    async fn update_offer_replaces_mutable_fields() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir).await;
        let ana = seed_user(&store, "Ana", "ana@x.com").await;
        let id = store
            .create_offer(NewOffer {
                description: Some("old text".into()),
                ..offer(ana, OfferType::Sell, "Bike")
            })
            .await
            .unwrap();

        let updated = store
            .update_offer(
                id,
                ana,
                OfferUpdate {
                    offer_type: OfferType::Trade,
                    title: "Bike (trade)".into(),
                    category: Some("sports".into()),
                    description: None,
                    image_url: None,
                    phone: Some("(11) 91234-5678".into()),
                    address: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.offer_type, "trade");
        assert_eq!(updated.title, "Bike (trade)");
        assert_eq!(updated.description, None);
        assert_eq!(updated.owner_id, ana);
    }

    #[tokio::test]
    async fn update_offer_splits_missing_from_foreign() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir).await;
        let ana = seed_user(&store, "Ana", "ana@x.com").await;
        let bea = seed_user(&store, "Bea", "bea@x.com").await;
        let id = store
            .create_offer(offer(ana, OfferType::Sell, "Bike"))
            .await
            .unwrap();

        let update = OfferUpdate {
            offer_type: OfferType::Buy,
            title: "Hijacked".into(),
            category: None,
            description: None,
            image_url: None,
            phone: None,
            address: None,
        };

        let err = store
            .update_offer(Uuid::new_v4(), bea, update.clone())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { entity: "Offer" }));

        let err = store.update_offer(id, bea, update).await.unwrap_err();
        assert!(matches!(err, StoreError::AccessDenied));

        // A denied update leaves the record untouched.
        let details = store.get_offer(id).await.unwrap().unwrap();
        assert_eq!(details.title, "Bike");
        assert_eq!(details.offer_type, "sell");
    }

    #[tokio::test]
    async fn delete_offer_enforces_ownership() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir).await;
        let ana = seed_user(&store, "Ana", "ana@x.com").await;
        let bea = seed_user(&store, "Bea", "bea@x.com").await;
        let id = store
            .create_offer(offer(ana, OfferType::Sell, "Bike"))
            .await
            .unwrap();

        let err = store.delete_offer(Uuid::new_v4(), ana).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound { entity: "Offer" }));

        let err = store.delete_offer(id, bea).await.unwrap_err();
        assert!(matches!(err, StoreError::AccessDenied));
        assert!(store.get_offer(id).await.unwrap().is_some());

        store.delete_offer(id, ana).await.unwrap();
        assert!(store.get_offer(id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn persisted_offer_uses_user_id_key() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir).await;
        let ana = seed_user(&store, "Ana", "ana@x.com").await;
        store
            .create_offer(offer(ana, OfferType::Sell, "Bike"))
            .await
            .unwrap();

        let doc = raw_document(&dir).await;
        let entry = &doc["offers"][0];
        assert_eq!(entry["user_id"], ana.to_string());
        assert!(entry.get("owner_id").is_none());
        assert!(entry["description"].is_null());
    }

    #[tokio::test]
    async fn concurrent_creates_do_not_lose_writes() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir).await;
        let ana = seed_user(&store, "Ana", "ana@x.com").await;

        let (a, b) = tokio::join!(
            store.create_offer(offer(ana, OfferType::Sell, "One")),
            store.create_offer(offer(ana, OfferType::Sell, "Two")),
        );
        a.unwrap();
        b.unwrap();

        let rows = store.list_offers(OfferFilter::default()).await.unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[tokio::test]
    async fn loads_documents_written_without_optional_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db.json");
        let owner = Uuid::new_v4();
        let raw = serde_json::json!({
            "users": [{
                "id": owner,
                "fullname": "Ana Silva",
                "email": "ana@x.com",
                "password": "hash",
                "created_at": "2023-06-01T10:00:00.000Z"
            }],
            "offers": [{
                "id": Uuid::new_v4(),
                "user_id": owner,
                "offer_type": "sell",
                "title": "Bike",
                "created_at": "2023-06-02T10:00:00.000Z"
            }]
        });
        fs::write(&path, serde_json::to_vec_pretty(&raw).unwrap())
            .await
            .unwrap();

        let store = JsonStore::open(&path).await.unwrap();
        let user = store.find_user_by_email("ana@x.com").await.unwrap().unwrap();
        assert_eq!(user.avatar_url, None);
        let rows = store.list_offers(OfferFilter::default()).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].category, None);
        assert_eq!(rows[0].author_name, "Ana Silva");
    }
}
