use anyhow::Context;
use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, QueryBuilder};
use tracing::warn;
use uuid::Uuid;

use super::error::StoreError;
use super::types::{
    CategoryFilter, NewOffer, NewUser, Offer, OfferDetails, OfferFilter, OfferSummary,
    OfferUpdate, User, UserProfile, UserUpdate, UNKNOWN_AUTHOR_EMAIL, UNKNOWN_AUTHOR_NAME,
};
use super::{Store, StoreResult};

/// PostgreSQL backend. Uniqueness lives in the schema; ownership checks
/// read the stored owner first so missing and foreign stay distinct.
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(database_url: &str) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .context("connect to database")?;

        if let Err(err) = sqlx::migrate!("./migrations").run(&pool).await {
            warn!(error = %err, "migrations failed, continuing with existing schema");
        }

        Ok(Self { pool })
    }
}

/// Wraps a search term in `%...%` with LIKE wildcards escaped, keeping
/// plain substring semantics for input containing `%`, `_` or `\`.
fn like_pattern(term: &str) -> String {
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

/// A unique violation on the email column surfaces as `DuplicateEmail`,
/// never as a bare engine error.
fn map_unique_email(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(ref db) = err {
        if db.code().as_deref() == Some("23505") {
            return StoreError::DuplicateEmail;
        }
    }
    err.into()
}

#[async_trait]
impl Store for PgStore {
    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, fullname, email, password, created_at, avatar_url
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn create_user(&self, user: NewUser) -> StoreResult<Uuid> {
        let id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO users (fullname, email, password)
            VALUES ($1, $2, $3)
            RETURNING id
            "#,
        )
        .bind(&user.fullname)
        .bind(&user.email)
        .bind(&user.password_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(map_unique_email)?;
        Ok(id)
    }

    async fn find_user_by_id(&self, id: Uuid) -> StoreResult<Option<UserProfile>> {
        let profile = sqlx::query_as::<_, UserProfile>(
            r#"
            SELECT id, fullname, email, avatar_url, created_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(profile)
    }

    async fn find_user_by_id_with_password(&self, id: Uuid) -> StoreResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, fullname, email, password, created_at, avatar_url
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn update_user(&self, id: Uuid, update: UserUpdate) -> StoreResult<UserProfile> {
        // Same check order as the document backend: email conflict first,
        // then existence.
        let conflict = sqlx::query_scalar::<_, Uuid>(
            r#"
            SELECT id FROM users WHERE email = $1 AND id <> $2
            "#,
        )
        .bind(&update.email)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        if conflict.is_some() {
            return Err(StoreError::DuplicateEmail);
        }

        // Tri-state avatar: absent leaves the column untouched.
        let profile = match update.avatar_url {
            None => {
                sqlx::query_as::<_, UserProfile>(
                    r#"
                    UPDATE users
                    SET fullname = $1, email = $2
                    WHERE id = $3
                    RETURNING id, fullname, email, avatar_url, created_at
                    "#,
                )
                .bind(&update.fullname)
                .bind(&update.email)
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(map_unique_email)?
            }
            Some(avatar) => {
                sqlx::query_as::<_, UserProfile>(
                    r#"
                    UPDATE users
                    SET fullname = $1, email = $2, avatar_url = $3
                    WHERE id = $4
                    RETURNING id, fullname, email, avatar_url, created_at
                    "#,
                )
                .bind(&update.fullname)
                .bind(&update.email)
                .bind(avatar)
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(map_unique_email)?
            }
        };
        profile.ok_or_else(StoreError::user_not_found)
    }

    async fn update_user_password(&self, id: Uuid, password_hash: &str) -> StoreResult<Uuid> {
        let updated = sqlx::query_scalar::<_, Uuid>(
            r#"
            UPDATE users SET password = $1 WHERE id = $2 RETURNING id
            "#,
        )
        .bind(password_hash)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        updated.ok_or_else(StoreError::user_not_found)
    }

    async fn find_users_by_name(&self, term: &str) -> StoreResult<Vec<UserProfile>> {
        let term = term.trim();
        if term.is_empty() {
            return Ok(Vec::new());
        }
        let users = sqlx::query_as::<_, UserProfile>(
            r#"
            SELECT id, fullname, email, avatar_url, created_at
            FROM users
            WHERE fullname ILIKE $1
            ORDER BY lower(fullname)
            "#,
        )
        .bind(like_pattern(term))
        .fetch_all(&self.pool)
        .await?;
        Ok(users)
    }

    async fn create_offer(&self, offer: NewOffer) -> StoreResult<Uuid> {
        let id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO offers (user_id, offer_type, title, category, description,
                                image_url, phone, address)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id
            "#,
        )
        .bind(offer.owner_id)
        .bind(offer.offer_type.as_str())
        .bind(&offer.title)
        .bind(&offer.category)
        .bind(&offer.description)
        .bind(&offer.image_url)
        .bind(&offer.phone)
        .bind(&offer.address)
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }

    async fn list_offers(&self, filter: OfferFilter) -> StoreResult<Vec<OfferSummary>> {
        let mut qb: QueryBuilder<sqlx::Postgres> = QueryBuilder::new(
            "SELECT o.id, o.offer_type, o.title, o.description, o.created_at, \
             o.image_url, o.phone, o.address, o.category, COALESCE(u.fullname, ",
        );
        qb.push_bind(UNKNOWN_AUTHOR_NAME);
        qb.push("::text) AS author_name FROM offers o LEFT JOIN users u ON u.id = o.user_id");

        let mut has_where = false;
        if let Some(term) = filter.search_term() {
            let pattern = like_pattern(term);
            qb.push(" WHERE (o.title ILIKE ");
            qb.push_bind(pattern.clone());
            qb.push(" OR o.description ILIKE ");
            qb.push_bind(pattern);
            qb.push(")");
            has_where = true;
        }
        if let Some(category) = filter.category_filter() {
            qb.push(if has_where { " AND " } else { " WHERE " });
            match category {
                CategoryFilter::OfferType(kind) => {
                    qb.push("o.offer_type = ");
                    qb.push_bind(kind.as_str());
                }
                CategoryFilter::Category(tag) => {
                    qb.push("o.category = ");
                    qb.push_bind(tag);
                }
            }
        }
        qb.push(" ORDER BY o.created_at DESC");

        let rows = qb
            .build_query_as::<OfferSummary>()
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn get_offer(&self, id: Uuid) -> StoreResult<Option<OfferDetails>> {
        let details = sqlx::query_as::<_, OfferDetails>(
            r#"
            SELECT o.id, o.offer_type, o.title, o.description, o.created_at,
                   o.image_url, o.phone, o.address, o.category,
                   COALESCE(u.fullname, $2::text) AS author_name,
                   COALESCE(u.email, $3::text) AS author_email
            FROM offers o
            LEFT JOIN users u ON u.id = o.user_id
            WHERE o.id = $1
            "#,
        )
        .bind(id)
        .bind(UNKNOWN_AUTHOR_NAME)
        .bind(UNKNOWN_AUTHOR_EMAIL)
        .fetch_optional(&self.pool)
        .await?;
        Ok(details)
    }

    async fn get_offer_for_owner(&self, id: Uuid, owner_id: Uuid) -> StoreResult<Option<Offer>> {
        let offer = sqlx::query_as::<_, Offer>(
            r#"
            SELECT id, user_id, offer_type, title, category, description,
                   image_url, phone, address, created_at
            FROM offers
            WHERE id = $1 AND user_id = $2
            "#,
        )
        .bind(id)
        .bind(owner_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(offer)
    }

    async fn list_offers_by_owner(&self, owner_id: Uuid) -> StoreResult<Vec<Offer>> {
        let offers = sqlx::query_as::<_, Offer>(
            r#"
            SELECT id, user_id, offer_type, title, category, description,
                   image_url, phone, address, created_at
            FROM offers
            WHERE user_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(offers)
    }

    async fn update_offer(
        &self,
        id: Uuid,
        owner_id: Uuid,
        update: OfferUpdate,
    ) -> StoreResult<Offer> {
        let owner = sqlx::query_scalar::<_, Uuid>(
            r#"
            SELECT user_id FROM offers WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(StoreError::offer_not_found)?;
        if owner != owner_id {
            return Err(StoreError::AccessDenied);
        }

        let offer = sqlx::query_as::<_, Offer>(
            r#"
            UPDATE offers
            SET offer_type = $1, title = $2, category = $3, description = $4,
                image_url = $5, phone = $6, address = $7
            WHERE id = $8
            RETURNING id, user_id, offer_type, title, category, description,
                      image_url, phone, address, created_at
            "#,
        )
        .bind(update.offer_type.as_str())
        .bind(&update.title)
        .bind(&update.category)
        .bind(&update.description)
        .bind(&update.image_url)
        .bind(&update.phone)
        .bind(&update.address)
        .bind(id)
        .fetch_one(&self.pool)
        .await?;
        Ok(offer)
    }

    async fn delete_offer(&self, id: Uuid, owner_id: Uuid) -> StoreResult<()> {
        let owner = sqlx::query_scalar::<_, Uuid>(
            r#"
            SELECT user_id FROM offers WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(StoreError::offer_not_found)?;
        if owner != owner_id {
            return Err(StoreError::AccessDenied);
        }

        sqlx::query(
            r#"
            DELETE FROM offers WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
