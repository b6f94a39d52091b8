use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// Author shown on an offer whose owner record has gone missing.
pub const UNKNOWN_AUTHOR_NAME: &str = "Unknown user";
pub const UNKNOWN_AUTHOR_EMAIL: &str = "unknown@example.com";

/// Stored user record, credential included.
///
/// Serde names match the persisted layout (`password`, explicit nulls for
/// absent optionals) so existing documents keep loading unchanged.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub fullname: String,
    pub email: String,
    #[serde(rename = "password")]
    #[sqlx(rename = "password")]
    pub password_hash: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

/// User view with the credential stripped.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct UserProfile {
    pub id: Uuid,
    pub fullname: String,
    pub email: String,
    pub avatar_url: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<User> for UserProfile {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            fullname: user.fullname,
            email: user.email,
            avatar_url: user.avatar_url,
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub fullname: String,
    pub email: String,
    pub password_hash: String,
}

/// Profile update. `avatar_url` is tri-state: `None` leaves the stored
/// value alone, `Some(None)` clears it, `Some(Some(url))` replaces it.
#[derive(Debug, Clone)]
pub struct UserUpdate {
    pub fullname: String,
    pub email: String,
    pub avatar_url: Option<Option<String>>,
}

/// Stored offer record. The owner reference persists under `user_id`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Offer {
    pub id: Uuid,
    #[serde(rename = "user_id")]
    #[sqlx(rename = "user_id")]
    pub owner_id: Uuid,
    pub offer_type: String,
    pub title: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Listing row: offer fields plus the owner's resolved display name.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct OfferSummary {
    pub id: Uuid,
    pub offer_type: String,
    pub title: String,
    pub description: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub image_url: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub category: Option<String>,
    pub author_name: String,
}

/// Detail row: adds the owner's contact email.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct OfferDetails {
    pub id: Uuid,
    pub offer_type: String,
    pub title: String,
    pub description: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub image_url: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub category: Option<String>,
    pub author_name: String,
    pub author_email: String,
}

#[derive(Debug, Clone)]
pub struct NewOffer {
    pub owner_id: Uuid,
    pub offer_type: OfferType,
    pub title: String,
    pub category: Option<String>,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
}

/// Full replacement of an offer's mutable fields.
#[derive(Debug, Clone)]
pub struct OfferUpdate {
    pub offer_type: OfferType,
    pub title: String,
    pub category: Option<String>,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
}

/// The fixed set of offer kinds. Records keep the kind as text so
/// documents written by older deployments still load; this enum guards
/// the write path and drives the category smart filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OfferType {
    Sell,
    Trade,
    Service,
    Buy,
}

impl OfferType {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "sell" => Some(Self::Sell),
            "trade" => Some(Self::Trade),
            "service" => Some(Self::Service),
            "buy" => Some(Self::Buy),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sell => "sell",
            Self::Trade => "trade",
            Self::Service => "service",
            Self::Buy => "buy",
        }
    }
}

impl std::fmt::Display for OfferType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a raw `category` query value applies: a member of the fixed
/// offer-type set filters `offer_type`, anything else filters the
/// free-form `category` tag. One parameter, two meanings, kept for
/// compatibility with stored data and existing clients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CategoryFilter {
    OfferType(OfferType),
    Category(String),
}

impl CategoryFilter {
    pub fn parse(raw: &str) -> Self {
        match OfferType::parse(raw) {
            Some(kind) => Self::OfferType(kind),
            None => Self::Category(raw.to_string()),
        }
    }
}

/// Listing filters as they arrive from the query string. Blank values
/// mean "no filter".
#[derive(Debug, Clone, Default)]
pub struct OfferFilter {
    search: Option<String>,
    category: Option<String>,
}

impl OfferFilter {
    pub fn new(search: Option<String>, category: Option<String>) -> Self {
        Self {
            search: non_blank(search),
            category: non_blank(category),
        }
    }

    pub fn search_term(&self) -> Option<&str> {
        self.search.as_deref()
    }

    pub fn category_filter(&self) -> Option<CategoryFilter> {
        self.category.as_deref().map(CategoryFilter::parse)
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.and_then(|v| {
        let trimmed = v.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}
