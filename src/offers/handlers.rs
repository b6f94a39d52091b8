use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    auth::AuthUser,
    media::try_upload,
    state::AppState,
    store::{NewOffer, Offer, OfferDetails, OfferFilter, OfferSummary, OfferUpdate, StoreError},
};

use super::dto::{CreatedOfferResponse, MessageResponse, OfferQuery};
use super::services::{clean, validate_offer_form};

pub fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/offers", get(list_offers))
        .route("/offers/:id", get(get_offer))
}

pub fn owner_routes() -> Router<AppState> {
    Router::new()
        .route("/offers", post(create_offer))
        .route("/offers/:id", put(update_offer).delete(delete_offer))
        .route("/offers/:id/edit", get(edit_offer))
        .route("/my-offers", get(my_offers))
        .layer(DefaultBodyLimit::max(10 * 1024 * 1024)) // offer images
}

#[instrument(skip(state))]
pub async fn list_offers(
    State(state): State<AppState>,
    Query(query): Query<OfferQuery>,
) -> Result<Json<Vec<OfferSummary>>, (StatusCode, String)> {
    let filter = OfferFilter::new(query.search, query.category);
    let offers = state
        .store
        .list_offers(filter)
        .await
        .map_err(|e| e.response())?;
    Ok(Json(offers))
}

#[instrument(skip(state))]
pub async fn get_offer(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<OfferDetails>, (StatusCode, String)> {
    match state.store.get_offer(id).await {
        Ok(Some(details)) => Ok(Json(details)),
        Ok(None) => Err(StoreError::offer_not_found().response()),
        Err(e) => Err(e.response()),
    }
}

#[derive(Default)]
struct OfferForm {
    offer_type: Option<String>,
    title: Option<String>,
    category: Option<String>,
    description: Option<String>,
    phone: Option<String>,
    address: Option<String>,
    image_url: Option<String>,
}

/// Collects the offer form fields; an `image` file is pushed to the media
/// host on the spot, best effort.
async fn read_offer_form(
    state: &AppState,
    mut mp: Multipart,
) -> Result<OfferForm, (StatusCode, String)> {
    let mut form = OfferForm::default();
    while let Ok(Some(field)) = mp.next_field().await {
        let name = field.name().map(|s| s.to_string());
        match name.as_deref() {
            Some("type") => form.offer_type = Some(field.text().await.map_err(bad_request)?),
            Some("title") => form.title = Some(field.text().await.map_err(bad_request)?),
            Some("category") => form.category = Some(field.text().await.map_err(bad_request)?),
            Some("description") => {
                form.description = Some(field.text().await.map_err(bad_request)?)
            }
            Some("phone") => form.phone = Some(field.text().await.map_err(bad_request)?),
            Some("address") => form.address = Some(field.text().await.map_err(bad_request)?),
            Some("image") => {
                let content_type = field
                    .content_type()
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "application/octet-stream".into());
                let data = field.bytes().await.map_err(bad_request)?;
                if !data.is_empty() {
                    form.image_url =
                        try_upload(state.media.as_deref(), "offers", &content_type, data).await;
                }
            }
            _ => {}
        }
    }
    Ok(form)
}

#[instrument(skip(state, mp))]
pub async fn create_offer(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    mp: Multipart,
) -> Result<(StatusCode, Json<CreatedOfferResponse>), (StatusCode, String)> {
    let form = read_offer_form(&state, mp).await?;
    let phone = clean(form.phone);
    let offer_type = validate_offer_form(
        form.offer_type.as_deref(),
        form.title.as_deref(),
        phone.as_deref(),
    )
    .map_err(|msg| {
        warn!(user_id = %user_id, reason = %msg, "offer form rejected");
        StoreError::validation(msg).response()
    })?;

    let id = state
        .store
        .create_offer(NewOffer {
            owner_id: user_id,
            offer_type,
            title: form.title.unwrap_or_default().trim().to_string(),
            category: clean(form.category),
            description: clean(form.description),
            image_url: form.image_url,
            phone,
            address: clean(form.address),
        })
        .await
        .map_err(|e| e.response())?;

    info!(offer_id = %id, user_id = %user_id, "offer created");
    Ok((StatusCode::CREATED, Json(CreatedOfferResponse { id })))
}

/// Owner's raw record for the edit form. Foreign and missing ids are both
/// a 404 so the endpoint leaks nothing about other users' offers.
#[instrument(skip(state))]
pub async fn edit_offer(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Offer>, (StatusCode, String)> {
    match state.store.get_offer_for_owner(id, user_id).await {
        Ok(Some(offer)) => Ok(Json(offer)),
        Ok(None) => Err(StoreError::offer_not_found().response()),
        Err(e) => Err(e.response()),
    }
}

#[instrument(skip(state, mp))]
pub async fn update_offer(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
    mp: Multipart,
) -> Result<Json<Offer>, (StatusCode, String)> {
    let form = read_offer_form(&state, mp).await?;
    let phone = clean(form.phone);
    let offer_type = validate_offer_form(
        form.offer_type.as_deref(),
        form.title.as_deref(),
        phone.as_deref(),
    )
    .map_err(|msg| {
        warn!(user_id = %user_id, offer_id = %id, reason = %msg, "offer form rejected");
        StoreError::validation(msg).response()
    })?;

    // Full replace downstream; without a new upload the stored image
    // carries over. Ownership is still the store's decision.
    let image_url = match form.image_url {
        Some(url) => Some(url),
        None => state
            .store
            .get_offer(id)
            .await
            .map_err(|e| e.response())?
            .and_then(|current| current.image_url),
    };

    let offer = state
        .store
        .update_offer(
            id,
            user_id,
            OfferUpdate {
                offer_type,
                title: form.title.unwrap_or_default().trim().to_string(),
                category: clean(form.category),
                description: clean(form.description),
                image_url,
                phone,
                address: clean(form.address),
            },
        )
        .await
        .map_err(|e| e.response())?;

    info!(offer_id = %id, user_id = %user_id, "offer updated");
    Ok(Json(offer))
}

#[instrument(skip(state))]
pub async fn delete_offer(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<MessageResponse>, (StatusCode, String)> {
    state
        .store
        .delete_offer(id, user_id)
        .await
        .map_err(|e| e.response())?;
    info!(offer_id = %id, user_id = %user_id, "offer deleted");
    Ok(Json(MessageResponse {
        message: "Offer deleted successfully".into(),
    }))
}

#[instrument(skip(state))]
pub async fn my_offers(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Vec<Offer>>, (StatusCode, String)> {
    let offers = state
        .store
        .list_offers_by_owner(user_id)
        .await
        .map_err(|e| e.response())?;
    Ok(Json(offers))
}

fn bad_request<E: std::fmt::Display>(e: E) -> (StatusCode, String) {
    (StatusCode::BAD_REQUEST, e.to_string())
}

#[cfg(test)]
mod handler_tests {
    use super::*;
    use crate::store::{NewUser, OfferType};

    async fn seed_user(state: &AppState, fullname: &str, email: &str) -> Uuid {
        state
            .store
            .create_user(NewUser {
                fullname: fullname.into(),
                email: email.into(),
                password_hash: "hash".into(),
            })
            .await
            .unwrap()
    }

    async fn seed_offer(
        state: &AppState,
        owner_id: Uuid,
        offer_type: OfferType,
        title: &str,
        category: Option<&str>,
    ) -> Uuid {
        state
            .store
            .create_offer(NewOffer {
                owner_id,
                offer_type,
                title: title.into(),
                category: category.map(str::to_string),
                description: None,
                image_url: None,
                phone: None,
                address: None,
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn listing_and_detail_resolve_the_author() {
        let dir = tempfile::tempdir().unwrap();
        let state = AppState::fake(dir.path()).await;
        let ana = seed_user(&state, "Ana Silva", "ana@x.com").await;
        let id = seed_offer(&state, ana, OfferType::Sell, "Bike", Some("sports")).await;

        let Json(rows) = list_offers(
            State(state.clone()),
            Query(OfferQuery {
                search: None,
                category: None,
            }),
        )
        .await
        .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].author_name, "Ana Silva");

        let Json(details) = get_offer(State(state.clone()), Path(id)).await.unwrap();
        assert_eq!(details.title, "Bike");
        assert_eq!(details.author_email, "ana@x.com");

        let (status, _) = get_offer(State(state.clone()), Path(Uuid::new_v4()))
            .await
            .unwrap_err();
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn listing_applies_search_and_category() {
        let dir = tempfile::tempdir().unwrap();
        let state = AppState::fake(dir.path()).await;
        let ana = seed_user(&state, "Ana", "ana@x.com").await;
        seed_offer(&state, ana, OfferType::Sell, "Blue bike", None).await;
        seed_offer(&state, ana, OfferType::Trade, "Red bike", None).await;
        seed_offer(&state, ana, OfferType::Sell, "Couch", Some("furniture")).await;

        let Json(rows) = list_offers(
            State(state.clone()),
            Query(OfferQuery {
                search: Some("bike".into()),
                category: Some("sell".into()),
            }),
        )
        .await
        .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].title, "Blue bike");

        let Json(rows) = list_offers(
            State(state.clone()),
            Query(OfferQuery {
                search: None,
                category: Some("furniture".into()),
            }),
        )
        .await
        .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].title, "Couch");
    }

    #[tokio::test]
    async fn edit_view_is_owner_scoped() {
        let dir = tempfile::tempdir().unwrap();
        let state = AppState::fake(dir.path()).await;
        let ana = seed_user(&state, "Ana", "ana@x.com").await;
        let bea = seed_user(&state, "Bea", "bea@x.com").await;
        let id = seed_offer(&state, ana, OfferType::Sell, "Bike", None).await;

        let Json(offer) = edit_offer(State(state.clone()), AuthUser(ana), Path(id))
            .await
            .unwrap();
        assert_eq!(offer.title, "Bike");

        let (status, _) = edit_offer(State(state.clone()), AuthUser(bea), Path(id))
            .await
            .unwrap_err();
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = edit_offer(State(state.clone()), AuthUser(ana), Path(Uuid::new_v4()))
            .await
            .unwrap_err();
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn delete_distinguishes_missing_from_foreign() {
        let dir = tempfile::tempdir().unwrap();
        let state = AppState::fake(dir.path()).await;
        let ana = seed_user(&state, "Ana", "ana@x.com").await;
        let bea = seed_user(&state, "Bea", "bea@x.com").await;
        let id = seed_offer(&state, ana, OfferType::Sell, "Bike", None).await;

        let (status, _) = delete_offer(State(state.clone()), AuthUser(ana), Path(Uuid::new_v4()))
            .await
            .unwrap_err();
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = delete_offer(State(state.clone()), AuthUser(bea), Path(id))
            .await
            .unwrap_err();
        assert_eq!(status, StatusCode::FORBIDDEN);

        let Json(resp) = delete_offer(State(state.clone()), AuthUser(ana), Path(id))
            .await
            .unwrap();
        assert_eq!(resp.message, "Offer deleted successfully");
    }

    #[tokio::test]
    async fn my_offers_only_shows_the_callers_records() {
        let dir = tempfile::tempdir().unwrap();
        let state = AppState::fake(dir.path()).await;
        let ana = seed_user(&state, "Ana", "ana@x.com").await;
        let bea = seed_user(&state, "Bea", "bea@x.com").await;
        seed_offer(&state, ana, OfferType::Sell, "Mine", None).await;
        seed_offer(&state, bea, OfferType::Sell, "Hers", None).await;

        let Json(mine) = my_offers(State(state.clone()), AuthUser(ana)).await.unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].title, "Mine");
    }
}
