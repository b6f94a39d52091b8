use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Listing filters as they arrive on the query string.
#[derive(Debug, Deserialize)]
pub struct OfferQuery {
    pub search: Option<String>,
    pub category: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CreatedOfferResponse {
    pub id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}
