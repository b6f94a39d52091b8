use lazy_static::lazy_static;
use regex::Regex;

use crate::store::OfferType;

/// Accepts numbers in the national `(XX) XXXXX-XXXX` format, with an 8 or
/// 9 digit local part.
pub(crate) fn is_valid_phone(phone: &str) -> bool {
    lazy_static! {
        static ref PHONE_RE: Regex = Regex::new(r"^\(\d{2}\) \d{4,5}-\d{4}$").unwrap();
    }
    PHONE_RE.is_match(phone)
}

/// Trims an optional form field, turning blank input into `None`.
pub(crate) fn clean(value: Option<String>) -> Option<String> {
    value.and_then(|v| {
        let trimmed = v.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

/// Checks the required offer fields and returns the parsed type. The
/// phone is expected pre-cleaned; blank phones never reach here.
pub(crate) fn validate_offer_form(
    offer_type: Option<&str>,
    title: Option<&str>,
    phone: Option<&str>,
) -> Result<OfferType, String> {
    let kind_raw = offer_type.map(str::trim).unwrap_or_default();
    let title = title.map(str::trim).unwrap_or_default();
    if kind_raw.is_empty() || title.is_empty() {
        return Err("Type and title are required".into());
    }
    let kind = OfferType::parse(kind_raw).ok_or_else(|| "Invalid offer type".to_string())?;
    if let Some(phone) = phone {
        if !is_valid_phone(phone) {
            return Err("Invalid phone. Use (XX) XXXXX-XXXX".into());
        }
    }
    Ok(kind)
}
