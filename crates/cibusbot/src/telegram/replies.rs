//! Reply texts and keyboards
//!
//! Everything the bot says lives here, as plain data, so handlers only decide
//! which reply to send.

use cibuscore::coupon::readable_id;
use cibuscore::{Coupon, StoreError};
use teloxide::types::{KeyboardButton, KeyboardMarkup};

pub const NOT_AUTHORIZED: &str = "You are not authorized to use this bot";
pub const ONLY_COMMANDS: &str = "Sorry, I only support commands";
pub const NO_COUPONS: &str = "Sorry, there are no available coupons";
pub const SPECIFY_COUPON: &str = "Please specify a coupon (/use <coupon-id>)";
pub const ALREADY_USED: &str = "This coupon was already used";
pub const NO_SUCH_COUPON: &str = "There is no such coupon";
pub const TRY_AGAIN: &str = "Something went wrong. Please try again";

/// What to answer a `/use` with
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UseReply {
    /// Redeemed: send the barcode of `id` captioned with `caption`
    Barcode { id: String, caption: String },
    /// Plain text answer
    Text(&'static str),
}

impl UseReply {
    /// Reply for a `/use` whose store call already ran.
    pub fn from_outcome(id: &str, outcome: &Result<(), StoreError>) -> Self {
        match outcome {
            Ok(()) => UseReply::Barcode {
                id: id.to_string(),
                caption: using_caption(id),
            },
            Err(StoreError::AlreadyUsed { .. }) => UseReply::Text(ALREADY_USED),
            Err(StoreError::NotExist { .. }) => UseReply::Text(NO_SUCH_COUPON),
            Err(StoreError::Unavailable(_)) => UseReply::Text(TRY_AGAIN),
        }
    }
}

/// What to answer a `/list` with
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListReply {
    /// Coupons to offer, already sorted
    Coupons(Vec<Coupon>),
    Text(&'static str),
}

impl ListReply {
    pub fn from_outcome(outcome: Result<Vec<Coupon>, StoreError>) -> Self {
        match outcome {
            Ok(coupons) if coupons.is_empty() => ListReply::Text(NO_COUPONS),
            Ok(mut coupons) => {
                sort_for_list(&mut coupons);
                ListReply::Coupons(coupons)
            }
            Err(_) => ListReply::Text(TRY_AGAIN),
        }
    }
}

/// `"Using 9123-4567-8"`
pub fn using_caption(id: &str) -> String {
    format!("Using {}", readable_id(id))
}

/// Soonest expiration first, undated coupons last, then by id.
pub fn sort_for_list(coupons: &mut [Coupon]) {
    coupons.sort_by(|a, b| {
        let by_expiration = match (a.expiration, b.expiration) {
            (Some(x), Some(y)) => x.cmp(&y),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => std::cmp::Ordering::Equal,
        };
        by_expiration.then_with(|| a.id.cmp(&b.id))
    });
}

/// Label of the keyboard button offering `coupon`.
///
/// Tapping the button sends the label back as a message, which parses as a
/// `/use` of the coupon id.
pub fn button_label(coupon: &Coupon) -> String {
    format!("/use {}", coupon)
}

/// One button per coupon, one coupon per row.
pub fn coupons_keyboard(coupons: &[Coupon]) -> KeyboardMarkup {
    let rows: Vec<Vec<KeyboardButton>> = coupons
        .iter()
        .map(|coupon| vec![KeyboardButton::new(button_label(coupon))])
        .collect();
    KeyboardMarkup::new(rows)
}

/// Coupon id out of the text following `/use`; only the first token counts.
pub fn coupon_arg(args: &str) -> Option<&str> {
    args.split_whitespace().next()
}
