//! Command handler implementations (/list, /use)

use std::sync::Arc;

use cibuscore::core::retry::{retry, RetryConfig};
use cibuscore::CouponStore;
use teloxide::prelude::*;
use teloxide::types::{InputFile, KeyboardRemove, Message, ReplyParameters};

use super::types::{HandlerDeps, HandlerError};
use crate::telegram::access::describe_sender;
use crate::telegram::barcode;
use crate::telegram::replies::{self, ListReply, UseReply};

/// Loads the coupons to offer, retrying transient store failures.
pub async fn list_reply(store: &Arc<dyn CouponStore>, retry_config: &RetryConfig) -> ListReply {
    let outcome = retry(retry_config, || {
        let store = Arc::clone(store);
        async move { store.list().await }
    })
    .await;

    if let Err(e) = &outcome.result {
        log::error!("Failed listing coupons after {} attempt(s): {}", outcome.attempts, e);
    }
    ListReply::from_outcome(outcome.into_result())
}

/// Redeems `coupon_id` and picks the answer.
///
/// Never retried: a retry after a copy that succeeded would answer
/// "already used" to the user who just redeemed the coupon.
pub async fn use_reply(store: &dyn CouponStore, coupon_id: &str) -> UseReply {
    if coupon_id.is_empty() {
        log::info!("No coupon ID was given");
        return UseReply::Text(replies::SPECIFY_COUPON);
    }

    let outcome = store.use_coupon(coupon_id).await;
    match &outcome {
        Ok(()) => log::info!("Coupon {:?} used", coupon_id),
        Err(e) if e.is_retryable() => log::error!("Failed marking coupon {:?} as used: {}", coupon_id, e),
        Err(e) => log::info!("Coupon {:?} not used: {}", coupon_id, e),
    }
    UseReply::from_outcome(coupon_id, &outcome)
}

/// Handle /list command
pub(super) async fn handle_list_command(bot: &Bot, msg: &Message, deps: &HandlerDeps) -> Result<(), HandlerError> {
    let request = match list_reply(&deps.store, &deps.list_retry).await {
        ListReply::Coupons(coupons) => {
            log::info!("Offering {} coupon(s) to {}", coupons.len(), describe_sender(msg));
            bot.send_message(msg.chat.id, msg.text().unwrap_or("/list"))
                .reply_markup(replies::coupons_keyboard(&coupons))
        }
        ListReply::Text(text) => bot
            .send_message(msg.chat.id, text)
            .reply_parameters(ReplyParameters::new(msg.id)),
    };

    request.await?;
    Ok(())
}

/// Handle /use command
pub(super) async fn handle_use_command(
    bot: &Bot,
    msg: &Message,
    deps: &HandlerDeps,
    coupon_id: &str,
) -> Result<(), HandlerError> {
    // Every answer closes the keyboard opened by /list
    let text = match use_reply(deps.store.as_ref(), coupon_id).await {
        UseReply::Barcode { id, caption } => match barcode::render_png(&id) {
            Ok(png) => {
                bot.send_photo(msg.chat.id, InputFile::memory(png).file_name("barcode.png"))
                    .caption(caption)
                    .reply_parameters(ReplyParameters::new(msg.id))
                    .reply_markup(KeyboardRemove::new())
                    .await?;
                return Ok(());
            }
            Err(e) => {
                log::error!("Failed creating barcode for coupon {:?}: {}", id, e);
                caption
            }
        },
        UseReply::Text(text) => text.to_string(),
    };

    bot.send_message(msg.chat.id, text)
        .reply_parameters(ReplyParameters::new(msg.id))
        .reply_markup(KeyboardRemove::new())
        .await?;
    Ok(())
}

/// Reply to anything that is not a command
pub(super) async fn handle_non_command(bot: &Bot, msg: &Message) -> Result<(), HandlerError> {
    log::info!("Skipping update: message {:?} is not a command", msg.text().unwrap_or_default());
    bot.send_message(msg.chat.id, replies::ONLY_COMMANDS)
        .reply_parameters(ReplyParameters::new(msg.id))
        .await?;
    Ok(())
}

/// Drop an update from a sender not on the allow-list
pub(super) async fn handle_unauthorized(bot: &Bot, msg: &Message, debug: bool) -> Result<(), HandlerError> {
    log::warn!("Skipping update: user {} is not authorized", describe_sender(msg));
    if debug {
        bot.send_message(msg.chat.id, replies::NOT_AUTHORIZED)
            .reply_parameters(ReplyParameters::new(msg.id))
            .await?;
    }
    Ok(())
}
