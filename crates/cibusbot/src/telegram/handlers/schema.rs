//! Dispatcher schema and handler chain builders

use std::sync::Arc;

use teloxide::dispatching::{UpdateFilterExt, UpdateHandler};
use teloxide::prelude::*;
use teloxide::types::Message;

use super::commands::{handle_list_command, handle_non_command, handle_unauthorized, handle_use_command};
use super::types::{HandlerDeps, HandlerError};
use crate::telegram::access::describe_sender;
use crate::telegram::bot::Command;

/// Creates the main dispatcher schema for the Telegram bot.
///
/// Branches are tried in order:
/// 1. senders not on the allow-list (dropped, answered in debug mode)
/// 2. `/list` and `/use`
/// 3. other commands (ignored)
/// 4. any other message ("only commands")
pub fn schema(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    let deps_auth = deps.clone();
    let deps_commands = deps;

    dptree::entry()
        .branch(unauthorized_handler(deps_auth))
        .branch(command_handler(deps_commands))
        .branch(unknown_command_handler())
        .branch(non_command_handler())
}

fn unauthorized_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    let allow_list = Arc::clone(&deps.allow_list);
    let debug = deps.debug;

    Update::filter_message()
        .filter(move |msg: Message| !allow_list.allows(&msg))
        .endpoint(move |bot: Bot, msg: Message| async move { handle_unauthorized(&bot, &msg, debug).await })
}

fn command_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    Update::filter_message().branch(dptree::entry().filter_command::<Command>().endpoint(
        move |bot: Bot, msg: Message, cmd: Command| {
            let deps = deps.clone();
            async move {
                log::info!("Received command: {:?} from {}", cmd, describe_sender(&msg));

                match cmd {
                    Command::List => handle_list_command(&bot, &msg, &deps).await?,
                    Command::Use(coupon_id) => handle_use_command(&bot, &msg, &deps, &coupon_id).await?,
                }
                Ok(())
            }
        },
    ))
}

/// Commands this bot doesn't know (e.g. `/start`, or addressed to another bot)
fn unknown_command_handler() -> UpdateHandler<HandlerError> {
    Update::filter_message()
        .filter(|msg: Message| msg.text().is_some_and(|text| text.starts_with('/')))
        .endpoint(|msg: Message| async move {
            log::info!("Ignoring unsupported command {:?}", msg.text().unwrap_or_default());
            Ok(())
        })
}

fn non_command_handler() -> UpdateHandler<HandlerError> {
    Update::filter_message().endpoint(|bot: Bot, msg: Message| async move { handle_non_command(&bot, &msg).await })
}
