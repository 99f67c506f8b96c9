use super::shared::{HandlerResult, drive, send_status};
use super::state::{BotState, PaymentDialogue, sender_handle, sender_user_id};
use crate::flow::Input;
use crate::i18n::texts;
use teloxide::dptree;
use teloxide::prelude::*;
use teloxide::utils::command::BotCommands;

#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase")]
pub enum BotCommand {
    #[command(description = "Choose language")]
    Start,
    #[command(description = "Help")]
    Help,
    #[command(description = "Pay for a subscription")]
    Pay,
    #[command(description = "My subscriptions")]
    Status,
    #[command(description = "Cancel the current payment")]
    Cancel,
}

pub fn handler() -> teloxide::dispatching::UpdateHandler<Box<dyn std::error::Error + Send + Sync + 'static>> {
    teloxide::filter_command::<BotCommand, _>()
        .branch(dptree::case![BotCommand::Start].endpoint(start_cmd))
        .branch(dptree::case![BotCommand::Help].endpoint(cmd_help))
        .branch(dptree::case![BotCommand::Pay].endpoint(cmd_pay))
        .branch(dptree::case![BotCommand::Status].endpoint(cmd_status))
        .branch(dptree::case![BotCommand::Cancel].endpoint(cmd_cancel))
}

async fn start_cmd(
    bot: Bot,
    msg: Message,
    state: BotState,
    dialogue: PaymentDialogue,
) -> HandlerResult {
    let Some(user_id) = sender_user_id(&msg) else {
        tracing::warn!("Received /start without sender");
        return Ok(());
    };
    let handle = sender_handle(&msg);
    tracing::info!(
        user_id,
        handle = ?handle,
        is_admin = state.config.is_admin(user_id),
        "Received /start command"
    );

    state.db.upsert_user(user_id, handle.as_deref()).await?;
    dialogue.exit().await?;

    let lang = state.lang_of(user_id).await;
    bot.send_message(msg.chat.id, texts(lang).choose_language)
        .reply_markup(crate::bot::keyboards::language_picker())
        .await?;
    Ok(())
}

pub async fn cmd_help(bot: Bot, msg: Message, state: BotState) -> HandlerResult {
    let Some(user_id) = sender_user_id(&msg) else {
        return Ok(());
    };
    let lang = state.lang_of(user_id).await;
    bot.send_message(msg.chat.id, texts(lang).help)
        .reply_markup(crate::bot::keyboards::main_menu(lang))
        .await?;
    Ok(())
}

pub async fn cmd_pay(
    bot: Bot,
    msg: Message,
    state: BotState,
    dialogue: PaymentDialogue,
) -> HandlerResult {
    let Some(user) = msg.from.as_ref() else {
        return Ok(());
    };
    let payer = state.payer(user).await?;
    tracing::info!(user_id = payer.user_id, "Payment flow started");
    drive(&bot, msg.chat.id, &dialogue, &state, &payer, Input::Begin).await
}

pub async fn cmd_status(bot: Bot, msg: Message, state: BotState) -> HandlerResult {
    let Some(user_id) = sender_user_id(&msg) else {
        return Ok(());
    };
    send_status(&bot, msg.chat.id, &state, user_id).await
}

async fn cmd_cancel(
    bot: Bot,
    msg: Message,
    state: BotState,
    dialogue: PaymentDialogue,
) -> HandlerResult {
    let Some(user_id) = sender_user_id(&msg) else {
        return Ok(());
    };
    dialogue.exit().await?;
    let lang = state.lang_of(user_id).await;
    bot.send_message(msg.chat.id, texts(lang).cancelled)
        .reply_markup(crate::bot::keyboards::main_menu(lang))
        .await?;
    Ok(())
}
