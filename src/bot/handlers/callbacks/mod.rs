use super::format::instruction_text;
use super::shared::{
    HandlerResult, callback_message_target, callback_prefix_filter, clear_callback_buttons, drive,
};
use super::state::{BotState, PaymentDialogue};
use crate::bot::keyboards::{CB_CONFIRM, CB_CONFIRM_YES, CB_LANG, CB_PAID, CB_PLAN};
use crate::flow::Input;
use crate::i18n::texts;
use crate::language::Lang;
use teloxide::dptree;
use teloxide::prelude::*;
use teloxide::types::ParseMode;

pub fn handler() -> teloxide::dispatching::UpdateHandler<Box<dyn std::error::Error + Send + Sync + 'static>> {
    Update::filter_callback_query()
        .branch(dptree::filter_map(callback_prefix_filter(CB_LANG)).endpoint(callback_language))
        .branch(dptree::filter_map(callback_prefix_filter(CB_PLAN)).endpoint(callback_plan))
        .branch(dptree::filter_map(callback_prefix_filter(CB_PAID)).endpoint(callback_paid))
        .branch(dptree::filter_map(callback_prefix_filter(CB_CONFIRM)).endpoint(callback_confirm))
}

fn callback_chat(q: &CallbackQuery) -> ChatId {
    callback_message_target(q)
        .map(|(chat_id, _)| chat_id)
        .unwrap_or(ChatId(q.from.id.0 as i64))
}

async fn callback_language(bot: Bot, q: CallbackQuery, state: BotState) -> HandlerResult {
    let user_id = q.from.id.0 as i64;
    let data = q.data.as_deref().unwrap_or("");
    let Some(lang) = data.strip_prefix(CB_LANG).and_then(Lang::from_code) else {
        tracing::warn!(user_id, data, "Unknown language callback");
        bot.answer_callback_query(q.id.clone()).await?;
        return Ok(());
    };

    state
        .db
        .upsert_user(user_id, q.from.username.as_deref())
        .await?;
    state.languages.set(user_id, lang).await?;
    tracing::info!(user_id, lang = lang.code(), "Language selected");

    bot.answer_callback_query(q.id.clone()).await?;
    clear_callback_buttons(&bot, &q).await;

    let t = texts(lang);
    let chat_id = callback_chat(&q);
    bot.send_message(chat_id, t.welcome)
        .reply_markup(crate::bot::keyboards::main_menu(lang))
        .await?;
    bot.send_message(
        chat_id,
        instruction_text(lang, state.config.instruction_url.as_deref()),
    )
    .parse_mode(ParseMode::Html)
    .await?;
    Ok(())
}

async fn callback_plan(
    bot: Bot,
    q: CallbackQuery,
    state: BotState,
    dialogue: PaymentDialogue,
) -> HandlerResult {
    let plan_id = q
        .data
        .as_deref()
        .and_then(|data| data.strip_prefix(CB_PLAN))
        .unwrap_or("")
        .to_string();
    bot.answer_callback_query(q.id.clone()).await?;

    let payer = state.payer(&q.from).await?;
    tracing::info!(user_id = payer.user_id, plan_id = %plan_id, "Plan selected");
    drive(
        &bot,
        callback_chat(&q),
        &dialogue,
        &state,
        &payer,
        Input::PickPlan(plan_id),
    )
    .await
}

async fn callback_paid(
    bot: Bot,
    q: CallbackQuery,
    state: BotState,
    dialogue: PaymentDialogue,
) -> HandlerResult {
    bot.answer_callback_query(q.id.clone()).await?;
    let payer = state.payer(&q.from).await?;
    drive(&bot, callback_chat(&q), &dialogue, &state, &payer, Input::Paid).await
}

async fn callback_confirm(
    bot: Bot,
    q: CallbackQuery,
    state: BotState,
    dialogue: PaymentDialogue,
) -> HandlerResult {
    let input = if q.data.as_deref() == Some(CB_CONFIRM_YES) {
        Input::Confirm
    } else {
        Input::Edit
    };
    bot.answer_callback_query(q.id.clone()).await?;
    clear_callback_buttons(&bot, &q).await;

    let payer = state.payer(&q.from).await?;
    tracing::info!(user_id = payer.user_id, input = ?input, "Confirmation answered");
    drive(&bot, callback_chat(&q), &dialogue, &state, &payer, input).await
}
