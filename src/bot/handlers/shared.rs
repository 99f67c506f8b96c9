use super::format::{confirmation_text, payment_instructions_text, status_text};
use super::state::{BotState, PaymentDialogue};
use crate::flow::{ConversationState, Input, Step, Transition, advance};
use crate::i18n::{fill, texts};
use crate::payments::{Payer, SubmitError, submit};
use chrono::Local;
use teloxide::prelude::*;
use teloxide::types::{InputFile, MessageId, ParseMode};

pub type HandlerResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

pub fn callback_message_target(q: &CallbackQuery) -> Option<(ChatId, MessageId)> {
    q.message.as_ref().map(|msg| (msg.chat().id, msg.id()))
}

pub fn callback_prefix_filter(prefix: &'static str) -> impl Fn(CallbackQuery) -> Option<CallbackQuery> {
    move |q: CallbackQuery| {
        if q.data.as_deref().is_some_and(|payload| payload.starts_with(prefix)) {
            Some(q)
        } else {
            None
        }
    }
}

/// Убирает inline-кнопки под сообщением, чтобы по ним нельзя было нажать повторно.
pub async fn clear_callback_buttons(bot: &Bot, q: &CallbackQuery) {
    if let Some((chat_id, message_id)) = callback_message_target(q)
        && let Err(error) = bot.edit_message_reply_markup(chat_id, message_id).await
    {
        tracing::debug!(error = %error, "Не удалось убрать inline-кнопки");
    }
}

/// Прогоняет ввод через машину состояний, сохраняет новое состояние и показывает шаг.
pub async fn drive(
    bot: &Bot,
    chat_id: ChatId,
    dialogue: &PaymentDialogue,
    state: &BotState,
    payer: &Payer,
    input: Input,
) -> HandlerResult {
    let current = dialogue.get_or_default().await?;
    let is_text = matches!(input, Input::Text(_));
    let Transition { next, step } = advance(current, input, &state.config.catalog);

    if next == ConversationState::Idle {
        dialogue.exit().await?;
    } else {
        dialogue.update(next).await?;
    }

    if step == Step::Ignored {
        if is_text {
            bot.send_message(chat_id, texts(payer.lang).not_understood)
                .reply_markup(crate::bot::keyboards::main_menu(payer.lang))
                .await?;
        }
        return Ok(());
    }
    render_step(bot, chat_id, state, payer, step).await
}

async fn render_step(
    bot: &Bot,
    chat_id: ChatId,
    state: &BotState,
    payer: &Payer,
    step: Step,
) -> HandlerResult {
    let lang = payer.lang;
    let t = texts(lang);
    match step {
        Step::PromptPlan => {
            bot.send_message(chat_id, t.choose_plan)
                .reply_markup(crate::bot::keyboards::plan_buttons(&state.config.catalog, lang))
                .await?;
        }
        Step::RejectPlan => {
            bot.send_message(chat_id, t.invalid_plan)
                .reply_markup(crate::bot::keyboards::plan_buttons(&state.config.catalog, lang))
                .await?;
        }
        Step::PromptUsername | Step::RepromptUsername => {
            bot.send_message(chat_id, t.enter_username).await?;
        }
        Step::ShowPaymentInstructions { amount } => {
            send_payment_instructions(bot, chat_id, state, payer, amount).await?;
        }
        Step::PromptHash | Step::RepromptHash => {
            bot.send_message(chat_id, t.enter_hash).await?;
        }
        Step::ShowConfirmation(draft) => {
            bot.send_message(chat_id, confirmation_text(lang, &draft, &state.config.catalog))
                .parse_mode(ParseMode::Html)
                .reply_markup(crate::bot::keyboards::confirm_buttons(lang))
                .await?;
        }
        Step::Submit(submission) => {
            let today = Local::now().date_naive();
            let text = match submit(&state.db, &state.admins, payer, &submission, today).await {
                Ok(payment) => fill(
                    t.payment_received,
                    &[(
                        "username",
                        &teloxide::utils::html::escape(&payment.external_username),
                    )],
                ),
                Err(SubmitError::DuplicateHash) => {
                    tracing::info!(
                        user_id = payer.user_id,
                        tx_hash = %submission.tx_hash,
                        "Rejected duplicate transaction hash"
                    );
                    fill(
                        t.duplicate_hash,
                        &[("support", &state.config.support_username)],
                    )
                }
                Err(SubmitError::Storage(error)) => {
                    tracing::error!(
                        user_id = payer.user_id,
                        error = %error,
                        "Не удалось сохранить платеж"
                    );
                    t.error_occurred.to_string()
                }
            };
            bot.send_message(chat_id, text)
                .parse_mode(ParseMode::Html)
                .reply_markup(crate::bot::keyboards::main_menu(lang))
                .await?;
        }
        Step::Abort => {
            tracing::warn!(user_id = payer.user_id, "Payment draft is incomplete, dialogue reset");
            bot.send_message(chat_id, t.error_occurred)
                .reply_markup(crate::bot::keyboards::main_menu(lang))
                .await?;
        }
        Step::Ignored => {}
    }
    Ok(())
}

/// Реквизиты для оплаты. Если настроенная картинка существует, отправляются фото с подписью.
pub async fn send_payment_instructions(
    bot: &Bot,
    chat_id: ChatId,
    state: &BotState,
    payer: &Payer,
    amount: f64,
) -> HandlerResult {
    let text = payment_instructions_text(payer.lang, amount, &state.config.wallet);
    let keyboard =
        crate::bot::keyboards::payment_buttons(payer.lang, &state.config.support_username);

    if let Some(photo) = state.config.payment_photo.as_ref().filter(|path| path.exists()) {
        let sent = bot
            .send_photo(chat_id, InputFile::file(photo.clone()))
            .caption(text.clone())
            .parse_mode(ParseMode::Html)
            .reply_markup(keyboard.clone())
            .await;
        match sent {
            Ok(_) => return Ok(()),
            Err(error) => {
                tracing::warn!(
                    path = %photo.display(),
                    error = %error,
                    "Не удалось отправить фото с реквизитами, отправляю текстом"
                );
            }
        }
    }

    bot.send_message(chat_id, text)
        .parse_mode(ParseMode::Html)
        .reply_markup(keyboard)
        .await?;
    Ok(())
}

pub async fn send_status(bot: &Bot, chat_id: ChatId, state: &BotState, user_id: i64) -> HandlerResult {
    let lang = state.lang_of(user_id).await;
    let rows = state.db.subscriptions_for_user(user_id).await?;
    let text = status_text(lang, &rows, Local::now().date_naive());
    bot.send_message(chat_id, text)
        .parse_mode(ParseMode::Html)
        .reply_markup(crate::bot::keyboards::main_menu(lang))
        .await?;
    Ok(())
}
