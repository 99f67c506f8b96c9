use super::commands::{cmd_pay, cmd_status};
use super::format::instruction_text;
use super::shared::{HandlerResult, drive};
use super::state::{BotState, PaymentDialogue};
use crate::bot::keyboards::{MenuButton, main_menu, parse_menu_button};
use crate::flow::Input;
use crate::i18n::{fill, texts};
use teloxide::prelude::*;
use teloxide::types::ParseMode;

/// Текст без команды: сначала кнопки меню, затем ввод для текущего шага оплаты.
pub async fn handle_text(
    bot: Bot,
    msg: Message,
    state: BotState,
    dialogue: PaymentDialogue,
) -> HandlerResult {
    let Some(text) = msg.text().map(str::to_owned) else {
        return Ok(());
    };
    let Some(user) = msg.from.clone() else {
        return Ok(());
    };
    let payer = state.payer(&user).await?;
    let lang = payer.lang;

    match parse_menu_button(&text) {
        Some(MenuButton::Payment) => cmd_pay(bot, msg, state, dialogue).await,
        Some(MenuButton::Status) => cmd_status(bot, msg, state).await,
        Some(MenuButton::Instruction) => {
            bot.send_message(
                msg.chat.id,
                instruction_text(lang, state.config.instruction_url.as_deref()),
            )
            .parse_mode(ParseMode::Html)
            .reply_markup(main_menu(lang))
            .await?;
            Ok(())
        }
        Some(MenuButton::Support) => {
            bot.send_message(
                msg.chat.id,
                fill(
                    texts(lang).support,
                    &[("support", &state.config.support_username)],
                ),
            )
            .reply_markup(main_menu(lang))
            .await?;
            Ok(())
        }
        None => drive(&bot, msg.chat.id, &dialogue, &state, &payer, Input::Text(text)).await,
    }
}
