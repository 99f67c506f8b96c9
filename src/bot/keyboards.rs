//! Клавиатуры бота: inline и постоянные reply-кнопки.

use crate::i18n::{format_amount, texts};
use crate::language::Lang;
use crate::plans::Catalog;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup, KeyboardButton, KeyboardMarkup};

pub const CB_LANG: &str = "lang:";
pub const CB_PLAN: &str = "plan:";
pub const CB_PAID: &str = "paid";
pub const CB_CONFIRM: &str = "confirm:";
pub const CB_CONFIRM_YES: &str = "confirm:yes";
pub const CB_CONFIRM_NO: &str = "confirm:no";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuButton {
    Instruction,
    Payment,
    Status,
    Support,
}

/// Кнопки меню узнаются на любом языке: пользователь мог сменить язык со старой клавиатурой.
pub fn parse_menu_button(text: &str) -> Option<MenuButton> {
    Lang::ALL.iter().find_map(|lang| {
        let t = texts(*lang);
        match text {
            s if s == t.menu_instruction => Some(MenuButton::Instruction),
            s if s == t.menu_payment => Some(MenuButton::Payment),
            s if s == t.menu_status => Some(MenuButton::Status),
            s if s == t.menu_support => Some(MenuButton::Support),
            _ => None,
        }
    })
}

pub fn main_menu(lang: Lang) -> KeyboardMarkup {
    let t = texts(lang);
    KeyboardMarkup::new(vec![
        vec![
            KeyboardButton::new(t.menu_instruction),
            KeyboardButton::new(t.menu_payment),
        ],
        vec![
            KeyboardButton::new(t.menu_status),
            KeyboardButton::new(t.menu_support),
        ],
    ])
    .resize_keyboard()
    .persistent()
}

pub fn language_picker() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::default().append_row(vec![
        InlineKeyboardButton::callback("🇬🇧 English", format!("{}en", CB_LANG)),
        InlineKeyboardButton::callback("🇷🇺 Русский", format!("{}ru", CB_LANG)),
        InlineKeyboardButton::callback("🇪🇸 Español", format!("{}es", CB_LANG)),
    ])
}

pub fn plan_buttons(catalog: &Catalog, lang: Lang) -> InlineKeyboardMarkup {
    catalog
        .plans()
        .iter()
        .fold(InlineKeyboardMarkup::default(), |markup, plan| {
            markup.append_row(vec![InlineKeyboardButton::callback(
                format!("{} - {} USDT", plan.name(lang), format_amount(plan.price)),
                format!("{}{}", CB_PLAN, plan.id),
            )])
        })
}

pub fn payment_buttons(lang: Lang, support_username: &str) -> InlineKeyboardMarkup {
    let t = texts(lang);
    let mut row = vec![InlineKeyboardButton::callback(t.paid_button, CB_PAID)];
    if let Some(support) = support_button(t.help_button, support_username) {
        row.push(support);
    }
    InlineKeyboardMarkup::default().append_row(row)
}

pub fn confirm_buttons(lang: Lang) -> InlineKeyboardMarkup {
    let t = texts(lang);
    InlineKeyboardMarkup::default().append_row(vec![
        InlineKeyboardButton::callback(t.confirm_yes, CB_CONFIRM_YES),
        InlineKeyboardButton::callback(t.confirm_no, CB_CONFIRM_NO),
    ])
}

fn support_button(label: &str, support_username: &str) -> Option<InlineKeyboardButton> {
    let url = format!("https://t.me/{}", support_username.trim_start_matches('@'));
    match url.parse() {
        Ok(url) => Some(InlineKeyboardButton::url(label, url)),
        Err(error) => {
            tracing::warn!(%url, error = %error, "Некорректная ссылка на поддержку");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use teloxide::types::InlineKeyboardButtonKind;

    fn callback_data(button: &InlineKeyboardButton) -> Option<&str> {
        match &button.kind {
            InlineKeyboardButtonKind::CallbackData(data) => Some(data),
            _ => None,
        }
    }

    #[test]
    fn menu_buttons_recognized_in_every_language() {
        assert_eq!(parse_menu_button("💳 Payment"), Some(MenuButton::Payment));
        assert_eq!(parse_menu_button("💳 Оплата"), Some(MenuButton::Payment));
        assert_eq!(parse_menu_button("📅 Mis suscripciones"), Some(MenuButton::Status));
        assert_eq!(parse_menu_button("🆘 Поддержка"), Some(MenuButton::Support));
        assert_eq!(parse_menu_button("📜 Instrucción"), Some(MenuButton::Instruction));
        assert_eq!(parse_menu_button("trader_joe"), None);
    }

    #[test]
    fn plan_rows_carry_plan_ids() {
        let markup = plan_buttons(&Catalog::default(), Lang::Ru);
        let data: Vec<_> = markup
            .inline_keyboard
            .iter()
            .map(|row| callback_data(&row[0]))
            .collect();
        assert_eq!(data, vec![Some("plan:1mo"), Some("plan:3mo"), Some("plan:1yr")]);
        assert_eq!(markup.inline_keyboard[1][0].text, "3 Месяца - 148 USDT");
    }

    #[test]
    fn payment_buttons_link_to_support() {
        let markup = payment_buttons(Lang::En, "@helpdesk");
        let row = &markup.inline_keyboard[0];
        assert_eq!(callback_data(&row[0]), Some("paid"));
        match &row[1].kind {
            InlineKeyboardButtonKind::Url(url) => assert_eq!(url.as_str(), "https://t.me/helpdesk"),
            other => panic!("expected url button, got {other:?}"),
        }
    }
}
