//! Тексты бота на английском, русском и испанском. Разметка HTML.

use crate::language::Lang;

pub struct Texts {
    pub choose_language: &'static str,
    pub welcome: &'static str,
    pub instruction: &'static str,
    pub instruction_missing: &'static str,
    pub choose_plan: &'static str,
    pub invalid_plan: &'static str,
    pub enter_username: &'static str,
    pub payment_instructions: &'static str,
    pub save_hash: &'static str,
    pub enter_hash: &'static str,
    pub confirm_data: &'static str,
    pub confirm_yes: &'static str,
    pub confirm_no: &'static str,
    pub payment_received: &'static str,
    pub duplicate_hash: &'static str,
    pub error_occurred: &'static str,
    pub subscription_warning: &'static str,
    pub subscription_expired: &'static str,
    pub support: &'static str,
    pub paid_button: &'static str,
    pub help_button: &'static str,
    pub menu_instruction: &'static str,
    pub menu_payment: &'static str,
    pub menu_status: &'static str,
    pub menu_support: &'static str,
    pub status_title: &'static str,
    pub status_active: &'static str,
    pub status_expired: &'static str,
    pub no_subscriptions: &'static str,
    pub cancelled: &'static str,
    pub help: &'static str,
    pub not_understood: &'static str,
}

const EN: Texts = Texts {
    choose_language: "🌎 Choose a language:",
    welcome: "Welcome! Here you can pay for access to the TradingView indicator.",
    instruction: "📌 Instruction: <a href=\"{url}\">click here</a>",
    instruction_missing: "📌 Instruction will be available soon. Please contact support.",
    choose_plan: "💳 Choose your subscription plan:",
    invalid_plan: "Invalid plan selected.",
    enter_username: "Enter the TradingView username for which you want to pay:",
    payment_instructions: "Please send {amount} USDT (TRC-20 network) to the following address:",
    save_hash: "Save the transaction hash.",
    enter_hash: "Please send the transaction hash:",
    confirm_data: "📋 Please check your details:\n\n👤 TradingView username: <b>{username}</b>\n💰 Plan: {plan} ({amount} USDT)\n🔗 Transaction hash: <code>{hash}</code>\n\nIs everything correct?",
    confirm_yes: "✅ All correct",
    confirm_no: "✏️ Edit",
    payment_received: "✅ Your payment for TradingView account <b>{username}</b> has been recorded and will be processed soon.",
    duplicate_hash: "This transaction hash has already been used. If you believe this is an error, please contact @{support}.",
    error_occurred: "An error occurred. Please try again later or contact support.",
    subscription_warning: "⚠️ Your subscription for TradingView account <b>{username}</b> will expire in {days} days on {date}.",
    subscription_expired: "❌ Your subscription for TradingView account <b>{username}</b> has expired on {date}.",
    support: "For assistance, please contact @{support}",
    paid_button: "✅ Paid",
    help_button: "🆘 Help",
    menu_instruction: "📜 Instruction",
    menu_payment: "💳 Payment",
    menu_status: "📅 My subscriptions",
    menu_support: "🆘 Support",
    status_title: "📅 Your subscriptions:",
    status_active: "✅ <b>{username}</b>: active until {date}",
    status_expired: "❌ <b>{username}</b>: expired on {date}",
    no_subscriptions: "You have no subscriptions yet.",
    cancelled: "Payment cancelled.",
    help: "/start — choose language\n/pay — pay for a subscription\n/status — my subscriptions\n/cancel — cancel the current payment",
    not_understood: "Please use the menu buttons below.",
};

const RU: Texts = Texts {
    choose_language: "🌎 Выберите язык:",
    welcome: "Добро пожаловать! Здесь вы можете оплатить доступ к индикатору TradingView.",
    instruction: "📌 Инструкция: <a href=\"{url}\">нажмите здесь</a>",
    instruction_missing: "📌 Инструкция скоро появится. Обратитесь в поддержку.",
    choose_plan: "💳 Выберите тарифный план:",
    invalid_plan: "Выбран неизвестный тариф.",
    enter_username: "Введите никнейм TradingView, для которого хотите оплатить:",
    payment_instructions: "Пожалуйста, отправьте {amount} USDT (сеть TRC-20) на следующий адрес:",
    save_hash: "Сохраните хэш транзакции.",
    enter_hash: "Пожалуйста, отправьте хэш транзакции:",
    confirm_data: "📋 Пожалуйста, проверьте введенные данные:\n\n👤 Аккаунт TradingView: <b>{username}</b>\n💰 План: {plan} ({amount} USDT)\n🔗 Transaction hash: <code>{hash}</code>\n\nВсе верно?",
    confirm_yes: "✅ Все верно",
    confirm_no: "✏️ Изменить",
    payment_received: "✅ Ваш платеж для аккаунта TradingView <b>{username}</b> записан и скоро будет обработан.",
    duplicate_hash: "Этот хэш транзакции уже был использован. Если вы считаете, что это ошибка, обратитесь к @{support}.",
    error_occurred: "Произошла ошибка. Пожалуйста, попробуйте позже или обратитесь в поддержку.",
    subscription_warning: "⚠️ Ваша подписка для аккаунта TradingView <b>{username}</b> истечет через {days} дня(ей) {date}.",
    subscription_expired: "❌ Ваша подписка для аккаунта TradingView <b>{username}</b> истекла {date}.",
    support: "Для получения помощи, пожалуйста, обратитесь к @{support}",
    paid_button: "✅ Оплатил",
    help_button: "🆘 Помощь",
    menu_instruction: "📜 Инструкция",
    menu_payment: "💳 Оплата",
    menu_status: "📅 Мои подписки",
    menu_support: "🆘 Поддержка",
    status_title: "📅 Ваши подписки:",
    status_active: "✅ <b>{username}</b>: активна до {date}",
    status_expired: "❌ <b>{username}</b>: истекла {date}",
    no_subscriptions: "У вас пока нет подписок.",
    cancelled: "Оплата отменена.",
    help: "/start — выбрать язык\n/pay — оплатить подписку\n/status — мои подписки\n/cancel — отменить текущую оплату",
    not_understood: "Пожалуйста, используйте кнопки меню ниже.",
};

const ES: Texts = Texts {
    choose_language: "🌎 Elige un idioma:",
    welcome: "¡Bienvenido! Aquí puedes pagar el acceso al indicador de TradingView.",
    instruction: "📌 Instrucción: <a href=\"{url}\">haz clic aquí</a>",
    instruction_missing: "📌 La instrucción estará disponible pronto. Contacte con soporte.",
    choose_plan: "💳 Elige tu plan de suscripción:",
    invalid_plan: "Plan no válido.",
    enter_username: "Introduce el nombre de usuario de TradingView para el que deseas pagar:",
    payment_instructions: "Por favor, envíe {amount} USDT (red TRC-20) a la siguiente dirección:",
    save_hash: "Guarde el hash de la transacción.",
    enter_hash: "Por favor, envíe el hash de la transacción:",
    confirm_data: "📋 Por favor, verifique sus datos:\n\n👤 Cuenta TradingView: <b>{username}</b>\n💰 Plan: {plan} ({amount} USDT)\n🔗 Hash de transacción: <code>{hash}</code>\n\n¿Todo correcto?",
    confirm_yes: "✅ Todo correcto",
    confirm_no: "✏️ Editar",
    payment_received: "✅ Tu pago para la cuenta de TradingView <b>{username}</b> ha sido registrado y será procesado pronto.",
    duplicate_hash: "Este hash de transacción ya ha sido utilizado. Si cree que esto es un error, contacte con @{support}.",
    error_occurred: "Ocurrió un error. Por favor, inténtelo de nuevo más tarde o contacte con soporte.",
    subscription_warning: "⚠️ Tu suscripción para la cuenta de TradingView <b>{username}</b> expirará en {days} días el {date}.",
    subscription_expired: "❌ Tu suscripción para la cuenta de TradingView <b>{username}</b> ha expirado el {date}.",
    support: "Para asistencia, por favor contacte a @{support}",
    paid_button: "✅ Pagado",
    help_button: "🆘 Soporte",
    menu_instruction: "📜 Instrucción",
    menu_payment: "💳 Pago",
    menu_status: "📅 Mis suscripciones",
    menu_support: "🆘 Soporte",
    status_title: "📅 Tus suscripciones:",
    status_active: "✅ <b>{username}</b>: activa hasta {date}",
    status_expired: "❌ <b>{username}</b>: expiró el {date}",
    no_subscriptions: "Todavía no tienes suscripciones.",
    cancelled: "Pago cancelado.",
    help: "/start — elegir idioma\n/pay — pagar una suscripción\n/status — mis suscripciones\n/cancel — cancelar el pago actual",
    not_understood: "Por favor, use los botones del menú.",
};

pub fn texts(lang: Lang) -> &'static Texts {
    match lang {
        Lang::En => &EN,
        Lang::Ru => &RU,
        Lang::Es => &ES,
    }
}

/// Подставляет значения вместо `{key}` за один проход по шаблону.
/// Подставленные значения повторно не разбираются; неизвестные ключи остаются как есть.
pub fn fill(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let Some(close) = after.find('}') else {
            out.push_str(&rest[open..]);
            return out;
        };
        let key = &after[..close];
        match values.iter().find(|(name, _)| *name == key) {
            Some((_, value)) => out.push_str(value),
            None => out.push_str(&rest[open..open + close + 2]),
        }
        rest = &after[close + 1..];
    }
    out.push_str(rest);
    out
}

/// Сумма без дробной части, если она целая: 148 вместо 148.0.
pub fn format_amount(amount: f64) -> String {
    if amount.fract() == 0.0 {
        format!("{:.0}", amount)
    } else {
        format!("{:.2}", amount)
    }
}
