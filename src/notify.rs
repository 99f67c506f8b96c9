//! Исходящие сообщения: абстракция доставки и рассылка администраторам.

use crate::db::Payment;
use crate::i18n::format_amount;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use teloxide::prelude::*;
use teloxide::types::ParseMode;
use teloxide::utils::html;
use teloxide::{ApiError, RequestError};
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum DeliveryError {
    #[error("Telegram просит подождать {0:?}")]
    RetryAfter(Duration),
    #[error("получатель недоступен (бот заблокирован или чат удалён)")]
    Unreachable,
    #[error("ошибка доставки: {0}")]
    Transport(String),
}

impl From<RequestError> for DeliveryError {
    fn from(err: RequestError) -> Self {
        match err {
            RequestError::RetryAfter(seconds) => DeliveryError::RetryAfter(seconds.duration()),
            RequestError::Api(
                ApiError::BotBlocked | ApiError::UserDeactivated | ApiError::ChatNotFound,
            ) => DeliveryError::Unreachable,
            other => DeliveryError::Transport(other.to_string()),
        }
    }
}

/// Отправка HTML-сообщения в чат. Реализуется ботом и моками в тестах.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Outbox: Send + Sync {
    async fn send(&self, chat_id: i64, text: &str) -> Result<(), DeliveryError>;
}

pub struct TelegramOutbox {
    bot: Bot,
}

impl TelegramOutbox {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl Outbox for TelegramOutbox {
    async fn send(&self, chat_id: i64, text: &str) -> Result<(), DeliveryError> {
        self.bot
            .send_message(ChatId(chat_id), text)
            .parse_mode(ParseMode::Html)
            .await?;
        Ok(())
    }
}

/// Сколько раз подряд ждём RetryAfter для одного получателя, прежде чем сдаться.
pub const MAX_RATE_LIMIT_RETRIES: usize = 5;

/// Отправка с ожиданием при RetryAfter. Остальные ошибки возвращаются сразу.
pub async fn send_with_backoff(
    outbox: &dyn Outbox,
    chat_id: i64,
    text: &str,
) -> Result<(), DeliveryError> {
    let mut attempts = 0;
    loop {
        match outbox.send(chat_id, text).await {
            Err(DeliveryError::RetryAfter(wait)) if attempts < MAX_RATE_LIMIT_RETRIES => {
                attempts += 1;
                tracing::warn!(
                    chat_id,
                    wait_secs = wait.as_secs(),
                    attempt = attempts,
                    "Rate limited by Telegram, waiting before retry"
                );
                tokio::time::sleep(wait).await;
            }
            other => return other,
        }
    }
}

fn tg_handle_line(handle: Option<&str>) -> String {
    handle
        .map(|h| format!("@{}", html::escape(h)))
        .unwrap_or_else(|| "не указан".to_string())
}

#[derive(Clone)]
pub struct AdminNotifier {
    outbox: Arc<dyn Outbox>,
    admin_ids: Arc<[i64]>,
}

impl AdminNotifier {
    pub fn new(outbox: Arc<dyn Outbox>, admin_ids: &[i64]) -> Self {
        Self {
            outbox,
            admin_ids: admin_ids.into(),
        }
    }

    /// Отправляет текст каждому админу независимо. Ошибки только логируются.
    pub async fn broadcast(&self, text: &str) -> usize {
        let mut delivered = 0;
        for admin_id in self.admin_ids.iter() {
            match send_with_backoff(self.outbox.as_ref(), *admin_id, text).await {
                Ok(()) => delivered += 1,
                Err(error) => {
                    tracing::warn!(
                        admin_id = *admin_id,
                        error = %error,
                        "Не удалось отправить уведомление админу"
                    );
                }
            }
        }
        delivered
    }

    pub async fn new_payment(&self, payment: &Payment, tg_handle: Option<&str>) -> usize {
        let text = format!(
            "💰 <b>Новый платеж!</b>\n\n\
             👤 Telegram ID: <code>{}</code>\n\
             👤 Telegram: {}\n\
             👤 TradingView: <b>{}</b>\n\
             🔗 Hash: <code>{}</code>\n\
             💵 Сумма: <b>{} USDT</b>\n\
             📅 Дата платежа: {}\n\
             ⏳ Окончание подписки: <b>{}</b>",
            payment.user_id,
            tg_handle_line(tg_handle),
            html::escape(&payment.external_username),
            html::escape(&payment.tx_hash),
            format_amount(payment.amount),
            payment.purchase_date,
            payment.subscription_end,
        );
        self.broadcast(&text).await
    }

    pub async fn subscription_expired(
        &self,
        user_id: i64,
        tg_handle: Option<&str>,
        external_username: &str,
        subscription_end: &str,
        unreachable: bool,
    ) -> usize {
        let title = if unreachable {
            "❌ <b>Подписка истекла (БОТ ЗАБЛОКИРОВАН ПОЛЬЗОВАТЕЛЕМ)</b>"
        } else {
            "❌ <b>Подписка истекла!</b>"
        };
        let text = format!(
            "{}\n\n\
             👤 Telegram ID: <code>{}</code>\n\
             👤 Telegram: {}\n\
             👤 TradingView: <b>{}</b>\n\
             📅 Истекла: {}",
            title,
            user_id,
            tg_handle_line(tg_handle),
            html::escape(external_username),
            subscription_end,
        );
        self.broadcast(&text).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    type Sent = Arc<Mutex<Vec<(i64, String)>>>;

    fn recording_outbox(fail_for: Option<i64>) -> (MockOutbox, Sent) {
        let sent: Sent = Arc::new(Mutex::new(Vec::new()));
        let log = sent.clone();
        let mut outbox = MockOutbox::new();
        outbox.expect_send().returning(move |chat_id, text| {
            if Some(chat_id) == fail_for {
                return Err(DeliveryError::Unreachable);
            }
            log.lock().unwrap().push((chat_id, text.to_string()));
            Ok(())
        });
        (outbox, sent)
    }

    fn payment() -> Payment {
        Payment {
            id: 1,
            user_id: 42,
            external_username: "trader_joe".into(),
            tx_hash: "0xABC".into(),
            amount: 148.0,
            purchase_date: "2024-01-01".into(),
            subscription_end: "2024-03-31".into(),
        }
    }

    #[tokio::test]
    async fn failing_admin_does_not_block_others() {
        let (outbox, sent) = recording_outbox(Some(2));
        let notifier = AdminNotifier::new(Arc::new(outbox), &[1, 2, 3]);

        let delivered = notifier.new_payment(&payment(), Some("joe")).await;

        assert_eq!(delivered, 2);
        let sent = sent.lock().unwrap();
        let chats: Vec<i64> = sent.iter().map(|(chat, _)| *chat).collect();
        assert_eq!(chats, vec![1, 3]);
        assert!(sent[0].1.contains("trader_joe"));
        assert!(sent[0].1.contains("0xABC"));
        assert!(sent[0].1.contains("148 USDT"));
    }

    #[tokio::test]
    async fn unreachable_expiry_notice_is_distinct() {
        let (outbox, sent) = recording_outbox(None);
        let notifier = AdminNotifier::new(Arc::new(outbox), &[9]);

        notifier
            .subscription_expired(42, None, "acc<1>", "2024-01-01", false)
            .await;
        notifier
            .subscription_expired(42, None, "acc<1>", "2024-01-01", true)
            .await;

        let sent = sent.lock().unwrap();
        assert!(!sent[0].1.contains("ЗАБЛОКИРОВАН"));
        assert!(sent[1].1.contains("ЗАБЛОКИРОВАН"));
        assert!(sent[0].1.contains("acc&lt;1&gt;"));
        assert!(sent[0].1.contains("не указан"));
    }

    #[tokio::test]
    async fn rate_limited_admin_is_retried() {
        let attempts = Arc::new(Mutex::new(Vec::new()));
        let log = attempts.clone();
        let mut limited_once = false;
        let mut outbox = MockOutbox::new();
        outbox.expect_send().times(3).returning(move |chat_id, _| {
            log.lock().unwrap().push(chat_id);
            if chat_id == 1 && !limited_once {
                limited_once = true;
                return Err(DeliveryError::RetryAfter(Duration::from_millis(5)));
            }
            Ok(())
        });
        let notifier = AdminNotifier::new(Arc::new(outbox), &[1, 2]);

        let delivered = notifier.broadcast("hello").await;

        assert_eq!(delivered, 2);
        assert_eq!(*attempts.lock().unwrap(), vec![1, 1, 2]);
    }

    #[tokio::test]
    async fn persistent_rate_limit_gives_up_after_bounded_retries() {
        let mut outbox = MockOutbox::new();
        outbox
            .expect_send()
            .times(MAX_RATE_LIMIT_RETRIES + 1)
            .returning(|_, _| Err(DeliveryError::RetryAfter(Duration::from_millis(1))));

        let result = send_with_backoff(&outbox, 7, "hello").await;

        assert!(matches!(result, Err(DeliveryError::RetryAfter(_))));
    }

    #[test]
    fn maps_request_errors() {
        assert_eq!(
            DeliveryError::from(RequestError::Api(ApiError::BotBlocked)),
            DeliveryError::Unreachable
        );
        assert!(matches!(
            DeliveryError::from(RequestError::Api(ApiError::MessageTextIsEmpty)),
            DeliveryError::Transport(_)
        ));
    }
}
