//! Периодическая проверка подписок и рассылка предупреждений об окончании.

use crate::config::SchedulerSettings;
use crate::db::{Db, SubscriptionRow};
use crate::i18n::{fill, texts};
use crate::language::Lang;
use crate::notify::{AdminNotifier, DeliveryError, Outbox, send_with_backoff};
use crate::plans::parse_date;
use chrono::{Local, NaiveDate};
use std::sync::Arc;
use std::time::Instant;
use teloxide::utils::html;

/// За сколько дней до окончания начинаем предупреждать.
pub const WARN_WINDOW_DAYS: i64 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bucket {
    Warn { days_left: i64 },
    Expired,
    None,
}

pub fn classify(today: NaiveDate, subscription_end: NaiveDate) -> Bucket {
    let days_until_expiry = (subscription_end - today).num_days();
    if days_until_expiry < 0 {
        Bucket::Expired
    } else if days_until_expiry < WARN_WINDOW_DAYS {
        Bucket::Warn {
            days_left: days_until_expiry + 1,
        }
    } else {
        Bucket::None
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TickReport {
    pub checked: usize,
    pub warned: usize,
    pub expired: usize,
    pub unreachable: usize,
    pub failed: usize,
    pub skipped: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RowOutcome {
    Quiet,
    Warned,
    Expired,
    ExpiredUnreachable,
    Unreachable,
}

pub struct Scheduler {
    db: Arc<Db>,
    outbox: Arc<dyn Outbox>,
    admins: AdminNotifier,
    settings: SchedulerSettings,
}

impl Scheduler {
    pub fn new(
        db: Arc<Db>,
        outbox: Arc<dyn Outbox>,
        admins: AdminNotifier,
        settings: SchedulerSettings,
    ) -> Self {
        Self {
            db,
            outbox,
            admins,
            settings,
        }
    }

    /// Бесконечный цикл: проверка, затем сон на интервал. Ошибка тика не завершает процесс.
    pub async fn run(self) {
        tracing::info!(
            interval_secs = self.settings.interval_secs,
            recovery_secs = self.settings.recovery_secs,
            "Subscription scheduler started"
        );
        tokio::time::sleep(self.settings.startup_delay()).await;

        loop {
            let started = Instant::now();
            let today = Local::now().date_naive();
            match self.run_tick(today).await {
                Ok(report) => {
                    tracing::info!(
                        checked = report.checked,
                        warned = report.warned,
                        expired = report.expired,
                        unreachable = report.unreachable,
                        failed = report.failed,
                        skipped = report.skipped,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "Subscription check finished"
                    );
                    tokio::time::sleep(self.settings.interval()).await;
                }
                Err(error) => {
                    tracing::error!(
                        error = %error,
                        retry_in_secs = self.settings.recovery_secs,
                        "Subscription check failed"
                    );
                    tokio::time::sleep(self.settings.recovery()).await;
                }
            }
        }
    }

    pub async fn run_tick(&self, today: NaiveDate) -> Result<TickReport, anyhow::Error> {
        let rows = self.db.current_subscriptions().await?;
        tracing::info!(pairs = rows.len(), %today, "Checking subscriptions");

        let mut report = TickReport::default();
        for row in &rows {
            report.checked += 1;
            let Some(end) = parse_date(&row.subscription_end) else {
                tracing::error!(
                    user_id = row.user_id,
                    external_username = %row.external_username,
                    subscription_end = %row.subscription_end,
                    "Некорректная дата окончания, пропуск"
                );
                report.skipped += 1;
                continue;
            };

            let bucket = classify(today, end);
            if bucket == Bucket::None {
                continue;
            }

            match self.process_row(row, bucket).await {
                Ok(RowOutcome::Quiet) => {}
                Ok(RowOutcome::Warned) => report.warned += 1,
                Ok(RowOutcome::Expired) => report.expired += 1,
                Ok(RowOutcome::ExpiredUnreachable) => {
                    report.expired += 1;
                    report.unreachable += 1;
                }
                Ok(RowOutcome::Unreachable) => report.unreachable += 1,
                Err(error) => {
                    tracing::warn!(
                        user_id = row.user_id,
                        external_username = %row.external_username,
                        error = %error,
                        "Не удалось отправить уведомление о подписке"
                    );
                    report.failed += 1;
                }
            }

            let pause = self.settings.pause();
            if !pause.is_zero() {
                tokio::time::sleep(pause).await;
            }
        }
        Ok(report)
    }

    async fn process_row(
        &self,
        row: &SubscriptionRow,
        bucket: Bucket,
    ) -> Result<RowOutcome, DeliveryError> {
        let lang = Lang::from_stored(row.language.as_deref());
        let t = texts(lang);
        let username = html::escape(&row.external_username);

        match bucket {
            Bucket::None => Ok(RowOutcome::Quiet),
            Bucket::Warn { days_left } => {
                let text = fill(
                    t.subscription_warning,
                    &[
                        ("username", &username),
                        ("days", &days_left.to_string()),
                        ("date", &row.subscription_end),
                    ],
                );
                match send_with_backoff(self.outbox.as_ref(), row.user_id, &text).await {
                    Ok(()) => {
                        tracing::info!(
                            user_id = row.user_id,
                            external_username = %row.external_username,
                            days_left,
                            "Expiry warning sent"
                        );
                        Ok(RowOutcome::Warned)
                    }
                    Err(DeliveryError::Unreachable) => {
                        tracing::warn!(user_id = row.user_id, "Пользователь заблокировал бота");
                        Ok(RowOutcome::Unreachable)
                    }
                    Err(error) => Err(error),
                }
            }
            Bucket::Expired => {
                let text = fill(
                    t.subscription_expired,
                    &[("username", &username), ("date", &row.subscription_end)],
                );
                let sent = send_with_backoff(self.outbox.as_ref(), row.user_id, &text).await;
                let unreachable = match sent {
                    Ok(()) => false,
                    Err(DeliveryError::Unreachable) => {
                        tracing::warn!(user_id = row.user_id, "Пользователь заблокировал бота");
                        true
                    }
                    Err(error) => return Err(error),
                };
                tracing::info!(
                    user_id = row.user_id,
                    external_username = %row.external_username,
                    subscription_end = %row.subscription_end,
                    unreachable,
                    "Expiry notice processed"
                );
                self.admins
                    .subscription_expired(
                        row.user_id,
                        row.handle.as_deref(),
                        &row.external_username,
                        &row.subscription_end,
                        unreachable,
                    )
                    .await;
                Ok(if unreachable {
                    RowOutcome::ExpiredUnreachable
                } else {
                    RowOutcome::Expired
                })
            }
        }
    }
}
