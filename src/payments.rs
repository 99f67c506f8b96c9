//! Запись подтверждённого платежа и уведомление админов.

use crate::db::{Db, InsertPaymentError, NewPayment, Payment};
use crate::flow::Submission;
use crate::language::Lang;
use crate::notify::AdminNotifier;
use crate::plans::{format_date, subscription_end};
use chrono::NaiveDate;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("хэш транзакции уже использован")]
    DuplicateHash,
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

/// Telegram-пользователь, отправивший платёж.
#[derive(Debug, Clone)]
pub struct Payer {
    pub user_id: i64,
    pub handle: Option<String>,
    pub lang: Lang,
}

pub async fn submit(
    db: &Db,
    admins: &AdminNotifier,
    payer: &Payer,
    submission: &Submission,
    today: NaiveDate,
) -> Result<Payment, SubmitError> {
    let end = subscription_end(today, submission.days).ok_or_else(|| {
        anyhow::anyhow!("Некорректный срок тарифа: {} дней", submission.days)
    })?;
    let new_payment = NewPayment {
        external_username: submission.external_username.clone(),
        tx_hash: submission.tx_hash.clone(),
        amount: submission.amount,
        purchase_date: format_date(today),
        subscription_end: format_date(end),
    };

    let payment = db
        .record_payment(
            payer.user_id,
            payer.handle.as_deref(),
            payer.lang.code(),
            &new_payment,
        )
        .await
        .map_err(|err| match err {
            InsertPaymentError::DuplicateHash => SubmitError::DuplicateHash,
            InsertPaymentError::Storage(err) => SubmitError::Storage(err.into()),
        })?;

    tracing::info!(
        user_id = payer.user_id,
        external_username = %payment.external_username,
        plan = ?submission.plan_id,
        subscription_end = %payment.subscription_end,
        "Payment recorded"
    );

    let delivered = admins.new_payment(&payment, payer.handle.as_deref()).await;
    tracing::debug!(delivered, "Admins notified about new payment");

    Ok(payment)
}
