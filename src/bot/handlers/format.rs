use crate::db::SubscriptionRow;
use crate::flow::Draft;
use crate::i18n::{fill, format_amount, texts};
use crate::language::Lang;
use crate::plans::{Catalog, parse_date};
use crate::scheduler::{Bucket, classify};
use chrono::NaiveDate;
use teloxide::utils::html;

pub fn payment_instructions_text(lang: Lang, amount: f64, wallet: &str) -> String {
    let t = texts(lang);
    format!(
        "{}\n\n<code>{}</code>\n\n{}",
        fill(t.payment_instructions, &[("amount", &format_amount(amount))]),
        html::escape(wallet),
        t.save_hash,
    )
}

pub fn confirmation_text(lang: Lang, draft: &Draft, catalog: &Catalog) -> String {
    let plan_name = draft
        .plan_id
        .as_deref()
        .and_then(|id| catalog.get(id))
        .map(|plan| plan.name(lang).to_string())
        .unwrap_or_else(|| "—".to_string());
    fill(
        texts(lang).confirm_data,
        &[
            ("username", &html::escape(draft.external_username.as_deref().unwrap_or(""))),
            ("plan", &html::escape(&plan_name)),
            ("amount", &draft.amount.map(format_amount).unwrap_or_default()),
            ("hash", &html::escape(draft.tx_hash.as_deref().unwrap_or(""))),
        ],
    )
}

/// Список подписок пользователя. Активна, пока дата окончания не раньше сегодняшней.
pub fn status_text(lang: Lang, rows: &[SubscriptionRow], today: NaiveDate) -> String {
    let t = texts(lang);
    if rows.is_empty() {
        return t.no_subscriptions.to_string();
    }

    let mut lines = vec![t.status_title.to_string()];
    for row in rows {
        let expired = parse_date(&row.subscription_end)
            .is_none_or(|end| classify(today, end) == Bucket::Expired);
        let template = if expired {
            t.status_expired
        } else {
            t.status_active
        };
        lines.push(fill(
            template,
            &[
                ("username", &html::escape(&row.external_username)),
                ("date", &row.subscription_end),
            ],
        ));
    }
    lines.join("\n")
}

pub fn instruction_text(lang: Lang, url: Option<&str>) -> String {
    let t = texts(lang);
    match url {
        Some(url) => fill(t.instruction, &[("url", &html::escape(url))]),
        None => t.instruction_missing.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(external: &str, end: &str) -> SubscriptionRow {
        SubscriptionRow {
            user_id: 1,
            external_username: external.to_string(),
            subscription_end: end.to_string(),
            language: Some("en".into()),
            handle: None,
        }
    }

    #[test]
    fn status_marks_active_and_expired_pairs() {
        let today = parse_date("2024-06-10").unwrap();
        let text = status_text(
            Lang::En,
            &[row("fresh", "2024-06-10"), row("old<x>", "2024-06-09")],
            today,
        );
        assert_eq!(
            text,
            "📅 Your subscriptions:\n\
             ✅ <b>fresh</b>: active until 2024-06-10\n\
             ❌ <b>old&lt;x&gt;</b>: expired on 2024-06-09"
        );
    }

    #[test]
    fn status_without_rows() {
        let today = parse_date("2024-06-10").unwrap();
        assert_eq!(status_text(Lang::Es, &[], today), "Todavía no tienes suscripciones.");
    }

    #[test]
    fn confirmation_names_plan_in_user_language() {
        let draft = Draft {
            plan_id: Some("3mo".into()),
            amount: Some(148.0),
            days: Some(90),
            external_username: Some("trader_joe".into()),
            tx_hash: Some("0xABC".into()),
        };
        let text = confirmation_text(Lang::Ru, &draft, &Catalog::default());
        assert!(text.contains("<b>trader_joe</b>"));
        assert!(text.contains("3 Месяца (148 USDT)"));
        assert!(text.contains("<code>0xABC</code>"));
    }

    #[test]
    fn confirmation_shows_placeholder_like_username_verbatim() {
        let draft = Draft {
            plan_id: Some("1mo".into()),
            amount: Some(58.0),
            days: Some(30),
            external_username: Some("{hash}".into()),
            tx_hash: Some("0xSECRET".into()),
        };
        let text = confirmation_text(Lang::En, &draft, &Catalog::default());
        assert!(text.contains("<b>{hash}</b>"));
        assert_eq!(text.matches("0xSECRET").count(), 1);
    }

    #[test]
    fn instructions_include_wallet() {
        let text = payment_instructions_text(Lang::En, 58.0, "TXYZ");
        assert!(text.starts_with("Please send 58 USDT"));
        assert!(text.contains("<code>TXYZ</code>"));
    }
}
