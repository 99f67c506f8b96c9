use crate::config::Config;
use crate::db::Db;
use crate::flow::ConversationState;
use crate::language::{Lang, LanguageCache};
use crate::notify::AdminNotifier;
use crate::payments::Payer;
use std::sync::Arc;
use teloxide::dispatching::dialogue::{Dialogue, InMemStorage};
use teloxide::types::{Message, User};

pub type PaymentDialogue = Dialogue<ConversationState, InMemStorage<ConversationState>>;

#[derive(Clone)]
pub struct BotState {
    pub config: Arc<Config>,
    pub db: Arc<Db>,
    pub languages: LanguageCache,
    pub admins: AdminNotifier,
}

impl BotState {
    /// Язык читается из кэша или БД; ошибка чтения прерывает обработку, а не подменяет язык.
    pub async fn payer(&self, user: &User) -> Result<Payer, anyhow::Error> {
        let user_id = user.id.0 as i64;
        Ok(Payer {
            user_id,
            handle: user.username.clone(),
            lang: self.languages.get(user_id).await?,
        })
    }

    pub async fn lang_of(&self, user_id: i64) -> Lang {
        self.languages.get_or_default(user_id).await
    }
}

pub fn sender_user_id(msg: &Message) -> Option<i64> {
    msg.from.as_ref().map(|user| user.id.0 as i64)
}

pub fn sender_handle(msg: &Message) -> Option<String> {
    msg.from.as_ref().and_then(|user| user.username.clone())
}
