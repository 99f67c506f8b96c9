//! Язык пользователя и ограниченный write-through кэш поверх таблицы users.

use crate::db::Db;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Lang {
    #[default]
    En,
    Ru,
    Es,
}

impl Lang {
    pub const ALL: [Lang; 3] = [Lang::En, Lang::Ru, Lang::Es];

    pub fn code(self) -> &'static str {
        match self {
            Lang::En => "en",
            Lang::Ru => "ru",
            Lang::Es => "es",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim().to_ascii_lowercase().as_str() {
            "en" => Some(Lang::En),
            "ru" => Some(Lang::Ru),
            "es" => Some(Lang::Es),
            _ => None,
        }
    }

    /// Неизвестный или пустой код трактуется как английский.
    pub fn from_stored(code: Option<&str>) -> Self {
        code.and_then(Self::from_code).unwrap_or_default()
    }
}

struct Entries {
    map: HashMap<i64, Lang>,
    order: VecDeque<i64>,
}

/// Кэш языков. Источник истины всегда БД: запись сначала в БД, затем в кэш.
#[derive(Clone)]
pub struct LanguageCache {
    db: Arc<Db>,
    capacity: usize,
    entries: Arc<Mutex<Entries>>,
}

impl LanguageCache {
    pub fn new(db: Arc<Db>, capacity: usize) -> Self {
        Self {
            db,
            capacity: capacity.max(1),
            entries: Arc::new(Mutex::new(Entries {
                map: HashMap::new(),
                order: VecDeque::new(),
            })),
        }
    }

    /// Перечитывает языки из БД. Вызывается при старте процесса.
    pub async fn warm(&self) -> Result<usize, anyhow::Error> {
        let rows = self.db.load_languages().await?;
        let mut entries = self.entries.lock().await;
        entries.map.clear();
        entries.order.clear();
        for (user_id, code) in rows {
            Self::insert_locked(&mut entries, self.capacity, user_id, Lang::from_stored(Some(&code)));
        }
        Ok(entries.map.len())
    }

    pub async fn get(&self, user_id: i64) -> Result<Lang, anyhow::Error> {
        if let Some(lang) = self.entries.lock().await.map.get(&user_id).copied() {
            return Ok(lang);
        }
        let stored = self.db.get_language(user_id).await?;
        let lang = Lang::from_stored(stored.as_deref());
        if stored.is_some() {
            let mut entries = self.entries.lock().await;
            Self::insert_locked(&mut entries, self.capacity, user_id, lang);
        }
        Ok(lang)
    }

    /// Как `get`, но ошибки БД не прерывают диалог: пользователь получит английский.
    pub async fn get_or_default(&self, user_id: i64) -> Lang {
        match self.get(user_id).await {
            Ok(lang) => lang,
            Err(error) => {
                tracing::warn!(user_id, error = %error, "Не удалось прочитать язык пользователя");
                Lang::default()
            }
        }
    }

    pub async fn set(&self, user_id: i64, lang: Lang) -> Result<(), anyhow::Error> {
        self.db.set_language(user_id, lang.code()).await?;
        let mut entries = self.entries.lock().await;
        Self::insert_locked(&mut entries, self.capacity, user_id, lang);
        Ok(())
    }

    fn insert_locked(entries: &mut Entries, capacity: usize, user_id: i64, lang: Lang) {
        if entries.map.insert(user_id, lang).is_some() {
            return;
        }
        entries.order.push_back(user_id);
        while entries.map.len() > capacity {
            let Some(oldest) = entries.order.pop_front() else {
                break;
            };
            entries.map.remove(&oldest);
        }
    }

    #[cfg(test)]
    async fn cached(&self, user_id: i64) -> Option<Lang> {
        self.entries.lock().await.map.get(&user_id).copied()
    }
}
