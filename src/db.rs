//! SQLite-слой: пользователи бота и история платежей по аккаунтам TradingView.

use sqlx::FromRow;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

#[cfg(test)]
#[derive(Debug, Clone, FromRow)]
pub struct UserRecord {
    pub user_id: i64,
    pub handle: Option<String>,
    pub language: Option<String>,
}

#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct Payment {
    pub id: i64,
    pub user_id: i64,
    pub external_username: String,
    pub tx_hash: String,
    pub amount: f64,
    pub purchase_date: String,
    pub subscription_end: String,
}

#[derive(Debug, Clone)]
pub struct NewPayment {
    pub external_username: String,
    pub tx_hash: String,
    pub amount: f64,
    pub purchase_date: String,
    pub subscription_end: String,
}

/// Текущая подписка пары (user_id, external_username): максимум subscription_end по её платежам.
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct SubscriptionRow {
    pub user_id: i64,
    pub external_username: String,
    pub subscription_end: String,
    pub language: Option<String>,
    pub handle: Option<String>,
}

#[derive(Debug, Error)]
pub enum InsertPaymentError {
    #[error("хэш транзакции уже использован")]
    DuplicateHash,
    #[error("ошибка БД: {0}")]
    Storage(#[from] sqlx::Error),
}

const DEFAULT_LANGUAGE: &str = "en";

const CURRENT_SUBSCRIPTIONS_SQL: &str = "
    SELECT p.user_id,
           p.external_username,
           MAX(p.subscription_end) AS subscription_end,
           u.language,
           u.handle
    FROM payments p
    JOIN users u ON u.user_id = p.user_id";

pub struct Db {
    pool: SqlitePool,
}

impl Db {
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, anyhow::Error> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)
                .map_err(|e| anyhow::anyhow!("Не удалось создать директорию для БД: {}", e))?;
        }

        let opts = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePool::connect_with(opts)
            .await
            .map_err(|e| anyhow::anyhow!("Не удалось подключиться к SQLite: {}", e))?;

        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    /// In-memory база живёт в рамках одного соединения, поэтому пул ограничен одним.
    pub async fn open_in_memory() -> Result<Self, anyhow::Error> {
        let opts = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(opts)
            .await?;
        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    async fn migrate(&self) -> Result<(), anyhow::Error> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                user_id INTEGER PRIMARY KEY,
                handle TEXT,
                language TEXT DEFAULT 'en'
            );
            CREATE TABLE IF NOT EXISTS payments (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL REFERENCES users(user_id) ON DELETE CASCADE,
                external_username TEXT NOT NULL,
                tx_hash TEXT NOT NULL UNIQUE,
                amount REAL NOT NULL,
                purchase_date TEXT NOT NULL,
                subscription_end TEXT NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| anyhow::anyhow!("Миграция БД: {}", e))?;

        // Базы предыдущей версии бота: users(username), payments(tw_username), без language.
        self.rename_column_if_exists("users", "username", "handle")
            .await?;
        self.rename_column_if_exists("payments", "tw_username", "external_username")
            .await?;
        self.ensure_column_exists("users", "language", "TEXT DEFAULT 'en'")
            .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_payments_user ON payments(user_id);
            CREATE INDEX IF NOT EXISTS idx_payments_external ON payments(external_username);
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| anyhow::anyhow!("Создание индексов: {}", e))?;

        Ok(())
    }

    async fn column_exists(&self, table: &str, column: &str) -> Result<bool, anyhow::Error> {
        let count = sqlx::query_scalar::<_, i64>(&format!(
            "SELECT COUNT(*) FROM pragma_table_info('{}') WHERE name = '{}'",
            table, column
        ))
        .fetch_one(&self.pool)
        .await?;
        Ok(count > 0)
    }

    async fn ensure_column_exists(
        &self,
        table: &str,
        column: &str,
        sql_type: &str,
    ) -> Result<(), anyhow::Error> {
        if !self.column_exists(table, column).await? {
            tracing::info!(table, column, "Adding missing column");
            sqlx::query(&format!(
                "ALTER TABLE {} ADD COLUMN {} {}",
                table, column, sql_type
            ))
            .execute(&self.pool)
            .await?;
        }
        Ok(())
    }

    async fn rename_column_if_exists(
        &self,
        table: &str,
        from: &str,
        to: &str,
    ) -> Result<(), anyhow::Error> {
        if self.column_exists(table, from).await? && !self.column_exists(table, to).await? {
            tracing::info!(table, from, to, "Renaming legacy column");
            sqlx::query(&format!(
                "ALTER TABLE {} RENAME COLUMN {} TO {}",
                table, from, to
            ))
            .execute(&self.pool)
            .await?;
        }
        Ok(())
    }

    /// Создаёт пользователя с языком по умолчанию или обновляет только handle.
    pub async fn upsert_user(
        &self,
        user_id: i64,
        handle: Option<&str>,
    ) -> Result<(), anyhow::Error> {
        sqlx::query(
            "INSERT INTO users (user_id, handle, language) VALUES (?, ?, ?)
             ON CONFLICT(user_id) DO UPDATE SET handle = excluded.handle",
        )
        .bind(user_id)
        .bind(handle)
        .bind(DEFAULT_LANGUAGE)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn set_language(&self, user_id: i64, language: &str) -> Result<(), anyhow::Error> {
        sqlx::query(
            "INSERT INTO users (user_id, language) VALUES (?, ?)
             ON CONFLICT(user_id) DO UPDATE SET language = excluded.language",
        )
        .bind(user_id)
        .bind(language)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_language(&self, user_id: i64) -> Result<Option<String>, anyhow::Error> {
        let language = sqlx::query_scalar::<_, Option<String>>(
            "SELECT language FROM users WHERE user_id = ?",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(language.flatten())
    }

    pub async fn load_languages(&self) -> Result<Vec<(i64, String)>, anyhow::Error> {
        let rows = sqlx::query_as::<_, (i64, String)>(
            "SELECT user_id, language FROM users WHERE language IS NOT NULL",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    #[cfg(test)]
    pub(crate) async fn get_user(&self, user_id: i64) -> Result<Option<UserRecord>, anyhow::Error> {
        let user = sqlx::query_as::<_, UserRecord>(
            "SELECT user_id, handle, language FROM users WHERE user_id = ?",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    /// Сохраняет пользователя и платёж одной транзакцией.
    /// `language` записывается только для нового пользователя: выбранный язык меняет лишь `set_language`.
    /// Нарушение уникальности tx_hash возвращается как `DuplicateHash`.
    pub async fn record_payment(
        &self,
        user_id: i64,
        handle: Option<&str>,
        language: &str,
        payment: &NewPayment,
    ) -> Result<Payment, InsertPaymentError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO users (user_id, handle, language) VALUES (?, ?, ?)
             ON CONFLICT(user_id) DO UPDATE SET handle = excluded.handle",
        )
        .bind(user_id)
        .bind(handle)
        .bind(language)
        .execute(&mut *tx)
        .await?;

        let inserted = sqlx::query(
            "INSERT INTO payments
             (user_id, external_username, tx_hash, amount, purchase_date, subscription_end)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(user_id)
        .bind(&payment.external_username)
        .bind(&payment.tx_hash)
        .bind(payment.amount)
        .bind(&payment.purchase_date)
        .bind(&payment.subscription_end)
        .execute(&mut *tx)
        .await;

        let id = match inserted {
            Ok(result) => result.last_insert_rowid(),
            Err(sqlx::Error::Database(err)) if err.is_unique_violation() => {
                return Err(InsertPaymentError::DuplicateHash);
            }
            Err(err) => return Err(err.into()),
        };

        tx.commit().await?;

        Ok(Payment {
            id,
            user_id,
            external_username: payment.external_username.clone(),
            tx_hash: payment.tx_hash.clone(),
            amount: payment.amount,
            purchase_date: payment.purchase_date.clone(),
            subscription_end: payment.subscription_end.clone(),
        })
    }

    #[cfg(test)]
    pub(crate) async fn payments_for_user(&self, user_id: i64) -> Result<Vec<Payment>, anyhow::Error> {
        let rows = sqlx::query_as::<_, Payment>(
            "SELECT id, user_id, external_username, tx_hash, amount, purchase_date, subscription_end
             FROM payments
             WHERE user_id = ?
             ORDER BY purchase_date DESC, id DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Все пары (user_id, external_username), когда-либо оплатившие, с текущей датой окончания.
    pub async fn current_subscriptions(&self) -> Result<Vec<SubscriptionRow>, anyhow::Error> {
        let rows = sqlx::query_as::<_, SubscriptionRow>(&format!(
            "{CURRENT_SUBSCRIPTIONS_SQL}
             GROUP BY p.user_id, p.external_username
             ORDER BY p.user_id, p.external_username"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn subscriptions_for_user(
        &self,
        user_id: i64,
    ) -> Result<Vec<SubscriptionRow>, anyhow::Error> {
        let rows = sqlx::query_as::<_, SubscriptionRow>(&format!(
            "{CURRENT_SUBSCRIPTIONS_SQL}
             WHERE p.user_id = ?
             GROUP BY p.user_id, p.external_username
             ORDER BY subscription_end DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    #[cfg(test)]
    pub(crate) async fn delete_user(&self, user_id: i64) -> Result<(), anyhow::Error> {
        sqlx::query("DELETE FROM users WHERE user_id = ?")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payment(external: &str, hash: &str, purchase: &str, end: &str) -> NewPayment {
        NewPayment {
            external_username: external.to_string(),
            tx_hash: hash.to_string(),
            amount: 58.0,
            purchase_date: purchase.to_string(),
            subscription_end: end.to_string(),
        }
    }

    #[tokio::test]
    async fn migrates_store_of_previous_bot_version() {
        let opts = SqliteConnectOptions::from_str("sqlite::memory:").unwrap();
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(opts)
            .await
            .unwrap();
        sqlx::query(
            r#"
            CREATE TABLE users (user_id INTEGER PRIMARY KEY, username TEXT);
            CREATE TABLE payments (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER,
                tw_username TEXT,
                tx_hash TEXT UNIQUE,
                amount REAL DEFAULT 35.0,
                purchase_date TEXT,
                subscription_end TEXT,
                FOREIGN KEY(user_id) REFERENCES users(user_id)
            );
            CREATE INDEX idx_payments_tw ON payments(tw_username);
            INSERT INTO users (user_id, username) VALUES (9, 'legacy');
            INSERT INTO payments (user_id, tw_username, tx_hash, purchase_date, subscription_end)
                VALUES (9, 'old_acc', '0xOLD', '2024-01-01', '2024-01-31');
            "#,
        )
        .execute(&pool)
        .await
        .unwrap();

        let db = Db { pool };
        db.migrate().await.unwrap();
        // Повторный запуск миграции ничего не ломает.
        db.migrate().await.unwrap();

        let user = db.get_user(9).await.unwrap().unwrap();
        assert_eq!(user.handle.as_deref(), Some("legacy"));
        assert_eq!(user.language.as_deref(), Some("en"));

        let rows = db.current_subscriptions().await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].external_username, "old_acc");
        assert_eq!(rows[0].subscription_end, "2024-01-31");

        let err = db
            .record_payment(9, None, "en", &payment("new_acc", "0xOLD", "2024-02-01", "2024-03-02"))
            .await
            .unwrap_err();
        assert!(matches!(err, InsertPaymentError::DuplicateHash));
    }

    #[tokio::test]
    async fn upsert_keeps_chosen_language() {
        let db = Db::open_in_memory().await.unwrap();
        db.upsert_user(7, Some("old")).await.unwrap();
        db.set_language(7, "ru").await.unwrap();
        db.upsert_user(7, Some("new")).await.unwrap();

        let user = db.get_user(7).await.unwrap().unwrap();
        assert_eq!(user.handle.as_deref(), Some("new"));
        assert_eq!(user.language.as_deref(), Some("ru"));
    }

    #[tokio::test]
    async fn payment_does_not_overwrite_chosen_language() {
        let db = Db::open_in_memory().await.unwrap();
        db.set_language(4, "es").await.unwrap();
        db.record_payment(4, Some("four"), "en", &payment("acc", "z1", "2024-01-01", "2024-01-31"))
            .await
            .unwrap();

        let user = db.get_user(4).await.unwrap().unwrap();
        assert_eq!(user.language.as_deref(), Some("es"));
        assert_eq!(user.handle.as_deref(), Some("four"));

        db.record_payment(5, None, "ru", &payment("acc", "z2", "2024-01-01", "2024-01-31"))
            .await
            .unwrap();
        assert_eq!(db.get_language(5).await.unwrap().as_deref(), Some("ru"));
    }

    #[tokio::test]
    async fn duplicate_hash_is_reported_distinctly() {
        let db = Db::open_in_memory().await.unwrap();
        let first = payment("alpha", "0xDEAD", "2024-01-01", "2024-01-31");
        db.record_payment(1, Some("one"), "en", &first).await.unwrap();

        // Тот же хэш от того же и от другого пользователя.
        for user_id in [1, 2] {
            let again = payment("beta", "0xDEAD", "2024-02-01", "2024-03-02");
            let err = db
                .record_payment(user_id, None, "en", &again)
                .await
                .unwrap_err();
            assert!(matches!(err, InsertPaymentError::DuplicateHash));
        }

        assert_eq!(db.payments_for_user(1).await.unwrap().len(), 1);
        assert!(db.payments_for_user(2).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn current_end_is_max_over_pair_history() {
        let db = Db::open_in_memory().await.unwrap();
        // Год, месяц, квартал: порядок вставки не совпадает с порядком дат окончания.
        db.record_payment(1, None, "en", &payment("trader", "h1", "2024-01-01", "2024-12-31"))
            .await
            .unwrap();
        db.record_payment(1, None, "en", &payment("trader", "h2", "2024-03-01", "2024-03-31"))
            .await
            .unwrap();
        db.record_payment(1, None, "en", &payment("trader", "h3", "2024-02-01", "2024-05-01"))
            .await
            .unwrap();
        db.record_payment(1, None, "en", &payment("other", "h4", "2024-02-01", "2024-03-02"))
            .await
            .unwrap();

        let rows = db.current_subscriptions().await.unwrap();
        assert_eq!(rows.len(), 2);
        let trader = rows
            .iter()
            .find(|row| row.external_username == "trader")
            .unwrap();
        assert_eq!(trader.subscription_end, "2024-12-31");

        let own = db.subscriptions_for_user(1).await.unwrap();
        assert_eq!(own[0].external_username, "trader");
        assert_eq!(own[0].subscription_end, "2024-12-31");
        assert_eq!(own[1].subscription_end, "2024-03-02");
    }

    #[tokio::test]
    async fn pairs_are_per_user() {
        let db = Db::open_in_memory().await.unwrap();
        db.record_payment(1, Some("a"), "ru", &payment("shared", "x1", "2024-01-01", "2024-01-31"))
            .await
            .unwrap();
        db.record_payment(2, Some("b"), "es", &payment("shared", "x2", "2024-01-05", "2024-02-04"))
            .await
            .unwrap();

        let rows = db.current_subscriptions().await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].language.as_deref(), Some("ru"));
        assert_eq!(rows[1].handle.as_deref(), Some("b"));
    }

    #[tokio::test]
    async fn deleting_user_cascades_to_payments() {
        let db = Db::open_in_memory().await.unwrap();
        db.record_payment(3, None, "en", &payment("acc", "y1", "2024-01-01", "2024-01-31"))
            .await
            .unwrap();
        db.delete_user(3).await.unwrap();
        assert!(db.payments_for_user(3).await.unwrap().is_empty());
        assert!(db.current_subscriptions().await.unwrap().is_empty());
    }
}
