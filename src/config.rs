//! Конфигурация бота: секреты из окружения, остальное из необязательного TOML.

use crate::plans::{Catalog, Plan};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("переменная окружения {0} не задана")]
    Missing(&'static str),
    #[error("ADMIN_IDS должна содержать числа через запятую, получено {0:?}")]
    InvalidAdminIds(String),
    #[error("не удалось прочитать {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("некорректный TOML в {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("каталог тарифов пуст или содержит некорректный тариф {0:?}")]
    InvalidPlans(String),
    #[error("[scheduler] {0} должен быть больше нуля")]
    InvalidScheduler(&'static str),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SchedulerSettings {
    pub interval_secs: u64,
    pub recovery_secs: u64,
    pub startup_delay_secs: u64,
    pub pause_millis: u64,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            interval_secs: 86_400,
            recovery_secs: 3_600,
            startup_delay_secs: 20,
            pause_millis: 100,
        }
    }
}

impl SchedulerSettings {
    /// Нулевой интервал превращает цикл проверки в непрерывную рассылку.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.interval_secs == 0 {
            return Err(ConfigError::InvalidScheduler("interval_secs"));
        }
        if self.recovery_secs == 0 {
            return Err(ConfigError::InvalidScheduler("recovery_secs"));
        }
        Ok(())
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn recovery(&self) -> Duration {
        Duration::from_secs(self.recovery_secs)
    }

    pub fn startup_delay(&self) -> Duration {
        Duration::from_secs(self.startup_delay_secs)
    }

    pub fn pause(&self) -> Duration {
        Duration::from_millis(self.pause_millis)
    }
}

/// Содержимое TOML-файла. Все поля необязательные.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub db_path: PathBuf,
    pub instruction_url: Option<String>,
    pub payment_photo: Option<PathBuf>,
    pub language_cache_capacity: usize,
    pub scheduler: SchedulerSettings,
    pub plans: Vec<Plan>,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("bot_database.db"),
            instruction_url: None,
            payment_photo: Some(PathBuf::from("media/1.jpg")),
            language_cache_capacity: 10_000,
            scheduler: SchedulerSettings::default(),
            plans: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bot_token: String,
    pub admin_ids: Vec<i64>,
    pub wallet: String,
    pub support_username: String,
    pub db_path: PathBuf,
    pub instruction_url: Option<String>,
    pub payment_photo: Option<PathBuf>,
    pub language_cache_capacity: usize,
    pub scheduler: SchedulerSettings,
    pub catalog: Catalog,
}

impl Config {
    /// Загружает `.env`, TOML по `path` (если файл есть) и обязательные переменные окружения.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        let file = if path.exists() {
            let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })?;
            toml::from_str::<FileConfig>(&raw).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?
        } else {
            tracing::info!(path = %path.display(), "Config file not found, using defaults");
            FileConfig::default()
        };
        Self::from_sources(file, |key| std::env::var(key).ok())
    }

    pub fn from_sources(
        file: FileConfig,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let required = |key: &'static str| {
            env(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
                .ok_or(ConfigError::Missing(key))
        };

        let bot_token = required("BOT_TOKEN")?;
        let admin_ids = parse_admin_ids(&required("ADMIN_IDS")?)?;
        let wallet = required("TRC20_WALLET")?;
        let support_username = required("ADMIN_USERNAME")?
            .trim_start_matches('@')
            .to_string();

        let catalog = if file.plans.is_empty() {
            Catalog::default()
        } else {
            if let Some(bad) = file.plans.iter().find(|plan| plan.days < 1 || plan.price < 0.0) {
                return Err(ConfigError::InvalidPlans(bad.id.clone()));
            }
            Catalog::new(file.plans)
        };

        file.scheduler.validate()?;

        let instruction_url = env("INSTRUCTION_URL")
            .filter(|value| !value.trim().is_empty())
            .or(file.instruction_url);

        Ok(Self {
            bot_token,
            admin_ids,
            wallet,
            support_username,
            db_path: file.db_path,
            instruction_url,
            payment_photo: file.payment_photo,
            language_cache_capacity: file.language_cache_capacity.max(1),
            scheduler: file.scheduler,
            catalog,
        })
    }

    pub fn is_admin(&self, user_id: i64) -> bool {
        self.admin_ids.contains(&user_id)
    }
}

pub fn parse_admin_ids(raw: &str) -> Result<Vec<i64>, ConfigError> {
    let ids = raw
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| part.parse::<i64>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|_| ConfigError::InvalidAdminIds(raw.to_string()))?;
    if ids.is_empty() {
        return Err(ConfigError::InvalidAdminIds(raw.to_string()));
    }
    Ok(ids)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    const FULL: &[(&str, &str)] = &[
        ("BOT_TOKEN", "123:abc"),
        ("ADMIN_IDS", "10, 20"),
        ("TRC20_WALLET", "TXyz"),
        ("ADMIN_USERNAME", "@support"),
    ];

    #[test]
    fn loads_required_values() {
        let config = Config::from_sources(FileConfig::default(), env_of(FULL)).unwrap();
        assert_eq!(config.admin_ids, vec![10, 20]);
        assert_eq!(config.support_username, "support");
        assert!(config.is_admin(20));
        assert!(!config.is_admin(30));
        assert_eq!(config.catalog.plans().len(), 3);
    }

    #[test]
    fn refuses_missing_wallet() {
        let env: Vec<_> = FULL
            .iter()
            .copied()
            .filter(|(k, _)| *k != "TRC20_WALLET")
            .collect();
        let err = Config::from_sources(FileConfig::default(), env_of(&env)).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("TRC20_WALLET")));
    }

    #[test]
    fn refuses_non_numeric_admin_ids() {
        assert!(matches!(
            parse_admin_ids("1,two,3"),
            Err(ConfigError::InvalidAdminIds(_))
        ));
        assert!(parse_admin_ids(" , ").is_err());
        assert_eq!(parse_admin_ids("5,").unwrap(), vec![5]);
    }

    #[test]
    fn reads_scheduler_and_plans_from_toml() {
        let file: FileConfig = toml::from_str(
            r#"
            db_path = "/var/lib/bot/db.sqlite"

            [scheduler]
            interval_secs = 600

            [[plans]]
            id = "1wk"
            price = 15.0
            days = 7
            name_en = "1 Week"
            name_ru = "1 Неделя"
            name_es = "1 Semana"
            "#,
        )
        .unwrap();
        let config = Config::from_sources(file, env_of(FULL)).unwrap();
        assert_eq!(config.scheduler.interval(), Duration::from_secs(600));
        assert_eq!(config.scheduler.recovery(), Duration::from_secs(3_600));
        assert_eq!(config.catalog.plans().len(), 1);
        assert_eq!(config.catalog.get("1wk").map(|p| p.days), Some(7));
    }

    #[test]
    fn refuses_zero_scheduler_intervals() {
        let file: FileConfig = toml::from_str("[scheduler]\ninterval_secs = 0\n").unwrap();
        let err = Config::from_sources(file, env_of(FULL)).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidScheduler("interval_secs")));

        let file: FileConfig = toml::from_str("[scheduler]\nrecovery_secs = 0\n").unwrap();
        let err = Config::from_sources(file, env_of(FULL)).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidScheduler("recovery_secs")));
    }
}
