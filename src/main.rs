//! indicator-subscription-bot — Telegram-бот для продажи подписок на индикатор TradingView.

mod bot;
mod config;
mod db;
mod flow;
mod i18n;
mod language;
mod notify;
mod payments;
mod plans;
mod scheduler;

use crate::flow::ConversationState;
use std::path::PathBuf;
use std::sync::Arc;
use teloxide::dispatching::Dispatcher;
use teloxide::dispatching::dialogue::InMemStorage;
use teloxide::prelude::*;
use teloxide::utils::command::BotCommands;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("/etc/indicator-subscription-bot.toml"));
    tracing::info!(
        "Starting indicator-subscription-bot with config {}",
        config_path.display()
    );

    let config = Arc::new(config::Config::load(&config_path)?);
    tracing::info!(
        admin_count = config.admin_ids.len(),
        db_path = %config.db_path.display(),
        plans = config.catalog.plans().len(),
        instruction_url = ?config.instruction_url,
        "Configuration loaded"
    );

    let db = Arc::new(db::Db::open(&config.db_path).await?);
    let languages = language::LanguageCache::new(db.clone(), config.language_cache_capacity);
    let warmed = languages.warm().await?;
    tracing::info!(users = warmed, "Language cache warmed");

    let bot = Bot::new(config.bot_token.clone());
    let outbox: Arc<dyn notify::Outbox> = Arc::new(notify::TelegramOutbox::new(bot.clone()));
    let admins = notify::AdminNotifier::new(outbox.clone(), &config.admin_ids);

    if let Err(error) = bot
        .set_my_commands(bot::handlers::BotCommand::bot_commands())
        .await
    {
        tracing::warn!(error = %error, "Не удалось зарегистрировать команды бота");
    }

    let scheduler = scheduler::Scheduler::new(
        db.clone(),
        outbox,
        admins.clone(),
        config.scheduler.clone(),
    );
    tokio::spawn(scheduler.run());

    let state = bot::handlers::BotState {
        config,
        db,
        languages,
        admins,
    };
    tracing::info!("Dispatcher initialized, bot is ready");

    Dispatcher::builder(bot, bot::handlers::schema())
        .dependencies(dptree::deps![state, InMemStorage::<ConversationState>::new()])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}
