//! Обработчики команд, кнопок меню и callback-запросов.

#[path = "handlers/callbacks/mod.rs"]
mod callbacks;
#[path = "handlers/commands/mod.rs"]
mod commands;
#[path = "handlers/format.rs"]
mod format;
#[path = "handlers/menu.rs"]
mod menu;
#[path = "handlers/shared.rs"]
mod shared;
#[path = "handlers/state.rs"]
mod state;

pub use commands::BotCommand;
pub use state::BotState;

use crate::flow::ConversationState;
use teloxide::dispatching::DpHandlerDescription;
use teloxide::dispatching::dialogue::{self, InMemStorage};
use teloxide::dptree;
use teloxide::prelude::*;

pub fn schema() -> dptree::Handler<
    'static,
    Result<(), Box<dyn std::error::Error + Send + Sync + 'static>>,
    DpHandlerDescription,
> {
    let message_handler = Update::filter_message()
        .branch(commands::handler())
        .endpoint(menu::handle_text);

    dialogue::enter::<Update, InMemStorage<ConversationState>, ConversationState, _>()
        .branch(message_handler)
        .branch(callbacks::handler())
}
