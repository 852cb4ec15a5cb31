mod config;
mod menu;
mod scheduler;
mod store;
mod telegram;

use std::sync::Arc;

use teloxide::prelude::*;
use tracing::{error, info, warn};
use tracing_subscriber::prelude::*;

use config::Config;
use store::GoalStore;
use telegram::TelegramClient;

const APOLOGY: &str = "Что-то пошло не так, попробуй ещё раз 🙏";

struct BotState {
    store: GoalStore,
    telegram: TelegramClient,
}

#[tokio::main]
async fn main() {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "astah.json".to_string());
    let config = match Config::load(&config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    };

    let bot = Bot::new(&config.telegram_bot_token);

    // Setup logging
    let log_dir = config.data_dir.join("logs");
    std::fs::create_dir_all(&log_dir).ok();
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_dir.join("astahbot.log"))
        .expect("Failed to open log file");
    let (non_blocking, _guard) = tracing_appender::non_blocking(log_file);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stdout)
                .with_filter(
                    tracing_subscriber::EnvFilter::from_default_env()
                        .add_directive(tracing::Level::INFO.into()),
                ),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_filter(
                    tracing_subscriber::EnvFilter::from_default_env()
                        .add_directive(tracing::Level::INFO.into()),
                ),
        )
        .init();

    info!("🚀 Starting astahbot...");
    info!("Loaded config from {config_path}");
    info!("Broadcast chat: {}", config.astah_chat_id);

    let store = match GoalStore::open(&config.data_dir.join("astah_bot.db")) {
        Ok(store) => store,
        Err(e) => {
            error!("Failed to open goal store: {e}");
            std::process::exit(1);
        }
    };

    let telegram = TelegramClient::new(bot.clone());

    tokio::spawn(scheduler::run(
        telegram.clone(),
        config.astah_chat_id,
        config.timezone,
    ));

    let state = Arc::new(BotState { store, telegram });

    let handler = dptree::entry().branch(Update::filter_message().endpoint(handle_message));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;
}

async fn handle_message(msg: Message, state: Arc<BotState>) -> ResponseResult<()> {
    let Some(ref user) = msg.from else {
        return Ok(());
    };
    let Some(text) = msg.text() else {
        return Ok(());
    };

    let user_id = user.id.0 as i64;
    let text_preview: String = text.chars().take(100).collect();
    info!("Message from {} ({}): \"{}\"", user.first_name, user_id, text_preview);

    // All store writes happen inside respond(), before the reply goes out.
    match menu::respond(&state.store, user_id, text) {
        Ok(reply) => {
            state
                .telegram
                .send_message(msg.chat.id, &reply.text, Some(reply.keyboard))
                .await
                .ok();
        }
        Err(e) => {
            warn!("Store error for user {}: {}", user_id, e);
            state.telegram.send_message(msg.chat.id, APOLOGY, None).await.ok();
        }
    }

    Ok(())
}
