use nanoedit::config::Config;
use nanoedit::gemini::EditClient;
use nanoedit::logger::{self, LoggerConfig};
use nanoedit::session::MemorySessionStore;
use nanoedit::telegram::{TelegramClient, UpdateHandler};
use nanoedit::{server, RelayError};
use std::sync::Arc;
use std::time::Duration;

#[actix_web::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let env_loaded = dotenv::dotenv().is_ok();

    logger::init_with_config(LoggerConfig::development())?;

    if env_loaded {
        log::info!("✅ .env file loaded successfully");
    } else {
        log::warn!("⚠️  No .env file found, using system environment variables");
    }

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e @ RelayError::ConfigError(_)) => {
            log::error!("❌ {}", e);
            return Err(e.into());
        }
        Err(e) => return Err(e.into()),
    };

    logger::log_startup_info("nanoedit", env!("CARGO_PKG_VERSION"), config.port);
    log::info!("🖼️  Edit models on the ladder:");
    for model in EditClient::supported_models() {
        log::info!("   {}", model);
    }

    let telegram = Arc::new(TelegramClient::new(&config.telegram));
    if let Err(e) = telegram.set_my_commands().await {
        log::warn!("⚠️  Failed to register bot commands: {}", e);
    }

    let editor = Arc::new(EditClient::new(&config.gemini)?);
    let sessions = Arc::new(MemorySessionStore::new(Duration::from_secs(
        config.session_ttl_secs,
    )));
    let handler = Arc::new(UpdateHandler::new(telegram, editor, sessions));

    server::run(handler, config.port).await?;
    Ok(())
}
