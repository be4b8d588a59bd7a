use rgen_studio::{logger, Config, RelayService};

#[actix_web::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let env_loaded = dotenv::dotenv().is_ok();

    let config = Config::from_env();
    logger::init_with_config(logger::LoggerConfig::for_debug(config.debug))?;

    if env_loaded {
        log::info!("✅ .env file loaded successfully");
    } else {
        log::warn!("⚠️  No .env file found, using system environment variables");
    }

    logger::log_startup_info(
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        &config.host,
        config.port,
    );
    logger::log_config_info(&config);

    if let Err(e) = config.validate() {
        log::error!("❌ Invalid configuration: {}", e);
        return Err(e.into());
    }

    let relay = match RelayService::from_config(&config.upstream) {
        Ok(relay) => {
            log::info!("✅ Relay initialized with {} backend", relay.backend_name());
            relay
        }
        Err(e) => {
            log::error!("❌ Failed to initialize relay: {}", e);
            return Err(e.into());
        }
    };

    rgen_studio::server::run(&config, relay).await?;
    Ok(())
}
