//! Main Entrypoint for the Vaani API Service
//!
//! This binary is responsible for:
//! 1. Loading configuration from the environment.
//! 2. Initializing the database connection pool and running migrations.
//! 3. Initializing shared services (registration, speech, Gemini Live settings).
//! 4. Constructing the Axum router and applying middleware.
//! 5. Starting the web server and handling graceful shutdown.

use anyhow::Context;
use gemini_live::LiveSettings;
use sqlx::PgPool;
use std::{fs, net::SocketAddr, path::Path, sync::Arc};
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};
use vaani_api::{config::Config, db::Db, router::create_router, state::AppState, ws::SessionRegistry};
use vaani_core::{
    registration::RegistrationService,
    sms::TwilioWhatsApp,
    speech::{AzureSpeech, SpeechSynthesizer},
};

/// Listens for the `Ctrl+C` signal to gracefully shut down the server.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
    info!("Received shutdown signal. Shutting down gracefully...");
}

/// Reads the persona every Gemini session is set up with.
fn load_system_instruction(prompts_path: &Path) -> anyhow::Result<String> {
    let path = prompts_path.join("system_instruction.md");
    let content = fs::read_to_string(&path)
        .with_context(|| format!("Could not read {}", path.display()))?;
    Ok(content.trim().to_string())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // --- 1. Load Configuration ---
    let config = Config::from_env().context("Failed to load configuration")?;

    // --- 2. Initialize Logging ---
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
        .init();
    info!("Configuration loaded. Initializing application state...");

    // --- 3. Initialize Database ---
    let pool = PgPool::connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;
    let db = Arc::new(Db::new(pool));
    db.run_migrations().await?;
    info!("Database connection established and migrations are up-to-date.");

    // --- 4. Initialize Shared Services ---
    let system_instruction = load_system_instruction(&config.prompts_path)?;
    let live = Arc::new(
        LiveSettings::new(config.gemini_api_key.clone(), system_instruction)
            .with_endpoint(config.gemini_endpoint.clone())
            .with_model(config.gemini_model.clone())
            .with_handshake_timeout(config.handshake_timeout),
    );

    let whatsapp = TwilioWhatsApp::new(
        config.twilio_account_sid.clone(),
        config.twilio_auth_token.clone(),
        config.twilio_from.clone(),
    )
    .with_content_sid(config.twilio_content_sid.clone());
    let registration = Arc::new(RegistrationService::new(db, Arc::new(whatsapp)));

    fs::create_dir_all(&config.tts_output_dir).with_context(|| {
        format!(
            "Failed to create TTS output directory {}",
            config.tts_output_dir.display()
        )
    })?;
    let speech: Arc<dyn SpeechSynthesizer> = Arc::new(AzureSpeech::new(
        config.azure_speech_key.clone(),
        &config.azure_speech_region,
        config.tts_output_dir.clone(),
    ));

    let app_state = Arc::new(AppState {
        registration,
        speech,
        live,
        sessions: SessionRegistry::new(),
        idle_timeout: config.idle_timeout,
    });

    // --- 5. Create Router and Apply Middleware ---
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = create_router(app_state).layer(cors);

    // --- 6. Start Server ---
    info!(
        model = %config.gemini_model,
        bind_address = %config.bind_address,
        idle_timeout = ?config.idle_timeout,
        "Service configured. Starting server..."
    );
    let listener = tokio::net::TcpListener::bind(config.bind_address).await?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Server has shut down.");
    Ok(())
}
