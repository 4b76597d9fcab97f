//! Voice relay - streams LLM replies to a telephony voice-relay channel
//!
//! Answers calls with `ConversationRelay` markup, then turns each caller
//! utterance into a streamed completion spoken back sentence by sentence.

mod api;
mod config;
mod conversation;
mod llm;
mod relay;
mod segmenter;
mod system_prompt;

use api::{create_router, AppState};
use config::RelayConfig;
use llm::{LlmService, LoggingService, OpenAIService};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // A missing .env file is fine
    let _ = dotenvy::dotenv();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "voice_relay=info,tower_http=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(true)
                .with_span_list(false),
        )
        .init();

    // Configuration
    let config = RelayConfig::from_env()?;
    tracing::info!(
        model = %config.llm.model,
        base_url = %config.llm.base_url,
        public_domain = ?config.voice.public_domain,
        interrupt_policy = ?config.session.interrupt_policy,
        duplicate_setup_policy = ?config.session.duplicate_setup_policy,
        partial_reply_policy = ?config.session.partial_reply_policy,
        "Configuration loaded"
    );
    if config.voice.public_domain.is_none() {
        tracing::warn!("PUBLIC_DOMAIN/NGROK_URL not set; relay URL will follow the Host header");
    }

    // Initialize LLM
    let openai: Arc<dyn LlmService> = Arc::new(OpenAIService::new(config.llm.clone())?);
    let llm: Arc<dyn LlmService> = Arc::new(LoggingService::new(openai));

    // Create application state
    let state = AppState::new(&config, llm);

    // Create router
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = create_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    if let Some(domain) = &config.voice.public_domain {
        tracing::info!(%addr, relay = %format!("wss://{domain}/ws"), "Voice relay listening");
    } else {
        tracing::info!(%addr, "Voice relay listening");
    }

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("Received SIGINT - shutting down"),
        () = terminate => tracing::info!("Received SIGTERM - shutting down"),
    }
}
