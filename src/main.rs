use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use essay_bot::channels::{ChunkedDispatcher, WhatsAppChannel};
use essay_bot::config::BotConfig;
use essay_bot::draft::DraftGenerator;
use essay_bot::llm::create_provider;
use essay_bot::session::{ConversationMachine, SessionRouteState};
use essay_bot::store::LibSqlBackend;
use essay_bot::webhook::{WebhookState, app_router};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Install rustls crypto provider before any TLS usage
    let _ = rustls::crypto::ring::default_provider().install_default();

    let config = BotConfig::from_env().context("Failed to load configuration")?;

    // Keep the guard alive so buffered file logs are flushed on exit
    let _log_guard = init_tracing(config.log_dir.as_deref());

    eprintln!("📝 Essay Bot v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Model: {}", config.llm.model);
    eprintln!("   Locale: {}", config.locale);
    eprintln!("   Webhook: http://0.0.0.0:{}/webhook", config.port);
    eprintln!("   Sessions API: http://0.0.0.0:{}/api/sessions/{{sender_id}}", config.port);

    // ── LLM ─────────────────────────────────────────────────────────────
    let llm = create_provider(&config.llm).context("Failed to create LLM provider")?;

    // ── Database ────────────────────────────────────────────────────────
    let db = Arc::new(
        LibSqlBackend::new_local(&config.db_path)
            .await
            .with_context(|| format!("Failed to open database at {}", config.db_path.display()))?
            .with_default_word_limit(config.word_limit),
    );
    eprintln!("   Database: {}", config.db_path.display());

    // ── WhatsApp ────────────────────────────────────────────────────────
    let whatsapp = Arc::new(WhatsAppChannel::new(
        config.whatsapp.access_token.clone(),
        config.whatsapp.phone_number_id.clone(),
        config.whatsapp.api_version.clone(),
    ));
    if let Err(e) = whatsapp.health_check().await {
        tracing::warn!(error = %e, "WhatsApp health check failed; continuing");
    }

    // ── Conversation ────────────────────────────────────────────────────
    let generator = Arc::new(DraftGenerator::new(llm, config.max_tokens));
    let dispatcher = ChunkedDispatcher::new(whatsapp.clone(), config.max_chunk);
    let machine = Arc::new(
        ConversationMachine::new(db.clone(), generator, dispatcher, config.machine_settings())
            .with_message_log(db.clone()),
    );

    // ── HTTP ────────────────────────────────────────────────────────────
    let app = app_router(
        WebhookState {
            machine,
            verify_token: config.verify_token.clone(),
            phone_number_id: Some(config.whatsapp.phone_number_id.clone()),
        },
        SessionRouteState {
            sessions: db.clone(),
            log: db,
        },
    );

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port))
        .await
        .with_context(|| format!("Failed to bind port {}", config.port))?;
    tracing::info!(port = config.port, "Essay bot listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    tracing::info!("Essay bot stopped");
    Ok(())
}

/// Stderr logging, plus daily-rolling files when `log_dir` is set.
fn init_tracing(log_dir: Option<&Path>) -> Option<WorkerGuard> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "essay-bot.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .with(file_layer)
        .init();

    guard
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
