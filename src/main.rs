use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use healthlink::config::AppConfig;
use healthlink::db;
use healthlink::handlers;
use healthlink::handlers::webhook::STATUS_CALLBACK_PATH;
use healthlink::services::messaging::appwrite::AppwriteMessagingProvider;
use healthlink::services::messaging::log::LogSmsProvider;
use healthlink::services::messaging::twilio::TwilioSmsProvider;
use healthlink::services::messaging::MessagingProvider;
use healthlink::services::notifications::{notification_channel, NotificationWorker, RetryPolicy};
use healthlink::state::AppState;
use healthlink::store::appwrite::AppwriteStore;
use healthlink::store::sqlite::SqliteStore;
use healthlink::store::{DocumentStore, FileStorage};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AppConfig::from_env();

    let (store, files): (Arc<dyn DocumentStore>, Arc<dyn FileStorage>) =
        match config.store_backend.as_str() {
            "appwrite" => {
                anyhow::ensure!(
                    !config.appwrite_endpoint.is_empty() && !config.appwrite_api_key.is_empty(),
                    "APPWRITE_ENDPOINT and APPWRITE_API_KEY must be set when STORE_BACKEND=appwrite"
                );
                tracing::info!("using Appwrite document store ({})", config.appwrite_endpoint);
                let appwrite = Arc::new(AppwriteStore::new(
                    config.appwrite_endpoint.clone(),
                    config.appwrite_project_id.clone(),
                    config.appwrite_api_key.clone(),
                    config.appwrite_database_id.clone(),
                ));
                (appwrite.clone() as Arc<dyn DocumentStore>, appwrite as Arc<dyn FileStorage>)
            }
            _ => {
                tracing::info!("using SQLite document store ({})", config.database_url);
                let sqlite = Arc::new(SqliteStore::new(db::init_db(&config.database_url)?));
                (sqlite.clone() as Arc<dyn DocumentStore>, sqlite as Arc<dyn FileStorage>)
            }
        };

    let messaging: Arc<dyn MessagingProvider> = match config.sms_provider.as_str() {
        "appwrite" => {
            tracing::info!("using Appwrite messaging");
            Arc::new(AppwriteMessagingProvider::new(
                config.appwrite_endpoint.clone(),
                config.appwrite_project_id.clone(),
                config.appwrite_api_key.clone(),
            ))
        }
        "twilio" => {
            anyhow::ensure!(
                !config.twilio_account_sid.is_empty() && !config.twilio_phone_number.is_empty(),
                "TWILIO_ACCOUNT_SID and TWILIO_PHONE_NUMBER must be set when SMS_PROVIDER=twilio"
            );
            tracing::info!("using Twilio messaging (from: {})", config.twilio_phone_number);
            let provider = TwilioSmsProvider::new(
                config.twilio_account_sid.clone(),
                config.twilio_auth_token.clone(),
                config.twilio_phone_number.clone(),
                store.clone(),
                config.collections.users.clone(),
            );
            if config.public_url.is_empty() {
                Arc::new(provider)
            } else {
                let callback = format!(
                    "{}{STATUS_CALLBACK_PATH}",
                    config.public_url.trim_end_matches('/')
                );
                Arc::new(provider.with_status_callback(callback))
            }
        }
        _ => {
            tracing::info!("SMS_PROVIDER=log, messages will only be logged");
            Arc::new(LogSmsProvider)
        }
    };

    let (events_tx, _) = broadcast::channel(256);
    let (notifications, rx) = notification_channel(config.sms_queue_capacity);

    let worker = NotificationWorker::new(
        rx,
        store.clone(),
        messaging.clone(),
        events_tx.clone(),
        config.collections.notifications.clone(),
        RetryPolicy {
            max_attempts: config.sms_max_attempts,
            base_delay: Duration::from_millis(500),
        },
    );
    tokio::spawn(worker.run());

    let state = Arc::new(AppState {
        config: config.clone(),
        store,
        files,
        messaging,
        notifications,
        events_tx,
    });

    let app = handlers::router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
