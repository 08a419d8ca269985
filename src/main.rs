use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use shopbook::config::AppConfig;
use shopbook::handlers;
use shopbook::services::calendar::{CalendarProvider, GoogleCalendarProvider};
use shopbook::services::clock::SystemClock;
use shopbook::services::google_auth::{self, ServiceAccountTokens, TokenSource};
use shopbook::services::lock::InMemorySlotLock;
use shopbook::services::mailer::{HttpMailer, Mailer};
use shopbook::state::{AppState, Upstreams};
use shopbook::store::{GoogleSheetsStore, SheetStore, SqliteSheetStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AppConfig::from_env();
    let timeout = Duration::from_secs(config.upstream_timeout_secs);

    let tokens: Option<Arc<dyn TokenSource>> = match google_auth::service_account_key(&config).await? {
        Some(key) => {
            tracing::info!("using Google service account {}", key.client_email);
            let tokens: Arc<dyn TokenSource> = Arc::new(ServiceAccountTokens::new(key).await?);
            Some(tokens)
        }
        None => None,
    };

    let store: Arc<dyn SheetStore> = if config.uses_google_sheets() {
        let tokens = tokens.clone().context(
            "SPREADSHEET_ID is set but no Google service account is configured \
             (GOOGLE_CREDENTIALS, GOOGLE_SERVICE_ACCOUNT_KEY, or GOOGLE_CLIENT_EMAIL + GOOGLE_PRIVATE_KEY)",
        )?;
        tracing::info!("using Google Sheets slot store (spreadsheet: {})", config.spreadsheet_id);
        Arc::new(GoogleSheetsStore::new(&config.spreadsheet_id, tokens, timeout)?)
    } else {
        tracing::info!("using SQLite slot store (path: {})", config.database_url);
        Arc::new(
            SqliteSheetStore::open(&config.database_url)
                .with_context(|| format!("failed to open {}", config.database_url))?,
        )
    };

    let calendar: Option<Arc<dyn CalendarProvider>> = match (&tokens, config.calendar_id.is_empty()) {
        (Some(tokens), false) => Some(Arc::new(GoogleCalendarProvider::new(
            &config.calendar_id,
            tokens.clone(),
            timeout,
        )?)),
        _ => {
            tracing::info!("calendar insertion disabled");
            None
        }
    };

    let mailer: Option<Arc<dyn Mailer>> = if config.email_api_url.is_empty() {
        tracing::info!("email notifications disabled");
        None
    } else {
        Some(Arc::new(HttpMailer::new(
            config.email_api_url.clone(),
            config.email_api_key.clone(),
            config.email_from.clone(),
            timeout,
        )?))
    };

    let addr = format!("0.0.0.0:{}", config.port);
    let state = AppState::build(
        config,
        Upstreams {
            store,
            clock: Arc::new(SystemClock),
            lock: Arc::new(InMemorySlotLock::new()),
            calendar,
            mailer,
        },
    )
    .context("invalid shop configuration")?;

    let app = handlers::router(Arc::new(state));

    tracing::info!("starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
