use std::sync::Arc;

use anyhow::Context;
use pairchat::{
    app,
    auth::{AuthEvent, Clients, FirebaseAuth},
    config::Config,
    objects::FsObjectStore,
    search::{AlgoliaSearch, Search, SqliteSearch},
    store::SqliteStore,
    AppState,
};
use tokio::sync::broadcast;
use tower_sessions::{cookie::SameSite, Expiry, MemoryStore, SessionManagerLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "pairchat=info,tower_http=info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env().context("loading configuration")?;

    let session_store = MemoryStore::default();
    let session_layer = SessionManagerLayer::new(session_store)
        .with_secure(false)
        .with_same_site(SameSite::Lax)
        .with_expiry(Expiry::OnInactivity(time::Duration::minutes(config.session_minutes)));

    let store = SqliteStore::connect(&config.database_url)
        .await
        .with_context(|| format!("opening {}", config.database_url))?;

    let http = reqwest::Client::builder()
        .timeout(config.remote_timeout)
        .build()?;

    let search: Search = match &config.algolia {
        Some(algolia) => {
            info!("searching users through index {}", algolia.index);
            Arc::new(AlgoliaSearch::new(http.clone(), algolia.clone()))
        }
        None => Arc::new(SqliteSearch::new(store.pool().clone())),
    };

    let clients = Clients::load(config.oauth_clients.as_deref(), &config.public_url).await?;

    let (auth_events, mut events) = broadcast::channel(64);
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(AuthEvent::SignedIn { uid }) => info!("u/{uid} signed in"),
                Ok(AuthEvent::SignedOut { uid: Some(uid) }) => info!("u/{uid} signed out"),
                Ok(AuthEvent::SignedOut { uid: None }) => info!("anonymous session ended"),
                Err(broadcast::error::RecvError::Lagged(n)) => warn!("missed {n} auth events"),
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    let app_state = AppState {
        auth: Arc::new(FirebaseAuth::new(http, &config.firebase)),
        objects: Arc::new(FsObjectStore::new(&config.objects_dir, &config.public_url)),
        store: Arc::new(store),
        search,
        clients,
        auth_events,
        config: Arc::new(config.clone()),
    };

    let app = app(app_state).layer(session_layer);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("binding {}", config.bind_addr))?;
    info!("listening on {}", config.bind_addr);
    axum::serve(listener, app).await?;

    Ok(())
}
