use std::sync::Arc;

use axum::http::Method;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use family_ledger_backend::config::AppConfig;
use family_ledger_backend::domain::{
    AuthService, FamilyService, InMemoryOtpStore, LedgerService, LogDelivery, PhoneRegistry,
    RecurrenceScheduler, SharedClock, SystemClock, TaskService,
};
use family_ledger_backend::rest::{self, AppState};
use family_ledger_backend::storage::{FamilyStorage, MemoryFamilyStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let config = AppConfig::from_env();
    info!(?config, "starting family ledger backend");

    let store: Arc<dyn FamilyStorage> = Arc::new(MemoryFamilyStore::new());
    let clock: SharedClock = Arc::new(SystemClock);
    let registry = PhoneRegistry::new(store.clone(), config.default_country_code.clone());
    let families = FamilyService::new(store.clone(), registry.clone(), clock.clone());
    let ledger = LedgerService::new(store.clone(), families.clone(), clock.clone());
    let tasks = TaskService::new(store.clone(), families.clone(), ledger.clone(), clock.clone());
    let auth = AuthService::new(
        registry,
        families.clone(),
        Arc::new(InMemoryOtpStore::new()),
        Arc::new(LogDelivery),
        clock.clone(),
    );

    let scheduler = Arc::new(RecurrenceScheduler::new(
        store,
        ledger.clone(),
        clock,
        config.reference_timezone(),
    ));
    let interval = config.scheduler_interval;
    tokio::spawn({
        let scheduler = scheduler.clone();
        async move { scheduler.run(interval).await }
    });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers(Any);

    let app = rest::router(AppState::new(auth, families, ledger, tasks)).layer(cors);

    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    info!("listening on {}", config.listen_addr);
    axum::serve(listener, app).await?;

    Ok(())
}
