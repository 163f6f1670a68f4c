use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use dotenv::dotenv;
use gateway::PaystackClient;
use ledger_core::{Ledger, PaymentGateway, PgLedgerStore, Reconciler};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;
use wallet_api::{
    auth::CredentialResolver,
    config::Config,
    handlers::{self, AppState},
};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load environment variables
    dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting Wallet API...");

    // Load configuration
    let config = Config::from_env().expect("Failed to load configuration");
    config.validate().expect("Invalid configuration");

    info!("Configuration loaded successfully");

    // Initialize ledger store
    let store = Arc::new(
        PgLedgerStore::connect(&config.database.url, config.database.max_connections)
            .await
            .expect("Failed to connect to database"),
    );
    store.init_schema().await.expect("Failed to initialize schema");

    info!("Database connected successfully");

    // Initialize Paystack gateway adapter
    let paystack: Arc<dyn PaymentGateway> = Arc::new(
        PaystackClient::new(
            config.paystack.base_url.clone(),
            config.paystack.secret_key.clone(),
            config.paystack.timeout_secs,
        )
        .expect("Failed to build Paystack client"),
    );

    info!("Paystack client initialized");

    // Initialize credential resolver
    let resolver = CredentialResolver::new(
        store.pool().clone(),
        config.auth.jwt_secret.clone(),
        config.auth.max_active_api_keys,
    );
    resolver
        .init_schema()
        .await
        .expect("Failed to initialize api key schema");

    // Assemble ledger and reconciler
    let state = web::Data::new(AppState {
        ledger: Ledger::new(store.clone(), paystack.clone()),
        reconciler: Reconciler::new(store, paystack),
        resolver,
    });

    info!("Ledger initialized successfully");

    // Start HTTP server
    let server_config = config.server.clone();

    info!(
        "Starting HTTP server on {}:{}",
        server_config.host, server_config.port
    );

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(
                Cors::default()
                    .allow_any_origin()
                    .allow_any_method()
                    .allow_any_header()
                    .max_age(3600),
            )
            .wrap(middleware::Logger::default())
            .wrap(middleware::NormalizePath::trim())
            .configure(handlers::configure_routes)
    })
    .workers(server_config.workers)
    .bind((server_config.host, server_config.port))?
    .run()
    .await
}
