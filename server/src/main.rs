mod auth;
mod config;
mod health;
mod routes;

use std::sync::Arc;
use std::time::Instant;

use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use sqlx::postgres::PgPoolOptions;

use auth::{AuthIdentity, HmacJwtIdentity};
use config::AppConfig;
use health::ServerStart;
use taskchain_chain::BlockStore;
use taskchain_cluster::ChainCluster;
use taskchain_socket::BundleCluster;
use taskchain_store::{PgBlockStore, RedisTokenStore, TokenStore};

/// Missing/invalid environment or a `.env` load failure.
const EXIT_CONFIG: i32 = -1;
/// Database pool connect, migration, or Redis connect failure.
const EXIT_SQL_INIT: i32 = -2;
/// Chain-cluster rebuild from storage, or HTTP server bind/run failure.
const EXIT_STATE_OR_SERVER: i32 = -3;

fn init_tracing(config: &AppConfig) {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(config.log_filter())),
        )
        .init();
}

#[actix_web::main]
async fn main() {
    let config = match AppConfig::load() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("failed to load configuration: {err}");
            std::process::exit(EXIT_CONFIG);
        }
    };
    init_tracing(&config);

    tracing::info!("initializing database...");
    let pool = match PgPoolOptions::new().max_connections(10).connect(&config.database_url()).await {
        Ok(pool) => pool,
        Err(err) => {
            tracing::error!(%err, "failed to connect to database");
            std::process::exit(EXIT_SQL_INIT);
        }
    };

    let store = Arc::new(PgBlockStore::new(pool));
    if let Err(err) = store.run_migrations().await {
        tracing::error!(%err, "failed to run migrations");
        std::process::exit(EXIT_SQL_INIT);
    }

    tracing::info!("connecting to redis...");
    let token_store: Arc<dyn TokenStore> = match RedisTokenStore::connect(&config.redis_url).await {
        Ok(store) => Arc::new(store),
        Err(err) => {
            tracing::error!(%err, "failed to connect to redis");
            std::process::exit(EXIT_SQL_INIT);
        }
    };

    let cluster = Arc::new(ChainCluster::new(store as Arc<dyn BlockStore>));
    tracing::info!("restoring chains from storage...");
    if let Err(err) = cluster.load_from_store().await {
        tracing::error!(%err, "failed to restore chains from storage");
        std::process::exit(EXIT_STATE_OR_SERVER);
    }

    let bundles = Arc::new(BundleCluster::new());
    let identity: Arc<dyn AuthIdentity> =
        Arc::new(HmacJwtIdentity::new(&config.jwt_access_secret, config.jwt_access_expire));
    let server_start = Arc::new(ServerStart(Instant::now()));

    let port = config.port;
    tracing::info!(port, state_scheme_version = config.state_scheme_version, "starting server");

    let server = HttpServer::new(move || {
        App::new()
            .wrap(Cors::permissive())
            .app_data(web::Data::new(cluster.clone()))
            .app_data(web::Data::new(bundles.clone()))
            .app_data(web::Data::new(identity.clone()))
            .app_data(web::Data::new(token_store.clone()))
            .app_data(web::Data::from(server_start.clone()))
            .route("/health", web::get().to(health::health))
            .route("/v1/websocket/connect", web::get().to(routes::websocket_connect))
    })
    .bind(("0.0.0.0", port));

    let server = match server {
        Ok(server) => server,
        Err(err) => {
            tracing::error!(%err, port, "failed to bind server");
            std::process::exit(EXIT_STATE_OR_SERVER);
        }
    };

    if let Err(err) = server.run().await {
        tracing::error!(%err, "server exited with error");
        std::process::exit(EXIT_STATE_OR_SERVER);
    }
}
