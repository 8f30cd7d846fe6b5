pub mod api;
pub mod config;
pub mod error;
pub mod logic;
pub mod model;
pub mod seed;
pub mod store;

// Export API types
pub use api::handlers;
pub use api::routes;

// Export the request/response shaping entry points
pub use logic::{
    AnnotationSerializer, DocumentRepr, LabelWrite, ProjectRepr, ProjectSerializer,
};

pub use error::{ServiceError, ServiceResult, ValidationErrors};

// Export all model types
pub use model::*;

// Export store types
pub use store::{MemoryStore, PostgresStore, Store};

/// Boots the HTTP server on whichever store the configuration selects.
/// Logging and `.env` loading are left to the caller.
pub async fn run_server() -> anyhow::Result<()> {
    use axum::serve;
    use std::sync::Arc;
    use tokio::net::TcpListener;

    let config = crate::config::AppConfig::load()?;
    let load_seed = std::env::var("LOAD_SEED_DATA").unwrap_or_default() == "true";

    let app: axum::Router = match config.database_url() {
        Some(database_url) => {
            let postgres_store =
                PostgresStore::new(&database_url, config.max_connections()).await?;
            postgres_store.migrate().await?;
            let store = Arc::new(postgres_store);
            if load_seed {
                seed::load_seed_data(&*store).await?;
            }
            routes::create_router().with_state(store)
        }
        None => {
            log::warn!("No database configured, using the in-memory store");
            let store = Arc::new(MemoryStore::new());
            if load_seed {
                seed::load_seed_data(&*store).await?;
            }
            routes::create_router().with_state(store)
        }
    };

    let bind_address = config.server_address();
    let listener = TcpListener::bind(&bind_address).await?;
    log::info!("Listening on http://{}", bind_address);

    serve(listener, app).await?;

    Ok(())
}
