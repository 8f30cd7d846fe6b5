use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::api::handlers;
use crate::store::traits::Store;

pub fn create_router<S: Store + 'static>() -> Router<Arc<S>> {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Projects
        .route(
            "/projects",
            get(handlers::list_projects::<S>).post(handlers::create_project::<S>),
        )
        .route(
            "/projects/:project_id",
            get(handlers::get_project::<S>).patch(handlers::update_project::<S>),
        )
        // Labels
        .route(
            "/projects/:project_id/labels",
            get(handlers::list_labels::<S>).post(handlers::create_label::<S>),
        )
        .route(
            "/projects/:project_id/labels/:label_id",
            get(handlers::get_label::<S>).patch(handlers::update_label::<S>),
        )
        // Documents and their nested annotations
        .route(
            "/projects/:project_id/docs",
            get(handlers::list_documents::<S>).post(handlers::create_document::<S>),
        )
        .route(
            "/projects/:project_id/docs/:doc_id",
            get(handlers::get_document::<S>),
        )
        .route(
            "/projects/:project_id/docs/:doc_id/annotations",
            get(handlers::list_annotations::<S>).post(handlers::create_annotation::<S>),
        )
        .layer(CorsLayer::permissive())
}
