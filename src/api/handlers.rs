use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    Json as RequestJson,
};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

use crate::error::ServiceError;
use crate::logic::{self, AnnotationSerializer, DocumentRepr, ProjectRepr};
use crate::model::{Document, Id, Label, Project, RequestContext};
use crate::store::traits::Store;

pub type AppState<S> = Arc<S>;

pub type ApiError = (StatusCode, Json<Value>);
pub type ApiResult<T> = Result<T, ApiError>;

/// Simple health check endpoint
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
}

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

#[derive(Debug, Serialize)]
pub struct ListResponse<T> {
    pub items: Vec<T>,
    pub total: usize,
}

impl<T> From<Vec<T>> for ListResponse<T> {
    fn from(items: Vec<T>) -> Self {
        let total = items.len();
        Self { items, total }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: &str) -> Self {
        Self {
            error: message.to_string(),
        }
    }
}

/// Validation errors go out as their field-keyed map; everything else as
/// `{"error": ...}`. Internal failures are logged and not echoed.
pub fn error_response(err: ServiceError) -> ApiError {
    let status = err.status_code();
    let body = match &err {
        ServiceError::Validation(errors) => serde_json::to_value(errors).unwrap_or_default(),
        ServiceError::Mapping(_) | ServiceError::Store(_) => {
            log::error!("Request failed: {:#}", err);
            serde_json::to_value(ErrorResponse::new("Internal server error")).unwrap_or_default()
        }
        ServiceError::NotFound(_) | ServiceError::Unauthenticated => {
            serde_json::to_value(ErrorResponse::new(&err.to_string())).unwrap_or_default()
        }
    };
    (status, Json(body))
}

async fn load_project<S: Store>(store: &S, project_id: Id) -> Result<Project, ServiceError> {
    store
        .get_project(project_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Project {}", project_id)))
}

async fn load_document<S: Store>(
    store: &S,
    project_id: Id,
    doc_id: Id,
) -> Result<Document, ServiceError> {
    match store.get_document(doc_id).await? {
        Some(document) if document.project == project_id => Ok(document),
        _ => Err(ServiceError::NotFound(format!("Document {}", doc_id))),
    }
}

async fn load_label<S: Store>(store: &S, project_id: Id, label_id: Id) -> Result<Label, ServiceError> {
    match store.get_label(label_id).await? {
        Some(label) if label.project == project_id => Ok(label),
        _ => Err(ServiceError::NotFound(format!("Label {}", label_id))),
    }
}

// Project handlers
pub async fn list_projects<S: Store>(
    State(store): State<AppState<S>>,
    ctx: RequestContext,
) -> ApiResult<Json<ListResponse<ProjectRepr>>> {
    let projects = store
        .list_projects(ctx.user)
        .await
        .map_err(|e| error_response(e.into()))?;

    let items = projects
        .iter()
        .map(logic::serialize_project)
        .collect::<Result<Vec<_>, _>>()
        .map_err(error_response)?;
    Ok(Json(items.into()))
}

pub async fn create_project<S: Store>(
    State(store): State<AppState<S>>,
    ctx: RequestContext,
    RequestJson(payload): RequestJson<Value>,
) -> ApiResult<(StatusCode, Json<ProjectRepr>)> {
    let project = logic::create_project(store.as_ref(), &ctx, payload)
        .await
        .map_err(error_response)?;
    Ok((StatusCode::CREATED, Json(project)))
}

pub async fn get_project<S: Store>(
    State(store): State<AppState<S>>,
    Path(project_id): Path<Id>,
) -> ApiResult<Json<ProjectRepr>> {
    let project = load_project(store.as_ref(), project_id)
        .await
        .map_err(error_response)?;
    logic::serialize_project(&project)
        .map(Json)
        .map_err(error_response)
}

pub async fn update_project<S: Store>(
    State(store): State<AppState<S>>,
    Path(project_id): Path<Id>,
    RequestJson(payload): RequestJson<Value>,
) -> ApiResult<Json<ProjectRepr>> {
    let result = async {
        let project = load_project(store.as_ref(), project_id).await?;
        logic::update_project(store.as_ref(), project, payload).await
    }
    .await;
    result.map(Json).map_err(error_response)
}

// Label handlers
pub async fn list_labels<S: Store>(
    State(store): State<AppState<S>>,
    Path(project_id): Path<Id>,
) -> ApiResult<Json<ListResponse<Label>>> {
    let result = async {
        load_project(store.as_ref(), project_id).await?;
        Ok::<_, ServiceError>(store.list_labels(project_id).await?)
    }
    .await;
    result.map(|labels| Json(labels.into())).map_err(error_response)
}

pub async fn create_label<S: Store>(
    State(store): State<AppState<S>>,
    Path(project_id): Path<Id>,
    RequestJson(payload): RequestJson<Value>,
) -> ApiResult<(StatusCode, Json<Label>)> {
    let result = async {
        load_project(store.as_ref(), project_id).await?;
        logic::create_label(store.as_ref(), project_id, payload).await
    }
    .await;
    result
        .map(|label| (StatusCode::CREATED, Json(label)))
        .map_err(error_response)
}

pub async fn get_label<S: Store>(
    State(store): State<AppState<S>>,
    Path((project_id, label_id)): Path<(Id, Id)>,
) -> ApiResult<Json<Label>> {
    load_label(store.as_ref(), project_id, label_id)
        .await
        .map(Json)
        .map_err(error_response)
}

pub async fn update_label<S: Store>(
    State(store): State<AppState<S>>,
    Path((project_id, label_id)): Path<(Id, Id)>,
    RequestJson(payload): RequestJson<Value>,
) -> ApiResult<Json<Label>> {
    let result = async {
        let label = load_label(store.as_ref(), project_id, label_id).await?;
        logic::update_label(store.as_ref(), label, payload).await
    }
    .await;
    result.map(Json).map_err(error_response)
}

// Document handlers
pub async fn list_documents<S: Store>(
    State(store): State<AppState<S>>,
    ctx: RequestContext,
    Path(project_id): Path<Id>,
) -> ApiResult<Json<ListResponse<DocumentRepr>>> {
    let ctx = ctx.with_project(project_id);
    let result = async {
        let project = load_project(store.as_ref(), project_id).await?;
        let documents = store.list_documents(project_id).await?;
        logic::serialize_documents(store.as_ref(), &project, &documents, &ctx).await
    }
    .await;
    result.map(|docs| Json(docs.into())).map_err(error_response)
}

pub async fn create_document<S: Store>(
    State(store): State<AppState<S>>,
    ctx: RequestContext,
    Path(project_id): Path<Id>,
    RequestJson(payload): RequestJson<Value>,
) -> ApiResult<(StatusCode, Json<DocumentRepr>)> {
    let ctx = ctx.with_project(project_id);
    let result = async {
        let project = load_project(store.as_ref(), project_id).await?;
        logic::create_document(store.as_ref(), &project, &ctx, payload).await
    }
    .await;
    result
        .map(|doc| (StatusCode::CREATED, Json(doc)))
        .map_err(error_response)
}

pub async fn get_document<S: Store>(
    State(store): State<AppState<S>>,
    ctx: RequestContext,
    Path((project_id, doc_id)): Path<(Id, Id)>,
) -> ApiResult<Json<DocumentRepr>> {
    let ctx = ctx.with_project(project_id);
    let result = async {
        let document = load_document(store.as_ref(), project_id, doc_id).await?;
        logic::serialize_document(store.as_ref(), &document, &ctx).await
    }
    .await;
    result.map(Json).map_err(error_response)
}

// Annotation handlers
pub async fn list_annotations<S: Store>(
    State(store): State<AppState<S>>,
    ctx: RequestContext,
    Path((project_id, doc_id)): Path<(Id, Id)>,
) -> ApiResult<Json<ListResponse<Value>>> {
    let ctx = ctx.with_project(project_id);
    let result = async {
        let document = load_document(store.as_ref(), project_id, doc_id).await?;
        logic::resolve_annotations(store.as_ref(), &document, &ctx).await
    }
    .await;
    result.map(|items| Json(items.into())).map_err(error_response)
}

/// The document always comes from the route, overriding any body value.
pub async fn create_annotation<S: Store>(
    State(store): State<AppState<S>>,
    ctx: RequestContext,
    Path((project_id, doc_id)): Path<(Id, Id)>,
    RequestJson(mut payload): RequestJson<Value>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let ctx = ctx.with_project(project_id);
    let result = async {
        let project = load_project(store.as_ref(), project_id).await?;
        load_document(store.as_ref(), project_id, doc_id).await?;
        let serializer = AnnotationSerializer::for_project(&project)?;

        if let Some(body) = payload.as_object_mut() {
            body.insert("document".to_string(), Value::from(doc_id));
        }
        let new_annotation = serializer
            .to_internal_value(store.as_ref(), &ctx, payload)
            .await?;
        let annotation = store.create_annotation(new_annotation).await?;
        log::info!(
            "Created {:?} annotation {} on document {}",
            annotation.kind(),
            annotation.id(),
            doc_id
        );
        serializer.to_representation(&annotation)
    }
    .await;
    result
        .map(|annotation| (StatusCode::CREATED, Json(annotation)))
        .map_err(error_response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ValidationErrors;

    #[test]
    fn test_error_response_shapes() {
        let (status, Json(body)) =
            error_response(ValidationErrors::non_field("Duplicate key.").into());
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, serde_json::json!({"non_field_errors": ["Duplicate key."]}));

        let (status, Json(body)) = error_response(ServiceError::Mapping("x".to_string()));
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, serde_json::json!({"error": "Internal server error"}));

        let (status, Json(body)) = error_response(ServiceError::NotFound("Label 4".to_string()));
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, serde_json::json!({"error": "Label 4 not found"}));
    }

    #[test]
    fn test_list_response_counts_items() {
        let list: ListResponse<u8> = vec![1, 2, 3].into();
        assert_eq!(list.total, 3);
    }
}
