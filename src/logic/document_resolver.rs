use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{ServiceError, ServiceResult, ValidationErrors};
use crate::logic::annotation_transform::AnnotationSerializer;
use crate::logic::fields::{parse_payload, require, Field, FieldKind, Parsed};
use crate::model::{AnnotationFilter, Document, Id, NewDocument, Project, RequestContext};
use crate::store::traits::{AnnotationStore, DocumentStore, ProjectStore};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentRepr {
    pub id: Id,
    pub text: String,
    pub annotations: Vec<Value>,
    pub meta: Map<String, Value>,
}

#[derive(Debug, Default, Deserialize)]
struct DocumentWrite {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    meta: Option<Map<String, Value>>,
}

const DOCUMENT_FIELDS: &[Field] = &[
    Field::new("text", FieldKind::Text),
    Field::new("meta", FieldKind::Object),
];

/// Annotations of `document` in wire form.
///
/// The annotation variant and its transform come from the owning project.
/// With a requesting user in `ctx`, only that user's annotations are returned.
pub async fn resolve_annotations<S>(
    store: &S,
    document: &Document,
    ctx: &RequestContext,
) -> ServiceResult<Vec<Value>>
where
    S: ProjectStore + AnnotationStore + ?Sized,
{
    let project = store
        .get_project(document.project)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Project {}", document.project)))?;
    let serializer = AnnotationSerializer::for_project(&project)?;
    annotations_with(store, &serializer, document, ctx).await
}

async fn annotations_with<S>(
    store: &S,
    serializer: &AnnotationSerializer,
    document: &Document,
    ctx: &RequestContext,
) -> ServiceResult<Vec<Value>>
where
    S: AnnotationStore + ?Sized,
{
    let filter = AnnotationFilter::for_document(serializer.kind(), document.id).owned_by(ctx.user);
    store
        .filter_annotations(&filter)
        .await?
        .iter()
        .map(|annotation| serializer.to_representation(annotation))
        .collect()
}

pub async fn serialize_document<S>(
    store: &S,
    document: &Document,
    ctx: &RequestContext,
) -> ServiceResult<DocumentRepr>
where
    S: ProjectStore + AnnotationStore + ?Sized,
{
    let annotations = resolve_annotations(store, document, ctx).await?;
    Ok(DocumentRepr {
        id: document.id,
        text: document.text.clone(),
        annotations,
        meta: document.meta.clone(),
    })
}

/// Serializes several documents of one project, resolving the annotation
/// transform once.
pub async fn serialize_documents<S>(
    store: &S,
    project: &Project,
    documents: &[Document],
    ctx: &RequestContext,
) -> ServiceResult<Vec<DocumentRepr>>
where
    S: AnnotationStore + ?Sized,
{
    let serializer = AnnotationSerializer::for_project(project)?;
    let mut reprs = Vec::with_capacity(documents.len());
    for document in documents {
        reprs.push(DocumentRepr {
            id: document.id,
            text: document.text.clone(),
            annotations: annotations_with(store, &serializer, document, ctx).await?,
            meta: document.meta.clone(),
        });
    }
    Ok(reprs)
}

/// `annotations` is read-only and ignored on write; `meta` defaults to `{}`.
pub fn to_new_document(project: Id, payload: Value) -> Result<NewDocument, ValidationErrors> {
    let Parsed {
        value: write,
        mut errors,
    } = parse_payload::<DocumentWrite>(payload, DOCUMENT_FIELDS)?;
    let text = require(&mut errors, "text", write.text);

    match text {
        Some(text) => errors.into_result(NewDocument {
            project,
            text,
            meta: write.meta.unwrap_or_default(),
        }),
        None => Err(errors),
    }
}

pub async fn create_document<S>(
    store: &S,
    project: &Project,
    ctx: &RequestContext,
    payload: Value,
) -> ServiceResult<DocumentRepr>
where
    S: DocumentStore + AnnotationStore + ?Sized,
{
    let serializer = AnnotationSerializer::for_project(project)?;
    let new_document = to_new_document(project.id, payload)?;
    let document = store.create_document(new_document).await?;
    log::info!("Created document {} in project {}", document.id, project.id);
    Ok(DocumentRepr {
        id: document.id,
        text: document.text.clone(),
        annotations: annotations_with(store, &serializer, &document, ctx).await?,
        meta: document.meta,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::REQUIRED;
    use crate::model::{NewAnnotation, NewProject, ProjectType};
    use crate::store::MemoryStore;
    use serde_json::json;

    async fn project_with_document(store: &MemoryStore, resource_type: &str) -> Document {
        let project = store
            .create_project(NewProject {
                name: "ner".to_string(),
                description: String::new(),
                guideline: String::new(),
                users: vec![1, 2],
                project_type: ProjectType::SequenceLabeling,
                resource_type: resource_type.to_string(),
                image: None,
            })
            .await
            .unwrap();
        store
            .create_document(NewDocument {
                project: project.id,
                text: "Barack Obama".to_string(),
                meta: json!({"source": "wiki"}).as_object().unwrap().clone(),
            })
            .await
            .unwrap()
    }

    async fn annotate(store: &MemoryStore, document: Id, user: Id, start: i32) {
        store
            .create_annotation(NewAnnotation::SequenceLabeling {
                prob: 1.0,
                label: 1,
                start_offset: start,
                end_offset: start + 1,
                user,
                document,
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_annotations_filtered_by_requesting_user() {
        let store = MemoryStore::new();
        let document = project_with_document(&store, "SequenceLabelingProject").await;
        let other = project_with_document(&store, "SequenceLabelingProject").await;

        // N = 3 on this document, M = 2 owned by user 1.
        annotate(&store, document.id, 1, 0).await;
        annotate(&store, document.id, 2, 1).await;
        annotate(&store, document.id, 1, 2).await;
        annotate(&store, other.id, 1, 0).await;

        let mine = resolve_annotations(&store, &document, &RequestContext::for_user(1))
            .await
            .unwrap();
        assert_eq!(mine.len(), 2);
        assert_eq!(mine[0]["start_offset"], 0);
        assert_eq!(mine[1]["start_offset"], 2);

        let everyone = resolve_annotations(&store, &document, &RequestContext::anonymous())
            .await
            .unwrap();
        assert_eq!(everyone.len(), 3);
    }

    #[tokio::test]
    async fn test_only_the_project_variant_is_queried() {
        let store = MemoryStore::new();
        let document = project_with_document(&store, "Seq2seqProject").await;
        annotate(&store, document.id, 1, 0).await;
        store
            .create_annotation(NewAnnotation::Seq2seq {
                text: "Obama".to_string(),
                user: 1,
                document: document.id,
            })
            .await
            .unwrap();

        let repr = serialize_document(&store, &document, &RequestContext::anonymous())
            .await
            .unwrap();
        assert_eq!(repr.annotations.len(), 1);
        assert_eq!(repr.annotations[0]["text"], "Obama");
        assert_eq!(repr.meta["source"], "wiki");
    }

    #[tokio::test]
    async fn test_base_project_documents_fail_with_mapping_error() {
        let store = MemoryStore::new();
        let document = project_with_document(&store, "Project").await;
        let err = serialize_document(&store, &document, &RequestContext::anonymous())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Mapping(_)));
    }

    #[test]
    fn test_to_new_document() {
        let document = to_new_document(3, json!({"text": "hello", "annotations": [1]})).unwrap();
        assert_eq!(document.project, 3);
        assert!(document.meta.is_empty());

        let errors = to_new_document(3, json!({"meta": {}})).unwrap_err();
        assert_eq!(errors.get("text").unwrap(), [REQUIRED]);
    }

    #[test]
    fn test_to_new_document_reports_wrong_types_per_field() {
        let errors = to_new_document(3, json!({"text": 12, "meta": ["a"]})).unwrap_err();
        assert_eq!(errors.get("text").unwrap(), ["Not a valid string."]);
        assert_eq!(
            errors.get("meta").unwrap(),
            ["Expected a dictionary of items but got type \"list\"."]
        );
    }
}
