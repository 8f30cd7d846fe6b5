use serde::Deserialize;
use serde_json::Value;

use crate::error::{ServiceError, ServiceResult, ValidationErrors};
use crate::logic::fields::{
    invalid_pk, parse_payload, require, require_text, Field, FieldKind, Parsed,
};
use crate::model::{Annotation, AnnotationKind, Id, NewAnnotation, Project, RequestContext};
use crate::store::traits::{DocumentStore, LabelStore};

const SEQ2SEQ_TEXT_MAX_LEN: usize = 500;

#[derive(Debug, Default, Deserialize)]
struct DocumentAnnotationWrite {
    #[serde(default)]
    prob: Option<f64>,
    #[serde(default)]
    label: Option<Id>,
    #[serde(default)]
    document: Option<Id>,
}

#[derive(Debug, Default, Deserialize)]
struct SequenceAnnotationWrite {
    #[serde(default)]
    prob: Option<f64>,
    #[serde(default)]
    label: Option<Id>,
    #[serde(default)]
    start_offset: Option<i32>,
    #[serde(default)]
    end_offset: Option<i32>,
    #[serde(default)]
    document: Option<Id>,
}

#[derive(Debug, Default, Deserialize)]
struct Seq2seqAnnotationWrite {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    document: Option<Id>,
}

const CLASSIFICATION_FIELDS: &[Field] = &[
    Field::new("prob", FieldKind::Float),
    Field::new("label", FieldKind::PrimaryKey),
    Field::new("document", FieldKind::PrimaryKey),
];

const SEQUENCE_FIELDS: &[Field] = &[
    Field::new("prob", FieldKind::Float),
    Field::new("label", FieldKind::PrimaryKey),
    Field::new("start_offset", FieldKind::Integer),
    Field::new("end_offset", FieldKind::Integer),
    Field::new("document", FieldKind::PrimaryKey),
];

const SEQ2SEQ_FIELDS: &[Field] = &[
    Field::new("text", FieldKind::Text),
    Field::new("document", FieldKind::PrimaryKey),
];

/// Transform for one annotation variant.
///
/// `user` is read-only: it comes from the request context, never the body.
/// `document` and `label` must name existing records. When the context carries
/// a project id, they must also belong to that project.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnnotationSerializer {
    kind: AnnotationKind,
}

impl AnnotationSerializer {
    pub fn new(kind: AnnotationKind) -> Self {
        Self { kind }
    }

    /// Annotation transform for documents of `project`, keyed by the project's
    /// variant. A base project has no annotation variant.
    pub fn for_project(project: &Project) -> ServiceResult<Self> {
        let kind = project.variant().and_then(|v| v.annotation_kind());
        match kind {
            Some(kind) => Ok(Self::new(kind)),
            None => {
                log::error!(
                    "Project {} ({}) has no annotation variant",
                    project.id,
                    project.resource_type
                );
                Err(ServiceError::Mapping(format!(
                    "annotations of resource type '{}'",
                    project.resource_type
                )))
            }
        }
    }

    pub fn kind(&self) -> AnnotationKind {
        self.kind
    }

    pub fn to_representation(&self, annotation: &Annotation) -> ServiceResult<Value> {
        if annotation.kind() != self.kind {
            log::error!(
                "Annotation {} is {:?}, serializer expects {:?}",
                annotation.id(),
                annotation.kind(),
                self.kind
            );
            return Err(ServiceError::Mapping(format!("{:?} annotation", annotation.kind())));
        }
        serde_json::to_value(annotation).map_err(|e| ServiceError::Store(e.into()))
    }

    /// Validates a request body into an annotation owned by the requesting user.
    pub async fn to_internal_value<S>(
        &self,
        store: &S,
        ctx: &RequestContext,
        payload: Value,
    ) -> ServiceResult<NewAnnotation>
    where
        S: DocumentStore + LabelStore + ?Sized,
    {
        let user = ctx.user.ok_or(ServiceError::Unauthenticated)?;

        // Type errors from parsing come first; reference and presence checks
        // only add fields that parsed cleanly.
        let (annotation, errors) = match self.kind {
            AnnotationKind::Classification => {
                let Parsed {
                    value: write,
                    mut errors,
                } = parse_payload::<DocumentAnnotationWrite>(payload, CLASSIFICATION_FIELDS)?;
                let label = resolve_label(store, ctx, &mut errors, write.label).await?;
                let document = resolve_document(store, ctx, &mut errors, write.document).await?;
                let annotation = match (label, document) {
                    (Some(label), Some(document)) => Some(NewAnnotation::Classification {
                        prob: write.prob.unwrap_or(0.0),
                        label,
                        user,
                        document,
                    }),
                    _ => None,
                };
                (annotation, errors)
            }
            AnnotationKind::SequenceLabeling => {
                let Parsed {
                    value: write,
                    mut errors,
                } = parse_payload::<SequenceAnnotationWrite>(payload, SEQUENCE_FIELDS)?;
                let label = resolve_label(store, ctx, &mut errors, write.label).await?;
                let start_offset = require(&mut errors, "start_offset", write.start_offset);
                let end_offset = require(&mut errors, "end_offset", write.end_offset);
                let document = resolve_document(store, ctx, &mut errors, write.document).await?;
                let annotation = match (label, start_offset, end_offset, document) {
                    (Some(label), Some(start_offset), Some(end_offset), Some(document)) => {
                        Some(NewAnnotation::SequenceLabeling {
                            prob: write.prob.unwrap_or(0.0),
                            label,
                            start_offset,
                            end_offset,
                            user,
                            document,
                        })
                    }
                    _ => None,
                };
                (annotation, errors)
            }
            AnnotationKind::Seq2seq => {
                let Parsed {
                    value: write,
                    mut errors,
                } = parse_payload::<Seq2seqAnnotationWrite>(payload, SEQ2SEQ_FIELDS)?;
                let text = require_text(&mut errors, "text", write.text, SEQ2SEQ_TEXT_MAX_LEN);
                let document = resolve_document(store, ctx, &mut errors, write.document).await?;
                let annotation = match (text, document) {
                    (Some(text), Some(document)) => Some(NewAnnotation::Seq2seq {
                        text,
                        user,
                        document,
                    }),
                    _ => None,
                };
                (annotation, errors)
            }
        };

        match annotation {
            Some(annotation) => Ok(errors.into_result(annotation)?),
            None => Err(errors.into()),
        }
    }
}

async fn resolve_label<S: LabelStore + ?Sized>(
    store: &S,
    ctx: &RequestContext,
    errors: &mut ValidationErrors,
    label: Option<Id>,
) -> ServiceResult<Option<Id>> {
    let Some(id) = require(errors, "label", label) else {
        return Ok(None);
    };
    match store.get_label(id).await? {
        Some(label) if ctx.project_id.map_or(true, |p| p == label.project) => Ok(Some(id)),
        _ => {
            errors.add("label", invalid_pk(id));
            Ok(None)
        }
    }
}

async fn resolve_document<S: DocumentStore + ?Sized>(
    store: &S,
    ctx: &RequestContext,
    errors: &mut ValidationErrors,
    document: Option<Id>,
) -> ServiceResult<Option<Id>> {
    let Some(id) = require(errors, "document", document) else {
        return Ok(None);
    };
    match store.get_document(id).await? {
        Some(document) if ctx.project_id.map_or(true, |p| p == document.project) => Ok(Some(id)),
        _ => {
            errors.add("document", invalid_pk(id));
            Ok(None)
        }
    }
}
