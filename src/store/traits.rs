use crate::model::{
    Annotation, AnnotationFilter, Document, Id, Label, NewAnnotation, NewDocument, NewLabel,
    NewProject, Project,
};
use anyhow::Result;

#[async_trait::async_trait]
pub trait ProjectStore: Send + Sync {
    async fn get_project(&self, id: Id) -> Result<Option<Project>>;
    /// All projects, or only those `user` is a member of.
    async fn list_projects(&self, user: Option<Id>) -> Result<Vec<Project>>;
    async fn create_project(&self, project: NewProject) -> Result<Project>;
    /// Persist a mutated project; the store refreshes `updated_at`.
    async fn update_project(&self, project: Project) -> Result<Project>;
}

#[async_trait::async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get_document(&self, id: Id) -> Result<Option<Document>>;
    async fn list_documents(&self, project: Id) -> Result<Vec<Document>>;
    async fn create_document(&self, document: NewDocument) -> Result<Document>;
}

#[async_trait::async_trait]
pub trait LabelStore: Send + Sync {
    async fn get_label(&self, id: Id) -> Result<Option<Label>>;
    async fn list_labels(&self, project: Id) -> Result<Vec<Label>>;
    async fn create_label(&self, label: NewLabel) -> Result<Label>;
    async fn update_label(&self, label: Label) -> Result<Label>;
    /// Whether any label, in any project, uses `suffix_key` with a null prefix key.
    /// The label `exclude`, when given, is left out of the lookup.
    async fn unprefixed_suffix_key_exists(
        &self,
        suffix_key: &str,
        exclude: Option<Id>,
    ) -> Result<bool>;
}

#[async_trait::async_trait]
pub trait AnnotationStore: Send + Sync {
    /// Matching annotations in storage order.
    async fn filter_annotations(&self, filter: &AnnotationFilter) -> Result<Vec<Annotation>>;
    async fn create_annotation(&self, annotation: NewAnnotation) -> Result<Annotation>;
}

pub trait Store: ProjectStore + DocumentStore + LabelStore + AnnotationStore + Send + Sync {}

impl<T> Store for T where T: ProjectStore + DocumentStore + LabelStore + AnnotationStore + Send + Sync {}
