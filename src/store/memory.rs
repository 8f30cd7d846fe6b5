use anyhow::{anyhow, Result};
use itertools::Itertools;
use parking_lot::RwLock;
use std::collections::BTreeMap;

use crate::model::{
    Annotation, AnnotationFilter, Document, Id, Label, NewAnnotation, NewDocument, NewLabel,
    NewProject, Project,
};
use crate::store::traits::{AnnotationStore, DocumentStore, LabelStore, ProjectStore};

#[derive(Debug, Default)]
struct Tables {
    next_id: Id,
    projects: BTreeMap<Id, Project>,
    documents: BTreeMap<Id, Document>,
    labels: BTreeMap<Id, Label>,
    /// Insertion order is storage order.
    annotations: Vec<Annotation>,
}

impl Tables {
    fn allocate_id(&mut self) -> Id {
        self.next_id += 1;
        self.next_id
    }
}

/// In-process store used by tests and by local runs without a database.
/// Ids come from one shared counter, so they are unique across tables.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl ProjectStore for MemoryStore {
    async fn get_project(&self, id: Id) -> Result<Option<Project>> {
        Ok(self.tables.read().projects.get(&id).cloned())
    }

    async fn list_projects(&self, user: Option<Id>) -> Result<Vec<Project>> {
        let tables = self.tables.read();
        Ok(tables
            .projects
            .values()
            .filter(|p| user.map_or(true, |u| p.has_member(u)))
            .cloned()
            .collect())
    }

    async fn create_project(&self, project: NewProject) -> Result<Project> {
        let mut tables = self.tables.write();
        let id = tables.allocate_id();
        let project = Project {
            id,
            name: project.name,
            description: project.description,
            guideline: project.guideline,
            users: project.users.into_iter().unique().collect(),
            project_type: project.project_type,
            resource_type: project.resource_type,
            image: project.image,
            updated_at: chrono::Utc::now(),
        };
        tables.projects.insert(id, project.clone());
        Ok(project)
    }

    async fn update_project(&self, mut project: Project) -> Result<Project> {
        let mut tables = self.tables.write();
        let slot = tables
            .projects
            .get_mut(&project.id)
            .ok_or_else(|| anyhow!("Project {} does not exist", project.id))?;
        project.users = project.users.into_iter().unique().collect();
        project.updated_at = chrono::Utc::now();
        *slot = project.clone();
        Ok(project)
    }
}

#[async_trait::async_trait]
impl DocumentStore for MemoryStore {
    async fn get_document(&self, id: Id) -> Result<Option<Document>> {
        Ok(self.tables.read().documents.get(&id).cloned())
    }

    async fn list_documents(&self, project: Id) -> Result<Vec<Document>> {
        let tables = self.tables.read();
        Ok(tables
            .documents
            .values()
            .filter(|d| d.project == project)
            .cloned()
            .collect())
    }

    async fn create_document(&self, document: NewDocument) -> Result<Document> {
        let mut tables = self.tables.write();
        let id = tables.allocate_id();
        let document = Document {
            id,
            project: document.project,
            text: document.text,
            meta: document.meta,
        };
        tables.documents.insert(id, document.clone());
        Ok(document)
    }
}

#[async_trait::async_trait]
impl LabelStore for MemoryStore {
    async fn get_label(&self, id: Id) -> Result<Option<Label>> {
        Ok(self.tables.read().labels.get(&id).cloned())
    }

    async fn list_labels(&self, project: Id) -> Result<Vec<Label>> {
        let tables = self.tables.read();
        Ok(tables
            .labels
            .values()
            .filter(|l| l.project == project)
            .cloned()
            .collect())
    }

    async fn create_label(&self, label: NewLabel) -> Result<Label> {
        let mut tables = self.tables.write();
        let id = tables.allocate_id();
        let label = label.into_label(id);
        tables.labels.insert(id, label.clone());
        Ok(label)
    }

    async fn update_label(&self, label: Label) -> Result<Label> {
        let mut tables = self.tables.write();
        let slot = tables
            .labels
            .get_mut(&label.id)
            .ok_or_else(|| anyhow!("Label {} does not exist", label.id))?;
        *slot = label.clone();
        Ok(label)
    }

    async fn unprefixed_suffix_key_exists(
        &self,
        suffix_key: &str,
        exclude: Option<Id>,
    ) -> Result<bool> {
        let tables = self.tables.read();
        Ok(tables
            .labels
            .values()
            .filter(|l| Some(l.id) != exclude)
            .any(|l| l.prefix_key.is_none() && l.suffix_key.as_deref() == Some(suffix_key)))
    }
}

#[async_trait::async_trait]
impl AnnotationStore for MemoryStore {
    async fn filter_annotations(&self, filter: &AnnotationFilter) -> Result<Vec<Annotation>> {
        let tables = self.tables.read();
        Ok(tables
            .annotations
            .iter()
            .filter(|a| a.kind() == filter.kind && a.document() == filter.document)
            .filter(|a| filter.user.map_or(true, |u| a.user() == u))
            .cloned()
            .collect())
    }

    async fn create_annotation(&self, annotation: NewAnnotation) -> Result<Annotation> {
        let mut tables = self.tables.write();
        let id = tables.allocate_id();
        let annotation = annotation.into_annotation(id);
        tables.annotations.push(annotation.clone());
        Ok(annotation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AnnotationKind, ProjectType, DEFAULT_BACKGROUND_COLOR, DEFAULT_TEXT_COLOR};

    fn new_label(project: Id, prefix: Option<&str>, suffix: Option<&str>) -> NewLabel {
        NewLabel {
            project,
            text: "LOC".to_string(),
            prefix_key: prefix.map(str::to_string),
            suffix_key: suffix.map(str::to_string),
            background_color: DEFAULT_BACKGROUND_COLOR.to_string(),
            text_color: DEFAULT_TEXT_COLOR.to_string(),
        }
    }

    #[tokio::test]
    async fn test_project_membership_filter() {
        let store = MemoryStore::new();
        let project = store
            .create_project(NewProject {
                name: "news".to_string(),
                description: String::new(),
                guideline: String::new(),
                users: vec![1, 2, 1],
                project_type: ProjectType::DocumentClassification,
                resource_type: "TextClassificationProject".to_string(),
                image: None,
            })
            .await
            .unwrap();

        assert_eq!(project.users, vec![1, 2]);
        assert_eq!(store.list_projects(Some(2)).await.unwrap().len(), 1);
        assert!(store.list_projects(Some(3)).await.unwrap().is_empty());
        assert_eq!(store.list_projects(None).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_unprefixed_suffix_key_lookup_spans_projects() {
        let store = MemoryStore::new();
        let bare = store.create_label(new_label(1, None, Some("a"))).await.unwrap();
        store
            .create_label(new_label(2, Some("ctrl"), Some("b")))
            .await
            .unwrap();

        assert!(store.unprefixed_suffix_key_exists("a", None).await.unwrap());
        assert!(!store.unprefixed_suffix_key_exists("b", None).await.unwrap());
        assert!(!store.unprefixed_suffix_key_exists("c", None).await.unwrap());
        assert!(!store
            .unprefixed_suffix_key_exists("a", Some(bare.id))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_filter_annotations_keeps_storage_order() {
        let store = MemoryStore::new();
        for (user, document) in [(1, 10), (2, 10), (1, 11), (1, 10)] {
            store
                .create_annotation(NewAnnotation::Seq2seq {
                    text: format!("{}-{}", user, document),
                    user,
                    document,
                })
                .await
                .unwrap();
        }

        let filter = AnnotationFilter::for_document(AnnotationKind::Seq2seq, 10);
        let all = store.filter_annotations(&filter).await.unwrap();
        assert_eq!(all.len(), 3);
        assert!(all.windows(2).all(|w| w[0].id() < w[1].id()));

        let mine = store
            .filter_annotations(&filter.clone().owned_by(Some(1)))
            .await
            .unwrap();
        assert_eq!(mine.len(), 2);

        let other_kind = AnnotationFilter::for_document(AnnotationKind::Classification, 10);
        assert!(store.filter_annotations(&other_kind).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_missing_label_fails() {
        let store = MemoryStore::new();
        let label = new_label(1, None, None).into_label(42);
        assert!(store.update_label(label).await.is_err());
    }
}
