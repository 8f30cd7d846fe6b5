use anyhow::Result;
use serde_json::{json, Map, Value};

use crate::model::{
    Id, NewAnnotation, NewDocument, NewLabel, NewProject, Project, ProjectType, ProjectVariant,
    DEFAULT_BACKGROUND_COLOR, DEFAULT_TEXT_COLOR,
};
use crate::store::traits::Store;

/// Demo annotator owning every seeded project and annotation.
pub const SEED_USER: Id = 1;

/// Loads one project per annotatable variant, each with a couple of labels,
/// documents and an annotation by `SEED_USER`. Does nothing when the store
/// already holds projects.
pub async fn load_seed_data<S: Store>(store: &S) -> Result<()> {
    let existing = store.list_projects(None).await?.len();
    if existing > 0 {
        log::info!("Store already holds {} projects, skipping seed data", existing);
        return Ok(());
    }

    let sentiment = create_project(
        store,
        "Movie reviews",
        ProjectType::DocumentClassification,
        ProjectVariant::TextClassification,
    )
    .await?;
    let positive = create_label(store, sentiment.id, "Positive", Some("p"), "#23d160").await?;
    create_label(store, sentiment.id, "Negative", Some("n"), "#ff3860").await?;
    let review = create_document(store, sentiment.id, "A gripping film from start to end.").await?;
    store
        .create_annotation(NewAnnotation::Classification {
            prob: 1.0,
            label: positive,
            user: SEED_USER,
            document: review,
        })
        .await?;

    let ner = create_project(
        store,
        "News entities",
        ProjectType::SequenceLabeling,
        ProjectVariant::SequenceLabeling,
    )
    .await?;
    let person = create_label(store, ner.id, "PER", None, DEFAULT_BACKGROUND_COLOR).await?;
    create_label(store, ner.id, "LOC", None, "#ffdd57").await?;
    let article = create_document(store, ner.id, "Barack Obama visited Paris.").await?;
    store
        .create_annotation(NewAnnotation::SequenceLabeling {
            prob: 1.0,
            label: person,
            start_offset: 0,
            end_offset: 12,
            user: SEED_USER,
            document: article,
        })
        .await?;

    let translation = create_project(
        store,
        "English to French",
        ProjectType::Seq2seq,
        ProjectVariant::Seq2seq,
    )
    .await?;
    let sentence = create_document(store, translation.id, "Good morning.").await?;
    store
        .create_annotation(NewAnnotation::Seq2seq {
            text: "Bonjour.".to_string(),
            user: SEED_USER,
            document: sentence,
        })
        .await?;

    log::info!(
        "Seeded projects {}, {} and {}",
        sentiment.id,
        ner.id,
        translation.id
    );
    Ok(())
}

async fn create_project<S: Store>(
    store: &S,
    name: &str,
    project_type: ProjectType,
    variant: ProjectVariant,
) -> Result<Project> {
    store
        .create_project(NewProject {
            name: name.to_string(),
            description: format!("Demo {} project", project_type.as_str()),
            guideline: "Annotate every document.".to_string(),
            users: vec![SEED_USER],
            project_type,
            resource_type: variant.resource_type().to_string(),
            image: None,
        })
        .await
}

async fn create_label<S: Store>(
    store: &S,
    project: Id,
    text: &str,
    suffix_key: Option<&str>,
    background_color: &str,
) -> Result<Id> {
    let label = store
        .create_label(NewLabel {
            project,
            text: text.to_string(),
            prefix_key: None,
            suffix_key: suffix_key.map(str::to_string),
            background_color: background_color.to_string(),
            text_color: DEFAULT_TEXT_COLOR.to_string(),
        })
        .await?;
    Ok(label.id)
}

async fn create_document<S: Store>(store: &S, project: Id, text: &str) -> Result<Id> {
    let meta: Map<String, Value> = json!({"source": "seed"})
        .as_object()
        .cloned()
        .unwrap_or_default();
    let document = store
        .create_document(NewDocument {
            project,
            text: text.to_string(),
            meta,
        })
        .await?;
    Ok(document.id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::AnnotationFilter;
    use crate::store::traits::{AnnotationStore, DocumentStore, ProjectStore};
    use crate::store::MemoryStore;

    #[tokio::test]
    async fn test_seed_data_resolves_per_variant() {
        let store = MemoryStore::new();
        load_seed_data(&store).await.unwrap();

        let projects = store.list_projects(Some(SEED_USER)).await.unwrap();
        assert_eq!(projects.len(), 3);

        for project in &projects {
            let documents = store.list_documents(project.id).await.unwrap();
            assert_eq!(documents.len(), 1);
            let kind = project.variant().and_then(|v| v.annotation_kind()).unwrap();
            let annotations = store
                .filter_annotations(&AnnotationFilter::for_document(kind, documents[0].id))
                .await
                .unwrap();
            assert_eq!(annotations.len(), 1);
        }
    }

    #[tokio::test]
    async fn test_seeding_twice_does_not_duplicate() {
        let store = MemoryStore::new();
        load_seed_data(&store).await.unwrap();
        load_seed_data(&store).await.unwrap();

        let projects = store.list_projects(None).await.unwrap();
        assert_eq!(projects.len(), 3);
        assert_eq!(store.list_documents(projects[0].id).await.unwrap().len(), 1);
    }
}
