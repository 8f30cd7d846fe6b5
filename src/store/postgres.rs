use anyhow::{anyhow, Context, Result};
use serde_json::{Map, Value};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::types::Json;
use sqlx::{PgPool, Row};

use crate::model::{
    Annotation, AnnotationFilter, AnnotationKind, Document, DocumentAnnotation, Id, Label,
    NewAnnotation, NewDocument, NewLabel, NewProject, Project, ProjectType, Seq2seqAnnotation,
    SequenceAnnotation,
};
use crate::store::traits::{AnnotationStore, DocumentStore, LabelStore, ProjectStore};

const PROJECT_SELECT: &str = r#"
    SELECT p.id, p.name, p.description, p.guideline, p.project_type, p.resource_type,
           p.image, p.updated_at,
           COALESCE(ARRAY_AGG(pu.user_id ORDER BY pu.user_id)
                    FILTER (WHERE pu.user_id IS NOT NULL), '{}'::bigint[]) AS users
    FROM projects p
    LEFT JOIN project_users pu ON pu.project_id = p.id
"#;

#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Create a new PostgreSQL store with the given database URL
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .context("Failed to create PostgreSQL connection pool")?;

        Ok(Self { pool })
    }

    /// Run the embedded migrations
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .context("Failed to run database migrations")?;
        Ok(())
    }

    /// Get a reference to the connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn replace_project_users(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        project_id: Id,
        users: &[Id],
    ) -> Result<()> {
        sqlx::query("DELETE FROM project_users WHERE project_id = $1")
            .bind(project_id)
            .execute(&mut **tx)
            .await
            .context("Failed to clear project users")?;

        sqlx::query(
            r#"
            INSERT INTO project_users (project_id, user_id)
            SELECT $1, UNNEST($2::bigint[])
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(project_id)
        .bind(users)
        .execute(&mut **tx)
        .await
        .context("Failed to store project users")?;

        Ok(())
    }
}

fn project_from_row(row: &PgRow) -> Result<Project> {
    let project_type: String = row.get("project_type");
    let project_type = ProjectType::parse(&project_type)
        .ok_or_else(|| anyhow!("Unknown project type '{}' in storage", project_type))?;

    Ok(Project {
        id: row.get("id"),
        name: row.get("name"),
        description: row.get("description"),
        guideline: row.get("guideline"),
        users: row.get("users"),
        project_type,
        resource_type: row.get("resource_type"),
        image: row.get("image"),
        updated_at: row.get("updated_at"),
    })
}

fn document_from_row(row: &PgRow) -> Document {
    let Json(meta): Json<Map<String, Value>> = row.get("meta");
    Document {
        id: row.get("id"),
        project: row.get("project_id"),
        text: row.get("text"),
        meta,
    }
}

fn label_from_row(row: &PgRow) -> Label {
    Label {
        id: row.get("id"),
        project: row.get("project_id"),
        text: row.get("text"),
        prefix_key: row.get("prefix_key"),
        suffix_key: row.get("suffix_key"),
        background_color: row.get("background_color"),
        text_color: row.get("text_color"),
    }
}

fn annotation_from_row(kind: AnnotationKind, row: &PgRow) -> Annotation {
    match kind {
        AnnotationKind::Classification => Annotation::Classification(DocumentAnnotation {
            id: row.get("id"),
            prob: row.get("prob"),
            label: row.get("label_id"),
            user: row.get("user_id"),
            document: row.get("document_id"),
        }),
        AnnotationKind::SequenceLabeling => Annotation::SequenceLabeling(SequenceAnnotation {
            id: row.get("id"),
            prob: row.get("prob"),
            label: row.get("label_id"),
            start_offset: row.get("start_offset"),
            end_offset: row.get("end_offset"),
            user: row.get("user_id"),
            document: row.get("document_id"),
        }),
        AnnotationKind::Seq2seq => Annotation::Seq2seq(Seq2seqAnnotation {
            id: row.get("id"),
            text: row.get("text"),
            user: row.get("user_id"),
            document: row.get("document_id"),
        }),
    }
}

fn annotation_table(kind: AnnotationKind) -> &'static str {
    match kind {
        AnnotationKind::Classification => "document_annotations",
        AnnotationKind::SequenceLabeling => "sequence_annotations",
        AnnotationKind::Seq2seq => "seq2seq_annotations",
    }
}

#[async_trait::async_trait]
impl ProjectStore for PostgresStore {
    async fn get_project(&self, id: Id) -> Result<Option<Project>> {
        let row = sqlx::query(&format!("{} WHERE p.id = $1 GROUP BY p.id", PROJECT_SELECT))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch project")?;

        row.as_ref().map(project_from_row).transpose()
    }

    async fn list_projects(&self, user: Option<Id>) -> Result<Vec<Project>> {
        let rows = sqlx::query(&format!(
            r#"{}
            WHERE $1::bigint IS NULL OR EXISTS (
                SELECT 1 FROM project_users m WHERE m.project_id = p.id AND m.user_id = $1
            )
            GROUP BY p.id
            ORDER BY p.id"#,
            PROJECT_SELECT
        ))
        .bind(user)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list projects")?;

        rows.iter().map(project_from_row).collect()
    }

    async fn create_project(&self, project: NewProject) -> Result<Project> {
        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;

        let id: Id = sqlx::query(
            r#"
            INSERT INTO projects (name, description, guideline, project_type, resource_type, image)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id
            "#,
        )
        .bind(&project.name)
        .bind(&project.description)
        .bind(&project.guideline)
        .bind(project.project_type.as_str())
        .bind(&project.resource_type)
        .bind(&project.image)
        .fetch_one(&mut *tx)
        .await
        .context("Failed to insert project")?
        .get("id");

        Self::replace_project_users(&mut tx, id, &project.users).await?;
        tx.commit().await.context("Failed to commit project")?;

        self.get_project(id)
            .await?
            .ok_or_else(|| anyhow!("Project {} vanished after insert", id))
    }

    async fn update_project(&self, project: Project) -> Result<Project> {
        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;

        let result = sqlx::query(
            r#"
            UPDATE projects SET
                name = $2,
                description = $3,
                guideline = $4,
                project_type = $5,
                image = $6,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(project.id)
        .bind(&project.name)
        .bind(&project.description)
        .bind(&project.guideline)
        .bind(project.project_type.as_str())
        .bind(&project.image)
        .execute(&mut *tx)
        .await
        .context("Failed to update project")?;

        if result.rows_affected() == 0 {
            return Err(anyhow!("Project {} does not exist", project.id));
        }

        Self::replace_project_users(&mut tx, project.id, &project.users).await?;
        tx.commit().await.context("Failed to commit project")?;

        self.get_project(project.id)
            .await?
            .ok_or_else(|| anyhow!("Project {} vanished after update", project.id))
    }
}

#[async_trait::async_trait]
impl DocumentStore for PostgresStore {
    async fn get_document(&self, id: Id) -> Result<Option<Document>> {
        let row = sqlx::query("SELECT id, project_id, text, meta FROM documents WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch document")?;

        Ok(row.as_ref().map(document_from_row))
    }

    async fn list_documents(&self, project: Id) -> Result<Vec<Document>> {
        let rows = sqlx::query(
            "SELECT id, project_id, text, meta FROM documents WHERE project_id = $1 ORDER BY id",
        )
        .bind(project)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list documents")?;

        Ok(rows.iter().map(document_from_row).collect())
    }

    async fn create_document(&self, document: NewDocument) -> Result<Document> {
        let row = sqlx::query(
            r#"
            INSERT INTO documents (project_id, text, meta)
            VALUES ($1, $2, $3)
            RETURNING id, project_id, text, meta
            "#,
        )
        .bind(document.project)
        .bind(&document.text)
        .bind(Json(&document.meta))
        .fetch_one(&self.pool)
        .await
        .context("Failed to insert document")?;

        Ok(document_from_row(&row))
    }
}

#[async_trait::async_trait]
impl LabelStore for PostgresStore {
    async fn get_label(&self, id: Id) -> Result<Option<Label>> {
        let row = sqlx::query(
            r#"
            SELECT id, project_id, text, prefix_key, suffix_key, background_color, text_color
            FROM labels WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch label")?;

        Ok(row.as_ref().map(label_from_row))
    }

    async fn list_labels(&self, project: Id) -> Result<Vec<Label>> {
        let rows = sqlx::query(
            r#"
            SELECT id, project_id, text, prefix_key, suffix_key, background_color, text_color
            FROM labels WHERE project_id = $1 ORDER BY id
            "#,
        )
        .bind(project)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list labels")?;

        Ok(rows.iter().map(label_from_row).collect())
    }

    async fn create_label(&self, label: NewLabel) -> Result<Label> {
        let id: Id = sqlx::query(
            r#"
            INSERT INTO labels (project_id, text, prefix_key, suffix_key, background_color, text_color)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id
            "#,
        )
        .bind(label.project)
        .bind(&label.text)
        .bind(&label.prefix_key)
        .bind(&label.suffix_key)
        .bind(&label.background_color)
        .bind(&label.text_color)
        .fetch_one(&self.pool)
        .await
        .context("Failed to insert label")?
        .get("id");

        Ok(label.into_label(id))
    }

    async fn update_label(&self, label: Label) -> Result<Label> {
        let result = sqlx::query(
            r#"
            UPDATE labels SET
                text = $2,
                prefix_key = $3,
                suffix_key = $4,
                background_color = $5,
                text_color = $6
            WHERE id = $1
            "#,
        )
        .bind(label.id)
        .bind(&label.text)
        .bind(&label.prefix_key)
        .bind(&label.suffix_key)
        .bind(&label.background_color)
        .bind(&label.text_color)
        .execute(&self.pool)
        .await
        .context("Failed to update label")?;

        if result.rows_affected() == 0 {
            return Err(anyhow!("Label {} does not exist", label.id));
        }
        Ok(label)
    }

    async fn unprefixed_suffix_key_exists(
        &self,
        suffix_key: &str,
        exclude: Option<Id>,
    ) -> Result<bool> {
        let row = sqlx::query(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM labels
                WHERE suffix_key = $1 AND prefix_key IS NULL
                  AND ($2::bigint IS NULL OR id <> $2)
            ) AS taken
            "#,
        )
        .bind(suffix_key)
        .bind(exclude)
        .fetch_one(&self.pool)
        .await
        .context("Failed to check shortcut key")?;

        Ok(row.get("taken"))
    }
}

#[async_trait::async_trait]
impl AnnotationStore for PostgresStore {
    async fn filter_annotations(&self, filter: &AnnotationFilter) -> Result<Vec<Annotation>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT * FROM {}
            WHERE document_id = $1 AND ($2::bigint IS NULL OR user_id = $2)
            ORDER BY id
            "#,
            annotation_table(filter.kind)
        ))
        .bind(filter.document)
        .bind(filter.user)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list annotations")?;

        Ok(rows
            .iter()
            .map(|row| annotation_from_row(filter.kind, row))
            .collect())
    }

    async fn create_annotation(&self, annotation: NewAnnotation) -> Result<Annotation> {
        let kind = annotation.kind();
        let query = match &annotation {
            NewAnnotation::Classification {
                prob,
                label,
                user,
                document,
            } => sqlx::query(
                r#"
                INSERT INTO document_annotations (document_id, user_id, label_id, prob)
                VALUES ($1, $2, $3, $4)
                RETURNING *
                "#,
            )
            .bind(*document)
            .bind(*user)
            .bind(*label)
            .bind(*prob),
            NewAnnotation::SequenceLabeling {
                prob,
                label,
                start_offset,
                end_offset,
                user,
                document,
            } => sqlx::query(
                r#"
                INSERT INTO sequence_annotations
                    (document_id, user_id, label_id, prob, start_offset, end_offset)
                VALUES ($1, $2, $3, $4, $5, $6)
                RETURNING *
                "#,
            )
            .bind(*document)
            .bind(*user)
            .bind(*label)
            .bind(*prob)
            .bind(*start_offset)
            .bind(*end_offset),
            NewAnnotation::Seq2seq {
                text,
                user,
                document,
            } => sqlx::query(
                r#"
                INSERT INTO seq2seq_annotations (document_id, user_id, text)
                VALUES ($1, $2, $3)
                RETURNING *
                "#,
            )
            .bind(*document)
            .bind(*user)
            .bind(text.clone()),
        };

        let row = query
            .fetch_one(&self.pool)
            .await
            .context("Failed to insert annotation")?;

        Ok(annotation_from_row(kind, &row))
    }
}
