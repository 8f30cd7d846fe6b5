use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ServiceError, ServiceResult, ValidationErrors, REQUIRED};
use crate::logic::fields::{
    check_text, parse_payload, require, require_text, Field, FieldKind, Parsed,
};
use crate::model::{Id, NewProject, Project, ProjectType, ProjectVariant, RequestContext, Timestamp};
use crate::store::traits::ProjectStore;

/// Name of the wire field carrying the variant discriminator.
pub const RESOURCE_TYPE_FIELD: &str = "resourcetype";

pub const PROJECT_FIELDS: [&str; 8] = [
    "id",
    "name",
    "description",
    "guideline",
    "users",
    "project_type",
    "image",
    "updated_at",
];

const BASE_READ_ONLY: &[&str] = &["image", "updated_at"];
const SUBTYPE_READ_ONLY: &[&str] = &["image", "updated_at", "users"];

const NAME_MAX_LEN: usize = 100;

const WRITE_FIELDS: &[Field] = &[
    Field::new("name", FieldKind::Text),
    Field::new("description", FieldKind::Text),
    Field::new("guideline", FieldKind::Text),
    Field::new("users", FieldKind::PrimaryKeyList),
    Field::new("project_type", FieldKind::Choice(ProjectType::NAMES)),
];

/// Wire form shared by every project variant.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectRepr {
    pub id: Id,
    pub name: String,
    pub description: String,
    pub guideline: String,
    pub users: Vec<Id>,
    pub project_type: ProjectType,
    pub image: Option<String>,
    pub updated_at: Timestamp,
    pub resourcetype: &'static str,
}

/// Writable project attributes as sent by the client. Read-only fields and
/// the discriminator are not part of this model, so they never reach a record.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ProjectWrite {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub guideline: Option<String>,
    #[serde(default)]
    pub users: Option<Vec<Id>>,
    #[serde(default)]
    pub project_type: Option<ProjectType>,
}

/// Transform for one project variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProjectSerializer {
    variant: ProjectVariant,
}

impl ProjectSerializer {
    pub fn new(variant: ProjectVariant) -> Self {
        Self { variant }
    }

    /// Picks the transform registered for the project's stored discriminator.
    pub fn for_project(project: &Project) -> ServiceResult<Self> {
        match project.variant() {
            Some(variant) => Ok(Self::new(variant)),
            None => {
                log::error!(
                    "Project {} has unregistered resource type '{}'",
                    project.id,
                    project.resource_type
                );
                Err(ServiceError::Mapping(format!(
                    "resource type '{}'",
                    project.resource_type
                )))
            }
        }
    }

    pub fn variant(&self) -> ProjectVariant {
        self.variant
    }

    pub fn read_only_fields(&self) -> &'static [&'static str] {
        match self.variant {
            ProjectVariant::Base => BASE_READ_ONLY,
            ProjectVariant::TextClassification
            | ProjectVariant::SequenceLabeling
            | ProjectVariant::Seq2seq => SUBTYPE_READ_ONLY,
        }
    }

    pub fn is_writable(&self, field: &str) -> bool {
        field != "id" && PROJECT_FIELDS.contains(&field) && !self.read_only_fields().contains(&field)
    }

    pub fn to_representation(&self, project: &Project) -> ProjectRepr {
        ProjectRepr {
            id: project.id,
            name: project.name.clone(),
            description: project.description.clone(),
            guideline: project.guideline.clone(),
            users: project.users.clone(),
            project_type: project.project_type,
            image: project.image.clone(),
            updated_at: project.updated_at,
            resourcetype: self.variant.resource_type(),
        }
    }

    /// Reads the writable fields of a request body. Read-only fields are
    /// skipped without being checked.
    pub fn parse(&self, payload: Value) -> Result<Parsed<ProjectWrite>, ValidationErrors> {
        let fields: Vec<Field> = WRITE_FIELDS
            .iter()
            .filter(|field| self.is_writable(field.name))
            .copied()
            .collect();
        parse_payload(payload, &fields)
    }

    /// Drops every attribute this variant treats as read-only.
    pub fn to_internal_value(&self, mut write: ProjectWrite) -> ProjectWrite {
        if !self.is_writable("users") {
            write.users = None;
        }
        write
    }

    /// Field checks for a create, producing the record to insert.
    pub fn build(&self, write: ProjectWrite) -> Result<NewProject, ValidationErrors> {
        let write = self.to_internal_value(write);
        let mut errors = ValidationErrors::new();

        let name = require_text(&mut errors, "name", write.name, NAME_MAX_LEN);
        let project_type = require(&mut errors, "project_type", write.project_type);

        match (name, project_type) {
            (Some(name), Some(project_type)) if errors.is_empty() => Ok(NewProject {
                name,
                description: write.description.unwrap_or_default(),
                guideline: write.guideline.unwrap_or_default(),
                users: write.users.unwrap_or_default(),
                project_type,
                resource_type: self.variant.resource_type().to_string(),
                image: None,
            }),
            _ => Err(errors),
        }
    }

    /// Field checks for a partial update, applied onto `project`.
    pub fn apply(&self, project: &mut Project, write: ProjectWrite) -> Result<(), ValidationErrors> {
        let write = self.to_internal_value(write);
        let mut errors = ValidationErrors::new();

        if let Some(name) = write.name {
            if let Some(name) = check_text(&mut errors, "name", name, NAME_MAX_LEN) {
                project.name = name;
            }
        }
        if !errors.is_empty() {
            return Err(errors);
        }

        if let Some(description) = write.description {
            project.description = description;
        }
        if let Some(guideline) = write.guideline {
            project.guideline = guideline;
        }
        if let Some(users) = write.users {
            project.users = users;
        }
        if let Some(project_type) = write.project_type {
            project.project_type = project_type;
        }
        Ok(())
    }
}

/// Serializes a project with the transform matching its stored variant.
pub fn serialize_project(project: &Project) -> ServiceResult<ProjectRepr> {
    Ok(ProjectSerializer::for_project(project)?.to_representation(project))
}

/// Reads the discriminator from a request body.
pub fn variant_from_payload(payload: &Value) -> Result<ProjectVariant, ValidationErrors> {
    match payload.get(RESOURCE_TYPE_FIELD) {
        None | Some(Value::Null) => Err(ValidationErrors::field(RESOURCE_TYPE_FIELD, REQUIRED)),
        Some(value) => value
            .as_str()
            .and_then(ProjectVariant::from_resource_type)
            .ok_or_else(|| ValidationErrors::field(RESOURCE_TYPE_FIELD, "Invalid resourcetype")),
    }
}

/// Creates a project of the variant named in the body. The requesting user,
/// when known, always becomes a member.
pub async fn create_project<S: ProjectStore + ?Sized>(
    store: &S,
    ctx: &RequestContext,
    payload: Value,
) -> ServiceResult<ProjectRepr> {
    let serializer = ProjectSerializer::new(variant_from_payload(&payload)?);
    let Parsed { value, errors } = serializer.parse(payload)?;
    let mut new_project = errors.merge(serializer.build(value))?;

    if let Some(user) = ctx.user {
        if !new_project.users.contains(&user) {
            new_project.users.push(user);
        }
    }

    let project = store.create_project(new_project).await?;
    log::info!(
        "Created {} {} '{}'",
        project.resource_type,
        project.id,
        project.name
    );
    serialize_project(&project)
}

/// Partial update dispatched on the stored variant. A discriminator in the
/// body must name that same variant.
pub async fn update_project<S: ProjectStore + ?Sized>(
    store: &S,
    mut project: Project,
    payload: Value,
) -> ServiceResult<ProjectRepr> {
    let serializer = ProjectSerializer::for_project(&project)?;

    if payload.get(RESOURCE_TYPE_FIELD).is_some() {
        let requested = variant_from_payload(&payload)?;
        if requested != serializer.variant() {
            return Err(
                ValidationErrors::field(RESOURCE_TYPE_FIELD, "Invalid resourcetype").into(),
            );
        }
    }

    let Parsed { value, errors } = serializer.parse(payload)?;
    errors.merge(serializer.apply(&mut project, value))?;

    let project = store.update_project(project).await?;
    log::info!("Updated project {}", project.id);
    Ok(serializer.to_representation(&project))
}
