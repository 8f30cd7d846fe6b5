use crate::model::{AnnotationKind, Id, Timestamp};
use serde::{Deserialize, Serialize};

/// Task type a project is set up for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProjectType {
    DocumentClassification,
    SequenceLabeling,
    Seq2seq,
}

impl ProjectType {
    /// Wire names of every project type.
    pub const NAMES: &'static [&'static str] =
        &["DocumentClassification", "SequenceLabeling", "Seq2seq"];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectType::DocumentClassification => "DocumentClassification",
            ProjectType::SequenceLabeling => "SequenceLabeling",
            ProjectType::Seq2seq => "Seq2seq",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "DocumentClassification" => Some(ProjectType::DocumentClassification),
            "SequenceLabeling" => Some(ProjectType::SequenceLabeling),
            "Seq2seq" => Some(ProjectType::Seq2seq),
            _ => None,
        }
    }
}

/// Concrete project variant. The set is closed: every variant has a
/// representation, and the only fallible step is reading the stored
/// discriminator string back into this enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProjectVariant {
    Base,
    TextClassification,
    SequenceLabeling,
    Seq2seq,
}

impl ProjectVariant {
    pub const ALL: [ProjectVariant; 4] = [
        ProjectVariant::Base,
        ProjectVariant::TextClassification,
        ProjectVariant::SequenceLabeling,
        ProjectVariant::Seq2seq,
    ];

    /// Discriminator value as persisted and as sent on the wire (`resourcetype`).
    pub fn resource_type(&self) -> &'static str {
        match self {
            ProjectVariant::Base => "Project",
            ProjectVariant::TextClassification => "TextClassificationProject",
            ProjectVariant::SequenceLabeling => "SequenceLabelingProject",
            ProjectVariant::Seq2seq => "Seq2seqProject",
        }
    }

    pub fn from_resource_type(value: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|variant| variant.resource_type() == value)
    }

    /// Annotation variant stored for documents of this project. The base
    /// variant has none.
    pub fn annotation_kind(&self) -> Option<AnnotationKind> {
        match self {
            ProjectVariant::Base => None,
            ProjectVariant::TextClassification => Some(AnnotationKind::Classification),
            ProjectVariant::SequenceLabeling => Some(AnnotationKind::SequenceLabeling),
            ProjectVariant::Seq2seq => Some(AnnotationKind::Seq2seq),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Project {
    pub id: Id,
    pub name: String,
    pub description: String,
    pub guideline: String,
    pub users: Vec<Id>,
    pub project_type: ProjectType,
    /// Stored discriminator. Kept as the raw string so that rows written by a
    /// newer deployment still load and fail at dispatch instead of at read.
    pub resource_type: String,
    pub image: Option<String>,
    pub updated_at: Timestamp,
}

impl Project {
    pub fn variant(&self) -> Option<ProjectVariant> {
        ProjectVariant::from_resource_type(&self.resource_type)
    }

    pub fn has_member(&self, user: Id) -> bool {
        self.users.contains(&user)
    }
}

/// Input model for inserting a project; the store assigns `id` and `updated_at`.
#[derive(Debug, Clone, PartialEq)]
pub struct NewProject {
    pub name: String,
    pub description: String,
    pub guideline: String,
    pub users: Vec<Id>,
    pub project_type: ProjectType,
    pub resource_type: String,
    pub image: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_type_table_is_reversible() {
        for variant in ProjectVariant::ALL {
            assert_eq!(
                ProjectVariant::from_resource_type(variant.resource_type()),
                Some(variant)
            );
        }
        assert_eq!(ProjectVariant::from_resource_type("ImageProject"), None);
    }

    #[test]
    fn test_project_type_serde_names() {
        let json = serde_json::to_string(&ProjectType::Seq2seq).unwrap();
        assert_eq!(json, "\"Seq2seq\"");
        let parsed: ProjectType = serde_json::from_str("\"SequenceLabeling\"").unwrap();
        assert_eq!(parsed, ProjectType::SequenceLabeling);
        assert_eq!(ProjectType::parse(parsed.as_str()), Some(parsed));
    }

    #[test]
    fn test_base_variant_has_no_annotation_kind() {
        assert_eq!(ProjectVariant::Base.annotation_kind(), None);
        assert_eq!(
            ProjectVariant::SequenceLabeling.annotation_kind(),
            Some(AnnotationKind::SequenceLabeling)
        );
    }
}
