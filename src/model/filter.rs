use crate::model::{AnnotationKind, Id};
use serde::{Deserialize, Serialize};

/// Selects annotations of one variant attached to a document, optionally
/// narrowed to a single owner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotationFilter {
    pub kind: AnnotationKind,
    pub document: Id,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<Id>,
}

impl AnnotationFilter {
    pub fn for_document(kind: AnnotationKind, document: Id) -> Self {
        Self {
            kind,
            document,
            user: None,
        }
    }

    pub fn owned_by(mut self, user: Option<Id>) -> Self {
        self.user = user;
        self
    }
}
