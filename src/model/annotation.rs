use crate::model::Id;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnnotationKind {
    /// Whole-document classification.
    Classification,
    /// Character span tagging.
    SequenceLabeling,
    /// Free text output per document.
    Seq2seq,
}

/// Classification annotation on a whole document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentAnnotation {
    pub id: Id,
    pub prob: f64,
    pub label: Id,
    pub user: Id,
    pub document: Id,
}

/// Labeled character span `[start_offset, end_offset)` within a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequenceAnnotation {
    pub id: Id,
    pub prob: f64,
    pub label: Id,
    pub start_offset: i32,
    pub end_offset: i32,
    pub user: Id,
    pub document: Id,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Seq2seqAnnotation {
    pub id: Id,
    pub text: String,
    pub user: Id,
    pub document: Id,
}

/// Any stored annotation. Serializes as the inner record's wire form.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Annotation {
    Classification(DocumentAnnotation),
    SequenceLabeling(SequenceAnnotation),
    Seq2seq(Seq2seqAnnotation),
}

impl Annotation {
    pub fn kind(&self) -> AnnotationKind {
        match self {
            Annotation::Classification(_) => AnnotationKind::Classification,
            Annotation::SequenceLabeling(_) => AnnotationKind::SequenceLabeling,
            Annotation::Seq2seq(_) => AnnotationKind::Seq2seq,
        }
    }

    pub fn id(&self) -> Id {
        match self {
            Annotation::Classification(a) => a.id,
            Annotation::SequenceLabeling(a) => a.id,
            Annotation::Seq2seq(a) => a.id,
        }
    }

    pub fn user(&self) -> Id {
        match self {
            Annotation::Classification(a) => a.user,
            Annotation::SequenceLabeling(a) => a.user,
            Annotation::Seq2seq(a) => a.user,
        }
    }

    pub fn document(&self) -> Id {
        match self {
            Annotation::Classification(a) => a.document,
            Annotation::SequenceLabeling(a) => a.document,
            Annotation::Seq2seq(a) => a.document,
        }
    }
}

/// Validated annotation ready for insertion; the store assigns the id.
#[derive(Debug, Clone, PartialEq)]
pub enum NewAnnotation {
    Classification {
        prob: f64,
        label: Id,
        user: Id,
        document: Id,
    },
    SequenceLabeling {
        prob: f64,
        label: Id,
        start_offset: i32,
        end_offset: i32,
        user: Id,
        document: Id,
    },
    Seq2seq {
        text: String,
        user: Id,
        document: Id,
    },
}

impl NewAnnotation {
    pub fn kind(&self) -> AnnotationKind {
        match self {
            NewAnnotation::Classification { .. } => AnnotationKind::Classification,
            NewAnnotation::SequenceLabeling { .. } => AnnotationKind::SequenceLabeling,
            NewAnnotation::Seq2seq { .. } => AnnotationKind::Seq2seq,
        }
    }

    pub fn into_annotation(self, id: Id) -> Annotation {
        match self {
            NewAnnotation::Classification {
                prob,
                label,
                user,
                document,
            } => Annotation::Classification(DocumentAnnotation {
                id,
                prob,
                label,
                user,
                document,
            }),
            NewAnnotation::SequenceLabeling {
                prob,
                label,
                start_offset,
                end_offset,
                user,
                document,
            } => Annotation::SequenceLabeling(SequenceAnnotation {
                id,
                prob,
                label,
                start_offset,
                end_offset,
                user,
                document,
            }),
            NewAnnotation::Seq2seq {
                text,
                user,
                document,
            } => Annotation::Seq2seq(Seq2seqAnnotation { id, text, user, document }),
        }
    }
}
