pub mod annotation_transform;
pub mod document_resolver;
pub mod fields;
pub mod label_rules;
pub mod project_dispatch;

pub use annotation_transform::*;
pub use document_resolver::*;
pub use label_rules::*;
pub use project_dispatch::*;
