use crate::model::Id;
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: Id,
    pub project: Id,
    pub text: String,
    /// Free-form key/values attached at import time.
    pub meta: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewDocument {
    pub project: Id,
    pub text: String,
    pub meta: Map<String, Value>,
}
