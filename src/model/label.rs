use crate::model::Id;
use serde::Serialize;

/// A label with an optional keyboard shortcut (`prefix_key` + `suffix_key`).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Label {
    pub id: Id,
    #[serde(skip_serializing)]
    pub project: Id,
    pub text: String,
    pub prefix_key: Option<String>,
    pub suffix_key: Option<String>,
    pub background_color: String,
    pub text_color: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewLabel {
    pub project: Id,
    pub text: String,
    pub prefix_key: Option<String>,
    pub suffix_key: Option<String>,
    pub background_color: String,
    pub text_color: String,
}

impl NewLabel {
    pub fn into_label(self, id: Id) -> Label {
        Label {
            id,
            project: self.project,
            text: self.text,
            prefix_key: self.prefix_key,
            suffix_key: self.suffix_key,
            background_color: self.background_color,
            text_color: self.text_color,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_wire_form_hides_project() {
        let label = Label {
            id: 3,
            project: 9,
            text: "PERSON".to_string(),
            prefix_key: Some("ctrl".to_string()),
            suffix_key: Some("p".to_string()),
            background_color: "#209cee".to_string(),
            text_color: "#ffffff".to_string(),
        };
        let value = serde_json::to_value(&label).unwrap();
        assert!(value.get("project").is_none());
        assert_eq!(value["suffix_key"], "p");
        assert_eq!(value["id"], 3);
    }
}
