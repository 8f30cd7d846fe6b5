use serde::Deserialize;
use serde_json::Value;

use crate::error::{ServiceResult, ValidationErrors};
use crate::logic::fields::{
    check_text, deserialize_present, parse_payload, require_text, Field, FieldKind, Parsed,
};
use crate::model::{
    non_empty, Id, Label, NewLabel, DEFAULT_BACKGROUND_COLOR, DEFAULT_TEXT_COLOR,
};
use crate::store::traits::LabelStore;

pub const MISSING_SUFFIX_KEY: &str = "Shortcut key may not have a suffix key.";
pub const DUPLICATE_KEY: &str = "Duplicate key.";

const TEXT_MAX_LEN: usize = 100;

const WRITE_FIELDS: &[Field] = &[
    Field::new("text", FieldKind::Text),
    Field::new("prefix_key", FieldKind::Text).nullable(),
    Field::new("suffix_key", FieldKind::Text).nullable(),
    Field::new("background_color", FieldKind::Text),
    Field::new("text_color", FieldKind::Text),
];

/// Proposed label attributes as sent by the client. Shortcut keys keep
/// "absent" apart from "null" so the shortcut rules only run when the
/// request actually touches them.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct LabelWrite {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default, deserialize_with = "deserialize_present")]
    pub prefix_key: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_present")]
    pub suffix_key: Option<Option<String>>,
    #[serde(default)]
    pub background_color: Option<String>,
    #[serde(default)]
    pub text_color: Option<String>,
}

impl LabelWrite {
    pub fn touches_shortcut(&self) -> bool {
        self.prefix_key.is_some() || self.suffix_key.is_some()
    }

    /// Prefix key the label ends up with: the submitted one if any,
    /// otherwise the one stored on `current`.
    fn prefix<'a>(&'a self, current: Option<&'a Label>) -> Option<&'a str> {
        merged_key(&self.prefix_key, current.and_then(|l| l.prefix_key.as_deref()))
    }

    fn suffix<'a>(&'a self, current: Option<&'a Label>) -> Option<&'a str> {
        merged_key(&self.suffix_key, current.and_then(|l| l.suffix_key.as_deref()))
    }
}

fn merged_key<'a>(
    submitted: &'a Option<Option<String>>,
    stored: Option<&'a str>,
) -> Option<&'a str> {
    match submitted {
        Some(key) => non_empty(key.as_deref()),
        None => non_empty(stored),
    }
}

/// Shortcut-key rules for a label write.
///
/// `current` is the stored label for an update and `None` for a create. When
/// the write touches either key, both rules run on the pair the label would
/// end up with: each submitted key overrides the stored one.
///
/// The duplicate lookup always asks for labels whose prefix key is null,
/// whatever prefix the label would carry, and it is not scoped to a project.
/// The label being updated never collides with itself. It is a
/// read-then-decide check: two concurrent writes can both pass it.
pub async fn validate_shortcut<S: LabelStore + ?Sized>(
    store: &S,
    write: LabelWrite,
    current: Option<&Label>,
) -> ServiceResult<LabelWrite> {
    if !write.touches_shortcut() {
        return Ok(write);
    }

    let suffix = write.suffix(current);
    if write.prefix(current).is_some() && suffix.is_none() {
        log::debug!("Rejecting label write: prefix key without suffix key");
        return Err(ValidationErrors::non_field(MISSING_SUFFIX_KEY).into());
    }

    if let Some(suffix) = suffix {
        if store
            .unprefixed_suffix_key_exists(suffix, current.map(|l| l.id))
            .await?
        {
            log::debug!("Rejecting label write: suffix key '{}' already taken", suffix);
            return Err(ValidationErrors::non_field(DUPLICATE_KEY).into());
        }
    }

    Ok(write)
}

fn normalize_key(key: Option<String>) -> Option<String> {
    key.filter(|k| !k.is_empty())
}

/// Field-level checks for a full write, producing the record to insert.
pub fn to_new_label(project: Id, write: LabelWrite) -> Result<NewLabel, ValidationErrors> {
    let mut errors = ValidationErrors::new();
    let text = require_text(&mut errors, "text", write.text, TEXT_MAX_LEN);

    match text {
        Some(text) if errors.is_empty() => Ok(NewLabel {
            project,
            text,
            prefix_key: normalize_key(write.prefix_key.flatten()),
            suffix_key: normalize_key(write.suffix_key.flatten()),
            background_color: write
                .background_color
                .unwrap_or_else(|| DEFAULT_BACKGROUND_COLOR.to_string()),
            text_color: write
                .text_color
                .unwrap_or_else(|| DEFAULT_TEXT_COLOR.to_string()),
        }),
        _ => Err(errors),
    }
}

/// Field-level checks for a partial write, applied onto an existing label.
pub fn apply_label_write(label: &mut Label, write: LabelWrite) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::new();

    if let Some(text) = write.text {
        if let Some(text) = check_text(&mut errors, "text", text, TEXT_MAX_LEN) {
            label.text = text;
        }
    }
    if !errors.is_empty() {
        return Err(errors);
    }

    if let Some(prefix_key) = write.prefix_key {
        label.prefix_key = normalize_key(prefix_key);
    }
    if let Some(suffix_key) = write.suffix_key {
        label.suffix_key = normalize_key(suffix_key);
    }
    if let Some(color) = write.background_color {
        label.background_color = color;
    }
    if let Some(color) = write.text_color {
        label.text_color = color;
    }
    Ok(())
}

pub async fn create_label<S: LabelStore + ?Sized>(
    store: &S,
    project: Id,
    payload: Value,
) -> ServiceResult<Label> {
    let Parsed { value: write, errors } = parse_payload::<LabelWrite>(payload, WRITE_FIELDS)?;
    // Field errors win over the shortcut rules, which only see well-formed input.
    let new_label = errors.merge(to_new_label(project, write.clone()))?;
    validate_shortcut(store, write, None).await?;

    let label = store.create_label(new_label).await?;
    log::info!("Created label {} in project {}", label.id, project);
    Ok(label)
}

/// Partial update. The shortcut rules check the submitted keys together with
/// the ones already stored on `label`.
pub async fn update_label<S: LabelStore + ?Sized>(
    store: &S,
    label: Label,
    payload: Value,
) -> ServiceResult<Label> {
    let Parsed { value: write, errors } = parse_payload::<LabelWrite>(payload, WRITE_FIELDS)?;
    let mut updated = label.clone();
    errors.merge(apply_label_write(&mut updated, write.clone()))?;
    validate_shortcut(store, write, Some(&label)).await?;

    let label = store.update_label(updated).await?;
    log::info!("Updated label {}", label.id);
    Ok(label)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ServiceError, NON_FIELD_ERRORS, REQUIRED};
    use crate::store::MemoryStore;
    use serde_json::json;

    fn write(prefix: Option<Option<&str>>, suffix: Option<Option<&str>>) -> LabelWrite {
        LabelWrite {
            text: Some("PER".to_string()),
            prefix_key: prefix.map(|k| k.map(str::to_string)),
            suffix_key: suffix.map(|k| k.map(str::to_string)),
            ..LabelWrite::default()
        }
    }

    fn non_field_message(err: ServiceError) -> String {
        err.validation_errors()
            .and_then(|e| e.get(NON_FIELD_ERRORS))
            .map(|m| m[0].clone())
            .expect("expected a non-field validation error")
    }

    async fn store_with_label(prefix: Option<&str>, suffix: Option<&str>) -> MemoryStore {
        let store = MemoryStore::new();
        store
            .create_label(NewLabel {
                project: 1,
                text: "ORG".to_string(),
                prefix_key: prefix.map(str::to_string),
                suffix_key: suffix.map(str::to_string),
                background_color: DEFAULT_BACKGROUND_COLOR.to_string(),
                text_color: DEFAULT_TEXT_COLOR.to_string(),
            })
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn test_prefix_without_suffix_is_rejected() {
        let store = MemoryStore::new();
        for suffix in [None, Some(None), Some(Some(""))] {
            let err = validate_shortcut(&store, write(Some(Some("ctrl")), suffix), None)
                .await
                .unwrap_err();
            assert_eq!(non_field_message(err), MISSING_SUFFIX_KEY);
        }
    }

    #[tokio::test]
    async fn test_duplicate_unprefixed_suffix_is_rejected() {
        let store = store_with_label(None, Some("x")).await;
        let err = validate_shortcut(&store, write(Some(None), Some(Some("x"))), None)
            .await
            .unwrap_err();
        assert_eq!(non_field_message(err), DUPLICATE_KEY);
    }

    // The lookup ignores the incoming prefix: "ctrl+x" still collides with an
    // existing bare "x".
    #[tokio::test]
    async fn test_duplicate_check_ignores_new_prefix_key() {
        let store = store_with_label(None, Some("x")).await;
        let err = validate_shortcut(&store, write(Some(Some("ctrl")), Some(Some("x"))), None)
            .await
            .unwrap_err();
        assert_eq!(non_field_message(err), DUPLICATE_KEY);
    }

    // ...and an existing "shift+x" never blocks anything, not even another "shift+x".
    #[tokio::test]
    async fn test_prefixed_existing_key_never_collides() {
        let store = store_with_label(Some("shift"), Some("x")).await;
        let ok = validate_shortcut(&store, write(Some(Some("shift")), Some(Some("x"))), None)
            .await;
        assert!(ok.is_ok());
    }

    #[tokio::test]
    async fn test_writes_without_shortcut_keys_skip_rules() {
        let store = store_with_label(None, Some("x")).await;
        let untouched = LabelWrite {
            text: Some("ANY".to_string()),
            ..LabelWrite::default()
        };
        let result = validate_shortcut(&store, untouched.clone(), None).await.unwrap();
        assert_eq!(result, untouched);
    }

    #[tokio::test]
    async fn test_null_keys_do_not_trigger_lookup() {
        let store = store_with_label(None, None).await;
        let result = validate_shortcut(&store, write(Some(None), Some(None)), None).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_create_label_requires_text_before_shortcut_rules() {
        let store = MemoryStore::new();
        let err = create_label(&store, 1, json!({"prefix_key": "ctrl"}))
            .await
            .unwrap_err();
        let errors = err.validation_errors().unwrap();
        assert_eq!(errors.get("text").unwrap(), [REQUIRED]);
        assert!(errors.get(NON_FIELD_ERRORS).is_none());
    }

    #[tokio::test]
    async fn test_create_label_applies_defaults() {
        let store = MemoryStore::new();
        let label = create_label(&store, 4, json!({"text": "LOC", "suffix_key": "l"}))
            .await
            .unwrap();
        assert_eq!(label.project, 4);
        assert_eq!(label.prefix_key, None);
        assert_eq!(label.suffix_key.as_deref(), Some("l"));
        assert_eq!(label.background_color, DEFAULT_BACKGROUND_COLOR);
        assert_eq!(label.text_color, DEFAULT_TEXT_COLOR);

        let err = create_label(&store, 5, json!({"text": "LAW", "suffix_key": "l"}))
            .await
            .unwrap_err();
        assert_eq!(non_field_message(err), DUPLICATE_KEY);
    }

    #[tokio::test]
    async fn test_update_label_keeps_unsent_fields() {
        let store = MemoryStore::new();
        let label = create_label(&store, 1, json!({"text": "LOC", "suffix_key": "l"}))
            .await
            .unwrap();

        let updated = update_label(&store, label.clone(), json!({"text_color": "#000000"}))
            .await
            .unwrap();
        assert_eq!(updated.text, "LOC");
        assert_eq!(updated.suffix_key.as_deref(), Some("l"));
        assert_eq!(updated.text_color, "#000000");

        let cleared = update_label(&store, updated, json!({"suffix_key": null}))
            .await
            .unwrap();
        assert_eq!(cleared.suffix_key, None);
    }

    #[tokio::test]
    async fn test_update_label_rejects_blank_text() {
        let store = MemoryStore::new();
        let label = create_label(&store, 1, json!({"text": "LOC"})).await.unwrap();
        let err = update_label(&store, label, json!({"text": ""}))
            .await
            .unwrap_err();
        assert!(err.validation_errors().unwrap().get("text").is_some());
    }

    #[tokio::test]
    async fn test_clearing_prefix_checks_stored_suffix_for_duplicates() {
        let store = store_with_label(None, Some("x")).await;
        let prefixed = store
            .create_label(NewLabel {
                project: 2,
                text: "PER".to_string(),
                prefix_key: Some("ctrl".to_string()),
                suffix_key: Some("x".to_string()),
                background_color: DEFAULT_BACKGROUND_COLOR.to_string(),
                text_color: DEFAULT_TEXT_COLOR.to_string(),
            })
            .await
            .unwrap();

        let err = update_label(&store, prefixed.clone(), json!({"prefix_key": null}))
            .await
            .unwrap_err();
        assert_eq!(non_field_message(err), DUPLICATE_KEY);

        let stored = store.get_label(prefixed.id).await.unwrap().unwrap();
        assert_eq!(stored.prefix_key.as_deref(), Some("ctrl"));
    }

    #[tokio::test]
    async fn test_adding_prefix_uses_stored_suffix() {
        let store = MemoryStore::new();
        let label = create_label(&store, 1, json!({"text": "LOC", "suffix_key": "x"}))
            .await
            .unwrap();

        let updated = update_label(&store, label, json!({"prefix_key": "ctrl"}))
            .await
            .unwrap();
        assert_eq!(updated.prefix_key.as_deref(), Some("ctrl"));
        assert_eq!(updated.suffix_key.as_deref(), Some("x"));

        let keyless = create_label(&store, 1, json!({"text": "ORG"})).await.unwrap();
        let err = update_label(&store, keyless, json!({"prefix_key": "ctrl"}))
            .await
            .unwrap_err();
        assert_eq!(non_field_message(err), MISSING_SUFFIX_KEY);
    }

    #[tokio::test]
    async fn test_resending_own_suffix_is_not_a_duplicate() {
        let store = MemoryStore::new();
        let label = create_label(&store, 1, json!({"text": "LOC", "suffix_key": "x"}))
            .await
            .unwrap();
        let updated = update_label(&store, label, json!({"text": "LOCATION", "suffix_key": "x"}))
            .await
            .unwrap();
        assert_eq!(updated.text, "LOCATION");
    }

    #[tokio::test]
    async fn test_wrong_typed_keys_are_reported_per_field() {
        let store = MemoryStore::new();
        let err = create_label(&store, 1, json!({"text": 7, "suffix_key": ["x"]}))
            .await
            .unwrap_err();
        let errors = err.validation_errors().unwrap();
        assert_eq!(errors.get("text").unwrap(), ["Not a valid string."]);
        assert_eq!(errors.get("suffix_key").unwrap(), ["Not a valid string."]);
        assert!(errors.get(NON_FIELD_ERRORS).is_none());
    }
}
