use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};

use crate::error::{ValidationErrors, REQUIRED};
use crate::model::Id;

pub const BLANK: &str = "This field may not be blank.";
pub const NOT_NULL: &str = "This field may not be null.";

/// Shape a writable field must have on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    /// 32-bit integer.
    Integer,
    Float,
    /// Reference to another record by id.
    PrimaryKey,
    PrimaryKeyList,
    Choice(&'static [&'static str]),
    Object,
}

/// One writable field of a write model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    pub name: &'static str,
    pub kind: FieldKind,
    pub nullable: bool,
}

impl Field {
    pub const fn new(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            nullable: false,
        }
    }

    pub const fn nullable(self) -> Self {
        Self {
            nullable: true,
            ..self
        }
    }

    /// Checks `value` against this field's shape, returning the message to
    /// report when it does not fit.
    pub fn check(&self, value: &Value) -> Result<(), String> {
        if value.is_null() {
            return if self.nullable {
                Ok(())
            } else {
                Err(NOT_NULL.to_string())
            };
        }

        match self.kind {
            FieldKind::Text if value.is_string() => Ok(()),
            FieldKind::Text => Err("Not a valid string.".to_string()),
            FieldKind::Integer => match value.as_i64() {
                Some(n) if n > i32::MAX as i64 => Err(format!(
                    "Ensure this value is less than or equal to {}.",
                    i32::MAX
                )),
                Some(n) if n < i32::MIN as i64 => Err(format!(
                    "Ensure this value is greater than or equal to {}.",
                    i32::MIN
                )),
                Some(_) => Ok(()),
                None => Err("A valid integer is required.".to_string()),
            },
            FieldKind::Float if value.is_number() => Ok(()),
            FieldKind::Float => Err("A valid number is required.".to_string()),
            FieldKind::PrimaryKey => check_pk(value),
            FieldKind::PrimaryKeyList => match value.as_array() {
                Some(items) => items.iter().try_for_each(check_pk),
                None => Err(format!(
                    "Expected a list of items but got type \"{}\".",
                    type_name(value)
                )),
            },
            FieldKind::Choice(choices) => match value.as_str() {
                Some(choice) if choices.contains(&choice) => Ok(()),
                Some(choice) => Err(format!("\"{}\" is not a valid choice.", choice)),
                None => Err(format!("\"{}\" is not a valid choice.", value)),
            },
            FieldKind::Object if value.is_object() => Ok(()),
            FieldKind::Object => Err(format!(
                "Expected a dictionary of items but got type \"{}\".",
                type_name(value)
            )),
        }
    }
}

fn check_pk(value: &Value) -> Result<(), String> {
    match value.as_i64() {
        Some(_) => Ok(()),
        None => Err(format!(
            "Incorrect type. Expected pk value, received {}.",
            type_name(value)
        )),
    }
}

/// Name of a JSON value's type as reported back to API clients.
pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "NoneType",
        Value::Bool(_) => "bool",
        Value::Number(n) if n.is_f64() => "float",
        Value::Number(_) => "int",
        Value::String(_) => "str",
        Value::Array(_) => "list",
        Value::Object(_) => "dict",
    }
}

/// A request body checked field by field.
#[derive(Debug)]
pub struct Parsed<T> {
    /// The write model. Fields that failed their check are left unset.
    pub value: T,
    /// One entry per rejected field.
    pub errors: ValidationErrors,
}

/// Deserializes a request body into a typed write model.
///
/// A body that is not an object is rejected outright. Otherwise every field
/// in `fields` is checked on its own, so each bad field is reported under its
/// own key and the rest of the body is still read. Keys outside `fields` are
/// ignored.
pub fn parse_payload<T: DeserializeOwned>(
    payload: Value,
    fields: &[Field],
) -> Result<Parsed<T>, ValidationErrors> {
    let body = match payload {
        Value::Object(body) => body,
        other => {
            return Err(ValidationErrors::non_field(format!(
                "Invalid data. Expected a dictionary, but got {}.",
                type_name(&other)
            )))
        }
    };

    let mut errors = ValidationErrors::new();
    let mut accepted = Map::new();
    for field in fields {
        let Some(value) = body.get(field.name) else {
            continue;
        };
        match field.check(value) {
            Ok(()) => {
                accepted.insert(field.name.to_string(), value.clone());
            }
            Err(message) => errors.add(field.name, message),
        }
    }

    let value = serde_json::from_value(Value::Object(accepted)).map_err(|e| {
        log::warn!("Checked payload still failed to deserialize: {}", e);
        ValidationErrors::non_field("Invalid data.")
    })?;
    Ok(Parsed { value, errors })
}

/// For `Option<Option<T>>` fields: `None` when the key is absent,
/// `Some(None)` when it is present and null.
pub fn deserialize_present<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Records a "required" error when `value` is missing, unless the field was
/// already rejected for another reason.
pub fn require<T>(errors: &mut ValidationErrors, field: &str, value: Option<T>) -> Option<T> {
    if value.is_none() && errors.get(field).is_none() {
        errors.add(field, REQUIRED);
    }
    value
}

/// Required, non-blank text no longer than `max_len` characters.
pub fn require_text(
    errors: &mut ValidationErrors,
    field: &str,
    value: Option<String>,
    max_len: usize,
) -> Option<String> {
    let value = require(errors, field, value)?;
    check_text(errors, field, value, max_len)
}

/// Blank and length checks for a text value that was supplied.
pub fn check_text(
    errors: &mut ValidationErrors,
    field: &str,
    value: String,
    max_len: usize,
) -> Option<String> {
    if value.trim().is_empty() {
        errors.add(field, BLANK);
        return None;
    }
    if value.chars().count() > max_len {
        errors.add(
            field,
            format!("Ensure this field has no more than {} characters.", max_len),
        );
        return None;
    }
    Some(value)
}

pub fn invalid_pk(pk: Id) -> String {
    format!("Invalid pk \"{}\" - object does not exist.", pk)
}
