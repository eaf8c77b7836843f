use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

pub const NAME_MIN_LENGTH: usize = 1;
pub const NAME_MAX_LENGTH: usize = 100;

/// Validated greeting input. Unknown fields of the submitted object are dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HelloInput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueCode {
    InvalidType,
    TooSmall,
    TooBig,
}

/// A single field-level validation failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationIssue {
    pub code: IssueCode,
    pub path: Vec<String>,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub received: Option<&'static str>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minimum: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maximum: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inclusive: Option<bool>,
}

impl ValidationIssue {
    fn invalid_type(path: Vec<String>, expected: &'static str, received: &Value) -> Self {
        let received = json_type(received);
        Self {
            code: IssueCode::InvalidType,
            path,
            message: format!("Expected {expected}, received {received}"),
            expected: Some(expected),
            received: Some(received),
            kind: None,
            minimum: None,
            maximum: None,
            inclusive: None,
        }
    }

    fn too_small(path: Vec<String>, minimum: usize, message: &str) -> Self {
        Self {
            code: IssueCode::TooSmall,
            path,
            message: message.to_owned(),
            expected: None,
            received: None,
            kind: Some("string"),
            minimum: Some(minimum),
            maximum: None,
            inclusive: Some(true),
        }
    }

    fn too_big(path: Vec<String>, maximum: usize, message: &str) -> Self {
        Self {
            code: IssueCode::TooBig,
            path,
            message: message.to_owned(),
            expected: None,
            received: None,
            kind: Some("string"),
            minimum: None,
            maximum: Some(maximum),
            inclusive: Some(true),
        }
    }
}

/// All issues found while validating one input; never empty.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid input: {}", join_messages(.0))]
pub struct ValidationErrors(pub Vec<ValidationIssue>);

fn join_messages(issues: &[ValidationIssue]) -> String {
    let messages: Vec<&str> = issues.iter().map(|i| i.message.as_str()).collect();
    messages.join("; ")
}

impl HelloInput {
    /// Validate a submitted JSON document, which must be an object.
    pub fn from_json(value: &Value) -> Result<Self, ValidationErrors> {
        match value {
            Value::Object(object) => Self::from_object(object),
            other => Err(ValidationErrors(vec![ValidationIssue::invalid_type(
                Vec::new(),
                "object",
                other,
            )])),
        }
    }

    /// Validate the `name` query parameter; an absent parameter means no name was given.
    pub fn from_query(name: Option<String>) -> Result<Self, ValidationErrors> {
        let name = name
            .map(|name| validate_name(&name).map(|_| name))
            .transpose()
            .map_err(|issue| ValidationErrors(vec![issue]))?;
        Ok(Self { name })
    }

    fn from_object(object: &Map<String, Value>) -> Result<Self, ValidationErrors> {
        let name = match object.get("name") {
            None => None,
            Some(Value::String(name)) => {
                validate_name(name).map_err(|issue| ValidationErrors(vec![issue]))?;
                Some(name.clone())
            }
            Some(other) => {
                return Err(ValidationErrors(vec![ValidationIssue::invalid_type(
                    name_path(),
                    "string",
                    other,
                )]))
            }
        };
        Ok(Self { name })
    }
}

fn validate_name(name: &str) -> Result<(), ValidationIssue> {
    // Lengths are counted in UTF-16 code units, as browsers count them.
    let length = name.encode_utf16().count();
    if length < NAME_MIN_LENGTH {
        return Err(ValidationIssue::too_small(
            name_path(),
            NAME_MIN_LENGTH,
            "Name is required",
        ));
    }
    if length > NAME_MAX_LENGTH {
        return Err(ValidationIssue::too_big(
            name_path(),
            NAME_MAX_LENGTH,
            "Name too long",
        ));
    }
    Ok(())
}

fn name_path() -> Vec<String> {
    vec!["name".to_owned()]
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
