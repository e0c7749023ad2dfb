//! Structural validation of incoming and outgoing frames.
//!
//! Schemas are static field tables checked against the parsed
//! `serde_json::Value` before anything is decoded into typed messages, so a
//! rejected frame reports every violation at once instead of the first
//! deserialization error.

use crate::message::{LogLevel, PROTOCOL_VERSION};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

/// One failed check, addressed by a JSON path such as `$.updates[0].path`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Violation {
    pub path: String,
    pub reason: String,
}

impl Violation {
    fn new(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.reason)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid message: {}", summary(.violations))]
pub struct ValidationError {
    pub violations: Vec<Violation>,
}

fn summary(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(Violation::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

enum Kind {
    String,
    Integer,
    Number,
    Boolean,
    StringArray,
    OneOf(&'static [&'static str]),
    Object(&'static ObjectSchema),
    ObjectArray(&'static ObjectSchema),
}

impl Kind {
    fn expected(&self) -> &'static str {
        match self {
            Kind::String | Kind::OneOf(_) => "a string",
            Kind::Integer => "an integer",
            Kind::Number => "a number",
            Kind::Boolean => "a boolean",
            Kind::StringArray => "an array of strings",
            Kind::Object(_) => "an object",
            Kind::ObjectArray(_) => "an array of objects",
        }
    }
}

struct Field {
    name: &'static str,
    kind: Kind,
    required: bool,
}

const fn required(name: &'static str, kind: Kind) -> Field {
    Field {
        name,
        kind,
        required: true,
    }
}

const fn optional(name: &'static str, kind: Kind) -> Field {
    Field {
        name,
        kind,
        required: false,
    }
}

type Rule = fn(&Map<String, Value>, &str, &mut Vec<Violation>);

struct ObjectSchema {
    fields: &'static [Field],
    rule: Option<Rule>,
}

/// Schema with field checks only.
macro_rules! fields {
    ([$($field:expr),* $(,)?]) => {
        ObjectSchema {
            fields: &[$($field),*],
            rule: None,
        }
    };
}

static ENVELOPE: ObjectSchema = fields!([
    required("protocolVersion", Kind::String),
    required("messageType", Kind::String),
]);

static FILE_CONTENT: ObjectSchema = fields!([
    required("type", Kind::OneOf(&["base64"])),
    required("base64", Kind::String),
    required("originalEncoding", Kind::String),
]);

static FILE_UPDATE: ObjectSchema = ObjectSchema {
    fields: &[
        required(
            "action",
            Kind::OneOf(&["create", "update", "delete", "rename"]),
        ),
        required("path", Kind::String),
        optional("newPath", Kind::String),
        optional("content", Kind::Object(&FILE_CONTENT)),
    ],
    rule: Some(file_update_rule),
};

/// `rename` needs a target; `create` and `update` need content.
fn file_update_rule(object: &Map<String, Value>, path: &str, out: &mut Vec<Violation>) {
    let Some(action) = object.get("action").and_then(Value::as_str) else {
        return;
    };
    let needs = match action {
        "rename" => "newPath",
        "create" | "update" => "content",
        _ => return,
    };
    if !object.contains_key(needs) {
        out.push(Violation::new(
            format!("{path}.{needs}"),
            format!("is required for action '{action}'"),
        ));
    }
}

static START: ObjectSchema = fields!([required("capabilities", Kind::StringArray)]);
static UPDATE_FILESYSTEM: ObjectSchema =
    fields!([required("updates", Kind::ObjectArray(&FILE_UPDATE))]);
static REQUEST_PREVIEW: ObjectSchema = fields!([
    required("path", Kind::String),
    required("liveUpdate", Kind::Boolean),
]);
static SHUTDOWN: ObjectSchema = fields!([
    required("reason", Kind::String),
    required("code", Kind::Integer),
]);
static CAPABILITIES: ObjectSchema = fields!([required("capabilities", Kind::StringArray)]);
static REJECT: ObjectSchema = fields!([required("reason", Kind::String)]);
static PATH_ONLY: ObjectSchema = fields!([required("path", Kind::String)]);
static PREVIEW_PROGRESS: ObjectSchema = fields!([
    required("path", Kind::String),
    required("progress", Kind::Number),
    required("message", Kind::String),
]);
static PREVIEW_COMPLETE: ObjectSchema = fields!([
    required("path", Kind::String),
    required("html", Kind::String),
]);
static PREVIEW_FAIL: ObjectSchema = fields!([
    required("path", Kind::String),
    required("reason", Kind::String),
]);
static LOG: ObjectSchema = fields!([
    required("level", Kind::OneOf(&LogLevel::ALL)),
    required("message", Kind::String),
]);
static INIT_PROGRESS: ObjectSchema = fields!([
    required("rendererName", Kind::String),
    required("progress", Kind::Number),
    required("message", Kind::String),
]);

/// Message schemas keyed by protocol version and message type.
pub struct SchemaRegistry {
    versions: Vec<&'static str>,
    schemas: HashMap<String, &'static ObjectSchema>,
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        Self::v1()
    }
}

impl SchemaRegistry {
    /// Schemas for every message of protocol version `1.0`, both directions.
    pub fn v1() -> Self {
        let table: [(&str, &'static ObjectSchema); 13] = [
            ("start", &START),
            ("update_filesystem", &UPDATE_FILESYSTEM),
            ("request_preview", &REQUEST_PREVIEW),
            ("shutdown", &SHUTDOWN),
            ("init", &CAPABILITIES),
            ("acknowledge", &CAPABILITIES),
            ("reject", &REJECT),
            ("preview_acknowledge", &PATH_ONLY),
            ("preview_progress", &PREVIEW_PROGRESS),
            ("preview_complete", &PREVIEW_COMPLETE),
            ("preview_fail", &PREVIEW_FAIL),
            ("log", &LOG),
            ("init_progress", &INIT_PROGRESS),
        ];
        let schemas = table
            .into_iter()
            .map(|(name, schema)| (crate::message::handler_key(PROTOCOL_VERSION, name), schema))
            .collect();
        Self {
            versions: vec![PROTOCOL_VERSION],
            schemas,
        }
    }

    pub fn supports_version(&self, version: &str) -> bool {
        self.versions.contains(&version)
    }

    pub fn has_schema(&self, protocol_version: &str, message_type: &str) -> bool {
        self.schemas
            .contains_key(&crate::message::handler_key(protocol_version, message_type))
    }

    /// Parse `raw` and validate it. Returns the parsed value on success.
    pub fn validate_str(&self, raw: &str) -> Result<Value, ValidationError> {
        let value: Value = serde_json::from_str(raw).map_err(|err| ValidationError {
            violations: vec![Violation::new("$", format!("is not valid JSON: {err}"))],
        })?;
        self.validate(&value)?;
        Ok(value)
    }

    pub fn validate(&self, value: &Value) -> Result<(), ValidationError> {
        let mut violations = Vec::new();

        let Some(object) = value.as_object() else {
            violations.push(Violation::new("$", "must be an object"));
            return Err(ValidationError { violations });
        };

        check_object(object, &ENVELOPE, "$", &mut violations);
        if !violations.is_empty() {
            return Err(ValidationError { violations });
        }

        let version = object["protocolVersion"].as_str().unwrap_or_default();
        let message_type = object["messageType"].as_str().unwrap_or_default();
        if !self.supports_version(version) {
            violations.push(Violation::new(
                "$.protocolVersion",
                format!("unsupported protocol version '{version}'"),
            ));
            return Err(ValidationError { violations });
        }

        // Unknown types only get the envelope check.
        if let Some(schema) = self
            .schemas
            .get(&crate::message::handler_key(version, message_type))
        {
            check_object(object, schema, "$", &mut violations);
        }

        if violations.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { violations })
        }
    }
}

fn check_object(
    object: &Map<String, Value>,
    schema: &ObjectSchema,
    path: &str,
    out: &mut Vec<Violation>,
) {
    for field in schema.fields {
        let field_path = format!("{path}.{}", field.name);
        match object.get(field.name) {
            None if field.required => out.push(Violation::new(field_path, "is required")),
            None => {}
            Some(value) => check_value(value, &field.kind, &field_path, out),
        }
    }
    if let Some(rule) = schema.rule {
        rule(object, path, out);
    }
}

fn check_value(value: &Value, kind: &Kind, path: &str, out: &mut Vec<Violation>) {
    let mismatch = |out: &mut Vec<Violation>| {
        out.push(Violation::new(path, format!("must be {}", kind.expected())));
    };

    match kind {
        Kind::String if !value.is_string() => mismatch(out),
        Kind::Boolean if !value.is_boolean() => mismatch(out),
        Kind::Number if !value.is_number() => mismatch(out),
        Kind::Integer => match value.as_i64() {
            Some(n) if i32::try_from(n).is_ok() => {}
            Some(_) => out.push(Violation::new(path, "is out of range")),
            None => mismatch(out),
        },
        Kind::OneOf(allowed) => match value.as_str() {
            Some(s) if allowed.contains(&s) => {}
            Some(s) => out.push(Violation::new(
                path,
                format!("'{s}' is not one of {}", allowed.join(", ")),
            )),
            None => mismatch(out),
        },
        Kind::StringArray => match value.as_array() {
            Some(items) => {
                for (i, item) in items.iter().enumerate() {
                    if !item.is_string() {
                        out.push(Violation::new(format!("{path}[{i}]"), "must be a string"));
                    }
                }
            }
            None => mismatch(out),
        },
        Kind::Object(schema) => match value.as_object() {
            Some(object) => check_object(object, schema, path, out),
            None => mismatch(out),
        },
        Kind::ObjectArray(schema) => match value.as_array() {
            Some(items) => {
                for (i, item) in items.iter().enumerate() {
                    let item_path = format!("{path}[{i}]");
                    match item.as_object() {
                        Some(object) => check_object(object, schema, &item_path, out),
                        None => out.push(Violation::new(item_path, "must be an object")),
                    }
                }
            }
            None => mismatch(out),
        },
        _ => {}
    }
}
