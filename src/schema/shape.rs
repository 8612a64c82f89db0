//! Type shapes and their JSON-schema rendering.
//!
//! A [`TypeShape`] is the structural description of one parameter or return
//! value. The same value drives both the published schema document and the
//! runtime validator, so the two can never disagree.

use serde::Serialize;
use serde_json::{json, Map, Value};

use super::Describe;

/// Primitive scalar kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScalarKind {
    String,
    Integer,
    Number,
    Boolean,
    Null,
}

impl ScalarKind {
    /// Schema name of this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            ScalarKind::String => "string",
            ScalarKind::Integer => "integer",
            ScalarKind::Number => "number",
            ScalarKind::Boolean => "boolean",
            ScalarKind::Null => "null",
        }
    }

    /// Most specific scalar kind of a JSON value, if it is a scalar.
    pub fn of(value: &Value) -> Option<Self> {
        match value {
            Value::String(_) => Some(ScalarKind::String),
            Value::Number(n) if n.is_f64() => Some(ScalarKind::Number),
            Value::Number(_) => Some(ScalarKind::Integer),
            Value::Bool(_) => Some(ScalarKind::Boolean),
            Value::Null => Some(ScalarKind::Null),
            Value::Array(_) | Value::Object(_) => None,
        }
    }
}

/// External-resource parameter kinds. The wire value is always a path string;
/// the validator materializes it before the handler runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ResourceKind {
    /// Path passed through unchanged.
    FilePath,
    /// Decoded into sample rate plus sample buffer.
    Audio,
    /// Decoded into an in-memory RGBA image.
    Image,
}

impl ResourceKind {
    /// Value of the `format` keyword in the schema.
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::FilePath => "file-path",
            ResourceKind::Audio => "audio",
            ResourceKind::Image => "image",
        }
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One declared field of a record shape.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldShape {
    pub name: String,
    pub shape: TypeShape,
    pub default: Option<Value>,
    pub description: Option<String>,
}

/// Nested structured record (a named set of typed fields).
#[derive(Debug, Clone, PartialEq)]
pub struct RecordShape {
    pub name: String,
    pub fields: Vec<FieldShape>,
}

impl RecordShape {
    /// Start an empty record.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            fields: Vec::new(),
        }
    }

    /// Add a required field typed by `T`.
    pub fn field<T: Describe + ?Sized>(self, name: &str) -> Self {
        self.field_shape(name, T::shape())
    }

    /// Add an optional field typed by `T` with a default.
    pub fn field_default<T: Describe + ?Sized>(mut self, name: &str, default: impl Into<Value>) -> Self {
        self.fields.push(FieldShape {
            name: name.to_string(),
            shape: T::shape(),
            default: Some(default.into()),
            description: None,
        });
        self
    }

    /// Add a required field with an explicit shape.
    pub fn field_shape(mut self, name: &str, shape: TypeShape) -> Self {
        self.fields.push(FieldShape {
            name: name.to_string(),
            shape,
            default: None,
            description: None,
        });
        self
    }

    /// Attach a description to the most recently added field.
    pub fn describe(mut self, text: &str) -> Self {
        if let Some(last) = self.fields.last_mut() {
            last.description = Some(text.to_string());
        }
        self
    }

    /// Names of fields without a default, in declaration order.
    pub fn required(&self) -> Vec<&str> {
        self.fields
            .iter()
            .filter(|f| f.default.is_none())
            .map(|f| f.name.as_str())
            .collect()
    }
}

/// Structural description of a value.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeShape {
    Scalar(ScalarKind),
    Array(Box<TypeShape>),
    /// String-keyed mapping; the box is the value shape.
    Map(Box<TypeShape>),
    Optional(Box<TypeShape>),
    Union(Vec<TypeShape>),
    Literal(Vec<Value>),
    Record(RecordShape),
    Resource(ResourceKind),
    /// Unannotated or unresolvable. Accepts anything.
    Opaque,
}

impl TypeShape {
    pub fn string() -> Self {
        TypeShape::Scalar(ScalarKind::String)
    }

    pub fn integer() -> Self {
        TypeShape::Scalar(ScalarKind::Integer)
    }

    pub fn number() -> Self {
        TypeShape::Scalar(ScalarKind::Number)
    }

    pub fn boolean() -> Self {
        TypeShape::Scalar(ScalarKind::Boolean)
    }

    pub fn null() -> Self {
        TypeShape::Scalar(ScalarKind::Null)
    }

    pub fn array(element: TypeShape) -> Self {
        TypeShape::Array(Box::new(element))
    }

    pub fn map(value: TypeShape) -> Self {
        TypeShape::Map(Box::new(value))
    }

    /// Optional-of-`inner`. Nested optionals collapse.
    pub fn optional(inner: TypeShape) -> Self {
        match inner {
            TypeShape::Optional(_) => inner,
            other => TypeShape::Optional(Box::new(other)),
        }
    }

    /// Union of branches in declaration order.
    ///
    /// A branch that is `null` marks the union as optional: the remaining
    /// branches are wrapped in [`TypeShape::Optional`]. A single remaining
    /// branch is unwrapped.
    pub fn union(branches: Vec<TypeShape>) -> Self {
        let total = branches.len();
        let concrete: Vec<TypeShape> = branches
            .into_iter()
            .filter(|b| *b != TypeShape::null())
            .collect();
        let nullable = concrete.len() < total;

        let inner = match concrete.len() {
            0 => return TypeShape::null(),
            1 => concrete.into_iter().next().unwrap_or(TypeShape::Opaque),
            _ => TypeShape::Union(concrete),
        };

        if nullable {
            TypeShape::optional(inner)
        } else {
            inner
        }
    }

    /// Enumerated literal values.
    pub fn literal<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        TypeShape::Literal(values.into_iter().map(Into::into).collect())
    }

    pub fn record(record: RecordShape) -> Self {
        TypeShape::Record(record)
    }

    /// Resource kind of this shape, looking through one optional layer.
    pub fn resource_kind(&self) -> Option<ResourceKind> {
        match self {
            TypeShape::Resource(kind) => Some(*kind),
            TypeShape::Optional(inner) => match inner.as_ref() {
                TypeShape::Resource(kind) => Some(*kind),
                _ => None,
            },
            _ => None,
        }
    }

    /// Short label used in validation messages.
    pub fn label(&self) -> String {
        match self {
            TypeShape::Scalar(kind) => kind.as_str().to_string(),
            TypeShape::Array(inner) => format!("array of {}", inner.label()),
            TypeShape::Map(inner) => format!("object of {}", inner.label()),
            TypeShape::Optional(inner) => format!("{} or null", inner.label()),
            TypeShape::Union(branches) => {
                let labels: Vec<String> = branches.iter().map(TypeShape::label).collect();
                format!("one of [{}]", labels.join(", "))
            }
            TypeShape::Literal(values) => {
                let rendered: Vec<String> = values.iter().map(Value::to_string).collect();
                format!("one of {{{}}}", rendered.join(", "))
            }
            TypeShape::Record(record) => format!("object {}", record.name),
            TypeShape::Resource(kind) => format!("{} path", kind.as_str()),
            TypeShape::Opaque => "any".to_string(),
        }
    }

    /// Render as a JSON-schema fragment.
    pub fn to_json_schema(&self) -> Value {
        match self {
            TypeShape::Scalar(kind) => json!({ "type": kind.as_str() }),
            TypeShape::Array(inner) => json!({
                "type": "array",
                "items": inner.to_json_schema(),
            }),
            TypeShape::Map(inner) => json!({
                "type": "object",
                "additionalProperties": inner.to_json_schema(),
            }),
            TypeShape::Optional(inner) => optional_schema(inner),
            TypeShape::Union(branches) => json!({
                "anyOf": branches.iter().map(TypeShape::to_json_schema).collect::<Vec<_>>(),
            }),
            TypeShape::Literal(values) => literal_schema(values),
            TypeShape::Record(record) => record_schema(record),
            TypeShape::Resource(kind) => json!({
                "type": "string",
                "format": kind.as_str(),
            }),
            TypeShape::Opaque => json!({ "type": "object" }),
        }
    }
}

fn optional_schema(inner: &TypeShape) -> Value {
    let null = json!({ "type": "null" });

    if let TypeShape::Union(branches) = inner {
        // Scalar-only unions merge into one multi-kind `type` list.
        let kinds: Option<Vec<ScalarKind>> = branches
            .iter()
            .map(|b| match b {
                TypeShape::Scalar(kind) => Some(*kind),
                _ => None,
            })
            .collect();

        return match kinds {
            Some(kinds) => {
                let mut unique: Vec<ScalarKind> = Vec::with_capacity(kinds.len());
                for kind in kinds {
                    if !unique.contains(&kind) {
                        unique.push(kind);
                    }
                }
                let mut names: Vec<Value> = unique.iter().map(|k| json!(k.as_str())).collect();
                names.push(json!("null"));
                json!({ "type": names })
            }
            None => {
                let mut any: Vec<Value> = branches.iter().map(TypeShape::to_json_schema).collect();
                any.push(null);
                json!({ "anyOf": any })
            }
        };
    }

    let mut schema = inner.to_json_schema();
    let single_type = schema.get("type").and_then(Value::as_str).map(str::to_string);
    match (single_type, schema.as_object_mut()) {
        (Some(t), Some(obj)) => {
            obj.insert("type".into(), json!([t, "null"]));
            schema
        }
        _ => json!({ "anyOf": [schema, null] }),
    }
}

fn literal_schema(values: &[Value]) -> Value {
    let kinds: Vec<Option<ScalarKind>> = values.iter().map(ScalarKind::of).collect();
    let base = match kinds.first() {
        Some(Some(first)) if kinds.iter().all(|k| *k == Some(*first)) => Some(*first),
        _ => None,
    };

    match base {
        Some(kind) if kind != ScalarKind::Null => json!({
            "type": kind.as_str(),
            "enum": values,
        }),
        _ => json!({ "enum": values }),
    }
}

fn record_schema(record: &RecordShape) -> Value {
    let mut properties = Map::new();
    for field in &record.fields {
        let mut schema = field.shape.to_json_schema();
        if let Some(obj) = schema.as_object_mut() {
            if let Some(text) = &field.description {
                obj.insert("description".into(), json!(text));
            }
            if let Some(default) = &field.default {
                obj.insert("default".into(), default.clone());
            }
        }
        properties.insert(field.name.clone(), schema);
    }

    let mut schema = Map::new();
    schema.insert("title".into(), json!(record.name));
    schema.insert("type".into(), json!("object"));
    schema.insert("properties".into(), Value::Object(properties));
    let required = record.required();
    if !required.is_empty() {
        schema.insert("required".into(), json!(required));
    }
    Value::Object(schema)
}

/// Shape-independent name of a JSON value's runtime type.
pub fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Array(_) => "array",
        Value::Object(_) => "object",
        other => ScalarKind::of(other).map_or("unknown", |k| k.as_str()),
    }
}
