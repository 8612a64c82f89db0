//! Validate module - argument checking and coercion.
//!
//! Provides:
//! - [`validate_and_coerce`] - turns a raw argument object into [`Args`]
//! - [`Materializer`] - loads external-resource parameters from disk
//! - [`Args`] - the coerced bag handed to handlers

mod args;
mod resource;

pub use args::{Arg, Args};
pub use resource::{
    AudioBackend, AudioClip, FilePath, ImageBackend, ImageFrame, Materializer, Resource,
    ResourceError, KNOWN_AUDIO_BACKENDS, KNOWN_IMAGE_BACKENDS,
};

#[cfg(feature = "wav")]
pub use resource::HoundBackend;
#[cfg(feature = "images")]
pub use resource::RasterBackend;

use serde_json::{Map, Number, Value};
use thiserror::Error;

use crate::schema::{value_kind, EndpointSchema, ScalarKind, TypeShape};

/// Argument validation failures. Each names the offending parameter.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ArgumentError {
    /// A required parameter is absent.
    #[error("missing required parameter '{parameter}'")]
    Missing { parameter: String },

    /// A value does not match its declared shape.
    #[error("invalid value for parameter '{parameter}': {reason}")]
    Validation { parameter: String, reason: String },

    /// A resource parameter could not be materialized.
    #[error("parameter '{parameter}': {source}")]
    Resource {
        parameter: String,
        #[source]
        source: ResourceError,
    },
}

impl ArgumentError {
    /// Name of the offending parameter.
    pub fn parameter(&self) -> &str {
        match self {
            ArgumentError::Missing { parameter }
            | ArgumentError::Validation { parameter, .. }
            | ArgumentError::Resource { parameter, .. } => parameter,
        }
    }
}

/// Validate `raw` against `schema`, fill defaults and materialize resources.
///
/// Unknown keys in `raw` are ignored. Defaults are used as recorded, without
/// coercion.
pub fn validate_and_coerce(
    schema: &EndpointSchema,
    raw: &Map<String, Value>,
    materializer: &Materializer,
) -> Result<Args, ArgumentError> {
    let mut args = Args::new();

    for param in &schema.input.params {
        let value = match raw.get(&param.name) {
            Some(value) => value,
            None => match &param.default {
                Some(default) => {
                    args.insert(&param.name, Arg::Value(default.clone()));
                    continue;
                }
                None => {
                    return Err(ArgumentError::Missing {
                        parameter: param.name.clone(),
                    })
                }
            },
        };

        let coerced = coerce(&param.shape, value).map_err(|reason| ArgumentError::Validation {
            parameter: param.name.clone(),
            reason,
        })?;

        let arg = match (param.shape.resource_kind(), &coerced) {
            (Some(kind), Value::String(path)) => {
                let resource = materializer.materialize(kind, path).map_err(|source| {
                    ArgumentError::Resource {
                        parameter: param.name.clone(),
                        source,
                    }
                })?;
                Arg::Resource(resource)
            }
            _ => Arg::Value(coerced),
        };
        args.insert(&param.name, arg);
    }

    Ok(args)
}

fn mismatch(shape: &TypeShape, value: &Value) -> String {
    format!("expected {}, got {}", shape.label(), value_kind(value))
}

/// Check `value` against `shape`, returning the coerced value or a reason.
pub fn coerce(shape: &TypeShape, value: &Value) -> Result<Value, String> {
    match shape {
        TypeShape::Opaque => Ok(value.clone()),
        TypeShape::Scalar(kind) => coerce_scalar(*kind, value).ok_or_else(|| mismatch(shape, value)),
        TypeShape::Resource(_) => match value {
            Value::String(_) => Ok(value.clone()),
            _ => Err(mismatch(shape, value)),
        },
        TypeShape::Array(element) => {
            let items = value.as_array().ok_or_else(|| mismatch(shape, value))?;
            items
                .iter()
                .enumerate()
                .map(|(i, item)| coerce(element, item).map_err(|r| format!("item {i}: {r}")))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array)
        }
        TypeShape::Map(inner) => {
            let entries = value.as_object().ok_or_else(|| mismatch(shape, value))?;
            entries
                .iter()
                .map(|(k, v)| {
                    coerce(inner, v)
                        .map(|v| (k.clone(), v))
                        .map_err(|r| format!("key '{k}': {r}"))
                })
                .collect::<Result<Map<_, _>, _>>()
                .map(Value::Object)
        }
        TypeShape::Optional(inner) => match value {
            Value::Null => Ok(Value::Null),
            _ => coerce(inner, value).map_err(|_| mismatch(shape, value)),
        },
        TypeShape::Union(branches) => branches
            .iter()
            .find_map(|b| coerce(b, value).ok())
            .ok_or_else(|| mismatch(shape, value)),
        TypeShape::Literal(values) => {
            if values.contains(value) {
                Ok(value.clone())
            } else {
                Err(format!("expected {}, got {}", shape.label(), value))
            }
        }
        TypeShape::Record(record) => {
            let fields = value.as_object().ok_or_else(|| mismatch(shape, value))?;
            let mut out = fields.clone();
            for field in &record.fields {
                match (fields.get(&field.name), &field.default) {
                    (Some(v), _) => {
                        let coerced = coerce(&field.shape, v)
                            .map_err(|r| format!("field '{}': {r}", field.name))?;
                        out.insert(field.name.clone(), coerced);
                    }
                    (None, Some(default)) => {
                        out.insert(field.name.clone(), default.clone());
                    }
                    (None, None) => return Err(format!("missing field '{}'", field.name)),
                }
            }
            Ok(Value::Object(out))
        }
    }
}

const I64_UPPER_BOUND: f64 = 9_223_372_036_854_775_808.0;

fn coerce_scalar(kind: ScalarKind, value: &Value) -> Option<Value> {
    match (kind, value) {
        (ScalarKind::String, Value::String(_))
        | (ScalarKind::Boolean, Value::Bool(_))
        | (ScalarKind::Null, Value::Null)
        | (ScalarKind::Number, Value::Number(_)) => Some(value.clone()),
        (ScalarKind::Integer, Value::Number(n)) => {
            if n.is_i64() || n.is_u64() {
                return Some(value.clone());
            }
            // Integral floats such as 3.0 are accepted as integers. The
            // upper bound is 2^63 exclusive; `i64::MAX as f64` rounds up to it.
            let f = n.as_f64()?;
            if f.fract() == 0.0 && f >= i64::MIN as f64 && f < I64_UPPER_BOUND {
                Some(Value::Number(Number::from(f as i64)))
            } else {
                None
            }
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{derive, EndpointDecl, ParamDecl, RecordShape, ResourceKind};
    use serde_json::json;

    fn schema(params: Vec<(&str, TypeShape, Option<Value>)>) -> EndpointSchema {
        derive(&EndpointDecl {
            name: "test".into(),
            params: params
                .into_iter()
                .map(|(name, shape, default)| ParamDecl {
                    name: name.into(),
                    shape: Some(shape),
                    default,
                })
                .collect(),
            ..Default::default()
        })
    }

    fn obj(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_missing_required() {
        let s = schema(vec![
            ("a", TypeShape::number(), None),
            ("b", TypeShape::number(), None),
        ]);
        let err = validate_and_coerce(&s, &obj(json!({"a": 1})), &Materializer::empty()).unwrap_err();
        assert_eq!(err.parameter(), "b");
        assert!(matches!(err, ArgumentError::Missing { .. }));
    }

    #[test]
    fn test_defaults_substituted_exactly() {
        let s = schema(vec![
            ("a", TypeShape::number(), None),
            ("b", TypeShape::number(), Some(json!(1.0))),
            ("mode", TypeShape::optional(TypeShape::string()), Some(Value::Null)),
        ]);
        let args = validate_and_coerce(&s, &obj(json!({"a": 10})), &Materializer::empty()).unwrap();

        assert_eq!(args.raw("b"), Some(&Arg::Value(json!(1.0))));
        assert_eq!(args.raw("mode"), Some(&Arg::Value(Value::Null)));
    }

    #[test]
    fn test_extra_keys_ignored() {
        let s = schema(vec![("a", TypeShape::integer(), None)]);
        let args = validate_and_coerce(&s, &obj(json!({"a": 1, "zzz": true})), &Materializer::empty())
            .unwrap();
        assert!(!args.contains("zzz"));
    }

    #[test]
    fn test_type_mismatch_names_both_shapes() {
        let s = schema(vec![("a", TypeShape::number(), None)]);
        let err = validate_and_coerce(&s, &obj(json!({"a": "two"})), &Materializer::empty()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid value for parameter 'a': expected number, got string"
        );
    }

    #[test]
    fn test_integer_accepts_integral_float() {
        assert_eq!(coerce(&TypeShape::integer(), &json!(3.0)), Ok(json!(3)));
        assert!(coerce(&TypeShape::integer(), &json!(3.5)).is_err());
        assert_eq!(coerce(&TypeShape::number(), &json!(3)), Ok(json!(3)));
    }

    #[test]
    fn test_integral_float_out_of_i64_range() {
        assert!(coerce(&TypeShape::integer(), &json!(9_223_372_036_854_775_808.0)).is_err());
        assert!(coerce(&TypeShape::integer(), &json!(1e300)).is_err());
        assert_eq!(
            coerce(&TypeShape::integer(), &json!(-9_223_372_036_854_775_808.0)),
            Ok(json!(i64::MIN))
        );
        assert_eq!(
            coerce(&TypeShape::integer(), &json!(9_007_199_254_740_992.0)),
            Ok(json!(9_007_199_254_740_992i64))
        );
    }

    #[test]
    fn test_containers_recurse() {
        let shape = TypeShape::array(TypeShape::integer());
        let err = coerce(&shape, &json!([1, 2, "x"])).unwrap_err();
        assert_eq!(err, "item 2: expected integer, got string");

        let shape = TypeShape::map(TypeShape::boolean());
        assert!(coerce(&shape, &json!({"a": true, "b": false})).is_ok());
        assert!(coerce(&shape, &json!({"a": 1})).unwrap_err().starts_with("key 'a'"));
    }

    #[test]
    fn test_optional_union_literal() {
        let opt = TypeShape::optional(TypeShape::integer());
        assert_eq!(coerce(&opt, &Value::Null), Ok(Value::Null));
        assert_eq!(coerce(&opt, &json!("x")).unwrap_err(), "expected integer or null, got string");

        let union = TypeShape::union(vec![TypeShape::string(), TypeShape::integer()]);
        assert!(coerce(&union, &json!(5)).is_ok());
        assert!(coerce(&union, &json!(true)).is_err());

        let lit = TypeShape::literal(["fast", "slow"]);
        assert!(coerce(&lit, &json!("fast")).is_ok());
        assert!(coerce(&lit, &json!("medium")).unwrap_err().contains("\"medium\""));
    }

    #[test]
    fn test_record_fields() {
        let shape = TypeShape::record(
            RecordShape::new("Point")
                .field::<f64>("x")
                .field_default::<f64>("y", 0.0),
        );
        assert_eq!(
            coerce(&shape, &json!({"x": 1, "extra": 1})),
            Ok(json!({"x": 1, "y": 0.0, "extra": 1}))
        );
        assert_eq!(coerce(&shape, &json!({"y": 1})).unwrap_err(), "missing field 'x'");
        assert!(coerce(&shape, &json!({"x": "1"})).unwrap_err().starts_with("field 'x'"));
    }

    #[test]
    fn test_opaque_accepts_anything() {
        for v in [json!(null), json!([1, {"a": 2}]), json!("s")] {
            assert_eq!(coerce(&TypeShape::Opaque, &v), Ok(v.clone()));
        }
    }

    #[test]
    fn test_resource_requires_string() {
        let s = schema(vec![("file", TypeShape::Resource(ResourceKind::FilePath), None)]);
        let err = validate_and_coerce(&s, &obj(json!({"file": 5})), &Materializer::empty()).unwrap_err();
        assert!(matches!(err, ArgumentError::Validation { .. }));
    }

    #[test]
    fn test_missing_resource_file() {
        let s = schema(vec![("file", TypeShape::Resource(ResourceKind::FilePath), None)]);
        let err = validate_and_coerce(
            &s,
            &obj(json!({"file": "/no/such/file.txt"})),
            &Materializer::empty(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ArgumentError::Resource {
                source: ResourceError::NotFound { .. },
                ..
            }
        ));
    }
}
