//! Endpoint schema derivation.
//!
//! [`derive`] is a pure function of an endpoint's declaration: its parameter
//! list, declared shapes, defaults, return shape and documentation text.

use serde::ser::{Serialize, Serializer};
use serde_json::{json, Map, Value};

use super::{parse_doc, TypeShape};

/// One declared parameter, as written at registration.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamDecl {
    pub name: String,
    /// Declared shape; `None` when the parameter is unannotated.
    pub shape: Option<TypeShape>,
    pub default: Option<Value>,
}

impl ParamDecl {
    pub fn new(name: impl Into<String>, shape: Option<TypeShape>, default: Option<Value>) -> Self {
        Self {
            name: name.into(),
            shape,
            default,
        }
    }
}

/// Everything known about an endpoint before derivation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EndpointDecl {
    pub name: String,
    pub doc: Option<String>,
    pub params: Vec<ParamDecl>,
    /// Declared return shape; `None` when unannotated.
    pub returns: Option<TypeShape>,
    pub streaming: bool,
}

/// Derived description of one parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterDescriptor {
    pub name: String,
    pub shape: TypeShape,
    pub default: Option<Value>,
    pub description: Option<String>,
}

impl ParameterDescriptor {
    pub fn has_default(&self) -> bool {
        self.default.is_some()
    }

    pub fn is_required(&self) -> bool {
        self.default.is_none()
    }

    fn to_json_schema(&self) -> Value {
        let mut schema = self.shape.to_json_schema();
        if let Some(obj) = schema.as_object_mut() {
            if let Some(text) = &self.description {
                obj.insert("description".into(), json!(text));
            }
            if let Some(default) = &self.default {
                obj.insert("default".into(), default.clone());
            }
        }
        schema
    }
}

/// Ordered parameter set plus the required names.
#[derive(Debug, Clone, PartialEq)]
pub struct InputSchema {
    pub params: Vec<ParameterDescriptor>,
    pub required: Vec<String>,
}

impl InputSchema {
    pub fn param(&self, name: &str) -> Option<&ParameterDescriptor> {
        self.params.iter().find(|p| p.name == name)
    }

    /// `{"type":"object","properties":{..},"required":[..]}`; `required` is
    /// omitted when empty.
    pub fn to_json(&self) -> Value {
        let properties: Map<String, Value> = self
            .params
            .iter()
            .map(|p| (p.name.clone(), p.to_json_schema()))
            .collect();

        let mut schema = Map::new();
        schema.insert("type".into(), json!("object"));
        schema.insert("properties".into(), Value::Object(properties));
        if !self.required.is_empty() {
            schema.insert("required".into(), json!(self.required));
        }
        Value::Object(schema)
    }
}

/// Derived contract of one endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct EndpointSchema {
    pub name: String,
    pub description: String,
    pub input: InputSchema,
    pub output: TypeShape,
    pub streaming: bool,
}

impl EndpointSchema {
    pub fn to_json(&self) -> Value {
        let mut doc = Map::new();
        doc.insert("name".into(), json!(self.name));
        doc.insert("description".into(), json!(self.description));
        doc.insert("input".into(), self.input.to_json());
        doc.insert("output".into(), self.output.to_json_schema());
        if self.streaming {
            doc.insert("streaming".into(), json!(true));
        }
        Value::Object(doc)
    }
}

impl Serialize for EndpointSchema {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

/// Whole-service schema document.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceSchema {
    pub name: String,
    pub version: String,
    pub description: String,
    /// Endpoint schemas in declaration order.
    pub methods: Vec<EndpointSchema>,
}

impl ServiceSchema {
    pub fn method(&self, name: &str) -> Option<&EndpointSchema> {
        self.methods.iter().find(|m| m.name == name)
    }

    pub fn method_names(&self) -> impl Iterator<Item = &str> {
        self.methods.iter().map(|m| m.name.as_str())
    }

    pub fn to_json(&self) -> Value {
        json!({
            "name": self.name,
            "version": self.version,
            "description": self.description,
            "methods": self
                .methods
                .iter()
                .map(|m| (m.name.clone(), m.to_json()))
                .collect::<Map<String, Value>>(),
        })
    }
}

impl Serialize for ServiceSchema {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

/// Derive the schema of one endpoint. Pure and deterministic.
pub fn derive(decl: &EndpointDecl) -> EndpointSchema {
    let doc = decl.doc.as_deref().map(parse_doc).unwrap_or_default();

    let params: Vec<ParameterDescriptor> = decl
        .params
        .iter()
        .map(|p| ParameterDescriptor {
            name: p.name.clone(),
            shape: p.shape.clone().unwrap_or(TypeShape::Opaque),
            default: p.default.clone(),
            description: doc.param(&p.name).map(str::to_string),
        })
        .collect();

    let required = params
        .iter()
        .filter(|p| p.is_required())
        .map(|p| p.name.clone())
        .collect();

    EndpointSchema {
        name: decl.name.clone(),
        description: doc.description,
        input: InputSchema { params, required },
        output: decl.returns.clone().unwrap_or(TypeShape::Opaque),
        streaming: decl.streaming,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn divide_decl() -> EndpointDecl {
        EndpointDecl {
            name: "divide".into(),
            doc: Some("Divide a by b.\n\nArgs:\n    a: Dividend\n    b: Divisor\n".into()),
            params: vec![
                ParamDecl {
                    name: "a".into(),
                    shape: Some(TypeShape::number()),
                    default: None,
                },
                ParamDecl {
                    name: "b".into(),
                    shape: Some(TypeShape::number()),
                    default: Some(json!(1.0)),
                },
            ],
            returns: Some(TypeShape::number()),
            streaming: false,
        }
    }

    #[test]
    fn test_derive_basic() {
        let schema = derive(&divide_decl());

        assert_eq!(schema.name, "divide");
        assert_eq!(schema.description, "Divide a by b.");
        assert_eq!(schema.input.required, vec!["a".to_string()]);
        assert_eq!(schema.input.param("b").unwrap().default, Some(json!(1.0)));
        assert_eq!(
            schema.input.param("a").unwrap().description.as_deref(),
            Some("Dividend")
        );
        assert_eq!(schema.output, TypeShape::number());
    }

    #[test]
    fn test_derive_is_idempotent() {
        let decl = divide_decl();
        assert_eq!(derive(&decl), derive(&decl));
        assert_eq!(derive(&decl).to_json(), derive(&decl).to_json());
    }

    #[test]
    fn test_unannotated_is_opaque() {
        let decl = EndpointDecl {
            name: "anything".into(),
            params: vec![ParamDecl {
                name: "x".into(),
                shape: None,
                default: None,
            }],
            ..Default::default()
        };
        let schema = derive(&decl);

        assert_eq!(schema.input.params[0].shape, TypeShape::Opaque);
        assert_eq!(schema.output, TypeShape::Opaque);
        assert_eq!(schema.description, "");
    }

    #[test]
    fn test_input_json() {
        let json = derive(&divide_decl()).to_json();

        assert_eq!(json["input"]["type"], "object");
        assert_eq!(json["input"]["required"], json!(["a"]));
        assert_eq!(json["input"]["properties"]["b"]["default"], 1.0);
        assert_eq!(json["input"]["properties"]["a"]["description"], "Dividend");
        assert_eq!(json["output"], json!({"type": "number"}));
        assert!(json.get("streaming").is_none());

        let keys: Vec<&String> = json["input"]["properties"].as_object().unwrap().keys().collect();
        assert_eq!(keys, ["a", "b"]);
    }

    #[test]
    fn test_required_omitted_when_empty() {
        let decl = EndpointDecl {
            name: "ping".into(),
            ..Default::default()
        };
        assert!(derive(&decl).to_json()["input"].get("required").is_none());
    }

    #[test]
    fn test_service_schema_json() {
        let schema = ServiceSchema {
            name: "calc".into(),
            version: "1.0.0".into(),
            description: "Calculator".into(),
            methods: vec![derive(&divide_decl())],
        };

        let json = serde_json::to_value(&schema).unwrap();
        assert_eq!(json, schema.to_json());
        assert_eq!(json["methods"]["divide"]["name"], "divide");
        assert_eq!(schema.method_names().collect::<Vec<_>>(), ["divide"]);
    }
}
