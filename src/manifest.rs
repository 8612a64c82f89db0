//! Deployment manifest export.
//!
//! Renders a service's schema as the YAML manifest the host reads to learn
//! how to launch the worker and which methods it offers:
//!
//! ```yaml
//! name: calculator
//! version: 1.0.0
//! description: Basic arithmetic
//! runtime:
//!   language: rust
//!   packages:
//!   - rpc-worker
//! rpc:
//!   methods:
//!     add:
//!       description: Add two numbers.
//!       input: { ... }
//!       output: { ... }
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::error::Result;
use crate::schema::ServiceSchema;

/// Runtime requirements of the worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Runtime {
    pub language: String,
    pub packages: Vec<String>,
}

impl Default for Runtime {
    fn default() -> Self {
        Self {
            language: "rust".to_string(),
            packages: vec![env!("CARGO_PKG_NAME").to_string()],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Rpc {
    /// Method name to `{description, input, output}`, in declaration order.
    pub methods: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub name: String,
    pub version: String,
    pub description: String,
    pub runtime: Runtime,
    pub rpc: Rpc,
}

impl Manifest {
    pub fn from_schema(schema: &ServiceSchema) -> Self {
        let methods = schema
            .methods
            .iter()
            .map(|m| {
                let entry = json!({
                    "description": m.description,
                    "input": m.input.to_json(),
                    "output": m.output.to_json_schema(),
                });
                (m.name.clone(), entry)
            })
            .collect();

        Self {
            name: schema.name.clone(),
            version: schema.version.clone(),
            description: schema.description.clone(),
            runtime: Runtime::default(),
            rpc: Rpc { methods },
        }
    }

    /// Add a package the worker needs at runtime.
    pub fn with_package(mut self, package: impl Into<String>) -> Self {
        self.runtime.packages.push(package.into());
        self
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn from_yaml(text: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{derive, EndpointDecl, ParamDecl, TypeShape};

    fn schema() -> ServiceSchema {
        let add = derive(&EndpointDecl {
            name: "add".into(),
            doc: Some("Add two numbers.".into()),
            params: vec![
                ParamDecl::new("a", Some(TypeShape::number()), None),
                ParamDecl::new("b", Some(TypeShape::number()), None),
            ],
            returns: Some(TypeShape::number()),
            ..Default::default()
        });
        let ping = derive(&EndpointDecl {
            name: "ping".into(),
            ..Default::default()
        });
        ServiceSchema {
            name: "calculator".into(),
            version: "1.0.0".into(),
            description: "Basic arithmetic".into(),
            methods: vec![ping, add],
        }
    }

    #[test]
    fn test_from_schema() {
        let manifest = Manifest::from_schema(&schema());

        assert_eq!(manifest.runtime.language, "rust");
        assert_eq!(manifest.runtime.packages, ["rpc-worker"]);

        let names: Vec<&String> = manifest.rpc.methods.keys().collect();
        assert_eq!(names, ["ping", "add"]);

        let add = &manifest.rpc.methods["add"];
        assert_eq!(add["description"], "Add two numbers.");
        assert_eq!(add["input"]["required"], json!(["a", "b"]));
        assert_eq!(add["output"], json!({"type": "number"}));
    }

    #[test]
    fn test_yaml_keeps_declaration_order() {
        let yaml = Manifest::from_schema(&schema())
            .with_package("hound")
            .to_yaml()
            .unwrap();

        assert!(yaml.starts_with("name: calculator\n"));
        let ping = yaml.find("ping:").unwrap();
        let add = yaml.find("add:").unwrap();
        assert!(ping < add);

        let parsed = Manifest::from_yaml(&yaml).unwrap();
        assert_eq!(parsed.runtime.packages, ["rpc-worker", "hound"]);
        assert_eq!(parsed.rpc.methods.len(), 2);
    }
}
