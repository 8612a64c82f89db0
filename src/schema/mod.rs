//! Schema module - endpoint contracts.
//!
//! Provides:
//! - [`TypeShape`] - structural description of a value, renderable as JSON schema
//! - [`Describe`] - maps Rust types to shapes
//! - [`parse_doc`] - extracts description and parameter texts from documentation
//! - [`derive`] - builds an [`EndpointSchema`] from an [`EndpointDecl`]

mod derive;
mod describe;
mod doc;
mod shape;

pub use derive::{
    derive, EndpointDecl, EndpointSchema, InputSchema, ParamDecl, ParameterDescriptor,
    ServiceSchema,
};
pub use describe::Describe;
pub use doc::{parse_doc, DocInfo};
pub use shape::{value_kind, FieldShape, RecordShape, ResourceKind, ScalarKind, TypeShape};
