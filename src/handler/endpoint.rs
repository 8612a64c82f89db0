//! Declarative endpoint definitions.
//!
//! An [`Endpoint`] pairs a plain Rust function with the declaration the
//! schema is derived from. The function itself is untouched, so it can still
//! be unit-tested by calling it directly.
//!
//! # Example
//!
//! ```ignore
//! fn divide(_: &Calc, args: Args) -> Result<f64, HandlerError> {
//!     let b: f64 = args.get("b")?;
//!     if b == 0.0 {
//!         return Err(HandlerError::new("ZeroDivisionError", "divide by zero"));
//!     }
//!     Ok(args.get::<f64>("a")? / b)
//! }
//!
//! let endpoint = Endpoint::immediate("divide", divide)
//!     .doc("Divide a by b.")
//!     .param::<f64>("a")
//!     .param_default::<f64>("b", 1.0)
//!     .returns::<f64>();
//! ```

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use crate::error::HandlerError;
use crate::schema::{Describe, EndpointDecl, ParamDecl, TypeShape};
use crate::validate::Args;

/// Boxed future for handler results.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Result of one handler invocation, already serialized.
pub type HandlerResult = Result<Value, HandlerError>;

type ImmediateFn<S> = dyn Fn(&S, Args) -> HandlerResult + Send + Sync;
type SuspendingFn<S> = dyn Fn(Arc<S>, Args) -> BoxFuture<'static, HandlerResult> + Send + Sync;

/// Execution model of a handler, fixed at registration.
pub enum HandlerFn<S> {
    /// Runs to completion on the calling thread.
    Immediate(Arc<ImmediateFn<S>>),
    /// Driven on the shared cooperative scheduler.
    Suspending(Arc<SuspendingFn<S>>),
}

impl<S> Clone for HandlerFn<S> {
    fn clone(&self) -> Self {
        match self {
            HandlerFn::Immediate(f) => HandlerFn::Immediate(Arc::clone(f)),
            HandlerFn::Suspending(f) => HandlerFn::Suspending(Arc::clone(f)),
        }
    }
}

fn to_value<R: Serialize>(result: Result<R, HandlerError>) -> HandlerResult {
    let value = result?;
    Ok(serde_json::to_value(value)?)
}

/// A named endpoint: handler plus declaration.
pub struct Endpoint<S> {
    decl: EndpointDecl,
    handler: HandlerFn<S>,
}

impl<S: Send + Sync + 'static> Endpoint<S> {
    /// Endpoint backed by a blocking function.
    pub fn immediate<F, R>(name: &str, handler: F) -> Self
    where
        F: Fn(&S, Args) -> Result<R, HandlerError> + Send + Sync + 'static,
        R: Serialize + 'static,
    {
        let f = move |state: &S, args: Args| to_value(handler(state, args));
        Self::with_handler(name, HandlerFn::Immediate(Arc::new(f)))
    }

    /// Endpoint backed by an async function.
    pub fn suspending<F, Fut, R>(name: &str, handler: F) -> Self
    where
        F: Fn(Arc<S>, Args) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, HandlerError>> + Send + 'static,
        R: Serialize + 'static,
    {
        let f = move |state: Arc<S>, args: Args| -> BoxFuture<'static, HandlerResult> {
            let fut = handler(state, args);
            Box::pin(async move { to_value(fut.await) })
        };
        Self::with_handler(name, HandlerFn::Suspending(Arc::new(f)))
    }

    fn with_handler(name: &str, handler: HandlerFn<S>) -> Self {
        Self {
            decl: EndpointDecl {
                name: name.to_string(),
                ..Default::default()
            },
            handler,
        }
    }
}

impl<S> Endpoint<S> {
    /// Documentation text: description plus an optional `Args:` section.
    pub fn doc(mut self, text: &str) -> Self {
        self.decl.doc = Some(text.to_string());
        self
    }

    /// Required parameter typed by `T`.
    pub fn param<T: Describe + ?Sized>(self, name: &str) -> Self {
        self.push_param(name, Some(T::shape()), None)
    }

    /// Optional parameter typed by `T`.
    pub fn param_default<T: Describe + ?Sized>(self, name: &str, default: impl Into<Value>) -> Self {
        self.push_param(name, Some(T::shape()), Some(default.into()))
    }

    /// Required parameter with an explicit shape.
    pub fn param_shape(self, name: &str, shape: TypeShape) -> Self {
        self.push_param(name, Some(shape), None)
    }

    /// Optional parameter with an explicit shape.
    pub fn param_shape_default(self, name: &str, shape: TypeShape, default: impl Into<Value>) -> Self {
        self.push_param(name, Some(shape), Some(default.into()))
    }

    /// Required parameter without a declared type. Accepts anything.
    pub fn param_untyped(self, name: &str) -> Self {
        self.push_param(name, None, None)
    }

    fn push_param(mut self, name: &str, shape: Option<TypeShape>, default: Option<Value>) -> Self {
        self.decl.params.push(ParamDecl {
            name: name.to_string(),
            shape,
            default,
        });
        self
    }

    /// Declared return type.
    pub fn returns<T: Describe + ?Sized>(mut self) -> Self {
        self.decl.returns = Some(T::shape());
        self
    }

    /// Declared return shape.
    pub fn returns_shape(mut self, shape: TypeShape) -> Self {
        self.decl.returns = Some(shape);
        self
    }

    /// Mark as producing partial results.
    pub fn streaming(mut self, streaming: bool) -> Self {
        self.decl.streaming = streaming;
        self
    }

    pub fn name(&self) -> &str {
        &self.decl.name
    }

    pub fn decl(&self) -> &EndpointDecl {
        &self.decl
    }

    pub fn handler(&self) -> &HandlerFn<S> {
        &self.handler
    }

    pub fn is_streaming(&self) -> bool {
        self.decl.streaming
    }

    pub fn is_suspending(&self) -> bool {
        matches!(self.handler, HandlerFn::Suspending(_))
    }
}

impl<S> std::fmt::Debug for Endpoint<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Endpoint")
            .field("name", &self.decl.name)
            .field("suspending", &self.is_suspending())
            .field("streaming", &self.decl.streaming)
            .finish()
    }
}
