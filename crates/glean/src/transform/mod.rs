// ABOUTME: Transform pipeline: TransformSpec (func, instance, class, chain) compiled into a flat Pipeline.
// ABOUTME: Class stages are constructed fresh per value from their payload and the request's TransformContext.

//! Value transforms.
//!
//! A [`TransformSpec`] describes what to do with an extracted value:
//!
//! - `Func`: a plain closure.
//! - `Instance`: a shared [`Transform`] object, called directly.
//! - `Class`: a [`ConfiguredTransform`] type plus its payload; a new instance is
//!   constructed for every value, receiving the payload and the
//!   [`TransformContext`] (which carries the caller's base URL).
//! - `Chain`: any mixture of the above, applied left to right.
//!
//! Specs are compiled once into a [`Pipeline`] (nested chains flattened) and
//! the pipeline is applied per value.

pub mod builtin;

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::error::{SchemaError, TransformError};
use crate::transform::builtin::BuiltinTransform;

/// Request-scoped data made available to every stage of a pipeline.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransformContext {
    base_url: Option<String>,
}

impl TransformContext {
    pub fn new(base_url: Option<&str>) -> Self {
        Self {
            base_url: base_url.map(str::to_string),
        }
    }

    /// The base URL supplied by the caller, if any.
    pub fn base_url(&self) -> Option<&str> {
        self.base_url.as_deref()
    }
}

/// A stage that maps one value to another.
pub trait Transform: Send + Sync {
    fn transform(&self, value: Value) -> Result<Value, TransformError>;
}

/// A stage type that is constructed per value from static configuration.
///
/// `construct` is the only way configuration reaches the stage: the payload
/// carries static settings (a pattern, a group index) and the context carries
/// request data such as the base URL.
pub trait ConfiguredTransform: Transform + Sized + 'static {
    type Payload: Send + Sync + 'static;

    fn construct(payload: &Self::Payload, ctx: &TransformContext) -> Self;
}

type TransformFn = dyn Fn(Value) -> anyhow::Result<Value> + Send + Sync;
type StageFactory = dyn Fn(&TransformContext) -> Box<dyn Transform> + Send + Sync;

/// Description of a transform, before compilation.
#[derive(Clone)]
pub enum TransformSpec {
    Func(Arc<TransformFn>),
    Instance(Arc<dyn Transform>),
    Class(Arc<StageFactory>),
    Chain(Vec<TransformSpec>),
}

impl TransformSpec {
    /// Wrap a closure.
    pub fn func<F>(f: F) -> Self
    where
        F: Fn(Value) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        TransformSpec::Func(Arc::new(f))
    }

    /// Share one transform object across every value.
    pub fn instance<T: Transform + 'static>(transform: T) -> Self {
        TransformSpec::Instance(Arc::new(transform))
    }

    /// Construct a fresh `C` for every value from `payload`.
    pub fn class<C: ConfiguredTransform>(payload: C::Payload) -> Self {
        let payload = Arc::new(payload);
        TransformSpec::Class(Arc::new(move |ctx: &TransformContext| {
            Box::new(C::construct(&payload, ctx)) as Box<dyn Transform>
        }))
    }

    pub fn chain<I>(specs: I) -> Self
    where
        I: IntoIterator<Item = TransformSpec>,
    {
        TransformSpec::Chain(specs.into_iter().collect())
    }

    /// Append a stage after this spec.
    pub fn then(self, next: TransformSpec) -> Self {
        match self {
            TransformSpec::Chain(mut specs) => {
                specs.push(next);
                TransformSpec::Chain(specs)
            }
            other => TransformSpec::Chain(vec![other, next]),
        }
    }

    /// Resolve this description into a flat pipeline of stages.
    pub fn compile(&self) -> Pipeline {
        let mut stages = Vec::new();
        self.flatten_into(&mut stages);
        Pipeline { stages }
    }

    fn flatten_into(&self, stages: &mut Vec<Stage>) {
        match self {
            TransformSpec::Func(f) => stages.push(Stage::Func(Arc::clone(f))),
            TransformSpec::Instance(t) => stages.push(Stage::Instance(Arc::clone(t))),
            TransformSpec::Class(factory) => stages.push(Stage::Class(Arc::clone(factory))),
            TransformSpec::Chain(specs) => {
                for spec in specs {
                    spec.flatten_into(stages);
                }
            }
        }
    }
}

impl fmt::Debug for TransformSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransformSpec::Func(_) => write!(f, "Func"),
            TransformSpec::Instance(_) => write!(f, "Instance"),
            TransformSpec::Class(_) => write!(f, "Class"),
            TransformSpec::Chain(specs) => f.debug_list().entries(specs).finish(),
        }
    }
}

impl TryFrom<BuiltinTransform> for TransformSpec {
    type Error = SchemaError;

    fn try_from(builtin: BuiltinTransform) -> Result<Self, Self::Error> {
        builtin.into_spec()
    }
}

/// Schema files name builtin stages: one `{"type": ...}` object or an array of them.
#[derive(Deserialize)]
#[serde(untagged)]
enum TransformDef {
    One(BuiltinTransform),
    Many(Vec<BuiltinTransform>),
}

impl<'de> Deserialize<'de> for TransformSpec {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let def = TransformDef::deserialize(deserializer)?;
        let builtins = match def {
            TransformDef::One(one) => vec![one],
            TransformDef::Many(many) => many,
        };
        let specs = builtins
            .into_iter()
            .map(TransformSpec::try_from)
            .collect::<Result<Vec<_>, _>>()
            .map_err(serde::de::Error::custom)?;
        Ok(TransformSpec::Chain(specs))
    }
}

#[derive(Clone)]
enum Stage {
    Func(Arc<TransformFn>),
    Instance(Arc<dyn Transform>),
    Class(Arc<StageFactory>),
}

impl Stage {
    fn run(&self, value: Value, ctx: &TransformContext) -> Result<Value, TransformError> {
        match self {
            Stage::Func(f) => f(value).map_err(|e| {
                e.downcast::<TransformError>()
                    .unwrap_or_else(TransformError::Other)
            }),
            Stage::Instance(t) => t.transform(value),
            Stage::Class(factory) => factory(ctx).transform(value),
        }
    }
}

/// A compiled, flat sequence of stages.
#[derive(Clone, Default)]
pub struct Pipeline {
    stages: Vec<Stage>,
}

impl Pipeline {
    /// Run `value` through every stage in order.
    pub fn apply(&self, value: Value, ctx: &TransformContext) -> Result<Value, TransformError> {
        self.stages
            .iter()
            .try_fold(value, |current, stage| stage.run(current, ctx))
    }

    /// Run every element independently through the full pipeline.
    ///
    /// `null` and `""` placeholders kept by `keep_empty` pass through untouched.
    pub fn apply_each(
        &self,
        values: Vec<Value>,
        ctx: &TransformContext,
    ) -> Result<Vec<Value>, TransformError> {
        values
            .into_iter()
            .map(|value| match value {
                Value::Null => Ok(Value::Null),
                Value::String(s) if s.is_empty() => Ok(Value::String(s)),
                other => self.apply(other, ctx),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("stages", &self.stages.len())
            .finish()
    }
}
