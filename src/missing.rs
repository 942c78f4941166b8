//! Missing-driver synthesis
//!
//! When a registry has a missing generator configured, `get` on an absent id
//! returns a synthesized placeholder driver instead of failing. The
//! placeholder satisfies the schema's required fields with stand-in functions
//! that fail loudly when invoked, carrying the id that was actually requested.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::driver::{Driver, FieldValue};
use crate::error::RegistryError;
use crate::schema::CompiledSchema;

/// Reserved id carried by every synthesized driver. A driver under this id
/// can never be registered alongside a generator, nor removed.
pub const MISSING_ID: &str = "missing";

/// Host-supplied generator: (requested id, error factory) -> partial driver
pub type GeneratorFn = Arc<dyn Fn(&str, &MissingErrors) -> Driver + Send + Sync>;

/// Produces the partial field set a synthesized driver starts from.
#[derive(Clone)]
pub enum MissingGenerator {
    /// Start from an empty field set; every synthesized field comes from the
    /// schema's stand-in template.
    EmptyDefaults,
    /// Host-supplied partial generator. Fields it returns take precedence
    /// over template stand-ins.
    Custom(GeneratorFn),
}

impl MissingGenerator {
    /// Wrap a host generator function
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(&str, &MissingErrors) -> Driver + Send + Sync + 'static,
    {
        Self::Custom(Arc::new(f))
    }

    pub(crate) fn partial(&self, requested: &str, errors: &MissingErrors) -> Driver {
        match self {
            Self::EmptyDefaults => Driver::new(),
            Self::Custom(f) => f(requested, errors),
        }
    }
}

impl fmt::Debug for MissingGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyDefaults => write!(f, "MissingGenerator::EmptyDefaults"),
            Self::Custom(_) => write!(f, "MissingGenerator::Custom(..)"),
        }
    }
}

/// Diagnostic error factory bound to a requested driver id.
///
/// Passed to custom generators so fields they implement manually can fail
/// with the same message rule the synthesized stand-ins use.
#[derive(Clone, Debug)]
pub struct MissingErrors {
    id: String,
}

impl MissingErrors {
    pub(crate) fn new(requested: impl Into<String>) -> Self {
        Self {
            id: requested.into(),
        }
    }

    /// The id the caller asked for
    pub fn requested_id(&self) -> &str {
        &self.id
    }

    /// The fixed not-implemented error for a field of this missing driver
    pub fn not_implemented(&self, field: &str) -> RegistryError {
        RegistryError::NotImplemented {
            field: field.to_string(),
            id: self.id.clone(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum StandinKind {
    Sync,
    Async,
}

/// Per-field stand-in factories derived once from the compiled schema.
///
/// A field earns an entry when it is function-typed, not forbidden, and
/// either carries a default or is required. Optional function fields with no
/// default are never synthesized.
#[derive(Clone, Debug, Default)]
pub(crate) struct OverlayTemplate {
    entries: IndexMap<String, StandinKind>,
}

impl OverlayTemplate {
    pub(crate) fn from_schema(schema: &CompiledSchema) -> Self {
        let mut entries = IndexMap::new();
        for (name, spec) in schema.fields() {
            if !spec.is_function_type() || spec.is_forbidden() {
                continue;
            }
            if !spec.has_default() && !spec.is_required() {
                continue;
            }
            let kind = if spec.is_async() {
                StandinKind::Async
            } else {
                StandinKind::Sync
            };
            entries.insert(name.to_string(), kind);
        }
        Self { entries }
    }

    /// Fill template fields absent from the partial with throwing stand-ins
    /// bound to the requested id. Generator-supplied fields win.
    pub(crate) fn overlay(&self, partial: &mut Driver, requested: &str) {
        for (name, kind) in &self.entries {
            if partial.contains(name) {
                continue;
            }
            let standin = match kind {
                StandinKind::Sync => sync_standin(name, requested),
                StandinKind::Async => async_standin(name, requested),
            };
            partial.set(name.clone(), standin);
        }
    }
}

fn sync_standin(field: &str, requested: &str) -> FieldValue {
    let field = field.to_string();
    let id = requested.to_string();
    FieldValue::sync_fn(move |_args| {
        Err(RegistryError::NotImplemented {
            field: field.clone(),
            id: id.clone(),
        })
    })
}

fn async_standin(field: &str, requested: &str) -> FieldValue {
    let field = field.to_string();
    let id = requested.to_string();
    FieldValue::async_fn(move |_args| {
        let field = field.clone();
        let id = id.clone();
        async move { Err(RegistryError::NotImplemented { field, id }) }
    })
}
