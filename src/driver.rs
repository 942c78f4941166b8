//! Driver records and field values

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use indexmap::IndexMap;
use serde_json::Value;

use crate::error::Result;

/// A synchronous driver operation: JSON arguments in, JSON result out.
pub type SyncHandler = Arc<dyn Fn(Value) -> Result<Value> + Send + Sync>;

/// An asynchronous driver operation.
pub type AsyncHandler = Arc<dyn Fn(Value) -> BoxFuture<'static, Result<Value>> + Send + Sync>;

/// A single driver field: plain data or a callable operation.
#[derive(Clone)]
pub enum FieldValue {
    /// Plain data (strings, numbers, objects, ...)
    Data(Value),
    /// A synchronous function field
    Sync(SyncHandler),
    /// An asynchronous function field
    Async(AsyncHandler),
}

impl FieldValue {
    /// Wrap a synchronous handler
    pub fn sync_fn<F>(f: F) -> Self
    where
        F: Fn(Value) -> Result<Value> + Send + Sync + 'static,
    {
        Self::Sync(Arc::new(f))
    }

    /// Wrap an asynchronous handler
    pub fn async_fn<F, Fut>(f: F) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        Self::Async(Arc::new(move |args| Box::pin(f(args))))
    }

    /// True for `Sync` and `Async` variants
    pub fn is_function(&self) -> bool {
        matches!(self, Self::Sync(_) | Self::Async(_))
    }

    /// The data payload, if this is a data field
    pub fn as_data(&self) -> Option<&Value> {
        match self {
            Self::Data(v) => Some(v),
            _ => None,
        }
    }

    /// The string payload, if this is a string data field
    pub fn as_str(&self) -> Option<&str> {
        self.as_data().and_then(Value::as_str)
    }

    /// Invoke a synchronous function field.
    ///
    /// Returns `None` for data and async fields.
    pub fn call(&self, args: Value) -> Option<Result<Value>> {
        match self {
            Self::Sync(f) => Some(f(args)),
            _ => None,
        }
    }

    /// Invoke an asynchronous function field.
    ///
    /// Returns `None` for data and sync fields.
    pub fn call_async(&self, args: Value) -> Option<BoxFuture<'static, Result<Value>>> {
        match self {
            Self::Async(f) => Some(f(args)),
            _ => None,
        }
    }
}

impl From<Value> for FieldValue {
    fn from(v: Value) -> Self {
        Self::Data(v)
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        Self::Data(Value::String(s.to_string()))
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        Self::Data(Value::String(s))
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        Self::Data(Value::Bool(b))
    }
}

impl fmt::Debug for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Data(v) => write!(f, "{v}"),
            Self::Sync(_) => write!(f, "<fn>"),
            Self::Async(_) => write!(f, "<async fn>"),
        }
    }
}

/// Data fields compare by value; function fields compare by handler identity.
impl PartialEq for FieldValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Data(a), Self::Data(b)) => a == b,
            (Self::Sync(a), Self::Sync(b)) => Arc::ptr_eq(a, b),
            (Self::Async(a), Self::Async(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

/// A named, schema-validated implementation of an extension point.
///
/// A driver is an ordered map of field names to values. Field order is the
/// order fields were set; validation rewrites it to schema declaration order.
#[derive(Clone, Default, PartialEq)]
pub struct Driver {
    fields: IndexMap<String, FieldValue>,
}

impl Driver {
    /// Create an empty driver
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a driver with the given id
    pub fn with_id(id: impl Into<String>) -> Self {
        Self::new().with("id", Value::String(id.into()))
    }

    /// Set a field, chaining
    pub fn with(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Set a field
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<FieldValue>) {
        self.fields.insert(name.into(), value.into());
    }

    /// The driver id, if the `id` field is a string
    pub fn id(&self) -> Option<&str> {
        self.fields.get("id").and_then(FieldValue::as_str)
    }

    /// Look up a field by name
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    /// True if the field is present
    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// Iterate fields in order
    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of fields
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// True if the driver has no fields
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl fmt::Debug for Driver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.fields.iter()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_field_order_is_insertion_order() {
        let driver = Driver::with_id("pg")
            .with("name", "Postgres")
            .with("pooled", true);

        let names: Vec<_> = driver.fields().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["id", "name", "pooled"]);
    }

    #[test]
    fn test_data_fields_compare_by_value() {
        let a = Driver::with_id("x").with("port", json!(5432));
        let b = Driver::with_id("x").with("port", json!(5432));
        assert_eq!(a, b);
    }

    #[test]
    fn test_function_fields_compare_by_identity() {
        let handler = FieldValue::sync_fn(|_| Ok(json!(null)));
        let a = Driver::with_id("x").with("connect", handler.clone());
        let b = Driver::with_id("x").with("connect", handler);
        assert_eq!(a, b);

        let other = Driver::with_id("x").with("connect", FieldValue::sync_fn(|_| Ok(json!(null))));
        assert_ne!(a, other);
    }

    #[test]
    fn test_call_dispatch() {
        let sync = FieldValue::sync_fn(|args| Ok(args));
        assert_eq!(sync.call(json!(1)).unwrap().unwrap(), json!(1));
        assert!(sync.call_async(json!(1)).is_none());

        let data = FieldValue::from("plain");
        assert!(data.call(json!(null)).is_none());
        assert_eq!(data.as_str(), Some("plain"));
    }
}
