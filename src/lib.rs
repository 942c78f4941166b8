//! Plugboard Driver Registry
//!
//! A schema-validated registry for pluggable named components ("drivers").
//! A host registers typed implementations of an extension point under string
//! ids, each validated against a declarative schema, and can opt into
//! synthesized "missing" placeholder drivers for unregistered ids.
//!
//! ## Features
//!
//! - **Schema Validation**: Every driver is validated on registration;
//!   defaults are applied, required and forbidden fields enforced
//! - **Missing-Driver Synthesis**: Configure a generator and `get` on an
//!   unknown id returns a placeholder whose function fields fail loudly,
//!   naming the field and the id that was requested
//! - **Stable Enumeration**: `keys()` and `all()` iterate in registration
//!   order
//! - **Change Notifications**: Subscribe to add/remove/clear events
//! - **Validation Hooks**: before/after extension points around the pipeline
//!
//! ## Example
//!
//! ```
//! use plugboard::{Driver, DriverRegistry, DriverSchema, FieldSpec, MissingGenerator};
//!
//! # fn main() -> plugboard::Result<()> {
//! let registry = DriverRegistry::builder("storage")
//!     .schema(
//!         DriverSchema::new()
//!             .field("name", FieldSpec::string().required())
//!             .field("connect", FieldSpec::function().required().tag("async")),
//!     )
//!     .missing_generator(MissingGenerator::custom(|id, _errors| {
//!         Driver::new().with("name", format!("Missing Driver: {id}"))
//!     }))
//!     .build()?;
//!
//! let placeholder = registry.get("s3")?;
//! assert_eq!(placeholder.id(), Some("missing"));
//! assert_eq!(placeholder.get("name").unwrap().as_str(), Some("Missing Driver: s3"));
//! # Ok(())
//! # }
//! ```

pub mod driver;
pub mod error;
pub mod events;
pub mod missing;
pub mod registry;
pub mod schema;

pub use driver::{AsyncHandler, Driver, FieldValue, SyncHandler};
pub use error::{RegistryError, Result};
pub use events::{RegistryEvent, SubscriptionId};
pub use missing::{GeneratorFn, MissingErrors, MissingGenerator, MISSING_ID};
pub use registry::{DriverHooks, DriverRegistry, MissingHandler, RegistryBuilder};
pub use schema::{
    CompiledSchema, DriverSchema, FieldSpec, FieldType, Presence, ValidationOptions, ASYNC_TAG,
};
