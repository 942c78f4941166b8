//! Driver registry
//!
//! Manages a named collection of schema-validated drivers, with optional
//! synthesis of placeholder drivers for unregistered ids.

use indexmap::IndexMap;
use serde_json::Value;
use tracing::debug;

use crate::driver::Driver;
use crate::error::{RegistryError, Result};
use crate::events::{RegistryEvent, Subscribers, SubscriptionId};
use crate::missing::{MissingErrors, MissingGenerator, OverlayTemplate, MISSING_ID};
use crate::schema::{CompiledSchema, DriverSchema, ValidationOptions};

/// Extension points around the validation pipeline.
///
/// Both methods default to no-ops; hosts install an implementation through
/// [`RegistryBuilder::hooks`] or [`DriverRegistry::set_hooks`].
pub trait DriverHooks: Send + Sync {
    /// Called before validation. A `Some` replacement is validated instead
    /// of the original driver.
    fn before_validate(&self, driver: &Driver) -> Option<Driver> {
        let _ = driver;
        None
    }

    /// Called with the validated driver, for side effects only.
    fn after_validate(&self, driver: &Driver) {
        let _ = driver;
    }
}

struct NoopHooks;

impl DriverHooks for NoopHooks {}

/// The main driver registry
pub struct DriverRegistry {
    /// Driver-type label, used in diagnostics only
    driver_type: String,
    /// Compiled schema every driver is validated against
    schema: CompiledSchema,
    /// Options passed through to validation
    options: ValidationOptions,
    /// Stand-in factories derived from the schema at construction
    overlay: OverlayTemplate,
    /// Stored drivers, in registration order
    drivers: IndexMap<String, Driver>,
    /// Placeholder generator for unregistered ids; set at most once
    missing: Option<MissingGenerator>,
    hooks: Box<dyn DriverHooks>,
    subscribers: Subscribers,
}

impl DriverRegistry {
    /// Create a registry with an empty schema (only `id` is required)
    pub fn new(driver_type: impl Into<String>) -> Self {
        Self::with_schema(driver_type, DriverSchema::new())
    }

    /// Create a registry, compiling the given schema
    pub fn with_schema(driver_type: impl Into<String>, schema: DriverSchema) -> Self {
        let schema = schema.compile();
        let overlay = OverlayTemplate::from_schema(&schema);
        Self {
            driver_type: driver_type.into(),
            schema,
            options: ValidationOptions::default(),
            overlay,
            drivers: IndexMap::new(),
            missing: None,
            hooks: Box::new(NoopHooks),
            subscribers: Subscribers::default(),
        }
    }

    /// Start building a registry
    pub fn builder(driver_type: impl Into<String>) -> RegistryBuilder {
        RegistryBuilder::new(driver_type)
    }

    /// The driver-type label
    pub fn driver_type(&self) -> &str {
        &self.driver_type
    }

    /// The compiled schema
    pub fn schema(&self) -> &CompiledSchema {
        &self.schema
    }

    /// The validation options
    pub fn options(&self) -> &ValidationOptions {
        &self.options
    }

    /// Replace the validation hooks
    pub fn set_hooks(&mut self, hooks: impl DriverHooks + 'static) {
        self.hooks = Box::new(hooks);
    }

    /// Configure the missing-driver generator.
    ///
    /// Fails if a generator is already configured, or if a driver with the
    /// reserved id `"missing"` has been registered.
    pub fn set_missing_generator(&mut self, generator: MissingGenerator) -> Result<()> {
        if self.missing.is_some() {
            return Err(RegistryError::Configuration(
                "missing driver generator is already configured".to_string(),
            ));
        }
        if self.drivers.contains_key(MISSING_ID) {
            return Err(RegistryError::Configuration(format!(
                "a {} driver '{}' is already registered",
                self.driver_type, MISSING_ID
            )));
        }
        self.missing = Some(generator);
        debug!(driver_type = %self.driver_type, "configured missing driver generator");
        Ok(())
    }

    /// True if a missing-driver generator is configured
    pub fn has_missing_generator(&self) -> bool {
        self.missing.is_some()
    }

    /// Handle over the configured generator, if any.
    ///
    /// The handle synthesizes fully validated drivers, not the raw partial
    /// field sets the generator itself returns.
    pub fn missing_handler(&self) -> Option<MissingHandler<'_>> {
        self.missing.as_ref().map(|generator| MissingHandler {
            registry: self,
            generator,
        })
    }

    /// Validate and store a driver.
    ///
    /// Returns the validated driver. Fails on schema violations, on an id
    /// already registered, and on the reserved id `"missing"` while a
    /// generator is configured.
    pub fn add(&mut self, driver: Driver) -> Result<Driver> {
        let driver = self.validate(driver)?;
        let id = driver
            .id()
            .ok_or_else(|| RegistryError::validation("id", "is required"))?
            .to_string();

        if self.drivers.contains_key(&id) || (self.missing.is_some() && id == MISSING_ID) {
            return Err(RegistryError::DuplicateId {
                driver_type: self.driver_type.clone(),
                id,
            });
        }

        self.drivers.insert(id.clone(), driver.clone());
        debug!(driver_type = %self.driver_type, id = %id, "registered driver");
        self.subscribers.emit(&RegistryEvent::Added(driver.clone()));
        Ok(driver)
    }

    /// Add drivers in order, aborting on the first failure.
    ///
    /// Drivers added before the failing one remain registered.
    pub fn add_all(&mut self, drivers: impl IntoIterator<Item = Driver>) -> Result<Vec<Driver>> {
        drivers.into_iter().map(|driver| self.add(driver)).collect()
    }

    /// True if a driver with this id is stored
    pub fn exists(&self, id: &str) -> bool {
        self.drivers.contains_key(id)
    }

    /// Get a driver by id.
    ///
    /// Absent ids synthesize a placeholder when a generator is configured,
    /// and fail with a not-found error otherwise.
    pub fn get(&self, id: &str) -> Result<Driver> {
        if let Some(driver) = self.drivers.get(id) {
            return Ok(driver.clone());
        }
        if let Some(generator) = &self.missing {
            return self.synthesize(generator, id);
        }
        Err(RegistryError::NotFound {
            driver_type: self.driver_type.clone(),
            id: id.to_string(),
        })
    }

    /// Get a driver by id, returning `None` when absent.
    ///
    /// A configured generator takes precedence: the placeholder is
    /// synthesized rather than returning `None`.
    pub fn try_get(&self, id: &str) -> Result<Option<Driver>> {
        if let Some(driver) = self.drivers.get(id) {
            return Ok(Some(driver.clone()));
        }
        match &self.missing {
            Some(generator) => self.synthesize(generator, id).map(Some),
            None => Ok(None),
        }
    }

    /// Shallow copy of the whole store as an id -> driver map
    pub fn snapshot(&self) -> IndexMap<String, Driver> {
        self.drivers.clone()
    }

    /// All stored ids, in registration order
    pub fn keys(&self) -> Vec<&str> {
        self.drivers.keys().map(String::as_str).collect()
    }

    /// All stored drivers, in registration order
    pub fn all(&self) -> Vec<&Driver> {
        self.drivers.values().collect()
    }

    /// Number of stored drivers
    pub fn len(&self) -> usize {
        self.drivers.len()
    }

    /// True if no drivers are stored
    pub fn is_empty(&self) -> bool {
        self.drivers.is_empty()
    }

    /// Remove a driver by id.
    ///
    /// The reserved id `"missing"` is always rejected, whether or not a
    /// generator is configured. Absent ids are a silent no-op.
    pub fn remove(&mut self, id: &str) -> Result<()> {
        if id == MISSING_ID {
            return Err(RegistryError::Configuration(format!(
                "the '{MISSING_ID}' driver is reserved and cannot be removed"
            )));
        }
        if let Some(driver) = self.drivers.get(id).cloned() {
            self.subscribers.emit(&RegistryEvent::Removed(driver));
            self.drivers.shift_remove(id);
            debug!(driver_type = %self.driver_type, id = %id, "removed driver");
        }
        Ok(())
    }

    /// Clear the store
    pub fn remove_all(&mut self) {
        self.drivers.clear();
        debug!(driver_type = %self.driver_type, "cleared driver store");
        self.subscribers.emit(&RegistryEvent::Cleared);
    }

    /// Register an event listener
    pub fn subscribe<F>(&mut self, listener: F) -> SubscriptionId
    where
        F: Fn(&RegistryEvent) + Send + Sync + 'static,
    {
        self.subscribers.subscribe(listener)
    }

    /// Remove an event listener; returns false for unknown ids
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.subscribers.unsubscribe(id)
    }

    /// The validation pipeline shared by `add` and synthesis
    fn validate(&self, driver: Driver) -> Result<Driver> {
        let driver = self.hooks.before_validate(&driver).unwrap_or(driver);
        let driver = self.schema.validate(driver, &self.options)?;
        self.hooks.after_validate(&driver);
        Ok(driver)
    }

    /// Synthesize a placeholder driver for a requested id
    fn synthesize(&self, generator: &MissingGenerator, requested: &str) -> Result<Driver> {
        let errors = MissingErrors::new(requested);
        let mut driver = generator.partial(requested, &errors);
        driver.set("id", Value::String(MISSING_ID.to_string()));
        self.overlay.overlay(&mut driver, requested);
        debug!(driver_type = %self.driver_type, requested = %requested, "synthesized missing driver");
        self.validate(driver)
    }
}

/// Typed handle over a configured missing generator.
///
/// Where the raw generator returns a partial field set, this handle runs the
/// full synthesis pipeline: forced `"missing"` id, stand-in overlay, schema
/// validation.
pub struct MissingHandler<'a> {
    registry: &'a DriverRegistry,
    generator: &'a MissingGenerator,
}

impl MissingHandler<'_> {
    /// Synthesize the validated placeholder driver for a requested id
    pub fn synthesize(&self, requested_id: &str) -> Result<Driver> {
        self.registry.synthesize(self.generator, requested_id)
    }
}

/// Builder for [`DriverRegistry`]
pub struct RegistryBuilder {
    driver_type: String,
    schema: DriverSchema,
    options: ValidationOptions,
    missing: Option<MissingGenerator>,
    hooks: Option<Box<dyn DriverHooks>>,
}

impl RegistryBuilder {
    fn new(driver_type: impl Into<String>) -> Self {
        Self {
            driver_type: driver_type.into(),
            schema: DriverSchema::new(),
            options: ValidationOptions::default(),
            missing: None,
            hooks: None,
        }
    }

    /// The schema drivers are validated against
    pub fn schema(mut self, schema: DriverSchema) -> Self {
        self.schema = schema;
        self
    }

    /// Options passed through to validation
    pub fn options(mut self, options: ValidationOptions) -> Self {
        self.options = options;
        self
    }

    /// Configure the missing-driver generator
    pub fn missing_generator(mut self, generator: MissingGenerator) -> Self {
        self.missing = Some(generator);
        self
    }

    /// Install validation hooks
    pub fn hooks(mut self, hooks: impl DriverHooks + 'static) -> Self {
        self.hooks = Some(Box::new(hooks));
        self
    }

    /// Build the registry.
    ///
    /// The missing generator, if any, is applied through the same path as
    /// [`DriverRegistry::set_missing_generator`], so its invariants hold.
    pub fn build(self) -> Result<DriverRegistry> {
        let mut registry = DriverRegistry::with_schema(self.driver_type, self.schema);
        registry.options = self.options;
        if let Some(hooks) = self.hooks {
            registry.hooks = hooks;
        }
        if let Some(generator) = self.missing {
            registry.set_missing_generator(generator)?;
        }
        Ok(registry)
    }
}
