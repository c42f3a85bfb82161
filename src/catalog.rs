//! Service catalog with lazily loaded service descriptors.
//!
//! The catalog is built once per run from the SDK's list of names. A
//! descriptor asks the SDK for its operations the first time it is needed
//! and keeps the answer for the rest of the run.

use indexmap::IndexMap;

use crate::error::{SchemaError, SdkError};
use crate::schema::OperationSchema;
use crate::sdk::{ApiSdk, ServiceDefinition};

/// A value that is fetched at most once. A failed fetch leaves it unfetched.
#[derive(Debug, Clone, PartialEq)]
pub struct Cached<T>(Option<T>);

impl<T> Default for Cached<T> {
    fn default() -> Self {
        Self(None)
    }
}

impl<T> Cached<T> {
    /// Run `fetch` if nothing has been fetched yet, then return the value.
    pub fn ensure_loaded<E>(&mut self, fetch: impl FnOnce() -> Result<T, E>) -> Result<&T, E> {
        let value = match self.0.take() {
            Some(value) => value,
            None => fetch()?,
        };
        Ok(self.0.insert(value))
    }

    pub fn get(&self) -> Option<&T> {
        self.0.as_ref()
    }

    pub fn is_fetched(&self) -> bool {
        self.0.is_some()
    }
}

#[derive(Debug)]
pub struct ServiceDescriptor {
    name: String,
    definition: Cached<ServiceDefinition>,
}

impl ServiceDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            definition: Cached::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_loaded(&self) -> bool {
        self.definition.is_fetched()
    }

    /// Fetch the service definition on first use.
    pub fn ensure_loaded(&mut self, sdk: &dyn ApiSdk) -> Result<&ServiceDefinition, SdkError> {
        let name = &self.name;
        self.definition.ensure_loaded(|| {
            tracing::debug!(service = %name, "loading service definition");
            sdk.describe_service(name)
        })
    }

    pub fn description(&mut self, sdk: &dyn ApiSdk) -> Result<&str, SdkError> {
        Ok(self.ensure_loaded(sdk)?.description.as_str())
    }

    pub fn operation_names(&mut self, sdk: &dyn ApiSdk) -> Result<Vec<String>, SdkError> {
        Ok(self.ensure_loaded(sdk)?.operations.keys().cloned().collect())
    }

    /// Compile one operation. `Ok(None)` when the service has no such
    /// operation.
    pub fn operation(
        &mut self,
        sdk: &dyn ApiSdk,
        name: &str,
    ) -> Result<Option<Result<OperationSchema, SchemaError>>, SdkError> {
        let definition = self.ensure_loaded(sdk)?;
        Ok(definition
            .operations
            .get(name)
            .map(|spec| OperationSchema::from_spec(name, spec)))
    }
}

/// Ordered mapping of service name to descriptor.
#[derive(Debug, Default)]
pub struct ServiceCatalog {
    services: IndexMap<String, ServiceDescriptor>,
}

impl ServiceCatalog {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let services = names
            .into_iter()
            .map(|name| {
                let name = name.into();
                (name.clone(), ServiceDescriptor::new(name))
            })
            .collect();
        Self { services }
    }

    pub fn from_sdk(sdk: &dyn ApiSdk) -> Result<Self, SdkError> {
        Ok(Self::new(sdk.list_services()?))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.services.keys().map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.services.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    pub fn service_mut(&mut self, name: &str) -> Option<&mut ServiceDescriptor> {
        self.services.get_mut(name)
    }
}
