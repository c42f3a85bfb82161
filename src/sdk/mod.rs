//! The API-client collaborator.
//!
//! Everything the core needs from the outside world goes through [`ApiSdk`]:
//! the service catalog, per-service operation documents, session resolution
//! and the actual call. [`OpenApiSdk`] is the shipped implementation, backed
//! by one OpenAPI document per service and plain HTTP.

#[cfg(test)]
pub mod fake;
pub mod http;
pub mod openapi;
pub mod region;
pub mod session;

use indexmap::IndexMap;
use serde_json::Value;

use crate::encoder::EncodedArguments;
use crate::error::SdkError;
use crate::schema::OperationSchema;

pub use openapi::OpenApiSdk;
pub use session::{Credentials, Session, SessionOptions};

/// What the SDK knows about one service.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceDefinition {
    pub name: String,
    pub description: String,
    /// Operation name → normalized operation document, in catalog order.
    /// Compiled into [`OperationSchema`] only when selected.
    pub operations: IndexMap<String, Value>,
}

/// Raw outcome of a successful call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationResult {
    pub status: u16,
    pub body: String,
}

impl InvocationResult {
    /// The body as structured data, if it is JSON.
    pub fn json(&self) -> Option<Value> {
        serde_json::from_str(&self.body).ok()
    }
}

pub trait ApiSdk {
    /// Names of all services, in catalog order. Must not load any service.
    fn list_services(&self) -> Result<Vec<String>, SdkError>;

    /// Load one service's description and operation documents.
    fn describe_service(&self, name: &str) -> Result<ServiceDefinition, SdkError>;

    /// Resolve credentials and routing from flags, environment and profile.
    fn open_session(&self, options: &SessionOptions) -> Result<Session, SdkError>;

    /// Call one operation with encoded arguments.
    fn invoke(
        &self,
        session: &Session,
        service: &str,
        operation: &OperationSchema,
        arguments: &EncodedArguments,
    ) -> Result<InvocationResult, SdkError>;

    /// Valid `--residency` values.
    fn residencies(&self) -> Vec<String>;

    /// Valid `--endpoint` values.
    fn endpoints(&self) -> Vec<String>;
}
